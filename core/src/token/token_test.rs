#[cfg(test)]
mod test {
    use crate::token::{Token, TokenDetail};
    use crate::util::Interner;

    #[test]
    fn only_identifiers_carry_names() {
        let mut interner = Interner::new();
        let x = interner.intern("x");
        assert_eq!(TokenDetail::new(Token::Id(x), 1).name(), Some(x));
        assert_eq!(TokenDetail::new(Token::String(x), 1).name(), None);
        assert_eq!(TokenDetail::new(Token::Nil, 1).name(), None);
    }

    #[test]
    fn display() {
        assert_eq!(TokenDetail::new(Token::Ne, 3).to_string(), "'~=' at line 3");
        assert_eq!(Token::Number(2.5).to_string(), "2.5");
        assert_eq!(Token::ElseIf.to_string(), "elseif");
        assert_eq!(Token::Eof.to_string(), "<eof>");
    }
}
