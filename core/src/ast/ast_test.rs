#[cfg(test)]
mod test {
    use crate::{
        ast::{Block, ExpList, Expr, NameList, Stmt},
        token::{Token, TokenDetail},
        util::Interner,
    };

    #[test]
    fn calls_and_vararg_are_multi_valued() {
        let mut interner = Interner::new();
        let f = interner.intern("f");
        assert!(Expr::call(Expr::name(f, 1), vec![], 1).is_multi_value());
        assert!(Expr::token(Token::VarArg, 1).is_multi_value());
        assert!(!Expr::number(1.0, 1).is_multi_value());
        assert!(!Expr::binary(Token::Add, Expr::number(1.0, 1), Expr::number(2.0, 1), 1).is_multi_value());
    }

    #[test]
    fn list_end_decides_adjustment() {
        let mut interner = Interner::new();
        let f = interner.intern("f");
        let call = Expr::call(Expr::name(f, 2), vec![], 2);

        assert!(ExpList::new(vec![Expr::number(1.0, 1), call.clone()]).ends_multi_value());
        assert!(!ExpList::new(vec![call, Expr::number(1.0, 1)]).ends_multi_value());
        assert!(!ExpList::default().ends_multi_value());
    }

    #[test]
    fn lines_come_from_the_nearest_token() {
        let mut interner = Interner::new();
        let t = interner.intern("t");
        let k = interner.intern("k");
        assert_eq!(Expr::member(Expr::name(t, 3), k, 4).line(), 4);
        assert_eq!(Expr::unary(Token::Not, Expr::name(t, 8), 7).line(), 7);
        assert_eq!(Expr::call(Expr::name(t, 1), vec![], 9).line(), 9);
    }

    #[test]
    fn empty_initializers_are_absent() {
        let mut interner = Interner::new();
        let a = interner.intern("a");
        match Stmt::local(&[a], vec![], 5) {
            Stmt::LocalNameList { names, exps } => {
                assert_eq!(names, NameList::new(vec![TokenDetail::new(Token::Id(a), 5)]));
                assert!(exps.is_none());
            }
            other => panic!("unexpected statement {other:?}"),
        }

        let block = Block::with_return(vec![], vec![], 6);
        let ret = block.return_stmt.expect("return");
        assert!(ret.exp_list.is_none());
        assert_eq!(ret.line, 6);
    }
}
