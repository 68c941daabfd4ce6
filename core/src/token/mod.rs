//! Tokens as handed over by the front end.
//!
//! The generator only looks at literal, identifier and operator kinds; the
//! punctuation and keyword kinds exist so a token that strayed into the wrong
//! node can be reported instead of silently mis-compiled.

use std::fmt;

use crate::util::Name;

#[cfg(test)]
mod token_test;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Token {
    Number(f64),  // 3.14
    String(Name), // "text"
    Id(Name),     // name
    Nil,          // nil
    True,         // true
    False,        // false
    VarArg,       // ...
    Add,          // +
    Sub,          // -
    Mul,          // *
    Div,          // /
    Pow,          // ^
    Mod,          // %
    Concat,       // ..
    Len,          // #
    Eq,           // ==
    Ne,           // ~=
    Lt,           // <
    Gt,           // >
    Le,           // <=
    Ge,           // >=
    And,          // and
    Or,           // or
    Not,          // not
    Assign,       // =
    Comma,        // ,
    Dot,          // .
    Colon,        // :
    Semicolon,    // ;
    LParen,       // (
    RParen,       // )
    LBrace,       // {
    RBrace,       // }
    LBracket,     // [
    RBracket,     // ]
    // Keywords
    Local,
    Function,
    Return,
    Break,
    Do,
    End,
    While,
    Repeat,
    Until,
    If,
    Then,
    ElseIf,
    Else,
    For,
    In,
    Eof,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Token::Number(n) => return write!(f, "{n}"),
            Token::String(name) => return write!(f, "string {name}"),
            Token::Id(name) => return write!(f, "name {name}"),
            Token::Nil => "nil",
            Token::True => "true",
            Token::False => "false",
            Token::VarArg => "...",
            Token::Add => "+",
            Token::Sub => "-",
            Token::Mul => "*",
            Token::Div => "/",
            Token::Pow => "^",
            Token::Mod => "%",
            Token::Concat => "..",
            Token::Len => "#",
            Token::Eq => "==",
            Token::Ne => "~=",
            Token::Lt => "<",
            Token::Gt => ">",
            Token::Le => "<=",
            Token::Ge => ">=",
            Token::And => "and",
            Token::Or => "or",
            Token::Not => "not",
            Token::Assign => "=",
            Token::Comma => ",",
            Token::Dot => ".",
            Token::Colon => ":",
            Token::Semicolon => ";",
            Token::LParen => "(",
            Token::RParen => ")",
            Token::LBrace => "{",
            Token::RBrace => "}",
            Token::LBracket => "[",
            Token::RBracket => "]",
            Token::Local => "local",
            Token::Function => "function",
            Token::Return => "return",
            Token::Break => "break",
            Token::Do => "do",
            Token::End => "end",
            Token::While => "while",
            Token::Repeat => "repeat",
            Token::Until => "until",
            Token::If => "if",
            Token::Then => "then",
            Token::ElseIf => "elseif",
            Token::Else => "else",
            Token::For => "for",
            Token::In => "in",
            Token::Eof => "<eof>",
        };
        f.write_str(text)
    }
}

/// A token together with the source line it was read from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TokenDetail {
    pub token: Token,
    pub line: u32,
}

impl TokenDetail {
    pub const fn new(token: Token, line: u32) -> Self {
        Self { token, line }
    }

    /// The interned name for identifier tokens.
    pub fn name(&self) -> Option<Name> {
        match self.token {
            Token::Id(name) => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for TokenDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' at line {}", self.token, self.line)
    }
}
