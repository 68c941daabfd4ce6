//! Syntax tree handed over by the parser.
//!
//! The node set is closed: one chunk, one block kind, the statement kinds in
//! [`Stmt`] and the expression kinds in [`Expr`]. Leaves carry a
//! [`TokenDetail`] with the literal value and its source line.

use crate::token::{Token, TokenDetail};
use crate::util::Name;

#[cfg(test)]
mod ast_test;

/// Top-level compilation unit, compiled as an implicit vararg function.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub module: Name,
    pub block: Block,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Block {
    pub statements: Vec<Stmt>,
    /// Trailing `return`, compiled after every other statement.
    pub return_stmt: Option<ReturnStmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReturnStmt {
    pub exp_list: Option<ExpList>,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExpList {
    pub exps: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct NameList {
    pub names: Vec<TokenDetail>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParamList {
    pub names: Option<NameList>,
    pub vararg: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionBody {
    pub params: ParamList,
    pub block: Block,
    pub line: u32,
}

/// `a.b.c` or `a.b:c` in a function statement.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionName {
    pub path: Vec<TokenDetail>,
    pub method: Option<TokenDetail>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfClause {
    pub exp: Expr,
    pub block: Block,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Break {
        line: u32,
    },
    Do(Block),
    While {
        exp: Expr,
        block: Block,
    },
    Repeat {
        block: Block,
        exp: Expr,
    },
    /// `if` followed by any number of `elseif` clauses, then an optional `else`.
    If {
        clauses: Vec<IfClause>,
        else_block: Option<Block>,
    },
    NumericFor {
        var: TokenDetail,
        start: Expr,
        limit: Expr,
        step: Option<Expr>,
        block: Block,
    },
    GenericFor {
        names: NameList,
        exps: ExpList,
        block: Block,
    },
    Function {
        name: FunctionName,
        body: Box<FunctionBody>,
    },
    LocalFunction {
        name: TokenDetail,
        body: Box<FunctionBody>,
    },
    LocalNameList {
        names: NameList,
        exps: Option<ExpList>,
    },
    Assignment {
        vars: Vec<Expr>,
        exps: ExpList,
    },
    /// A call used as a statement; must be [`Expr::Call`] or [`Expr::MemberCall`].
    Call(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TableField {
    /// `[key] = value`
    Index { key: Expr, value: Expr },
    /// `name = value`
    Name { name: TokenDetail, value: Expr },
    /// positional `value`
    Array(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableDefine {
    pub fields: Vec<TableField>,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Binary {
        op: TokenDetail,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: TokenDetail,
        exp: Box<Expr>,
    },
    /// Literal, identifier, or `...`.
    Terminator(TokenDetail),
    Function(Box<FunctionBody>),
    Table(TableDefine),
    Index {
        table: Box<Expr>,
        index: Box<Expr>,
        line: u32,
    },
    Member {
        table: Box<Expr>,
        member: TokenDetail,
    },
    Call {
        caller: Box<Expr>,
        args: Option<ExpList>,
        line: u32,
    },
    MemberCall {
        caller: Box<Expr>,
        member: TokenDetail,
        args: Option<ExpList>,
        line: u32,
    },
}

impl Expr {
    pub fn number(value: f64, line: u32) -> Self {
        Expr::Terminator(TokenDetail::new(Token::Number(value), line))
    }

    pub fn string(value: Name, line: u32) -> Self {
        Expr::Terminator(TokenDetail::new(Token::String(value), line))
    }

    pub fn name(name: Name, line: u32) -> Self {
        Expr::Terminator(TokenDetail::new(Token::Id(name), line))
    }

    pub fn token(token: Token, line: u32) -> Self {
        Expr::Terminator(TokenDetail::new(token, line))
    }

    pub fn binary(op: Token, left: Expr, right: Expr, line: u32) -> Self {
        Expr::Binary {
            op: TokenDetail::new(op, line),
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn unary(op: Token, exp: Expr, line: u32) -> Self {
        Expr::Unary {
            op: TokenDetail::new(op, line),
            exp: Box::new(exp),
        }
    }

    pub fn call(caller: Expr, args: Vec<Expr>, line: u32) -> Self {
        Expr::Call {
            caller: Box::new(caller),
            args: (!args.is_empty()).then(|| ExpList::new(args)),
            line,
        }
    }

    pub fn index(table: Expr, index: Expr, line: u32) -> Self {
        Expr::Index {
            table: Box::new(table),
            index: Box::new(index),
            line,
        }
    }

    pub fn member(table: Expr, member: Name, line: u32) -> Self {
        Expr::Member {
            table: Box::new(table),
            member: TokenDetail::new(Token::Id(member), line),
        }
    }

    /// Calls and `...` can produce any number of values; everything else
    /// produces exactly one.
    pub fn is_multi_value(&self) -> bool {
        match self {
            Expr::Call { .. } | Expr::MemberCall { .. } => true,
            Expr::Terminator(t) => t.token == Token::VarArg,
            _ => false,
        }
    }

    /// Best-effort source line for diagnostics.
    pub fn line(&self) -> u32 {
        match self {
            Expr::Binary { op, .. } | Expr::Unary { op, .. } => op.line,
            Expr::Terminator(t) => t.line,
            Expr::Function(body) => body.line,
            Expr::Table(table) => table.line,
            Expr::Member { member, .. } => member.line,
            Expr::Index { line, .. } | Expr::Call { line, .. } | Expr::MemberCall { line, .. } => *line,
        }
    }
}

impl ExpList {
    pub fn new(exps: Vec<Expr>) -> Self {
        Self { exps }
    }

    pub fn len(&self) -> usize {
        self.exps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exps.is_empty()
    }

    /// Whether the final expression may expand to several values.
    pub fn ends_multi_value(&self) -> bool {
        self.exps.last().is_some_and(Expr::is_multi_value)
    }
}

impl NameList {
    pub fn new(names: Vec<TokenDetail>) -> Self {
        Self { names }
    }

    pub fn from_names(names: &[Name], line: u32) -> Self {
        Self {
            names: names.iter().map(|&n| TokenDetail::new(Token::Id(n), line)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl Block {
    pub fn new(statements: Vec<Stmt>) -> Self {
        Self {
            statements,
            return_stmt: None,
        }
    }

    pub fn with_return(statements: Vec<Stmt>, exps: Vec<Expr>, line: u32) -> Self {
        Self {
            statements,
            return_stmt: Some(ReturnStmt {
                exp_list: (!exps.is_empty()).then(|| ExpList::new(exps)),
                line,
            }),
        }
    }
}

impl Stmt {
    pub fn local(names: &[Name], exps: Vec<Expr>, line: u32) -> Self {
        Stmt::LocalNameList {
            names: NameList::from_names(names, line),
            exps: (!exps.is_empty()).then(|| ExpList::new(exps)),
        }
    }
}
