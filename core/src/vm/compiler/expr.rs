use super::builder::{CgResult, CodeGenerator, NameRef};
use super::error::CodegenError;
use crate::{
    ast::{ExpList, Expr, FunctionBody, TableDefine, TableField},
    token::{Token, TokenDetail},
    util::Name,
    vm::Op,
};

type BinaryCtor = fn(u16, u16, u16) -> Op;

fn binary_op(token: Token) -> Option<BinaryCtor> {
    let ctor: BinaryCtor = match token {
        Token::Add => Op::Add,
        Token::Sub => Op::Sub,
        Token::Mul => Op::Mul,
        Token::Div => Op::Div,
        Token::Pow => Op::Pow,
        Token::Mod => Op::Mod,
        Token::Concat => Op::Concat,
        Token::Lt => Op::Less,
        Token::Gt => Op::Greater,
        Token::Le => Op::LessEqual,
        Token::Ge => Op::GreaterEqual,
        Token::Eq => Op::Equal,
        Token::Ne => Op::NotEqual,
        _ => return None,
    };
    Some(ctor)
}

impl CodeGenerator<'_> {
    /// Compiles `exp` into the register under the cursor and leaves the
    /// cursor one past it. Multi-valued expressions spread their values
    /// from that register up to the VM stack top.
    pub(crate) fn expression(&mut self, exp: &Expr) -> CgResult {
        match exp {
            Expr::Terminator(token) => self.terminator(token),
            Expr::Binary { op, left, right } => self.binary(op, left, right),
            Expr::Unary { op, exp } => self.unary(op, exp),
            Expr::Function(body) => self.function_expr(body),
            Expr::Table(table) => self.table(table),
            Expr::Index { table, index, line } => self.index(table, index, *line),
            Expr::Member { table, member } => self.member(table, member),
            Expr::Call { caller, args, line } => self.call(caller, args.as_ref(), *line),
            Expr::MemberCall {
                caller,
                member,
                args,
                line,
            } => self.member_call(caller, member, args.as_ref(), *line),
        }
    }

    /// Compiles each expression into its own slot of a contiguous run
    /// starting at the cursor. The cursor ends one past the run.
    pub(crate) fn exp_list(&mut self, exps: &ExpList) -> CgResult {
        let base = self.next_register();
        for (i, exp) in exps.exps.iter().enumerate() {
            let slot = self.register_at(base, i)?;
            self.set_next_register(slot);
            self.set_top(slot);
            self.expression(exp)?;
        }
        let end = self.register_at(base, exps.len())?;
        self.set_next_register(end);
        Ok(())
    }

    fn terminator(&mut self, token: &TokenDetail) -> CgResult {
        let line = token.line;
        match token.token {
            Token::Number(value) => {
                let k = self.func().add_const_number(value)?;
                let reg = self.allocate()?;
                self.emit(Op::LoadNum(reg, k), line);
            }
            Token::String(value) => {
                let k = self.func().add_const_string(value)?;
                let reg = self.allocate()?;
                self.emit(Op::LoadStr(reg, k), line);
            }
            Token::Nil => {
                let reg = self.allocate()?;
                self.emit(Op::LoadNil(reg), line);
            }
            Token::True | Token::False => {
                let reg = self.allocate()?;
                self.emit(Op::LoadBool(reg, token.token == Token::True), line);
            }
            Token::VarArg => {
                if !self.func_ref().is_vararg {
                    return Err(CodegenError::internal("'...' outside a vararg function", line));
                }
                let reg = self.allocate()?;
                self.emit(Op::VarArg(reg), line);
            }
            Token::Id(name) => {
                self.read_name(name, line)?;
            }
            other => {
                return Err(CodegenError::internal(
                    format!("no rule to load token {other} as a value"),
                    line,
                ));
            }
        }
        Ok(())
    }

    /// Loads the value of `name` into a fresh register.
    pub(crate) fn read_name(&mut self, name: Name, line: u32) -> CgResult<u16> {
        let target = self.resolve_name(name, line)?;
        let reg = self.allocate()?;
        let op = match target {
            NameRef::Local(src) => Op::Move(reg, src),
            NameRef::Upvalue(idx) => Op::GetUpvalue(reg, idx),
            NameRef::Global(kidx) => Op::GetGlobal(reg, kidx),
        };
        self.emit(op, line);
        Ok(reg)
    }

    fn binary(&mut self, op: &TokenDetail, left: &Expr, right: &Expr) -> CgResult {
        let reg = self.next_register();
        self.expression(left)?;

        if matches!(op.token, Token::And | Token::Or) {
            let skip = if op.token == Token::And {
                Op::JmpFalse(reg, 0)
            } else {
                Op::JmpTrue(reg, 0)
            };
            let jump = self.emit(skip, op.line);
            self.set_next_register(reg);
            self.expression(right)?;
            self.set_next_register(reg + 1);
            return self.patch_here(jump);
        }

        let Some(ctor) = binary_op(op.token) else {
            return Err(CodegenError::internal(
                format!("unknown binary operator {}", op.token),
                op.line,
            ));
        };
        self.set_next_register(reg + 1);
        self.expression(right)?;
        self.emit(ctor(reg, reg, reg + 1), op.line);
        self.set_next_register(reg + 1);
        Ok(())
    }

    fn unary(&mut self, op: &TokenDetail, exp: &Expr) -> CgResult {
        let reg = self.next_register();
        self.expression(exp)?;
        let instr = match op.token {
            Token::Sub => Op::Neg(reg, reg),
            Token::Not => Op::Not(reg, reg),
            Token::Len => Op::Len(reg, reg),
            other => {
                return Err(CodegenError::internal(format!("unknown unary operator {other}"), op.line));
            }
        };
        self.emit(instr, op.line);
        self.set_next_register(reg + 1);
        Ok(())
    }

    fn function_expr(&mut self, body: &FunctionBody) -> CgResult {
        let child = self.function_body(body, None, false)?;
        let reg = self.allocate()?;
        self.emit(Op::Closure(reg, child), body.line);
        Ok(())
    }

    fn table(&mut self, table: &TableDefine) -> CgResult {
        let reg = self.allocate()?;
        self.emit(Op::NewTable(reg), table.line);

        let mut array_index: u32 = 1;
        let last = table.fields.len().saturating_sub(1);
        for (i, field) in table.fields.iter().enumerate() {
            self.set_next_register(reg + 1);
            match field {
                TableField::Index { key, value } => {
                    self.expression(key)?;
                    self.expression(value)?;
                    self.emit(Op::SetTable(reg, reg + 1, reg + 2), table.line);
                }
                TableField::Name { name, value } => {
                    self.load_member_key(name)?;
                    self.expression(value)?;
                    self.emit(Op::SetTable(reg, reg + 1, reg + 2), name.line);
                }
                TableField::Array(value) if i == last && value.is_multi_value() => {
                    // Every value up to the stack top goes in, from the next index on.
                    self.expression(value)?;
                    let first = u16::try_from(array_index)
                        .map_err(|_| CodegenError::internal("table constructor is too long", table.line))?;
                    self.emit(Op::SetList(reg, first), value.line());
                }
                TableField::Array(value) => {
                    let k = self.func().add_const_number(f64::from(array_index))?;
                    let key = self.allocate()?;
                    self.emit(Op::LoadNum(key, k), value.line());
                    self.expression(value)?;
                    self.emit(Op::SetTable(reg, reg + 1, reg + 2), value.line());
                    array_index += 1;
                }
            }
        }

        self.set_next_register(reg + 1);
        Ok(())
    }

    fn index(&mut self, table: &Expr, index: &Expr, line: u32) -> CgResult {
        let reg = self.next_register();
        self.expression(table)?;
        self.expression(index)?;
        self.emit(Op::GetTable(reg, reg, reg + 1), line);
        self.set_next_register(reg + 1);
        Ok(())
    }

    fn member(&mut self, table: &Expr, member: &TokenDetail) -> CgResult {
        let reg = self.next_register();
        self.expression(table)?;
        let key = self.load_member_key(member)?;
        self.emit(Op::GetTable(reg, reg, key), member.line);
        self.set_next_register(reg + 1);
        Ok(())
    }

    fn call(&mut self, caller: &Expr, args: Option<&ExpList>, line: u32) -> CgResult {
        let reg = self.next_register();
        self.expression(caller)?;

        let args_base = reg + 1;
        self.set_next_register(args_base);
        self.set_top(args_base);
        self.call_args(args_base, args)?;

        self.emit(Op::Call(reg), line);
        self.set_next_register(reg + 1);
        Ok(())
    }

    fn member_call(&mut self, caller: &Expr, member: &TokenDetail, args: Option<&ExpList>, line: u32) -> CgResult {
        let reg = self.next_register();
        self.expression(caller)?;

        // Object becomes the implicit first argument; the method replaces it at `reg`.
        let this = self.allocate()?;
        self.emit(Op::Move(this, reg), member.line);
        let key = self.load_member_key(member)?;
        self.emit(Op::GetTable(reg, reg, key), member.line);

        let args_base = this + 1;
        self.set_next_register(args_base);
        self.set_top(args_base);
        self.call_args(args_base, args)?;

        self.emit(Op::Call(reg), line);
        self.set_next_register(reg + 1);
        Ok(())
    }

    fn call_args(&mut self, base: u16, args: Option<&ExpList>) -> CgResult {
        if let Some(args) = args {
            self.exp_list(args)?;
            self.close_list(base, args)?;
        }
        Ok(())
    }
}
