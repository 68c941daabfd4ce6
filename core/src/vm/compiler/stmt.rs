use super::builder::{CgResult, CodeGenerator, NameRef};
use super::error::CodegenError;
use crate::{
    ast::{Block, Chunk, ExpList, Expr, FunctionBody, FunctionName, IfClause, NameList, ReturnStmt, Stmt},
    token::{Token, TokenDetail},
    util::Name,
    vm::Op,
};

/// Destination of one slot in an assignment.
enum Target {
    Name(NameRef),
    Field { table: u16, key: u16 },
}

impl CodeGenerator<'_> {
    /// Compiles the chunk into the current (root) function.
    pub fn chunk(&mut self, chunk: &Chunk) -> Result<(), CodegenError> {
        let root = self.current();
        self.func().set_base_info(Some(chunk.module), 0);
        self.func().is_vararg = true;
        self.block(&chunk.block)?;
        debug_assert_eq!(self.current(), root);
        let reg = self.next_register();
        self.emit(Op::Ret(reg), 0);
        Ok(())
    }

    pub(crate) fn block(&mut self, block: &Block) -> CgResult {
        let owner = self.current();
        let reg = self.next_register();
        self.with_scope(Some(owner), |g| g.block_statements(block))?;

        // The scope only hides the names; SetTop releases their storage.
        self.set_next_register(reg);
        self.set_top(reg);
        Ok(())
    }

    /// Statements of a block without scope handling; the trailing return goes last.
    fn block_statements(&mut self, block: &Block) -> CgResult {
        for stmt in &block.statements {
            self.statement(stmt)?;
        }
        if let Some(ret) = &block.return_stmt {
            self.return_stmt(ret)?;
        }
        Ok(())
    }

    pub(crate) fn statement(&mut self, stmt: &Stmt) -> CgResult {
        match stmt {
            Stmt::Break { line } => self.add_break(*line),
            Stmt::Do(block) => self.block(block),
            Stmt::While { exp, block } => self.while_stmt(exp, block),
            Stmt::Repeat { block, exp } => self.repeat_stmt(block, exp),
            Stmt::If { clauses, else_block } => self.if_stmt(clauses, else_block.as_ref()),
            Stmt::NumericFor {
                var,
                start,
                limit,
                step,
                block,
            } => self.numeric_for(var, start, limit, step.as_ref(), block),
            Stmt::GenericFor { names, exps, block } => self.generic_for(names, exps, block),
            Stmt::Function { name, body } => self.function_stmt(name, body),
            Stmt::LocalFunction { name, body } => self.local_function(name, body),
            Stmt::LocalNameList { names, exps } => self.local_name_list(names, exps.as_ref()),
            Stmt::Assignment { vars, exps } => self.assignment(vars, exps),
            Stmt::Call(exp) => self.call_stmt(exp),
        }
    }

    fn return_stmt(&mut self, ret: &ReturnStmt) -> CgResult {
        let reg = self.next_register();
        match &ret.exp_list {
            Some(exps) => {
                self.exp_list(exps)?;
                self.close_list(reg, exps)?;
            }
            None => self.set_top(reg),
        }
        self.emit(Op::Ret(reg), ret.line);
        self.set_next_register(reg);
        Ok(())
    }

    fn call_stmt(&mut self, exp: &Expr) -> CgResult {
        if !matches!(exp, Expr::Call { .. } | Expr::MemberCall { .. }) {
            return Err(CodegenError::internal("expression statement is not a call", exp.line()));
        }
        let reg = self.next_register();
        self.expression(exp)?;
        self.set_next_register(reg);
        self.set_top(reg);
        Ok(())
    }

    fn local_name_list(&mut self, names: &NameList, exps: Option<&ExpList>) -> CgResult {
        // Destinations first, so the initializers below can never overwrite them.
        let targets = self.reserve_names(names)?;

        let reg = self.next_register();
        if let Some(exps) = exps {
            self.exp_list(exps)?;
        }
        self.adjust_values(reg, exps, targets.len())?;
        let end = self.register_at(reg, targets.len())?;
        self.reserve_registers(end)?;

        // Every value is read before any destination is written.
        for (i, target) in targets.iter().enumerate() {
            let src = self.register_at(reg, i)?;
            self.emit(Op::Move(target.register, src), target.token.line);
        }
        self.declare_names(&targets);

        self.set_next_register(reg);
        self.set_top(reg);
        Ok(())
    }

    fn assignment(&mut self, vars: &[Expr], exps: &ExpList) -> CgResult {
        let reg = self.next_register();
        let mut targets = Vec::with_capacity(vars.len());
        for var in vars {
            let target = match var {
                Expr::Terminator(token) => {
                    let name = Self::expect_name(token)?;
                    Target::Name(self.resolve_name(name, token.line)?)
                }
                Expr::Index { table, index, .. } => {
                    let table_reg = self.next_register();
                    self.expression(table)?;
                    let key = self.next_register();
                    self.expression(index)?;
                    Target::Field { table: table_reg, key }
                }
                Expr::Member { table, member } => {
                    let table_reg = self.next_register();
                    self.expression(table)?;
                    let key = self.load_member_key(member)?;
                    Target::Field { table: table_reg, key }
                }
                other => {
                    return Err(CodegenError::internal("expression is not assignable", other.line()));
                }
            };
            targets.push(target);
        }

        let base = self.next_register();
        self.exp_list(exps)?;
        self.adjust_values(base, Some(exps), targets.len())?;
        let end = self.register_at(base, targets.len())?;
        self.reserve_registers(end)?;

        let line = vars.first().map_or(0, Expr::line);
        for (i, target) in targets.iter().enumerate() {
            let src = self.register_at(base, i)?;
            match *target {
                Target::Name(name) => self.store_name(name, src, line),
                Target::Field { table, key } => {
                    self.emit(Op::SetTable(table, key, src), line);
                }
            }
        }

        self.set_next_register(reg);
        self.set_top(reg);
        Ok(())
    }

    pub(crate) fn store_name(&mut self, name: NameRef, src: u16, line: u32) {
        let op = match name {
            NameRef::Local(reg) => Op::Move(reg, src),
            NameRef::Upvalue(idx) => Op::SetUpvalue(idx, src),
            NameRef::Global(kidx) => Op::SetGlobal(kidx, src),
        };
        self.emit(op, line);
    }

    fn while_stmt(&mut self, exp: &Expr, block: &Block) -> CgResult {
        let reg = self.next_register();
        let start = self.func_ref().current_pc();
        self.expression(exp)?;
        let exit_jump = self.emit(Op::JmpFalse(reg, 0), exp.line());
        self.set_next_register(reg);

        let breaks = self.with_loop(|g| g.block(block))?;
        let back = self.func_ref().offset_to(start);
        self.emit(Op::Jmp(back), exp.line());

        self.loop_exit(reg, std::iter::once(exit_jump).chain(breaks))
    }

    fn repeat_stmt(&mut self, block: &Block, exp: &Expr) -> CgResult {
        let reg = self.next_register();
        let start = self.func_ref().current_pc();
        let mut exit_jump = 0;

        // `until` sees the body's locals, so the scope stays open for it.
        let breaks = self.with_loop(|g| {
            g.with_scope(None, |g| {
                g.block_statements(block)?;
                let cond = g.next_register();
                g.expression(exp)?;
                exit_jump = g.emit(Op::JmpTrue(cond, 0), exp.line());
                g.set_next_register(reg);
                g.set_top(reg);
                let back = g.func_ref().offset_to(start);
                g.emit(Op::Jmp(back), exp.line());
                Ok(())
            })
        })?;

        self.loop_exit(reg, std::iter::once(exit_jump).chain(breaks))
    }

    fn if_stmt(&mut self, clauses: &[IfClause], else_block: Option<&Block>) -> CgResult {
        if clauses.is_empty() {
            return Err(CodegenError::internal("'if' without a condition", 0));
        }
        let reg = self.next_register();
        let mut end_jumps = Vec::new();
        for (i, clause) in clauses.iter().enumerate() {
            self.set_next_register(reg);
            self.expression(&clause.exp)?;
            let skip = self.emit(Op::JmpFalse(reg, 0), clause.exp.line());
            self.set_next_register(reg);
            self.block(&clause.block)?;
            let is_last = i + 1 == clauses.len() && else_block.is_none();
            if !is_last {
                end_jumps.push(self.emit(Op::Jmp(0), clause.exp.line()));
            }
            self.patch_here(skip)?;
        }
        if let Some(block) = else_block {
            self.block(block)?;
        }
        for jump in end_jumps {
            self.patch_here(jump)?;
        }
        Ok(())
    }

    fn numeric_for(
        &mut self,
        var: &TokenDetail,
        start: &Expr,
        limit: &Expr,
        step: Option<&Expr>,
        block: &Block,
    ) -> CgResult {
        let var_name = Self::expect_name(var)?;
        let reg = self.next_register();
        self.expression(start)?;
        self.set_next_register(reg + 1);
        self.expression(limit)?;
        self.set_next_register(reg + 2);
        match step {
            Some(step) => self.expression(step)?,
            None => {
                let k = self.func().add_const_number(1.0)?;
                let step_reg = self.allocate()?;
                self.emit(Op::LoadNum(step_reg, k), var.line);
            }
        }
        self.set_next_register(reg + 3);

        let prep = self.emit(Op::ForPrep { base: reg, ofs: 0 }, var.line);
        let body = self.func_ref().current_pc();
        let breaks = self.with_loop(|g| {
            g.with_scope(None, |g| {
                let var_reg = g.allocate()?;
                g.scopes.declare(var_name, var_reg);
                g.block(block)
            })
        })?;
        // Each iteration gets its own binding of the loop variable.
        self.set_top(reg + 3);
        let back = self.func_ref().offset_to(body);
        self.emit(Op::ForLoop { base: reg, ofs: back }, var.line);

        self.loop_exit(reg, std::iter::once(prep).chain(breaks))
    }

    fn generic_for(&mut self, names: &NameList, exps: &ExpList, block: &Block) -> CgResult {
        let line = names.names.first().map_or(0, |t| t.line);
        let nvars = u16::try_from(names.len()).map_err(|_| CodegenError::internal("too many loop variables", line))?;
        let reg = self.next_register();

        // Iterator function, state and control value.
        self.exp_list(exps)?;
        self.adjust_values(reg, Some(exps), 3)?;
        let vars = self.register_at(reg, 3)?;
        self.reserve_registers(vars)?;
        self.set_next_register(vars);

        let to_call = self.emit(Op::Jmp(0), line);
        let body = self.func_ref().current_pc();
        let breaks = self.with_loop(|g| {
            g.with_scope(None, |g| {
                g.name_list(names)?;
                let end = g.register_at(vars, names.len())?;
                g.reserve_registers(end)?;
                g.set_next_register(end);
                g.block(block)
            })
        })?;

        self.patch_here(to_call)?;
        self.set_top(vars);
        self.emit(Op::TForCall { base: reg, nvars }, line);
        let back = self.func_ref().offset_to(body);
        self.emit(Op::TForLoop { base: reg, ofs: back }, line);

        self.loop_exit(reg, breaks)
    }

    /// Places the loop's exit label, which releases everything the loop
    /// allocated, and points `jumps` at it.
    fn loop_exit(&mut self, reg: u16, jumps: impl IntoIterator<Item = usize>) -> CgResult {
        let exit = self.func_ref().current_pc();
        self.set_top(reg);
        self.set_next_register(reg);
        for jump in jumps {
            self.patch(jump, exit)?;
        }
        Ok(())
    }

    fn function_stmt(&mut self, name: &FunctionName, body: &FunctionBody) -> CgResult {
        let Some((first, rest)) = name.path.split_first() else {
            return Err(CodegenError::internal("function statement without a name", body.line));
        };
        let first_name = Self::expect_name(first)?;
        let debug_name = name.method.as_ref().or(name.path.last()).and_then(TokenDetail::name);

        let reg = self.next_register();
        let child = self.function_body(body, debug_name, name.method.is_some())?;
        let closure = self.allocate()?;
        self.emit(Op::Closure(closure, child), body.line);

        let keys: Vec<&TokenDetail> = rest.iter().chain(name.method.iter()).collect();
        match keys.split_last() {
            None => {
                let target = self.resolve_name(first_name, first.line)?;
                self.store_name(target, closure, first.line);
            }
            Some((last, path)) => {
                let table = self.next_register();
                self.read_name(first_name, first.line)?;
                for key in path {
                    let key_reg = self.load_member_key(key)?;
                    self.emit(Op::GetTable(table, table, key_reg), key.line);
                    self.set_next_register(table + 1);
                }
                let key_reg = self.load_member_key(last)?;
                self.emit(Op::SetTable(table, key_reg, closure), last.line);
            }
        }

        self.set_next_register(reg);
        self.set_top(reg);
        Ok(())
    }

    fn local_function(&mut self, name: &TokenDetail, body: &FunctionBody) -> CgResult {
        // Declared before the body so the function can call itself.
        let local = self.declare_local(name)?;
        let child = self.function_body(body, name.name(), false)?;
        self.emit(Op::Closure(local, child), body.line);
        Ok(())
    }

    /// Loads a `.name` key into a fresh register.
    pub(crate) fn load_member_key(&mut self, member: &TokenDetail) -> CgResult<u16> {
        let key = match member.token {
            Token::Id(name) | Token::String(name) => name,
            other => {
                return Err(CodegenError::internal(
                    format!("member key must be a name, found {other}"),
                    member.line,
                ));
            }
        };
        let k = self.func().add_const_string(key)?;
        let reg = self.allocate()?;
        self.emit(Op::LoadStr(reg, k), member.line);
        Ok(reg)
    }

    /// Compiles a function body into a new child of the current function
    /// and returns its child index for `Closure`.
    pub(crate) fn function_body(&mut self, body: &FunctionBody, name: Option<Name>, is_method: bool) -> CgResult<u16> {
        let parent = self.current();
        let id = self.state.new_function(Some(parent));
        self.state.function_mut(id).set_base_info(name, body.line);
        let child = self.func().add_child(id)?;

        self.with_function(id, |g| {
            // Parameters live in their own frame, owned by the new function.
            g.with_scope(Some(id), |g| {
                if is_method {
                    let this = g.state.self_name();
                    let reg = g.allocate()?;
                    g.scopes.declare(this, reg);
                }
                if let Some(names) = &body.params.names {
                    g.name_list(names)?;
                }
                let f = g.func();
                f.num_params = f.next_register();
                f.is_vararg = body.params.vararg;

                g.block(&body.block)?;
                let reg = g.next_register();
                g.emit(Op::Ret(reg), body.line);
                Ok(())
            })
        })?;
        Ok(child)
    }
}
