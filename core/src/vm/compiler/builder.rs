use tracing::{debug, trace};

use super::error::CodegenError;
use super::options::CodegenOptions;
use super::scope::{Declaration, ScopeStack};
use crate::{
    ast::{ExpList, NameList},
    token::TokenDetail,
    util::Name,
    vm::{Function, FunctionId, Op, State, UpvalueDesc},
};

pub(crate) type CgResult<T = ()> = Result<T, CodegenError>;

/// A name from a name list and the register it was bound to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct NameReg {
    pub register: u16,
    pub token: TokenDetail,
}

/// How a name is reached from the function being compiled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NameRef {
    Local(u16),
    Upvalue(u16),
    /// String-pool index of the global's name.
    Global(u16),
}

#[derive(Debug, Default)]
struct LoopLabel {
    breaks: Vec<usize>,
}

/// Tree-walking code generator.
///
/// Every expression handler leaves its value in the register the cursor
/// pointed to on entry and moves the cursor one past it. Callers rewind the
/// cursor once they are done with a value.
pub struct CodeGenerator<'s> {
    pub(crate) state: &'s mut State,
    pub(crate) scopes: ScopeStack,
    current: FunctionId,
    /// Enclosing functions, innermost last; restored on leaving a body.
    saved: Vec<FunctionId>,
    loops: Vec<LoopLabel>,
    line_info: bool,
}

impl<'s> CodeGenerator<'s> {
    pub fn new(state: &'s mut State, root: FunctionId, options: &CodegenOptions) -> Self {
        Self {
            state,
            scopes: ScopeStack::new(),
            current: root,
            saved: Vec::new(),
            loops: Vec::new(),
            line_info: options.line_info,
        }
    }

    pub fn current(&self) -> FunctionId {
        self.current
    }

    pub(crate) fn func(&mut self) -> &mut Function {
        self.state.function_mut(self.current)
    }

    pub(crate) fn func_ref(&self) -> &Function {
        self.state.function(self.current)
    }

    // ---- Emission ----

    pub(crate) fn emit(&mut self, op: Op, line: u32) -> usize {
        let line = if self.line_info { line } else { 0 };
        self.func().add_instruction(op, line)
    }

    pub(crate) fn set_top(&mut self, reg: u16) {
        self.emit(Op::SetTop(reg), 0);
    }

    pub(crate) fn patch(&mut self, pc: usize, target: usize) -> CgResult {
        self.func().patch_jump(pc, target)
    }

    pub(crate) fn patch_here(&mut self, pc: usize) -> CgResult {
        let target = self.func_ref().current_pc();
        self.patch(pc, target)
    }

    // ---- Registers ----

    pub(crate) fn next_register(&self) -> u16 {
        self.func_ref().next_register()
    }

    pub(crate) fn set_next_register(&mut self, reg: u16) {
        self.func().set_next_register(reg);
    }

    pub(crate) fn allocate(&mut self) -> CgResult<u16> {
        self.func().allocate_register()
    }

    /// Makes sure registers below `end` exist in the frame.
    pub(crate) fn reserve_registers(&mut self, end: u16) -> CgResult {
        self.func().set_register_count(end)
    }

    /// `base + n` as a register index. The frame end itself (the limit) is allowed.
    pub(crate) fn register_at(&self, base: u16, n: usize) -> CgResult<u16> {
        let limit = self.func_ref().max_registers();
        u16::try_from(base as usize + n)
            .ok()
            .filter(|&reg| reg <= limit)
            .ok_or(CodegenError::TooManyRegisters { limit })
    }

    // ---- Scopes and functions ----

    /// Runs `f` inside a fresh scope frame; the frame is closed on every exit path.
    pub(crate) fn with_scope<T>(
        &mut self,
        owner: Option<FunctionId>,
        f: impl FnOnce(&mut Self) -> CgResult<T>,
    ) -> CgResult<T> {
        let frame = self.scopes.open(owner)?;
        let result = f(self);
        self.scopes.close(frame);
        result
    }

    /// Makes `id` the current function while `f` runs, then restores the caller's.
    pub(crate) fn with_function<T>(&mut self, id: FunctionId, f: impl FnOnce(&mut Self) -> CgResult<T>) -> CgResult<T> {
        self.saved.push(self.current);
        self.current = id;
        let loops = std::mem::take(&mut self.loops);
        debug!(function = id.index(), depth = self.saved.len(), "enter function");

        let result = f(self);

        self.loops = loops;
        if let Some(previous) = self.saved.pop() {
            self.current = previous;
        }
        debug!(function = id.index(), ok = result.is_ok(), "leave function");
        result
    }

    /// Runs a loop body and returns the break jumps emitted inside it.
    pub(crate) fn with_loop(&mut self, f: impl FnOnce(&mut Self) -> CgResult) -> CgResult<Vec<usize>> {
        self.loops.push(LoopLabel::default());
        let result = f(self);
        let label = self.loops.pop().unwrap_or_default();
        result.map(|()| label.breaks)
    }

    pub(crate) fn add_break(&mut self, line: u32) -> CgResult {
        if self.loops.is_empty() {
            return Err(CodegenError::internal("'break' outside a loop", line));
        }
        let jmp = self.emit(Op::Jmp(0), line);
        if let Some(label) = self.loops.last_mut() {
            label.breaks.push(jmp);
        }
        Ok(())
    }

    // ---- Names ----

    /// Declares each name in the innermost frame. A name already bound there
    /// keeps its register; a new one takes the next free register.
    pub(crate) fn name_list(&mut self, names: &NameList) -> CgResult<Vec<NameReg>> {
        let regs = self.reserve_names(names)?;
        self.declare_names(&regs);
        Ok(regs)
    }

    /// Picks registers for `names` without making them visible yet, so
    /// initializers still see whatever the names meant before.
    pub(crate) fn reserve_names(&mut self, names: &NameList) -> CgResult<Vec<NameReg>> {
        let mut regs: Vec<NameReg> = Vec::with_capacity(names.len());
        for token in &names.names {
            let name = Self::expect_name(token)?;
            let earlier = regs
                .iter()
                .find(|r| r.token.name() == Some(name))
                .map(|r| r.register);
            let register = match self.scopes.lookup(name).or(earlier) {
                Some(existing) => existing,
                None => self.allocate()?,
            };
            regs.push(NameReg {
                register,
                token: *token,
            });
        }
        Ok(regs)
    }

    pub(crate) fn declare_names(&mut self, regs: &[NameReg]) {
        for reg in regs {
            if let Some(name) = reg.token.name() {
                let declared = self.scopes.declare(name, reg.register);
                debug_assert!(
                    declared == Declaration::Fresh || declared == Declaration::Existing(reg.register),
                    "name rebound to a different register"
                );
            }
        }
    }

    pub(crate) fn declare_local(&mut self, token: &TokenDetail) -> CgResult<u16> {
        let name = Self::expect_name(token)?;
        let register = self.next_register();
        match self.scopes.declare(name, register) {
            Declaration::Fresh => self.allocate(),
            Declaration::Existing(existing) => Ok(existing),
        }
    }

    pub(crate) fn expect_name(token: &TokenDetail) -> CgResult<Name> {
        token
            .name()
            .ok_or_else(|| CodegenError::internal(format!("expected a name, found {}", token.token), token.line))
    }

    pub(crate) fn resolve_name(&mut self, name: Name, line: u32) -> CgResult<NameRef> {
        match self.scopes.resolve(name) {
            Some(found) if found.owner == self.current => Ok(NameRef::Local(found.register)),
            Some(found) => {
                if !self.state.is_enclosed_by(self.current, found.owner) {
                    return Err(CodegenError::internal(
                        "name bound in a function that does not enclose its use",
                        line,
                    ));
                }
                let idx = self.capture(self.current, name, found.owner, found.register, line)?;
                Ok(NameRef::Upvalue(idx))
            }
            None => {
                trace!(name = self.state.interner().resolve(name), line, "global name");
                Ok(NameRef::Global(self.func().add_const_string(name)?))
            }
        }
    }

    /// Upvalue slot of `name` in `func`, threading the capture through every
    /// function between `func` and `owner`.
    fn capture(&mut self, func: FunctionId, name: Name, owner: FunctionId, register: u16, line: u32) -> CgResult<u16> {
        let Some(parent) = self.state.function(func).superior else {
            return Err(CodegenError::internal("upvalue escapes the outermost function", line));
        };
        let desc = if parent == owner {
            UpvalueDesc {
                name,
                in_parent_stack: true,
                index: register,
            }
        } else {
            let index = self.capture(parent, name, owner, register, line)?;
            UpvalueDesc {
                name,
                in_parent_stack: false,
                index,
            }
        };
        let idx = self.state.function_mut(func).add_upvalue(desc)?;
        debug!(
            function = func.index(),
            name = self.state.interner().resolve(name),
            slot = idx,
            "upvalue"
        );
        Ok(idx)
    }

    // ---- Value lists ----

    /// Fixes the values produced at `base` by `exps` to exactly `wanted`.
    /// Missing single values become nil; a trailing call or `...` is
    /// stretched or cut through the stack top.
    pub(crate) fn adjust_values(&mut self, base: u16, exps: Option<&ExpList>, wanted: usize) -> CgResult {
        let have = exps.map_or(0, ExpList::len);
        if have >= wanted {
            return Ok(());
        }
        let end = self.register_at(base, wanted)?;
        self.reserve_registers(end)?;
        if exps.is_some_and(ExpList::ends_multi_value) {
            self.set_next_register(end);
            self.set_top(end);
        } else {
            let start = self.register_at(base, have)?;
            self.set_next_register(start);
            for _ in have..wanted {
                let reg = self.allocate()?;
                self.emit(Op::LoadNil(reg), 0);
            }
        }
        Ok(())
    }

    /// Marks the end of an open-ended value list (call arguments, return
    /// values) unless its last expression already set the top.
    pub(crate) fn close_list(&mut self, base: u16, exps: &ExpList) -> CgResult {
        if !exps.ends_multi_value() {
            let top = self.register_at(base, exps.len())?;
            self.set_top(top);
        }
        Ok(())
    }
}
