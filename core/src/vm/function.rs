//! Per-function compilation state.
//!
//! A [`Function`] owns the register cursor and high-water mark, the emitted
//! instruction stream with its line table, the deduplicated number and
//! string constant pools, and the upvalue descriptors. Functions live in the
//! [`State`](super::State) pool and link to their lexical parent by id.

use serde::{Deserialize, Serialize};
use tracing::trace;

use super::compiler::CodegenError;
use crate::util::{FastHashMap, Name, fast_hash_map_new};

use super::bytecode::Op;

/// Handle to a function in the compiler state's pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FunctionId(pub(crate) u32);

impl FunctionId {
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Where a captured variable comes from when the closure is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpvalueDesc {
    pub name: Name,
    /// true: `index` is a register of the enclosing function.
    /// false: `index` is an upvalue slot of the enclosing function.
    pub in_parent_stack: bool,
    pub index: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Limits {
    pub max_registers: u16,
    pub max_constants: u16,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_registers: 250,
            max_constants: u16::MAX,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Function {
    /// Module name for a chunk, declared name for named functions.
    pub name: Option<Name>,
    pub line_defined: u32,
    /// Lexically enclosing function; `None` only for the chunk.
    pub superior: Option<FunctionId>,
    pub code: Vec<Op>,
    /// Source line per instruction, parallel to `code`.
    pub lines: Vec<u32>,
    pub const_numbers: Vec<f64>,
    pub const_strings: Vec<Name>,
    pub upvalues: Vec<UpvalueDesc>,
    /// Nested prototypes, indexed by `Op::Closure`.
    pub children: Vec<FunctionId>,
    pub num_params: u16,
    pub is_vararg: bool,
    next_register: u16,
    register_count: u16,
    #[serde(skip)]
    number_index: FastHashMap<u64, u16>,
    #[serde(skip)]
    string_index: FastHashMap<Name, u16>,
    #[serde(skip)]
    limits: Limits,
}

impl Function {
    pub(crate) fn new(superior: Option<FunctionId>, limits: Limits) -> Self {
        Self {
            name: None,
            line_defined: 0,
            superior,
            code: Vec::new(),
            lines: Vec::new(),
            const_numbers: Vec::new(),
            const_strings: Vec::new(),
            upvalues: Vec::new(),
            children: Vec::new(),
            num_params: 0,
            is_vararg: false,
            next_register: 0,
            register_count: 0,
            number_index: fast_hash_map_new(),
            string_index: fast_hash_map_new(),
            limits,
        }
    }

    pub fn set_base_info(&mut self, name: Option<Name>, line: u32) {
        self.name = name;
        self.line_defined = line;
    }

    // ---- Registers ----

    /// Register the next allocation will hand out.
    #[inline]
    pub fn next_register(&self) -> u16 {
        self.next_register
    }

    /// Hands out the next register and advances the cursor.
    pub fn allocate_register(&mut self) -> Result<u16, CodegenError> {
        let reg = self.next_register;
        if reg >= self.limits.max_registers {
            return Err(CodegenError::TooManyRegisters {
                limit: self.limits.max_registers,
            });
        }
        self.next_register = reg + 1;
        if self.next_register > self.register_count {
            self.register_count = self.next_register;
        }
        Ok(reg)
    }

    /// Rewinds (or advances) the cursor; every register at or above `reg`
    /// becomes free. This is the only way registers are released.
    pub fn set_next_register(&mut self, reg: u16) {
        self.next_register = reg;
        if reg > self.register_count {
            self.register_count = reg;
        }
    }

    /// High-water mark: the frame size the VM must provide.
    #[inline]
    pub fn register_count(&self) -> u16 {
        self.register_count
    }

    /// Reserves a frame of at least `count` registers. The mark never shrinks.
    pub fn set_register_count(&mut self, count: u16) -> Result<(), CodegenError> {
        if count > self.limits.max_registers {
            return Err(CodegenError::TooManyRegisters {
                limit: self.limits.max_registers,
            });
        }
        self.register_count = self.register_count.max(count);
        Ok(())
    }

    // ---- Constants ----

    pub fn add_const_number(&mut self, value: f64) -> Result<u16, CodegenError> {
        if let Some(&idx) = self.number_index.get(&value.to_bits()) {
            return Ok(idx);
        }
        let idx = self.next_const_index(self.const_numbers.len())?;
        trace!(index = idx, value, "number constant");
        self.const_numbers.push(value);
        self.number_index.insert(value.to_bits(), idx);
        Ok(idx)
    }

    pub fn add_const_string(&mut self, value: Name) -> Result<u16, CodegenError> {
        if let Some(&idx) = self.string_index.get(&value) {
            return Ok(idx);
        }
        let idx = self.next_const_index(self.const_strings.len())?;
        trace!(index = idx, %value, "string constant");
        self.const_strings.push(value);
        self.string_index.insert(value, idx);
        Ok(idx)
    }

    fn next_const_index(&self, len: usize) -> Result<u16, CodegenError> {
        if len >= self.limits.max_constants as usize {
            return Err(CodegenError::TooManyConstants {
                limit: self.limits.max_constants,
            });
        }
        Ok(len as u16)
    }

    // ---- Code ----

    /// Appends an instruction and returns its index.
    pub fn add_instruction(&mut self, op: Op, line: u32) -> usize {
        self.code.push(op);
        self.lines.push(line);
        self.code.len() - 1
    }

    #[inline]
    pub fn current_pc(&self) -> usize {
        self.code.len()
    }

    /// Points the branch at `pc` to `target`.
    pub fn patch_jump(&mut self, pc: usize, target: usize) -> Result<(), CodegenError> {
        let ofs = target as i64 - (pc as i64 + 1);
        let patched = self
            .code
            .get_mut(pc)
            .is_some_and(|op| op.set_jump_offset(ofs as i32));
        if patched {
            Ok(())
        } else {
            Err(CodegenError::internal(
                format!("instruction {pc} is not a branch"),
                self.lines.get(pc).copied().unwrap_or(0),
            ))
        }
    }

    /// Relative offset from a jump emitted at the current pc back to `target`.
    pub fn offset_to(&self, target: usize) -> i32 {
        (target as i64 - (self.current_pc() as i64 + 1)) as i32
    }

    // ---- Closures ----

    /// Returns the slot of a matching upvalue, adding it when missing.
    pub fn add_upvalue(&mut self, desc: UpvalueDesc) -> Result<u16, CodegenError> {
        if let Some(pos) = self.upvalues.iter().position(|u| *u == desc) {
            return Ok(pos as u16);
        }
        let idx = self.next_const_index(self.upvalues.len())?;
        self.upvalues.push(desc);
        Ok(idx)
    }

    /// Registers a nested function and returns its `Closure` index.
    pub fn add_child(&mut self, child: FunctionId) -> Result<u16, CodegenError> {
        let idx = self.next_const_index(self.children.len())?;
        self.children.push(child);
        Ok(idx)
    }

    #[inline]
    pub fn max_registers(&self) -> u16 {
        self.limits.max_registers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn func() -> Function {
        Function::new(None, Limits::default())
    }

    #[test]
    fn allocation_raises_high_water_mark() {
        let mut f = func();
        assert_eq!(f.allocate_register().unwrap(), 0);
        assert_eq!(f.allocate_register().unwrap(), 1);
        assert_eq!(f.register_count(), 2);
        f.set_next_register(0);
        assert_eq!(f.next_register(), 0);
        assert_eq!(f.register_count(), 2, "rewinding never shrinks the frame");
        assert_eq!(f.allocate_register().unwrap(), 0);
    }

    #[test]
    fn register_count_only_grows() {
        let mut f = func();
        f.set_register_count(5).unwrap();
        f.set_register_count(3).unwrap();
        assert_eq!(f.register_count(), 5);
        assert!(f.next_register() <= f.register_count());
    }

    #[test]
    fn register_limit_is_enforced() {
        let mut f = Function::new(
            None,
            Limits {
                max_registers: 2,
                max_constants: 8,
            },
        );
        f.allocate_register().unwrap();
        f.allocate_register().unwrap();
        assert!(matches!(
            f.allocate_register(),
            Err(CodegenError::TooManyRegisters { limit: 2 })
        ));
        assert!(f.set_register_count(3).is_err());
    }

    #[test]
    fn constants_are_deduplicated_per_pool() {
        let mut f = func();
        let a = f.add_const_number(1.5).unwrap();
        let b = f.add_const_number(2.0).unwrap();
        assert_eq!(f.add_const_number(1.5).unwrap(), a);
        assert_ne!(a, b);
        assert_eq!(f.const_numbers, vec![1.5, 2.0]);
    }

    #[test]
    fn patch_jump_computes_relative_offset() {
        let mut f = func();
        let jmp = f.add_instruction(Op::Jmp(0), 1);
        f.add_instruction(Op::LoadNil(0), 1);
        f.add_instruction(Op::LoadNil(1), 1);
        f.patch_jump(jmp, f.current_pc()).unwrap();
        assert_eq!(f.code[jmp], Op::Jmp(2));
        assert!(f.patch_jump(1, 0).is_err());
    }

    #[test]
    fn upvalues_are_deduplicated() {
        let mut f = func();
        let name = crate::util::Interner::new().intern("x");
        let desc = UpvalueDesc {
            name,
            in_parent_stack: true,
            index: 3,
        };
        assert_eq!(f.add_upvalue(desc).unwrap(), 0);
        assert_eq!(f.add_upvalue(desc).unwrap(), 0);
        assert_eq!(f.upvalues.len(), 1);
    }

    #[test]
    fn child_table_shares_the_constant_ceiling() {
        let mut f = Function::new(
            None,
            Limits {
                max_registers: 8,
                max_constants: 2,
            },
        );
        assert_eq!(f.add_child(FunctionId(1)).unwrap(), 0);
        assert_eq!(f.add_child(FunctionId(2)).unwrap(), 1);
        assert!(matches!(
            f.add_child(FunctionId(3)),
            Err(CodegenError::TooManyConstants { limit: 2 })
        ));
        assert_eq!(f.children.len(), 2);
    }
}
