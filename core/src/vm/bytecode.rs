use serde::{Deserialize, Serialize};
use std::fmt;

/// Register-VM instruction. Registers are frame-relative `u16` slots; jump
/// offsets are relative to the instruction following the jump.
///
/// Writing a register at or above the stack top raises the top past it.
/// `SetTop` moves the top explicitly, nil-filling slots it exposes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Op {
    LoadNil(u16 /*dst*/),
    LoadBool(u16 /*dst*/, bool),
    // Constant pools: numbers and strings are indexed separately
    LoadNum(u16 /*dst*/, u16 /*kidx*/),
    LoadStr(u16 /*dst*/, u16 /*kidx*/),
    Move(u16 /*dst*/, u16 /*src*/),
    // Upvalues and globals
    GetUpvalue(u16 /*dst*/, u16 /*upval*/),
    SetUpvalue(u16 /*upval*/, u16 /*src*/),
    GetGlobal(u16 /*dst*/, u16 /*name_kidx*/),
    SetGlobal(u16 /*name_kidx*/, u16 /*src*/),
    // dst = closure over child prototype
    Closure(u16 /*dst*/, u16 /*child*/),
    // Copy all varargs starting at dst; top = dst + count
    VarArg(u16 /*dst*/),
    // Call R[base] with R[base+1 .. top); results land from R[base]
    Call(u16 /*base*/),
    // Return R[base .. top)
    Ret(u16 /*base*/),
    // Truncate (or nil-extend) the stack to the given register; closes upvalues at or above it
    SetTop(u16),
    // Branching
    Jmp(i32),
    JmpFalse(u16 /*r*/, i32 /*ofs*/),
    JmpTrue(u16 /*r*/, i32 /*ofs*/),
    // Unary
    Neg(u16 /*dst*/, u16 /*src*/),
    Not(u16, u16),
    Len(u16, u16),
    // Binary: dst = a <op> b
    Add(u16 /*dst*/, u16 /*a*/, u16 /*b*/),
    Sub(u16, u16, u16),
    Mul(u16, u16, u16),
    Div(u16, u16, u16),
    Pow(u16, u16, u16),
    Mod(u16, u16, u16),
    Concat(u16, u16, u16),
    Less(u16, u16, u16),
    Greater(u16, u16, u16),
    LessEqual(u16, u16, u16),
    GreaterEqual(u16, u16, u16),
    Equal(u16, u16, u16),
    NotEqual(u16, u16, u16),
    // Tables
    NewTable(u16 /*dst*/),
    SetTable(u16 /*table*/, u16 /*key*/, u16 /*value*/),
    GetTable(u16 /*dst*/, u16 /*table*/, u16 /*key*/),
    // t[first], t[first+1], ... = R[table+1 .. top)
    SetList(u16 /*table*/, u16 /*first*/),
    // Numeric for: R[base]=index, R[base+1]=limit, R[base+2]=step, R[base+3]=loop var.
    // FORPREP jumps past the loop when it would not run; FORLOOP steps the
    // index, copies it to R[base+3] and jumps back while it is in range.
    ForPrep {
        base: u16,
        ofs: i32,
    },
    ForLoop {
        base: u16,
        ofs: i32,
    },
    // Generic for: R[base]=iterator, R[base+1]=state, R[base+2]=control.
    // TFORCALL puts nvars results of R[base](R[base+1], R[base+2]) at R[base+3];
    // TFORLOOP copies a non-nil R[base+3] into the control slot and jumps back.
    TForCall {
        base: u16,
        nvars: u16,
    },
    TForLoop {
        base: u16,
        ofs: i32,
    },
}

impl Op {
    pub fn name(&self) -> &'static str {
        match self {
            Op::LoadNil(..) => "LOADNIL",
            Op::LoadBool(..) => "LOADBOOL",
            Op::LoadNum(..) => "LOADNUM",
            Op::LoadStr(..) => "LOADSTR",
            Op::Move(..) => "MOVE",
            Op::GetUpvalue(..) => "GETUPVAL",
            Op::SetUpvalue(..) => "SETUPVAL",
            Op::GetGlobal(..) => "GETGLOBAL",
            Op::SetGlobal(..) => "SETGLOBAL",
            Op::Closure(..) => "CLOSURE",
            Op::VarArg(..) => "VARARG",
            Op::Call(..) => "CALL",
            Op::Ret(..) => "RET",
            Op::SetTop(..) => "SETTOP",
            Op::Jmp(..) => "JMP",
            Op::JmpFalse(..) => "JMPFALSE",
            Op::JmpTrue(..) => "JMPTRUE",
            Op::Neg(..) => "NEG",
            Op::Not(..) => "NOT",
            Op::Len(..) => "LEN",
            Op::Add(..) => "ADD",
            Op::Sub(..) => "SUB",
            Op::Mul(..) => "MUL",
            Op::Div(..) => "DIV",
            Op::Pow(..) => "POW",
            Op::Mod(..) => "MOD",
            Op::Concat(..) => "CONCAT",
            Op::Less(..) => "LT",
            Op::Greater(..) => "GT",
            Op::LessEqual(..) => "LE",
            Op::GreaterEqual(..) => "GE",
            Op::Equal(..) => "EQ",
            Op::NotEqual(..) => "NE",
            Op::NewTable(..) => "NEWTABLE",
            Op::SetTable(..) => "SETTABLE",
            Op::GetTable(..) => "GETTABLE",
            Op::SetList(..) => "SETLIST",
            Op::ForPrep { .. } => "FORPREP",
            Op::ForLoop { .. } => "FORLOOP",
            Op::TForCall { .. } => "TFORCALL",
            Op::TForLoop { .. } => "TFORLOOP",
        }
    }

    /// Jump offset carried by branch instructions.
    pub fn jump_offset(&self) -> Option<i32> {
        match *self {
            Op::Jmp(ofs)
            | Op::JmpFalse(_, ofs)
            | Op::JmpTrue(_, ofs)
            | Op::ForPrep { ofs, .. }
            | Op::ForLoop { ofs, .. }
            | Op::TForLoop { ofs, .. } => Some(ofs),
            _ => None,
        }
    }

    /// Rewrites the offset of a branch instruction. Returns false for non-branches.
    pub(crate) fn set_jump_offset(&mut self, new_ofs: i32) -> bool {
        match self {
            Op::Jmp(ofs)
            | Op::JmpFalse(_, ofs)
            | Op::JmpTrue(_, ofs)
            | Op::ForPrep { ofs, .. }
            | Op::ForLoop { ofs, .. }
            | Op::TForLoop { ofs, .. } => {
                *ofs = new_ofs;
                true
            }
            _ => false,
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.name();
        match *self {
            Op::LoadNil(a)
            | Op::VarArg(a)
            | Op::Call(a)
            | Op::Ret(a)
            | Op::SetTop(a)
            | Op::NewTable(a) => write!(f, "{name:<10} {a}"),
            Op::LoadBool(a, b) => write!(f, "{name:<10} {a} {b}"),
            Op::LoadNum(a, b)
            | Op::LoadStr(a, b)
            | Op::Move(a, b)
            | Op::GetUpvalue(a, b)
            | Op::SetUpvalue(a, b)
            | Op::GetGlobal(a, b)
            | Op::SetGlobal(a, b)
            | Op::Closure(a, b)
            | Op::Neg(a, b)
            | Op::Not(a, b)
            | Op::Len(a, b)
            | Op::SetList(a, b) => write!(f, "{name:<10} {a} {b}"),
            Op::Jmp(ofs) => write!(f, "{name:<10} {ofs:+}"),
            Op::JmpFalse(a, ofs) | Op::JmpTrue(a, ofs) => write!(f, "{name:<10} {a} {ofs:+}"),
            Op::Add(a, b, c)
            | Op::Sub(a, b, c)
            | Op::Mul(a, b, c)
            | Op::Div(a, b, c)
            | Op::Pow(a, b, c)
            | Op::Mod(a, b, c)
            | Op::Concat(a, b, c)
            | Op::Less(a, b, c)
            | Op::Greater(a, b, c)
            | Op::LessEqual(a, b, c)
            | Op::GreaterEqual(a, b, c)
            | Op::Equal(a, b, c)
            | Op::NotEqual(a, b, c)
            | Op::SetTable(a, b, c)
            | Op::GetTable(a, b, c) => write!(f, "{name:<10} {a} {b} {c}"),
            Op::ForPrep { base, ofs } | Op::ForLoop { base, ofs } | Op::TForLoop { base, ofs } => {
                write!(f, "{name:<10} {base} {ofs:+}")
            }
            Op::TForCall { base, nvars } => write!(f, "{name:<10} {base} {nvars}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_pads_mnemonic() {
        assert_eq!(Op::Move(1, 2).to_string(), "MOVE       1 2");
        assert_eq!(Op::Jmp(-3).to_string(), "JMP        -3");
        assert_eq!(Op::JmpFalse(0, 4).to_string(), "JMPFALSE   0 +4");
    }

    #[test]
    fn only_branches_accept_offsets() {
        let mut op = Op::Jmp(0);
        assert!(op.set_jump_offset(7));
        assert_eq!(op.jump_offset(), Some(7));

        let mut op = Op::Call(0);
        assert!(!op.set_jump_offset(7));
        assert_eq!(op.jump_offset(), None);
    }
}
