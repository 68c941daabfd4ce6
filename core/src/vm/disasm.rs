//! Human-readable listing of compiled functions.

use std::fmt::{self, Write};

use super::bytecode::Op;
use super::function::FunctionId;
use super::state::State;

/// Listing of `id` followed by all of its nested functions.
pub fn disassemble(state: &State, id: FunctionId) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = write_function(&mut out, state, id, 0);
    out
}

fn write_function(out: &mut String, state: &State, id: FunctionId, level: usize) -> fmt::Result {
    let func = state.function(id);
    let indent = "  ".repeat(level);
    let name = func.name.map(|n| state.interner().resolve(n)).unwrap_or("<anonymous>");
    let vararg = if func.is_vararg { "+" } else { "" };
    writeln!(
        out,
        "{indent}function {name} <line {}> ({}{vararg} params, {} slots, {} upvalues, {} instructions)",
        func.line_defined,
        func.num_params,
        func.register_count(),
        func.upvalues.len(),
        func.code.len(),
    )?;

    for (pc, op) in func.code.iter().enumerate() {
        let line = func.lines.get(pc).copied().unwrap_or(0);
        write!(out, "{indent}  {pc:>4}  [{line:>3}]  {op}")?;
        match *op {
            Op::LoadNum(_, k) => {
                if let Some(n) = func.const_numbers.get(k as usize) {
                    write!(out, "\t; {n}")?;
                }
            }
            Op::LoadStr(_, k) | Op::GetGlobal(_, k) | Op::SetGlobal(k, _) => {
                if let Some(&s) = func.const_strings.get(k as usize) {
                    write!(out, "\t; \"{}\"", state.interner().resolve(s))?;
                }
            }
            Op::GetUpvalue(_, u) | Op::SetUpvalue(u, _) => {
                if let Some(up) = func.upvalues.get(u as usize) {
                    write!(out, "\t; {}", state.interner().resolve(up.name))?;
                }
            }
            _ => {
                if let Some(ofs) = op.jump_offset() {
                    write!(out, "\t; to {}", pc as i64 + 1 + ofs as i64)?;
                }
            }
        }
        writeln!(out)?;
    }

    if !func.const_numbers.is_empty() {
        writeln!(out, "{indent}numbers ({}):", func.const_numbers.len())?;
        for (i, n) in func.const_numbers.iter().enumerate() {
            writeln!(out, "{indent}  {i:>4}  {n}")?;
        }
    }
    if !func.const_strings.is_empty() {
        writeln!(out, "{indent}strings ({}):", func.const_strings.len())?;
        for (i, &s) in func.const_strings.iter().enumerate() {
            writeln!(out, "{indent}  {i:>4}  \"{}\"", state.interner().resolve(s))?;
        }
    }
    if !func.upvalues.is_empty() {
        writeln!(out, "{indent}upvalues ({}):", func.upvalues.len())?;
        for (i, up) in func.upvalues.iter().enumerate() {
            let source = if up.in_parent_stack { "register" } else { "upvalue" };
            writeln!(
                out,
                "{indent}  {i:>4}  {}  {source} {}",
                state.interner().resolve(up.name),
                up.index
            )?;
        }
    }

    for &child in &func.children {
        write_function(out, state, child, level + 1)?;
    }
    Ok(())
}
