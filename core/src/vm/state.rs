use anyhow::{Context, Result};
use serde::Serialize;
use tracing::debug;

use super::compiler::CodegenOptions;
use crate::util::{Interner, Name};

use super::function::{Function, FunctionId, Limits};

/// Global compiler state for one compilation unit: the string interner and
/// the pool that owns every [`Function`] produced while compiling.
#[derive(Debug, Clone)]
pub struct State {
    interner: Interner,
    functions: Vec<Function>,
    limits: Limits,
    self_name: Name,
}

#[derive(Serialize)]
struct ProgramDump<'a> {
    root: FunctionId,
    strings: Vec<&'a str>,
    functions: &'a [Function],
}

impl State {
    pub fn new() -> Self {
        Self::with_options(&CodegenOptions::default())
    }

    pub fn with_options(options: &CodegenOptions) -> Self {
        let mut interner = Interner::new();
        let self_name = interner.intern("self");
        let mut state = Self {
            interner,
            functions: Vec::new(),
            limits: Limits::default(),
            self_name,
        };
        state.apply_options(options);
        state
    }

    /// Limits used by functions created from now on.
    pub(crate) fn apply_options(&mut self, options: &CodegenOptions) {
        self.limits = Limits {
            max_registers: options.max_registers,
            max_constants: options.max_constants,
        };
    }

    pub fn intern(&mut self, text: &str) -> Name {
        self.interner.intern(text)
    }

    pub fn interner(&self) -> &Interner {
        &self.interner
    }

    /// Implicit first parameter of methods.
    pub fn self_name(&self) -> Name {
        self.self_name
    }

    /// Allocates a fresh function linked to its lexical parent.
    pub fn new_function(&mut self, superior: Option<FunctionId>) -> FunctionId {
        let id = FunctionId(self.functions.len() as u32);
        debug!(id = id.0, superior = ?superior.map(|s| s.0), "new function context");
        self.functions.push(Function::new(superior, self.limits));
        id
    }

    pub fn function(&self, id: FunctionId) -> &Function {
        &self.functions[id.index()]
    }

    pub fn function_mut(&mut self, id: FunctionId) -> &mut Function {
        &mut self.functions[id.index()]
    }

    pub fn functions(&self) -> &[Function] {
        &self.functions
    }

    /// Whether `ancestor` encloses `id` (or is `id`).
    pub fn is_enclosed_by(&self, id: FunctionId, ancestor: FunctionId) -> bool {
        let mut current = Some(id);
        while let Some(f) = current {
            if f == ancestor {
                return true;
            }
            current = self.function(f).superior;
        }
        false
    }

    /// JSON dump of every function plus the string table, rooted at `root`.
    pub fn export_json(&self, root: FunctionId) -> Result<String> {
        let strings = (0..self.interner.len() as u32)
            .map(|i| self.interner.resolve(Name::from_index(i)))
            .collect();
        let dump = ProgramDump {
            root,
            strings,
            functions: &self.functions,
        };
        serde_json::to_string_pretty(&dump).context("failed to serialize compiled program")
    }
}

impl Default for State {
    fn default() -> Self {
        Self::new()
    }
}
