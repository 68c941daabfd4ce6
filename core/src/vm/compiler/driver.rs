use anyhow::{Context, Result};
use tracing::debug;

use super::builder::CodeGenerator;
use super::options::CodegenOptions;
use crate::{
    ast::Chunk,
    vm::{FunctionId, State},
};

/// Compiles chunks into function trees owned by a [`State`].
#[derive(Debug, Clone, Default)]
pub struct Compiler {
    options: CodegenOptions,
}

impl Compiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: CodegenOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &CodegenOptions {
        &self.options
    }

    /// Compile `chunk` into a new root function and return its id. On error
    /// nothing useful is left behind: the partially built functions stay in
    /// `state` but the root id is never handed out.
    pub fn compile_chunk(&self, state: &mut State, chunk: &Chunk) -> Result<FunctionId> {
        self.options.validate()?;
        state.apply_options(&self.options);

        let module = state.interner().resolve(chunk.module).to_owned();
        let root = state.new_function(None);
        let mut generator = CodeGenerator::new(state, root, &self.options);
        generator
            .chunk(chunk)
            .with_context(|| format!("failed to compile chunk '{module}'"))?;

        debug!(
            chunk = %module,
            functions = state.functions().len(),
            instructions = state.function(root).code.len(),
            "compiled chunk"
        );
        Ok(root)
    }
}

/// Compile with default options.
pub fn compile_chunk(state: &mut State, chunk: &Chunk) -> Result<FunctionId> {
    Compiler::new().compile_chunk(state, chunk)
}
