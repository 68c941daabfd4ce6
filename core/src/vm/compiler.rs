mod builder;
mod driver;
mod error;
mod expr;
mod options;
mod scope;
mod stmt;

pub use builder::CodeGenerator;
pub use driver::{Compiler, compile_chunk};
pub use error::CodegenError;
pub use options::CodegenOptions;
pub use scope::{Declaration, Resolved, ScopeFrame, ScopeName, ScopeStack};
