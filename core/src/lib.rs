pub mod ast;
pub mod token;
pub mod util;

// Register-VM code generation
pub mod vm;
