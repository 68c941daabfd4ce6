use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

/// Configures code generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodegenOptions {
    /// Record source lines in the line table; when off every entry is 0.
    pub line_info: bool,
    /// Register ceiling per function frame.
    pub max_registers: u16,
    /// Entry ceiling per constant pool, upvalue table and child table.
    pub max_constants: u16,
}

impl Default for CodegenOptions {
    fn default() -> Self {
        Self {
            line_info: true,
            max_registers: 250,
            max_constants: u16::MAX,
        }
    }
}

impl CodegenOptions {
    /// Parse options from a TOML document; absent keys keep their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let options: CodegenOptions = toml::from_str(text).context("invalid code generation options")?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<()> {
        // A call needs at least the callee slot plus one argument slot.
        ensure!(self.max_registers >= 2, "max_registers must be at least 2");
        ensure!(self.max_constants >= 1, "max_constants must be at least 1");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_defaults() {
        let options = CodegenOptions::from_toml_str("max_registers = 64").expect("options");
        assert_eq!(options.max_registers, 64);
        assert!(options.line_info);
        assert_eq!(options.max_constants, u16::MAX);
    }

    #[test]
    fn empty_toml_is_default() {
        let options = CodegenOptions::from_toml_str("").expect("options");
        assert_eq!(options, CodegenOptions::default());
    }

    #[test]
    fn rejects_unusable_limits() {
        assert!(CodegenOptions::from_toml_str("max_registers = 1").is_err());
        assert!(CodegenOptions::from_toml_str("line_info = \"yes\"").is_err());
    }
}
