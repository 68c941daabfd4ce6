use std::fmt;

/// Reasons code generation aborts. There is no partial output: the first
/// error ends the compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodegenError {
    /// The tree contains something the generator has no rule for. This is a
    /// parser/generator contract violation, not a user error.
    Internal { message: String, line: u32 },
    TooManyRegisters { limit: u16 },
    TooManyConstants { limit: u16 },
}

impl CodegenError {
    pub fn internal(message: impl Into<String>, line: u32) -> Self {
        CodegenError::Internal {
            message: message.into(),
            line,
        }
    }

    pub fn is_internal(&self) -> bool {
        matches!(self, CodegenError::Internal { .. })
    }
}

impl fmt::Display for CodegenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodegenError::Internal { message, line } => {
                write!(f, "internal code generation error at line {line}: {message}")
            }
            CodegenError::TooManyRegisters { limit } => {
                write!(f, "function needs more than {limit} registers")
            }
            CodegenError::TooManyConstants { limit } => {
                write!(f, "function has more than {limit} constants")
            }
        }
    }
}

impl std::error::Error for CodegenError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_error_display() {
        let err = CodegenError::internal("unexpected token 'end'", 12);
        assert!(err.is_internal());
        assert_eq!(
            err.to_string(),
            "internal code generation error at line 12: unexpected token 'end'"
        );
    }

    #[test]
    fn capacity_error_display() {
        let err = CodegenError::TooManyRegisters { limit: 250 };
        assert!(!err.is_internal());
        assert_eq!(err.to_string(), "function needs more than 250 registers");
    }
}
