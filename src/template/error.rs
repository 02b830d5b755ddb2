use crate::function::FunctionError;
use thiserror::Error;

/// Errors raised while assembling a template.
///
/// Every variant carries the 1-based source line it was found on.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    #[error("line {line}: function \"{name}\" not defined")]
    UnknownFunction { name: String, line: usize },

    #[error("line {line}: unclosed action")]
    UnclosedAction { line: usize },

    #[error("line {line}: \"{keyword}\" actions are not supported")]
    Unsupported { keyword: String, line: usize },

    #[error("line {line}: {message}")]
    Syntax { message: String, line: usize },
}

impl ParseError {
    pub fn line(&self) -> usize {
        match self {
            ParseError::UnknownFunction { line, .. }
            | ParseError::UnclosedAction { line }
            | ParseError::Unsupported { line, .. }
            | ParseError::Syntax { line, .. } => *line,
        }
    }
}

/// Errors raised while executing an assembled template.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("line {line}: error calling {name}: {source}")]
    Function {
        name: String,
        line: usize,
        #[source]
        source: FunctionError,
    },
}
