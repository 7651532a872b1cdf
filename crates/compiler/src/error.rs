//! Compiler-stage error type (`COMPILE_ERROR`).
//!
//! `LexError` lives in [`crate::lexer`] and `ParseError` in
//! [`crate::parser`]; this module adds the third stage and a top-level
//! enum the driver can match on to print the right error-kind prefix.

use crate::lexer::LexError;
use crate::parser::ParseError;
use std::fmt;

#[derive(Debug, Clone)]
pub struct CompileError {
    pub message: String,
    pub line: u32,
}

impl CompileError {
    pub fn new(message: impl Into<String>, line: u32) -> Self {
        CompileError {
            message: message.into(),
            line,
        }
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CompileError {}

/// Unified error returned by [`crate::compile_source`], one variant per
/// pipeline stage.
#[derive(Debug, Clone)]
pub enum GlintError {
    Lex(LexError),
    Parse(ParseError),
    Compile(CompileError),
}

impl GlintError {
    pub fn line(&self) -> u32 {
        match self {
            GlintError::Lex(e) => e.line,
            GlintError::Parse(e) => e.line,
            GlintError::Compile(e) => e.line,
        }
    }
}

impl fmt::Display for GlintError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GlintError::Lex(e) => write!(f, "LEX_ERROR (line {}): {e}", e.line),
            GlintError::Parse(e) => write!(f, "PARSE_ERROR (line {}): {e}", e.line),
            GlintError::Compile(e) => write!(f, "COMPILE_ERROR (line {}): {e}", e.line),
        }
    }
}

impl std::error::Error for GlintError {}

impl From<LexError> for GlintError {
    fn from(e: LexError) -> Self {
        GlintError::Lex(e)
    }
}

impl From<ParseError> for GlintError {
    fn from(e: ParseError) -> Self {
        GlintError::Parse(e)
    }
}

impl From<CompileError> for GlintError {
    fn from(e: CompileError) -> Self {
        GlintError::Compile(e)
    }
}
