//! Glint Compiler Library
//!
//! Drives source text through the lexer, parser and code generator and
//! hands back a ready-to-run program: a user entity table, a constant
//! pool, and the top-level script chunk. The runtime (`glint-runtime`)
//! is responsible for prepending the native bootstrap entries and
//! driving the VM; this crate never executes anything.

pub mod ast;
pub mod codegen;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod scope;

pub use ast::Program;
pub use codegen::{compile_program, CompiledProgram};
pub use error::GlintError;

/// Lex, parse and compile `source`, stopping at the first error from
/// whichever stage produces one first.
pub fn compile_source(source: &str) -> Result<CompiledProgram, GlintError> {
    let tokens = lexer::tokenize(source)?;
    let program = parser::parse(tokens)?;
    let compiled = compile_program(&program)?;
    Ok(compiled)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_a_trivial_script() {
        let compiled = compile_source("print 1 + 2;").expect("should compile");
        assert!(!compiled.script.is_empty());
    }

    #[test]
    fn reports_lex_errors_with_a_line_number() {
        let err = compile_source("cl x = @;").unwrap_err();
        assert_eq!(err.line(), 1);
    }

    #[test]
    fn reports_compile_errors_for_undefined_symbols() {
        let err = compile_source("print undefined_name;").unwrap_err();
        assert!(matches!(err, GlintError::Compile(_)));
    }
}
