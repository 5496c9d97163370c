//! Semantic core and x86-64 backend for the Slate language.
//!
//! A front end hands us an [`ast::Program`]; [`compile`] runs the passes in
//! order and either returns NASM assembly text or the diagnostics that
//! prevented it:
//!
//! 1. name resolution and storage layout ([`middle::resolve`])
//! 2. type checking ([`middle::type_check`])
//! 3. expression DAG construction with constant folding ([`middle::dag`]),
//!    interleaved with code generation ([`backend::x86_64`])
//!
//! Recoverable problems accumulate as [`diagnostics::Diagnostics`] and every
//! pass keeps going after reporting one, so a single compilation surfaces as
//! many errors as possible. Running out of scratch registers is the one
//! unrecoverable failure and aborts with [`diagnostics::FatalError`].

pub mod ast;
pub mod backend;
pub mod diagnostics;
pub mod index;
pub mod middle;

use crate::{
    ast::Program,
    backend::x86_64::CodeGenerator,
    diagnostics::{Diagnostics, FatalError},
    middle::{resolve::Resolver, type_check::TypeChecker},
};

/// The result of compiling one program
#[derive(Debug)]
pub struct CompileOutput {
    /// NASM source text; absent when resolution or type checking failed
    pub assembly: Option<String>,
    pub diagnostics: Diagnostics,
}

impl CompileOutput {
    pub fn succeeded(&self) -> bool {
        self.assembly.is_some() && self.diagnostics.is_empty()
    }
}

/// Runs the full pipeline over one program.
///
/// Code generation only runs on a program that resolved and checked
/// cleanly. A constant division by zero found while building expression
/// DAGs is reported in the output's diagnostics; the offending expression
/// is skipped and the rest of the assembly is still produced.
pub fn compile(program: &Program) -> Result<CompileOutput, FatalError> {
    let resolution = Resolver::resolve_program(program);
    let checked = TypeChecker::check_program(program, &resolution);

    if !resolution.diagnostics.is_empty() || !checked.diagnostics.is_empty() {
        let mut diagnostics = resolution.diagnostics;
        diagnostics.extend(checked.diagnostics);

        return Ok(CompileOutput {
            assembly: None,
            diagnostics,
        });
    }

    let output = CodeGenerator::generate(program, &resolution)?;

    Ok(CompileOutput {
        assembly: Some(output.assembly),
        diagnostics: output.diagnostics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ast::Builder, middle::ty::Type};

    #[test]
    fn a_clean_program_produces_assembly_and_no_diagnostics() {
        let mut b = Builder::new();

        let zero = b.integer(0);
        let body = vec![b.return_statement(Some(zero))];
        let main = b.function("main", Type::function(Type::Integer, vec![]), body);
        let program = Builder::program(vec![main]);

        let output = compile(&program).unwrap();

        assert!(output.succeeded());
        assert!(output.assembly.unwrap().contains("global main"));
    }

    #[test]
    fn semantic_errors_suppress_assembly() {
        let mut b = Builder::new();

        let missing = b.name("missing");
        let body = vec![b.return_statement(Some(missing))];
        let main = b.function("main", Type::function(Type::Integer, vec![]), body);
        let program = Builder::program(vec![main]);

        let output = compile(&program).unwrap();

        assert!(output.assembly.is_none());
        assert!(!output.diagnostics.is_empty());
    }
}
