#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoring languages for Maze Lab programs.
//!
//! Two surface syntaxes are supported: an indentation-delimited one and a
//! brace-delimited primitive-call one. Both are tokenized and parsed into the
//! shared [`ast`], which [`compile`] lowers into a flat instruction list for
//! the interpreter. [`normalize`] renders indentation-syntax programs as
//! equivalent primitive-call source.

pub mod ast;
pub mod compile;
mod error;
mod indented;
mod lexer;
mod normalize;
mod primitive;
pub mod templates;

use maze_lab_core::{AuthoredProgram, SyntaxTag};

pub use compile::{compile, CompiledUnit, FunctionEntry, Instruction};
pub use error::SyntaxError;
pub use normalize::{normalize, render_primitive};

/// Parses source written in the given syntax.
///
/// # Errors
///
/// Returns a [`SyntaxError`] carrying the line and column of the first
/// problem found.
pub fn parse(syntax: SyntaxTag, source: &str) -> Result<ast::Program, SyntaxError> {
    match syntax {
        SyntaxTag::Indented => indented::parse(source),
        SyntaxTag::PrimitiveCall => primitive::parse(source),
    }
}

/// Parses and lowers an authored program in one step.
///
/// # Errors
///
/// Returns a [`SyntaxError`] when the source does not parse.
pub fn compile_program(program: &AuthoredProgram) -> Result<CompiledUnit, SyntaxError> {
    let tree = parse(program.syntax(), program.source())?;
    Ok(compile(&tree))
}
