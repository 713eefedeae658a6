pub mod ast;
pub mod console;
pub mod engine;
pub mod error;
pub mod eval;
pub mod lexer;
pub mod parser;
pub mod proxy;
pub mod registry;
pub mod store;
pub mod symbols;
pub mod token;
pub mod value;

use ast::Program;
use parser::ParseError;
use registry::TagRegistry;

/// Loads a program with the built-in tags. Every static error is reported
/// here; nothing is executed.
pub fn load(source: &str) -> Result<Program, ParseError> {
    parser::parse(source)
}

pub fn load_with(source: &str, registry: &TagRegistry) -> Result<Program, ParseError> {
    parser::parse_with(source, registry)
}
