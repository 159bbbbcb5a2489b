//! SQL parsing and the structural tree.
//!
//! Uses `sqlparser` for parsing, then lowers the result into the
//! FROM/WHERE structural tree that plan events are matched against.

mod ast;
mod error;
mod parser;
mod preprocess;

pub use ast::*;
pub use error::{ParseError, ParseResult};
pub use parser::Parser;
pub use preprocess::{lowercase_unquoted, split_statements};
