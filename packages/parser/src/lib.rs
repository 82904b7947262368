pub mod error;
pub mod parser;
pub mod refine;
pub mod tokenizer;

#[cfg(test)]
mod tests_parser;

pub use error::{ParseError, ParseResult};
pub use parser::{parse, Parser};
pub use refine::StandardRefiner;
pub use tokenizer::{tokenize, LineIndex, Token};
