//! Pattern compiler and formatter (spec §4.6.1, §4.6.2): turns a format
//! string into a reusable token list, then renders that list against a
//! single log record.

pub mod compiler;
pub mod format;
pub mod token;

pub use compiler::compile;
pub use format::{render, FormatInput};
pub use token::Token;

/// A compiled pattern, ready to format records repeatedly without
/// re-parsing the format string.
#[derive(Debug, Clone)]
pub struct Pattern {
    tokens: Vec<Token>,
}

impl Pattern {
    pub fn compile(spec: &str) -> crate::common::CmResult<Self> {
        Ok(Self { tokens: compiler::compile(spec)? })
    }

    pub fn render(&self, input: &FormatInput<'_>) -> String {
        format::render(&self.tokens, input)
    }
}

/// `%d %P-[%-10.10t] (%-15.15F:%04L) [%-5p] %c - %m%ex%n` (spec §6).
pub const DEFAULT_PATTERN: &str = "%d %P-[%-10.10t] (%-15.15F:%04L) [%-5p] %c - %m%ex%n";
