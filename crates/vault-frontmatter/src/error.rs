//! Errors raised inside the codec. They never cross
//! [`FrontmatterCodec`](crate::FrontmatterCodec); callers of the free
//! functions see them directly.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FrontmatterError {
    #[error("line {line}: expected `key: value` or `- item`, found `{text}`")]
    MalformedLine { line: usize, text: String },
    #[error("line {line}: list item without a preceding key")]
    OrphanListItem { line: usize },
    #[error("line {line}: list item under `{key}`, which is not a list")]
    NotAList { line: usize, key: String },
    #[error("line {line}: unexpected indentation")]
    UnexpectedIndent { line: usize },
    #[error("line {line}: unterminated quoted string")]
    UnterminatedQuote { line: usize },
    #[error("line {line}: unbalanced brackets in flow list")]
    UnbalancedBrackets { line: usize },
    #[error("key `{0}` cannot be written as frontmatter")]
    InvalidKey(String),
    #[error("value for `{0}` spans multiple lines")]
    MultilineValue(String),
    #[error("value for `{0}` would not read back unchanged")]
    UnrepresentableValue(String),
    #[error("value for `{0}` nests a map inside a list")]
    UnsupportedValue(String),
}
