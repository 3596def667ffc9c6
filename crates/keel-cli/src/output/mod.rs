//! Output formatters for `keel check`

pub mod json;
pub mod pretty;

/// A file that produced no diagnostics list: unreadable, not a declaration
/// tree, or aborted by a fatal analysis error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFailure {
    pub file: String,
    pub message: String,
}
