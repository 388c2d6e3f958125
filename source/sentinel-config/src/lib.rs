//! Hierarchical INI configuration engine: section inheritance, include
//! graphs (files, directories, globs), value composition (`=`/`+=`), and
//! round-trippable serialization that preserves comments, blank lines and
//! line endings. See spec.md §3/§4.1.

pub mod document;
pub mod entry;
pub mod error;
pub mod includes;
pub mod lookup;
pub mod value;

pub use document::{Document, Section};
pub use entry::{AssignOp, Entry};
pub use error::{ConfigError, Result};
pub use includes::load_with_includes;
pub use lookup::ConfigTree;

/// Parses `path`, resolving its `[/includes]` section, and returns the
/// ready-to-query [`ConfigTree`]. This is the single entry point most
/// callers need.
pub fn load(path: &std::path::Path) -> Result<ConfigTree> {
    let document = load_with_includes(path)?;
    Ok(ConfigTree::new(document))
}
