//! Search backends and result shaping.

pub mod lexical;
pub mod limit;

pub use lexical::{LexicalEntry, LexicalIndex};
pub use limit::apply_dynamic_limit;

/// The backend that served (or will serve) a `discover` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchBackend {
    Lexical,
    Vector,
}
