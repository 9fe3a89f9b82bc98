//! Smart proxy surface for one namespace binding.

pub mod smart;

pub use smart::{SmartProxy, DISCOVER_TOOL_NAME, EXECUTE_TOOL_NAME};
