//! Agent-facing tools
//!
//! Tools take JSON parameters and always answer with a [`ToolResult`];
//! store errors are turned into failed results at this boundary.

pub mod builtin;
pub mod registry;
pub mod types;

pub use registry::{Tool, ToolRegistry};
pub use types::{PropertySchema, ToolContext, ToolDefinition, ToolInputSchema, ToolResult};

use std::sync::Arc;

/// Registry with every built-in tool registered
pub fn create_default_registry() -> ToolRegistry {
    let registry = ToolRegistry::new();
    registry.register(Arc::new(builtin::NotesTool::new()));
    registry
}
