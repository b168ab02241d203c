//! Named handler registries consulted at dispatch time.
//!
//! Registries are populated at construction and may be extended later;
//! each uses its own sharded locks, separate from any transport lock.

pub mod prompt;
pub mod resource;
pub mod tool;
pub mod validate;

pub use prompt::{PromptHandler, PromptRegistry};
pub use resource::{ResourceHandler, ResourceRegistry};
pub use tool::{ToolHandler, ToolRegistry};

/// The three lookup tables served by one dispatcher.
#[derive(Default)]
pub struct Registry {
    pub tools: ToolRegistry,
    pub resources: ResourceRegistry,
    pub prompts: PromptRegistry,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }
}
