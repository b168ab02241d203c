//! Resource registry keyed by URI.

use crate::error::{ConfigError, Result};
use crate::protocol::handler::RequestContext;
use crate::protocol::{ReadResourceResult, Resource};
use crate::registry::validate::validate_uri;
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use tracing::debug;

/// A readable resource.
///
/// Like tools, `Err` is for local faults only. A resource that exists but
/// cannot be produced right now answers with `ReadResourceResult::error`.
#[async_trait]
pub trait ResourceHandler: Send + Sync {
    fn definition(&self) -> Resource;
    async fn read(&self, ctx: &RequestContext) -> Result<ReadResourceResult>;
}

pub struct ResourceRegistry {
    resources: DashMap<String, Arc<dyn ResourceHandler>>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self {
            resources: DashMap::new(),
        }
    }

    pub fn register<T: ResourceHandler + 'static>(&self, resource: T) -> Result<()> {
        self.register_arc(Arc::new(resource))
    }

    pub fn register_arc(&self, resource: Arc<dyn ResourceHandler>) -> Result<()> {
        let uri = resource.definition().uri;
        validate_uri(&uri)?;

        match self.resources.entry(uri.clone()) {
            Entry::Occupied(_) => Err(ConfigError::InvalidValue {
                field: "resource".into(),
                message: format!("resource '{}' is already registered", uri).into(),
            }
            .into()),
            Entry::Vacant(slot) => {
                debug!("Registering resource: {}", uri);
                slot.insert(resource);
                Ok(())
            }
        }
    }

    pub fn get(&self, uri: &str) -> Option<Arc<dyn ResourceHandler>> {
        self.resources.get(uri).map(|r| Arc::clone(&*r))
    }

    /// Resource definitions sorted by URI.
    pub fn list(&self) -> Vec<Resource> {
        let mut resources: Vec<Resource> = self
            .resources
            .iter()
            .map(|r| r.value().definition())
            .collect();
        resources.sort_by(|a, b| a.uri.cmp(&b.uri));
        resources
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

impl Default for ResourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}
