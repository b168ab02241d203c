//! Resources: relicta://status, relicta://notes

use crate::error::Result;
use crate::protocol::handler::RequestContext;
use crate::protocol::{ReadResourceResult, Resource, ResourceContents};
use crate::registry::ResourceHandler;
use crate::tools::AdapterSlot;
use async_trait::async_trait;
use tracing::instrument;

pub const STATUS_URI: &str = "relicta://status";
pub const NOTES_URI: &str = "relicta://notes";

pub struct StatusResource {
    adapter: AdapterSlot,
}

impl StatusResource {
    pub fn new(adapter: AdapterSlot) -> Self {
        Self { adapter }
    }
}

#[async_trait]
impl ResourceHandler for StatusResource {
    fn definition(&self) -> Resource {
        Resource {
            uri: STATUS_URI.into(),
            name: "Release status".into(),
            description: Some("State of the current release as JSON".into()),
            mime_type: Some("application/json".into()),
        }
    }

    #[instrument(skip(self, _ctx), fields(resource = STATUS_URI))]
    async fn read(&self, _ctx: &RequestContext) -> Result<ReadResourceResult> {
        let Some(adapter) = self.adapter.adapter() else {
            return Ok(ReadResourceResult::error(
                STATUS_URI,
                "relicta adapter not configured",
            ));
        };

        match adapter.status().await {
            Ok(status) => Ok(ReadResourceResult::new(vec![ResourceContents::json(
                STATUS_URI, &status,
            )?])),
            Err(e) => Ok(ReadResourceResult::error(STATUS_URI, e.to_string())),
        }
    }
}

pub struct NotesResource {
    adapter: AdapterSlot,
}

impl NotesResource {
    pub fn new(adapter: AdapterSlot) -> Self {
        Self { adapter }
    }
}

#[async_trait]
impl ResourceHandler for NotesResource {
    fn definition(&self) -> Resource {
        Resource {
            uri: NOTES_URI.into(),
            name: "Release notes".into(),
            description: Some("Release notes generated for the current release".into()),
            mime_type: Some("text/markdown".into()),
        }
    }

    #[instrument(skip(self, _ctx), fields(resource = NOTES_URI))]
    async fn read(&self, _ctx: &RequestContext) -> Result<ReadResourceResult> {
        let Some(adapter) = self.adapter.adapter() else {
            return Ok(ReadResourceResult::error(
                NOTES_URI,
                "relicta adapter not configured",
            ));
        };

        let status = match adapter.status().await {
            Ok(status) => status,
            Err(e) => return Ok(ReadResourceResult::error(NOTES_URI, e.to_string())),
        };

        Ok(match status.notes {
            Some(notes) => ReadResourceResult::new(vec![ResourceContents::text(NOTES_URI, notes)]),
            None => ReadResourceResult::error(
                NOTES_URI,
                "no release notes yet; run relicta.notes first",
            ),
        })
    }
}
