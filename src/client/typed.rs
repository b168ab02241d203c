//! Typed call helpers: decode the first text item into a concrete shape.
//!
//! Failures are checked in a fixed order: no content items at all, then the
//! business failure flag, then decoding the text into the destination type.

use crate::client::{ClientTransport, McpClient};
use crate::error::{ClientError, ClientResult, ToolError};
use crate::protocol::types::{CallToolResult, ReadResourceResult};
use serde::de::DeserializeOwned;
use serde_json::Value;

const UNSPECIFIED_FAILURE: &str = "tool reported an error without a message";

pub fn decode_tool_result<R: DeserializeOwned>(result: &CallToolResult) -> ClientResult<R> {
    if result.content.is_empty() {
        return Err(ClientError::NoContent);
    }
    if result.is_error {
        let message = result.first_text().unwrap_or(UNSPECIFIED_FAILURE);
        return Err(ToolError::new(message).into());
    }
    let text = result.first_text().ok_or(ClientError::NoContent)?;
    Ok(serde_json::from_str(text)?)
}

pub fn decode_resource_result<R: DeserializeOwned>(result: &ReadResourceResult) -> ClientResult<R> {
    if result.contents.is_empty() {
        return Err(ClientError::NoContent);
    }
    if result.is_error {
        let message = result.first_text().unwrap_or(UNSPECIFIED_FAILURE);
        return Err(ToolError::new(message).into());
    }
    let text = result.first_text().ok_or(ClientError::NoContent)?;
    Ok(serde_json::from_str(text)?)
}

impl<T: ClientTransport> McpClient<T> {
    pub async fn call_tool_typed<R: DeserializeOwned>(
        &self,
        name: &str,
        arguments: Value,
    ) -> ClientResult<R> {
        let result = self.call_tool(name, arguments).await?;
        decode_tool_result(&result)
    }

    pub async fn read_resource_typed<R: DeserializeOwned>(&self, uri: &str) -> ClientResult<R> {
        let result = self.read_resource(uri).await?;
        decode_resource_result(&result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::types::{Content, ResourceContents};
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Status {
        version: String,
    }

    #[test]
    fn test_decodes_first_text() {
        let result = CallToolResult {
            content: vec![
                Content::blob("a://bin", b"\x00\x01", "application/octet-stream"),
                Content::text(r#"{"version":"1.2.3"}"#),
            ],
            is_error: false,
        };
        let status: Status = decode_tool_result(&result).unwrap();
        assert_eq!(status.version, "1.2.3");
    }

    #[test]
    fn test_failure_order() {
        let empty = CallToolResult {
            content: vec![],
            is_error: true,
        };
        assert!(matches!(
            decode_tool_result::<Status>(&empty),
            Err(ClientError::NoContent)
        ));

        let failed = CallToolResult::error("no active release");
        match decode_tool_result::<Status>(&failed) {
            Err(ClientError::Tool(e)) => assert_eq!(e.to_string(), "no active release"),
            other => panic!("expected tool error, got {other:?}"),
        }

        let garbage = CallToolResult::text("not json");
        assert!(matches!(
            decode_tool_result::<Status>(&garbage),
            Err(ClientError::Decode(_))
        ));

        let blob_only = CallToolResult {
            content: vec![Content::image(b"x", "image/png")],
            is_error: false,
        };
        assert!(matches!(
            decode_tool_result::<Status>(&blob_only),
            Err(ClientError::NoContent)
        ));
    }

    #[test]
    fn test_resource_decoding() {
        let result = ReadResourceResult::new(vec![ResourceContents::text(
            "relicta://status",
            r#"{"version":"2.0.0"}"#,
        )]);
        let status: Status = decode_resource_result(&result).unwrap();
        assert_eq!(status.version, "2.0.0");

        let failed = ReadResourceResult::error("relicta://status", "relicta adapter not configured");
        assert!(matches!(
            decode_resource_result::<Status>(&failed),
            Err(ClientError::Tool(_))
        ));
    }
}
