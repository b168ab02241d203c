//! Prompts: release-summary, risk-review

use crate::error::Result;
use crate::protocol::handler::RequestContext;
use crate::protocol::{GetPromptResult, Prompt, PromptArgument, PromptMessage};
use crate::registry::PromptHandler;
use async_trait::async_trait;
use std::collections::HashMap;

fn argument(name: &str, description: &str, required: bool) -> PromptArgument {
    PromptArgument {
        name: name.into(),
        description: Some(description.into()),
        required: Some(required),
    }
}

pub struct ReleaseSummaryPrompt;

#[async_trait]
impl PromptHandler for ReleaseSummaryPrompt {
    fn definition(&self) -> Prompt {
        Prompt {
            name: "release-summary".into(),
            description: Some("Summarize a release for a given audience".into()),
            arguments: Some(vec![
                argument("version", "Version being released", true),
                argument(
                    "audience",
                    "Who the summary is for (default: users)",
                    false,
                ),
            ]),
        }
    }

    async fn get(
        &self,
        arguments: HashMap<String, String>,
        _ctx: &RequestContext,
    ) -> Result<GetPromptResult> {
        let version = arguments.get("version").map(String::as_str).unwrap_or_default();
        let audience = arguments
            .get("audience")
            .map(String::as_str)
            .unwrap_or("users");

        let text = format!(
            "Read the relicta://notes resource and write a short summary of release {} \
             for {}. Lead with breaking changes and required migration steps, then new \
             features, then fixes. Skip internal refactoring.",
            version, audience
        );

        Ok(GetPromptResult {
            description: Some(format!("Release summary for {}", version)),
            messages: vec![PromptMessage::user(text)],
        })
    }
}

pub struct RiskReviewPrompt;

#[async_trait]
impl PromptHandler for RiskReviewPrompt {
    fn definition(&self) -> Prompt {
        Prompt {
            name: "risk-review".into(),
            description: Some("Review the risk of the planned release before approval".into()),
            arguments: Some(vec![argument(
                "focus",
                "Area to pay extra attention to, e.g. 'database migrations'",
                false,
            )]),
        }
    }

    async fn get(
        &self,
        arguments: HashMap<String, String>,
        _ctx: &RequestContext,
    ) -> Result<GetPromptResult> {
        let mut text = String::from(
            "Call relicta.evaluate and review the result. Explain each risk factor, \
             list the required actions, and recommend whether to call relicta.approve.",
        );
        if let Some(focus) = arguments.get("focus").filter(|f| !f.trim().is_empty()) {
            text.push_str(&format!(" Pay particular attention to {}.", focus.trim()));
        }

        Ok(GetPromptResult {
            description: Some("Pre-approval risk review".into()),
            messages: vec![PromptMessage::user(text)],
        })
    }
}
