//! Prompt registry.

use crate::error::{ConfigError, Result};
use crate::protocol::handler::RequestContext;
use crate::protocol::{GetPromptResult, Prompt};
use crate::registry::validate::validate_name;
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// A parameterized prompt template.
#[async_trait]
pub trait PromptHandler: Send + Sync {
    fn definition(&self) -> Prompt;
    async fn get(
        &self,
        arguments: HashMap<String, String>,
        ctx: &RequestContext,
    ) -> Result<GetPromptResult>;
}

pub struct PromptRegistry {
    prompts: DashMap<String, Arc<dyn PromptHandler>>,
}

impl PromptRegistry {
    pub fn new() -> Self {
        Self {
            prompts: DashMap::new(),
        }
    }

    pub fn register<T: PromptHandler + 'static>(&self, prompt: T) -> Result<()> {
        self.register_arc(Arc::new(prompt))
    }

    pub fn register_arc(&self, prompt: Arc<dyn PromptHandler>) -> Result<()> {
        let name = prompt.definition().name;
        validate_name("prompt", &name)?;

        match self.prompts.entry(name.clone()) {
            Entry::Occupied(_) => Err(ConfigError::InvalidValue {
                field: "prompt".into(),
                message: format!("prompt '{}' is already registered", name).into(),
            }
            .into()),
            Entry::Vacant(slot) => {
                debug!("Registering prompt: {}", name);
                slot.insert(prompt);
                Ok(())
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn PromptHandler>> {
        self.prompts.get(name).map(|r| Arc::clone(&*r))
    }

    pub fn list(&self) -> Vec<Prompt> {
        let mut prompts: Vec<Prompt> = self.prompts.iter().map(|r| r.value().definition()).collect();
        prompts.sort_by(|a, b| a.name.cmp(&b.name));
        prompts
    }

    pub fn len(&self) -> usize {
        self.prompts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prompts.is_empty()
    }
}

impl Default for PromptRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Names of required arguments missing from `arguments`, in declaration order.
pub fn missing_arguments(prompt: &Prompt, arguments: &HashMap<String, String>) -> Vec<String> {
    prompt
        .arguments
        .iter()
        .flatten()
        .filter(|a| a.required == Some(true) && !arguments.contains_key(&a.name))
        .map(|a| a.name.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{PromptArgument, PromptMessage};

    struct Greeting;

    #[async_trait]
    impl PromptHandler for Greeting {
        fn definition(&self) -> Prompt {
            Prompt {
                name: "greeting".into(),
                description: None,
                arguments: Some(vec![
                    PromptArgument {
                        name: "who".into(),
                        description: None,
                        required: Some(true),
                    },
                    PromptArgument {
                        name: "tone".into(),
                        description: None,
                        required: None,
                    },
                ]),
            }
        }

        async fn get(
            &self,
            arguments: HashMap<String, String>,
            _ctx: &RequestContext,
        ) -> Result<GetPromptResult> {
            Ok(GetPromptResult {
                description: None,
                messages: vec![PromptMessage::user(format!("hi {}", arguments["who"]))],
            })
        }
    }

    #[test]
    fn test_missing_arguments() {
        let prompt = Greeting.definition();
        assert_eq!(missing_arguments(&prompt, &HashMap::new()), vec!["who"]);

        let args = HashMap::from([("who".to_string(), "ana".to_string())]);
        assert!(missing_arguments(&prompt, &args).is_empty());
    }

    #[tokio::test]
    async fn test_register_and_get() {
        let registry = PromptRegistry::new();
        registry.register(Greeting).unwrap();
        assert!(registry.register(Greeting).is_err());

        let args = HashMap::from([("who".to_string(), "ana".to_string())]);
        let result = registry
            .get("greeting")
            .unwrap()
            .get(args, &RequestContext::detached())
            .await
            .unwrap();
        assert_eq!(result.messages[0].content.as_text(), Some("hi ana"));
    }
}
