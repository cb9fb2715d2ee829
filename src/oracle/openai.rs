//! OpenAI-compatible chat completions oracle

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::DecisionOracle;
use crate::config::OracleSettings;
use crate::{Error, Result};

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// Sends the brief as a single user message
pub struct OpenAiOracle {
    client: reqwest::Client,
    url: String,
    model: String,
    temperature: Option<f32>,
    api_key: SecretString,
}

impl OpenAiOracle {
    pub fn new(settings: &OracleSettings, api_key: SecretString) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: format!("{}/chat/completions", settings.api_base.trim_end_matches('/')),
            model: settings.model.clone(),
            temperature: settings.temperature,
            api_key,
        }
    }
}

#[async_trait]
impl DecisionOracle for OpenAiOracle {
    async fn ask(&self, brief: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: brief,
            }],
            temperature: self.temperature,
        };

        debug!(model = %self.model, "Asking oracle");
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Upstream(format!("Oracle returned {}: {}", status, body)));
        }

        let parsed: ChatResponse = response.json().await?;
        // An empty answer still has to go through decision parsing
        let answer = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        debug!(%answer, "Oracle answered");
        Ok(answer)
    }
}
