//! Session attached to a single page target.

use std::time::{Duration, Instant};

use serde_json::{json, Value};
use tracing::debug;

use super::client::CdpClient;
use super::error::CdpError;
use super::protocol::{MouseButton, MouseEventType};

/// Upper bound on `wait_for_load`.
const LOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// A flattened session on one page/target.
#[derive(Clone)]
pub struct PageSession {
    client: CdpClient,
    target_id: String,
    session_id: String,
}

impl PageSession {
    /// Attach to `target_id` and enable the domains the agent uses.
    pub async fn attach(client: &CdpClient, target_id: &str) -> Result<Self, CdpError> {
        let session_id = client.attach(target_id).await?;
        let session = Self {
            client: client.clone(),
            target_id: target_id.to_string(),
            session_id,
        };
        session.enable_domains().await?;
        Ok(session)
    }

    pub fn target_id(&self) -> &str {
        &self.target_id
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Send a command to this page.
    pub async fn call(&self, method: &str, params: Option<Value>) -> Result<Value, CdpError> {
        self.client.call(method, params, Some(&self.session_id)).await
    }

    async fn enable_domains(&self) -> Result<(), CdpError> {
        self.call("Page.enable", None).await?;
        self.call("Runtime.enable", None).await?;

        debug!("Enabled CDP domains for session {}", self.session_id);
        Ok(())
    }

    /// Navigate and wait for the load to complete.
    pub async fn navigate(&self, url: &str) -> Result<(), CdpError> {
        let result = self
            .call("Page.navigate", Some(json!({"url": url})))
            .await?;

        if let Some(error) = result.get("errorText").and_then(|e| e.as_str()) {
            return Err(CdpError::NavigationFailed(format!("{}: {}", url, error)));
        }

        self.wait_for_load().await?;
        debug!("Navigated to {}", url);
        Ok(())
    }

    /// Wait until `document.readyState` is `complete`.
    pub async fn wait_for_load(&self) -> Result<(), CdpError> {
        let start = Instant::now();

        loop {
            // The document may be swapped out mid-navigation
            let state = match self.evaluate("document.readyState").await {
                Ok(value) => value,
                Err(CdpError::JavaScript(_)) | Err(CdpError::Protocol { .. }) => Value::Null,
                Err(e) => return Err(e),
            };

            if state.as_str() == Some("complete") {
                return Ok(());
            }

            if start.elapsed() > LOAD_TIMEOUT {
                return Err(CdpError::Timeout(format!(
                    "Page {} did not finish loading",
                    self.target_id
                )));
            }

            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    /// Evaluate an expression, awaiting promises, and return its JSON value.
    pub async fn evaluate(&self, expression: &str) -> Result<Value, CdpError> {
        let result = self
            .call(
                "Runtime.evaluate",
                Some(json!({
                    "expression": expression,
                    "returnByValue": true,
                    "awaitPromise": true,
                })),
            )
            .await?;

        if let Some(exception) = result.get("exceptionDetails") {
            let text = exception["exception"]["description"]
                .as_str()
                .or_else(|| exception["text"].as_str())
                .unwrap_or("Unknown error");
            return Err(CdpError::JavaScript(text.to_string()));
        }

        Ok(result["result"]["value"].clone())
    }

    /// Trusted left click at viewport coordinates.
    pub async fn click_at(&self, x: f64, y: f64) -> Result<(), CdpError> {
        self.call(
            "Input.dispatchMouseEvent",
            Some(json!({
                "type": MouseEventType::MouseMoved,
                "x": x,
                "y": y,
                "button": MouseButton::None,
            })),
        )
        .await?;

        for kind in [MouseEventType::MousePressed, MouseEventType::MouseReleased] {
            self.call(
                "Input.dispatchMouseEvent",
                Some(json!({
                    "type": kind,
                    "x": x,
                    "y": y,
                    "button": MouseButton::Left,
                    "clickCount": 1,
                })),
            )
            .await?;
        }

        debug!("Clicked at ({}, {})", x, y);
        Ok(())
    }

    /// Insert text at the focused element as trusted input.
    pub async fn insert_text(&self, text: &str) -> Result<(), CdpError> {
        self.call("Input.insertText", Some(json!({"text": text})))
            .await?;
        Ok(())
    }

    /// Close this page's target.
    pub async fn close(&self) -> Result<(), CdpError> {
        self.client.close_target(&self.target_id).await
    }
}
