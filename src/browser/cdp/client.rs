//! DevTools WebSocket client.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, trace, warn};

use super::error::CdpError;
use super::protocol::{BrowserVersion, CdpMessage, CdpRequest, TargetInfo};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;
type Pending = Arc<Mutex<HashMap<u64, oneshot::Sender<Result<Value, CdpError>>>>>;

/// Upper bound on a single command round trip.
const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Buffered `Target.targetCreated` notifications per subscriber.
const TARGET_EVENT_CAPACITY: usize = 64;

struct Inner {
    browser_ws_url: String,
    ws_tx: tokio::sync::Mutex<WsSink>,
    request_id: AtomicU64,
    pending: Pending,
    targets: broadcast::Sender<TargetInfo>,
    recv_task: tokio::task::JoinHandle<()>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.recv_task.abort();
    }
}

/// Browser-level DevTools connection.
///
/// Cheap to clone; all clones share one WebSocket.
#[derive(Clone)]
pub struct CdpClient {
    inner: Arc<Inner>,
}

impl CdpClient {
    /// Connect to the browser behind a DevTools HTTP endpoint
    /// (e.g. `http://127.0.0.1:9223`).
    pub async fn connect(endpoint: &str) -> Result<Self, CdpError> {
        let http_endpoint = endpoint.trim_end_matches('/');
        let version_url = format!("{}/json/version", http_endpoint);
        debug!("Fetching browser version from {}", version_url);

        let version: BrowserVersion = reqwest::get(&version_url)
            .await
            .map_err(|e| CdpError::BrowserNotAvailable(format!("{}: {}", endpoint, e)))?
            .json()
            .await
            .map_err(|e| CdpError::BrowserNotAvailable(format!("{}: {}", endpoint, e)))?;

        debug!(browser = %version.browser, protocol = %version.protocol_version, "Browser reachable");

        let browser_ws_url = version.web_socket_debugger_url;
        let (ws_stream, _) = tokio_tungstenite::connect_async(browser_ws_url.as_str())
            .await
            .map_err(|e| CdpError::ConnectionFailed(format!("WebSocket: {}", e)))?;

        let (ws_sink, ws_source) = ws_stream.split();
        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let (targets, _) = broadcast::channel(TARGET_EVENT_CAPACITY);

        let recv_task = {
            let pending = pending.clone();
            let targets = targets.clone();
            tokio::spawn(async move {
                Self::receive_loop(ws_source, pending, targets).await;
            })
        };

        debug!("DevTools client connected to {}", browser_ws_url);

        Ok(Self {
            inner: Arc::new(Inner {
                browser_ws_url,
                ws_tx: tokio::sync::Mutex::new(ws_sink),
                request_id: AtomicU64::new(1),
                pending,
                targets,
                recv_task,
            }),
        })
    }

    async fn receive_loop(
        mut ws_source: WsSource,
        pending: Pending,
        targets: broadcast::Sender<TargetInfo>,
    ) {
        while let Some(msg) = ws_source.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    trace!("CDP recv: {}", text);
                    match serde_json::from_str::<CdpMessage>(&text) {
                        Ok(msg) => Self::dispatch(msg, &pending, &targets),
                        Err(e) => warn!("Failed to parse CDP message: {}", e),
                    }
                }
                Ok(Message::Close(_)) => {
                    debug!("WebSocket closed");
                    break;
                }
                Err(e) => {
                    error!("WebSocket error: {}", e);
                    break;
                }
                _ => {}
            }
        }

        // Fail everything still in flight
        for (_, tx) in pending.lock().drain() {
            let _ = tx.send(Err(CdpError::SessionClosed));
        }
    }

    fn dispatch(msg: CdpMessage, pending: &Pending, targets: &broadcast::Sender<TargetInfo>) {
        if let Some(id) = msg.id {
            trace!(id, session = ?msg.session_id, failed = msg.error.is_some(), "CDP response");
            if let Some(tx) = pending.lock().remove(&id) {
                let result = match msg.error {
                    Some(error) => Err(CdpError::Protocol {
                        code: error.code,
                        message: error.message,
                    }),
                    None => Ok(msg.result.unwrap_or(Value::Null)),
                };
                let _ = tx.send(result);
            }
            return;
        }

        if msg.method.as_deref() == Some("Target.targetCreated") {
            let info = msg
                .params
                .and_then(|p| serde_json::from_value::<TargetInfo>(p["targetInfo"].clone()).ok());
            if let Some(info) = info {
                trace!(target_id = %info.target_id, kind = %info.target_type, "Target created");
                // No subscribers is fine
                let _ = targets.send(info);
            }
        }
    }

    /// Send a command and wait for its response.
    pub async fn call(
        &self,
        method: &str,
        params: Option<Value>,
        session_id: Option<&str>,
    ) -> Result<Value, CdpError> {
        let id = self.inner.request_id.fetch_add(1, Ordering::SeqCst);

        let request = CdpRequest {
            id,
            method: method.to_string(),
            params,
            session_id: session_id.map(|s| s.to_string()),
        };

        let json = serde_json::to_string(&request)?;
        trace!("CDP send: {}", json);

        let (tx, rx) = oneshot::channel();
        self.inner.pending.lock().insert(id, tx);

        {
            let mut ws = self.inner.ws_tx.lock().await;
            if let Err(e) = ws.send(Message::Text(json.into())).await {
                self.inner.pending.lock().remove(&id);
                return Err(e.into());
            }
        }

        match tokio::time::timeout(COMMAND_TIMEOUT, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(CdpError::SessionClosed),
            Err(_) => {
                self.inner.pending.lock().remove(&id);
                Err(CdpError::Timeout(format!("Request {} timed out", method)))
            }
        }
    }

    /// Subscribe to targets created from now on.
    pub fn subscribe_targets(&self) -> broadcast::Receiver<TargetInfo> {
        self.inner.targets.subscribe()
    }

    pub fn browser_ws_url(&self) -> &str {
        &self.inner.browser_ws_url
    }

    /// Turn on `Target.targetCreated` notifications.
    pub async fn discover_targets(&self) -> Result<(), CdpError> {
        self.call("Target.setDiscoverTargets", Some(json!({"discover": true})), None)
            .await?;
        Ok(())
    }

    pub async fn get_targets(&self) -> Result<Vec<TargetInfo>, CdpError> {
        let result = self.call("Target.getTargets", None, None).await?;
        let targets: Vec<TargetInfo> = serde_json::from_value(result["targetInfos"].clone())?;
        Ok(targets)
    }

    /// Open a blank page inside a browsing context; returns its target id.
    pub async fn create_target(&self, browser_context_id: &str) -> Result<String, CdpError> {
        let result = self
            .call(
                "Target.createTarget",
                Some(json!({
                    "url": "about:blank",
                    "browserContextId": browser_context_id,
                })),
                None,
            )
            .await?;

        result["targetId"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| CdpError::InvalidResponse("Missing targetId".to_string()))
    }

    /// Attach with a flattened session; returns the session id.
    pub async fn attach(&self, target_id: &str) -> Result<String, CdpError> {
        let result = self
            .call(
                "Target.attachToTarget",
                Some(json!({
                    "targetId": target_id,
                    "flatten": true
                })),
                None,
            )
            .await?;

        result["sessionId"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| CdpError::InvalidResponse("Missing sessionId".to_string()))
    }

    pub async fn close_target(&self, target_id: &str) -> Result<(), CdpError> {
        self.call(
            "Target.closeTarget",
            Some(json!({"targetId": target_id})),
            None,
        )
        .await?;
        Ok(())
    }
}
