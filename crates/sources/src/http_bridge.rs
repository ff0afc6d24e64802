//! Turns HTTP GET requests into messages.
//!
//! `GET /?address=/ch/01/mix/on&args[]=int,1&args[]=string,main` emits
//! `/ch/01/mix/on` with two arguments. Each `args[]` value is `type,value`,
//! split at the first comma.

use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use oscbridge_core::config::HttpBridge;
use oscbridge_core::{Argument, Message};

use crate::error::SourceError;
use crate::source::{report_fatal, RunLoop, Source, SourceChannels};

// ── Request parsing ──────────────────────────────────────────────────

/// Build a message from decoded query pairs.
///
/// The error is the plain-text reason sent back with a 400.
pub fn parse_query(pairs: &[(String, String)]) -> Result<Message, String> {
    let address = pairs
        .iter()
        .find(|(key, _)| key == "address")
        .map(|(_, value)| value.as_str())
        .unwrap_or_default();
    if address.is_empty() {
        return Err(format!("invalid address: '{}'", address));
    }

    let arguments = pairs
        .iter()
        .filter(|(key, _)| key == "args[]")
        .enumerate()
        .map(|(i, (_, raw))| {
            raw.split_once(',')
                .map(|(kind, value)| Argument::new(kind, value))
                .ok_or_else(|| {
                    format!("invalid request: call argument[{}] does not contain a comma", i)
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Message::new(address, arguments))
}

// ── Handler ──────────────────────────────────────────────────────────

#[derive(Clone)]
struct BridgeState {
    name: Arc<str>,
    debug: bool,
    events: mpsc::Sender<Message>,
}

async fn root(State(state): State<BridgeState>, Query(pairs): Query<Vec<(String, String)>>) -> Response {
    let message = match parse_query(&pairs) {
        Ok(message) => message,
        Err(reason) => {
            if state.debug {
                debug!(source = %state.name, %reason, "Rejected request");
            }
            return (
                StatusCode::BAD_REQUEST,
                [(header::CONTENT_TYPE, "text/plain")],
                reason,
            )
                .into_response();
        }
    };

    if state.debug {
        debug!(source = %state.name, %message, "Received");
    }
    if state.events.send(message).await.is_err() {
        warn!(source = %state.name, "Event channel closed, dropping request");
        return (StatusCode::SERVICE_UNAVAILABLE, "event channel closed").into_response();
    }
    "OK".into_response()
}

pub fn router(name: &str, debug: bool, events: mpsc::Sender<Message>) -> Router {
    Router::new().route("/", get(root)).with_state(BridgeState {
        name: Arc::from(name),
        debug,
        events,
    })
}

// ── Source ───────────────────────────────────────────────────────────

pub struct HttpBridgeSource {
    config: HttpBridge,
    debug: bool,
    local_addr: OnceLock<SocketAddr>,
    channels: SourceChannels,
    run_loop: RunLoop,
}

impl HttpBridgeSource {
    pub fn new(config: HttpBridge, debug: bool) -> Self {
        Self {
            config,
            debug,
            local_addr: OnceLock::new(),
            channels: SourceChannels::new(),
            run_loop: RunLoop::new(),
        }
    }

    /// The bound address, once started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr.get().copied()
    }
}

#[async_trait]
impl Source for HttpBridgeSource {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn start(&self) -> Result<(), SourceError> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| SourceError::Bind {
                name: self.config.name.clone(),
                addr: addr.clone(),
                source,
            })?;
        let bound = listener.local_addr().map_err(|source| SourceError::Bind {
            name: self.config.name.clone(),
            addr,
            source,
        })?;
        // A restarted source keeps reporting its first address.
        let _ = self.local_addr.set(bound);
        info!(source = %self.config.name, addr = %bound, "Starting HTTP bridge");

        let app = router(&self.config.name, self.debug, self.channels.event_sender());
        let fatal = self.channels.fatal_sender();
        let name = self.config.name.clone();

        self.run_loop.spawn(&self.config.name, move |shutdown| async move {
            let served = axum::serve(listener, app)
                .with_graceful_shutdown(async move { shutdown.notified().await })
                .await;
            if let Err(source) = served {
                report_fatal(&fatal, SourceError::Serve { name, addr: bound, source });
            }
        })
    }

    async fn stop(&self) {
        self.run_loop.stop(&self.config.name).await;
    }

    fn take_events(&self) -> Option<mpsc::Receiver<Message>> {
        self.channels.take_events()
    }

    fn take_fatal_errors(&self) -> Option<mpsc::Receiver<SourceError>> {
        self.channels.take_fatal_errors()
    }

    async fn send(&self, _message: Message) -> Result<(), SourceError> {
        Err(SourceError::SendUnsupported {
            name: self.config.name.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(raw: &[(&str, &str)]) -> Vec<(String, String)> {
        raw.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn parses_address_and_arguments() {
        let message = parse_query(&pairs(&[
            ("address", "/ch/01/mix/on"),
            ("args[]", "int,1"),
            ("args[]", "string,a,b"),
        ]))
        .unwrap();
        assert_eq!(
            message,
            Message::new(
                "/ch/01/mix/on",
                vec![Argument::int(1), Argument::string("a,b")]
            )
        );
    }

    #[test]
    fn rejects_missing_address() {
        assert_eq!(parse_query(&[]).unwrap_err(), "invalid address: ''");
        assert_eq!(
            parse_query(&pairs(&[("address", "")])).unwrap_err(),
            "invalid address: ''"
        );
    }

    #[test]
    fn rejects_argument_without_comma() {
        let err = parse_query(&pairs(&[
            ("address", "/a"),
            ("args[]", "int,1"),
            ("args[]", "oops"),
        ]))
        .unwrap_err();
        assert_eq!(err, "invalid request: call argument[1] does not contain a comma");
    }
}
