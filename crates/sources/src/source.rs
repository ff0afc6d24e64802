//! Source trait and the channel/lifecycle plumbing shared by implementations.

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tracing::warn;

use oscbridge_core::Message;

use crate::error::SourceError;

/// Buffered events per source before producers wait on the listener.
const EVENT_BUFFER: usize = 256;

/// How long `stop` waits for a run loop before aborting it.
const STOP_TIMEOUT: Duration = Duration::from_secs(2);

// ── Source trait ─────────────────────────────────────────────────────

/// A producer of addressed messages.
#[async_trait]
pub trait Source: Send + Sync {
    /// Configured source name, unique across the bridge.
    fn name(&self) -> &str;

    /// Begin producing events. Returns once the source is running.
    async fn start(&self) -> Result<(), SourceError>;

    /// Stop producing events and release resources.
    async fn stop(&self);

    /// The event stream. Only the first caller gets it.
    fn take_events(&self) -> Option<mpsc::Receiver<Message>>;

    /// Runtime failures that should restart the bridge. Only the first caller gets it.
    fn take_fatal_errors(&self) -> Option<mpsc::Receiver<SourceError>>;

    /// Push a message out through this source.
    async fn send(&self, message: Message) -> Result<(), SourceError>;
}

/// A started or startable source together with the prefix its messages get.
#[derive(Clone)]
pub struct SourceHandle {
    pub name: String,
    pub prefix: String,
    pub source: Arc<dyn Source>,
}

impl SourceHandle {
    pub fn new(name: impl Into<String>, prefix: impl Into<String>, source: Arc<dyn Source>) -> Self {
        Self {
            name: name.into(),
            prefix: prefix.into(),
            source,
        }
    }
}

impl std::fmt::Debug for SourceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceHandle")
            .field("name", &self.name)
            .field("prefix", &self.prefix)
            .finish()
    }
}

// ── Channels ─────────────────────────────────────────────────────────

/// Event and fatal-error channels owned by a source.
pub struct SourceChannels {
    events_tx: mpsc::Sender<Message>,
    events_rx: Mutex<Option<mpsc::Receiver<Message>>>,
    fatal_tx: mpsc::Sender<SourceError>,
    fatal_rx: Mutex<Option<mpsc::Receiver<SourceError>>>,
}

impl Default for SourceChannels {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceChannels {
    pub fn new() -> Self {
        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        let (fatal_tx, fatal_rx) = mpsc::channel(1);
        Self {
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
            fatal_tx,
            fatal_rx: Mutex::new(Some(fatal_rx)),
        }
    }

    /// A sender for run loops to emit events through.
    pub fn event_sender(&self) -> mpsc::Sender<Message> {
        self.events_tx.clone()
    }

    pub fn fatal_sender(&self) -> mpsc::Sender<SourceError> {
        self.fatal_tx.clone()
    }

    pub fn take_events(&self) -> Option<mpsc::Receiver<Message>> {
        self.events_rx.lock().expect("events lock poisoned").take()
    }

    pub fn take_fatal_errors(&self) -> Option<mpsc::Receiver<SourceError>> {
        self.fatal_rx.lock().expect("fatal lock poisoned").take()
    }
}

/// Report a fatal error without waiting. Only the first report matters.
pub fn report_fatal(fatal: &mpsc::Sender<SourceError>, err: SourceError) {
    if let Err(e) = fatal.try_send(err) {
        warn!(error = %e, "Dropping fatal source error, one is already pending");
    }
}

// ── Run loop ─────────────────────────────────────────────────────────

/// A single background task with a shutdown signal.
#[derive(Default)]
pub struct RunLoop {
    shutdown: Arc<Notify>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl RunLoop {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .expect("run loop lock poisoned")
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Spawn `run` with the shutdown signal it must watch.
    pub fn spawn<F, Fut>(&self, name: &str, run: F) -> Result<(), SourceError>
    where
        F: FnOnce(Arc<Notify>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut task = self.task.lock().expect("run loop lock poisoned");
        if task.as_ref().is_some_and(|t| !t.is_finished()) {
            return Err(SourceError::AlreadyStarted {
                name: name.to_string(),
            });
        }
        *task = Some(tokio::spawn(run(Arc::clone(&self.shutdown))));
        Ok(())
    }

    /// Signal shutdown and wait for the task, aborting it if it lingers.
    pub async fn stop(&self, name: &str) {
        let task = self.task.lock().expect("run loop lock poisoned").take();
        let Some(mut task) = task else {
            return;
        };

        self.shutdown.notify_one();
        if tokio::time::timeout(STOP_TIMEOUT, &mut task).await.is_err() {
            warn!(source = %name, "Source did not stop in time, aborting");
            task.abort();
        }
    }
}
