//! Fans events from every source into the reactor.

use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use oscbridge_sources::SourceHandle;

use crate::reactor::Reactor;

pub struct Listener {
    reactor: Arc<Reactor>,
    debug: bool,
    stop_tx: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Listener {
    pub fn new(reactor: Arc<Reactor>, debug: bool) -> Self {
        let (stop_tx, _) = watch::channel(false);
        Self {
            reactor,
            debug,
            stop_tx,
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Forward each source's events, prefixed, to the reactor.
    ///
    /// A source whose event stream was already taken is skipped.
    pub fn start(&self, handles: &[SourceHandle]) {
        let mut tasks = self.tasks.lock().expect("listener lock poisoned");
        for handle in handles {
            let Some(mut events) = handle.source.take_events() else {
                warn!(source = %handle.name, "Event stream already taken, not listening");
                continue;
            };

            let reactor = Arc::clone(&self.reactor);
            let mut stop = self.stop_tx.subscribe();
            let name = handle.name.clone();
            let prefix = handle.prefix.clone();
            let verbose = self.debug;

            info!(source = %name, prefix = %prefix, "Listening");
            tasks.push(tokio::spawn(async move {
                loop {
                    tokio::select! {
                        event = events.recv() => match event {
                            Some(message) => {
                                let message = message.with_prefix(&prefix);
                                if verbose {
                                    debug!(source = %name, %message, "Received");
                                }
                                reactor.update_record(message);
                            }
                            None => {
                                info!(source = %name, "Event stream closed");
                                return;
                            }
                        },
                        _ = stop.changed() => return,
                    }
                }
            }));
        }
    }

    /// Stop accepting events. Evaluation passes already running continue.
    pub async fn stop(&self) {
        self.stop_tx.send_replace(true);
        let tasks: Vec<_> = self.tasks.lock().expect("listener lock poisoned").drain(..).collect();
        for task in tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "Listener task ended abnormally");
            }
        }
        info!("Listener stopped");
    }
}
