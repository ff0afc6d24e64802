//! Replays configured message groups in a loop, standing in for a real console.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use oscbridge_core::config::DummyConnection;
use oscbridge_core::Message;

use crate::error::SourceError;
use crate::source::{RunLoop, Source, SourceChannels};

/// Delay before the first group is emitted.
const WARMUP: Duration = Duration::from_secs(1);

pub struct DummySource {
    config: DummyConnection,
    debug: bool,
    warmup: Duration,
    channels: SourceChannels,
    run_loop: RunLoop,
}

impl DummySource {
    pub fn new(config: DummyConnection, debug: bool) -> Self {
        Self {
            config,
            debug,
            warmup: WARMUP,
            channels: SourceChannels::new(),
            run_loop: RunLoop::new(),
        }
    }

    /// Override the initial delay.
    pub fn with_warmup(mut self, warmup: Duration) -> Self {
        self.warmup = warmup;
        self
    }
}

#[async_trait]
impl Source for DummySource {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn start(&self) -> Result<(), SourceError> {
        if self.config.message_groups.is_empty() {
            warn!(source = %self.config.name, "No message_groups were specified!");
            return Ok(());
        }

        let name = self.config.name.clone();
        let groups = self.config.message_groups.clone();
        let period = Duration::from_secs(self.config.iteration_speed_secs.max(1));
        let warmup = self.warmup;
        let events = self.channels.event_sender();
        let debug = self.debug;

        self.run_loop.spawn(&self.config.name, move |shutdown| async move {
            tokio::select! {
                _ = tokio::time::sleep(warmup) => {}
                _ = shutdown.notified() => return,
            }

            for group in groups.iter().cycle() {
                info!(source = %name, group = %group.name, comment = %group.comment, "Simulating console state");
                for command in &group.osc_commands {
                    let message = command.to_message();
                    if debug {
                        debug!(source = %name, %message, "Emitting");
                    }
                    if events.send(message).await.is_err() {
                        return;
                    }
                }

                tokio::select! {
                    _ = tokio::time::sleep(period) => {}
                    _ = shutdown.notified() => {
                        info!(source = %name, "Dummy source quitting");
                        return;
                    }
                }
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

    /// Loops the message back into this source's own event stream.
    async fn send(&self, message: Message) -> Result<(), SourceError> {
        info!(source = %self.config.name, %message, "Sending message");
        self.channels
            .event_sender()
            .send(message)
            .await
            .map_err(|_| SourceError::ChannelClosed {
                name: self.config.name.clone(),
            })
    }
}
