//! Assembles one running bridge from a validated config and tears it down again.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

use oscbridge_core::BridgeConfig;
use oscbridge_rules::{default_conditions, ActionComposer, ConditionTracker};
use oscbridge_sources::{build_sources, Source, SourceError, SourceHandle};
use oscbridge_tasks::default_tasks;

use crate::listener::Listener;
use crate::reactor::Reactor;

/// A running bridge: sources, listener and reactor.
pub struct Bridge {
    sources: Vec<SourceHandle>,
    reactor: Arc<Reactor>,
    listener: Listener,
    fatal_rx: mpsc::Receiver<SourceError>,
    forwarders: Vec<JoinHandle<()>>,
}

impl Bridge {
    /// Build and start everything `config` describes.
    ///
    /// Nothing is left running when this fails.
    pub async fn start(config: &BridgeConfig) -> anyhow::Result<Self> {
        let debug = config.app.debug;

        info!("Initializing sources...");
        let sources = build_sources(&config.osc_sources, &debug);
        let connections: HashMap<String, Arc<dyn Source>> = sources
            .iter()
            .map(|handle| (handle.name.clone(), Arc::clone(&handle.source)))
            .collect();

        info!("Composing actions...");
        let conditions = default_conditions(ConditionTracker::new(debug.debug_osc_conditions));
        let tasks = default_tasks(debug.debug_tasks, Arc::new(connections));
        let actions = ActionComposer::new(&conditions, &tasks)
            .compose(&config.actions)
            .context("failed to compose actions")?;

        let persist_path = config
            .app
            .store_persist_path
            .as_deref()
            .filter(|p| !p.is_empty())
            .map(PathBuf::from);
        let reactor = Arc::new(Reactor::new(actions, persist_path, debug.debug_osc_conditions));
        reactor.start().context("failed to load persistence file")?;

        let listener = Listener::new(Arc::clone(&reactor), debug.debug_osc_connection);
        listener.start(&sources);

        let mut started: Vec<&SourceHandle> = Vec::with_capacity(sources.len());
        for handle in &sources {
            info!(source = %handle.name, "Starting source");
            if let Err(e) = handle.source.start().await {
                for running in started {
                    running.source.stop().await;
                }
                listener.stop().await;
                reactor.stop().await;
                return Err(e).with_context(|| format!("failed to start source '{}'", handle.name));
            }
            started.push(handle);
        }

        let (fatal_tx, fatal_rx) = mpsc::channel(sources.len().max(1));
        let forwarders: Vec<JoinHandle<()>> = sources
            .iter()
            .filter_map(|handle| {
                let mut errors = handle.source.take_fatal_errors()?;
                let fatal_tx = fatal_tx.clone();
                Some(tokio::spawn(async move {
                    if let Some(err) = errors.recv().await {
                        let _ = fatal_tx.send(err).await;
                    }
                }))
            })
            .collect();

        info!(sources = sources.len(), actions = reactor.actions().len(), "All services are up & running!");
        Ok(Self {
            sources,
            reactor,
            listener,
            fatal_rx,
            forwarders,
        })
    }

    pub fn reactor(&self) -> &Arc<Reactor> {
        &self.reactor
    }

    pub fn sources(&self) -> &[SourceHandle] {
        &self.sources
    }

    /// Wait for the first fatal error any source reports.
    ///
    /// Never resolves when no source can fail.
    pub async fn fatal_error(&mut self) -> SourceError {
        match self.fatal_rx.recv().await {
            Some(err) => err,
            None => std::future::pending().await,
        }
    }

    /// Stop accepting events, stop every source, then flush the store.
    pub async fn stop(self) {
        self.listener.stop().await;
        for handle in &self.sources {
            info!(source = %handle.name, "Stopping source");
            handle.source.stop().await;
        }
        for forwarder in self.forwarders {
            forwarder.abort();
        }
        self.reactor.stop().await;
        info!("Bridge stopped");
    }
}
