//! The reactor owns the live fact store and the composed actions.
//!
//! Every accepted update bumps the store version and starts an evaluation
//! pass over a private snapshot. Passes run concurrently with later updates
//! and with each other. A background loop writes the store to disk once a
//! second whenever the version moved.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, info_span, Instrument};
use uuid::Uuid;

use oscbridge_core::{snapshot, EvaluationContext, FactStore, Message, PersistenceError};
use oscbridge_rules::Action;

/// How often the persistence loop checks the store version.
const PERSIST_INTERVAL: Duration = Duration::from_secs(1);

pub struct Reactor {
    store: Arc<FactStore>,
    actions: Arc<[Arc<Action>]>,
    version: Arc<AtomicU64>,
    persist_path: Option<PathBuf>,
    debug_conditions: bool,
    shutdown: Arc<Notify>,
    persist_task: Mutex<Option<JoinHandle<()>>>,
}

impl Reactor {
    pub fn new(actions: Vec<Action>, persist_path: Option<PathBuf>, debug_conditions: bool) -> Self {
        Self {
            store: Arc::new(FactStore::new()),
            actions: actions.into_iter().map(Arc::new).collect(),
            version: Arc::new(AtomicU64::new(0)),
            persist_path,
            debug_conditions,
            shutdown: Arc::new(Notify::new()),
            persist_task: Mutex::new(None),
        }
    }

    /// The live store.
    pub fn store(&self) -> &FactStore {
        &self.store
    }

    pub fn actions(&self) -> &[Arc<Action>] {
        &self.actions
    }

    /// Number of accepted updates so far.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Restore the persisted store and start the persistence loop.
    ///
    /// A failed load is returned to the caller; a missing file is not a failure.
    pub fn start(&self) -> Result<(), PersistenceError> {
        let Some(path) = self.persist_path.clone() else {
            return Ok(());
        };

        if let Some(count) = snapshot::load(&self.store, &path)? {
            info!(path = %path.display(), records = count, "Loaded persisted message store");
        }

        // Updates accepted before the loop is first polled must still count as unsaved.
        let persisted = self.version.load(Ordering::SeqCst);
        let task = tokio::spawn(persist_loop(
            Arc::clone(&self.store),
            Arc::clone(&self.version),
            persisted,
            path,
            Arc::clone(&self.shutdown),
        ));
        *self.persist_task.lock().expect("persist task lock poisoned") = Some(task);
        Ok(())
    }

    /// Stop the persistence loop after a final dump. Running passes are left alone.
    pub async fn stop(&self) {
        let task = self.persist_task.lock().expect("persist task lock poisoned").take();
        if let Some(task) = task {
            self.shutdown.notify_one();
            if let Err(e) = task.await {
                error!(error = %e, "Persistence loop ended abnormally");
            }
        }
    }

    // ── Updates ──────────────────────────────────────────────────────

    /// Store `message` and, if it changed anything, evaluate every action.
    ///
    /// Returns the spawned evaluation pass, or `None` when the message was
    /// identical to the stored one.
    pub fn update_record(&self, message: Message) -> Option<JoinHandle<()>> {
        if !self.store.set_record(message.clone()) {
            return None;
        }
        self.version.fetch_add(1, Ordering::SeqCst);
        info!(%message, "Store updated with");

        let pass = EvaluationPass {
            actions: Arc::clone(&self.actions),
            snapshot: Arc::new(self.store.snapshot()),
            trigger: message,
            debug: self.debug_conditions,
        };
        let session = Uuid::new_v4().simple().to_string();
        let span = info_span!("evaluation", session = %&session[..6]);
        Some(tokio::spawn(pass.run().instrument(span)))
    }
}

// ── Evaluation ───────────────────────────────────────────────────────

/// One update's worth of action evaluation over a private snapshot.
struct EvaluationPass {
    actions: Arc<[Arc<Action>]>,
    snapshot: Arc<FactStore>,
    trigger: Message,
    debug: bool,
}

impl EvaluationPass {
    async fn run(self) {
        if self.debug {
            info!("Evaluating actions because of a change in the message store");
        }

        let mut debounced = JoinSet::new();
        for action in self.actions.iter() {
            self.evaluate_action(action, &mut debounced).await;
        }
        while let Some(joined) = debounced.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Debounced action ended abnormally");
            }
        }

        info!("finished");
    }

    async fn evaluate_action(&self, action: &Arc<Action>, debounced: &mut JoinSet<()>) {
        if self.debug {
            info!(action = %action.name(), "Evaluating action");
        }

        // Each action gets its own counter over the shared snapshot.
        let ctx = EvaluationContext::watching(Arc::clone(&self.snapshot), self.trigger.clone());
        match action.evaluate(&ctx) {
            Ok(true) => {}
            Ok(false) => return,
            Err(e) => {
                error!(action = %action.name(), error = %e, "Error during evaluation");
                return;
            }
        }

        if ctx.watched_record_accesses() == 0 {
            info!(
                action = %action.name(),
                "Although the triggers matched, none of them selected the newly changed record, skipping execution"
            );
            return;
        }

        match action.debounce() {
            None => execute(action, &self.snapshot).await,
            Some(delay) => {
                let action = Arc::clone(action);
                let snapshot = Arc::clone(&self.snapshot);
                let debug = self.debug;
                debounced.spawn(
                    async move { debounce_then_execute(action, snapshot, delay, debug).await }
                        .in_current_span(),
                );
            }
        }
    }
}

/// Wait out the debounce, then execute if the chain still holds on the same snapshot.
async fn debounce_then_execute(action: Arc<Action>, snapshot: Arc<FactStore>, delay: Duration, debug: bool) {
    tokio::time::sleep(delay).await;

    let ctx = EvaluationContext::new(Arc::clone(&snapshot));
    let matched = match action.evaluate(&ctx) {
        Ok(matched) => matched,
        Err(e) => {
            error!(action = %action.name(), error = %e, "Error during evaluation");
            false
        }
    };
    if debug {
        info!(
            action = %action.name(),
            debounce_millis = action.debounce_millis(),
            matched,
            "Debounce finished"
        );
    }
    if matched {
        execute(&action, &snapshot).await;
    }
}

async fn execute(action: &Action, snapshot: &FactStore) {
    info!(action = %action.name(), "Executing action");
    if let Err(e) = action.execute(snapshot).await {
        error!(action = %action.name(), error = %e, "Action failed");
    }
}

// ── Persistence ──────────────────────────────────────────────────────

async fn persist_loop(
    store: Arc<FactStore>,
    version: Arc<AtomicU64>,
    mut persisted: u64,
    path: PathBuf,
    shutdown: Arc<Notify>,
) {
    let mut interval = tokio::time::interval(PERSIST_INTERVAL);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = interval.tick() => persist_if_changed(&store, &version, &path, &mut persisted),
            _ = shutdown.notified() => {
                persist_if_changed(&store, &version, &path, &mut persisted);
                info!("Message store JSON syncing quitting");
                return;
            }
        }
    }
}

fn persist_if_changed(store: &FactStore, version: &AtomicU64, path: &Path, persisted: &mut u64) {
    let current = version.load(Ordering::SeqCst);
    if current == *persisted {
        return;
    }
    match snapshot::dump(store, path) {
        Ok(count) => {
            debug!(path = %path.display(), records = count, version = current, "Message store persisted");
            *persisted = current;
        }
        Err(e) => error!(path = %path.display(), error = %e, "Failed to persist message store"),
    }
}
