//! Per-pass evaluation context.
//!
//! An [`EvaluationContext`] owns a private snapshot of the fact store plus the
//! watched-access counter for one evaluation pass. Reads made through it with
//! `track_access` set count how many calls returned the watched message, which
//! tells the reactor whether a match involved the update that started the pass.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use regex::Regex;

use crate::error::StoreError;
use crate::message::Message;
use crate::store::{compile_pattern, FactStore, Record};

#[derive(Debug, Default)]
pub struct EvaluationContext {
    store: Arc<FactStore>,
    watched: Option<Message>,
    accesses: AtomicU64,
}

impl EvaluationContext {
    /// Context over `store` with nothing watched.
    ///
    /// Several contexts may share one snapshot; each keeps its own counter.
    pub fn new(store: impl Into<Arc<FactStore>>) -> Self {
        Self {
            store: store.into(),
            watched: None,
            accesses: AtomicU64::new(0),
        }
    }

    /// Context over `store` that counts reads returning `message`.
    pub fn watching(store: impl Into<Arc<FactStore>>, message: Message) -> Self {
        let mut ctx = Self::new(store);
        ctx.watch_record_access(message);
        ctx
    }

    /// Arm the counter for `message`, resetting any previous count.
    pub fn watch_record_access(&mut self, message: Message) {
        self.watched = Some(message);
        self.accesses.store(0, Ordering::SeqCst);
    }

    pub fn watched_record_accesses(&self) -> u64 {
        self.accesses.load(Ordering::SeqCst)
    }

    pub fn watched_message(&self) -> Option<&Message> {
        self.watched.as_ref()
    }

    /// The snapshot this context reads from.
    pub fn store(&self) -> &FactStore {
        &self.store
    }

    // ── Tracked reads ──────────────────────────────────────────────

    pub fn get_record(&self, address: &str, track_access: bool) -> Option<Arc<Record>> {
        let record = self.store.get_record(address);
        if track_access {
            self.check_access(record.iter());
        }
        record
    }

    pub fn get_records_by_prefix(&self, prefix: &str, track_access: bool) -> Vec<Arc<Record>> {
        let records = self.store.get_records_by_prefix(prefix);
        if track_access {
            self.check_access(records.iter());
        }
        records
    }

    pub fn get_one_record_by_regexp(
        &self,
        pattern: &str,
        track_access: bool,
    ) -> Result<Option<Arc<Record>>, StoreError> {
        let re = compile_pattern(pattern)?;
        Ok(self.find_one_matching(&re, track_access))
    }

    pub fn get_records_by_regexp(
        &self,
        pattern: &str,
        track_access: bool,
    ) -> Result<Vec<Arc<Record>>, StoreError> {
        let re = compile_pattern(pattern)?;
        Ok(self.find_all_matching(&re, track_access))
    }

    /// Like [`get_one_record_by_regexp`](Self::get_one_record_by_regexp) with
    /// a pattern compiled ahead of time.
    pub fn find_one_matching(&self, re: &Regex, track_access: bool) -> Option<Arc<Record>> {
        let record = self.store.find_one_matching(re);
        if track_access {
            self.check_access(record.iter());
        }
        record
    }

    pub fn find_all_matching(&self, re: &Regex, track_access: bool) -> Vec<Arc<Record>> {
        let records = self.store.find_all_matching(re);
        if track_access {
            self.check_access(records.iter());
        }
        records
    }

    /// Count the call once if any returned record carries the watched message.
    fn check_access<'a>(&self, mut records: impl Iterator<Item = &'a Arc<Record>>) {
        let Some(watched) = &self.watched else {
            return;
        };
        if records.any(|record| record.message() == watched) {
            self.accesses.fetch_add(1, Ordering::SeqCst);
        }
    }
}
