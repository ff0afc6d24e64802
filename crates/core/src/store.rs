//! Concurrent store of the last known message per address.
//!
//! Reads take a shared lock, [`FactStore::set_record`] takes the exclusive
//! lock. [`FactStore::snapshot`] copies the record pointers under the read
//! lock, so evaluation passes work on a stable view while live updates keep
//! flowing into the original.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::error::StoreError;
use crate::message::Message;

/// The last message seen on an address, with the time it arrived.
///
/// Records are immutable; a changed message replaces the whole record.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    message: Message,
    arrived_at: DateTime<Utc>,
}

impl Record {
    pub fn new(message: Message, arrived_at: DateTime<Utc>) -> Self {
        Self {
            message,
            arrived_at,
        }
    }

    pub fn message(&self) -> &Message {
        &self.message
    }

    pub fn arrived_at(&self) -> DateTime<Utc> {
        self.arrived_at
    }
}

/// Address → [`Record`] map guarded by a reader/writer lock.
#[derive(Debug, Default)]
pub struct FactStore {
    records: RwLock<HashMap<String, Arc<Record>>>,
}

pub(crate) fn compile_pattern(pattern: &str) -> Result<Regex, StoreError> {
    Regex::new(pattern).map_err(|source| StoreError::Pattern {
        pattern: pattern.to_string(),
        source,
    })
}

impl FactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shallow point-in-time copy of every record.
    pub fn snapshot(&self) -> FactStore {
        FactStore {
            records: RwLock::new(self.get_all()),
        }
    }

    /// Every record keyed by address.
    pub fn get_all(&self) -> HashMap<String, Arc<Record>> {
        self.records
            .read()
            .expect("fact store lock poisoned")
            .clone()
    }

    pub fn len(&self) -> usize {
        self.records.read().expect("fact store lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Exact address lookup.
    pub fn get_record(&self, address: &str) -> Option<Arc<Record>> {
        self.records
            .read()
            .expect("fact store lock poisoned")
            .get(address)
            .cloned()
    }

    /// All records whose address starts with `prefix`, in no particular order.
    pub fn get_records_by_prefix(&self, prefix: &str) -> Vec<Arc<Record>> {
        self.records
            .read()
            .expect("fact store lock poisoned")
            .iter()
            .filter(|(address, _)| address.starts_with(prefix))
            .map(|(_, record)| Arc::clone(record))
            .collect()
    }

    /// The first record encountered whose address matches `re`.
    ///
    /// The scan order is unspecified; with several matching addresses any
    /// one of them may be returned.
    pub fn find_one_matching(&self, re: &Regex) -> Option<Arc<Record>> {
        self.records
            .read()
            .expect("fact store lock poisoned")
            .iter()
            .find(|(address, _)| re.is_match(address))
            .map(|(_, record)| Arc::clone(record))
    }

    /// All records whose address matches `re`, in no particular order.
    pub fn find_all_matching(&self, re: &Regex) -> Vec<Arc<Record>> {
        self.records
            .read()
            .expect("fact store lock poisoned")
            .iter()
            .filter(|(address, _)| re.is_match(address))
            .map(|(_, record)| Arc::clone(record))
            .collect()
    }

    pub fn get_one_record_by_regexp(&self, pattern: &str) -> Result<Option<Arc<Record>>, StoreError> {
        let re = compile_pattern(pattern)?;
        Ok(self.find_one_matching(&re))
    }

    pub fn get_records_by_regexp(&self, pattern: &str) -> Result<Vec<Arc<Record>>, StoreError> {
        let re = compile_pattern(pattern)?;
        Ok(self.find_all_matching(&re))
    }

    /// Insert or replace the record for `message.address`.
    ///
    /// Returns `true` when the address was unseen or the message differs from
    /// the stored one. Resubmitting an identical message is a no-op.
    pub fn set_record(&self, message: Message) -> bool {
        let mut records = self.records.write().expect("fact store lock poisoned");

        if let Some(existing) = records.get(&message.address) {
            if existing.message == message {
                return false;
            }
        }

        let address = message.address.clone();
        records.insert(address, Arc::new(Record::new(message, Utc::now())));
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Argument;

    fn msg(address: &str, value: &str) -> Message {
        Message::new(address, vec![Argument::string(value)])
    }

    #[test]
    fn set_record_is_idempotent() {
        let store = FactStore::new();
        assert!(store.set_record(msg("/a", "1")));
        assert!(!store.set_record(msg("/a", "1")));
        assert_eq!(store.len(), 1);

        assert!(store.set_record(msg("/a", "2")));
        assert_eq!(store.get_record("/a").unwrap().message(), &msg("/a", "2"));
    }

    #[test]
    fn unchanged_message_keeps_arrival_time() {
        let store = FactStore::new();
        store.set_record(msg("/a", "1"));
        let first = store.get_record("/a").unwrap().arrived_at();
        store.set_record(msg("/a", "1"));
        assert_eq!(store.get_record("/a").unwrap().arrived_at(), first);
    }

    #[test]
    fn prefix_scan() {
        let store = FactStore::new();
        store.set_record(msg("/ch/01/mix/on", "1"));
        store.set_record(msg("/ch/02/mix/on", "0"));
        store.set_record(msg("/bus/01/mix/on", "1"));

        let mut found: Vec<String> = store
            .get_records_by_prefix("/ch/")
            .iter()
            .map(|r| r.message().address.clone())
            .collect();
        found.sort();
        assert_eq!(found, vec!["/ch/01/mix/on", "/ch/02/mix/on"]);
    }

    #[test]
    fn regexp_scan() {
        let store = FactStore::new();
        store.set_record(msg("/ch/01/mix/on", "1"));
        store.set_record(msg("/ch/02/mix/on", "0"));

        let all = store.get_records_by_regexp(r"^/ch/\d+/mix/on$").unwrap();
        assert_eq!(all.len(), 2);

        let one = store.get_one_record_by_regexp(r"^/ch/02").unwrap().unwrap();
        assert_eq!(one.message().address, "/ch/02/mix/on");

        assert!(store.get_one_record_by_regexp("^/nothing").unwrap().is_none());
    }

    #[test]
    fn invalid_pattern_is_an_error() {
        let store = FactStore::new();
        let err = store.get_records_by_regexp("(unclosed").unwrap_err();
        assert!(matches!(err, StoreError::Pattern { .. }));
        assert!(store.get_one_record_by_regexp("[").is_err());
    }

    #[test]
    fn snapshot_is_isolated_from_later_writes() {
        let store = FactStore::new();
        store.set_record(msg("/a", "1"));

        let snapshot = store.snapshot();
        store.set_record(msg("/a", "2"));
        store.set_record(msg("/b", "1"));

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.get_record("/a").unwrap().message(), &msg("/a", "1"));
        assert_eq!(store.len(), 2);
    }
}
