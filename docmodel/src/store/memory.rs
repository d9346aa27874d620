use super::{DocumentStore, StoreConfig, Subscription, Transaction};
use crate::document::DocumentSnapshot;
use crate::error::{DocModelError, Result};
use crate::value::{DocumentRef, Fields};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{mpsc, Mutex, MutexGuard, PoisonError};

/// In-memory document store.
///
/// Transactions are serialised against each other and validated at commit
/// against the version of every document they read, so a plain write that
/// lands between read and commit forces a retry.
pub struct MemoryStore {
    config: StoreConfig,
    state: Mutex<StoreState>,
    tx_lock: Mutex<()>,
}

#[derive(Default)]
struct StoreState {
    documents: HashMap<String, StoredDocument>,
    subscribers: HashMap<String, Vec<mpsc::Sender<DocumentSnapshot>>>,
    version: u64,
}

struct StoredDocument {
    data: Fields,
    create_time: DateTime<Utc>,
    update_time: DateTime<Utc>,
    version: u64,
}

enum Write {
    Set(Fields),
    Update(Fields),
    Delete,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    pub fn with_config(config: StoreConfig) -> Self {
        MemoryStore {
            config,
            state: Mutex::new(StoreState::default()),
            tx_lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Number of stored documents.
    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.documents.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreState>> {
        self.state.lock().map_err(poisoned)
    }

    /// Apply buffered writes if nothing read by the transaction changed.
    /// Returns `false` on a version conflict.
    fn commit(&self, tx: MemoryTransaction<'_>) -> Result<bool> {
        let mut state = self.lock()?;
        for (path, version) in &tx.reads {
            if state.version_of(path) != *version {
                log::debug!("Transaction read of {path} is stale");
                return Ok(false);
            }
        }

        // Stage everything first so a failing write leaves the store untouched
        let mut staged: Vec<(String, Option<Fields>)> = Vec::new();
        for (path, write) in tx.writes {
            let current = match staged.iter().rposition(|(p, _)| *p == path) {
                Some(index) => staged[index].1.clone(),
                None => state.documents.get(&path).map(|doc| doc.data.clone()),
            };
            let next = apply(&path, current, write)?;
            staged.push((path, next));
        }
        for (path, data) in staged {
            state.put(&path, data);
        }
        Ok(true)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(_: PoisonError<T>) -> DocModelError {
    DocModelError::Store("store lock poisoned".into())
}

/// Result of applying `write` on top of `current`.
fn apply(path: &str, current: Option<Fields>, write: Write) -> Result<Option<Fields>> {
    match write {
        Write::Set(data) => Ok(Some(data)),
        Write::Update(changes) => {
            let mut data = current.ok_or_else(|| DocModelError::NotFound {
                path: path.to_string(),
            })?;
            data.extend(changes);
            Ok(Some(data))
        }
        Write::Delete => Ok(None),
    }
}

impl StoreState {
    fn version_of(&self, path: &str) -> Option<u64> {
        self.documents.get(path).map(|doc| doc.version)
    }

    fn snapshot(&self, path: &str) -> DocumentSnapshot {
        let reference = DocumentRef::new(path);
        match self.documents.get(path) {
            Some(doc) => DocumentSnapshot {
                reference,
                data: Some(doc.data.clone()),
                create_time: Some(doc.create_time),
                update_time: Some(doc.update_time),
            },
            None => DocumentSnapshot::missing(reference),
        }
    }

    /// Store `data` at `path` (`None` deletes) and notify subscribers.
    fn put(&mut self, path: &str, data: Option<Fields>) {
        let now = Utc::now();
        match data {
            Some(data) => {
                self.version += 1;
                let create_time = self
                    .documents
                    .get(path)
                    .map_or(now, |doc| doc.create_time);
                self.documents.insert(
                    path.to_string(),
                    StoredDocument {
                        data,
                        create_time,
                        update_time: now,
                        version: self.version,
                    },
                );
            }
            None => {
                if self.documents.remove(path).is_none() {
                    return;
                }
            }
        }
        self.notify(path);
    }

    fn notify(&mut self, path: &str) {
        let snapshot = self.snapshot(path);
        if let Some(senders) = self.subscribers.get_mut(path) {
            senders.retain(|tx| {
                let open = tx.send(snapshot.clone()).is_ok();
                if !open {
                    log::trace!("Pruning closed subscriber of {path}");
                }
                open
            });
            if senders.is_empty() {
                self.subscribers.remove(path);
            }
        }
    }
}

impl DocumentStore for MemoryStore {
    fn add(&self, collection: &str, data: Fields) -> Result<DocumentRef> {
        let mut state = self.lock()?;
        let reference = loop {
            let candidate = DocumentRef::from_parts(collection, &self.config.auto_id.generate());
            if !state.documents.contains_key(candidate.path()) {
                break candidate;
            }
        };
        state.put(reference.path(), Some(data));
        Ok(reference)
    }

    fn get(&self, reference: &DocumentRef) -> Result<DocumentSnapshot> {
        Ok(self.lock()?.snapshot(reference.path()))
    }

    fn set(&self, reference: &DocumentRef, data: Fields) -> Result<()> {
        self.lock()?.put(reference.path(), Some(data));
        Ok(())
    }

    fn update(&self, reference: &DocumentRef, data: Fields) -> Result<()> {
        let mut state = self.lock()?;
        let current = state
            .documents
            .get(reference.path())
            .map(|doc| doc.data.clone());
        let next = apply(reference.path(), current, Write::Update(data))?;
        state.put(reference.path(), next);
        Ok(())
    }

    fn delete(&self, reference: &DocumentRef) -> Result<()> {
        self.lock()?.put(reference.path(), None);
        Ok(())
    }

    fn subscribe(&self, reference: &DocumentRef) -> Result<Subscription> {
        let mut state = self.lock()?;
        let (tx, rx) = mpsc::channel();
        // The receiver is still held here, so this send cannot fail
        let _ = tx.send(state.snapshot(reference.path()));
        state
            .subscribers
            .entry(reference.path().to_string())
            .or_default()
            .push(tx);
        Ok(Subscription::new(rx))
    }

    fn run_transaction(
        &self,
        body: &mut dyn FnMut(&mut dyn Transaction) -> Result<()>,
    ) -> Result<()> {
        let _serial = self.tx_lock.lock().map_err(poisoned)?;
        let attempts = self.config.max_transaction_attempts.max(1);
        for attempt in 1..=attempts {
            let mut tx = MemoryTransaction {
                state: &self.state,
                reads: HashMap::new(),
                writes: Vec::new(),
            };
            body(&mut tx)?;
            if self.commit(tx)? {
                return Ok(());
            }
            log::debug!("Transaction conflict on attempt {attempt}/{attempts}, retrying");
        }
        Err(DocModelError::TransactionConflict { attempts })
    }
}

struct MemoryTransaction<'a> {
    state: &'a Mutex<StoreState>,
    /// Version of every document read; `None` for documents that were missing
    reads: HashMap<String, Option<u64>>,
    writes: Vec<(String, Write)>,
}

impl MemoryTransaction<'_> {
    fn buffer(&mut self, reference: &DocumentRef, write: Write) -> Result<()> {
        self.writes.push((reference.path().to_string(), write));
        Ok(())
    }
}

impl Transaction for MemoryTransaction<'_> {
    fn get(&mut self, reference: &DocumentRef) -> Result<DocumentSnapshot> {
        if !self.writes.is_empty() {
            return Err(DocModelError::Transaction(
                "all reads must happen before any write".into(),
            ));
        }
        let state = self.state.lock().map_err(poisoned)?;
        let path = reference.path();
        self.reads
            .entry(path.to_string())
            .or_insert_with(|| state.version_of(path));
        Ok(state.snapshot(path))
    }

    fn set(&mut self, reference: &DocumentRef, data: Fields) -> Result<()> {
        self.buffer(reference, Write::Set(data))
    }

    fn update(&mut self, reference: &DocumentRef, data: Fields) -> Result<()> {
        self.buffer(reference, Write::Update(data))
    }

    fn delete(&mut self, reference: &DocumentRef) -> Result<()> {
        self.buffer(reference, Write::Delete)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::AutoIdStrategy;
    use crate::value::{fields_from_json, Value};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::time::Duration;

    fn fields(json: serde_json::Value) -> Fields {
        fields_from_json(json).unwrap()
    }

    #[test]
    fn test_add_get_set_delete() {
        let store = MemoryStore::new();
        let reference = store.add("users", fields(json!({ "name": "Alice" }))).unwrap();
        assert_eq!(reference.parent(), "users");
        assert_eq!(reference.id().len(), 20);

        let snapshot = store.get(&reference).unwrap();
        assert!(snapshot.exists());
        assert_eq!(snapshot.data.unwrap()["name"], Value::from("Alice"));
        let created = snapshot.create_time;

        store.set(&reference, fields(json!({ "name": "Bob" }))).unwrap();
        let snapshot = store.get(&reference).unwrap();
        assert_eq!(snapshot.data.unwrap()["name"], Value::from("Bob"));
        assert_eq!(snapshot.create_time, created);

        store.delete(&reference).unwrap();
        assert!(!store.get(&reference).unwrap().exists());
        // Deleting twice is fine
        store.delete(&reference).unwrap();
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn test_update_merges_top_level() {
        let store = MemoryStore::new();
        let reference = DocumentRef::new("users/alice");
        store
            .set(&reference, fields(json!({ "name": "Alice", "age": 30 })))
            .unwrap();
        store.update(&reference, fields(json!({ "age": 31 }))).unwrap();
        assert_eq!(
            store.get(&reference).unwrap().data.unwrap(),
            fields(json!({ "name": "Alice", "age": 31 }))
        );

        let missing = DocumentRef::new("users/nobody");
        assert!(matches!(
            store.update(&missing, Fields::new()),
            Err(DocModelError::NotFound { .. })
        ));
    }

    #[test]
    fn test_configured_id_strategy() {
        let store = MemoryStore::with_config(StoreConfig {
            auto_id: AutoIdStrategy::Uuid,
            ..StoreConfig::default()
        });
        let reference = store.add("/things/", Fields::new()).unwrap();
        assert_eq!(reference.parent(), "things");
        assert_eq!(reference.id().len(), 36);
    }

    #[test]
    fn test_subscription_receives_writes() {
        let store = MemoryStore::new();
        let reference = DocumentRef::new("users/alice");
        let mut sub = store.subscribe(&reference).unwrap();

        let initial = sub.recv_timeout(Duration::from_secs(1)).unwrap();
        assert!(!initial.exists());

        store.set(&reference, fields(json!({ "n": 1 }))).unwrap();
        store.update(&reference, fields(json!({ "n": 2 }))).unwrap();
        store.delete(&reference).unwrap();

        let seen: Vec<Option<Fields>> = (0..3)
            .map(|_| sub.recv_timeout(Duration::from_secs(1)).unwrap().data)
            .collect();
        assert_eq!(
            seen,
            vec![Some(fields(json!({ "n": 1 }))), Some(fields(json!({ "n": 2 }))), None]
        );

        sub.stop();
        store.set(&reference, Fields::new()).unwrap();
        assert!(store.lock().unwrap().subscribers.is_empty());
    }

    #[test]
    fn test_transaction_commits_atomically() {
        let store = MemoryStore::new();
        let a = DocumentRef::new("accounts/a");
        let b = DocumentRef::new("accounts/b");
        store.set(&a, fields(json!({ "balance": 10 }))).unwrap();
        store.set(&b, fields(json!({ "balance": 0 }))).unwrap();

        store
            .run_transaction(&mut |tx| {
                let from = tx.get(&a)?.data.unwrap_or_default();
                let to = tx.get(&b)?.data.unwrap_or_default();
                let amount = 4.0;
                let balance = |f: &Fields| f.get("balance").and_then(Value::as_f64).unwrap_or(0.0);
                tx.update(&a, fields(json!({ "balance": balance(&from) - amount })))?;
                tx.update(&b, fields(json!({ "balance": balance(&to) + amount })))?;
                Ok(())
            })
            .unwrap();

        assert_eq!(store.get(&a).unwrap().data.unwrap()["balance"], Value::from(6));
        assert_eq!(store.get(&b).unwrap().data.unwrap()["balance"], Value::from(4));
    }

    #[test]
    fn test_failed_write_leaves_store_untouched() {
        let store = MemoryStore::new();
        let a = DocumentRef::new("docs/a");
        store.set(&a, fields(json!({ "v": 1 }))).unwrap();

        let result = store.run_transaction(&mut |tx| {
            tx.update(&a, fields(json!({ "v": 2 })))?;
            tx.update(&DocumentRef::new("docs/missing"), Fields::new())
        });
        assert!(matches!(result, Err(DocModelError::NotFound { .. })));
        assert_eq!(store.get(&a).unwrap().data.unwrap()["v"], Value::from(1));
    }

    #[test]
    fn test_read_after_write_is_rejected() {
        let store = MemoryStore::new();
        let a = DocumentRef::new("docs/a");
        let result = store.run_transaction(&mut |tx| {
            tx.set(&a, Fields::new())?;
            tx.get(&a).map(|_| ())
        });
        assert!(matches!(result, Err(DocModelError::Transaction(_))));
        assert!(!store.get(&a).unwrap().exists());
    }

    #[test]
    fn test_body_error_aborts_without_retry() {
        let store = MemoryStore::new();
        let mut calls = 0;
        let result = store.run_transaction(&mut |_tx| {
            calls += 1;
            Err(DocModelError::Vanished {
                path: "docs/a".into(),
            })
        });
        assert!(matches!(result, Err(DocModelError::Vanished { .. })));
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_conflicting_write_retries() {
        let store = MemoryStore::new();
        let a = DocumentRef::new("docs/a");
        store.set(&a, fields(json!({ "v": 1 }))).unwrap();

        let mut attempts = 0;
        store
            .run_transaction(&mut |tx| {
                attempts += 1;
                let current = tx.get(&a)?.data.unwrap_or_default();
                if attempts == 1 {
                    // A plain write sneaks in between read and commit
                    store.set(&a, fields(json!({ "v": 10 })))?;
                }
                let v = current.get("v").and_then(Value::as_f64).unwrap_or(0.0);
                tx.update(&a, fields(json!({ "v": v + 1.0 })))
            })
            .unwrap();

        assert_eq!(attempts, 2);
        assert_eq!(store.get(&a).unwrap().data.unwrap()["v"], Value::from(11));
    }

    #[test]
    fn test_conflict_gives_up_after_max_attempts() {
        let store = MemoryStore::with_config(StoreConfig {
            max_transaction_attempts: 3,
            ..StoreConfig::default()
        });
        let a = DocumentRef::new("docs/a");
        let mut attempts = 0;
        let result = store.run_transaction(&mut |tx| {
            attempts += 1;
            tx.get(&a)?;
            store.set(&a, Fields::new())?;
            tx.delete(&a)
        });
        assert!(matches!(
            result,
            Err(DocModelError::TransactionConflict { attempts: 3 })
        ));
        assert_eq!(attempts, 3);
    }
}
