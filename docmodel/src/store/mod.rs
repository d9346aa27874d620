//! The document store contract the model layer runs against.

pub mod memory;

pub use memory::MemoryStore;

use crate::document::DocumentSnapshot;
use crate::error::Result;
use crate::value::{DocumentRef, Fields};
use serde::{Deserialize, Serialize};
use std::sync::mpsc;
use std::time::Duration;

/// A document database holding schemaless documents addressed by path.
pub trait DocumentStore: Send + Sync {
    /// Create a document with a generated id inside `collection`.
    fn add(&self, collection: &str, data: Fields) -> Result<DocumentRef>;

    /// Read a document. A missing document is a snapshot without data.
    fn get(&self, reference: &DocumentRef) -> Result<DocumentSnapshot>;

    /// Create or overwrite a document.
    fn set(&self, reference: &DocumentRef, data: Fields) -> Result<()>;

    /// Merge top-level fields into an existing document.
    fn update(&self, reference: &DocumentRef, data: Fields) -> Result<()>;

    /// Delete a document. Deleting a missing document is not an error.
    fn delete(&self, reference: &DocumentRef) -> Result<()>;

    /// Watch a document. The current snapshot is delivered first.
    fn subscribe(&self, reference: &DocumentRef) -> Result<Subscription>;

    /// Run `body` as an atomic read-modify-write. The store may call it more
    /// than once if the documents it read changed before commit.
    fn run_transaction(
        &self,
        body: &mut dyn FnMut(&mut dyn Transaction) -> Result<()>,
    ) -> Result<()>;
}

/// Operations available inside a transaction body.
///
/// All reads must happen before any write. Writes are buffered and applied
/// together when the body returns `Ok`.
pub trait Transaction {
    fn get(&mut self, reference: &DocumentRef) -> Result<DocumentSnapshot>;
    fn set(&mut self, reference: &DocumentRef, data: Fields) -> Result<()>;
    fn update(&mut self, reference: &DocumentRef, data: Fields) -> Result<()>;
    fn delete(&mut self, reference: &DocumentRef) -> Result<()>;
}

/// Live snapshots of one document.
///
/// Delivery ends when the subscription is stopped or dropped.
pub struct Subscription {
    rx: Option<mpsc::Receiver<DocumentSnapshot>>,
}

impl Subscription {
    pub fn new(rx: mpsc::Receiver<DocumentSnapshot>) -> Self {
        Subscription { rx: Some(rx) }
    }

    /// Block until the next snapshot. `None` once stopped or the store is gone.
    pub fn recv(&self) -> Option<DocumentSnapshot> {
        self.rx.as_ref()?.recv().ok()
    }

    pub fn try_recv(&self) -> Option<DocumentSnapshot> {
        self.rx.as_ref()?.try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<DocumentSnapshot> {
        self.rx.as_ref()?.recv_timeout(timeout).ok()
    }

    pub fn stop(&mut self) {
        self.rx = None;
    }

    pub fn is_stopped(&self) -> bool {
        self.rx.is_none()
    }
}

impl Iterator for Subscription {
    type Item = DocumentSnapshot;

    fn next(&mut self) -> Option<DocumentSnapshot> {
        self.recv()
    }
}

/// Strategy for generating document ids in `DocumentStore::add`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoIdStrategy {
    Ulid,
    Uuid,
    #[default]
    Nanoid,
}

impl AutoIdStrategy {
    pub fn generate(self) -> String {
        match self {
            AutoIdStrategy::Ulid => ulid::Ulid::new().to_string().to_lowercase(),
            AutoIdStrategy::Uuid => uuid::Uuid::new_v4().to_string(),
            AutoIdStrategy::Nanoid => nanoid::nanoid!(20),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub auto_id: AutoIdStrategy,
    /// Attempts before a conflicting transaction gives up
    pub max_transaction_attempts: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            auto_id: AutoIdStrategy::default(),
            max_transaction_attempts: 5,
        }
    }
}

impl StoreConfig {
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }
}
