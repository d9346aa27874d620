use crate::value::{DocumentRef, Fields};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A point-in-time read of a document, as handed out by a store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSnapshot {
    pub reference: DocumentRef,
    /// `None` when the document does not exist
    pub data: Option<Fields>,
    pub create_time: Option<DateTime<Utc>>,
    pub update_time: Option<DateTime<Utc>>,
}

impl DocumentSnapshot {
    /// Snapshot of a document that does not exist
    pub fn missing(reference: DocumentRef) -> Self {
        DocumentSnapshot {
            reference,
            data: None,
            create_time: None,
            update_time: None,
        }
    }

    pub fn exists(&self) -> bool {
        self.data.is_some()
    }

    pub fn id(&self) -> &str {
        self.reference.id()
    }
}
