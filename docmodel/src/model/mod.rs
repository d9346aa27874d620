//! Active-record style access to schema-checked documents.

use crate::document::DocumentSnapshot;
use crate::error::{DocModelError, Result};
use crate::schema::Schema;
use crate::store::{DocumentStore, Subscription};
use crate::value::{DocumentRef, Fields, ModelRef, Value};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

/// A kind of model: where its documents live and what they look like.
pub trait ModelKind: 'static {
    /// Model name, used in diagnostics and as the kind of `Value::Model`.
    const NAME: &'static str;

    /// Collection holding documents of this kind. `data` is given when
    /// the collection depends on the document (nested collections).
    fn collection_path(data: Option<&Fields>) -> String;

    fn schema() -> &'static Schema;

    fn validate(data: &Fields, update: bool) -> bool {
        Self::schema().validate(data, update)
    }
}

/// A validated document of kind `M`, bound to the store it came from.
pub struct Model<M: ModelKind> {
    id: String,
    reference: DocumentRef,
    data: Fields,
    store: Arc<dyn DocumentStore>,
    kind: PhantomData<fn() -> M>,
}

impl<M: ModelKind> Model<M> {
    /// Wrap a snapshot. It must exist, hold valid data, and live in the
    /// collection its data maps to.
    pub fn from_snapshot(store: Arc<dyn DocumentStore>, snapshot: DocumentSnapshot) -> Result<Self> {
        let DocumentSnapshot {
            reference, data, ..
        } = snapshot;
        let invalid = |reference: &DocumentRef| DocModelError::InvalidDocument {
            model: M::NAME,
            path: reference.path().to_string(),
        };

        let data = match data {
            Some(data) if M::validate(&data, false) => data,
            _ => return Err(invalid(&reference)),
        };
        let expected = DocumentRef::from_parts(&M::collection_path(Some(&data)), reference.id());
        if expected != reference {
            return Err(invalid(&reference));
        }

        Ok(Model {
            id: reference.id().to_string(),
            reference,
            data,
            store,
            kind: PhantomData,
        })
    }

    /// Validate and write a new document. Without `id` the store picks one.
    pub fn create(store: Arc<dyn DocumentStore>, data: Fields, id: Option<&str>) -> Result<Self> {
        check::<M>(&data, false)?;
        let collection = M::collection_path(Some(&data));
        let write = M::schema().safe_write_data(&data)?;

        let reference = match id {
            None => store.add(&collection, write)?,
            Some(id) => {
                let reference = DocumentRef::from_parts(&collection, id);
                store.run_transaction(&mut |tx| {
                    if tx.get(&reference)?.exists() {
                        return Err(DocModelError::AlreadyExists {
                            path: reference.path().to_string(),
                        });
                    }
                    tx.set(&reference, write.clone())
                })?;
                reference
            }
        };

        log::debug!("Created {} {}", M::NAME, reference);
        Self::get_by_reference(store, &reference)
    }

    /// Load by id. `data` locates the collection for nested kinds.
    pub fn get_by_id(store: Arc<dyn DocumentStore>, id: &str, data: Option<&Fields>) -> Result<Self> {
        let reference = DocumentRef::from_parts(&M::collection_path(data), id);
        Self::get_by_reference(store, &reference)
    }

    pub fn get_by_reference(store: Arc<dyn DocumentStore>, reference: &DocumentRef) -> Result<Self> {
        let snapshot = store.get(reference)?;
        if !snapshot.exists() {
            return Err(DocModelError::NotFound {
                path: reference.path().to_string(),
            });
        }
        Self::from_snapshot(store, snapshot)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn reference(&self) -> &DocumentRef {
        &self.reference
    }

    /// A copy of the document's fields.
    pub fn data(&self) -> Fields {
        self.data.clone()
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.data.get(field)
    }

    /// This model as a value for reference fields of other documents.
    pub fn to_value(&self) -> Value {
        Value::Model(ModelRef {
            kind: M::NAME.to_string(),
            reference: self.reference.clone(),
        })
    }

    /// Overwrite the document; `None` rewrites the current data.
    pub fn set(&self, data: Option<Fields>) -> Result<Self> {
        let data = data.unwrap_or_else(|| self.data.clone());
        check::<M>(&data, false)?;
        let write = M::schema().safe_write_data(&data)?;
        self.store.set(&self.reference, write)?;
        log::debug!("Set {} {}", M::NAME, self.reference);
        self.refresh()
    }

    /// Merge an update payload into the document.
    pub fn update(&self, data: Fields) -> Result<Self> {
        check::<M>(&data, true)?;
        let write = M::schema().safe_write_data(&data)?;
        self.store.update(&self.reference, write)?;
        log::debug!("Updated {} {}", M::NAME, self.reference);
        self.refresh()
    }

    pub fn delete(&self) -> Result<()> {
        self.store.delete(&self.reference)?;
        log::debug!("Deleted {} {}", M::NAME, self.reference);
        Ok(())
    }

    /// Re-read the document from the store.
    pub fn refresh(&self) -> Result<Self> {
        Self::get_by_reference(self.store.clone(), &self.reference)
    }

    /// Read-modify-write inside a store transaction.
    ///
    /// `f` gets the current stored fields and returns an update payload. The
    /// transaction aborts with `Vanished` if the document is gone, and with
    /// `Validation` if the payload is not a valid update.
    pub fn update_atomic<F>(&self, mut f: F) -> Result<Self>
    where
        F: FnMut(&Fields) -> Result<Fields>,
    {
        let reference = &self.reference;
        self.store.run_transaction(&mut |tx| {
            let current = tx
                .get(reference)?
                .data
                .ok_or_else(|| DocModelError::Vanished {
                    path: reference.path().to_string(),
                })?;
            let changes = f(&current)?;
            check::<M>(&changes, true)?;
            tx.update(reference, M::schema().safe_write_data(&changes)?)
        })?;
        log::debug!("Atomically updated {} {}", M::NAME, self.reference);
        self.refresh()
    }

    /// Watch this document for changes.
    pub fn listen(&self) -> Result<ModelSubscription<M>> {
        Ok(ModelSubscription {
            inner: self.store.subscribe(&self.reference)?,
            store: self.store.clone(),
            kind: PhantomData,
        })
    }
}

fn check<M: ModelKind>(data: &Fields, update: bool) -> Result<()> {
    if M::validate(data, update) {
        return Ok(());
    }
    let report = M::schema().explain(data, update);
    let detail = if report.is_ok() {
        String::new()
    } else {
        format!(":\n{}", report.summary())
    };
    Err(DocModelError::Validation(format!(
        "invalid {} {}{detail}",
        M::NAME,
        if update { "update" } else { "data" }
    )))
}

impl<M: ModelKind> Clone for Model<M> {
    fn clone(&self) -> Self {
        Model {
            id: self.id.clone(),
            reference: self.reference.clone(),
            data: self.data.clone(),
            store: self.store.clone(),
            kind: PhantomData,
        }
    }
}

impl<M: ModelKind> PartialEq for Model<M> {
    fn eq(&self, other: &Self) -> bool {
        self.reference == other.reference && self.data == other.data
    }
}

impl<M: ModelKind> fmt::Debug for Model<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(M::NAME)
            .field("reference", &self.reference)
            .field("data", &self.data)
            .finish()
    }
}

/// Live models built from a document's snapshots. A deleted or invalid
/// document arrives as `Err(InvalidDocument)`.
pub struct ModelSubscription<M: ModelKind> {
    inner: Subscription,
    store: Arc<dyn DocumentStore>,
    kind: PhantomData<fn() -> M>,
}

impl<M: ModelKind> ModelSubscription<M> {
    pub fn recv(&self) -> Option<Result<Model<M>>> {
        self.inner.recv().map(|s| self.wrap(s))
    }

    pub fn try_recv(&self) -> Option<Result<Model<M>>> {
        self.inner.try_recv().map(|s| self.wrap(s))
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<Result<Model<M>>> {
        self.inner.recv_timeout(timeout).map(|s| self.wrap(s))
    }

    pub fn stop(&mut self) {
        self.inner.stop();
    }

    fn wrap(&self, snapshot: DocumentSnapshot) -> Result<Model<M>> {
        Model::from_snapshot(self.store.clone(), snapshot)
    }
}

impl<M: ModelKind> Iterator for ModelSubscription<M> {
    type Item = Result<Model<M>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.recv()
    }
}
