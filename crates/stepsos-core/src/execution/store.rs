use super::types::ExecutionRecord;
use crate::error::{Error, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};
use tracing::debug;

type SharedRecord = Arc<RwLock<ExecutionRecord>>;

#[derive(Default)]
struct StoreInner {
    records: HashMap<String, SharedRecord>,
    order: Vec<String>,
}

/// In-memory registry of every execution created during the process lifetime.
///
/// Records are never evicted. Each record sits behind its own lock so a reader
/// sees a step mutation either fully applied or not at all.
#[derive(Clone, Default)]
pub struct ExecutionStore {
    inner: Arc<RwLock<StoreInner>>,
}

impl ExecutionStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a pending record and hand back the exclusive mutation handle.
    ///
    /// Fails with [`Error::DuplicateExecution`] when `id` is taken; the
    /// existing record is not touched.
    pub fn create(
        &self,
        id: impl Into<String>,
        workflow_id: impl Into<String>,
        input: Value,
    ) -> Result<ExecutionHandle> {
        let id = id.into();
        let mut inner = self
            .inner
            .write()
            .map_err(|_| Error::Internal("execution store lock poisoned".to_string()))?;

        if inner.records.contains_key(&id) {
            return Err(Error::DuplicateExecution(id));
        }

        let record = Arc::new(RwLock::new(ExecutionRecord::new(
            id.clone(),
            workflow_id,
            input,
        )));
        inner.records.insert(id.clone(), record.clone());
        inner.order.push(id.clone());
        debug!(execution_id = %id, "Execution created");

        Ok(ExecutionHandle { id, record })
    }

    /// Snapshot of one record
    pub fn get(&self, id: &str) -> Result<ExecutionRecord> {
        let record = {
            let inner = self
                .inner
                .read()
                .map_err(|_| Error::Internal("execution store lock poisoned".to_string()))?;
            inner
                .records
                .get(id)
                .cloned()
                .ok_or_else(|| Error::NotFound(format!("execution {id}")))?
        };
        snapshot(&record)
    }

    /// Whether `id` is present
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.inner
            .read()
            .map(|inner| inner.records.contains_key(id))
            .unwrap_or(false)
    }

    /// All records in creation order.
    ///
    /// The returned list pins the set of records present now; each record is
    /// read only when iterated, so iterating twice may show newer states.
    pub fn list(&self) -> Result<ExecutionList> {
        let inner = self
            .inner
            .read()
            .map_err(|_| Error::Internal("execution store lock poisoned".to_string()))?;
        let records = inner
            .order
            .iter()
            .filter_map(|id| inner.records.get(id).cloned())
            .collect();
        Ok(ExecutionList { records })
    }

    /// Most recently created record
    pub fn latest(&self) -> Result<Option<ExecutionRecord>> {
        let record = {
            let inner = self
                .inner
                .read()
                .map_err(|_| Error::Internal("execution store lock poisoned".to_string()))?;
            inner
                .order
                .last()
                .and_then(|id| inner.records.get(id))
                .cloned()
        };
        record.as_ref().map(snapshot).transpose()
    }

    /// Number of records
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().map(|inner| inner.order.len()).unwrap_or(0)
    }

    /// Whether the store holds no records
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for ExecutionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionStore")
            .field("executions", &self.len())
            .finish()
    }
}

fn snapshot(record: &SharedRecord) -> Result<ExecutionRecord> {
    record
        .read()
        .map(|r| r.clone())
        .map_err(|_| Error::Internal("execution record lock poisoned".to_string()))
}

/// Exclusive write access to one record, owned by the task running it.
///
/// Not `Clone`: there is exactly one handle per execution.
pub struct ExecutionHandle {
    id: String,
    record: SharedRecord,
}

impl ExecutionHandle {
    /// Execution id
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Apply one mutation atomically with respect to readers
    pub fn update<R>(&self, f: impl FnOnce(&mut ExecutionRecord) -> R) -> Result<R> {
        let mut record = self
            .record
            .write()
            .map_err(|_| Error::Internal("execution record lock poisoned".to_string()))?;
        Ok(f(&mut record))
    }

    /// Read the record without cloning it
    pub fn read<R>(&self, f: impl FnOnce(&ExecutionRecord) -> R) -> Result<R> {
        let record = self
            .record
            .read()
            .map_err(|_| Error::Internal("execution record lock poisoned".to_string()))?;
        Ok(f(&record))
    }

    /// Cloned snapshot
    pub fn snapshot(&self) -> Result<ExecutionRecord> {
        snapshot(&self.record)
    }
}

impl fmt::Debug for ExecutionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionHandle")
            .field("id", &self.id)
            .finish()
    }
}

/// Restartable, creation-ordered view over the store
#[derive(Clone)]
pub struct ExecutionList {
    records: Vec<SharedRecord>,
}

impl ExecutionList {
    /// Lazily snapshot each record in creation order. Records whose lock is
    /// poisoned are skipped.
    pub fn iter(&self) -> impl Iterator<Item = ExecutionRecord> + '_ {
        self.records.iter().filter_map(|r| snapshot(r).ok())
    }

    /// Number of records in the view
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the view is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl fmt::Debug for ExecutionList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionList")
            .field("len", &self.records.len())
            .finish()
    }
}
