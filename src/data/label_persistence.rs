//! Label persistence: storage backends and the asynchronous mirror that
//! applies label-store mutations to them off the UI thread.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
#[cfg(test)]
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;

use crate::state::label::Label;

pub const LABELS_FILE_NAME: &str = "labels.json";

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid label data: {0}")]
    Json(#[from] serde_json::Error),
    #[error("storage rejected the write: {0}")]
    Rejected(String),
    #[error("persistence worker is not running")]
    WorkerGone,
}

/// Key-value storage for labels, keyed by label id.
pub trait LabelPersistence: Send {
    fn save(&mut self, label: &Label) -> Result<(), PersistenceError>;

    fn delete(&mut self, id: &str) -> Result<(), PersistenceError>;

    fn load_all(&mut self) -> Result<Vec<Label>, PersistenceError>;

    fn load_dataset(&mut self, dataset_id: &str) -> Result<Vec<Label>, PersistenceError> {
        Ok(self
            .load_all()?
            .into_iter()
            .filter(|l| l.dataset_id == dataset_id)
            .collect())
    }

    /// Delete every stored label that uses `label_def_id`, whatever its dataset.
    fn delete_by_definition(&mut self, label_def_id: &str) -> Result<usize, PersistenceError> {
        let ids: Vec<String> = self
            .load_all()?
            .into_iter()
            .filter(|l| l.label_def_id == label_def_id)
            .map(|l| l.id)
            .collect();
        for id in &ids {
            self.delete(id)?;
        }
        Ok(ids.len())
    }
}

fn sorted_by_creation(labels: impl IntoIterator<Item = Label>) -> Vec<Label> {
    let mut labels: Vec<Label> = labels.into_iter().collect();
    labels.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
    labels
}

// ---------------------------------------------------------------------------
// JSON file backend
// ---------------------------------------------------------------------------

/// Stores every label of every dataset in a single JSON object keyed by id.
pub struct JsonFilePersistence {
    path: PathBuf,
    cache: Option<BTreeMap<String, Label>>,
}

impl JsonFilePersistence {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), cache: None }
    }

    /// Backend for `labels.json` inside `data_dir`.
    pub fn in_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join(LABELS_FILE_NAME))
    }

    fn records(&mut self) -> Result<&mut BTreeMap<String, Label>, PersistenceError> {
        if self.cache.is_none() {
            let records = match std::fs::read_to_string(&self.path) {
                Ok(json) => serde_json::from_str(&json)?,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
                Err(e) => return Err(e.into()),
            };
            self.cache = Some(records);
        }
        Ok(self.cache.get_or_insert_with(BTreeMap::new))
    }

    fn write(&self, records: &BTreeMap<String, Label>) -> Result<(), PersistenceError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(records)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl LabelPersistence for JsonFilePersistence {
    fn save(&mut self, label: &Label) -> Result<(), PersistenceError> {
        let mut records = self.records()?.clone();
        records.insert(label.id.clone(), label.clone());
        self.write(&records)?;
        self.cache = Some(records);
        Ok(())
    }

    fn delete(&mut self, id: &str) -> Result<(), PersistenceError> {
        let mut records = self.records()?.clone();
        if records.remove(id).is_some() {
            self.write(&records)?;
            self.cache = Some(records);
        }
        Ok(())
    }

    fn load_all(&mut self) -> Result<Vec<Label>, PersistenceError> {
        Ok(sorted_by_creation(self.records()?.values().cloned()))
    }

    fn delete_by_definition(&mut self, label_def_id: &str) -> Result<usize, PersistenceError> {
        let mut records = self.records()?.clone();
        let before = records.len();
        records.retain(|_, l| l.label_def_id != label_def_id);
        let removed = before - records.len();
        if removed > 0 {
            self.write(&records)?;
            self.cache = Some(records);
        }
        Ok(removed)
    }
}

// ---------------------------------------------------------------------------
// In-memory backend
// ---------------------------------------------------------------------------

#[cfg(test)]
#[derive(Debug, Default)]
struct MemoryState {
    labels: BTreeMap<String, Label>,
    fail_writes: bool,
}

/// Shared in-memory backend. Clones observe the same records, so a clone
/// kept outside the mirror can inspect what was written.
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub struct MemoryPersistence {
    state: Arc<Mutex<MemoryState>>,
}

#[cfg(test)]
impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_labels(labels: impl IntoIterator<Item = Label>) -> Self {
        let backend = Self::new();
        backend.lock().labels = labels.into_iter().map(|l| (l.id.clone(), l)).collect();
        backend
    }

    /// Make every subsequent save/delete fail, to simulate a storage outage.
    pub fn set_fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }

    pub fn labels(&self) -> Vec<Label> {
        sorted_by_creation(self.lock().labels.values().cloned())
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
impl LabelPersistence for MemoryPersistence {
    fn save(&mut self, label: &Label) -> Result<(), PersistenceError> {
        let mut state = self.lock();
        if state.fail_writes {
            return Err(PersistenceError::Rejected(format!("save {}", label.id)));
        }
        state.labels.insert(label.id.clone(), label.clone());
        Ok(())
    }

    fn delete(&mut self, id: &str) -> Result<(), PersistenceError> {
        let mut state = self.lock();
        if state.fail_writes {
            return Err(PersistenceError::Rejected(format!("delete {id}")));
        }
        state.labels.remove(id);
        Ok(())
    }

    fn load_all(&mut self) -> Result<Vec<Label>, PersistenceError> {
        Ok(self.labels())
    }
}

// ---------------------------------------------------------------------------
// Asynchronous mirror
// ---------------------------------------------------------------------------

enum MirrorOp {
    Save(Label),
    Delete(String),
    DeleteByDefinition(String),
    Load {
        dataset_id: String,
        reply: Sender<Result<Vec<Label>, PersistenceError>>,
    },
    Flush(Sender<()>),
    Shutdown,
}

/// Owns a worker thread that applies label writes to a backend in order.
///
/// Writes are fire-and-forget: failures are logged and not retried.
pub struct PersistenceMirror {
    handle: MirrorHandle,
    worker: Option<JoinHandle<()>>,
}

impl PersistenceMirror {
    pub fn spawn(backend: Box<dyn LabelPersistence>) -> Self {
        let (tx, rx) = mpsc::channel();
        let worker = std::thread::Builder::new()
            .name("label-persistence".to_string())
            .spawn(move || run_worker(backend, rx));

        let worker = match worker {
            Ok(handle) => Some(handle),
            Err(e) => {
                tracing::warn!("Could not start label persistence worker: {e}");
                None
            }
        };

        Self { handle: MirrorHandle { tx }, worker }
    }

    pub fn handle(&self) -> MirrorHandle {
        self.handle.clone()
    }
}

impl Drop for PersistenceMirror {
    fn drop(&mut self) {
        let _ = self.handle.tx.send(MirrorOp::Shutdown);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::warn!("Label persistence worker panicked");
            }
        }
    }
}

fn run_worker(mut backend: Box<dyn LabelPersistence>, rx: Receiver<MirrorOp>) {
    for op in rx {
        match op {
            MirrorOp::Save(label) => {
                if let Err(e) = backend.save(&label) {
                    tracing::warn!("Failed to persist label {}: {e}", label.id);
                }
            }
            MirrorOp::Delete(id) => {
                if let Err(e) = backend.delete(&id) {
                    tracing::warn!("Failed to delete persisted label {id}: {e}");
                }
            }
            MirrorOp::DeleteByDefinition(label_def_id) => match backend.delete_by_definition(&label_def_id) {
                Ok(0) => {}
                Ok(n) => tracing::debug!("Deleted {n} stored labels of definition {label_def_id}"),
                Err(e) => tracing::warn!("Failed to delete stored labels of definition {label_def_id}: {e}"),
            },
            MirrorOp::Load { dataset_id, reply } => {
                let _ = reply.send(backend.load_dataset(&dataset_id));
            }
            MirrorOp::Flush(done) => {
                let _ = done.send(());
            }
            MirrorOp::Shutdown => break,
        }
    }
    tracing::debug!("Label persistence worker stopped");
}

/// Cheap, cloneable sender side of a [`PersistenceMirror`].
#[derive(Clone)]
pub struct MirrorHandle {
    tx: Sender<MirrorOp>,
}

impl MirrorHandle {
    pub fn save(&self, label: &Label) {
        if self.tx.send(MirrorOp::Save(label.clone())).is_err() {
            tracing::warn!("Label {} not persisted: {}", label.id, PersistenceError::WorkerGone);
        }
    }

    pub fn delete(&self, id: &str) {
        if self.tx.send(MirrorOp::Delete(id.to_string())).is_err() {
            tracing::warn!("Label {id} not deleted from storage: {}", PersistenceError::WorkerGone);
        }
    }

    /// Delete stored labels of `label_def_id` in every dataset, including
    /// datasets with no open store.
    pub fn delete_by_definition(&self, label_def_id: &str) {
        if self
            .tx
            .send(MirrorOp::DeleteByDefinition(label_def_id.to_string()))
            .is_err()
        {
            tracing::warn!(
                "Labels of definition {label_def_id} not deleted from storage: {}",
                PersistenceError::WorkerGone
            );
        }
    }

    /// Load one dataset's labels, waiting for all previously queued writes.
    pub fn load_dataset(&self, dataset_id: &str) -> Result<Vec<Label>, PersistenceError> {
        let (reply, response) = mpsc::channel();
        self.tx
            .send(MirrorOp::Load { dataset_id: dataset_id.to_string(), reply })
            .map_err(|_| PersistenceError::WorkerGone)?;
        response.recv().map_err(|_| PersistenceError::WorkerGone)?
    }

    /// Block until every write queued so far has been applied.
    pub fn flush(&self) {
        let (done, wait) = mpsc::channel();
        if self.tx.send(MirrorOp::Flush(done)).is_ok() {
            let _ = wait.recv();
        }
    }
}

impl std::fmt::Debug for MirrorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MirrorHandle")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("oxidelabel-persist-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn json_backend_round_trips_through_disk() {
        let dir = temp_dir();
        let a = Label::new("ds-1", 0.0, 5.0, "def", 1);
        let b = Label::new("ds-2", 3.0, 4.0, "def", 2);

        let mut backend = JsonFilePersistence::in_dir(&dir);
        backend.save(&a).unwrap();
        backend.save(&b).unwrap();

        let mut reopened = JsonFilePersistence::in_dir(&dir);
        assert_eq!(reopened.load_all().unwrap(), vec![a.clone(), b.clone()]);
        assert_eq!(reopened.load_dataset("ds-2").unwrap(), vec![b]);

        reopened.delete(&a.id).unwrap();
        let mut third = JsonFilePersistence::in_dir(&dir);
        assert_eq!(third.load_dataset("ds-1").unwrap(), Vec::<Label>::new());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn json_backend_deletes_definition_across_datasets() {
        let dir = temp_dir();
        let gone_a = Label::new("ds-1", 0.0, 1.0, "gone", 1);
        let gone_b = Label::new("ds-2", 0.0, 1.0, "gone", 2);
        let kept = Label::new("ds-2", 2.0, 3.0, "kept", 3);

        let mut backend = JsonFilePersistence::in_dir(&dir);
        for label in [&gone_a, &gone_b, &kept] {
            backend.save(label).unwrap();
        }
        assert_eq!(backend.delete_by_definition("gone").unwrap(), 2);
        assert_eq!(backend.delete_by_definition("gone").unwrap(), 0);

        let mut reopened = JsonFilePersistence::in_dir(&dir);
        assert_eq!(reopened.load_all().unwrap(), vec![kept]);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn json_backend_reports_corrupt_file() {
        let dir = temp_dir();
        std::fs::write(dir.join(LABELS_FILE_NAME), "{ not json").unwrap();
        let mut backend = JsonFilePersistence::in_dir(&dir);
        assert!(matches!(backend.load_all(), Err(PersistenceError::Json(_))));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn mirror_applies_writes_in_order() {
        let memory = MemoryPersistence::new();
        let mirror = PersistenceMirror::spawn(Box::new(memory.clone()));
        let handle = mirror.handle();

        let mut label = Label::new("ds", 1.0, 2.0, "def", 10);
        handle.save(&label);
        label.end_time = 3.0;
        handle.save(&label);
        handle.flush();

        assert_eq!(memory.labels(), vec![label.clone()]);
        assert_eq!(handle.load_dataset("ds").unwrap(), vec![label.clone()]);

        handle.delete(&label.id);
        handle.flush();
        assert!(memory.labels().is_empty());
    }

    #[test]
    fn mirror_survives_rejected_writes() {
        let memory = MemoryPersistence::new();
        let mirror = PersistenceMirror::spawn(Box::new(memory.clone()));
        let handle = mirror.handle();

        memory.set_fail_writes(true);
        handle.save(&Label::new("ds", 1.0, 2.0, "def", 10));
        handle.flush();
        assert!(memory.labels().is_empty());

        memory.set_fail_writes(false);
        let ok = Label::new("ds", 4.0, 6.0, "def", 11);
        handle.save(&ok);
        handle.flush();
        assert_eq!(memory.labels(), vec![ok]);
    }

    #[test]
    fn handle_outliving_mirror_reports_worker_gone() {
        let handle = PersistenceMirror::spawn(Box::new(MemoryPersistence::new())).handle();
        assert!(matches!(handle.load_dataset("ds"), Err(PersistenceError::WorkerGone)));
        // Fire-and-forget calls only log.
        handle.save(&Label::new("ds", 1.0, 2.0, "def", 1));
        handle.flush();
    }
}
