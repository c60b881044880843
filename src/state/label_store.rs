use crate::data::datetime;
use crate::data::label_persistence::MirrorHandle;
use crate::state::events::{BusEvent, EventBus, SubscriptionId};
use crate::state::label::{Label, LabelPatch};

/// Change notifications published by a [`LabelStore`].
///
/// Each carries the label as it is after the mutation (or as it was, for
/// removals).
#[derive(Debug, Clone, PartialEq)]
pub enum LabelEvent {
    Added(Label),
    Removed(Label),
    Updated(Label),
    VisibilityChanged(Label),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LabelEventKind {
    Added,
    Removed,
    Updated,
    VisibilityChanged,
}

impl BusEvent for LabelEvent {
    type Kind = LabelEventKind;

    fn kind(&self) -> LabelEventKind {
        match self {
            LabelEvent::Added(_) => LabelEventKind::Added,
            LabelEvent::Removed(_) => LabelEventKind::Removed,
            LabelEvent::Updated(_) => LabelEventKind::Updated,
            LabelEvent::VisibilityChanged(_) => LabelEventKind::VisibilityChanged,
        }
    }
}

/// Authoritative in-memory labels for one dataset.
///
/// Every mutation is visible through [`LabelStore::list`] before subscribers
/// are notified, and is then queued to the persistence mirror (if any).
/// Storage failures never roll back the in-memory state.
pub struct LabelStore {
    dataset_id: String,
    labels: Vec<Label>,
    events: EventBus<LabelEvent>,
    mirror: Option<MirrorHandle>,
    clock: fn() -> i64,
}

impl LabelStore {
    /// A store with no persistence behind it.
    pub fn new(dataset_id: &str) -> Self {
        Self {
            dataset_id: dataset_id.to_string(),
            labels: Vec::new(),
            events: EventBus::new(),
            mirror: None,
            clock: datetime::now_millis,
        }
    }

    /// A store mirrored to storage, pre-filled with the dataset's saved labels.
    /// A failed load is logged and leaves the store empty.
    pub fn open(dataset_id: &str, mirror: MirrorHandle) -> Self {
        let mut store = Self::new(dataset_id);
        match mirror.load_dataset(dataset_id) {
            Ok(labels) => {
                tracing::info!("Loaded {} labels for {dataset_id}", labels.len());
                store.labels = labels;
            }
            Err(e) => tracing::warn!("Could not load labels for {dataset_id}: {e}"),
        }
        store.mirror = Some(mirror);
        store
    }

    #[cfg(test)]
    pub fn with_clock(mut self, clock: fn() -> i64) -> Self {
        self.clock = clock;
        self
    }

    pub fn dataset_id(&self) -> &str {
        &self.dataset_id
    }

    pub fn now(&self) -> i64 {
        (self.clock)()
    }

    pub fn list(&self) -> &[Label] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Label> {
        self.labels.iter().find(|l| l.id == id)
    }

    /// The most recently added visible label covering `x`.
    pub fn label_at(&self, x: f64) -> Option<&Label> {
        self.labels.iter().rev().find(|l| l.is_visible() && l.contains(x))
    }

    pub fn subscribe(&mut self, kind: LabelEventKind, callback: impl FnMut(&LabelEvent) + 'static) -> SubscriptionId {
        self.events.subscribe(kind, callback)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    /// Add a label. Labels for another dataset, or with an id already in the
    /// store, are ignored and `false` is returned.
    pub fn add(&mut self, label: Label) -> bool {
        if label.dataset_id != self.dataset_id {
            tracing::warn!(
                "Ignoring label {} for dataset {} in store for {}",
                label.id,
                label.dataset_id,
                self.dataset_id
            );
            return false;
        }
        if self.get(&label.id).is_some() {
            tracing::debug!("Ignoring duplicate label id {}", label.id);
            return false;
        }

        self.labels.push(label.clone());
        tracing::info!("Added label {} [{}, {}]", label.id, label.start_time, label.end_time);
        self.events.emit(&LabelEvent::Added(label.clone()));
        if let Some(mirror) = &self.mirror {
            mirror.save(&label);
        }
        true
    }

    pub fn remove(&mut self, id: &str) -> Option<Label> {
        let pos = self.labels.iter().position(|l| l.id == id)?;
        let removed = self.labels.remove(pos);
        tracing::info!("Removed label {id}");
        self.events.emit(&LabelEvent::Removed(removed.clone()));
        if let Some(mirror) = &self.mirror {
            mirror.delete(id);
        }
        Some(removed)
    }

    /// Remove every label referencing a deleted label definition.
    pub fn remove_by_definition(&mut self, label_def_id: &str) -> usize {
        let ids: Vec<String> = self
            .labels
            .iter()
            .filter(|l| l.label_def_id == label_def_id)
            .map(|l| l.id.clone())
            .collect();
        for id in &ids {
            self.remove(id);
        }
        ids.len()
    }

    /// Flip visibility: absent or `true` becomes `false`, `false` becomes `true`.
    /// Returns the new visibility, or `None` for an unknown id.
    pub fn toggle_visibility(&mut self, id: &str) -> Option<bool> {
        let now = self.now();
        let label = self.labels.iter_mut().find(|l| l.id == id)?;
        let visible = !label.is_visible();
        label.visible = Some(visible);
        label.updated_at = now;
        let snapshot = label.clone();

        self.events.emit(&LabelEvent::VisibilityChanged(snapshot.clone()));
        if let Some(mirror) = &self.mirror {
            mirror.save(&snapshot);
        }
        Some(visible)
    }

    /// Apply a partial update. `id`, `dataset_id` and `created_at` are never
    /// changed; `updated_at` is always refreshed. Unknown ids are a no-op.
    pub fn update(&mut self, id: &str, patch: LabelPatch) -> Option<&Label> {
        let now = self.now();
        let pos = self.labels.iter().position(|l| l.id == id)?;

        if patch.touches_protected_fields() {
            tracing::debug!("Ignoring protected fields in update of label {id}");
        }

        let label = &mut self.labels[pos];
        if let Some(start) = patch.start_time {
            label.start_time = start;
        }
        if let Some(end) = patch.end_time {
            label.end_time = end;
        }
        if let Some(def) = patch.label_def_id {
            label.label_def_id = def;
        }
        if let Some(visible) = patch.visible {
            label.visible = Some(visible);
        }
        label.updated_at = now;
        let snapshot = label.clone();

        self.events.emit(&LabelEvent::Updated(snapshot.clone()));
        if let Some(mirror) = &self.mirror {
            mirror.save(&snapshot);
        }
        self.labels.get(pos)
    }
}

impl std::fmt::Debug for LabelStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LabelStore")
            .field("dataset_id", &self.dataset_id)
            .field("labels", &self.labels.len())
            .field("persistent", &self.mirror.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::label_persistence::{MemoryPersistence, PersistenceMirror};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn clock() -> i64 {
        5_000
    }

    fn store_with(label: &Label) -> LabelStore {
        let mut store = LabelStore::new("ds").with_clock(clock);
        assert!(store.add(label.clone()));
        store
    }

    #[test]
    fn update_protects_identity_fields() {
        let label = Label::new("ds", 5.0, 20.0, "def", 100);
        let mut store = store_with(&label);

        let patch = LabelPatch {
            id: Some("other".to_string()),
            created_at: Some(0),
            start_time: Some(99.0),
            ..Default::default()
        };
        let updated = store.update(&label.id, patch).cloned().unwrap();

        assert_eq!(updated.id, label.id);
        assert_eq!(updated.created_at, 100);
        assert_eq!(updated.dataset_id, "ds");
        assert_eq!(updated.start_time, 99.0);
        assert_eq!(updated.end_time, 20.0);
        assert_eq!(updated.updated_at, 5_000);
        assert!(store.get("other").is_none());
    }

    #[test]
    fn empty_update_still_refreshes_timestamp() {
        let label = Label::new("ds", 1.0, 2.0, "def", 100);
        let mut store = store_with(&label);
        let updated = store.update(&label.id, LabelPatch::default()).cloned().unwrap();
        assert_eq!(updated.updated_at, 5_000);
    }

    #[test]
    fn toggle_visibility_cycles_back_to_visible() {
        let label = Label::new("ds", 1.0, 2.0, "def", 100);
        let mut store = store_with(&label);
        assert_eq!(label.visible, None);

        assert_eq!(store.toggle_visibility(&label.id), Some(false));
        assert!(!store.get(&label.id).unwrap().is_visible());
        assert_eq!(store.toggle_visibility(&label.id), Some(true));
        assert!(store.get(&label.id).unwrap().is_visible());
        assert_eq!(store.get(&label.id).unwrap().updated_at, 5_000);
    }

    #[test]
    fn unknown_ids_are_no_ops() {
        let mut store = LabelStore::new("ds");
        let events = Rc::new(RefCell::new(0));
        for kind in [
            LabelEventKind::Added,
            LabelEventKind::Removed,
            LabelEventKind::Updated,
            LabelEventKind::VisibilityChanged,
        ] {
            let e = events.clone();
            store.subscribe(kind, move |_| *e.borrow_mut() += 1);
        }

        assert_eq!(store.toggle_visibility("missing"), None);
        assert!(store.update("missing", LabelPatch::default()).is_none());
        assert!(store.remove("missing").is_none());
        assert_eq!(*events.borrow(), 0);
    }

    #[test]
    fn rejects_foreign_dataset_and_duplicate_ids() {
        let mut store = LabelStore::new("ds");
        assert!(!store.add(Label::new("elsewhere", 1.0, 2.0, "def", 1)));
        let label = Label::new("ds", 1.0, 2.0, "def", 1);
        assert!(store.add(label.clone()));
        assert!(!store.add(label));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn list_is_current_when_subscribers_run() {
        let mut store = LabelStore::new("ds");
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = seen.clone();
        store.subscribe(LabelEventKind::Added, move |event| {
            if let LabelEvent::Added(label) = event {
                s.borrow_mut().push(label.id.clone());
            }
        });

        let label = Label::new("ds", 1.0, 2.0, "def", 1);
        store.add(label.clone());
        store.remove(&label.id);

        assert_eq!(*seen.borrow(), vec![label.id]);
    }

    #[test]
    fn remove_by_definition_cascades() {
        let mut store = LabelStore::new("ds");
        store.add(Label::new("ds", 1.0, 2.0, "walk", 1));
        store.add(Label::new("ds", 3.0, 4.0, "run", 2));
        store.add(Label::new("ds", 5.0, 6.0, "walk", 3));

        assert_eq!(store.remove_by_definition("walk"), 2);
        assert_eq!(store.len(), 1);
        assert_eq!(store.list()[0].label_def_id, "run");
    }

    #[test]
    fn label_at_prefers_latest_visible() {
        let mut store = LabelStore::new("ds");
        let a = Label::new("ds", 0.0, 10.0, "def", 1);
        let b = Label::new("ds", 5.0, 15.0, "def", 2);
        store.add(a.clone());
        store.add(b.clone());

        assert_eq!(store.label_at(7.0).map(|l| l.id.clone()), Some(b.id.clone()));
        store.toggle_visibility(&b.id);
        assert_eq!(store.label_at(7.0).map(|l| l.id.clone()), Some(a.id));
        assert!(store.label_at(20.0).is_none());
    }

    #[test]
    fn mutations_are_mirrored_and_survive_storage_failure() {
        let memory = MemoryPersistence::new();
        let mirror = PersistenceMirror::spawn(Box::new(memory.clone()));
        let mut store = LabelStore::open("ds", mirror.handle());

        let kept = Label::new("ds", 1.0, 2.0, "def", 1);
        store.add(kept.clone());
        mirror.handle().flush();
        assert_eq!(memory.labels(), vec![kept.clone()]);

        memory.set_fail_writes(true);
        let unsaved = Label::new("ds", 3.0, 4.0, "def", 2);
        store.add(unsaved.clone());
        store.remove(&kept.id);
        mirror.handle().flush();

        assert_eq!(store.list(), &[unsaved][..]);
        assert_eq!(memory.labels(), vec![kept]);
    }

    #[test]
    fn open_loads_only_its_dataset() {
        let mine = Label::new("ds", 1.0, 2.0, "def", 1);
        let other = Label::new("other", 1.0, 2.0, "def", 2);
        let memory = MemoryPersistence::with_labels([mine.clone(), other]);
        let mirror = PersistenceMirror::spawn(Box::new(memory));

        let store = LabelStore::open("ds", mirror.handle());
        assert_eq!(store.list(), &[mine][..]);
    }
}
