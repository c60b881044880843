use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::data::label_persistence::MirrorHandle;
use crate::render::label_drawing::{DrawingConfig, DrawingOutcome, FeedbackSink, LabelDrawingSession, SessionContext};
use crate::state::events::SubscriptionId;
use crate::state::label_store::{LabelEvent, LabelEventKind, LabelStore};

pub const VERSION: &str = "0.1.0";

/// Session context shared by the shell: one [`LabelStore`] per opened
/// dataset, the active dataset, and the drawing session bound to it.
///
/// Switching datasets always abandons an in-progress drag before the
/// authoritative store changes.
#[derive(Debug)]
pub struct Workspace {
    mirror: MirrorHandle,
    stores: HashMap<String, LabelStore>,
    active: Option<String>,
    session: LabelDrawingSession,
    /// Additions and removals in open datasets, oldest first, until taken.
    activity: Rc<RefCell<Vec<LabelEvent>>>,
    listeners: HashMap<String, Vec<SubscriptionId>>,
}

impl Workspace {
    pub fn new(mirror: MirrorHandle, drawing: DrawingConfig) -> Self {
        Self {
            mirror,
            stores: HashMap::new(),
            active: None,
            session: LabelDrawingSession::new(
                SessionContext {
                    dataset_id: String::new(),
                },
                drawing,
            ),
            activity: Rc::new(RefCell::new(Vec::new())),
            listeners: HashMap::new(),
        }
    }

    /// Make `dataset_id` the active dataset, loading its saved labels the
    /// first time it is seen.
    pub fn open_dataset(&mut self, dataset_id: &str, sink: &mut dyn FeedbackSink) -> DrawingOutcome {
        let outcome = self.session.switch_context(
            SessionContext {
                dataset_id: dataset_id.to_string(),
            },
            sink,
        );
        let store = self
            .stores
            .entry(dataset_id.to_string())
            .or_insert_with(|| LabelStore::open(dataset_id, self.mirror.clone()));
        if !self.listeners.contains_key(dataset_id) {
            let ids = [LabelEventKind::Added, LabelEventKind::Removed]
                .into_iter()
                .map(|kind| {
                    let activity = Rc::clone(&self.activity);
                    store.subscribe(kind, move |event| activity.borrow_mut().push(event.clone()))
                })
                .collect();
            self.listeners.insert(dataset_id.to_string(), ids);
        }
        if self.active.as_deref() != Some(dataset_id) {
            tracing::info!("Active dataset is now {dataset_id}");
        }
        self.active = Some(dataset_id.to_string());
        outcome
    }

    /// Stop reporting activity for `dataset_id`. Its store stays cached so
    /// reopening it does not reload from storage. Closing the active dataset
    /// abandons any drag and leaves no dataset active.
    pub fn close_dataset(&mut self, dataset_id: &str, sink: &mut dyn FeedbackSink) {
        if let (Some(ids), Some(store)) = (self.listeners.remove(dataset_id), self.stores.get_mut(dataset_id)) {
            for id in ids {
                store.unsubscribe(id);
            }
        }
        if self.active.as_deref() == Some(dataset_id) {
            self.session.disable(sink);
            self.active = None;
            tracing::info!("Closed active dataset {dataset_id}");
        }
    }

    /// Label additions and removals since the last call.
    pub fn take_activity(&self) -> Vec<LabelEvent> {
        std::mem::take(&mut *self.activity.borrow_mut())
    }

    pub fn active_dataset(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn active_store(&self) -> Option<&LabelStore> {
        self.stores.get(self.active.as_deref()?)
    }

    pub fn active_store_mut(&mut self) -> Option<&mut LabelStore> {
        self.stores.get_mut(self.active.as_deref()?)
    }

    #[cfg(test)]
    pub fn store(&self, dataset_id: &str) -> Option<&LabelStore> {
        self.stores.get(dataset_id)
    }

    pub fn session(&self) -> &LabelDrawingSession {
        &self.session
    }

    #[cfg(test)]
    pub fn session_mut(&mut self) -> &mut LabelDrawingSession {
        &mut self.session
    }

    /// The drawing session together with the active store, borrowed at once.
    pub fn drawing_parts(&mut self) -> Option<(&mut LabelDrawingSession, &mut LabelStore)> {
        let store = self.stores.get_mut(self.active.as_deref()?)?;
        Some((&mut self.session, store))
    }

    pub fn set_drawing_config(&mut self, config: DrawingConfig) {
        self.session.set_config(config);
    }

    /// Remove every label that uses `label_def_id`: from each open store, and
    /// from storage for datasets that have not been opened yet. Returns the
    /// number removed from open stores.
    pub fn remove_labels_for_definition(&mut self, label_def_id: &str) -> usize {
        let removed: usize = self
            .stores
            .values_mut()
            .map(|store| store.remove_by_definition(label_def_id))
            .sum();
        self.mirror.delete_by_definition(label_def_id);
        if removed > 0 {
            tracing::info!("Removed {removed} labels of deleted definition {label_def_id}");
        }
        removed
    }

    /// Wait for queued label writes to reach storage.
    pub fn flush(&self) {
        self.mirror.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::label_persistence::{MemoryPersistence, PersistenceMirror};
    use crate::render::coordinate_mapper::{AffineTransform, PixelRect, ViewDomain};
    use crate::render::label_drawing::{DrawingFeedback, DrawingPhase, PlotFrame};
    use crate::state::label::Label;

    struct NullSink;

    impl FeedbackSink for NullSink {
        fn show(&mut self, _: DrawingFeedback) {}
        fn clear(&mut self) {}
    }

    #[test]
    fn stores_are_per_dataset() {
        let saved = Label::new("b", 1.0, 2.0, "def", 0);
        let backend = MemoryPersistence::with_labels([saved.clone()]);
        let mirror = PersistenceMirror::spawn(Box::new(backend));
        let mut ws = Workspace::new(mirror.handle(), DrawingConfig::default());
        let mut sink = NullSink;

        ws.open_dataset("a", &mut sink);
        assert!(ws.active_store().unwrap().is_empty());
        ws.active_store_mut().unwrap().add(Label::new("a", 0.0, 5.0, "def", 0));

        ws.open_dataset("b", &mut sink);
        assert_eq!(ws.active_dataset(), Some("b"));
        assert_eq!(ws.active_store().unwrap().list(), &[saved][..]);
        assert_eq!(ws.store("a").map(|s| s.len()), Some(1));
    }

    #[test]
    fn switching_mid_drag_abandons_gesture() {
        let mirror = PersistenceMirror::spawn(Box::new(MemoryPersistence::new()));
        let mut ws = Workspace::new(mirror.handle(), DrawingConfig::default());
        let mut sink = NullSink;
        ws.open_dataset("a", &mut sink);

        let transform = AffineTransform::new(ViewDomain { x: (0.0, 10.0), y: None }, PixelRect::new(0.0, 0.0, 10.0, 10.0));
        let samples = [[1.0, 0.0], [2.0, 0.0], [9.0, 0.0]];
        let frame = PlotFrame { transform: &transform, samples: &samples, label_def_id: Some("def") };
        ws.session_mut().enable();
        ws.session_mut().pointer_down(egui::pos2(1.0, 1.0), &frame, &mut sink);
        assert!(ws.session().is_dragging());

        assert_eq!(ws.open_dataset("b", &mut sink), DrawingOutcome::Abandoned);
        assert_eq!(ws.session().phase(), DrawingPhase::Idle);
        assert_eq!(ws.session().context().dataset_id, "b");

        // Re-enabled drawing on the new dataset lands in its own store.
        let (session, store) = ws.drawing_parts().unwrap();
        session.enable();
        session.pointer_down(egui::pos2(1.0, 1.0), &frame, &mut sink);
        let outcome = session.pointer_up(egui::pos2(9.0, 1.0), &frame, store, &mut sink);
        assert!(matches!(outcome, DrawingOutcome::Created(_)));
        assert_eq!(ws.store("b").map(|s| s.len()), Some(1));
        assert_eq!(ws.store("a").map(|s| s.len()), Some(0));
    }

    #[test]
    fn deleting_definition_cascades_everywhere() {
        let backend = MemoryPersistence::new();
        let mirror = PersistenceMirror::spawn(Box::new(backend.clone()));
        let mut ws = Workspace::new(mirror.handle(), DrawingConfig::default());
        let mut sink = NullSink;

        ws.open_dataset("a", &mut sink);
        ws.active_store_mut().unwrap().add(Label::new("a", 0.0, 1.0, "gone", 0));
        ws.active_store_mut().unwrap().add(Label::new("a", 2.0, 3.0, "kept", 0));
        ws.open_dataset("b", &mut sink);
        ws.active_store_mut().unwrap().add(Label::new("b", 0.0, 1.0, "gone", 0));

        assert_eq!(ws.remove_labels_for_definition("gone"), 2);
        ws.flush();
        let remaining = backend.labels();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].label_def_id, "kept");
    }

    #[test]
    fn deleting_definition_reaches_datasets_not_yet_opened() {
        let unopened = Label::new("later", 0.0, 1.0, "gone", 0);
        let survivor = Label::new("later", 2.0, 3.0, "kept", 0);
        let backend = MemoryPersistence::with_labels([unopened, survivor.clone()]);
        let mirror = PersistenceMirror::spawn(Box::new(backend.clone()));
        let mut ws = Workspace::new(mirror.handle(), DrawingConfig::default());
        let mut sink = NullSink;

        ws.open_dataset("a", &mut sink);
        assert_eq!(ws.remove_labels_for_definition("gone"), 0);
        ws.flush();
        assert_eq!(backend.labels(), vec![survivor.clone()]);

        ws.open_dataset("later", &mut sink);
        assert_eq!(ws.active_store().unwrap().list(), &[survivor][..]);
    }

    #[test]
    fn activity_reports_additions_and_removals_until_closed() {
        let mirror = PersistenceMirror::spawn(Box::new(MemoryPersistence::new()));
        let mut ws = Workspace::new(mirror.handle(), DrawingConfig::default());
        let mut sink = NullSink;
        ws.open_dataset("a", &mut sink);

        let label = Label::new("a", 0.0, 5.0, "def", 0);
        let store = ws.active_store_mut().unwrap();
        store.add(label.clone());
        store.toggle_visibility(&label.id);
        store.remove(&label.id);

        let seen = ws.take_activity();
        assert_eq!(seen.len(), 2);
        assert!(matches!(&seen[0], LabelEvent::Added(l) if l.id == label.id));
        assert!(matches!(&seen[1], LabelEvent::Removed(l) if l.id == label.id));
        assert!(ws.take_activity().is_empty());

        ws.close_dataset("a", &mut sink);
        assert_eq!(ws.active_dataset(), None);
        assert!(ws.active_store_mut().is_none());
        assert_eq!(ws.store("a").map(|s| s.len()), Some(0));

        // Reopening subscribes once more, not twice.
        ws.open_dataset("a", &mut sink);
        ws.active_store_mut().unwrap().add(Label::new("a", 1.0, 2.0, "def", 0));
        assert_eq!(ws.take_activity().len(), 1);
    }
}
