use serde::{Deserialize, Serialize};

/// Colors handed out to new label definitions, cycled by index.
pub const LABEL_PALETTE: [[u8; 4]; 8] = [
    [230, 80, 80, 255],   // Red
    [80, 170, 240, 255],  // Blue
    [90, 200, 120, 255],  // Green
    [250, 190, 60, 255],  // Amber
    [190, 110, 230, 255], // Purple
    [60, 210, 210, 255],  // Cyan
    [255, 140, 60, 255],  // Orange
    [240, 120, 190, 255], // Pink
];

pub fn color_for_index(index: usize) -> [u8; 4] {
    LABEL_PALETTE[index % LABEL_PALETTE.len()]
}

pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// A labeled time interval `[start_time, end_time]` on one dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Label {
    pub id: String,
    pub dataset_id: String,
    pub start_time: f64,
    pub end_time: f64,
    /// Reference into the label-definition registry; name and color live there.
    pub label_def_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visible: Option<bool>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Label {
    /// Create a label with a fresh id. The endpoints may be given in either order.
    pub fn new(dataset_id: &str, a: f64, b: f64, label_def_id: &str, now: i64) -> Self {
        Self {
            id: new_id(),
            dataset_id: dataset_id.to_string(),
            start_time: a.min(b),
            end_time: a.max(b),
            label_def_id: label_def_id.to_string(),
            visible: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Absent means visible.
    pub fn is_visible(&self) -> bool {
        self.visible != Some(false)
    }

    pub fn contains(&self, x: f64) -> bool {
        x >= self.start_time && x <= self.end_time
    }
}

/// Partial update for a [`Label`].
///
/// `id`, `dataset_id` and `created_at` are accepted so callers can pass
/// whole records through, but the store never applies them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LabelPatch {
    pub id: Option<String>,
    pub dataset_id: Option<String>,
    pub created_at: Option<i64>,
    pub start_time: Option<f64>,
    pub end_time: Option<f64>,
    pub label_def_id: Option<String>,
    pub visible: Option<bool>,
}

impl LabelPatch {
    pub fn touches_protected_fields(&self) -> bool {
        self.id.is_some() || self.dataset_id.is_some() || self.created_at.is_some()
    }
}

/// Display metadata for a class of labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelDefinition {
    pub id: String,
    pub name: String,
    pub color: [u8; 4],
}

impl LabelDefinition {
    pub fn color32(&self) -> egui::Color32 {
        egui::Color32::from_rgba_unmultiplied(self.color[0], self.color[1], self.color[2], self.color[3])
    }
}

/// In-process registry of label definitions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LabelDefinitionRegistry {
    definitions: Vec<LabelDefinition>,
}

impl LabelDefinitionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.add("Event");
        registry.add("Anomaly");
        registry
    }

    /// Add a definition with the next palette color; returns its id.
    pub fn add(&mut self, name: &str) -> String {
        let definition = LabelDefinition {
            id: new_id(),
            name: name.to_string(),
            color: color_for_index(self.definitions.len()),
        };
        let id = definition.id.clone();
        self.definitions.push(definition);
        id
    }

    pub fn rename(&mut self, id: &str, name: &str) -> bool {
        match self.definitions.iter_mut().find(|d| d.id == id) {
            Some(d) => {
                d.name = name.to_string();
                true
            }
            None => false,
        }
    }

    pub fn set_color(&mut self, id: &str, color: [u8; 4]) -> bool {
        match self.definitions.iter_mut().find(|d| d.id == id) {
            Some(d) => {
                d.color = color;
                true
            }
            None => false,
        }
    }

    /// Remove a definition. Labels referencing it must be removed by the caller.
    pub fn remove(&mut self, id: &str) -> Option<LabelDefinition> {
        let pos = self.definitions.iter().position(|d| d.id == id)?;
        Some(self.definitions.remove(pos))
    }

    pub fn resolve(&self, id: &str) -> Option<&LabelDefinition> {
        self.definitions.iter().find(|d| d.id == id)
    }

    pub fn list(&self) -> &[LabelDefinition] {
        &self.definitions
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_label_orders_endpoints() {
        let label = Label::new("ds", 20.0, 5.0, "def", 100);
        assert_eq!(label.start_time, 5.0);
        assert_eq!(label.end_time, 20.0);
        assert_eq!(label.created_at, label.updated_at);
        assert!(label.is_visible());
    }

    #[test]
    fn label_serializes_camel_case_without_absent_visibility() {
        let label = Label::new("ds", 1.0, 2.0, "def", 7);
        let json = serde_json::to_value(&label).unwrap();
        assert_eq!(json["datasetId"], "ds");
        assert_eq!(json["labelDefId"], "def");
        assert!(json.get("visible").is_none());

        let back: Label = serde_json::from_value(json).unwrap();
        assert_eq!(back, label);
    }

    #[test]
    fn patch_from_partial_json() {
        let patch: LabelPatch =
            serde_json::from_str(r#"{"id":"other","createdAt":0,"startTime":99}"#).unwrap();
        assert!(patch.touches_protected_fields());
        assert_eq!(patch.start_time, Some(99.0));
        assert_eq!(patch.end_time, None);
    }

    #[test]
    fn registry_resolves_and_removes() {
        let mut registry = LabelDefinitionRegistry::with_defaults();
        assert_eq!(registry.list().len(), 2);
        let id = registry.add("Walking");
        assert!(registry.rename(&id, "Running"));
        assert_eq!(registry.resolve(&id).map(|d| d.name.as_str()), Some("Running"));
        assert_eq!(registry.remove(&id).map(|d| d.name), Some("Running".to_string()));
        assert!(registry.resolve(&id).is_none());
        assert!(!registry.rename("missing", "x"));
    }
}
