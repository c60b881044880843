//! User settings, stored as `config.json` in the data directory.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::processing::autoscale::DEFAULT_PADDING;
use crate::render::label_drawing::DrawingConfig;
use crate::state::label::LabelDefinitionRegistry;
use crate::state::theme::Theme;

pub const CONFIG_FILE_NAME: &str = "config.json";
pub const DATA_DIR_ENV: &str = "OXIDELABEL_DATA_DIR";
pub const DEFAULT_DATA_DIR: &str = "oxidelabel-data";

/// Directory holding `config.json` and `labels.json`.
pub fn data_dir() -> PathBuf {
    std::env::var_os(DATA_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub snap_to_samples: bool,
    pub min_label_width_px: f32,
    pub autoscale_padding: f64,
    pub auto_scale_y: bool,
    pub theme: Theme,
    pub label_definitions: LabelDefinitionRegistry,
    pub active_label_def: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        let label_definitions = LabelDefinitionRegistry::with_defaults();
        let active_label_def = label_definitions.list().first().map(|d| d.id.clone());
        Self {
            snap_to_samples: true,
            min_label_width_px: 3.0,
            autoscale_padding: DEFAULT_PADDING,
            auto_scale_y: true,
            theme: Theme::default(),
            label_definitions,
            active_label_def,
        }
    }
}

impl AppConfig {
    /// Read the config in `dir`. A missing or unreadable file gives defaults.
    pub fn load(dir: &Path) -> Self {
        let path = dir.join(CONFIG_FILE_NAME);
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No config at {path:?}; using defaults");
                return Self::default();
            }
            Err(e) => {
                tracing::warn!("Could not read {path:?}: {e}; using defaults");
                return Self::default();
            }
        };
        match serde_json::from_str::<AppConfig>(&text) {
            Ok(mut config) => {
                config.sanitize();
                config
            }
            Err(e) => {
                tracing::warn!("Malformed config {path:?}: {e}; using defaults");
                Self::default()
            }
        }
    }

    pub fn save(&self, dir: &Path) -> std::io::Result<()> {
        std::fs::create_dir_all(dir)?;
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(dir.join(CONFIG_FILE_NAME), json)?;
        tracing::info!("Saved config to {:?}", dir.join(CONFIG_FILE_NAME));
        Ok(())
    }

    pub fn drawing_config(&self) -> DrawingConfig {
        DrawingConfig {
            snap_to_samples: self.snap_to_samples,
            min_width_px: self.min_label_width_px,
        }
    }

    /// Clamp out-of-range values and drop a dangling active definition.
    fn sanitize(&mut self) {
        if !self.min_label_width_px.is_finite() || self.min_label_width_px < 0.0 {
            self.min_label_width_px = 3.0;
        }
        if !self.autoscale_padding.is_finite() || self.autoscale_padding < 0.0 {
            self.autoscale_padding = DEFAULT_PADDING;
        }
        let dangling = self
            .active_label_def
            .as_deref()
            .is_some_and(|id| self.label_definitions.resolve(id).is_none());
        if dangling || self.active_label_def.is_none() {
            self.active_label_def = self.label_definitions.list().first().map(|d| d.id.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("oxidelabel-config-{}", uuid::Uuid::new_v4()))
    }

    #[test]
    fn defaults_select_first_definition() {
        let config = AppConfig::default();
        assert_eq!(config.label_definitions.list().len(), 2);
        assert_eq!(
            config.active_label_def.as_deref(),
            config.label_definitions.list().first().map(|d| d.id.as_str())
        );
        assert!(config.snap_to_samples);
        assert_eq!(config.autoscale_padding, 0.1);
    }

    #[test]
    fn save_then_load() {
        let dir = temp_dir();
        let mut config = AppConfig::default();
        config.snap_to_samples = false;
        config.theme = Theme::Light;
        config.save(&dir).unwrap();

        assert_eq!(AppConfig::load(&dir), config);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_or_malformed_falls_back() {
        let dir = temp_dir();
        assert!(AppConfig::load(&dir).snap_to_samples);

        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(CONFIG_FILE_NAME), "{not json").unwrap();
        assert_eq!(AppConfig::load(&dir).min_label_width_px, 3.0);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = temp_dir();
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join(CONFIG_FILE_NAME),
            r#"{"auto_scale_y": false, "min_label_width_px": -4, "active_label_def": "gone"}"#,
        )
        .unwrap();

        let config = AppConfig::load(&dir);
        assert!(!config.auto_scale_y);
        assert_eq!(config.min_label_width_px, 3.0);
        let active = config.active_label_def.unwrap();
        assert!(config.label_definitions.resolve(&active).is_some());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
