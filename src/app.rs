use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use eframe::egui;

use crate::config::{self, AppConfig};
use crate::data::label_persistence::{JsonFilePersistence, PersistenceMirror};
use crate::data::loader::{self, LoadedData};
use crate::state::app_state::{Workspace, VERSION};
use crate::state::graph_state::GraphState;
use crate::state::label::{Label, LabelDefinitionRegistry};
use crate::state::label_store::LabelEvent;
use crate::state::theme::Theme;
use crate::ui::data_selection_dialog::{self, ColumnSelection, DataSelectionState, DialogResult};
use crate::ui::graph_panel::{self, GraphAction, PanelSettings};
use crate::ui::label_panel::{self, LabelPanelAction, LabelPanelState};

/// Pending async file load result.
struct PendingLoad {
    path: PathBuf,
    result: Arc<Mutex<Option<Result<LoadedData, String>>>>,
}

/// The main OxideLabel application.
pub struct OxideLabelApp {
    config: AppConfig,
    data_dir: PathBuf,
    workspace: Workspace,
    /// One chart per opened dataset.
    graphs: Vec<GraphState>,
    active: Option<usize>,
    label_mode: bool,
    label_panel: LabelPanelState,
    /// Active data-column selection dialog (shown after a file is loaded).
    data_selection: Option<DataSelectionState>,
    /// An error message shown in the footer until dismissed.
    error_message: Option<String>,
    /// Latest label addition or removal, shown in the footer.
    last_activity: Option<String>,
    show_settings: bool,
    pending_load: Option<PendingLoad>,
    // Declared last: queued label writes drain before the worker stops.
    _mirror: PersistenceMirror,
}

impl OxideLabelApp {
    pub fn new(cc: &eframe::CreationContext<'_>) -> Self {
        let data_dir = config::data_dir();
        let config = AppConfig::load(&data_dir);
        tracing::info!("Using data directory {data_dir:?}");

        let mirror = PersistenceMirror::spawn(Box::new(JsonFilePersistence::in_dir(&data_dir)));
        let workspace = Workspace::new(mirror.handle(), config.drawing_config());

        apply_style(&cc.egui_ctx);
        cc.egui_ctx.set_visuals(themed_visuals(config.theme));

        Self {
            config,
            data_dir,
            workspace,
            graphs: Vec::new(),
            active: None,
            label_mode: false,
            label_panel: LabelPanelState::default(),
            data_selection: None,
            error_message: None,
            last_activity: None,
            show_settings: false,
            pending_load: None,
            _mirror: mirror,
        }
    }

    fn open_file_dialog(&mut self) {
        if let Some(path) = rfd::FileDialog::new()
            .add_filter("Data Files", loader::SUPPORTED_EXTENSIONS)
            .add_filter("All Files", &["*"])
            .pick_file()
        {
            self.load_file(&path);
        }
    }

    /// Parse a data file on a background thread so the UI stays responsive.
    fn load_file(&mut self, path: &Path) {
        let path_buf = path.to_path_buf();
        let result: Arc<Mutex<Option<Result<LoadedData, String>>>> = Arc::new(Mutex::new(None));
        let result_clone = Arc::clone(&result);

        std::thread::spawn(move || {
            let loaded = loader::load_file(&path_buf);
            match result_clone.lock() {
                Ok(mut slot) => *slot = Some(loaded),
                Err(poisoned) => *poisoned.into_inner() = Some(loaded),
            }
        });

        self.pending_load = Some(PendingLoad {
            path: path.to_path_buf(),
            result,
        });
    }

    fn poll_pending_load(&mut self) {
        let Some(pending) = &self.pending_load else {
            return;
        };
        let taken = match pending.result.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        let Some(result) = taken else {
            return;
        };
        match result {
            Ok(loaded) => {
                tracing::info!(
                    "Loaded {:?}: {} columns, {} rows",
                    pending.path,
                    loaded.table.column_count(),
                    loaded.table.row_count()
                );
                self.data_selection = Some(DataSelectionState::new(loaded));
            }
            Err(e) => {
                tracing::error!("Failed to load {:?}: {e}", pending.path);
                self.error_message = Some(format!("Failed to load file: {e}"));
            }
        }
        self.pending_load = None;
    }

    /// Reopen the column dialog for the active chart.
    fn change_columns(&mut self) {
        let Some(graph) = self.active.and_then(|i| self.graphs.get(i)) else {
            return;
        };
        self.data_selection = Some(DataSelectionState::new(LoadedData {
            dataset_id: graph.dataset_id.clone(),
            display_name: graph.title.clone(),
            table: graph.table.clone(),
            report: graph.report.clone(),
        }));
    }

    /// Plot the chosen columns. A dataset that is already open gets its
    /// table replaced; otherwise a new chart is added. Either way it becomes active.
    fn process_column_selection(&mut self, loaded: LoadedData, selection: ColumnSelection) {
        let idx = match self.graphs.iter().position(|g| g.dataset_id == loaded.dataset_id) {
            Some(idx) => {
                let graph = &mut self.graphs[idx];
                graph.title = loaded.display_name;
                graph.table = loaded.table;
                graph.report = loaded.report;
                idx
            }
            None => {
                self.graphs.push(GraphState::new(loaded));
                self.graphs.len() - 1
            }
        };
        self.graphs[idx].select_axes(selection.x, selection.y);
        self.activate(idx);
    }

    /// Make the chart at `idx` the labeling target.
    fn activate(&mut self, idx: usize) {
        if idx >= self.graphs.len() {
            return;
        }
        if let Some(prev) = self.active.filter(|&p| p != idx) {
            if let Some(graph) = self.graphs.get_mut(prev) {
                graph.overlay.current = None;
            }
        }
        let graph = &mut self.graphs[idx];
        self.workspace.open_dataset(&graph.dataset_id, &mut graph.overlay);
        self.active = Some(idx);
    }

    fn close_active(&mut self) {
        let Some(idx) = self.active else {
            return;
        };
        let mut removed = self.graphs.remove(idx);
        self.workspace.close_dataset(&removed.dataset_id, &mut removed.overlay);
        self.active = None;
        if !self.graphs.is_empty() {
            self.activate(idx.min(self.graphs.len() - 1));
        }
    }

    fn export_labels(&mut self) {
        let (Some(graph), Some(store)) = (self.active.and_then(|i| self.graphs.get(i)), self.workspace.active_store())
        else {
            return;
        };
        let stem = Path::new(&graph.title)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("dataset")
            .to_string();
        let Some(path) = rfd::FileDialog::new()
            .set_file_name(format!("{stem}_labels.csv"))
            .add_filter("CSV Files", &["csv"])
            .save_file()
        else {
            return;
        };

        let written = csv::Writer::from_path(&path)
            .and_then(|mut writer| write_labels_csv(&mut writer, store.list(), &self.config.label_definitions));
        match written {
            Ok(()) => tracing::info!("Exported {} labels to {path:?}", store.len()),
            Err(e) => {
                tracing::error!("Failed to export labels to {path:?}: {e}");
                self.error_message = Some(format!("Failed to export labels: {e}"));
            }
        }
    }

    fn save_config(&mut self) {
        if let Err(e) = self.config.save(&self.data_dir) {
            tracing::warn!("Could not save config: {e}");
            self.error_message = Some(format!("Could not save settings: {e}"));
        }
    }

    /// Delete a definition and every label that refers to it.
    fn remove_definition(&mut self, id: &str) {
        if self.config.label_definitions.remove(id).is_none() {
            return;
        }
        self.workspace.remove_labels_for_definition(id);
        if self.config.active_label_def.as_deref() == Some(id) {
            self.config.active_label_def = self.config.label_definitions.list().first().map(|d| d.id.clone());
        }
        self.save_config();
    }

    fn show_settings_window(&mut self, ctx: &egui::Context) {
        let mut open = self.show_settings;
        let mut changed = false;
        egui::Window::new("Settings")
            .open(&mut open)
            .collapsible(false)
            .resizable(false)
            .default_width(320.0)
            .show(ctx, |ui| {
                ui.label(egui::RichText::new("Drawing").strong());
                changed |= ui
                    .checkbox(&mut self.config.snap_to_samples, "Snap label edges to samples")
                    .changed();
                ui.horizontal(|ui| {
                    ui.label("Minimum label width (px)");
                    changed |= ui
                        .add(egui::DragValue::new(&mut self.config.min_label_width_px).range(0.0..=50.0).speed(0.5))
                        .changed();
                });

                ui.add_space(8.0);
                ui.label(egui::RichText::new("View").strong());
                changed |= ui
                    .checkbox(&mut self.config.auto_scale_y, "Auto-scale Y to the visible window")
                    .changed();
                ui.horizontal(|ui| {
                    ui.label("Y padding");
                    changed |= ui
                        .add(egui::DragValue::new(&mut self.config.autoscale_padding).range(0.0..=1.0).speed(0.01))
                        .changed();
                });

                ui.add_space(8.0);
                ui.label(egui::RichText::new(format!("Data directory: {}", self.data_dir.display())).weak().small());
            });
        self.show_settings = open;

        if changed {
            self.workspace.set_drawing_config(self.config.drawing_config());
            // A stale previous window makes the next frame rescale Y.
            for graph in &mut self.graphs {
                graph.plot_view.prev_x_min = f64::NAN;
            }
            self.save_config();
        }
    }
}

/// Write labels as `start,end,label,visible` rows. The label column carries
/// the definition name, or the raw id when the definition no longer exists.
pub fn write_labels_csv<W: std::io::Write>(
    writer: &mut csv::Writer<W>,
    labels: &[Label],
    definitions: &LabelDefinitionRegistry,
) -> Result<(), csv::Error> {
    writer.write_record(["start", "end", "label", "visible"])?;
    for label in labels {
        let name = definitions
            .resolve(&label.label_def_id)
            .map_or(label.label_def_id.as_str(), |d| d.name.as_str());
        writer.write_record([
            label.start_time.to_string(),
            label.end_time.to_string(),
            name.to_string(),
            label.is_visible().to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// One-line footer text for a label addition or removal.
fn describe_activity(event: &LabelEvent, definitions: &LabelDefinitionRegistry) -> String {
    let (verb, label) = match event {
        LabelEvent::Added(label) => ("Added", label),
        LabelEvent::Removed(label) => ("Removed", label),
        LabelEvent::Updated(label) => ("Updated", label),
        LabelEvent::VisibilityChanged(label) => ("Changed visibility of", label),
    };
    let name = definitions
        .resolve(&label.label_def_id)
        .map_or("deleted", |d| d.name.as_str());
    format!("{verb} {name} label")
}

fn apply_style(ctx: &egui::Context) {
    let mut style = (*ctx.style()).clone();

    style.text_styles.insert(egui::TextStyle::Body, egui::FontId::proportional(15.0));
    style.text_styles.insert(egui::TextStyle::Button, egui::FontId::proportional(14.5));
    style.text_styles.insert(egui::TextStyle::Heading, egui::FontId::proportional(20.0));
    style.text_styles.insert(egui::TextStyle::Small, egui::FontId::proportional(12.0));
    style.text_styles.insert(egui::TextStyle::Monospace, egui::FontId::monospace(13.5));

    style.spacing.button_padding = egui::vec2(10.0, 5.0);
    style.spacing.item_spacing = egui::vec2(8.0, 6.0);
    style.spacing.window_margin = egui::Margin::same(12);

    ctx.set_style(style);
}

/// Theme visuals with the app's rounded widgets.
fn themed_visuals(theme: Theme) -> egui::Visuals {
    let mut vis = theme.visuals();
    vis.window_corner_radius = egui::CornerRadius::same(8);
    for widget in [
        &mut vis.widgets.noninteractive,
        &mut vis.widgets.inactive,
        &mut vis.widgets.hovered,
        &mut vis.widgets.active,
        &mut vis.widgets.open,
    ] {
        widget.corner_radius = egui::CornerRadius::same(6);
    }
    vis.widgets.hovered.bg_stroke = egui::Stroke::new(1.5, egui::Color32::from_gray(160));
    vis.widgets.active.bg_stroke = egui::Stroke::new(2.0, egui::Color32::from_gray(200));
    vis
}

impl eframe::App for OxideLabelApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        ctx.set_visuals(themed_visuals(self.config.theme));

        // ------------------------------------------------------------------
        // 1. Dropped files
        // ------------------------------------------------------------------
        let dropped: Option<PathBuf> = ctx.input(|i| {
            i.raw
                .dropped_files
                .iter()
                .filter_map(|f| f.path.clone())
                .find(|p| loader::is_supported(p))
        });
        if let Some(path) = dropped {
            self.load_file(&path);
        }

        // ------------------------------------------------------------------
        // 2. Header
        // ------------------------------------------------------------------
        let mut open_file = false;
        let mut close_active = false;
        let mut switch_to: Option<usize> = None;
        let mut theme_changed = false;
        egui::TopBottomPanel::top("header")
            .frame(egui::Frame::side_top_panel(&ctx.style()).inner_margin(egui::Margin::symmetric(16, 8)))
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.heading("OxideLabel");
                    ui.separator();

                    if ui.button("Open File").clicked() {
                        open_file = true;
                    }

                    if !self.graphs.is_empty() {
                        let current = self
                            .active
                            .and_then(|i| self.graphs.get(i))
                            .map_or("Select dataset", |g| g.title.as_str());
                        egui::ComboBox::from_id_salt("dataset_switcher")
                            .selected_text(current)
                            .width(220.0)
                            .show_ui(ui, |ui| {
                                for (i, graph) in self.graphs.iter().enumerate() {
                                    if ui.selectable_label(self.active == Some(i), &graph.title).clicked() {
                                        switch_to = Some(i);
                                    }
                                }
                            });
                        if ui.button("Close").on_hover_text("Close this dataset").clicked() {
                            close_active = true;
                        }
                    }

                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        let theme_label = match self.config.theme {
                            Theme::Dark => "Light Mode",
                            Theme::Light => "Dark Mode",
                        };
                        if ui.button(theme_label).clicked() {
                            self.config.theme = self.config.theme.toggle();
                            theme_changed = true;
                        }
                        if ui.button("Settings").clicked() {
                            self.show_settings = !self.show_settings;
                        }
                        ui.separator();
                        ui.small(format!("v{VERSION}"));
                    });
                });
            });

        if open_file {
            self.open_file_dialog();
        }
        if close_active {
            self.close_active();
        }
        if let Some(idx) = switch_to.filter(|&i| self.active != Some(i)) {
            self.activate(idx);
        }
        if theme_changed {
            self.save_config();
        }

        // ------------------------------------------------------------------
        // 3. Footer
        // ------------------------------------------------------------------
        if let Some(event) = self.workspace.take_activity().last() {
            self.last_activity = Some(describe_activity(event, &self.config.label_definitions));
        }
        egui::TopBottomPanel::bottom("footer")
            .frame(egui::Frame::side_top_panel(&ctx.style()).inner_margin(egui::Margin::symmetric(16, 6)))
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    let count = self.graphs.len();
                    let datasets = if count == 1 { "1 dataset".to_string() } else { format!("{count} datasets") };
                    ui.label(egui::RichText::new(datasets).weak());
                    if let Some(store) = self.workspace.active_store() {
                        ui.separator();
                        ui.label(egui::RichText::new(format!("{} labels", store.len())).weak());
                    }
                    if self.label_mode {
                        ui.separator();
                        ui.label(egui::RichText::new("Label mode").strong());
                    }
                    if let Some(activity) = &self.last_activity {
                        ui.separator();
                        ui.label(egui::RichText::new(activity).weak());
                    }

                    if let Some(msg) = &self.error_message {
                        ui.separator();
                        ui.colored_label(egui::Color32::from_rgb(255, 80, 80), msg);
                        if ui.small_button("dismiss").clicked() {
                            self.error_message = None;
                        }
                    }
                });
            });

        // ------------------------------------------------------------------
        // 4. Label side panel
        // ------------------------------------------------------------------
        let x_is_datetime = self.active.and_then(|i| self.graphs.get(i)).is_some_and(|g| g.x_is_datetime());
        let panel_action = egui::SidePanel::right("labels")
            .resizable(true)
            .default_width(320.0)
            .show(ctx, |ui| {
                label_panel::show_label_panel(
                    ui,
                    &mut self.label_panel,
                    &mut self.config.label_definitions,
                    &mut self.config.active_label_def,
                    if self.active.is_some() { self.workspace.active_store_mut() } else { None },
                    x_is_datetime,
                )
            })
            .inner;
        match panel_action {
            LabelPanelAction::None => {}
            LabelPanelAction::DefinitionsChanged => self.save_config(),
            LabelPanelAction::RemoveDefinition(id) => self.remove_definition(&id),
        }

        // ------------------------------------------------------------------
        // 5. Chart
        // ------------------------------------------------------------------
        let mut graph_action = GraphAction::None;
        egui::CentralPanel::default().show(ctx, |ui| {
            let panel_height = ui.available_height();
            let settings = PanelSettings {
                theme: self.config.theme,
                label_mode: self.label_mode,
                auto_scale_y: self.config.auto_scale_y,
                autoscale_padding: self.config.autoscale_padding,
                definitions: &self.config.label_definitions,
                active_label_def: self.config.active_label_def.as_deref(),
            };
            match self.active.and_then(|i| self.graphs.get_mut(i)) {
                Some(graph) => {
                    graph_action =
                        graph_panel::show_graph_panel(graph, &mut self.workspace, &settings, ui, panel_height);
                }
                None => {
                    ui.add_space(80.0);
                    ui.vertical_centered(|ui| {
                        ui.heading("Welcome to OxideLabel");
                        ui.add_space(12.0);
                        ui.label(
                            egui::RichText::new(
                                "Click \"Open File\" above, or drag-and-drop a CSV / TSV file to get started.",
                            )
                            .weak(),
                        );
                    });
                }
            }
        });

        match graph_action {
            GraphAction::None => {}
            GraphAction::ChangeColumns => self.change_columns(),
            GraphAction::ToggleLabelMode => {
                self.label_mode = !self.label_mode;
                tracing::debug!("Label mode {}", if self.label_mode { "on" } else { "off" });
            }
            GraphAction::CenterView => {
                if let Some(graph) = self.active.and_then(|i| self.graphs.get_mut(i)) {
                    graph.plot_view.auto_fit = true;
                }
            }
            GraphAction::ExportLabels => self.export_labels(),
            GraphAction::LabelCreated(id) => {
                tracing::debug!("Label {id} drawn on {:?}", self.workspace.active_dataset());
            }
        }

        // ------------------------------------------------------------------
        // 6. Async load, dialogs
        // ------------------------------------------------------------------
        self.poll_pending_load();
        if self.pending_load.is_some() {
            egui::Window::new("Loading")
                .collapsible(false)
                .resizable(false)
                .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
                .show(ctx, |ui| {
                    ui.horizontal(|ui| {
                        ui.spinner();
                        ui.label("Loading file...");
                    });
                });
            ctx.request_repaint();
        }

        let dialog_result = self
            .data_selection
            .as_mut()
            .and_then(|ds| data_selection_dialog::show_data_selection_dialog(ctx, ds));
        match dialog_result {
            Some(DialogResult::Ok(selection)) => {
                if let Some(ds) = self.data_selection.take() {
                    self.process_column_selection(ds.loaded_data, selection);
                }
            }
            Some(DialogResult::Cancel) => self.data_selection = None,
            None => {}
        }

        if self.show_settings {
            self.show_settings_window(ctx);
        }
    }
}

impl Drop for OxideLabelApp {
    fn drop(&mut self) {
        if let Err(e) = self.config.save(&self.data_dir) {
            tracing::warn!("Could not save config on exit: {e}");
        }
        self.workspace.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exports_labels_with_definition_names() {
        let mut definitions = LabelDefinitionRegistry::new();
        let anomaly = definitions.add("Anomaly");
        let mut hidden = Label::new("ds", 4.0, 2.5, &anomaly, 0);
        hidden.visible = Some(false);
        let orphan = Label::new("ds", 10.0, 12.0, "missing-def", 0);

        let mut writer = csv::Writer::from_writer(Vec::new());
        write_labels_csv(&mut writer, &[hidden, orphan], &definitions).unwrap();
        let text = String::from_utf8(writer.into_inner().unwrap()).unwrap();

        assert_eq!(
            text,
            "start,end,label,visible\n2.5,4,Anomaly,false\n10,12,missing-def,true\n"
        );
    }

    #[test]
    fn activity_names_the_definition() {
        let mut definitions = LabelDefinitionRegistry::new();
        let walk = definitions.add("Walking");
        let label = Label::new("ds", 0.0, 1.0, &walk, 0);
        assert_eq!(describe_activity(&LabelEvent::Added(label.clone()), &definitions), "Added Walking label");

        definitions.remove(&walk);
        assert_eq!(describe_activity(&LabelEvent::Removed(label), &definitions), "Removed deleted label");
    }

    #[test]
    fn export_of_empty_store_has_only_header() {
        let mut writer = csv::Writer::from_writer(Vec::new());
        write_labels_csv(&mut writer, &[], &LabelDefinitionRegistry::with_defaults()).unwrap();
        let text = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        assert_eq!(text, "start,end,label,visible\n");
    }
}
