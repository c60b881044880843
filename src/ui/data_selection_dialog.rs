use crate::data::loader::LoadedData;
use crate::state::data_series::AxisColumn;

/// State for the data selection dialog, created when the user loads a file
/// and needs to choose which columns to plot.
pub struct DataSelectionState {
    pub loaded_data: LoadedData,
    /// Choices for either axis; the index pseudo-column comes first.
    pub choices: Vec<AxisColumn>,
    pub selected_x: usize,
    pub selected_y: usize,
}

impl DataSelectionState {
    pub fn new(loaded_data: LoadedData) -> Self {
        let choices = AxisColumn::all_for(&loaded_data.table);
        // First real column on X, the next one on Y; a single-column file
        // plots against the row index.
        let (selected_x, selected_y) = match loaded_data.table.column_count() {
            0 | 1 => (0, choices.len().saturating_sub(1)),
            _ => (1, 2),
        };
        Self {
            loaded_data,
            choices,
            selected_x,
            selected_y,
        }
    }

    fn choice_label(&self, i: usize) -> String {
        self.choices
            .get(i)
            .map(|c| c.label(&self.loaded_data.table))
            .unwrap_or_default()
    }
}

/// The axes the user selected from the dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSelection {
    pub x: AxisColumn,
    pub y: AxisColumn,
}

/// Result of the data selection dialog interaction each frame.
pub enum DialogResult {
    Ok(ColumnSelection),
    Cancel,
}

/// Show the data selection dialog as an egui window.
///
/// Returns `Some(DialogResult)` when the user presses OK or Cancel,
/// or `None` while the dialog is still open.
pub fn show_data_selection_dialog(ctx: &egui::Context, state: &mut DataSelectionState) -> Option<DialogResult> {
    let mut result = None;

    egui::Window::new("Select Data Columns")
        .collapsible(false)
        .resizable(true)
        .default_width(420.0)
        .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
        .show(ctx, |ui| {
            let table = &state.loaded_data.table;
            let report = &state.loaded_data.report;
            ui.label(egui::RichText::new(&state.loaded_data.display_name).strong());
            ui.label(
                egui::RichText::new(format!(
                    "{} columns, {} rows. {} delimited, header {}.",
                    table.column_count(),
                    table.row_count(),
                    report.delimiter.label(),
                    if report.header_detected { "detected" } else { "not detected" },
                ))
                .weak(),
            );
            if report.repaired_cells > 0 {
                ui.label(
                    egui::RichText::new(format!("{} unreadable cells were replaced.", report.repaired_cells))
                        .color(egui::Color32::from_rgb(230, 170, 60)),
                );
            }

            ui.add_space(12.0);

            for (title, salt, is_x) in [("X Axis", "x_axis_selector", true), ("Y Axis", "y_axis_selector", false)] {
                ui.label(egui::RichText::new(title).strong());
                ui.add_space(2.0);
                let current = if is_x { state.selected_x } else { state.selected_y };
                let mut picked = current;
                egui::ComboBox::from_id_salt(salt)
                    .selected_text(state.choice_label(current))
                    .width(300.0)
                    .show_ui(ui, |ui| {
                        for i in 0..state.choices.len() {
                            ui.selectable_value(&mut picked, i, state.choice_label(i));
                        }
                    });
                if is_x {
                    state.selected_x = picked;
                } else {
                    state.selected_y = picked;
                }
                ui.add_space(10.0);
            }

            let same_axis = state.selected_x == state.selected_y;
            ui.horizontal(|ui| {
                let ok_btn = ui.add_enabled(
                    !same_axis,
                    egui::Button::new(egui::RichText::new("OK").strong()).min_size(egui::vec2(100.0, 32.0)),
                );
                if ok_btn.clicked() {
                    if let (Some(&x), Some(&y)) = (state.choices.get(state.selected_x), state.choices.get(state.selected_y)) {
                        result = Some(DialogResult::Ok(ColumnSelection { x, y }));
                    }
                }

                if ui.add(egui::Button::new("Cancel").min_size(egui::vec2(100.0, 32.0))).clicked() {
                    result = Some(DialogResult::Cancel);
                }

                if same_axis {
                    ui.label(egui::RichText::new("Pick different columns for X and Y").weak());
                }
            });
        });

    result
}
