use crate::data::datetime;
use crate::state::label::{LabelDefinitionRegistry, LabelPatch};
use crate::state::label_store::LabelStore;

/// Actions the side panel hands back to the app.
#[derive(Debug, Clone, PartialEq)]
pub enum LabelPanelAction {
    None,
    /// Definitions or the active selection changed and should be saved.
    DefinitionsChanged,
    /// Delete the definition and every label that uses it.
    RemoveDefinition(String),
}

/// Scratch state for the panel's text inputs.
#[derive(Debug, Default)]
pub struct LabelPanelState {
    pub new_definition_name: String,
    /// Definition currently being renamed, with the edit buffer.
    pub renaming: Option<(String, String)>,
}

pub fn show_label_panel(
    ui: &mut egui::Ui,
    state: &mut LabelPanelState,
    definitions: &mut LabelDefinitionRegistry,
    active_label_def: &mut Option<String>,
    store: Option<&mut LabelStore>,
    x_is_datetime: bool,
) -> LabelPanelAction {
    let mut action = LabelPanelAction::None;

    ui.heading("Label Definitions");
    ui.add_space(4.0);
    definitions_section(ui, state, definitions, active_label_def, &mut action);

    ui.add_space(12.0);
    ui.separator();
    ui.heading("Labels");
    ui.add_space(4.0);

    match store {
        Some(store) => labels_section(ui, definitions, store, x_is_datetime),
        None => {
            ui.label(egui::RichText::new("Open a data file to start labeling.").weak());
        }
    }

    action
}

fn definitions_section(
    ui: &mut egui::Ui,
    state: &mut LabelPanelState,
    definitions: &mut LabelDefinitionRegistry,
    active_label_def: &mut Option<String>,
    action: &mut LabelPanelAction,
) {
    let mut recolor: Option<(String, [u8; 4])> = None;
    let mut rename_done: Option<(String, String)> = None;

    for def in definitions.list() {
        ui.horizontal(|ui| {
            let mut color = def.color32();
            if ui.color_edit_button_srgba(&mut color).changed() {
                recolor = Some((def.id.clone(), color.to_array()));
            }

            let is_active = active_label_def.as_deref() == Some(def.id.as_str());
            let renaming_this = state.renaming.as_ref().is_some_and(|(id, _)| id == &def.id);
            if renaming_this {
                if let Some((_, buffer)) = state.renaming.as_mut() {
                    let edit = ui.add(egui::TextEdit::singleline(buffer).desired_width(110.0));
                    if edit.lost_focus() || ui.small_button("OK").clicked() {
                        rename_done = Some((def.id.clone(), buffer.trim().to_string()));
                    }
                }
            } else if ui.selectable_label(is_active, &def.name).clicked() {
                *active_label_def = Some(def.id.clone());
                *action = LabelPanelAction::DefinitionsChanged;
            }

            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if ui
                    .small_button(egui::RichText::new("Delete").color(egui::Color32::from_rgb(220, 60, 60)))
                    .on_hover_text("Delete this definition and all labels using it")
                    .clicked()
                {
                    *action = LabelPanelAction::RemoveDefinition(def.id.clone());
                }
                if !renaming_this && ui.small_button("Rename").clicked() {
                    state.renaming = Some((def.id.clone(), def.name.clone()));
                }
            });
        });
    }

    if let Some((id, color)) = recolor {
        definitions.set_color(&id, color);
        *action = LabelPanelAction::DefinitionsChanged;
    }
    if let Some((id, name)) = rename_done {
        if !name.is_empty() {
            definitions.rename(&id, &name);
            *action = LabelPanelAction::DefinitionsChanged;
        }
        state.renaming = None;
    }

    ui.add_space(4.0);
    ui.horizontal(|ui| {
        ui.add(
            egui::TextEdit::singleline(&mut state.new_definition_name)
                .hint_text("New definition")
                .desired_width(140.0),
        );
        let name = state.new_definition_name.trim().to_string();
        if ui.add_enabled(!name.is_empty(), egui::Button::new("Add")).clicked() {
            let id = definitions.add(&name);
            tracing::info!("Added label definition {name}");
            *active_label_def = Some(id);
            state.new_definition_name.clear();
            *action = LabelPanelAction::DefinitionsChanged;
        }
    });
}

fn labels_section(ui: &mut egui::Ui, definitions: &LabelDefinitionRegistry, store: &mut LabelStore, x_is_datetime: bool) {
    if store.is_empty() {
        ui.label(egui::RichText::new("No labels yet. Turn on Label Mode and drag across the chart.").weak());
        return;
    }

    let format_x = |x: f64| {
        if x_is_datetime {
            datetime::format_timestamp_ms(x)
        } else {
            format!("{x:.3}")
        }
    };

    let mut toggle: Option<String> = None;
    let mut remove: Option<String> = None;
    let mut relabel: Option<(String, String)> = None;

    egui::ScrollArea::vertical().auto_shrink([false, true]).show(ui, |ui| {
        egui::Grid::new("label_list").num_columns(4).striped(true).show(ui, |ui| {
            for label in store.list() {
                let current = definitions.resolve(&label.label_def_id);
                let name = current.map_or("(deleted)", |d| d.name.as_str());
                let color = current.map_or(egui::Color32::GRAY, |d| d.color32());

                let eye = if label.is_visible() { "Hide" } else { "Show" };
                if ui.small_button(eye).clicked() {
                    toggle = Some(label.id.clone());
                }

                egui::ComboBox::from_id_salt(("label_def", &label.id))
                    .selected_text(egui::RichText::new(name).color(color))
                    .width(100.0)
                    .show_ui(ui, |ui| {
                        for def in definitions.list() {
                            if ui.selectable_label(def.id == label.label_def_id, &def.name).clicked() {
                                relabel = Some((label.id.clone(), def.id.clone()));
                            }
                        }
                    });

                ui.label(egui::RichText::new(format!("{} .. {}", format_x(label.start_time), format_x(label.end_time))).small());

                if ui.small_button("Delete").clicked() {
                    remove = Some(label.id.clone());
                }
                ui.end_row();
            }
        });
    });

    if let Some(id) = toggle {
        store.toggle_visibility(&id);
    }
    if let Some((id, label_def_id)) = relabel {
        store.update(
            &id,
            LabelPatch {
                label_def_id: Some(label_def_id),
                ..Default::default()
            },
        );
    }
    if let Some(id) = remove {
        store.remove(&id);
    }
}
