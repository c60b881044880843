use crate::data::datetime;
use crate::processing::{downsampling, snap};
use crate::render::coordinate_mapper::{DataPoint, PlotTransform};
use crate::render::label_drawing::{DrawingFeedback, DrawingOutcome, PlotFrame};
use crate::render::plot_interaction;
use crate::state::app_state::Workspace;
use crate::state::graph_state::GraphState;
use crate::state::label::{Label, LabelDefinitionRegistry};
use crate::state::theme::Theme;

/// Actions that the graph panel can request from the parent.
pub enum GraphAction {
    None,
    ChangeColumns,
    ToggleLabelMode,
    CenterView,
    ExportLabels,
    /// A label was drawn; carries its id.
    LabelCreated(String),
}

/// Per-frame inputs the panel reads but does not own.
pub struct PanelSettings<'a> {
    pub theme: Theme,
    pub label_mode: bool,
    pub auto_scale_y: bool,
    pub autoscale_padding: f64,
    pub definitions: &'a LabelDefinitionRegistry,
    pub active_label_def: Option<&'a str>,
}

/// Helper to create a toolbar button with consistent min size.
fn toolbar_btn(ui: &mut egui::Ui, label: &str) -> egui::Response {
    ui.add(egui::Button::new(label).min_size(egui::vec2(0.0, 26.0)))
}

/// Helper to create a selected/toggled toolbar button.
fn toolbar_toggle_btn(ui: &mut egui::Ui, label: &str, active: bool) -> egui::Response {
    let btn = if active {
        egui::Button::new(egui::RichText::new(label).strong())
            .fill(ui.visuals().selection.bg_fill)
            .min_size(egui::vec2(0.0, 26.0))
    } else {
        egui::Button::new(label).min_size(egui::vec2(0.0, 26.0))
    };
    ui.add(btn)
}

/// Render the chart for the active dataset. Returns an action if the user
/// clicked a toolbar button or finished drawing a label.
pub fn show_graph_panel(
    graph: &mut GraphState,
    workspace: &mut Workspace,
    settings: &PanelSettings<'_>,
    ui: &mut egui::Ui,
    panel_height: f32,
) -> GraphAction {
    let mut action = GraphAction::None;

    egui::Frame::group(ui.style())
        .inner_margin(egui::Margin::same(10))
        .corner_radius(egui::CornerRadius::same(8))
        .show(ui, |ui| {
            ui.horizontal(|ui| {
                ui.heading(&graph.title);
                if let Some(series) = &graph.series {
                    ui.label(egui::RichText::new(format!("{} ({} points)", series.name, series.point_count())).weak());
                }
            });

            ui.add_space(2.0);

            ui.horizontal_wrapped(|ui| {
                ui.spacing_mut().item_spacing.x = 4.0;

                if toolbar_btn(ui, "Columns").on_hover_text("Choose the X and Y columns").clicked() {
                    action = GraphAction::ChangeColumns;
                }
                if toolbar_btn(ui, "Center").on_hover_text("Fit the view to the data").clicked() {
                    action = GraphAction::CenterView;
                }

                ui.separator();

                let label_btn = toolbar_toggle_btn(ui, "Label Mode", settings.label_mode).on_hover_text(
                    "Drag on the chart to label a range. Pan with the right mouse button while active.",
                );
                if label_btn.clicked() {
                    action = GraphAction::ToggleLabelMode;
                }
                if settings.label_mode {
                    match settings.active_label_def.and_then(|id| settings.definitions.resolve(id)) {
                        Some(def) => {
                            ui.colored_label(def.color32(), format!("Drawing: {}", def.name));
                        }
                        None => {
                            ui.label(egui::RichText::new("Select a label definition").weak());
                        }
                    }
                }

                ui.separator();

                if toolbar_btn(ui, "Export Labels").on_hover_text("Save this dataset's labels as CSV").clicked() {
                    action = GraphAction::ExportLabels;
                }
            });

            ui.add_space(6.0);

            let plot_height = (panel_height - 80.0).max(200.0);
            if let Some(created) = show_plot(graph, workspace, settings, ui, plot_height) {
                action = GraphAction::LabelCreated(created);
            }
        });

    action
}

fn show_plot(
    graph: &mut GraphState,
    workspace: &mut Workspace,
    settings: &PanelSettings<'_>,
    ui: &mut egui::Ui,
    plot_area_height: f32,
) -> Option<String> {
    if graph.series.is_none() {
        ui.add_space(40.0);
        ui.vertical_centered(|ui| {
            ui.label(egui::RichText::new("No columns selected").strong().size(16.0));
            ui.add_space(6.0);
            ui.label(egui::RichText::new("Click \"Columns\" above to pick what to plot.").weak());
        });
        ui.add_space(40.0);
        return None;
    }

    // --- Layout: left margin for Y axis, main plot area ---
    let left_margin = 70.0_f32;
    let right_margin = 20.0_f32;
    let bottom_margin = 40.0_f32;
    let top_margin = 10.0_f32;
    let total_height = plot_area_height.max(100.0 + bottom_margin + top_margin);
    let available_width = ui.available_width();
    let total_rect = ui.allocate_space(egui::Vec2::new(available_width, total_height)).1;

    let plot_rect = egui::Rect::from_min_max(
        egui::Pos2::new(total_rect.left() + left_margin, total_rect.top() + top_margin),
        egui::Pos2::new(total_rect.right() - right_margin, total_rect.bottom() - bottom_margin),
    );

    let plot_id = egui::Id::new("label_plot").with(&graph.dataset_id);
    let response = ui.interact(plot_rect, plot_id, egui::Sense::click_and_drag());

    // Primary drag draws labels while label mode is on, so panning moves to the secondary button.
    let pan_button = if settings.label_mode {
        egui::PointerButton::Secondary
    } else {
        egui::PointerButton::Primary
    };
    graph.plot_view.handle_input(&response, plot_rect, pan_button);

    // --- Fit on first display or when requested, else follow the X window ---
    let view = &mut graph.plot_view;
    if view.auto_fit || !view.initialized {
        let samples = graph.series.as_ref().map_or(&[][..], |s| s.points.as_slice());
        view.fit_to_data(samples, settings.autoscale_padding);
    } else if settings.auto_scale_y && view.x_range_changed() {
        let samples = graph.series.as_ref().map_or(&[][..], |s| s.points.as_slice());
        view.autoscale_y(samples, settings.autoscale_padding);
    }
    view.snapshot_x_range();

    let created = route_drawing_input(graph, workspace, settings, &response, plot_rect);

    let painter = ui.painter_at(total_rect);
    let transform = graph.plot_view.transform(plot_rect);
    let is_datetime = graph.x_is_datetime();

    painter.rect_filled(plot_rect, 0.0, settings.theme.plot_bg());

    let x_grid = plot_interaction::compute_grid_lines(graph.plot_view.x_min, graph.plot_view.x_max);
    let y_grid = plot_interaction::compute_grid_lines(graph.plot_view.y_min, graph.plot_view.y_max);
    draw_grid(&painter, &transform, &x_grid, &y_grid, settings.theme);

    if let Some(store) = workspace.active_store() {
        draw_label_regions(&painter, &transform, store.list(), settings);
    }

    draw_series(&painter, graph, &transform, plot_rect);

    if let Some(feedback) = graph.overlay.current {
        draw_feedback(&painter, feedback, plot_rect, settings);
    }

    draw_axes_and_labels(&painter, graph, &transform, total_rect, (&x_grid, &y_grid), is_datetime, settings.theme);

    if response.hovered() && !workspace.session().is_dragging() {
        if let Some(mouse_pos) = response.hover_pos() {
            draw_hover_tooltip(&painter, graph, workspace, settings.definitions, &transform, mouse_pos);
        }
    }

    created
}

/// Feed this frame's pointer state into the drawing session.
fn route_drawing_input(
    graph: &mut GraphState,
    workspace: &mut Workspace,
    settings: &PanelSettings<'_>,
    response: &egui::Response,
    plot_rect: egui::Rect,
) -> Option<String> {
    let transform = graph.plot_view.transform(plot_rect);
    let samples = match &graph.series {
        Some(s) => s.points.as_slice(),
        None => &[],
    };
    let frame = PlotFrame {
        transform: &transform,
        samples,
        label_def_id: settings.active_label_def,
    };
    let sink = &mut graph.overlay;

    let (session, store) = workspace.drawing_parts()?;
    session.set_enabled(settings.label_mode, sink);
    if !settings.label_mode {
        return None;
    }

    let primary = egui::PointerButton::Primary;
    let pointer = response.interact_pointer_pos().or(response.hover_pos());
    let mut created = None;

    if response.drag_started_by(primary) {
        let origin = response.ctx.input(|i| i.pointer.press_origin()).or(pointer);
        if let Some(pos) = origin {
            session.pointer_down(pos, &frame, sink);
        }
    }

    if let Some(pos) = pointer {
        session.pointer_move(pos, &frame, sink);
    }

    let released = if response.drag_stopped_by(primary) {
        pointer
    } else if response.clicked_by(primary) {
        // A click never moves: press and release at the same point.
        if let Some(pos) = pointer {
            session.pointer_down(pos, &frame, sink);
        }
        pointer
    } else {
        None
    };
    if let Some(pos) = released {
        if let DrawingOutcome::Created(id) = session.pointer_up(pos, &frame, store, sink) {
            created = Some(id);
        }
    }

    if !response.hovered() && !session.is_dragging() {
        session.pointer_leave(sink);
    }

    created
}

fn draw_grid(
    painter: &egui::Painter,
    transform: &dyn PlotTransform,
    x_grid: &[(f64, bool)],
    y_grid: &[(f64, bool)],
    theme: Theme,
) {
    let rect = transform.plot_rect().to_egui();
    let stroke = egui::Stroke::new(1.0, theme.grid_color());
    for &(xval, _) in x_grid.iter().filter(|(_, major)| *major) {
        let x = transform.to_pixel(DataPoint { x: xval, y: None }).x;
        painter.vline(x, rect.y_range(), stroke);
    }
    for &(yval, _) in y_grid.iter().filter(|(_, major)| *major) {
        if let Some(y) = transform.to_pixel(DataPoint { x: 0.0, y: Some(yval) }).y {
            painter.hline(rect.x_range(), y, stroke);
        }
    }
}

fn draw_label_regions(
    painter: &egui::Painter,
    transform: &dyn PlotTransform,
    labels: &[Label],
    settings: &PanelSettings<'_>,
) {
    let rect = transform.plot_rect().to_egui();
    let alpha = settings.theme.label_fill_alpha();
    for label in labels.iter().filter(|l| l.is_visible()) {
        let left = transform.to_pixel(DataPoint { x: label.start_time, y: None }).x;
        let right = transform.to_pixel(DataPoint { x: label.end_time, y: None }).x;
        let (left, right) = (left.max(rect.left()), right.min(rect.right()));
        if right < left {
            continue;
        }
        let color = settings
            .definitions
            .resolve(&label.label_def_id)
            .map_or(egui::Color32::GRAY, |d| d.color32());
        let region = egui::Rect::from_x_y_ranges(left..=right.max(left + 1.0), rect.y_range());
        painter.rect_filled(region, 0.0, color.gamma_multiply(alpha as f32 / 255.0));
        painter.vline(left, rect.y_range(), egui::Stroke::new(1.0, color));
        painter.vline(right, rect.y_range(), egui::Stroke::new(1.0, color));
    }
}

fn draw_series(painter: &egui::Painter, graph: &GraphState, transform: &dyn PlotTransform, plot_rect: egui::Rect) {
    let Some(series) = &graph.series else {
        return;
    };
    let pv = &graph.plot_view;
    // Two points per pixel column is enough for a faithful line.
    let max_points = (plot_rect.width() as usize * 2).max(3);
    let visible = downsampling::downsample_for_view(&series.points, pv.x_min, pv.x_max, max_points);

    let points: Vec<egui::Pos2> = visible
        .iter()
        .filter_map(|p| {
            let px = transform.to_pixel(DataPoint { x: p[0], y: Some(p[1]) });
            px.y.map(|y| egui::pos2(px.x, y))
        })
        .collect();

    let stroke = egui::Stroke::new(1.5, series.color32());
    if points.len() == 1 {
        painter.circle_filled(points[0], 2.5, stroke.color);
    } else if points.len() > 1 {
        painter.add(egui::Shape::line(points, stroke));
    }
}

fn draw_feedback(painter: &egui::Painter, feedback: DrawingFeedback, plot_rect: egui::Rect, settings: &PanelSettings<'_>) {
    let color = settings
        .active_label_def
        .and_then(|id| settings.definitions.resolve(id))
        .map_or(settings.theme.guide_color(), |d| d.color32());
    match feedback {
        DrawingFeedback::HoverGuide { x } => {
            painter.vline(x, plot_rect.y_range(), egui::Stroke::new(1.0, settings.theme.guide_color().gamma_multiply(0.6)));
        }
        DrawingFeedback::Span { x, width, .. } => {
            let span = egui::Rect::from_x_y_ranges(x..=x + width.max(1.0), plot_rect.y_range());
            painter.rect_filled(span, 0.0, color.gamma_multiply(0.35));
            painter.rect_stroke(span, 0.0, egui::Stroke::new(1.5, color), egui::StrokeKind::Inside);
        }
    }
}

fn draw_axes_and_labels(
    painter: &egui::Painter,
    graph: &GraphState,
    transform: &dyn PlotTransform,
    total_rect: egui::Rect,
    (x_grid, y_grid): (&[(f64, bool)], &[(f64, bool)]),
    is_datetime: bool,
    theme: Theme,
) {
    let plot_rect = transform.plot_rect().to_egui();
    let text_color = painter.ctx().style().visuals.text_color();
    let dim_color = theme.axis_text();

    painter.rect_stroke(plot_rect, 0.0, egui::Stroke::new(1.0, dim_color), egui::StrokeKind::Outside);

    for &(xval, _) in x_grid.iter().filter(|(_, major)| *major) {
        let screen_x = transform.to_pixel(DataPoint { x: xval, y: None }).x;
        if screen_x < plot_rect.left() || screen_x > plot_rect.right() {
            continue;
        }
        painter.text(
            egui::Pos2::new(screen_x, plot_rect.bottom() + 4.0),
            egui::Align2::CENTER_TOP,
            plot_interaction::format_tick_value(xval, is_datetime),
            egui::FontId::proportional(10.0),
            dim_color,
        );
    }

    painter.text(
        egui::Pos2::new(plot_rect.center().x, total_rect.bottom() - 4.0),
        egui::Align2::CENTER_BOTTOM,
        graph.x_axis_name(),
        egui::FontId::proportional(12.0),
        text_color,
    );

    for &(yval, _) in y_grid.iter().filter(|(_, major)| *major) {
        let Some(screen_y) = transform.to_pixel(DataPoint { x: 0.0, y: Some(yval) }).y else {
            continue;
        };
        if screen_y < plot_rect.top() || screen_y > plot_rect.bottom() {
            continue;
        }
        painter.text(
            egui::Pos2::new(plot_rect.left() - 4.0, screen_y),
            egui::Align2::RIGHT_CENTER,
            plot_interaction::format_tick_value(yval, false),
            egui::FontId::proportional(10.0),
            dim_color,
        );
    }

    painter.text(
        egui::Pos2::new(total_rect.left() + 2.0, plot_rect.top()),
        egui::Align2::LEFT_BOTTOM,
        graph.y_axis_name(),
        egui::FontId::proportional(11.0),
        text_color,
    );
}

/// Nearest sample under the pointer, plus the label covering it if any.
fn draw_hover_tooltip(
    painter: &egui::Painter,
    graph: &GraphState,
    workspace: &Workspace,
    definitions: &LabelDefinitionRegistry,
    transform: &dyn PlotTransform,
    mouse_pos: egui::Pos2,
) {
    let samples = graph.samples();
    let mouse_x = transform.to_data(mouse_pos).x;
    let Some(sample) = snap::nearest(mouse_x, samples) else {
        return;
    };
    let px = transform.to_pixel(DataPoint {
        x: sample[0],
        y: Some(sample[1]),
    });
    let Some(py) = px.y else {
        return;
    };
    let screen = egui::pos2(px.x, py);
    if (screen.x - mouse_pos.x).abs() > 12.0 {
        return;
    }

    let x_str = if graph.x_is_datetime() {
        datetime::format_timestamp_ms(sample[0])
    } else {
        format!("{:.3}", sample[0])
    };
    let mut text = format!("X={x_str}, Y={:.3}", sample[1]);
    if let Some(label) = workspace.active_store().and_then(|s| s.label_at(sample[0])) {
        let name = definitions
            .resolve(&label.label_def_id)
            .map_or("(deleted)", |d| d.name.as_str());
        text.push_str(&format!("\n{name}"));
    }

    let color = graph.series.as_ref().map_or(egui::Color32::WHITE, |s| s.color32());
    painter.circle_filled(screen, 5.0, color);
    painter.circle_stroke(screen, 5.0, egui::Stroke::new(1.0, egui::Color32::WHITE));

    let font = egui::FontId::proportional(11.0);
    let text_color = painter.ctx().style().visuals.text_color();
    let galley = painter.layout_no_wrap(text, font, text_color);
    let tooltip_pos = egui::Pos2::new(screen.x + 10.0, screen.y - galley.rect.height() - 8.0);
    let bg_rect = egui::Rect::from_min_size(
        egui::Pos2::new(tooltip_pos.x - 4.0, tooltip_pos.y - 2.0),
        egui::Vec2::new(galley.rect.width() + 8.0, galley.rect.height() + 4.0),
    );
    let bg_color = painter.ctx().style().visuals.window_fill;
    painter.rect_filled(bg_rect, 3.0, bg_color.gamma_multiply(0.9));
    painter.rect_stroke(bg_rect, 3.0, egui::Stroke::new(0.5, color), egui::StrokeKind::Outside);
    painter.galley(tooltip_pos, galley, text_color);
}
