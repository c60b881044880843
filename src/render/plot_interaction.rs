use crate::data::datetime;
use crate::processing::autoscale::{self, YBounds};
use crate::render::coordinate_mapper::{AffineTransform, PixelRect, ViewDomain};

/// Visible bounds of the line chart and pan/zoom handling.
///
/// Zoom and pan act on the X axis only; Y follows the visible window through
/// the autoscaler unless auto-scaling is turned off.
#[derive(Debug, Clone)]
pub struct PlotViewState {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
    /// Refit to the data on the next frame
    pub auto_fit: bool,
    pub initialized: bool,
    /// Previous frame's X range for change detection.
    pub prev_x_min: f64,
    pub prev_x_max: f64,
}

impl Default for PlotViewState {
    fn default() -> Self {
        Self {
            x_min: 0.0,
            x_max: 1.0,
            y_min: 0.0,
            y_max: 1.0,
            auto_fit: true,
            initialized: false,
            prev_x_min: f64::NAN,
            prev_x_max: f64::NAN,
        }
    }
}

impl PlotViewState {
    pub fn new() -> Self {
        Self::default()
    }

    /// True if the X range moved since the last snapshot.
    pub fn x_range_changed(&self) -> bool {
        !((self.x_min - self.prev_x_min).abs() <= 1e-15 && (self.x_max - self.prev_x_max).abs() <= 1e-15)
    }

    pub fn snapshot_x_range(&mut self) {
        self.prev_x_min = self.x_min;
        self.prev_x_max = self.x_max;
    }

    pub fn view_domain(&self) -> ViewDomain {
        ViewDomain {
            x: (self.x_min, self.x_max),
            y: Some((self.y_min, self.y_max)),
        }
    }

    pub fn transform(&self, rect: egui::Rect) -> AffineTransform {
        AffineTransform::new(self.view_domain(), PixelRect::from_egui(rect))
    }

    /// Fit both axes to `points` with 5% padding on X and autoscaled Y.
    pub fn fit_to_data(&mut self, points: &[[f64; 2]], padding: f64) {
        let (Some(first), Some(last)) = (points.first(), points.last()) else {
            return;
        };
        let (x_min, x_max) = (first[0], last[0]);
        let x_pad = (x_max - x_min) * 0.05;
        let x_pad = if x_pad.abs() < 1e-15 { 0.5 } else { x_pad };
        self.x_min = x_min - x_pad;
        self.x_max = x_max + x_pad;
        if let Some(bounds) = autoscale::compute_y_bounds(points, 0.0, 100.0, padding) {
            self.apply_y_bounds(bounds);
        }
        self.auto_fit = false;
        self.initialized = true;
    }

    pub fn apply_y_bounds(&mut self, bounds: YBounds) {
        self.y_min = bounds.min;
        self.y_max = bounds.max;
    }

    /// Recompute Y from the samples inside the current X window. Leaves Y
    /// untouched and returns `false` when nothing is visible.
    pub fn autoscale_y(&mut self, points: &[[f64; 2]], padding: f64) -> bool {
        let bounds = autoscale::visible_percent_range(points, self.x_min, self.x_max)
            .and_then(|(start, end)| autoscale::compute_y_bounds(points, start, end, padding));
        match bounds {
            Some(b) => {
                self.apply_y_bounds(b);
                true
            }
            None => false,
        }
    }

    /// Scale the X range by `factor` around `center_x`.
    pub fn zoom_x(&mut self, center_x: f64, factor: f64) {
        let x_min = center_x + (self.x_min - center_x) * factor;
        let x_max = center_x + (self.x_max - center_x) * factor;
        if x_max - x_min > f64::EPSILON * center_x.abs().max(1.0) {
            self.x_min = x_min;
            self.x_max = x_max;
        }
    }

    /// Shift the X range by a horizontal drag of `dx_px` over a plot `width_px` wide.
    pub fn pan_x(&mut self, dx_px: f32, width_px: f32) {
        if width_px <= 0.0 {
            return;
        }
        let dx = -(dx_px as f64) * (self.x_max - self.x_min) / width_px as f64;
        self.x_min += dx;
        self.x_max += dx;
    }

    /// Handle pointer input on the plot area. Dragging with `pan_button` pans,
    /// the scroll wheel zooms around the pointer, double-click refits.
    pub fn handle_input(&mut self, response: &egui::Response, rect: egui::Rect, pan_button: egui::PointerButton) {
        if response.dragged_by(pan_button) {
            self.pan_x(response.drag_delta().x, rect.width());
            self.auto_fit = false;
        }

        let scroll_delta = response.ctx.input(|i| {
            if response.hovered() {
                i.smooth_scroll_delta.y
            } else {
                0.0
            }
        });

        if scroll_delta.abs() > 0.0 {
            let factor = (1.0 - (scroll_delta as f64) * 0.001).clamp(0.5, 2.0);
            if let Some(mouse_pos) = response.hover_pos() {
                let t = (mouse_pos.x - rect.left()) as f64 / rect.width().max(1.0) as f64;
                let center = self.x_min + t * (self.x_max - self.x_min);
                self.zoom_x(center, factor);
            }
            self.auto_fit = false;
        }

        if response.double_clicked() {
            self.auto_fit = true;
        }
    }
}

/// Compute nice grid line positions for an axis range.
/// Returns (value, is_major) pairs.
pub fn compute_grid_lines(min: f64, max: f64) -> Vec<(f64, bool)> {
    let range = max - min;
    if range <= 0.0 || !range.is_finite() {
        return Vec::new();
    }

    let raw_step = range / 8.0;
    let order = 10f64.powf(raw_step.log10().floor());
    let nice_step = match raw_step / order {
        n if n <= 1.0 => order,
        n if n <= 2.0 => 2.0 * order,
        n if n <= 5.0 => 5.0 * order,
        _ => 10.0 * order,
    };
    let minor_step = nice_step / 5.0;

    let start = (min / minor_step).floor() as i64;
    let end = (max / minor_step).ceil() as i64;
    (start..=end)
        .map(|i| i as f64 * minor_step)
        .filter(|v| *v >= min && *v <= max)
        .map(|v| (v, ((v / nice_step).round() * nice_step - v).abs() < nice_step * 0.01))
        .collect()
}

/// Axis tick text; epoch-millisecond axes are shown as datetimes.
pub fn format_tick_value(val: f64, is_datetime: bool) -> String {
    if is_datetime {
        return datetime::format_timestamp_ms(val);
    }
    if val == 0.0 {
        "0".to_string()
    } else if val.abs() >= 1e6 || val.abs() < 1e-3 {
        format!("{val:.2e}")
    } else {
        let s = format!("{val:.6}");
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}
