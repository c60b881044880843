//! Conversions between pixel space and data space.
//!
//! Both directions are affine. Pixel y grows downward, data y grows upward.
//! A zero-width domain maps every value onto the rectangle's left or top edge,
//! and a zero-size rectangle maps every pixel back to the domain's low end.

/// Plot area in screen pixels, supplied by the renderer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl PixelRect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    pub fn from_egui(rect: egui::Rect) -> Self {
        Self::new(rect.left(), rect.top(), rect.width(), rect.height())
    }

    pub fn to_egui(&self) -> egui::Rect {
        egui::Rect::from_min_size(egui::pos2(self.x, self.y), egui::vec2(self.width, self.height))
    }
}

/// Visible data-space bounds. The y domain is only needed for 2D mapping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewDomain {
    pub x: (f64, f64),
    pub y: Option<(f64, f64)>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DataPoint {
    pub x: f64,
    pub y: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelPoint {
    pub x: f32,
    pub y: Option<f32>,
}

/// `None` for a degenerate domain.
fn data_to_unit(value: f64, (lo, hi): (f64, f64)) -> Option<f64> {
    let span = hi - lo;
    (span != 0.0 && span.is_finite()).then(|| (value - lo) / span)
}

fn unit_to_data(t: f64, (lo, hi): (f64, f64)) -> f64 {
    lo + t * (hi - lo)
}

fn pixel_to_unit(offset: f32, extent: f32) -> f64 {
    if extent == 0.0 || !extent.is_finite() {
        0.0
    } else {
        offset as f64 / extent as f64
    }
}

/// Map a data point into the plot rectangle. `y` is mapped only when both
/// the point and the view carry one.
pub fn to_pixel(point: DataPoint, view: &ViewDomain, rect: &PixelRect) -> PixelPoint {
    let x = data_to_unit(point.x, view.x).map_or(rect.x, |t| rect.x + (t * rect.width as f64) as f32);
    let y = match (point.y, view.y) {
        (Some(y), Some(domain)) => Some(
            data_to_unit(y, domain).map_or(rect.y, |t| rect.y + ((1.0 - t) * rect.height as f64) as f32),
        ),
        _ => None,
    };
    PixelPoint { x, y }
}

/// Map a pixel position back into data space.
pub fn to_data(pos: egui::Pos2, view: &ViewDomain, rect: &PixelRect) -> DataPoint {
    let x = unit_to_data(pixel_to_unit(pos.x - rect.x, rect.width), view.x);
    let y = view.y.map(|domain| {
        // Zero height maps to the low end like the x axis does.
        let t = if rect.height == 0.0 {
            0.0
        } else {
            1.0 - pixel_to_unit(pos.y - rect.y, rect.height)
        };
        unit_to_data(t, domain)
    });
    DataPoint { x, y }
}

/// Narrow transform capability the label-drawing code depends on.
pub trait PlotTransform {
    fn to_pixel(&self, point: DataPoint) -> PixelPoint;
    fn to_data(&self, pos: egui::Pos2) -> DataPoint;
    fn plot_rect(&self) -> PixelRect;

    /// Data units covered by one horizontal pixel at the current zoom.
    fn data_per_pixel_x(&self) -> f64 {
        let rect = self.plot_rect();
        if rect.width <= 0.0 {
            return 0.0;
        }
        let left = self.to_data(egui::pos2(rect.x, rect.y)).x;
        let right = self.to_data(egui::pos2(rect.x + rect.width, rect.y)).x;
        ((right - left) / rect.width as f64).abs()
    }
}

/// [`PlotTransform`] backed by the free functions in this module.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AffineTransform {
    pub view: ViewDomain,
    pub rect: PixelRect,
}

impl AffineTransform {
    pub fn new(view: ViewDomain, rect: PixelRect) -> Self {
        Self { view, rect }
    }
}

impl PlotTransform for AffineTransform {
    fn to_pixel(&self, point: DataPoint) -> PixelPoint {
        to_pixel(point, &self.view, &self.rect)
    }

    fn to_data(&self, pos: egui::Pos2) -> DataPoint {
        to_data(pos, &self.view, &self.rect)
    }

    fn plot_rect(&self) -> PixelRect {
        self.rect
    }
}
