use egui::{Color32, Visuals};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl Theme {
    pub fn toggle(&self) -> Self {
        match self {
            Theme::Dark => Theme::Light,
            Theme::Light => Theme::Dark,
        }
    }

    pub fn visuals(&self) -> Visuals {
        match self {
            Theme::Dark => Visuals::dark(),
            Theme::Light => Visuals::light(),
        }
    }

    pub fn plot_bg(&self) -> Color32 {
        match self {
            Theme::Dark => Color32::from_rgb(20, 20, 20),
            Theme::Light => Color32::from_rgb(255, 255, 255),
        }
    }

    pub fn grid_color(&self) -> Color32 {
        match self {
            Theme::Dark => Color32::from_rgba_premultiplied(100, 100, 100, 60),
            Theme::Light => Color32::from_rgba_premultiplied(180, 180, 180, 80),
        }
    }

    pub fn axis_text(&self) -> Color32 {
        match self {
            Theme::Dark => Color32::from_gray(170),
            Theme::Light => Color32::from_gray(70),
        }
    }

    /// Stroke for the hover guide and provisional span outline.
    pub fn guide_color(&self) -> Color32 {
        match self {
            Theme::Dark => Color32::from_rgb(255, 255, 255),
            Theme::Light => Color32::from_rgb(30, 30, 30),
        }
    }

    /// Fill alpha for label regions drawn behind the series.
    pub fn label_fill_alpha(&self) -> u8 {
        match self {
            Theme::Dark => 60,
            Theme::Light => 45,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Theme::Dark => "Dark",
            Theme::Light => "Light",
        }
    }
}
