use crate::data::loader::LoadedData;
use crate::data::parser::ParseReport;
use crate::data::table::Table;
use crate::render::label_drawing::{DrawingFeedback, FeedbackSink};
use crate::render::plot_interaction::PlotViewState;
use crate::state::data_series::{AxisColumn, SampleSeries};

/// Line color of the plotted series.
pub const SERIES_COLOR: [u8; 4] = [90, 160, 255, 255];

/// Holds the drawing feedback the plot paints on top of the series.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedbackOverlay {
    pub current: Option<DrawingFeedback>,
}

impl FeedbackSink for FeedbackOverlay {
    fn show(&mut self, feedback: DrawingFeedback) {
        self.current = Some(feedback);
    }

    fn clear(&mut self) {
        self.current = None;
    }
}

/// Chart state for one opened dataset.
#[derive(Debug, Clone)]
pub struct GraphState {
    pub dataset_id: String,
    pub title: String,
    pub table: Table,
    pub report: ParseReport,
    pub series: Option<SampleSeries>,
    pub plot_view: PlotViewState,
    pub overlay: FeedbackOverlay,
}

impl GraphState {
    pub fn new(loaded: LoadedData) -> Self {
        Self {
            dataset_id: loaded.dataset_id,
            title: loaded.display_name,
            table: loaded.table,
            report: loaded.report,
            series: None,
            plot_view: PlotViewState::new(),
            overlay: FeedbackOverlay::default(),
        }
    }

    /// Derive the sample sequence for a new axis choice and refit the view.
    pub fn select_axes(&mut self, x: AxisColumn, y: AxisColumn) {
        let series = SampleSeries::from_table(&self.table, x, y, SERIES_COLOR);
        tracing::info!("Plotting {} ({} points) for {}", series.name, series.point_count(), self.dataset_id);
        if let Some((lo, hi)) = series.x_extent() {
            tracing::debug!("X extent [{lo}, {hi}]");
        }
        self.series = Some(series);
        self.plot_view.auto_fit = true;
        self.overlay.clear();
    }

    pub fn samples(&self) -> &[[f64; 2]] {
        match &self.series {
            Some(s) => &s.points,
            None => &[],
        }
    }

    pub fn x_is_datetime(&self) -> bool {
        self.series.as_ref().is_some_and(|s| s.x_is_datetime)
    }

    pub fn x_axis_name(&self) -> String {
        match &self.series {
            Some(s) if s.x_is_datetime => "Date and Time".to_string(),
            Some(s) => s.x_axis.label(&self.table),
            None => "X Axis".to_string(),
        }
    }

    pub fn y_axis_name(&self) -> String {
        self.series
            .as_ref()
            .map(|s| s.y_axis.label(&self.table))
            .unwrap_or_else(|| "Y Axis".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::parser;

    fn loaded(text: &str) -> LoadedData {
        let (table, report) = parser::parse_with_report(text);
        LoadedData {
            dataset_id: "/data/run.csv".to_string(),
            display_name: "run.csv".to_string(),
            table,
            report,
        }
    }

    #[test]
    fn selecting_axes_builds_series_and_refits() {
        let mut graph = GraphState::new(loaded("t;v\n2;20\n1;10"));
        assert!(graph.samples().is_empty());
        graph.plot_view.auto_fit = false;

        graph.select_axes(AxisColumn::Column(0), AxisColumn::Column(1));
        assert_eq!(graph.samples(), &[[1.0, 10.0], [2.0, 20.0]][..]);
        assert!(graph.plot_view.auto_fit);
        assert_eq!(graph.x_axis_name(), "t");
        assert_eq!(graph.y_axis_name(), "v");
        assert!(!graph.x_is_datetime());
    }

    #[test]
    fn overlay_tracks_latest_feedback() {
        let mut overlay = FeedbackOverlay::default();
        overlay.show(DrawingFeedback::HoverGuide { x: 3.0 });
        overlay.show(DrawingFeedback::HoverGuide { x: 4.0 });
        assert_eq!(overlay.current, Some(DrawingFeedback::HoverGuide { x: 4.0 }));
        overlay.clear();
        assert_eq!(overlay.current, None);
    }
}
