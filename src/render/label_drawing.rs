//! Press-drag-release gesture that turns a pointer drag into a [`Label`].
//!
//! The session is a three-phase state machine:
//!
//! * `Idle`: drawing mode is off.
//! * `Previewing`: drawing mode is on and the pointer is hovering.
//! * `Dragging`: the button is held and an anchor x has been recorded.
//!
//! Every endpoint, including each intermediate preview frame, is resolved
//! by mapping the pointer to data space and snapping to the nearest sample
//! when snapping is enabled.

use crate::processing::snap;
use crate::render::coordinate_mapper::{DataPoint, PlotTransform};
use crate::state::label::Label;
use crate::state::label_store::LabelStore;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DrawingPhase {
    Idle,
    Previewing,
    Dragging { anchor_x: f64 },
}

/// Provisional overlay handed to the renderer each frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DrawingFeedback {
    /// Vertical guide at the resolved hover position (pixels).
    HoverGuide { x: f32 },
    /// Highlight from `x` over `width` pixels, covering `start..=end` in data space.
    Span { x: f32, width: f32, start: f64, end: f64 },
}

/// Receiver of drawing feedback, implemented by the plot widget.
pub trait FeedbackSink {
    fn show(&mut self, feedback: DrawingFeedback);
    fn clear(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawingConfig {
    pub snap_to_samples: bool,
    /// Narrowest accepted label, in screen pixels at the current zoom.
    pub min_width_px: f32,
}

impl Default for DrawingConfig {
    fn default() -> Self {
        Self {
            snap_to_samples: true,
            min_width_px: 3.0,
        }
    }
}

/// The dataset a session draws on. Owned by the application shell and
/// replaced when the active dataset changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub dataset_id: String,
}

/// Everything about the current frame the session needs to resolve a pointer.
pub struct PlotFrame<'a> {
    pub transform: &'a dyn PlotTransform,
    pub samples: &'a [[f64; 2]],
    /// Definition new labels are created with. Drawing does not start without one.
    pub label_def_id: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawingOutcome {
    None,
    Started,
    Created(String),
    /// Released with a span narrower than the minimum width.
    Rejected,
    /// A drag ended without producing a label.
    Abandoned,
}

#[derive(Debug)]
pub struct LabelDrawingSession {
    context: SessionContext,
    config: DrawingConfig,
    phase: DrawingPhase,
}

impl LabelDrawingSession {
    pub fn new(context: SessionContext, config: DrawingConfig) -> Self {
        Self {
            context,
            config,
            phase: DrawingPhase::Idle,
        }
    }

    pub fn phase(&self) -> DrawingPhase {
        self.phase
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub fn config(&self) -> DrawingConfig {
        self.config
    }

    pub fn set_config(&mut self, config: DrawingConfig) {
        self.config = config;
    }

    pub fn is_enabled(&self) -> bool {
        self.phase != DrawingPhase::Idle
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.phase, DrawingPhase::Dragging { .. })
    }

    pub fn enable(&mut self) {
        if self.phase == DrawingPhase::Idle {
            self.phase = DrawingPhase::Previewing;
        }
    }

    /// Leave drawing mode from any phase. An in-progress drag is dropped.
    pub fn disable(&mut self, sink: &mut dyn FeedbackSink) -> DrawingOutcome {
        let was_dragging = self.is_dragging();
        self.phase = DrawingPhase::Idle;
        sink.clear();
        if was_dragging {
            tracing::debug!("Label drag abandoned on {}", self.context.dataset_id);
            DrawingOutcome::Abandoned
        } else {
            DrawingOutcome::None
        }
    }

    pub fn set_enabled(&mut self, enabled: bool, sink: &mut dyn FeedbackSink) -> DrawingOutcome {
        if enabled {
            self.enable();
            DrawingOutcome::None
        } else if self.is_enabled() {
            self.disable(sink)
        } else {
            DrawingOutcome::None
        }
    }

    /// Point the session at another dataset. Any drag is abandoned first and
    /// the session returns to `Idle`.
    pub fn switch_context(&mut self, context: SessionContext, sink: &mut dyn FeedbackSink) -> DrawingOutcome {
        let outcome = self.disable(sink);
        self.context = context;
        outcome
    }

    pub fn pointer_down(&mut self, pos: egui::Pos2, frame: &PlotFrame<'_>, sink: &mut dyn FeedbackSink) -> DrawingOutcome {
        if self.phase != DrawingPhase::Previewing {
            return DrawingOutcome::None;
        }
        if frame.label_def_id.is_none() {
            tracing::debug!("No label definition selected; not starting a drag");
            return DrawingOutcome::None;
        }
        let Some(anchor_x) = self.resolve_x(pos, frame) else {
            return DrawingOutcome::None;
        };
        self.phase = DrawingPhase::Dragging { anchor_x };
        sink.show(span_feedback(frame.transform, anchor_x, anchor_x));
        DrawingOutcome::Started
    }

    /// Hover guide while previewing, live span while dragging. Never touches
    /// the label store.
    pub fn pointer_move(&mut self, pos: egui::Pos2, frame: &PlotFrame<'_>, sink: &mut dyn FeedbackSink) {
        match self.phase {
            DrawingPhase::Idle => {}
            DrawingPhase::Previewing => match self.resolve_x(pos, frame) {
                Some(x) => sink.show(DrawingFeedback::HoverGuide {
                    x: frame.transform.to_pixel(DataPoint { x, y: None }).x,
                }),
                None => sink.clear(),
            },
            DrawingPhase::Dragging { anchor_x } => {
                if let Some(x) = self.resolve_x(pos, frame) {
                    sink.show(span_feedback(frame.transform, anchor_x, x));
                }
            }
        }
    }

    /// Finish a drag. A span at least as wide as the minimum is added to
    /// `store` as a new label.
    pub fn pointer_up(
        &mut self,
        pos: egui::Pos2,
        frame: &PlotFrame<'_>,
        store: &mut LabelStore,
        sink: &mut dyn FeedbackSink,
    ) -> DrawingOutcome {
        let DrawingPhase::Dragging { anchor_x } = self.phase else {
            return DrawingOutcome::None;
        };
        self.phase = DrawingPhase::Previewing;
        sink.clear();

        let release_x = self.resolve_x(pos, frame).unwrap_or(anchor_x);
        let start = anchor_x.min(release_x);
        let end = anchor_x.max(release_x);

        let min_width = (self.config.min_width_px as f64 * frame.transform.data_per_pixel_x()).max(f64::MIN_POSITIVE);
        if !(end - start >= min_width) {
            tracing::debug!("Discarding label narrower than {min_width}: [{start}, {end}]");
            return DrawingOutcome::Rejected;
        }

        if store.dataset_id() != self.context.dataset_id {
            tracing::warn!(
                "Label store for {} does not match drawing session for {}",
                store.dataset_id(),
                self.context.dataset_id
            );
            return DrawingOutcome::Abandoned;
        }
        let Some(label_def_id) = frame.label_def_id else {
            return DrawingOutcome::Abandoned;
        };

        let label = Label::new(&self.context.dataset_id, start, end, label_def_id, store.now());
        let id = label.id.clone();
        if store.add(label) {
            tracing::info!("Created label {id} [{start}, {end}]");
            DrawingOutcome::Created(id)
        } else {
            DrawingOutcome::Abandoned
        }
    }

    /// Pointer left the plot. Clears the hover guide; a drag keeps going.
    pub fn pointer_leave(&mut self, sink: &mut dyn FeedbackSink) {
        if self.phase == DrawingPhase::Previewing {
            sink.clear();
        }
    }

    fn resolve_x(&self, pos: egui::Pos2, frame: &PlotFrame<'_>) -> Option<f64> {
        let raw = frame.transform.to_data(pos).x;
        snap::snap_x(raw, frame.samples, self.config.snap_to_samples)
    }
}

fn span_feedback(transform: &dyn PlotTransform, a: f64, b: f64) -> DrawingFeedback {
    let start = a.min(b);
    let end = a.max(b);
    let left = transform.to_pixel(DataPoint { x: start, y: None }).x;
    let right = transform.to_pixel(DataPoint { x: end, y: None }).x;
    DrawingFeedback::Span {
        x: left,
        width: right - left,
        start,
        end,
    }
}
