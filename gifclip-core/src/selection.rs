//! Interactive region selection
//!
//! Drives one selection episode over the virtual canvas. The surface feeds
//! pointer events in canvas-local coordinates; the controller produces
//! exactly one [`SelectionOutcome`].
//!
//! ```text
//! Idle ──down──▶ Dragging ──up (≥ min size)──▶ Resolved(Region)
//!  ▲                │
//!  └──up (too small)┘        cancel (any time before Resolved) ──▶ Cancelled
//! ```

use std::future::Future;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, trace};

use crate::display::{combined_bounds, display_containing};
use crate::error::{ClipError, Result};
use crate::types::{Display, DisplayId, Point, Region, VirtualCanvas};

/// Minimum accepted width/height in canvas units
pub const MIN_SELECTION_SIZE: f64 = 10.0;

/// Input from the selection surface
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SelectionEvent {
    PointerDown { x: f64, y: f64 },
    PointerMove { x: f64, y: f64 },
    PointerUp { x: f64, y: f64 },
    /// Escape pressed or equivalent
    Cancel,
}

/// Payload sent to the surface when an episode starts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionInit {
    pub displays: Vec<Display>,
    pub combined_bounds: VirtualCanvas,
}

/// Controller state
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SelectionState {
    Idle,
    Dragging { anchor: Point, current: Point },
    Resolved(Region),
    Cancelled,
}

/// Result of one selection episode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionOutcome {
    Selected(Region),
    Cancelled,
}

/// Canvas-local rectangle between two corners
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreviewRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl PreviewRect {
    fn between(a: Point, b: Point) -> Self {
        Self {
            x: a.x.min(b.x),
            y: a.y.min(b.y),
            width: (b.x - a.x).abs(),
            height: (b.y - a.y).abs(),
        }
    }

    fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// One region-selection episode
pub struct SelectionController {
    displays: Vec<Display>,
    canvas: Option<VirtualCanvas>,
    state: SelectionState,
}

impl SelectionController {
    /// Create a controller for the given display snapshot
    ///
    /// With no displays there is no canvas, and pointer input is ignored
    /// until the episode is cancelled.
    pub fn new(displays: Vec<Display>) -> Self {
        let canvas = if displays.is_empty() {
            None
        } else {
            Some(combined_bounds(&displays))
        };
        Self {
            displays,
            canvas,
            state: SelectionState::Idle,
        }
    }

    /// Surface initialization payload, if a canvas is known
    pub fn init(&self) -> Option<SelectionInit> {
        self.canvas.map(|canvas| SelectionInit {
            displays: self.displays.clone(),
            combined_bounds: canvas,
        })
    }

    pub fn state(&self) -> SelectionState {
        self.state
    }

    pub fn canvas(&self) -> Option<VirtualCanvas> {
        self.canvas
    }

    /// Live rectangle while dragging
    pub fn preview(&self) -> Option<PreviewRect> {
        match self.state {
            SelectionState::Dragging { anchor, current } => {
                Some(PreviewRect::between(anchor, current))
            }
            _ => None,
        }
    }

    /// Whether an outcome has already been delivered
    pub fn is_finished(&self) -> bool {
        matches!(
            self.state,
            SelectionState::Resolved(_) | SelectionState::Cancelled
        )
    }

    /// Feed one event; returns the outcome the first time the episode ends
    ///
    /// Every call after the outcome was delivered returns `None`.
    pub fn handle(&mut self, event: SelectionEvent) -> Option<SelectionOutcome> {
        if self.is_finished() {
            trace!("Ignoring {:?} after selection finished", event);
            return None;
        }

        match (event, self.state) {
            (SelectionEvent::Cancel, _) => {
                info!("Region selection cancelled");
                self.state = SelectionState::Cancelled;
                Some(SelectionOutcome::Cancelled)
            }
            (SelectionEvent::PointerDown { x, y }, SelectionState::Idle) => {
                if self.canvas.is_none() {
                    debug!("Pointer down before canvas is known, ignoring");
                    return None;
                }
                let anchor = Point::new(x, y);
                self.state = SelectionState::Dragging {
                    anchor,
                    current: anchor,
                };
                None
            }
            (SelectionEvent::PointerMove { x, y }, SelectionState::Dragging { anchor, .. }) => {
                self.state = SelectionState::Dragging {
                    anchor,
                    current: Point::new(x, y),
                };
                None
            }
            (SelectionEvent::PointerUp { x, y }, SelectionState::Dragging { anchor, .. }) => {
                match self.resolve(anchor, Point::new(x, y)) {
                    Ok(region) => {
                        info!("Region selected: {}", region);
                        self.state = SelectionState::Resolved(region);
                        Some(SelectionOutcome::Selected(region))
                    }
                    Err(e) => {
                        debug!("{}; waiting for another drag", e);
                        self.state = SelectionState::Idle;
                        None
                    }
                }
            }
            (event, state) => {
                trace!("Ignoring {:?} in state {:?}", event, state);
                None
            }
        }
    }

    /// Turn a drag into a global region, rejecting sub-threshold drags
    fn resolve(&self, anchor: Point, release: Point) -> Result<Region> {
        let canvas = self.canvas.ok_or(ClipError::NoDisplays)?;
        let rect = PreviewRect::between(anchor, release);

        if rect.width < MIN_SELECTION_SIZE || rect.height < MIN_SELECTION_SIZE {
            return Err(ClipError::SelectionRejected {
                width: rect.width.round() as u32,
                height: rect.height.round() as u32,
            });
        }

        let display_id = display_containing(rect.center(), canvas.origin(), &self.displays)
            .map(|d| d.id)
            .unwrap_or(DisplayId(0));

        let origin = Point::new(rect.x, rect.y).offset(canvas.origin());
        Ok(Region {
            x: origin.x.round() as i32,
            y: origin.y.round() as i32,
            width: rect.width.round() as u32,
            height: rect.height.round() as u32,
            display_id,
        })
    }

    /// Drive the episode from a surface event stream
    ///
    /// Resolves exactly once. A closed stream (surface torn down without
    /// resolving) or a completed `cancelled` future ends the episode as
    /// [`SelectionOutcome::Cancelled`].
    pub async fn run<F>(
        mut self,
        events: &mut mpsc::Receiver<SelectionEvent>,
        cancelled: F,
    ) -> SelectionOutcome
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(cancelled);

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => {
                        if let Some(outcome) = self.handle(event) {
                            return outcome;
                        }
                    }
                    None => {
                        info!("Selection surface closed without a region");
                        return self.handle(SelectionEvent::Cancel).unwrap_or(SelectionOutcome::Cancelled);
                    }
                },
                _ = &mut cancelled => {
                    return self.handle(SelectionEvent::Cancel).unwrap_or(SelectionOutcome::Cancelled);
                }
            }
        }
    }
}
