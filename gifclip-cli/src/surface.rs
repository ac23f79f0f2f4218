//! Terminal capture surface
//!
//! There is no overlay window in a terminal, so selection replays a fixed
//! region as a pointer drag over the canvas and the countdown is printed.

use async_trait::async_trait;
use gifclip_core::countdown::CountdownEvent;
use gifclip_core::error::Result;
use gifclip_core::selection::{SelectionEvent, SelectionInit};
use gifclip_core::surface::{CaptureSurface, CountdownInit, CountdownSurface};
use gifclip_core::types::{Bounds, Display, Point};
use tokio::sync::mpsc;
use tracing::{info, warn};

pub struct TerminalSurface {
    displays: Vec<Display>,
    region: Option<Bounds>,
    announce: bool,
}

impl TerminalSurface {
    /// `region` is in global coordinates; `None` selects the first display
    pub fn new(displays: Vec<Display>, region: Option<Bounds>) -> Self {
        Self {
            displays,
            region,
            announce: true,
        }
    }

    /// Log instead of printing (daemon mode)
    pub fn quiet(mut self) -> Self {
        self.announce = false;
        self
    }

    fn say(&self, line: &str) {
        if self.announce {
            println!("{}", line);
        } else {
            info!("{}", line);
        }
    }
}

/// Displays from config, or one display spanning the region when none are listed
pub fn display_layout(configured: Vec<Display>, region: Option<Bounds>) -> Vec<Display> {
    if !configured.is_empty() {
        return configured;
    }
    match region {
        Some(region) => {
            warn!("No [[displays]] configured, assuming one display around {}", region);
            // Cover both the origin and the region
            let x = region.x.min(0);
            let y = region.y.min(0);
            let width = (region.right().max(0) - x as i64) as u32;
            let height = (region.bottom().max(0) - y as i64) as u32;
            vec![Display::new(0, Bounds::new(x, y, width, height), 1.0)]
        }
        None => Vec::new(),
    }
}

#[async_trait]
impl CaptureSurface for TerminalSurface {
    async fn displays(&self) -> Result<Vec<Display>> {
        Ok(self.displays.clone())
    }

    async fn open_selection(&self, init: SelectionInit) -> Result<mpsc::Receiver<SelectionEvent>> {
        let (tx, rx) = mpsc::channel(4);

        let target = match self.region {
            Some(region) => Some(region),
            None => init.displays.first().map(|d| d.bounds),
        };

        if let Some(target) = target {
            let canvas = init.combined_bounds;
            let start = canvas.to_local(target.origin());
            let end = Point::new(
                start.x + target.width as f64,
                start.y + target.height as f64,
            );

            self.say(&format!("Selecting {}", target));
            // Capacity covers the whole drag; dropping tx afterwards closes the window
            let _ = tx.try_send(SelectionEvent::PointerDown { x: start.x, y: start.y });
            let _ = tx.try_send(SelectionEvent::PointerMove { x: end.x, y: end.y });
            let _ = tx.try_send(SelectionEvent::PointerUp { x: end.x, y: end.y });
        }

        Ok(rx)
    }

    async fn open_countdown(&self, init: CountdownInit) -> Result<CountdownSurface> {
        let (cancel_tx, cancel) = mpsc::channel(1);
        let (events, mut event_rx) = mpsc::unbounded_channel();
        let announce = self.announce;

        if init.duration_secs > 0 {
            self.say(&format!("Recording starts in {}...", init.duration_secs));
        }

        tokio::spawn(async move {
            // Holding the cancel sender keeps the countdown window open
            let _cancel_tx = cancel_tx;
            while let Some(event) = event_rx.recv().await {
                let line = match event {
                    CountdownEvent::Tick { remaining: 0 } => continue,
                    CountdownEvent::Tick { remaining } => format!("  {}...", remaining),
                    CountdownEvent::Recording => {
                        "Recording. Press Enter to finish, Ctrl+C to cancel.".to_string()
                    }
                };
                if announce {
                    println!("{}", line);
                } else {
                    info!("{}", line.trim());
                }
            }
        });

        Ok(CountdownSurface {
            cancel,
            events: Some(events),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gifclip_core::display::combined_bounds;
    use gifclip_core::selection::{SelectionController, SelectionOutcome};

    fn dual() -> Vec<Display> {
        vec![
            Display::new(0, Bounds::new(0, 0, 1920, 1080), 1.0),
            Display::new(1, Bounds::new(1920, 0, 1280, 1024), 1.0),
        ]
    }

    #[tokio::test]
    async fn test_replayed_drag_selects_region() {
        let surface = TerminalSurface::new(dual(), Some(Bounds::new(2000, 100, 640, 480))).quiet();
        let controller = SelectionController::new(dual());
        let init = controller.init().unwrap();
        let mut events = surface.open_selection(init).await.unwrap();

        match controller.run(&mut events, std::future::pending()).await {
            SelectionOutcome::Selected(region) => {
                assert_eq!(region.bounds(), Bounds::new(2000, 100, 640, 480));
                assert_eq!(region.display_id.0, 1);
            }
            SelectionOutcome::Cancelled => panic!("expected a region"),
        }
    }

    #[tokio::test]
    async fn test_no_region_selects_first_display() {
        let surface = TerminalSurface::new(dual(), None).quiet();
        let init = SelectionInit {
            displays: dual(),
            combined_bounds: combined_bounds(&dual()),
        };
        let mut events = surface.open_selection(init).await.unwrap();
        assert_eq!(
            events.recv().await,
            Some(SelectionEvent::PointerDown { x: 0.0, y: 0.0 })
        );
    }

    #[test]
    fn test_layout_falls_back_to_region_extent() {
        let layout = display_layout(Vec::new(), Some(Bounds::new(100, 100, 640, 480)));
        assert_eq!(layout.len(), 1);
        assert_eq!(layout[0].bounds, Bounds::new(0, 0, 740, 580));
        assert!(display_layout(Vec::new(), None).is_empty());
    }

    #[test]
    fn test_layout_covers_region_left_of_origin() {
        let region = Bounds::new(-1280, -200, 640, 480);
        let layout = display_layout(Vec::new(), Some(region));
        assert_eq!(layout[0].bounds, Bounds::new(-1280, -200, 1280, 480));
        assert!(layout[0].bounds.x <= region.x);
        assert!(layout[0].bounds.right() >= region.right());

        let straddling = display_layout(Vec::new(), Some(Bounds::new(-100, 50, 640, 480)));
        assert_eq!(straddling[0].bounds, Bounds::new(-100, 0, 640, 530));
    }
}
