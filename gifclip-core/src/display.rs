//! Multi-display coordinate mapping
//!
//! Combines per-display bounds into one virtual canvas and resolves which
//! display a canvas-local point belongs to.

use crate::types::{Display, Point, VirtualCanvas};

/// Smallest axis-aligned box covering every display
///
/// # Panics
///
/// Panics if `displays` is empty. The host always reports at least one
/// display; callers check before building a canvas.
pub fn combined_bounds(displays: &[Display]) -> VirtualCanvas {
    assert!(
        !displays.is_empty(),
        "combined_bounds requires at least one display"
    );

    let mut min_x = i64::MAX;
    let mut min_y = i64::MAX;
    let mut max_x = i64::MIN;
    let mut max_y = i64::MIN;

    for display in displays {
        min_x = min_x.min(display.bounds.x as i64);
        min_y = min_y.min(display.bounds.y as i64);
        max_x = max_x.max(display.bounds.right());
        max_y = max_y.max(display.bounds.bottom());
    }

    VirtualCanvas {
        x: min_x as i32,
        y: min_y as i32,
        width: (max_x - min_x) as u32,
        height: (max_y - min_y) as u32,
    }
}

/// Display owning a canvas-local point
///
/// Falls back to the first display when no bounds contain the point, so a
/// rounding error at a display edge never fails a selection. Returns `None`
/// only for an empty display list.
pub fn display_containing<'a>(
    canvas_point: Point,
    canvas_origin: Point,
    displays: &'a [Display],
) -> Option<&'a Display> {
    let global = canvas_point.offset(canvas_origin);
    displays
        .iter()
        .find(|d| d.bounds.contains(global))
        .or_else(|| displays.first())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Bounds, DisplayId};

    fn side_by_side() -> Vec<Display> {
        vec![
            Display::new(0, Bounds::new(0, 0, 1920, 1080), 1.0),
            Display::new(1, Bounds::new(1920, 0, 1280, 1024), 2.0),
        ]
    }

    #[test]
    fn test_combined_bounds_two_displays() {
        let canvas = combined_bounds(&side_by_side());
        assert_eq!(
            canvas,
            VirtualCanvas {
                x: 0,
                y: 0,
                width: 3200,
                height: 1080
            }
        );
    }

    #[test]
    fn test_combined_bounds_negative_origin() {
        let displays = vec![
            Display::new(0, Bounds::new(0, 0, 1920, 1080), 1.0),
            Display::new(1, Bounds::new(-1280, -200, 1280, 1024), 1.0),
        ];
        let canvas = combined_bounds(&displays);
        assert_eq!(canvas.x, -1280);
        assert_eq!(canvas.y, -200);
        assert_eq!(canvas.width, 3200);
        assert_eq!(canvas.height, 1280);
    }

    #[test]
    #[should_panic]
    fn test_combined_bounds_empty_panics() {
        combined_bounds(&[]);
    }

    #[test]
    fn test_display_containing_translates_by_origin() {
        let displays = vec![
            Display::new(7, Bounds::new(-1280, 0, 1280, 1024), 1.0),
            Display::new(8, Bounds::new(0, 0, 1920, 1080), 1.0),
        ];
        let canvas = combined_bounds(&displays);
        // Canvas-local x=1300 is global x=20, on the right-hand display
        let found = display_containing(Point::new(1300.0, 10.0), canvas.origin(), &displays);
        assert_eq!(found.map(|d| d.id), Some(DisplayId(8)));
    }

    #[test]
    fn test_display_containing_falls_back_to_first() {
        let displays = side_by_side();
        // Below the shorter right-hand display and outside every bound
        let found = display_containing(Point::new(2500.0, 1050.0), Point::default(), &displays);
        assert_eq!(found.map(|d| d.id), Some(DisplayId(0)));
    }

    #[test]
    fn test_display_containing_empty() {
        assert!(display_containing(Point::default(), Point::default(), &[]).is_none());
    }
}
