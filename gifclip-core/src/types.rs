//! Core types for gifclip
//!
//! Geometry, display snapshots and identifiers shared by every stage of a
//! capture session.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Global counter for unique session IDs
static SESSION_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Opaque identifier for a capture session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(u64);

impl SessionId {
    /// Create a new unique session ID
    pub fn new() -> Self {
        Self(SESSION_COUNTER.fetch_add(1, Ordering::SeqCst))
    }

    /// Get the raw value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Session({})", self.0)
    }
}

/// Host-assigned display identifier, stable for the lifetime of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct DisplayId(pub u32);

impl std::fmt::Display for DisplayId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which external process a stage runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessStage {
    /// Screen capture to a temporary video
    Recording,
    /// Video to animated GIF transcode
    Encoding,
}

impl std::fmt::Display for ProcessStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Recording => write!(f, "Recording"),
            Self::Encoding => write!(f, "Encoding"),
        }
    }
}

/// A point in canvas-local or global coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Translate by another point
    pub fn offset(&self, by: Point) -> Self {
        Self {
            x: self.x + by.x,
            y: self.y + by.y,
        }
    }
}

/// Axis-aligned rectangle in global screen coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Bounds {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Bounds {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Exclusive right edge
    pub fn right(&self) -> i64 {
        self.x as i64 + self.width as i64
    }

    /// Exclusive bottom edge
    pub fn bottom(&self) -> i64 {
        self.y as i64 + self.height as i64
    }

    /// Half-open containment test (left/top inclusive, right/bottom exclusive)
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x as f64
            && point.x < self.right() as f64
            && point.y >= self.y as f64
            && point.y < self.bottom() as f64
    }

    /// Top-left corner as a point
    pub fn origin(&self) -> Point {
        Point::new(self.x as f64, self.y as f64)
    }
}

impl std::fmt::Display for Bounds {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}+{}+{}", self.width, self.height, self.x, self.y)
    }
}

impl std::str::FromStr for Bounds {
    type Err = String;

    /// Parse `X,Y,WxH` (e.g. `100,100,640x480`)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        let [x, y, size] = parts.as_slice() else {
            return Err(format!("Expected X,Y,WxH but got '{}'", s));
        };
        let (w, h) = size
            .split_once(['x', 'X'])
            .ok_or_else(|| format!("Expected WxH but got '{}'", size))?;

        let parse_err = |e: std::num::ParseIntError| format!("Invalid region '{}': {}", s, e);
        Ok(Self {
            x: x.parse().map_err(parse_err)?,
            y: y.parse().map_err(parse_err)?,
            width: w.trim().parse().map_err(parse_err)?,
            height: h.trim().parse().map_err(parse_err)?,
        })
    }
}

/// Snapshot of one physical display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Display {
    /// Host identifier
    pub id: DisplayId,
    /// Bounds in global coordinates
    pub bounds: Bounds,
    /// Device pixel ratio
    pub scale_factor: f64,
}

impl Display {
    pub fn new(id: u32, bounds: Bounds, scale_factor: f64) -> Self {
        Self {
            id: DisplayId(id),
            bounds,
            scale_factor,
        }
    }
}

impl std::fmt::Display for Display {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Display {} ({} @ {:.2}x)",
            self.id, self.bounds, self.scale_factor
        )
    }
}

/// Union bounding box of all displays for one session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualCanvas {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl VirtualCanvas {
    /// Canvas-to-global offset
    pub fn origin(&self) -> Point {
        Point::new(self.x as f64, self.y as f64)
    }

    pub fn as_bounds(&self) -> Bounds {
        Bounds::new(self.x, self.y, self.width, self.height)
    }

    /// Convert a global point into canvas-local coordinates
    pub fn to_local(&self, global: Point) -> Point {
        Point::new(global.x - self.x as f64, global.y - self.y as f64)
    }
}

/// A validated capture region in global coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Region {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    /// Display containing the region's center
    pub display_id: DisplayId,
}

impl Region {
    pub fn bounds(&self) -> Bounds {
        Bounds::new(self.x, self.y, self.width, self.height)
    }
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} on display {}", self.bounds(), self.display_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_ids_unique() {
        let a = SessionId::new();
        let b = SessionId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn test_bounds_contains_half_open() {
        let b = Bounds::new(0, 0, 1920, 1080);
        assert!(b.contains(Point::new(0.0, 0.0)));
        assert!(b.contains(Point::new(1919.5, 1079.0)));
        assert!(!b.contains(Point::new(1920.0, 10.0)));
        assert!(!b.contains(Point::new(10.0, -1.0)));
    }

    #[test]
    fn test_parse_bounds() {
        let b: Bounds = "100,-20,640x480".parse().unwrap();
        assert_eq!(b, Bounds::new(100, -20, 640, 480));
        assert!("100,20".parse::<Bounds>().is_err());
        assert!("a,b,1x1".parse::<Bounds>().is_err());
    }
}
