//! Scene geometry primitives and the grid configuration.
//!
//! All routing math works in scene coordinates (f64 pixels). Block positions
//! and connector bends live on a regular grid whose spacing is carried in an
//! explicit [`Grid`] value rather than a global, so tests can run with their
//! own configuration.

use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

// ────────────────────────────────────────────────────────────────────────────
// Point / Line
// ────────────────────────────────────────────────────────────────────────────

/// A 2D point (or vector) in scene coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Sum of the absolute coordinate values, used as snapping distance.
    pub fn manhattan_length(&self) -> f64 {
        self.x.abs() + self.y.abs()
    }
}

impl Add for Point {
    type Output = Point;
    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Point;
    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl AddAssign for Point {
    fn add_assign(&mut self, rhs: Point) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl SubAssign for Point {
    fn sub_assign(&mut self, rhs: Point) {
        self.x -= rhs.x;
        self.y -= rhs.y;
    }
}

impl Neg for Point {
    type Output = Point;
    fn neg(self) -> Point {
        Point::new(-self.x, -self.y)
    }
}

/// Block dimensions in scene coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// A line between two points in scene coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Line {
    pub p1: Point,
    pub p2: Point,
}

impl Line {
    pub fn new(p1: Point, p2: Point) -> Self {
        Self { p1, p2 }
    }

    /// Returns this line shifted by `delta`.
    pub fn translated(&self, delta: Point) -> Line {
        Line::new(self.p1 + delta, self.p2 + delta)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Orientation / Direction
// ────────────────────────────────────────────────────────────────────────────

/// Axis of a connector segment or a socket's connection axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Orientation {
    Horizontal,
    Vertical,
}

/// Which block edge a socket faces, derived from its orientation and position
/// (see [`crate::model::Socket::direction`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Left,
    Right,
    Top,
    Bottom,
}

// ────────────────────────────────────────────────────────────────────────────
// Grid
// ────────────────────────────────────────────────────────────────────────────

/// Grid configuration threaded through all routing and scene operations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    /// Distance between adjacent grid lines, in pixels.
    pub spacing: f64,
    /// Font size used for block labels.
    pub label_font_size: f64,
}

impl Default for Grid {
    fn default() -> Self {
        Grid {
            spacing: 8.0,
            label_font_size: 8.0,
        }
    }
}

impl Grid {
    /// Tests if a grid distance is approximately zero, accounting for
    /// rounding errors relative to the grid spacing.
    pub fn near_zero(&self, grid_distance: f64) -> bool {
        (grid_distance / self.spacing).abs() < 1e-6
    }

    /// Distance that connector stub lines project outward from a block edge.
    pub fn stand_off(&self) -> f64 {
        2.0 * self.spacing
    }

    /// Snapping tolerance for dropping a connection onto an inlet socket.
    pub fn snap_tolerance(&self) -> f64 {
        self.spacing / 2.0
    }

    /// Rounds a coordinate to the nearest grid line.
    pub fn snap(&self, v: f64) -> f64 {
        ((v + self.spacing / 2.0) / self.spacing).floor() * self.spacing
    }

    /// Rounds a point to the nearest grid intersection.
    pub fn snap_point(&self, p: Point) -> Point {
        Point::new(self.snap(p.x), self.snap(p.y))
    }

    /// Quantizes a coordinate downward to the grid, as used while dragging
    /// connector segments.
    pub fn snap_floor(&self, v: f64) -> f64 {
        (v / self.spacing).floor() * self.spacing
    }

    /// Quantizes a point downward to the grid.
    pub fn snap_floor_point(&self, p: Point) -> Point {
        Point::new(self.snap_floor(p.x), self.snap_floor(p.y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn near_zero_is_relative_to_spacing() {
        let grid = Grid::default();
        assert!(grid.near_zero(0.0));
        assert!(grid.near_zero(1e-9));
        assert!(grid.near_zero(-1e-9));
        assert!(!grid.near_zero(0.1));
    }

    #[test]
    fn snap_rounds_to_nearest_grid_line() {
        let grid = Grid::default();
        assert_eq!(grid.snap(0.0), 0.0);
        assert_eq!(grid.snap(3.0), 0.0);
        assert_eq!(grid.snap(4.0), 8.0);
        assert_eq!(grid.snap(-3.0), 0.0);
        assert_eq!(grid.snap(-5.0), -8.0);
    }

    #[test]
    fn snap_floor_quantizes_downward() {
        let grid = Grid::default();
        assert_eq!(grid.snap_floor(7.9), 0.0);
        assert_eq!(grid.snap_floor(8.0), 8.0);
        assert_eq!(grid.snap_floor(-0.1), -8.0);
    }
}
