//! Planar geometry used for movement collision and line of sight.
//!
//! This module provides:
//! - `Position`: a 2D point/vector in millimetres
//! - `Circle`, `Rectangle` and `Segment` value types
//! - The `Intersects` trait implemented for every pair the rules need
//!
//! Rectangles are always axis-aligned. Terrain rotation is carried by the
//! battlefield model but ignored here.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Mul, Sub};

/// Tolerance used when deciding that a cross product is zero.
pub const EPSILON: f32 = 0.0001;

/// A point (or displacement) on the battlefield, in millimetres.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    /// Origin of the battlefield (top-left corner)
    pub const ZERO: Position = Position { x: 0.0, y: 0.0 };

    /// Create a new position
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// 2D cross product (z component of the 3D cross product)
    pub fn cross(self, other: Position) -> f32 {
        self.x * other.y - self.y * other.x
    }

    /// Squared length of this vector
    pub fn length_squared(self) -> f32 {
        self.x * self.x + self.y * self.y
    }

    /// Length of this vector
    pub fn length(self) -> f32 {
        self.length_squared().sqrt()
    }

    /// Euclidean distance to another position
    pub fn distance_to(self, other: Position) -> f32 {
        (self - other).length()
    }
}

impl Add for Position {
    type Output = Position;

    fn add(self, rhs: Position) -> Position {
        Position::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Position {
    type Output = Position;

    fn sub(self, rhs: Position) -> Position {
        Position::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f32> for Position {
    type Output = Position;

    fn mul(self, rhs: f32) -> Position {
        Position::new(self.x * rhs, self.y * rhs)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.1}; {:.1})", self.x, self.y)
    }
}

/// Euclidean distance between two positions
pub fn distance(p1: Position, p2: Position) -> f32 {
    p1.distance_to(p2)
}

/// A circle, used for operative bases.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Circle {
    pub center: Position,
    pub radius: f32,
}

impl Circle {
    pub const fn new(center: Position, radius: f32) -> Self {
        Self { center, radius }
    }
}

/// An axis-aligned rectangle described by its center and extents.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rectangle {
    pub center: Position,
    pub width: f32,
    pub height: f32,
}

impl Rectangle {
    pub const fn new(center: Position, width: f32, height: f32) -> Self {
        Self {
            center,
            width,
            height,
        }
    }

    pub fn min_x(&self) -> f32 {
        self.center.x - self.width / 2.0
    }

    pub fn max_x(&self) -> f32 {
        self.center.x + self.width / 2.0
    }

    pub fn min_y(&self) -> f32 {
        self.center.y - self.height / 2.0
    }

    pub fn max_y(&self) -> f32 {
        self.center.y + self.height / 2.0
    }

    /// The four corners, walking around the boundary
    pub fn corners(&self) -> [Position; 4] {
        [
            Position::new(self.min_x(), self.min_y()),
            Position::new(self.min_x(), self.max_y()),
            Position::new(self.max_x(), self.max_y()),
            Position::new(self.max_x(), self.min_y()),
        ]
    }

    /// The four boundary segments
    pub fn edges(&self) -> [Segment; 4] {
        let [a, b, c, d] = self.corners();
        [
            Segment::new(a, b),
            Segment::new(b, c),
            Segment::new(c, d),
            Segment::new(d, a),
        ]
    }

    /// Whether a point lies inside or on the boundary
    pub fn contains(&self, point: Position) -> bool {
        (self.min_x()..=self.max_x()).contains(&point.x)
            && (self.min_y()..=self.max_y()).contains(&point.y)
    }
}

/// A straight segment between two points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start: Position,
    pub end: Position,
}

impl Segment {
    pub const fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// Direction vector from start to end
    pub fn direction(&self) -> Position {
        self.end - self.start
    }
}

/// Intersection test between two shapes.
pub trait Intersects<Rhs = Self> {
    fn intersects(&self, other: &Rhs) -> bool;
}

impl Intersects<Rectangle> for Circle {
    /// Clamps the circle center onto the rectangle and compares against the radius.
    /// Touching is not an intersection.
    fn intersects(&self, rectangle: &Rectangle) -> bool {
        let closest_x = self.center.x.clamp(rectangle.min_x(), rectangle.max_x());
        let closest_y = self.center.y.clamp(rectangle.min_y(), rectangle.max_y());

        let dx = self.center.x - closest_x;
        let dy = self.center.y - closest_y;

        dx * dx + dy * dy < self.radius * self.radius
    }
}

impl Intersects<Circle> for Rectangle {
    fn intersects(&self, circle: &Circle) -> bool {
        circle.intersects(self)
    }
}

impl Intersects for Circle {
    fn intersects(&self, other: &Circle) -> bool {
        distance(self.center, other.center) < self.radius + other.radius
    }
}

impl Intersects for Segment {
    /// Parametric cross-product test.
    ///
    /// Parallel and collinear segments never intersect. This is not a
    /// general overlap test: collinear overlapping segments report `false`.
    fn intersects(&self, other: &Segment) -> bool {
        let r = self.direction();
        let s = other.direction();
        let rxs = r.cross(s);

        if rxs.abs() < EPSILON {
            return false;
        }

        let qp = other.start - self.start;
        let t = qp.cross(s) / rxs;
        let u = qp.cross(r) / rxs;

        (0.0..=1.0).contains(&t) && (0.0..=1.0).contains(&u)
    }
}

impl Intersects<Rectangle> for Segment {
    /// True when the segment crosses any boundary edge.
    ///
    /// A segment lying entirely inside the rectangle does not cross an edge
    /// and reports `false`.
    fn intersects(&self, rectangle: &Rectangle) -> bool {
        rectangle.edges().iter().any(|edge| self.intersects(edge))
    }
}

impl Intersects<Circle> for Segment {
    /// Operatives never obstruct line of sight.
    fn intersects(&self, _circle: &Circle) -> bool {
        false
    }
}
