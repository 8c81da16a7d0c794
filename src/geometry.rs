use serde::{Deserialize, Serialize};

/// A workspace-space coordinate. Units match whatever the geometry provider
/// (the rendering layer) uses; the core never converts between spaces.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: Point) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn offset_by(&self, dx: f32, dy: f32) -> Point {
        Point::new(self.x + dx, self.y + dy)
    }

    pub fn plus(&self, other: Point) -> Point {
        Point::new(self.x + other.x, self.y + other.y)
    }
}
