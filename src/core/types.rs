// Data model shared by the pipeline stages

use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A point in image space (or tile-local space, before remapping)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Shift by a tile origin
    pub fn offset(self, dx: f32, dy: f32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}

/// Axis-aligned box in parent-image coordinates (`x1 <= x2`, `y1 <= y2`)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    /// Build a box, swapping corners if needed so the invariant holds
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self {
            x1: x1.min(x2),
            y1: y1.min(y2),
            x2: x1.max(x2),
            y2: y1.max(y2),
        }
    }

    /// Axis-aligned envelope of a polygon. `None` for an empty polygon.
    pub fn from_points(points: &[Point]) -> Option<Self> {
        let first = points.first()?;
        let init = (first.x, first.y, first.x, first.y);
        let (x1, y1, x2, y2) = points.iter().fold(init, |(x1, y1, x2, y2), p| {
            (x1.min(p.x), y1.min(p.y), x2.max(p.x), y2.max(p.y))
        });
        Some(Self { x1, y1, x2, y2 })
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    pub fn top_left(&self) -> Point {
        Point::new(self.x1, self.y1)
    }

    pub fn intersection_area(&self, other: &BoundingBox) -> f32 {
        let x1 = self.x1.max(other.x1);
        let y1 = self.y1.max(other.y1);
        let x2 = self.x2.min(other.x2);
        let y2 = self.y2.min(other.y2);

        (x2 - x1).max(0.0) * (y2 - y1).max(0.0)
    }

    /// Intersection over union. 0.0 when the union area is 0.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let intersection = self.intersection_area(other);
        let union = self.area() + other.area() - intersection;

        if union > 0.0 {
            intersection / union
        } else {
            0.0
        }
    }
}

/// Absolute placement of a tile inside its parent image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileBounds {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

impl TileBounds {
    pub fn origin(&self) -> (u32, u32) {
        (self.x1, self.y1)
    }

    pub fn extent(&self) -> (u32, u32) {
        (self.x2, self.y2)
    }

    pub fn width(&self) -> u32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> u32 {
        self.y2 - self.y1
    }
}

/// A cropped sub-image, owned by one run and dropped after recognition
#[derive(Clone)]
pub struct Tile {
    pub index: usize,
    pub bounds: TileBounds,
    pub image: Arc<DynamicImage>,
}

impl std::fmt::Debug for Tile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tile")
            .field("index", &self.index)
            .field("bounds", &self.bounds)
            .finish_non_exhaustive()
    }
}

/// Raw OCR output for one detection, in tile-local coordinates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDetection {
    pub polygon: Vec<Point>,
    pub text: String,
    pub confidence: f32,
}

/// Original detection order: tile index first, then position within the tile
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RegionId {
    pub tile: usize,
    pub index: usize,
}

/// A recognized text region in parent-image coordinates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextRegion {
    pub id: RegionId,
    pub text: String,
    pub confidence: f32,
    pub polygon: Vec<Point>,
    pub bbox: BoundingBox,
}

/// Decision taken by the deduplicator for one input region
#[derive(Debug, Clone, PartialEq)]
pub enum DetectionOutcome {
    /// Accepted as the representative of its cluster
    Unique(TextRegion),
    /// Dropped because it overlaps an accepted region above the threshold
    Merged {
        region: TextRegion,
        into: RegionId,
        iou: f32,
    },
}

impl DetectionOutcome {
    pub fn region(&self) -> &TextRegion {
        match self {
            DetectionOutcome::Unique(region) => region,
            DetectionOutcome::Merged { region, .. } => region,
        }
    }

    pub fn is_unique(&self) -> bool {
        matches!(self, DetectionOutcome::Unique(_))
    }
}

/// A unique region with its translation filled in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslatedRegion {
    pub region: TextRegion,
    pub translation: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

/// One source word paired with one translated token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignedWordRecord {
    pub word: String,
    pub context: String,
    pub translation: String,
    pub confidence: f32,
    pub position: Position,
}

/// On-disk result document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultDocument {
    pub timestamp: String,
    pub total_words: usize,
    pub results: Vec<AlignedWordRecord>,
}
