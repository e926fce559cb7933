use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Screen point in display coordinates (top-left origin)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Size of the primary display in the same units the pointer uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplaySize {
    pub width: i32,
    pub height: i32,
}

impl DisplaySize {
    pub const fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for DisplaySize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Pixel rectangle `(x, y, width, height)`. Width and height are always
/// positive; a box is replaced, never edited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "[i32; 4]", into = "[i32; 4]")]
pub struct BoundingBox {
    x: i32,
    y: i32,
    width: i32,
    height: i32,
}

impl BoundingBox {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Result<Self, Error> {
        if width <= 0 || height <= 0 {
            return Err(Error::InvalidBoundingBox { width, height });
        }
        Ok(Self { x, y, width, height })
    }

    /// Like `new`, but sides below one pixel become one pixel.
    pub fn saturating(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width: width.max(1), height: height.max(1) }
    }

    pub fn x(&self) -> i32 { self.x }
    pub fn y(&self) -> i32 { self.y }
    pub fn width(&self) -> i32 { self.width }
    pub fn height(&self) -> i32 { self.height }

    pub fn right(&self) -> i32 {
        self.x.saturating_add(self.width)
    }

    pub fn bottom(&self) -> i32 {
        self.y.saturating_add(self.height)
    }

    pub fn center(&self) -> Point {
        Point::new(self.x.saturating_add(self.width / 2), self.y.saturating_add(self.height / 2))
    }

    /// Part of the box that lies on a `width` x `height` surface, if any.
    pub fn clip(&self, width: i32, height: i32) -> Option<BoundingBox> {
        let x = self.x.max(0);
        let y = self.y.max(0);
        let right = self.right().min(width);
        let bottom = self.bottom().min(height);
        BoundingBox::new(x, y, right.checked_sub(x)?, bottom.checked_sub(y)?).ok()
    }

    /// Width over height.
    pub fn aspect_ratio(&self) -> f64 {
        self.width as f64 / self.height as f64
    }

    pub fn within(&self, display: DisplaySize) -> bool {
        self.x >= 0 && self.y >= 0 && self.right() <= display.width && self.bottom() <= display.height
    }

    /// Ensure the box lies on the display.
    pub fn validate(self, display: DisplaySize) -> Result<Self, Error> {
        if self.within(display) {
            Ok(self)
        } else {
            Err(Error::BoxOutsideDisplay { bbox: self, display })
        }
    }

    pub fn as_tuple(&self) -> (i32, i32, i32, i32) {
        (self.x, self.y, self.width, self.height)
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {}x{})", self.x, self.y, self.width, self.height)
    }
}

impl TryFrom<[i32; 4]> for BoundingBox {
    type Error = Error;

    fn try_from(v: [i32; 4]) -> Result<Self, Self::Error> {
        BoundingBox::new(v[0], v[1], v[2], v[3])
    }
}

impl From<BoundingBox> for [i32; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.x, b.y, b.width, b.height]
    }
}

/// What was done right before a screenshot was taken
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepAction {
    Initial,
    Scroll { amount: i32 },
    Click { at: Point },
}

/// One screenshot of a capture sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureStep {
    pub index: usize,
    pub action: StepAction,
    pub path: PathBuf,
}

/// Ordered screenshots of one profile, sharing a timestamp.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptureSequence {
    pub timestamp: String,
    pub steps: Vec<CaptureStep>,
}

impl CaptureSequence {
    pub fn new(timestamp: impl Into<String>) -> Self {
        Self { timestamp: timestamp.into(), steps: Vec::new() }
    }

    /// Index the next pushed step will get.
    pub fn next_index(&self) -> usize {
        self.steps.len() + 1
    }

    pub fn push(&mut self, action: StepAction, path: PathBuf) -> usize {
        let index = self.next_index();
        self.steps.push(CaptureStep { index, action, path });
        index
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Initial screenshot plus one per paging action.
    pub fn is_complete(&self, step_count: usize) -> bool {
        self.steps.len() == step_count + 1
            && self.steps.iter().enumerate().all(|(i, s)| s.index == i + 1)
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.steps.iter().map(|s| s.path.clone()).collect()
    }
}

/// Grid shape for a composite: `rows` x `cols` cells
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "(u32, u32)", into = "(u32, u32)")]
pub struct StitchLayout {
    pub rows: u32,
    pub cols: u32,
}

impl StitchLayout {
    pub fn new(rows: u32, cols: u32) -> Result<Self, Error> {
        if rows == 0 || cols == 0 {
            return Err(Error::InvalidLayout { rows, cols });
        }
        Ok(Self { rows, cols })
    }

    pub fn cells(&self) -> usize {
        (self.rows as usize).saturating_mul(self.cols as usize)
    }
}

impl TryFrom<(u32, u32)> for StitchLayout {
    type Error = Error;

    fn try_from((rows, cols): (u32, u32)) -> Result<Self, Self::Error> {
        StitchLayout::new(rows, cols)
    }
}

impl From<StitchLayout> for (u32, u32) {
    fn from(l: StitchLayout) -> Self {
        (l.rows, l.cols)
    }
}
