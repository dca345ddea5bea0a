//! Screen-space rectangles and regions.
//!
//! A [`Region`] is the damage/culling engine's workhorse: an owned list of
//! disjoint rectangles. It is kept simple on purpose — no BSP or scanline
//! structure — because frame-to-frame damage in a compositor is a handful of
//! rectangles, not thousands.

use std::cmp::{max, min};

/// An axis-aligned rectangle in screen coordinates. `width`/`height` are
/// always non-negative; `x`/`y` may be negative (e.g. a shadow padded to the
/// left of its window).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn left(&self) -> i32 {
        self.x
    }

    pub fn top(&self) -> i32 {
        self.y
    }

    pub fn right(&self) -> i32 {
        self.x + self.width as i32
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height as i32
    }

    pub fn contains_point(&self, px: i32, py: i32) -> bool {
        !self.is_empty() && px >= self.x && px < self.right() && py >= self.y && py < self.bottom()
    }

    /// The smallest rectangle containing both `self` and `other`. Unlike
    /// [`Region::union`] this does not preserve holes — callers that need an
    /// exact union of two rects should go through `Region`.
    pub fn bounding(&self, other: &Rect) -> Rect {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        let x = min(self.left(), other.left());
        let y = min(self.top(), other.top());
        let right = max(self.right(), other.right());
        let bottom = max(self.bottom(), other.bottom());
        Rect::new(x, y, (right - x) as u32, (bottom - y) as u32)
    }

    pub fn intersect(&self, other: &Rect) -> Option<Rect> {
        if self.is_empty() || other.is_empty() {
            return None;
        }
        let x = max(self.left(), other.left());
        let y = max(self.top(), other.top());
        let right = min(self.right(), other.right());
        let bottom = min(self.bottom(), other.bottom());
        if right > x && bottom > y {
            Some(Rect::new(x, y, (right - x) as u32, (bottom - y) as u32))
        } else {
            None
        }
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.intersect(other).is_some()
    }

    pub fn translate(&self, dx: i32, dy: i32) -> Rect {
        Rect::new(self.x + dx, self.y + dy, self.width, self.height)
    }

    /// Grows the rectangle by `dx`/`dy` on every side (used to expand damage
    /// under a blur halo, and to pad a window mask into its shadow canvas).
    pub fn expand(&self, dx: i32, dy: i32) -> Rect {
        if self.is_empty() {
            return *self;
        }
        let x = self.x - dx;
        let y = self.y - dy;
        let width = (self.width as i64 + 2 * dx as i64).max(0) as u32;
        let height = (self.height as i64 + 2 * dy as i64).max(0) as u32;
        Rect::new(x, y, width, height)
    }

    pub fn scale_around_origin(&self, sx: f64, sy: f64, ox: i32, oy: i32) -> Rect {
        let left = ox as f64 + (self.left() - ox) as f64 * sx;
        let top = oy as f64 + (self.top() - oy) as f64 * sy;
        let right = ox as f64 + (self.right() - ox) as f64 * sx;
        let bottom = oy as f64 + (self.bottom() - oy) as f64 * sy;
        let x = left.round() as i32;
        let y = top.round() as i32;
        let w = (right.round() as i32 - x).max(0) as u32;
        let h = (bottom.round() as i32 - y).max(0) as u32;
        Rect::new(x, y, w, h)
    }

    /// Up to 4 non-overlapping rectangles covering `self` minus `other`.
    fn subtract_one(&self, other: &Rect) -> Vec<Rect> {
        let overlap = match self.intersect(other) {
            Some(o) => o,
            None => return vec![*self],
        };
        let mut out = Vec::with_capacity(4);
        if overlap.top() > self.top() {
            out.push(Rect::new(
                self.left(),
                self.top(),
                self.width,
                (overlap.top() - self.top()) as u32,
            ));
        }
        if overlap.bottom() < self.bottom() {
            out.push(Rect::new(
                self.left(),
                overlap.bottom(),
                self.width,
                (self.bottom() - overlap.bottom()) as u32,
            ));
        }
        if overlap.left() > self.left() {
            out.push(Rect::new(
                self.left(),
                overlap.top(),
                (overlap.left() - self.left()) as u32,
                overlap.height,
            ));
        }
        if overlap.right() < self.right() {
            out.push(Rect::new(
                overlap.right(),
                overlap.top(),
                (self.right() - overlap.right()) as u32,
                overlap.height,
            ));
        }
        out
    }
}

/// A region: a set of screen pixels represented as disjoint rectangles.
///
/// Disjointness is maintained on every mutating op rather than lazily, so
/// `is_empty`/iteration never need a normalization pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Region {
    rects: Vec<Rect>,
}

impl Region {
    pub fn empty() -> Self {
        Self { rects: Vec::new() }
    }

    pub fn from_rect(rect: Rect) -> Self {
        if rect.is_empty() {
            Self::empty()
        } else {
            Self { rects: vec![rect] }
        }
    }

    pub fn from_rects(rects: impl IntoIterator<Item = Rect>) -> Self {
        let mut region = Self::empty();
        for r in rects {
            region.union_rect(r);
        }
        region
    }

    pub fn is_empty(&self) -> bool {
        self.rects.iter().all(Rect::is_empty)
    }

    pub fn rects(&self) -> &[Rect] {
        &self.rects
    }

    pub fn clear(&mut self) {
        self.rects.clear();
    }

    /// The bounding box of every rectangle in the region.
    pub fn extents(&self) -> Rect {
        self.rects
            .iter()
            .fold(Rect::default(), |acc, r| acc.bounding(r))
    }

    pub fn contains_point(&self, x: i32, y: i32) -> bool {
        self.rects.iter().any(|r| r.contains_point(x, y))
    }

    pub fn union_rect(&mut self, rect: Rect) {
        if rect.is_empty() {
            return;
        }
        // Subtract the existing region from the incoming rect so we only add
        // the genuinely new pixels, keeping the rectangle list disjoint.
        let mut fresh = vec![rect];
        for existing in &self.rects {
            fresh = fresh
                .into_iter()
                .flat_map(|r| r.subtract_one(existing))
                .collect();
        }
        self.rects.extend(fresh);
        self.normalize();
    }

    pub fn union(&mut self, other: &Region) {
        for rect in &other.rects {
            self.union_rect(*rect);
        }
    }

    pub fn unioned(mut self, other: &Region) -> Region {
        self.union(other);
        self
    }

    pub fn intersect_rect(&self, rect: Rect) -> Region {
        Region::from_rects(self.rects.iter().filter_map(|r| r.intersect(&rect)))
    }

    pub fn intersect(&self, other: &Region) -> Region {
        let mut out = Region::empty();
        for a in &self.rects {
            for b in &other.rects {
                if let Some(i) = a.intersect(b) {
                    out.union_rect(i);
                }
            }
        }
        out
    }

    pub fn subtract_rect(&self, rect: Rect) -> Region {
        if rect.is_empty() {
            return self.clone();
        }
        let mut result = Vec::new();
        for r in &self.rects {
            result.extend(r.subtract_one(&rect));
        }
        Region { rects: result }.normalized()
    }

    pub fn subtract(&self, other: &Region) -> Region {
        let mut result = self.clone();
        for rect in &other.rects {
            result = result.subtract_rect(*rect);
        }
        result
    }

    pub fn subtract_in_place(&mut self, other: &Region) {
        *self = self.subtract(other);
    }

    pub fn translate(&self, dx: i32, dy: i32) -> Region {
        Region::from_rects(self.rects.iter().map(|r| r.translate(dx, dy)))
    }

    /// Grows every rectangle in the region by `(dx, dy)` on each side and
    /// re-unions them; used for the blur halo expansion in §4.4/§4.5.
    pub fn expanded(&self, dx: i32, dy: i32) -> Region {
        Region::from_rects(self.rects.iter().map(|r| r.expand(dx, dy)))
    }

    /// Drops zero-area rectangles and merges exact duplicates. Kept
    /// deliberately cheap: a full plane-sweep coalescer is not worth it at
    /// the rectangle counts a compositor frame produces.
    fn normalize(&mut self) {
        self.rects.retain(|r| !r.is_empty());
        self.rects.sort_by_key(|r| (r.y, r.x, r.width, r.height));
        self.rects.dedup();
    }

    fn normalized(mut self) -> Self {
        self.normalize();
        self
    }
}

impl From<Rect> for Region {
    fn from(rect: Rect) -> Self {
        Region::from_rect(rect)
    }
}
