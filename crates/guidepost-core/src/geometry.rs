#![forbid(unsafe_code)]

//! Geometric primitives in host pixel space.

/// A point in host pixel coordinates (origin at the top-left of the viewport).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    /// Create a new point.
    #[inline]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Component-wise difference `self - origin`.
    #[inline]
    pub const fn delta_from(&self, origin: Point) -> (i32, i32) {
        (
            self.x.saturating_sub(origin.x),
            self.y.saturating_sub(origin.y),
        )
    }
}

/// An element's bounding box, a viewport, or a hit region.
///
/// Edges are left/top inclusive and right/bottom exclusive. Positions may be
/// negative (an element scrolled above the viewport), sizes may not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    /// Left edge (inclusive).
    pub x: i32,
    /// Top edge (inclusive).
    pub y: i32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Rect {
    /// Create a new rectangle.
    #[inline]
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Create a rectangle from origin with given size.
    #[inline]
    pub const fn from_size(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    /// Right edge (exclusive).
    #[inline]
    pub const fn right(&self) -> i64 {
        self.x as i64 + self.width as i64
    }

    /// Bottom edge (exclusive).
    #[inline]
    pub const fn bottom(&self) -> i64 {
        self.y as i64 + self.height as i64
    }

    /// Area in square pixels.
    #[inline]
    pub const fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// A zero-area box is what a detached or `display: none` element reports.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Check if a point is inside the rectangle.
    #[inline]
    pub const fn contains(&self, point: Point) -> bool {
        let (px, py) = (point.x as i64, point.y as i64);
        px >= self.x as i64 && px < self.right() && py >= self.y as i64 && py < self.bottom()
    }

    /// Check whether `other` lies entirely inside `self`.
    ///
    /// This is the viewport-containment test used before highlighting: a
    /// target that pokes out of the viewport on any edge is not contained.
    #[inline]
    pub const fn contains_rect(&self, other: &Rect) -> bool {
        other.x as i64 >= self.x as i64
            && other.y as i64 >= self.y as i64
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    /// Compute the intersection with another rectangle, returning `None` if no overlap.
    pub fn intersection_opt(&self, other: &Rect) -> Option<Rect> {
        let x = (self.x as i64).max(other.x as i64);
        let y = (self.y as i64).max(other.y as i64);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());

        if x < right && y < bottom {
            Some(Rect::new(
                x as i32,
                y as i32,
                (right - x) as u32,
                (bottom - y) as u32,
            ))
        } else {
            None
        }
    }

    /// Compute the intersection with another rectangle.
    ///
    /// Returns an empty rectangle if the rectangles don't overlap.
    #[inline]
    pub fn intersection(&self, other: &Rect) -> Rect {
        self.intersection_opt(other).unwrap_or_default()
    }

    /// Move the rectangle by a pixel delta, keeping its size.
    #[inline]
    pub const fn translate(&self, dx: i32, dy: i32) -> Rect {
        Rect::new(
            self.x.saturating_add(dx),
            self.y.saturating_add(dy),
            self.width,
            self.height,
        )
    }

    /// Top-left corner.
    #[inline]
    pub const fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::{Point, Rect};

    #[test]
    fn rect_contains_edges() {
        let rect = Rect::new(2, 3, 4, 5);
        assert!(rect.contains(Point::new(2, 3)));
        assert!(rect.contains(Point::new(5, 7)));
        assert!(!rect.contains(Point::new(6, 3)));
        assert!(!rect.contains(Point::new(2, 8)));
    }

    #[test]
    fn rect_contains_rect_detects_overflow() {
        let viewport = Rect::from_size(800, 600);
        assert!(viewport.contains_rect(&Rect::new(10, 10, 100, 50)));
        assert!(viewport.contains_rect(&Rect::new(700, 550, 100, 50)));
        assert!(!viewport.contains_rect(&Rect::new(700, 550, 101, 50)));
        assert!(!viewport.contains_rect(&Rect::new(-1, 10, 20, 20)));
        assert!(!viewport.contains_rect(&Rect::new(10, 900, 20, 20)));
    }

    #[test]
    fn rect_intersection_overlaps() {
        let a = Rect::new(0, 0, 4, 4);
        let b = Rect::new(2, 2, 4, 4);
        assert_eq!(a.intersection(&b), Rect::new(2, 2, 2, 2));
    }

    #[test]
    fn rect_intersection_no_overlap_is_empty() {
        let a = Rect::new(0, 0, 2, 2);
        let b = Rect::new(3, 3, 2, 2);
        assert_eq!(a.intersection(&b), Rect::default());
    }

    #[test]
    fn rect_negative_origin() {
        let r = Rect::new(-20, -5, 40, 10);
        assert_eq!(r.right(), 20);
        assert_eq!(r.bottom(), 5);
        assert!(r.contains(Point::new(0, 0)));
    }

    #[test]
    fn rect_translate_keeps_size() {
        let r = Rect::new(10, 10, 30, 40).translate(-15, 5);
        assert_eq!(r, Rect::new(-5, 15, 30, 40));
    }

    #[test]
    fn rect_empty_and_area() {
        assert!(Rect::new(3, 3, 0, 10).is_empty());
        assert!(!Rect::new(3, 3, 1, 1).is_empty());
        assert_eq!(Rect::from_size(20, 30).area(), 600);
    }

    #[test]
    fn point_delta() {
        assert_eq!(Point::new(5, 9).delta_from(Point::new(8, 2)), (-3, 7));
    }
}
