//! Viewport geometry and the preload zone predicate.
//!
//! Both visibility backends decide eligibility through this module so that a
//! given element rectangle produces the same answer regardless of whether the
//! engine is polling or receiving native intersection callbacks.
//!
//! # Preload Zone
//!
//! ```text
//!   preload_top_offset ──►┌──────────────────────────────┐
//!                         │          viewport            │
//!                         │                              │
//!                         └──────────────────────────────┘ ◄── height
//!                                  (preload margin)
//!                         ─────────────────────────────── ◄── height × factor
//! ```
//!
//! An element is eligible when it overlaps the zone strictly:
//! `top < vh×factor && bottom > top_offset && left < vw×factor && right > 0`.

use serde::{Deserialize, Serialize};

/// Axis-aligned bounding rectangle in viewport coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl Rect {
    /// Create a rectangle from its four edges.
    pub fn new(top: f64, right: f64, bottom: f64, left: f64) -> Self {
        Self {
            top,
            right,
            bottom,
            left,
        }
    }

    /// Create a rectangle from an origin and a size.
    pub fn from_origin(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            top,
            right: left + width,
            bottom: top + height,
            left,
        }
    }

    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }

    /// Shift the rectangle by the given offsets.
    pub fn translate(&self, dx: f64, dy: f64) -> Self {
        Self {
            top: self.top + dy,
            right: self.right + dx,
            bottom: self.bottom + dy,
            left: self.left + dx,
        }
    }

    /// Strict overlap test; touching edges do not count as intersecting.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.top < other.bottom
            && self.bottom > other.top
            && self.left < other.right
            && self.right > other.left
    }

    /// Fraction of this rectangle's area that lies inside `other`.
    ///
    /// Degenerate (zero-area) rectangles report 1.0 when they intersect and
    /// 0.0 otherwise.
    pub fn intersection_ratio(&self, other: &Rect) -> f64 {
        if !self.intersects(other) {
            return 0.0;
        }
        let area = self.width() * self.height();
        if area <= 0.0 {
            return 1.0;
        }
        let w = self.right.min(other.right) - self.left.max(other.left);
        let h = self.bottom.min(other.bottom) - self.top.max(other.top);
        (w * h / area).clamp(0.0, 1.0)
    }
}

/// Inner dimensions of the window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// The viewport as a rectangle anchored at the origin.
    pub fn bounds(&self) -> Rect {
        Rect::from_origin(0.0, 0.0, self.width, self.height)
    }
}

/// Margins added around an observer root, in pixels.
///
/// Positive values grow the root box outwards, negative values shrink it.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RootMargin {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl RootMargin {
    /// Root margin whose expanded viewport matches `zone` exactly.
    ///
    /// The bottom and right margins stretch the viewport to `factor` times its
    /// size, and the top margin moves the upper edge down to the top offset.
    pub fn for_zone(zone: &PreloadZone, viewport: &Viewport) -> Self {
        Self {
            top: -zone.top_offset,
            right: viewport.width * (zone.factor - 1.0),
            bottom: viewport.height * (zone.factor - 1.0),
            left: 0.0,
        }
    }

    /// Apply the margin to a root rectangle.
    pub fn expand(&self, root: &Rect) -> Rect {
        Rect {
            top: root.top - self.top,
            right: root.right + self.right,
            bottom: root.bottom + self.bottom,
            left: root.left - self.left,
        }
    }

    /// CSS-style representation (`"top right bottom left"` in px).
    pub fn to_css(&self) -> String {
        format!(
            "{}px {}px {}px {}px",
            self.top, self.right, self.bottom, self.left
        )
    }
}

/// Preload zone configuration: a multiple of the viewport plus a top offset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreloadZone {
    pub factor: f64,
    pub top_offset: f64,
}

impl PreloadZone {
    pub fn new(factor: f64, top_offset: f64) -> Self {
        Self { factor, top_offset }
    }

    /// The visibility predicate shared by every backend.
    pub fn contains(&self, rect: &Rect, viewport: &Viewport) -> bool {
        rect.top < viewport.height * self.factor
            && rect.bottom > self.top_offset
            && rect.left < viewport.width * self.factor
            && rect.right > 0.0
    }

    /// The zone expressed as a rectangle in viewport coordinates.
    ///
    /// Computed from the same products as [`contains`](Self::contains) so the
    /// strict overlap test against this box never disagrees with the predicate.
    pub fn bounds(&self, viewport: &Viewport) -> Rect {
        Rect {
            top: self.top_offset,
            right: viewport.width * self.factor,
            bottom: viewport.height * self.factor,
            left: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zone() -> PreloadZone {
        PreloadZone::new(1.3, 0.0)
    }

    fn viewport() -> Viewport {
        Viewport::new(800.0, 1000.0)
    }

    #[test]
    fn test_top_just_inside_preload_margin() {
        let rect = Rect::from_origin(0.0, 1290.0, 100.0, 100.0);
        assert!(zone().contains(&rect, &viewport()));
    }

    #[test]
    fn test_top_just_outside_preload_margin() {
        let rect = Rect::from_origin(0.0, 1310.0, 100.0, 100.0);
        assert!(!zone().contains(&rect, &viewport()));
    }

    #[test]
    fn test_element_above_viewport_is_not_eligible() {
        let rect = Rect::from_origin(0.0, -300.0, 100.0, 200.0);
        assert!(!zone().contains(&rect, &viewport()));
    }

    #[test]
    fn test_top_offset_excludes_elements_ending_above_it() {
        let zone = PreloadZone::new(1.3, 50.0);
        let rect = Rect::from_origin(0.0, -100.0, 100.0, 140.0);
        assert!(!zone.contains(&rect, &viewport()));

        let rect = Rect::from_origin(0.0, -100.0, 100.0, 160.0);
        assert!(zone.contains(&rect, &viewport()));
    }

    #[test]
    fn test_horizontal_bounds() {
        let right_of = Rect::from_origin(1100.0, 10.0, 50.0, 50.0);
        assert!(!zone().contains(&right_of, &viewport()));

        let left_of = Rect::from_origin(-60.0, 10.0, 50.0, 50.0);
        assert!(!zone().contains(&left_of, &viewport()));
    }

    #[test]
    fn test_zone_bounds_match_margin() {
        let bounds = zone().bounds(&viewport());
        let expanded = RootMargin::for_zone(&zone(), &viewport()).expand(&viewport().bounds());
        assert_eq!(bounds.top, 0.0);
        assert_eq!(bounds.left, 0.0);
        assert!((bounds.bottom - expanded.bottom).abs() < 1e-9);
        assert!((bounds.right - expanded.right).abs() < 1e-9);
    }

    #[test]
    fn test_root_margin_css() {
        let margin = RootMargin {
            top: 0.0,
            right: 10.0,
            bottom: 20.0,
            left: 0.0,
        };
        assert_eq!(margin.to_css(), "0px 10px 20px 0px");
    }

    #[test]
    fn test_intersects_is_strict() {
        let a = Rect::from_origin(0.0, 0.0, 10.0, 10.0);
        let b = Rect::from_origin(10.0, 0.0, 10.0, 10.0);
        assert!(!a.intersects(&b));
        assert!(a.intersects(&a.translate(5.0, 5.0)));
    }

    #[test]
    fn test_intersection_ratio() {
        let root = Rect::from_origin(0.0, 0.0, 100.0, 100.0);
        let half_out = Rect::from_origin(0.0, 50.0, 100.0, 100.0);
        assert!((half_out.intersection_ratio(&root) - 0.5).abs() < 1e-9);

        let outside = Rect::from_origin(0.0, 200.0, 10.0, 10.0);
        assert_eq!(outside.intersection_ratio(&root), 0.0);
        assert_eq!(root.intersection_ratio(&root), 1.0);
    }
}
