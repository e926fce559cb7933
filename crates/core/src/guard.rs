use log::warn;

use crate::types::{DisplaySize, Point};

/// Distance kept from every display edge. Driving the pointer into a corner
/// aborts the automation on some input backends.
pub const DEFAULT_MARGIN: i32 = 50;

/// Keeps automated pointer targets a safe distance away from the display edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinateGuard {
    display: DisplaySize,
    margin: i32,
}

impl CoordinateGuard {
    pub fn new(display: DisplaySize, margin: i32) -> Self {
        Self { display, margin: margin.max(0) }
    }

    pub fn display(&self) -> DisplaySize {
        self.display
    }

    pub fn margin(&self) -> i32 {
        self.margin
    }

    /// Clamp each axis into `[margin, dimension - margin]`.
    pub fn clamp(&self, p: Point) -> Point {
        let safe = Point::new(
            clamp_axis(p.x, self.margin, self.display.width),
            clamp_axis(p.y, self.margin, self.display.height),
        );
        if safe != p {
            warn!("adjusted pointer target {} to {} (display {}, margin {})", p, safe, self.display, self.margin);
        }
        safe
    }
}

fn clamp_axis(v: i32, margin: i32, dim: i32) -> i32 {
    let hi = dim - margin;
    if hi < margin {
        // display narrower than both margins together
        return dim / 2;
    }
    v.clamp(margin, hi)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guard() -> CoordinateGuard {
        CoordinateGuard::new(DisplaySize::new(1920, 1080), DEFAULT_MARGIN)
    }

    #[test]
    fn inside_points_pass_through() {
        assert_eq!(guard().clamp(Point::new(974, 410)), Point::new(974, 410));
        assert_eq!(guard().clamp(Point::new(50, 1030)), Point::new(50, 1030));
    }

    #[test]
    fn axes_clamp_independently() {
        assert_eq!(guard().clamp(Point::new(-10, 500)), Point::new(50, 500));
        assert_eq!(guard().clamp(Point::new(600, 5000)), Point::new(600, 1030));
        assert_eq!(guard().clamp(Point::new(1919, 0)), Point::new(1870, 50));
    }

    #[test]
    fn every_point_lands_inside_the_margin() {
        let displays = [DisplaySize::new(1920, 1080), DisplaySize::new(2511, 1051), DisplaySize::new(101, 100)];
        for display in displays {
            let g = CoordinateGuard::new(display, DEFAULT_MARGIN);
            for x in (-3000..6000).step_by(97) {
                for y in (-3000..6000).step_by(89) {
                    let p = g.clamp(Point::new(x, y));
                    assert!(p.x >= DEFAULT_MARGIN && p.x <= display.width - DEFAULT_MARGIN, "{:?} {:?}", display, p);
                    assert!(p.y >= DEFAULT_MARGIN && p.y <= display.height - DEFAULT_MARGIN, "{:?} {:?}", display, p);
                }
            }
        }
    }

    #[test]
    fn adjustments_are_logged() {
        let dir = tempfile::tempdir().unwrap();
        crate::logger::init(dir.path(), log::LevelFilter::Warn, false);
        guard().clamp(Point::new(-17, 4321));
        guard().clamp(Point::new(333, 444));
        log::logger().flush();
        let text = std::fs::read_to_string(dir.path().join("mirrorscout.log")).unwrap();
        assert!(text.contains("adjusted pointer target (-17, 4321) to (50, 1030)"), "{}", text);
        assert!(!text.contains("(333, 444)"));
    }

    #[test]
    fn tiny_display_uses_midpoint() {
        let g = CoordinateGuard::new(DisplaySize::new(80, 60), DEFAULT_MARGIN);
        assert_eq!(g.clamp(Point::new(0, 0)), Point::new(40, 30));
    }
}
