use serde::{Deserialize, Serialize};

pub const INCHES_PER_METER: f64 = 0.0254;

/// A position in container-local pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: Point) -> f64 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }
}

impl From<(f64, f64)> for Point {
    fn from(v: (f64, f64)) -> Self {
        Point { x: v.0, y: v.1 }
    }
}

/// Usable capture surface size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// True if `p` lies inside the viewport with `margin` px kept clear
    /// on every edge.
    pub fn contains_with_margin(&self, p: Point, margin: f64) -> bool {
        p.x > margin && p.x < self.width - margin && p.y > margin && p.y < self.height - margin
    }

    pub fn center(&self) -> Point {
        Point::new(self.width / 2.0, self.height / 2.0)
    }
}

/// Host display characteristics used to convert pixel geometry into
/// physical units. All physical metrics flow through this ratio.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DisplayMetrics {
    pub base_ppi: f64,
    pub device_pixel_ratio: f64,
}

impl DisplayMetrics {
    pub fn new(base_ppi: f64, device_pixel_ratio: f64) -> Self {
        Self {
            base_ppi,
            device_pixel_ratio,
        }
    }

    pub fn pixels_per_meter(&self) -> f64 {
        (self.base_ppi * self.device_pixel_ratio) / INCHES_PER_METER
    }

    pub fn px_to_meters(&self, px: f64) -> f64 {
        px / self.pixels_per_meter()
    }

    pub fn px_to_millimeters(&self, px: f64) -> f64 {
        self.px_to_meters(px) * 1000.0
    }
}

impl Default for DisplayMetrics {
    fn default() -> Self {
        Self {
            base_ppi: 160.0,
            device_pixel_ratio: 1.0,
        }
    }
}

/// Perpendicular distance from `p` to the infinite line through `a` and
/// `b`, plus the projection of `p` onto that line. Returns None when the
/// line is degenerate (a == b).
pub fn point_to_line(p: Point, a: Point, b: Point) -> Option<(f64, Point)> {
    // Line as Ax + By + C = 0
    let la = a.y - b.y;
    let lb = b.x - a.x;
    let lc = a.x * b.y - b.x * a.y;
    let len_sq = la * la + lb * lb;

    if len_sq <= 0.0 {
        return None;
    }

    let dist = (la * p.x + lb * p.y + lc).abs() / len_sq.sqrt();
    let u = ((p.x - a.x) * (b.x - a.x) + (p.y - a.y) * (b.y - a.y)) / len_sq;
    let projection = Point::new(a.x + u * (b.x - a.x), a.y + u * (b.y - a.y));

    Some((dist, projection))
}

/// Signed area of the polygon described by `points` (implicitly closed),
/// via the shoelace formula. Returned in px²; callers convert to
/// physical units through DisplayMetrics.
pub fn shoelace_area(points: &[Point]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }

    let mut sum = 0.0;
    for i in 0..points.len() {
        let p = points[i];
        let q = points[(i + 1) % points.len()];
        sum += p.x * q.y - q.x * p.y;
    }
    (sum / 2.0).abs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(3.0, 4.0);
        assert_eq!(a.distance_to(b), 5.0);
        assert_eq!(b.distance_to(a), 5.0);
        assert_eq!(a.distance_to(a), 0.0);
    }

    #[test]
    fn test_viewport_margin() {
        let vp = Viewport::new(800.0, 600.0);
        assert!(vp.contains_with_margin(Point::new(400.0, 300.0), 30.0));
        assert!(!vp.contains_with_margin(Point::new(10.0, 300.0), 30.0));
        assert!(!vp.contains_with_margin(Point::new(400.0, 590.0), 30.0));
        assert!(!vp.contains_with_margin(Point::new(30.0, 30.0), 30.0));
    }

    #[test]
    fn test_pixels_per_meter() {
        let dm = DisplayMetrics::default();
        // 160 ppi / 0.0254 m per inch
        assert!((dm.pixels_per_meter() - 6299.2125984).abs() < 1e-6);

        let hidpi = DisplayMetrics::new(160.0, 2.0);
        assert_eq!(hidpi.pixels_per_meter(), 2.0 * dm.pixels_per_meter());
    }

    #[test]
    fn test_px_to_millimeters() {
        let dm = DisplayMetrics::default();
        let mm = dm.px_to_millimeters(dm.pixels_per_meter());
        assert!((mm - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn test_point_to_line_horizontal() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(10.0, 0.0);
        let (dist, proj) = point_to_line(Point::new(5.0, 3.0), a, b).unwrap();
        assert!((dist - 3.0).abs() < 1e-9);
        assert!((proj.x - 5.0).abs() < 1e-9);
        assert!(proj.y.abs() < 1e-9);
    }

    #[test]
    fn test_point_to_line_on_line() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(10.0, 10.0);
        let (dist, _) = point_to_line(Point::new(4.0, 4.0), a, b).unwrap();
        assert!(dist.abs() < 1e-9);
    }

    #[test]
    fn test_point_to_line_degenerate() {
        let a = Point::new(5.0, 5.0);
        assert!(point_to_line(Point::new(1.0, 1.0), a, a).is_none());
    }

    #[test]
    fn test_shoelace_triangle() {
        let tri = [
            Point::new(0.0, 0.0),
            Point::new(4.0, 0.0),
            Point::new(0.0, 3.0),
        ];
        assert!((shoelace_area(&tri) - 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_shoelace_winding_independent() {
        let cw = [
            Point::new(0.0, 0.0),
            Point::new(0.0, 2.0),
            Point::new(2.0, 2.0),
            Point::new(2.0, 0.0),
        ];
        let ccw: Vec<Point> = cw.iter().rev().copied().collect();
        assert_eq!(shoelace_area(&cw), shoelace_area(&ccw));
        assert!((shoelace_area(&cw) - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_shoelace_degenerate() {
        assert_eq!(shoelace_area(&[]), 0.0);
        assert_eq!(shoelace_area(&[Point::new(1.0, 1.0)]), 0.0);
        assert_eq!(
            shoelace_area(&[Point::new(1.0, 1.0), Point::new(2.0, 2.0)]),
            0.0
        );
    }
}
