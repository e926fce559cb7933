//! Outer-boundary extraction on binary masks.
//!
//! Foreground components are 8-connected, background is 4-connected. Only
//! components that touch the outer background are reported, so anything
//! drawn inside the hole of another shape is ignored. Each boundary is traced
//! clockwise with a radial sweep and can be reduced to a polygon with a
//! closed Douglas-Peucker pass.

use image::{GrayImage, RgbImage};

use crate::types::{BoundingBox, Point};

/// Clockwise on screen (y grows downward), starting east.
const DIRS: [(i32, i32); 8] = [(1, 0), (1, 1), (0, 1), (-1, 1), (-1, 0), (-1, -1), (0, -1), (1, -1)];
const WEST: usize = 4;

/// Luma with the classic 0.299/0.587/0.114 weights.
pub fn to_gray(img: &RgbImage) -> GrayImage {
    let mut gray = GrayImage::new(img.width(), img.height());
    for (x, y, px) in img.enumerate_pixels() {
        let [r, g, b] = px.0;
        let v = 0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64;
        gray.put_pixel(x, y, image::Luma([v.round().min(255.0) as u8]));
    }
    gray
}

/// Mean gray level of `bbox` clipped to the image. `None` when nothing is left.
pub fn mean_gray(gray: &GrayImage, bbox: BoundingBox) -> Option<f64> {
    let x0 = bbox.x().max(0) as u32;
    let y0 = bbox.y().max(0) as u32;
    let x1 = (bbox.right().max(0) as u32).min(gray.width());
    let y1 = (bbox.bottom().max(0) as u32).min(gray.height());
    if x0 >= x1 || y0 >= y1 {
        return None;
    }
    let mut sum = 0u64;
    for y in y0..y1 {
        for x in x0..x1 {
            sum += gray.get_pixel(x, y).0[0] as u64;
        }
    }
    Some(sum as f64 / ((x1 - x0) as u64 * (y1 - y0) as u64) as f64)
}

/// Binary image; reads outside the frame are background.
#[derive(Debug, Clone)]
pub struct Mask {
    width: i32,
    height: i32,
    bits: Vec<bool>,
}

impl Mask {
    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn get(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && x < self.width && y < self.height && self.bits[self.idx(x, y)]
    }

    fn idx(&self, x: i32, y: i32) -> usize {
        (y * self.width + x) as usize
    }
}

/// Pixels strictly brighter than `threshold` become foreground.
pub fn binarize(gray: &GrayImage, threshold: u8) -> Mask {
    Mask {
        width: gray.width() as i32,
        height: gray.height() as i32,
        bits: gray.pixels().map(|p| p.0[0] > threshold).collect(),
    }
}

/// Closed boundary of one component, clockwise, no repeated closing point.
#[derive(Debug, Clone, PartialEq)]
pub struct Contour {
    pub points: Vec<Point>,
}

impl Contour {
    pub fn bounding_rect(&self) -> Option<BoundingBox> {
        let min_x = self.points.iter().map(|p| p.x).min()?;
        let max_x = self.points.iter().map(|p| p.x).max()?;
        let min_y = self.points.iter().map(|p| p.y).min()?;
        let max_y = self.points.iter().map(|p| p.y).max()?;
        BoundingBox::new(min_x, min_y, max_x - min_x + 1, max_y - min_y + 1).ok()
    }

    /// Shoelace area of the boundary polygon.
    pub fn area(&self) -> f64 {
        let n = self.points.len();
        if n < 3 {
            return 0.0;
        }
        let twice: i64 = (0..n)
            .map(|i| {
                let a = self.points[i];
                let b = self.points[(i + 1) % n];
                a.x as i64 * b.y as i64 - b.x as i64 * a.y as i64
            })
            .sum();
        twice.abs() as f64 / 2.0
    }

    /// Closed arc length.
    pub fn perimeter(&self) -> f64 {
        let n = self.points.len();
        if n < 2 {
            return 0.0;
        }
        (0..n).map(|i| dist(self.points[i], self.points[(i + 1) % n])).sum()
    }

    /// Closed Douglas-Peucker simplification.
    pub fn approx_polygon(&self, epsilon: f64) -> Vec<Point> {
        let n = self.points.len();
        if n < 3 {
            return self.points.clone();
        }
        // split the ring at two mutually far points
        let a = farthest(&self.points, self.points[0]);
        let b = farthest(&self.points, self.points[a]);
        let mut ring: Vec<Point> = self.points[a..].iter().chain(&self.points[..a]).copied().collect();
        ring.push(ring[0]);
        let split = (b + n - a) % n;

        let mut keep = vec![false; n + 1];
        keep[0] = true;
        keep[split] = true;
        simplify(&ring, 0, split, epsilon, &mut keep);
        simplify(&ring, split, n, epsilon, &mut keep);
        (0..n).filter(|&i| keep[i]).map(|i| ring[i]).collect()
    }
}

fn dist(a: Point, b: Point) -> f64 {
    (((a.x - b.x) as f64).powi(2) + ((a.y - b.y) as f64).powi(2)).sqrt()
}

fn farthest(points: &[Point], from: Point) -> usize {
    let mut best = 0;
    let mut best_d = -1.0;
    for (i, p) in points.iter().enumerate() {
        let d = dist(*p, from);
        if d > best_d {
            best = i;
            best_d = d;
        }
    }
    best
}

/// Distance from `p` to the line through `a` and `b`.
fn line_dist(p: Point, a: Point, b: Point) -> f64 {
    let len = dist(a, b);
    if len == 0.0 {
        return dist(p, a);
    }
    let cross = (b.x - a.x) as f64 * (a.y - p.y) as f64 - (a.x - p.x) as f64 * (b.y - a.y) as f64;
    cross.abs() / len
}

fn simplify(ring: &[Point], lo: usize, hi: usize, epsilon: f64, keep: &mut [bool]) {
    if hi <= lo + 1 {
        return;
    }
    let mut idx = lo;
    let mut max_d = 0.0;
    for i in lo + 1..hi {
        let d = line_dist(ring[i], ring[lo], ring[hi]);
        if d > max_d {
            idx = i;
            max_d = d;
        }
    }
    if max_d > epsilon {
        keep[idx] = true;
        simplify(ring, lo, idx, epsilon, keep);
        simplify(ring, idx, hi, epsilon, keep);
    }
}

/// Outer boundaries of all outermost components, in raster order of their
/// first pixel.
pub fn find_external_contours(mask: &Mask) -> Vec<Contour> {
    let (w, h) = (mask.width, mask.height);
    if w == 0 || h == 0 {
        return Vec::new();
    }
    let outside = outer_background(mask);
    let mut labels = vec![0u32; (w * h) as usize];
    let mut next = 0u32;
    let mut contours = Vec::new();
    let mut stack = Vec::new();

    for y in 0..h {
        for x in 0..w {
            let i = mask.idx(x, y);
            if !mask.bits[i] || labels[i] != 0 {
                continue;
            }
            next += 1;
            labels[i] = next;
            stack.push((x, y));
            let mut size = 0usize;
            let mut external = false;
            while let Some((cx, cy)) = stack.pop() {
                size += 1;
                if cx == 0 || cy == 0 || cx == w - 1 || cy == h - 1 {
                    external = true;
                }
                for (k, (dx, dy)) in DIRS.iter().enumerate() {
                    let (nx, ny) = (cx + dx, cy + dy);
                    if nx < 0 || ny < 0 || nx >= w || ny >= h {
                        continue;
                    }
                    let j = mask.idx(nx, ny);
                    if mask.bits[j] {
                        if labels[j] == 0 {
                            labels[j] = next;
                            stack.push((nx, ny));
                        }
                    } else if k % 2 == 0 && outside[j] {
                        external = true;
                    }
                }
            }
            if external {
                contours.push(Contour { points: trace(mask, Point::new(x, y), size) });
            }
        }
    }
    contours
}

/// Background reachable from the frame through 4-connected steps.
fn outer_background(mask: &Mask) -> Vec<bool> {
    let (w, h) = (mask.width, mask.height);
    let mut seen = vec![false; (w * h) as usize];
    let mut stack = Vec::new();
    let seed = |x: i32, y: i32, seen: &mut Vec<bool>, stack: &mut Vec<(i32, i32)>| {
        let i = mask.idx(x, y);
        if !mask.bits[i] && !seen[i] {
            seen[i] = true;
            stack.push((x, y));
        }
    };
    for x in 0..w {
        seed(x, 0, &mut seen, &mut stack);
        seed(x, h - 1, &mut seen, &mut stack);
    }
    for y in 0..h {
        seed(0, y, &mut seen, &mut stack);
        seed(w - 1, y, &mut seen, &mut stack);
    }
    while let Some((x, y)) = stack.pop() {
        for (dx, dy) in [(1, 0), (-1, 0), (0, 1), (0, -1)] {
            let (nx, ny) = (x + dx, y + dy);
            if nx >= 0 && ny >= 0 && nx < w && ny < h {
                seed(nx, ny, &mut seen, &mut stack);
            }
        }
    }
    seen
}

/// Radial sweep from the component's raster-first pixel. Stops when the
/// first move is about to repeat.
fn trace(mask: &Mask, start: Point, size: usize) -> Vec<Point> {
    let mut points = vec![start];
    let mut p = start;
    let mut back = WEST;
    let mut second: Option<Point> = None;

    for _ in 0..(4 * size + 8) {
        let step = (1..=8).map(|k| (back + k) % 8).find_map(|d| {
            let q = Point::new(p.x + DIRS[d].0, p.y + DIRS[d].1);
            mask.get(q.x, q.y).then_some((d, q))
        });
        let Some((d, q)) = step else {
            break; // single pixel
        };
        if p == start {
            match second {
                Some(s) if s == q => break,
                Some(_) => {}
                None => second = Some(q),
            }
        }
        points.push(q);
        back = (d + 4) % 8;
        p = q;
    }
    if points.len() > 1 && points.last() == points.first() {
        points.pop();
    }
    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn gray_with(w: u32, h: u32, f: impl Fn(u32, u32) -> bool) -> GrayImage {
        GrayImage::from_fn(w, h, |x, y| Luma([if f(x, y) { 255 } else { 0 }]))
    }

    #[test]
    fn gray_weights() {
        let img = RgbImage::from_pixel(1, 1, image::Rgb([255, 0, 0]));
        assert_eq!(to_gray(&img).get_pixel(0, 0).0[0], 76);
    }

    #[test]
    fn filled_rectangle() {
        let g = gray_with(20, 20, |x, y| (3..13).contains(&x) && (5..9).contains(&y));
        let contours = find_external_contours(&binarize(&g, 128));
        assert_eq!(contours.len(), 1);
        let c = &contours[0];
        assert_eq!(c.bounding_rect().unwrap().as_tuple(), (3, 5, 10, 4));
        assert_eq!(c.area(), 27.0);
        assert_eq!(c.perimeter(), 24.0);
        assert_eq!(c.points.len(), 24);
        assert_eq!(c.points[0], Point::new(3, 5));
        assert_eq!(c.points[1], Point::new(4, 5));
    }

    #[test]
    fn rectangle_simplifies_to_four_corners() {
        let g = gray_with(60, 80, |x, y| (10..40).contains(&x) && (10..70).contains(&y));
        let c = &find_external_contours(&binarize(&g, 128))[0];
        let mut poly = c.approx_polygon(0.02 * c.perimeter());
        poly.sort_by_key(|p| (p.y, p.x));
        assert_eq!(
            poly,
            vec![Point::new(10, 10), Point::new(39, 10), Point::new(10, 69), Point::new(39, 69)]
        );
    }

    #[test]
    fn nested_shapes_are_not_external() {
        // ring with a dot inside the hole
        let g = gray_with(40, 40, |x, y| {
            let ring = (5..35).contains(&x) && (5..35).contains(&y) && !((8..32).contains(&x) && (8..32).contains(&y));
            let dot = (18..22).contains(&x) && (18..22).contains(&y);
            ring || dot
        });
        let contours = find_external_contours(&binarize(&g, 128));
        assert_eq!(contours.len(), 1);
        assert_eq!(contours[0].bounding_rect().unwrap().as_tuple(), (5, 5, 30, 30));
    }

    #[test]
    fn raster_order_and_isolated_pixels() {
        let g = gray_with(10, 10, |x, y| (x == 7 && y == 1) || ((1..4).contains(&x) && (5..8).contains(&y)));
        let contours = find_external_contours(&binarize(&g, 128));
        assert_eq!(contours.len(), 2);
        assert_eq!(contours[0].points, vec![Point::new(7, 1)]);
        assert_eq!(contours[1].bounding_rect().unwrap().as_tuple(), (1, 5, 3, 3));
    }

    #[test]
    fn diagonal_pixels_form_one_component() {
        let g = gray_with(6, 6, |x, y| x == y);
        let contours = find_external_contours(&binarize(&g, 128));
        assert_eq!(contours.len(), 1);
        assert_eq!(contours[0].bounding_rect().unwrap().as_tuple(), (0, 0, 6, 6));
    }

    #[test]
    fn mean_gray_clips() {
        let g = gray_with(10, 10, |x, _| x < 5);
        let m = mean_gray(&g, BoundingBox::new(0, 0, 5, 10).unwrap()).unwrap();
        assert_eq!(m, 255.0);
        assert_eq!(mean_gray(&g, BoundingBox::new(8, 0, 10, 10).unwrap()), Some(0.0));
        assert_eq!(mean_gray(&g, BoundingBox::new(20, 20, 5, 5).unwrap()), None);
    }
}
