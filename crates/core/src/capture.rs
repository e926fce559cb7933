use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{bail, Context, Result};
use image::{imageops, RgbImage};
use log::{debug, warn};
use regex::Regex;

use crate::platform::Desktop;
use crate::types::BoundingBox;

/// Inches per meter, for the PNG pHYs chunk.
const INCHES_PER_METER: f64 = 39.3701;

/// Raw screen pixels as handed out by the OS (BGRA, rows possibly padded).
#[derive(Debug)]
pub struct RawFrame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub bytes_per_row: u32,
}

impl RawFrame {
    /// Drop alpha and row padding.
    pub fn to_rgb(&self) -> Result<RgbImage> {
        let need = self.bytes_per_row as usize * self.height as usize;
        if self.bytes_per_row < self.width * 4 || self.data.len() < need {
            bail!(
                "frame {}x{} has {} bytes at {} per row",
                self.width, self.height, self.data.len(), self.bytes_per_row
            );
        }
        let mut img = RgbImage::new(self.width, self.height);
        for (y, row) in self.data.chunks(self.bytes_per_row as usize).take(self.height as usize).enumerate() {
            for x in 0..self.width as usize {
                let px = &row[x * 4..x * 4 + 4];
                img.put_pixel(x as u32, y as u32, image::Rgb([px[2], px[1], px[0]]));
            }
        }
        Ok(img)
    }
}

/// Cut `bbox` out of a full-screen image. Parts hanging off the screen are
/// dropped; a box entirely off it is an error.
pub fn crop(screen: &RgbImage, bbox: BoundingBox) -> Result<RgbImage> {
    let (sw, sh) = (screen.width().min(i32::MAX as u32) as i32, screen.height().min(i32::MAX as u32) as i32);
    let Some(r) = bbox.clip(sw, sh) else {
        bail!("region {} is outside the {}x{} screen", bbox, sw, sh);
    };
    if r != bbox {
        debug!("clipped region {} to {}", bbox, r);
    }
    Ok(imageops::crop_imm(screen, r.x() as u32, r.y() as u32, r.width() as u32, r.height() as u32).to_image())
}

/// Timestamp shared by every screenshot of one sequence.
pub fn timestamp() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()
}

/// `<prefix>_<index>_<timestamp>.png`
pub fn screenshot_name(prefix: &str, index: usize, timestamp: &str) -> String {
    format!("{}_{}_{}.png", prefix, index, timestamp)
}

/// Write `img` as PNG, tagging the pixel density when `dpi` is given.
pub fn save_png(img: &RgbImage, path: &Path, dpi: Option<u32>) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
        }
    }
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut encoder = png::Encoder::new(BufWriter::new(file), img.width(), img.height());
    encoder.set_color(png::ColorType::Rgb);
    encoder.set_depth(png::BitDepth::Eight);
    if let Some(dpi) = dpi {
        let ppm = (dpi as f64 * INCHES_PER_METER).round() as u32;
        encoder.set_pixel_dims(Some(png::PixelDimensions { xppu: ppm, yppu: ppm, unit: png::Unit::Meter }));
    }
    let mut writer = encoder.write_header().with_context(|| format!("writing {}", path.display()))?;
    writer.write_image_data(img.as_raw()).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

/// Capture `bbox` and store it as `<dir>/<prefix>_<index>_<timestamp>.png`.
pub fn take_screenshot(
    desktop: &mut dyn Desktop,
    bbox: BoundingBox,
    prefix: &str,
    index: usize,
    timestamp: &str,
    dir: &Path,
) -> Result<PathBuf> {
    let img = desktop.capture_region(bbox).with_context(|| format!("capturing screenshot #{}", index))?;
    let path = dir.join(screenshot_name(prefix, index, timestamp));
    save_png(&img, &path, None)?;
    debug!("saved screenshot #{} to {}", index, path.display());
    Ok(path)
}

fn index_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"_(\d+)_\d{8}_\d{6}\.[^.]+$").ok()).as_ref()
}

/// Step index embedded in a screenshot filename. Unparseable names give
/// `usize::MAX` so they sort last.
pub fn parse_index(path: &Path) -> usize {
    let name = match path.file_name() {
        Some(n) => n.to_string_lossy(),
        None => return usize::MAX,
    };
    if let Some(idx) = index_pattern()
        .and_then(|re| re.captures(&name))
        .and_then(|c| c[1].parse().ok())
    {
        return idx;
    }
    // loose names like `shot_3.png`
    let stem = path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    stem.split('_')
        .skip(1)
        .find(|seg| !seg.is_empty() && seg.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|seg| seg.parse().ok())
        .unwrap_or(usize::MAX)
}

/// Remove captured files. Returns how many were deleted.
pub fn delete_screenshots(paths: &[PathBuf]) -> usize {
    let mut deleted = 0;
    for p in paths {
        match std::fs::remove_file(p) {
            Ok(()) => deleted += 1,
            Err(e) => warn!("failed to delete {}: {}", p.display(), e),
        }
    }
    if deleted > 0 {
        debug!("deleted {} screenshot(s)", deleted);
    }
    deleted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::stub::StubDesktop;
    use image::Rgb;

    #[test]
    fn raw_frame_drops_padding_and_swaps_channels() {
        // 2x2 BGRA with 4 bytes of row padding
        let data = vec![
            1, 2, 3, 255, 4, 5, 6, 255, 0, 0, 0, 0, //
            7, 8, 9, 255, 10, 11, 12, 255, 0, 0, 0, 0,
        ];
        let img = RawFrame { data, width: 2, height: 2, bytes_per_row: 12 }.to_rgb().unwrap();
        assert_eq!(img.get_pixel(0, 0), &Rgb([3, 2, 1]));
        assert_eq!(img.get_pixel(1, 1), &Rgb([12, 11, 10]));
    }

    #[test]
    fn short_frame_is_rejected() {
        let frame = RawFrame { data: vec![0; 10], width: 2, height: 2, bytes_per_row: 8 };
        assert!(frame.to_rgb().is_err());
    }

    #[test]
    fn crop_clips_to_the_screen() {
        let screen = RgbImage::new(100, 80);
        assert_eq!(crop(&screen, BoundingBox::new(10, 10, 20, 30).unwrap()).unwrap().dimensions(), (20, 30));
        assert_eq!(crop(&screen, BoundingBox::new(90, 10, 20, 30).unwrap()).unwrap().dimensions(), (10, 30));
        assert_eq!(crop(&screen, BoundingBox::new(-1, 0, 20, 30).unwrap()).unwrap().dimensions(), (19, 30));
        assert!(crop(&screen, BoundingBox::new(100, 0, 20, 30).unwrap()).is_err());
        assert!(crop(&screen, BoundingBox::new(-30, 0, 20, 30).unwrap()).is_err());
    }

    #[test]
    fn index_pattern_is_built_once() {
        let a = index_pattern().unwrap();
        let b = index_pattern().unwrap();
        assert!(std::ptr::eq(a, b));
    }

    #[test]
    fn index_from_filename() {
        assert_eq!(parse_index(Path::new("/tmp/profile_screenshot_3_20240101_120000.png")), 3);
        assert_eq!(parse_index(Path::new("profile_screenshot_12_20240101_120000.png")), 12);
        assert_eq!(parse_index(Path::new("shot_7.png")), 7);
        assert_eq!(parse_index(Path::new("garbage.png")), usize::MAX);
        assert_eq!(parse_index(Path::new("")), usize::MAX);
    }

    #[test]
    fn name_round_trips_through_index_parser() {
        let name = screenshot_name("profile_screenshot", 4, "20240101_120000");
        assert_eq!(name, "profile_screenshot_4_20240101_120000.png");
        assert_eq!(parse_index(Path::new(&name)), 4);
    }

    #[test]
    fn screenshot_is_written() {
        let dir = tempfile::tempdir().unwrap();
        let mut desktop = StubDesktop::default();
        let bbox = BoundingBox::new(0, 0, 40, 60).unwrap();
        let path = take_screenshot(&mut desktop, bbox, "p", 1, "20240101_120000", dir.path()).unwrap();
        assert!(path.ends_with("p_1_20240101_120000.png"));
        assert_eq!(image::open(&path).unwrap().to_rgb8().dimensions(), (40, 60));
    }

    #[test]
    fn dpi_is_embedded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.png");
        save_png(&RgbImage::new(4, 4), &path, Some(300)).unwrap();
        let reader = png::Decoder::new(File::open(&path).unwrap()).read_info().unwrap();
        let dims = reader.info().pixel_dims.unwrap();
        assert_eq!(dims.unit, png::Unit::Meter);
        assert_eq!(dims.xppu, 11811);
    }

    #[test]
    fn delete_counts_only_removed_files() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.png");
        std::fs::write(&a, b"x").unwrap();
        let n = delete_screenshots(&[a.clone(), dir.path().join("missing.png")]);
        assert_eq!(n, 1);
        assert!(!a.exists());
    }
}
