use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use image::imageops::{self, FilterType};
use image::RgbImage;
use log::{debug, info, warn};

use crate::capture;
use crate::error::Error;
use crate::types::StitchLayout;

pub const DEFAULT_DPI: u32 = 300;

/// Grid used when the caller gives none: one row up to three images,
/// otherwise three wide (four images make a square).
pub fn default_layout(count: usize) -> StitchLayout {
    let (rows, cols) = match count {
        0..=3 => (1, count.max(1)),
        4 => (2, 2),
        5..=6 => (2, 3),
        n => ((n + 2) / 3, 3),
    };
    StitchLayout { rows: rows as u32, cols: cols as u32 }
}

/// Composes a capture sequence into one grid image.
pub struct Stitcher {
    output_dir: PathBuf,
    dpi: Option<u32>,
    delete_originals: bool,
}

impl Stitcher {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self { output_dir: output_dir.into(), dpi: Some(DEFAULT_DPI), delete_originals: false }
    }

    /// Resolution tag written into the composite; `None` leaves it out.
    pub fn with_dpi(mut self, dpi: Option<u32>) -> Self {
        self.dpi = dpi;
        self
    }

    pub fn delete_originals(mut self, yes: bool) -> Self {
        self.delete_originals = yes;
        self
    }

    /// Paste `paths` row-major in step-index order and save the composite.
    /// Input order does not matter.
    pub fn stitch(&self, paths: &[PathBuf], layout: Option<StitchLayout>) -> Result<PathBuf> {
        if paths.is_empty() {
            return Err(Error::NothingToStitch.into());
        }
        let ordered = order_by_index(paths);
        let layout = layout.unwrap_or_else(|| default_layout(ordered.len()));
        if layout.cells() < ordered.len() {
            warn!(
                "layout {}x{} holds {} of {} images, dropping the rest",
                layout.rows, layout.cols, layout.cells(), ordered.len()
            );
        }

        let first = load(ordered[0])?;
        let (w, h) = first.dimensions();
        let (canvas_w, canvas_h) = layout
            .cols
            .checked_mul(w)
            .zip(layout.rows.checked_mul(h))
            .ok_or_else(|| anyhow!("layout {}x{} of {}x{} images is too large", layout.rows, layout.cols, w, h))?;
        let mut canvas = RgbImage::new(canvas_w, canvas_h);
        for (i, path) in ordered.iter().take(layout.cells()).enumerate() {
            let img = if i == 0 { first.clone() } else { load(path)? };
            let img = if img.dimensions() != (w, h) {
                debug!("resizing {} from {:?} to {}x{}", path.display(), img.dimensions(), w, h);
                imageops::resize(&img, w, h, FilterType::Lanczos3)
            } else {
                img
            };
            let (row, col) = (i as u32 / layout.cols, i as u32 % layout.cols);
            imageops::replace(&mut canvas, &img, (col * w) as i64, (row * h) as i64);
        }

        let out = self.output_path();
        capture::save_png(&canvas, &out, self.dpi)?;
        info!("stitched {} image(s) into {} ({}x{})", ordered.len().min(layout.cells()), out.display(), layout.rows, layout.cols);

        if self.delete_originals {
            capture::delete_screenshots(paths);
        }
        Ok(out)
    }

    fn output_path(&self) -> PathBuf {
        let stamp = chrono::Local::now().format("%H%M%S_%3f").to_string();
        let mut path = self.output_dir.join(format!("composite_{}.png", stamp));
        let mut n = 1;
        while path.exists() {
            path = self.output_dir.join(format!("composite_{}_{}.png", stamp, n));
            n += 1;
        }
        path
    }
}

/// Ascending embedded index; unparseable names last, ties by file name.
fn order_by_index(paths: &[PathBuf]) -> Vec<&PathBuf> {
    let mut ordered: Vec<&PathBuf> = paths.iter().collect();
    ordered.sort_by_key(|p| (capture::parse_index(p), p.file_name().map(|n| n.to_os_string())));
    ordered
}

fn load(path: &Path) -> Result<RgbImage> {
    Ok(image::open(path).with_context(|| format!("loading {}", path.display()))?.to_rgb8())
}
