pub mod contour;

use std::path::PathBuf;

use anyhow::{Context, Result};
use image::{GrayImage, RgbImage};
use log::{debug, info, warn};

use crate::capture;
use crate::platform::Desktop;
use crate::profile::EnvironmentProfile;
use crate::settings::DetectionSettings;
use crate::types::BoundingBox;
use contour::{binarize, find_external_contours, mean_gray, to_gray};

/// Which rule produced a window rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocateSource {
    Fixed,
    BorderDetection,
    ContentArea,
    Estimate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub bbox: BoundingBox,
    pub source: LocateSource,
}

/// Finds the mirrored phone window on screen.
pub struct WindowLocator {
    detection: DetectionSettings,
    audit_dir: Option<PathBuf>,
}

impl WindowLocator {
    /// `audit_dir` receives a crop of every located window; `None` disables it.
    pub fn new(detection: DetectionSettings, audit_dir: Option<PathBuf>) -> Self {
        Self { detection, audit_dir }
    }

    /// Fixed box when the profile has one, visual search otherwise.
    /// Detection misses fall back; only capture failures and a fixed box
    /// off the display are errors.
    pub fn locate(&self, desktop: &mut dyn Desktop, profile: &EnvironmentProfile) -> Result<Location> {
        if let Some(bbox) = profile.bbox {
            let bbox = bbox.validate(desktop.display_size())?;
            info!("using fixed window {} for {}", bbox, profile.name);
            match desktop.screenshot() {
                Ok(screen) => self.audit(&screen, bbox),
                Err(e) => warn!("skipping window audit: {:#}", e),
            }
            return Ok(Location { bbox, source: LocateSource::Fixed });
        }

        let screen = desktop.screenshot().context("capturing screen for window detection")?;
        let location = self.detect(&screen);
        info!("window {} found by {:?}", location.bbox, location.source);
        self.audit(&screen, location.bbox);
        Ok(location)
    }

    /// Run the border search, then the content-area search, then estimate.
    pub fn detect(&self, screen: &RgbImage) -> Location {
        let gray = to_gray(screen);
        if let Some(bbox) = self.find_border(&gray) {
            return Location { bbox, source: LocateSource::BorderDetection };
        }
        debug!("no bordered window, trying content area");
        if let Some(bbox) = self.find_content(&gray) {
            return Location { bbox, source: LocateSource::ContentArea };
        }
        warn!("window detection failed, using centered estimate");
        Location { bbox: self.estimate(screen.width() as i32, screen.height() as i32), source: LocateSource::Estimate }
    }

    fn portrait_in_band(&self, b: &BoundingBox, min_height: i32) -> bool {
        let ratio = b.aspect_ratio();
        b.height() > b.width()
            && b.height() > min_height
            && ratio > self.detection.min_aspect
            && ratio < self.detection.max_aspect
    }

    /// Light frame around the mirrored screen.
    fn find_border(&self, gray: &GrayImage) -> Option<BoundingBox> {
        let d = &self.detection;
        let mask = binarize(gray, d.border_threshold);
        for c in find_external_contours(&mask) {
            let vertices = c.approx_polygon(0.02 * c.perimeter()).len();
            if vertices < d.min_vertices || vertices > d.max_vertices {
                continue;
            }
            let Some(bbox) = c.bounding_rect() else { continue };
            if !self.portrait_in_band(&bbox, d.border_min_height) {
                continue;
            }
            let bright = self.bright_edges(gray, bbox);
            debug!("border candidate {} ({} vertices, {} bright edges)", bbox, vertices, bright);
            if bright >= d.min_bright_edges {
                return Some(bbox);
            }
        }
        None
    }

    /// Number of the rectangle's four inner edge strips that are bright.
    fn bright_edges(&self, gray: &GrayImage, b: BoundingBox) -> usize {
        let t = self.detection.edge_strip.max(1);
        let strips = [
            BoundingBox::new(b.x(), b.y(), b.width(), t),
            BoundingBox::new(b.x(), b.bottom() - t, b.width(), t),
            BoundingBox::new(b.x(), b.y(), t, b.height()),
            BoundingBox::new(b.right() - t, b.y(), t, b.height()),
        ];
        strips
            .into_iter()
            .flatten()
            .filter_map(|s| mean_gray(gray, s))
            .filter(|m| *m > self.detection.edge_brightness)
            .count()
    }

    /// Largest bright regions, without the edge check.
    fn find_content(&self, gray: &GrayImage) -> Option<BoundingBox> {
        let d = &self.detection;
        let mut contours = find_external_contours(&binarize(gray, d.content_threshold));
        contours.sort_by(|a, b| b.area().total_cmp(&a.area()));
        contours
            .iter()
            .take(d.content_candidates)
            .filter_map(|c| c.bounding_rect())
            .find(|b| self.portrait_in_band(b, d.content_min_height))
    }

    /// Centered phone-shaped box a quarter of the screen wide. On wide
    /// displays it runs past the top and bottom edges; consumers clip.
    fn estimate(&self, screen_w: i32, screen_h: i32) -> BoundingBox {
        let (aw, ah) = self.detection.target_aspect;
        let ratio = if aw > 0.0 && ah > 0.0 { ah / aw } else { 19.5 / 9.0 };
        let width = (screen_w / 4).max(1);
        let height = (width as f64 * ratio) as i32;
        let x = (screen_w - width).div_euclid(2);
        let y = (screen_h - height).div_euclid(2);
        BoundingBox::saturating(x, y, width, height)
    }

    /// Save the window plus a strip to its left, for checking detections later.
    fn audit(&self, screen: &RgbImage, bbox: BoundingBox) {
        let Some(dir) = &self.audit_dir else { return };
        let margin = (bbox.width() as f64 * self.detection.audit_margin).round() as i32;
        let widened = BoundingBox::saturating(bbox.x().saturating_sub(margin), bbox.y(), bbox.width().saturating_add(margin), bbox.height());
        let Some(region) = widened.clip(screen.width() as i32, screen.height() as i32) else {
            warn!("skipping window audit: {} is off the screen", bbox);
            return;
        };
        let path = dir.join(format!("window_{}.png", capture::timestamp()));
        let saved = capture::crop(screen, region).and_then(|img| capture::save_png(&img, &path, None));
        match saved {
            Ok(()) => debug!("window audit saved to {}", path.display()),
            Err(e) => warn!("failed to save window audit: {:#}", e),
        }
    }
}
