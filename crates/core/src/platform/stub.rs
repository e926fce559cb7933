use anyhow::{bail, Result};
use image::{Rgb, RgbImage};
use log::debug;

use crate::types::*;
use super::Desktop;

/// One recorded desktop call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DesktopEvent {
    Move(Point),
    Click(Point),
    Scroll(i32),
    Screenshot,
}

/// Desktop that performs nothing, logs every call and serves a fixed screen.
pub struct StubDesktop {
    screen: RgbImage,
    events: Vec<DesktopEvent>,
    fail_on_screenshot: Option<usize>,
    screenshots: usize,
}

impl Default for StubDesktop {
    fn default() -> Self {
        Self::with_screen(RgbImage::from_pixel(1920, 1080, Rgb([24, 24, 24])))
    }
}

impl StubDesktop {
    pub fn with_screen(screen: RgbImage) -> Self {
        Self { screen, events: Vec::new(), fail_on_screenshot: None, screenshots: 0 }
    }

    /// Make the `n`-th screenshot (1-based) fail.
    pub fn fail_on_screenshot(mut self, n: usize) -> Self {
        self.fail_on_screenshot = Some(n);
        self
    }

    pub fn events(&self) -> &[DesktopEvent] {
        &self.events
    }

    pub fn scrolls(&self) -> Vec<i32> {
        self.events
            .iter()
            .filter_map(|e| match e {
                DesktopEvent::Scroll(a) => Some(*a),
                _ => None,
            })
            .collect()
    }

    pub fn clicks(&self) -> Vec<Point> {
        self.events
            .iter()
            .filter_map(|e| match e {
                DesktopEvent::Click(p) => Some(*p),
                _ => None,
            })
            .collect()
    }

    pub fn screenshot_count(&self) -> usize {
        self.screenshots
    }
}

impl Desktop for StubDesktop {
    fn display_size(&self) -> DisplaySize {
        DisplaySize::new(self.screen.width() as i32, self.screen.height() as i32)
    }

    fn move_to(&mut self, p: Point) -> Result<()> {
        debug!(target: "stub", "move_to{}", p);
        self.events.push(DesktopEvent::Move(p));
        Ok(())
    }

    fn click(&mut self, p: Point) -> Result<()> {
        debug!(target: "stub", "click{}", p);
        self.events.push(DesktopEvent::Click(p));
        Ok(())
    }

    fn scroll(&mut self, amount: i32) -> Result<()> {
        debug!(target: "stub", "scroll({})", amount);
        self.events.push(DesktopEvent::Scroll(amount));
        Ok(())
    }

    fn screenshot(&mut self) -> Result<RgbImage> {
        self.screenshots += 1;
        debug!(target: "stub", "screenshot #{}", self.screenshots);
        self.events.push(DesktopEvent::Screenshot);
        if self.fail_on_screenshot == Some(self.screenshots) {
            bail!("stub screenshot #{} failed", self.screenshots);
        }
        Ok(self.screen.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_calls_in_order() {
        let mut d = StubDesktop::default();
        d.click(Point::new(1, 2)).unwrap();
        d.scroll(-52).unwrap();
        d.screenshot().unwrap();
        assert_eq!(
            d.events(),
            &[DesktopEvent::Click(Point::new(1, 2)), DesktopEvent::Scroll(-52), DesktopEvent::Screenshot]
        );
        assert_eq!(d.display_size(), DisplaySize::new(1920, 1080));
    }

    #[test]
    fn scheduled_failure() {
        let mut d = StubDesktop::default().fail_on_screenshot(2);
        assert!(d.screenshot().is_ok());
        assert!(d.screenshot().is_err());
        assert!(d.screenshot().is_ok());
    }

    #[test]
    fn region_capture_crops_the_screen() {
        let mut d = StubDesktop::default();
        let img = d.capture_region(BoundingBox::new(100, 50, 30, 60).unwrap()).unwrap();
        assert_eq!(img.dimensions(), (30, 60));
    }
}
