pub mod stub;

#[cfg(target_os = "macos")]
pub mod darwin;

use anyhow::Result;
use image::RgbImage;

use crate::types::*;

/// Pointer, scroll wheel and screen of the machine showing the mirrored
/// phone. Exclusively borrowed for the whole capture sequence.
pub trait Desktop {
    fn display_size(&self) -> DisplaySize;
    fn move_to(&mut self, p: Point) -> Result<()>;
    /// Move to `p` and press the left button.
    fn click(&mut self, p: Point) -> Result<()>;
    /// Wheel scroll at the current pointer position. Negative moves content down.
    fn scroll(&mut self, amount: i32) -> Result<()>;
    /// Capture the whole primary display.
    fn screenshot(&mut self) -> Result<RgbImage>;

    /// Capture one rectangle of the display.
    fn capture_region(&mut self, bbox: BoundingBox) -> Result<RgbImage> {
        let screen = self.screenshot()?;
        crate::capture::crop(&screen, bbox)
    }
}

/// Create the desktop driver for the current OS.
pub fn create_desktop(force_stub: bool) -> Box<dyn Desktop> {
    if force_stub {
        return Box::new(stub::StubDesktop::default());
    }
    #[cfg(target_os = "macos")]
    {
        return Box::new(darwin::DarwinDesktop::new());
    }
    #[cfg(not(target_os = "macos"))]
    {
        log::warn!("no input driver for this OS, using the stub desktop");
        Box::new(stub::StubDesktop::default())
    }
}
