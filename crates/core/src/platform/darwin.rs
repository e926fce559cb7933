use anyhow::{anyhow, Result};
use core_graphics::display::CGDisplay;
use core_graphics::event::*;
use core_graphics::event_source::*;
use core_graphics::geometry::*;
use core_graphics::window::*;
use image::RgbImage;
use log::debug;

use crate::capture::RawFrame;
use crate::types::*;
use super::Desktop;

/// Pause between button down and up; some apps drop zero-length clicks.
const CLICK_HOLD_MS: u64 = 15;

/// Quartz event driver for the main display. Coordinates are in points.
pub struct DarwinDesktop {
    display: DisplaySize,
    pointer: Point,
}

impl DarwinDesktop {
    pub fn new() -> Self {
        let bounds = CGDisplay::main().bounds();
        let display = DisplaySize::new(bounds.size.width as i32, bounds.size.height as i32);
        debug!("[darwin] main display {}", display);
        DarwinDesktop { display, pointer: Point::new(display.width / 2, display.height / 2) }
    }

    fn source() -> Result<CGEventSource> {
        CGEventSource::new(CGEventSourceStateID::HIDSystemState)
            .map_err(|_| anyhow!("failed to create HID event source"))
    }

    fn post_mouse(&self, kind: CGEventType, p: Point) -> Result<()> {
        let event = CGEvent::new_mouse_event(
            Self::source()?,
            kind,
            CGPoint::new(p.x as f64, p.y as f64),
            CGMouseButton::Left,
        )
        .map_err(|_| anyhow!("failed to create mouse event at {}", p))?;
        event.post(CGEventTapLocation::HID);
        Ok(())
    }
}

impl Default for DarwinDesktop {
    fn default() -> Self {
        Self::new()
    }
}

impl Desktop for DarwinDesktop {
    fn display_size(&self) -> DisplaySize {
        self.display
    }

    fn move_to(&mut self, p: Point) -> Result<()> {
        self.post_mouse(CGEventType::MouseMoved, p)?;
        self.pointer = p;
        Ok(())
    }

    fn click(&mut self, p: Point) -> Result<()> {
        self.move_to(p)?;
        self.post_mouse(CGEventType::LeftMouseDown, p)?;
        std::thread::sleep(std::time::Duration::from_millis(CLICK_HOLD_MS));
        self.post_mouse(CGEventType::LeftMouseUp, p)?;
        Ok(())
    }

    fn scroll(&mut self, amount: i32) -> Result<()> {
        let event = CGEvent::new_scroll_event(Self::source()?, ScrollEventUnit::LINE, 1, amount, 0, 0)
            .map_err(|_| anyhow!("failed to create scroll event"))?;
        event.set_location(CGPoint::new(self.pointer.x as f64, self.pointer.y as f64));
        event.post(CGEventTapLocation::HID);
        Ok(())
    }

    fn screenshot(&mut self) -> Result<RgbImage> {
        let rect = CGRect::new(
            &CGPoint::new(0.0, 0.0),
            &CGSize::new(self.display.width as f64, self.display.height as f64),
        );
        let image = create_image(
            rect,
            kCGWindowListOptionOnScreenOnly,
            kCGNullWindowID,
            kCGWindowImageNominalResolution,
        )
        .ok_or_else(|| anyhow!("screen capture failed; grant Screen Recording permission to your terminal"))?;

        let data = image.data();
        RawFrame {
            data: data.bytes().to_vec(),
            width: image.width() as u32,
            height: image.height() as u32,
            bytes_per_row: image.bytes_per_row() as u32,
        }
        .to_rgb()
    }
}
