use std::path::PathBuf;

use anyhow::Result;
use log::{debug, info};
use rand::RngCore;

use crate::capture;
use crate::guard::CoordinateGuard;
use crate::platform::Desktop;
use crate::profile::{EnvironmentProfile, Strategy, TARGET_NEXT_PAGE};
use crate::settings::Timing;
use crate::sleep::{self, Sleeper};
use crate::types::*;

pub const SCREENSHOT_PREFIX: &str = "profile_screenshot";

/// Side-effecting seams of a sequence, borrowed for its whole duration.
pub struct Controls<'a> {
    pub desktop: &'a mut dyn Desktop,
    pub sleeper: &'a mut dyn Sleeper,
    pub rng: &'a mut dyn RngCore,
}

impl Controls<'_> {
    /// Fixed pause of `secs` seconds.
    pub fn pause(&mut self, secs: f64) {
        self.sleeper.sleep(sleep::secs(secs));
    }
}

/// Drives one profile through its screenshots: focus, scroll or page,
/// capture, and scroll back to the top afterwards.
pub struct CaptureOrchestrator {
    timing: Timing,
    guard: CoordinateGuard,
    screenshot_dir: PathBuf,
}

impl CaptureOrchestrator {
    pub fn new(timing: Timing, guard: CoordinateGuard, screenshot_dir: impl Into<PathBuf>) -> Self {
        Self { timing, guard, screenshot_dir: screenshot_dir.into() }
    }

    pub fn guard(&self) -> &CoordinateGuard {
        &self.guard
    }

    /// Capture `step_count + 1` screenshots of the window at `bbox`.
    pub fn capture_sequence(
        &self,
        c: &mut Controls,
        bbox: BoundingBox,
        profile: &EnvironmentProfile,
        step_count: usize,
    ) -> Result<CaptureSequence> {
        let mut seq = CaptureSequence::new(capture::timestamp());
        self.capture_into(c, bbox, profile, step_count, &mut seq)?;
        Ok(seq)
    }

    /// Same as `capture_sequence`, appending to `seq`. On error `seq` holds
    /// the screenshots taken so far so the caller can remove them.
    pub fn capture_into(
        &self,
        c: &mut Controls,
        bbox: BoundingBox,
        profile: &EnvironmentProfile,
        step_count: usize,
        seq: &mut CaptureSequence,
    ) -> Result<()> {
        info!("capturing {} with {:?} strategy, {} step(s)", bbox, profile.strategy, step_count);
        match profile.strategy {
            Strategy::Scroll => self.scroll_through(c, bbox, step_count, seq),
            Strategy::Paging => {
                // fail before touching anything
                let next = self.guard.clamp(profile.target(TARGET_NEXT_PAGE)?);
                self.page_through(c, bbox, next, step_count, seq)
            }
        }
    }

    fn scroll_through(&self, c: &mut Controls, bbox: BoundingBox, n: usize, seq: &mut CaptureSequence) -> Result<()> {
        let t = &self.timing;
        let center = self.focus(c, bbox)?;
        c.pause(t.settle_delay);
        c.pause(t.pre_capture_delay);
        self.shoot(c, bbox, StepAction::Initial, seq)?;
        if n == 0 {
            return Ok(());
        }

        self.stepped_scroll(c, t.first_scroll)?;
        c.pause(t.scroll_delay);
        self.shoot(c, bbox, StepAction::Scroll { amount: t.first_scroll }, seq)?;

        for _ in 1..n {
            self.click_at(c, center)?;
            c.pause(t.focus_delay);
            self.stepped_scroll(c, t.subsequent_scroll)?;
            c.pause(t.scroll_delay);
            self.shoot(c, bbox, StepAction::Scroll { amount: t.subsequent_scroll }, seq)?;
        }

        c.pause(t.finish_pause);
        self.scroll_back(c, center, n)
    }

    fn page_through(
        &self,
        c: &mut Controls,
        bbox: BoundingBox,
        next: Point,
        n: usize,
        seq: &mut CaptureSequence,
    ) -> Result<()> {
        let t = &self.timing;
        self.focus(c, bbox)?;
        c.pause(t.settle_delay);
        c.pause(t.pre_capture_delay);
        self.shoot(c, bbox, StepAction::Initial, seq)?;

        let range = t.page_delay.0..t.page_delay.1;
        for i in 0..n {
            debug!("next page {}/{} at {}", i + 1, n, next);
            c.desktop.click(next)?;
            let wait = sleep::uniform(&range, c.rng);
            c.sleeper.sleep(wait);
            self.shoot(c, bbox, StepAction::Click { at: next }, seq)?;
        }
        Ok(())
    }

    /// Return to the top so the next profile starts from a known origin.
    fn scroll_back(&self, c: &mut Controls, center: Point, n: usize) -> Result<()> {
        let t = &self.timing;
        let total = t.first_scroll.unsigned_abs() as usize + t.subsequent_scroll.unsigned_abs() as usize * (n - 1);
        let ups = total / (t.scroll_up.unsigned_abs().max(1) as usize) + 1;
        debug!("scrolling back {} px in {} move(s)", total, ups);
        for _ in 0..ups {
            self.click_at(c, center)?;
            c.pause(t.focus_delay);
            self.stepped_scroll(c, t.scroll_up)?;
            c.pause(t.scroll_up_pause);
        }
        Ok(())
    }

    /// Scroll `amount` as several small wheel moves.
    fn stepped_scroll(&self, c: &mut Controls, amount: i32) -> Result<()> {
        let steps = self.timing.steps_per_scroll.max(1) as i32;
        let step = amount.div_euclid(steps);
        for _ in 0..steps {
            c.desktop.scroll(step)?;
            c.pause(self.timing.step_delay);
        }
        Ok(())
    }

    /// Point at the window center and click it so wheel events land there.
    fn focus(&self, c: &mut Controls, bbox: BoundingBox) -> Result<Point> {
        let center = self.guard.clamp(bbox.center());
        c.desktop.move_to(center)?;
        self.click_at(c, center)?;
        Ok(center)
    }

    fn click_at(&self, c: &mut Controls, p: Point) -> Result<()> {
        c.desktop.click(p)
    }

    fn shoot(&self, c: &mut Controls, bbox: BoundingBox, action: StepAction, seq: &mut CaptureSequence) -> Result<()> {
        let index = seq.next_index();
        let path = capture::take_screenshot(c.desktop, bbox, SCREENSHOT_PREFIX, index, &seq.timestamp, &self.screenshot_dir)?;
        seq.push(action, path);
        Ok(())
    }
}
