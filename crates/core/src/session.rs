use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use log::{error, info, warn};

use crate::capture;
use crate::classifier::Classifier;
use crate::decision::{self, Decision, ParsedDecision, Resolved};
use crate::error::Error;
use crate::guard::CoordinateGuard;
use crate::locator::WindowLocator;
use crate::orchestrator::{CaptureOrchestrator, Controls};
use crate::profile::{EnvironmentProfile, TARGET_LIKE, TARGET_PASS};
use crate::settings::Settings;
use crate::sleep;
use crate::stitch::Stitcher;
use crate::types::*;

const AD_CHECK_PREFIX: &str = "ad_check";

/// When to stop starting new profiles. `None` means no limit.
#[derive(Debug, Clone, Copy, Default)]
pub struct Limits {
    pub max_profiles: Option<usize>,
    pub duration: Option<Duration>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionReport {
    pub processed: usize,
    pub failed: usize,
    pub liked: usize,
    pub passed: usize,
    pub ads: usize,
}

/// Everything the classifier said about one profile.
struct Reply<'a> {
    raw: &'a str,
    parsed: &'a ParsedDecision,
    resolved: Resolved,
    opener: &'a str,
}

enum Outcome {
    Ad,
    /// Composite made, no classifier to judge it.
    Captured(PathBuf),
    Acted(Decision),
}

/// The outer loop: one profile after another until a limit is hit.
pub struct Session {
    settings: Settings,
    profile: EnvironmentProfile,
    locator: WindowLocator,
    orchestrator: CaptureOrchestrator,
    stitcher: Stitcher,
}

impl Session {
    pub fn new(settings: &Settings, profile: EnvironmentProfile, display: DisplaySize) -> Self {
        let guard = CoordinateGuard::new(display, settings.pointer_margin);
        Self {
            locator: WindowLocator::new(settings.detection.clone(), Some(settings.audit_dir())),
            orchestrator: CaptureOrchestrator::new(settings.timing.clone(), guard, settings.screenshot_dir.clone()),
            stitcher: Stitcher::new(settings.stitched_dir()).with_dpi(Some(settings.dpi)),
            settings: settings.clone(),
            profile,
        }
    }

    /// Process profiles until `limits` says stop. A failing profile is
    /// logged and skipped; configuration errors end the run.
    pub fn run(
        &self,
        c: &mut Controls,
        mut classifier: Option<&mut (dyn Classifier + '_)>,
        limits: Limits,
    ) -> Result<SessionReport> {
        let started = Instant::now();
        let mut report = SessionReport::default();
        let mut iteration = 0;

        loop {
            if limits.max_profiles.is_some_and(|max| iteration >= max) {
                info!("profile budget of {} reached", iteration);
                break;
            }
            if iteration > 0 {
                c.sleeper.sleep(sleep::jitter(self.settings.pause_between_profiles, c.rng));
            }
            if limits.duration.is_some_and(|d| started.elapsed() >= d) {
                info!("session time is up after {} profile(s)", iteration);
                break;
            }
            iteration += 1;
            info!("--- profile #{} ---", iteration);

            match self.process(c, classifier.as_deref_mut(), iteration) {
                Ok(Outcome::Ad) => report.ads += 1,
                Ok(Outcome::Captured(path)) => {
                    info!("composite ready at {}", path.display());
                    report.processed += 1;
                }
                Ok(Outcome::Acted(d)) => {
                    report.processed += 1;
                    match d {
                        Decision::Positive => report.liked += 1,
                        _ => report.passed += 1,
                    }
                }
                Err(e) if is_fatal(&e) => return Err(e),
                Err(e) => {
                    error!("profile #{} abandoned: {:#}", iteration, e);
                    report.failed += 1;
                }
            }
        }

        info!(
            "session done: {} processed, {} liked, {} passed, {} ads, {} failed",
            report.processed, report.liked, report.passed, report.ads, report.failed
        );
        Ok(report)
    }

    fn process(
        &self,
        c: &mut Controls,
        mut classifier: Option<&mut (dyn Classifier + '_)>,
        iteration: usize,
    ) -> Result<Outcome> {
        let bbox = self.locator.locate(c.desktop, &self.profile)?.bbox;

        if self.settings.check_ads {
            if let Some(cl) = classifier.as_deref_mut() {
                if self.is_ad(c, cl, bbox, iteration) {
                    info!("ad detected, passing");
                    self.act(c, Decision::Negative)?;
                    return Ok(Outcome::Ad);
                }
            }
        }

        let step_count = self.profile.step_count(self.settings.num_scrolls);
        let mut seq = CaptureSequence::new(capture::timestamp());
        if let Err(e) = self.orchestrator.capture_into(c, bbox, &self.profile, step_count, &mut seq) {
            let removed = capture::delete_screenshots(&seq.paths());
            warn!("capture failed after {} screenshot(s), removed {}", seq.len(), removed);
            return Err(e);
        }

        let paths = seq.paths();
        let stitched = self.stitcher.stitch(&paths, self.profile.layout);
        if !self.settings.keep_screenshots {
            capture::delete_screenshots(&paths);
        }
        let stitched = stitched?;

        let Some(cl) = classifier else {
            return Ok(Outcome::Captured(stitched));
        };
        let (parsed, raw) = match cl.classify_profile(&stitched) {
            Ok(raw) => (decision::parse(&raw), raw),
            Err(e) => {
                warn!("classifier failed: {:#}", e);
                (ParsedDecision::missing(format!("classifier failed: {:#}", e)), String::new())
            }
        };
        let resolved = decision::resolve(&parsed, self.settings.like_keep_probability, c.rng);
        let opener = cl.describe_profile(&stitched).unwrap_or_else(|e| {
            warn!("no opener for this profile: {:#}", e);
            String::new()
        });
        let reply = Reply { raw: &raw, parsed: &parsed, resolved, opener: &opener };
        match self.archive(&stitched, &reply) {
            Ok(p) => info!("profile saved to {}", p.display()),
            Err(e) => warn!("failed to archive profile: {:#}", e),
        }
        self.act(c, resolved.decision)?;
        Ok(Outcome::Acted(resolved.decision))
    }

    /// One screenshot of the current card, judged and thrown away. Any
    /// failure counts as "not an ad".
    fn is_ad(&self, c: &mut Controls, cl: &mut dyn Classifier, bbox: BoundingBox, iteration: usize) -> bool {
        let ts = capture::timestamp();
        let shot = match capture::take_screenshot(c.desktop, bbox, AD_CHECK_PREFIX, iteration, &ts, &self.settings.screenshot_dir) {
            Ok(p) => p,
            Err(e) => {
                warn!("ad check screenshot failed: {:#}", e);
                return false;
            }
        };
        c.pause(0.5);
        let reply = cl.check_ad(&shot);
        capture::delete_screenshots(&[shot]);
        match reply {
            Ok(raw) => decision::parse_ad_check(&raw).decision == Decision::Positive,
            Err(e) => {
                warn!("ad check failed, assuming no ad: {:#}", e);
                false
            }
        }
    }

    /// Press like or pass. Profiles without the target only log the intent.
    fn act(&self, c: &mut Controls, d: Decision) -> Result<()> {
        let name = if d == Decision::Positive { TARGET_LIKE } else { TARGET_PASS };
        let Some(&target) = self.profile.targets.get(name) else {
            info!("{} intended, but '{}' has no {} target", d, self.profile.name, name);
            return Ok(());
        };
        let t = &self.settings.timing;
        let at = self.orchestrator.guard().clamp(target);
        let wait = sleep::uniform(&(t.action_delay.0..t.action_delay.1), c.rng);
        c.sleeper.sleep(wait);
        info!("clicking {} at {}", d, at);
        c.desktop.click(at)?;
        c.pause(t.after_action_delay);
        Ok(())
    }

    /// Move the composite into the per-day folder, named after the person in
    /// the opener, next to the replies.
    fn archive(&self, stitched: &Path, reply: &Reply) -> Result<PathBuf> {
        let now = chrono::Local::now();
        let dir = self.settings.screenshot_dir.join(format!("profile_{}", now.format("%Y%m%d")));
        fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;

        let mut stem = format!("profile_{}", file_safe(&decision::extract_name(reply.opener)));
        if dir.join(format!("{}.png", stem)).exists() {
            stem = format!("{}_{}", stem, now.format("%H%M%S"));
        }
        let image = dir.join(format!("{}.png", stem));
        move_file(stitched, &image)?;

        let note = format!(
            "DECISION: {}\nREASON: {}\nACTION: {}{}\n\n{}\n\n{}\n",
            reply.parsed.decision,
            reply.parsed.reason,
            reply.resolved.decision,
            if reply.resolved.overridden { " (override)" } else { "" },
            reply.raw,
            reply.opener
        );
        let note_path = dir.join(format!("{}_decision.txt", stem));
        fs::write(&note_path, note).with_context(|| format!("writing {}", note_path.display()))?;
        Ok(image)
    }
}

fn is_fatal(e: &anyhow::Error) -> bool {
    matches!(
        e.downcast_ref::<Error>(),
        Some(Error::UnsupportedEnvironment(_) | Error::BoxOutsideDisplay { .. } | Error::MissingTarget { .. })
    )
}

fn file_safe(name: &str) -> String {
    let s: String = name
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    if s.is_empty() { "unknown".into() } else { s }
}

fn move_file(from: &Path, to: &Path) -> Result<()> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    fs::copy(from, to).with_context(|| format!("copying {} to {}", from.display(), to.display()))?;
    fs::remove_file(from).ok();
    Ok(())
}
