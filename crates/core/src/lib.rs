//! Automation core for a phone screen mirrored onto the desktop: find the
//! window, walk a profile with scrolls or page taps while taking screenshots,
//! and stitch them into one image for a classifier.

pub mod capture;
pub mod classifier;
pub mod decision;
pub mod error;
pub mod guard;
pub mod locator;
pub mod logger;
pub mod orchestrator;
pub mod platform;
pub mod profile;
pub mod session;
pub mod settings;
pub mod sleep;
pub mod stitch;
pub mod types;

pub use error::Error;
pub use types::{BoundingBox, CaptureSequence, CaptureStep, DisplaySize, Point, StepAction, StitchLayout};
