use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::profile::EnvironmentProfile;

/// Delays and scroll magnitudes of a capture sequence. Seconds unless noted.
/// Negative scroll amounts move content down.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timing {
    pub settle_delay: f64,
    pub pre_capture_delay: f64,
    pub focus_delay: f64,
    pub scroll_delay: f64,
    pub step_delay: f64,
    pub steps_per_scroll: u32,
    pub first_scroll: i32,
    pub subsequent_scroll: i32,
    pub scroll_up: i32,
    pub finish_pause: f64,
    pub scroll_up_pause: f64,
    pub page_delay: (f64, f64),
    pub action_delay: (f64, f64),
    pub after_action_delay: f64,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            settle_delay: 1.0,
            pre_capture_delay: 0.2,
            focus_delay: 0.1,
            scroll_delay: 0.2,
            step_delay: 0.01,
            steps_per_scroll: 10,
            first_scroll: -520,
            subsequent_scroll: -720,
            scroll_up: 600,
            finish_pause: 2.0,
            scroll_up_pause: 0.5,
            page_delay: (0.5, 1.5),
            action_delay: (1.0, 2.0),
            after_action_delay: 0.5,
        }
    }
}

/// Empirically tuned thresholds for the visual window search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionSettings {
    /// Gray level above which a pixel counts as part of a light border.
    pub border_threshold: u8,
    /// Gray level for the content-area fallback.
    pub content_threshold: u8,
    pub min_vertices: usize,
    pub max_vertices: usize,
    pub border_min_height: i32,
    pub content_min_height: i32,
    pub min_aspect: f64,
    pub max_aspect: f64,
    /// Device width:height used for the estimate fallback.
    pub target_aspect: (f64, f64),
    pub edge_strip: i32,
    pub edge_brightness: f64,
    pub min_bright_edges: usize,
    pub content_candidates: usize,
    /// Extra width added on the left of the audit crop, as a fraction of the box width.
    pub audit_margin: f64,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            border_threshold: 240,
            content_threshold: 200,
            min_vertices: 4,
            max_vertices: 8,
            border_min_height: 200,
            content_min_height: 300,
            min_aspect: 0.3,
            max_aspect: 0.6,
            target_aspect: (9.0, 19.5),
            edge_strip: 5,
            edge_brightness: 230.0,
            min_bright_edges: 3,
            content_candidates: 5,
            audit_margin: 0.10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub environment: String,
    pub screenshot_dir: PathBuf,
    pub log_dir: PathBuf,
    pub log_level: String,
    pub num_scrolls: usize,
    pub keep_screenshots: bool,
    pub check_ads: bool,
    pub like_keep_probability: f64,
    pub session_minutes: Option<f64>,
    pub pause_between_profiles: f64,
    pub pointer_margin: i32,
    pub dpi: u32,
    pub timing: Timing,
    pub detection: DetectionSettings,
    /// Extra or replacement environments, merged over the built-in ones.
    pub profiles: Vec<EnvironmentProfile>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            environment: "monitor".into(),
            screenshot_dir: PathBuf::from("screenshots"),
            log_dir: PathBuf::from("logs"),
            log_level: "info".into(),
            num_scrolls: 5,
            keep_screenshots: false,
            check_ads: false,
            like_keep_probability: 0.95,
            session_minutes: None,
            pause_between_profiles: 2.5,
            pointer_margin: crate::guard::DEFAULT_MARGIN,
            dpi: 300,
            timing: Timing::default(),
            detection: DetectionSettings::default(),
            profiles: Vec::new(),
        }
    }
}

impl Settings {
    /// Read settings from a JSON file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = match std::fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e).with_context(|| format!("reading {}", path.display())),
        };
        serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))
    }

    /// Apply `ENVIRONMENT`, `SCREENSHOT_DIR`, `NUM_SCROLLS` and `LOG_LEVEL`.
    pub fn apply_env(&mut self) {
        self.apply_vars(|k| std::env::var(k).ok());
    }

    fn apply_vars(&mut self, get: impl Fn(&str) -> Option<String>) {
        if let Some(v) = get("ENVIRONMENT") {
            self.environment = v;
        }
        if let Some(v) = get("SCREENSHOT_DIR") {
            self.screenshot_dir = PathBuf::from(v);
        }
        if let Some(n) = get("NUM_SCROLLS").and_then(|v| v.trim().parse().ok()) {
            self.num_scrolls = n;
        }
        if let Some(v) = get("LOG_LEVEL") {
            self.log_level = v;
        }
    }

    pub fn stitched_dir(&self) -> PathBuf {
        self.screenshot_dir.join("stitched")
    }

    pub fn audit_dir(&self) -> PathBuf {
        self.screenshot_dir.join("windows")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let s = Settings::load(&dir.path().join("nope.json")).unwrap();
        assert_eq!(s, Settings::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"environment":"air","timing":{"scroll_delay":0.4}}"#).unwrap();
        let s = Settings::load(&path).unwrap();
        assert_eq!(s.environment, "air");
        assert_eq!(s.timing.scroll_delay, 0.4);
        assert_eq!(s.timing.first_scroll, -520);
        assert_eq!(s.num_scrolls, 5);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(Settings::load(&path).is_err());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let mut s = Settings::default();
        s.keep_screenshots = true;
        s.save(&path).unwrap();
        assert_eq!(Settings::load(&path).unwrap(), s);
    }

    #[test]
    fn env_overrides() {
        let vars: HashMap<&str, &str> = [("ENVIRONMENT", "visual"), ("NUM_SCROLLS", "3"), ("LOG_LEVEL", "debug")]
            .into_iter()
            .collect();
        let mut s = Settings::default();
        s.apply_vars(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(s.environment, "visual");
        assert_eq!(s.num_scrolls, 3);
        assert_eq!(s.log_level, "debug");
        assert_eq!(s.screenshot_dir, PathBuf::from("screenshots"));
    }
}
