use std::collections::BTreeMap;

use log::info;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::types::{BoundingBox, Point, StitchLayout};

pub const TARGET_NEXT_PAGE: &str = "next-page";
pub const TARGET_LIKE: &str = "like";
pub const TARGET_PASS: &str = "pass";

/// How a profile is advanced between screenshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Scroll the profile down in fixed increments.
    Scroll,
    /// Click a "next" target to flip through photos.
    Paging,
}

/// Everything needed to drive one mirrored-window layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentProfile {
    pub name: String,
    /// Static window rectangle. `None` means visual detection.
    #[serde(default)]
    pub bbox: Option<BoundingBox>,
    #[serde(default)]
    pub targets: BTreeMap<String, Point>,
    pub strategy: Strategy,
    /// Number of paging actions for the paging strategy.
    #[serde(default)]
    pub pages: usize,
    #[serde(default)]
    pub layout: Option<StitchLayout>,
}

impl EnvironmentProfile {
    pub fn target(&self, name: &str) -> Result<Point, Error> {
        self.targets.get(name).copied().ok_or_else(|| Error::MissingTarget {
            profile: self.name.clone(),
            target: name.to_string(),
        })
    }

    pub fn has_target(&self, name: &str) -> bool {
        self.targets.contains_key(name)
    }

    /// Paging actions for one profile: fixed for paging layouts, `scrolls` otherwise.
    pub fn step_count(&self, scrolls: usize) -> usize {
        match self.strategy {
            Strategy::Paging => self.pages,
            Strategy::Scroll => scrolls,
        }
    }

    pub fn is_visual(&self) -> bool {
        self.bbox.is_none()
    }
}

fn fixed(name: &str, x_begin: i32, y_begin: i32, x_end: i32, y_end: i32, strategy: Strategy) -> EnvironmentProfile {
    EnvironmentProfile {
        name: name.into(),
        bbox: BoundingBox::new(x_begin, y_begin, x_end - x_begin, y_end - y_begin).ok(),
        targets: BTreeMap::new(),
        strategy,
        pages: 0,
        layout: None,
    }
}

/// Layouts measured on the machines the tool was calibrated on.
pub fn builtin_profiles() -> Vec<EnvironmentProfile> {
    let monitor = fixed("monitor", 2304, 617, 2500, 1042, Strategy::Scroll);
    let pro = fixed("pro", 935, 330, 1139, 739, Strategy::Scroll);

    let mut air = fixed("air", 815, 260, 1018, 575, Strategy::Paging);
    air.pages = 3;
    air.layout = StitchLayout::new(2, 2).ok();
    air.targets.insert(TARGET_NEXT_PAGE.into(), Point::new(974, 410));
    air.targets.insert(TARGET_LIKE.into(), Point::new(955, 580));
    air.targets.insert(TARGET_PASS.into(), Point::new(880, 580));

    let visual = EnvironmentProfile {
        name: "visual".into(),
        bbox: None,
        targets: BTreeMap::new(),
        strategy: Strategy::Scroll,
        pages: 0,
        layout: None,
    };

    vec![monitor, pro, air, visual]
}

/// Named environments known to this process. Built once at start.
#[derive(Debug, Clone)]
pub struct ProfileSet {
    profiles: Vec<EnvironmentProfile>,
}

impl ProfileSet {
    /// Built-ins with `overrides` replacing same-named entries (case-insensitive).
    pub fn new(overrides: &[EnvironmentProfile]) -> Self {
        let mut profiles = builtin_profiles();
        for o in overrides {
            match profiles.iter_mut().find(|p| p.name.eq_ignore_ascii_case(&o.name)) {
                Some(p) => *p = o.clone(),
                None => profiles.push(o.clone()),
            }
        }
        Self { profiles }
    }

    pub fn names(&self) -> Vec<&str> {
        self.profiles.iter().map(|p| p.name.as_str()).collect()
    }

    /// Look up an environment. Unknown names are a hard error.
    pub fn select(&self, name: &str) -> Result<&EnvironmentProfile, Error> {
        let name = name.trim();
        let profile = self
            .profiles
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| Error::UnsupportedEnvironment(name.to_string()))?;
        match profile.bbox {
            Some(b) => info!("environment {}: fixed window {}", profile.name, b),
            None => info!("environment {}: visual window detection", profile.name),
        }
        Ok(profile)
    }
}

impl Default for ProfileSet {
    fn default() -> Self {
        Self::new(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_are_selectable_case_insensitively() {
        let set = ProfileSet::default();
        let m = set.select("MONITOR").unwrap();
        assert_eq!(m.bbox.unwrap().as_tuple(), (2304, 617, 196, 425));
        assert_eq!(set.select("Air").unwrap().strategy, Strategy::Paging);
        assert!(set.select("visual").unwrap().is_visual());
    }

    #[test]
    fn unknown_environment_fails_fast() {
        let set = ProfileSet::default();
        assert_eq!(
            set.select("MAC").unwrap_err(),
            Error::UnsupportedEnvironment("MAC".into())
        );
    }

    #[test]
    fn overrides_replace_and_extend() {
        let custom: EnvironmentProfile = serde_json::from_str(
            r#"{"name":"desk","bbox":[10,20,200,400],"strategy":"scroll"}"#,
        )
        .unwrap();
        let mut pro = builtin_profiles().remove(1);
        pro.bbox = BoundingBox::new(0, 0, 100, 200).ok();
        let set = ProfileSet::new(&[custom, pro]);
        assert_eq!(set.select("desk").unwrap().bbox.unwrap().as_tuple(), (10, 20, 200, 400));
        assert_eq!(set.select("pro").unwrap().bbox.unwrap().as_tuple(), (0, 0, 100, 200));
        assert_eq!(set.names().len(), 5);
    }

    #[test]
    fn step_count_follows_strategy() {
        let set = ProfileSet::default();
        assert_eq!(set.select("air").unwrap().step_count(5), 3);
        assert_eq!(set.select("pro").unwrap().step_count(5), 5);
    }

    #[test]
    fn missing_target_is_reported() {
        let set = ProfileSet::default();
        let err = set.select("monitor").unwrap().target(TARGET_NEXT_PAGE).unwrap_err();
        assert!(matches!(err, Error::MissingTarget { .. }));
        assert_eq!(set.select("air").unwrap().target(TARGET_LIKE).unwrap(), Point::new(955, 580));
    }
}
