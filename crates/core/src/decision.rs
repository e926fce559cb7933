use std::fmt;
use std::sync::OnceLock;

use log::{info, warn};
use rand::{Rng, RngCore};
use regex::Regex;

pub const NO_REASON: &str = "(No reason provided by AI)";
pub const UNPARSEABLE_REASON: &str = "AI response unparseable or refusal; defaulting to LIKE.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Like the profile.
    Positive,
    /// Pass on it.
    Negative,
    Unknown,
}

impl Decision {
    fn from_token(token: &str) -> Option<Self> {
        match token {
            "LIKE" => Some(Decision::Positive),
            "PASS" => Some(Decision::Negative),
            _ => None,
        }
    }

    pub fn token(&self) -> &'static str {
        match self {
            Decision::Positive => "LIKE",
            Decision::Negative => "PASS",
            Decision::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Classifier reply reduced to a decision. `fallback` is set when the
/// reply could not be read and `decision` is the fixed default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedDecision {
    pub decision: Decision,
    pub reason: String,
    pub fallback: bool,
}

impl ParsedDecision {
    fn parsed(decision: Decision, reason: impl Into<String>) -> Self {
        Self { decision, reason: reason.into(), fallback: false }
    }

    fn default_like() -> Self {
        Self::missing(UNPARSEABLE_REASON)
    }

    /// No usable reply, e.g. the classifier failed to run. Takes the same
    /// default as an unreadable reply.
    pub fn missing(reason: impl Into<String>) -> Self {
        Self { decision: Decision::Positive, reason: reason.into(), fallback: true }
    }
}

/// `LIKE`, `PASS`, or `DECISION: <token>` (already uppercased).
fn decision_line(line: &str) -> Option<Decision> {
    let token = line.strip_prefix("DECISION:").map(str::trim).unwrap_or(line);
    Decision::from_token(token)
}

/// Strip a case-insensitive `REASON:` label.
fn reason_label(line: &str) -> Option<&str> {
    let head = line.get(..7)?;
    head.eq_ignore_ascii_case("REASON:").then(|| line[7..].trim())
}

/// Read a `DECISION: ...` / `REASON: ...` reply, or a bare `LIKE`/`PASS`.
/// Never fails: unreadable replies become `Positive` with `fallback` set.
pub fn parse(raw: &str) -> ParsedDecision {
    let lines: Vec<&str> = raw.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    let parsed = match lines.as_slice() {
        [] => None,
        [only] => decision_line(&only.to_uppercase()).map(|d| ParsedDecision::parsed(d, NO_REASON)),
        [first, second, ..] => decision_line(&first.to_uppercase()).map(|d| {
            let reason = reason_label(second).unwrap_or(*second);
            ParsedDecision::parsed(d, reason)
        }),
    };
    match parsed {
        Some(p) => {
            info!("parsed decision {}: {}", p.decision, p.reason);
            p
        }
        None => {
            warn!("unparseable classifier reply, defaulting to LIKE:\n{}", raw);
            ParsedDecision::default_like()
        }
    }
}

/// `YES` means the card is an ad. Anything unclear counts as not an ad.
pub fn parse_ad_check(raw: &str) -> ParsedDecision {
    match raw.trim().to_uppercase().as_str() {
        "YES" => ParsedDecision::parsed(Decision::Positive, "ad"),
        "NO" => ParsedDecision::parsed(Decision::Negative, "not an ad"),
        other => {
            warn!("unexpected ad check reply '{}', assuming no ad", other);
            ParsedDecision { decision: Decision::Negative, reason: "unclear ad check reply".into(), fallback: true }
        }
    }
}

/// Action to take after the random override.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolved {
    pub decision: Decision,
    pub overridden: bool,
}

/// Turn a parsed decision into like or pass. A like is kept with
/// `keep_probability`; unknown decisions pass.
pub fn resolve(parsed: &ParsedDecision, keep_probability: f64, rng: &mut dyn RngCore) -> Resolved {
    match parsed.decision {
        Decision::Positive => {
            let roll: f64 = rng.gen();
            if roll < keep_probability {
                Resolved { decision: Decision::Positive, overridden: false }
            } else {
                info!("overriding LIKE to PASS (roll {:.2})", roll);
                Resolved { decision: Decision::Negative, overridden: true }
            }
        }
        Decision::Negative => Resolved { decision: Decision::Negative, overridden: false },
        Decision::Unknown => {
            warn!("no usable decision, passing");
            Resolved { decision: Decision::Negative, overridden: false }
        }
    }
}

/// Name from a `Name: ...` line of an opener reply, or `"unknown"`.
pub fn extract_name(raw: &str) -> String {
    static NAME: OnceLock<Option<Regex>> = OnceLock::new();
    NAME.get_or_init(|| Regex::new(r"Name: (.+)").ok())
        .as_ref()
        .and_then(|re| re.captures(raw).map(|c| c[1].trim().to_string()))
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}
