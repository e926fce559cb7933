use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::{bail, Context, Result};
use log::debug;

/// Judges captured images. Replies are raw text; `decision` turns them
/// into actions.
pub trait Classifier {
    /// Reply to a stitched profile, `DECISION: ...` / `REASON: ...`.
    fn classify_profile(&mut self, composite: &Path) -> Result<String>;
    /// Opener for a stitched profile; carries a `Name: ...` line.
    fn describe_profile(&mut self, composite: &Path) -> Result<String>;
    /// `YES` when the screenshot shows an ad card.
    fn check_ad(&mut self, screenshot: &Path) -> Result<String>;
}

/// Runs `<program> [args..] <mode> <image>` and returns its stdout.
/// `mode` is `profile`, `opener` or `ad`.
#[derive(Debug, Clone)]
pub struct CommandClassifier {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandClassifier {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self { program: program.into(), args: Vec::new() }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    fn run(&self, mode: &str, image: &Path) -> Result<String> {
        debug!("running {} {} {}", self.program.display(), mode, image.display());
        let out = Command::new(&self.program)
            .args(&self.args)
            .arg(mode)
            .arg(image)
            .stdin(Stdio::null())
            .output()
            .with_context(|| format!("starting classifier {}", self.program.display()))?;
        if !out.status.success() {
            bail!(
                "classifier {} failed ({}): {}",
                self.program.display(),
                out.status,
                String::from_utf8_lossy(&out.stderr).trim()
            );
        }
        Ok(String::from_utf8_lossy(&out.stdout).trim().to_string())
    }
}

impl Classifier for CommandClassifier {
    fn classify_profile(&mut self, composite: &Path) -> Result<String> {
        self.run("profile", composite)
    }

    fn describe_profile(&mut self, composite: &Path) -> Result<String> {
        self.run("opener", composite)
    }

    fn check_ad(&mut self, screenshot: &Path) -> Result<String> {
        self.run("ad", screenshot)
    }
}
