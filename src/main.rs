use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use log::info;

use mirrorscout_core::classifier::{Classifier, CommandClassifier};
use mirrorscout_core::orchestrator::Controls;
use mirrorscout_core::platform::create_desktop;
use mirrorscout_core::profile::ProfileSet;
use mirrorscout_core::session::{Limits, Session};
use mirrorscout_core::settings::Settings;
use mirrorscout_core::sleep::ThreadSleeper;
use mirrorscout_core::logger;

#[derive(Parser, Debug)]
#[command(author, version, about = "Walks profiles in a mirrored phone window and judges them")]
struct Args {
    /// Environment name (monitor, pro, air, visual or one from the config)
    #[arg(short, long)]
    env: Option<String>,

    /// Scrolls per profile
    #[arg(short = 'n', long)]
    steps: Option<usize>,

    /// Stop starting new profiles after this many minutes
    #[arg(short, long)]
    minutes: Option<f64>,

    #[arg(long)]
    max_profiles: Option<usize>,

    #[arg(short, long, default_value = "settings.json")]
    config: PathBuf,

    /// Program called as `<program> profile|opener|ad <image>`
    #[arg(long)]
    classifier: Option<PathBuf>,

    #[arg(long)]
    keep_screenshots: bool,

    /// Use the in-memory desktop instead of the real one
    #[arg(long)]
    stub: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut settings = Settings::load(&args.config)?;
    settings.apply_env();
    if let Some(env) = args.env {
        settings.environment = env;
    }
    if let Some(n) = args.steps {
        settings.num_scrolls = n;
    }
    if args.minutes.is_some() {
        settings.session_minutes = args.minutes;
    }
    if args.keep_screenshots {
        settings.keep_screenshots = true;
    }

    logger::init(&settings.log_dir, logger::parse_level(&settings.log_level), true);

    let profiles = ProfileSet::new(&settings.profiles);
    info!("known environments: {}", profiles.names().join(", "));
    let profile = profiles.select(&settings.environment)?.clone();

    let mut desktop = create_desktop(args.stub);
    let mut sleeper = ThreadSleeper;
    let mut rng = rand::thread_rng();
    let session = Session::new(&settings, profile, desktop.display_size());

    let mut classifier: Option<Box<dyn Classifier>> =
        args.classifier.map(|p| Box::new(CommandClassifier::new(p)) as Box<dyn Classifier>);
    if classifier.is_none() {
        info!("no classifier configured, profiles will only be captured");
    }

    let limits = Limits {
        max_profiles: args.max_profiles,
        duration: settings.session_minutes.filter(|m| *m > 0.0).map(|m| Duration::from_secs_f64(m * 60.0)),
    };

    let mut controls = Controls { desktop: desktop.as_mut(), sleeper: &mut sleeper, rng: &mut rng };
    let report = session.run(&mut controls, classifier.as_deref_mut(), limits)?;

    println!(
        "processed {} profile(s): {} liked, {} passed, {} ads, {} failed",
        report.processed, report.liked, report.passed, report.ads, report.failed
    );
    Ok(())
}
