use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use mirrorscout_core::capture::{crop, save_png};
use mirrorscout_core::locator::WindowLocator;
use mirrorscout_core::settings::DetectionSettings;

/// Usage: locate-img <screen.png> [crop-out.png]
fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let Some(input) = args.next() else {
        bail!("usage: locate-img <screen.png> [crop-out.png]");
    };
    let out = args.next().map(PathBuf::from);

    let screen = image::open(&input).with_context(|| format!("opening {}", input))?.to_rgb8();
    println!("screen: {}x{}", screen.width(), screen.height());

    let locator = WindowLocator::new(DetectionSettings::default(), None);
    let found = locator.detect(&screen);
    let (x, y, w, h) = found.bbox.as_tuple();
    println!("source: {:?}", found.source);
    println!("window: x={} y={} w={} h={} ratio={:.3}", x, y, w, h, found.bbox.aspect_ratio());

    if let Some(out) = out {
        save_png(&crop(&screen, found.bbox)?, &out, None)?;
        println!("crop written to {}", out.display());
    }
    Ok(())
}
