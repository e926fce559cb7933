//! Window detection against screen captures. Each fixture is named
//! `<name>__<x>_<y>_<w>_<h>.png` with the expected window rectangle.
//! The directory comes from `MIRRORSCOUT_FIXTURES` (default `fixtures`).

use std::path::{Path, PathBuf};

use image::{Rgb, RgbImage};
use libtest_mimic::{Arguments, Failed, Trial};

use mirrorscout_core::locator::{LocateSource, WindowLocator};
use mirrorscout_core::settings::DetectionSettings;
use mirrorscout_core::BoundingBox;

const TOLERANCE: i32 = 6;

fn expected_from_name(path: &Path) -> Option<BoundingBox> {
    let stem = path.file_stem()?.to_str()?;
    let (_, rect) = stem.rsplit_once("__")?;
    let v: Vec<i32> = rect.split('_').map(|s| s.parse().ok()).collect::<Option<_>>()?;
    match v.as_slice() {
        [x, y, w, h] => BoundingBox::new(*x, *y, *w, *h).ok(),
        _ => None,
    }
}

fn close(a: BoundingBox, b: BoundingBox) -> bool {
    let (ax, ay, aw, ah) = a.as_tuple();
    let (bx, by, bw, bh) = b.as_tuple();
    [ax - bx, ay - by, aw - bw, ah - bh].iter().all(|d| d.abs() <= TOLERANCE)
}

fn check(screen: &RgbImage, want: BoundingBox) -> Result<(), Failed> {
    let locator = WindowLocator::new(DetectionSettings::default(), None);
    let got = locator.detect(screen);
    if got.source == LocateSource::Estimate {
        return Err(format!("no window found, estimate {}", got.bbox).into());
    }
    if !close(got.bbox, want) {
        return Err(format!("found {} via {:?}, want {}", got.bbox, got.source, want).into());
    }
    Ok(())
}

fn fixture_trials(dir: &Path) -> Vec<Trial> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut paths: Vec<PathBuf> = entries
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|e| e.eq_ignore_ascii_case("png")))
        .collect();
    paths.sort();

    paths
        .into_iter()
        .filter_map(|path| {
            let want = expected_from_name(&path)?;
            let name = path.file_stem()?.to_string_lossy().into_owned();
            Some(Trial::test(format!("fixture::{}", name), move || {
                let screen = image::open(&path).map_err(|e| format!("{}: {}", path.display(), e))?.to_rgb8();
                check(&screen, want)
            }))
        })
        .collect()
}

/// Dark desktop with a light-bordered phone window and a busy app area.
fn framed_screen(width: u32, height: u32, win: (u32, u32, u32, u32)) -> RgbImage {
    let (x, y, w, h) = win;
    let mut img = RgbImage::from_pixel(width, height, Rgb([30, 30, 36]));
    for py in y..y + h {
        for px in x..x + w {
            let edge = px < x + 8 || px >= x + w - 8 || py < y + 8 || py >= y + h - 8;
            let c = if edge { Rgb([250, 250, 250]) } else { Rgb([12, 12, 12]) };
            img.put_pixel(px, py, c);
        }
    }
    img
}

fn synthetic_trials() -> Vec<Trial> {
    let cases = [
        ("small_right", 1920, 1080, (1500, 200, 300, 620)),
        ("retina_left", 2560, 1440, (120, 160, 420, 880)),
    ];
    cases
        .into_iter()
        .map(|(name, w, h, win)| {
            Trial::test(format!("synthetic::{}", name), move || {
                let want = BoundingBox::new(win.0 as i32, win.1 as i32, win.2 as i32, win.3 as i32)
                    .map_err(|e| e.to_string())?;
                check(&framed_screen(w, h, win), want)
            })
        })
        .collect()
}

fn main() {
    let args = Arguments::from_args();
    let dir = std::env::var("MIRRORSCOUT_FIXTURES").unwrap_or_else(|_| "fixtures".into());

    let mut trials = synthetic_trials();
    trials.extend(fixture_trials(Path::new(&dir)));
    libtest_mimic::run(&args, trials).exit();
}
