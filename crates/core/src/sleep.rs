use std::ops::Range;
use std::thread;
use std::time::Duration;

use rand::{Rng, RngCore};

/// Blocking pause used between UI actions. The only synchronization with the
/// mirrored app is waiting long enough for it to settle.
pub trait Sleeper {
    fn sleep(&mut self, d: Duration);
}

/// Real wall-clock sleeps.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&mut self, d: Duration) {
        thread::sleep(d);
    }
}

/// Returns immediately and remembers every requested pause.
#[derive(Debug, Default, Clone)]
pub struct RecordingSleeper {
    pub slept: Vec<Duration>,
}

impl RecordingSleeper {
    pub fn total(&self) -> Duration {
        self.slept.iter().sum()
    }

    pub fn count(&self, d: Duration) -> usize {
        self.slept.iter().filter(|s| **s == d).count()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&mut self, d: Duration) {
        self.slept.push(d);
    }
}

/// Duration of `secs` seconds. Negative values clamp to zero.
pub fn secs(secs: f64) -> Duration {
    Duration::from_secs_f64(secs.max(0.0))
}

/// `secs` with +/-30% random jitter, never below 10ms.
pub fn jitter(secs: f64, rng: &mut dyn RngCore) -> Duration {
    let spread = secs.abs() * 0.3;
    let actual = if spread > 0.0 {
        secs + rng.gen_range(-spread..spread)
    } else {
        secs
    };
    Duration::from_secs_f64(actual.max(0.01))
}

/// Uniform pick inside `range` seconds. An empty range yields its start.
pub fn uniform(range: &Range<f64>, rng: &mut dyn RngCore) -> Duration {
    if range.end > range.start {
        self::secs(rng.gen_range(range.clone()))
    } else {
        self::secs(range.start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn jitter_stays_in_band() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            let d = jitter(2.0, &mut rng).as_secs_f64();
            assert!((1.4..=2.6).contains(&d), "{}", d);
        }
    }

    #[test]
    fn uniform_respects_bounds() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..100 {
            let d = uniform(&(0.5..1.5), &mut rng).as_secs_f64();
            assert!((0.5..1.5).contains(&d));
        }
        assert_eq!(uniform(&(1.0..1.0), &mut rng), Duration::from_secs(1));
    }

    #[test]
    fn recording_sleeper_counts() {
        let mut s = RecordingSleeper::default();
        s.sleep(secs(0.1));
        s.sleep(secs(0.1));
        s.sleep(secs(2.0));
        assert_eq!(s.count(secs(0.1)), 2);
        assert_eq!(s.total(), secs(2.2));
    }
}
