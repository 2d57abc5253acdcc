use once_cell::sync::Lazy;
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide lock counters, aggregated over every mutex.
#[derive(Default)]
pub struct Metrics {
    pub acquisitions: AtomicU64,
    pub contended: AtomicU64,
    pub waits: AtomicU64,
    pub timeouts: AtomicU64,
    pub interrupted: AtomicU64,
    pub releases: AtomicU64,
    pub double_releases: AtomicU64,
    pub woken: AtomicU64,
}

pub static METRICS: Lazy<&'static Metrics> = Lazy::new(|| Box::leak(Box::new(Metrics::default())));

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub acquisitions: u64,
    pub contended: u64,
    pub waits: u64,
    pub timeouts: u64,
    pub interrupted: u64,
    pub releases: u64,
    pub double_releases: u64,
    pub woken: u64,
}

impl Metrics {
    #[inline]
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            acquisitions: self.acquisitions.load(Ordering::Relaxed),
            contended: self.contended.load(Ordering::Relaxed),
            waits: self.waits.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            interrupted: self.interrupted.load(Ordering::Relaxed),
            releases: self.releases.load(Ordering::Relaxed),
            double_releases: self.double_releases.load(Ordering::Relaxed),
            woken: self.woken.load(Ordering::Relaxed),
        }
    }

    pub fn render_text(&self) -> String {
        let s = self.snapshot();
        let g = |name: &str, help: &str, val: u64| -> String {
            format!("# HELP {0} {1}\n# TYPE {0} counter\n{0} {2}\n", name, help, val)
        };
        let mut out = String::with_capacity(1024);
        out.push_str(&g("wordlock_acquisitions_total", "Successful acquisitions", s.acquisitions));
        out.push_str(&g("wordlock_contended_total", "Acquisitions that found the word locked", s.contended));
        out.push_str(&g("wordlock_waits_total", "Calls into the wait primitive", s.waits));
        out.push_str(&g("wordlock_timeouts_total", "Acquisitions that timed out", s.timeouts));
        out.push_str(&g("wordlock_interrupted_total", "Waits that reported interruption", s.interrupted));
        out.push_str(&g("wordlock_releases_total", "Locked to unlocked transitions", s.releases));
        out.push_str(&g("wordlock_double_releases_total", "Handle releases absorbed as no-ops", s.double_releases));
        out.push_str(&g("wordlock_woken_total", "Waiters woken by notify", s.woken));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_lists_every_counter() {
        let text = METRICS.render_text();
        for name in [
            "wordlock_acquisitions_total",
            "wordlock_timeouts_total",
            "wordlock_double_releases_total",
            "wordlock_woken_total",
        ] {
            assert!(text.contains(name), "{name}");
        }
    }

    #[test]
    fn counters_are_monotonic() {
        let before = METRICS.snapshot();
        Metrics::bump(&METRICS.waits);
        assert!(METRICS.snapshot().waits > before.waits);
    }
}
