use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;

/// Result of one admitted call, as far as the breaker is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
    Success,
    Failure,
    Timeout,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Counts {
    pub successes: u64,
    pub failures: u64,
    pub timeouts: u64,
    pub rejections: u64,
}

impl Counts {
    /// Calls that ran (rejections excluded).
    pub fn calls(&self) -> u64 {
        self.successes + self.failures + self.timeouts
    }

    pub fn errors(&self) -> u64 {
        self.failures + self.timeouts
    }

    /// Error percentage over the calls that ran, 0 when nothing ran.
    pub fn error_percentage(&self) -> f64 {
        let calls = self.calls();
        if calls == 0 {
            return 0.0;
        }
        self.errors() as f64 * 100.0 / calls as f64
    }

    fn add(&mut self, other: &Counts) {
        self.successes += other.successes;
        self.failures += other.failures;
        self.timeouts += other.timeouts;
        self.rejections += other.rejections;
    }
}

#[derive(Debug)]
struct Bucket {
    started: Instant,
    counts: Counts,
}

/// Time-bucketed call statistics over the last `window`.
#[derive(Debug)]
pub(crate) struct RollingWindow {
    window: Duration,
    bucket_width: Duration,
    buckets: VecDeque<Bucket>,
}

impl RollingWindow {
    pub fn new(window: Duration, bucket_width: Duration) -> Self {
        Self {
            window,
            bucket_width,
            buckets: VecDeque::new(),
        }
    }

    pub fn record(&mut self, now: Instant, outcome: Outcome) {
        let counts = self.current(now);
        match outcome {
            Outcome::Success => counts.successes += 1,
            Outcome::Failure => counts.failures += 1,
            Outcome::Timeout => counts.timeouts += 1,
        }
    }

    pub fn record_rejection(&mut self, now: Instant) {
        self.current(now).rejections += 1;
    }

    pub fn totals(&mut self, now: Instant) -> Counts {
        self.expire(now);
        let mut totals = Counts::default();
        for bucket in &self.buckets {
            totals.add(&bucket.counts);
        }
        totals
    }

    pub fn reset(&mut self) {
        self.buckets.clear();
    }

    fn current(&mut self, now: Instant) -> &mut Counts {
        self.expire(now);

        let needs_bucket = match self.buckets.back() {
            Some(last) => now.duration_since(last.started) >= self.bucket_width,
            None => true,
        };
        if needs_bucket {
            self.buckets.push_back(Bucket {
                started: now,
                counts: Counts::default(),
            });
        }

        // A bucket was pushed above if none existed
        let last = self.buckets.len() - 1;
        &mut self.buckets[last].counts
    }

    fn expire(&mut self, now: Instant) {
        while let Some(first) = self.buckets.front() {
            if now.duration_since(first.started) >= self.window {
                self.buckets.pop_front();
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window() -> RollingWindow {
        RollingWindow::new(Duration::from_secs(10), Duration::from_secs(1))
    }

    #[test]
    fn test_counts_accumulate_across_buckets() {
        let mut window = window();
        let start = Instant::now();

        window.record(start, Outcome::Success);
        window.record(start + Duration::from_millis(1500), Outcome::Failure);
        window.record(start + Duration::from_secs(3), Outcome::Timeout);
        window.record_rejection(start + Duration::from_secs(4));

        let totals = window.totals(start + Duration::from_secs(5));
        assert_eq!(totals.calls(), 3);
        assert_eq!(totals.errors(), 2);
        assert_eq!(totals.rejections, 1);
        assert_eq!(window.buckets.len(), 4);
    }

    #[test]
    fn test_old_buckets_expire() {
        let mut window = window();
        let start = Instant::now();

        window.record(start, Outcome::Failure);
        window.record(start + Duration::from_secs(6), Outcome::Success);

        let totals = window.totals(start + Duration::from_secs(11));
        assert_eq!(totals.failures, 0);
        assert_eq!(totals.successes, 1);
    }

    #[test]
    fn test_error_percentage() {
        let counts = Counts {
            successes: 3,
            failures: 1,
            timeouts: 0,
            rejections: 5,
        };
        assert_eq!(counts.error_percentage(), 25.0);
        assert_eq!(Counts::default().error_percentage(), 0.0);
    }
}
