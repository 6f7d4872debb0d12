//! Request pacing shared by every outbound catalog call.
//!
//! One [`RateLimiter`] is built per process and handed to each component
//! that talks to the catalog as an `Arc`. Three limits hold together:
//!
//! - no two grants closer than `min_interval`;
//! - grants spaced `avg_interval` apart while requests keep coming;
//! - at most `window_capacity` grants inside any `window_duration` span.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::config::RateLimitConfig;

/// Longest interval or window honoured. Larger values are clamped so that
/// instant arithmetic cannot overflow.
const MAX_SPAN: Duration = Duration::from_secs(60 * 60 * 24 * 365);

/// Mutable pacing state, guarded by the limiter's mutex.
#[derive(Debug, Default)]
struct RateBudget {
    /// Earliest instant the next grant may be issued.
    next_allowed: Option<Instant>,
    /// Grants still inside the window, oldest first.
    window: VecDeque<Instant>,
}

impl RateBudget {
    /// Forget grants that have aged out of the window.
    fn expire(&mut self, now: Instant, window_duration: Duration) {
        while let Some(&oldest) = self.window.front() {
            if now.duration_since(oldest) >= window_duration {
                self.window.pop_front();
            } else {
                break;
            }
        }
    }
}

/// Async rate limiter with minimum, average, and per-window limits.
///
/// Callers are served one at a time in arrival order: the budget mutex is
/// held while a caller waits for its slot, so every grant gets its own
/// distinct instant. Dropping a pending [`tick`](Self::tick) consumes nothing.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    avg_interval: Duration,
    window_capacity: usize,
    window_duration: Duration,
    budget: Mutex<RateBudget>,
    total_grants: AtomicU64,
    delayed_grants: AtomicU64,
}

impl RateLimiter {
    /// `window_capacity` of zero is treated as one. Durations above a year
    /// are clamped to a year.
    pub fn new(
        min_interval: Duration,
        avg_interval: Duration,
        window_capacity: u32,
        window_duration: Duration,
    ) -> Self {
        Self {
            min_interval: min_interval.min(MAX_SPAN),
            avg_interval: avg_interval.min(MAX_SPAN),
            window_capacity: window_capacity.max(1) as usize,
            window_duration: window_duration.min(MAX_SPAN),
            budget: Mutex::new(RateBudget::default()),
            total_grants: AtomicU64::new(0),
            delayed_grants: AtomicU64::new(0),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(
            config.min_interval(),
            config.avg_interval(),
            config.window_capacity,
            config.window_duration(),
        )
    }

    /// AniList pacing: 60 requests a minute, one a second, never under 500ms.
    pub fn anilist() -> Self {
        Self::new(
            Duration::from_millis(500),
            Duration::from_secs(1),
            60,
            Duration::from_secs(60),
        )
    }

    /// Wait until the next request may be sent, then claim that slot.
    pub async fn tick(&self) {
        let mut budget = self.budget.lock().await;
        let mut waited = false;

        loop {
            let now = Instant::now();
            budget.expire(now, self.window_duration);

            let mut grant_at = budget.next_allowed.map_or(now, |next| next.max(now));
            if budget.window.len() >= self.window_capacity {
                if let Some(&oldest) = budget.window.front() {
                    grant_at = grant_at.max(oldest + self.window_duration);
                }
            }

            if grant_at > now {
                waited = true;
                tracing::trace!(wait_ms = (grant_at - now).as_millis() as u64, "Rate limit wait");
                tokio::time::sleep_until(grant_at).await;
                // Re-check: the window may not have rolled over yet.
                continue;
            }

            budget.next_allowed = Some(now + self.step());
            budget.window.push_back(now);
            break;
        }

        self.total_grants.fetch_add(1, Ordering::Relaxed);
        if waited {
            self.delayed_grants.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Spacing after each grant: the target average, never below the minimum.
    fn step(&self) -> Duration {
        self.avg_interval.max(self.min_interval)
    }

    /// Current counters.
    pub async fn stats(&self) -> RateLimitStats {
        let mut budget = self.budget.lock().await;
        budget.expire(Instant::now(), self.window_duration);
        RateLimitStats {
            total_grants: self.total_grants.load(Ordering::Relaxed),
            delayed_grants: self.delayed_grants.load(Ordering::Relaxed),
            window_grants: budget.window.len() as u64,
        }
    }
}

/// Counters exposed for observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitStats {
    pub total_grants: u64,
    /// Grants that had to wait for a slot.
    pub delayed_grants: u64,
    /// Grants inside the current window.
    pub window_grants: u64,
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    async fn grant_times(limiter: &RateLimiter, n: usize) -> Vec<Instant> {
        let mut times = Vec::with_capacity(n);
        for _ in 0..n {
            limiter.tick().await;
            times.push(Instant::now());
        }
        times
    }

    fn assert_limits(times: &[Instant], min: Duration, capacity: usize, window: Duration) {
        for pair in times.windows(2) {
            assert!(pair[1] - pair[0] >= min, "gap {:?} < {min:?}", pair[1] - pair[0]);
        }
        for (i, &start) in times.iter().enumerate() {
            if let Some(&later) = times.get(i + capacity) {
                assert!(later - start >= window, "more than {capacity} grants in {window:?}");
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn first_tick_is_immediate() {
        let limiter = RateLimiter::anilist();
        let start = Instant::now();
        limiter.tick().await;
        assert_eq!(Instant::now(), start);
    }

    #[tokio::test(start_paused = true)]
    async fn anilist_preset_ninety_ticks() {
        let limiter = RateLimiter::anilist();
        let start = Instant::now();
        let times = grant_times(&limiter, 90).await;

        assert!(Instant::now() - start >= Duration::from_secs(89));
        assert_limits(&times, Duration::from_millis(500), 60, Duration::from_secs(60));
        // The 61st grant waits for the first one to leave the window.
        assert!(times[60] - times[0] >= Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn window_cap_defers_burst() {
        let window = Duration::from_secs(1);
        let limiter = RateLimiter::new(
            Duration::from_millis(10),
            Duration::from_millis(10),
            3,
            window,
        );
        let times = grant_times(&limiter, 7).await;

        assert_limits(&times, Duration::from_millis(10), 3, window);
        assert!(times[3] - times[0] >= window);
        assert!(times[3] - times[2] > Duration::from_millis(900));
        assert!(times[6] - times[3] >= window);
    }

    #[tokio::test(start_paused = true)]
    async fn min_interval_wins_over_smaller_average() {
        let limiter = RateLimiter::new(
            Duration::from_secs(2),
            Duration::from_secs(1),
            100,
            Duration::from_secs(60),
        );
        let times = grant_times(&limiter, 5).await;
        assert_limits(&times, Duration::from_secs(2), 100, Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn idle_limiter_grants_without_waiting() {
        let limiter = RateLimiter::anilist();
        limiter.tick().await;
        tokio::time::sleep(Duration::from_secs(5)).await;

        let before = Instant::now();
        limiter.tick().await;
        assert_eq!(Instant::now(), before);

        let stats = limiter.stats().await;
        assert_eq!(stats.total_grants, 2);
        assert_eq!(stats.delayed_grants, 0);
        assert_eq!(stats.window_grants, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_callers_get_distinct_slots() {
        let limiter = Arc::new(RateLimiter::anilist());
        let times = Arc::new(std::sync::Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let limiter = Arc::clone(&limiter);
            let times = Arc::clone(&times);
            handles.push(tokio::spawn(async move {
                limiter.tick().await;
                times.lock().unwrap().push(Instant::now());
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let mut times = times.lock().unwrap().clone();
        times.sort();
        assert_eq!(times.len(), 8);
        assert_limits(&times, Duration::from_millis(500), 60, Duration::from_secs(60));

        let stats = limiter.stats().await;
        assert_eq!(stats.total_grants, 8);
        assert_eq!(stats.delayed_grants, 7);
    }

    #[tokio::test(start_paused = true)]
    async fn callers_are_granted_in_arrival_order() {
        let limiter = Arc::new(RateLimiter::anilist());
        let grants = Arc::new(std::sync::Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for caller in 0..6usize {
            let limiter = Arc::clone(&limiter);
            let grants = Arc::clone(&grants);
            handles.push(tokio::spawn(async move {
                limiter.tick().await;
                grants.lock().unwrap().push((caller, Instant::now()));
            }));
            // Caller `n` is queued on the limiter before caller `n + 1` starts.
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let grants = grants.lock().unwrap().clone();
        let callers: Vec<usize> = grants.iter().map(|&(caller, _)| caller).collect();
        assert_eq!(callers, (0..6).collect::<Vec<_>>());
        for pair in grants.windows(2) {
            assert!(pair[1].1 - pair[0].1 >= Duration::from_millis(500));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn huge_durations_are_clamped() {
        let config = RateLimitConfig {
            min_interval_ms: u64::MAX,
            avg_interval_ms: u64::MAX,
            window_capacity: 1,
            window_secs: u64::MAX,
        };
        let limiter = RateLimiter::from_config(&config);
        assert_eq!(limiter.min_interval, MAX_SPAN);
        assert_eq!(limiter.avg_interval, MAX_SPAN);
        assert_eq!(limiter.window_duration, MAX_SPAN);

        limiter.tick().await;
        let next = tokio::time::timeout(Duration::from_secs(1), limiter.tick()).await;
        assert!(next.is_err());
        assert_eq!(limiter.stats().await.total_grants, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_tick_consumes_no_slot() {
        let limiter = RateLimiter::anilist();
        let start = Instant::now();
        limiter.tick().await;

        // The next slot is 1s away; give up after 100ms.
        let abandoned =
            tokio::time::timeout(Duration::from_millis(100), limiter.tick()).await;
        assert!(abandoned.is_err());
        assert_eq!(limiter.stats().await.total_grants, 1);

        limiter.tick().await;
        assert!(Instant::now() - start >= Duration::from_secs(1));
        assert_eq!(limiter.stats().await.total_grants, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_capacity_is_clamped() {
        let limiter = RateLimiter::new(
            Duration::ZERO,
            Duration::ZERO,
            0,
            Duration::from_secs(1),
        );
        let times = grant_times(&limiter, 3).await;
        assert_limits(&times, Duration::ZERO, 1, Duration::from_secs(1));
    }

    #[test]
    fn from_config_matches_preset() {
        let config = RateLimitConfig {
            min_interval_ms: 500,
            avg_interval_ms: 1000,
            window_capacity: 60,
            window_secs: 60,
        };
        let limiter = RateLimiter::from_config(&config);
        let preset = RateLimiter::anilist();
        assert_eq!(limiter.min_interval, preset.min_interval);
        assert_eq!(limiter.avg_interval, preset.avg_interval);
        assert_eq!(limiter.window_capacity, preset.window_capacity);
        assert_eq!(limiter.window_duration, preset.window_duration);
    }
}
