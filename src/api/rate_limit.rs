use governor::clock::{Clock, DefaultClock};
use governor::middleware::NoOpMiddleware;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use rand::Rng;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Spaces out calls to an upstream that blocks bursts: at most one call per
/// `period`, no burst allowance.
pub struct FetchThrottle<C: Clock = DefaultClock> {
    limiter: Option<RateLimiter<NotKeyed, InMemoryState, C, NoOpMiddleware<C::Instant>>>,
    period: Duration,
}

impl<C: Clock> FetchThrottle<C> {
    pub fn with_clock(period: Duration, clock: &C) -> Self {
        let limiter = Quota::with_period(period)
            .map(|quota| quota.allow_burst(NonZeroU32::MIN))
            .map(|quota| RateLimiter::direct_with_clock(quota, clock));
        Self { limiter, period }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Take a slot if one is free right now
    pub fn try_acquire(&self) -> bool {
        self.limiter.as_ref().map_or(true, |l| l.check().is_ok())
    }
}

impl FetchThrottle {
    /// A zero period disables throttling
    pub fn new(period: Duration) -> Self {
        Self::with_clock(period, &DefaultClock::default())
    }

    /// Wait until the next call is allowed
    pub async fn wait(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }
}

impl<C: Clock> std::fmt::Debug for FetchThrottle<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchThrottle")
            .field("period", &self.period)
            .finish()
    }
}

/// Retry schedule for responses that signal throttling or blocking
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub multiplier: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl BackoffPolicy {
    pub const fn none() -> Self {
        Self {
            max_retries: 0,
            initial_delay: Duration::ZERO,
            multiplier: 1.0,
        }
    }

    /// Delay before retry number `attempt` (1-based), or `None` once retries
    /// are exhausted.
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt > self.max_retries {
            return None;
        }
        let factor = self.multiplier.powi(attempt as i32 - 1);
        Some(self.initial_delay.mul_f64(factor))
    }

    /// Status codes the upstream uses when it throttles or blocks a client
    pub fn is_retryable(status: reqwest::StatusCode) -> bool {
        status == reqwest::StatusCode::TOO_MANY_REQUESTS
            || status == reqwest::StatusCode::FORBIDDEN
            || status.is_server_error()
    }
}

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:125.0) Gecko/20100101 Firefox/125.0",
];

/// Round-robin over a small pool of browser identities, starting at a random
/// offset so separate runs do not open with the same one.
#[derive(Debug)]
pub struct UserAgentPool {
    agents: Vec<String>,
    next: AtomicUsize,
}

impl Default for UserAgentPool {
    fn default() -> Self {
        Self::new(USER_AGENTS.iter().map(|a| a.to_string()).collect())
    }
}

impl UserAgentPool {
    pub fn new(agents: Vec<String>) -> Self {
        let start = if agents.is_empty() {
            0
        } else {
            rand::thread_rng().gen_range(0..agents.len())
        };
        Self {
            agents,
            next: AtomicUsize::new(start),
        }
    }

    pub fn next_agent(&self) -> &str {
        if self.agents.is_empty() {
            return "intrinsic-value/0.1";
        }
        let idx = self.next.fetch_add(1, Ordering::Relaxed) % self.agents.len();
        &self.agents[idx]
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}
