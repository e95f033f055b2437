use serde::Deserialize;
use std::time::{Duration, Instant};

/// Default minimum spacing between two successful alerts.
pub const DEFAULT_ALERT_COOLDOWN: Duration = Duration::from_secs(1);

/// Which counter value a transmission carries.
///
/// Both orders advance the counter by exactly one per successful transmission;
/// they differ only in whether the first payload is 0 or 1.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CounterOrder {
    /// Send the current value, then advance (first payload is 0).
    #[default]
    PostIncrement,
    /// Advance, then send the new value (first payload is 1).
    PreIncrement,
}

impl std::str::FromStr for CounterOrder {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "post_increment" | "post" => Ok(CounterOrder::PostIncrement),
            "pre_increment" | "pre" => Ok(CounterOrder::PreIncrement),
            other => Err(anyhow::anyhow!(
                "unknown counter order '{}'; expected post_increment or pre_increment",
                other
            )),
        }
    }
}

/// Cooldown gate plus the transmitted counter.
///
/// State only changes on a successful transmission, so a failed attempt can be
/// retried immediately.
#[derive(Clone, Debug)]
pub struct RateLimiter {
    cooldown: Duration,
    order: CounterOrder,
    last_sent: Option<Instant>,
    counter: u32,
}

impl RateLimiter {
    pub fn new(cooldown: Duration, order: CounterOrder) -> Self {
        Self {
            cooldown,
            order,
            last_sent: None,
            counter: 0,
        }
    }

    /// True if never fired, or strictly more than the cooldown has elapsed.
    pub fn permits(&self, now: Instant) -> bool {
        match self.last_sent {
            None => true,
            Some(last) => now.saturating_duration_since(last) > self.cooldown,
        }
    }

    /// Counter value the next transmission will carry.
    pub fn next_value(&self) -> u32 {
        match self.order {
            CounterOrder::PostIncrement => self.counter,
            CounterOrder::PreIncrement => self.counter.wrapping_add(1),
        }
    }

    /// Record a successful transmission requested at `sent_at`.
    pub fn record_success(&mut self, sent_at: Instant) {
        self.counter = self.counter.wrapping_add(1);
        self.last_sent = Some(sent_at);
    }

    pub fn counter(&self) -> u32 {
        self.counter
    }

    pub fn last_sent(&self) -> Option<Instant> {
        self.last_sent
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_ALERT_COOLDOWN, CounterOrder::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_limiter_permits() {
        assert!(RateLimiter::default().permits(Instant::now()));
    }

    #[test]
    fn cooldown_boundary_is_exclusive() {
        let t0 = Instant::now();
        let mut limiter = RateLimiter::default();
        limiter.record_success(t0);

        assert!(!limiter.permits(t0 + Duration::from_millis(500)));
        assert!(!limiter.permits(t0 + Duration::from_secs(1)));
        assert!(limiter.permits(t0 + Duration::from_millis(1001)));
    }

    #[test]
    fn counter_orders_differ_only_in_first_value() {
        let t0 = Instant::now();
        let mut post = RateLimiter::new(Duration::ZERO, CounterOrder::PostIncrement);
        let mut pre = RateLimiter::new(Duration::ZERO, CounterOrder::PreIncrement);

        assert_eq!(post.next_value(), 0);
        assert_eq!(pre.next_value(), 1);
        post.record_success(t0);
        pre.record_success(t0);
        assert_eq!(post.next_value(), 1);
        assert_eq!(pre.next_value(), 2);
        assert_eq!(post.counter(), pre.counter());
    }

    #[test]
    fn counter_order_parses() {
        assert_eq!(
            "pre_increment".parse::<CounterOrder>().unwrap(),
            CounterOrder::PreIncrement
        );
        assert!("sideways".parse::<CounterOrder>().is_err());
    }
}
