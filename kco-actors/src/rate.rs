use crate::actor::{Actor, Context};
use anyhow::Result;
use std::{collections::HashMap, time::Duration};
use tokio::{
    sync::oneshot,
    time::{sleep, Instant},
};

/// `namespace/name` — the same string used to key the State Store and the
/// Event Emitter's dedup cache.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct TenantKey(pub String);

impl std::fmt::Display for TenantKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug)]
pub enum RateMsg {
    /// Acquire `cost` tokens for `tenant`, waiting up to `timeout` if the
    /// bucket is currently short. Replies `true` once the tokens are
    /// reserved, `false` if `timeout` elapses first.
    Acquire {
        tenant: TenantKey,
        cost: f64,
        timeout: Duration,
        reply: oneshot::Sender<bool>,
    },
    /// Evict buckets that haven't been refilled in `max_idle`.
    Cleanup {
        max_idle: Duration,
        reply: oneshot::Sender<usize>,
    },
    /// Snapshot stats for `Controller::stats()`.
    Stats {
        reply: oneshot::Sender<RateLimiterStats>,
    },
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RateLimiterStats {
    pub bucket_count: usize,
}

/// Per-tenant token bucket. `capacity = max(10, rpm/6)`, `refill_rate = rpm/60`
/// tokens per second, matching the reference operator's bucket sizing.
#[derive(Debug, Clone, Copy)]
struct BucketCfg {
    capacity: f64,
    refill_rate: f64,
}

impl BucketCfg {
    fn from_rpm(rpm: u32) -> Self {
        let rpm = rpm as f64;
        Self {
            capacity: (rpm / 6.0).max(10.0),
            refill_rate: rpm / 60.0,
        }
    }
}

#[derive(Debug)]
struct BucketState {
    cfg: BucketCfg,
    tokens: f64,
    last_refill: Instant,
}

impl BucketState {
    fn new(cfg: BucketCfg, now: Instant) -> Self {
        Self {
            cfg,
            tokens: cfg.capacity,
            last_refill: now,
        }
    }

    fn refill(&mut self, now: Instant) {
        let dt = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.last_refill = now;
        self.tokens = (self.tokens + dt * self.cfg.refill_rate).min(self.cfg.capacity);
    }

    /// Try to consume `need` tokens now. On success, returns `None`. On
    /// failure, returns the wait `Duration` until `need` tokens would be
    /// available, without reserving anything (the caller decides whether to
    /// wait based on its own timeout budget).
    fn try_consume_or_wait(&mut self, need: f64, now: Instant) -> Option<Duration> {
        self.refill(now);
        if self.tokens >= need {
            self.tokens -= need;
            None
        } else {
            if self.cfg.refill_rate <= 0.0 {
                return Some(Duration::from_secs(u64::MAX / 2));
            }
            let deficit = need - self.tokens;
            Some(Duration::from_secs_f64((deficit / self.cfg.refill_rate).max(0.0)))
        }
    }
}

/// Token-bucket rate limiter as an actor, one mailbox serializing every
/// bucket mutation so `acquire` is linearizable per tenant without holding a
/// lock across an `.await`.
pub struct RateLimiter {
    buckets: HashMap<TenantKey, BucketState>,
    default_rpm: u32,
}

impl RateLimiter {
    pub fn new(default_rpm: u32) -> Self {
        Self {
            buckets: HashMap::new(),
            default_rpm,
        }
    }

    fn bucket(&mut self, tenant: &TenantKey, now: Instant) -> &mut BucketState {
        let cfg = BucketCfg::from_rpm(self.default_rpm);
        self.buckets
            .entry(tenant.clone())
            .or_insert_with(|| BucketState::new(cfg, now))
    }
}

#[async_trait::async_trait]
impl Actor for RateLimiter {
    type Msg = RateMsg;

    async fn handle(&mut self, msg: Self::Msg, _ctx: &mut Context<Self>) -> Result<()> {
        match msg {
            RateMsg::Acquire {
                tenant,
                cost,
                timeout,
                reply,
            } => {
                let now = Instant::now();
                let wait = self.bucket(&tenant, now).try_consume_or_wait(cost, now);
                match wait {
                    None => {
                        let _ = reply.send(true);
                    }
                    Some(wait) if timeout.is_zero() || wait > timeout => {
                        let _ = reply.send(false);
                    }
                    Some(wait) => {
                        // One cancellation-responsive sleep, then a single retry
                        // from the top, per the specified acquire() contract.
                        sleep(wait).await;
                        let now = Instant::now();
                        let ok = self
                            .bucket(&tenant, now)
                            .try_consume_or_wait(cost, now)
                            .is_none();
                        let _ = reply.send(ok);
                    }
                }
            }
            RateMsg::Cleanup { max_idle, reply } => {
                let now = Instant::now();
                let before = self.buckets.len();
                self.buckets
                    .retain(|_, b| now.saturating_duration_since(b.last_refill) <= max_idle);
                let _ = reply.send(before - self.buckets.len());
            }
            RateMsg::Stats { reply } => {
                let _ = reply.send(RateLimiterStats {
                    bucket_count: self.buckets.len(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_bucket_allows_capacity_immediate_acquires() {
        let cfg = BucketCfg::from_rpm(60); // capacity = max(10, 10) = 10
        let now = Instant::now();
        let mut bucket = BucketState::new(cfg, now);
        for _ in 0..10 {
            assert!(bucket.try_consume_or_wait(1.0, now).is_none());
        }
        assert!(bucket.try_consume_or_wait(1.0, now).is_some());
    }

    #[test]
    fn refill_restores_tokens_over_time() {
        let cfg = BucketCfg::from_rpm(60); // refill_rate = 1.0 tok/s
        let t0 = Instant::now();
        let mut bucket = BucketState::new(cfg, t0);
        for _ in 0..10 {
            bucket.try_consume_or_wait(1.0, t0);
        }
        let t1 = t0 + Duration::from_secs(5);
        assert!(bucket.try_consume_or_wait(1.0, t1).is_none());
        assert!(bucket.try_consume_or_wait(5.0, t1).is_some());
    }

    #[test]
    fn capacity_floor_is_ten() {
        let cfg = BucketCfg::from_rpm(6);
        assert_eq!(cfg.capacity, 10.0);
        assert!((cfg.refill_rate - 0.1).abs() < 1e-9);
    }
}
