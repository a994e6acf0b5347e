//! Renewal loop

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use backoff::backoff::Backoff as _;
use backoff::ExponentialBackoff;
use tokio::select;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::LeaseRenewer;
use crate::clock::{LeasePolicy, DEFAULT_HEARTBEAT_MIN_INTERVAL_SECS};
use crate::coordinator::CoordinatorError;
use crate::lease::Lease;

/// Heartbeat timing
#[derive(Debug, Clone)]
pub struct HeartbeatConfig {
    /// Minimum spacing between renewals
    pub min_interval: Duration,

    /// First retry delay after a store failure
    pub retry_initial: Duration,

    /// Cap on a single retry delay
    pub retry_max: Duration,

    /// Store failures tolerated for one renewal before giving up
    pub max_retries: u32,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_secs(DEFAULT_HEARTBEAT_MIN_INTERVAL_SECS as u64),
            retry_initial: Duration::from_millis(500),
            retry_max: Duration::from_secs(30),
            max_retries: 8,
        }
    }
}

impl HeartbeatConfig {
    /// Renew at the policy's minimum heartbeat interval
    pub fn from_policy(policy: &LeasePolicy) -> Self {
        let min_interval = policy
            .heartbeat_min_interval
            .to_std()
            .unwrap_or(Duration::from_secs(DEFAULT_HEARTBEAT_MIN_INTERVAL_SECS as u64));
        Self {
            min_interval,
            ..Default::default()
        }
    }

    fn retry_backoff(&self) -> ExponentialBackoff {
        let mut backoff = ExponentialBackoff {
            initial_interval: self.retry_initial,
            current_interval: self.retry_initial,
            max_interval: self.retry_max,
            max_elapsed_time: None,
            ..Default::default()
        };
        backoff.reset();
        backoff
    }
}

/// Why a heartbeat task ended
#[derive(Debug, Clone)]
pub enum SessionEnd {
    /// Stopped by the owner
    Stopped,

    /// Custody is gone (conflict or expired session); load another record
    /// or log in again
    LeaseLost(CoordinatorError),

    /// The store kept failing past the retry budget
    RetriesExhausted(CoordinatorError),
}

/// Handle to a running heartbeat task
pub struct HeartbeatHandle {
    activity: Arc<AtomicBool>,
    lease: watch::Receiver<Lease>,
    cancel: CancellationToken,
    join: JoinHandle<SessionEnd>,
}

impl HeartbeatHandle {
    /// Start renewing `lease` through `renewer`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<R: LeaseRenewer>(renewer: Arc<R>, lease: Lease, config: HeartbeatConfig) -> Self {
        let activity = Arc::new(AtomicBool::new(false));
        let (lease_tx, lease_rx) = watch::channel(lease);
        let cancel = CancellationToken::new();

        let join = tokio::spawn(run(
            renewer,
            lease_tx,
            activity.clone(),
            cancel.clone(),
            config,
        ));

        Self {
            activity,
            lease: lease_rx,
            cancel,
            join,
        }
    }

    /// Mark user activity; the next interval tick will renew
    pub fn record_activity(&self) {
        self.activity.store(true, Ordering::Release);
    }

    /// Latest lease obtained by the task
    pub fn lease(&self) -> Lease {
        self.lease.borrow().clone()
    }

    /// Deadline of the latest lease as epoch milliseconds
    pub fn expires_at_ms(&self) -> i64 {
        self.lease.borrow().expires_at_ms()
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Stop renewing and wait for the task to end
    pub async fn stop(self) -> SessionEnd {
        self.cancel.cancel();
        self.finished().await
    }

    /// Wait for the task to end on its own
    pub async fn finished(self) -> SessionEnd {
        match self.join.await {
            Ok(end) => end,
            Err(e) => {
                warn!(error = %e, "heartbeat task aborted");
                SessionEnd::Stopped
            }
        }
    }
}

async fn run<R: LeaseRenewer>(
    renewer: Arc<R>,
    lease_tx: watch::Sender<Lease>,
    activity: Arc<AtomicBool>,
    cancel: CancellationToken,
    config: HeartbeatConfig,
) -> SessionEnd {
    let mut interval = tokio::time::interval(config.min_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately; the lease was just granted.
    interval.tick().await;

    loop {
        select! {
            _ = cancel.cancelled() => {
                debug!("heartbeat stopped");
                return SessionEnd::Stopped;
            }
            _ = interval.tick() => {
                if !activity.swap(false, Ordering::AcqRel) {
                    continue;
                }
                let current = lease_tx.borrow().clone();
                match renew_with_retry(renewer.as_ref(), &current, &cancel, &config).await {
                    Ok(renewed) => {
                        debug!(
                            record_id = %renewed.record_id,
                            version = renewed.version,
                            expires_at_ms = renewed.expires_at_ms(),
                            "lease renewed"
                        );
                        lease_tx.send_replace(renewed);
                    }
                    Err(end) => return end,
                }
            }
        }
    }
}

async fn renew_with_retry<R: LeaseRenewer>(
    renewer: &R,
    lease: &Lease,
    cancel: &CancellationToken,
    config: &HeartbeatConfig,
) -> Result<Lease, SessionEnd> {
    let mut backoff = config.retry_backoff();
    let mut failures = 0;

    loop {
        let err = match renewer
            .renew(&lease.record_id, &lease.owner, lease.version)
            .await
        {
            Ok(renewed) => return Ok(renewed),
            Err(e) => e,
        };

        if err.is_session_lost() {
            info!(record_id = %lease.record_id, owner = %lease.owner, error = %err, "lease lost");
            return Err(SessionEnd::LeaseLost(err));
        }
        if !err.is_retryable() {
            warn!(record_id = %lease.record_id, error = %err, "renewal failed");
            return Err(SessionEnd::RetriesExhausted(err));
        }

        failures += 1;
        let delay = match backoff.next_backoff() {
            Some(delay) if failures <= config.max_retries => delay,
            _ => {
                warn!(record_id = %lease.record_id, failures, "renewal retries exceeded");
                return Err(SessionEnd::RetriesExhausted(err));
            }
        };
        warn!(
            record_id = %lease.record_id,
            error = %err,
            retry_in_ms = delay.as_millis() as u64,
            "renewal failed, retrying"
        );

        select! {
            _ = cancel.cancelled() => return Err(SessionEnd::Stopped),
            _ = tokio::time::sleep(delay) => {}
        }
    }
}
