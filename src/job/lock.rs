//! Execution lock and run supervision
//!
//! A running audit holds a lock that a heartbeat renews from inside the
//! audit's own task. If that task stops being polled, for example because
//! a synchronous parse blocks its thread, the lock lapses and the
//! supervisor reports the run as stalled so it can be re-dispatched.

use crate::AuditError;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

const MIN_RENEW: Duration = Duration::from_millis(10);

/// A renewable lease on one job's execution
#[derive(Debug)]
pub struct ExecutionLock {
    origin: Instant,
    ttl: Duration,
    /// Expiry, in milliseconds since `origin`
    expires_at_ms: AtomicU64,
    released: AtomicBool,
}

impl ExecutionLock {
    /// Takes the lock for `ttl`
    pub fn acquire(ttl: Duration) -> Self {
        let lock = Self {
            origin: Instant::now(),
            ttl,
            expires_at_ms: AtomicU64::new(0),
            released: AtomicBool::new(false),
        };
        lock.renew();
        lock
    }

    /// Pushes the expiry to `ttl` from now
    pub fn renew(&self) {
        let expiry = self.origin.elapsed() + self.ttl;
        self.expires_at_ms
            .store(expiry.as_millis() as u64, Ordering::SeqCst);
    }

    /// A released lock never expires
    pub fn is_expired(&self) -> bool {
        if self.released.load(Ordering::SeqCst) {
            return false;
        }
        let now_ms = self.origin.elapsed().as_millis() as u64;
        now_ms >= self.expires_at_ms.load(Ordering::SeqCst)
    }

    pub fn release(&self) {
        self.released.store(true, Ordering::SeqCst);
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }
}

/// Limits applied to one supervised run
#[derive(Debug, Clone, Copy)]
pub struct Supervision {
    pub audit_id: Uuid,
    /// Heartbeat period; the lock lives for twice this
    pub lock_renew: Duration,
    /// Wall-clock budget of the whole run
    pub timeout: Duration,
}

/// Runs `work` under an execution lock and a wall-clock budget
///
/// `work` receives a token that is cancelled when the run must stop. The run
/// ends with:
///
/// * the work's own result when it finishes in time
/// * `AuditError::Timeout` when the budget runs out
/// * `AuditError::Stalled` when the lock lapses
/// * `AuditError::Cancelled` when `cancel` fires
pub async fn run_with_lock<W, Fut, T>(
    supervision: Supervision,
    cancel: &CancellationToken,
    work: W,
) -> Result<T, AuditError>
where
    W: FnOnce(CancellationToken) -> Fut,
    Fut: Future<Output = Result<T, AuditError>> + Send + 'static,
    T: Send + 'static,
{
    let renew_every = supervision.lock_renew.max(MIN_RENEW);
    let lock = Arc::new(ExecutionLock::acquire(renew_every * 2));
    let work_cancel = cancel.child_token();
    let work = work(work_cancel.clone());

    let heartbeat = Arc::clone(&lock);
    let mut task = tokio::spawn(async move {
        tokio::pin!(work);
        let mut ticker = tokio::time::interval(renew_every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                out = &mut work => return out,
                _ = ticker.tick() => heartbeat.renew(),
            }
        }
    });

    let deadline = tokio::time::sleep(supervision.timeout);
    tokio::pin!(deadline);
    let mut watchdog = tokio::time::interval((renew_every / 2).max(MIN_RENEW));
    watchdog.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let outcome = loop {
        tokio::select! {
            joined = &mut task => {
                break match joined {
                    Ok(out) => out,
                    Err(e) if e.is_cancelled() => Err(AuditError::Cancelled),
                    Err(e) => Err(AuditError::Stage(format!("audit task failed: {}", e))),
                };
            }
            _ = &mut deadline => {
                warn!(audit_id = %supervision.audit_id, "Audit exceeded its time budget");
                work_cancel.cancel();
                task.abort();
                break Err(AuditError::Timeout(supervision.timeout.as_secs()));
            }
            _ = watchdog.tick() => {
                if lock.is_expired() {
                    warn!(audit_id = %supervision.audit_id, "Execution lock lapsed");
                    work_cancel.cancel();
                    task.abort();
                    break Err(AuditError::Stalled(supervision.audit_id));
                }
            }
            _ = cancel.cancelled() => {
                debug!(audit_id = %supervision.audit_id, "Cancelling audit task");
                task.abort();
                break Err(AuditError::Cancelled);
            }
        }
    };

    lock.release();
    outcome
}
