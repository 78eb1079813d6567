use std::collections::HashSet;
use std::future::Future;
use std::hash::Hash;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, Result};

/// Row keys reported by earlier polls.
#[derive(Debug)]
pub struct SeenRows<K> {
    seen: HashSet<K>,
}

impl<K: Hash + Eq> Default for SeenRows<K> {
    fn default() -> Self {
        Self {
            seen: HashSet::new(),
        }
    }
}

impl<K: Hash + Eq> SeenRows<K> {
    /// Rows whose key has not been reported yet, in page order.
    pub fn fresh<T>(&mut self, rows: Vec<T>, key: impl Fn(&T) -> K) -> Vec<T> {
        rows.into_iter()
            .filter(|row| self.seen.insert(key(row)))
            .collect()
    }

    pub fn count(&self) -> usize {
        self.seen.len()
    }
}

/// Poll `fetch` every `every` until `cancel` fires, passing only unseen rows to `report`.
///
/// `report` gets the index of the successful poll (0 for the first page) and
/// the new rows, which may be empty. A failed poll is logged and retried on the
/// next tick. Validation errors end the watch since they cannot recover.
pub async fn watch<T, K, KF, F, Fut, R>(
    every: Duration,
    cancel: &CancellationToken,
    key: KF,
    mut fetch: F,
    mut report: R,
) -> Result<()>
where
    K: Hash + Eq,
    KF: Fn(&T) -> K,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Vec<T>>>,
    R: FnMut(u64, Vec<T>),
{
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut seen = SeenRows::default();
    let mut round = 0u64;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let page = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            page = fetch() => page,
        };

        match page {
            Ok(rows) => {
                let fresh = seen.fresh(rows, &key);
                tracing::debug!(round, new = fresh.len(), known = seen.count(), "poll finished");
                report(round, fresh);
                round += 1;
            }
            Err(AppError::Cancelled) => break,
            Err(e @ AppError::Validation(_)) => return Err(e),
            Err(e) => tracing::warn!(error = %e, "poll failed, retrying on next tick"),
        }
    }

    tracing::info!(rounds = round, "watch stopped");
    Ok(())
}
