//! Periodic top-players query, independent of the match session.

use crate::transport::{Credential, LeaderboardSource};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};

/// One leaderboard row as the server reports it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RankedPlayer {
    /// Display name; may be empty.
    #[serde(default)]
    pub username: String,
    /// Account identifier.
    #[serde(default)]
    pub owner_id: String,
    /// Accumulated score.
    #[serde(default)]
    pub score: i64,
}

impl RankedPlayer {
    /// Username, falling back to the owner id.
    pub fn display_name(&self) -> &str {
        if self.username.is_empty() {
            &self.owner_id
        } else {
            &self.username
        }
    }
}

/// What the leaderboard panel shows.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LeaderboardView {
    /// No query has completed yet.
    #[default]
    Loading,
    /// Rows in rank order.
    Ranked(Vec<RankedPlayer>),
    /// Query failed or returned nothing.
    NoData,
}

/// Runs one query and folds failures into [`LeaderboardView::NoData`].
#[instrument(skip(source, credential))]
pub async fn poll_once(
    source: &dyn LeaderboardSource,
    credential: &Credential,
    limit: usize,
) -> LeaderboardView {
    match source.query_top_players(credential, limit).await {
        Ok(rows) if rows.is_empty() => {
            debug!("Leaderboard empty");
            LeaderboardView::NoData
        }
        Ok(mut rows) => {
            rows.truncate(limit);
            debug!(rows = rows.len(), "Leaderboard refreshed");
            LeaderboardView::Ranked(rows)
        }
        Err(e) => {
            warn!(error = %e, "Leaderboard query failed");
            LeaderboardView::NoData
        }
    }
}

/// Fixed-interval leaderboard refresher.
pub struct LeaderboardPoller {
    source: Arc<dyn LeaderboardSource>,
    credential: Credential,
    interval: Duration,
    limit: usize,
}

impl LeaderboardPoller {
    /// Creates a poller. A zero interval is bumped to one second.
    pub fn new(
        source: Arc<dyn LeaderboardSource>,
        credential: Credential,
        interval: Duration,
        limit: usize,
    ) -> Self {
        Self {
            source,
            credential,
            interval: interval.max(Duration::from_secs(1)),
            limit,
        }
    }

    /// Starts polling, publishing each result on `sink`.
    ///
    /// The first query runs immediately. Polling stops when the handle is
    /// cancelled or every receiver is gone.
    #[instrument(skip(self, sink), fields(interval_secs = self.interval.as_secs(), limit = self.limit))]
    pub fn spawn(self, sink: watch::Sender<LeaderboardView>) -> PollerHandle {
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        info!("Starting leaderboard poller");

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = &mut stop_rx => {
                        debug!("Leaderboard poller cancelled");
                        break;
                    }
                    _ = ticker.tick() => {
                        let view = poll_once(self.source.as_ref(), &self.credential, self.limit).await;
                        if sink.send(view).is_err() {
                            debug!("Leaderboard receivers dropped");
                            break;
                        }
                    }
                }
            }
        });

        PollerHandle {
            stop: Some(stop_tx),
            task,
        }
    }
}

/// Cancels a running [`LeaderboardPoller`].
pub struct PollerHandle {
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl PollerHandle {
    /// Stops polling and waits for the task to wind down.
    #[instrument(skip(self))]
    pub async fn cancel(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Err(e) = (&mut self.task).await {
            warn!(error = %e, "Leaderboard task ended abnormally");
        }
    }

    /// Whether the polling task has ended.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        if self.stop.is_some() {
            self.task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_falls_back_to_owner() {
        let anonymous = RankedPlayer {
            username: String::new(),
            owner_id: "owner-1".to_string(),
            score: 3,
        };
        assert_eq!(anonymous.display_name(), "owner-1");

        let named = RankedPlayer {
            username: "alice".to_string(),
            ..anonymous
        };
        assert_eq!(named.display_name(), "alice");
    }
}
