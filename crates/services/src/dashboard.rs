//! Read-only dashboard queries over persisted test sessions.

use std::sync::Arc;

use aptitude_core::model::UserId;
use storage::repository::{
    HistoryPage, LeaderboardEntry, StorageError, TestSessionRepository, TrendPoint, UserStatistics,
};

const TREND_LENGTH: u32 = 5;

/// Aggregate statistics plus the recent-result trend, oldest first.
#[derive(Debug, Clone, PartialEq)]
pub struct StatisticsView {
    pub statistics: UserStatistics,
    pub trend: Vec<TrendPoint>,
}

/// Facade over the session repository for history, statistics and
/// leaderboard reads. Hides repositories from the presentation layer.
#[derive(Clone)]
pub struct DashboardService {
    sessions: Arc<dyn TestSessionRepository>,
}

impl DashboardService {
    #[must_use]
    pub fn new(sessions: Arc<dyn TestSessionRepository>) -> Self {
        Self { sessions }
    }

    /// A page of the user's test history, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    pub async fn history(
        &self,
        user_id: UserId,
        page: u32,
        limit: u32,
    ) -> Result<HistoryPage, StorageError> {
        self.sessions.history(user_id, page, limit).await
    }

    /// Aggregates plus the last five results as an improvement trend.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    pub async fn statistics(&self, user_id: UserId) -> Result<StatisticsView, StorageError> {
        let statistics = self.sessions.statistics(user_id).await?;
        let trend = self.sessions.recent_trend(user_id, TREND_LENGTH).await?;
        Ok(StatisticsView { statistics, trend })
    }

    /// Per-user aggregates ordered by average percentage, then test count.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    pub async fn leaderboard(&self, limit: u32) -> Result<Vec<LeaderboardEntry>, StorageError> {
        self.sessions.leaderboard(limit).await
    }
}

impl core::fmt::Debug for DashboardService {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DashboardService").finish_non_exhaustive()
    }
}
