use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

use aptitude_core::model::{SubmitTrigger, TestReport, UserId};

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Input shape for account creation; the password arrives already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub full_name: String,
    pub created_at: DateTime<Utc>,
}

/// Persisted shape of a registered user.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub full_name: String,
    pub created_at: DateTime<Utc>,
}

/// Persisted bearer token with its validity window.
#[derive(Debug, Clone)]
pub struct TokenRecord {
    pub token: String,
    pub user_id: UserId,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// One stored test session, without the per-question answer detail.
#[derive(Debug, Clone, PartialEq)]
pub struct TestSessionRow {
    pub id: i64,
    pub user_id: UserId,
    pub score: u32,
    pub total_questions: u32,
    pub percentage: f64,
    pub time_taken_seconds: u32,
    pub correct_answers: u32,
    pub wrong_answers: u32,
    pub trigger: SubmitTrigger,
    pub test_date: DateTime<Utc>,
}

/// A page of a user's test history, newest first.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryPage {
    pub sessions: Vec<TestSessionRow>,
    pub page: u32,
    pub limit: u32,
    pub total: u32,
    pub total_pages: u32,
}

/// Aggregate statistics over one user's sessions.
///
/// The optional fields are `None` when the user has no sessions yet,
/// mirroring SQL aggregates over an empty set.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UserStatistics {
    pub total_tests: u32,
    pub avg_percentage: Option<f64>,
    pub best_percentage: Option<f64>,
    pub lowest_percentage: Option<f64>,
    pub total_time_spent_seconds: Option<u64>,
    pub highest_score: Option<u32>,
}

/// One point of the recent-improvement trend, oldest first.
#[derive(Debug, Clone, PartialEq)]
pub struct TrendPoint {
    pub percentage: f64,
    pub test_date: DateTime<Utc>,
}

/// One leaderboard row: per-user aggregates across all sessions.
#[derive(Debug, Clone, PartialEq)]
pub struct LeaderboardEntry {
    pub username: String,
    pub full_name: String,
    pub total_tests: u32,
    pub avg_percentage: f64,
    pub best_percentage: f64,
}

/// Repository contract for user accounts.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Persist a new account.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` when the username or email is
    /// already taken, or other storage errors.
    async fn create_user(&self, user: &NewUser) -> Result<UserRecord, StorageError>;

    /// Look up an account by username or email (the login field accepts
    /// either).
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn find_by_login(&self, login: &str) -> Result<Option<UserRecord>, StorageError>;

    /// Fetch an account by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn get_user(&self, id: UserId) -> Result<Option<UserRecord>, StorageError>;
}

/// Repository contract for issued bearer tokens.
#[async_trait]
pub trait TokenRepository: Send + Sync {
    /// Persist a freshly issued token.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn store_token(&self, token: &TokenRecord) -> Result<(), StorageError>;

    /// Look up a token string.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn find_token(&self, token: &str) -> Result<Option<TokenRecord>, StorageError>;

    /// Drop a token (logout). Unknown tokens are a no-op.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn delete_token(&self, token: &str) -> Result<(), StorageError>;
}

/// Repository contract for completed test sessions and their aggregates.
#[async_trait]
pub trait TestSessionRepository: Send + Sync {
    /// Append one finished session for a user; returns the new row id.
    ///
    /// Derived columns (percentage, correct/wrong counts) are computed from
    /// the report at insert time.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn append_session(
        &self,
        user_id: UserId,
        report: &TestReport,
        test_date: DateTime<Utc>,
    ) -> Result<i64, StorageError>;

    /// A page of the user's history, newest first. `page` is 1-based;
    /// zero values are normalized to 1.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn history(
        &self,
        user_id: UserId,
        page: u32,
        limit: u32,
    ) -> Result<HistoryPage, StorageError>;

    /// Aggregate statistics over the user's sessions.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn statistics(&self, user_id: UserId) -> Result<UserStatistics, StorageError>;

    /// Most recent `limit` percentages, returned oldest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn recent_trend(
        &self,
        user_id: UserId,
        limit: u32,
    ) -> Result<Vec<TrendPoint>, StorageError>;

    /// Per-user aggregates ordered by average percentage, then test count.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn leaderboard(&self, limit: u32) -> Result<Vec<LeaderboardEntry>, StorageError>;
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Default)]
struct InMemoryState {
    users: HashMap<u64, UserRecord>,
    next_user_id: u64,
    tokens: HashMap<String, TokenRecord>,
    sessions: Vec<TestSessionRow>,
    next_session_id: i64,
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    state: Arc<Mutex<InMemoryState>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, InMemoryState>, StorageError> {
        self.state
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }
}

#[async_trait]
impl UserRepository for InMemoryRepository {
    async fn create_user(&self, user: &NewUser) -> Result<UserRecord, StorageError> {
        let mut state = self.lock()?;
        let taken = state
            .users
            .values()
            .any(|u| u.username == user.username || u.email == user.email);
        if taken {
            return Err(StorageError::Conflict);
        }
        state.next_user_id += 1;
        let record = UserRecord {
            id: UserId::new(state.next_user_id),
            username: user.username.clone(),
            email: user.email.clone(),
            password_hash: user.password_hash.clone(),
            full_name: user.full_name.clone(),
            created_at: user.created_at,
        };
        state.users.insert(record.id.value(), record.clone());
        Ok(record)
    }

    async fn find_by_login(&self, login: &str) -> Result<Option<UserRecord>, StorageError> {
        let state = self.lock()?;
        Ok(state
            .users
            .values()
            .find(|u| u.username == login || u.email == login)
            .cloned())
    }

    async fn get_user(&self, id: UserId) -> Result<Option<UserRecord>, StorageError> {
        let state = self.lock()?;
        Ok(state.users.get(&id.value()).cloned())
    }
}

#[async_trait]
impl TokenRepository for InMemoryRepository {
    async fn store_token(&self, token: &TokenRecord) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        state.tokens.insert(token.token.clone(), token.clone());
        Ok(())
    }

    async fn find_token(&self, token: &str) -> Result<Option<TokenRecord>, StorageError> {
        let state = self.lock()?;
        Ok(state.tokens.get(token).cloned())
    }

    async fn delete_token(&self, token: &str) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        state.tokens.remove(token);
        Ok(())
    }
}

#[async_trait]
impl TestSessionRepository for InMemoryRepository {
    async fn append_session(
        &self,
        user_id: UserId,
        report: &TestReport,
        test_date: DateTime<Utc>,
    ) -> Result<i64, StorageError> {
        let mut state = self.lock()?;
        if !state.users.contains_key(&user_id.value()) {
            return Err(StorageError::NotFound);
        }
        state.next_session_id += 1;
        let row = TestSessionRow {
            id: state.next_session_id,
            user_id,
            score: report.score(),
            total_questions: report.total_questions(),
            percentage: report.percentage(),
            time_taken_seconds: report.time_taken_seconds(),
            correct_answers: report.correct_answers(),
            wrong_answers: report.wrong_answers(),
            trigger: report.trigger(),
            test_date,
        };
        let id = row.id;
        state.sessions.push(row);
        Ok(id)
    }

    async fn history(
        &self,
        user_id: UserId,
        page: u32,
        limit: u32,
    ) -> Result<HistoryPage, StorageError> {
        let page = page.max(1);
        let limit = limit.max(1);
        let state = self.lock()?;

        let mut rows: Vec<TestSessionRow> = state
            .sessions
            .iter()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.test_date.cmp(&a.test_date).then(b.id.cmp(&a.id)));

        let total = u32::try_from(rows.len()).unwrap_or(u32::MAX);
        let total_pages = total.div_ceil(limit);
        let offset = ((page - 1) * limit) as usize;
        let sessions = rows.into_iter().skip(offset).take(limit as usize).collect();

        Ok(HistoryPage {
            sessions,
            page,
            limit,
            total,
            total_pages,
        })
    }

    async fn statistics(&self, user_id: UserId) -> Result<UserStatistics, StorageError> {
        let state = self.lock()?;
        let rows: Vec<&TestSessionRow> = state
            .sessions
            .iter()
            .filter(|s| s.user_id == user_id)
            .collect();

        if rows.is_empty() {
            return Ok(UserStatistics::default());
        }

        let total_tests = u32::try_from(rows.len()).unwrap_or(u32::MAX);
        let sum: f64 = rows.iter().map(|r| r.percentage).sum();
        let avg = round2(sum / rows.len() as f64);
        let best = rows.iter().map(|r| r.percentage).fold(f64::MIN, f64::max);
        let lowest = rows.iter().map(|r| r.percentage).fold(f64::MAX, f64::min);
        let time: u64 = rows.iter().map(|r| u64::from(r.time_taken_seconds)).sum();
        let highest = rows.iter().map(|r| r.score).max();

        Ok(UserStatistics {
            total_tests,
            avg_percentage: Some(avg),
            best_percentage: Some(best),
            lowest_percentage: Some(lowest),
            total_time_spent_seconds: Some(time),
            highest_score: highest,
        })
    }

    async fn recent_trend(
        &self,
        user_id: UserId,
        limit: u32,
    ) -> Result<Vec<TrendPoint>, StorageError> {
        let state = self.lock()?;
        let mut rows: Vec<&TestSessionRow> = state
            .sessions
            .iter()
            .filter(|s| s.user_id == user_id)
            .collect();
        rows.sort_by(|a, b| b.test_date.cmp(&a.test_date).then(b.id.cmp(&a.id)));
        rows.truncate(limit as usize);
        rows.reverse();

        Ok(rows
            .into_iter()
            .map(|r| TrendPoint {
                percentage: r.percentage,
                test_date: r.test_date,
            })
            .collect())
    }

    async fn leaderboard(&self, limit: u32) -> Result<Vec<LeaderboardEntry>, StorageError> {
        let state = self.lock()?;
        let mut by_user: HashMap<u64, (u32, f64, f64)> = HashMap::new();
        for row in &state.sessions {
            let entry = by_user
                .entry(row.user_id.value())
                .or_insert((0, 0.0, f64::MIN));
            entry.0 += 1;
            entry.1 += row.percentage;
            entry.2 = entry.2.max(row.percentage);
        }

        let mut entries: Vec<LeaderboardEntry> = by_user
            .into_iter()
            .filter_map(|(user_id, (count, sum, best))| {
                state.users.get(&user_id).map(|user| LeaderboardEntry {
                    username: user.username.clone(),
                    full_name: user.full_name.clone(),
                    total_tests: count,
                    avg_percentage: round2(sum / f64::from(count)),
                    best_percentage: best,
                })
            })
            .collect();

        entries.sort_by(|a, b| {
            b.avg_percentage
                .partial_cmp(&a.avg_percentage)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(b.total_tests.cmp(&a.total_tests))
        });
        entries.truncate(limit as usize);
        Ok(entries)
    }
}

/// Aggregates the repositories behind trait objects for easy backend
/// swapping.
#[derive(Clone)]
pub struct Storage {
    pub users: Arc<dyn UserRepository>,
    pub tokens: Arc<dyn TokenRepository>,
    pub sessions: Arc<dyn TestSessionRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        Self {
            users: Arc::new(repo.clone()),
            tokens: Arc::new(repo.clone()),
            sessions: Arc::new(repo),
        }
    }
}
