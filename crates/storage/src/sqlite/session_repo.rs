use aptitude_core::model::{TestReport, UserId};
use chrono::{DateTime, Utc};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{i64_to_u32, map_session_row, ser, user_id_to_i64};
use crate::repository::{
    HistoryPage, LeaderboardEntry, StorageError, TestSessionRepository, TrendPoint, UserStatistics,
};

#[async_trait::async_trait]
impl TestSessionRepository for SqliteRepository {
    async fn append_session(
        &self,
        user_id: UserId,
        report: &TestReport,
        test_date: DateTime<Utc>,
    ) -> Result<i64, StorageError> {
        let answers_json = serde_json::to_string(report.answers()).map_err(ser)?;
        let res = sqlx::query(
            r"
            INSERT INTO test_sessions
                (user_id, score, total_questions, percentage, time_taken_seconds,
                 correct_answers, wrong_answers, finish_trigger, answers, test_date)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ",
        )
        .bind(user_id_to_i64(user_id)?)
        .bind(i64::from(report.score()))
        .bind(i64::from(report.total_questions()))
        .bind(report.percentage())
        .bind(i64::from(report.time_taken_seconds()))
        .bind(i64::from(report.correct_answers()))
        .bind(i64::from(report.wrong_answers()))
        .bind(report.trigger().as_str())
        .bind(answers_json)
        .bind(test_date)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(res.last_insert_rowid())
    }

    async fn history(
        &self,
        user_id: UserId,
        page: u32,
        limit: u32,
    ) -> Result<HistoryPage, StorageError> {
        let page = page.max(1);
        let limit = limit.max(1);
        let offset = i64::from(page - 1) * i64::from(limit);
        let uid = user_id_to_i64(user_id)?;

        let rows = sqlx::query(
            r"
            SELECT id, user_id, score, total_questions, percentage, time_taken_seconds,
                   correct_answers, wrong_answers, finish_trigger, test_date
            FROM test_sessions
            WHERE user_id = ?1
            ORDER BY test_date DESC, id DESC
            LIMIT ?2 OFFSET ?3
            ",
        )
        .bind(uid)
        .bind(i64::from(limit))
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let sessions = rows
            .iter()
            .map(map_session_row)
            .collect::<Result<Vec<_>, _>>()?;

        let total_i64: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM test_sessions WHERE user_id = ?1")
                .bind(uid)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| StorageError::Connection(e.to_string()))?;
        let total = i64_to_u32("total", total_i64)?;

        Ok(HistoryPage {
            sessions,
            page,
            limit,
            total,
            total_pages: total.div_ceil(limit),
        })
    }

    async fn statistics(&self, user_id: UserId) -> Result<UserStatistics, StorageError> {
        let row = sqlx::query(
            r"
            SELECT COUNT(*) AS total_tests,
                   ROUND(AVG(percentage), 2) AS avg_percentage,
                   MAX(percentage) AS best_percentage,
                   MIN(percentage) AS lowest_percentage,
                   SUM(time_taken_seconds) AS total_time,
                   MAX(score) AS highest_score
            FROM test_sessions
            WHERE user_id = ?1
            ",
        )
        .bind(user_id_to_i64(user_id)?)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let total_tests = i64_to_u32("total_tests", row.try_get("total_tests").map_err(ser)?)?;
        let total_time = row
            .try_get::<Option<i64>, _>("total_time")
            .map_err(ser)?
            .map(|v| {
                u64::try_from(v)
                    .map_err(|_| StorageError::Serialization("total_time sign overflow".into()))
            })
            .transpose()?;
        let highest_score = row
            .try_get::<Option<i64>, _>("highest_score")
            .map_err(ser)?
            .map(|v| i64_to_u32("highest_score", v))
            .transpose()?;

        Ok(UserStatistics {
            total_tests,
            avg_percentage: row.try_get("avg_percentage").map_err(ser)?,
            best_percentage: row.try_get("best_percentage").map_err(ser)?,
            lowest_percentage: row.try_get("lowest_percentage").map_err(ser)?,
            total_time_spent_seconds: total_time,
            highest_score,
        })
    }

    async fn recent_trend(
        &self,
        user_id: UserId,
        limit: u32,
    ) -> Result<Vec<TrendPoint>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT percentage, test_date
            FROM test_sessions
            WHERE user_id = ?1
            ORDER BY test_date DESC, id DESC
            LIMIT ?2
            ",
        )
        .bind(user_id_to_i64(user_id)?)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut points = rows
            .iter()
            .map(|row| {
                Ok(TrendPoint {
                    percentage: row.try_get("percentage").map_err(ser)?,
                    test_date: row.try_get("test_date").map_err(ser)?,
                })
            })
            .collect::<Result<Vec<_>, StorageError>>()?;
        points.reverse();
        Ok(points)
    }

    async fn leaderboard(&self, limit: u32) -> Result<Vec<LeaderboardEntry>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT u.username, u.full_name,
                   COUNT(t.id) AS total_tests,
                   ROUND(AVG(t.percentage), 2) AS avg_percentage,
                   MAX(t.percentage) AS best_percentage
            FROM users u
            INNER JOIN test_sessions t ON t.user_id = u.id
            GROUP BY u.id
            ORDER BY avg_percentage DESC, total_tests DESC
            LIMIT ?1
            ",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        rows.iter()
            .map(|row| {
                Ok(LeaderboardEntry {
                    username: row.try_get("username").map_err(ser)?,
                    full_name: row.try_get("full_name").map_err(ser)?,
                    total_tests: i64_to_u32(
                        "total_tests",
                        row.try_get("total_tests").map_err(ser)?,
                    )?,
                    avg_percentage: row.try_get("avg_percentage").map_err(ser)?,
                    best_percentage: row.try_get("best_percentage").map_err(ser)?,
                })
            })
            .collect()
    }
}
