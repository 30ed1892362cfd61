use aptitude_core::model::{AnswerDetail, QuestionId, SubmitTrigger, TestReport, UserId};
use aptitude_core::time::fixed_now;
use chrono::Duration;
use storage::repository::{
    NewUser, StorageError, TestSessionRepository, TokenRecord, TokenRepository, UserRepository,
};
use storage::sqlite::SqliteRepository;

fn new_user(name: &str) -> NewUser {
    NewUser {
        username: name.to_string(),
        email: format!("{name}@example.com"),
        password_hash: "$argon2id$stub".to_string(),
        full_name: name.to_uppercase(),
        created_at: fixed_now(),
    }
}

fn report(score: u32, total: u32, time_taken: u32, trigger: SubmitTrigger) -> TestReport {
    let answers = (0..total)
        .map(|i| AnswerDetail {
            question_id: QuestionId::new(u64::from(i) + 1),
            question: format!("Q{i}"),
            user_answer: if i < score { Some(0) } else { None },
            correct_answer: 0,
            is_correct: i < score,
        })
        .collect();
    TestReport::new(score, total, time_taken, trigger, answers)
}

async fn connect(name: &str) -> SqliteRepository {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    let repo = SqliteRepository::connect(&url).await.expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

#[tokio::test]
async fn duplicate_username_is_a_conflict() {
    let repo = connect("memdb_user_conflict").await;

    repo.create_user(&new_user("amir")).await.expect("first");
    let err = repo.create_user(&new_user("amir")).await.unwrap_err();
    assert!(matches!(err, StorageError::Conflict));
}

#[tokio::test]
async fn login_lookup_matches_username_or_email() {
    let repo = connect("memdb_login").await;

    let created = repo.create_user(&new_user("sara")).await.expect("create");
    let by_name = repo.find_by_login("sara").await.expect("query");
    let by_email = repo.find_by_login("sara@example.com").await.expect("query");
    assert_eq!(by_name.map(|u| u.id), Some(created.id));
    assert_eq!(by_email.map(|u| u.id), Some(created.id));
    assert!(repo.find_by_login("nobody").await.expect("query").is_none());

    let fetched = repo.get_user(created.id).await.expect("query").expect("row");
    assert_eq!(fetched.full_name, "SARA");
}

#[tokio::test]
async fn token_roundtrip_and_delete() {
    let repo = connect("memdb_tokens").await;

    let user = repo.create_user(&new_user("reza")).await.expect("create");
    let record = TokenRecord {
        token: "abc123".to_string(),
        user_id: user.id,
        issued_at: fixed_now(),
        expires_at: fixed_now() + Duration::days(7),
    };
    repo.store_token(&record).await.expect("store");

    let found = repo.find_token("abc123").await.expect("query").expect("row");
    assert_eq!(found.user_id, user.id);
    assert_eq!(found.expires_at, record.expires_at);

    repo.delete_token("abc123").await.expect("delete");
    assert!(repo.find_token("abc123").await.expect("query").is_none());
    // deleting again is a no-op
    repo.delete_token("abc123").await.expect("delete");
}

#[tokio::test]
async fn history_pages_newest_first() {
    let repo = connect("memdb_history").await;
    let user = repo.create_user(&new_user("nima")).await.expect("create");

    for i in 0..5u32 {
        let date = fixed_now() + Duration::hours(i64::from(i));
        repo.append_session(user.id, &report(i, 10, 60, SubmitTrigger::Manual), date)
            .await
            .expect("append");
    }

    let page1 = repo.history(user.id, 1, 2).await.expect("history");
    assert_eq!(page1.total, 5);
    assert_eq!(page1.total_pages, 3);
    assert_eq!(page1.sessions.len(), 2);
    assert_eq!(page1.sessions[0].score, 4);
    assert_eq!(page1.sessions[1].score, 3);

    let page3 = repo.history(user.id, 3, 2).await.expect("history");
    assert_eq!(page3.sessions.len(), 1);
    assert_eq!(page3.sessions[0].score, 0);

    // page 0 is normalized to page 1
    let normalized = repo.history(user.id, 0, 2).await.expect("history");
    assert_eq!(normalized.page, 1);
    assert_eq!(normalized.sessions[0].score, 4);
}

#[tokio::test]
async fn statistics_aggregate_over_sessions() {
    let repo = connect("memdb_stats").await;
    let user = repo.create_user(&new_user("lena")).await.expect("create");

    repo.append_session(user.id, &report(5, 10, 120, SubmitTrigger::Manual), fixed_now())
        .await
        .expect("append");
    repo.append_session(
        user.id,
        &report(8, 10, 300, SubmitTrigger::TimerExpiry),
        fixed_now() + Duration::hours(1),
    )
    .await
    .expect("append");

    let stats = repo.statistics(user.id).await.expect("stats");
    assert_eq!(stats.total_tests, 2);
    assert_eq!(stats.avg_percentage, Some(65.0));
    assert_eq!(stats.best_percentage, Some(80.0));
    assert_eq!(stats.lowest_percentage, Some(50.0));
    assert_eq!(stats.total_time_spent_seconds, Some(420));
    assert_eq!(stats.highest_score, Some(8));
}

#[tokio::test]
async fn statistics_for_empty_user_are_all_none() {
    let repo = connect("memdb_stats_empty").await;
    let user = repo.create_user(&new_user("vida")).await.expect("create");

    let stats = repo.statistics(user.id).await.expect("stats");
    assert_eq!(stats.total_tests, 0);
    assert_eq!(stats.avg_percentage, None);
    assert_eq!(stats.total_time_spent_seconds, None);
    assert_eq!(stats.highest_score, None);

    // unknown user behaves the same
    let stats = repo.statistics(UserId::new(999)).await.expect("stats");
    assert_eq!(stats.total_tests, 0);
}

#[tokio::test]
async fn recent_trend_is_oldest_first() {
    let repo = connect("memdb_trend").await;
    let user = repo.create_user(&new_user("omid")).await.expect("create");

    for (i, score) in [2u32, 4, 6, 8].into_iter().enumerate() {
        let date = fixed_now() + Duration::hours(i as i64);
        repo.append_session(user.id, &report(score, 10, 60, SubmitTrigger::Manual), date)
            .await
            .expect("append");
    }

    let trend = repo.recent_trend(user.id, 3).await.expect("trend");
    let percentages: Vec<f64> = trend.iter().map(|p| p.percentage).collect();
    assert_eq!(percentages, vec![40.0, 60.0, 80.0]);
}

#[tokio::test]
async fn leaderboard_orders_by_average_then_count() {
    let repo = connect("memdb_leaderboard").await;
    let a = repo.create_user(&new_user("alpha")).await.expect("create");
    let b = repo.create_user(&new_user("beta")).await.expect("create");
    let c = repo.create_user(&new_user("gamma")).await.expect("create");

    // alpha: avg 70, two tests; beta: avg 70, one test; gamma: avg 90
    repo.append_session(a.id, &report(6, 10, 60, SubmitTrigger::Manual), fixed_now())
        .await
        .expect("append");
    repo.append_session(
        a.id,
        &report(8, 10, 60, SubmitTrigger::Manual),
        fixed_now() + Duration::hours(1),
    )
    .await
    .expect("append");
    repo.append_session(b.id, &report(7, 10, 60, SubmitTrigger::Manual), fixed_now())
        .await
        .expect("append");
    repo.append_session(
        c.id,
        &report(9, 10, 60, SubmitTrigger::WarningThreshold),
        fixed_now(),
    )
    .await
    .expect("append");

    let board = repo.leaderboard(10).await.expect("leaderboard");
    let names: Vec<&str> = board.iter().map(|e| e.username.as_str()).collect();
    assert_eq!(names, vec!["gamma", "alpha", "beta"]);
    assert_eq!(board[1].total_tests, 2);
    assert_eq!(board[1].avg_percentage, 70.0);
    assert_eq!(board[1].best_percentage, 80.0);
}
