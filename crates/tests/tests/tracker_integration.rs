use std::sync::Arc;

use verdant_agents::EcoAgent;
use verdant_core::{ChatInput, EnvironmentalClass, Intent, UsageStatus, UtilityReading};
use verdant_insights::InsightsCache;
use verdant_ml::VerdantMlStack;
use verdant_observability::AppMetrics;
use verdant_storage::{MemoryStore, Store, UserProfile, DAILY_READING_LIMIT};

fn agent() -> EcoAgent<MemoryStore> {
    EcoAgent::new(
        Arc::new(MemoryStore::new()),
        VerdantMlStack::load_default(),
        Arc::new(InsightsCache::with_default_ttl()),
        AppMetrics::shared(),
    )
}

fn chat(text: &str, session_id: Option<&str>, user_id: Option<&str>) -> ChatInput {
    ChatInput {
        session_id: session_id.map(str::to_string),
        text: text.to_string(),
        user_id: user_id.map(str::to_string),
    }
}

#[tokio::test]
async fn typo_laden_chat_resolves_through_the_full_pipeline() {
    let agent = agent();

    let reply = agent
        .handle_chat(chat("how do i recicle plastik botles", None, None))
        .await
        .unwrap();

    assert_eq!(reply.intent, Intent::RecyclingHelp);
    assert_eq!(reply.normalized_text, "how do i recycle plastic bottles");
    assert!(reply.reply_text.contains("recycling code"));
    assert!(!reply.session_id.is_empty());
}

#[tokio::test]
async fn session_survives_across_turns() {
    let agent = agent();

    let first = agent.handle_chat(chat("hello", None, None)).await.unwrap();
    let second = agent
        .handle_chat(chat(
            "how can i reduce my water usage",
            Some(&first.session_id),
            None,
        ))
        .await
        .unwrap();

    assert_eq!(first.session_id, second.session_id);
    assert_eq!(second.intent, Intent::UtilityHelp);
}

#[tokio::test]
async fn registered_profile_personalizes_the_greeting() {
    let agent = agent();
    let mut profile = UserProfile::minimal("u-1", "robin");
    profile.household_size = 3;
    agent.register_user(&profile).await.unwrap();

    let reply = agent
        .handle_chat(chat("hello there", None, Some("u-1")))
        .await
        .unwrap();

    assert_eq!(reply.intent, Intent::Greeting);
    assert!(reply.reply_text.contains("robin"));
}

#[tokio::test]
async fn submission_assesses_scores_and_ranks() {
    let agent = agent();
    agent
        .register_user(&UserProfile::minimal("u-1", "robin"))
        .await
        .unwrap();

    let outcome = agent
        .submit_reading("u-1", UtilityReading::new(3.5, 50.0, 4.0))
        .await
        .unwrap();

    assert!(outcome.saved);
    assert_eq!(outcome.statuses.water, UsageStatus::Excellent);
    assert_eq!(outcome.statuses.electricity, UsageStatus::High);
    assert!(outcome.points.final_points >= 0.0);
    assert!(outcome.points.final_points <= 10.0);

    let rankings = agent.leaderboard(10).await.unwrap();
    assert_eq!(rankings[0].username, "robin");
    assert!((rankings[0].total_points - outcome.points.final_points).abs() < 1e-9);
}

#[tokio::test]
async fn daily_limit_blocks_the_third_submission() {
    let agent = agent();
    agent
        .register_user(&UserProfile::minimal("u-1", "robin"))
        .await
        .unwrap();

    for _ in 0..DAILY_READING_LIMIT {
        let outcome = agent
            .submit_reading("u-1", UtilityReading::new(40.0, 10.0, 4.0))
            .await
            .unwrap();
        assert!(outcome.saved);
    }

    let rejected = agent
        .submit_reading("u-1", UtilityReading::new(40.0, 10.0, 4.0))
        .await
        .unwrap();
    assert!(!rejected.saved);

    // Rejected submissions earn nothing.
    let rankings = agent.leaderboard(10).await.unwrap();
    let expected: f64 = rankings[0].total_points;
    let again = agent.leaderboard(10).await.unwrap();
    assert!((again[0].total_points - expected).abs() < 1e-9);
}

#[tokio::test]
async fn frugal_history_earns_class_a() {
    let agent = agent();
    agent
        .register_user(&UserProfile::minimal("u-1", "robin"))
        .await
        .unwrap();

    let outcome = agent
        .submit_reading("u-1", UtilityReading::new(20.0, 8.0, 2.0))
        .await
        .unwrap();

    assert_eq!(outcome.class, Some(EnvironmentalClass::A));
}

#[tokio::test]
async fn implausible_reading_is_capped_and_flagged() {
    let agent = agent();

    let outcome = agent
        .submit_reading("u-1", UtilityReading::new(50.0, 10.0, 500.0))
        .await
        .unwrap();

    assert!(outcome.points.final_points <= 6.0);
    assert!(!outcome.points.penalty.warnings.is_empty());
}

#[tokio::test]
async fn insights_reflect_saved_submissions() {
    let agent = agent();
    for (user, water) in [("u-1", 20.0), ("u-2", 80.0)] {
        agent
            .register_user(&UserProfile::minimal(user, user))
            .await
            .unwrap();
        agent
            .submit_reading(user, UtilityReading::new(water, 10.0, 4.0))
            .await
            .unwrap();
    }

    let insights = agent.community_insights().await.unwrap();
    assert_eq!(insights.total_users, 2);
    assert!(insights.average_points > 0.0);
    assert!(!insights.top_performers.is_empty());
}

#[tokio::test]
async fn sqlite_store_round_trips_a_submission() {
    let store = Store::sqlite("sqlite::memory:").await.unwrap();
    let agent = EcoAgent::new(
        Arc::new(store),
        VerdantMlStack::load_default(),
        Arc::new(InsightsCache::with_default_ttl()),
        AppMetrics::shared(),
    );

    agent
        .register_user(&UserProfile::minimal("u-1", "robin"))
        .await
        .unwrap();
    let outcome = agent
        .submit_reading("u-1", UtilityReading::new(40.0, 10.0, 4.0))
        .await
        .unwrap();
    assert!(outcome.saved);

    let rankings = agent.leaderboard(5).await.unwrap();
    assert_eq!(rankings[0].username, "robin");
    assert!(rankings[0].total_points > 0.0);
}
