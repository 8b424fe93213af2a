use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use chrono::Utc;
use serde::Serialize;
use tracing::{info, instrument};
use uuid::Uuid;
use verdant_core::{
    default_assessment, environmental_class, get_response, personalized_assessment,
    recommendations, ChatInput, ConversationSession, ConversationTurn, ConversationWindow,
    EcoReply, EnvironmentalClass, GlobalInsights, Intent, PointsResult, RankingEntry,
    UsageStatuses, UtilityReading,
};
use verdant_insights::InsightsCache;
use verdant_ml::{UsageFeatures, VerdantMlStack};
use verdant_observability::AppMetrics;
use verdant_storage::{
    new_reading_id, session_expiry, ProfileRepository, RankingRepository, SaveOutcome,
    SessionRepository, StoredReading, UsageRepository, UserProfile,
};

/// Most turns kept per persisted session; the responder only ever reads
/// the trailing `ConversationWindow::CAPACITY` of them.
const SESSION_TURN_CAP: usize = 40;

/// Status + score + recommendation bundle returned for one submission.
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionOutcome {
    pub statuses: UsageStatuses,
    pub efficiency_score: f64,
    pub points: PointsResult,
    pub class: Option<EnvironmentalClass>,
    pub recommendations: Vec<String>,
    pub saved: bool,
    pub reading_id: Option<String>,
}

/// Wires the chat pipeline and the assessment pipeline to the
/// persistence collaborator. Stateless between calls: every computation
/// is a pure pass over explicit inputs followed by a single write.
#[derive(Clone)]
pub struct EcoAgent<S>
where
    S: UsageRepository + ProfileRepository + RankingRepository + SessionRepository,
{
    store: Arc<S>,
    ml_stack: VerdantMlStack,
    insights: Arc<InsightsCache>,
    metrics: Arc<AppMetrics>,
}

impl<S> EcoAgent<S>
where
    S: UsageRepository + ProfileRepository + RankingRepository + SessionRepository,
{
    pub fn new(
        store: Arc<S>,
        ml_stack: VerdantMlStack,
        insights: Arc<InsightsCache>,
        metrics: Arc<AppMetrics>,
    ) -> Self {
        Self {
            store,
            ml_stack,
            insights,
            metrics,
        }
    }

    #[instrument(skip(self, input))]
    pub async fn handle_chat(&self, input: ChatInput) -> Result<EcoReply> {
        let started = Instant::now();
        self.metrics.inc_chat_request();

        let session_id = input
            .session_id
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let session = self.store.load_session(&session_id).await?;
        let mut window = session
            .as_ref()
            .map(ConversationSession::window)
            .unwrap_or_else(ConversationWindow::new);
        // The window biases the fallback; the current message belongs in
        // it too, not just the prior turns.
        window.push(input.text.clone());

        let user = match input.user_id.as_deref() {
            Some(user_id) => self.store.user_context(user_id).await?,
            None => None,
        };

        let (insights, refreshed) = self.insights.get(self.store.as_ref()).await?;
        if refreshed {
            self.metrics.inc_insights_refresh();
        }

        let outcome = get_response(&input.text, &window, user.as_ref(), Some(&insights));
        if outcome.intent == Intent::General {
            self.metrics.inc_chat_fallback();
        }
        if outcome.corrected_tokens > 0 {
            self.metrics
                .add_typo_corrections(outcome.corrected_tokens as u64);
        }

        self.persist_turn(
            session,
            &session_id,
            input.user_id.as_deref(),
            &input.text,
            &outcome.reply_text,
            outcome.intent,
        )
        .await?;

        self.metrics.observe_latency(started.elapsed());
        info!(
            session_id = %session_id,
            intent = ?outcome.intent,
            "chat handled"
        );

        Ok(EcoReply {
            reply_text: outcome.reply_text,
            intent: outcome.intent,
            normalized_text: outcome.normalized_text,
            entities: outcome.entities,
            session_id,
        })
    }

    /// Assess, score, and persist one usage reading. The store enforces
    /// the two-per-day limit; a rejected save still returns the computed
    /// assessment so the caller can show it.
    #[instrument(skip(self, reading))]
    pub async fn submit_reading(
        &self,
        user_id: &str,
        reading: UtilityReading,
    ) -> Result<SubmissionOutcome> {
        let started = Instant::now();
        self.metrics.inc_submission();

        let user = self.store.user_context(user_id).await?;
        if user.is_none() {
            // First submission auto-registers a minimal profile so points
            // have somewhere to accumulate.
            self.store
                .upsert_profile(&UserProfile::minimal(user_id, user_id))
                .await?;
        }

        let scoring = user.as_ref().map(|context| &context.scoring);
        let statuses = match scoring {
            Some(context) => personalized_assessment(&reading, context),
            None => default_assessment(&reading),
        };

        let features = UsageFeatures::from_reading(&reading, scoring);
        let efficiency = self.ml_stack.efficiency.predict(&features);
        let points = verdant_core::score(&statuses, efficiency.score, scoring, &reading);

        let record = StoredReading {
            reading_id: new_reading_id(),
            user_id: user_id.to_string(),
            reading,
            statuses,
            points: points.final_points,
            valid: points.valid,
        };

        let outcome = self.store.save_reading(&record).await?;
        let (saved, reading_id) = match outcome {
            SaveOutcome::Saved { reading_id } => (true, Some(reading_id)),
            SaveOutcome::DailyLimitExceeded => {
                self.metrics.inc_submission_rejected();
                (false, None)
            }
        };

        let mut class = user.as_ref().and_then(|context| context.class);
        if saved {
            self.store
                .increment_points(user_id, points.final_points)
                .await?;

            let history = self.store.historical_readings(user_id, 365).await?;
            let recomputed = environmental_class(&history);
            self.store.set_class(user_id, recomputed).await?;
            class = Some(recomputed);
        }

        self.metrics.observe_latency(started.elapsed());
        info!(
            user_id = %user_id,
            saved,
            points = points.final_points,
            efficiency = efficiency.score,
            model = efficiency.model,
            "reading submitted"
        );

        Ok(SubmissionOutcome {
            statuses,
            efficiency_score: efficiency.score,
            points,
            class,
            recommendations: recommendations(&statuses),
            saved,
            reading_id,
        })
    }

    pub async fn register_user(&self, profile: &UserProfile) -> Result<()> {
        self.store.upsert_profile(profile).await
    }

    pub async fn leaderboard(&self, limit: usize) -> Result<Vec<RankingEntry>> {
        self.store.global_rankings(limit).await
    }

    pub async fn community_insights(&self) -> Result<GlobalInsights> {
        let (insights, refreshed) = self.insights.get(self.store.as_ref()).await?;
        if refreshed {
            self.metrics.inc_insights_refresh();
        }
        Ok(insights)
    }

    pub async fn purge_expired_sessions(&self) -> Result<u64> {
        self.store.purge_expired(Utc::now()).await
    }

    pub fn metrics(&self) -> &AppMetrics {
        &self.metrics
    }

    async fn persist_turn(
        &self,
        session: Option<ConversationSession>,
        session_id: &str,
        user_id: Option<&str>,
        user_text: &str,
        assistant_text: &str,
        intent: Intent,
    ) -> Result<()> {
        let mut session = session.unwrap_or_else(|| ConversationSession {
            session_id: session_id.to_string(),
            user_id: None,
            expires_at: session_expiry(Utc::now()),
            turns: Vec::new(),
        });

        if let Some(user_id) = user_id {
            session.user_id = Some(user_id.to_string());
        }
        session.expires_at = session_expiry(Utc::now());
        session.turns.push(ConversationTurn {
            at: Utc::now(),
            user_text: user_text.to_string(),
            assistant_text: assistant_text.to_string(),
            intent,
        });

        if session.turns.len() > SESSION_TURN_CAP {
            let keep_from = session.turns.len() - SESSION_TURN_CAP;
            session.turns = session.turns.split_off(keep_from);
        }

        self.store.upsert_session(&session).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use verdant_storage::MemoryStore;

    fn agent() -> EcoAgent<MemoryStore> {
        EcoAgent::new(
            Arc::new(MemoryStore::new()),
            VerdantMlStack::load_default(),
            Arc::new(InsightsCache::with_default_ttl()),
            AppMetrics::shared(),
        )
    }

    fn chat(text: &str, session_id: Option<&str>) -> ChatInput {
        ChatInput {
            session_id: session_id.map(str::to_string),
            text: text.to_string(),
            user_id: None,
        }
    }

    #[tokio::test]
    async fn chat_mints_a_session_and_persists_the_turn() {
        let agent = agent();
        let reply = agent.handle_chat(chat("hello there", None)).await.unwrap();
        assert_eq!(reply.intent, Intent::Greeting);
        assert!(!reply.session_id.is_empty());

        let reply = agent
            .handle_chat(chat("how are my points calculated", Some(&reply.session_id)))
            .await
            .unwrap();
        assert_eq!(reply.intent, Intent::PointsScoring);
        assert_eq!(agent.metrics().snapshot().chat_requests_total, 2);
    }

    #[tokio::test]
    async fn first_submission_auto_registers_and_awards_points() {
        let agent = agent();
        let outcome = agent
            .submit_reading("u-1", UtilityReading::new(40.0, 10.0, 4.0))
            .await
            .unwrap();

        assert!(outcome.saved);
        assert!(outcome.points.final_points > 0.0);
        assert!(outcome.class.is_some());
        assert!(!outcome.recommendations.is_empty());

        let board = agent.leaderboard(10).await.unwrap();
        assert_eq!(board.len(), 1);
        assert!((board[0].total_points - outcome.points.final_points).abs() < 1e-9);
    }

    #[tokio::test]
    async fn third_daily_submission_is_rejected_but_still_assessed() {
        let agent = agent();
        for _ in 0..verdant_storage::DAILY_READING_LIMIT {
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
        assert!(rejected.reading_id.is_none());
        assert!(rejected.points.final_points > 0.0);
        assert_eq!(agent.metrics().snapshot().submissions_rejected_total, 1);
    }

    #[tokio::test]
    async fn typo_corrections_are_counted() {
        let agent = agent();
        agent
            .handle_chat(chat("how do i recicle plastik botles", None))
            .await
            .unwrap();
        assert_eq!(agent.metrics().snapshot().typo_corrections_total, 3);

        agent
            .handle_chat(chat("how much water did i use", None))
            .await
            .unwrap();
        assert_eq!(agent.metrics().snapshot().typo_corrections_total, 3);
    }

    #[tokio::test]
    async fn first_turn_help_request_gets_guidance() {
        let agent = agent();
        let reply = agent
            .handle_chat(chat("help me please", None))
            .await
            .unwrap();

        // The current message counts as part of the conversation window,
        // so its help signal steers the fallback on the very first turn.
        assert_eq!(reply.intent, Intent::General);
        assert!(reply.reply_text.contains("Happy to help"));
    }

    #[tokio::test]
    async fn fallback_chat_is_counted() {
        let agent = agent();
        agent
            .handle_chat(chat("zxcvb asdf qwerty", None))
            .await
            .unwrap();
        assert_eq!(agent.metrics().snapshot().chat_fallback_total, 1);
    }
}
