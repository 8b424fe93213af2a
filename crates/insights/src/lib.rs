//! Community aggregates. Rankings come from the persistence collaborator;
//! this crate folds them into a `GlobalInsights` snapshot and serves it
//! through a short-TTL read-through cache. Staleness inside the window is
//! acceptable by design - insights are a talking point, not a ledger.

use std::collections::BTreeMap;

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use verdant_core::{GlobalInsights, RankingEntry};
use verdant_storage::RankingRepository;

const TOP_PERFORMERS: usize = 5;
const RANKING_FETCH_LIMIT: usize = 1000;

/// Pure fold from a ranking slice to the aggregate snapshot.
pub fn compute_insights(rankings: &[RankingEntry]) -> GlobalInsights {
    if rankings.is_empty() {
        return GlobalInsights::default();
    }

    let total_points: f64 = rankings.iter().map(|entry| entry.total_points).sum();
    let mut class_distribution = BTreeMap::new();
    for entry in rankings {
        *class_distribution.entry(entry.class).or_insert(0_u64) += 1;
    }

    GlobalInsights {
        total_users: rankings.len() as u64,
        average_points: total_points / rankings.len() as f64,
        class_distribution,
        top_performers: rankings.iter().take(TOP_PERFORMERS).cloned().collect(),
    }
}

struct CachedSnapshot {
    insights: GlobalInsights,
    fetched_at: DateTime<Utc>,
}

pub struct InsightsCache {
    ttl: Duration,
    snapshot: RwLock<Option<CachedSnapshot>>,
}

impl InsightsCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            snapshot: RwLock::new(None),
        }
    }

    pub fn with_default_ttl() -> Self {
        Self::new(Duration::minutes(10))
    }

    /// Serves the cached snapshot while fresh, otherwise recomputes from
    /// the ranking repository. Returns whether a refresh happened so the
    /// caller can count it.
    pub async fn get<R: RankingRepository>(&self, rankings: &R) -> Result<(GlobalInsights, bool)> {
        let now = Utc::now();

        if let Some(cached) = self.snapshot.read().as_ref() {
            if now - cached.fetched_at < self.ttl {
                return Ok((cached.insights.clone(), false));
            }
        }

        let entries = rankings.global_rankings(RANKING_FETCH_LIMIT).await?;
        let insights = compute_insights(&entries);

        *self.snapshot.write() = Some(CachedSnapshot {
            insights: insights.clone(),
            fetched_at: now,
        });

        Ok((insights, true))
    }

    /// Drops the cached snapshot; the next `get` recomputes.
    pub fn invalidate(&self) {
        *self.snapshot.write() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use verdant_core::EnvironmentalClass;
    use verdant_storage::{MemoryStore, ProfileRepository, UsageRepository, UserProfile};

    fn entry(username: &str, points: f64, class: EnvironmentalClass) -> RankingEntry {
        RankingEntry {
            username: username.to_string(),
            total_points: points,
            class,
            location: String::new(),
        }
    }

    #[test]
    fn empty_rankings_yield_default_insights() {
        let insights = compute_insights(&[]);
        assert_eq!(insights.total_users, 0);
        assert_eq!(insights.average_points, 0.0);
        assert!(insights.top_performers.is_empty());
    }

    #[test]
    fn aggregates_count_average_and_distribution() {
        let rankings = vec![
            entry("ada", 60.0, EnvironmentalClass::A),
            entry("ben", 30.0, EnvironmentalClass::B),
            entry("cal", 30.0, EnvironmentalClass::B),
        ];
        let insights = compute_insights(&rankings);

        assert_eq!(insights.total_users, 3);
        assert!((insights.average_points - 40.0).abs() < 1e-9);
        assert_eq!(insights.class_distribution[&EnvironmentalClass::B], 2);
        assert_eq!(insights.top_performers[0].username, "ada");
    }

    #[tokio::test]
    async fn cache_serves_stale_within_ttl() {
        let store = MemoryStore::new();
        store
            .upsert_profile(&UserProfile::minimal("u-1", "ada"))
            .await
            .unwrap();
        store.increment_points("u-1", 10.0).await.unwrap();

        let cache = InsightsCache::new(Duration::minutes(10));
        let (first, refreshed) = cache.get(&store).await.unwrap();
        assert!(refreshed);
        assert_eq!(first.total_users, 1);

        // A new user arrives, but the cached snapshot still answers.
        store
            .upsert_profile(&UserProfile::minimal("u-2", "ben"))
            .await
            .unwrap();
        let (second, refreshed) = cache.get(&store).await.unwrap();
        assert!(!refreshed);
        assert_eq!(second.total_users, 1);

        cache.invalidate();
        let (third, refreshed) = cache.get(&store).await.unwrap();
        assert!(refreshed);
        assert_eq!(third.total_users, 2);
    }
}
