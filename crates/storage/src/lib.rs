use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};
use thiserror::Error;
use uuid::Uuid;
use verdant_core::{
    ClimateZone, ConversationSession, EnvironmentalClass, HousingType, LocationType, RankingEntry,
    ScoringContext, UsageStatuses, UserContext, UtilityReading,
};

/// Rolling daily submission cap, anchored to the UTC calendar day.
pub const DAILY_READING_LIMIT: usize = 2;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("unknown user: {0}")]
    UnknownUser(String),
}

/// Profile fields owned by the store; `ScoringContext` is derived from
/// these plus the saved reading history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,
    pub username: String,
    pub location: String,
    pub household_size: u32,
    pub adults: u32,
    pub children: u32,
    pub seniors: u32,
    pub housing_type: HousingType,
    pub location_type: LocationType,
    pub climate_zone: ClimateZone,
    pub energy_features: std::collections::BTreeSet<String>,
}

impl UserProfile {
    pub fn minimal(user_id: &str, username: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            username: username.to_string(),
            location: String::new(),
            household_size: 1,
            adults: 1,
            children: 0,
            seniors: 0,
            housing_type: HousingType::Unknown,
            location_type: LocationType::Unknown,
            climate_zone: ClimateZone::Unknown,
            energy_features: std::collections::BTreeSet::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredReading {
    pub reading_id: String,
    pub user_id: String,
    pub reading: UtilityReading,
    pub statuses: UsageStatuses,
    pub points: f64,
    pub valid: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved { reading_id: String },
    DailyLimitExceeded,
}

pub trait UsageRepository: Send + Sync {
    /// Most recent first.
    async fn historical_readings(&self, user_id: &str, limit: usize) -> Result<Vec<UtilityReading>>;
    /// Refuses the third save of a UTC day with `DailyLimitExceeded`.
    async fn save_reading(&self, record: &StoredReading) -> Result<SaveOutcome>;
    /// Single atomic add; callers must never read-modify-write totals.
    async fn increment_points(&self, user_id: &str, delta: f64) -> Result<()>;
    async fn set_class(&self, user_id: &str, class: EnvironmentalClass) -> Result<()>;
}

pub trait ProfileRepository: Send + Sync {
    async fn upsert_profile(&self, profile: &UserProfile) -> Result<()>;
    async fn user_context(&self, user_id: &str) -> Result<Option<UserContext>>;
}

pub trait RankingRepository: Send + Sync {
    /// Ordered by total points, best first.
    async fn global_rankings(&self, limit: usize) -> Result<Vec<RankingEntry>>;
}

pub trait SessionRepository: Send + Sync {
    async fn load_session(&self, session_id: &str) -> Result<Option<ConversationSession>>;
    async fn upsert_session(&self, session: &ConversationSession) -> Result<()>;
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64>;
}

#[derive(Debug, Clone, Default)]
struct UserRecord {
    profile: Option<UserProfile>,
    total_points: f64,
    class: Option<EnvironmentalClass>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    users: Arc<RwLock<HashMap<String, UserRecord>>>,
    readings: Arc<RwLock<Vec<StoredReading>>>,
    sessions: Arc<RwLock<HashMap<String, ConversationSession>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn scoring_context(&self, profile: &UserProfile, history: Vec<UtilityReading>) -> ScoringContext {
        ScoringContext {
            household_size: profile.household_size.max(1),
            adults: profile.adults,
            children: profile.children,
            seniors: profile.seniors,
            housing_type: profile.housing_type,
            location_type: profile.location_type,
            climate_zone: profile.climate_zone,
            energy_features: profile.energy_features.clone(),
            historical_readings: history,
        }
    }

    fn history_for(&self, user_id: &str, limit: usize) -> Vec<UtilityReading> {
        let readings = self.readings.read();
        let mut history: Vec<_> = readings
            .iter()
            .filter(|record| record.user_id == user_id)
            .map(|record| record.reading)
            .collect();
        history.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
        history.truncate(limit);
        history
    }
}

impl UsageRepository for MemoryStore {
    async fn historical_readings(&self, user_id: &str, limit: usize) -> Result<Vec<UtilityReading>> {
        Ok(self.history_for(user_id, limit))
    }

    async fn save_reading(&self, record: &StoredReading) -> Result<SaveOutcome> {
        // The limit check and the append share one write lock so two
        // concurrent saves cannot both pass the pre-check.
        let mut readings = self.readings.write();
        let today = record.reading.recorded_at.date_naive();
        let saved_today = readings
            .iter()
            .filter(|existing| existing.user_id == record.user_id)
            .filter(|existing| existing.reading.recorded_at.date_naive() == today)
            .count();

        if saved_today >= DAILY_READING_LIMIT {
            return Ok(SaveOutcome::DailyLimitExceeded);
        }

        readings.push(record.clone());
        Ok(SaveOutcome::Saved {
            reading_id: record.reading_id.clone(),
        })
    }

    async fn increment_points(&self, user_id: &str, delta: f64) -> Result<()> {
        let mut users = self.users.write();
        let record = users.entry(user_id.to_string()).or_default();
        record.total_points += delta;
        Ok(())
    }

    async fn set_class(&self, user_id: &str, class: EnvironmentalClass) -> Result<()> {
        let mut users = self.users.write();
        let record = users.entry(user_id.to_string()).or_default();
        record.class = Some(class);
        Ok(())
    }
}

impl ProfileRepository for MemoryStore {
    async fn upsert_profile(&self, profile: &UserProfile) -> Result<()> {
        let mut users = self.users.write();
        let record = users.entry(profile.user_id.clone()).or_default();
        record.profile = Some(profile.clone());
        Ok(())
    }

    async fn user_context(&self, user_id: &str) -> Result<Option<UserContext>> {
        let record = {
            let users = self.users.read();
            match users.get(user_id) {
                Some(record) => record.clone(),
                None => return Ok(None),
            }
        };

        let Some(profile) = record.profile else {
            return Ok(None);
        };

        let history = self.history_for(user_id, 365);
        Ok(Some(UserContext {
            user_id: profile.user_id.clone(),
            username: profile.username.clone(),
            total_points: record.total_points,
            class: record.class,
            scoring: self.scoring_context(&profile, history),
        }))
    }
}

impl RankingRepository for MemoryStore {
    async fn global_rankings(&self, limit: usize) -> Result<Vec<RankingEntry>> {
        let users = self.users.read();
        let mut entries: Vec<RankingEntry> = users
            .values()
            .filter_map(|record| {
                record.profile.as_ref().map(|profile| RankingEntry {
                    username: profile.username.clone(),
                    total_points: record.total_points,
                    class: record.class.unwrap_or(EnvironmentalClass::B),
                    location: profile.location.clone(),
                })
            })
            .collect();

        entries.sort_by(|a, b| {
            b.total_points
                .partial_cmp(&a.total_points)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.username.cmp(&b.username))
        });
        entries.truncate(limit);
        Ok(entries)
    }
}

impl SessionRepository for MemoryStore {
    async fn load_session(&self, session_id: &str) -> Result<Option<ConversationSession>> {
        Ok(self.sessions.read().get(session_id).cloned())
    }

    async fn upsert_session(&self, session: &ConversationSession) -> Result<()> {
        self.sessions
            .write()
            .insert(session.session_id.clone(), session.clone());
        Ok(())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut removed = 0_u64;
        self.sessions.write().retain(|_, session| {
            let keep = session.expires_at > now;
            if !keep {
                removed += 1;
            }
            keep
        });
        Ok(removed)
    }
}

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url)
            .await
            .with_context(|| format!("failed connecting to sqlite at {}", database_url))?;

        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
              user_id TEXT PRIMARY KEY,
              username TEXT NOT NULL,
              location TEXT NOT NULL DEFAULT '',
              total_points REAL NOT NULL DEFAULT 0,
              class TEXT,
              profile_json TEXT
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS readings (
              reading_id TEXT PRIMARY KEY,
              user_id TEXT NOT NULL,
              recorded_at TEXT NOT NULL,
              recorded_day TEXT NOT NULL,
              water_gallons REAL NOT NULL,
              electricity_kwh REAL NOT NULL,
              gas_cubic_m REAL NOT NULL,
              statuses_json TEXT NOT NULL,
              points REAL NOT NULL,
              valid INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_readings_user_day
            ON readings (user_id, recorded_day);
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
              session_id TEXT PRIMARY KEY,
              user_id TEXT,
              expires_at TEXT NOT NULL,
              turns_json TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

impl UsageRepository for SqliteStore {
    async fn historical_readings(&self, user_id: &str, limit: usize) -> Result<Vec<UtilityReading>> {
        let rows = sqlx::query(
            r#"
            SELECT recorded_at, water_gallons, electricity_kwh, gas_cubic_m
            FROM readings
            WHERE user_id = ?1
            ORDER BY recorded_at DESC
            LIMIT ?2
            "#,
        )
        .bind(user_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        let history = rows
            .into_iter()
            .map(|row| UtilityReading {
                water_gallons: row.get("water_gallons"),
                electricity_kwh: row.get("electricity_kwh"),
                gas_cubic_m: row.get("gas_cubic_m"),
                recorded_at: row
                    .get::<String, _>("recorded_at")
                    .parse()
                    .unwrap_or_else(|_| Utc::now()),
            })
            .collect();

        Ok(history)
    }

    async fn save_reading(&self, record: &StoredReading) -> Result<SaveOutcome> {
        let day = record.reading.recorded_at.date_naive().to_string();

        // Conditional insert keeps the limit check and the write in one
        // statement, so concurrent submissions cannot both slip past.
        let result = sqlx::query(
            r#"
            INSERT INTO readings (
              reading_id, user_id, recorded_at, recorded_day,
              water_gallons, electricity_kwh, gas_cubic_m,
              statuses_json, points, valid
            )
            SELECT ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10
            WHERE (
              SELECT COUNT(*) FROM readings
              WHERE user_id = ?2 AND recorded_day = ?4
            ) < ?11
            "#,
        )
        .bind(&record.reading_id)
        .bind(&record.user_id)
        .bind(record.reading.recorded_at.to_rfc3339())
        .bind(&day)
        .bind(record.reading.water_gallons)
        .bind(record.reading.electricity_kwh)
        .bind(record.reading.gas_cubic_m)
        .bind(serde_json::to_string(&record.statuses)?)
        .bind(record.points)
        .bind(i64::from(record.valid))
        .bind(DAILY_READING_LIMIT as i64)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            Ok(SaveOutcome::DailyLimitExceeded)
        } else {
            Ok(SaveOutcome::Saved {
                reading_id: record.reading_id.clone(),
            })
        }
    }

    async fn increment_points(&self, user_id: &str, delta: f64) -> Result<()> {
        let result = sqlx::query(
            "UPDATE users SET total_points = total_points + ?1 WHERE user_id = ?2",
        )
        .bind(delta)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::UnknownUser(user_id.to_string()).into());
        }
        Ok(())
    }

    async fn set_class(&self, user_id: &str, class: EnvironmentalClass) -> Result<()> {
        sqlx::query("UPDATE users SET class = ?1 WHERE user_id = ?2")
            .bind(class.as_str())
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

impl ProfileRepository for SqliteStore {
    async fn upsert_profile(&self, profile: &UserProfile) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO users (user_id, username, location, profile_json)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(user_id) DO UPDATE SET
              username=excluded.username,
              location=excluded.location,
              profile_json=excluded.profile_json
            "#,
        )
        .bind(&profile.user_id)
        .bind(&profile.username)
        .bind(&profile.location)
        .bind(serde_json::to_string(profile)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn user_context(&self, user_id: &str) -> Result<Option<UserContext>> {
        let row = sqlx::query(
            "SELECT username, total_points, class, profile_json FROM users WHERE user_id = ?1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let profile: UserProfile = match row.get::<Option<String>, _>("profile_json") {
            Some(json) => serde_json::from_str(&json)
                .unwrap_or_else(|_| UserProfile::minimal(user_id, &row.get::<String, _>("username"))),
            None => UserProfile::minimal(user_id, &row.get::<String, _>("username")),
        };

        let history = self.historical_readings(user_id, 365).await?;

        Ok(Some(UserContext {
            user_id: user_id.to_string(),
            username: profile.username.clone(),
            total_points: row.get("total_points"),
            class: EnvironmentalClass::from_optional_str(
                row.get::<Option<String>, _>("class").as_deref(),
            ),
            scoring: ScoringContext {
                household_size: profile.household_size.max(1),
                adults: profile.adults,
                children: profile.children,
                seniors: profile.seniors,
                housing_type: profile.housing_type,
                location_type: profile.location_type,
                climate_zone: profile.climate_zone,
                energy_features: profile.energy_features,
                historical_readings: history,
            },
        }))
    }
}

impl RankingRepository for SqliteStore {
    async fn global_rankings(&self, limit: usize) -> Result<Vec<RankingEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT username, total_points, class, location
            FROM users
            ORDER BY total_points DESC, username ASC
            LIMIT ?1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        let entries = rows
            .into_iter()
            .map(|row| RankingEntry {
                username: row.get("username"),
                total_points: row.get("total_points"),
                class: EnvironmentalClass::from_optional_str(
                    row.get::<Option<String>, _>("class").as_deref(),
                )
                .unwrap_or(EnvironmentalClass::B),
                location: row.get("location"),
            })
            .collect();

        Ok(entries)
    }
}

impl SessionRepository for SqliteStore {
    async fn load_session(&self, session_id: &str) -> Result<Option<ConversationSession>> {
        let row = sqlx::query(
            "SELECT session_id, user_id, expires_at, turns_json FROM sessions WHERE session_id = ?1",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let turns_json: String = row.get("turns_json");
        let turns = serde_json::from_str(&turns_json).unwrap_or_default();

        Ok(Some(ConversationSession {
            session_id: row.get("session_id"),
            user_id: row.get("user_id"),
            expires_at: row
                .get::<String, _>("expires_at")
                .parse()
                .unwrap_or_else(|_| Utc::now()),
            turns,
        }))
    }

    async fn upsert_session(&self, session: &ConversationSession) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sessions (session_id, user_id, expires_at, turns_json)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(session_id) DO UPDATE SET
              user_id=excluded.user_id,
              expires_at=excluded.expires_at,
              turns_json=excluded.turns_json
            "#,
        )
        .bind(&session.session_id)
        .bind(&session.user_id)
        .bind(session.expires_at.to_rfc3339())
        .bind(serde_json::to_string(&session.turns)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at < ?1")
            .bind(now.to_rfc3339())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[derive(Clone)]
pub enum Store {
    Memory(MemoryStore),
    Sqlite(SqliteStore),
}

impl Store {
    pub fn memory() -> Self {
        Self::Memory(MemoryStore::new())
    }

    pub async fn sqlite(database_url: &str) -> Result<Self> {
        Ok(Self::Sqlite(SqliteStore::connect(database_url).await?))
    }
}

impl UsageRepository for Store {
    async fn historical_readings(&self, user_id: &str, limit: usize) -> Result<Vec<UtilityReading>> {
        match self {
            Store::Memory(store) => store.historical_readings(user_id, limit).await,
            Store::Sqlite(store) => store.historical_readings(user_id, limit).await,
        }
    }

    async fn save_reading(&self, record: &StoredReading) -> Result<SaveOutcome> {
        match self {
            Store::Memory(store) => store.save_reading(record).await,
            Store::Sqlite(store) => store.save_reading(record).await,
        }
    }

    async fn increment_points(&self, user_id: &str, delta: f64) -> Result<()> {
        match self {
            Store::Memory(store) => store.increment_points(user_id, delta).await,
            Store::Sqlite(store) => store.increment_points(user_id, delta).await,
        }
    }

    async fn set_class(&self, user_id: &str, class: EnvironmentalClass) -> Result<()> {
        match self {
            Store::Memory(store) => store.set_class(user_id, class).await,
            Store::Sqlite(store) => store.set_class(user_id, class).await,
        }
    }
}

impl ProfileRepository for Store {
    async fn upsert_profile(&self, profile: &UserProfile) -> Result<()> {
        match self {
            Store::Memory(store) => store.upsert_profile(profile).await,
            Store::Sqlite(store) => store.upsert_profile(profile).await,
        }
    }

    async fn user_context(&self, user_id: &str) -> Result<Option<UserContext>> {
        match self {
            Store::Memory(store) => store.user_context(user_id).await,
            Store::Sqlite(store) => store.user_context(user_id).await,
        }
    }
}

impl RankingRepository for Store {
    async fn global_rankings(&self, limit: usize) -> Result<Vec<RankingEntry>> {
        match self {
            Store::Memory(store) => store.global_rankings(limit).await,
            Store::Sqlite(store) => store.global_rankings(limit).await,
        }
    }
}

impl SessionRepository for Store {
    async fn load_session(&self, session_id: &str) -> Result<Option<ConversationSession>> {
        match self {
            Store::Memory(store) => store.load_session(session_id).await,
            Store::Sqlite(store) => store.load_session(session_id).await,
        }
    }

    async fn upsert_session(&self, session: &ConversationSession) -> Result<()> {
        match self {
            Store::Memory(store) => store.upsert_session(session).await,
            Store::Sqlite(store) => store.upsert_session(session).await,
        }
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        match self {
            Store::Memory(store) => store.purge_expired(now).await,
            Store::Sqlite(store) => store.purge_expired(now).await,
        }
    }
}

pub fn new_reading_id() -> String {
    Uuid::new_v4().to_string()
}

pub fn session_expiry(now: DateTime<Utc>) -> DateTime<Utc> {
    now + Duration::hours(24)
}

#[cfg(test)]
mod tests {
    use super::*;
    use verdant_core::{UsageStatus, UsageStatuses};

    fn record(user_id: &str, points: f64) -> StoredReading {
        StoredReading {
            reading_id: new_reading_id(),
            user_id: user_id.to_string(),
            reading: UtilityReading::new(40.0, 10.0, 4.0),
            statuses: UsageStatuses {
                water: UsageStatus::Good,
                electricity: UsageStatus::Normal,
                gas: UsageStatus::Good,
            },
            points,
            valid: true,
        }
    }

    #[tokio::test]
    async fn third_save_in_a_day_is_rejected() {
        let store = MemoryStore::new();
        store
            .upsert_profile(&UserProfile::minimal("u-1", "robin"))
            .await
            .unwrap();

        for _ in 0..DAILY_READING_LIMIT {
            let outcome = store.save_reading(&record("u-1", 5.0)).await.unwrap();
            assert!(matches!(outcome, SaveOutcome::Saved { .. }));
        }

        let third = store.save_reading(&record("u-1", 5.0)).await.unwrap();
        assert_eq!(third, SaveOutcome::DailyLimitExceeded);
    }

    #[tokio::test]
    async fn limit_is_per_user() {
        let store = MemoryStore::new();
        for _ in 0..DAILY_READING_LIMIT {
            store.save_reading(&record("u-1", 5.0)).await.unwrap();
        }

        let other = store.save_reading(&record("u-2", 5.0)).await.unwrap();
        assert!(matches!(other, SaveOutcome::Saved { .. }));
    }

    #[tokio::test]
    async fn concurrent_increments_do_not_lose_updates() {
        let store = Arc::new(MemoryStore::new());
        store
            .upsert_profile(&UserProfile::minimal("u-1", "robin"))
            .await
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..50 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.increment_points("u-1", 1.0).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let context = store.user_context("u-1").await.unwrap().unwrap();
        assert_eq!(context.total_points, 50.0);
    }

    #[tokio::test]
    async fn rankings_order_by_points() {
        let store = MemoryStore::new();
        for (user, points) in [("u-1", 10.0), ("u-2", 30.0), ("u-3", 20.0)] {
            store
                .upsert_profile(&UserProfile::minimal(user, user))
                .await
                .unwrap();
            store.increment_points(user, points).await.unwrap();
        }

        let rankings = store.global_rankings(10).await.unwrap();
        assert_eq!(rankings[0].username, "u-2");
        assert_eq!(rankings[1].username, "u-3");
        assert_eq!(rankings[2].username, "u-1");
    }

    #[tokio::test]
    async fn expired_sessions_are_purged() {
        let store = MemoryStore::new();
        let session = ConversationSession {
            session_id: "s-1".to_string(),
            user_id: None,
            expires_at: Utc::now() - Duration::hours(1),
            turns: Vec::new(),
        };
        store.upsert_session(&session).await.unwrap();

        let removed = store.purge_expired(Utc::now()).await.unwrap();
        assert_eq!(removed, 1);
        assert!(store.load_session("s-1").await.unwrap().is_none());
    }
}
