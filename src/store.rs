use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::Result;
use crate::models::{
    AdvisorContext, Artifacts, CalendarEvent, ChatMessage, DailyForecast, DeepProfile,
    FatefulMoment, MonthForecast, NatalChart, Numerology, Profile, QuickProfile,
};
use crate::storage::SnapshotStorage;

/// Persisted form of the session, field names as the web client stored them
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
struct Snapshot {
    birth_data: Profile,
    natal_chart: Option<NatalChart>,
    numerology: Option<Numerology>,
    artifacts: Option<Artifacts>,
    daily_forecast: Option<DailyForecast>,
    fateful_moments: Option<Vec<FatefulMoment>>,
    yearly_forecast: Option<Vec<MonthForecast>>,
}

fn greeting(profile: &Profile) -> ChatMessage {
    ChatMessage::assistant(format!(
        "Приветствую, {}. Я — Небесный Проводник.\n\nЯ готов разъяснить любые детали вашего прогноза \
или натальной карты. Спросите меня о конкретных аспектах или грядущих переменах.",
        profile.name
    ))
}

/// Single source of truth for the profile and every fetched result.
///
/// Only `save` touches durable storage; mutations stay in memory until then.
pub struct SessionStore {
    storage: Arc<dyn SnapshotStorage>,
    key: String,
    profile: Option<Profile>,
    quick: Option<QuickProfile>,
    daily: Option<DailyForecast>,
    deep: Option<DeepProfile>,
    calendar: Vec<CalendarEvent>,
    chat: Vec<ChatMessage>,
}

impl SessionStore {
    pub fn new(storage: Arc<dyn SnapshotStorage>, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
            profile: None,
            quick: None,
            daily: None,
            deep: None,
            calendar: Vec::new(),
            chat: Vec::new(),
        }
    }

    /// Restore the durable snapshot. Returns whether a session was restored;
    /// anything unreadable is treated exactly like an absent snapshot.
    pub fn load(&mut self) -> bool {
        let raw = match self.storage.read(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return false,
            Err(e) => {
                tracing::warn!("Could not read snapshot '{}': {}", self.key, e);
                return false;
            }
        };

        let snapshot = match serde_json::from_str::<Snapshot>(&raw) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::debug!("Discarding malformed snapshot '{}': {}", self.key, e);
                self.discard();
                return false;
            }
        };

        let quick = match (snapshot.natal_chart, snapshot.numerology, snapshot.artifacts) {
            (Some(natal_chart), Some(numerology), Some(artifacts)) => Some(QuickProfile {
                natal_chart,
                numerology,
                artifacts,
            }),
            (None, None, None) => None,
            _ => {
                tracing::debug!("Discarding snapshot '{}' with a partial quick profile", self.key);
                self.discard();
                return false;
            }
        };

        let deep = match (snapshot.fateful_moments, snapshot.yearly_forecast) {
            (Some(fateful_moments), Some(yearly_forecast)) => Some(DeepProfile {
                fateful_moments,
                yearly_forecast,
            }),
            _ => None,
        };

        self.chat = vec![greeting(&snapshot.birth_data)];
        self.profile = Some(snapshot.birth_data);
        self.quick = quick;
        self.daily = snapshot.daily_forecast;
        self.deep = deep;
        self.calendar.clear();
        tracing::info!("Restored saved session '{}'", self.key);
        true
    }

    fn discard(&self) {
        if let Err(e) = self.storage.remove(&self.key) {
            tracing::warn!("Could not remove snapshot '{}': {}", self.key, e);
        }
    }

    /// Overwrite the durable snapshot with the current state. Without a
    /// profile there is nothing worth keeping and the call is a no-op.
    pub fn save(&self) -> Result<()> {
        let Some(profile) = &self.profile else {
            return Ok(());
        };

        let snapshot = Snapshot {
            birth_data: profile.clone(),
            natal_chart: self.quick.as_ref().map(|q| q.natal_chart.clone()),
            numerology: self.quick.as_ref().map(|q| q.numerology.clone()),
            artifacts: self.quick.as_ref().map(|q| q.artifacts.clone()),
            daily_forecast: self.daily.clone(),
            fateful_moments: self.deep.as_ref().map(|d| d.fateful_moments.clone()),
            yearly_forecast: self.deep.as_ref().map(|d| d.yearly_forecast.clone()),
        };
        self.storage.write(&self.key, &serde_json::to_string(&snapshot)?)
    }

    /// Erase the durable snapshot and forget everything held in memory
    pub fn clear(&mut self) -> Result<()> {
        self.profile = None;
        self.quick = None;
        self.daily = None;
        self.deep = None;
        self.calendar.clear();
        self.chat.clear();
        self.storage.remove(&self.key)
    }

    /// Replace the profile wholesale. A different profile invalidates every
    /// result derived from the previous one.
    pub fn set_profile(&mut self, profile: Profile) {
        if self.profile.as_ref() == Some(&profile) {
            return;
        }
        self.quick = None;
        self.daily = None;
        self.deep = None;
        self.calendar.clear();
        self.chat = vec![greeting(&profile)];
        self.profile = Some(profile);
    }

    pub fn set_quick_profile(&mut self, quick: QuickProfile) {
        self.quick = Some(quick);
    }

    pub fn set_daily_forecast(&mut self, forecast: DailyForecast) {
        self.daily = Some(forecast);
    }

    pub fn set_deep_profile(&mut self, deep: DeepProfile) {
        self.deep = Some(deep);
    }

    pub fn replace_calendar(&mut self, events: Vec<CalendarEvent>) {
        self.calendar = events;
    }

    pub fn push_chat(&mut self, message: ChatMessage) {
        self.chat.push(message);
    }

    pub fn profile(&self) -> Option<&Profile> {
        self.profile.as_ref()
    }

    pub fn quick_profile(&self) -> Option<&QuickProfile> {
        self.quick.as_ref()
    }

    pub fn natal_chart(&self) -> Option<&NatalChart> {
        self.quick.as_ref().map(|q| &q.natal_chart)
    }

    pub fn numerology(&self) -> Option<&Numerology> {
        self.quick.as_ref().map(|q| &q.numerology)
    }

    pub fn artifacts(&self) -> Option<&Artifacts> {
        self.quick.as_ref().map(|q| &q.artifacts)
    }

    pub fn daily_forecast(&self) -> Option<&DailyForecast> {
        self.daily.as_ref()
    }

    pub fn deep_profile(&self) -> Option<&DeepProfile> {
        self.deep.as_ref()
    }

    pub fn fateful_moments(&self) -> Option<&[FatefulMoment]> {
        self.deep.as_ref().map(|d| d.fateful_moments.as_slice())
    }

    pub fn yearly_forecast(&self) -> Option<&[MonthForecast]> {
        self.deep.as_ref().map(|d| d.yearly_forecast.as_slice())
    }

    pub fn calendar(&self) -> &[CalendarEvent] {
        &self.calendar
    }

    pub fn chat(&self) -> &[ChatMessage] {
        &self.chat
    }

    /// Profile, natal chart, numerology and today's forecast for the advisor
    pub fn advisor_context(&self) -> AdvisorContext {
        AdvisorContext {
            birth_data: self.profile.clone(),
            natal_chart: self.natal_chart().cloned(),
            numerology: self.numerology().cloned(),
            daily_forecast: self.daily.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GuideError;
    use crate::fixtures::{anna, daily_forecast_json, deep_profile_json, quick_profile_json};
    use crate::models::ChatRole;
    use crate::storage::{MemoryStorage, MockSnapshotStorage};
    use serde_json::json;

    const KEY: &str = "celestial_guide_v6";

    fn quick() -> QuickProfile {
        serde_json::from_value(quick_profile_json()).unwrap()
    }

    fn daily(date: &str) -> DailyForecast {
        serde_json::from_value(daily_forecast_json(date)).unwrap()
    }

    fn deep(year: i32) -> DeepProfile {
        serde_json::from_value(deep_profile_json(year)).unwrap()
    }

    fn populated(storage: Arc<dyn SnapshotStorage>) -> SessionStore {
        let mut store = SessionStore::new(storage, KEY);
        store.set_profile(anna());
        store.set_quick_profile(quick());
        store.set_daily_forecast(daily("2026-03-09"));
        store.set_deep_profile(deep(2026));
        store
    }

    #[test]
    fn test_save_then_load_reproduces_persisted_fields() {
        let storage = Arc::new(MemoryStorage::new());
        let mut store = populated(storage.clone());
        store.replace_calendar(vec![CalendarEvent {
            date: "2026-03-02".to_string(),
            status: "favorable".to_string(),
            comment: "ok".to_string(),
        }]);
        store.push_chat(ChatMessage::user("Привет"));
        store.save().unwrap();

        let mut restored = SessionStore::new(storage, KEY);
        assert!(restored.load());
        assert_eq!(restored.profile(), Some(&anna()));
        assert_eq!(restored.quick_profile(), Some(&quick()));
        assert_eq!(restored.daily_forecast(), Some(&daily("2026-03-09")));
        assert_eq!(restored.deep_profile(), Some(&deep(2026)));
        // calendar and chat turns are not persisted
        assert!(restored.calendar().is_empty());
        assert_eq!(restored.chat().len(), 1);
        assert_eq!(restored.chat()[0].role, ChatRole::Assistant);
    }

    #[test]
    fn test_snapshot_uses_web_client_field_names() {
        let storage = Arc::new(MemoryStorage::new());
        let mut store = SessionStore::new(storage.clone(), KEY);
        store.set_profile(anna());
        store.set_quick_profile(quick());
        store.save().unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&storage.read(KEY).unwrap().unwrap()).unwrap();
        assert_eq!(raw["birthData"]["name"], "Анна");
        assert_eq!(raw["natalChart"]["sunSign"], "Телец");
        assert_eq!(raw["numerology"]["soulNumber"], 7);
        assert!(raw["dailyForecast"].is_null());
        assert!(raw["fatefulMoments"].is_null());
    }

    #[test]
    fn test_malformed_snapshots_behave_like_absent_ones() {
        let cases = vec![
            "not json at all".to_string(),
            "[]".to_string(),
            json!({}).to_string(),
            json!({"birthData": null}).to_string(),
            json!({"birthData": {"name": "Анна"}}).to_string(),
            json!({"natalChart": quick_profile_json()["natalChart"]}).to_string(),
            // partial quick profile
            json!({"birthData": anna(), "natalChart": quick_profile_json()["natalChart"]}).to_string(),
        ];

        for raw in cases {
            let storage = Arc::new(MemoryStorage::new());
            storage.write(KEY, &raw).unwrap();
            let mut store = SessionStore::new(storage.clone(), KEY);
            assert!(!store.load(), "accepted {raw}");
            assert_eq!(storage.read(KEY).unwrap(), None, "kept {raw}");
            assert!(store.profile().is_none());
            assert!(store.quick_profile().is_none());
            assert!(store.daily_forecast().is_none());
            assert!(store.deep_profile().is_none());
            assert!(store.chat().is_empty());
        }
    }

    #[test]
    fn test_profile_only_snapshot_is_enough() {
        let storage = Arc::new(MemoryStorage::new());
        storage
            .write(KEY, &json!({"birthData": anna()}).to_string())
            .unwrap();
        let mut store = SessionStore::new(storage, KEY);
        assert!(store.load());
        assert_eq!(store.profile().map(|p| p.name.as_str()), Some("Анна"));
        assert!(store.natal_chart().is_none());
    }

    #[test]
    fn test_unparseable_snapshot_is_removed() {
        let mut storage = MockSnapshotStorage::new();
        storage
            .expect_read()
            .returning(|_| Ok(Some("{broken".to_string())));
        storage
            .expect_remove()
            .withf(|key| key == KEY)
            .times(1)
            .returning(|_| Ok(()));

        let mut store = SessionStore::new(Arc::new(storage), KEY);
        assert!(!store.load());
    }

    #[test]
    fn test_partial_quick_profile_snapshot_is_removed() {
        let raw = json!({
            "birthData": anna(),
            "natalChart": quick_profile_json()["natalChart"],
        })
        .to_string();
        let mut storage = MockSnapshotStorage::new();
        storage
            .expect_read()
            .returning(move |_| Ok(Some(raw.clone())));
        storage
            .expect_remove()
            .withf(|key| key == KEY)
            .times(1)
            .returning(|_| Ok(()));

        let mut store = SessionStore::new(Arc::new(storage), KEY);
        assert!(!store.load());
        assert!(store.profile().is_none());
    }

    #[test]
    fn test_storage_read_failure_is_no_session() {
        let mut storage = MockSnapshotStorage::new();
        storage
            .expect_read()
            .returning(|_| Err(GuideError::Storage("disk gone".to_string())));
        storage.expect_remove().never();

        let mut store = SessionStore::new(Arc::new(storage), KEY);
        assert!(!store.load());
    }

    #[test]
    fn test_save_without_profile_writes_nothing() {
        let mut storage = MockSnapshotStorage::new();
        storage.expect_write().never();
        let store = SessionStore::new(Arc::new(storage), KEY);
        store.save().unwrap();
    }

    #[test]
    fn test_second_deep_profile_overwrites_first() {
        let storage = Arc::new(MemoryStorage::new());
        let mut store = populated(storage.clone());
        store.save().unwrap();

        store.set_deep_profile(deep(2027));
        store.save().unwrap();

        let mut restored = SessionStore::new(storage, KEY);
        assert!(restored.load());
        let moments = restored.fateful_moments().unwrap();
        assert_eq!(moments.len(), 3);
        assert!(moments.iter().all(|m| m.period.ends_with("2027")));
        assert_eq!(restored.yearly_forecast().unwrap().len(), 12);
    }

    #[test]
    fn test_changed_profile_drops_derived_results() {
        let storage = Arc::new(MemoryStorage::new());
        let mut store = populated(storage);
        store.replace_calendar(vec![CalendarEvent {
            date: "2026-03-02".to_string(),
            status: "favorable".to_string(),
            comment: String::new(),
        }]);

        // same profile keeps everything
        store.set_profile(anna());
        assert!(store.quick_profile().is_some());
        assert!(store.deep_profile().is_some());

        let mut edited = anna();
        edited.birth_time = "09:15".to_string();
        store.set_profile(edited);
        assert!(store.quick_profile().is_none());
        assert!(store.daily_forecast().is_none());
        assert!(store.deep_profile().is_none());
        assert!(store.calendar().is_empty());
        assert_eq!(store.chat().len(), 1);
    }

    #[test]
    fn test_clear_erases_snapshot_and_state() {
        let storage = Arc::new(MemoryStorage::new());
        let mut store = populated(storage.clone());
        store.save().unwrap();

        store.clear().unwrap();
        assert!(store.profile().is_none());
        assert!(store.quick_profile().is_none());
        assert!(store.chat().is_empty());
        assert_eq!(storage.read(KEY).unwrap(), None);

        let mut fresh = SessionStore::new(storage, KEY);
        assert!(!fresh.load());
    }

    #[test]
    fn test_advisor_context_bundle() {
        let store = populated(Arc::new(MemoryStorage::new()));
        let context = store.advisor_context();
        assert_eq!(context.birth_data, Some(anna()));
        assert_eq!(context.natal_chart.as_ref(), store.natal_chart());
        assert_eq!(context.numerology.as_ref().map(|n| n.life_path), Some(1));
        assert_eq!(
            context.daily_forecast.map(|d| d.date),
            Some("2026-03-09".to_string())
        );
    }
}
