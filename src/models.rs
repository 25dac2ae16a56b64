use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{GuideError, Result};

#[derive(Deserialize)]
#[serde(untagged)]
enum FlexibleInt {
    Int(i64),
    Float(f64),
}

impl FlexibleInt {
    fn into_i32<E: serde::de::Error>(self) -> std::result::Result<i32, E> {
        match self {
            FlexibleInt::Int(i) => i32::try_from(i).map_err(E::custom),
            FlexibleInt::Float(f) => Ok(f as i32),
        }
    }
}

/// Models occasionally answer `14.0` where an integer was declared
fn flexible_int<'de, D>(deserializer: D) -> std::result::Result<i32, D::Error>
where
    D: Deserializer<'de>,
{
    FlexibleInt::deserialize(deserializer)?.into_i32()
}

/// Like `flexible_int`, but an explicit `null` counts as zero
fn optional_int<'de, D>(deserializer: D) -> std::result::Result<i32, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<FlexibleInt>::deserialize(deserializer)? {
        Some(value) => value.into_i32(),
        None => Ok(0),
    }
}

/// Optional reply fields arrive as `null` as often as they are omitted
fn null_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

/// Birth and identity data submitted through the profile form
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maiden_name: Option<String>,
    /// YYYY-MM-DD
    pub birth_date: String,
    /// HH:mm
    pub birth_time: String,
    pub birth_place: String,
    pub current_city: String,
    pub gender: Gender,
}

impl Profile {
    /// Presence check on the fields every prompt depends on
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("name", &self.name),
            ("birth date", &self.birth_date),
            ("birth time", &self.birth_time),
            ("birth place", &self.birth_place),
        ] {
            if value.trim().is_empty() {
                return Err(GuideError::InvalidProfile(format!("{field} is required")));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlanetaryPosition {
    pub planet: String,
    pub sign: String,
    #[serde(deserialize_with = "flexible_int")]
    pub house: i32,
    #[serde(deserialize_with = "flexible_int")]
    pub degree: i32,
    pub retrograde: bool,
    /// Why the model placed the planet here
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logic: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct ProgressScale {
    #[serde(default, deserialize_with = "null_default")]
    pub label: String,
    /// 0-100
    #[serde(default, deserialize_with = "optional_int")]
    pub value: i32,
    #[serde(default, deserialize_with = "null_default")]
    pub color: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProgressScales {
    #[serde(default, deserialize_with = "null_default")]
    pub missing: Vec<ProgressScale>,
    #[serde(default, deserialize_with = "null_default")]
    pub excess: Vec<ProgressScale>,
    #[serde(default, deserialize_with = "null_default")]
    pub work_on: Vec<ProgressScale>,
    #[serde(default, deserialize_with = "null_default")]
    pub focus_on: Vec<ProgressScale>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
pub struct Elements {
    #[serde(default, deserialize_with = "optional_int")]
    pub fire: i32,
    #[serde(default, deserialize_with = "optional_int")]
    pub earth: i32,
    #[serde(default, deserialize_with = "optional_int")]
    pub air: i32,
    #[serde(default, deserialize_with = "optional_int")]
    pub water: i32,
}

impl Elements {
    /// The element with the highest count; ties resolve in fire, earth, air, water order
    pub fn dominant(&self) -> &'static str {
        let mut best = ("fire", self.fire);
        for candidate in [("earth", self.earth), ("air", self.air), ("water", self.water)] {
            if candidate.1 > best.1 {
                best = candidate;
            }
        }
        best.0
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NatalChart {
    pub sun_sign: String,
    pub moon_sign: String,
    pub ascendant: String,
    pub planets: Vec<PlanetaryPosition>,
    pub summary: String,
    pub progress_scales: ProgressScales,
    pub elements: Elements,
    pub calculation_logic: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Numerology {
    #[serde(deserialize_with = "flexible_int")]
    pub life_path: i32,
    #[serde(deserialize_with = "flexible_int")]
    pub destiny_number: i32,
    #[serde(deserialize_with = "flexible_int")]
    pub soul_number: i32,
    pub matrix_description: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Artifacts {
    pub stones: Vec<String>,
    pub activity_field: String,
    #[serde(default, deserialize_with = "null_default")]
    pub sports: Vec<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub hobbies: Vec<String>,
    pub best_city: String,
}

/// Natal chart, numerology and artifacts produced by one request
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuickProfile {
    pub natal_chart: NatalChart,
    pub numerology: Numerology,
    pub artifacts: Artifacts,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct EnergyScale {
    /// 0-100
    #[serde(deserialize_with = "flexible_int")]
    pub value: i32,
    /// легкий | средний | сложный | критический
    pub difficulty: String,
    pub description: String,
}

impl EnergyScale {
    /// Difficulty on a 1-10 scale; unknown tiers count as easy
    pub fn difficulty_level(&self) -> u8 {
        match self.difficulty.trim().to_lowercase().as_str() {
            "средний" => 5,
            "сложный" => 8,
            "критический" => 10,
            _ => 2,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct Warning {
    /// conflict | magnetic_storm | health | financial
    #[serde(rename = "type", default, deserialize_with = "null_default")]
    pub category: String,
    #[serde(default, deserialize_with = "null_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_default")]
    pub advice: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Recommendations {
    pub career: String,
    pub love: String,
    pub health: String,
    pub spirituality: String,
    pub haircut: String,
    pub sports: String,
    pub nutrition: String,
    pub activity: String,
    pub communication: String,
}

impl Recommendations {
    pub const SLOTS: [&'static str; 9] = [
        "career",
        "love",
        "health",
        "spirituality",
        "haircut",
        "sports",
        "nutrition",
        "activity",
        "communication",
    ];

    /// Slot name paired with its advice, in `SLOTS` order
    pub fn entries(&self) -> [(&'static str, &str); 9] {
        [
            ("career", self.career.as_str()),
            ("love", self.love.as_str()),
            ("health", self.health.as_str()),
            ("spirituality", self.spirituality.as_str()),
            ("haircut", self.haircut.as_str()),
            ("sports", self.sports.as_str()),
            ("nutrition", self.nutrition.as_str()),
            ("activity", self.activity.as_str()),
            ("communication", self.communication.as_str()),
        ]
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DailyForecast {
    pub date: String,
    pub lunar_phase: String,
    #[serde(deserialize_with = "flexible_int")]
    pub lunar_day: i32,
    pub moon_phase_description: String,
    #[serde(default, deserialize_with = "null_default")]
    pub mood: String,
    pub energy_scale: EnergyScale,
    #[serde(default, deserialize_with = "null_default")]
    pub warnings: Vec<Warning>,
    pub recommendations: Recommendations,
    #[serde(default, deserialize_with = "null_default")]
    pub justification: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct FatefulMoment {
    #[serde(default, deserialize_with = "null_default")]
    pub period: String,
    #[serde(default, deserialize_with = "null_default")]
    pub event: String,
    #[serde(default, deserialize_with = "null_default")]
    pub description: String,
    /// career | love | spiritual | health
    #[serde(rename = "type", default, deserialize_with = "null_default")]
    pub category: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct MonthForecast {
    #[serde(default, deserialize_with = "null_default")]
    pub month: String,
    #[serde(default, deserialize_with = "null_default")]
    pub prediction: String,
}

/// Fateful moments plus the twelve-month forecast, fetched together
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeepProfile {
    pub fateful_moments: Vec<FatefulMoment>,
    pub yearly_forecast: Vec<MonthForecast>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CalendarEvent {
    pub date: String,
    /// favorable | unfavorable
    pub status: String,
    pub comment: String,
}

impl CalendarEvent {
    pub fn parsed_date(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(self.date.trim(), "%Y-%m-%d").ok()
    }

    pub fn is_favorable(&self) -> bool {
        let status = self.status.trim().to_lowercase();
        status == "favorable"
            || status == "good"
            || (status.starts_with("благоприят") && !status.starts_with("неблагоприят"))
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CalendarResponse {
    pub events: Vec<CalendarEvent>,
}

/// A calendar month such as `2026-03`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct YearMonth {
    year: i32,
    month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(GuideError::InvalidProfile(format!(
                "month must be between 1 and 12, got {month}"
            )));
        }
        Ok(Self { year, month })
    }

    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = GuideError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || GuideError::InvalidProfile(format!("expected YYYY-MM, got '{s}'"));
        let (year, month) = s.trim().split_once('-').ok_or_else(invalid)?;
        if year.len() != 4 || month.len() != 2 {
            return Err(invalid());
        }
        let year = year.parse().map_err(|_| invalid())?;
        let month = month.parse().map_err(|_| invalid())?;
        Self::new(year, month)
    }
}

/// Life area a personal calendar is built for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CalendarCategory {
    Haircut,
    Shopping,
    Business,
    Health,
    Other(String),
}

impl CalendarCategory {
    pub fn as_str(&self) -> &str {
        match self {
            CalendarCategory::Haircut => "haircut",
            CalendarCategory::Shopping => "shopping",
            CalendarCategory::Business => "business",
            CalendarCategory::Health => "health",
            CalendarCategory::Other(name) => name,
        }
    }
}

impl From<&str> for CalendarCategory {
    fn from(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "haircut" => CalendarCategory::Haircut,
            "shopping" => CalendarCategory::Shopping,
            "business" => CalendarCategory::Business,
            "health" => CalendarCategory::Health,
            _ => CalendarCategory::Other(value.trim().to_string()),
        }
    }
}

impl fmt::Display for CalendarCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub text: String,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            text: text.into(),
        }
    }
}

/// Data bundle replayed to the advisor on every chat turn
#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AdvisorContext {
    pub birth_data: Option<Profile>,
    pub natal_chart: Option<NatalChart>,
    pub numerology: Option<Numerology>,
    pub daily_forecast: Option<DailyForecast>,
}
