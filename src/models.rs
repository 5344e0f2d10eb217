use crate::plan::{PlanDay, parse_start_date};
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, Serializer, ser::SerializeMap};
use std::collections::{BTreeMap, BTreeSet};

/// Plan days marked done. Serialized as `{ "<day>": true, ... }`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompletedDays(BTreeSet<PlanDay>);

impl CompletedDays {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, day: PlanDay) -> bool {
        self.0.contains(&day)
    }

    /// Returns `true` when the day was not already present.
    pub fn insert(&mut self, day: PlanDay) -> bool {
        self.0.insert(day)
    }

    pub fn remove(&mut self, day: PlanDay) -> bool {
        self.0.remove(&day)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = PlanDay> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<PlanDay> for CompletedDays {
    fn from_iter<T: IntoIterator<Item = PlanDay>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Serialize for CompletedDays {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for day in &self.0 {
            map.serialize_entry(&day.to_string(), &true)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for CompletedDays {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<BTreeMap<String, serde_json::Value>>::deserialize(deserializer)?;
        Ok(raw
            .unwrap_or_default()
            .into_iter()
            .filter(|(_, marker)| marker.as_bool() == Some(true))
            .filter_map(|(key, _)| key.trim().parse::<i64>().ok().and_then(PlanDay::new))
            .collect())
    }
}

/// The one persisted document per user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    #[serde(default)]
    pub completed_days: CompletedDays,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_start_date"
    )]
    pub start_date: Option<NaiveDate>,
}

fn lenient_start_date<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<NaiveDate>, D::Error> {
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_start_date))
}

#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct NavigateRequest {
    pub delta: i64,
}

#[derive(Debug, Deserialize)]
pub struct StartDateRequest {
    pub start_date: String,
}

#[derive(Debug, Deserialize)]
pub struct MarkPastRequest {
    #[serde(default)]
    pub confirm: bool,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsResponse {
    pub completed: usize,
    pub remaining: i64,
    pub streak: u32,
    pub completion_percent: u8,
}

#[derive(Debug, Clone, Serialize)]
pub struct MarkPastPreview {
    pub days_to_mark: u16,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    SignedOut,
    Loading,
    Active,
}

#[derive(Debug, Clone, Serialize)]
pub struct DayView {
    pub day: PlanDay,
    pub label: String,
    pub text: String,
    pub date: String,
    pub completed: bool,
    pub progress_percent: u8,
    pub has_prev: bool,
    pub has_next: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub status: SessionStatus,
    pub email: Option<String>,
    pub start_date: Option<String>,
    pub day: Option<DayView>,
    pub stats: Option<StatsResponse>,
    pub notice: Option<String>,
}
