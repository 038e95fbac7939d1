//! Records mirrored from the backend tables.
//!
//! Rows are decoded leniently: ids may arrive as text or integers and
//! timestamps with or without an offset. The typed fields carry what the
//! dashboard reads; the row itself is kept verbatim for exports.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::{fmt, str::FromStr};
use ulid::Ulid;

/// Timestamps keep the offset the backend sent so the date portion matches
/// what the backend wrote.
pub type Timestamp = DateTime<FixedOffset>;

/// Primary key of a mirrored row.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Generates a key for a row that never came from the backend.
    #[must_use]
    pub fn local() -> Self {
        Self(format!("local-{}", Ulid::new()))
    }

    /// Reads a key out of a JSON scalar. Objects, arrays, null and empty
    /// strings have no key.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(text) if !text.trim().is_empty() => Some(Self(text.clone())),
            Value::Number(number) => Some(Self(number.to_string())),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_local(&self) -> bool {
        self.0.starts_with("local-")
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl<'de> Deserialize<'de> for RecordId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(&value)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid record id: {value}")))
    }
}

/// Where a row came from. Local rows are client-side projections.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Origin {
    #[default]
    Backend,
    Local,
}

/// Rows stored in a [`Collection`](crate::collection::Collection).
pub trait Keyed {
    fn key(&self) -> &RecordId;
}

/// A record mirrored from a backend table.
pub trait Mirrored: Keyed + Serialize + DeserializeOwned {
    /// The backend row this record was decoded from. `None` for records
    /// built on the client.
    fn row(&self) -> Option<&Map<String, Value>>;

    fn keep_row(&mut self, row: Map<String, Value>);

    /// Decodes `row` and keeps it next to the typed fields.
    ///
    /// # Errors
    /// Returns the serde error if the row does not match `Self`.
    fn from_row(row: Value) -> serde_json::Result<Self> {
        let mut record: Self = serde_json::from_value(row.clone())?;
        if let Value::Object(fields) = row {
            record.keep_row(fields);
        }
        Ok(record)
    }

    /// Row as the backend sent it, or the typed fields for client records.
    ///
    /// # Errors
    /// Returns the serde error if a client record fails to encode.
    fn to_row(&self) -> serde_json::Result<Value> {
        match self.row() {
            Some(fields) => Ok(Value::Object(fields.clone())),
            None => serde_json::to_value(self),
        }
    }
}

macro_rules! mirrored {
    ($($record:ty),+ $(,)?) => {$(
        impl Keyed for $record {
            fn key(&self) -> &RecordId {
                &self.id
            }
        }

        impl Mirrored for $record {
            fn row(&self) -> Option<&Map<String, Value>> {
                self.row.as_ref()
            }

            fn keep_row(&mut self, row: Map<String, Value>) {
                self.row = Some(row);
            }
        }
    )+};
}

mirrored!(Employee, App, OnboardingRecord, ActivityEntry);

/// The four mirrored tables.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Table {
    Employees,
    Apps,
    Onboarding,
    Activity,
}

impl Table {
    pub const ALL: [Table; 4] = [
        Table::Employees,
        Table::Apps,
        Table::Onboarding,
        Table::Activity,
    ];

    /// Backend table name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Table::Employees => "employees",
            Table::Apps => "apps",
            Table::Onboarding => "onboarding_progress",
            Table::Activity => "activity_log",
        }
    }

    /// Column used for newest-first ordering of the bulk fetch.
    #[must_use]
    pub fn order_column(self) -> &'static str {
        match self {
            Table::Onboarding => "started_at",
            Table::Employees | Table::Apps | Table::Activity => "created_at",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.name())
    }
}

impl FromStr for Table {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "employees" | "employee" => Ok(Table::Employees),
            "apps" | "app" => Ok(Table::Apps),
            "onboarding" | "onboarding_progress" => Ok(Table::Onboarding),
            "activity" | "activity_log" => Ok(Table::Activity),
            other => Err(format!("unknown table: {other}")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Employee {
    pub id: RecordId,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created_at: Option<Timestamp>,
    #[serde(skip)]
    pub row: Option<Map<String, Value>>,
}

impl Employee {
    /// Full name, then email, then the raw id.
    #[must_use]
    pub fn display_name(&self) -> &str {
        non_blank(self.full_name.as_deref())
            .or_else(|| non_blank(self.email.as_deref()))
            .unwrap_or_else(|| self.id.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct App {
    pub id: RecordId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created_at: Option<Timestamp>,
    #[serde(skip)]
    pub row: Option<Map<String, Value>>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OnboardingRecord {
    pub id: RecordId,
    #[serde(default)]
    pub employee_id: Option<RecordId>,
    #[serde(default)]
    pub template_id: Option<RecordId>,
    #[serde(default)]
    pub app_id: Option<RecordId>,
    #[serde(default)]
    pub progress: f64,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub started_at: Option<Timestamp>,
    #[serde(default)]
    pub completed: Option<bool>,
    #[serde(default)]
    pub payload: Option<Value>,
    #[serde(skip)]
    pub row: Option<Map<String, Value>>,
}

impl OnboardingRecord {
    /// App this onboarding belongs to: the direct column first, then
    /// `payload.app_id`.
    #[must_use]
    pub fn app_id(&self) -> Option<RecordId> {
        self.app_id.clone().or_else(|| {
            self.payload
                .as_ref()
                .and_then(|payload| payload.get("app_id"))
                .and_then(RecordId::from_value)
        })
    }

    /// Missing `completed` counts as not completed.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.completed.unwrap_or(false)
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.progress >= 100.0
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActivityEntry {
    #[serde(default = "RecordId::local")]
    pub id: RecordId,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created_at: Option<Timestamp>,
    #[serde(skip)]
    pub origin: Origin,
    #[serde(skip)]
    pub row: Option<Map<String, Value>>,
}

impl ActivityEntry {
    /// Builds a client-side entry with a local key and the current time.
    #[must_use]
    pub fn local(message: impl Into<String>) -> Self {
        Self {
            id: RecordId::local(),
            message: Some(message.into()),
            description: None,
            created_at: Some(Utc::now().fixed_offset()),
            origin: Origin::Local,
            row: None,
        }
    }

    #[must_use]
    pub fn text(&self) -> &str {
        non_blank(self.message.as_deref())
            .or_else(|| non_blank(self.description.as_deref()))
            .unwrap_or("")
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|text| !text.trim().is_empty())
}

/// Accepts RFC 3339, naive date-times (read as UTC) and bare dates.
/// Unparseable values decode as `None` instead of failing the row.
fn lenient_timestamp<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<Timestamp>, D::Error> {
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.as_deref().and_then(parse_timestamp))
}

pub(crate) fn parse_timestamp(value: &str) -> Option<Timestamp> {
    let value = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed);
    }
    if let Ok(parsed) = DateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f%#z") {
        return Some(parsed);
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, format) {
            return Some(parsed.and_utc().fixed_offset());
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|date| date.and_utc().fixed_offset())
}
