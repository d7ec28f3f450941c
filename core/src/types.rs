//! Typed records and request payloads for the Staffomatic API.
//!
//! # Design
//! Records name only the fields the client reads; everything else the
//! backend sends is kept untouched in a flattened `extra` map. Create
//! payloads carry the backend's documented defaults plus an `overrides` map
//! whose keys win when the body is rendered.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ApiError;

/// Free-form JSON object: pass-through fields and caller overrides.
pub type Fields = serde_json::Map<String, Value>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Account {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
    pub time_zone: String,
    #[serde(flatten)]
    pub extra: Fields,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Location {
    pub id: i64,
    pub name: String,
    #[serde(flatten)]
    pub extra: Fields,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Department {
    pub id: i64,
    pub name: String,
    #[serde(flatten)]
    pub extra: Fields,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(flatten)]
    pub extra: Fields,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Schedule {
    pub id: i64,
    #[serde(default)]
    pub bop: Option<String>,
    #[serde(default)]
    pub eop: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(flatten)]
    pub extra: Fields,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Shift {
    pub id: i64,
    #[serde(default)]
    pub starts_at: Option<String>,
    #[serde(default)]
    pub ends_at: Option<String>,
    #[serde(default)]
    pub department_id: Option<i64>,
    #[serde(default)]
    pub desired_coverage: Option<u32>,
    #[serde(flatten)]
    pub extra: Fields,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    pub id: i64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub starts_at: Option<String>,
    #[serde(default)]
    pub ends_at: Option<String>,
    #[serde(flatten)]
    pub extra: Fields,
}

/// Raw result of a create/update call. Rejections are reported here, not
/// raised, so batch callers can decide what a partial failure means.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationOutcome {
    pub status: u16,
    pub body: String,
}

impl MutationOutcome {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Decode the response body.
    pub fn json<R: DeserializeOwned>(&self) -> Result<R, ApiError> {
        serde_json::from_str(&self.body).map_err(|e| ApiError::Deserialization(e.to_string()))
    }
}

/// A request body made of fixed fields plus caller overrides.
pub trait Payload: Serialize {
    fn overrides(&self) -> &Fields;

    fn to_body(&self) -> Result<Value, ApiError> {
        let mut body =
            serde_json::to_value(self).map_err(|e| ApiError::Serialization(e.to_string()))?;
        if let Value::Object(fields) = &mut body {
            for (key, value) in self.overrides() {
                fields.insert(key.clone(), value.clone());
            }
        }
        Ok(body)
    }
}

macro_rules! overridable {
    ($($payload:ty),* $(,)?) => {
        $(
            impl Payload for $payload {
                fn overrides(&self) -> &Fields {
                    &self.overrides
                }
            }

            impl $payload {
                /// Set an extra field, or replace one of the defaults.
                pub fn set(mut self, key: &str, value: impl Into<Value>) -> Self {
                    self.overrides.insert(key.to_string(), value.into());
                    self
                }
            }
        )*
    };
}

#[derive(Debug, Clone, Serialize)]
pub struct NewLocation {
    pub name: String,
    pub allow_self_assign: bool,
    pub applications_visible: bool,
    pub assignments_visible: bool,
    pub first_day_of_week: u8,
    pub swap_shifts: bool,
    pub users_sort_by: String,
    #[serde(skip)]
    pub overrides: Fields,
}

impl NewLocation {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            allow_self_assign: true,
            applications_visible: false,
            assignments_visible: true,
            first_day_of_week: 0,
            swap_shifts: true,
            users_sort_by: "alphabetical".to_string(),
            overrides: Fields::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NewDepartment {
    pub name: String,
    pub visibility: String,
    pub color: String,
    pub user_selectable: bool,
    pub include_weekends: bool,
    pub position: u32,
    #[serde(skip)]
    pub overrides: Fields,
}

impl NewDepartment {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            visibility: "staff".to_string(),
            color: "4286f4".to_string(),
            user_selectable: true,
            include_weekends: true,
            position: 1,
            overrides: Fields::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NewSchedule {
    pub bop: String,
    pub eop: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<String>,
    pub first_day_of_week: u8,
    pub slot_minutes: u32,
    pub min_time: u8,
    pub max_time: u8,
    pub default_event_minutes: u32,
    pub show_event_header: bool,
    pub applications_visible: bool,
    pub assignments_visible: bool,
    pub swap_shifts: bool,
    pub notes_visible: bool,
    pub allow_self_assign: bool,
    #[serde(skip)]
    pub overrides: Fields,
}

impl NewSchedule {
    /// `bop`/`eop` are the first and last day of the planning period.
    pub fn new(bop: impl Into<String>, eop: impl Into<String>) -> Self {
        Self {
            bop: bop.into(),
            eop: eop.into(),
            deadline: None,
            first_day_of_week: 1,
            slot_minutes: 30,
            min_time: 0,
            max_time: 24,
            default_event_minutes: 240,
            show_event_header: false,
            applications_visible: false,
            assignments_visible: true,
            swap_shifts: true,
            notes_visible: false,
            allow_self_assign: true,
            overrides: Fields::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub department_ids: Vec<i64>,
    #[serde(skip)]
    pub overrides: Fields,
}

impl NewUser {
    pub fn new(first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            department_ids: Vec::new(),
            overrides: Fields::new(),
        }
    }

    pub fn department_ids(mut self, department_ids: Vec<i64>) -> Self {
        self.department_ids = department_ids;
        self
    }
}

/// A shift to create, with local wall-clock times.
#[derive(Debug, Clone)]
pub struct NewShift {
    pub starts_at: chrono::NaiveDateTime,
    pub ends_at: chrono::NaiveDateTime,
    pub desired_coverage: u32,
    pub note: String,
    pub overrides: Fields,
}

impl NewShift {
    pub fn new(starts_at: chrono::NaiveDateTime, ends_at: chrono::NaiveDateTime) -> Self {
        Self {
            starts_at,
            ends_at,
            desired_coverage: 1,
            note: String::new(),
            overrides: Fields::new(),
        }
    }

    pub fn desired_coverage(mut self, desired_coverage: u32) -> Self {
        self.desired_coverage = desired_coverage;
        self
    }

    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = note.into();
        self
    }
}

/// Wire form of a shift: times carry offsets, names are resolved to ids.
#[derive(Debug, Clone, Serialize)]
pub struct ShiftPayload {
    pub starts_at: String,
    pub ends_at: String,
    pub location_id: i64,
    pub department_id: i64,
    pub desired_coverage: u32,
    pub note: String,
    #[serde(skip)]
    pub overrides: Fields,
}

#[derive(Debug, Clone, Serialize)]
pub struct Invitation {
    pub email: String,
    pub department_ids: Vec<i64>,
    #[serde(rename = "do")]
    pub action: String,
    #[serde(skip)]
    pub overrides: Fields,
}

impl Invitation {
    pub fn new(email: impl Into<String>, department_ids: Vec<i64>) -> Self {
        Self {
            email: email.into(),
            department_ids,
            action: "send_invitation".to_string(),
            overrides: Fields::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PublishSchedule {
    #[serde(rename = "do")]
    pub action: String,
    pub message: String,
    pub deliver_emails: bool,
    #[serde(skip)]
    pub overrides: Fields,
}

impl Default for PublishSchedule {
    fn default() -> Self {
        Self {
            action: "publish".to_string(),
            message: "A new schedule is available!".to_string(),
            deliver_emails: true,
            overrides: Fields::new(),
        }
    }
}

overridable!(
    NewLocation,
    NewDepartment,
    NewSchedule,
    NewUser,
    ShiftPayload,
    Invitation,
    PublishSchedule,
);

/// Body of the add/remove/assign user endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserIds {
    pub user_ids: Vec<i64>,
}

/// Body of the lock/unlock user call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserAction {
    #[serde(rename = "do")]
    pub action: String,
}

impl UserAction {
    pub fn lock() -> Self {
        Self {
            action: "lock".to_string(),
        }
    }

    pub fn unlock() -> Self {
        Self {
            action: "unlock".to_string(),
        }
    }
}
