//! Wire models for the Mill open API.
//!
//! Field names mirror the remote camelCase schema exactly; they are part of
//! the wire contract. List payloads are deliberately lenient: the server is
//! known to return null entries and to omit keys it has no value for, and an
//! omitted key must not clear a previously synced value.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

// =====================
// Scalar ID newtype wrappers
// =====================

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HomeId(pub i64);

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub i64);

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(pub i64);

impl core::fmt::Display for HomeId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl core::fmt::Display for RoomId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl core::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =====================
// Merge-aware payload field
// =====================

/// Distinguishes a key that was absent from one that was explicitly null.
/// Absent keys keep the previously stored value; null clears it.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Field<T> {
    #[default]
    Absent,
    Null,
    Set(T),
}

impl<T> Field<T> {
    pub fn apply(self, slot: &mut Option<T>) {
        match self {
            Field::Absent => {}
            Field::Null => *slot = None,
            Field::Set(v) => *slot = Some(v),
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Field<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Option::<T>::deserialize(deserializer)? {
            Some(v) => Field::Set(v),
            None => Field::Null,
        })
    }
}

// =====================
// List envelopes and entries
// =====================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HomeEntry {
    pub home_id: HomeId,
    #[serde(default)]
    pub home_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HomeListData {
    #[serde(default)]
    pub home_list: Vec<HomeEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomEntry {
    pub room_id: RoomId,
    #[serde(default)]
    pub room_name: Field<String>,
    #[serde(default)]
    pub comfort_temp: Field<f64>,
    #[serde(default)]
    pub away_temp: Field<f64>,
    #[serde(default)]
    pub sleep_temp: Field<f64>,
    #[serde(default)]
    pub current_mode: Field<i64>,
    #[serde(default)]
    pub heat_status: Field<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomListData {
    #[serde(default)]
    pub room_list: Vec<RoomEntry>,
}

/// One device sighting. `deviceId` is optional so that partial server
/// responses can be skipped instead of failing the whole sync.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceEntry {
    #[serde(default)]
    pub device_id: Option<DeviceId>,
    #[serde(default)]
    pub device_name: Field<String>,
    #[serde(default)]
    pub current_temp: Field<f64>,
    #[serde(default)]
    pub device_status: Field<i64>,
    #[serde(default)]
    pub heater_flag: Field<i64>,
    #[serde(default)]
    pub control_type: Field<i64>,
    #[serde(default)]
    pub can_change_temp: Field<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndependentDeviceData {
    #[serde(default)]
    pub device_info_list: Vec<Option<DeviceEntry>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomDeviceData {
    #[serde(default)]
    pub device_list: Vec<Option<DeviceEntry>>,
}

// =====================
// Credential payload
// =====================

/// Token material issued by `applyAccessToken` and `refreshtoken`.
/// Expiries arrive as millisecond epochs, sometimes as numeric strings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TokenSet {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(rename = "expireTime", deserialize_with = "de_epoch_ms")]
    pub expires_at: DateTime<Utc>,
    #[serde(rename = "refresh_expireTime", deserialize_with = "de_epoch_ms")]
    pub refresh_expires_at: DateTime<Utc>,
}

fn de_epoch_ms<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    let ms = match &raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .ok_or_else(|| serde::de::Error::custom("expected a millisecond epoch as number or string"))?;
    Utc.timestamp_millis_opt(ms as i64)
        .single()
        .ok_or_else(|| serde::de::Error::custom("millisecond epoch out of range"))
}

// =====================
// Stored entities
// =====================

/// Locally cached room state, keyed by `room_id`.
#[derive(Debug, Clone, PartialEq)]
pub struct Room {
    pub room_id: RoomId,
    pub name: Option<String>,
    pub comfort_temp: Option<f64>,
    pub away_temp: Option<f64>,
    pub sleep_temp: Option<f64>,
    pub current_mode: Option<i64>,
    pub heat_status: Option<i64>,
}

impl Room {
    pub fn new(room_id: RoomId) -> Room {
        Room {
            room_id,
            name: None,
            comfort_temp: None,
            away_temp: None,
            sleep_temp: None,
            current_mode: None,
            heat_status: None,
        }
    }
}

/// Locally cached heater state, keyed by `device_id`. `room` records where
/// the device was last seen in a per-room listing; independent-device
/// sightings leave it untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct Heater {
    pub device_id: DeviceId,
    pub name: Option<String>,
    pub current_temp: Option<f64>,
    pub device_status: Option<i64>,
    pub heater_flag: Option<i64>,
    pub control_type: Option<i64>,
    pub can_change_temp: Option<i64>,
    pub room: Option<RoomId>,
}

impl Heater {
    pub fn new(device_id: DeviceId) -> Heater {
        Heater {
            device_id,
            name: None,
            current_temp: None,
            device_status: None,
            heater_flag: None,
            control_type: None,
            can_change_temp: None,
            room: None,
        }
    }
}
