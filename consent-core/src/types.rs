//! Domain types for consent state.
//!
//! [`ConsentRecord`] is the persisted, versioned record owned by a
//! [`ConsentStore`](crate::store::ConsentStore). [`ConsentTransmission`] is the
//! ephemeral wire payload derived from it for a single remote submission.

use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::StoreError;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// The user's decision on data processing.
///
/// Persisted as its ordinal; `Undefined` is the absent-value sentinel and is
/// never sent over the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConsentStatus {
    /// No decision collected yet.
    #[default]
    Undefined,
    Accepted,
    Denied,
}

impl ConsentStatus {
    /// Ordinal used by the local store.
    pub fn ordinal(self) -> u8 {
        match self {
            ConsentStatus::Undefined => 0,
            ConsentStatus::Accepted => 1,
            ConsentStatus::Denied => 2,
        }
    }

    /// Decode a stored ordinal. Anything out of range reads as `Undefined`.
    pub fn from_ordinal(ordinal: i64) -> Self {
        match ordinal {
            1 => ConsentStatus::Accepted,
            2 => ConsentStatus::Denied,
            _ => ConsentStatus::Undefined,
        }
    }

    pub fn is_defined(self) -> bool {
        self != ConsentStatus::Undefined
    }
}

impl fmt::Display for ConsentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsentStatus::Undefined => write!(f, "undefined"),
            ConsentStatus::Accepted => write!(f, "accepted"),
            ConsentStatus::Denied => write!(f, "denied"),
        }
    }
}

impl Serialize for ConsentStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.ordinal())
    }
}

impl<'de> Deserialize<'de> for ConsentStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Tolerate garbage (strings, floats, null) the same way as an unknown ordinal.
        let value = serde_json::Value::deserialize(deserializer)?;
        Ok(value
            .as_i64()
            .map(ConsentStatus::from_ordinal)
            .unwrap_or_default())
    }
}

/// Wire representation of a defined consent decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WireStatus {
    #[serde(rename = "accept")]
    Accept,
    #[serde(rename = "deny")]
    Deny,
}

impl TryFrom<ConsentStatus> for WireStatus {
    type Error = StoreError;

    fn try_from(status: ConsentStatus) -> Result<Self, Self::Error> {
        match status {
            ConsentStatus::Accepted => Ok(WireStatus::Accept),
            ConsentStatus::Denied => Ok(WireStatus::Deny),
            ConsentStatus::Undefined => Err(StoreError::UndefinedStatus),
        }
    }
}

// ---------------------------------------------------------------------------
// Domain structs
// ---------------------------------------------------------------------------

/// The single persisted consent record.
///
/// All four fields are written together in one store call. Missing fields
/// read as their defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConsentRecord {
    #[serde(default)]
    pub status: ConsentStatus,
    /// Epoch milliseconds of the last status change; `0` means never set.
    #[serde(default)]
    pub updated_at_ms: i64,
    /// True iff the current `status` has been acknowledged by the remote sink.
    #[serde(default)]
    pub remotely_synced: bool,
    /// Bumped on every status write.
    #[serde(default)]
    pub revision: u64,
}

impl ConsentRecord {
    /// The record that replaces `self` when the user picks `status` at `now_ms`.
    ///
    /// `remotely_synced` is always reset.
    pub fn next(&self, status: ConsentStatus, now_ms: i64) -> Self {
        Self {
            status,
            updated_at_ms: now_ms.max(0),
            remotely_synced: false,
            revision: self.revision.wrapping_add(1),
        }
    }

    /// The undecided record that replaces `self` on clear. The revision keeps
    /// counting so acknowledgments for earlier decisions never match again.
    pub fn cleared(&self) -> Self {
        Self {
            revision: self.revision.wrapping_add(1),
            ..Self::default()
        }
    }

    /// Same record, acknowledged.
    pub fn synced(&self) -> Self {
        Self {
            remotely_synced: true,
            ..*self
        }
    }

    /// `updated_at_ms` as a UTC timestamp; `None` when never set.
    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        if self.updated_at_ms <= 0 {
            return None;
        }
        Utc.timestamp_millis_opt(self.updated_at_ms).single()
    }
}

/// One remote submission. Built fresh per call, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsentTransmission {
    pub status: WireStatus,
    pub device_id: String,
    #[serde(serialize_with = "serialize_wire_date")]
    pub date: DateTime<Utc>,
}

impl ConsentTransmission {
    /// Build the payload for `status`, stamped with `updated_at_ms`.
    ///
    /// Fails with [`StoreError::UndefinedStatus`] for `Undefined`.
    pub fn new(
        status: ConsentStatus,
        device_id: impl Into<String>,
        updated_at_ms: i64,
    ) -> Result<Self, StoreError> {
        let status = WireStatus::try_from(status)?;
        let date = Utc
            .timestamp_millis_opt(updated_at_ms.max(0))
            .single()
            .unwrap_or_default();
        Ok(Self {
            status,
            device_id: device_id.into(),
            date,
        })
    }

    /// The JSON body sent to the remote sink.
    pub fn to_json(&self) -> Result<String, StoreError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Wire dates are ISO-8601 UTC with second precision.
pub const WIRE_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

fn serialize_wire_date<S: Serializer>(date: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&date.format(WIRE_DATE_FORMAT).to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
