//! # Clinic Data Model
//!
//! Wire schemas for the clinic backend. Each entity implements
//! [`SyncEntity`](crud_sync::SyncEntity), which is all the sync core needs to list,
//! create, update and remove it.
//!
//! | Entity | Endpoint | Draft |
//! |--------|----------|-------|
//! | [`Doctor`] | `/doctor` | [`DoctorDraft`] (multipart when an avatar is attached) |
//! | [`Department`] | `/department` | [`DepartmentDraft`] |
//! | [`Position`] | `/position` | [`PositionDraft`] |
//! | [`Room`] | `/room` | [`RoomDraft`] |
//! | [`Specialization`] | `/spec` | [`SpecializationDraft`] |

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

pub mod doctor;
pub mod titled;

pub use doctor::{Doctor, DoctorDraft, Gender};
pub use titled::{
    Department, DepartmentDraft, Position, PositionDraft, Room, RoomDraft, Specialization,
    SpecializationDraft,
};

/// Server-assigned identifier (the `_id` field).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub String);

impl RecordId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RecordId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for RecordId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
