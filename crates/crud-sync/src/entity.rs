//! # Entity Schema
//!
//! Every resource type synchronized by this crate implements [`SyncEntity`]. The trait
//! names the endpoint, the identifier type, the draft type used by forms, and the
//! validation table applied before any network call.

use crate::validation::Validator;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::{self, Debug, Display};
use std::hash::Hash;

/// Schema of one resource type served at `/{ENDPOINT}`.
///
/// # Associated Types
///
/// * `Id` - The server-assigned identifier. Must be unique within a collection.
/// * `Draft` - The editable subset of fields. Serialized as the request body of
///   create and update calls; `Default` is the empty "create" draft.
///
/// ```rust
/// use crud_sync::{SyncEntity, Validator};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Clone, Deserialize)]
/// struct Room {
///     #[serde(rename = "_id")]
///     id: String,
///     title: String,
/// }
///
/// #[derive(Debug, Clone, Default, Serialize)]
/// struct RoomDraft {
///     title: String,
/// }
///
/// impl SyncEntity for Room {
///     type Id = String;
///     type Draft = RoomDraft;
///     const ENDPOINT: &'static str = "room";
///
///     fn id(&self) -> &String { &self.id }
///     fn to_draft(&self) -> RoomDraft { RoomDraft { title: self.title.clone() } }
///     fn rules() -> Validator<RoomDraft> {
///         Validator::<RoomDraft>::new().required("title", "Title is required", |d| &d.title)
///     }
/// }
/// ```
pub trait SyncEntity: Clone + Debug + Send + Sync + DeserializeOwned + 'static {
    type Id: Clone
        + Eq
        + Hash
        + Debug
        + Display
        + Send
        + Sync
        + Serialize
        + DeserializeOwned
        + 'static;
    type Draft: Clone + Debug + Default + Send + Sync + Serialize + 'static;

    /// Path segment of the collection, without slashes (e.g. `"doctor"`).
    const ENDPOINT: &'static str;

    /// Name of the identifier field in update bodies.
    const ID_FIELD: &'static str = "_id";

    fn id(&self) -> &Self::Id;

    /// Pre-populates an "edit" draft from a committed resource.
    fn to_draft(&self) -> Self::Draft;

    fn rules() -> Validator<Self::Draft> {
        Validator::new()
    }

    /// Binary parts of a draft. A non-empty result switches the request body to
    /// `multipart/form-data`.
    fn attachments(_draft: &Self::Draft) -> Vec<Attachment> {
        Vec::new()
    }
}

/// A binary file sent alongside draft fields.
#[derive(Clone, PartialEq, Eq)]
pub struct Attachment {
    pub field: String,
    pub file_name: String,
    pub mime: Option<String>,
    pub bytes: Vec<u8>,
}

impl Attachment {
    pub fn new(field: impl Into<String>, file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            field: field.into(),
            file_name: file_name.into(),
            mime: None,
            bytes,
        }
    }

    pub fn with_mime(mut self, mime: impl Into<String>) -> Self {
        self.mime = Some(mime.into());
        self
    }
}

impl Debug for Attachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attachment")
            .field("field", &self.field)
            .field("file_name", &self.file_name)
            .field("mime", &self.mime)
            .field("len", &self.bytes.len())
            .finish()
    }
}
