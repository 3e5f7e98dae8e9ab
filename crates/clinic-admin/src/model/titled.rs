//! Reference entities that carry nothing but a title.
//!
//! Departments, positions, rooms and specializations share one schema, so they are
//! generated by [`titled_entity!`].

use super::RecordId;
use crud_sync::{SyncEntity, Validator};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Generates a titled entity, its `<Name>Draft` and the [`SyncEntity`] impl.
macro_rules! titled_entity {
    ($(#[$meta:meta])* $name:ident => $endpoint:literal) => {
        paste::paste! {
            $(#[$meta])*
            #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
            pub struct $name {
                #[serde(rename = "_id")]
                pub id: RecordId,
                pub title: String,
                #[serde(default, skip_serializing_if = "Option::is_none")]
                pub status: Option<Value>,
                #[serde(default, rename = "createdTime", skip_serializing_if = "Option::is_none")]
                pub created_time: Option<Value>,
                #[serde(default, rename = "userId", skip_serializing_if = "Option::is_none")]
                pub user_id: Option<String>,
            }

            #[doc = "Editable fields of a [`" $name "`]."]
            #[derive(Debug, Clone, Default, PartialEq, Serialize)]
            pub struct [<$name Draft>] {
                pub title: String,
            }

            impl [<$name Draft>] {
                pub fn new(title: impl Into<String>) -> Self {
                    Self { title: title.into() }
                }
            }

            impl SyncEntity for $name {
                type Id = RecordId;
                type Draft = [<$name Draft>];
                const ENDPOINT: &'static str = $endpoint;

                fn id(&self) -> &RecordId {
                    &self.id
                }

                fn to_draft(&self) -> [<$name Draft>] {
                    [<$name Draft>]::new(self.title.clone())
                }

                fn rules() -> Validator<[<$name Draft>]> {
                    Validator::<[<$name Draft>]>::new()
                        .required("title", "Title is required", |draft| &draft.title)
                }
            }
        }
    };
}

titled_entity! {
    /// A hospital department doctors are assigned to.
    Department => "department"
}

titled_entity! {
    /// A staff position.
    Position => "position"
}

titled_entity! {
    /// A consulting room.
    Room => "room"
}

titled_entity! {
    /// A medical specialization. The backend calls the collection `spec`.
    Specialization => "spec"
}
