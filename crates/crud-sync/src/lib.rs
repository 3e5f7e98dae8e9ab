//! # CRUD Sync
//!
//! This crate keeps in-memory collections of server resources in step with a REST
//! backend that requires a bearer token. It is entity-agnostic: one generic client,
//! list controller and form session serve every resource type that implements
//! [`SyncEntity`].
//!
//! ## Architecture Overview
//!
//! Leaves first:
//!
//! 1. **Credential Store** ([`CredentialStore`]) - Owns the bearer token in durable
//!    storage and publishes session transitions.
//! 2. **Resource Client** ([`ResourceClient`]) - Stateless list/create/update/remove
//!    calls against `/{endpoint}`, with classified errors.
//! 3. **List Controller** ([`ListController`]) - An actor holding the authoritative
//!    collection. It sequences refreshes and mutations and discards stale responses.
//! 4. **Form Session** ([`FormSession`]) - Modal lifecycle, draft editing, client-side
//!    validation and submission.
//! 5. **Error Reporter** ([`ErrorReporter`]) - Maps failures to inline feedback and ends
//!    the session on auth failures.
//!
//! ## Data Flow
//!
//! A form validates its draft locally, then asks the list controller to mutate. The
//! controller calls the resource client, which attaches the current token. On success
//! the controller refetches the list and the form closes. On failure the list stays as
//! it was and the form reopens with the error inline.
//!
//! ```rust
//! use crud_sync::mock::MockTransport;
//! use crud_sync::transport::Method;
//! use crud_sync::{
//!     Credential, CredentialStore, ErrorReporter, ListController, ResourceClient, SyncEntity,
//! };
//! use serde::{Deserialize, Serialize};
//! use serde_json::json;
//!
//! #[derive(Debug, Clone, Deserialize)]
//! struct Room { #[serde(rename = "_id")] id: String, title: String }
//! #[derive(Debug, Clone, Default, Serialize)]
//! struct RoomDraft { title: String }
//!
//! impl SyncEntity for Room {
//!     type Id = String;
//!     type Draft = RoomDraft;
//!     const ENDPOINT: &'static str = "room";
//!     fn id(&self) -> &String { &self.id }
//!     fn to_draft(&self) -> RoomDraft { RoomDraft { title: self.title.clone() } }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let mock = MockTransport::new();
//!     mock.expect(Method::Get, "/room").respond_json(200, json!([{"_id": "r1", "title": "101"}]));
//!
//!     let credentials = CredentialStore::in_memory();
//!     credentials.set(Credential::new("token")).unwrap();
//!
//!     let client = ResourceClient::<Room>::new("http://mock", mock.shared(), credentials.clone());
//!     let (controller, rooms) = ListController::new(client, 16);
//!     tokio::spawn(controller.run(ErrorReporter::new(credentials)));
//!
//!     rooms.refresh().await.unwrap();
//!     assert_eq!(rooms.items()[0].title, "101");
//! }
//! ```
//!
//! ## Concurrency Model
//!
//! - Each list controller runs in its own Tokio task and handles one message at a time
//! - Controllers for different entity types share nothing but the credential store
//! - The credential store is read on every call, so a sign-out is seen everywhere at once
//!
//! ## Testing
//!
//! The [`mock`] module provides [`MockTransport`](mock::MockTransport), an in-memory
//! HTTP transport with ordered expectations, request recording and gated responses for
//! race tests.

pub mod auth;
pub mod client;
pub mod controller;
pub mod credential;
pub mod entity;
pub mod error;
pub mod form;
pub mod message;
pub mod mock;
pub mod reporter;
pub mod transport;
pub mod validation;

pub use auth::{AuthClient, LoginDraft, Registration, RegistrationDraft, SessionError};
pub use client::ResourceClient;
pub use controller::{ListController, ListHandle, ListPhase, ListSnapshot, DEFAULT_COALESCE_LIMIT};
pub use credential::{
    Credential, CredentialStore, FileStore, KeyValueStore, MemoryStore, SessionStatus, StoreError,
    TOKEN_KEY,
};
pub use entity::{Attachment, SyncEntity};
pub use error::{AuthFailure, ErrorKind, SyncError};
pub use form::{FormError, FormErrors, FormMode, FormSession, FormState, SubmitError, Submission};
pub use message::{ListRequest, Response};
pub use reporter::{ErrorReporter, Presentation, Report};
pub use transport::{HttpTransport, ReqwestTransport};
pub use validation::{FieldErrors, Validator};
