//! # Form Session
//!
//! A [`FormSession`] drives one modal through `Closed`, `Open` and `Submitting`. The
//! single tagged [`FormState`] makes combinations such as two open modals impossible.
//!
//! Submission is split in two so a UI can stay responsive while the request runs:
//! [`FormSession::begin_submit`] validates and moves to `Submitting`, the returned
//! [`Submission`] is dispatched against a [`ListHandle`], and
//! [`FormSession::complete`] applies the result. A result whose ticket no longer matches
//! (the form was cancelled or reopened meanwhile) is discarded.
//! [`FormSession::submit`] runs all three steps.

use crate::controller::ListHandle;
use crate::entity::SyncEntity;
use crate::error::SyncError;
use crate::reporter::{ErrorReporter, Presentation, Report};
use crate::validation::{FieldErrors, Validator};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormMode<Id> {
    Create,
    Edit(Id),
}

/// Inline feedback kept while the form stays open.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormErrors {
    pub fields: FieldErrors,
    pub form: Option<String>,
}

impl FormErrors {
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.form.is_none()
    }

    fn from_report(report: &Report) -> Self {
        match &report.presentation {
            Presentation::Fields(fields) => Self {
                fields: fields.clone(),
                form: None,
            },
            Presentation::Form(message) => Self {
                fields: FieldErrors::new(),
                form: Some(message.clone()),
            },
            Presentation::Silent => Self::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum FormState<T: SyncEntity> {
    Closed,
    Open {
        mode: FormMode<T::Id>,
        draft: T::Draft,
        errors: FormErrors,
    },
    Submitting {
        mode: FormMode<T::Id>,
        draft: T::Draft,
        ticket: u64,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormError {
    #[error("a form is already open")]
    AlreadyOpen,
    #[error("no form is open")]
    NotOpen,
    #[error("the form is being submitted")]
    Submitting,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SubmitError {
    #[error("no form is open")]
    NotOpen,
    #[error("a submission is already in flight")]
    InFlight,
    #[error("validation failed: {0}")]
    Invalid(FieldErrors),
    #[error("submission failed: {0}")]
    Failed(Report),
    #[error("submission result discarded: the form was closed or reopened")]
    Discarded,
}

/// A validated draft ready to be sent.
#[derive(Debug, Clone)]
pub struct Submission<T: SyncEntity> {
    ticket: u64,
    mode: FormMode<T::Id>,
    draft: T::Draft,
}

impl<T: SyncEntity> Submission<T> {
    pub fn ticket(&self) -> u64 {
        self.ticket
    }

    pub async fn dispatch(&self, list: &ListHandle<T>) -> Result<T, SyncError> {
        match &self.mode {
            FormMode::Create => list.create(self.draft.clone()).await,
            FormMode::Edit(id) => list.update(id.clone(), self.draft.clone()).await,
        }
    }
}

pub struct FormSession<T: SyncEntity> {
    state: FormState<T>,
    rules: Validator<T::Draft>,
    reporter: ErrorReporter,
    next_ticket: u64,
}

impl<T: SyncEntity> FormSession<T> {
    pub fn new(reporter: ErrorReporter) -> Self {
        Self {
            state: FormState::Closed,
            rules: T::rules(),
            reporter,
            next_ticket: 0,
        }
    }

    pub fn state(&self) -> &FormState<T> {
        &self.state
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state, FormState::Closed)
    }

    pub fn mode(&self) -> Option<&FormMode<T::Id>> {
        match &self.state {
            FormState::Closed => None,
            FormState::Open { mode, .. } | FormState::Submitting { mode, .. } => Some(mode),
        }
    }

    pub fn draft(&self) -> Option<&T::Draft> {
        match &self.state {
            FormState::Closed => None,
            FormState::Open { draft, .. } | FormState::Submitting { draft, .. } => Some(draft),
        }
    }

    pub fn errors(&self) -> Option<&FormErrors> {
        match &self.state {
            FormState::Open { errors, .. } => Some(errors),
            _ => None,
        }
    }

    /// Opens an empty "create" form.
    pub fn open_create(&mut self) -> Result<(), FormError> {
        self.open(FormMode::Create, T::Draft::default())
    }

    /// Opens an "edit" form pre-populated from a committed resource.
    pub fn open_edit(&mut self, resource: &T) -> Result<(), FormError> {
        self.open(FormMode::Edit(resource.id().clone()), resource.to_draft())
    }

    fn open(&mut self, mode: FormMode<T::Id>, draft: T::Draft) -> Result<(), FormError> {
        match self.state {
            FormState::Closed => {
                debug!(endpoint = T::ENDPOINT, ?mode, "Form opened");
                self.state = FormState::Open {
                    mode,
                    draft,
                    errors: FormErrors::default(),
                };
                Ok(())
            }
            FormState::Open { .. } => Err(FormError::AlreadyOpen),
            FormState::Submitting { .. } => Err(FormError::Submitting),
        }
    }

    /// Mutable access to the draft while the form is open.
    pub fn draft_mut(&mut self) -> Result<&mut T::Draft, FormError> {
        match &mut self.state {
            FormState::Open { draft, .. } => Ok(draft),
            FormState::Closed => Err(FormError::NotOpen),
            FormState::Submitting { .. } => Err(FormError::Submitting),
        }
    }

    /// Discards the draft without any network call. Returns whether a form was open.
    pub fn cancel(&mut self) -> bool {
        let was_open = !self.is_closed();
        if was_open {
            debug!(endpoint = T::ENDPOINT, "Form cancelled");
        }
        self.state = FormState::Closed;
        was_open
    }

    /// Validates the draft and moves to `Submitting`.
    ///
    /// An invalid draft leaves the form open with one error per offending field and
    /// nothing is sent.
    pub fn begin_submit(&mut self) -> Result<Submission<T>, SubmitError> {
        let (mode, draft) = match &mut self.state {
            FormState::Open { mode, draft, errors } => {
                if let Err(fields) = self.rules.validate(draft) {
                    debug!(endpoint = T::ENDPOINT, invalid = fields.len(), "Draft rejected");
                    *errors = FormErrors {
                        fields: fields.clone(),
                        form: None,
                    };
                    return Err(SubmitError::Invalid(fields));
                }
                (mode.clone(), draft.clone())
            }
            FormState::Closed => return Err(SubmitError::NotOpen),
            FormState::Submitting { .. } => return Err(SubmitError::InFlight),
        };

        self.next_ticket += 1;
        let ticket = self.next_ticket;
        self.state = FormState::Submitting {
            mode: mode.clone(),
            draft: draft.clone(),
            ticket,
        };
        Ok(Submission {
            ticket,
            mode,
            draft,
        })
    }

    /// Applies a dispatched submission's result.
    ///
    /// Success closes the form. Failure reopens it with the draft intact and the error
    /// attached inline.
    pub fn complete(&mut self, ticket: u64, result: Result<T, SyncError>) -> Result<T, SubmitError> {
        let state = std::mem::replace(&mut self.state, FormState::Closed);
        match state {
            FormState::Submitting {
                mode,
                draft,
                ticket: current,
            } if current == ticket => match result {
                Ok(saved) => {
                    info!(endpoint = T::ENDPOINT, id = %saved.id(), "Form submitted");
                    Ok(saved)
                }
                Err(e) => {
                    let report = self.reporter.report(&e);
                    debug!(endpoint = T::ENDPOINT, error = %e, "Form submission failed");
                    self.state = FormState::Open {
                        mode,
                        draft,
                        errors: FormErrors::from_report(&report),
                    };
                    Err(SubmitError::Failed(report))
                }
            },
            other => {
                debug!(endpoint = T::ENDPOINT, ticket, "Discarding stale submission result");
                self.state = other;
                Err(SubmitError::Discarded)
            }
        }
    }

    pub async fn submit(&mut self, list: &ListHandle<T>) -> Result<T, SubmitError> {
        let submission = self.begin_submit()?;
        let result = submission.dispatch(list).await;
        self.complete(submission.ticket(), result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::CredentialStore;
    use crate::error::ErrorKind;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Deserialize)]
    struct Room {
        #[serde(rename = "_id")]
        id: String,
        title: String,
    }

    #[derive(Debug, Clone, Default, Serialize)]
    struct RoomDraft {
        title: String,
    }

    impl SyncEntity for Room {
        type Id = String;
        type Draft = RoomDraft;
        const ENDPOINT: &'static str = "room";

        fn id(&self) -> &String {
            &self.id
        }

        fn to_draft(&self) -> RoomDraft {
            RoomDraft {
                title: self.title.clone(),
            }
        }

        fn rules() -> Validator<RoomDraft> {
            Validator::<RoomDraft>::new().required("title", "Title is required", |d| &d.title)
        }
    }

    fn session() -> FormSession<Room> {
        FormSession::new(ErrorReporter::new(CredentialStore::in_memory()))
    }

    #[test]
    fn test_open_edit_copies_resource() {
        let mut form = session();
        let room = Room {
            id: "r1".into(),
            title: "101".into(),
        };
        form.open_edit(&room).unwrap();
        form.draft_mut().unwrap().title.push('A');

        assert_eq!(form.mode(), Some(&FormMode::Edit("r1".to_string())));
        assert_eq!(form.draft().unwrap().title, "101A");
        assert_eq!(room.title, "101");
    }

    #[test]
    fn test_second_open_is_rejected() {
        let mut form = session();
        form.open_create().unwrap();
        assert_eq!(form.open_create(), Err(FormError::AlreadyOpen));
    }

    #[test]
    fn test_invalid_draft_stays_open_with_field_error() {
        let mut form = session();
        form.open_create().unwrap();

        let err = form.begin_submit().unwrap_err();
        assert!(matches!(err, SubmitError::Invalid(ref f) if f.get("title") == Some("Title is required")));
        let errors = form.errors().unwrap();
        assert_eq!(errors.fields.len(), 1);
        assert!(errors.form.is_none());
    }

    #[test]
    fn test_failure_reopens_with_form_message() {
        let mut form = session();
        form.open_create().unwrap();
        form.draft_mut().unwrap().title = "Lab".into();
        let submission = form.begin_submit().unwrap();
        assert!(form.draft_mut().is_err());

        let result = form.complete(
            submission.ticket(),
            Err(SyncError::Server {
                status: 500,
                message: "Database offline".into(),
            }),
        );
        match result {
            Err(SubmitError::Failed(report)) => assert_eq!(report.kind, ErrorKind::Server),
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(form.draft().unwrap().title, "Lab");
        assert_eq!(form.errors().unwrap().form.as_deref(), Some("Database offline"));
    }

    #[test]
    fn test_result_after_cancel_is_discarded() {
        let mut form = session();
        form.open_create().unwrap();
        form.draft_mut().unwrap().title = "Lab".into();
        let submission = form.begin_submit().unwrap();
        assert!(form.cancel());

        let saved = Room {
            id: "r9".into(),
            title: "Lab".into(),
        };
        assert_eq!(
            form.complete(submission.ticket(), Ok(saved)).unwrap_err(),
            SubmitError::Discarded
        );
        assert!(form.is_closed());
    }
}
