//! # List Controller Messages
//!
//! Requests sent from a [`ListHandle`](crate::controller::ListHandle) to its
//! [`ListController`](crate::controller::ListController). Each carries a oneshot
//! [`Response`] that the controller answers once the operation has settled.

use crate::entity::SyncEntity;
use crate::error::SyncError;
use tokio::sync::oneshot;

/// One-shot reply channel used by the controller.
pub type Response<T> = oneshot::Sender<Result<T, SyncError>>;

#[derive(Debug)]
pub enum ListRequest<T: SyncEntity> {
    Refresh {
        respond_to: Response<()>,
    },
    Create {
        draft: T::Draft,
        respond_to: Response<T>,
    },
    Update {
        id: T::Id,
        draft: T::Draft,
        respond_to: Response<T>,
    },
    Remove {
        id: T::Id,
        respond_to: Response<()>,
    },
}

/// A mutation waiting in, or taken from, the controller's single pending slot.
#[derive(Debug)]
pub(crate) enum Mutation<T: SyncEntity> {
    Create {
        draft: T::Draft,
        respond_to: Response<T>,
    },
    Update {
        id: T::Id,
        draft: T::Draft,
        respond_to: Response<T>,
    },
    Remove {
        id: T::Id,
        respond_to: Response<()>,
    },
}

impl<T: SyncEntity> Mutation<T> {
    pub(crate) fn label(&self) -> &'static str {
        match self {
            Mutation::Create { .. } => "create",
            Mutation::Update { .. } => "update",
            Mutation::Remove { .. } => "remove",
        }
    }
}
