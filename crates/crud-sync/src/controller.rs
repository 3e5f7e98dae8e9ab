//! # List Controller
//!
//! The [`ListController`] owns the authoritative in-memory collection of one entity type.
//! Like any actor it processes its mailbox sequentially in a single Tokio task, so the
//! collection, the request epoch and the pending slot need no locks.
//!
//! ## Ordering
//!
//! * Every refresh increments the epoch. A list response is installed only when its
//!   epoch is still current; older responses are discarded.
//! * Mutations never overlap a refresh or another mutation. While one is in flight the
//!   next waits in a single pending slot and the mailbox is not read, so further
//!   callers queue in the channel.
//! * A successful mutation is observed by refetching the list, never by patching it.
//!   A mutation that was queued behind another is dispatched before the trailing
//!   refresh, so both share one refetch. Callers are answered once that refetch settles.
//!   At most [`DEFAULT_COALESCE_LIMIT`] successful mutations share a refetch (see
//!   [`ListController::with_coalesce_limit`]); past that the refetch runs before the
//!   next queued mutation, so a steady stream of writes cannot starve earlier callers.
//!
//! ## Teardown
//!
//! Dropping every [`ListHandle`] or calling [`ListHandle::close`] stops the loop. In-flight
//! requests are aborted with their tasks, so a late response can never touch the state.

use crate::client::ResourceClient;
use crate::entity::SyncEntity;
use crate::error::SyncError;
use crate::message::{ListRequest, Mutation, Response};
use crate::reporter::ErrorReporter;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, warn};

/// Successful mutations that may share one trailing refresh.
pub const DEFAULT_COALESCE_LIMIT: usize = 8;

#[derive(Debug, Clone, PartialEq)]
pub enum ListPhase {
    Idle,
    Loading,
    Loaded,
    Failed(SyncError),
}

/// Observable state of a controller. `epoch` is the epoch of the installed items.
#[derive(Debug, Clone)]
pub struct ListSnapshot<T> {
    pub phase: ListPhase,
    pub items: Vec<T>,
    pub epoch: u64,
}

impl<T> Default for ListSnapshot<T> {
    fn default() -> Self {
        Self {
            phase: ListPhase::Idle,
            items: Vec::new(),
            epoch: 0,
        }
    }
}

impl<T: SyncEntity> ListSnapshot<T> {
    pub fn find(&self, id: &T::Id) -> Option<&T> {
        self.items.iter().find(|item| item.id() == id)
    }

    pub fn ids(&self) -> Vec<T::Id> {
        self.items.iter().map(|item| item.id().clone()).collect()
    }
}

enum Completion<T: SyncEntity> {
    Listed {
        epoch: u64,
        result: Result<Vec<T>, SyncError>,
    },
    Saved {
        label: &'static str,
        respond_to: Response<T>,
        result: Result<T, SyncError>,
    },
    Removed {
        id: T::Id,
        respond_to: Response<()>,
        result: Result<(), SyncError>,
    },
}

/// A successful mutation waiting for its trailing refresh.
enum Settled<T> {
    Saved(Response<T>, T),
    Removed(Response<()>),
}

/// The actor holding one entity type's collection.
pub struct ListController<T: SyncEntity> {
    receiver: mpsc::Receiver<ListRequest<T>>,
    teardown: watch::Receiver<bool>,
    state: watch::Sender<ListSnapshot<T>>,
    client: ResourceClient<T>,
    tasks: JoinSet<Completion<T>>,
    epoch: u64,
    outstanding: Option<u64>,
    mutation_in_flight: bool,
    pending: Option<Mutation<T>>,
    refresh_owed: bool,
    refresh_waiters: Vec<Response<()>>,
    settling: Vec<Settled<T>>,
    coalesce_limit: usize,
}

impl<T: SyncEntity> ListController<T> {
    /// Creates the controller and its handle.
    ///
    /// `buffer_size` bounds the mailbox. When it is full, handle calls wait for space.
    pub fn new(client: ResourceClient<T>, buffer_size: usize) -> (Self, ListHandle<T>) {
        let (sender, receiver) = mpsc::channel(buffer_size);
        let (state, snapshot) = watch::channel(ListSnapshot::default());
        let (close, teardown) = watch::channel(false);
        let controller = Self {
            receiver,
            teardown,
            state,
            client,
            tasks: JoinSet::new(),
            epoch: 0,
            outstanding: None,
            mutation_in_flight: false,
            pending: None,
            refresh_owed: false,
            refresh_waiters: Vec::new(),
            settling: Vec::new(),
            coalesce_limit: DEFAULT_COALESCE_LIMIT,
        };
        let handle = ListHandle {
            sender,
            state: snapshot,
            close: Arc::new(close),
        };
        (controller, handle)
    }

    /// Caps how many successful mutations wait on one trailing refresh. Minimum 1.
    pub fn with_coalesce_limit(mut self, limit: usize) -> Self {
        self.coalesce_limit = limit.max(1);
        self
    }

    /// Runs the event loop until teardown.
    ///
    /// The reporter receives every auth failure so the session can be ended globally.
    pub async fn run(mut self, reporter: ErrorReporter) {
        let endpoint = T::ENDPOINT;
        info!(endpoint, "List controller started");

        loop {
            tokio::select! {
                biased;
                _ = self.teardown.changed() => break,
                Some(joined) = self.tasks.join_next(), if !self.tasks.is_empty() => match joined {
                    Ok(completion) => self.on_completion(completion, &reporter),
                    Err(e) => self.on_task_lost(e),
                },
                request = self.receiver.recv(), if self.pending.is_none() => match request {
                    Some(request) => self.on_request(request),
                    None => break,
                },
            }
            self.pump();
        }

        self.tasks.abort_all();
        let size = self.state.borrow().items.len();
        info!(endpoint, size, "List controller shut down");
    }

    fn on_request(&mut self, request: ListRequest<T>) {
        match request {
            ListRequest::Refresh { respond_to } => {
                self.refresh_waiters.push(respond_to);
                if self.mutation_in_flight {
                    debug!(endpoint = T::ENDPOINT, "Refresh folded into trailing refresh");
                    self.refresh_owed = true;
                } else {
                    self.issue_refresh();
                }
            }
            ListRequest::Create { draft, respond_to } => {
                self.enqueue(Mutation::Create { draft, respond_to })
            }
            ListRequest::Update {
                id,
                draft,
                respond_to,
            } => self.enqueue(Mutation::Update {
                id,
                draft,
                respond_to,
            }),
            ListRequest::Remove { id, respond_to } => {
                self.enqueue(Mutation::Remove { id, respond_to })
            }
        }
    }

    fn enqueue(&mut self, mutation: Mutation<T>) {
        debug!(endpoint = T::ENDPOINT, op = mutation.label(), "Mutation queued");
        self.pending = Some(mutation);
    }

    /// Dispatches the next piece of work once nothing is in flight.
    fn pump(&mut self) {
        if self.tasks.is_empty() && (self.outstanding.is_some() || self.mutation_in_flight) {
            self.recover_lost_tasks();
        }
        if self.outstanding.is_some() || self.mutation_in_flight {
            return;
        }
        let refresh_due = self.refresh_owed && self.settling.len() >= self.coalesce_limit;
        if !refresh_due {
            if let Some(mutation) = self.pending.take() {
                self.dispatch(mutation);
                return;
            }
        }
        if self.refresh_owed {
            self.refresh_owed = false;
            self.issue_refresh();
        }
    }

    fn issue_refresh(&mut self) {
        self.epoch += 1;
        let epoch = self.epoch;
        self.outstanding = Some(epoch);
        self.state.send_modify(|s| s.phase = ListPhase::Loading);
        debug!(endpoint = T::ENDPOINT, epoch, "Refresh issued");

        let client = self.client.clone();
        self.tasks.spawn(async move {
            let result = client.list().await;
            Completion::Listed { epoch, result }
        });
    }

    fn dispatch(&mut self, mutation: Mutation<T>) {
        debug!(endpoint = T::ENDPOINT, op = mutation.label(), "Mutation dispatched");
        self.mutation_in_flight = true;
        let client = self.client.clone();
        match mutation {
            Mutation::Create { draft, respond_to } => {
                self.tasks.spawn(async move {
                    let result = client.create(&draft).await;
                    Completion::Saved {
                        label: "create",
                        respond_to,
                        result,
                    }
                });
            }
            Mutation::Update {
                id,
                draft,
                respond_to,
            } => {
                self.tasks.spawn(async move {
                    let result = client.update(&id, &draft).await;
                    Completion::Saved {
                        label: "update",
                        respond_to,
                        result,
                    }
                });
            }
            Mutation::Remove { id, respond_to } => {
                self.tasks.spawn(async move {
                    let result = client.remove(&id).await;
                    Completion::Removed {
                        id,
                        respond_to,
                        result,
                    }
                });
            }
        }
    }

    fn on_completion(&mut self, completion: Completion<T>, reporter: &ErrorReporter) {
        let endpoint = T::ENDPOINT;
        match completion {
            Completion::Listed { epoch, result } => self.on_listed(epoch, result, reporter),
            Completion::Saved {
                label,
                respond_to,
                result,
            } => {
                self.mutation_in_flight = false;
                match result {
                    Ok(saved) => {
                        info!(endpoint, op = label, id = %saved.id(), "Mutation applied");
                        self.refresh_owed = true;
                        self.settling.push(Settled::Saved(respond_to, saved));
                    }
                    Err(e) => {
                        warn!(endpoint, op = label, error = %e, "Mutation failed");
                        reporter.escalate(&e);
                        let _ = respond_to.send(Err(e));
                    }
                }
            }
            Completion::Removed {
                id,
                respond_to,
                result,
            } => {
                self.mutation_in_flight = false;
                match result {
                    Ok(()) => {
                        info!(endpoint, %id, "Removed");
                        self.refresh_owed = true;
                        self.settling.push(Settled::Removed(respond_to));
                    }
                    Err(e) if e.is_not_found() => {
                        info!(endpoint, %id, "Already removed");
                        self.refresh_owed = true;
                        self.settling.push(Settled::Removed(respond_to));
                    }
                    Err(e) => {
                        warn!(endpoint, %id, error = %e, "Remove failed");
                        reporter.escalate(&e);
                        let _ = respond_to.send(Err(e));
                    }
                }
            }
        }
    }

    fn on_listed(&mut self, epoch: u64, result: Result<Vec<T>, SyncError>, reporter: &ErrorReporter) {
        let endpoint = T::ENDPOINT;
        if epoch != self.epoch {
            debug!(endpoint, epoch, current = self.epoch, "Discarding stale list response");
            return;
        }
        self.outstanding = None;

        match result {
            Ok(items) => {
                let items = unique_by_id(items);
                info!(endpoint, epoch, size = items.len(), "List installed");
                self.state.send_modify(|s| {
                    s.phase = ListPhase::Loaded;
                    s.items = items;
                    s.epoch = epoch;
                });
                for waiter in self.refresh_waiters.drain(..) {
                    let _ = waiter.send(Ok(()));
                }
            }
            Err(e) => {
                warn!(endpoint, epoch, error = %e, "Refresh failed");
                reporter.escalate(&e);
                self.state
                    .send_modify(|s| s.phase = ListPhase::Failed(e.clone()));
                for waiter in self.refresh_waiters.drain(..) {
                    let _ = waiter.send(Err(e.clone()));
                }
            }
        }
        self.settle();
    }

    /// Answers mutation callers whose effect the latest refresh has observed.
    fn settle(&mut self) {
        for settled in self.settling.drain(..) {
            match settled {
                Settled::Saved(respond_to, item) => {
                    let _ = respond_to.send(Ok(item));
                }
                Settled::Removed(respond_to) => {
                    let _ = respond_to.send(Ok(()));
                }
            }
        }
    }

    fn on_task_lost(&mut self, e: JoinError) {
        error!(endpoint = T::ENDPOINT, error = %e, "Request task failed");
    }

    /// Nothing is running but a refresh or mutation is still marked in flight.
    fn recover_lost_tasks(&mut self) {
        warn!(endpoint = T::ENDPOINT, "Resetting controller after a lost request");
        self.outstanding = None;
        self.mutation_in_flight = false;
        let e = SyncError::Network("request task failed".to_string());
        self.state
            .send_modify(|s| s.phase = ListPhase::Failed(e.clone()));
        for waiter in self.refresh_waiters.drain(..) {
            let _ = waiter.send(Err(e.clone()));
        }
        self.settle();
    }
}

/// Keeps the first occurrence of each identifier, preserving server order.
fn unique_by_id<T: SyncEntity>(items: Vec<T>) -> Vec<T> {
    let received = items.len();
    let mut seen = HashSet::with_capacity(received);
    let unique: Vec<T> = items
        .into_iter()
        .filter(|item| seen.insert(item.id().clone()))
        .collect();
    if unique.len() != received {
        warn!(
            endpoint = T::ENDPOINT,
            dropped = received - unique.len(),
            "Duplicate identifiers in list response"
        );
    }
    unique
}

/// Clonable interface to a running [`ListController`].
pub struct ListHandle<T: SyncEntity> {
    sender: mpsc::Sender<ListRequest<T>>,
    state: watch::Receiver<ListSnapshot<T>>,
    close: Arc<watch::Sender<bool>>,
}

impl<T: SyncEntity> Clone for ListHandle<T> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            state: self.state.clone(),
            close: self.close.clone(),
        }
    }
}

impl<T: SyncEntity> ListHandle<T> {
    async fn request<R>(
        &self,
        build: impl FnOnce(Response<R>) -> ListRequest<T>,
    ) -> Result<R, SyncError> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(build(respond_to))
            .await
            .map_err(|_| SyncError::ControllerClosed)?;
        response.await.map_err(|_| SyncError::ControllerClosed)?
    }

    /// Refetches the collection. Resolves when the newest refresh settles.
    pub async fn refresh(&self) -> Result<(), SyncError> {
        self.request(|respond_to| ListRequest::Refresh { respond_to })
            .await
    }

    pub async fn create(&self, draft: T::Draft) -> Result<T, SyncError> {
        self.request(|respond_to| ListRequest::Create { draft, respond_to })
            .await
    }

    pub async fn update(&self, id: T::Id, draft: T::Draft) -> Result<T, SyncError> {
        self.request(|respond_to| ListRequest::Update {
            id,
            draft,
            respond_to,
        })
        .await
    }

    /// Removing an identifier the server no longer knows succeeds.
    pub async fn remove(&self, id: T::Id) -> Result<(), SyncError> {
        self.request(|respond_to| ListRequest::Remove { id, respond_to })
            .await
    }

    pub fn snapshot(&self) -> ListSnapshot<T> {
        self.state.borrow().clone()
    }

    pub fn items(&self) -> Vec<T> {
        self.state.borrow().items.clone()
    }

    pub fn phase(&self) -> ListPhase {
        self.state.borrow().phase.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ListSnapshot<T>> {
        self.state.clone()
    }

    /// Tears the controller down. Outstanding calls resolve with `ControllerClosed`.
    pub fn close(&self) {
        self.close.send_replace(true);
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}
