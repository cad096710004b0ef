//! Per-client job state.
//!
//! # Design
//! A client tracks three independent slots:
//!
//! - feedback: `Idle` until a submit succeeds, then `AwaitingFeedback` with the
//!   ticket `respond` will report on.
//! - delegation: `Idle` until `enqueue` hands out a job, then `AwaitingAnswer`
//!   with the ticket `answer` will reply to. Enqueueing and receiving the
//!   challenge happen in one round-trip, so there is no separate "enqueued but
//!   unassigned" state.
//! - staged: the payload of the one asynchronous submission in flight.
//!
//! The session sits behind `Arc<Mutex<_>>` because an asynchronous submission
//! updates it from its worker thread.

use std::sync::{Mutex, MutexGuard};

use crate::types::{CaptchaSource, Ticket};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Feedback {
    #[default]
    Idle,
    AwaitingFeedback(Ticket),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Delegation {
    #[default]
    Idle,
    AwaitingAnswer(Ticket),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    feedback: Feedback,
    delegation: Delegation,
    staged: Option<CaptchaSource>,
}

impl Session {
    pub fn feedback(&self) -> &Feedback {
        &self.feedback
    }

    pub fn delegation(&self) -> &Delegation {
        &self.delegation
    }

    pub fn staged(&self) -> Option<&CaptchaSource> {
        self.staged.as_ref()
    }

    /// Ticket of the last successful submission, if not yet responded to.
    pub fn active_ticket(&self) -> Option<&Ticket> {
        match &self.feedback {
            Feedback::AwaitingFeedback(ticket) => Some(ticket),
            Feedback::Idle => None,
        }
    }

    /// Ticket of the delegated job, if not yet answered or dequeued.
    pub fn enqueued_ticket(&self) -> Option<&Ticket> {
        match &self.delegation {
            Delegation::AwaitingAnswer(ticket) => Some(ticket),
            Delegation::Idle => None,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.feedback == Feedback::Idle && self.delegation == Delegation::Idle && self.staged.is_none()
    }

    pub(crate) fn submitted(&mut self, ticket: Ticket) {
        log::debug!("awaiting feedback on ticket {ticket}");
        self.feedback = Feedback::AwaitingFeedback(ticket);
    }

    pub(crate) fn responded(&mut self) {
        log::debug!("feedback delivered; no ticket pending");
        self.feedback = Feedback::Idle;
    }

    pub(crate) fn enqueued(&mut self, ticket: Ticket) {
        log::debug!("awaiting answer for delegated ticket {ticket}");
        self.delegation = Delegation::AwaitingAnswer(ticket);
    }

    pub(crate) fn release_delegation(&mut self) {
        log::debug!("delegated job released");
        self.delegation = Delegation::Idle;
    }

    /// Stage an asynchronous payload; `false` if one is already in flight.
    pub(crate) fn stage(&mut self, source: CaptchaSource) -> bool {
        if self.staged.is_some() {
            return false;
        }
        self.staged = Some(source);
        true
    }

    pub(crate) fn unstage(&mut self) {
        self.staged = None;
    }
}

/// Lock a mutex, recovering the data if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| {
        log::warn!("recovering state from a poisoned lock");
        poisoned.into_inner()
    })
}
