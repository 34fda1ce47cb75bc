// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::kubernetes_api_objects::api_method::{KubeAPIRequest, KubeAPIResponse};
use crate::kubernetes_api_objects::object_ref::ObjectRef;
use std::time::Duration;

// A Reconciler is a state machine. One reconcile is a sequence of reconcile_core steps:
// each step takes the response to the request sent by the previous step (if any)
// and returns the next state together with at most one new request.
// reconcile_core itself performs no I/O; the shim layer sends the requests.
pub trait Reconciler {
    // S is the local state threaded through the steps of one reconcile.
    type S;
    // E is the error a reconcile can end with.
    type E: std::error::Error + Send + Sync + 'static;

    fn reconcile_init_state(&self) -> Self::S;

    fn reconcile_core(&self, key: &ObjectRef, resp_o: Option<KubeAPIResponse>, state: Self::S) -> (Self::S, Option<KubeAPIRequest>);

    fn reconcile_done(&self, state: &Self::S) -> bool;

    fn reconcile_error(&self, state: &Self::S) -> bool;

    // Only meaningful once reconcile_done or reconcile_error holds.
    fn reconcile_outcome(&self, state: &Self::S) -> Outcome<Self::E>;
}

/// When the next reconcile of the same object should happen after a successful one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requeue {
    AwaitChange,
    After(Duration),
}

/// How one reconcile ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<E> {
    Done(Requeue),
    // The failure is only logged; a later watch event or resync retries.
    RetryOnNextTrigger(E),
    // The failure is returned to the dispatcher, which retries with its error policy.
    RetryViaDispatcher(E),
}

impl<E> Outcome<E> {
    pub fn is_hard_failure(&self) -> bool {
        matches!(self, Outcome::RetryViaDispatcher(_))
    }
}
