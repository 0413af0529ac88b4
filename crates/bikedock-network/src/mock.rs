//! Scripted authority for development and tests.

use crate::authority::Authority;
use bikedock_core::{BikeId, CardCode, DockId};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// A call received by [`MockAuthority`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorityCall {
    Register(DockId),
    CheckIn(BikeId),
    CheckOut(BikeId, CardCode),
}

#[derive(Debug, Default)]
struct MockState {
    default_verdict: bool,
    scripted: VecDeque<bool>,
    calls: Vec<AuthorityCall>,
}

/// In-memory authority.
///
/// Answers with queued verdicts first, then with the default verdict.
/// Clones share state, so a test can keep one clone to inspect the calls
/// made through another.
///
/// # Examples
///
/// ```
/// use bikedock_network::{Authority, AuthorityCall, MockAuthority};
/// use bikedock_core::BikeId;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let authority = MockAuthority::approving();
/// authority.push_verdict(false);
///
/// let bike = BikeId::new("BIKE123").unwrap();
/// assert!(!authority.check_in(&bike).await);
/// assert!(authority.check_in(&bike).await);
/// assert_eq!(authority.calls().len(), 2);
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockAuthority {
    state: Arc<Mutex<MockState>>,
}

impl MockAuthority {
    /// Authority that authorizes everything.
    pub fn approving() -> Self {
        Self::with_default(true)
    }

    /// Authority that denies everything.
    pub fn denying() -> Self {
        Self::with_default(false)
    }

    fn with_default(verdict: bool) -> Self {
        let mock = Self::default();
        mock.set_default_verdict(verdict);
        mock
    }

    /// Verdict used once the queued verdicts run out.
    pub fn set_default_verdict(&self, verdict: bool) {
        self.lock().default_verdict = verdict;
    }

    /// Queue a verdict for the next call.
    pub fn push_verdict(&self, verdict: bool) {
        self.lock().scripted.push_back(verdict);
    }

    /// Calls received so far, in order.
    pub fn calls(&self) -> Vec<AuthorityCall> {
        self.lock().calls.clone()
    }

    /// Number of calls received so far.
    pub fn call_count(&self) -> usize {
        self.lock().calls.len()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        // state stays consistent even if a holder panicked
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn answer(&self, call: AuthorityCall) -> bool {
        let mut state = self.lock();
        let verdict = state.scripted.pop_front().unwrap_or(state.default_verdict);
        debug!(?call, verdict, "Mock authority answered");
        state.calls.push(call);
        verdict
    }
}

impl Authority for MockAuthority {
    async fn register(&self, dock_id: &DockId) -> bool {
        self.answer(AuthorityCall::Register(dock_id.clone()))
    }

    async fn check_in(&self, bike_id: &BikeId) -> bool {
        self.answer(AuthorityCall::CheckIn(bike_id.clone()))
    }

    async fn check_out(&self, bike_id: &BikeId, card: &CardCode) -> bool {
        self.answer(AuthorityCall::CheckOut(bike_id.clone(), card.clone()))
    }
}
