//! Application-wide state outside the auth triple.
//!
//! DESIGN
//! ======
//! `AppStore` wraps a `watch` channel holding [`AppState`]. Every mutation is
//! an [`AppAction`] applied inside `send_modify`, so readers always observe a
//! whole state. `AppAction::Reset` clears every slice and bumps the epoch; any
//! async result tagged with an older epoch is dropped by the reducer, which
//! keeps one user's data from landing in the next user's session.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

use crate::api::billing::{Invoice, InvoicePagination};
use crate::fertility::{ConsultationRequest, CycleEntry, FertilityJournal};

#[cfg(test)]
#[path = "state_test.rs"]
mod tests;

// =============================================================================
// SLICES
// =============================================================================

/// Invoice list shown on the billing page.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BillingState {
    pub invoices: Vec<Invoice>,
    pub pagination: Option<InvoicePagination>,
    pub is_loading: bool,
    pub error: Option<String>,
    /// Sequence number of the invoice request whose result is still wanted.
    pub pending_request: Option<u64>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct AppState {
    /// Incremented by every reset.
    pub epoch: u64,
    pub billing: BillingState,
    pub fertility: FertilityJournal,
}

// =============================================================================
// ACTIONS
// =============================================================================

#[derive(Clone, Debug, PartialEq)]
pub enum AppAction {
    /// Clear all slices; dispatched on sign-in of a new user and on logout.
    Reset,
    InvoicesRequested { epoch: u64, request: u64 },
    InvoicesLoaded { epoch: u64, request: u64, invoices: Vec<Invoice>, pagination: InvoicePagination },
    InvoicesFailed { epoch: u64, request: u64, message: String },
    CycleEntryAdded(CycleEntry),
    ConsultationRequested(ConsultationRequest),
}

impl AppState {
    /// Apply one action. Returns false when a tagged result was stale and ignored.
    pub fn apply(&mut self, action: AppAction) -> bool {
        match action {
            AppAction::Reset => {
                *self = Self { epoch: self.epoch + 1, ..Self::default() };
            }
            AppAction::InvoicesRequested { epoch, request } => {
                if epoch != self.epoch {
                    return false;
                }
                self.billing.is_loading = true;
                self.billing.error = None;
                self.billing.pending_request = Some(request);
            }
            AppAction::InvoicesLoaded { epoch, request, invoices, pagination } => {
                if !self.is_current_invoice_request(epoch, request) {
                    return false;
                }
                self.billing = BillingState { invoices, pagination: Some(pagination), ..BillingState::default() };
            }
            AppAction::InvoicesFailed { epoch, request, message } => {
                if !self.is_current_invoice_request(epoch, request) {
                    return false;
                }
                self.billing = BillingState { error: Some(message), ..BillingState::default() };
            }
            AppAction::CycleEntryAdded(entry) => {
                self.fertility.entries.push(entry);
                self.fertility.entries.sort_by(|a, b| b.start_date.cmp(&a.start_date));
            }
            AppAction::ConsultationRequested(request) => {
                self.fertility.consultations.push(request);
            }
        }
        true
    }

    fn is_current_invoice_request(&self, epoch: u64, request: u64) -> bool {
        epoch == self.epoch && self.billing.pending_request == Some(request)
    }
}

// =============================================================================
// STORE
// =============================================================================

/// Cloneable handle to the application state.
#[derive(Clone)]
pub struct AppStore {
    tx: Arc<watch::Sender<AppState>>,
}

impl Default for AppStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AppStore {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(AppState::default());
        Self { tx: Arc::new(tx) }
    }

    /// Returns false if the action was a stale result and had no effect.
    pub fn dispatch(&self, action: AppAction) -> bool {
        let name = action_name(&action);
        let mut applied = false;
        self.tx.send_if_modified(|state| {
            applied = state.apply(action);
            applied
        });
        if !applied {
            debug!(action = name, "dropped stale store action");
        }
        applied
    }

    #[must_use]
    pub fn snapshot(&self) -> AppState {
        self.tx.borrow().clone()
    }

    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.tx.borrow().epoch
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AppState> {
        self.tx.subscribe()
    }
}

fn action_name(action: &AppAction) -> &'static str {
    match action {
        AppAction::Reset => "reset",
        AppAction::InvoicesRequested { .. } => "invoices_requested",
        AppAction::InvoicesLoaded { .. } => "invoices_loaded",
        AppAction::InvoicesFailed { .. } => "invoices_failed",
        AppAction::CycleEntryAdded(_) => "cycle_entry_added",
        AppAction::ConsultationRequested(_) => "consultation_requested",
    }
}
