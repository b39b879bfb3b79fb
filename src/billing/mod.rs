//! Billing page controller.
//!
//! DESIGN
//! ======
//! Invoice state lives in the [`AppStore`] billing slice. Each fetch is tagged
//! with the store epoch and a request sequence number; the reducer drops a
//! result when a newer fetch started or a reset happened in between, so a
//! slow response never lands in another user's session.

pub mod format;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::watch;
use tracing::{debug, warn};

use crate::api::billing::{BillingApi, InvoiceQuery};
use crate::auth::reconciler::AuthSnapshot;
use crate::error::ApiError;
use crate::state::{AppAction, AppStore, BillingState};

pub use format::{format_amount, format_invoice_date, status_label_key};

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;

pub struct Billing {
    api: Arc<dyn BillingApi>,
    store: AppStore,
    auth: watch::Receiver<AuthSnapshot>,
    next_request: AtomicU64,
}

impl Billing {
    #[must_use]
    pub fn new(api: Arc<dyn BillingApi>, store: AppStore, auth: watch::Receiver<AuthSnapshot>) -> Self {
        Self { api, store, auth, next_request: AtomicU64::new(0) }
    }

    fn has_user(&self) -> bool {
        self.auth.borrow().user.is_some()
    }

    #[must_use]
    pub fn state(&self) -> BillingState {
        self.store.snapshot().billing
    }

    /// Load one page of invoices into the billing slice. Does nothing
    /// without a signed-in user.
    pub async fn fetch_invoices(&self, query: &InvoiceQuery) {
        if !self.has_user() {
            debug!("skipping invoice fetch without a user");
            return;
        }

        let epoch = self.store.epoch();
        let request = self.next_request.fetch_add(1, Ordering::Relaxed) + 1;
        self.store.dispatch(AppAction::InvoicesRequested { epoch, request });

        let action = match self.api.list_invoices(query).await {
            Ok(page) => {
                debug!(count = page.data.len(), page = page.pagination.page, "invoices loaded");
                AppAction::InvoicesLoaded { epoch, request, invoices: page.data, pagination: page.pagination }
            }
            Err(e) => {
                warn!(error = %e, "invoice fetch failed");
                AppAction::InvoicesFailed { epoch, request, message: e.display_message().to_owned() }
            }
        };
        self.store.dispatch(action);
    }

    /// Create a customer-portal session and return the URL to open.
    ///
    /// # Errors
    ///
    /// `errors.authenticationRequired` without a signed-in user, otherwise
    /// the request error.
    pub async fn open_payment_portal(&self) -> Result<String, ApiError> {
        if !self.has_user() {
            return Err(ApiError::auth_required());
        }
        match self.api.create_portal_session().await {
            Ok(session) => Ok(session.portal_url),
            Err(e) => {
                warn!(error = %e, "failed to open payment portal");
                Err(e)
            }
        }
    }
}
