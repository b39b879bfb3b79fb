//! Billing endpoints: paginated invoices and the customer-portal session.

use serde::{Deserialize, Serialize};

use super::{ApiClient, Method};
use crate::error::ApiError;

pub const INVOICES_ENDPOINT: &str = "/payments/invoices";
pub const PORTAL_SESSION_ENDPOINT: &str = "/payments/create-portal-session";

#[cfg(test)]
#[path = "billing_test.rs"]
mod tests;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Paid,
    Pending,
    Failed,
    Draft,
    /// Any status the payments provider adds later.
    #[serde(other)]
    Other,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub id: String,
    pub number: String,
    /// Amount in minor units (grosze).
    pub amount: i64,
    pub currency: String,
    pub status: InvoiceStatus,
    /// Creation time, Unix seconds.
    pub created: i64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub download_url: Option<String>,
    #[serde(default)]
    pub invoice_pdf: Option<String>,
    #[serde(default)]
    pub hosted_invoice_url: Option<String>,
    #[serde(default)]
    pub paid_at: Option<i64>,
}

impl Invoice {
    /// Best link for downloading the invoice document.
    #[must_use]
    pub fn document_url(&self) -> Option<&str> {
        self.invoice_pdf
            .as_deref()
            .or(self.download_url.as_deref())
            .or(self.hosted_invoice_url.as_deref())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoicePagination {
    pub page: u32,
    pub limit: u32,
    pub has_next_page: bool,
    pub has_previous_page: bool,
    pub next_page: Option<u32>,
    pub previous_page: Option<u32>,
    #[serde(default)]
    pub next_cursor: Option<String>,
    #[serde(default)]
    pub previous_cursor: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InvoicesPage {
    pub data: Vec<Invoice>,
    pub pagination: InvoicePagination,
}

/// Query for `GET /payments/invoices`. Cursors follow the payments provider's
/// `starting_after` / `ending_before` semantics.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InvoiceQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub starting_after: Option<String>,
    pub ending_before: Option<String>,
}

impl InvoiceQuery {
    /// Query pairs in the order the backend documents them; empty cursors are omitted.
    #[must_use]
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(page) = self.page {
            pairs.push(("page", page.to_string()));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit", limit.to_string()));
        }
        if let Some(cursor) = self.starting_after.as_ref().filter(|c| !c.is_empty()) {
            pairs.push(("startingAfter", cursor.clone()));
        }
        if let Some(cursor) = self.ending_before.as_ref().filter(|c| !c.is_empty()) {
            pairs.push(("endingBefore", cursor.clone()));
        }
        pairs
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortalSession {
    pub portal_url: String,
}

impl ApiClient {
    /// `GET /payments/invoices` for the signed-in user.
    ///
    /// # Errors
    ///
    /// Returns the classified request error.
    pub async fn list_invoices(&self, query: &InvoiceQuery) -> Result<InvoicesPage, ApiError> {
        self.request_with_query(Method::GET, INVOICES_ENDPOINT, &query.to_pairs()).await
    }

    /// `POST /payments/create-portal-session`.
    ///
    /// # Errors
    ///
    /// Returns the classified request error.
    pub async fn create_portal_session(&self) -> Result<PortalSession, ApiError> {
        self.request(Method::POST, PORTAL_SESSION_ENDPOINT, None).await
    }
}

/// Billing endpoints as used by the [`crate::billing::Billing`] controller.
#[async_trait::async_trait]
pub trait BillingApi: Send + Sync {
    async fn list_invoices(&self, query: &InvoiceQuery) -> Result<InvoicesPage, ApiError>;

    async fn create_portal_session(&self) -> Result<PortalSession, ApiError>;
}

#[async_trait::async_trait]
impl BillingApi for ApiClient {
    async fn list_invoices(&self, query: &InvoiceQuery) -> Result<InvoicesPage, ApiError> {
        ApiClient::list_invoices(self, query).await
    }

    async fn create_portal_session(&self) -> Result<PortalSession, ApiError> {
        ApiClient::create_portal_session(self).await
    }
}
