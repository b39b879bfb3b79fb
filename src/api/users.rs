//! Profile endpoints: `GET`/`PATCH`/`DELETE /users/me`.

use serde::{Deserialize, Serialize};

use super::{ApiClient, DataEnvelope, Method, is_no_content_success};
use crate::avatar;
use crate::error::{ApiError, DEFAULT_ERROR_MESSAGE};

pub const USERS_ME_ENDPOINT: &str = "/users/me";
const DELETE_FAILED_MESSAGE: &str = "Failed to delete account";

#[cfg(test)]
#[path = "users_test.rs"]
mod tests;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UserRole {
    User,
    Admin,
}

/// Extended user attributes stored by the platform backend.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub avatar: Option<String>,
    pub role: UserRole,
    #[serde(default)]
    pub is_new_account: Option<bool>,
    #[serde(default)]
    pub avatar_id: Option<String>,
}

impl UserProfile {
    #[must_use]
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_owned()
    }

    #[must_use]
    pub fn initials(&self) -> String {
        avatar::initials(&self.display_name())
    }

    #[must_use]
    pub fn avatar_color(&self) -> &'static str {
        avatar::color_for_name(&self.display_name())
    }
}

/// Body of `PATCH /users/me`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfile {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
}

/// Seam used by the reconciler to load the profile for one tagged session.
#[async_trait::async_trait]
pub trait ProfileSource: Send + Sync {
    /// Fetch the profile belonging to `access_token`.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`]; auth errors trigger a forced local logout.
    async fn fetch_profile(&self, access_token: &str) -> Result<UserProfile, ApiError>;
}

#[async_trait::async_trait]
impl ProfileSource for ApiClient {
    async fn fetch_profile(&self, access_token: &str) -> Result<UserProfile, ApiError> {
        let envelope: DataEnvelope<UserProfile> =
            self.request_with_token(access_token, Method::GET, USERS_ME_ENDPOINT, None).await?;
        Ok(envelope.data)
    }
}

/// Profile mutations used by account actions.
#[async_trait::async_trait]
pub trait AccountApi: ProfileSource {
    async fn update_profile(&self, update: &UpdateProfile) -> Result<UserProfile, ApiError>;

    /// Delete the account; 200 and 204 are success.
    async fn delete_profile(&self) -> Result<(), ApiError>;
}

#[async_trait::async_trait]
impl AccountApi for ApiClient {
    async fn update_profile(&self, update: &UpdateProfile) -> Result<UserProfile, ApiError> {
        ApiClient::update_profile(self, update).await
    }

    async fn delete_profile(&self) -> Result<(), ApiError> {
        ApiClient::delete_profile(self).await
    }
}

impl ApiClient {
    /// `GET /users/me` with the current session token.
    ///
    /// # Errors
    ///
    /// Returns the classified request error.
    pub async fn get_profile(&self) -> Result<UserProfile, ApiError> {
        let envelope: DataEnvelope<UserProfile> = self.request(Method::GET, USERS_ME_ENDPOINT, None).await?;
        Ok(envelope.data)
    }

    /// `PATCH /users/me`, returning the updated profile.
    ///
    /// # Errors
    ///
    /// Returns the classified request error.
    pub async fn update_profile(&self, update: &UpdateProfile) -> Result<UserProfile, ApiError> {
        let body = serde_json::to_value(update)?;
        let envelope: DataEnvelope<UserProfile> =
            self.request(Method::PATCH, USERS_ME_ENDPOINT, Some(&body)).await?;
        Ok(envelope.data)
    }

    /// `DELETE /users/me`. Both 200 and 204 count as success.
    ///
    /// # Errors
    ///
    /// Returns an auth error on 401/403, otherwise the server's message or
    /// a generic deletion failure.
    pub async fn delete_profile(&self) -> Result<(), ApiError> {
        let token = self.current_token()?;
        let response = self.send(&token, Method::DELETE, USERS_ME_ENDPOINT, &[], None).await?;
        let status = response.status();
        if is_no_content_success(status) {
            return Ok(());
        }
        let text = response.text().await.unwrap_or_default();
        Err(deletion_error(status.as_u16(), &text))
    }
}

fn deletion_error(status: u16, body: &str) -> ApiError {
    let mut err = ApiError::from_response(status, body);
    if err.message == DEFAULT_ERROR_MESSAGE {
        DELETE_FAILED_MESSAGE.clone_into(&mut err.message);
    }
    err
}
