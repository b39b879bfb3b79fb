//! # cyclecare
//!
//! Client core for the cyclecare health platform: Supabase Auth session
//! reconciliation, the platform REST API (profile + billing), localized
//! pricing, and the fertility-tracking domain model.
//!
//! DESIGN
//! ======
//! All persistence, payments and token issuance live in external services.
//! This crate owns the client-side state that mirrors them: the auth triple
//! `(user, session, profile)` kept by [`auth::reconciler`], the application
//! store in [`state`] that is reset whenever the identity changes, and the
//! pure formatting helpers in [`currency`] and [`billing`].

pub mod api;
pub mod auth;
pub mod avatar;
pub mod billing;
pub mod config;
pub mod currency;
pub mod error;
pub mod fertility;
pub mod state;
pub mod storage;

pub use auth::context::AuthContext;
pub use config::ClientConfig;
pub use error::{ApiError, ErrorKind};
