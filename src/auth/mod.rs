//! Authentication: provider client, session reconciliation, account actions.
//!
//! DESIGN
//! ======
//! `provider` talks to Supabase Auth and publishes [`types::AuthChange`]
//! events. `reconciler` is the single task that turns those events into the
//! local `(user, session, profile)` triple. `context` is the handle the rest
//! of the application holds; it reads the triple and routes every mutation
//! back through the reconciler.

pub mod context;
pub mod provider;
pub mod reconciler;
pub mod types;
