//! scholar-axum: Axum adapter for the Scholar portal.
//!
//! Mounts registered services as REST routers, exposes the session
//! routes that drive tenant resolution and maps [`ScholarError`]s to
//! JSON responses.
//!
//! [`ScholarError`]: scholar_core::ScholarError

pub mod app;
pub mod params;
pub mod rest;
pub mod session;
pub mod state;
mod error;

pub use error::ScholarAxumError;
pub use state::{scoped_context, ScholarAxumState};

pub use app::{axum, AxumApp};
