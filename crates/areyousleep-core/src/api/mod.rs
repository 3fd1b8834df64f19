//! REST API client module for the Are You Sleep backend.
//!
//! This module provides the `Backend` trait, the seam the session manager and
//! the realtime engine talk through, and `ApiClient`, its HTTP implementation.
//!
//! Authenticated calls carry a bearer token obtained from `/auth/login`.

pub mod backend;
pub mod client;
pub mod error;

pub use backend::Backend;
pub use client::ApiClient;
pub use error::ApiError;
