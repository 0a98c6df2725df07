//! Distributed refresh-ahead OAuth 2.0 token cache—fleet-wide single-refresh coordination,
//! Redis-backed stores and locks, and transparent token rotation in one crate.
//!
//! The cache holds one [`TokenRecord`](auth::TokenRecord) per (principal, client-registration)
//! key in a shared [`TokenStore`](store::TokenStore) and refreshes it ahead of expiry. A
//! [`RefreshLock`](lock::RefreshLock) guarantees that at most one process in the fleet performs
//! the network refresh for a key at a time; every other caller either reuses the fresh record or
//! waits for the holder and picks up its result. [`TokenCache::authorize`](cache::TokenCache)
//! is the single entry point, invoked once per outgoing request.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod cache;
pub mod error;
pub mod issuer;
pub mod lock;
pub mod obs;
pub mod store;

mod _prelude {
	pub use std::{
		collections::HashMap,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use parking_lot::{Mutex, RwLock};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use url;
#[cfg(test)] use httpmock as _;
