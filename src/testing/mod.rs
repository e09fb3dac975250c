//! In-memory stores for tests and local development.
//!
//! Each store can be told to fail its writes, for exercising the
//! best-effort paths.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use tenantry::auth::{Profile, Role};
//! use tenantry::testing::InMemoryDirectory;
//!
//! let directory = Arc::new(InMemoryDirectory::new());
//! directory.insert_profile(Profile::admin("admin-1", "admin@example.com", Role::Admin));
//! ```

mod stores;

pub use stores::{InMemoryAuditStore, InMemoryDirectory, InMemoryImpersonationStore};
