//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Resolved parameters:
//!     → allow_list.rs (OR-of-AND wildcard rules)
//!     → Pass to URL builder, or reject with 403
//!
//! Management requests:
//!     → admin::auth (bearer token) → 401 on failure
//! ```
//!
//! # Design Decisions
//! - Checks run before any network call
//! - Fail closed: a configured list that matches nothing rejects

pub mod allow_list;

pub use allow_list::AllowList;
