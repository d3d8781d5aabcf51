//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     RoutesConfig
//!     → pattern.rs (parse templates, extract placeholders, cache TTL)
//!     → Freeze as immutable PatternRegistry
//!
//! Per request:
//!     raw path
//!     → resolver.rs (segments → ParameterSet, completeness check)
//!     → builder.rs (ParameterSet → upstream URL)
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - Resolution and building are pure functions
//! - Deterministic: same path always builds the same URL

use std::collections::BTreeMap;

pub mod builder;
pub mod pattern;
pub mod resolver;

pub use builder::build_url;
pub use pattern::{ParameterMode, PatternRegistry, Placeholder, RoutePattern, DEFAULT_ROUTE};
pub use resolver::{resolve, split_segments};

/// Parameters resolved from one request's path.
pub type ParameterSet = BTreeMap<String, String>;
