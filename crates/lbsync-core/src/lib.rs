//! Core types shared by the lbsync crates.
//!
//! This crate provides the foundational types used throughout lbsync:
//!
//! - **Identifiers**: Strongly-typed remote IDs for load balancers, subnets,
//!   ports, security groups and flavors
//! - **Lifecycle**: How the orchestrator should treat a reconciliation unit
//! - **Error types**: Common error definitions shared across crates
//!
//! # Example
//!
//! ```
//! use lbsync_core::{Lifecycle, LoadBalancerId, PortId};
//!
//! let lb_id = LoadBalancerId::parse("9a1b5c2e-lb").unwrap();
//! let port_id = PortId::from("7f3e-port");
//!
//! assert_eq!(lb_id.as_str(), "9a1b5c2e-lb");
//! assert_eq!(port_id.to_string(), "7f3e-port");
//! assert!(Lifecycle::default().is_mutating());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod ids;
pub mod lifecycle;

pub use error::{CoreError, Result};
pub use ids::{FlavorId, IdError, LoadBalancerId, PortId, SecurityGroupId, SubnetId};
pub use lifecycle::Lifecycle;
