//! Cloud provider boundary for lbsync.
//!
//! This crate provides the [`Cloud`] trait the reconciliation task is written
//! against, the records it exchanges, and two implementations:
//!
//! - [`OpenStackCloud`]: HTTP client for the Octavia and Neutron APIs
//! - `MockCloud`: in-memory provider with call counting and failure
//!   injection (enable the `test-utils` feature)
//!
//! # Example
//!
//! ```no_run
//! use lbsync_cloud::{Cloud, CloudConfig, OpenStackCloud};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let cloud = OpenStackCloud::new(CloudConfig::from_env())?;
//!
//! for lb in cloud.list_load_balancers("api.example.com").await? {
//!     println!("{} is {}", lb.id, lb.provisioning_status);
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod openstack;
pub mod provider;
pub mod types;

pub use config::CloudConfig;
pub use error::{CloudError, Result};
pub use openstack::OpenStackCloud;
pub use provider::Cloud;
pub use types::{
    CreateLoadBalancerOpts, LoadBalancerRecord, PortRecord, SecurityGroupRecord, SubnetRecord,
};

#[cfg(any(test, feature = "test-utils"))]
pub use provider::mock::{MockCloud, MockOperation};
