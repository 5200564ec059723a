//! Declarative reconciliation of one OpenStack load balancer.
//!
//! A pass has three steps, each usable on its own:
//!
//! - [`find`]: rebuild the actual state from the provider, or report absence
//! - [`check_changes`]: reject inadmissible transitions
//! - [`render`]: create the load balancer, or repair the security group on
//!   its virtual-IP port
//!
//! [`LoadBalancerTask`] runs them in order against one [`lbsync_cloud::Cloud`].
//! [`wait_for_provisioning`] is a standalone bounded-backoff poller for the
//! provider's asynchronous provisioning status.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use lbsync_cloud::{CloudConfig, OpenStackCloud};
//! use lbsync_task::{LoadBalancer, LoadBalancerTask};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let cloud = Arc::new(OpenStackCloud::new(CloudConfig::from_env())?);
//! let task = LoadBalancerTask::new(cloud);
//!
//! let mut desired = LoadBalancer::new("api.example.com", "utility")
//!     .with_security_group("api.example.com");
//! let report = task.reconcile(&mut desired).await?;
//! println!("{:?} -> {:?}", desired.id, report.outcome);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod convergence;
pub mod discovery;
pub mod error;
pub mod load_balancer;
pub mod poller;
pub mod service;
pub mod task;
pub mod validation;

pub use convergence::{render, RenderOutcome};
pub use discovery::{find, Discovered};
pub use error::{Result, TaskError};
pub use load_balancer::{LoadBalancer, RemoteAssigned, SecurityGroupRef};
pub use poller::{
    wait_for_provisioning, wait_load_balancer_active, Backoff, ProvisioningStatus, WaitReport,
};
pub use service::{LoadBalancerTask, PassReport};
pub use task::{dependencies, SubnetTask, Task, TaskKind};
pub use validation::{check_changes, check_lifecycle};
