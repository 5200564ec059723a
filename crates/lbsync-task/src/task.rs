//! Task identity and dependency declaration.
//!
//! An orchestration run holds a heterogeneous set of tasks. Each task reports
//! a [`TaskKind`] tag, so dependency scans filter by tag instead of by
//! concrete type.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use lbsync_core::{Lifecycle, LoadBalancerId, SecurityGroupId, SubnetId};
use serde::{Deserialize, Serialize};

use crate::load_balancer::{LoadBalancer, SecurityGroupRef};

/// The kind of resource a task manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    /// A load balancer.
    LoadBalancer,
    /// A subnet.
    Subnet,
    /// A security group.
    SecurityGroup,
    /// Any other resource kind.
    Other(&'static str),
}

impl TaskKind {
    /// Returns true if a load balancer must be ordered after tasks of this kind.
    #[must_use]
    pub const fn is_load_balancer_dependency(self) -> bool {
        matches!(self, Self::Subnet | Self::SecurityGroup)
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LoadBalancer => f.write_str("load_balancer"),
            Self::Subnet => f.write_str("subnet"),
            Self::SecurityGroup => f.write_str("security_group"),
            Self::Other(kind) => f.write_str(kind),
        }
    }
}

/// A unit of work in an orchestration run.
pub trait Task: Send + Sync {
    /// The kind tag used for dependency scans.
    fn kind(&self) -> TaskKind;

    /// The remote identifier, or `None` if the resource does not exist yet.
    ///
    /// Used for cross-referencing and logging only.
    fn remote_id(&self) -> Option<&str>;
}

/// Keys of every task a load balancer depends on.
///
/// Pure function of `tasks`; the order of the returned keys carries no meaning.
#[must_use]
pub fn dependencies<'a>(tasks: &'a BTreeMap<String, Arc<dyn Task>>) -> Vec<&'a str> {
    tasks
        .iter()
        .filter(|(_, task)| task.kind().is_load_balancer_dependency())
        .map(|(key, _)| key.as_str())
        .collect()
}

/// A read-only reference to a subnet managed by another unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubnetTask {
    /// Subnet name.
    pub name: String,
    /// Remote identifier, once known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<SubnetId>,
    /// Lifecycle of the subnet unit.
    #[serde(default)]
    pub lifecycle: Lifecycle,
}

impl SubnetTask {
    /// Reference a subnet by name.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: None,
            lifecycle: Lifecycle::default(),
        }
    }
}

impl Task for SubnetTask {
    fn kind(&self) -> TaskKind {
        TaskKind::Subnet
    }

    fn remote_id(&self) -> Option<&str> {
        self.id.as_ref().map(SubnetId::as_str)
    }
}

impl Task for SecurityGroupRef {
    fn kind(&self) -> TaskKind {
        TaskKind::SecurityGroup
    }

    fn remote_id(&self) -> Option<&str> {
        self.id.as_ref().map(SecurityGroupId::as_str)
    }
}

impl Task for LoadBalancer {
    fn kind(&self) -> TaskKind {
        TaskKind::LoadBalancer
    }

    fn remote_id(&self) -> Option<&str> {
        self.compare_with_id().map(LoadBalancerId::as_str)
    }
}
