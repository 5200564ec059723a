//! Records exchanged with the cloud provider.
//!
//! These are the provider's view of load balancers, subnets, ports and
//! security groups, already validated into typed identifiers.

use lbsync_core::{FlavorId, LoadBalancerId, PortId, SecurityGroupId, SubnetId};
use serde::{Deserialize, Serialize};

/// A load balancer as reported by the load-balancing service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadBalancerRecord {
    /// Remote identifier.
    pub id: LoadBalancerId,
    /// Name, the match key used by discovery.
    pub name: String,
    /// Subnet the virtual IP was allocated from.
    pub vip_subnet_id: SubnetId,
    /// Network port carrying the virtual IP.
    pub vip_port_id: PortId,
    /// Provider driver name (e.g. `amphora`, `ovn`).
    pub provider: String,
    /// Flavor, if one was requested at creation.
    pub flavor_id: Option<FlavorId>,
    /// Provisioning status string (`ACTIVE`, `PENDING_CREATE`, `ERROR`, ...).
    pub provisioning_status: String,
    /// Operating status string (`ONLINE`, `OFFLINE`, ...).
    pub operating_status: String,
}

/// A subnet as reported by the networking service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubnetRecord {
    /// Remote identifier.
    pub id: SubnetId,
    /// Subnet name.
    pub name: String,
    /// Network the subnet belongs to.
    pub network_id: String,
    /// CIDR of the subnet.
    pub cidr: String,
}

/// A network port as reported by the networking service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortRecord {
    /// Remote identifier.
    pub id: PortId,
    /// Port name.
    pub name: String,
    /// Security groups applied to the port, in provider order.
    pub security_groups: Vec<SecurityGroupId>,
}

impl PortRecord {
    /// Returns true if `group` is the first security group on the port.
    #[must_use]
    pub fn has_primary_security_group(&self, group: &SecurityGroupId) -> bool {
        self.security_groups.first() == Some(group)
    }
}

/// A security group as reported by the networking service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityGroupRecord {
    /// Remote identifier.
    pub id: SecurityGroupId,
    /// Group name.
    pub name: String,
    /// Free-form description.
    pub description: String,
}

/// Parameters for creating a load balancer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateLoadBalancerOpts {
    /// Name of the new load balancer.
    pub name: String,
    /// Subnet to allocate the virtual IP from.
    pub vip_subnet_id: SubnetId,
    /// Optional flavor.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flavor_id: Option<FlavorId>,
}

impl CreateLoadBalancerOpts {
    /// Create options with the given name and subnet and no flavor.
    #[must_use]
    pub fn new(name: impl Into<String>, vip_subnet_id: SubnetId) -> Self {
        Self {
            name: name.into(),
            vip_subnet_id,
            flavor_id: None,
        }
    }

    /// Set the flavor.
    #[must_use]
    pub fn with_flavor(mut self, flavor_id: Option<FlavorId>) -> Self {
        self.flavor_id = flavor_id;
        self
    }
}
