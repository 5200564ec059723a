//! The load balancer resource descriptor.
//!
//! One [`LoadBalancer`] shape is used for the desired state, the actual state
//! reconstructed from the provider, and the delta between them. In a delta a
//! `Some` field means "this field differs".

use lbsync_cloud::LoadBalancerRecord;
use lbsync_core::{FlavorId, Lifecycle, LoadBalancerId, PortId, SecurityGroupId, SubnetId};
use serde::{Deserialize, Serialize};

/// A load balancer with its subnet and security-group associations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadBalancer {
    /// Remote identifier, immutable once assigned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<LoadBalancerId>,
    /// Unique match key within the provider's load balancer namespace.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Name of the subnet to allocate the virtual IP from at creation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet: Option<String>,
    /// Identifier of the resolved virtual-IP subnet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vip_subnet_id: Option<SubnetId>,
    /// Identifier of the virtual-IP port.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port_id: Option<PortId>,
    /// Security group to apply to the virtual-IP port.
    ///
    /// `None` means no association is requested, not that it should be removed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_group: Option<SecurityGroupRef>,
    /// Provider driver name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// Flavor requested at creation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flavor_id: Option<FlavorId>,
    /// How the orchestrator treats this unit.
    #[serde(default)]
    pub lifecycle: Lifecycle,
}

/// A weak reference to a separately-managed security group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityGroupRef {
    /// Name of the group; resolved to an ID at render time.
    pub name: String,
    /// Remote identifier, once known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<SecurityGroupId>,
    /// Lifecycle of the security-group unit itself.
    #[serde(default)]
    pub lifecycle: Lifecycle,
}

impl SecurityGroupRef {
    /// Reference a security group by name.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: None,
            lifecycle: Lifecycle::default(),
        }
    }

    fn differs_from(&self, other: &Self) -> bool {
        match (&self.id, &other.id) {
            (Some(a), Some(b)) => a != b,
            _ => self.name != other.name,
        }
    }
}

/// Fields the provider assigns when a load balancer is created.
///
/// Discovery and creation return this patch; the caller applies it to its
/// own desired copy with [`LoadBalancer::apply`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteAssigned {
    /// Remote identifier.
    pub id: LoadBalancerId,
    /// Virtual-IP port.
    pub port_id: PortId,
    /// Virtual-IP subnet.
    pub vip_subnet_id: SubnetId,
    /// Provider driver name.
    pub provider: String,
    /// Flavor, if any.
    pub flavor_id: Option<FlavorId>,
}

impl From<&LoadBalancerRecord> for RemoteAssigned {
    fn from(record: &LoadBalancerRecord) -> Self {
        Self {
            id: record.id.clone(),
            port_id: record.vip_port_id.clone(),
            vip_subnet_id: record.vip_subnet_id.clone(),
            provider: record.provider.clone(),
            flavor_id: record.flavor_id.clone(),
        }
    }
}

impl LoadBalancer {
    /// A desired load balancer with a name and subnet.
    #[must_use]
    pub fn new(name: impl Into<String>, subnet: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            subnet: Some(subnet.into()),
            ..Default::default()
        }
    }

    /// Request a security group by name.
    #[must_use]
    pub fn with_security_group(mut self, name: impl Into<String>) -> Self {
        self.security_group = Some(SecurityGroupRef::named(name));
        self
    }

    /// Request a flavor.
    #[must_use]
    pub fn with_flavor(mut self, flavor_id: FlavorId) -> Self {
        self.flavor_id = Some(flavor_id);
        self
    }

    /// Set the lifecycle.
    #[must_use]
    pub fn with_lifecycle(mut self, lifecycle: Lifecycle) -> Self {
        self.lifecycle = lifecycle;
        self
    }

    /// The remote identifier, used by the orchestrator for cross-referencing.
    #[must_use]
    pub fn compare_with_id(&self) -> Option<&LoadBalancerId> {
        self.id.as_ref()
    }

    /// Write remote-assigned fields onto this descriptor.
    pub fn apply(&mut self, patch: &RemoteAssigned) {
        self.id = Some(patch.id.clone());
        self.port_id = Some(patch.port_id.clone());
        self.vip_subnet_id = Some(patch.vip_subnet_id.clone());
        self.provider = Some(patch.provider.clone());
        self.flavor_id.clone_from(&patch.flavor_id);
    }

    /// Field-wise delta: every field set in `desired` that differs from `actual`.
    ///
    /// Unset desired fields never appear in the delta. The lifecycle is
    /// copied from `desired`.
    #[must_use]
    pub fn changes(actual: &Self, desired: &Self) -> Self {
        fn diff<T: Clone + PartialEq>(actual: &Option<T>, desired: &Option<T>) -> Option<T> {
            match desired {
                Some(d) if actual.as_ref() != Some(d) => Some(d.clone()),
                _ => None,
            }
        }

        let security_group = match (&actual.security_group, &desired.security_group) {
            (Some(a), Some(d)) if !d.differs_from(a) => None,
            (_, d) => d.clone(),
        };

        Self {
            id: diff(&actual.id, &desired.id),
            name: diff(&actual.name, &desired.name),
            subnet: diff(&actual.subnet, &desired.subnet),
            vip_subnet_id: diff(&actual.vip_subnet_id, &desired.vip_subnet_id),
            port_id: diff(&actual.port_id, &desired.port_id),
            security_group,
            provider: diff(&actual.provider, &desired.provider),
            flavor_id: diff(&actual.flavor_id, &desired.flavor_id),
            lifecycle: desired.lifecycle,
        }
    }

    /// Names of the fields that are set, ignoring the lifecycle.
    #[must_use]
    pub fn changed_fields(&self) -> Vec<&'static str> {
        [
            ("id", self.id.is_some()),
            ("name", self.name.is_some()),
            ("subnet", self.subnet.is_some()),
            ("vip_subnet_id", self.vip_subnet_id.is_some()),
            ("port_id", self.port_id.is_some()),
            ("security_group", self.security_group.is_some()),
            ("provider", self.provider.is_some()),
            ("flavor_id", self.flavor_id.is_some()),
        ]
        .into_iter()
        .filter_map(|(field, set)| set.then_some(field))
        .collect()
    }

    /// Returns true if no field is set, ignoring the lifecycle.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.id.is_none()
            && self.name.is_none()
            && self.subnet.is_none()
            && self.vip_subnet_id.is_none()
            && self.port_id.is_none()
            && self.security_group.is_none()
            && self.provider.is_none()
            && self.flavor_id.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> LoadBalancerRecord {
        LoadBalancerRecord {
            id: LoadBalancerId::from("lb-id"),
            name: "lb1".to_string(),
            vip_subnet_id: SubnetId::from("subnet-id"),
            vip_port_id: PortId::from("port-id"),
            provider: "amphora".to_string(),
            flavor_id: None,
            provisioning_status: "ACTIVE".to_string(),
            operating_status: "ONLINE".to_string(),
        }
    }

    #[test]
    fn apply_writes_remote_assigned_fields() {
        let mut desired = LoadBalancer::new("lb1", "nodes").with_flavor(FlavorId::from("f1"));
        let mut patch = RemoteAssigned::from(&record());
        patch.flavor_id = Some(FlavorId::from("f2"));

        desired.apply(&patch);

        assert_eq!(desired.compare_with_id(), Some(&LoadBalancerId::from("lb-id")));
        assert_eq!(desired.port_id, Some(PortId::from("port-id")));
        assert_eq!(desired.vip_subnet_id, Some(SubnetId::from("subnet-id")));
        assert_eq!(desired.provider.as_deref(), Some("amphora"));
        assert_eq!(desired.flavor_id, Some(FlavorId::from("f2")));
        // Operator intent is left alone.
        assert_eq!(desired.name.as_deref(), Some("lb1"));
        assert_eq!(desired.subnet.as_deref(), Some("nodes"));
    }

    #[test]
    fn changes_ignore_unset_desired_fields() {
        let mut actual = LoadBalancer::new("lb1", "nodes");
        actual.apply(&RemoteAssigned::from(&record()));
        let desired = LoadBalancer::new("lb1", "nodes");

        assert!(LoadBalancer::changes(&actual, &desired).is_empty());
    }

    #[test]
    fn changed_fields_lists_set_fields() {
        let changes = LoadBalancer {
            subnet: Some("other".into()),
            lifecycle: Lifecycle::ExistsAndValidates,
            ..LoadBalancer::default()
        }
        .with_flavor(FlavorId::from("large"));

        assert_eq!(changes.changed_fields(), vec!["subnet", "flavor_id"]);
        assert!(LoadBalancer::default().changed_fields().is_empty());
    }

    #[test]
    fn changes_report_differing_fields() {
        let actual = LoadBalancer {
            id: Some(LoadBalancerId::from("lb-id")),
            ..LoadBalancer::new("lb1", "nodes")
        };
        let desired = LoadBalancer {
            id: Some(LoadBalancerId::from("other")),
            ..LoadBalancer::new("lb2", "nodes")
        };

        let changes = LoadBalancer::changes(&actual, &desired);

        assert_eq!(changes.id, Some(LoadBalancerId::from("other")));
        assert_eq!(changes.name.as_deref(), Some("lb2"));
        assert!(changes.subnet.is_none());
    }

    #[test]
    fn security_group_compared_by_id_then_name() {
        let mut actual = LoadBalancer::new("lb1", "nodes").with_security_group("lb1");
        let desired = LoadBalancer::new("lb1", "nodes").with_security_group("lb1");
        assert!(LoadBalancer::changes(&actual, &desired).security_group.is_none());

        let desired = LoadBalancer::new("lb1", "nodes").with_security_group("other");
        assert!(LoadBalancer::changes(&actual, &desired).security_group.is_some());

        if let Some(sg) = actual.security_group.as_mut() {
            sg.id = Some(SecurityGroupId::from("sg-1"));
        }
        let mut desired = LoadBalancer::new("lb1", "nodes").with_security_group("lb1");
        if let Some(sg) = desired.security_group.as_mut() {
            sg.id = Some(SecurityGroupId::from("sg-2"));
        }
        assert!(LoadBalancer::changes(&actual, &desired).security_group.is_some());
    }

    #[test]
    fn descriptor_from_minimal_json() {
        let desired: LoadBalancer = serde_json::from_str(
            r#"{ "name": "api.example.com", "subnet": "nodes", "security_group": { "name": "api.example.com" } }"#,
        )
        .unwrap();

        assert_eq!(desired.name.as_deref(), Some("api.example.com"));
        assert_eq!(desired.lifecycle, Lifecycle::Sync);
        assert_eq!(
            desired.security_group,
            Some(SecurityGroupRef::named("api.example.com"))
        );
        assert!(desired.id.is_none());
    }
}
