//! Convergence: bring the provider in line with the desired load balancer.
//!
//! There are two paths. When nothing exists yet the load balancer is created
//! and the requested security group attached to its virtual-IP port. When it
//! already exists the only property repaired is that security-group
//! attachment, which is also how a pass that failed half-way through
//! creation gets healed by the next one.

use lbsync_cloud::{Cloud, CreateLoadBalancerOpts};
use lbsync_core::{LoadBalancerId, PortId, SecurityGroupId, SubnetId};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{Result, TaskError};
use crate::load_balancer::{LoadBalancer, RemoteAssigned, SecurityGroupRef};

/// What a render call did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum RenderOutcome {
    /// A new load balancer was created.
    Created {
        /// The new load balancer.
        id: LoadBalancerId,
        /// Whether a security group was attached to its port.
        security_group_attached: bool,
    },
    /// The port of an existing load balancer had the wrong security groups.
    SecurityGroupRepaired {
        /// The virtual-IP port that was updated.
        port_id: PortId,
        /// The group now first in the port's list.
        security_group: SecurityGroupId,
    },
    /// Nothing needed to change.
    Unchanged,
}

impl RenderOutcome {
    /// Returns true if no remote mutation was issued.
    #[must_use]
    pub const fn is_noop(&self) -> bool {
        matches!(self, Self::Unchanged)
    }
}

/// Converge the provider towards `desired`.
///
/// With `actual` absent this creates the load balancer and writes the
/// remote-assigned fields onto `desired`. With `actual` present it only
/// repairs the security-group attachment of the virtual-IP port. In both
/// cases the security-group ID is written onto `desired.security_group`;
/// an ID already set there is used without a lookup by name.
///
/// # Errors
///
/// - `TaskError::RequiredField` if a field needed for creation is unset
/// - `TaskError::ConfigurationResolution` if the subnet or security group
///   does not resolve to exactly one remote object
/// - `TaskError::RemoteApi` if a provider call fails; a failed port update
///   after creation leaves the load balancer in place for the next pass
pub async fn render<C: Cloud + ?Sized>(
    cloud: &C,
    actual: Option<&LoadBalancer>,
    desired: &mut LoadBalancer,
    changes: &LoadBalancer,
) -> Result<RenderOutcome> {
    match actual {
        None => create(cloud, desired).await,
        Some(actual) => repair(cloud, actual, desired, changes).await,
    }
}

async fn create<C: Cloud + ?Sized>(cloud: &C, desired: &mut LoadBalancer) -> Result<RenderOutcome> {
    let name = desired
        .name
        .clone()
        .ok_or(TaskError::RequiredField("name"))?;
    let subnet_name = desired
        .subnet
        .clone()
        .ok_or(TaskError::RequiredField("subnet"))?;

    let subnet_id = resolve_subnet(cloud, &subnet_name).await?;
    let opts = CreateLoadBalancerOpts::new(name.as_str(), subnet_id)
        .with_flavor(desired.flavor_id.clone());

    info!(name = %name, subnet = %subnet_name, "Creating load balancer");

    let lb = cloud
        .create_load_balancer(&opts)
        .await
        .map_err(|e| TaskError::remote("create load balancer", name.as_str(), e))?;
    desired.apply(&RemoteAssigned::from(&lb));

    info!(
        name = %name,
        load_balancer_id = %lb.id,
        port_id = %lb.vip_port_id,
        provisioning_status = %lb.provisioning_status,
        "Created load balancer"
    );

    let Some(requested) = desired.security_group.as_ref() else {
        return Ok(RenderOutcome::Created {
            id: lb.id,
            security_group_attached: false,
        });
    };

    let group = security_group_id(cloud, requested).await?;
    if let Some(requested) = desired.security_group.as_mut() {
        requested.id = Some(group.clone());
    }
    attach_security_group(cloud, &lb.vip_port_id, &group).await?;

    Ok(RenderOutcome::Created {
        id: lb.id,
        security_group_attached: true,
    })
}

async fn repair<C: Cloud + ?Sized>(
    cloud: &C,
    actual: &LoadBalancer,
    desired: &mut LoadBalancer,
    changes: &LoadBalancer,
) -> Result<RenderOutcome> {
    let port_id = actual
        .port_id
        .as_ref()
        .ok_or(TaskError::RequiredField("port_id"))?;

    let port = cloud
        .get_port(port_id)
        .await
        .map_err(|e| TaskError::remote("get port", port_id.as_str(), e))?;

    let unapplied = LoadBalancer {
        security_group: None,
        ..changes.clone()
    };
    if !unapplied.is_empty() {
        debug!(
            name = ?actual.name,
            changes = ?unapplied,
            "Existing load balancer differs in fields that are not updated in place"
        );
    }

    let Some(requested) = desired.security_group.as_ref() else {
        debug!(name = ?actual.name, "No security group requested, nothing to do");
        return Ok(RenderOutcome::Unchanged);
    };

    let group = security_group_id(cloud, requested).await?;
    if let Some(requested) = desired.security_group.as_mut() {
        requested.id = Some(group.clone());
    }

    if port.has_primary_security_group(&group) {
        debug!(
            port_id = %port_id,
            security_group_id = %group,
            "Load balancer port already has its security group"
        );
        return Ok(RenderOutcome::Unchanged);
    }

    info!(
        port_id = %port_id,
        current = ?port.security_groups,
        security_group_id = %group,
        "Repairing security groups of load balancer port"
    );
    attach_security_group(cloud, port_id, &group).await?;

    Ok(RenderOutcome::SecurityGroupRepaired {
        port_id: port_id.clone(),
        security_group: group,
    })
}

async fn resolve_subnet<C: Cloud + ?Sized>(cloud: &C, name: &str) -> Result<SubnetId> {
    let mut subnets = cloud
        .list_subnets(name)
        .await
        .map_err(|e| TaskError::remote("list subnets", name, e))?;

    if subnets.len() != 1 {
        return Err(TaskError::ConfigurationResolution {
            kind: "subnet",
            name: name.to_string(),
            found: subnets.len(),
        });
    }
    Ok(subnets.remove(0).id)
}

/// The ID of the requested group.
///
/// A known ID is used as is. Looking the group up by name is the fallback
/// for a reference that has not been resolved yet.
async fn security_group_id<C: Cloud + ?Sized>(
    cloud: &C,
    requested: &SecurityGroupRef,
) -> Result<SecurityGroupId> {
    match &requested.id {
        Some(id) => Ok(id.clone()),
        None => resolve_security_group(cloud, &requested.name).await,
    }
}

async fn resolve_security_group<C: Cloud + ?Sized>(
    cloud: &C,
    name: &str,
) -> Result<SecurityGroupId> {
    let mut groups = cloud
        .list_security_groups(name)
        .await
        .map_err(|e| TaskError::remote("list security groups", name, e))?;

    if groups.len() != 1 {
        return Err(TaskError::ConfigurationResolution {
            kind: "security group",
            name: name.to_string(),
            found: groups.len(),
        });
    }
    Ok(groups.remove(0).id)
}

async fn attach_security_group<C: Cloud + ?Sized>(
    cloud: &C,
    port_id: &PortId,
    group: &SecurityGroupId,
) -> Result<()> {
    cloud
        .update_port_security_groups(port_id, std::slice::from_ref(group))
        .await
        .map_err(|e| {
            warn!(
                port_id = %port_id,
                security_group_id = %group,
                error = %e,
                "Failed to set security group on load balancer port"
            );
            TaskError::remote("update port security groups", port_id.as_str(), e)
        })?;

    info!(
        port_id = %port_id,
        security_group_id = %group,
        "Set security group on load balancer port"
    );
    Ok(())
}
