//! Discovery: rebuild the actual state of a load balancer from the provider.

use lbsync_cloud::{Cloud, LoadBalancerRecord};
use tracing::debug;

use crate::error::{Result, TaskError};
use crate::load_balancer::{LoadBalancer, RemoteAssigned, SecurityGroupRef};

/// A load balancer found on the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discovered {
    /// The reconstructed actual state.
    pub actual: LoadBalancer,
    /// Remote-assigned fields for the caller to apply to its desired copy.
    pub patch: RemoteAssigned,
}

/// Find the load balancer named by `desired`.
///
/// Returns `Ok(None)` when `desired.name` is unset (without calling the
/// provider) or when nothing matches. The security group is only looked up
/// when `desired` requests one; its expected name is the load balancer's own.
///
/// # Errors
///
/// - `TaskError::AmbiguousMatch` if more than one load balancer or security
///   group carries the name
/// - `TaskError::RemoteApi` if a provider call fails
pub async fn find<C: Cloud + ?Sized>(
    cloud: &C,
    desired: &LoadBalancer,
) -> Result<Option<Discovered>> {
    let Some(name) = desired.name.as_deref() else {
        return Ok(None);
    };

    let mut matches = cloud
        .list_load_balancers(name)
        .await
        .map_err(|e| TaskError::remote("list load balancers", name, e))?;

    let lb = match matches.len() {
        0 => {
            debug!(name = %name, "Load balancer not found");
            return Ok(None);
        }
        1 => matches.remove(0),
        _ => {
            return Err(TaskError::AmbiguousMatch {
                kind: "load balancers",
                key: name.to_string(),
            })
        }
    };

    let subnet = cloud
        .get_subnet(&lb.vip_subnet_id)
        .await
        .map_err(|e| TaskError::remote("get subnet", lb.vip_subnet_id.as_str(), e))?;

    let security_group = match &desired.security_group {
        Some(requested) => find_security_group(cloud, &lb, requested).await?,
        None => None,
    };

    debug!(
        name = %lb.name,
        load_balancer_id = %lb.id,
        provisioning_status = %lb.provisioning_status,
        "Found load balancer"
    );

    let patch = RemoteAssigned::from(&lb);
    let actual = LoadBalancer {
        id: Some(lb.id),
        name: Some(lb.name),
        subnet: Some(subnet.name),
        vip_subnet_id: Some(lb.vip_subnet_id),
        port_id: Some(lb.vip_port_id),
        security_group,
        provider: Some(lb.provider),
        flavor_id: lb.flavor_id,
        lifecycle: desired.lifecycle,
    };

    Ok(Some(Discovered { actual, patch }))
}

async fn find_security_group<C: Cloud + ?Sized>(
    cloud: &C,
    lb: &LoadBalancerRecord,
    requested: &SecurityGroupRef,
) -> Result<Option<SecurityGroupRef>> {
    let mut groups = cloud
        .list_security_groups(&lb.name)
        .await
        .map_err(|e| TaskError::remote("list security groups", lb.name.as_str(), e))?;

    match groups.len() {
        0 => Ok(None),
        1 => {
            let group = groups.remove(0);
            Ok(Some(SecurityGroupRef {
                name: group.name,
                id: Some(group.id),
                lifecycle: requested.lifecycle,
            }))
        }
        _ => Err(TaskError::AmbiguousMatch {
            kind: "security groups",
            key: lb.name.clone(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lbsync_cloud::{MockCloud, MockOperation};
    use lbsync_core::Lifecycle;

    #[tokio::test]
    async fn unset_name_makes_no_calls() {
        let cloud = MockCloud::new();
        let desired = LoadBalancer::default();

        assert_eq!(find(&cloud, &desired).await.unwrap(), None);
        assert_eq!(cloud.total_calls(), 0);
    }

    #[tokio::test]
    async fn zero_matches_is_absent() {
        let cloud = MockCloud::new();
        let desired = LoadBalancer::new("lb1", "nodes");

        assert_eq!(find(&cloud, &desired).await.unwrap(), None);
        assert_eq!(cloud.calls(MockOperation::ListLoadBalancers), 1);
        assert_eq!(cloud.calls(MockOperation::GetSubnet), 0);
    }

    #[tokio::test]
    async fn duplicate_names_are_ambiguous() {
        let cloud = MockCloud::new();
        let subnet = cloud.add_subnet("nodes");
        cloud.add_load_balancer("lb1", &subnet.id);
        cloud.add_load_balancer("lb1", &subnet.id);

        let err = find(&cloud, &LoadBalancer::new("lb1", "nodes"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            TaskError::AmbiguousMatch { kind: "load balancers", ref key } if key == "lb1"
        ));
        assert_eq!(cloud.calls(MockOperation::GetSubnet), 0);
    }

    #[tokio::test]
    async fn single_match_is_reconstructed() {
        let cloud = MockCloud::new();
        let subnet = cloud.add_subnet("nodes");
        let lb = cloud.add_load_balancer("lb1", &subnet.id);
        let desired = LoadBalancer::new("lb1", "nodes").with_lifecycle(Lifecycle::ExistsAndValidates);

        let found = find(&cloud, &desired).await.unwrap().unwrap();

        assert_eq!(found.actual.id, Some(lb.id.clone()));
        assert_eq!(found.actual.subnet.as_deref(), Some("nodes"));
        assert_eq!(found.actual.port_id, Some(lb.vip_port_id.clone()));
        assert_eq!(found.actual.provider.as_deref(), Some("amphora"));
        assert_eq!(found.actual.security_group, None);
        assert_eq!(found.actual.lifecycle, Lifecycle::ExistsAndValidates);
        assert_eq!(found.patch, RemoteAssigned::from(&lb));
        assert_eq!(cloud.calls(MockOperation::ListSecurityGroups), 0);
    }

    #[tokio::test]
    async fn security_group_looked_up_by_load_balancer_name() {
        let cloud = MockCloud::new();
        let subnet = cloud.add_subnet("nodes");
        cloud.add_load_balancer("lb1", &subnet.id);
        let group = cloud.add_security_group("lb1");
        let desired = LoadBalancer::new("lb1", "nodes").with_security_group("lb1");

        let found = find(&cloud, &desired).await.unwrap().unwrap();

        let sg = found.actual.security_group.unwrap();
        assert_eq!(sg.name, "lb1");
        assert_eq!(sg.id, Some(group.id));
    }

    #[tokio::test]
    async fn missing_security_group_is_absent() {
        let cloud = MockCloud::new();
        let subnet = cloud.add_subnet("nodes");
        cloud.add_load_balancer("lb1", &subnet.id);
        let desired = LoadBalancer::new("lb1", "nodes").with_security_group("lb1");

        let found = find(&cloud, &desired).await.unwrap().unwrap();
        assert_eq!(found.actual.security_group, None);
    }

    #[tokio::test]
    async fn duplicate_security_groups_are_ambiguous() {
        let cloud = MockCloud::new();
        let subnet = cloud.add_subnet("nodes");
        cloud.add_load_balancer("lb1", &subnet.id);
        cloud.add_security_group("lb1");
        cloud.add_security_group("lb1");
        let desired = LoadBalancer::new("lb1", "nodes").with_security_group("lb1");

        let err = find(&cloud, &desired).await.unwrap_err();
        assert!(matches!(
            err,
            TaskError::AmbiguousMatch {
                kind: "security groups",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn provider_failures_are_wrapped() {
        let cloud = MockCloud::new();
        let subnet = cloud.add_subnet("nodes");
        cloud.add_load_balancer("lb1", &subnet.id);
        let desired = LoadBalancer::new("lb1", "nodes");

        cloud.fail_next(MockOperation::ListLoadBalancers, 1);
        let err = find(&cloud, &desired).await.unwrap_err();
        assert!(matches!(
            err,
            TaskError::RemoteApi { operation: "list load balancers", ref key, .. } if key == "lb1"
        ));

        cloud.fail_next(MockOperation::GetSubnet, 1);
        let err = find(&cloud, &desired).await.unwrap_err();
        assert!(matches!(
            err,
            TaskError::RemoteApi { operation: "get subnet", ref key, .. } if *key == subnet.id.to_string()
        ));
    }
}
