//! The cloud provider interface.
//!
//! The reconciliation task only ever talks to the provider through the
//! [`Cloud`] trait, so it can run against OpenStack or the in-memory
//! [`mock::MockCloud`].

use async_trait::async_trait;
use lbsync_core::{LoadBalancerId, PortId, SecurityGroupId, SubnetId};

use crate::error::Result;
use crate::types::{
    CreateLoadBalancerOpts, LoadBalancerRecord, PortRecord, SecurityGroupRecord, SubnetRecord,
};

/// Operations the reconciliation task needs from a cloud provider.
#[async_trait]
pub trait Cloud: Send + Sync {
    /// List load balancers whose name is exactly `name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider request fails.
    async fn list_load_balancers(&self, name: &str) -> Result<Vec<LoadBalancerRecord>>;

    /// Get a load balancer by ID.
    ///
    /// # Errors
    ///
    /// Returns `CloudError::NotFound` if it does not exist.
    async fn get_load_balancer(&self, id: &LoadBalancerId) -> Result<LoadBalancerRecord>;

    /// Create a load balancer.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider rejects the request.
    async fn create_load_balancer(
        &self,
        opts: &CreateLoadBalancerOpts,
    ) -> Result<LoadBalancerRecord>;

    /// Get a subnet by ID.
    ///
    /// # Errors
    ///
    /// Returns `CloudError::NotFound` if it does not exist.
    async fn get_subnet(&self, id: &SubnetId) -> Result<SubnetRecord>;

    /// List subnets whose name is exactly `name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider request fails.
    async fn list_subnets(&self, name: &str) -> Result<Vec<SubnetRecord>>;

    /// List security groups whose name is exactly `name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider request fails.
    async fn list_security_groups(&self, name: &str) -> Result<Vec<SecurityGroupRecord>>;

    /// Get a network port by ID.
    ///
    /// # Errors
    ///
    /// Returns `CloudError::NotFound` if it does not exist.
    async fn get_port(&self, id: &PortId) -> Result<PortRecord>;

    /// Replace the security groups of a port wholesale.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider rejects the update.
    async fn update_port_security_groups(
        &self,
        id: &PortId,
        security_groups: &[SecurityGroupId],
    ) -> Result<PortRecord>;
}

/// An in-memory cloud for testing without a real provider.
#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    use super::*;
    use crate::error::CloudError;
    use lbsync_core::FlavorId;
    use parking_lot::Mutex;
    use std::collections::{HashMap, VecDeque};

    /// The provider operations, used to count calls and inject failures.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum MockOperation {
        /// `list_load_balancers`
        ListLoadBalancers,
        /// `get_load_balancer`
        GetLoadBalancer,
        /// `create_load_balancer`
        CreateLoadBalancer,
        /// `get_subnet`
        GetSubnet,
        /// `list_subnets`
        ListSubnets,
        /// `list_security_groups`
        ListSecurityGroups,
        /// `get_port`
        GetPort,
        /// `update_port_security_groups`
        UpdatePort,
    }

    impl MockOperation {
        /// Returns true for operations that change remote state.
        #[must_use]
        pub const fn is_mutation(self) -> bool {
            matches!(self, Self::CreateLoadBalancer | Self::UpdatePort)
        }
    }

    #[derive(Default)]
    struct MockState {
        load_balancers: Vec<LoadBalancerRecord>,
        subnets: Vec<SubnetRecord>,
        security_groups: Vec<SecurityGroupRecord>,
        ports: HashMap<PortId, PortRecord>,
        statuses: HashMap<LoadBalancerId, VecDeque<Result<String>>>,
        failures: HashMap<MockOperation, usize>,
        calls: HashMap<MockOperation, usize>,
    }

    impl MockState {
        fn record(&mut self, op: MockOperation) -> Result<()> {
            *self.calls.entry(op).or_default() += 1;
            if let Some(remaining) = self.failures.get_mut(&op) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(CloudError::Injected(format!("{op:?}")));
                }
            }
            Ok(())
        }
    }

    /// A cloud that keeps everything in memory.
    #[derive(Default)]
    pub struct MockCloud {
        state: Mutex<MockState>,
    }

    fn new_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    impl MockCloud {
        /// Create an empty mock cloud.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Add a subnet and return it.
        pub fn add_subnet(&self, name: &str) -> SubnetRecord {
            let subnet = SubnetRecord {
                id: SubnetId::from(new_id().as_str()),
                name: name.to_string(),
                network_id: new_id(),
                cidr: "10.0.0.0/24".to_string(),
            };
            self.state.lock().subnets.push(subnet.clone());
            subnet
        }

        /// Add a security group and return it.
        pub fn add_security_group(&self, name: &str) -> SecurityGroupRecord {
            let group = SecurityGroupRecord {
                id: SecurityGroupId::from(new_id().as_str()),
                name: name.to_string(),
                description: format!("Security group for {name}"),
            };
            self.state.lock().security_groups.push(group.clone());
            group
        }

        /// Add an existing load balancer (and its VIP port) without counting a call.
        pub fn add_load_balancer(&self, name: &str, vip_subnet_id: &SubnetId) -> LoadBalancerRecord {
            let mut state = self.state.lock();
            Self::insert_load_balancer(&mut state, name, vip_subnet_id, None, "ACTIVE")
        }

        fn insert_load_balancer(
            state: &mut MockState,
            name: &str,
            vip_subnet_id: &SubnetId,
            flavor_id: Option<FlavorId>,
            provisioning_status: &str,
        ) -> LoadBalancerRecord {
            let port = PortRecord {
                id: PortId::from(new_id().as_str()),
                name: format!("octavia-lb-{name}"),
                security_groups: Vec::new(),
            };
            let lb = LoadBalancerRecord {
                id: LoadBalancerId::from(new_id().as_str()),
                name: name.to_string(),
                vip_subnet_id: vip_subnet_id.clone(),
                vip_port_id: port.id.clone(),
                provider: "amphora".to_string(),
                flavor_id,
                provisioning_status: provisioning_status.to_string(),
                operating_status: "OFFLINE".to_string(),
            };
            state.ports.insert(port.id.clone(), port);
            state.load_balancers.push(lb.clone());
            lb
        }

        /// Overwrite the security groups of a port without counting a call.
        pub fn set_port_security_groups(&self, id: &PortId, groups: Vec<SecurityGroupId>) {
            if let Some(port) = self.state.lock().ports.get_mut(id) {
                port.security_groups = groups;
            }
        }

        /// Current security groups of a port.
        #[must_use]
        pub fn port_security_groups(&self, id: &PortId) -> Option<Vec<SecurityGroupId>> {
            self.state
                .lock()
                .ports
                .get(id)
                .map(|p| p.security_groups.clone())
        }

        /// Queue provisioning statuses returned by successive `get_load_balancer` calls.
        ///
        /// Once the queue is drained the last status sticks.
        pub fn script_statuses<I, S>(&self, id: &LoadBalancerId, statuses: I)
        where
            I: IntoIterator<Item = S>,
            S: Into<String>,
        {
            self.state
                .lock()
                .statuses
                .entry(id.clone())
                .or_default()
                .extend(statuses.into_iter().map(|s| Ok(s.into())));
        }

        /// Queue a transport failure for the next `get_load_balancer` call on `id`.
        pub fn script_status_failure(&self, id: &LoadBalancerId) {
            self.state
                .lock()
                .statuses
                .entry(id.clone())
                .or_default()
                .push_back(Err(CloudError::Injected("provisioning status".to_string())));
        }

        /// Make the next `times` calls of `op` fail.
        pub fn fail_next(&self, op: MockOperation, times: usize) {
            self.state.lock().failures.insert(op, times);
        }

        /// Number of calls made to `op`.
        #[must_use]
        pub fn calls(&self, op: MockOperation) -> usize {
            self.state.lock().calls.get(&op).copied().unwrap_or(0)
        }

        /// Total number of calls that change remote state.
        #[must_use]
        pub fn mutation_count(&self) -> usize {
            self.state
                .lock()
                .calls
                .iter()
                .filter(|(op, _)| op.is_mutation())
                .map(|(_, n)| n)
                .sum()
        }

        /// Total number of calls of any kind.
        #[must_use]
        pub fn total_calls(&self) -> usize {
            self.state.lock().calls.values().sum()
        }

        /// Number of load balancers in the cloud.
        #[must_use]
        pub fn load_balancer_count(&self) -> usize {
            self.state.lock().load_balancers.len()
        }
    }

    #[async_trait]
    impl Cloud for MockCloud {
        async fn list_load_balancers(&self, name: &str) -> Result<Vec<LoadBalancerRecord>> {
            let mut state = self.state.lock();
            state.record(MockOperation::ListLoadBalancers)?;
            Ok(state
                .load_balancers
                .iter()
                .filter(|lb| lb.name == name)
                .cloned()
                .collect())
        }

        async fn get_load_balancer(&self, id: &LoadBalancerId) -> Result<LoadBalancerRecord> {
            let mut state = self.state.lock();
            state.record(MockOperation::GetLoadBalancer)?;

            let next = state.statuses.get_mut(id).and_then(|queue| {
                let sticky = queue.len() == 1 && matches!(queue.front(), Some(Ok(_)));
                if sticky {
                    queue
                        .front()
                        .and_then(|s| s.as_ref().ok().cloned())
                        .map(Ok)
                } else {
                    queue.pop_front()
                }
            });

            let lb = state
                .load_balancers
                .iter_mut()
                .find(|lb| &lb.id == id)
                .ok_or_else(|| CloudError::NotFound(format!("load balancer {id}")))?;
            if let Some(next) = next {
                lb.provisioning_status = next?;
            }
            Ok(lb.clone())
        }

        async fn create_load_balancer(
            &self,
            opts: &CreateLoadBalancerOpts,
        ) -> Result<LoadBalancerRecord> {
            let mut state = self.state.lock();
            state.record(MockOperation::CreateLoadBalancer)?;
            if !state.subnets.iter().any(|s| s.id == opts.vip_subnet_id) {
                return Err(CloudError::Api {
                    status: 400,
                    message: format!("subnet {} not found", opts.vip_subnet_id),
                });
            }
            Ok(Self::insert_load_balancer(
                &mut state,
                &opts.name,
                &opts.vip_subnet_id,
                opts.flavor_id.clone(),
                "PENDING_CREATE",
            ))
        }

        async fn get_subnet(&self, id: &SubnetId) -> Result<SubnetRecord> {
            let mut state = self.state.lock();
            state.record(MockOperation::GetSubnet)?;
            state
                .subnets
                .iter()
                .find(|s| &s.id == id)
                .cloned()
                .ok_or_else(|| CloudError::NotFound(format!("subnet {id}")))
        }

        async fn list_subnets(&self, name: &str) -> Result<Vec<SubnetRecord>> {
            let mut state = self.state.lock();
            state.record(MockOperation::ListSubnets)?;
            Ok(state
                .subnets
                .iter()
                .filter(|s| s.name == name)
                .cloned()
                .collect())
        }

        async fn list_security_groups(&self, name: &str) -> Result<Vec<SecurityGroupRecord>> {
            let mut state = self.state.lock();
            state.record(MockOperation::ListSecurityGroups)?;
            Ok(state
                .security_groups
                .iter()
                .filter(|g| g.name == name)
                .cloned()
                .collect())
        }

        async fn get_port(&self, id: &PortId) -> Result<PortRecord> {
            let mut state = self.state.lock();
            state.record(MockOperation::GetPort)?;
            state
                .ports
                .get(id)
                .cloned()
                .ok_or_else(|| CloudError::NotFound(format!("port {id}")))
        }

        async fn update_port_security_groups(
            &self,
            id: &PortId,
            security_groups: &[SecurityGroupId],
        ) -> Result<PortRecord> {
            let mut state = self.state.lock();
            state.record(MockOperation::UpdatePort)?;
            let port = state
                .ports
                .get_mut(id)
                .ok_or_else(|| CloudError::NotFound(format!("port {id}")))?;
            port.security_groups = security_groups.to_vec();
            Ok(port.clone())
        }
    }
}
