//! The load balancer reconciliation task.
//!
//! [`LoadBalancerTask`] binds the free functions of this crate to one cloud
//! and runs a single pass: find, check, render. Scheduling many tasks and
//! retrying failed passes is left to the caller.

use std::collections::BTreeMap;
use std::sync::Arc;

use lbsync_cloud::Cloud;
use serde::Serialize;
use tracing::{info, warn};

use crate::convergence::{self, RenderOutcome};
use crate::discovery::{self, Discovered};
use crate::error::Result;
use crate::load_balancer::LoadBalancer;
use crate::poller::{self, Backoff, WaitReport};
use crate::task::{self, Task};
use crate::validation;

/// What one reconciliation pass observed and did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PassReport {
    /// Whether the load balancer existed before the pass.
    pub existed: bool,
    /// The delta the pass worked from.
    pub changes: LoadBalancer,
    /// What render did, or `None` if the lifecycle forbids mutation.
    pub outcome: Option<RenderOutcome>,
}

/// Reconciles one load balancer against a cloud.
pub struct LoadBalancerTask<C: Cloud + ?Sized> {
    cloud: Arc<C>,
    backoff: Backoff,
}

impl<C: Cloud + ?Sized> LoadBalancerTask<C> {
    /// Create a task with the default backoff.
    #[must_use]
    pub fn new(cloud: Arc<C>) -> Self {
        Self::with_backoff(cloud, Backoff::default())
    }

    /// Create a task with a custom backoff.
    #[must_use]
    pub fn with_backoff(cloud: Arc<C>, backoff: Backoff) -> Self {
        Self { cloud, backoff }
    }

    /// Get a reference to the cloud.
    #[must_use]
    pub fn cloud(&self) -> &C {
        &self.cloud
    }

    /// The backoff used by [`Self::wait_active`].
    #[must_use]
    pub const fn backoff(&self) -> &Backoff {
        &self.backoff
    }

    /// Keys of the tasks this load balancer must be ordered after.
    #[must_use]
    pub fn dependencies(tasks: &BTreeMap<String, Arc<dyn Task>>) -> Vec<&str> {
        task::dependencies(tasks)
    }

    /// See [`discovery::find`].
    ///
    /// # Errors
    ///
    /// See [`discovery::find`].
    pub async fn find(&self, desired: &LoadBalancer) -> Result<Option<Discovered>> {
        discovery::find(self.cloud.as_ref(), desired).await
    }

    /// See [`validation::check_changes`].
    ///
    /// # Errors
    ///
    /// See [`validation::check_changes`].
    pub fn check_changes(
        actual: Option<&LoadBalancer>,
        desired: &LoadBalancer,
        changes: &LoadBalancer,
    ) -> Result<()> {
        validation::check_changes(actual, desired, changes)
    }

    /// See [`convergence::render`].
    ///
    /// # Errors
    ///
    /// See [`convergence::render`].
    pub async fn render(
        &self,
        actual: Option<&LoadBalancer>,
        desired: &mut LoadBalancer,
        changes: &LoadBalancer,
    ) -> Result<RenderOutcome> {
        convergence::render(self.cloud.as_ref(), actual, desired, changes).await
    }

    /// Wait until the load balancer in `desired` is `ACTIVE`.
    ///
    /// Returns `Ok(None)` if `desired` has no remote ID yet.
    ///
    /// # Errors
    ///
    /// See [`poller::wait_for_provisioning`].
    pub async fn wait_active(&self, desired: &LoadBalancer) -> Result<Option<WaitReport>> {
        let Some(id) = desired.compare_with_id() else {
            return Ok(None);
        };
        poller::wait_load_balancer_active(self.cloud.as_ref(), id, &self.backoff)
            .await
            .map(Some)
    }

    /// Run one pass: find, apply remote-assigned fields, check, render.
    ///
    /// Render is skipped when the lifecycle of `desired` does not allow
    /// mutation. The `Exists*` lifecycles additionally go through
    /// [`validation::check_lifecycle`].
    ///
    /// # Errors
    ///
    /// Returns the first error from any step; nothing is retried.
    pub async fn reconcile(&self, desired: &mut LoadBalancer) -> Result<PassReport> {
        let discovered = self.find(desired).await?;

        let (actual, changes) = match discovered {
            Some(Discovered { actual, patch }) => {
                desired.apply(&patch);
                let changes = LoadBalancer::changes(&actual, desired);
                (Some(actual), changes)
            }
            None => (None, desired.clone()),
        };

        Self::check_changes(actual.as_ref(), desired, &changes)?;
        validation::check_lifecycle(actual.as_ref(), desired, &changes)?;

        if !desired.lifecycle.is_mutating() {
            warn!(
                name = ?desired.name,
                lifecycle = %desired.lifecycle,
                existed = actual.is_some(),
                "Lifecycle does not allow changes, skipping render"
            );
            return Ok(PassReport {
                existed: actual.is_some(),
                changes,
                outcome: None,
            });
        }

        let outcome = self.render(actual.as_ref(), desired, &changes).await?;
        info!(name = ?desired.name, outcome = ?outcome, "Reconciled load balancer");

        Ok(PassReport {
            existed: actual.is_some(),
            changes,
            outcome: Some(outcome),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TaskError;
    use lbsync_cloud::{MockCloud, MockOperation};
    use lbsync_core::Lifecycle;
    use std::time::Duration;

    fn setup() -> (Arc<MockCloud>, LoadBalancerTask<MockCloud>) {
        let cloud = Arc::new(MockCloud::new());
        cloud.add_subnet("nodes");
        cloud.add_security_group("api.example.com");
        let task = LoadBalancerTask::with_backoff(
            Arc::clone(&cloud),
            Backoff::new(Duration::from_millis(10), 1.0, 3),
        );
        (cloud, task)
    }

    fn desired() -> LoadBalancer {
        LoadBalancer::new("api.example.com", "nodes").with_security_group("api.example.com")
    }

    #[tokio::test]
    async fn first_pass_creates_second_is_noop() {
        let (cloud, task) = setup();
        let mut lb = desired();

        let first = task.reconcile(&mut lb).await.unwrap();
        assert!(!first.existed);
        assert!(matches!(
            first.outcome,
            Some(RenderOutcome::Created {
                security_group_attached: true,
                ..
            })
        ));
        let mutations = cloud.mutation_count();

        let mut again = desired();
        let second = task.reconcile(&mut again).await.unwrap();
        assert!(second.existed);
        assert_eq!(second.outcome, Some(RenderOutcome::Unchanged));
        assert_eq!(again.id, lb.id);
        assert_eq!(again.port_id, lb.port_id);
        assert_eq!(cloud.mutation_count(), mutations);
    }

    #[tokio::test]
    async fn partial_failure_heals_on_next_pass() {
        let (cloud, task) = setup();
        let mut lb = desired();
        cloud.fail_next(MockOperation::UpdatePort, 1);

        let err = task.reconcile(&mut lb).await.unwrap_err();
        assert!(err.is_retriable());

        let report = task.reconcile(&mut desired()).await.unwrap();
        assert!(matches!(
            report.outcome,
            Some(RenderOutcome::SecurityGroupRepaired { .. })
        ));
        assert_eq!(cloud.calls(MockOperation::CreateLoadBalancer), 1);
    }

    #[tokio::test]
    async fn ambiguous_name_stops_before_render() {
        let (cloud, task) = setup();
        let subnet = cloud.add_subnet("other");
        cloud.add_load_balancer("api.example.com", &subnet.id);
        cloud.add_load_balancer("api.example.com", &subnet.id);

        let err = task.reconcile(&mut desired()).await.unwrap_err();
        assert!(matches!(err, TaskError::AmbiguousMatch { .. }));
        assert_eq!(cloud.mutation_count(), 0);
        assert_eq!(cloud.calls(MockOperation::GetPort), 0);
    }

    #[tokio::test]
    async fn ignore_lifecycle_skips_render() {
        let (cloud, task) = setup();
        let mut lb = desired().with_lifecycle(Lifecycle::Ignore);

        let report = task.reconcile(&mut lb).await.unwrap();
        assert!(!report.existed);
        assert_eq!(report.outcome, None);
        assert_eq!(cloud.mutation_count(), 0);
    }

    #[tokio::test]
    async fn existing_lifecycles_reject_absent_load_balancer() {
        let (cloud, task) = setup();

        for lifecycle in [Lifecycle::ExistsAndValidates, Lifecycle::ExistsAndWarnIfChanges] {
            let mut lb = desired().with_lifecycle(lifecycle);
            let err = task.reconcile(&mut lb).await.unwrap_err();
            assert!(matches!(
                err,
                TaskError::MissingResource { ref key, .. } if key == "api.example.com"
            ));
            assert!(!err.is_retriable());
        }
        assert_eq!(cloud.mutation_count(), 0);
        assert_eq!(cloud.load_balancer_count(), 0);
    }

    #[tokio::test]
    async fn exists_and_validates_rejects_drift() {
        let (cloud, task) = setup();
        let subnet = cloud.add_subnet("other");
        cloud.add_load_balancer("lb1", &subnet.id);

        let mut lb = LoadBalancer::new("lb1", "nodes").with_lifecycle(Lifecycle::ExistsAndValidates);
        let err = task.reconcile(&mut lb).await.unwrap_err();
        assert!(matches!(
            err,
            TaskError::UnexpectedChanges { ref key, ref fields, .. }
                if key == "lb1" && *fields == vec!["subnet"]
        ));
        assert_eq!(cloud.mutation_count(), 0);

        let mut lb = LoadBalancer::new("lb1", "other").with_lifecycle(Lifecycle::ExistsAndValidates);
        let report = task.reconcile(&mut lb).await.unwrap();
        assert!(report.existed);
        assert!(report.changes.is_empty());
        assert_eq!(report.outcome, None);
    }

    #[tokio::test]
    async fn exists_and_warn_if_changes_reports_drift() {
        let (cloud, task) = setup();
        let subnet = cloud.add_subnet("other");
        cloud.add_load_balancer("lb1", &subnet.id);

        let mut lb =
            LoadBalancer::new("lb1", "nodes").with_lifecycle(Lifecycle::ExistsAndWarnIfChanges);
        let report = task.reconcile(&mut lb).await.unwrap();

        assert!(report.existed);
        assert_eq!(report.changes.subnet.as_deref(), Some("nodes"));
        assert_eq!(report.outcome, None);
        assert_eq!(cloud.mutation_count(), 0);
    }

    #[tokio::test]
    async fn unnamed_descriptor_is_rejected_without_calls() {
        let (cloud, task) = setup();
        let mut lb = LoadBalancer::default();

        let err = task.reconcile(&mut lb).await.unwrap_err();
        assert!(matches!(err, TaskError::RequiredField("name")));
        assert_eq!(cloud.total_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_active_after_create() {
        let (cloud, task) = setup();
        let mut lb = desired();
        assert_eq!(task.wait_active(&lb).await.unwrap(), None);

        task.reconcile(&mut lb).await.unwrap();
        let id = lb.id.clone().unwrap();
        cloud.script_statuses(&id, ["PENDING_CREATE", "ACTIVE"]);

        let report = task.wait_active(&lb).await.unwrap().unwrap();
        assert_eq!(report.attempts, 2);
    }

    #[test]
    fn dependencies_delegate_to_task_kinds() {
        let mut tasks: BTreeMap<String, Arc<dyn Task>> = BTreeMap::new();
        tasks.insert("lb".into(), Arc::new(desired()));
        tasks.insert(
            "sg".into(),
            Arc::new(crate::load_balancer::SecurityGroupRef::named("api.example.com")),
        );

        assert_eq!(LoadBalancerTask::<MockCloud>::dependencies(&tasks), vec!["sg"]);
    }
}
