//! Change validation.

use lbsync_core::Lifecycle;
use tracing::warn;

use crate::error::{Result, TaskError};
use crate::load_balancer::LoadBalancer;

/// Decide whether moving from `actual` to `desired` via `changes` is admissible.
///
/// Creation needs a name. An existing load balancer can never change its
/// `id` or `name`; every other field in `changes` is accepted here and left
/// to convergence, which only acts on what it supports.
///
/// # Errors
///
/// - `TaskError::RequiredField` if creating without a name
/// - `TaskError::ImmutableField` if `changes` touches `id` or `name`
pub fn check_changes(
    actual: Option<&LoadBalancer>,
    desired: &LoadBalancer,
    changes: &LoadBalancer,
) -> Result<()> {
    if actual.is_none() {
        if desired.name.is_none() {
            return Err(TaskError::RequiredField("name"));
        }
        return Ok(());
    }

    if changes.id.is_some() {
        return Err(TaskError::ImmutableField("id"));
    }
    if changes.name.is_some() {
        return Err(TaskError::ImmutableField("name"));
    }
    Ok(())
}

/// Enforce the lifecycles that expect the load balancer to exist already.
///
/// Under `ExistsAndValidates` and `ExistsAndWarnIfChanges` a missing load
/// balancer is an error. Differences are an error under `ExistsAndValidates`
/// and only logged under `ExistsAndWarnIfChanges`. Other lifecycles pass.
///
/// # Errors
///
/// - `TaskError::MissingResource` if `actual` is absent
/// - `TaskError::UnexpectedChanges` if `changes` is non-empty under
///   `ExistsAndValidates`
pub fn check_lifecycle(
    actual: Option<&LoadBalancer>,
    desired: &LoadBalancer,
    changes: &LoadBalancer,
) -> Result<()> {
    let lifecycle = desired.lifecycle;
    if !lifecycle.requires_existing() {
        return Ok(());
    }

    let key = desired.name.clone().unwrap_or_default();
    if actual.is_none() {
        return Err(TaskError::MissingResource { key, lifecycle });
    }
    if changes.is_empty() {
        return Ok(());
    }

    let fields = changes.changed_fields();
    if lifecycle == Lifecycle::ExistsAndValidates {
        return Err(TaskError::UnexpectedChanges {
            key,
            lifecycle,
            fields,
        });
    }
    warn!(
        name = %key,
        lifecycle = %lifecycle,
        fields = ?fields,
        "Existing load balancer differs from the desired state"
    );
    Ok(())
}
