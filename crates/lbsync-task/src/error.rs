//! Error types for the reconciliation task.
//!
//! Every error carries the key (resource name, field name or port ID) that
//! caused it, so the orchestrator can report it without extra context.

use lbsync_cloud::CloudError;
use lbsync_core::Lifecycle;
use thiserror::Error;

/// A result type using `TaskError`.
pub type Result<T> = std::result::Result<T, TaskError>;

/// Errors that can occur during a reconciliation pass.
#[derive(Debug, Error)]
pub enum TaskError {
    /// More than one remote object matched a name that must be unique.
    #[error("multiple {kind} found for name {key}")]
    AmbiguousMatch {
        /// Kind of object that was listed.
        kind: &'static str,
        /// The duplicated name.
        key: String,
    },

    /// A provider call failed.
    #[error("failed to {operation} for {key}: {source}")]
    RemoteApi {
        /// What was being attempted.
        operation: &'static str,
        /// Name or ID the call was about.
        key: String,
        /// The provider error.
        #[source]
        source: CloudError,
    },

    /// A field required for creation is unset.
    #[error("field is required: {0}")]
    RequiredField(&'static str),

    /// The delta tries to change an immutable field.
    #[error("field cannot be changed: {0}")]
    ImmutableField(&'static str),

    /// A named lookup did not resolve to exactly one remote object.
    #[error("expected exactly one {kind} named {name:?}, found {found}")]
    ConfigurationResolution {
        /// Kind of object that was looked up.
        kind: &'static str,
        /// The name that was looked up.
        name: String,
        /// How many objects matched.
        found: usize,
    },

    /// The lifecycle expects the resource to exist already, and it does not.
    #[error("{key} does not exist and lifecycle {lifecycle} does not create it")]
    MissingResource {
        /// Name of the missing resource.
        key: String,
        /// The lifecycle that forbade creation.
        lifecycle: Lifecycle,
    },

    /// The existing resource differs from the desired state and the
    /// lifecycle treats that as an error.
    #[error("{key} differs from the desired state in {fields:?} under lifecycle {lifecycle}")]
    UnexpectedChanges {
        /// Name of the resource.
        key: String,
        /// The lifecycle in effect.
        lifecycle: Lifecycle,
        /// Names of the fields that differ.
        fields: Vec<&'static str>,
    },

    /// The provider did not reach a terminal status within the backoff budget.
    #[error(
        "{key} did not reach ACTIVE provisioning status after {attempts} attempts (last status {last_status:?})"
    )]
    ProvisioningTimeout {
        /// The resource being waited on.
        key: String,
        /// Number of status fetches performed.
        attempts: u32,
        /// The last status observed, if any.
        last_status: Option<String>,
    },

    /// The provider reported a terminal failure status.
    #[error("{key} went into {status} provisioning status")]
    ProvisioningFailed {
        /// The resource being waited on.
        key: String,
        /// The failure status reported.
        status: String,
    },
}

impl TaskError {
    /// Wrap a provider error with the operation and key it concerns.
    pub fn remote(operation: &'static str, key: impl Into<String>, source: CloudError) -> Self {
        Self::RemoteApi {
            operation,
            key: key.into(),
            source,
        }
    }

    /// Returns true if running the whole pass again later might succeed.
    ///
    /// Nothing is retried inside the task; this is advice for the orchestrator.
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        match self {
            Self::RemoteApi { source, .. } => source.is_retriable(),
            Self::ProvisioningTimeout { .. } => true,
            Self::AmbiguousMatch { .. }
            | Self::RequiredField(_)
            | Self::ImmutableField(_)
            | Self::ConfigurationResolution { .. }
            | Self::MissingResource { .. }
            | Self::UnexpectedChanges { .. }
            | Self::ProvisioningFailed { .. } => false,
        }
    }
}
