/// Collaborator contracts (app implements).
///
/// Local reads (`GroupStore`, `RecipientResolver`) are synchronous. Workflows
/// run on async runtime workers: `GroupStore` reads go through the blocking
/// pool, `RecipientResolver` is called inline and must not block.
/// Remote calls are async and may fail with `GatewayError`. Workflows hold
/// collaborators as shared handles and never own their state.

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use crate::groups::failure::GatewayError;
use crate::groups::ids::{GroupIdV2, PushGroupId, RecipientId};
use crate::groups::recipient::{GroupRecord, Recipient};
use crate::groups::result::GroupActionResult;

// ---------------------------------------------------------------------------
// Local store
// ---------------------------------------------------------------------------

/// Group configuration store.
///
/// Called through `tokio::task::spawn_blocking`, so a disk or database read
/// is fine here.
pub trait GroupStore: Send + Sync {
    /// Returns `None` if the group is not known locally.
    fn get_group(&self, id: &PushGroupId) -> Option<GroupRecord>;
}

/// Read-through recipient cache. Always returns the latest snapshot.
///
/// Called inline on an async worker, several times per workflow step.
/// Implementations must answer from memory and never block on I/O.
pub trait RecipientResolver: Send + Sync {
    fn resolve(&self, id: RecipientId) -> Recipient;

    fn resolve_all(&self, ids: &[RecipientId]) -> Vec<Recipient> {
        ids.iter().map(|id| self.resolve(*id)).collect()
    }
}

// ---------------------------------------------------------------------------
// Remote services
// ---------------------------------------------------------------------------

/// Directory lookup: refreshes registration and ServiceIds for recipients.
#[async_trait]
pub trait DirectoryGateway: Send + Sync {
    async fn refresh(
        &self,
        recipients: &[Recipient],
        notify_completion: bool,
    ) -> Result<(), GatewayError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobOutcome {
    Completed,
    TimedOut,
}

/// Runs a profile retrieval for the targets and waits for it, up to `max_wait`.
/// Timing out is not an error.
#[async_trait]
pub trait CapabilityJobRunner: Send + Sync {
    async fn run_and_wait_up_to(
        &self,
        targets: &BTreeSet<RecipientId>,
        max_wait: Duration,
    ) -> JobOutcome;
}

/// Authoritative group-state backend.
#[async_trait]
pub trait GroupMutationGateway: Send + Sync {
    async fn add_members(
        &self,
        group_id: &PushGroupId,
        members: &[RecipientId],
    ) -> Result<GroupActionResult, GatewayError>;

    async fn ban(&self, group_id: &GroupIdV2, target: RecipientId) -> Result<(), GatewayError>;
}

// ---------------------------------------------------------------------------
// Bundle
// ---------------------------------------------------------------------------

/// Shared handles to every collaborator a workflow needs.
#[derive(Clone)]
pub struct Collaborators {
    pub groups: Arc<dyn GroupStore>,
    pub recipients: Arc<dyn RecipientResolver>,
    pub directory: Arc<dyn DirectoryGateway>,
    pub capabilities: Arc<dyn CapabilityJobRunner>,
    pub mutations: Arc<dyn GroupMutationGateway>,
}
