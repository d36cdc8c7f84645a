/// Group management — add members to push groups and block join requests.
///
/// Each operation runs on the worker runtime, talks to independently failing
/// remote collaborators, and answers the caller with exactly one result.
///
/// # Module structure
/// - `ids` — RecipientId, ServiceId, GroupId and its resolved forms
/// - `recipient` — Recipient and GroupRecord snapshots, Capability
/// - `failure` — GatewayError, GroupChangeError, GroupChangeFailureReason mapping
/// - `result` — GroupAddMembersResult, GroupBlockJoinRequestResult
/// - `reporter` — single-shot ResultReporter / PendingResult
/// - `gateway` — collaborator traits (store, resolver, directory, capabilities, backend)
/// - `config` — WorkflowConfig
/// - `add_members` — add-members workflow
/// - `block_join` — join-request ban workflow
/// - `repository` — GroupManagementRepository, the caller facade
pub mod add_members;
pub mod block_join;
pub mod config;
pub mod failure;
pub mod gateway;
pub mod ids;
pub mod recipient;
pub mod reporter;
pub mod repository;
pub mod result;
#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;

// Re-export core types for convenience
pub use add_members::AddMembersWorkflow;
pub use block_join::BlockJoinRequestWorkflow;
pub use config::{DirectoryFailurePolicy, WorkflowConfig};
pub use failure::{GatewayError, GroupChangeError, GroupChangeFailureReason};
pub use gateway::{
    CapabilityJobRunner, Collaborators, DirectoryGateway, GroupMutationGateway, GroupStore,
    JobOutcome, RecipientResolver,
};
pub use ids::{GroupId, GroupIdError, GroupIdV2, PushGroupId, RecipientId, ServiceId};
pub use recipient::{Capability, GroupRecord, Recipient, RegisteredState};
pub use reporter::{result_channel, PendingResult, ReportError, ResultReporter};
pub use repository::GroupManagementRepository;
pub use result::{GroupActionResult, GroupAddMembersResult, GroupBlockJoinRequestResult};
