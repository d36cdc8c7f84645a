/// Single entry point for managing push groups.
///
/// Every operation is submitted to the worker runtime and answered exactly
/// once, either through the returned `PendingResult` or through a caller
/// supplied `ResultReporter`.

use tokio::runtime::Handle;

use crate::groups::add_members::AddMembersWorkflow;
use crate::groups::block_join::BlockJoinRequestWorkflow;
use crate::groups::config::WorkflowConfig;
use crate::groups::gateway::Collaborators;
use crate::groups::ids::{GroupId, GroupIdV2, RecipientId};
use crate::groups::recipient::Recipient;
use crate::groups::reporter::{result_channel, PendingResult, ResultReporter};
use crate::groups::result::{GroupAddMembersResult, GroupBlockJoinRequestResult};

pub struct GroupManagementRepository {
    runtime: Handle,
    collaborators: Collaborators,
    config: WorkflowConfig,
}

impl GroupManagementRepository {
    pub fn new(runtime: Handle, collaborators: Collaborators) -> Self {
        Self {
            runtime,
            collaborators,
            config: WorkflowConfig::default(),
        }
    }

    pub fn with_config(mut self, config: WorkflowConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    /// Add `selected` to a push group.
    ///
    /// # Panics
    /// Panics on the calling thread if `group_id` is not a push group.
    pub fn add_members(
        &self,
        group_id: GroupId,
        selected: Vec<RecipientId>,
    ) -> PendingResult<GroupAddMembersResult> {
        let (reporter, pending) = result_channel();
        self.add_members_with(group_id, selected, reporter);
        pending
    }

    /// Add `selected` to the group a group recipient stands for.
    ///
    /// # Panics
    /// Panics if `group_recipient` is not a push group.
    pub fn add_members_for_recipient(
        &self,
        group_recipient: &Recipient,
        selected: Vec<RecipientId>,
    ) -> PendingResult<GroupAddMembersResult> {
        self.add_members(group_recipient.require_group_id(), selected)
    }

    /// Callback flavour of `add_members`.
    pub fn add_members_with(
        &self,
        group_id: GroupId,
        selected: Vec<RecipientId>,
        reporter: ResultReporter<GroupAddMembersResult>,
    ) {
        // Resolve before spawning so misuse fails loudly here.
        let push_id = group_id.require_push();
        let workflow = AddMembersWorkflow::new(self.collaborators.clone(), self.config.clone());

        self.runtime.spawn(async move {
            let result = workflow.run(push_id, &selected).await;
            reporter.report(result);
        });
    }

    /// Ban `target` from requesting to join a V2 group.
    pub fn block_join_requests(
        &self,
        group_id: GroupIdV2,
        target: RecipientId,
    ) -> PendingResult<GroupBlockJoinRequestResult> {
        let (reporter, pending) = result_channel();
        self.block_join_requests_with(group_id, target, reporter);
        pending
    }

    pub fn block_join_requests_with(
        &self,
        group_id: GroupIdV2,
        target: RecipientId,
        reporter: ResultReporter<GroupBlockJoinRequestResult>,
    ) {
        let workflow = BlockJoinRequestWorkflow::new(self.collaborators.mutations.clone());

        self.runtime.spawn(async move {
            let result = workflow.run(group_id, target).await;
            reporter.report(result);
        });
    }
}
