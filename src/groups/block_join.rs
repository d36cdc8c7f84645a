use std::sync::Arc;

use crate::groups::failure::GroupChangeFailureReason;
use crate::groups::gateway::GroupMutationGateway;
use crate::groups::ids::{GroupIdV2, RecipientId};
use crate::groups::result::GroupBlockJoinRequestResult;

/// Ban a recipient from requesting to join a group. One remote call, no
/// partial success.
#[derive(Clone)]
pub struct BlockJoinRequestWorkflow {
    mutations: Arc<dyn GroupMutationGateway>,
}

impl BlockJoinRequestWorkflow {
    pub fn new(mutations: Arc<dyn GroupMutationGateway>) -> Self {
        Self { mutations }
    }

    pub async fn run(
        &self,
        group_id: GroupIdV2,
        target: RecipientId,
    ) -> GroupBlockJoinRequestResult {
        match self.mutations.ban(&group_id, target).await {
            Ok(()) => {
                log::info!("Blocked join requests from {} in {}", target, group_id);
                GroupBlockJoinRequestResult::Success
            }
            Err(e) => {
                log::warn!("Failure to block join requests from {}: {}", target, e);
                GroupBlockJoinRequestResult::Failure {
                    reason: GroupChangeFailureReason::from_error(&e),
                }
            }
        }
    }
}
