use serde::{Deserialize, Serialize};

use crate::groups::failure::GroupChangeFailureReason;
use crate::groups::ids::RecipientId;

/// What the group-state backend did for an add-members change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupActionResult {
    /// Members added directly.
    pub added_member_count: usize,
    /// Members added as pending invites.
    pub invited_members: Vec<RecipientId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GroupAddMembersResult {
    Success {
        number_of_members_added: usize,
        new_members_invited: Vec<RecipientId>,
    },
    Failure {
        reason: GroupChangeFailureReason,
    },
}

impl GroupAddMembersResult {
    pub fn failure(reason: GroupChangeFailureReason) -> Self {
        GroupAddMembersResult::Failure { reason }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, GroupAddMembersResult::Success { .. })
    }

    pub fn failure_reason(&self) -> Option<GroupChangeFailureReason> {
        match self {
            GroupAddMembersResult::Failure { reason } => Some(*reason),
            GroupAddMembersResult::Success { .. } => None,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl From<GroupActionResult> for GroupAddMembersResult {
    fn from(result: GroupActionResult) -> Self {
        GroupAddMembersResult::Success {
            number_of_members_added: result.added_member_count,
            new_members_invited: result.invited_members,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GroupBlockJoinRequestResult {
    Success,
    Failure { reason: GroupChangeFailureReason },
}

impl GroupBlockJoinRequestResult {
    pub fn is_success(&self) -> bool {
        matches!(self, GroupBlockJoinRequestResult::Success)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
