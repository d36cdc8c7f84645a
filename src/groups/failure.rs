/// Group-change failure taxonomy shared by every group workflow.
///
/// Remote collaborators return `GatewayError`. Workflows never let it escape;
/// they fold it into a `GroupChangeFailureReason` via `from_error`.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Rejections reported by the group-state backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GroupChangeError {
    #[error("Insufficient rights for this group change")]
    InsufficientRights,

    #[error("Local user is not a member of the group")]
    NotAMember,

    #[error("Group is locked by another change")]
    Busy,

    #[error("Membership is not suitable for a V2 group")]
    MembershipNotSuitableForV2,

    #[error("Group change rejected: {0}")]
    Rejected(String),
}

/// Any failure of a remote collaborator call.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Network error: {0}")]
    Network(String),

    #[error(transparent)]
    GroupChange(#[from] GroupChangeError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<std::io::Error> for GatewayError {
    fn from(e: std::io::Error) -> Self {
        GatewayError::Network(e.to_string())
    }
}

impl GatewayError {
    /// Connectivity failure, classified the same way as `from_error`.
    pub fn is_network(&self) -> bool {
        GroupChangeFailureReason::from_error(self) == GroupChangeFailureReason::Network
    }
}

// ---------------------------------------------------------------------------
// Failure reasons
// ---------------------------------------------------------------------------

/// Why a group change did not happen. This is all the caller ever sees.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GroupChangeFailureReason {
    NoRights,
    NotGv2Capable,
    NotAnnouncementCapable,
    NotAMember,
    Busy,
    Network,
    Other,
}

impl GroupChangeFailureReason {
    /// Classify a collaborator error. Total and deterministic.
    pub fn from_error(error: &GatewayError) -> Self {
        match error {
            GatewayError::Network(_) => GroupChangeFailureReason::Network,
            GatewayError::GroupChange(e) => Self::from_group_change(e),
            GatewayError::Other(e) => {
                // Opaque errors may still wrap an I/O failure.
                if e.downcast_ref::<std::io::Error>().is_some() {
                    GroupChangeFailureReason::Network
                } else if let Some(change) = e.downcast_ref::<GroupChangeError>() {
                    Self::from_group_change(change)
                } else {
                    GroupChangeFailureReason::Other
                }
            }
        }
    }

    fn from_group_change(error: &GroupChangeError) -> Self {
        match error {
            GroupChangeError::InsufficientRights => GroupChangeFailureReason::NoRights,
            GroupChangeError::NotAMember => GroupChangeFailureReason::NotAMember,
            GroupChangeError::Busy => GroupChangeFailureReason::Busy,
            GroupChangeError::MembershipNotSuitableForV2 => GroupChangeFailureReason::NotGv2Capable,
            GroupChangeError::Rejected(_) => GroupChangeFailureReason::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GroupChangeFailureReason::NoRights => "NO_RIGHTS",
            GroupChangeFailureReason::NotGv2Capable => "NOT_GV2_CAPABLE",
            GroupChangeFailureReason::NotAnnouncementCapable => "NOT_ANNOUNCEMENT_CAPABLE",
            GroupChangeFailureReason::NotAMember => "NOT_A_MEMBER",
            GroupChangeFailureReason::Busy => "BUSY",
            GroupChangeFailureReason::Network => "NETWORK",
            GroupChangeFailureReason::Other => "OTHER",
        }
    }
}

impl fmt::Display for GroupChangeFailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
