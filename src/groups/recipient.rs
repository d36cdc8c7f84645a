/// Point-in-time recipient and group snapshots.
///
/// Snapshots are read fresh from the local store on every resolve. They are
/// never cached by the workflows; a directory or capability refresh changes
/// what the next resolve returns.

use serde::{Deserialize, Serialize};

use crate::groups::ids::{GroupId, PushGroupId, RecipientId, ServiceId};

/// Client-advertised support for a protocol feature.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Capability {
    Supported,
    NotSupported,
    #[default]
    Unknown,
}

impl Capability {
    pub fn is_supported(&self) -> bool {
        matches!(self, Capability::Supported)
    }
}

/// Directory registration state as last seen locally.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegisteredState {
    Registered,
    NotRegistered,
    #[default]
    Unknown,
}

/// Snapshot of a recipient.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub id: RecipientId,
    /// Remote identity; `None` until the directory has confirmed it.
    pub service_id: Option<ServiceId>,
    pub registered: RegisteredState,
    pub announcement_group_capability: Capability,
    /// True for the local user's own recipient.
    pub is_self: bool,
    /// Set when this recipient stands for a group conversation.
    pub group_id: Option<GroupId>,
}

impl Recipient {
    /// An individual recipient with nothing known about it yet.
    pub fn unknown(id: RecipientId) -> Self {
        Recipient {
            id,
            service_id: None,
            registered: RegisteredState::Unknown,
            announcement_group_capability: Capability::Unknown,
            is_self: false,
            group_id: None,
        }
    }

    /// A recipient that stands for a group.
    pub fn for_group(id: RecipientId, group_id: GroupId) -> Self {
        Recipient {
            group_id: Some(group_id),
            ..Recipient::unknown(id)
        }
    }

    pub fn is_registered(&self) -> bool {
        self.registered == RegisteredState::Registered
    }

    pub fn has_service_id(&self) -> bool {
        self.service_id.is_some()
    }

    /// Registered and reachable; needs no directory refresh.
    pub fn is_known_reachable(&self) -> bool {
        self.has_service_id() && self.is_registered()
    }

    pub fn is_group(&self) -> bool {
        self.group_id.is_some()
    }

    /// # Panics
    /// Panics when the recipient is not a group.
    pub fn require_group_id(&self) -> GroupId {
        match self.group_id {
            Some(group_id) => group_id,
            None => panic!("Recipient {} is not a group", self.id),
        }
    }
}

/// Read-only view of a group's configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRecord {
    pub id: PushGroupId,
    pub title: String,
    /// Only admins may post; every member must support announcement groups.
    pub is_announcement_group: bool,
}
