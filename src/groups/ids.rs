/// Identity types for group management.
///
/// - `RecipientId`: local handle for a recipient (contact or group)
/// - `ServiceId`: remote identity of a registered recipient
/// - `GroupId`: group identifier in one of its three encodings (MMS, V1, V2)
/// - `PushGroupId` / `GroupIdV2`: resolved forms, only obtainable via `GroupId`

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// RecipientId
// ---------------------------------------------------------------------------

/// Local, opaque recipient handle. Stable for the lifetime of the local store.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecipientId(pub u64);

impl RecipientId {
    pub fn new(id: u64) -> Self {
        RecipientId(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Debug for RecipientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecipientId({})", self.0)
    }
}

impl fmt::Display for RecipientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// ServiceId
// ---------------------------------------------------------------------------

/// Remote identity of a recipient. Present only once the directory has
/// confirmed the recipient.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceId(pub Uuid);

impl ServiceId {
    /// Generate a random ServiceId.
    pub fn random() -> Self {
        ServiceId(Uuid::new_v4())
    }
}

impl fmt::Debug for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ServiceId({})", &self.0.to_string()[..8])
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// GroupId
// ---------------------------------------------------------------------------

const MMS_PREFIX: &str = "mms:";
const V1_PREFIX: &str = "v1:";
const V2_PREFIX: &str = "v2:";

#[derive(Error, Debug, PartialEq)]
pub enum GroupIdError {
    #[error("Unknown group id prefix")]
    UnknownPrefix,

    #[error("Invalid group id length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("Hex decode error: {0}")]
    Hex(#[from] hex::FromHexError),
}

/// Group identifier in any of its encodings.
///
/// Only `V1` and `V2` groups are push groups (server-delivered). Only `V2`
/// groups support the group-state protocol needed for bans and member adds
/// by ServiceId.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GroupId {
    Mms([u8; 16]),
    V1([u8; 16]),
    V2([u8; 32]),
}

impl GroupId {
    pub fn is_push(&self) -> bool {
        matches!(self, GroupId::V1(_) | GroupId::V2(_))
    }

    pub fn is_v2(&self) -> bool {
        matches!(self, GroupId::V2(_))
    }

    /// Resolve to the push form, if this is a push group.
    pub fn as_push(&self) -> Option<PushGroupId> {
        if self.is_push() {
            Some(PushGroupId(*self))
        } else {
            None
        }
    }

    /// Resolve to the V2 form, if this is a V2 group.
    pub fn as_v2(&self) -> Option<GroupIdV2> {
        match self {
            GroupId::V2(bytes) => Some(GroupIdV2(*bytes)),
            _ => None,
        }
    }

    /// Resolve to the push form.
    ///
    /// # Panics
    /// Panics on an MMS group. Callers must only hand push groups to the
    /// group-change workflows.
    pub fn require_push(&self) -> PushGroupId {
        match self.as_push() {
            Some(push) => push,
            None => panic!("Group {} is not a push group", self),
        }
    }

    /// Resolve to the V2 form.
    ///
    /// # Panics
    /// Panics on a V1 or MMS group.
    pub fn require_v2(&self) -> GroupIdV2 {
        match self.as_v2() {
            Some(v2) => v2,
            None => panic!("Group {} is not a V2 group", self),
        }
    }

    fn raw(&self) -> &[u8] {
        match self {
            GroupId::Mms(b) | GroupId::V1(b) => b.as_slice(),
            GroupId::V2(b) => b.as_slice(),
        }
    }

    fn prefix(&self) -> &'static str {
        match self {
            GroupId::Mms(_) => MMS_PREFIX,
            GroupId::V1(_) => V1_PREFIX,
            GroupId::V2(_) => V2_PREFIX,
        }
    }

    /// Hex-encode with kind prefix for display/storage.
    pub fn to_hex(&self) -> String {
        format!("{}{}", self.prefix(), hex::encode(self.raw()))
    }

    /// Decode from the prefixed hex form produced by `to_hex`.
    pub fn from_hex(s: &str) -> Result<Self, GroupIdError> {
        if let Some(rest) = s.strip_prefix(V2_PREFIX) {
            Ok(GroupId::V2(decode_fixed::<32>(rest)?))
        } else if let Some(rest) = s.strip_prefix(V1_PREFIX) {
            Ok(GroupId::V1(decode_fixed::<16>(rest)?))
        } else if let Some(rest) = s.strip_prefix(MMS_PREFIX) {
            Ok(GroupId::Mms(decode_fixed::<16>(rest)?))
        } else {
            Err(GroupIdError::UnknownPrefix)
        }
    }
}

fn decode_fixed<const N: usize>(s: &str) -> Result<[u8; N], GroupIdError> {
    let bytes = hex::decode(s)?;
    if bytes.len() != N {
        return Err(GroupIdError::InvalidLength {
            expected: N,
            actual: bytes.len(),
        });
    }
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes);
    Ok(out)
}

impl fmt::Debug for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = self.to_hex();
        let end = (self.prefix().len() + 8).min(hex.len());
        write!(f, "GroupId({})", &hex[..end])
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

// ---------------------------------------------------------------------------
// Resolved forms
// ---------------------------------------------------------------------------

/// A group id known to be V1 or V2.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct PushGroupId(GroupId);

impl PushGroupId {
    pub fn group_id(&self) -> GroupId {
        self.0
    }

    pub fn as_v2(&self) -> Option<GroupIdV2> {
        self.0.as_v2()
    }
}

impl fmt::Display for PushGroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// A group id known to be V2.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct GroupIdV2([u8; 32]);

impl GroupIdV2 {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn group_id(&self) -> GroupId {
        GroupId::V2(self.0)
    }
}

impl From<GroupIdV2> for PushGroupId {
    fn from(id: GroupIdV2) -> Self {
        PushGroupId(id.group_id())
    }
}

impl fmt::Display for GroupIdV2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.group_id(), f)
    }
}
