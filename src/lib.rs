// Crate-level lint configuration — suppress stylistic warnings that don't affect correctness.
#![allow(
    clippy::empty_line_after_doc_comments,
    clippy::doc_lazy_continuation,
    dead_code
)]

// ── Modules ─────────────────────────────────────────────────────────────────

/// Push-group management: add members, block join requests.
pub mod groups;

// ── Re-export main types ────────────────────────────────────────────────────
pub use groups::{
    Capability, Collaborators, GroupAddMembersResult, GroupBlockJoinRequestResult,
    GroupChangeFailureReason, GroupId, GroupIdV2, GroupManagementRepository, PendingResult,
    Recipient, RecipientId, ResultReporter, WorkflowConfig,
};

// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get library version
pub fn get_version() -> &'static str {
    VERSION
}
