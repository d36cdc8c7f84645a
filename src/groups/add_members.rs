/// Add-members workflow.
///
/// Steps, each a possible short-circuit:
/// 1. load the group record
/// 2. refresh the directory for candidates not yet known to be registered
/// 3. announcement groups only: refresh capabilities, reject if any candidate
///    still lacks announcement support
/// 4. keep registered candidates, reject if none are left
/// 5. submit to the group backend
///
/// The workflow returns its outcome instead of reporting it, so every path
/// produces exactly one result.

use std::collections::BTreeSet;

use crate::groups::config::{DirectoryFailurePolicy, WorkflowConfig};
use crate::groups::failure::GroupChangeFailureReason;
use crate::groups::gateway::{Collaborators, JobOutcome};
use crate::groups::ids::{PushGroupId, RecipientId};
use crate::groups::recipient::{GroupRecord, Recipient};
use crate::groups::result::{GroupActionResult, GroupAddMembersResult};

type StepResult<T> = std::result::Result<T, GroupChangeFailureReason>;

/// Outcome of the directory refresh step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum DirectoryRefresh {
    NotNeeded,
    Refreshed,
    Unreachable,
}

#[derive(Clone)]
pub struct AddMembersWorkflow {
    collaborators: Collaborators,
    config: WorkflowConfig,
}

impl AddMembersWorkflow {
    pub fn new(collaborators: Collaborators, config: WorkflowConfig) -> Self {
        Self {
            collaborators,
            config,
        }
    }

    /// Run every step and return the terminal result.
    pub async fn run(
        &self,
        group_id: PushGroupId,
        selected: &[RecipientId],
    ) -> GroupAddMembersResult {
        let selected = dedup(selected);

        match self.try_run(&group_id, &selected).await {
            Ok(action) => {
                log::info!(
                    "Added {} member(s) to {}, {} invited",
                    action.added_member_count,
                    group_id,
                    action.invited_members.len()
                );
                action.into()
            }
            Err(reason) => {
                log::warn!("Add members to {} failed: {}", group_id, reason);
                GroupAddMembersResult::failure(reason)
            }
        }
    }

    async fn try_run(
        &self,
        group_id: &PushGroupId,
        selected: &[RecipientId],
    ) -> StepResult<GroupActionResult> {
        let record = self.load_group(group_id).await?;
        let directory = self.refresh_directory(selected).await?;

        if record.is_announcement_group {
            self.check_announcement_capability(selected).await?;
        }

        let to_add = self.registered_members(selected, directory)?;

        self.collaborators
            .mutations
            .add_members(group_id, &to_add)
            .await
            .map_err(|e| {
                log::warn!("Failure to add members: {}", e);
                GroupChangeFailureReason::from_error(&e)
            })
    }

    /// The store read may hit disk, so it runs on the blocking pool.
    async fn load_group(&self, group_id: &PushGroupId) -> StepResult<GroupRecord> {
        let groups = self.collaborators.groups.clone();
        let id = *group_id;

        let record = match tokio::task::spawn_blocking(move || groups.get_group(&id)).await {
            Ok(record) => record,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => {
                log::warn!("Group store read for {} did not finish: {}", group_id, e);
                return Err(GroupChangeFailureReason::Other);
            }
        };

        record.ok_or_else(|| {
            log::warn!("Group {} not found in local store", group_id);
            GroupChangeFailureReason::NotAMember
        })
    }

    async fn refresh_directory(&self, selected: &[RecipientId]) -> StepResult<DirectoryRefresh> {
        let unknown: Vec<Recipient> = self
            .collaborators
            .recipients
            .resolve_all(selected)
            .into_iter()
            .filter(|r| !r.is_known_reachable())
            .collect();

        #[cfg(feature = "debug-logs")]
        for r in &unknown {
            log::debug!("Directory refresh candidate: {:?}", r);
        }

        if unknown.is_empty() {
            return Ok(DirectoryRefresh::NotNeeded);
        }

        log::debug!("Refreshing directory for {} recipient(s)", unknown.len());

        match self
            .collaborators
            .directory
            .refresh(&unknown, self.config.notify_directory_completion)
            .await
        {
            Ok(()) => Ok(DirectoryRefresh::Refreshed),
            // Only a connectivity failure leaves the known members usable.
            Err(e)
                if e.is_network()
                    && self.config.directory_failure == DirectoryFailurePolicy::Continue =>
            {
                log::warn!("Directory unreachable, continuing with known members: {}", e);
                Ok(DirectoryRefresh::Unreachable)
            }
            Err(e) => {
                log::warn!("Directory refresh failed, aborting: {}", e);
                Err(GroupChangeFailureReason::from_error(&e))
            }
        }
    }

    async fn check_announcement_capability(&self, selected: &[RecipientId]) -> StepResult<()> {
        let recipients = &self.collaborators.recipients;

        let needs_resolve: BTreeSet<RecipientId> = recipients
            .resolve_all(selected)
            .into_iter()
            .filter(|r| !r.announcement_group_capability.is_supported() && !r.is_self)
            .map(|r| r.id)
            .collect();

        if needs_resolve.is_empty() {
            return Ok(());
        }

        let wait = self.config.capability_wait;
        log::debug!(
            "Retrieving capabilities for {} recipient(s), waiting up to {:?}",
            needs_resolve.len(),
            wait
        );

        // Hard bound even if the runner ignores max_wait.
        let job = self
            .collaborators
            .capabilities
            .run_and_wait_up_to(&needs_resolve, wait);
        match tokio::time::timeout(wait, job).await {
            Ok(JobOutcome::Completed) => {}
            Ok(JobOutcome::TimedOut) | Err(_) => {
                log::warn!("Capability retrieval did not finish in {:?}", wait);
            }
        }

        let unsupported = needs_resolve
            .iter()
            .filter(|id| {
                !recipients
                    .resolve(**id)
                    .announcement_group_capability
                    .is_supported()
            })
            .count();

        if unsupported > 0 {
            log::warn!("{} recipient(s) do not support announcement groups", unsupported);
            return Err(GroupChangeFailureReason::NotAnnouncementCapable);
        }
        Ok(())
    }

    fn registered_members(
        &self,
        selected: &[RecipientId],
        directory: DirectoryRefresh,
    ) -> StepResult<Vec<RecipientId>> {
        let to_add: Vec<RecipientId> = selected
            .iter()
            .copied()
            .filter(|id| self.collaborators.recipients.resolve(*id).is_registered())
            .collect();

        if !to_add.is_empty() {
            return Ok(to_add);
        }

        // An empty set after an unreachable directory says nothing about registration.
        if directory == DirectoryRefresh::Unreachable {
            Err(GroupChangeFailureReason::Network)
        } else {
            Err(GroupChangeFailureReason::NotGv2Capable)
        }
    }
}

/// Keep first occurrence order.
fn dedup(ids: &[RecipientId]) -> Vec<RecipientId> {
    let mut seen = BTreeSet::new();
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::groups::failure::{GatewayError, GroupChangeError};
    use crate::groups::ids::GroupId;
    use crate::groups::recipient::Capability;
    use crate::groups::test_utils::TestHarness;
    use std::time::Duration;

    fn group() -> PushGroupId {
        GroupId::V2([0x42; 32]).require_push()
    }

    fn ids(raw: &[u64]) -> Vec<RecipientId> {
        raw.iter().map(|i| RecipientId(*i)).collect()
    }

    fn workflow(h: &TestHarness) -> AddMembersWorkflow {
        AddMembersWorkflow::new(h.collaborators(), WorkflowConfig::default())
    }

    // -------------------------------------------------------------------
    // Happy path
    // -------------------------------------------------------------------

    #[tokio::test]
    async fn test_known_members_skip_directory() {
        let h = TestHarness::new();
        let gid = h.add_group(group(), false);
        h.add_registered(RecipientId(1), Capability::Unknown);
        h.add_registered(RecipientId(2), Capability::Unknown);

        let result = workflow(&h).run(gid, &ids(&[1, 2])).await;

        assert_eq!(
            result,
            GroupAddMembersResult::Success {
                number_of_members_added: 2,
                new_members_invited: vec![],
            }
        );
        assert!(h.directory.calls().is_empty());
        assert_eq!(h.mutations.add_calls(), vec![ids(&[1, 2])]);
    }

    #[tokio::test]
    async fn test_directory_refresh_only_for_unknown() {
        let h = TestHarness::new();
        let gid = h.add_group(group(), false);
        h.add_registered(RecipientId(1), Capability::Unknown);
        h.directory.register(RecipientId(2));

        let result = workflow(&h).run(gid, &ids(&[1, 2, 3])).await;

        assert_eq!(h.directory.calls(), vec![ids(&[2, 3])]);
        assert_eq!(h.directory.notify_flags(), vec![false]);
        assert_eq!(h.mutations.add_calls(), vec![ids(&[1, 2])]);
        assert!(result.is_success());
    }

    #[tokio::test]
    async fn test_directory_completion_notice_is_forwarded() {
        let h = TestHarness::new();
        let gid = h.add_group(group(), false);
        h.directory.register(RecipientId(2));

        let config = WorkflowConfig {
            notify_directory_completion: true,
            ..Default::default()
        };
        let result = AddMembersWorkflow::new(h.collaborators(), config)
            .run(gid, &ids(&[2]))
            .await;

        assert_eq!(h.directory.notify_flags(), vec![true]);
        assert!(result.is_success());
    }

    #[tokio::test]
    async fn test_group_store_read_leaves_the_async_worker() {
        let h = TestHarness::new();
        let gid = h.add_group(group(), false);
        h.add_registered(RecipientId(1), Capability::Unknown);

        let result = workflow(&h).run(gid, &ids(&[1])).await;

        // Current-thread runtime: the test body runs on the only worker.
        let worker = std::thread::current().id();
        let reads = h.groups.read_threads();
        assert_eq!(reads.len(), 1);
        assert_ne!(reads[0], worker);
        assert!(result.is_success());
    }

    #[tokio::test]
    async fn test_success_counts_invited_members() {
        let h = TestHarness::new();
        let gid = h.add_group(group(), false);
        for i in 1..=3 {
            h.add_registered(RecipientId(i), Capability::Supported);
        }
        h.mutations.invite_instead_of_add(ids(&[3]));

        let result = workflow(&h).run(gid, &ids(&[1, 2, 3])).await;

        assert_eq!(
            result,
            GroupAddMembersResult::Success {
                number_of_members_added: 2,
                new_members_invited: ids(&[3]),
            }
        );
    }

    #[tokio::test]
    async fn test_duplicate_candidates_submitted_once() {
        let h = TestHarness::new();
        let gid = h.add_group(group(), false);
        h.add_registered(RecipientId(1), Capability::Unknown);

        workflow(&h).run(gid, &ids(&[1, 1, 1])).await;

        assert_eq!(h.mutations.add_calls(), vec![ids(&[1])]);
    }

    // -------------------------------------------------------------------
    // Directory refresh failure
    // -------------------------------------------------------------------

    #[tokio::test]
    async fn test_directory_failure_still_adds_known_members() {
        let h = TestHarness::new();
        let gid = h.add_group(group(), false);
        h.add_registered(RecipientId(1), Capability::Unknown);
        h.directory.set_failing(true);

        let result = workflow(&h).run(gid, &ids(&[1, 2])).await;

        assert_eq!(h.mutations.add_calls(), vec![ids(&[1])]);
        assert!(result.is_success());
    }

    #[tokio::test]
    async fn test_directory_failure_with_nobody_known_is_network() {
        let h = TestHarness::new();
        let gid = h.add_group(group(), false);
        h.directory.set_failing(true);

        let result = workflow(&h).run(gid, &ids(&[1, 2])).await;

        assert_eq!(result.failure_reason(), Some(GroupChangeFailureReason::Network));
        assert!(h.mutations.add_calls().is_empty());
    }

    #[tokio::test]
    async fn test_directory_rejection_keeps_its_own_reason() {
        let h = TestHarness::new();
        let gid = h.add_group(group(), false);
        h.directory.fail_with(|| GroupChangeError::Busy.into());

        let result = workflow(&h).run(gid, &ids(&[5])).await;

        assert_eq!(h.directory.calls(), vec![ids(&[5])]);
        assert_eq!(result.failure_reason(), Some(GroupChangeFailureReason::Busy));
        assert!(h.mutations.add_calls().is_empty());
    }

    #[tokio::test]
    async fn test_directory_rejection_does_not_add_known_members() {
        let h = TestHarness::new();
        let gid = h.add_group(group(), false);
        h.add_registered(RecipientId(1), Capability::Unknown);
        h.directory.fail_with(|| GroupChangeError::InsufficientRights.into());

        let result = workflow(&h).run(gid, &ids(&[1, 2])).await;

        assert_eq!(result.failure_reason(), Some(GroupChangeFailureReason::NoRights));
        assert!(h.mutations.add_calls().is_empty());
    }

    #[tokio::test]
    async fn test_wrapped_io_error_is_degraded_mode() {
        let h = TestHarness::new();
        let gid = h.add_group(group(), false);
        h.add_registered(RecipientId(1), Capability::Unknown);
        h.directory.fail_with(|| {
            GatewayError::Other(anyhow::Error::new(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "refused",
            )))
        });

        let result = workflow(&h).run(gid, &ids(&[1, 2])).await;

        assert_eq!(h.mutations.add_calls(), vec![ids(&[1])]);
        assert!(result.is_success());
    }

    #[tokio::test]
    async fn test_directory_failure_abort_policy() {
        let h = TestHarness::new();
        let gid = h.add_group(group(), false);
        h.add_registered(RecipientId(1), Capability::Unknown);
        h.directory.set_failing(true);

        let config = WorkflowConfig {
            directory_failure: DirectoryFailurePolicy::Abort,
            ..Default::default()
        };
        let result = AddMembersWorkflow::new(h.collaborators(), config)
            .run(gid, &ids(&[1, 2]))
            .await;

        assert_eq!(result.failure_reason(), Some(GroupChangeFailureReason::Network));
        assert!(h.mutations.add_calls().is_empty());
    }

    // -------------------------------------------------------------------
    // Eligibility guard
    // -------------------------------------------------------------------

    #[tokio::test]
    async fn test_nobody_registered_is_not_gv2_capable() {
        let h = TestHarness::new();
        let gid = h.add_group(group(), false);

        let result = workflow(&h).run(gid, &ids(&[7, 8])).await;

        assert_eq!(h.directory.calls(), vec![ids(&[7, 8])]);
        assert_eq!(
            result.failure_reason(),
            Some(GroupChangeFailureReason::NotGv2Capable)
        );
        assert!(h.mutations.add_calls().is_empty());
    }

    #[tokio::test]
    async fn test_empty_candidate_list_is_not_gv2_capable() {
        let h = TestHarness::new();
        let gid = h.add_group(group(), false);

        let result = workflow(&h).run(gid, &[]).await;

        assert_eq!(
            result.failure_reason(),
            Some(GroupChangeFailureReason::NotGv2Capable)
        );
        assert!(h.directory.calls().is_empty());
        assert!(h.mutations.add_calls().is_empty());
    }

    #[tokio::test]
    async fn test_missing_group_record() {
        let h = TestHarness::new();
        h.add_registered(RecipientId(1), Capability::Unknown);

        let result = workflow(&h).run(group(), &ids(&[1])).await;

        assert_eq!(result.failure_reason(), Some(GroupChangeFailureReason::NotAMember));
        assert!(h.directory.calls().is_empty());
        assert!(h.mutations.add_calls().is_empty());
    }

    // -------------------------------------------------------------------
    // Announcement groups
    // -------------------------------------------------------------------

    #[tokio::test]
    async fn test_announcement_group_rejects_unsupported() {
        let h = TestHarness::new();
        let gid = h.add_group(group(), true);
        h.add_registered(RecipientId(1), Capability::Supported);
        h.add_registered(RecipientId(2), Capability::NotSupported);

        let result = workflow(&h).run(gid, &ids(&[1, 2])).await;

        assert_eq!(
            result.failure_reason(),
            Some(GroupChangeFailureReason::NotAnnouncementCapable)
        );
        assert_eq!(h.capabilities.calls(), vec![BTreeSet::from([RecipientId(2)])]);
        assert!(h.mutations.add_calls().is_empty());
    }

    #[tokio::test]
    async fn test_announcement_group_accepts_after_refresh() {
        let h = TestHarness::new();
        let gid = h.add_group(group(), true);
        h.add_registered(RecipientId(1), Capability::Unknown);
        h.capabilities.upgrade_on_refresh(RecipientId(1));

        let result = workflow(&h).run(gid, &ids(&[1])).await;

        assert!(result.is_success());
        assert_eq!(h.mutations.add_calls(), vec![ids(&[1])]);
    }

    #[tokio::test]
    async fn test_announcement_group_skips_self() {
        let h = TestHarness::new();
        let gid = h.add_group(group(), true);
        h.add_self(RecipientId(1));
        h.add_registered(RecipientId(2), Capability::Supported);

        let result = workflow(&h).run(gid, &ids(&[1, 2])).await;

        assert!(h.capabilities.calls().is_empty());
        assert!(result.is_success());
    }

    #[tokio::test]
    async fn test_plain_group_ignores_capabilities() {
        let h = TestHarness::new();
        let gid = h.add_group(group(), false);
        h.add_registered(RecipientId(1), Capability::NotSupported);

        let result = workflow(&h).run(gid, &ids(&[1])).await;

        assert!(result.is_success());
        assert!(h.capabilities.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_capability_job_is_bounded() {
        let h = TestHarness::new();
        let gid = h.add_group(group(), true);
        h.add_registered(RecipientId(1), Capability::Unknown);
        h.capabilities.set_stalled(true);

        let started = tokio::time::Instant::now();
        let result = workflow(&h).run(gid, &ids(&[1])).await;

        assert!(started.elapsed() >= Duration::from_secs(10));
        assert!(started.elapsed() < Duration::from_secs(3600));
        assert_eq!(
            result.failure_reason(),
            Some(GroupChangeFailureReason::NotAnnouncementCapable)
        );
    }

    // -------------------------------------------------------------------
    // Backend failures
    // -------------------------------------------------------------------

    #[tokio::test]
    async fn test_backend_errors_are_mapped() {
        let cases = [
            (
                GatewayError::Network("reset".into()),
                GroupChangeFailureReason::Network,
            ),
            (
                GatewayError::from(GroupChangeError::InsufficientRights),
                GroupChangeFailureReason::NoRights,
            ),
            (
                GatewayError::from(GroupChangeError::Busy),
                GroupChangeFailureReason::Busy,
            ),
            (
                GatewayError::Other(anyhow::anyhow!("boom")),
                GroupChangeFailureReason::Other,
            ),
        ];

        for (error, expected) in cases {
            let h = TestHarness::new();
            let gid = h.add_group(group(), false);
            h.add_registered(RecipientId(1), Capability::Unknown);
            let mut error = Some(error);
            h.mutations
                .respond_to_add(move |_| Err(error.take().expect("called once")));

            let result = workflow(&h).run(gid, &ids(&[1])).await;
            assert_eq!(result.failure_reason(), Some(expected));
        }
    }
}
