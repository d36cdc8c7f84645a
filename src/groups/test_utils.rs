/// In-memory collaborators for exercising the group workflows.
///
/// - `MemoryGroupStore` / `MemoryRecipients`: local store
/// - `FakeDirectory`, `FakeCapabilityRunner`, `FakeMutations`: remote services
///   that record every call
/// - `TestHarness`: all of the above wired into `Collaborators`

use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::ThreadId;
use std::time::Duration;

use crate::groups::failure::GatewayError;
use crate::groups::gateway::{
    CapabilityJobRunner, Collaborators, DirectoryGateway, GroupMutationGateway, GroupStore,
    JobOutcome, RecipientResolver,
};
use crate::groups::ids::{GroupIdV2, PushGroupId, RecipientId, ServiceId};
use crate::groups::recipient::{Capability, GroupRecord, Recipient, RegisteredState};
use crate::groups::result::GroupActionResult;

type AddResponse =
    Box<dyn FnMut(&[RecipientId]) -> Result<GroupActionResult, GatewayError> + Send>;
type BanResponse = Box<dyn FnMut(RecipientId) -> Result<(), GatewayError> + Send>;
type DirectoryFailure = Box<dyn Fn() -> GatewayError + Send>;

// ---------------------------------------------------------------------------
// Local store
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryGroupStore {
    groups: Mutex<HashMap<PushGroupId, GroupRecord>>,
    read_threads: Mutex<Vec<ThreadId>>,
}

impl MemoryGroupStore {
    pub fn insert(&self, record: GroupRecord) {
        self.groups.lock().unwrap().insert(record.id, record);
    }

    /// Threads every `get_group` ran on, in call order.
    pub fn read_threads(&self) -> Vec<ThreadId> {
        self.read_threads.lock().unwrap().clone()
    }
}

impl GroupStore for MemoryGroupStore {
    fn get_group(&self, id: &PushGroupId) -> Option<GroupRecord> {
        self.read_threads
            .lock()
            .unwrap()
            .push(std::thread::current().id());
        self.groups.lock().unwrap().get(id).cloned()
    }
}

/// Recipient cache. Unknown ids resolve to `Recipient::unknown`.
#[derive(Default)]
pub struct MemoryRecipients {
    recipients: Mutex<HashMap<RecipientId, Recipient>>,
}

impl MemoryRecipients {
    pub fn insert(&self, recipient: Recipient) {
        self.recipients.lock().unwrap().insert(recipient.id, recipient);
    }

    pub fn update<F: FnOnce(&mut Recipient)>(&self, id: RecipientId, f: F) {
        let mut recipients = self.recipients.lock().unwrap();
        let entry = recipients.entry(id).or_insert_with(|| Recipient::unknown(id));
        f(entry);
    }
}

impl RecipientResolver for MemoryRecipients {
    fn resolve(&self, id: RecipientId) -> Recipient {
        self.recipients
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .unwrap_or_else(|| Recipient::unknown(id))
    }
}

// ---------------------------------------------------------------------------
// Directory
// ---------------------------------------------------------------------------

/// Directory that knows a fixed set of registered recipients.
pub struct FakeDirectory {
    recipients: Arc<MemoryRecipients>,
    registered: Mutex<HashMap<RecipientId, ServiceId>>,
    failure: Mutex<Option<DirectoryFailure>>,
    calls: Mutex<Vec<Vec<RecipientId>>>,
    notify_flags: Mutex<Vec<bool>>,
}

impl FakeDirectory {
    pub fn new(recipients: Arc<MemoryRecipients>) -> Self {
        Self {
            recipients,
            registered: Mutex::new(HashMap::new()),
            failure: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
            notify_flags: Mutex::new(Vec::new()),
        }
    }

    /// The next refreshes will find `id` registered.
    pub fn register(&self, id: RecipientId) {
        self.registered.lock().unwrap().insert(id, ServiceId::random());
    }

    /// Make every refresh fail as unreachable, or succeed again.
    pub fn set_failing(&self, fail: bool) {
        if fail {
            self.fail_with(|| GatewayError::Network("directory unreachable".into()));
        } else {
            *self.failure.lock().unwrap() = None;
        }
    }

    /// Make every refresh fail with the error `f` builds.
    pub fn fail_with<F>(&self, f: F)
    where
        F: Fn() -> GatewayError + Send + 'static,
    {
        *self.failure.lock().unwrap() = Some(Box::new(f));
    }

    pub fn calls(&self) -> Vec<Vec<RecipientId>> {
        self.calls.lock().unwrap().clone()
    }

    /// `notify_completion` of every refresh, in call order.
    pub fn notify_flags(&self) -> Vec<bool> {
        self.notify_flags.lock().unwrap().clone()
    }
}

#[async_trait]
impl DirectoryGateway for FakeDirectory {
    async fn refresh(
        &self,
        recipients: &[Recipient],
        notify_completion: bool,
    ) -> Result<(), GatewayError> {
        self.calls
            .lock()
            .unwrap()
            .push(recipients.iter().map(|r| r.id).collect());
        self.notify_flags.lock().unwrap().push(notify_completion);

        if let Some(fail) = self.failure.lock().unwrap().as_ref() {
            return Err(fail());
        }

        let registered = self.registered.lock().unwrap().clone();
        for recipient in recipients {
            let service_id = registered.get(&recipient.id).copied();
            self.recipients.update(recipient.id, |r| {
                r.service_id = service_id;
                r.registered = if service_id.is_some() {
                    RegisteredState::Registered
                } else {
                    RegisteredState::NotRegistered
                };
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Capabilities
// ---------------------------------------------------------------------------

/// Profile job that flips configured recipients to `Supported`.
pub struct FakeCapabilityRunner {
    recipients: Arc<MemoryRecipients>,
    upgrades: Mutex<HashSet<RecipientId>>,
    stall: AtomicBool,
    calls: Mutex<Vec<BTreeSet<RecipientId>>>,
}

impl FakeCapabilityRunner {
    pub fn new(recipients: Arc<MemoryRecipients>) -> Self {
        Self {
            recipients,
            upgrades: Mutex::new(HashSet::new()),
            stall: AtomicBool::new(false),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// The next profile job reports `id` as supporting announcement groups.
    pub fn upgrade_on_refresh(&self, id: RecipientId) {
        self.upgrades.lock().unwrap().insert(id);
    }

    /// Ignore `max_wait` and never finish.
    pub fn set_stalled(&self, stall: bool) {
        self.stall.store(stall, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<BTreeSet<RecipientId>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CapabilityJobRunner for FakeCapabilityRunner {
    async fn run_and_wait_up_to(
        &self,
        targets: &BTreeSet<RecipientId>,
        _max_wait: Duration,
    ) -> JobOutcome {
        self.calls.lock().unwrap().push(targets.clone());

        if self.stall.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            return JobOutcome::TimedOut;
        }

        let upgrades = self.upgrades.lock().unwrap().clone();
        for id in targets.iter().filter(|id| upgrades.contains(id)) {
            self.recipients.update(*id, |r| {
                r.announcement_group_capability = Capability::Supported;
            });
        }
        JobOutcome::Completed
    }
}

// ---------------------------------------------------------------------------
// Mutations
// ---------------------------------------------------------------------------

/// Group backend with scriptable responses. Adds everyone directly and
/// accepts every ban unless told otherwise.
pub struct FakeMutations {
    add_response: Mutex<AddResponse>,
    ban_response: Mutex<BanResponse>,
    add_calls: Mutex<Vec<Vec<RecipientId>>>,
    ban_calls: Mutex<Vec<RecipientId>>,
}

impl Default for FakeMutations {
    fn default() -> Self {
        Self {
            add_response: Mutex::new(Box::new(|members: &[RecipientId]| {
                Ok(GroupActionResult {
                    added_member_count: members.len(),
                    invited_members: Vec::new(),
                })
            })),
            ban_response: Mutex::new(Box::new(|_: RecipientId| Ok(()))),
            add_calls: Mutex::new(Vec::new()),
            ban_calls: Mutex::new(Vec::new()),
        }
    }
}

impl FakeMutations {
    pub fn respond_to_add<F>(&self, f: F)
    where
        F: FnMut(&[RecipientId]) -> Result<GroupActionResult, GatewayError> + Send + 'static,
    {
        *self.add_response.lock().unwrap() = Box::new(f);
    }

    pub fn respond_to_ban<F>(&self, f: F)
    where
        F: FnMut(RecipientId) -> Result<(), GatewayError> + Send + 'static,
    {
        *self.ban_response.lock().unwrap() = Box::new(f);
    }

    /// `pending` members end up invited, everyone else is added directly.
    pub fn invite_instead_of_add(&self, pending: Vec<RecipientId>) {
        self.respond_to_add(move |members| {
            let invited: Vec<RecipientId> = members
                .iter()
                .copied()
                .filter(|id| pending.contains(id))
                .collect();
            Ok(GroupActionResult {
                added_member_count: members.len() - invited.len(),
                invited_members: invited,
            })
        });
    }

    pub fn add_calls(&self) -> Vec<Vec<RecipientId>> {
        self.add_calls.lock().unwrap().clone()
    }

    pub fn ban_calls(&self) -> Vec<RecipientId> {
        self.ban_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl GroupMutationGateway for FakeMutations {
    async fn add_members(
        &self,
        _group_id: &PushGroupId,
        members: &[RecipientId],
    ) -> Result<GroupActionResult, GatewayError> {
        self.add_calls.lock().unwrap().push(members.to_vec());
        let mut respond = self.add_response.lock().unwrap();
        (*respond)(members)
    }

    async fn ban(&self, _group_id: &GroupIdV2, target: RecipientId) -> Result<(), GatewayError> {
        self.ban_calls.lock().unwrap().push(target);
        let mut respond = self.ban_response.lock().unwrap();
        (*respond)(target)
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

/// All fakes wired together, with typed handles kept for assertions.
pub struct TestHarness {
    pub groups: Arc<MemoryGroupStore>,
    pub recipients: Arc<MemoryRecipients>,
    pub directory: Arc<FakeDirectory>,
    pub capabilities: Arc<FakeCapabilityRunner>,
    pub mutations: Arc<FakeMutations>,
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

impl TestHarness {
    pub fn new() -> Self {
        let recipients = Arc::new(MemoryRecipients::default());
        Self {
            groups: Arc::new(MemoryGroupStore::default()),
            directory: Arc::new(FakeDirectory::new(recipients.clone())),
            capabilities: Arc::new(FakeCapabilityRunner::new(recipients.clone())),
            mutations: Arc::new(FakeMutations::default()),
            recipients,
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            groups: self.groups.clone(),
            recipients: self.recipients.clone(),
            directory: self.directory.clone(),
            capabilities: self.capabilities.clone(),
            mutations: self.mutations.clone(),
        }
    }

    /// Store a group and return its resolved id.
    pub fn add_group(&self, id: PushGroupId, announcement_only: bool) -> PushGroupId {
        self.groups.insert(GroupRecord {
            id,
            title: "Test Group".into(),
            is_announcement_group: announcement_only,
        });
        id
    }

    /// A recipient the directory already confirmed.
    pub fn add_registered(&self, id: RecipientId, capability: Capability) {
        self.recipients.insert(Recipient {
            id,
            service_id: Some(ServiceId::random()),
            registered: RegisteredState::Registered,
            announcement_group_capability: capability,
            is_self: false,
            group_id: None,
        });
    }

    pub fn add_self(&self, id: RecipientId) {
        self.add_registered(id, Capability::Unknown);
        self.recipients.update(id, |r| r.is_self = true);
    }
}
