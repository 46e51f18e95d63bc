//! In-memory endpoint used by the unit tests.

use crate::api::VimApi;
use crate::context::{ConnectionContext, WaitOptions};
use crate::error::{VmwareError, VmwareResult};
use crate::inventory::*;
use crate::types::*;

use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Remote call observed by the fake.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    CreateVm {
        folder: ManagedObjectReference,
        spec: VirtualMachineConfigSpec,
        pool: ManagedObjectReference,
        host: Option<ManagedObjectReference>,
    },
    CloneVm {
        vm: ManagedObjectReference,
        folder: ManagedObjectReference,
        name: String,
        spec: VirtualMachineCloneSpec,
    },
    Reconfigure {
        vm: ManagedObjectReference,
        spec: VirtualMachineConfigSpec,
    },
    PowerOn(ManagedObjectReference),
    PowerOff(ManagedObjectReference),
    CreateSnapshot {
        vm: ManagedObjectReference,
        name: String,
        memory: bool,
        quiesce: bool,
    },
    Destroy(ManagedObjectReference),
    ShutdownGuest(ManagedObjectReference),
    MarkAsTemplate(ManagedObjectReference),
}

type Outcome = Result<Option<serde_json::Value>, (&'static str, &'static str)>;

struct FakeTask {
    remaining_polls: u32,
    outcome: Outcome,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct FakeVm {
    pub name: String,
    pub power_state: VmPowerState,
    pub template: bool,
    pub snapshot: Option<ManagedObjectReference>,
    pub devices: Vec<VirtualDevice>,
    pub ip: Option<String>,
    /// Guest address polls that report nothing before `ip` shows up.
    pub ip_after_polls: u32,
    /// Whether a guest shutdown request actually powers the VM off.
    pub honours_shutdown: bool,
}

#[derive(Default)]
struct FakeState {
    next_id: u32,
    tasks: HashMap<String, FakeTask>,
    task_polls: usize,
    calls: Vec<Call>,
    vms: HashMap<String, FakeVm>,
    fail_next: Option<(&'static str, &'static str)>,
    fail_next_call: Option<(&'static str, &'static str)>,
}

/// Stateful fake of the remote endpoint. Clones share state.
#[derive(Clone, Default)]
pub(crate) struct FakeVim {
    state: Arc<Mutex<FakeState>>,
}

impl FakeVim {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    /// Register a standalone task that stays running for `polls` polls.
    pub fn enqueue_task(&self, polls: u32, outcome: Outcome) -> ManagedObjectReference {
        let mut st = self.lock();
        st.next_id += 1;
        let id = format!("task-{}", st.next_id);
        st.tasks.insert(id.clone(), FakeTask { remaining_polls: polls, outcome });
        ManagedObjectReference::new("Task", id)
    }

    pub fn add_vm(&self, id: &str, vm: FakeVm) -> ManagedObjectReference {
        self.lock().vms.insert(id.to_string(), vm);
        ManagedObjectReference::virtual_machine(id)
    }

    pub fn vm(&self, id: &str) -> Option<FakeVm> {
        self.lock().vms.get(id).cloned()
    }

    pub fn set_power_state(&self, id: &str, state: VmPowerState) {
        if let Some(vm) = self.lock().vms.get_mut(id) {
            vm.power_state = state;
        }
    }

    /// Make the next submitted task fail with the given fault.
    pub fn fail_next_task(&self, fault: &'static str, message: &'static str) {
        self.lock().fail_next = Some((fault, message));
    }

    /// Make the next immediate (non-task) call fail with the given fault,
    /// the way the endpoint rejects a method outright.
    pub fn fail_next_call(&self, fault: &'static str, message: &'static str) {
        self.lock().fail_next_call = Some((fault, message));
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn task_polls(&self) -> usize {
        self.lock().task_polls
    }

    fn submit(
        &self,
        call: Call,
        effect: impl FnOnce(&mut FakeState) -> Option<serde_json::Value>,
    ) -> ManagedObjectReference {
        let mut st = self.lock();
        st.calls.push(call);
        let outcome = match st.fail_next.take() {
            Some(fault) => Err(fault),
            None => Ok(effect(&mut *st)),
        };
        st.next_id += 1;
        let id = format!("task-{}", st.next_id);
        st.tasks.insert(id.clone(), FakeTask { remaining_polls: 1, outcome });
        ManagedObjectReference::new("Task", id)
    }

    /// Record an immediate call, failing it if a fault was armed.
    fn immediate(&self, call: Call) -> VmwareResult<()> {
        let mut st = self.lock();
        st.calls.push(call);
        match st.fail_next_call.take() {
            Some((fault, message)) => {
                let mut err = VmwareError::api(500, message);
                err.fault = Some(fault.to_string());
                Err(err)
            }
            None => Ok(()),
        }
    }

    fn with_vm<T>(
        &self,
        vm: &ManagedObjectReference,
        f: impl FnOnce(&mut FakeVm) -> T,
    ) -> VmwareResult<T> {
        let mut st = self.lock();
        st.vms
            .get_mut(&vm.value)
            .map(f)
            .ok_or_else(|| VmwareError::not_found(format!("Resource not found: {vm}")))
    }
}

fn new_vm_id(st: &mut FakeState) -> String {
    st.next_id += 1;
    format!("vm-{}", 100 + st.next_id)
}

fn reference_value(id: &str) -> serde_json::Value {
    json!({"_typeName": "ManagedObjectReference", "type": "VirtualMachine", "value": id})
}

#[async_trait]
impl VimApi for FakeVim {
    async fn create_vm_task(
        &self,
        folder: &ManagedObjectReference,
        spec: &VirtualMachineConfigSpec,
        pool: &ManagedObjectReference,
        host: Option<&ManagedObjectReference>,
    ) -> VmwareResult<ManagedObjectReference> {
        let call = Call::CreateVm {
            folder: folder.clone(),
            spec: spec.clone(),
            pool: pool.clone(),
            host: host.cloned(),
        };
        let name = spec.name.clone().unwrap_or_default();
        let devices: Vec<VirtualDevice> =
            spec.device_change.iter().map(|c| c.device.clone()).collect();
        Ok(self.submit(call, move |st| {
            let id = new_vm_id(st);
            st.vms.insert(
                id.clone(),
                FakeVm {
                    name,
                    power_state: VmPowerState::PoweredOff,
                    devices,
                    ..Default::default()
                },
            );
            Some(reference_value(&id))
        }))
    }

    async fn clone_vm_task(
        &self,
        vm: &ManagedObjectReference,
        folder: &ManagedObjectReference,
        name: &str,
        spec: &VirtualMachineCloneSpec,
    ) -> VmwareResult<ManagedObjectReference> {
        let source = self.with_vm(vm, |v| v.clone())?;
        let call = Call::CloneVm {
            vm: vm.clone(),
            folder: folder.clone(),
            name: name.to_string(),
            spec: spec.clone(),
        };
        let name = name.to_string();
        Ok(self.submit(call, move |st| {
            let id = new_vm_id(st);
            st.vms.insert(
                id.clone(),
                FakeVm {
                    name,
                    power_state: VmPowerState::PoweredOff,
                    devices: source.devices,
                    ..Default::default()
                },
            );
            Some(reference_value(&id))
        }))
    }

    async fn reconfigure_vm_task(
        &self,
        vm: &ManagedObjectReference,
        spec: &VirtualMachineConfigSpec,
    ) -> VmwareResult<ManagedObjectReference> {
        self.with_vm(vm, |_| ())?;
        let id = vm.value.clone();
        let added: Vec<VirtualDevice> =
            spec.device_change.iter().map(|c| c.device.clone()).collect();
        Ok(self.submit(Call::Reconfigure { vm: vm.clone(), spec: spec.clone() }, move |st| {
            if let Some(v) = st.vms.get_mut(&id) {
                v.devices.extend(added);
            }
            None
        }))
    }

    async fn power_on_vm_task(
        &self,
        vm: &ManagedObjectReference,
    ) -> VmwareResult<ManagedObjectReference> {
        self.with_vm(vm, |_| ())?;
        let id = vm.value.clone();
        Ok(self.submit(Call::PowerOn(vm.clone()), move |st| {
            if let Some(v) = st.vms.get_mut(&id) {
                v.power_state = VmPowerState::PoweredOn;
            }
            None
        }))
    }

    async fn power_off_vm_task(
        &self,
        vm: &ManagedObjectReference,
    ) -> VmwareResult<ManagedObjectReference> {
        self.with_vm(vm, |_| ())?;
        let id = vm.value.clone();
        Ok(self.submit(Call::PowerOff(vm.clone()), move |st| {
            if let Some(v) = st.vms.get_mut(&id) {
                v.power_state = VmPowerState::PoweredOff;
            }
            None
        }))
    }

    async fn create_snapshot_task(
        &self,
        vm: &ManagedObjectReference,
        name: &str,
        _description: &str,
        memory: bool,
        quiesce: bool,
    ) -> VmwareResult<ManagedObjectReference> {
        self.with_vm(vm, |_| ())?;
        let id = vm.value.clone();
        let call = Call::CreateSnapshot { vm: vm.clone(), name: name.to_string(), memory, quiesce };
        Ok(self.submit(call, move |st| {
            st.next_id += 1;
            let snap = ManagedObjectReference::new(
                "VirtualMachineSnapshot",
                format!("snapshot-{}", st.next_id),
            );
            if let Some(v) = st.vms.get_mut(&id) {
                v.snapshot = Some(snap.clone());
            }
            Some(serde_json::to_value(&snap).unwrap())
        }))
    }

    async fn destroy_task(
        &self,
        vm: &ManagedObjectReference,
    ) -> VmwareResult<ManagedObjectReference> {
        self.with_vm(vm, |_| ())?;
        let id = vm.value.clone();
        Ok(self.submit(Call::Destroy(vm.clone()), move |st| {
            st.vms.remove(&id);
            None
        }))
    }

    async fn shutdown_guest(&self, vm: &ManagedObjectReference) -> VmwareResult<()> {
        self.immediate(Call::ShutdownGuest(vm.clone()))?;
        self.with_vm(vm, |v| {
            if v.honours_shutdown {
                v.power_state = VmPowerState::PoweredOff;
            }
        })
    }

    async fn mark_as_template(&self, vm: &ManagedObjectReference) -> VmwareResult<()> {
        self.immediate(Call::MarkAsTemplate(vm.clone()))?;
        self.with_vm(vm, |v| v.template = true)
    }

    async fn task_info(&self, task: &ManagedObjectReference) -> VmwareResult<TaskInfo> {
        let mut st = self.lock();
        st.task_polls += 1;
        let entry = st
            .tasks
            .get_mut(&task.value)
            .ok_or_else(|| VmwareError::not_found(format!("Resource not found: {task}")))?;

        if entry.remaining_polls > 0 {
            entry.remaining_polls -= 1;
            return Ok(TaskInfo {
                key: Some(task.value.clone()),
                state: TaskInfoState::Running,
                result: None,
                error: None,
                description_id: None,
            });
        }

        Ok(match &entry.outcome {
            Ok(result) => TaskInfo {
                key: Some(task.value.clone()),
                state: TaskInfoState::Success,
                result: result.clone(),
                error: None,
                description_id: None,
            },
            Err((fault, message)) => TaskInfo {
                key: Some(task.value.clone()),
                state: TaskInfoState::Error,
                result: None,
                error: Some(LocalizedMethodFault {
                    fault: Some(json!({"_typeName": fault})),
                    localized_message: Some(message.to_string()),
                }),
                description_id: None,
            },
        })
    }

    async fn power_state(&self, vm: &ManagedObjectReference) -> VmwareResult<VmPowerState> {
        self.with_vm(vm, |v| v.power_state)
    }

    async fn vm_info(&self, vm: &ManagedObjectReference) -> VmwareResult<VmInfo> {
        self.with_vm(vm, |v| VmInfo {
            name: v.name.clone(),
            power_state: v.power_state,
            template: v.template,
            ip_address: v.ip.clone(),
            ..Default::default()
        })
    }

    async fn devices(&self, vm: &ManagedObjectReference) -> VmwareResult<Vec<VirtualDevice>> {
        self.with_vm(vm, |v| v.devices.clone())
    }

    async fn snapshot_info(
        &self,
        vm: &ManagedObjectReference,
    ) -> VmwareResult<Option<VirtualMachineSnapshotInfo>> {
        self.with_vm(vm, |v| {
            v.snapshot.clone().map(|s| VirtualMachineSnapshotInfo {
                current_snapshot: Some(s),
                root_snapshot_list: Vec::new(),
            })
        })
    }

    async fn guest_ip_address(&self, vm: &ManagedObjectReference) -> VmwareResult<Option<String>> {
        self.with_vm(vm, |v| {
            if v.ip_after_polls > 0 {
                v.ip_after_polls -= 1;
                None
            } else {
                v.ip.clone()
            }
        })
    }
}

// ── Inventory fixtures ──────────────────────────────────────────────

pub(crate) fn folder_ref() -> FolderRef {
    FolderRef { reference: ManagedObjectReference::new("Folder", "group-v3"), name: "vm".into() }
}

pub(crate) fn pool_ref() -> PoolRef {
    PoolRef {
        reference: ManagedObjectReference::new("ResourcePool", "resgroup-9"),
        name: "Resources".into(),
    }
}

pub(crate) fn host_ref() -> HostRef {
    HostRef {
        reference: ManagedObjectReference::new("HostSystem", "host-12"),
        name: "esx1.lab.local".into(),
    }
}

pub(crate) fn datastore_ref() -> DatastoreRef {
    DatastoreRef {
        reference: ManagedObjectReference::new("Datastore", "datastore-11"),
        name: "ds1".into(),
    }
}

pub(crate) fn network_ref() -> NetworkRef {
    NetworkRef {
        reference: ManagedObjectReference::new("Network", "network-13"),
        name: "VM Network".into(),
        kind: NetworkKind::Standard,
    }
}

/// Inventory where every lookup succeeds and only `existing_files` exist.
pub(crate) fn standard_inventory(existing_files: &[&str]) -> MockInventory {
    let files: Vec<String> = existing_files.iter().map(|f| f.to_string()).collect();
    let mut inv = MockInventory::new();
    inv.expect_resolve_folder().returning(|_| Ok(folder_ref()));
    inv.expect_resolve_host().returning(|_| Ok(host_ref()));
    inv.expect_resolve_resource_pool().returning(|_, _| Ok(pool_ref()));
    inv.expect_resolve_datastore_or_default().returning(|_| Ok(datastore_ref()));
    inv.expect_resolve_network_or_default().returning(|_| Ok(network_ref()));
    inv.expect_file_exists()
        .returning(move |_, path| Ok(files.iter().any(|f| f == path)));
    inv
}

pub(crate) fn fast_options() -> WaitOptions {
    WaitOptions {
        task_poll_interval: Duration::from_millis(5),
        shutdown_poll_interval: Duration::from_millis(20),
        ip_poll_interval: Duration::from_millis(10),
    }
}

pub(crate) fn fake_context_with(fake: &FakeVim, inventory: MockInventory) -> ConnectionContext {
    ConnectionContext::new(Arc::new(fake.clone()), Arc::new(inventory)).with_options(fast_options())
}

pub(crate) fn fake_context(fake: &FakeVim) -> ConnectionContext {
    fake_context_with(fake, standard_inventory(&[]))
}
