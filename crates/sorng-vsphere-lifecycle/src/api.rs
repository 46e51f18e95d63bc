//! Remote call contract for VM operations.
//!
//! Mutating calls return the reference of the server-side task they started;
//! waiting for it is the job of [`crate::task::TaskExecutor`]. Property reads
//! always go to the endpoint.

use crate::error::VmwareResult;
use crate::types::*;

use async_trait::async_trait;

#[async_trait]
pub trait VimApi: Send + Sync {
    // ── Task-based operations ───────────────────────────────────────

    /// `Folder.CreateVM_Task`
    async fn create_vm_task(
        &self,
        folder: &ManagedObjectReference,
        spec: &VirtualMachineConfigSpec,
        pool: &ManagedObjectReference,
        host: Option<&ManagedObjectReference>,
    ) -> VmwareResult<ManagedObjectReference>;

    /// `VirtualMachine.CloneVM_Task`
    async fn clone_vm_task(
        &self,
        vm: &ManagedObjectReference,
        folder: &ManagedObjectReference,
        name: &str,
        spec: &VirtualMachineCloneSpec,
    ) -> VmwareResult<ManagedObjectReference>;

    /// `VirtualMachine.ReconfigVM_Task`
    async fn reconfigure_vm_task(
        &self,
        vm: &ManagedObjectReference,
        spec: &VirtualMachineConfigSpec,
    ) -> VmwareResult<ManagedObjectReference>;

    async fn power_on_vm_task(
        &self,
        vm: &ManagedObjectReference,
    ) -> VmwareResult<ManagedObjectReference>;

    async fn power_off_vm_task(
        &self,
        vm: &ManagedObjectReference,
    ) -> VmwareResult<ManagedObjectReference>;

    /// `VirtualMachine.CreateSnapshot_Task`
    async fn create_snapshot_task(
        &self,
        vm: &ManagedObjectReference,
        name: &str,
        description: &str,
        memory: bool,
        quiesce: bool,
    ) -> VmwareResult<ManagedObjectReference>;

    async fn destroy_task(
        &self,
        vm: &ManagedObjectReference,
    ) -> VmwareResult<ManagedObjectReference>;

    // ── Immediate operations ────────────────────────────────────────

    /// Ask the guest OS to shut down (requires VMware Tools). Returns once accepted.
    async fn shutdown_guest(&self, vm: &ManagedObjectReference) -> VmwareResult<()>;

    async fn mark_as_template(&self, vm: &ManagedObjectReference) -> VmwareResult<()>;

    // ── Property reads ──────────────────────────────────────────────

    async fn task_info(&self, task: &ManagedObjectReference) -> VmwareResult<TaskInfo>;

    async fn power_state(&self, vm: &ManagedObjectReference) -> VmwareResult<VmPowerState>;

    async fn vm_info(&self, vm: &ManagedObjectReference) -> VmwareResult<VmInfo>;

    /// Current hardware device list.
    async fn devices(&self, vm: &ManagedObjectReference) -> VmwareResult<Vec<VirtualDevice>>;

    /// `None` when the VM has no snapshots.
    async fn snapshot_info(
        &self,
        vm: &ManagedObjectReference,
    ) -> VmwareResult<Option<VirtualMachineSnapshotInfo>>;

    /// Primary guest IP address as reported by VMware Tools.
    async fn guest_ip_address(&self, vm: &ManagedObjectReference) -> VmwareResult<Option<String>>;
}
