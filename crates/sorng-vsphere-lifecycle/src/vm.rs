//! VM handle and lifecycle operations.
//!
//! A [`VirtualMachine`] is a managed object reference bound to the context it
//! was obtained from. It caches nothing: every query goes to the endpoint.
//! Mutations are submitted as tasks and awaited through [`TaskExecutor`].

use crate::compile::{compile_create, compile_hardware};
use crate::config::{CloneConfig, CreateConfig, HardwareConfig};
use crate::context::ConnectionContext;
use crate::devices::{insert_optical_media, DeviceList};
use crate::error::{VmwareError, VmwareErrorKind, VmwareResult};
use crate::task::TaskExecutor;
use crate::types::*;

use std::time::Duration;
use tokio::time::Instant;

/// Handle to one remote VM.
#[derive(Debug, Clone)]
pub struct VirtualMachine {
    reference: ManagedObjectReference,
    ctx: ConnectionContext,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Lookup / Create
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Resolve a VM by name.
pub async fn find_vm(ctx: &ConnectionContext, name: &str) -> VmwareResult<VirtualMachine> {
    let reference = ctx.guard("FindVM", ctx.inventory().find_vm(name)).await?;
    Ok(VirtualMachine::new(ctx, reference))
}

/// Create a VM with one optical controller, one disk and one network adapter.
///
/// All lookups and composition happen before anything is submitted, so a
/// failure up to that point leaves the endpoint untouched. A cancelled
/// context stops before the next lookup.
pub async fn create_vm(
    ctx: &ConnectionContext,
    config: &CreateConfig,
) -> VmwareResult<VirtualMachine> {
    const OP: &str = "CreateVM";
    config.hardware.validate()?;
    let mut spec = compile_create(config);

    let inventory = ctx.inventory();
    let folder = ctx.guard(OP, inventory.resolve_folder(&config.folder)).await?;
    let pool = ctx
        .guard(OP, inventory.resolve_resource_pool(&config.host, &config.resource_pool))
        .await?;
    let host = if config.host.is_empty() {
        None
    } else {
        Some(ctx.guard(OP, inventory.resolve_host(&config.host)).await?)
    };
    let datastore = ctx
        .guard(OP, inventory.resolve_datastore_or_default(&config.datastore))
        .await?;

    if !config.force {
        let vmx = config.vmx_path();
        if ctx.guard(OP, inventory.file_exists(&datastore, &vmx)).await? {
            return Err(VmwareError::already_exists(format!(
                "File '{}' already exists",
                datastore.path(&vmx)
            )));
        }
    }

    let mut devices = DeviceList::new();
    devices.add_optical_controller()?;
    let controller = devices.add_disk_controller(&config.disk.controller_type)?;
    devices.add_disk(&controller, config.disk.disk_size_kb, config.disk.thin_provisioned)?;
    let network = ctx
        .guard(OP, inventory.resolve_network_or_default(&config.network))
        .await?;
    devices.add_network_adapter(&network, &config.network_card)?;

    spec.device_change = devices.to_change_set();
    spec.files = Some(VirtualMachineFileInfo {
        vm_path_name: Some(format!("[{}]", datastore.name)),
    });

    log::info!(
        "Creating VM '{}' in folder '{}' on datastore '{}'",
        config.name,
        folder.name,
        datastore.name
    );
    let reference = TaskExecutor::new(ctx)
        .execute_for_reference(
            "CreateVM_Task",
            ctx.api().create_vm_task(
                &folder.reference,
                &spec,
                &pool.reference,
                host.as_ref().map(|h| &h.reference),
            ),
        )
        .await?;

    Ok(VirtualMachine::new(ctx, reference))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Handle
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

impl VirtualMachine {
    pub fn new(ctx: &ConnectionContext, reference: ManagedObjectReference) -> Self {
        Self { reference, ctx: ctx.clone() }
    }

    pub fn reference(&self) -> &ManagedObjectReference {
        &self.reference
    }

    pub fn context(&self) -> &ConnectionContext {
        &self.ctx
    }

    fn executor(&self) -> TaskExecutor<'_> {
        TaskExecutor::new(&self.ctx)
    }

    // ── Queries ─────────────────────────────────────────────────────

    pub async fn info(&self) -> VmwareResult<VmInfo> {
        self.ctx.guard("Info", self.ctx.api().vm_info(&self.reference)).await
    }

    pub async fn power_state(&self) -> VmwareResult<VmPowerState> {
        self.ctx
            .guard("PowerState", self.ctx.api().power_state(&self.reference))
            .await
    }

    // ── Clone / Destroy ─────────────────────────────────────────────

    /// Clone this VM. The clone is left powered off.
    ///
    /// A linked clone backs its disks with child deltas of this VM's current
    /// snapshot and is refused before submission when there is none.
    pub async fn clone_vm(&self, config: &CloneConfig) -> VmwareResult<VirtualMachine> {
        const OP: &str = "CloneVM";
        let ctx = &self.ctx;
        let inventory = ctx.inventory();
        let folder = ctx.guard(OP, inventory.resolve_folder(&config.folder)).await?;
        let pool = ctx
            .guard(OP, inventory.resolve_resource_pool(&config.host, &config.resource_pool))
            .await?;
        let host = if config.host.is_empty() {
            None
        } else {
            Some(ctx.guard(OP, inventory.resolve_host(&config.host)).await?)
        };
        let datastore = ctx
            .guard(OP, inventory.resolve_datastore_or_default(&config.datastore))
            .await?;

        let mut spec = VirtualMachineCloneSpec {
            location: VirtualMachineRelocateSpec {
                datastore: Some(datastore.reference),
                pool: Some(pool.reference),
                host: host.map(|h| h.reference),
                disk_move_type: None,
            },
            template: false,
            power_on: false,
            snapshot: None,
        };

        if config.linked_clone {
            let snapshot = self.current_snapshot().await?.ok_or_else(|| {
                VmwareError::new(
                    VmwareErrorKind::NoSnapshotForLinkedClone,
                    "`linked_clone=true`, but template has no snapshots",
                )
            })?;
            spec.location.disk_move_type = Some(DISK_MOVE_CREATE_NEW_CHILD.into());
            spec.snapshot = Some(snapshot);
        }

        log::info!(
            "Cloning {} to '{}' (linked: {})",
            self.reference,
            config.name,
            config.linked_clone
        );
        let reference = self
            .executor()
            .execute_for_reference(
                "CloneVM_Task",
                self.ctx
                    .api()
                    .clone_vm_task(&self.reference, &folder.reference, &config.name, &spec),
            )
            .await?;

        Ok(VirtualMachine::new(&self.ctx, reference))
    }

    /// Destroy the VM and its backing files.
    pub async fn destroy(&self) -> VmwareResult<()> {
        self.executor()
            .execute("Destroy_Task", self.ctx.api().destroy_task(&self.reference))
            .await?;
        Ok(())
    }

    // ── Reconfiguration ─────────────────────────────────────────────

    /// Apply a hardware allocation to the existing VM.
    pub async fn configure(&self, config: &HardwareConfig) -> VmwareResult<()> {
        config.validate()?;
        let spec = compile_hardware(config);
        self.reconfigure(&spec).await
    }

    /// Attach `iso_path` (e.g. `[ds1] iso/boot.iso`) as a new cdrom on the
    /// first IDE controller with a free unit.
    pub async fn add_cdrom(&self, iso_path: &str) -> VmwareResult<()> {
        let live = self
            .ctx
            .guard("AddCdrom", self.ctx.api().devices(&self.reference))
            .await?;
        let spec = VirtualMachineConfigSpec {
            device_change: insert_optical_media(&live, iso_path)?,
            ..Default::default()
        };
        self.reconfigure(&spec).await
    }

    async fn reconfigure(&self, spec: &VirtualMachineConfigSpec) -> VmwareResult<()> {
        self.executor()
            .execute(
                "ReconfigVM_Task",
                self.ctx.api().reconfigure_vm_task(&self.reference, spec),
            )
            .await?;
        Ok(())
    }

    /// Mark the VM as a template.
    pub async fn convert_to_template(&self) -> VmwareResult<()> {
        self.ctx
            .guard("MarkAsTemplate", self.ctx.api().mark_as_template(&self.reference))
            .await?;
        log::info!("{} marked as template", self.reference);
        Ok(())
    }

    // ── Power operations ────────────────────────────────────────────

    pub async fn power_on(&self) -> VmwareResult<()> {
        self.executor()
            .execute("PowerOnVM_Task", self.ctx.api().power_on_vm_task(&self.reference))
            .await?;
        Ok(())
    }

    /// Hard power-off. A VM that is already off is left alone.
    pub async fn power_off(&self) -> VmwareResult<()> {
        if self.power_state().await? == VmPowerState::PoweredOff {
            log::debug!("{} is already powered off", self.reference);
            return Ok(());
        }
        self.executor()
            .execute("PowerOffVM_Task", self.ctx.api().power_off_vm_task(&self.reference))
            .await?;
        Ok(())
    }

    /// Ask the guest to shut down. Does not wait.
    pub async fn start_shutdown(&self) -> VmwareResult<()> {
        self.ctx
            .guard("ShutdownGuest", self.ctx.api().shutdown_guest(&self.reference))
            .await?;
        log::info!("Guest shutdown requested for {}", self.reference);
        Ok(())
    }

    // ── Waits ───────────────────────────────────────────────────────

    /// Poll until the VM reports `poweredOff`.
    pub async fn wait_for_shutdown(&self, timeout: Duration) -> VmwareResult<()> {
        let deadline = Instant::now() + timeout;
        let interval = self.ctx.options().shutdown_poll_interval;

        loop {
            if self.power_state().await? == VmPowerState::PoweredOff {
                log::info!("{} is powered off", self.reference);
                return Ok(());
            }
            self.pause_until("WaitForShutdown", deadline, interval).await.map_err(|e| {
                if e.kind == VmwareErrorKind::Timeout {
                    VmwareError::timeout(format!(
                        "Timeout while waiting for {} to shut down",
                        self.reference
                    ))
                } else {
                    e
                }
            })?;
        }
    }

    /// Poll until the guest reports an IP address and return it.
    pub async fn wait_for_ip(&self, timeout: Duration) -> VmwareResult<String> {
        let deadline = Instant::now() + timeout;
        let interval = self.ctx.options().ip_poll_interval;

        loop {
            let ip = self
                .ctx
                .guard("WaitForIP", self.ctx.api().guest_ip_address(&self.reference))
                .await?;
            if let Some(ip) = ip.filter(|ip| !ip.is_empty()) {
                log::info!("{} reports IP {ip}", self.reference);
                return Ok(ip);
            }
            self.pause_until("WaitForIP", deadline, interval).await.map_err(|e| {
                if e.kind == VmwareErrorKind::Timeout {
                    VmwareError::timeout(format!(
                        "Timeout while waiting for {} to report an IP address",
                        self.reference
                    ))
                } else {
                    e
                }
            })?;
        }
    }

    /// Sleep for `interval` but never past `deadline`. Errors with `Timeout`
    /// once the deadline has passed.
    async fn pause_until(
        &self,
        operation: &str,
        deadline: Instant,
        interval: Duration,
    ) -> VmwareResult<()> {
        let now = Instant::now();
        if now >= deadline {
            return Err(VmwareError::timeout(format!("{operation} timed out")));
        }
        let nap = interval.min(deadline - now);
        tokio::select! {
            biased;
            _ = self.ctx.cancellation().cancelled() => Err(VmwareError::cancelled(operation)),
            _ = tokio::time::sleep(nap) => Ok(()),
        }
    }
}
