//! VM snapshot operations.

use crate::error::VmwareResult;
use crate::task::TaskExecutor;
use crate::types::ManagedObjectReference;
use crate::vm::VirtualMachine;

impl VirtualMachine {
    /// Take a disk-only snapshot (no memory, no guest quiescing) and make it
    /// the current one. Returns the new snapshot's reference.
    pub async fn create_snapshot(&self, name: &str) -> VmwareResult<ManagedObjectReference> {
        let ctx = self.context();
        let snapshot = TaskExecutor::new(ctx)
            .execute_for_reference(
                "CreateSnapshot_Task",
                ctx.api().create_snapshot_task(self.reference(), name, "", false, false),
            )
            .await?;
        log::info!("Created snapshot '{name}' ({snapshot}) of {}", self.reference());
        Ok(snapshot)
    }

    /// The VM's current snapshot, if it has any.
    pub async fn current_snapshot(&self) -> VmwareResult<Option<ManagedObjectReference>> {
        let ctx = self.context();
        let info = ctx
            .guard("CurrentSnapshot", ctx.api().snapshot_info(self.reference()))
            .await?;
        Ok(info.and_then(|i| i.current_snapshot))
    }
}
