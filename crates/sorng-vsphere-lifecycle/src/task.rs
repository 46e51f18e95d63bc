//! Long-running task execution.
//!
//! Every mutating remote call goes through [`TaskExecutor::execute`]: submit,
//! poll the task until it is terminal, translate the outcome. Failures are
//! surfaced as-is; nothing is retried.

use crate::context::ConnectionContext;
use crate::error::{VmwareError, VmwareResult};
use crate::types::{ManagedObjectReference, TaskInfoState};

use std::future::Future;

/// Drives submitted tasks to completion on behalf of one context.
pub struct TaskExecutor<'a> {
    ctx: &'a ConnectionContext,
}

impl<'a> TaskExecutor<'a> {
    pub fn new(ctx: &'a ConnectionContext) -> Self {
        Self { ctx }
    }

    /// Submit and wait. Returns the task's result payload, if any.
    pub async fn execute<F>(
        &self,
        operation: &str,
        submit: F,
    ) -> VmwareResult<Option<serde_json::Value>>
    where
        F: Future<Output = VmwareResult<ManagedObjectReference>>,
    {
        let task = self.ctx.guard(operation, submit).await?;
        log::debug!("{operation} submitted as {task}");

        self.wait(operation, &task).await
    }

    /// Like [`execute`](Self::execute), for tasks whose result is a managed
    /// object (`CreateVM_Task`, `CloneVM_Task`).
    pub async fn execute_for_reference<F>(
        &self,
        operation: &str,
        submit: F,
    ) -> VmwareResult<ManagedObjectReference>
    where
        F: Future<Output = VmwareResult<ManagedObjectReference>>,
    {
        let result = self.execute(operation, submit).await?;
        let value = result.ok_or_else(|| {
            VmwareError::parse(format!("{operation} succeeded without a result reference"))
        })?;
        serde_json::from_value(value).map_err(|e| {
            VmwareError::parse(format!("{operation} returned an unexpected result: {e}"))
        })
    }

    /// Poll `task` until it succeeds or fails.
    pub async fn wait(
        &self,
        operation: &str,
        task: &ManagedObjectReference,
    ) -> VmwareResult<Option<serde_json::Value>> {
        let cancel = self.ctx.cancellation();
        let interval = self.ctx.options().task_poll_interval;

        loop {
            let info = self.ctx.guard(operation, self.ctx.api().task_info(task)).await?;

            match info.state {
                TaskInfoState::Success => {
                    log::info!("{operation} ({task}) completed");
                    return Ok(info.result);
                }
                TaskInfoState::Error => {
                    let fault = info.error.unwrap_or_default();
                    let message = fault
                        .localized_message
                        .clone()
                        .unwrap_or_else(|| format!("{operation} failed without a fault message"));
                    log::warn!("{operation} ({task}) failed: {message}");
                    return Err(VmwareError::task(fault.fault_type(), message));
                }
                TaskInfoState::Queued | TaskInfoState::Running => {}
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(VmwareError::cancelled(operation)),
                _ = tokio::time::sleep(interval) => {}
            }
        }
    }
}
