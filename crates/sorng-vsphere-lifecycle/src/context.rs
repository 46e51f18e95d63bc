//! Connection context threaded explicitly through every operation.

use crate::api::VimApi;
use crate::error::{VmwareError, VmwareResult};
use crate::inventory::Inventory;
use crate::types::VsphereConfig;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Polling cadence for the waits the engine performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    pub task_poll_interval: Duration,
    pub shutdown_poll_interval: Duration,
    pub ip_poll_interval: Duration,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            task_poll_interval: Duration::from_millis(500),
            shutdown_poll_interval: Duration::from_secs(1),
            ip_poll_interval: Duration::from_secs(5),
        }
    }
}

impl From<&VsphereConfig> for WaitOptions {
    fn from(config: &VsphereConfig) -> Self {
        Self {
            task_poll_interval: Duration::from_millis(config.task_poll_interval_ms.max(1)),
            shutdown_poll_interval: Duration::from_secs(config.shutdown_poll_interval_secs.max(1)),
            ip_poll_interval: Duration::from_secs(config.ip_poll_interval_secs.max(1)),
        }
    }
}

/// Shared, read-only handle to one endpoint: remote API, inventory,
/// cancellation and wait cadence. Cheap to clone.
#[derive(Clone)]
pub struct ConnectionContext {
    api: Arc<dyn VimApi>,
    inventory: Arc<dyn Inventory>,
    cancel: CancellationToken,
    options: WaitOptions,
}

impl ConnectionContext {
    pub fn new(api: Arc<dyn VimApi>, inventory: Arc<dyn Inventory>) -> Self {
        Self {
            api,
            inventory,
            cancel: CancellationToken::new(),
            options: WaitOptions::default(),
        }
    }

    pub fn with_options(mut self, options: WaitOptions) -> Self {
        self.options = options;
        self
    }

    /// Derive a context whose cancellation also fires when `self` is cancelled.
    pub fn child(&self) -> Self {
        Self {
            cancel: self.cancel.child_token(),
            ..self.clone()
        }
    }

    pub fn api(&self) -> &dyn VimApi {
        self.api.as_ref()
    }

    pub fn inventory(&self) -> &dyn Inventory {
        self.inventory.as_ref()
    }

    pub fn options(&self) -> WaitOptions {
        self.options
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Abort every in-flight wait that uses this context (and its children).
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Run `fut` unless the context is cancelled first. An already
    /// cancelled context never polls `fut`.
    pub async fn guard<T, F>(&self, operation: &str, fut: F) -> VmwareResult<T>
    where
        F: Future<Output = VmwareResult<T>>,
    {
        if self.is_cancelled() {
            return Err(VmwareError::cancelled(operation));
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(VmwareError::cancelled(operation)),
            result = fut => result,
        }
    }
}

impl std::fmt::Debug for ConnectionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionContext")
            .field("options", &self.options)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}
