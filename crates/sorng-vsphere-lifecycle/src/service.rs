//! Aggregate service façade.
//!
//! `VmwareService` owns the connection to one endpoint and hands out the
//! [`ConnectionContext`] every lifecycle operation runs against. Shared
//! callers hold `VmwareServiceState = Arc<Mutex<VmwareService>>`.

use crate::config::CreateConfig;
use crate::context::{ConnectionContext, WaitOptions};
use crate::error::{VmwareError, VmwareResult};
use crate::types::VsphereConfig;
use crate::vm::{self, VirtualMachine};
use crate::vsphere::VsphereClient;

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Thread-safe service handle.
pub type VmwareServiceState = Arc<Mutex<VmwareService>>;

/// Connection profile without the password.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VsphereConfigSafe {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub insecure: bool,
    pub datacenter: String,
}

struct Connection {
    client: Option<Arc<VsphereClient>>,
    ctx: ConnectionContext,
}

/// Top-level service for one vSphere endpoint.
#[derive(Default)]
pub struct VmwareService {
    connection: Option<Connection>,
    config: Option<VsphereConfig>,
}

impl VmwareService {
    /// Create a new (disconnected) service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Service bound to an already-built context (alternative backends, tests).
    pub fn with_context(ctx: ConnectionContext) -> Self {
        Self {
            connection: Some(Connection { client: None, ctx }),
            config: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Context for running lifecycle operations against the endpoint.
    pub fn context(&self) -> VmwareResult<ConnectionContext> {
        self.connection
            .as_ref()
            .map(|c| c.ctx.clone())
            .ok_or_else(|| VmwareError::connection("Not connected to vSphere. Call connect first."))
    }

    // ── Connection ──────────────────────────────────────────────────

    /// Connect to a vCenter / ESXi host, replacing any previous connection.
    pub async fn connect(&mut self, config: VsphereConfig) -> VmwareResult<()> {
        self.disconnect().await?;

        let mut client = VsphereClient::new(&config)?;
        client.login().await?;
        let client = Arc::new(client);
        let ctx = ConnectionContext::new(client.clone(), client.clone())
            .with_options(WaitOptions::from(&config));

        self.connection = Some(Connection { client: Some(client), ctx });
        self.config = Some(config);
        Ok(())
    }

    /// Cancel in-flight waits and close the sessions.
    pub async fn disconnect(&mut self) -> VmwareResult<()> {
        if let Some(connection) = self.connection.take() {
            connection.ctx.cancel();
            if let Some(client) = connection.client {
                let _ = client.logout().await;
            }
        }
        self.config = None;
        Ok(())
    }

    /// Check if the REST session is still valid.
    pub async fn check_session(&self) -> VmwareResult<bool> {
        match self.connection.as_ref().and_then(|c| c.client.as_ref()) {
            Some(client) => client.check_session().await,
            None => Ok(self.is_connected()),
        }
    }

    /// Get current config (without password).
    pub fn get_config(&self) -> Option<VsphereConfigSafe> {
        self.config.as_ref().map(|c| VsphereConfigSafe {
            host: c.host.clone(),
            port: c.port,
            username: c.username.clone(),
            insecure: c.insecure,
            datacenter: c.datacenter.clone(),
        })
    }

    // ── VM operations ───────────────────────────────────────────────

    pub async fn find_vm(&self, name: &str) -> VmwareResult<VirtualMachine> {
        let ctx = self.context()?;
        vm::find_vm(&ctx, name).await
    }

    pub async fn create_vm(&self, config: &CreateConfig) -> VmwareResult<VirtualMachine> {
        let ctx = self.context()?;
        vm::create_vm(&ctx, config).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VmwareErrorKind;
    use crate::inventory::MockInventory;
    use crate::testing::*;
    use crate::types::{ManagedObjectReference, VmPowerState};
    use std::time::Duration;

    #[tokio::test]
    async fn disconnected_service_refuses_operations() {
        let svc = VmwareService::new();
        assert!(!svc.is_connected());
        assert!(svc.get_config().is_none());
        assert!(!svc.check_session().await.unwrap());

        let err = svc.find_vm("web01").await.unwrap_err();
        assert_eq!(err.kind, VmwareErrorKind::ConnectionError);
        let err = svc.create_vm(&CreateConfig::default()).await.unwrap_err();
        assert_eq!(err.kind, VmwareErrorKind::ConnectionError);
    }

    #[tokio::test]
    async fn find_vm_returns_handle_bound_to_service_context() {
        let fake = FakeVim::new();
        let id = fake.add_vm("vm-7", FakeVm { name: "web01".into(), ..Default::default() });
        let mut inv = MockInventory::new();
        let found = id.clone();
        inv.expect_find_vm().returning(move |_| Ok(found.clone()));
        let svc = VmwareService::with_context(fake_context_with(&fake, inv));

        let vm = svc.find_vm("web01").await.unwrap();
        assert_eq!(vm.reference(), &id);
        assert_eq!(vm.info().await.unwrap().name, "web01");
    }

    #[tokio::test]
    async fn create_vm_runs_through_service() {
        let fake = FakeVim::new();
        let svc = VmwareService::with_context(fake_context(&fake));
        let config = CreateConfig {
            name: "db01".into(),
            disk: crate::config::DiskConfig { disk_size_kb: 1024 * 1024, ..Default::default() },
            ..Default::default()
        };

        let vm = svc.create_vm(&config).await.unwrap();
        assert_eq!(vm.info().await.unwrap().name, "db01");
        assert_eq!(fake.calls().len(), 1);
    }

    #[tokio::test]
    async fn disconnect_cancels_in_flight_waits() {
        let fake = FakeVim::new();
        fake.add_vm("vm-1", FakeVm { power_state: VmPowerState::PoweredOn, ..Default::default() });
        let svc: VmwareServiceState =
            Arc::new(Mutex::new(VmwareService::with_context(fake_context(&fake))));

        let ctx = svc.lock().await.context().unwrap();
        let vm = VirtualMachine::new(&ctx, ManagedObjectReference::virtual_machine("vm-1"));
        let waiter =
            tokio::spawn(async move { vm.wait_for_shutdown(Duration::from_secs(30)).await });

        tokio::time::sleep(Duration::from_millis(50)).await;
        svc.lock().await.disconnect().await.unwrap();

        let err = tokio::time::timeout(Duration::from_secs(2), waiter)
            .await
            .expect("wait must abort promptly")
            .unwrap()
            .unwrap_err();
        assert_eq!(err.kind, VmwareErrorKind::Cancelled);
        assert!(!svc.lock().await.is_connected());
    }
}
