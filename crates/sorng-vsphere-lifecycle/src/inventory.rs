//! Inventory lookup collaborator.
//!
//! Resolves names to managed object references. The engine only consumes
//! this trait; `VsphereClient` provides the HTTP-backed implementation.

use crate::error::VmwareResult;
use crate::types::ManagedObjectReference;

use async_trait::async_trait;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderRef {
    pub reference: ManagedObjectReference,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostRef {
    pub reference: ManagedObjectReference,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolRef {
    pub reference: ManagedObjectReference,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatastoreRef {
    pub reference: ManagedObjectReference,
    pub name: String,
}

impl DatastoreRef {
    /// Datastore path notation: `[name] relative/path`.
    pub fn path(&self, relative: &str) -> String {
        format!("[{}] {}", self.name, relative)
    }
}

/// How a VM network adapter connects to a network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkKind {
    /// Standard vSwitch port group, addressed by name.
    Standard,
    /// Distributed port group.
    Distributed { switch_uuid: String, portgroup_key: String },
    /// NSX opaque network.
    Opaque { network_id: String, network_type: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkRef {
    pub reference: ManagedObjectReference,
    pub name: String,
    pub kind: NetworkKind,
}

/// Name → reference lookups. Every method reports `NotFound` for missing objects.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Inventory: Send + Sync {
    async fn find_vm(&self, name: &str) -> VmwareResult<ManagedObjectReference>;

    /// Empty name resolves to the datacenter's VM root folder.
    async fn resolve_folder(&self, name: &str) -> VmwareResult<FolderRef>;

    async fn resolve_host(&self, name: &str) -> VmwareResult<HostRef>;

    /// Pool `name` under `host`; empty pool name resolves to the root pool.
    async fn resolve_resource_pool(&self, host: &str, name: &str) -> VmwareResult<PoolRef>;

    /// Empty name resolves to the only datastore, if there is exactly one.
    async fn resolve_datastore_or_default(&self, name: &str) -> VmwareResult<DatastoreRef>;

    /// Empty name resolves to the only network, if there is exactly one.
    async fn resolve_network_or_default(&self, name: &str) -> VmwareResult<NetworkRef>;

    async fn file_exists(&self, datastore: &DatastoreRef, path: &str) -> VmwareResult<bool>;
}
