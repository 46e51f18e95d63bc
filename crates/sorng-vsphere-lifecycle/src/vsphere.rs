//! vSphere HTTP client with session-based authentication.
//!
//! Two API surfaces are used:
//! - the Automation REST API (`https://{host}/api/...`) for name lookups;
//! - the VI JSON API (`https://{host}/sdk/vim25/{release}/...`) for managed
//!   object methods, tasks and property reads.
//!
//! Each surface has its own session; [`VsphereClient::login`] opens both.

use crate::api::VimApi;
use crate::error::{VmwareError, VmwareErrorKind, VmwareResult};
use crate::inventory::*;
use crate::types::*;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

const SESSION_HEADER: &str = "vmware-api-session-id";
const ROOT_POOL_NAME: &str = "Resources";
const ROOT_VM_FOLDER_NAME: &str = "vm";
const STANDALONE_DATACENTER: &str = "ha-datacenter";

/// vSphere API client.
pub struct VsphereClient {
    client: Client,
    base_url: String,
    vim_url: String,
    session_id: Option<String>,
    vim_session_id: Option<String>,
    config: VsphereConfig,
}

impl VsphereClient {
    /// Build a new client from config (does NOT create a session yet).
    pub fn new(config: &VsphereConfig) -> VmwareResult<Self> {
        let client = Client::builder()
            .danger_accept_invalid_certs(config.insecure)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| VmwareError::connection(format!("Failed to build HTTP client: {e}")))?;

        let base_url = format!("https://{}:{}", config.host, config.port);
        let vim_url = format!("{base_url}/sdk/vim25/{}", config.api_release);

        Ok(Self {
            client,
            base_url,
            vim_url,
            session_id: None,
            vim_session_id: None,
            config: config.clone(),
        })
    }

    /// Base URL for VI JSON calls.
    pub fn vim_url(&self) -> &str {
        &self.vim_url
    }

    /// Whether both sessions are open.
    pub fn is_connected(&self) -> bool {
        self.session_id.is_some() && self.vim_session_id.is_some()
    }

    // ── Session management ──────────────────────────────────────────

    /// Open the REST session (POST /api/session) and the VI JSON session
    /// (`SessionManager.Login`).
    pub async fn login(&mut self) -> VmwareResult<()> {
        let url = format!("{}/api/session", self.base_url);

        let resp = self
            .client
            .post(&url)
            .basic_auth(&self.config.username, Some(&self.config.password))
            .send()
            .await?;

        if resp.status() == StatusCode::UNAUTHORIZED {
            return Err(VmwareError::auth("Invalid credentials"));
        }

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(VmwareError::api(
                status.as_u16(),
                format!("Login failed: {body}"),
            ));
        }

        // Session ID comes back as a quoted JSON string
        let session_id: String = resp.json().await.map_err(|e| {
            VmwareError::parse(format!("Failed to parse session response: {e}"))
        })?;
        self.session_id = Some(session_id);

        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct LoginRequest<'a> {
            user_name: &'a str,
            password: &'a str,
        }

        let session_manager = ManagedObjectReference::new("SessionManager", "SessionManager");
        let resp = self
            .client
            .post(self.vim_path(&session_manager, "Login"))
            .json(&LoginRequest {
                user_name: &self.config.username,
                password: &self.config.password,
            })
            .send()
            .await?;
        let resp = Self::vim_check_status(resp).await?;

        let vim_session = resp
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| VmwareError::parse("VI JSON login returned no session header"))?;
        self.vim_session_id = Some(vim_session);

        log::info!("Logged in to {} as {}", self.config.host, self.config.username);
        Ok(())
    }

    /// Close both sessions. Errors are ignored: the server expires them anyway.
    pub async fn logout(&self) -> VmwareResult<()> {
        if let Some(ref sid) = self.session_id {
            let url = format!("{}/api/session", self.base_url);
            let _ = self
                .client
                .delete(&url)
                .header(SESSION_HEADER, sid.as_str())
                .send()
                .await;
        }
        if let Some(ref sid) = self.vim_session_id {
            let session_manager = ManagedObjectReference::new("SessionManager", "SessionManager");
            let _ = self
                .client
                .post(self.vim_path(&session_manager, "Logout"))
                .header(SESSION_HEADER, sid.as_str())
                .send()
                .await;
        }
        log::info!("Logged out of {}", self.config.host);
        Ok(())
    }

    /// Check if the REST session is still valid (GET /api/session).
    pub async fn check_session(&self) -> VmwareResult<bool> {
        let sid = self.require_session()?;
        let url = format!("{}/api/session", self.base_url);
        let resp = self
            .client
            .get(&url)
            .header(SESSION_HEADER, sid)
            .send()
            .await?;

        Ok(resp.status().is_success())
    }

    // ── REST helpers ────────────────────────────────────────────────

    fn require_session(&self) -> VmwareResult<&str> {
        self.session_id
            .as_deref()
            .ok_or_else(|| VmwareError::auth("Not logged in: no active session"))
    }

    /// GET a JSON response with query params.
    pub async fn get_with_params<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(String, String)],
    ) -> VmwareResult<T> {
        let sid = self.require_session()?;
        let url = format!("{}{}", self.base_url, path);
        let borrowed: Vec<(&str, &str)> =
            params.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
        let resp = self
            .client
            .get(&url)
            .header(SESSION_HEADER, sid)
            .query(&borrowed)
            .send()
            .await?;
        let resp = Self::check_status(resp).await?;
        Self::parse_response(resp).await
    }

    // ── VI JSON helpers ─────────────────────────────────────────────

    fn require_vim_session(&self) -> VmwareResult<&str> {
        self.vim_session_id
            .as_deref()
            .ok_or_else(|| VmwareError::auth("Not logged in: no active VI session"))
    }

    /// `{vim_url}/{Type}/{moId}/{member}` where member is a method or property.
    pub fn vim_path(&self, object: &ManagedObjectReference, member: &str) -> String {
        format!("{}/{}/{}/{}", self.vim_url, object.kind, object.value, member)
    }

    /// Invoke a managed object method and parse its return value.
    async fn invoke<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        object: &ManagedObjectReference,
        method: &str,
        body: &B,
    ) -> VmwareResult<T> {
        let resp = self.invoke_raw(object, method, body).await?;
        Self::parse_response(resp).await
    }

    async fn invoke_raw<B: Serialize + ?Sized>(
        &self,
        object: &ManagedObjectReference,
        method: &str,
        body: &B,
    ) -> VmwareResult<Response> {
        let sid = self.require_vim_session()?;
        log::debug!("Invoking {method} on {object}");
        let resp = self
            .client
            .post(self.vim_path(object, method))
            .header(SESSION_HEADER, sid)
            .json(body)
            .send()
            .await?;
        Self::vim_check_status(resp).await
    }

    /// Read one property of a managed object.
    async fn property<T: DeserializeOwned>(
        &self,
        object: &ManagedObjectReference,
        property: &str,
    ) -> VmwareResult<T> {
        let sid = self.require_vim_session()?;
        let resp = self
            .client
            .get(self.vim_path(object, property))
            .header(SESSION_HEADER, sid)
            .send()
            .await?;
        let resp = Self::vim_check_status(resp).await?;
        Self::parse_response(resp).await
    }

    // ── Datastore files ─────────────────────────────────────────────

    /// `https://{host}/folder/{path}?dsName=..&dcPath=..`
    pub fn datastore_file_url(&self, datastore: &str, path: &str) -> VmwareResult<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| VmwareError::parse(format!("Invalid base URL {}: {e}", self.base_url)))?;
        url.path_segments_mut()
            .map_err(|_| {
                VmwareError::parse(format!("Base URL {} cannot carry a path", self.base_url))
            })?
            .pop_if_empty()
            .push("folder")
            .extend(path.split('/').filter(|s| !s.is_empty()));

        let dc_path = if self.config.datacenter.is_empty() {
            STANDALONE_DATACENTER
        } else {
            self.config.datacenter.as_str()
        };
        url.query_pairs_mut()
            .append_pair("dsName", datastore)
            .append_pair("dcPath", dc_path);
        Ok(url)
    }

    // ── Internal helpers ────────────────────────────────────────────

    async fn check_status(resp: Response) -> VmwareResult<Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let code = status.as_u16();
        let body = resp.text().await.unwrap_or_default();

        match status {
            StatusCode::UNAUTHORIZED => {
                Err(VmwareError::auth(format!("Session expired or invalid: {body}")))
            }
            StatusCode::FORBIDDEN => Err(VmwareError::new(
                VmwareErrorKind::AccessDenied,
                format!("Access denied: {body}"),
            )),
            StatusCode::NOT_FOUND => {
                Err(VmwareError::not_found(format!("Resource not found: {body}")))
            }
            _ => Err(VmwareError::api(code, format!("API error {code}: {body}"))),
        }
    }

    async fn vim_check_status(resp: Response) -> VmwareResult<Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(vim_fault(status.as_u16(), &body))
    }

    async fn parse_response<T: DeserializeOwned>(resp: Response) -> VmwareResult<T> {
        let text = resp.text().await.map_err(|e| {
            VmwareError::parse(format!("Failed to read response body: {e}"))
        })?;

        if text.is_empty() {
            // Void methods and unset properties come back empty
            return serde_json::from_str("null").map_err(|e| {
                VmwareError::parse(format!("Cannot deserialise empty response: {e}"))
            });
        }

        serde_json::from_str(&text).map_err(|e| {
            VmwareError::parse(format!("JSON parse error: {e}; body: {}", truncate(&text, 500)))
        })
    }
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Translate a VI JSON error body (`{"_typeName": "InvalidLogin", ...}`).
fn vim_fault(status: u16, body: &str) -> VmwareError {
    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct FaultMessage {
        #[serde(default)]
        message: Option<String>,
    }

    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Fault {
        #[serde(rename = "_typeName")]
        type_name: String,
        #[serde(default)]
        fault_message: Vec<FaultMessage>,
    }

    let Ok(fault) = serde_json::from_str::<Fault>(body) else {
        let body = truncate(body, 500);
        return match status {
            401 => VmwareError::auth(format!("Session expired or invalid: {body}")),
            404 => VmwareError::not_found(format!("Resource not found: {body}")),
            _ => VmwareError::api(status, format!("API error {status}: {body}")),
        };
    };

    let message = fault
        .fault_message
        .iter()
        .find_map(|m| m.message.clone())
        .unwrap_or_else(|| fault.type_name.clone());

    let mut err = match fault.type_name.as_str() {
        "InvalidLogin" | "NotAuthenticated" => VmwareError::auth(message),
        "NoPermission" => VmwareError::new(VmwareErrorKind::AccessDenied, message),
        "ManagedObjectNotFound" => VmwareError::not_found(message),
        _ if status == 401 => VmwareError::auth(message),
        _ => VmwareError::api(status, message),
    };
    err.fault = Some(fault.type_name);
    err
}

/// Exactly one match, or a lookup error naming what was asked for.
fn single<T>(what: &str, name: &str, mut found: Vec<T>) -> VmwareResult<T> {
    match found.len() {
        0 if name.is_empty() => Err(VmwareError::not_found(format!("No default {what} found"))),
        0 => Err(VmwareError::not_found(format!("{what} '{name}' not found"))),
        1 => Ok(found.remove(0)),
        n if name.is_empty() => Err(VmwareError::new(
            VmwareErrorKind::Other,
            format!("Default {what} resolves to {n} instances, please specify"),
        )),
        n => Err(VmwareError::new(
            VmwareErrorKind::Other,
            format!("{what} '{name}' matches {n} objects"),
        )),
    }
}

fn name_filter(name: &str) -> Vec<(String, String)> {
    if name.is_empty() {
        Vec::new()
    } else {
        vec![("names".into(), name.to_string())]
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Remote VM operations (VI JSON)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateVmRequest<'a> {
    config: &'a VirtualMachineConfigSpec,
    pool: &'a ManagedObjectReference,
    #[serde(skip_serializing_if = "Option::is_none")]
    host: Option<&'a ManagedObjectReference>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CloneVmRequest<'a> {
    folder: &'a ManagedObjectReference,
    name: &'a str,
    spec: &'a VirtualMachineCloneSpec,
}

#[derive(Serialize)]
struct ReconfigureRequest<'a> {
    spec: &'a VirtualMachineConfigSpec,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateSnapshotRequest<'a> {
    name: &'a str,
    description: &'a str,
    memory: bool,
    quiesce: bool,
}

#[derive(Serialize)]
struct EmptyRequest {}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RuntimeInfo {
    #[serde(default)]
    power_state: VmPowerState,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct GuestInfo {
    #[serde(default)]
    ip_address: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryConfig {
    #[serde(default)]
    name: String,
    #[serde(default)]
    template: bool,
    #[serde(default)]
    guest_id: Option<String>,
    #[serde(default)]
    annotation: Option<String>,
    #[serde(default)]
    num_cpu: Option<i32>,
    #[serde(default, rename = "memorySizeMB")]
    memory_size_mb: Option<i64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VmSummaryInfo {
    config: SummaryConfig,
    runtime: RuntimeInfo,
    #[serde(default)]
    guest: Option<GuestInfo>,
}

#[derive(Deserialize, Default)]
struct HardwareInfo {
    #[serde(default)]
    device: Vec<VirtualDevice>,
}

#[derive(Deserialize)]
struct ConfigInfo {
    #[serde(default)]
    hardware: HardwareInfo,
}

#[async_trait]
impl VimApi for VsphereClient {
    async fn create_vm_task(
        &self,
        folder: &ManagedObjectReference,
        spec: &VirtualMachineConfigSpec,
        pool: &ManagedObjectReference,
        host: Option<&ManagedObjectReference>,
    ) -> VmwareResult<ManagedObjectReference> {
        self.invoke(folder, "CreateVM_Task", &CreateVmRequest { config: spec, pool, host })
            .await
    }

    async fn clone_vm_task(
        &self,
        vm: &ManagedObjectReference,
        folder: &ManagedObjectReference,
        name: &str,
        spec: &VirtualMachineCloneSpec,
    ) -> VmwareResult<ManagedObjectReference> {
        self.invoke(vm, "CloneVM_Task", &CloneVmRequest { folder, name, spec })
            .await
    }

    async fn reconfigure_vm_task(
        &self,
        vm: &ManagedObjectReference,
        spec: &VirtualMachineConfigSpec,
    ) -> VmwareResult<ManagedObjectReference> {
        self.invoke(vm, "ReconfigVM_Task", &ReconfigureRequest { spec }).await
    }

    async fn power_on_vm_task(
        &self,
        vm: &ManagedObjectReference,
    ) -> VmwareResult<ManagedObjectReference> {
        self.invoke(vm, "PowerOnVM_Task", &EmptyRequest {}).await
    }

    async fn power_off_vm_task(
        &self,
        vm: &ManagedObjectReference,
    ) -> VmwareResult<ManagedObjectReference> {
        self.invoke(vm, "PowerOffVM_Task", &EmptyRequest {}).await
    }

    async fn create_snapshot_task(
        &self,
        vm: &ManagedObjectReference,
        name: &str,
        description: &str,
        memory: bool,
        quiesce: bool,
    ) -> VmwareResult<ManagedObjectReference> {
        let body = CreateSnapshotRequest { name, description, memory, quiesce };
        self.invoke(vm, "CreateSnapshot_Task", &body).await
    }

    async fn destroy_task(
        &self,
        vm: &ManagedObjectReference,
    ) -> VmwareResult<ManagedObjectReference> {
        self.invoke(vm, "Destroy_Task", &EmptyRequest {}).await
    }

    async fn shutdown_guest(&self, vm: &ManagedObjectReference) -> VmwareResult<()> {
        self.invoke_raw(vm, "ShutdownGuest", &EmptyRequest {}).await?;
        Ok(())
    }

    async fn mark_as_template(&self, vm: &ManagedObjectReference) -> VmwareResult<()> {
        self.invoke_raw(vm, "MarkAsTemplate", &EmptyRequest {}).await?;
        Ok(())
    }

    async fn task_info(&self, task: &ManagedObjectReference) -> VmwareResult<TaskInfo> {
        self.property(task, "info").await
    }

    async fn power_state(&self, vm: &ManagedObjectReference) -> VmwareResult<VmPowerState> {
        let runtime: RuntimeInfo = self.property(vm, "runtime").await?;
        Ok(runtime.power_state)
    }

    async fn vm_info(&self, vm: &ManagedObjectReference) -> VmwareResult<VmInfo> {
        let summary: VmSummaryInfo = self.property(vm, "summary").await?;
        Ok(VmInfo {
            name: summary.config.name,
            power_state: summary.runtime.power_state,
            template: summary.config.template,
            guest_id: summary.config.guest_id,
            annotation: summary.config.annotation,
            num_cpu: summary.config.num_cpu,
            memory_size_mb: summary.config.memory_size_mb,
            ip_address: summary.guest.and_then(|g| g.ip_address),
        })
    }

    async fn devices(&self, vm: &ManagedObjectReference) -> VmwareResult<Vec<VirtualDevice>> {
        let config: ConfigInfo = self.property(vm, "config").await?;
        Ok(config.hardware.device)
    }

    async fn snapshot_info(
        &self,
        vm: &ManagedObjectReference,
    ) -> VmwareResult<Option<VirtualMachineSnapshotInfo>> {
        self.property(vm, "snapshot").await
    }

    async fn guest_ip_address(&self, vm: &ManagedObjectReference) -> VmwareResult<Option<String>> {
        let guest: Option<GuestInfo> = self.property(vm, "guest").await?;
        Ok(guest.and_then(|g| g.ip_address).filter(|ip| !ip.is_empty()))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Inventory (Automation REST)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
struct VmListEntry {
    vm: String,
}

#[derive(Debug, Deserialize)]
struct FolderListEntry {
    folder: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct HostListEntry {
    host: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct PoolListEntry {
    resource_pool: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct DatastoreListEntry {
    datastore: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct DatacenterListEntry {
    datacenter: String,
}

#[derive(Debug, Deserialize)]
struct NetworkListEntry {
    network: String,
    name: String,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PortgroupConfig {
    key: String,
    distributed_virtual_switch: ManagedObjectReference,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OpaqueNetworkSummary {
    opaque_network_id: String,
    opaque_network_type: String,
}

impl VsphereClient {
    /// `datacenters=` filter for the configured datacenter, if any.
    async fn datacenter_filter(&self) -> VmwareResult<Vec<(String, String)>> {
        if self.config.datacenter.is_empty() {
            return Ok(Vec::new());
        }
        let found: Vec<DatacenterListEntry> = self
            .get_with_params("/api/vcenter/datacenter", &name_filter(&self.config.datacenter))
            .await?;
        let dc = single("datacenter", &self.config.datacenter, found)?;
        Ok(vec![("datacenters".into(), dc.datacenter)])
    }

    async fn network_kind(&self, entry: &NetworkListEntry) -> VmwareResult<NetworkKind> {
        match entry.kind.as_str() {
            "DISTRIBUTED_PORTGROUP" => {
                let portgroup =
                    ManagedObjectReference::new("DistributedVirtualPortgroup", &entry.network);
                let config: PortgroupConfig = self.property(&portgroup, "config").await?;
                let switch_uuid: String =
                    self.property(&config.distributed_virtual_switch, "uuid").await?;
                Ok(NetworkKind::Distributed { switch_uuid, portgroup_key: config.key })
            }
            "OPAQUE_NETWORK" => {
                let network = ManagedObjectReference::new("OpaqueNetwork", &entry.network);
                let summary: OpaqueNetworkSummary = self.property(&network, "summary").await?;
                Ok(NetworkKind::Opaque {
                    network_id: summary.opaque_network_id,
                    network_type: summary.opaque_network_type,
                })
            }
            _ => Ok(NetworkKind::Standard),
        }
    }
}

fn network_reference(entry: &NetworkListEntry) -> ManagedObjectReference {
    let kind = match entry.kind.as_str() {
        "DISTRIBUTED_PORTGROUP" => "DistributedVirtualPortgroup",
        "OPAQUE_NETWORK" => "OpaqueNetwork",
        _ => "Network",
    };
    ManagedObjectReference::new(kind, &entry.network)
}

#[async_trait]
impl Inventory for VsphereClient {
    async fn find_vm(&self, name: &str) -> VmwareResult<ManagedObjectReference> {
        let mut params = name_filter(name);
        params.extend(self.datacenter_filter().await?);
        let found: Vec<VmListEntry> = self.get_with_params("/api/vcenter/vm", &params).await?;
        let entry = single("VM", name, found)?;
        Ok(ManagedObjectReference::virtual_machine(entry.vm))
    }

    async fn resolve_folder(&self, name: &str) -> VmwareResult<FolderRef> {
        let lookup = if name.is_empty() { ROOT_VM_FOLDER_NAME } else { name };
        let mut params = name_filter(lookup);
        params.push(("type".into(), "VIRTUAL_MACHINE".into()));
        params.extend(self.datacenter_filter().await?);
        let found: Vec<FolderListEntry> =
            self.get_with_params("/api/vcenter/folder", &params).await?;
        let entry = single("folder", lookup, found)?;
        Ok(FolderRef {
            reference: ManagedObjectReference::new("Folder", entry.folder),
            name: entry.name,
        })
    }

    async fn resolve_host(&self, name: &str) -> VmwareResult<HostRef> {
        let mut params = name_filter(name);
        params.extend(self.datacenter_filter().await?);
        let found: Vec<HostListEntry> = self.get_with_params("/api/vcenter/host", &params).await?;
        let entry = single("host", name, found)?;
        Ok(HostRef {
            reference: ManagedObjectReference::new("HostSystem", entry.host),
            name: entry.name,
        })
    }

    async fn resolve_resource_pool(&self, host: &str, name: &str) -> VmwareResult<PoolRef> {
        let lookup = if name.is_empty() { ROOT_POOL_NAME } else { name };
        let mut params = name_filter(lookup);
        if !host.is_empty() {
            let host = self.resolve_host(host).await?;
            params.push(("hosts".into(), host.reference.value));
        }
        params.extend(self.datacenter_filter().await?);
        let found: Vec<PoolListEntry> = self
            .get_with_params("/api/vcenter/resource-pool", &params)
            .await?;
        let entry = single("resource pool", lookup, found)?;
        Ok(PoolRef {
            reference: ManagedObjectReference::new("ResourcePool", entry.resource_pool),
            name: entry.name,
        })
    }

    async fn resolve_datastore_or_default(&self, name: &str) -> VmwareResult<DatastoreRef> {
        let mut params = name_filter(name);
        params.extend(self.datacenter_filter().await?);
        let found: Vec<DatastoreListEntry> = self
            .get_with_params("/api/vcenter/datastore", &params)
            .await?;
        let entry = single("datastore", name, found)?;
        Ok(DatastoreRef {
            reference: ManagedObjectReference::new("Datastore", entry.datastore),
            name: entry.name,
        })
    }

    async fn resolve_network_or_default(&self, name: &str) -> VmwareResult<NetworkRef> {
        let mut params = name_filter(name);
        params.extend(self.datacenter_filter().await?);
        let found: Vec<NetworkListEntry> =
            self.get_with_params("/api/vcenter/network", &params).await?;
        let entry = single("network", name, found)?;
        let kind = self.network_kind(&entry).await?;
        Ok(NetworkRef {
            reference: network_reference(&entry),
            name: entry.name,
            kind,
        })
    }

    async fn file_exists(&self, datastore: &DatastoreRef, path: &str) -> VmwareResult<bool> {
        let url = self.datastore_file_url(&datastore.name, path)?;
        let resp = self
            .client
            .head(url)
            .basic_auth(&self.config.username, Some(&self.config.password))
            .send()
            .await?;

        match resp.status() {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Self::check_status(resp).await.map(|_| true),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(datacenter: &str) -> VsphereClient {
        VsphereClient::new(&VsphereConfig {
            host: "vcenter.lab.local".into(),
            username: "administrator@vsphere.local".into(),
            datacenter: datacenter.into(),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn vim_paths_address_type_id_and_member() {
        let c = client("");
        assert_eq!(c.vim_url(), "https://vcenter.lab.local:443/sdk/vim25/8.0.1.0");
        assert_eq!(
            c.vim_path(&ManagedObjectReference::virtual_machine("vm-42"), "PowerOnVM_Task"),
            "https://vcenter.lab.local:443/sdk/vim25/8.0.1.0/VirtualMachine/vm-42/PowerOnVM_Task"
        );
        assert!(!c.is_connected());
    }

    #[test]
    fn datastore_file_url_encodes_path_and_datacenter() {
        let url = client("DC 1").datastore_file_url("ds1", "tpl1/tpl1.vmx").unwrap();
        assert_eq!(url.path(), "/folder/tpl1/tpl1.vmx");
        let query: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            query,
            vec![("dsName".into(), "ds1".into()), ("dcPath".into(), "DC 1".into())]
        );
    }

    #[test]
    fn datastore_file_url_defaults_to_standalone_datacenter() {
        let url = client("").datastore_file_url("ds1", "a/a.vmx").unwrap();
        assert!(url.query_pairs().any(|(k, v)| k == "dcPath" && v == "ha-datacenter"));
    }

    #[test]
    fn vim_fault_keeps_type_and_message() {
        let body = r#"{"_typeName":"InvalidLogin",
            "faultMessage":[{"key":"k","message":"Cannot complete login"}]}"#;
        let err = vim_fault(500, body);
        assert_eq!(err.kind, VmwareErrorKind::AuthenticationError);
        assert_eq!(err.fault.as_deref(), Some("InvalidLogin"));
        assert_eq!(err.message, "Cannot complete login");

        let err = vim_fault(500, r#"{"_typeName":"InvalidArgument","invalidProperty":"spec"}"#);
        assert_eq!(err.kind, VmwareErrorKind::ApiError(500));
        assert_eq!(err.message, "InvalidArgument");
    }

    #[test]
    fn vim_fault_without_json_body_falls_back_to_status() {
        assert_eq!(vim_fault(404, "").kind, VmwareErrorKind::NotFound);
        assert_eq!(vim_fault(401, "nope").kind, VmwareErrorKind::AuthenticationError);
        assert_eq!(vim_fault(503, "<html>").kind, VmwareErrorKind::ApiError(503));
    }

    #[test]
    fn single_reports_missing_and_ambiguous() {
        assert_eq!(single("datastore", "ds1", vec![7]).unwrap(), 7);

        let err = single::<u8>("datastore", "ds9", vec![]).unwrap_err();
        assert_eq!(err.kind, VmwareErrorKind::NotFound);
        assert!(err.message.contains("ds9"));

        let err = single("network", "", vec![1, 2]).unwrap_err();
        assert_eq!(err.kind, VmwareErrorKind::Other);
        assert!(err.message.contains("please specify"));
    }

    #[test]
    fn network_entries_map_to_managed_object_types() {
        let entry = |kind: &str| NetworkListEntry {
            network: "dvportgroup-5".into(),
            name: "pg".into(),
            kind: kind.into(),
        };
        assert_eq!(
            network_reference(&entry("DISTRIBUTED_PORTGROUP")).kind,
            "DistributedVirtualPortgroup"
        );
        assert_eq!(network_reference(&entry("OPAQUE_NETWORK")).kind, "OpaqueNetwork");
        assert_eq!(network_reference(&entry("STANDARD_PORTGROUP")).kind, "Network");
    }

    #[test]
    fn create_request_omits_absent_host() {
        let spec = VirtualMachineConfigSpec::default();
        let pool = ManagedObjectReference::new("ResourcePool", "resgroup-9");
        let request = CreateVmRequest { config: &spec, pool: &pool, host: None };
        let body = serde_json::to_value(request).unwrap();
        assert!(body.get("host").is_none());
        assert_eq!(body["pool"]["value"], "resgroup-9");
        assert_eq!(body["pool"]["_typeName"], "ManagedObjectReference");
    }

    #[tokio::test]
    async fn calls_without_session_are_refused() {
        let c = client("");
        let vm = ManagedObjectReference::virtual_machine("vm-1");
        let err = c.power_state(&vm).await.unwrap_err();
        assert_eq!(err.kind, VmwareErrorKind::AuthenticationError);
        let err = c.find_vm("web01").await.unwrap_err();
        assert_eq!(err.kind, VmwareErrorKind::AuthenticationError);
    }
}
