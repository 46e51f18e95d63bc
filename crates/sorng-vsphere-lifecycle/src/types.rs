//! Shared types for vSphere VM lifecycle management.
//!
//! The data objects below mirror the VI JSON API shapes: `camelCase` field
//! names, and polymorphic objects (devices, backings) discriminated by the
//! `_typeName` member.

use crate::error::{VmwareError, VmwareResult};

use serde::ser::SerializeStruct;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Connection / Config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Top-level configuration for connecting to a vCenter / ESXi host.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VsphereConfig {
    /// vCenter or ESXi hostname / IP (e.g. "vcenter.lab.local")
    pub host: String,
    /// Port (default 443)
    #[serde(default = "default_port")]
    pub port: u16,
    /// Username (e.g. "administrator@vsphere.local")
    pub username: String,
    /// Password
    pub password: String,
    /// Skip TLS certificate verification (self-signed labs)
    #[serde(default)]
    pub insecure: bool,
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Datacenter name, used for datastore file lookups
    #[serde(default)]
    pub datacenter: String,
    /// VI JSON API release segment (`/sdk/vim25/{release}`)
    #[serde(default = "default_api_release")]
    pub api_release: String,
    /// Interval between task state polls
    #[serde(default = "default_task_poll_interval_ms")]
    pub task_poll_interval_ms: u64,
    /// Interval between power state polls while waiting for shutdown
    #[serde(default = "default_shutdown_poll_interval_secs")]
    pub shutdown_poll_interval_secs: u64,
    /// Interval between guest address polls
    #[serde(default = "default_ip_poll_interval_secs")]
    pub ip_poll_interval_secs: u64,
}

fn default_port() -> u16 { 443 }
fn default_timeout() -> u64 { 30 }
fn default_api_release() -> String { "8.0.1.0".into() }
fn default_task_poll_interval_ms() -> u64 { 500 }
fn default_shutdown_poll_interval_secs() -> u64 { 1 }
fn default_ip_poll_interval_secs() -> u64 { 5 }

impl Default for VsphereConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            username: String::new(),
            password: String::new(),
            port: default_port(),
            insecure: false,
            timeout_secs: default_timeout(),
            datacenter: String::new(),
            api_release: default_api_release(),
            task_poll_interval_ms: default_task_poll_interval_ms(),
            shutdown_poll_interval_secs: default_shutdown_poll_interval_secs(),
            ip_poll_interval_secs: default_ip_poll_interval_secs(),
        }
    }
}

impl VsphereConfig {
    /// Parse a JSON connection profile. Missing optional keys take their defaults.
    pub fn from_json(raw: &str) -> VmwareResult<Self> {
        let config: Self = serde_json::from_str(raw)?;
        if config.host.is_empty() {
            return Err(VmwareError::connection("Connection profile has no host"));
        }
        Ok(config)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Managed object references
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Opaque identity of a server-side inventory object (e.g. `VirtualMachine:vm-42`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
pub struct ManagedObjectReference {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
}

impl ManagedObjectReference {
    pub fn new(kind: impl Into<String>, value: impl Into<String>) -> Self {
        Self { kind: kind.into(), value: value.into() }
    }

    pub fn virtual_machine(value: impl Into<String>) -> Self {
        Self::new("VirtualMachine", value)
    }
}

impl Serialize for ManagedObjectReference {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut st = serializer.serialize_struct("ManagedObjectReference", 3)?;
        st.serialize_field("_typeName", "ManagedObjectReference")?;
        st.serialize_field("type", &self.kind)?;
        st.serialize_field("value", &self.value)?;
        st.end()
    }
}

impl std::fmt::Display for ManagedObjectReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind, self.value)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  VM Power State / Info
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum VmPowerState {
    PoweredOn,
    PoweredOff,
    Suspended,
    #[serde(other)]
    Unknown,
}

impl Default for VmPowerState {
    fn default() -> Self { Self::Unknown }
}

/// Freshly fetched VM properties. Never cached by a handle.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VmInfo {
    pub name: String,
    #[serde(default)]
    pub power_state: VmPowerState,
    #[serde(default)]
    pub template: bool,
    #[serde(default)]
    pub guest_id: Option<String>,
    #[serde(default)]
    pub annotation: Option<String>,
    #[serde(default)]
    pub num_cpu: Option<i32>,
    #[serde(default, rename = "memorySizeMB")]
    pub memory_size_mb: Option<i64>,
    #[serde(default)]
    pub ip_address: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Config spec
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Upper bound of a resource allocation.
///
/// The wire encodes "no limit" as `-1`; a limit of zero would mean zero
/// capacity, so the two are kept as distinct variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocationLimit {
    Unlimited,
    Limited(i64),
}

impl Serialize for AllocationLimit {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Unlimited => serializer.serialize_i64(-1),
            Self::Limited(v) => serializer.serialize_i64(*v),
        }
    }
}

impl<'de> Deserialize<'de> for AllocationLimit {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = i64::deserialize(deserializer)?;
        Ok(if raw < 0 { Self::Unlimited } else { Self::Limited(raw) })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceAllocationInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reservation: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<AllocationLimit>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineFileInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vm_path_name: Option<String>,
}

/// Create / reconfigure specification (`VirtualMachineConfigSpec`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineConfigSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guest_id: Option<String>,
    #[serde(default, rename = "numCPUs", skip_serializing_if = "Option::is_none")]
    pub num_cpus: Option<i32>,
    #[serde(default, rename = "memoryMB", skip_serializing_if = "Option::is_none")]
    pub memory_mb: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_allocation: Option<ResourceAllocationInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_allocation: Option<ResourceAllocationInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_reservation_locked_to_max: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub device_change: Vec<VirtualDeviceConfigSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<VirtualMachineFileInfo>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Devices
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DeviceConfigOperation {
    Add,
    Remove,
    Edit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DeviceFileOperation {
    Create,
    Destroy,
    Replace,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualDeviceConfigSpec {
    pub operation: DeviceConfigOperation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_operation: Option<DeviceFileOperation>,
    pub device: VirtualDevice,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualDeviceConnectInfo {
    pub start_connected: bool,
    pub allow_guest_control: bool,
    pub connected: bool,
}

/// SCSI host bus adapter of any flavour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualScsiController {
    pub key: i32,
    pub bus_number: i32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub device: Vec<i32>,
    #[serde(default = "default_shared_bus")]
    pub shared_bus: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hot_add_remove: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scsi_ctlr_unit_number: Option<i32>,
}

fn default_shared_bus() -> String { "noSharing".into() }

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualIdeController {
    pub key: i32,
    pub bus_number: i32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub device: Vec<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualDiskDevice {
    pub key: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller_key: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_number: Option<i32>,
    #[serde(rename = "capacityInKB")]
    pub capacity_in_kb: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backing: Option<VirtualDeviceBacking>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualCdromDevice {
    pub key: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller_key: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_number: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backing: Option<VirtualDeviceBacking>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connectable: Option<VirtualDeviceConnectInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualEthernetCard {
    pub key: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backing: Option<VirtualDeviceBacking>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connectable: Option<VirtualDeviceConnectInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_type: Option<String>,
}

/// A virtual device, discriminated by its VI type name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "_typeName")]
pub enum VirtualDevice {
    VirtualLsiLogicController(VirtualScsiController),
    VirtualBusLogicController(VirtualScsiController),
    ParaVirtualSCSIController(VirtualScsiController),
    VirtualLsiLogicSASController(VirtualScsiController),
    #[serde(rename = "VirtualIDEController")]
    VirtualIdeController(VirtualIdeController),
    VirtualDisk(VirtualDiskDevice),
    VirtualCdrom(VirtualCdromDevice),
    VirtualE1000(VirtualEthernetCard),
    VirtualE1000e(VirtualEthernetCard),
    VirtualVmxnet2(VirtualEthernetCard),
    VirtualVmxnet3(VirtualEthernetCard),
    VirtualPCNet32(VirtualEthernetCard),
    /// Any device this crate does not compose (keyboards, PCI bus, video card, ...)
    #[serde(other)]
    Other,
}

impl VirtualDevice {
    /// Device key; `None` for devices this crate does not model.
    pub fn key(&self) -> Option<i32> {
        match self {
            Self::VirtualLsiLogicController(c)
            | Self::VirtualBusLogicController(c)
            | Self::ParaVirtualSCSIController(c)
            | Self::VirtualLsiLogicSASController(c) => Some(c.key),
            Self::VirtualIdeController(c) => Some(c.key),
            Self::VirtualDisk(d) => Some(d.key),
            Self::VirtualCdrom(d) => Some(d.key),
            Self::VirtualE1000(n)
            | Self::VirtualE1000e(n)
            | Self::VirtualVmxnet2(n)
            | Self::VirtualVmxnet3(n)
            | Self::VirtualPCNet32(n) => Some(n.key),
            Self::Other => None,
        }
    }

    /// Controller this device is attached to, with its unit number.
    pub fn attachment(&self) -> Option<(i32, Option<i32>)> {
        match self {
            Self::VirtualDisk(d) => d.controller_key.map(|k| (k, d.unit_number)),
            Self::VirtualCdrom(d) => d.controller_key.map(|k| (k, d.unit_number)),
            _ => None,
        }
    }

    pub fn scsi_controller(&self) -> Option<&VirtualScsiController> {
        match self {
            Self::VirtualLsiLogicController(c)
            | Self::VirtualBusLogicController(c)
            | Self::ParaVirtualSCSIController(c)
            | Self::VirtualLsiLogicSASController(c) => Some(c),
            _ => None,
        }
    }

    pub fn ide_controller(&self) -> Option<&VirtualIdeController> {
        match self {
            Self::VirtualIdeController(c) => Some(c),
            _ => None,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Backings
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributedVirtualSwitchPortConnection {
    pub switch_uuid: String,
    pub portgroup_key: String,
}

/// Concrete resource a device is connected to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "_typeName")]
pub enum VirtualDeviceBacking {
    #[serde(rename_all = "camelCase")]
    VirtualDiskFlatVer2BackingInfo {
        #[serde(default)]
        file_name: String,
        disk_mode: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        thin_provisioned: Option<bool>,
    },
    #[serde(rename_all = "camelCase")]
    VirtualCdromIsoBackingInfo { file_name: String },
    #[serde(rename_all = "camelCase")]
    VirtualEthernetCardNetworkBackingInfo {
        device_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        network: Option<ManagedObjectReference>,
    },
    #[serde(rename_all = "camelCase")]
    VirtualEthernetCardDistributedVirtualPortBackingInfo {
        port: DistributedVirtualSwitchPortConnection,
    },
    #[serde(rename_all = "camelCase")]
    VirtualEthernetCardOpaqueNetworkBackingInfo {
        opaque_network_id: String,
        opaque_network_type: String,
    },
    #[serde(other)]
    Other,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Clone / Relocate
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Disk move type that backs the clone's disks with child deltas of the
/// source snapshot.
pub const DISK_MOVE_CREATE_NEW_CHILD: &str = "createNewChildDiskBacking";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineRelocateSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datastore: Option<ManagedObjectReference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pool: Option<ManagedObjectReference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<ManagedObjectReference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disk_move_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineCloneSpec {
    pub location: VirtualMachineRelocateSpec,
    pub template: bool,
    pub power_on: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<ManagedObjectReference>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Snapshots
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineSnapshotInfo {
    #[serde(default)]
    pub current_snapshot: Option<ManagedObjectReference>,
    #[serde(default)]
    pub root_snapshot_list: Vec<serde_json::Value>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Tasks
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskInfoState {
    Queued,
    Running,
    Success,
    Error,
}

impl TaskInfoState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Error)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalizedMethodFault {
    #[serde(default)]
    pub fault: Option<serde_json::Value>,
    #[serde(default)]
    pub localized_message: Option<String>,
}

impl LocalizedMethodFault {
    /// VI type name of the underlying fault (e.g. `InvalidDeviceSpec`).
    pub fn fault_type(&self) -> Option<String> {
        self.fault
            .as_ref()?
            .get("_typeName")?
            .as_str()
            .map(str::to_string)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskInfo {
    #[serde(default)]
    pub key: Option<String>,
    pub state: TaskInfoState,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<LocalizedMethodFault>,
    #[serde(default)]
    pub description_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn moref_carries_type_name() {
        let r = ManagedObjectReference::virtual_machine("vm-42");
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(
            v,
            json!({
                "_typeName": "ManagedObjectReference",
                "type": "VirtualMachine",
                "value": "vm-42"
            })
        );
        let back: ManagedObjectReference = serde_json::from_value(v).unwrap();
        assert_eq!(back, r);
    }

    #[test]
    fn allocation_limit_wire_encoding() {
        assert_eq!(serde_json::to_value(AllocationLimit::Unlimited).unwrap(), json!(-1));
        assert_eq!(serde_json::to_value(AllocationLimit::Limited(0)).unwrap(), json!(0));
        let parsed: AllocationLimit = serde_json::from_value(json!(-1)).unwrap();
        assert_eq!(parsed, AllocationLimit::Unlimited);
    }

    #[test]
    fn config_spec_uses_vi_field_names() {
        let spec = VirtualMachineConfigSpec {
            num_cpus: Some(2),
            memory_mb: Some(2048),
            ..Default::default()
        };
        let v = serde_json::to_value(&spec).unwrap();
        assert_eq!(v["numCPUs"], 2);
        assert_eq!(v["memoryMB"], 2048);
        assert!(v.get("deviceChange").is_none());
    }

    #[test]
    fn live_device_list_tolerates_unknown_devices() {
        let raw = json!([
            {"_typeName": "VirtualIDEController", "key": 200, "busNumber": 0, "device": [3000]},
            {"_typeName": "VirtualKeyboard", "key": 600},
            {"_typeName": "VirtualCdrom", "key": 3000, "controllerKey": 200, "unitNumber": 0,
             "backing": {"_typeName": "VirtualCdromRemotePassthroughBackingInfo", "deviceName": ""}}
        ]);
        let devices: Vec<VirtualDevice> = serde_json::from_value(raw).unwrap();
        assert_eq!(devices.len(), 3);
        assert_eq!(devices[0].ide_controller().map(|c| c.device.clone()), Some(vec![3000]));
        assert_eq!(devices[1], VirtualDevice::Other);
        assert_eq!(devices[2].attachment(), Some((200, Some(0))));
    }

    #[test]
    fn task_fault_type() {
        let info: TaskInfo = serde_json::from_value(json!({
            "key": "task-7",
            "state": "error",
            "error": {
                "fault": {"_typeName": "FileAlreadyExists", "file": "[ds1] tpl1/tpl1.vmx"},
                "localizedMessage": "The file or folder [ds1] tpl1/tpl1.vmx already exists"
            }
        }))
        .unwrap();
        assert!(info.state.is_terminal());
        let fault = info.error.unwrap();
        assert_eq!(fault.fault_type().as_deref(), Some("FileAlreadyExists"));
    }

    #[test]
    fn config_from_json_applies_defaults() {
        let cfg = VsphereConfig::from_json(
            r#"{"host":"vc.lab.local","username":"administrator@vsphere.local","password":"x"}"#,
        )
        .unwrap();
        assert_eq!(cfg.port, 443);
        assert_eq!(cfg.api_release, "8.0.1.0");
        assert_eq!(cfg.shutdown_poll_interval_secs, 1);
        assert!(VsphereConfig::from_json(r#"{"host":"","username":"u","password":"p"}"#).is_err());
    }
}
