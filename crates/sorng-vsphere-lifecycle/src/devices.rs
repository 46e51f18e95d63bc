//! Virtual hardware composition.
//!
//! A [`DeviceList`] is an arena of devices cross-referenced by key: disks and
//! cdroms point at their controller through `controller_key`, controllers list
//! their children in `device`. Keys are negative placeholders (the server
//! assigns real ones) handed out in strictly decreasing order.
//!
//! Controllers can only be referenced through the [`ControllerHandle`]
//! returned when they were appended, and a handle is only honoured by the
//! batch that issued it.

use crate::error::{VmwareError, VmwareErrorKind, VmwareResult};
use crate::inventory::{NetworkKind, NetworkRef};
use crate::types::*;

use uuid::Uuid;

const FIRST_DEVICE_KEY: i32 = -200;
const MAX_SCSI_BUSES: i32 = 4;
const SCSI_UNITS: i32 = 16;
/// Unit the SCSI controller itself occupies on its bus.
const SCSI_CONTROLLER_UNIT: i32 = 7;
const MAX_IDE_BUSES: i32 = 2;
const IDE_UNITS: i32 = 2;

const DISK_MODE_PERSISTENT: &str = "persistent";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerKind {
    Scsi,
    Ide,
}

/// Proof that a controller was appended to a specific batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerHandle {
    batch: Uuid,
    key: i32,
    kind: ControllerKind,
}

impl ControllerHandle {
    pub fn key(&self) -> i32 {
        self.key
    }

    pub fn kind(&self) -> ControllerKind {
        self.kind
    }
}

/// Ordered set of devices to be added in one create/reconfigure request.
#[derive(Debug, Clone)]
pub struct DeviceList {
    batch: Uuid,
    devices: Vec<VirtualDevice>,
    next_key: i32,
}

impl Default for DeviceList {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceList {
    pub fn new() -> Self {
        Self {
            batch: Uuid::new_v4(),
            devices: Vec::new(),
            next_key: FIRST_DEVICE_KEY,
        }
    }

    pub fn devices(&self) -> &[VirtualDevice] {
        &self.devices
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    fn new_key(&mut self) -> i32 {
        let key = self.next_key;
        self.next_key -= 1;
        key
    }

    // ── Controllers ─────────────────────────────────────────────────

    /// Append a SCSI controller of the named family.
    pub fn add_disk_controller(&mut self, controller_type: &str) -> VmwareResult<ControllerHandle> {
        let wrap = scsi_variant(controller_type)?;
        let bus_number = (0..MAX_SCSI_BUSES)
            .find(|bus| {
                !self
                    .devices
                    .iter()
                    .filter_map(VirtualDevice::scsi_controller)
                    .any(|c| c.bus_number == *bus)
            })
            .ok_or_else(|| {
                VmwareError::new(
                    VmwareErrorKind::InvalidHardware,
                    format!("All {MAX_SCSI_BUSES} SCSI buses are in use"),
                )
            })?;

        let key = self.new_key();
        self.devices.push(wrap(VirtualScsiController {
            key,
            bus_number,
            device: Vec::new(),
            shared_bus: "noSharing".into(),
            hot_add_remove: Some(true),
            scsi_ctlr_unit_number: Some(SCSI_CONTROLLER_UNIT),
        }));
        log::debug!("Composed {controller_type} controller key={key} bus={bus_number}");

        Ok(ControllerHandle { batch: self.batch, key, kind: ControllerKind::Scsi })
    }

    /// Append an IDE controller for optical media. Not deduplicated.
    pub fn add_optical_controller(&mut self) -> VmwareResult<ControllerHandle> {
        let bus_number = (0..MAX_IDE_BUSES)
            .find(|bus| {
                !self
                    .devices
                    .iter()
                    .filter_map(VirtualDevice::ide_controller)
                    .any(|c| c.bus_number == *bus)
            })
            .ok_or_else(|| {
                VmwareError::new(
                    VmwareErrorKind::InvalidHardware,
                    format!("All {MAX_IDE_BUSES} IDE buses are in use"),
                )
            })?;

        let key = self.new_key();
        self.devices.push(VirtualDevice::VirtualIdeController(VirtualIdeController {
            key,
            bus_number,
            device: Vec::new(),
        }));
        log::debug!("Composed IDE controller key={key} bus={bus_number}");

        Ok(ControllerHandle { batch: self.batch, key, kind: ControllerKind::Ide })
    }

    // ── Attached devices ────────────────────────────────────────────

    /// Append a new flat disk bound to `controller`. Returns the disk key.
    pub fn add_disk(
        &mut self,
        controller: &ControllerHandle,
        size_kb: i64,
        thin_provisioned: bool,
    ) -> VmwareResult<i32> {
        let index = self.controller_index(controller)?;

        if size_kb == 0 {
            return Err(VmwareError::not_implemented(
                "Disk sizing from a template is not implemented; set a disk size",
            ));
        }
        if size_kb < 0 {
            return Err(VmwareError::new(
                VmwareErrorKind::InvalidDiskSize,
                format!("Disk size must be positive, got {size_kb} KB"),
            ));
        }

        let unit = self.free_unit(controller)?;
        let key = self.new_key();
        bind_child(&mut self.devices[index], key);
        self.devices.push(VirtualDevice::VirtualDisk(VirtualDiskDevice {
            key,
            controller_key: Some(controller.key),
            unit_number: Some(unit),
            capacity_in_kb: size_kb,
            backing: Some(VirtualDeviceBacking::VirtualDiskFlatVer2BackingInfo {
                file_name: String::new(),
                disk_mode: DISK_MODE_PERSISTENT.into(),
                thin_provisioned: Some(thin_provisioned),
            }),
        }));
        log::debug!("Composed disk key={key} on controller {} unit {unit}", controller.key);

        Ok(key)
    }

    /// Append a network adapter wired to `network`. Returns the adapter key.
    pub fn add_network_adapter(
        &mut self,
        network: &NetworkRef,
        card_type: &str,
    ) -> VmwareResult<i32> {
        let wrap = ethernet_variant(card_type)?;
        let key = self.new_key();
        self.devices.push(wrap(VirtualEthernetCard {
            key,
            backing: Some(network_backing(network)),
            connectable: Some(VirtualDeviceConnectInfo {
                start_connected: true,
                allow_guest_control: true,
                connected: true,
            }),
            address_type: Some("generated".into()),
        }));
        log::debug!("Composed network adapter key={key} on '{}'", network.name);

        Ok(key)
    }

    /// `add` change set for every device, creating backing files for new disks.
    pub fn to_change_set(&self) -> Vec<VirtualDeviceConfigSpec> {
        add_change_set(&self.devices)
    }

    // ── Internal helpers ────────────────────────────────────────────

    fn controller_index(&self, controller: &ControllerHandle) -> VmwareResult<usize> {
        if controller.batch != self.batch {
            return Err(VmwareError::new(
                VmwareErrorKind::DeviceOrdering,
                format!(
                    "Controller {} belongs to another device batch; append it to this list first",
                    controller.key
                ),
            ));
        }
        self.devices
            .iter()
            .position(|d| match controller.kind {
                ControllerKind::Scsi => d.scsi_controller().map(|c| c.key) == Some(controller.key),
                ControllerKind::Ide => d.ide_controller().map(|c| c.key) == Some(controller.key),
            })
            .ok_or_else(|| {
                VmwareError::new(
                    VmwareErrorKind::DeviceOrdering,
                    format!("Controller {} is not present in this device batch", controller.key),
                )
            })
    }

    fn free_unit(&self, controller: &ControllerHandle) -> VmwareResult<i32> {
        let (units, reserved) = match controller.kind {
            ControllerKind::Scsi => (SCSI_UNITS, Some(SCSI_CONTROLLER_UNIT)),
            ControllerKind::Ide => (IDE_UNITS, None),
        };
        first_free_unit(&self.devices, controller.key, units, reserved).ok_or_else(|| {
            VmwareError::new(
                VmwareErrorKind::ControllerNotFound,
                format!("Controller {} has no free unit", controller.key),
            )
        })
    }
}

/// Build a reconfigure-only change set that attaches `iso_path` as a new cdrom
/// on the first IDE controller of a live VM that still has a free unit.
pub fn insert_optical_media(
    live: &[VirtualDevice],
    iso_path: &str,
) -> VmwareResult<Vec<VirtualDeviceConfigSpec>> {
    let (controller_key, unit) = live
        .iter()
        .filter_map(VirtualDevice::ide_controller)
        .find_map(|c| first_free_unit(live, c.key, IDE_UNITS, None).map(|u| (c.key, u)))
        .ok_or_else(|| {
            VmwareError::new(
                VmwareErrorKind::ControllerNotFound,
                "No IDE controller with a free unit found on the VM",
            )
        })?;

    let key = live
        .iter()
        .filter_map(VirtualDevice::key)
        .filter(|k| *k <= FIRST_DEVICE_KEY)
        .min()
        .map_or(FIRST_DEVICE_KEY, |k| k - 1);

    let cdrom = VirtualDevice::VirtualCdrom(VirtualCdromDevice {
        key,
        controller_key: Some(controller_key),
        unit_number: Some(unit),
        backing: Some(VirtualDeviceBacking::VirtualCdromIsoBackingInfo {
            file_name: iso_path.to_string(),
        }),
        connectable: Some(VirtualDeviceConnectInfo {
            start_connected: true,
            allow_guest_control: true,
            connected: true,
        }),
    });
    log::debug!(
        "Composed cdrom key={key} on IDE controller {controller_key} unit {unit} with {iso_path}"
    );

    Ok(add_change_set(std::slice::from_ref(&cdrom)))
}

fn add_change_set(devices: &[VirtualDevice]) -> Vec<VirtualDeviceConfigSpec> {
    devices
        .iter()
        .map(|device| {
            let creates_file = matches!(
                device,
                VirtualDevice::VirtualDisk(VirtualDiskDevice {
                    backing: Some(
                        VirtualDeviceBacking::VirtualDiskFlatVer2BackingInfo { file_name, .. }
                    ),
                    ..
                }) if file_name.is_empty()
            );
            VirtualDeviceConfigSpec {
                operation: DeviceConfigOperation::Add,
                file_operation: creates_file.then_some(DeviceFileOperation::Create),
                device: device.clone(),
            }
        })
        .collect()
}

fn first_free_unit(
    devices: &[VirtualDevice],
    controller_key: i32,
    units: i32,
    reserved: Option<i32>,
) -> Option<i32> {
    let taken: Vec<i32> = devices
        .iter()
        .filter_map(VirtualDevice::attachment)
        .filter(|(key, _)| *key == controller_key)
        .filter_map(|(_, unit)| unit)
        .collect();
    (0..units).find(|u| Some(*u) != reserved && !taken.contains(u))
}

fn bind_child(controller: &mut VirtualDevice, child: i32) {
    match controller {
        VirtualDevice::VirtualLsiLogicController(c)
        | VirtualDevice::VirtualBusLogicController(c)
        | VirtualDevice::ParaVirtualSCSIController(c)
        | VirtualDevice::VirtualLsiLogicSASController(c) => c.device.push(child),
        VirtualDevice::VirtualIdeController(c) => c.device.push(child),
        _ => {}
    }
}

fn scsi_variant(controller_type: &str) -> VmwareResult<fn(VirtualScsiController) -> VirtualDevice> {
    let wrap: fn(VirtualScsiController) -> VirtualDevice = match controller_type
        .to_ascii_lowercase()
        .as_str()
    {
        "scsi" | "lsilogic" => VirtualDevice::VirtualLsiLogicController,
        "buslogic" => VirtualDevice::VirtualBusLogicController,
        "pvscsi" => VirtualDevice::ParaVirtualSCSIController,
        "lsilogic-sas" => VirtualDevice::VirtualLsiLogicSASController,
        other => {
            return Err(VmwareError::new(
                VmwareErrorKind::UnsupportedControllerKind,
                format!("Unsupported disk controller type '{other}'"),
            ))
        }
    };
    Ok(wrap)
}

fn ethernet_variant(card_type: &str) -> VmwareResult<fn(VirtualEthernetCard) -> VirtualDevice> {
    let wrap: fn(VirtualEthernetCard) -> VirtualDevice = match card_type
        .to_ascii_lowercase()
        .as_str()
    {
        "" | "e1000" => VirtualDevice::VirtualE1000,
        "e1000e" => VirtualDevice::VirtualE1000e,
        "vmxnet2" => VirtualDevice::VirtualVmxnet2,
        "vmxnet3" => VirtualDevice::VirtualVmxnet3,
        "pcnet32" => VirtualDevice::VirtualPCNet32,
        other => {
            return Err(VmwareError::new(
                VmwareErrorKind::UnsupportedDeviceKind,
                format!("Unsupported network card type '{other}'"),
            ))
        }
    };
    Ok(wrap)
}

/// Backing descriptor matching the network's connection kind.
fn network_backing(network: &NetworkRef) -> VirtualDeviceBacking {
    match &network.kind {
        NetworkKind::Standard => VirtualDeviceBacking::VirtualEthernetCardNetworkBackingInfo {
            device_name: network.name.clone(),
            network: Some(network.reference.clone()),
        },
        NetworkKind::Distributed { switch_uuid, portgroup_key } => {
            VirtualDeviceBacking::VirtualEthernetCardDistributedVirtualPortBackingInfo {
                port: DistributedVirtualSwitchPortConnection {
                    switch_uuid: switch_uuid.clone(),
                    portgroup_key: portgroup_key.clone(),
                },
            }
        }
        NetworkKind::Opaque { network_id, network_type } => {
            VirtualDeviceBacking::VirtualEthernetCardOpaqueNetworkBackingInfo {
                opaque_network_id: network_id.clone(),
                opaque_network_type: network_type.clone(),
            }
        }
    }
}
