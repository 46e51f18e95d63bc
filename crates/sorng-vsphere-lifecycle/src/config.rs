//! Desired-state configuration handed in by the caller.
//!
//! These are plain values, built once per operation and never mutated by the
//! engine. `CreateConfig` owns its hardware and disk intent as named
//! sub-structs instead of flattening them.

use crate::error::{VmwareError, VmwareErrorKind, VmwareResult};

use serde::{Deserialize, Serialize};

/// CPU / memory allocation. Units pass through unchanged (MHz, MB).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HardwareConfig {
    pub cpus: i32,
    pub cpu_reservation: i64,
    /// `0` means unlimited.
    pub cpu_limit: i64,
    pub ram_mb: i64,
    pub ram_reservation: i64,
    /// Lock the memory reservation to the configured size.
    pub ram_reserve_all: bool,
}

impl HardwareConfig {
    /// Reject allocations the endpoint would refuse anyway.
    pub fn validate(&self) -> VmwareResult<()> {
        if self.cpu_limit > 0 && self.cpu_reservation > self.cpu_limit {
            return Err(VmwareError::new(
                VmwareErrorKind::InvalidHardware,
                format!(
                    "CPU reservation {} exceeds CPU limit {}",
                    self.cpu_reservation, self.cpu_limit
                ),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DiskConfig {
    pub disk_size_kb: i64,
    pub thin_provisioned: bool,
    /// e.g. "scsi", "pvscsi"
    pub controller_type: String,
}

impl Default for DiskConfig {
    fn default() -> Self {
        Self {
            disk_size_kb: 0,
            thin_provisioned: false,
            controller_type: "scsi".into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CloneConfig {
    pub name: String,
    pub folder: String,
    pub host: String,
    pub resource_pool: String,
    pub datastore: String,
    pub linked_clone: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateConfig {
    pub hardware: HardwareConfig,
    pub disk: DiskConfig,
    pub annotation: String,
    pub name: String,
    pub folder: String,
    pub host: String,
    pub resource_pool: String,
    pub datastore: String,
    pub guest_os: String,
    pub network: String,
    /// Ethernet card model, e.g. "e1000", "vmxnet3"
    pub network_card: String,
    /// Overwrite an existing `.vmx` at the target path.
    pub force: bool,
}

impl Default for CreateConfig {
    fn default() -> Self {
        Self {
            hardware: HardwareConfig::default(),
            disk: DiskConfig::default(),
            annotation: String::new(),
            name: String::new(),
            folder: String::new(),
            host: String::new(),
            resource_pool: String::new(),
            datastore: String::new(),
            guest_os: "otherGuest".into(),
            network: String::new(),
            network_card: "e1000".into(),
            force: false,
        }
    }
}

impl CreateConfig {
    /// Datastore-relative path of the VM's backing `.vmx` file.
    pub fn vmx_path(&self) -> String {
        format!("{0}/{0}.vmx", self.name)
    }
}
