//! Compile configuration intent into `VirtualMachineConfigSpec`s.
//!
//! Pure functions: no I/O, same input → same output.

use crate::config::{CreateConfig, HardwareConfig};
use crate::types::{AllocationLimit, ResourceAllocationInfo, VirtualMachineConfigSpec};

/// Map a caller-side limit to the wire representation. Non-positive means unlimited.
pub fn allocation_limit(limit: i64) -> AllocationLimit {
    if limit > 0 {
        AllocationLimit::Limited(limit)
    } else {
        AllocationLimit::Unlimited
    }
}

/// Hardware allocation spec used for both creation and reconfiguration.
pub fn compile_hardware(config: &HardwareConfig) -> VirtualMachineConfigSpec {
    VirtualMachineConfigSpec {
        num_cpus: Some(config.cpus),
        memory_mb: Some(config.ram_mb),
        cpu_allocation: Some(ResourceAllocationInfo {
            reservation: Some(config.cpu_reservation),
            limit: Some(allocation_limit(config.cpu_limit)),
        }),
        memory_allocation: Some(ResourceAllocationInfo {
            reservation: Some(config.ram_reservation),
            limit: None,
        }),
        memory_reservation_locked_to_max: Some(config.ram_reserve_all),
        ..Default::default()
    }
}

/// Hardware spec overlaid with the VM's identity.
pub fn compile_create(config: &CreateConfig) -> VirtualMachineConfigSpec {
    VirtualMachineConfigSpec {
        name: Some(config.name.clone()),
        annotation: Some(config.annotation.clone()),
        guest_id: Some(config.guest_os.clone()),
        ..compile_hardware(&config.hardware)
    }
}
