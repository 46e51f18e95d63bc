//! # SortOfRemote NG – vSphere VM Lifecycle
//!
//! Creates, clones, reconfigures, powers, snapshots, templates and destroys
//! VMs on vCenter / ESXi, composing virtual hardware and waiting for the
//! server-side tasks that carry out each change.
//!
//! ## Modules
//!
//! - **types**: VI JSON data objects (config specs, devices, tasks) and connection config
//! - **error**: Crate-specific error types
//! - **config**: Caller-side desired state (`CreateConfig`, `CloneConfig`, `HardwareConfig`)
//! - **compile**: Desired state → `VirtualMachineConfigSpec`
//! - **devices**: Device list composition (controllers, disks, NICs, cdroms)
//! - **api**: Remote VM operation contract
//! - **inventory**: Name → managed object lookups
//! - **context**: Per-endpoint context (API, inventory, cancellation, cadence)
//! - **task**: Submit-and-wait executor for long-running tasks
//! - **vm**: VM handle and lifecycle operations
//! - **snapshot**: Snapshot operations on the VM handle
//! - **vsphere**: HTTP client implementing `api` and `inventory`
//! - **service**: Aggregate facade + shared state alias

pub mod types;
pub mod error;
pub mod config;
pub mod compile;
pub mod devices;
pub mod api;
pub mod inventory;
pub mod context;
pub mod task;
pub mod vm;
pub mod snapshot;
pub mod vsphere;
pub mod service;

#[cfg(test)]
mod testing;
