//! Error types for the vSphere lifecycle crate.

use std::fmt;

/// Categorised error kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VmwareErrorKind {
    /// vSphere API unreachable or session expired
    ConnectionError,
    /// Authentication failed (401)
    AuthenticationError,
    /// Named inventory object (VM, folder, host, pool, datastore, network) absent
    NotFound,
    /// Backing file already present and `force` not set
    AlreadyExists,
    /// Linked clone requested but the source has no snapshot
    NoSnapshotForLinkedClone,
    /// Disk controller type name not recognised
    UnsupportedControllerKind,
    /// Network card type name not recognised
    UnsupportedDeviceKind,
    /// Negative disk capacity
    InvalidDiskSize,
    /// Hardware allocation is internally inconsistent
    InvalidHardware,
    /// Live VM has no controller able to take the device
    ControllerNotFound,
    /// Device references a controller outside its composition batch
    DeviceOrdering,
    /// Explicitly unsupported code path
    NotImplemented,
    /// Task failed on vCenter; message carries the remote fault verbatim
    TaskError,
    /// Timeout (HTTP, shutdown wait, IP wait)
    Timeout,
    /// Wait aborted through the connection context
    Cancelled,
    /// HTTP / API error with status code
    ApiError(u16),
    /// Permission denied (403)
    AccessDenied,
    /// JSON parse / deserialization error
    ParseError,
    /// Generic
    Other,
}

impl VmwareErrorKind {
    /// Whether this kind reports a violated precondition detected locally,
    /// before anything was submitted.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::AlreadyExists
                | Self::NoSnapshotForLinkedClone
                | Self::UnsupportedControllerKind
                | Self::UnsupportedDeviceKind
                | Self::InvalidDiskSize
                | Self::InvalidHardware
                | Self::ControllerNotFound
                | Self::DeviceOrdering
        )
    }
}

/// Crate error type carrying a kind + human-readable message.
#[derive(Debug, Clone)]
pub struct VmwareError {
    pub kind: VmwareErrorKind,
    pub message: String,
    /// Remote fault type name (`_typeName` of the fault) for task failures.
    pub fault: Option<String>,
}

impl VmwareError {
    pub fn new(kind: VmwareErrorKind, msg: impl Into<String>) -> Self {
        Self { kind, message: msg.into(), fault: None }
    }

    pub fn connection(msg: impl Into<String>) -> Self {
        Self::new(VmwareErrorKind::ConnectionError, msg)
    }

    pub fn auth(msg: impl Into<String>) -> Self {
        Self::new(VmwareErrorKind::AuthenticationError, msg)
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(VmwareErrorKind::NotFound, msg)
    }

    pub fn already_exists(msg: impl Into<String>) -> Self {
        Self::new(VmwareErrorKind::AlreadyExists, msg)
    }

    pub fn api(status: u16, msg: impl Into<String>) -> Self {
        Self::new(VmwareErrorKind::ApiError(status), msg)
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::new(VmwareErrorKind::ParseError, msg)
    }

    /// Remote task failure. `fault` is the remote fault type, if reported.
    pub fn task(fault: Option<String>, msg: impl Into<String>) -> Self {
        Self { kind: VmwareErrorKind::TaskError, message: msg.into(), fault }
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::new(VmwareErrorKind::Timeout, msg)
    }

    pub fn cancelled(operation: &str) -> Self {
        Self::new(VmwareErrorKind::Cancelled, format!("{operation} cancelled"))
    }

    pub fn not_implemented(msg: impl Into<String>) -> Self {
        Self::new(VmwareErrorKind::NotImplemented, msg)
    }

    pub fn is_precondition(&self) -> bool {
        self.kind.is_precondition()
    }
}

impl fmt::Display for VmwareError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}", self.kind, self.message)?;
        if let Some(ref fault) = self.fault {
            write!(f, " ({fault})")?;
        }
        Ok(())
    }
}

impl std::error::Error for VmwareError {}

impl From<VmwareError> for String {
    fn from(e: VmwareError) -> String {
        e.to_string()
    }
}

impl From<reqwest::Error> for VmwareError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::timeout(format!("HTTP timeout: {e}"))
        } else if e.is_connect() {
            Self::connection(format!("Connection failed: {e}"))
        } else {
            Self::new(VmwareErrorKind::Other, format!("HTTP error: {e}"))
        }
    }
}

impl From<serde_json::Error> for VmwareError {
    fn from(e: serde_json::Error) -> Self {
        Self::parse(format!("JSON parse error: {e}"))
    }
}

/// Convenience alias.
pub type VmwareResult<T> = Result<T, VmwareError>;
