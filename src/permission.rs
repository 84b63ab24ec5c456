//! Permissions that have to be granted before scanning.
//!
//! Acquiring permissions is up to the application. The scanner never checks
//! them itself; call [`require_permissions`] before [`Scanner::start`].
//!
//! [`Scanner::start`]: crate::Scanner::start

use crate::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    BluetoothScan,
    BluetoothConnect,
    FineLocation,
    BackgroundLocation,
}

impl Permission {
    /// Permissions needed for a foreground BLE scan.
    pub const SCAN: &'static [Permission] = &[Permission::BluetoothScan, Permission::FineLocation];
}

/// Source of truth for granted permissions.
pub trait PermissionGate {
    fn is_granted(&self, permission: Permission) -> bool;
}

impl<F> PermissionGate for F
where
    F: Fn(Permission) -> bool,
{
    fn is_granted(&self, permission: Permission) -> bool {
        self(permission)
    }
}

/// Fails with the first permission that has not been granted.
pub fn require_permissions(
    gate: &impl PermissionGate,
    permissions: &[Permission],
) -> Result<(), Error> {
    match permissions.iter().find(|p| !gate.is_granted(**p)) {
        Some(denied) => {
            log::warn!("Permission not granted: {:?}", denied);
            Err(Error::PermissionDenied(*denied))
        }
        None => Ok(()),
    }
}
