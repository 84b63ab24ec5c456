use crate::{ErrorCode, Permission};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The scanning service refused to start a scan.
    #[error("scan could not be started: {0}")]
    StartFailed(ErrorCode),

    #[error("permission not granted: {0:?}")]
    PermissionDenied(Permission),

    #[error("bluetooth adapter {0} not found")]
    AdapterNotFound(usize),

    #[error(transparent)]
    Btleplug(#[from] btleplug::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
