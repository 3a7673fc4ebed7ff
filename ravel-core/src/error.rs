//! The closed error taxonomy every fallible core operation returns.

/// Every fallible operation in the core returns success or exactly one of
/// these. There is no free-form error text in the core.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RavelError {
    #[error("process filesystem is unavailable")]
    ProcFsUnavailable,
    #[error("permission denied")]
    PermissionDenied,
    #[error("process not found")]
    ProcessNotFound,
    #[error("invalid address")]
    InvalidAddress,
    #[error("out of memory")]
    OutOfMemory,
    #[error("read failed")]
    ReadFailed,
    #[error("write failed")]
    WriteFailed,
    #[error("partial read")]
    PartialRead,
}

pub type RavelResult<T> = Result<T, RavelError>;
