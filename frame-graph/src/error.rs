use crate::access::{Access, PassKind};
use crate::handle::{PassId, ResourceHandle, ResourceKind};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompileError {
    #[error("Pass '{pass}': resource '{name}' is already registered this frame")]
    DuplicateResourceName { pass: String, name: String },

    #[error("Pass '{pass}': no pass writes resource '{name}' this frame")]
    UnresolvedResource { pass: String, name: String },

    #[error("Frame graph contains a dependency cycle through pass '{pass}'")]
    CycleDetected { pass: String },

    #[error("Resource handle {handle} does not belong to the current frame")]
    StaleOrUnknownHandle { handle: ResourceHandle },

    #[error("Pass '{pass}' is a {kind:?} pass and cannot declare {access:?}")]
    KindMismatch {
        pass: String,
        kind: PassKind,
        access: Access,
    },

    #[error("Pass '{pass}': {access:?} is not a valid {usage} access for '{name}'")]
    InvalidAccess {
        pass: String,
        name: String,
        access: Access,
        usage: &'static str,
    },

    #[error("Pass '{pass}': resource '{name}' is {actual:?} but {expected} was expected")]
    ResourceKindMismatch {
        pass: String,
        name: String,
        expected: &'static str,
        actual: ResourceKind,
    },

    #[error("Pass '{pass}': '{name}' is read as history but its descriptor does not keep history")]
    NotHistoryBuffer { pass: String, name: String },

    #[error("Pass {pass:?} does not exist in the current frame")]
    UnknownPass { pass: PassId },

    #[error("Frame is already compiled; execute or discard it before declaring or compiling again")]
    AlreadyCompiled,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecuteError {
    #[error("Frame graph must be compiled before it is executed")]
    NotCompiled,

    #[error("Pass '{pass}': resource {handle} has no {expected} bound this frame")]
    ResourceNotBound {
        pass: String,
        handle: ResourceHandle,
        expected: &'static str,
    },

    #[error("Pass '{pass}' failed: {message}")]
    PassFailed { pass: String, message: String },
}

pub type Result<T, E = CompileError> = std::result::Result<T, E>;
