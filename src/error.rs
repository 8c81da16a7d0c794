use thiserror::Error;

use crate::block::{BlockId, ConnectionId};
use crate::connection::ConnectionKind;

/// Recoverable failures of a connect attempt. The drag handler treats these
/// as "snap refused", not as crashes; `Ok(None)` from `try_connect` remains
/// the ordinary no-candidate outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConnectError {
    #[error("connection kinds {0:?} and {1:?} cannot pair")]
    IncompatibleKind(ConnectionKind, ConnectionKind),
    #[error("connection {0:?} already has a target")]
    AlreadyConnected(ConnectionId),
    #[error("block {0:?} is already attached to a parent")]
    AlreadyHasParent(BlockId),
    #[error("both connections belong to the same block stack")]
    SelfConnection,
}

/// Navigator contract violations. These indicate a caller bug (querying a
/// block the renderer never assigned to a group), not a user-facing state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum NavigateError {
    #[error("block {0:?} is not registered with any render group")]
    DetachedBlock(BlockId),
}
