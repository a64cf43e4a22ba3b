//! Session usage errors
//!
//! Only caller mistakes surface here. Failures of the encryption gateway or
//! the chain end the pipeline in the `error` state instead.

use crate::session::SessionState;
use secretbox_primitives::Address;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Invalid selection: box {index} is outside 0..{number_of_boxes}")]
    InvalidSelection { index: u32, number_of_boxes: u8 },

    #[error("Session busy: a pipeline is already in {0}")]
    Busy(SessionState),

    /// The session was reset but the pipeline it left behind has not finished
    #[error("Session busy: previous pipeline still settling")]
    Settling,

    /// Another session is opening a box for the same identity
    #[error("Identity {0} already has a pipeline in flight")]
    IdentityBusy(Address),

    #[error("Session belongs to {session}, signer is {signer}")]
    IdentityMismatch { session: Address, signer: Address },

    #[error("No identity attached")]
    NoIdentity,
}

pub type SessionResult<T> = Result<T, SessionError>;
