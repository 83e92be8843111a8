// Licensed under the Apache-2.0 license

use crate::transport::PldmTransportError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RequesterBusError {
    #[error("a request is already outstanding for this endpoint/type/command")]
    AlreadyOutstanding,
    #[error("transport error: {0:?}")]
    Transport(PldmTransportError),
    #[error("no socket registered for this endpoint")]
    UnknownEndpoint,
}

#[derive(Error, Debug)]
pub enum UpdaterError {
    #[error("unexpected or malformed response")]
    Protocol,
    #[error(transparent)]
    Requester(#[from] RequesterBusError),
    #[error("no applicable components for this device")]
    NoApplicableComponents,
    #[error("max_transfer_size {0} is below the DSP0267 floor of {1} bytes")]
    TransferSizeTooSmall(u32, u32),
}

#[derive(Error, Debug)]
pub enum UpdateManagerError {
    #[error("a package is already activating")]
    Busy,
    #[error(transparent)]
    Parse(#[from] pldm_fw_pkg::ParseError),
    #[error("package does not match any discovered device")]
    NoMatchingDevice,
    #[error("unknown endpoint")]
    UnknownEndpoint,
    #[error(transparent)]
    Updater(#[from] UpdaterError),
}
