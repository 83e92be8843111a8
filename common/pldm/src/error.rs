// Licensed under the Apache-2.0 license

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PldmError {
    #[error("invalid message type")]
    InvalidMsgType,
    #[error("unsupported command")]
    UnsupportedCmd,
    #[error("unsupported pldm type")]
    UnsupportedPldmType,
    #[error("invalid completion code")]
    InvalidCompletionCode,
    #[error("invalid transfer response flag")]
    InvalidTransferRespFlag,

    #[error("invalid version string type")]
    InvalidVersionStringType,
    #[error("invalid version string length")]
    InvalidVersionStringLength,
    #[error("invalid component classification")]
    InvalidComponentClassification,
    #[error("invalid component response code")]
    InvalidComponentResponseCode,
    #[error("invalid component compatibility response")]
    InvalidComponentCompatibilityResponse,
    #[error("invalid component compatibility response code")]
    InvalidComponentCompatibilityResponseCode,
    #[error("invalid transfer result")]
    InvalidTransferResult,
    #[error("invalid verify result")]
    InvalidVerifyResult,
    #[error("invalid apply result")]
    InvalidApplyResult,
}
