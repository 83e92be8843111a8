// Licensed under the Apache-2.0 license

//! Runtime knobs collected in one place rather than scattered as free constants, so a
//! deployment can retune retry/timeout behavior without touching call sites.

use crate::error::UpdaterError;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RuntimeConfig {
    /// Upper bound on the payload a RequestFirmwareData response may carry.
    pub max_transfer_size: u32,
    /// Additional sends attempted after the first, before an outstanding request expires.
    pub request_retries: u8,
    /// Delay before a request missing a response is retried.
    pub response_timeout: Duration,
    /// Overall time an instance id may stay allocated waiting for a response.
    pub instance_id_expiry: Duration,
    /// Watchdog window the device is given between RequestFirmwareData calls.
    pub ua_t2: Duration,
}

pub const MIN_TRANSFER_SIZE: u32 = 64;

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            max_transfer_size: 4096,
            request_retries: 2,
            response_timeout: Duration::from_millis(100),
            instance_id_expiry: Duration::from_secs(5),
            ua_t2: Duration::from_secs(60),
        }
    }
}

impl RuntimeConfig {
    /// Rejects a `max_transfer_size` below the DSP0267 floor rather than silently raising it:
    /// a caller that configured a transfer size that small has a bug worth surfacing, not a
    /// value worth correcting on its behalf. The codec layer enforces the same floor on the
    /// wire (`length < PLDM_FWUP_BASELINE_TRANSFER_SIZE`), so this check keeps configuration
    /// and wire validation consistent.
    pub fn validate(self) -> Result<Self, UpdaterError> {
        if self.max_transfer_size < MIN_TRANSFER_SIZE {
            return Err(UpdaterError::TransferSizeTooSmall(
                self.max_transfer_size,
                MIN_TRANSFER_SIZE,
            ));
        }
        Ok(self)
    }
}
