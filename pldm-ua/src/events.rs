// Licensed under the Apache-2.0 license

//! Typed message-registry events a `DeviceUpdater` produces as it drives a device through an
//! update. The core only produces these; it never formats or emits them anywhere (no
//! logging duplication, no wire encoding) — that is the job of whatever sink the caller
//! wires up to `UpdateManager::drain_events`.

use crate::transport::EndpointId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageRegistryEvent {
    /// A device has been matched to a firmware device record and RequestUpdate was sent.
    TargetDetermined { endpoint: EndpointId },
    /// The device accepted UpdateComponent and the image transfer for this component began.
    TransferringToComponent {
        endpoint: EndpointId,
        component_index: usize,
    },
    /// TransferComplete reported failure, or the transfer watchdog expired.
    TransferFailed {
        endpoint: EndpointId,
        component_index: usize,
    },
    /// VerifyComplete reported failure.
    VerificationFailed {
        endpoint: EndpointId,
        component_index: usize,
    },
    /// ApplyComplete reported failure.
    ApplyFailed {
        endpoint: EndpointId,
        component_index: usize,
    },
    /// ActivateFirmware was sent and the device is waiting to be told to activate.
    AwaitToActivate { endpoint: EndpointId },
    /// ActivateFirmware was rejected by the device.
    ActivateFailed { endpoint: EndpointId },
    /// ActivateFirmware succeeded; the device's update is complete.
    UpdateSuccessful { endpoint: EndpointId },
}
