// Licensed under the Apache-2.0 license

//! Decides which firmware device ID record (FDR) in a package applies to which discovered
//! device, by descriptor-set inclusion: a device matches an FDR iff every descriptor the FDR
//! names is also present, byte-for-byte, in the device's discovered descriptor set.

use crate::transport::EndpointId;
use pldm_common::protocol::firmware_update::Descriptor as WireDescriptor;
use pldm_fw_pkg::manifest::{Descriptor as PkgDescriptor, FirmwareDeviceIdRecord};

/// Descriptors a device reported during discovery (via QueryDeviceIdentifiers), kept
/// read-only for the lifetime of an update session.
#[derive(Debug, Clone, Default)]
pub struct DeviceCapabilities {
    pub descriptors: Vec<WireDescriptor>,
}

fn descriptor_present(needle: &PkgDescriptor, haystack: &[WireDescriptor]) -> bool {
    haystack.iter().any(|candidate| {
        candidate.descriptor_type == needle.descriptor_type as u16
            && candidate.descriptor_length as usize == needle.descriptor_data.len()
            && candidate.descriptor_data[..candidate.descriptor_length as usize]
                == needle.descriptor_data[..]
    })
}

/// Returns true iff every descriptor in the FDR's set (initial + additional) is present in
/// the device's discovered set. This is `R ⊆ D`, not an exact-set comparison.
pub fn fdr_matches_device(fdr: &FirmwareDeviceIdRecord, device: &DeviceCapabilities) -> bool {
    if !descriptor_present(&fdr.initial_descriptor, &device.descriptors) {
        return false;
    }
    if let Some(additional) = &fdr.additional_descriptors {
        for descriptor in additional {
            if !descriptor_present(descriptor, &device.descriptors) {
                return false;
            }
        }
    }
    true
}

/// For each discovered endpoint, returns the index of the first (lowest-index) FDR whose
/// descriptor set is included in that endpoint's descriptors. Endpoints with no match are
/// omitted. A single FDR may be returned for more than one endpoint.
pub fn match_endpoints(
    endpoints: &[(EndpointId, DeviceCapabilities)],
    fdrs: &[FirmwareDeviceIdRecord],
) -> Vec<(EndpointId, usize)> {
    let mut matches = Vec::new();
    for (endpoint, capabilities) in endpoints {
        if let Some(index) = fdrs.iter().position(|fdr| fdr_matches_device(fdr, capabilities)) {
            matches.push((*endpoint, index));
        }
    }
    matches
}
