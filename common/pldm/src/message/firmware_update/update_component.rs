// Licensed under the Apache-2.0 license

use crate::codec::{decode_fixed, encode_fixed_with_tail, CompletionCode, PldmCodec, PldmCodecError};
use crate::protocol::base::{
    InstanceId, PldmMsgHeader, PldmMsgType, PldmSupportedType, PLDM_MSG_HEADER_LEN,
};
use crate::protocol::firmware_update::{
    ComponentClassification, ComponentCompatibilityResponse, ComponentCompatibilityResponseCode,
    FwUpdateCmd, PldmFirmwareString, UpdateOptionFlags, PLDM_FWUP_IMAGE_SET_VER_STR_MAX_LEN,
};
use zerocopy::{FromBytes, Immutable, IntoBytes};

#[derive(Debug, Clone, FromBytes, IntoBytes, Immutable, PartialEq)]
#[repr(C, packed)]
pub struct UpdateComponentRequestFixed {
    pub hdr: PldmMsgHeader<[u8; PLDM_MSG_HEADER_LEN]>,
    pub comp_classification: u16,
    pub comp_identifier: u16,
    pub comp_classification_index: u8,
    pub comp_comparison_stamp: u32,
    pub comp_image_size: u32,
    pub update_option_flags: u32,
    pub comp_ver_str_type: u8,
    pub comp_ver_str_len: u8,
}

#[derive(Debug, Clone, PartialEq)]
#[repr(C)]
pub struct UpdateComponentRequest {
    pub fixed: UpdateComponentRequestFixed,
    pub comp_ver_str: [u8; PLDM_FWUP_IMAGE_SET_VER_STR_MAX_LEN],
}

#[allow(clippy::too_many_arguments)]
impl UpdateComponentRequest {
    pub fn new(
        instance_id: InstanceId,
        msg_type: PldmMsgType,
        comp_classification: ComponentClassification,
        comp_identifier: u16,
        comp_classification_index: u8,
        comp_comparison_stamp: u32,
        comp_image_size: u32,
        update_option_flags: UpdateOptionFlags,
        comp_version_string: &PldmFirmwareString,
    ) -> UpdateComponentRequest {
        UpdateComponentRequest {
            fixed: UpdateComponentRequestFixed {
                hdr: PldmMsgHeader::new(
                    instance_id,
                    msg_type,
                    PldmSupportedType::FwUpdate,
                    FwUpdateCmd::UpdateComponent as u8,
                ),
                comp_classification: comp_classification as u16,
                comp_identifier,
                comp_classification_index,
                comp_comparison_stamp,
                comp_image_size,
                update_option_flags: update_option_flags.0,
                comp_ver_str_type: comp_version_string.str_type,
                comp_ver_str_len: comp_version_string.str_len,
            },
            comp_ver_str: {
                let mut arr = [0u8; PLDM_FWUP_IMAGE_SET_VER_STR_MAX_LEN];
                let len = comp_version_string.str_data.len();
                arr[..len].copy_from_slice(&comp_version_string.str_data);
                arr
            },
        }
    }

    fn codec_size_in_bytes(&self) -> usize {
        let mut bytes = 0;
        bytes += core::mem::size_of::<UpdateComponentRequestFixed>();
        bytes += self.fixed.comp_ver_str_len as usize;
        bytes
    }
}

impl PldmCodec for UpdateComponentRequest {
    fn encode(&self, buffer: &mut [u8]) -> Result<usize, PldmCodecError> {
        let str_len = self.fixed.comp_ver_str_len as usize;
        encode_fixed_with_tail(&self.fixed, &self.comp_ver_str[..str_len], buffer)
    }

    fn decode(buffer: &[u8]) -> Result<Self, PldmCodecError> {
        let (fixed, offset): (UpdateComponentRequestFixed, usize) = decode_fixed(buffer)?;

        let str_len = fixed.comp_ver_str_len as usize;
        let mut comp_ver_str = [0u8; PLDM_FWUP_IMAGE_SET_VER_STR_MAX_LEN];
        comp_ver_str[..str_len].copy_from_slice(
            buffer
                .get(offset..offset + str_len)
                .ok_or(PldmCodecError::BufferTooShort)?,
        );
        Ok(UpdateComponentRequest {
            fixed,
            comp_ver_str,
        })
    }
}

#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, PartialEq)]
#[repr(C, packed)]
pub struct UpdateComponentResponseFixed {
    pub hdr: PldmMsgHeader<[u8; PLDM_MSG_HEADER_LEN]>,
    pub completion_code: u8,
    pub comp_compatibility_resp: u8,
    pub comp_compatibility_resp_code: u8,
    pub update_option_flags_enabled: u32,
    pub time_before_req_fw_data: u16,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateComponentResponse {
    pub fixed: UpdateComponentResponseFixed,
    // Present only when `update_option_flags_enabled` has the component-opaque-data bit set.
    pub get_comp_opaque_data_max_transfer_size: Option<u32>,
}

impl UpdateComponentResponse {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        instance_id: InstanceId,
        completion_code: u8,
        comp_compatibility_resp: ComponentCompatibilityResponse,
        comp_compatibility_resp_code: ComponentCompatibilityResponseCode,
        update_option_flags_enabled: UpdateOptionFlags,
        time_before_req_fw_data: u16,
        get_comp_opaque_data_max_transfer_size: Option<u32>,
    ) -> UpdateComponentResponse {
        UpdateComponentResponse {
            fixed: UpdateComponentResponseFixed {
                hdr: PldmMsgHeader::new(
                    instance_id,
                    PldmMsgType::Response,
                    PldmSupportedType::FwUpdate,
                    FwUpdateCmd::UpdateComponent as u8,
                ),
                completion_code,
                comp_compatibility_resp: comp_compatibility_resp as u8,
                comp_compatibility_resp_code: comp_compatibility_resp_code as u8,
                update_option_flags_enabled: update_option_flags_enabled.0,
                time_before_req_fw_data,
            },
            get_comp_opaque_data_max_transfer_size,
        }
    }

    fn codec_size_in_bytes(&self) -> usize {
        let mut bytes = core::mem::size_of::<UpdateComponentResponseFixed>();
        if self.get_comp_opaque_data_max_transfer_size.is_some() {
            bytes += core::mem::size_of::<u32>();
        }
        bytes
    }
}

impl CompletionCode for UpdateComponentResponse {
    fn completion_code(&self) -> u8 {
        self.fixed.completion_code
    }
}

impl PldmCodec for UpdateComponentResponse {
    fn encode(&self, buffer: &mut [u8]) -> Result<usize, PldmCodecError> {
        let tail = self
            .get_comp_opaque_data_max_transfer_size
            .map(u32::to_le_bytes)
            .unwrap_or_default();
        let tail_len = if self.get_comp_opaque_data_max_transfer_size.is_some() {
            tail.len()
        } else {
            0
        };
        encode_fixed_with_tail(&self.fixed, &tail[..tail_len], buffer)
    }

    fn decode(buffer: &[u8]) -> Result<Self, PldmCodecError> {
        let (fixed, offset): (UpdateComponentResponseFixed, usize) = decode_fixed(buffer)?;
        let update_option_flags = UpdateOptionFlags(fixed.update_option_flags_enabled);

        let get_comp_opaque_data_max_transfer_size = if update_option_flags.component_opaque_data()
        {
            let bytes = buffer
                .get(offset..offset + core::mem::size_of::<u32>())
                .ok_or(PldmCodecError::BufferTooShort)?;
            Some(u32::from_le_bytes(bytes.try_into().unwrap()))
        } else {
            None
        };

        Ok(UpdateComponentResponse {
            fixed,
            get_comp_opaque_data_max_transfer_size,
        })
    }
}
