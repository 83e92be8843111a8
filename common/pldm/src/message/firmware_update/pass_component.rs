// Licensed under the Apache-2.0 license

use crate::codec::{decode_fixed, encode_fixed_with_tail, CompletionCode, PldmCodec, PldmCodecError};
use crate::protocol::base::{
    InstanceId, PldmMsgHeader, PldmMsgType, PldmSupportedType, TransferRespFlag,
    PLDM_MSG_HEADER_LEN,
};
use crate::protocol::firmware_update::{
    ComponentClassification, ComponentResponse, ComponentResponseCode, FwUpdateCmd,
    PldmFirmwareString, PLDM_FWUP_IMAGE_SET_VER_STR_MAX_LEN,
};
use zerocopy::{FromBytes, Immutable, IntoBytes};

#[derive(Debug, Copy, Clone, PartialEq)]
#[repr(C)]
pub struct PassComponentTableRequest {
    pub fixed: PassComponentTableRequestFixed,
    pub comp_ver_str: [u8; PLDM_FWUP_IMAGE_SET_VER_STR_MAX_LEN],
}

#[derive(Debug, Copy, Clone, FromBytes, IntoBytes, Immutable, PartialEq)]
#[repr(C, packed)]
pub struct PassComponentTableRequestFixed {
    pub hdr: PldmMsgHeader<[u8; PLDM_MSG_HEADER_LEN]>,
    pub transfer_flag: u8,
    pub comp_classification: u16,
    pub comp_identifier: u16,
    pub comp_classification_index: u8,
    pub comp_comparison_stamp: u32,
    pub comp_ver_str_type: u8,
    pub comp_ver_str_len: u8,
}

#[allow(clippy::too_many_arguments)]
impl PassComponentTableRequest {
    pub fn new(
        instance_id: InstanceId,
        msg_type: PldmMsgType,
        transfer_flag: TransferRespFlag,
        comp_classification: ComponentClassification,
        comp_identifier: u16,
        comp_classification_index: u8,
        comp_comparison_stamp: u32,
        comp_version_string: &PldmFirmwareString,
    ) -> PassComponentTableRequest {
        PassComponentTableRequest {
            fixed: PassComponentTableRequestFixed {
                hdr: PldmMsgHeader::new(
                    instance_id,
                    msg_type,
                    PldmSupportedType::FwUpdate,
                    FwUpdateCmd::PassComponentTable as u8,
                ),
                transfer_flag: transfer_flag as u8,
                comp_classification: comp_classification as u16,
                comp_identifier,
                comp_classification_index,
                comp_comparison_stamp,
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

    pub fn codec_size_in_bytes(&self) -> usize {
        let mut bytes = core::mem::size_of::<PassComponentTableRequestFixed>();
        bytes += self.fixed.comp_ver_str_len as usize;
        bytes
    }
}

impl PldmCodec for PassComponentTableRequest {
    fn encode(&self, buffer: &mut [u8]) -> Result<usize, PldmCodecError> {
        let str_len = self.fixed.comp_ver_str_len as usize;
        encode_fixed_with_tail(&self.fixed, &self.comp_ver_str[..str_len], buffer)
    }

    fn decode(buffer: &[u8]) -> Result<Self, PldmCodecError> {
        let (fixed, offset): (PassComponentTableRequestFixed, usize) = decode_fixed(buffer)?;

        let str_len = fixed.comp_ver_str_len as usize;
        let mut comp_ver_str = [0u8; PLDM_FWUP_IMAGE_SET_VER_STR_MAX_LEN];
        comp_ver_str[..str_len].copy_from_slice(
            buffer
                .get(offset..offset + str_len)
                .ok_or(PldmCodecError::BufferTooShort)?,
        );

        Ok(PassComponentTableRequest {
            fixed,
            comp_ver_str,
        })
    }
}
#[derive(Debug, Clone, FromBytes, IntoBytes, Immutable, PartialEq)]
#[repr(C, packed)]
pub struct PassComponentTableResponse {
    pub hdr: PldmMsgHeader<[u8; PLDM_MSG_HEADER_LEN]>,
    pub completion_code: u8,
    pub comp_resp: u8,
    pub comp_resp_code: u8,
}

impl PassComponentTableResponse {
    pub fn new(
        instance_id: InstanceId,
        completion_code: u8,
        comp_resp: ComponentResponse,
        comp_resp_code: ComponentResponseCode,
    ) -> PassComponentTableResponse {
        PassComponentTableResponse {
            hdr: PldmMsgHeader::new(
                instance_id,
                PldmMsgType::Response,
                PldmSupportedType::FwUpdate,
                FwUpdateCmd::PassComponentTable as u8,
            ),
            completion_code,
            comp_resp: comp_resp as u8,
            comp_resp_code: comp_resp_code as u8,
        }
    }
}

impl CompletionCode for PassComponentTableResponse {
    fn completion_code(&self) -> u8 {
        self.completion_code
    }
}
