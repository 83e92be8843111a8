// Licensed under the Apache-2.0 license
#![allow(dead_code)]


use log::{error, LevelFilter};
use pldm_common::codec::PldmCodec;
use pldm_common::protocol::base::PldmMsgHeader;
use pldm_fw_pkg::manifest::{
    ComponentImageInformation, Descriptor, DescriptorType, FirmwareDeviceIdRecord,
    FirmwareManifest, StringType,
};
use pldm_ua::config::RuntimeConfig;
use pldm_ua::descriptor_matcher::DeviceCapabilities;
use pldm_common::protocol::firmware_update::Descriptor as WireDescriptor;
use pldm_ua::device_updater::DeviceUpdater;
use pldm_ua::requester_bus::RequesterBus;
use pldm_ua::transport::{EndpointId, PldmSocket, PldmTransport};
use simple_logger::SimpleLogger;

pub use mock_transport::{MockPldmSocket, MockTransport};

pub const TEST_UUID: [u8; 16] = [
    0x12, 0x34, 0x56, 0x78, 0x9A, 0xBC, 0xDE, 0xF0, 0x12, 0x34, 0x56, 0x78, 0x9A, 0xBC, 0xDE, 0xF0,
];

pub const UA_ENDPOINT: EndpointId = EndpointId(0x01);
pub const FD_ENDPOINT: EndpointId = EndpointId(0x02);

pub fn init_logging() {
    let _ = SimpleLogger::new().with_level(LevelFilter::Debug).init();
}

/// A minimal single-component package, matching a device that advertises `TEST_UUID`.
pub fn single_component_manifest(
    component_size: u32,
    image_data: Vec<u8>,
) -> FirmwareManifest {
    FirmwareManifest {
        firmware_device_id_records: vec![FirmwareDeviceIdRecord {
            initial_descriptor: Descriptor {
                descriptor_type: DescriptorType::Uuid,
                descriptor_data: TEST_UUID.to_vec(),
            },
            component_image_set_version_string_type: StringType::Utf8,
            component_image_set_version_string: Some("1.1.0".to_string()),
            applicable_components: Some(vec![0]),
            ..Default::default()
        }],
        component_image_information: vec![ComponentImageInformation {
            classification: 0x000A, // Firmware
            identifier: 0x0001,
            comparison_stamp: Some(2),
            version_string_type: StringType::Utf8,
            version_string: Some("1.2.0".to_string()),
            size: component_size,
            image_data: Some(image_data),
            ..Default::default()
        }],
        ..Default::default()
    }
}

/// A two-component package, matching the same device as `single_component_manifest`.
pub fn two_component_manifest(sizes: [u32; 2], image_data: [Vec<u8>; 2]) -> FirmwareManifest {
    let [size_a, size_b] = sizes;
    let [data_a, data_b] = image_data;
    FirmwareManifest {
        firmware_device_id_records: vec![FirmwareDeviceIdRecord {
            initial_descriptor: Descriptor {
                descriptor_type: DescriptorType::Uuid,
                descriptor_data: TEST_UUID.to_vec(),
            },
            component_image_set_version_string_type: StringType::Utf8,
            component_image_set_version_string: Some("1.1.0".to_string()),
            applicable_components: Some(vec![0, 1]),
            ..Default::default()
        }],
        component_image_information: vec![
            ComponentImageInformation {
                classification: 0x000A, // Firmware
                identifier: 0x0001,
                comparison_stamp: Some(2),
                version_string_type: StringType::Utf8,
                version_string: Some("1.2.0".to_string()),
                size: size_a,
                image_data: Some(data_a),
                ..Default::default()
            },
            ComponentImageInformation {
                classification: 0x0001, // Other
                identifier: 0x0003,
                comparison_stamp: Some(2),
                version_string_type: StringType::Utf8,
                version_string: Some("1.2.0".to_string()),
                size: size_b,
                image_data: Some(data_b),
                ..Default::default()
            },
        ],
        ..Default::default()
    }
}

pub fn device_capabilities() -> DeviceCapabilities {
    let mut data = [0u8; 64];
    data[..16].copy_from_slice(&TEST_UUID);
    DeviceCapabilities {
        descriptors: vec![WireDescriptor {
            descriptor_type: DescriptorType::Uuid as u16,
            descriptor_length: 16,
            descriptor_data: data,
        }],
    }
}

/// Builds a `DeviceUpdater` plus the shared `RequesterBus` and the device-side mock socket
/// used to play the device part of the protocol from test code.
pub fn single_device_updater(
    manifest: FirmwareManifest,
) -> (DeviceUpdater, RequesterBus<MockPldmSocket>, MockPldmSocket) {
    device_updater_with(manifest, RuntimeConfig::default(), false)
}

pub fn device_updater_with(
    manifest: FirmwareManifest,
    config: RuntimeConfig,
    proceed_on_may_be_updateable: bool,
) -> (DeviceUpdater, RequesterBus<MockPldmSocket>, MockPldmSocket) {
    use std::rc::Rc;

    let transport = MockTransport::new();
    let ua_sock = transport.create_socket(UA_ENDPOINT, FD_ENDPOINT).unwrap();
    let fd_sock = transport.create_socket(FD_ENDPOINT, UA_ENDPOINT).unwrap();

    let mut bus = RequesterBus::new(
        config.request_retries,
        config.response_timeout,
        config.instance_id_expiry,
    );
    bus.register(FD_ENDPOINT, ua_sock);

    let manifest = Rc::new(manifest);
    let updater = DeviceUpdater::new(FD_ENDPOINT, manifest, 0, config, proceed_on_may_be_updateable)
        .unwrap();
    (updater, bus, fd_sock)
}

/// Pulls the next inbound packet from `socket`, decodes it as `P`, and asserts its command
/// code matches `cmd_code`. Panics if nothing is queued, since the mock transport never
/// blocks: a missing packet means the device updater didn't send what the test expected.
pub fn receive_request<P: PldmCodec>(socket: &MockPldmSocket, cmd_code: u8) -> P {
    let packet = socket
        .try_receive()
        .unwrap()
        .expect("expected a queued request, found none");
    let bytes = &packet.payload.data[..packet.payload.len];
    let header = PldmMsgHeader::decode(bytes).expect("malformed header");
    if !header.is_hdr_ver_valid() {
        panic!("invalid header version");
    }
    if header.cmd_code() != cmd_code {
        error!(
            "expected command {cmd_code}, got {}",
            header.cmd_code()
        );
        panic!("unexpected command code");
    }
    P::decode(bytes).expect("failed to decode request body")
}

pub fn send_response<P: PldmCodec>(socket: &MockPldmSocket, response: &P) {
    let mut buffer = [0u8; 4096];
    let size = response.encode(&mut buffer).unwrap();
    socket.send(&buffer[..size]).unwrap();
}

/// Feeds `updater` whatever response is next on `fd_sock` and applies it, then runs `poll`
/// once so any deferred state advance the response triggered (the next PassComponentTable,
/// UpdateComponent, or ActivateFirmware) is actually sent before this returns.
pub fn apply_response(
    updater: &mut DeviceUpdater,
    bus: &mut RequesterBus<MockPldmSocket>,
    fd_sock: &MockPldmSocket,
    now: std::time::Instant,
) -> pldm_ua::device_updater::Outcome {
    let packet = updater.try_receive(bus).expect("response queued");
    let outcome = updater.on_packet(bus, now, &packet).unwrap();
    updater.poll(bus, now).unwrap();
    outcome
}

/// Drives `updater` through `start` and a successful RequestUpdate exchange, leaving it at
/// `AwaitingPassComponent(0)`.
pub fn advance_to_pass_component(
    updater: &mut DeviceUpdater,
    bus: &mut RequesterBus<MockPldmSocket>,
    fd_sock: &MockPldmSocket,
    now: std::time::Instant,
) {
    use pldm_common::message::firmware_update::request_update::{
        RequestUpdateRequest, RequestUpdateResponse,
    };
    use pldm_common::protocol::base::PldmBaseCompletionCode;
    use pldm_common::protocol::firmware_update::FwUpdateCmd;

    updater.start(bus, now).unwrap();
    let request: RequestUpdateRequest =
        receive_request(fd_sock, FwUpdateCmd::RequestUpdate as u8);
    let response = RequestUpdateResponse::new(
        request.fixed.hdr.instance_id(),
        PldmBaseCompletionCode::Success as u8,
        0,
        0,
        None,
    );
    send_response(fd_sock, &response);
    apply_response(updater, bus, fd_sock, now);
}

/// Drives `updater` through PassComponentTable for every applicable component, leaving it at
/// `AwaitingUpdateComponent(0)`.
pub fn advance_to_update_component(
    updater: &mut DeviceUpdater,
    bus: &mut RequesterBus<MockPldmSocket>,
    fd_sock: &MockPldmSocket,
    now: std::time::Instant,
    component_count: usize,
) {
    use pldm_common::message::firmware_update::pass_component::{
        PassComponentTableRequest, PassComponentTableResponse,
    };
    use pldm_common::protocol::firmware_update::{ComponentResponse, ComponentResponseCode, FwUpdateCmd};

    for _ in 0..component_count {
        let request: PassComponentTableRequest =
            receive_request(fd_sock, FwUpdateCmd::PassComponentTable as u8);
        let response = PassComponentTableResponse::new(
            request.fixed.hdr.instance_id(),
            0,
            ComponentResponse::CompCanBeUpdated,
            ComponentResponseCode::CompCanBeUpdated,
        );
        send_response(fd_sock, &response);
        apply_response(updater, bus, fd_sock, now);
    }
}

/// Drives `updater` through a successful UpdateComponent exchange for `index`, leaving it at
/// `Transferring(index)`.
pub fn advance_to_transferring(
    updater: &mut DeviceUpdater,
    bus: &mut RequesterBus<MockPldmSocket>,
    fd_sock: &MockPldmSocket,
    now: std::time::Instant,
) {
    use pldm_common::message::firmware_update::update_component::{
        UpdateComponentRequest, UpdateComponentResponse,
    };
    use pldm_common::protocol::firmware_update::{
        ComponentCompatibilityResponse, ComponentCompatibilityResponseCode, FwUpdateCmd,
        UpdateOptionFlags,
    };

    let request: UpdateComponentRequest =
        receive_request(fd_sock, FwUpdateCmd::UpdateComponent as u8);
    let response = UpdateComponentResponse::new(
        request.fixed.hdr.instance_id(),
        0,
        ComponentCompatibilityResponse::CompCanBeUpdated,
        ComponentCompatibilityResponseCode::NoResponseCode,
        UpdateOptionFlags(0),
        0,
        None,
    );
    send_response(fd_sock, &response);
    apply_response(updater, bus, fd_sock, now);
}
