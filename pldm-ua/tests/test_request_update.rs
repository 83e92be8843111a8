// Licensed under the Apache-2.0 license

mod common;

use common::{receive_request, send_response, single_component_manifest, single_device_updater};
use pldm_common::message::firmware_update::pass_component::PassComponentTableRequest;
use pldm_common::message::firmware_update::request_update::{
    RequestUpdateRequest, RequestUpdateResponse,
};
use pldm_common::protocol::base::PldmBaseCompletionCode;
use pldm_common::protocol::firmware_update::FwUpdateCmd;
use pldm_ua::device_updater::{Outcome, State};
use std::time::Instant;

#[test]
fn accepted_request_update_advances_to_pass_component() {
    common::init_logging();
    let manifest = single_component_manifest(0, Vec::new());
    let (mut updater, mut bus, fd_sock) = single_device_updater(manifest);

    let now = Instant::now();
    updater.start(&mut bus, now).unwrap();
    assert_eq!(updater.state(), State::AwaitingRequestUpdate);

    let request: RequestUpdateRequest =
        receive_request(&fd_sock, FwUpdateCmd::RequestUpdate as u8);

    let response = RequestUpdateResponse::new(
        request.fixed.hdr.instance_id(),
        PldmBaseCompletionCode::Success as u8,
        0,
        0,
        None,
    );
    send_response(&fd_sock, &response);

    let packet = updater.try_receive(&bus).expect("response queued");
    let outcome = updater.on_packet(&mut bus, now, &packet).unwrap();
    assert_eq!(outcome, Outcome::None);

    // PassComponentTable is sent on the next tick, not inline from on_packet.
    updater.poll(&mut bus, now).unwrap();
    assert_eq!(updater.state(), State::AwaitingPassComponent(0));

    let _: PassComponentTableRequest =
        receive_request(&fd_sock, FwUpdateCmd::PassComponentTable as u8);
}

#[test]
fn rejected_request_update_finishes_unsuccessfully() {
    common::init_logging();
    let manifest = single_component_manifest(0, Vec::new());
    let (mut updater, mut bus, fd_sock) = single_device_updater(manifest);

    let now = Instant::now();
    updater.start(&mut bus, now).unwrap();

    let request: RequestUpdateRequest =
        receive_request(&fd_sock, FwUpdateCmd::RequestUpdate as u8);
    let response = RequestUpdateResponse::new(
        request.fixed.hdr.instance_id(),
        PldmBaseCompletionCode::Error as u8,
        0,
        0,
        None,
    );
    send_response(&fd_sock, &response);

    let packet = updater.try_receive(&bus).expect("response queued");
    let outcome = updater.on_packet(&mut bus, now, &packet).unwrap();
    assert_eq!(outcome, Outcome::Finished(false));
    assert!(updater.is_done());
}

#[test]
fn request_update_without_a_response_expires() {
    common::init_logging();
    let manifest = single_component_manifest(0, Vec::new());
    let (mut updater, mut bus, fd_sock) = single_device_updater(manifest);

    let start = Instant::now();
    updater.start(&mut bus, start).unwrap();
    let _: RequestUpdateRequest = receive_request(&fd_sock, FwUpdateCmd::RequestUpdate as u8);

    // Default config allows 2 retries at 100ms each before the instance id itself expires
    // at 5s; drive poll() well past that with no response ever sent.
    let far_future = start + std::time::Duration::from_secs(10);
    let outcome = updater.poll(&mut bus, far_future).unwrap();
    assert_eq!(outcome, Outcome::Finished(false));
    assert!(updater.is_done());
}
