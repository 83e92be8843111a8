// Licensed under the Apache-2.0 license

mod common;

use common::{
    advance_to_pass_component, advance_to_transferring, advance_to_update_component,
    apply_response, receive_request, send_response, single_component_manifest,
    two_component_manifest,
};
use pldm_common::message::firmware_update::activate_fw::{
    ActivateFirmwareRequest, ActivateFirmwareResponse,
};
use pldm_common::message::firmware_update::apply_complete::{
    ApplyCompleteRequest, ApplyResult,
};
use pldm_common::message::firmware_update::transfer_complete::{
    TransferCompleteRequest, TransferResult,
};
use pldm_common::message::firmware_update::update_component::UpdateComponentRequest;
use pldm_common::message::firmware_update::verify_complete::{
    VerifyCompleteRequest, VerifyResult,
};
use pldm_common::protocol::base::PldmMsgType;
use pldm_common::protocol::firmware_update::{ComponentActivationMethods, FwUpdateCmd};
use pldm_ua::device_updater::{DeviceUpdater, Outcome, State};
use pldm_ua::requester_bus::RequesterBus;
use pldm_ua::transport::PldmSocket;
use std::time::Instant;

/// Drives a single-component updater through RequestUpdate/PassComponentTable/UpdateComponent
/// up to `Transferring(0)`.
fn advance_single_component_to_transferring(
    manifest: pldm_fw_pkg::manifest::FirmwareManifest,
) -> (
    DeviceUpdater,
    RequesterBus<common::MockPldmSocket>,
    common::MockPldmSocket,
) {
    let (mut updater, mut bus, fd_sock) = common::single_device_updater(manifest);
    let now = Instant::now();
    advance_to_pass_component(&mut updater, &mut bus, &fd_sock, now);
    advance_to_update_component(&mut updater, &mut bus, &fd_sock, now, 1);
    advance_to_transferring(&mut updater, &mut bus, &fd_sock, now);
    (updater, bus, fd_sock)
}

fn send_transfer_complete(
    updater: &mut DeviceUpdater,
    bus: &mut RequesterBus<common::MockPldmSocket>,
    fd_sock: &common::MockPldmSocket,
    now: Instant,
    result: TransferResult,
) -> Outcome {
    use pldm_common::codec::PldmCodec;
    let request = TransferCompleteRequest::new(0, PldmMsgType::Request, result);
    let mut buffer = [0u8; 64];
    let size = request.encode(&mut buffer).unwrap();
    fd_sock.send(&buffer[..size]).unwrap();
    let packet = updater.try_receive(bus).expect("request queued");
    updater.on_packet(bus, now, &packet).unwrap()
}

fn send_verify_complete(
    updater: &mut DeviceUpdater,
    bus: &mut RequesterBus<common::MockPldmSocket>,
    fd_sock: &common::MockPldmSocket,
    now: Instant,
    result: VerifyResult,
) -> Outcome {
    use pldm_common::codec::PldmCodec;
    let request = VerifyCompleteRequest::new(0, PldmMsgType::Request, result);
    let mut buffer = [0u8; 64];
    let size = request.encode(&mut buffer).unwrap();
    fd_sock.send(&buffer[..size]).unwrap();
    let packet = updater.try_receive(bus).expect("request queued");
    updater.on_packet(bus, now, &packet).unwrap()
}

/// Plays ApplyComplete and, since a successful apply defers its next send (ActivateFirmware or
/// the next UpdateComponent) to the following tick, runs that tick before returning so callers
/// can immediately check for the request it queued.
fn send_apply_complete(
    updater: &mut DeviceUpdater,
    bus: &mut RequesterBus<common::MockPldmSocket>,
    fd_sock: &common::MockPldmSocket,
    now: Instant,
    result: ApplyResult,
    activation_methods: ComponentActivationMethods,
) -> Outcome {
    use pldm_common::codec::PldmCodec;
    let request = ApplyCompleteRequest::new(0, PldmMsgType::Request, result, activation_methods);
    let mut buffer = [0u8; 64];
    let size = request.encode(&mut buffer).unwrap();
    fd_sock.send(&buffer[..size]).unwrap();
    let packet = updater.try_receive(bus).expect("request queued");
    let outcome = updater.on_packet(bus, now, &packet).unwrap();
    updater.poll(bus, now).unwrap();
    outcome
}

#[test]
fn successful_transfer_moves_to_verify() {
    common::init_logging();
    let manifest = single_component_manifest(0, Vec::new());
    let (mut updater, mut bus, fd_sock) = advance_single_component_to_transferring(manifest);
    let now = Instant::now();

    let outcome = send_transfer_complete(
        &mut updater,
        &mut bus,
        &fd_sock,
        now,
        TransferResult::TransferSuccess,
    );
    assert_eq!(outcome, Outcome::None);
    assert_eq!(updater.state(), State::AwaitingVerifyComplete(0));
}

#[test]
fn failed_transfer_fails_the_device() {
    common::init_logging();
    let manifest = single_component_manifest(0, Vec::new());
    let (mut updater, mut bus, fd_sock) = advance_single_component_to_transferring(manifest);
    let now = Instant::now();

    let outcome = send_transfer_complete(
        &mut updater,
        &mut bus,
        &fd_sock,
        now,
        TransferResult::TransferErrorImageCorrupt,
    );
    assert_eq!(outcome, Outcome::Finished(false));
    assert!(updater.is_done());
}

#[test]
fn successful_verify_moves_to_apply() {
    common::init_logging();
    let manifest = single_component_manifest(0, Vec::new());
    let (mut updater, mut bus, fd_sock) = advance_single_component_to_transferring(manifest);
    let now = Instant::now();
    send_transfer_complete(&mut updater, &mut bus, &fd_sock, now, TransferResult::TransferSuccess);

    let outcome =
        send_verify_complete(&mut updater, &mut bus, &fd_sock, now, VerifyResult::VerifySuccess);
    assert_eq!(outcome, Outcome::None);
    assert_eq!(updater.state(), State::AwaitingApplyComplete(0));
}

#[test]
fn failed_verify_fails_the_device() {
    common::init_logging();
    let manifest = single_component_manifest(0, Vec::new());
    let (mut updater, mut bus, fd_sock) = advance_single_component_to_transferring(manifest);
    let now = Instant::now();
    send_transfer_complete(&mut updater, &mut bus, &fd_sock, now, TransferResult::TransferSuccess);

    let outcome = send_verify_complete(
        &mut updater,
        &mut bus,
        &fd_sock,
        now,
        VerifyResult::VerifyErrorVerificationFailure,
    );
    assert_eq!(outcome, Outcome::Finished(false));
    assert!(updater.is_done());
}

#[test]
fn successful_apply_of_last_component_sends_activate() {
    common::init_logging();
    let manifest = single_component_manifest(0, Vec::new());
    let (mut updater, mut bus, fd_sock) = advance_single_component_to_transferring(manifest);
    let now = Instant::now();
    send_transfer_complete(&mut updater, &mut bus, &fd_sock, now, TransferResult::TransferSuccess);
    send_verify_complete(&mut updater, &mut bus, &fd_sock, now, VerifyResult::VerifySuccess);

    let outcome = send_apply_complete(
        &mut updater,
        &mut bus,
        &fd_sock,
        now,
        ApplyResult::ApplySuccess,
        ComponentActivationMethods(0),
    );
    assert_eq!(outcome, Outcome::ComponentApplied(0));
    assert_eq!(updater.state(), State::AwaitingActivate);

    let activate: ActivateFirmwareRequest =
        receive_request(&fd_sock, FwUpdateCmd::ActivateFirmware as u8);
    assert_eq!(activate.self_contained_activation_req, 0);
}

#[test]
fn apply_with_activation_method_requests_self_contained_activation() {
    common::init_logging();
    let manifest = single_component_manifest(0, Vec::new());
    let (mut updater, mut bus, fd_sock) = advance_single_component_to_transferring(manifest);
    let now = Instant::now();
    send_transfer_complete(&mut updater, &mut bus, &fd_sock, now, TransferResult::TransferSuccess);
    send_verify_complete(&mut updater, &mut bus, &fd_sock, now, VerifyResult::VerifySuccess);

    // bit 1 (self_contained) set
    send_apply_complete(
        &mut updater,
        &mut bus,
        &fd_sock,
        now,
        ApplyResult::ApplySuccessWithActivationMethod,
        ComponentActivationMethods(0x0002),
    );

    let activate: ActivateFirmwareRequest =
        receive_request(&fd_sock, FwUpdateCmd::ActivateFirmware as u8);
    assert_eq!(activate.self_contained_activation_req, 1);
}

#[test]
fn failed_apply_fails_the_device() {
    common::init_logging();
    let manifest = single_component_manifest(0, Vec::new());
    let (mut updater, mut bus, fd_sock) = advance_single_component_to_transferring(manifest);
    let now = Instant::now();
    send_transfer_complete(&mut updater, &mut bus, &fd_sock, now, TransferResult::TransferSuccess);
    send_verify_complete(&mut updater, &mut bus, &fd_sock, now, VerifyResult::VerifySuccess);

    let outcome = send_apply_complete(
        &mut updater,
        &mut bus,
        &fd_sock,
        now,
        ApplyResult::ApplyFailureMemoryIssue,
        ComponentActivationMethods(0),
    );
    assert_eq!(outcome, Outcome::Finished(false));
    assert!(updater.is_done());
}

#[test]
fn successful_activation_finishes_the_update() {
    common::init_logging();
    let manifest = single_component_manifest(0, Vec::new());
    let (mut updater, mut bus, fd_sock) = advance_single_component_to_transferring(manifest);
    let now = Instant::now();
    send_transfer_complete(&mut updater, &mut bus, &fd_sock, now, TransferResult::TransferSuccess);
    send_verify_complete(&mut updater, &mut bus, &fd_sock, now, VerifyResult::VerifySuccess);
    send_apply_complete(
        &mut updater,
        &mut bus,
        &fd_sock,
        now,
        ApplyResult::ApplySuccess,
        ComponentActivationMethods(0),
    );

    let request: ActivateFirmwareRequest =
        receive_request(&fd_sock, FwUpdateCmd::ActivateFirmware as u8);
    let response = ActivateFirmwareResponse::new(request.hdr.instance_id(), 0, 0);
    send_response(&fd_sock, &response);
    let outcome = apply_response(&mut updater, &mut bus, &fd_sock, now);
    assert_eq!(outcome, Outcome::Finished(true));
    assert_eq!(updater.state(), State::Done(true));
    assert!(updater.is_done());
}

#[test]
fn rejected_activation_fails_the_device() {
    common::init_logging();
    let manifest = single_component_manifest(0, Vec::new());
    let (mut updater, mut bus, fd_sock) = advance_single_component_to_transferring(manifest);
    let now = Instant::now();
    send_transfer_complete(&mut updater, &mut bus, &fd_sock, now, TransferResult::TransferSuccess);
    send_verify_complete(&mut updater, &mut bus, &fd_sock, now, VerifyResult::VerifySuccess);
    send_apply_complete(
        &mut updater,
        &mut bus,
        &fd_sock,
        now,
        ApplyResult::ApplySuccess,
        ComponentActivationMethods(0),
    );

    let request: ActivateFirmwareRequest =
        receive_request(&fd_sock, FwUpdateCmd::ActivateFirmware as u8);
    let response = ActivateFirmwareResponse::new(request.hdr.instance_id(), 1, 0);
    send_response(&fd_sock, &response);
    let outcome = apply_response(&mut updater, &mut bus, &fd_sock, now);
    assert_eq!(outcome, Outcome::Finished(false));
    assert_eq!(updater.state(), State::Done(false));
}

#[test]
fn applying_a_non_final_component_advances_to_the_next_update_component() {
    common::init_logging();
    let manifest = two_component_manifest([0, 0], [Vec::new(), Vec::new()]);
    let (mut updater, mut bus, fd_sock) = common::single_device_updater(manifest);
    let now = Instant::now();
    advance_to_pass_component(&mut updater, &mut bus, &fd_sock, now);
    advance_to_update_component(&mut updater, &mut bus, &fd_sock, now, 2);
    advance_to_transferring(&mut updater, &mut bus, &fd_sock, now);
    send_transfer_complete(&mut updater, &mut bus, &fd_sock, now, TransferResult::TransferSuccess);
    send_verify_complete(&mut updater, &mut bus, &fd_sock, now, VerifyResult::VerifySuccess);

    let outcome = send_apply_complete(
        &mut updater,
        &mut bus,
        &fd_sock,
        now,
        ApplyResult::ApplySuccess,
        ComponentActivationMethods(0),
    );
    assert_eq!(outcome, Outcome::ComponentApplied(0));
    assert_eq!(updater.state(), State::AwaitingUpdateComponent(1));

    let _: UpdateComponentRequest = receive_request(&fd_sock, FwUpdateCmd::UpdateComponent as u8);
}

#[test]
fn stalled_transfer_expires_via_the_watchdog() {
    common::init_logging();
    let manifest = single_component_manifest(64, vec![0u8; 64]);
    let (mut updater, mut bus, _fd_sock) = advance_single_component_to_transferring(manifest);
    let start = Instant::now();

    // UA_T2 watchdog is armed on entering Transferring; no RequestFirmwareData ever arrives.
    let far_future = start + std::time::Duration::from_secs(120);
    let outcome = updater.poll(&mut bus, far_future).unwrap();
    assert_eq!(outcome, Outcome::Finished(false));
    assert!(updater.is_done());
}
