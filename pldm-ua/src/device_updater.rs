// Licensed under the Apache-2.0 license

//! Drives one device through RequestUpdate, PassComponentTable, and the per-component
//! UpdateComponent/transfer/Verify/Apply cycle, finishing with ActivateFirmware.
//!
//! The former update state machine modeled this with `smlang`'s flat state idents, since
//! it shared one instance across a discovery phase that no longer exists here. The states
//! below carry the in-progress component index directly (`Transferring(2)` rather than
//! `Transferring` plus a side table), which doesn't fit smlang's transition table without
//! threading an extra guard/context object through every arm; a plain enum says the same
//! thing with less indirection once there's no discovery phase left to share it with.

use crate::config::RuntimeConfig;
use crate::error::UpdaterError;
use crate::events::MessageRegistryEvent;
use crate::package_stream::PackageStreamReader;
use crate::requester_bus::{RequesterBus, RequesterEvent};
use crate::timer::Timer;
use crate::transport::{EndpointId, PldmSocket, RxPacket, MAX_PLDM_PAYLOAD_SIZE};
use log::{debug, info, warn};
use pldm_common::codec::{CompletionCode, PldmCodec};
use pldm_common::message::firmware_update::activate_fw::{
    ActivateFirmwareRequest, ActivateFirmwareResponse, SelfContainedActivationRequest,
};
use pldm_common::message::firmware_update::apply_complete::{
    ApplyCompleteRequest, ApplyCompleteResponse, ApplyResult,
};
use pldm_common::message::firmware_update::pass_component::{
    PassComponentTableRequest, PassComponentTableResponse,
};
use pldm_common::message::firmware_update::request_fw_data::{
    RequestFirmwareDataRequest, RequestFirmwareDataResponse,
};
use pldm_common::message::firmware_update::request_update::{
    RequestUpdateRequest, RequestUpdateResponse,
};
use pldm_common::message::firmware_update::transfer_complete::{
    TransferCompleteRequest, TransferCompleteResponse, TransferResult,
};
use pldm_common::message::firmware_update::update_component::{
    UpdateComponentRequest, UpdateComponentResponse,
};
use pldm_common::message::firmware_update::verify_complete::{
    VerifyCompleteRequest, VerifyCompleteResponse, VerifyResult,
};
use pldm_common::protocol::base::{
    InstanceId, PldmBaseCompletionCode, PldmMsgHeader, PldmMsgType, PldmSupportedType,
    TransferRespFlag, PLDM_MSG_HEADER_LEN,
};
use pldm_common::protocol::firmware_update::{
    ComponentActivationMethods, ComponentClassification, FwUpdateCmd, FwUpdateCompletionCode,
    PldmFirmwareString, UpdateOptionFlags, PLDM_FWUP_BASELINE_TRANSFER_SIZE,
};
use pldm_fw_pkg::manifest::{ComponentImageInformation, FirmwareManifest};
use std::rc::Rc;
use std::time::{Duration, Instant};

const MIN_OUTSTANDING_TRANSFER_REQUESTS: u8 = 1;

type Header = PldmMsgHeader<[u8; PLDM_MSG_HEADER_LEN]>;

/// Where one device's update stands. The `usize` carried by most variants indexes into
/// `applicable`, the ordered list of component indices this FDR names, not the package's
/// raw component table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    AwaitingRequestUpdate,
    AwaitingPassComponent(usize),
    AwaitingUpdateComponent(usize),
    Transferring(usize),
    AwaitingVerifyComplete(usize),
    AwaitingApplyComplete(usize),
    AwaitingActivate,
    Done(bool),
}

/// What happened as a result of a `start`/`on_packet`/`poll` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing observable happened.
    None,
    /// A component finished applying; the device is moving on to the next one (or to
    /// ActivateFirmware). Carries the applicable-list index of the component that finished.
    ComponentApplied(usize),
    /// The whole update for this device is over.
    Finished(bool),
}

/// A state advance decided while handling a device request/response but not yet acted on.
/// `on_device_request`/`on_device_response` record one of these instead of calling
/// `send_pass_component`/`send_update_component`/`send_activate` inline; `poll` is the only
/// place that actually sends, one tick later, so a handler never both reacts to a message and
/// issues the next one in the same call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PendingAdvance {
    PassComponent(usize),
    UpdateComponent(usize),
    Activate,
}

pub struct DeviceUpdater {
    endpoint: EndpointId,
    manifest: Rc<FirmwareManifest>,
    fdr_index: usize,
    applicable: Vec<usize>,
    state: State,
    pending_advance: Option<PendingAdvance>,
    watchdog: Timer,
    ua_t2: Duration,
    max_transfer_size: u32,
    proceed_on_may_be_updateable: bool,
    bytes_served: u32,
    pending_activation_method: Option<ComponentActivationMethods>,
    events: Vec<MessageRegistryEvent>,
}

impl DeviceUpdater {
    pub fn new(
        endpoint: EndpointId,
        manifest: Rc<FirmwareManifest>,
        fdr_index: usize,
        config: RuntimeConfig,
        proceed_on_may_be_updateable: bool,
    ) -> Result<Self, UpdaterError> {
        let config = config.validate()?;
        let applicable = manifest.firmware_device_id_records[fdr_index]
            .applicable_components
            .clone()
            .unwrap_or_default();
        if applicable.is_empty() {
            return Err(UpdaterError::NoApplicableComponents);
        }
        Ok(DeviceUpdater {
            endpoint,
            manifest,
            fdr_index,
            applicable: applicable.into_iter().map(|i| i as usize).collect(),
            state: State::Idle,
            pending_advance: None,
            watchdog: Timer::new(),
            ua_t2: config.ua_t2,
            max_transfer_size: config.max_transfer_size,
            proceed_on_may_be_updateable,
            bytes_served: 0,
            pending_activation_method: None,
            events: Vec::new(),
        })
    }

    /// Drains the message-registry events produced since the last call. The core never
    /// formats or emits these itself; a caller-supplied sink is expected to consume them.
    pub fn drain_events(&mut self) -> Vec<MessageRegistryEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn endpoint(&self) -> EndpointId {
        self.endpoint
    }

    pub fn bytes_served(&self) -> u32 {
        self.bytes_served
    }

    pub fn is_done(&self) -> bool {
        matches!(self.state, State::Done(_))
    }

    fn component(&self, applicable_index: usize) -> &ComponentImageInformation {
        let component_index = self.applicable[applicable_index];
        &self.manifest.component_image_information[component_index]
    }

    fn version_string(component: &ComponentImageInformation) -> PldmFirmwareString {
        let str_type = component.version_string_type.to_string();
        let version = component.version_string.clone().unwrap_or_default();
        PldmFirmwareString::new(&str_type, &version)
            .unwrap_or_else(|_| PldmFirmwareString::new("ASCII", "").expect("empty string encodes"))
    }

    fn image_set_version_string(&self) -> PldmFirmwareString {
        let fdr = &self.manifest.firmware_device_id_records[self.fdr_index];
        let str_type = fdr.component_image_set_version_string_type.to_string();
        let version = fdr
            .component_image_set_version_string
            .clone()
            .unwrap_or_default();
        PldmFirmwareString::new(&str_type, &version)
            .unwrap_or_else(|_| PldmFirmwareString::new("ASCII", "").expect("empty string encodes"))
    }

    fn transfer_flag(&self, applicable_index: usize) -> TransferRespFlag {
        let is_first = applicable_index == 0;
        let is_last = applicable_index + 1 == self.applicable.len();
        match (is_first, is_last) {
            (true, true) => TransferRespFlag::StartAndEnd,
            (true, false) => TransferRespFlag::Start,
            (false, true) => TransferRespFlag::End,
            (false, false) => TransferRespFlag::Middle,
        }
    }

    /// Starts the update by issuing RequestUpdate. Must be called exactly once from `Idle`.
    pub fn start<S: PldmSocket>(
        &mut self,
        bus: &mut RequesterBus<S>,
        now: Instant,
    ) -> Result<(), UpdaterError> {
        if self.state != State::Idle {
            return Err(UpdaterError::Protocol);
        }
        let fdr = &self.manifest.firmware_device_id_records[self.fdr_index];
        let pkg_data_len = fdr
            .firmware_device_package_data
            .as_ref()
            .map(|d| d.len() as u16)
            .unwrap_or(0);
        let instance_id = bus.peek_instance_id(self.endpoint)?;
        let request = RequestUpdateRequest::new(
            instance_id,
            PldmMsgType::Request,
            self.max_transfer_size,
            self.applicable.len() as u16,
            MIN_OUTSTANDING_TRANSFER_REQUESTS,
            pkg_data_len,
            &self.image_set_version_string(),
        );
        self.send(bus, now, FwUpdateCmd::RequestUpdate as u8, &request)?;
        self.state = State::AwaitingRequestUpdate;
        self.events.push(MessageRegistryEvent::TargetDetermined {
            endpoint: self.endpoint,
        });
        Ok(())
    }

    fn send<S: PldmSocket, C: PldmCodec>(
        &mut self,
        bus: &mut RequesterBus<S>,
        now: Instant,
        command: u8,
        message: &C,
    ) -> Result<(), UpdaterError> {
        let mut buffer = [0u8; MAX_PLDM_PAYLOAD_SIZE];
        let size = message.encode(&mut buffer).map_err(|_| UpdaterError::Protocol)?;
        bus.send(self.endpoint, now, PldmSupportedType::FwUpdate, command, &buffer[..size])?;
        Ok(())
    }

    fn reply<S: PldmSocket, C: PldmCodec>(
        &self,
        bus: &RequesterBus<S>,
        message: &C,
    ) -> Result<(), UpdaterError> {
        let mut buffer = [0u8; MAX_PLDM_PAYLOAD_SIZE];
        let size = message.encode(&mut buffer).map_err(|_| UpdaterError::Protocol)?;
        bus.reply_raw(self.endpoint, &buffer[..size])?;
        Ok(())
    }

    fn fail(&mut self, reason: &str, event: MessageRegistryEvent) -> Outcome {
        warn!("device updater for {:?}: {reason}", self.endpoint);
        self.state = State::Done(false);
        self.pending_advance = None;
        self.events.push(event);
        Outcome::Finished(false)
    }

    /// Like `fail`, for rejections the message registry has no dedicated event for (e.g. a
    /// RequestUpdate or PassComponentTable rejection, which precede any per-component event).
    fn fail_untyped(&mut self, reason: &str) -> Outcome {
        warn!("device updater for {:?}: {reason}", self.endpoint);
        self.state = State::Done(false);
        self.pending_advance = None;
        Outcome::Finished(false)
    }

    fn send_pass_component<S: PldmSocket>(
        &mut self,
        bus: &mut RequesterBus<S>,
        now: Instant,
        index: usize,
    ) -> Result<(), UpdaterError> {
        let component = self.component(index);
        let classification = ComponentClassification::try_from(component.classification)
            .map_err(|_| UpdaterError::Protocol)?;
        let version = Self::version_string(component);
        let request = PassComponentTableRequest::new(
            bus.peek_instance_id(self.endpoint)?,
            PldmMsgType::Request,
            self.transfer_flag(index),
            classification,
            component.identifier,
            index as u8,
            component.comparison_stamp.unwrap_or(0),
            &version,
        );
        self.send(bus, now, FwUpdateCmd::PassComponentTable as u8, &request)?;
        self.state = State::AwaitingPassComponent(index);
        Ok(())
    }

    fn send_update_component<S: PldmSocket>(
        &mut self,
        bus: &mut RequesterBus<S>,
        now: Instant,
        index: usize,
    ) -> Result<(), UpdaterError> {
        let component = self.component(index);
        let classification = ComponentClassification::try_from(component.classification)
            .map_err(|_| UpdaterError::Protocol)?;
        let version = Self::version_string(component);
        let request = UpdateComponentRequest::new(
            bus.peek_instance_id(self.endpoint)?,
            PldmMsgType::Request,
            classification,
            component.identifier,
            index as u8,
            component.comparison_stamp.unwrap_or(0),
            component.size,
            UpdateOptionFlags(component.options as u32),
            &version,
        );
        self.send(bus, now, FwUpdateCmd::UpdateComponent as u8, &request)?;
        self.state = State::AwaitingUpdateComponent(index);
        Ok(())
    }

    fn send_activate<S: PldmSocket>(
        &mut self,
        bus: &mut RequesterBus<S>,
        now: Instant,
    ) -> Result<(), UpdaterError> {
        let self_contained = self
            .pending_activation_method
            .map(|methods| methods.self_contained())
            .unwrap_or(false);
        let request = ActivateFirmwareRequest::new(
            bus.peek_instance_id(self.endpoint)?,
            PldmMsgType::Request,
            if self_contained {
                SelfContainedActivationRequest::ActivateSelfContainedComponents
            } else {
                SelfContainedActivationRequest::NotActivateSelfContainedComponents
            },
        );
        self.send(bus, now, FwUpdateCmd::ActivateFirmware as u8, &request)?;
        self.state = State::AwaitingActivate;
        self.events.push(MessageRegistryEvent::AwaitToActivate {
            endpoint: self.endpoint,
        });
        Ok(())
    }

    /// Runs a state advance decided by an earlier `on_device_request`/`on_device_response`
    /// call, if one is pending. Called from `poll`, never inline from a handler.
    fn run_pending_advance<S: PldmSocket>(
        &mut self,
        bus: &mut RequesterBus<S>,
        now: Instant,
    ) -> Result<(), UpdaterError> {
        match self.pending_advance.take() {
            Some(PendingAdvance::PassComponent(index)) => self.send_pass_component(bus, now, index),
            Some(PendingAdvance::UpdateComponent(index)) => {
                self.send_update_component(bus, now, index)
            }
            Some(PendingAdvance::Activate) => self.send_activate(bus, now),
            None => Ok(()),
        }
    }

    /// Feeds in an inbound packet addressed to this device. Returns `Ok(Outcome::None)` for
    /// any packet that doesn't match the command this updater is currently waiting on.
    pub fn on_packet<S: PldmSocket>(
        &mut self,
        bus: &mut RequesterBus<S>,
        now: Instant,
        packet: &RxPacket,
    ) -> Result<Outcome, UpdaterError> {
        if packet.src != self.endpoint {
            return Ok(Outcome::None);
        }
        let bytes = &packet.payload.data[..packet.payload.len];
        let header: Header = PldmMsgHeader::decode(bytes).map_err(|_| UpdaterError::Protocol)?;
        if !header.is_hdr_ver_valid() {
            return Err(UpdaterError::Protocol);
        }
        if header.is_request() {
            self.on_device_request(bus, now, &header, bytes)
        } else {
            self.on_device_response(bus, now, &header, bytes)
        }
    }

    fn on_device_request<S: PldmSocket>(
        &mut self,
        bus: &mut RequesterBus<S>,
        now: Instant,
        header: &Header,
        bytes: &[u8],
    ) -> Result<Outcome, UpdaterError> {
        let cmd = FwUpdateCmd::try_from(header.cmd_code()).map_err(|_| UpdaterError::Protocol)?;
        match (self.state, cmd) {
            (State::Transferring(index), FwUpdateCmd::RequestFirmwareData) => {
                self.watchdog.schedule(now, self.ua_t2);
                let request = RequestFirmwareDataRequest::decode(bytes)
                    .map_err(|_| UpdaterError::Protocol)?;
                self.serve_firmware_data(bus, header.instance_id(), index, request.offset, request.length)
            }
            (State::Transferring(index), FwUpdateCmd::TransferComplete) => {
                self.watchdog.cancel();
                let request = TransferCompleteRequest::decode(bytes)
                    .map_err(|_| UpdaterError::Protocol)?;
                let response = TransferCompleteResponse::new(
                    header.instance_id(),
                    PldmBaseCompletionCode::Success as u8,
                );
                self.reply(bus, &response)?;
                if request.tranfer_result == TransferResult::TransferSuccess as u8 {
                    self.state = State::AwaitingVerifyComplete(index);
                    Ok(Outcome::None)
                } else {
                    Ok(self.fail(
                        "device reported transfer failure",
                        MessageRegistryEvent::TransferFailed {
                            endpoint: self.endpoint,
                            component_index: index,
                        },
                    ))
                }
            }
            (State::AwaitingVerifyComplete(index), FwUpdateCmd::VerifyComplete) => {
                let request = VerifyCompleteRequest::decode(bytes)
                    .map_err(|_| UpdaterError::Protocol)?;
                let response = VerifyCompleteResponse::new(
                    header.instance_id(),
                    PldmBaseCompletionCode::Success as u8,
                );
                self.reply(bus, &response)?;
                if request.verify_result == VerifyResult::VerifySuccess as u8 {
                    self.state = State::AwaitingApplyComplete(index);
                    Ok(Outcome::None)
                } else {
                    Ok(self.fail(
                        "device reported verification failure",
                        MessageRegistryEvent::VerificationFailed {
                            endpoint: self.endpoint,
                            component_index: index,
                        },
                    ))
                }
            }
            (State::AwaitingApplyComplete(index), FwUpdateCmd::ApplyComplete) => {
                let request = ApplyCompleteRequest::decode(bytes)
                    .map_err(|_| UpdaterError::Protocol)?;
                let response = ApplyCompleteResponse::new(
                    header.instance_id(),
                    PldmBaseCompletionCode::Success as u8,
                );
                self.reply(bus, &response)?;

                let succeeded = request.apply_result == ApplyResult::ApplySuccess as u8
                    || request.apply_result == ApplyResult::ApplySuccessWithActivationMethod as u8;
                if !succeeded {
                    return Ok(self.fail(
                        "device reported apply failure",
                        MessageRegistryEvent::ApplyFailed {
                            endpoint: self.endpoint,
                            component_index: index,
                        },
                    ));
                }
                if request.apply_result == ApplyResult::ApplySuccessWithActivationMethod as u8 {
                    let component = self.component(index);
                    self.pending_activation_method =
                        Some(ComponentActivationMethods(component.requested_activation_method));
                }

                // The next request (ActivateFirmware or the next UpdateComponent) is sent on
                // the next `poll` tick, not from inside this handler.
                self.pending_advance = Some(if index + 1 == self.applicable.len() {
                    PendingAdvance::Activate
                } else {
                    PendingAdvance::UpdateComponent(index + 1)
                });
                Ok(Outcome::ComponentApplied(index))
            }
            _ => Err(UpdaterError::Protocol),
        }
    }

    fn serve_firmware_data<S: PldmSocket>(
        &mut self,
        bus: &RequesterBus<S>,
        instance_id: InstanceId,
        index: usize,
        offset: u32,
        length: u32,
    ) -> Result<Outcome, UpdaterError> {
        let component = self.component(index);
        let component_size = component.size;
        let baseline = PLDM_FWUP_BASELINE_TRANSFER_SIZE as u32;

        if length < baseline || length > self.max_transfer_size {
            let response = RequestFirmwareDataResponse::new(
                instance_id,
                FwUpdateCompletionCode::InvalidTransferLength as u8,
                &[],
            );
            self.reply(bus, &response)?;
            return Ok(Outcome::None);
        }
        if offset.saturating_add(length) > component_size.saturating_add(baseline) {
            let response = RequestFirmwareDataResponse::new(
                instance_id,
                FwUpdateCompletionCode::DataOutOfRange as u8,
                &[],
            );
            self.reply(bus, &response)?;
            return Ok(Outcome::None);
        }

        let mut payload = vec![0u8; length as usize];
        let data = component.image_data.as_deref().unwrap_or(&[]);
        let reader = PackageStreamReader::new(data);
        let served = reader.read(&mut payload, offset, length);
        self.bytes_served += served as u32;

        let response =
            RequestFirmwareDataResponse::new(instance_id, PldmBaseCompletionCode::Success as u8, &payload);
        self.reply(bus, &response)?;
        Ok(Outcome::None)
    }

    fn on_device_response<S: PldmSocket>(
        &mut self,
        bus: &mut RequesterBus<S>,
        now: Instant,
        header: &Header,
        bytes: &[u8],
    ) -> Result<Outcome, UpdaterError> {
        let cmd = FwUpdateCmd::try_from(header.cmd_code()).map_err(|_| UpdaterError::Protocol)?;
        if !bus.matches(self.endpoint, header.instance_id(), PldmSupportedType::FwUpdate, cmd as u8) {
            return Ok(Outcome::None);
        }
        bus.complete(self.endpoint);

        match (self.state, cmd) {
            (State::AwaitingRequestUpdate, FwUpdateCmd::RequestUpdate) => {
                let response =
                    RequestUpdateResponse::decode(bytes).map_err(|_| UpdaterError::Protocol)?;
                if !response.is_success() {
                    return Ok(self.fail_untyped("device rejected RequestUpdate"));
                }
                self.pending_advance = Some(PendingAdvance::PassComponent(0));
                Ok(Outcome::None)
            }
            (State::AwaitingPassComponent(index), FwUpdateCmd::PassComponentTable) => {
                let response = PassComponentTableResponse::decode(bytes)
                    .map_err(|_| UpdaterError::Protocol)?;
                if !response.is_success() {
                    return Ok(self.fail_untyped("device rejected PassComponentTable"));
                }
                // comp_resp: 0 = CanBeUpdated, 1 = MayBeUpdateable (gated by policy), else reject.
                let may_proceed = match response.comp_resp {
                    0 => true,
                    1 => self.proceed_on_may_be_updateable,
                    _ => false,
                };
                if !may_proceed {
                    return Ok(self.fail_untyped("component rejected by PassComponentTable"));
                }
                self.pending_advance = Some(if index + 1 == self.applicable.len() {
                    PendingAdvance::UpdateComponent(0)
                } else {
                    PendingAdvance::PassComponent(index + 1)
                });
                Ok(Outcome::None)
            }
            (State::AwaitingUpdateComponent(index), FwUpdateCmd::UpdateComponent) => {
                let response = UpdateComponentResponse::decode(bytes)
                    .map_err(|_| UpdaterError::Protocol)?;
                if !response.is_success() || response.fixed.comp_compatibility_resp != 0 {
                    return Ok(self.fail_untyped("device rejected UpdateComponent"));
                }
                self.bytes_served = 0;
                self.watchdog.schedule(now, self.ua_t2);
                self.state = State::Transferring(index);
                self.events.push(MessageRegistryEvent::TransferringToComponent {
                    endpoint: self.endpoint,
                    component_index: index,
                });
                Ok(Outcome::None)
            }
            (State::AwaitingActivate, FwUpdateCmd::ActivateFirmware) => {
                let response =
                    ActivateFirmwareResponse::decode(bytes).map_err(|_| UpdaterError::Protocol)?;
                if !response.is_success() {
                    return Ok(self.fail(
                        "device rejected ActivateFirmware",
                        MessageRegistryEvent::ActivateFailed {
                            endpoint: self.endpoint,
                        },
                    ));
                }
                info!("device updater for {:?}: activation complete", self.endpoint);
                self.state = State::Done(true);
                self.events.push(MessageRegistryEvent::UpdateSuccessful {
                    endpoint: self.endpoint,
                });
                Ok(Outcome::Finished(true))
            }
            _ => Err(UpdaterError::Protocol),
        }
    }

    /// Polls this device's socket for one inbound packet without blocking. Returns `None`
    /// once nothing is ready; a caller drains this in a loop before advancing timers.
    pub fn try_receive<S: PldmSocket>(&self, bus: &RequesterBus<S>) -> Option<RxPacket> {
        match bus.try_receive(self.endpoint) {
            Ok(packet) => packet,
            Err(err) => {
                warn!("device updater for {:?}: transport error: {err:?}", self.endpoint);
                None
            }
        }
    }

    /// Runs any deferred state advance, then advances retry/expiry timers and the UA_T2
    /// watchdog. Call every event-loop tick.
    pub fn poll<S: PldmSocket>(
        &mut self,
        bus: &mut RequesterBus<S>,
        now: Instant,
    ) -> Result<Outcome, UpdaterError> {
        if self.pending_advance.is_some() {
            self.run_pending_advance(bus, now)?;
            return Ok(Outcome::None);
        }
        if let State::Transferring(index) = self.state {
            if self.watchdog.is_expired(now) {
                return Ok(self.fail(
                    "UA_T2 watchdog expired waiting for RequestFirmwareData",
                    MessageRegistryEvent::TransferFailed {
                        endpoint: self.endpoint,
                        component_index: index,
                    },
                ));
            }
        }
        match bus.poll(self.endpoint, now)? {
            Some(RequesterEvent::Expired) => {
                let reason = "request expired without a response";
                Ok(match self.state {
                    State::Transferring(index) => self.fail(
                        reason,
                        MessageRegistryEvent::TransferFailed {
                            endpoint: self.endpoint,
                            component_index: index,
                        },
                    ),
                    State::AwaitingVerifyComplete(index) => self.fail(
                        reason,
                        MessageRegistryEvent::VerificationFailed {
                            endpoint: self.endpoint,
                            component_index: index,
                        },
                    ),
                    State::AwaitingApplyComplete(index) => self.fail(
                        reason,
                        MessageRegistryEvent::ApplyFailed {
                            endpoint: self.endpoint,
                            component_index: index,
                        },
                    ),
                    State::AwaitingActivate => self.fail(
                        reason,
                        MessageRegistryEvent::ActivateFailed {
                            endpoint: self.endpoint,
                        },
                    ),
                    _ => self.fail_untyped(reason),
                })
            }
            Some(RequesterEvent::Retried) => {
                debug!("device updater for {:?}: retried outstanding request", self.endpoint);
                Ok(Outcome::None)
            }
            None => Ok(Outcome::None),
        }
    }
}
