// Licensed under the Apache-2.0 license

//! Owns package lifecycle, activation lifecycle, progress reporting, and inbound request
//! dispatch across every device a package applies to. This is the cooperative event loop
//! that replaces this lineage's two-OS-thread `PldmDaemon` (`rx_loop` + `event_loop` over
//! an `mpsc` channel into `Arc<Mutex<StateMachine<_>>>`): one thread, one `&mut self` call
//! per tick, no locks, because no two handlers ever run concurrently.

use crate::config::RuntimeConfig;
use crate::descriptor_matcher::{match_endpoints, DeviceCapabilities};
use crate::device_updater::{DeviceUpdater, Outcome};
use crate::error::UpdateManagerError;
use crate::events::MessageRegistryEvent;
use crate::requester_bus::RequesterBus;
use crate::transport::{EndpointId, PldmSocket, PldmTransport, RxPacket};
use log::{debug, info, warn};
use pldm_common::codec::PldmCodec;
use pldm_common::protocol::base::{PldmMsgHeader, PldmSupportedType, PLDM_MSG_HEADER_LEN};
use pldm_common::protocol::firmware_update::FwUpdateCompletionCode;
use pldm_fw_pkg::manifest::FirmwareManifest;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Instant;

type Header = PldmMsgHeader<[u8; PLDM_MSG_HEADER_LEN]>;

/// Where the package session currently stands. `Invalid` is terminal: only `clear()` moves
/// out of it, same as `Failed`/`Active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActivationPhase {
    #[default]
    NotReady,
    Ready,
    Activating,
    Active,
    Failed,
    Invalid,
}

/// What an observer can read off the manager at any point: the phase plus a 0-100 progress
/// value that only moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ActivationStatus {
    pub phase: ActivationPhase,
    pub progress_percent: u8,
    pub elapsed_millis: Option<u64>,
}

pub struct UpdateManager<S: PldmSocket, T: PldmTransport<S>> {
    transport: T,
    local_endpoint: EndpointId,
    config: RuntimeConfig,
    proceed_on_may_be_updateable: bool,
    endpoints: Vec<(EndpointId, DeviceCapabilities)>,
    phase: ActivationPhase,
    manifest: Option<Rc<FirmwareManifest>>,
    bus: RequesterBus<S>,
    updaters: Vec<DeviceUpdater>,
    total_component_updates: usize,
    completed_component_updates: usize,
    device_results: HashMap<EndpointId, bool>,
    start_time: Option<Instant>,
    elapsed_millis: Option<u64>,
    events: Vec<MessageRegistryEvent>,
}

impl<S: PldmSocket, T: PldmTransport<S>> UpdateManager<S, T> {
    /// `endpoints` is the caller's already-discovered device set: on-wire discovery
    /// (QueryDeviceIdentifiers, GetFirmwareParameters, PLDM-control enumeration) happens
    /// upstream of this manager and is out of scope for the core.
    pub fn new(
        transport: T,
        local_endpoint: EndpointId,
        config: RuntimeConfig,
        proceed_on_may_be_updateable: bool,
        endpoints: Vec<(EndpointId, DeviceCapabilities)>,
    ) -> Result<Self, UpdateManagerError> {
        let config = config.validate()?;
        let bus = RequesterBus::new(
            config.request_retries,
            config.response_timeout,
            config.instance_id_expiry,
        );
        Ok(UpdateManager {
            transport,
            local_endpoint,
            config,
            proceed_on_may_be_updateable,
            endpoints,
            phase: ActivationPhase::NotReady,
            manifest: None,
            bus,
            updaters: Vec::new(),
            total_component_updates: 0,
            completed_component_updates: 0,
            device_results: HashMap::new(),
            start_time: None,
            elapsed_millis: None,
            events: Vec::new(),
        })
    }

    pub fn status(&self) -> ActivationStatus {
        ActivationStatus {
            phase: self.phase,
            progress_percent: self.progress_percent(),
            elapsed_millis: self.elapsed_millis,
        }
    }

    /// Drains the message-registry events produced by every device since the last call.
    pub fn drain_events(&mut self) -> Vec<MessageRegistryEvent> {
        std::mem::take(&mut self.events)
    }

    fn progress_percent(&self) -> u8 {
        if self.total_component_updates == 0 {
            return 0;
        }
        let pct = (100 * self.completed_component_updates) / self.total_component_updates;
        pct.min(100) as u8
    }

    /// Returns the instance to `NotReady`, dropping any parsed package and device updaters.
    pub fn clear(&mut self) {
        self.phase = ActivationPhase::NotReady;
        self.manifest = None;
        self.updaters.clear();
        self.total_component_updates = 0;
        self.completed_component_updates = 0;
        self.device_results.clear();
        self.start_time = None;
        self.elapsed_millis = None;
    }

    /// Parses `package`, matches it against the discovered endpoint set, and constructs one
    /// `DeviceUpdater` per match. Leaves the manager `Ready` on success.
    pub fn accept_package(&mut self, package: &[u8]) -> Result<(), UpdateManagerError> {
        if self.phase == ActivationPhase::Activating {
            return Err(UpdateManagerError::Busy);
        }
        if matches!(
            self.phase,
            ActivationPhase::Active | ActivationPhase::Failed | ActivationPhase::Invalid
        ) {
            self.clear();
        }

        let manifest = match FirmwareManifest::parse(package) {
            Ok(manifest) => manifest,
            Err(err) => {
                warn!("update manager: package parse failed: {err}");
                self.phase = ActivationPhase::Invalid;
                return Err(UpdateManagerError::Parse(err));
            }
        };

        let matches = match_endpoints(&self.endpoints, &manifest.firmware_device_id_records);
        if matches.is_empty() {
            warn!("update manager: package matches no discovered device");
            self.phase = ActivationPhase::Invalid;
            return Err(UpdateManagerError::NoMatchingDevice);
        }

        let manifest = Rc::new(manifest);
        let mut updaters = Vec::with_capacity(matches.len());
        let mut total = 0usize;
        for (endpoint, fdr_index) in &matches {
            let socket = self
                .transport
                .create_socket(self.local_endpoint, *endpoint)
                .map_err(|_| UpdateManagerError::UnknownEndpoint)?;
            self.bus.register(*endpoint, socket);
            let updater = DeviceUpdater::new(
                *endpoint,
                manifest.clone(),
                *fdr_index,
                self.config,
                self.proceed_on_may_be_updateable,
            )?;
            total += manifest.firmware_device_id_records[*fdr_index]
                .applicable_components
                .as_ref()
                .map(|c| c.len())
                .unwrap_or(0);
            updaters.push(updater);
        }

        self.manifest = Some(manifest);
        self.updaters = updaters;
        self.total_component_updates = total;
        self.completed_component_updates = 0;
        self.device_results.clear();
        self.phase = ActivationPhase::Ready;
        info!(
            "update manager: package accepted, {} device(s) matched",
            matches.len()
        );
        Ok(())
    }

    /// Kicks off the update: issues RequestUpdate to every matched device.
    pub fn activate(&mut self, now: Instant) -> Result<(), UpdateManagerError> {
        if self.phase != ActivationPhase::Ready {
            return Err(UpdateManagerError::Busy);
        }
        self.start_time = Some(now);
        self.phase = ActivationPhase::Activating;
        for updater in &mut self.updaters {
            updater.start(&mut self.bus, now)?;
        }
        Ok(())
    }

    fn record_outcome(&mut self, now: Instant, endpoint: EndpointId, outcome: Outcome) {
        match outcome {
            Outcome::ComponentApplied(_) => {
                self.completed_component_updates += 1;
            }
            Outcome::Finished(success) => {
                debug!("update manager: device {endpoint:?} finished, success={success}");
                self.device_results.insert(endpoint, success);
                if self.device_results.len() == self.updaters.len() {
                    let all_succeeded = self.device_results.values().all(|ok| *ok);
                    self.phase = if all_succeeded {
                        ActivationPhase::Active
                    } else {
                        ActivationPhase::Failed
                    };
                    if let Some(start) = self.start_time {
                        self.elapsed_millis = Some(now.duration_since(start).as_millis() as u64);
                    }
                    info!(
                        "update manager: session complete, phase={:?} progress={}%",
                        self.phase,
                        self.progress_percent()
                    );
                }
            }
            Outcome::None => {}
        }
    }

    fn dispatch_packet(&mut self, now: Instant, packet: &RxPacket) {
        let Some(index) = self
            .updaters
            .iter()
            .position(|updater| updater.endpoint() == packet.src)
        else {
            self.reject_unexpected(packet, FwUpdateCompletionCode::CommandNotExpected as u8);
            return;
        };

        let outcome = match self.updaters[index].on_packet(&mut self.bus, now, packet) {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!("update manager: device {:?} protocol error: {err}", packet.src);
                self.reject_unexpected(packet, FwUpdateCompletionCode::CommandNotExpected as u8);
                Outcome::Finished(false)
            }
        };
        self.events.extend(self.updaters[index].drain_events());
        self.record_outcome(now, packet.src, outcome);
    }

    fn reject_unexpected(&self, packet: &RxPacket, completion_code: u8) {
        let bytes = &packet.payload.data[..packet.payload.len];
        let Ok(header) = Header::decode(bytes) else {
            return;
        };
        if !header.is_request() {
            return;
        }
        let response = pldm_common::protocol::base::PldmFailureResponse::new(
            header.instance_id(),
            PldmSupportedType::FwUpdate,
            header.cmd_code(),
            completion_code,
        );
        let mut buffer = [0u8; PLDM_MSG_HEADER_LEN + 1];
        if let Ok(size) = response.encode(&mut buffer) {
            if let Ok(socket) = self
                .transport
                .create_socket(self.local_endpoint, packet.src)
            {
                let _ = socket.send(&buffer[..size]);
            }
        }
    }

    /// Drains one pass of ready inbound packets across every device, then advances every
    /// device's retry/expiry/watchdog timers. Call on every loop tick with the caller's
    /// notion of "now".
    pub fn poll(&mut self, now: Instant) -> Result<(), UpdateManagerError> {
        if self.phase != ActivationPhase::Activating {
            return Ok(());
        }

        for index in 0..self.updaters.len() {
            loop {
                let packet = match self.updaters[index].try_receive(&self.bus) {
                    Some(packet) => packet,
                    None => break,
                };
                self.dispatch_packet(now, &packet);
                if self.phase != ActivationPhase::Activating {
                    return Ok(());
                }
            }
        }

        for index in 0..self.updaters.len() {
            let endpoint = self.updaters[index].endpoint();
            let outcome = match self.updaters[index].poll(&mut self.bus, now) {
                Ok(outcome) => outcome,
                Err(err) => {
                    warn!("update manager: device {endpoint:?} poll error: {err}");
                    Outcome::Finished(false)
                }
            };
            self.events.extend(self.updaters[index].drain_events());
            self.record_outcome(now, endpoint, outcome);
            if self.phase != ActivationPhase::Activating {
                break;
            }
        }
        Ok(())
    }
}
