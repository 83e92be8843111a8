// Licensed under the Apache-2.0 license

//! Owns outbound PLDM request/response correlation for every device in the session: instance
//! id allocation, the one in-flight request per device (device updaters never pipeline),
//! inter-retry timing, and instance-id expiry. One `RequesterBus` is shared across every
//! `DeviceUpdater` in an `UpdateManager`, keyed by endpoint, rather than each device updater
//! owning a private copy of this bookkeeping. Modeled after this lineage's
//! `send_request_helper` + header decode split in the former update state machine,
//! generalized into its own component per §4.4.

use crate::error::RequesterBusError;
use crate::timer::Timer;
use crate::transport::{EndpointId, PldmSocket, PldmTransportError, RxPacket};
use log::{debug, warn};
use pldm_common::protocol::base::{InstanceId, PldmSupportedType};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// One outstanding outbound command, unique by `(instance_id, pldm_type, command)` for the
/// device it was sent to (a device updater never has more than one in flight).
#[derive(Debug, Clone)]
pub struct InFlightRequest {
    pub instance_id: InstanceId,
    pub pldm_type: PldmSupportedType,
    pub command: u8,
    body: Vec<u8>,
    retry_timer: Timer,
    expiry_timer: Timer,
    retries_remaining: u8,
}

/// What happened to a device's in-flight request on this `poll` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequesterEvent {
    /// The retry timeout fired and the request was resent; still outstanding.
    Retried,
    /// The instance-id expiry fired (retries exhausted); the slot is now free.
    Expired,
}

/// One device's socket plus its instance-id counter and outstanding request, keyed by
/// endpoint in `RequesterBus::devices`.
struct DeviceSlot<S: PldmSocket> {
    socket: S,
    next_instance_id: u8,
    outstanding: Option<InFlightRequest>,
}

pub struct RequesterBus<S: PldmSocket> {
    retry_timeout: Duration,
    retries: u8,
    expiry: Duration,
    devices: HashMap<EndpointId, DeviceSlot<S>>,
}

impl<S: PldmSocket> RequesterBus<S> {
    pub fn new(retries: u8, retry_timeout: Duration, expiry: Duration) -> Self {
        Self {
            retry_timeout,
            retries,
            expiry,
            devices: HashMap::new(),
        }
    }

    /// Adopts `socket` as the named device's transport, with a fresh instance-id counter and
    /// no outstanding request. Called once per device as `UpdateManager` builds its updaters.
    pub fn register(&mut self, endpoint: EndpointId, socket: S) {
        self.devices.insert(
            endpoint,
            DeviceSlot {
                socket,
                next_instance_id: 0,
                outstanding: None,
            },
        );
    }

    /// Drops a device's socket and any outstanding request, e.g. once its updater is done.
    pub fn unregister(&mut self, endpoint: EndpointId) {
        self.devices.remove(&endpoint);
    }

    fn slot(&self, endpoint: EndpointId) -> Result<&DeviceSlot<S>, RequesterBusError> {
        self.devices.get(&endpoint).ok_or(RequesterBusError::UnknownEndpoint)
    }

    fn slot_mut(&mut self, endpoint: EndpointId) -> Result<&mut DeviceSlot<S>, RequesterBusError> {
        self.devices.get_mut(&endpoint).ok_or(RequesterBusError::UnknownEndpoint)
    }

    pub fn is_busy(&self, endpoint: EndpointId) -> bool {
        self.slot(endpoint).is_ok_and(|slot| slot.outstanding.is_some())
    }

    /// The instance id `send` will allocate next for `endpoint`. Lets a caller build a
    /// message's header with the right instance id before the body is handed to `send`.
    pub fn peek_instance_id(&self, endpoint: EndpointId) -> Result<InstanceId, RequesterBusError> {
        Ok(self.slot(endpoint)?.next_instance_id)
    }

    fn allocate_instance_id(slot: &mut DeviceSlot<S>) -> InstanceId {
        let id = slot.next_instance_id;
        slot.next_instance_id = (slot.next_instance_id + 1) % 32;
        id
    }

    /// Sends an already-encoded PLDM message (header included) to `endpoint`. Rejects a
    /// second send while one is outstanding for that device, enforcing the at-most-one-
    /// request-per-device rule from §5.
    pub fn send(
        &mut self,
        endpoint: EndpointId,
        now: Instant,
        pldm_type: PldmSupportedType,
        command: u8,
        body: &[u8],
    ) -> Result<InstanceId, RequesterBusError> {
        let retry_timeout = self.retry_timeout;
        let expiry = self.expiry;
        let retries = self.retries;

        let slot = self.slot_mut(endpoint)?;
        if slot.outstanding.is_some() {
            return Err(RequesterBusError::AlreadyOutstanding);
        }
        let instance_id = Self::allocate_instance_id(slot);
        slot.socket.send(body).map_err(RequesterBusError::Transport)?;

        let mut retry_timer = Timer::new();
        retry_timer.schedule(now, retry_timeout);
        let mut expiry_timer = Timer::new();
        expiry_timer.schedule(now, expiry);

        slot.outstanding = Some(InFlightRequest {
            instance_id,
            pldm_type,
            command,
            body: body.to_vec(),
            retry_timer,
            expiry_timer,
            retries_remaining: retries,
        });
        debug!(
            "RequesterBus: sent to {endpoint:?} type={pldm_type:?} cmd={command} iid={instance_id}"
        );
        Ok(instance_id)
    }

    /// True if a just-received response from `endpoint` matches the request this bus is
    /// waiting on for that device.
    pub fn matches(
        &self,
        endpoint: EndpointId,
        instance_id: InstanceId,
        pldm_type: PldmSupportedType,
        command: u8,
    ) -> bool {
        let Ok(slot) = self.slot(endpoint) else {
            return false;
        };
        matches!(&slot.outstanding,
            Some(req) if req.instance_id == instance_id
                && req.pldm_type == pldm_type
                && req.command == command)
    }

    /// Clears `endpoint`'s in-flight slot once its response has been consumed by the caller.
    pub fn complete(&mut self, endpoint: EndpointId) {
        if let Ok(slot) = self.slot_mut(endpoint) {
            slot.outstanding = None;
        }
    }

    /// Sends an already-encoded message to `endpoint` with no instance-id bookkeeping: used
    /// for replying to a device-initiated request (RequestFirmwareData, TransferComplete,
    /// ...), which carries the device's own instance id rather than one this bus allocated.
    pub fn reply_raw(&self, endpoint: EndpointId, body: &[u8]) -> Result<(), RequesterBusError> {
        self.slot(endpoint)?
            .socket
            .send(body)
            .map_err(RequesterBusError::Transport)
    }

    /// Polls `endpoint`'s socket for an inbound packet without blocking.
    pub fn try_receive(
        &self,
        endpoint: EndpointId,
    ) -> Result<Option<RxPacket>, RequesterBusError> {
        self.slot(endpoint)?
            .socket
            .try_receive()
            .map_err(RequesterBusError::Transport)
    }

    /// Advances `endpoint`'s retry/expiry timers. Returns `Some(Retried)` after a resend, or
    /// `Some(Expired)` once retries are exhausted and the slot is freed; `None` if nothing
    /// outstanding for that device or nothing due yet.
    pub fn poll(
        &mut self,
        endpoint: EndpointId,
        now: Instant,
    ) -> Result<Option<RequesterEvent>, RequesterBusError> {
        let retry_timeout = self.retry_timeout;

        let slot = self.slot_mut(endpoint)?;
        let Some(req) = slot.outstanding.as_mut() else {
            return Ok(None);
        };

        if req.expiry_timer.is_expired(now) {
            warn!(
                "RequesterBus: {endpoint:?} instance id {} expired waiting for a response",
                req.instance_id
            );
            slot.outstanding = None;
            return Ok(Some(RequesterEvent::Expired));
        }

        if req.retry_timer.is_expired(now) {
            if req.retries_remaining == 0 {
                warn!(
                    "RequesterBus: retries exhausted for {endpoint:?} instance id {}",
                    req.instance_id
                );
                slot.outstanding = None;
                return Ok(Some(RequesterEvent::Expired));
            }
            req.retries_remaining -= 1;
            req.retry_timer.schedule(now, retry_timeout);
            slot.socket
                .send(&req.body)
                .map_err(RequesterBusError::Transport)?;
            debug!("RequesterBus: retried {endpoint:?} instance id {}", req.instance_id);
            return Ok(Some(RequesterEvent::Retried));
        }

        Ok(None)
    }
}
