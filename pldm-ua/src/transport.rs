// Licensed under the Apache-2.0 license

use core::fmt::{Display, Formatter};

// This module provides traits for representing the PLDM transport layer.
// PldmTransport is the virtual channel where PLDM messages are sent and received (MCTP in
// practice, but this crate never speaks MCTP itself). PldmSocket is a binding between a
// source and destination entity within that channel.
//
// The cooperative event loop in update_manager.rs never blocks on the transport: instead of
// a blocking `receive`, a socket is polled with `try_receive`, which returns immediately
// whether or not a packet is ready.
//
//     Endpoint                           Endpoint
//        |                                   |
//        |                                   |
//    PldmSocket                          PldmSocket
// --------------------------------------------------------
//                     PldmTransport
// --------------------------------------------------------

pub trait PldmTransport<T: PldmSocket> {
    fn create_socket(&self, source: EndpointId, dest: EndpointId) -> Result<T, PldmTransportError>;
}

#[derive(Debug)]
pub enum PldmTransportError {
    Timeout,
    Disconnected,
    Underflow,
    NotInitialized,
}

/// Large enough to hold a RequestFirmwareData response at the default `max_transfer_size`
/// (4096 bytes of component payload) plus header and completion-code overhead.
pub const MAX_PLDM_PAYLOAD_SIZE: usize = 4224;

pub trait PldmSocket {
    /// Sends a payload over the PLDM socket.
    fn send(&self, payload: &[u8]) -> Result<(), PldmTransportError>;

    /// Polls for an inbound packet without blocking. Returns `Ok(None)` when nothing is
    /// ready yet, matching the single-threaded cooperative loop this socket is driven from.
    fn try_receive(&self) -> Result<Option<RxPacket>, PldmTransportError>;

    /// Establishes a connection for the PLDM socket.
    fn connect(&self) -> Result<(), PldmTransportError>;

    /// Disconnects the PLDM socket. Expected to always succeed.
    fn disconnect(&self);

    /// Clones the PLDM socket so it can be shared across multiple device updaters.
    fn clone(&self) -> Self;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct EndpointId(pub u8);

#[derive(Debug, Clone)]
pub struct Payload {
    pub data: [u8; MAX_PLDM_PAYLOAD_SIZE],
    pub len: usize,
}

impl Default for Payload {
    fn default() -> Self {
        Self {
            data: [0; MAX_PLDM_PAYLOAD_SIZE],
            len: 0,
        }
    }
}

impl Display for Payload {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "Payload {{ data: {:?}, len: {} }}",
            &self.data[..self.len],
            self.len
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct TxPacket {
    pub src: EndpointId,
    pub dest: EndpointId,
    pub payload: Payload,
}

#[derive(Debug, Clone, Default)]
pub struct RxPacket {
    pub src: EndpointId,
    pub payload: Payload,
}

impl Display for RxPacket {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "RxPacket {{ src: {:?}, payload: {} }}",
            self.src, self.payload
        )
    }
}
