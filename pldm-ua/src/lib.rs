// Licensed under the Apache-2.0 license

//! Update-agent core: drives one or more devices through a DSP0267 firmware update given an
//! already-parsed package and an already-discovered set of endpoints. Discovery itself
//! (QueryDeviceIdentifiers, GetFirmwareParameters, PLDM-control enumeration) lives outside
//! this crate; see `update_manager::UpdateManager` for the accepted inputs.

pub mod activation_surface;
pub mod config;
pub mod descriptor_matcher;
pub mod device_updater;
pub mod error;
pub mod events;
pub mod package_stream;
pub mod requester_bus;
pub mod timer;
pub mod transport;
pub mod update_manager;
