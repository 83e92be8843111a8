// Licensed under the Apache-2.0 license

pub mod activate_fw;
pub mod apply_complete;
pub mod pass_component;
pub mod request_fw_data;
pub mod request_update;
pub mod transfer_complete;
pub mod update_component;
pub mod verify_complete;
