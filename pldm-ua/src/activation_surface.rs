// Licensed under the Apache-2.0 license

//! A thin, read-only mirror of `UpdateManager`'s activation phase and progress, published to
//! an external object directory. No logic lives here: it is a projection, not a decision
//! point, kept separate so the directory binding can change without touching the manager.

use crate::update_manager::{ActivationPhase, ActivationStatus};

/// Snapshot suitable for exposing over an external management surface (e.g. PLDM's own
/// FirmwareUpdate state resource, or a redfish-style `UpdateService`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ActivationSurface {
    phase: ActivationPhase,
    progress_percent: u8,
    elapsed_millis: Option<u64>,
}

impl ActivationSurface {
    pub fn mirror(status: ActivationStatus) -> Self {
        ActivationSurface {
            phase: status.phase,
            progress_percent: status.progress_percent,
            elapsed_millis: status.elapsed_millis,
        }
    }

    pub fn phase(&self) -> ActivationPhase {
        self.phase
    }

    pub fn progress_percent(&self) -> u8 {
        self.progress_percent
    }

    pub fn elapsed_millis(&self) -> Option<u64> {
        self.elapsed_millis
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mirrors_status_verbatim() {
        let status = ActivationStatus {
            phase: ActivationPhase::Activating,
            progress_percent: 42,
            elapsed_millis: Some(1500),
        };
        let surface = ActivationSurface::mirror(status);
        assert_eq!(surface.phase(), ActivationPhase::Activating);
        assert_eq!(surface.progress_percent(), 42);
        assert_eq!(surface.elapsed_millis(), Some(1500));
    }
}
