use std::collections::HashSet;

use btleplug::api::BDAddr;

use crate::{Advertisement, Device, ScanConfig, ScanState};

/// What to do with a single advertisement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Verdict {
    /// Dropped by the filters, or not resolvable to a device.
    Skip,
    /// Report the device.
    Emit(Device),
    /// Report the device, then end the session.
    EmitAndStop(Device),
}

/// Per-session scan state, guarded by the scanner's lock.
pub(crate) struct ScanContext {
    /// Identifier of the current session
    pub(crate) session: u64,
    /// Lifecycle state
    pub(crate) state: ScanState,
    /// Filters and stop conditions of the current session
    pub(crate) config: ScanConfig,
    /// Devices reported for the first time, in discovery order
    found: Vec<Device>,
    /// Addresses of the devices in `found`
    seen: HashSet<BDAddr>,
}

impl Default for ScanContext {
    fn default() -> Self {
        Self {
            session: 0,
            state: ScanState::Idle,
            config: ScanConfig::default(),
            found: Vec::new(),
            seen: HashSet::new(),
        }
    }
}

impl ScanContext {
    /// Begin a new session with fresh filters and an empty ledger.
    /// Returns the new session id.
    pub(crate) fn reset(&mut self, config: ScanConfig) -> u64 {
        self.session = self.session.wrapping_add(1);
        self.config = config;
        self.found.clear();
        self.seen.clear();
        self.session
    }

    pub(crate) fn found(&self) -> &[Device] {
        &self.found
    }

    pub(crate) fn process(&mut self, advertisement: &Advertisement) -> Verdict {
        let device = match advertisement.device() {
            Some(device) => device,
            None => {
                log::trace!("Skipping advertisement without address: {:?}", advertisement);
                return Verdict::Skip;
            }
        };

        if !self.config.matches(&device, &advertisement.services) {
            log::trace!("Filtered out: {}", device.address());
            return Verdict::Skip;
        }

        if self.config.suppresses_repeats() && self.seen.insert(device.address()) {
            log::info!("Found device: {:?}", device);
            self.found.push(device.clone());

            if self.config.stops_on_first_match() {
                return Verdict::EmitAndStop(device);
            }
        }

        Verdict::Emit(device)
    }
}
