use std::collections::HashSet;

use btleplug::api::{BDAddr, ScanFilter};
use uuid::Uuid;

use crate::Device;

/// Filters and stop conditions for a single scan session.
///
/// Every filter is optional. An empty filter accepts any device, and a device
/// has to pass all of the non-empty filters to be reported.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Accepted local names.
    names: HashSet<String>,
    /// Accepted device addresses.
    addresses: HashSet<BDAddr>,
    /// Services that must all be advertised by the device.
    required_services: HashSet<Uuid>,
    /// Stop the scan after the first new match.
    stop_on_first_match: bool,
    /// Keep track of reported devices so that repeated sightings are not
    /// recorded twice.
    suppress_repeats: bool,
    /// Filters handed as-is to the scanning service.
    native_filters: Vec<ScanFilter>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            names: HashSet::new(),
            addresses: HashSet::new(),
            required_services: HashSet::new(),
            stop_on_first_match: false,
            suppress_repeats: true,
            native_filters: Vec::new(),
        }
    }
}

impl ScanConfig {
    /// Accept devices with the given local name
    pub fn filter_by_name(mut self, name: impl Into<String>) -> Self {
        self.names.insert(name.into());
        self
    }

    /// Accept devices with any of the given local names
    pub fn filter_by_names<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.names.extend(names.into_iter().map(Into::into));
        self
    }

    /// Accept devices with the given address
    pub fn filter_by_address(mut self, address: BDAddr) -> Self {
        self.addresses.insert(address);
        self
    }

    /// Accept devices with any of the given addresses
    pub fn filter_by_addresses(mut self, addresses: impl IntoIterator<Item = BDAddr>) -> Self {
        self.addresses.extend(addresses);
        self
    }

    /// Require that the device advertises the given service
    pub fn require_service(mut self, uuid: Uuid) -> Self {
        self.required_services.insert(uuid);
        self
    }

    /// Require that the device advertises all of the given services
    pub fn require_services(mut self, uuids: impl IntoIterator<Item = Uuid>) -> Self {
        self.required_services.extend(uuids);
        self
    }

    /// Stop the scan after the first match
    pub fn stop_after_first_match(mut self) -> Self {
        self.stop_on_first_match = true;
        self
    }

    /// Do not record reported devices. Every sighting is reported and the
    /// scan is never stopped by a match.
    pub fn allow_repeats(mut self) -> Self {
        self.suppress_repeats = false;
        self
    }

    /// Pass a filter through to the scanning service
    pub fn native_filter(mut self, filter: ScanFilter) -> Self {
        self.native_filters.push(filter);
        self
    }

    pub fn names(&self) -> &HashSet<String> {
        &self.names
    }

    pub fn addresses(&self) -> &HashSet<BDAddr> {
        &self.addresses
    }

    pub fn required_services(&self) -> &HashSet<Uuid> {
        &self.required_services
    }

    pub fn stops_on_first_match(&self) -> bool {
        self.stop_on_first_match
    }

    pub fn suppresses_repeats(&self) -> bool {
        self.suppress_repeats
    }

    pub fn native_filters(&self) -> &[ScanFilter] {
        &self.native_filters
    }

    /// Checks the device and its advertised services against all filters.
    pub fn matches(&self, device: &Device, services: &[Uuid]) -> bool {
        self.matches_name(device.local_name())
            && self.matches_address(device.address())
            && self.matches_services(services)
    }

    fn matches_name(&self, name: Option<&str>) -> bool {
        if self.names.is_empty() {
            return true;
        }
        // An empty name is still a name.
        name.is_some_and(|name| self.names.contains(name))
    }

    fn matches_address(&self, address: BDAddr) -> bool {
        self.addresses.is_empty() || self.addresses.contains(&address)
    }

    fn matches_services(&self, services: &[Uuid]) -> bool {
        if self.required_services.is_empty() {
            return true;
        }
        if services.is_empty() {
            return false;
        }
        let advertised = services.iter().collect::<HashSet<_>>();
        self.required_services
            .iter()
            .all(|uuid| advertised.contains(uuid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BondState;

    fn device(name: Option<&str>) -> Device {
        Device::new(
            BDAddr::from([0xAA, 0, 0, 0, 0, 1]),
            name.map(str::to_owned),
            BondState::None,
        )
    }

    #[test]
    fn empty_config_accepts_everything() {
        let config = ScanConfig::default();
        assert!(config.matches(&device(None), &[]));
        assert!(config.suppresses_repeats());
        assert!(!config.stops_on_first_match());
    }

    #[test]
    fn name_filter_rejects_nameless_devices() {
        let config = ScanConfig::default().filter_by_name("thermo");
        assert!(config.matches(&device(Some("thermo")), &[]));
        assert!(!config.matches(&device(Some("other")), &[]));
        assert!(!config.matches(&device(None), &[]));
    }

    #[test]
    fn empty_name_only_matches_empty_name_filter() {
        let config = ScanConfig::default().filter_by_name("thermo");
        assert!(!config.matches(&device(Some("")), &[]));

        let config = ScanConfig::default().filter_by_name("");
        assert!(config.matches(&device(Some("")), &[]));
        assert!(!config.matches(&device(None), &[]));
    }

    #[test]
    fn address_filter() {
        let config = ScanConfig::default().filter_by_address(BDAddr::from([0xAA, 0, 0, 0, 0, 1]));
        assert!(config.matches(&device(None), &[]));

        let config = ScanConfig::default().filter_by_address(BDAddr::from([0xBB, 0, 0, 0, 0, 1]));
        assert!(!config.matches(&device(None), &[]));
    }

    #[test]
    fn service_filter_requires_superset() {
        let (u1, u2, u3) = (
            Uuid::from_u128(1),
            Uuid::from_u128(2),
            Uuid::from_u128(3),
        );
        let config = ScanConfig::default().require_services([u1, u2]);

        assert!(config.matches(&device(None), &[u1, u2]));
        assert!(config.matches(&device(None), &[u3, u2, u1]));
        assert!(!config.matches(&device(None), &[u1]));
        assert!(!config.matches(&device(None), &[u1, u3]));
        assert!(!config.matches(&device(None), &[]));
    }

    #[test]
    fn all_filters_must_pass() {
        let u1 = Uuid::from_u128(1);
        let config = ScanConfig::default()
            .filter_by_name("thermo")
            .require_service(u1);

        assert!(config.matches(&device(Some("thermo")), &[u1]));
        assert!(!config.matches(&device(Some("thermo")), &[]));
        assert!(!config.matches(&device(Some("other")), &[u1]));
    }
}
