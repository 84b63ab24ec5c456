use btleplug::api::{BDAddr, PeripheralProperties};
use uuid::Uuid;

/// Pairing state of a peripheral.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BondState {
    #[default]
    None,
    Bonding,
    Bonded,
}

/// A discovered peripheral.
///
/// Two records with the same address describe the same peripheral, even if
/// the name or bond state changed between sightings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    address: BDAddr,
    name: Option<String>,
    bond_state: BondState,
}

impl Device {
    pub fn new(address: BDAddr, name: Option<String>, bond_state: BondState) -> Self {
        Self {
            address,
            name,
            bond_state,
        }
    }

    #[inline]
    pub fn address(&self) -> BDAddr {
        self.address
    }

    /// Local name of the device
    #[inline]
    pub fn local_name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[inline]
    pub fn bond_state(&self) -> BondState {
        self.bond_state
    }
}

/// One raw advertisement as delivered by a scanning service.
#[derive(Debug, Clone, Default)]
pub struct Advertisement {
    pub address: Option<BDAddr>,
    pub local_name: Option<String>,
    /// Backends without pairing information always report
    /// [`BondState::None`], which then means "unknown" rather than "not bonded".
    pub bond_state: BondState,
    /// Service UUIDs advertised by the peripheral
    pub services: Vec<Uuid>,
}

impl Advertisement {
    pub fn new(address: BDAddr) -> Self {
        Self {
            address: Some(address),
            ..Default::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.local_name = Some(name.into());
        self
    }

    pub fn with_services(mut self, services: impl IntoIterator<Item = Uuid>) -> Self {
        self.services.extend(services);
        self
    }

    pub fn with_bond_state(mut self, bond_state: BondState) -> Self {
        self.bond_state = bond_state;
        self
    }

    /// Resolve the advertisement into a device record. Advertisements
    /// without an address cannot be resolved.
    pub fn device(&self) -> Option<Device> {
        self.address
            .map(|address| Device::new(address, self.local_name.clone(), self.bond_state))
    }
}

/// btleplug does not expose pairing state, so the bond state is always
/// [`BondState::None`].
impl From<&PeripheralProperties> for Advertisement {
    fn from(props: &PeripheralProperties) -> Self {
        Self {
            address: Some(props.address),
            local_name: props.local_name.clone(),
            bond_state: BondState::None,
            services: props.services.clone(),
        }
    }
}
