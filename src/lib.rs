//! BLE scan-lifecycle manager.
//!
//! The [`Scanner`] starts and stops scans on a [`ScanningService`], filters
//! the advertisements it delivers by name, address and advertised services,
//! remembers the devices it has already reported, and can stop the scan as
//! soon as the first matching device is found.
//!
//! ## Usage
//!
//! Here is an example on how to find a device by name with the btleplug backend:
//!
//! ```rust,no_run
//! use blescan::{BtleplugService, Error, ScanConfig, Scanner};
//! use futures::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Error> {
//!     pretty_env_logger::init();
//!
//!     let scanner = Scanner::new(BtleplugService::new(0).await?);
//!
//!     // Stop as soon as the thermometer shows up
//!     let config = ScanConfig::default()
//!         .filter_by_name("Thermometer")
//!         .stop_after_first_match();
//!
//!     scanner.start(config)?;
//!
//!     let device = scanner.device_stream().next().await.unwrap();
//!     println!("{:?}", device);
//!
//!     Ok(())
//! }
//!```

#![warn(clippy::all, future_incompatible, nonstandard_style, rust_2018_idioms)]

pub use btleplug::api::{BDAddr, ScanFilter};

pub use device::{Advertisement, BondState, Device};
pub use error::{Error, Result};
pub use events::EventStream;
pub use filter::ScanConfig;
pub use permission::{require_permissions, Permission, PermissionGate};
pub use platform::BtleplugService;
pub use scanner::{DeliveryTarget, ScanState, Scanner, ScannerOptions};
pub use service::{
    CallbackType, ErrorCode, MatchMode, NumOfMatches, Phy, ScanMode, ScanSettings,
    ScanningService,
};

mod device;
mod error;
mod events;
mod filter;
mod permission;
mod platform;
mod processor;
mod scanner;
mod service;
