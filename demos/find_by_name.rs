//! This example finds a BLE device with the specified name and stops scanning.

use blescan::{require_permissions, BtleplugService, Error, Permission, ScanConfig, Scanner};
use futures::StreamExt;

#[tokio::main]
async fn main() -> Result<(), Error> {
    let name = std::env::args().nth(1).expect("Expected a device name");

    pretty_env_logger::init();

    // Desktop platforms have no runtime permission prompts
    require_permissions(&|_: Permission| true, Permission::SCAN)?;

    log::info!("Scanning for device {}", name);

    let scanner = Scanner::new(BtleplugService::new(0).await?);
    let mut states = scanner.state_stream();
    let mut devices = scanner.device_stream();

    scanner.start(ScanConfig::default().filter_by_name(name).stop_after_first_match())?;

    if let Some(device) = devices.next().await {
        println!("Found {} ({:?})", device.address(), device.local_name());
    }

    // Wait for the scanner to settle after the match
    while let Some(state) = states.next().await {
        println!("Scanner state: {:?}", state);
        if state != blescan::ScanState::Scanning {
            break;
        }
    }

    scanner.close();

    Ok(())
}
