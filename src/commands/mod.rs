pub mod model_info;
pub mod monitor;
pub mod record;
pub mod validate;

use crate::exit_codes;
use ecg_link::{DeviceAddress, DeviceLink, PreferenceStore};

/// Pick the address given on the command line, falling back to the last one used
fn resolve_address(explicit: Option<String>, store: Option<&PreferenceStore>) -> Result<String, i32> {
    if let Some(address) = explicit {
        return Ok(address);
    }

    match store.and_then(PreferenceStore::last_address) {
        Some(address) => {
            log::info!("Using remembered device address {}", address);
            Ok(address)
        }
        None => {
            eprintln!("Error: no device address given and none remembered; pass --address");
            Err(exit_codes::INVALID_INPUT)
        }
    }
}

/// Connect the link and remember the address on success
async fn connect(link: &DeviceLink, explicit: Option<String>) -> Result<DeviceAddress, i32> {
    let store = match PreferenceStore::open_default() {
        Ok(store) => Some(store),
        Err(e) => {
            log::warn!("Preferences unavailable: {}", e);
            None
        }
    };

    let raw = resolve_address(explicit, store.as_ref())?;
    let address = match DeviceAddress::parse(&raw) {
        Ok(address) => address,
        Err(e) => {
            eprintln!("Error: {}", e);
            return Err(exit_codes::INVALID_INPUT);
        }
    };

    if let Err(e) = link.connect(&raw).await {
        eprintln!("Error: Could not connect to device: {}", e);
        return Err(exit_codes::CONNECTION_ERROR);
    }

    if let Some(store) = store {
        if let Err(e) = store.remember_address(&address) {
            log::warn!("Failed to remember device address: {}", e);
        }
    }

    eprintln!("Connected to device {}", address);
    Ok(address)
}
