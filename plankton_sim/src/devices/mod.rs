//! Simulated devices shipped with plankton.

pub mod linkam_t95;

use crate::adapters::MonitorAdapter;
use crate::registry::{DeviceEntry, Registry};

/// Registers every bundled device with `registry`.
pub fn register_all(registry: &mut Registry) {
    let mut linkam = DeviceEntry::new(linkam_t95::create).with_adapter("monitor", |device, args| {
        let interface = linkam_t95::interface(device)?;
        Ok(Box::new(MonitorAdapter::from_args(interface, args)?))
    });
    for (name, setup) in linkam_t95::setups() {
        linkam = linkam.with_setup(name, setup);
    }
    registry.register("linkam_t95", linkam);
}
