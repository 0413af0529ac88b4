//! Stable hardware identity of the dock.
//!
//! The authority knows each dock by the 48-bit node id of its network
//! interface, rendered in decimal. Hosts without a usable MAC address fall
//! back to the systemd machine id.

use crate::{HardwareError, Result};
use bikedock_core::DockId;
use std::path::Path;
use tracing::debug;

const NET_CLASS_ROOT: &str = "/sys/class/net";
const MACHINE_ID_PATH: &str = "/etc/machine-id";

/// Parse a colon-separated MAC address into a 48-bit node id.
///
/// Returns `None` for malformed addresses and for the all-zero address
/// reported by virtual interfaces.
///
/// # Examples
///
/// ```
/// use bikedock_hardware::identity::mac_to_node_id;
///
/// assert_eq!(mac_to_node_id("b8:27:eb:12:34:56"), Some(0xb827eb123456));
/// assert_eq!(mac_to_node_id("00:00:00:00:00:00"), None);
/// ```
pub fn mac_to_node_id(mac: &str) -> Option<u64> {
    let octets: Vec<&str> = mac.trim().split(':').collect();
    if octets.len() != 6 {
        return None;
    }

    let mut node = 0u64;
    for octet in octets {
        if octet.len() != 2 {
            return None;
        }
        node = (node << 8) | u64::from(u8::from_str_radix(octet, 16).ok()?);
    }

    (node != 0).then_some(node)
}

/// Derive the dock id from the host hardware.
///
/// # Errors
///
/// Returns an error if neither a network interface address nor a machine id
/// is available.
pub fn hardware_dock_id() -> Result<DockId> {
    dock_id_from(Path::new(NET_CLASS_ROOT), Path::new(MACHINE_ID_PATH))
}

/// Derive the dock id from explicit sysfs and machine-id locations.
///
/// Interfaces are visited in name order, skipping loopback.
///
/// # Errors
///
/// Returns an error if no identity source is usable.
pub fn dock_id_from(net_root: &Path, machine_id: &Path) -> Result<DockId> {
    if let Ok(entries) = std::fs::read_dir(net_root) {
        let mut interfaces: Vec<_> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .filter(|name| name != "lo")
            .collect();
        interfaces.sort();

        for interface in interfaces {
            let address = net_root.join(&interface).join("address");
            let Ok(mac) = std::fs::read_to_string(&address) else {
                continue;
            };
            if let Some(node) = mac_to_node_id(&mac) {
                debug!(interface = %interface, node, "Derived dock id from MAC address");
                return make_dock_id(node.to_string());
            }
        }
    }

    let id = std::fs::read_to_string(machine_id)
        .map_err(|e| {
            HardwareError::initialization_failed(format!("no hardware identity available: {e}"))
        })?
        .trim()
        .to_string();

    debug!("Derived dock id from machine id");
    make_dock_id(id)
}

fn make_dock_id(id: String) -> Result<DockId> {
    DockId::new(id).map_err(|e| HardwareError::invalid_data(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("b8:27:eb:00:00:01", Some(0xb827eb000001))]
    #[case("B8:27:EB:AA:BB:CC\n", Some(0xb827ebaabbcc))]
    #[case("00:00:00:00:00:00", None)]
    #[case("b8:27:eb:00:00", None)]
    #[case("b8:27:eb:00:00:zz", None)]
    #[case("b8:27:eb:0:00:01", None)]
    fn test_mac_to_node_id(#[case] mac: &str, #[case] expected: Option<u64>) {
        assert_eq!(mac_to_node_id(mac), expected);
    }

    fn add_interface(root: &Path, name: &str, mac: &str) {
        let dir = root.join(name);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("address"), format!("{mac}\n")).unwrap();
    }

    #[test]
    fn test_dock_id_from_first_real_interface() {
        let net = tempfile::tempdir().unwrap();
        add_interface(net.path(), "lo", "00:00:00:00:00:01");
        add_interface(net.path(), "dummy0", "00:00:00:00:00:00");
        add_interface(net.path(), "eth0", "b8:27:eb:12:34:56");
        add_interface(net.path(), "wlan0", "b8:27:eb:ff:ff:ff");

        let id = dock_id_from(net.path(), Path::new("/nonexistent")).unwrap();
        assert_eq!(id.as_str(), 0xb827eb123456u64.to_string());
    }

    #[test]
    fn test_dock_id_falls_back_to_machine_id() {
        let net = tempfile::tempdir().unwrap();
        add_interface(net.path(), "lo", "00:00:00:00:00:00");

        let machine_id = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(machine_id.path(), "4f1c2d7e9a\n").unwrap();

        let id = dock_id_from(net.path(), machine_id.path()).unwrap();
        assert_eq!(id.as_str(), "4f1c2d7e9a");
    }

    #[test]
    fn test_dock_id_without_sources_fails() {
        let result = dock_id_from(Path::new("/nonexistent/net"), Path::new("/nonexistent/id"));
        assert!(matches!(
            result,
            Err(HardwareError::InitializationFailed { .. })
        ));
    }
}
