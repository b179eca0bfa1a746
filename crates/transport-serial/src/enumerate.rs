//! Device discovery.
//!
//! The device enumerates as a CP210x USB-UART bridge; discovery is a
//! one-shot VID/PID filter over the host's serial ports.

use core_types::SerialPortInfo;
use tokio_serial::SerialPortType;

/// USB vendor id of the device's serial bridge.
pub const DEVICE_VID: u16 = 0x10c4;
/// USB product id of the device's serial bridge.
pub const DEVICE_PID: u16 = 0xea60;

/// List serial ports that look like the device.
pub fn discover() -> Vec<SerialPortInfo> {
    list_ports()
        .into_iter()
        .filter(|p| p.vid == Some(DEVICE_VID) && p.pid == Some(DEVICE_PID))
        .collect()
}

/// List all serial ports visible to the host.
pub fn list_ports() -> Vec<SerialPortInfo> {
    tokio_serial::available_ports()
        .unwrap_or_default()
        .into_iter()
        .map(|info| {
            let (vid, pid) = match info.port_type {
                SerialPortType::UsbPort(usb) => (Some(usb.vid), Some(usb.pid)),
                _ => (None, None),
            };
            SerialPortInfo::new(info.port_name, vid, pid)
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::panic, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn test_list_ports_does_not_panic() {
        // No assumptions about the host's hardware, just exercise the path.
        let _ = list_ports();
    }

    #[test]
    fn test_discover_filters_on_vid_pid() {
        let ports = vec![
            SerialPortInfo::new("/dev/ttyUSB0".into(), Some(DEVICE_VID), Some(DEVICE_PID)),
            SerialPortInfo::new("/dev/ttyUSB1".into(), Some(0x0403), Some(0x6001)),
            SerialPortInfo::new("/dev/ttyS0".into(), None, None),
        ];
        let matched: Vec<_> = ports
            .into_iter()
            .filter(|p| p.vid == Some(DEVICE_VID) && p.pid == Some(DEVICE_PID))
            .collect();
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].path, "/dev/ttyUSB0");
    }
}
