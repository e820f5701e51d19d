//! Serial port and replay line sources.

use super::{ChannelLineSource, SourceError};
use serialport::{ClearBuffer, SerialPortType};
use std::fs::File;
use std::path::Path;
use std::thread;
use std::time::Duration;
use tracing::info;

/// Settings for opening the classifier device.
#[derive(Debug, Clone)]
pub struct SerialSettings {
    /// Device path or name (e.g. `/dev/ttyACM0`, `COM11`)
    pub port: String,
    /// Link rate in baud
    pub baud_rate: u32,
    /// How long a single device read may block
    pub read_timeout: Duration,
    /// Wait after opening before the first read, while the device resets
    pub settle_delay: Duration,
}

/// Open the serial device and start reading lines from it.
///
/// Input already buffered by the OS is discarded before the settle delay so
/// the first window only sees fresh frames.
pub fn open_serial(settings: &SerialSettings) -> Result<ChannelLineSource, SourceError> {
    let open_error = |source| SourceError::Open {
        port: settings.port.clone(),
        source,
    };

    let port = serialport::new(&settings.port, settings.baud_rate)
        .timeout(settings.read_timeout)
        .open()
        .map_err(open_error)?;
    port.clear(ClearBuffer::Input).map_err(open_error)?;

    info!(
        port = %settings.port,
        baud = settings.baud_rate,
        "opened serial port"
    );

    if !settings.settle_delay.is_zero() {
        thread::sleep(settings.settle_delay);
    }

    Ok(ChannelLineSource::spawn(port))
}

/// Replay recorded device output from a file, or from stdin when `path` is `-`.
pub fn open_replay(path: &Path, pace: Duration) -> Result<ChannelLineSource, SourceError> {
    if path.as_os_str() == "-" {
        info!("replaying device output from stdin");
        return Ok(ChannelLineSource::spawn_paced(std::io::stdin(), pace));
    }

    let file = File::open(path).map_err(|source| SourceError::Replay {
        path: path.display().to_string(),
        source,
    })?;
    info!(path = %path.display(), "replaying device output");
    Ok(ChannelLineSource::spawn_paced(file, pace))
}

/// A serial port visible to the OS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortSummary {
    pub name: String,
    pub kind: String,
}

/// List the serial ports the OS currently exposes.
pub fn list_ports() -> Result<Vec<PortSummary>, serialport::Error> {
    let ports = serialport::available_ports()?;
    Ok(ports
        .into_iter()
        .map(|p| PortSummary {
            kind: describe_port_type(&p.port_type),
            name: p.port_name,
        })
        .collect())
}

fn describe_port_type(port_type: &SerialPortType) -> String {
    match port_type {
        SerialPortType::UsbPort(usb) => {
            let product = usb.product.as_deref().unwrap_or("unknown device");
            format!("USB {:04x}:{:04x} {}", usb.vid, usb.pid, product)
        }
        SerialPortType::PciPort => "PCI".to_string(),
        SerialPortType::BluetoothPort => "Bluetooth".to_string(),
        SerialPortType::Unknown => "unknown".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::LineSource;
    use std::io::Write;

    #[test]
    fn test_replay_file_yields_lines() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "cat:0.9").unwrap();
        writeln!(file, "dog:0.95").unwrap();

        let mut source = open_replay(file.path(), Duration::ZERO).unwrap();
        let mut lines = Vec::new();
        while let Ok(next) = source.read_line(Duration::from_secs(1)) {
            if let Some(line) = next {
                lines.push(line);
            }
        }
        assert_eq!(lines, vec!["cat:0.9", "dog:0.95"]);
    }

    #[test]
    fn test_replay_missing_file_is_fatal() {
        let err = open_replay(Path::new("/nonexistent/capture.txt"), Duration::ZERO)
            .err()
            .unwrap();
        assert!(matches!(err, SourceError::Replay { .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_open_missing_port_fails() {
        let settings = SerialSettings {
            port: "/dev/does-not-exist-serial".into(),
            baud_rate: 115_200,
            read_timeout: Duration::from_millis(10),
            settle_delay: Duration::ZERO,
        };
        let err = open_serial(&settings).err().unwrap();
        assert!(matches!(err, SourceError::Open { .. }));
        assert!(err.to_string().contains("/dev/does-not-exist-serial"));
    }
}
