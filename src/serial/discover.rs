//! Finding the board's serial port
//!
//! ESP32 dev boards reach the host through a handful of USB-UART bridges
//! (or the chip's own USB-Serial/JTAG block). Ports behind one of those are
//! listed first so the right `--port` is easy to spot.

use anyhow::{Context, Result};
use colored::Colorize;
use serialport::{SerialPortInfo, SerialPortType};

/// USB-UART bridge in front of the device's debug UART
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bridge {
    Cp210x,
    Ch340,
    Ch9102,
    Ftdi,
    /// On-chip USB-Serial/JTAG (ESP32-C3/S3)
    EspressifUsb,
}

impl Bridge {
    /// Identify a bridge from its USB VID:PID
    pub fn from_usb(vid: u16, pid: u16) -> Option<Self> {
        match (vid, pid) {
            (0x10c4, 0xea60 | 0xea70) => Some(Bridge::Cp210x),
            (0x1a86, 0x7523 | 0x5523) => Some(Bridge::Ch340),
            (0x1a86, 0x55d4) => Some(Bridge::Ch9102),
            (0x0403, 0x6001 | 0x6010 | 0x6014 | 0x6015) => Some(Bridge::Ftdi),
            (0x303a, _) => Some(Bridge::EspressifUsb),
            _ => None,
        }
    }
}

impl std::fmt::Display for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Bridge::Cp210x => write!(f, "CP210x"),
            Bridge::Ch340 => write!(f, "CH340"),
            Bridge::Ch9102 => write!(f, "CH9102"),
            Bridge::Ftdi => write!(f, "FTDI"),
            Bridge::EspressifUsb => write!(f, "Espressif USB"),
        }
    }
}

/// A port the device might be attached to
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub path: String,
    /// VID:PID when the port is a USB device
    pub usb_id: Option<(u16, u16)>,
    pub product: Option<String>,
    pub bridge: Option<Bridge>,
}

impl From<SerialPortInfo> for Candidate {
    fn from(info: SerialPortInfo) -> Self {
        match info.port_type {
            SerialPortType::UsbPort(usb) => Candidate {
                path: info.port_name,
                usb_id: Some((usb.vid, usb.pid)),
                bridge: Bridge::from_usb(usb.vid, usb.pid),
                product: usb.product,
            },
            _ => Candidate {
                path: info.port_name,
                usb_id: None,
                product: None,
                bridge: None,
            },
        }
    }
}

impl Candidate {
    /// One listing row: path, bridge or VID:PID, product
    pub fn describe(&self) -> String {
        let mut row = self.path.clone();
        match (self.bridge, self.usb_id) {
            (Some(bridge), Some((vid, pid))) => {
                row.push_str(&format!("  {} ({:04x}:{:04x})", bridge, vid, pid))
            }
            (None, Some((vid, pid))) => row.push_str(&format!("  usb {:04x}:{:04x}", vid, pid)),
            _ => {}
        }
        if let Some(ref product) = self.product {
            row.push_str(&format!("  {}", product));
        }
        row
    }
}

/// Order ports with a known bridge first, then by path
pub fn rank(ports: Vec<SerialPortInfo>) -> Vec<Candidate> {
    let mut candidates: Vec<Candidate> = ports.into_iter().map(Candidate::from).collect();
    candidates.sort_by(|a, b| {
        b.bridge
            .is_some()
            .cmp(&a.bridge.is_some())
            .then_with(|| a.path.cmp(&b.path))
    });
    candidates
}

/// Print the ports a device could be on, likeliest first
pub fn print_ports() -> Result<()> {
    let ports = serialport::available_ports().context("Failed to enumerate serial ports")?;
    let candidates = rank(ports);

    if candidates.is_empty() {
        println!("{}", "No serial ports found".yellow());
        println!("Is the board plugged in, and is your user in the 'dialout' group?");
        return Ok(());
    }

    for candidate in &candidates {
        if candidate.bridge.is_some() {
            println!("{} {}", "*".green().bold(), candidate.describe().white().bold());
        } else {
            println!("  {}", candidate.describe().dimmed());
        }
    }

    if !cfg!(feature = "udev") && candidates.iter().all(|c| c.usb_id.is_none()) {
        log::info!("Build with --features udev to identify USB bridges");
    }

    Ok(())
}
