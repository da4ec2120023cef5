//! Environment-driven server configuration.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use anyhow::{Context, Result};
use voxnote_core::DEFAULT_HOTKEY;

pub const DEFAULT_PORT: u16 = 3210;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: IpAddr,
    pub port: u16,
    /// Global hotkey combination. `None` disables the binding entirely
    /// (set `VOXNOTE_HOTKEY` to an empty string to opt out).
    pub hotkey: Option<String>,
    pub data_dir: PathBuf,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        let bind = match std::env::var("VOXNOTE_BIND") {
            Ok(value) => value
                .parse()
                .context("VOXNOTE_BIND is not a valid IP address")?,
            Err(_) => IpAddr::V4(Ipv4Addr::LOCALHOST),
        };
        let port = match std::env::var("VOXNOTE_PORT") {
            Ok(value) => value.parse().context("VOXNOTE_PORT is not a valid port")?,
            Err(_) => DEFAULT_PORT,
        };
        let hotkey = match std::env::var("VOXNOTE_HOTKEY") {
            Ok(value) if value.trim().is_empty() => None,
            Ok(value) => Some(value),
            Err(_) => Some(DEFAULT_HOTKEY.to_string()),
        };
        let data_dir = std::env::var_os("VOXNOTE_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(voxnote_core::paths::default_data_dir);

        Ok(Self {
            bind,
            port,
            hotkey,
            data_dir,
        })
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }
}
