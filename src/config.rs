//! Server configuration from command-line flags and environment variables

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use clap::Parser;

use crate::backend::BackendKind;

/// Port existing clients connect to
pub const DEFAULT_PORT: u16 = 57320;

/// Receive buffer size for one request
pub const DEFAULT_MAX_REQUEST_BYTES: usize = 1024;

#[derive(Debug, Clone, Parser)]
#[command(
    name = "winman",
    about = "Local command server that moves, resizes and focuses windows by process id"
)]
pub struct Config {
    /// Address to listen on. The protocol is unauthenticated; keep this on loopback.
    #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::LOCALHOST), env = "WINMAN_BIND")]
    pub bind: IpAddr,

    /// TCP port to listen on
    #[arg(long, default_value_t = DEFAULT_PORT, env = "WINMAN_PORT")]
    pub port: u16,

    /// Largest request accepted, headers included
    #[arg(long, default_value_t = DEFAULT_MAX_REQUEST_BYTES, env = "WINMAN_MAX_REQUEST_BYTES")]
    pub max_request_bytes: usize,

    /// Handle each connection in its own task instead of one at a time
    #[arg(long, env = "WINMAN_CONCURRENT")]
    pub concurrent: bool,

    /// Window backend to drive
    #[arg(long, value_enum, default_value_t = BackendKind::Auto, env = "WINMAN_BACKEND")]
    pub backend: BackendKind,
}

impl Config {
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: DEFAULT_PORT,
            max_request_bytes: DEFAULT_MAX_REQUEST_BYTES,
            concurrent: false,
            backend: BackendKind::Auto,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_listen_on_loopback() {
        let config = Config::default();
        assert_eq!(config.listen_addr(), "127.0.0.1:57320".parse().unwrap());
        assert!(!config.concurrent);
    }

    #[test]
    fn parses_flags() {
        let config = Config::try_parse_from([
            "winman",
            "--bind",
            "0.0.0.0",
            "--port",
            "9000",
            "--max-request-bytes",
            "4096",
            "--concurrent",
            "--backend",
            "kwin",
        ])
        .unwrap();

        assert_eq!(config.listen_addr(), "0.0.0.0:9000".parse().unwrap());
        assert_eq!(config.max_request_bytes, 4096);
        assert!(config.concurrent);
        assert_eq!(config.backend, BackendKind::Kwin);
    }

    #[test]
    fn rejects_unknown_backend() {
        assert!(Config::try_parse_from(["winman", "--backend", "quartz"]).is_err());
    }
}
