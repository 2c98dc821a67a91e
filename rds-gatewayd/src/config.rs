//! `GatewayConfig` (SPEC_FULL §B): environment-driven configuration for
//! the ingest loop and status server, following the teacher's
//! `UwbHubConfig` idiom — `std::env::var(...).ok().and_then(|v|
//! v.parse().ok()).unwrap_or(...)` for every numeric/bool knob.

use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestMode {
    /// Bind a UDP socket and treat each datagram as one ingest chunk.
    Udp,
    /// Read line-buffered text from stdin — convenient for local testing
    /// and piping a recorded group log through the decoder.
    Stdin,
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub ingest_mode: IngestMode,
    pub ingest_udp_port: u16,
    pub http_port: u16,
    pub tmc_local_base_dir: PathBuf,
    pub tick_interval_ms: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            ingest_mode: std::env::var("RDS_INGEST_MODE")
                .ok()
                .and_then(|v| match v.to_ascii_lowercase().as_str() {
                    "stdin" => Some(IngestMode::Stdin),
                    "udp" => Some(IngestMode::Udp),
                    _ => None,
                })
                .unwrap_or(IngestMode::Udp),
            ingest_udp_port: std::env::var("RDS_INGEST_UDP_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8750),
            http_port: std::env::var("RDS_HTTP_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8751),
            tmc_local_base_dir: std::env::var("RDS_TMC_LOCAL_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(".")),
            tick_interval_ms: std::env::var("RDS_TICK_INTERVAL_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(16),
        }
    }
}
