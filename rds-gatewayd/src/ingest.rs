//! UDP/stdin chunk reader feeding `rds_core::Decoder` (SPEC_FULL §C),
//! modeled on the teacher's `uwb_hub.rs` `start_uwb_hub`/`process_packet`
//! split: bind-or-warn-and-return, a `recv` loop that never panics on a
//! transport error.

use std::sync::Arc;

use rds_core::Decoder;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::UdpSocket;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::{GatewayConfig, IngestMode};

const UDP_RECV_BUF: usize = 4096;

pub async fn run_ingest(config: GatewayConfig, decoder: Arc<RwLock<Decoder>>) {
    match config.ingest_mode {
        IngestMode::Udp => run_udp_ingest(config.ingest_udp_port, decoder).await,
        IngestMode::Stdin => run_stdin_ingest(decoder).await,
    }
}

async fn run_udp_ingest(port: u16, decoder: Arc<RwLock<Decoder>>) {
    let addr = format!("0.0.0.0:{port}");
    let socket = match UdpSocket::bind(&addr).await {
        Ok(s) => {
            info!("RDS ingest listening on UDP {addr}");
            s
        }
        Err(e) => {
            warn!("RDS ingest: could not bind UDP {addr}: {e} (no upstream tuner feed — ingest disabled)");
            return;
        }
    };

    let mut buf = vec![0u8; UDP_RECV_BUF];
    loop {
        match socket.recv_from(&mut buf).await {
            Ok((len, src)) => {
                process_chunk(&buf[..len], &decoder).await;
                debug!(bytes = len, %src, "ingested udp datagram");
            }
            Err(e) => {
                // Never crash the ingest loop on a transport error.
                warn!("RDS ingest: UDP recv error: {e}");
            }
        }
    }
}

async fn run_stdin_ingest(decoder: Arc<RwLock<Decoder>>) {
    info!("RDS ingest reading group frames from stdin");
    let stdin = tokio::io::stdin();
    let mut lines = BufReader::new(stdin).lines();

    loop {
        match lines.next_line().await {
            Ok(Some(mut line)) => {
                line.push('\n');
                process_chunk(line.as_bytes(), &decoder).await;
            }
            Ok(None) => {
                info!("RDS ingest: stdin closed, ending ingest loop");
                return;
            }
            Err(e) => {
                warn!("RDS ingest: stdin read error: {e}");
                return;
            }
        }
    }
}

/// Decode one chunk as Windows-1252 (spec §4.1) and feed it to the
/// decoder. A poisoned or absent chunk is a no-op — the transport may
/// deliver empty keep-alive datagrams.
async fn process_chunk(data: &[u8], decoder: &Arc<RwLock<Decoder>>) {
    if data.is_empty() {
        return;
    }
    let (text, _encoding, _had_errors) = encoding_rs::WINDOWS_1252.decode(data);
    let mut dec = decoder.write().await;
    dec.ingest(&text);
}
