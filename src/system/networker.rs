//! Internet reachability and clock-offset probes.
//!
//! The clock offset is measured with a single SNTP exchange: the four
//! timestamps of request send, server receive, server transmit and reply
//! receive give `((t1 - t0) + (t2 - t3)) / 2`.

use std::time::Duration;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use tokio::net::TcpStream;
use tokio::net::UdpSocket;
use tokio::time::timeout;
use tracing::debug;

use crate::gossip::errors::NetworkCheckError;
use crate::gossip::traits::PeerNetworker;

pub const DEFAULT_NTP_SERVER: &str = "pool.ntp.org:123";
pub const DEFAULT_INTERNET_PROBE: &str = "1.1.1.1:53";
pub const DEFAULT_MAX_CLOCK_OFFSET: Duration = Duration::from_millis(500);

pub const NTP_PACKET_LENGTH: usize = 48;

/// Seconds from 1900-01-01, the NTP era origin, to the Unix epoch.
const NTP_UNIX_EPOCH_DELTA_SECS: u64 = 2_208_988_800;

/// Leap indicator 0, version 3, client mode.
const SNTP_CLIENT_HEADER: u8 = 0x1b;
const SNTP_SERVER_MODE: u8 = 4;

/// 2^32, one second in NTP timestamp fractions.
const NTP_FRACTION_SCALE: f64 = 4_294_967_296.0;

#[derive(Debug, Clone)]
pub struct SystemNetworker {
    internet_probe: String,
    ntp_server: String,
    max_clock_offset: Duration,
    probe_timeout: Duration,
}

impl SystemNetworker {
    /// `internet_probe` and `ntp_server` are `host:port` pairs.
    pub fn new(
        internet_probe: impl Into<String>,
        ntp_server: impl Into<String>,
        max_clock_offset: Duration,
        probe_timeout: Duration,
    ) -> Self {
        Self {
            internet_probe: internet_probe.into(),
            ntp_server: ntp_server.into(),
            max_clock_offset,
            probe_timeout,
        }
    }

    /// Offset of the local clock from the NTP server's, in milliseconds.
    /// Positive when the local clock is behind.
    async fn query_clock_offset(&self) -> Result<i64, NetworkCheckError> {
        let socket = UdpSocket::bind("0.0.0.0:0")
            .await
            .map_err(|e| NetworkCheckError::Other(format!("binding ntp client socket: {e}")))?;

        // Anything the server side can cause, from a failed name lookup to
        // an ICMP port-unreachable, counts as no reply.
        let no_reply = |e: std::io::Error| {
            debug!("ntp server {} did not answer: {e}", self.ntp_server);
            NetworkCheckError::NoNtpReply(self.ntp_server.clone())
        };
        match timeout(self.probe_timeout, socket.connect(&self.ntp_server)).await {
            Ok(connected) => connected.map_err(no_reply)?,
            Err(_) => return Err(NetworkCheckError::NoNtpReply(self.ntp_server.clone())),
        }

        let mut request = [0u8; NTP_PACKET_LENGTH];
        request[0] = SNTP_CLIENT_HEADER;
        let sent_at = SystemTime::now();
        request[40..48].copy_from_slice(&to_ntp_timestamp(sent_at));
        socket.send(&request).await.map_err(no_reply)?;

        let mut reply = [0u8; 2 * NTP_PACKET_LENGTH];
        let length = match timeout(self.probe_timeout, socket.recv(&mut reply)).await {
            Ok(received) => received.map_err(no_reply)?,
            Err(_) => return Err(NetworkCheckError::NoNtpReply(self.ntp_server.clone())),
        };
        let received_at = SystemTime::now();

        let (server_received, server_sent) = parse_sntp_reply(&reply[..length])
            .ok_or_else(|| NetworkCheckError::NoNtpReply(self.ntp_server.clone()))?;

        let offset = clock_offset(
            unix_seconds(sent_at),
            server_received,
            server_sent,
            unix_seconds(received_at),
        );
        Ok((offset * 1000.0).round() as i64)
    }
}

#[async_trait::async_trait]
impl PeerNetworker for SystemNetworker {
    async fn check_internet_state(&self) -> Result<(), NetworkCheckError> {
        match timeout(self.probe_timeout, TcpStream::connect(&self.internet_probe)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(NetworkCheckError::Internet(format!(
                "{}: {e}",
                self.internet_probe
            ))),
            Err(_) => Err(NetworkCheckError::Internet(format!(
                "{}: timed out",
                self.internet_probe
            ))),
        }
    }

    async fn check_ntp_state(&self) -> Result<(), NetworkCheckError> {
        let offset_millis = self.query_clock_offset().await?;
        debug!("clock offset to {} is {offset_millis} ms", self.ntp_server);

        if u128::from(offset_millis.unsigned_abs()) > self.max_clock_offset.as_millis() {
            return Err(NetworkCheckError::ClockShifted { offset_millis });
        }
        Ok(())
    }
}

/// The stratum 2 server reply to an SNTP `request`, stamped with
/// `server_time` as both receive and transmit time. Lets a loopback
/// stand-in play NTP server.
pub fn sntp_server_reply(request: &[u8], server_time: SystemTime) -> [u8; NTP_PACKET_LENGTH] {
    let now = to_ntp_timestamp(server_time);
    let mut reply = [0u8; NTP_PACKET_LENGTH];
    reply[0] = (SNTP_CLIENT_HEADER & !0x07) | SNTP_SERVER_MODE;
    reply[1] = 2;
    if let Some(originate) = request.get(40..48) {
        reply[24..32].copy_from_slice(originate);
    }
    reply[32..40].copy_from_slice(&now);
    reply[40..48].copy_from_slice(&now);
    reply
}

fn clock_offset(
    client_sent: f64,
    server_received: f64,
    server_sent: f64,
    client_received: f64,
) -> f64 {
    ((server_received - client_sent) + (server_sent - client_received)) / 2.0
}

fn unix_seconds(time: SystemTime) -> f64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(since) => since.as_secs_f64(),
        Err(e) => -e.duration().as_secs_f64(),
    }
}

fn to_ntp_timestamp(time: SystemTime) -> [u8; 8] {
    let since_epoch = time.duration_since(UNIX_EPOCH).unwrap_or_default();
    let seconds = (since_epoch.as_secs() + NTP_UNIX_EPOCH_DELTA_SECS) as u32;
    let fraction = ((u64::from(since_epoch.subsec_nanos()) << 32) / 1_000_000_000) as u32;

    let mut timestamp = [0u8; 8];
    timestamp[..4].copy_from_slice(&seconds.to_be_bytes());
    timestamp[4..].copy_from_slice(&fraction.to_be_bytes());
    timestamp
}

fn from_ntp_timestamp(timestamp: &[u8]) -> Option<f64> {
    let seconds = u32::from_be_bytes(timestamp.get(..4)?.try_into().ok()?);
    let fraction = u32::from_be_bytes(timestamp.get(4..8)?.try_into().ok()?);
    let unix_seconds = i64::from(seconds) - NTP_UNIX_EPOCH_DELTA_SECS as i64;
    Some(unix_seconds as f64 + f64::from(fraction) / NTP_FRACTION_SCALE)
}

/// Receive and transmit timestamps of a server reply, as Unix seconds. A
/// short packet, a non-server packet or a kiss-o'-death (stratum 0) yields
/// nothing.
fn parse_sntp_reply(reply: &[u8]) -> Option<(f64, f64)> {
    if reply.len() < NTP_PACKET_LENGTH {
        return None;
    }
    let mode = reply[0] & 0x07;
    let stratum = reply[1];
    if mode != SNTP_SERVER_MODE || stratum == 0 {
        return None;
    }

    Some((
        from_ntp_timestamp(&reply[32..40])?,
        from_ntp_timestamp(&reply[40..48])?,
    ))
}
