//! Link construction from command-line options.
//!
//! A role runs with whatever transports it was given; a missing transport
//! becomes a null link so the state machine still turns over.

use anyhow::Result;
use mdp_link::{Link, NullLink, SerialLink, UdpLink};
use std::net::SocketAddr;
use tracing::warn;

/// The wired link: a serial device when present, a UDP stand-in for
/// desktop testing otherwise.
pub async fn wired_link(
    serial: Option<&str>,
    baud: u32,
    listen: Option<SocketAddr>,
    peer: Option<SocketAddr>,
) -> Result<Box<dyn Link>> {
    if let Some(path) = serial {
        return Ok(Box::new(SerialLink::open(path, baud)?));
    }
    if let (Some(listen), Some(peer)) = (listen, peer) {
        return Ok(Box::new(UdpLink::bind(listen, peer).await?));
    }
    warn!("no wired transport configured, using null link");
    Ok(Box::new(NullLink::new()))
}

/// The radio link, reached as a datagram endpoint.
pub async fn radio_link(
    listen: Option<SocketAddr>,
    peer: Option<SocketAddr>,
) -> Result<Box<dyn Link>> {
    if let (Some(listen), Some(peer)) = (listen, peer) {
        return Ok(Box::new(UdpLink::bind(listen, peer).await?));
    }
    warn!("no radio transport configured, using null link");
    Ok(Box::new(NullLink::new()))
}
