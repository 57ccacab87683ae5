/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use anyhow::anyhow;
use log::debug;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;

use veer_types::net::{Host, UpstreamAddr};

/// Completion callback handed to a probe. Call it at most once.
pub type ProbeCallback = Box<dyn FnOnce(Option<anyhow::Error>) + Send>;

/// Handle to a running probe.
///
/// `stop()` makes a pending probe inert. It is safe to call after the probe
/// has completed, and more than once.
pub trait Stoppable: Send {
    fn stop(&mut self);
}

pub trait Probe: Send + Sync {
    fn probe(&self, host: &str, timeout: Duration, on_complete: ProbeCallback)
    -> Box<dyn Stoppable>;
}

impl<F> Probe for F
where
    F: Fn(&str, Duration, ProbeCallback) -> Box<dyn Stoppable> + Send + Sync,
{
    fn probe(
        &self,
        host: &str,
        timeout: Duration,
        on_complete: ProbeCallback,
    ) -> Box<dyn Stoppable> {
        self(host, timeout, on_complete)
    }
}

/// A `Stoppable` for probes with nothing to stop.
pub struct NoopStop;

impl Stoppable for NoopStop {
    fn stop(&mut self) {}
}

/// Stops a probe running as a tokio task by aborting it.
pub struct AbortOnStop(JoinHandle<()>);

impl AbortOnStop {
    pub fn new(handle: JoinHandle<()>) -> Self {
        AbortOnStop(handle)
    }
}

impl Stoppable for AbortOnStop {
    fn stop(&mut self) {
        self.0.abort();
    }
}

const PROBE_TIMEOUT_MARGIN: Duration = Duration::from_secs(10);
const PROBE_TIMEOUT_FALLBACK: Duration = Duration::from_secs(90);

/// The probe deadline for a request with the given timeout interval.
///
/// 10s are left to connect and transfer when the request timeout is larger
/// than 20s, otherwise a fixed 90s is used.
pub fn probe_timeout(request_timeout: Duration) -> Duration {
    if request_timeout > Duration::from_secs(20) {
        request_timeout - PROBE_TIMEOUT_MARGIN
    } else {
        PROBE_TIMEOUT_FALLBACK
    }
}

/// How the probe phase of an attempt is bounded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ProbeMode {
    /// A timer is armed next to the probe, the probe is stopped when it fires first.
    #[default]
    Guarded,
    /// No timer, the probe gets the timeout as its budget and must report by itself.
    Budgeted,
}

impl ProbeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeMode::Guarded => "guarded",
            ProbeMode::Budgeted => "budgeted",
        }
    }
}

impl FromStr for ProbeMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "guarded" | "timer" => Ok(ProbeMode::Guarded),
            "budgeted" | "resolver" => Ok(ProbeMode::Budgeted),
            _ => Err(anyhow!("invalid probe mode {s}")),
        }
    }
}

/// Checks that a tcp connection to a fixed address can be established.
pub struct TcpProbe {
    addr: UpstreamAddr,
}

impl TcpProbe {
    pub fn new(addr: UpstreamAddr) -> Self {
        TcpProbe { addr }
    }
}

async fn tcp_probe(addr: &UpstreamAddr) -> anyhow::Result<()> {
    let port = addr.port();
    let stream = match addr.host() {
        Host::Ip(ip) => TcpStream::connect(SocketAddr::new(*ip, port)).await,
        Host::Domain(domain) => TcpStream::connect((domain.as_str(), port)).await,
    };
    stream.map_err(|e| anyhow!("failed to connect to {addr}: {e}"))?;
    Ok(())
}

impl Probe for TcpProbe {
    fn probe(
        &self,
        host: &str,
        timeout: Duration,
        on_complete: ProbeCallback,
    ) -> Box<dyn Stoppable> {
        let addr = self.addr.clone();
        debug!("tcp probe {addr} for host {host}, timeout {timeout:?}");
        let handle = tokio::spawn(async move {
            let r = match tokio::time::timeout(timeout, tcp_probe(&addr)).await {
                Ok(Ok(_)) => None,
                Ok(Err(e)) => Some(e),
                Err(_) => Some(anyhow!("timed out to connect to {addr}")),
            };
            on_complete(r);
        });
        Box::new(AbortOnStop::new(handle))
    }
}
