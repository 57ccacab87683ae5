/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

//! Local servers used by the unit tests.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use rcgen::{BasicConstraints, CertificateParams, DnType, IsCa, Issuer, KeyPair};
use rustls::{ServerConfig, SupportedProtocolVersion};
use rustls_pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_rustls::TlsAcceptor;

use crate::probe::{NoopStop, Probe, ProbeCallback, Stoppable};

#[derive(Default)]
pub(crate) struct Captured {
    /// `host:port` asked for in the socks5 or http CONNECT request
    pub(crate) target: Option<String>,
    pub(crate) request: Vec<u8>,
}

pub(crate) struct OriginServer {
    pub(crate) addr: SocketAddr,
    handle: JoinHandle<Captured>,
}

impl OriginServer {
    pub(crate) async fn captured(self) -> Captured {
        self.handle.await.unwrap()
    }
}

async fn socks5_accept(stream: &mut TcpStream) -> String {
    let mut buf = [0u8; 512];
    stream.read_exact(&mut buf[..2]).await.unwrap();
    assert_eq!(buf[0], 0x05);
    let n = buf[1] as usize;
    stream.read_exact(&mut buf[..n]).await.unwrap();
    stream.write_all(&[0x05, 0x00]).await.unwrap();

    stream.read_exact(&mut buf[..4]).await.unwrap();
    assert_eq!(&buf[..3], &[0x05, 0x01, 0x00]);
    let host = match buf[3] {
        0x01 => {
            stream.read_exact(&mut buf[..4]).await.unwrap();
            format!("{}.{}.{}.{}", buf[0], buf[1], buf[2], buf[3])
        }
        0x03 => {
            let len = stream.read_u8().await.unwrap() as usize;
            stream.read_exact(&mut buf[..len]).await.unwrap();
            String::from_utf8(buf[..len].to_vec()).unwrap()
        }
        atyp => panic!("unexpected address type {atyp}"),
    };
    let port = stream.read_u16().await.unwrap();
    stream
        .write_all(&[0x05, 0x00, 0x00, 0x01, 127, 0, 0, 1, 0x10, 0x00])
        .await
        .unwrap();
    format!("{host}:{port}")
}

async fn read_request_head<S>(stream: &mut S) -> Vec<u8>
where
    S: AsyncRead + Unpin,
{
    let mut request = Vec::new();
    let mut buf = [0u8; 1024];
    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
        let nr = stream.read(&mut buf).await.unwrap();
        if nr == 0 {
            break;
        }
        request.extend_from_slice(&buf[..nr]);
    }
    request
}

async fn http_connect_accept(stream: &mut TcpStream) -> String {
    let head = read_request_head(stream).await;
    let head = String::from_utf8(head).unwrap();
    let line = head.lines().next().unwrap();
    let target = line
        .strip_prefix("CONNECT ")
        .and_then(|s| s.strip_suffix(" HTTP/1.1"))
        .unwrap()
        .to_string();
    stream
        .write_all(b"HTTP/1.1 200 Connection established\r\n\r\n")
        .await
        .unwrap();
    target
}

async fn serve<S>(stream: &mut S, parts: Vec<&'static str>) -> Vec<u8>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let request = read_request_head(stream).await;
    for part in parts {
        stream.write_all(part.as_bytes()).await.unwrap();
        stream.flush().await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let _ = stream.shutdown().await;
    request
}

#[derive(Clone, Copy)]
enum Front {
    Origin,
    Socks5,
    HttpConnect,
}

async fn spawn_origin(
    front: Front,
    tls: Option<Arc<ServerConfig>>,
    parts: Vec<&'static str>,
) -> OriginServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut captured = Captured::default();
        match front {
            Front::Origin => {}
            Front::Socks5 => captured.target = Some(socks5_accept(&mut stream).await),
            Front::HttpConnect => captured.target = Some(http_connect_accept(&mut stream).await),
        }
        match tls {
            Some(config) => {
                // a failed handshake leaves the request empty
                if let Ok(mut stream) = TlsAcceptor::from(config).accept(stream).await {
                    captured.request = serve(&mut stream, parts).await;
                }
            }
            None => captured.request = serve(&mut stream, parts).await,
        }
        captured
    });
    OriginServer { addr, handle }
}

/// A socks5 proxy without auth that serves the response `parts` itself.
pub(crate) async fn spawn_socks5_origin(parts: Vec<&'static str>) -> OriginServer {
    spawn_origin(Front::Socks5, None, parts).await
}

/// A plain http server, or a forward proxy from the client's point of view.
pub(crate) async fn spawn_http_origin(parts: Vec<&'static str>) -> OriginServer {
    spawn_origin(Front::Origin, None, parts).await
}

/// A socks5 proxy serving https itself once the tunnel is up.
pub(crate) async fn spawn_tls_socks5_origin(
    tls: Arc<ServerConfig>,
    parts: Vec<&'static str>,
) -> OriginServer {
    spawn_origin(Front::Socks5, Some(tls), parts).await
}

/// An http proxy accepting one CONNECT and serving https itself in the tunnel.
pub(crate) async fn spawn_tls_connect_origin(
    tls: Arc<ServerConfig>,
    parts: Vec<&'static str>,
) -> OriginServer {
    spawn_origin(Front::HttpConnect, Some(tls), parts).await
}

/// A private CA and a server config holding a leaf it issued.
pub(crate) struct TlsIdentity {
    pub(crate) root: CertificateDer<'static>,
    pub(crate) server_config: Arc<ServerConfig>,
}

pub(crate) fn tls_identity(
    host: &str,
    versions: &[&'static SupportedProtocolVersion],
) -> TlsIdentity {
    let mut ca_params = CertificateParams::new(Vec::<String>::new()).unwrap();
    ca_params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    ca_params
        .distinguished_name
        .push(DnType::CommonName, "veer test ca");
    let ca_key = KeyPair::generate().unwrap();
    let ca_cert = ca_params.clone().self_signed(&ca_key).unwrap();
    let issuer = Issuer::new(ca_params, ca_key);

    let leaf_params = CertificateParams::new(vec![host.to_string()]).unwrap();
    let leaf_key = KeyPair::generate().unwrap();
    let leaf_cert = leaf_params.signed_by(&leaf_key, &issuer).unwrap();
    let key = PrivateKeyDer::from(PrivatePkcs8KeyDer::from(leaf_key.serialize_der()));

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = ServerConfig::builder_with_provider(provider)
        .with_protocol_versions(versions)
        .unwrap()
        .with_no_client_auth()
        .with_single_cert(vec![leaf_cert.der().clone()], key)
        .unwrap();
    TlsIdentity {
        root: ca_cert.der().clone(),
        server_config: Arc::new(config),
    }
}

/// Accepts one connection and never answers.
pub(crate) async fn spawn_silent_server() -> OriginServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 1024];
        while let Ok(nr) = stream.read(&mut buf).await {
            if nr == 0 {
                break;
            }
        }
        Captured::default()
    });
    OriginServer { addr, handle }
}

/// What a [`FakeProbe`] does once asked to probe.
#[derive(Clone, Copy)]
pub(crate) enum FakeOutcome {
    Succeed,
    Fail,
    Hang,
}

/// Counts probe and stop calls.
pub(crate) struct FakeProbe {
    outcome: FakeOutcome,
    probed: AtomicUsize,
    stopped: Arc<AtomicUsize>,
    pending: Mutex<Option<ProbeCallback>>,
}

impl FakeProbe {
    pub(crate) fn new(outcome: FakeOutcome) -> Arc<Self> {
        Arc::new(FakeProbe {
            outcome,
            probed: AtomicUsize::new(0),
            stopped: Arc::new(AtomicUsize::new(0)),
            pending: Mutex::new(None),
        })
    }

    /// Complete a hanging probe, as a late answer would.
    pub(crate) fn complete(&self, e: Option<anyhow::Error>) {
        if let Some(on_complete) = self.pending.lock().unwrap().take() {
            on_complete(e);
        }
    }

    pub(crate) fn probe_count(&self) -> usize {
        self.probed.load(Ordering::SeqCst)
    }

    pub(crate) fn stop_count(&self) -> usize {
        self.stopped.load(Ordering::SeqCst)
    }
}

struct CountStop(Arc<AtomicUsize>);

impl Stoppable for CountStop {
    fn stop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

impl Probe for FakeProbe {
    fn probe(&self, _host: &str, _timeout: Duration, on_complete: ProbeCallback) -> Box<dyn Stoppable> {
        self.probed.fetch_add(1, Ordering::SeqCst);
        match self.outcome {
            FakeOutcome::Succeed => {
                on_complete(None);
                Box::new(NoopStop)
            }
            FakeOutcome::Fail => {
                on_complete(Some(anyhow::anyhow!("proxy unreachable")));
                Box::new(NoopStop)
            }
            FakeOutcome::Hang => {
                *self.pending.lock().unwrap() = Some(on_complete);
                Box::new(CountStop(self.stopped.clone()))
            }
        }
    }
}
