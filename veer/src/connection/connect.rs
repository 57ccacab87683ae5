/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::net::SocketAddr;
use std::sync::Arc;

use log::debug;
use rustls::ClientConfig;
use rustls_pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use url::Url;

use veer_http::RequestTargetForm;
use veer_types::net::{Host, Proxy, UpstreamAddr};

use crate::config::StreamConfig;
use crate::error::ConnectError;

pub(super) trait AsyncStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T> AsyncStream for T where T: AsyncRead + AsyncWrite + Send + Unpin {}

pub(super) type BoxStream = Box<dyn AsyncStream>;

/// The request-target form to use for `url` with the configured proxy.
///
/// Only plain http requests sent to a forward http proxy use the absolute form,
/// everything else goes over a tunnel or a direct connection.
pub(super) fn target_form(url: &Url, config: &StreamConfig) -> RequestTargetForm {
    match &config.proxy {
        Some(Proxy::Http(_)) if url.scheme() == "http" => RequestTargetForm::Absolute,
        _ => RequestTargetForm::Origin,
    }
}

async fn tcp_connect_to(addr: &UpstreamAddr) -> Result<TcpStream, ConnectError> {
    let port = addr.port();
    let r = match addr.host() {
        Host::Ip(ip) => TcpStream::connect(SocketAddr::new(*ip, port)).await,
        Host::Domain(domain) => TcpStream::connect((domain.as_str(), port)).await,
    };
    let stream = r.map_err(|e| ConnectError::TcpConnectFailed(addr.to_string(), e))?;
    let _ = stream.set_nodelay(true);
    Ok(stream)
}

async fn open_tcp_path(
    target: &UpstreamAddr,
    secure: bool,
    config: &StreamConfig,
) -> Result<TcpStream, ConnectError> {
    match &config.proxy {
        None => {
            debug!("connect to {target} directly");
            tcp_connect_to(target).await
        }
        Some(Proxy::Socks5(proxy)) => {
            debug!("connect to {target} via socks5 proxy {}", proxy.peer());
            let mut stream = tcp_connect_to(proxy.peer()).await?;
            let bind = {
                let (mut r, mut w) = stream.split();
                veer_socks::v5::client::socks5_connect_to(&mut r, &mut w, &proxy.auth, target)
                    .await?
            };
            debug!("socks5 tunnel to {target} established, bind address {bind}");
            Ok(stream)
        }
        Some(Proxy::Http(proxy)) => {
            let mut stream = tcp_connect_to(proxy.peer()).await?;
            if secure {
                debug!("connect to {target} via http tunnel {}", proxy.peer());
                veer_http::connect::http_connect_to(&mut stream, target, config.max_header_size)
                    .await?;
            } else {
                debug!("forward request to {target} via http proxy {}", proxy.peer());
            }
            Ok(stream)
        }
    }
}

async fn open_stream(
    url: &Url,
    config: &StreamConfig,
    tls_config: Option<Arc<ClientConfig>>,
) -> Result<BoxStream, ConnectError> {
    let target = UpstreamAddr::try_from(url)?;
    let secure = url.scheme() == "https";
    let stream = open_tcp_path(&target, secure, config).await?;

    match tls_config {
        Some(tls_config) => {
            let server_name = ServerName::try_from(target.host())
                .map_err(|_| ConnectError::InvalidTlsServerName(target.host_str()))?;
            let tls_stream = TlsConnector::from(tls_config)
                .connect(server_name, stream)
                .await
                .map_err(ConnectError::TlsHandshakeFailed)?;
            debug!("tls handshake with {target} finished");
            Ok(Box::new(tls_stream))
        }
        None => Ok(Box::new(stream)),
    }
}

/// Open the byte stream for `url`, bounded by the connect timeout.
///
/// The stream is wrapped in TLS when a client config is given.
pub(super) async fn connect(
    url: &Url,
    config: &StreamConfig,
    tls_config: Option<Arc<ClientConfig>>,
) -> Result<BoxStream, ConnectError> {
    tokio::time::timeout(config.connect_timeout, open_stream(url, config, tls_config))
        .await
        .map_err(|_| ConnectError::TimedOut)?
}
