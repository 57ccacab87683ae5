/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::io;

use thiserror::Error;

use veer_http::connect::HttpConnectError;
use veer_http::{HttpBodyDecodeError, HttpRequestBuildError, HttpResponseParseError};
use veer_socks::SocksConnectError;
use veer_types::net::{ProxyParseError, UpstreamAddrParseError};

#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("invalid target address: {0}")]
    InvalidTarget(#[from] UpstreamAddrParseError),
    #[error("tcp connect to {0} failed: {1:?}")]
    TcpConnectFailed(String, io::Error),
    #[error("connect timed out")]
    TimedOut,
    #[error("socks5 negotiation failed: {0}")]
    Socks5(#[from] SocksConnectError),
    #[error("http connect failed: {0}")]
    HttpConnect(#[from] HttpConnectError),
    #[error("invalid tls config: {0}")]
    InvalidTlsConfig(rustls::Error),
    #[error("invalid tls server name {0}")]
    InvalidTlsServerName(String),
    #[error("tls handshake failed: {0:?}")]
    TlsHandshakeFailed(io::Error),
}

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("connect failed: {0}")]
    ConnectFailed(#[from] ConnectError),
    #[error("write failed: {0:?}")]
    WriteFailed(io::Error),
    #[error("read failed: {0:?}")]
    ReadFailed(io::Error),
    #[error("read request body failed: {0:?}")]
    ReadBodyFailed(io::Error),
    #[error("remote closed")]
    RemoteClosed,
    #[error("invalid response: {0}")]
    InvalidResponse(#[from] HttpResponseParseError),
    #[error("invalid response body: {0}")]
    InvalidBody(#[from] HttpBodyDecodeError),
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no host found in request url")]
    NoHost,
    #[error("malformed request: {0}")]
    MalformedRequest(#[from] HttpRequestBuildError),
    #[error("no route found for request")]
    NoRoute,
    #[error("invalid proxy: {0}")]
    InvalidProxy(#[from] ProxyParseError),
    #[error("probe failed: {0:?}")]
    ProbeFailed(anyhow::Error),
    #[error("probe timeout")]
    ProbeTimeout,
    #[error("stream error: {0}")]
    StreamError(#[from] StreamError),
    #[error("already started")]
    AlreadyStarted,
    #[error("cancelled")]
    UserCancelled,
    #[error("too many redirects (> {0})")]
    TooManyRedirects(usize),
}
