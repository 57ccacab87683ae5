/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::net::SocketAddr;

use tokio::io::{AsyncRead, AsyncWrite};

use veer_types::net::{SocksAuth, UpstreamAddr};

use super::{Socks5Reply, Socks5Request, SocksAuthMethod, SocksConnectError, auth};

async fn socks5_login<R, W>(
    reader: &mut R,
    writer: &mut W,
    auth: &SocksAuth,
) -> Result<(), SocksConnectError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let auth_method = auth::send_and_recv_method(reader, writer, auth).await?;
    match auth_method {
        SocksAuthMethod::None => Ok(()),
        SocksAuthMethod::User => {
            if let SocksAuth::User(username, password) = auth {
                auth::proceed_with_user(reader, writer, username, password).await
            } else {
                Err(SocksConnectError::NoAuthMethodAvailable)
            }
        }
        SocksAuthMethod::Unsupported(_) | SocksAuthMethod::NoAcceptable => {
            Err(SocksConnectError::NoAuthMethodAvailable)
        }
    }
}

/// tcp connect to a socks5 proxy
///
/// return the local bind address at the server side
pub async fn socks5_connect_to<R, W>(
    reader: &mut R,
    writer: &mut W,
    auth: &SocksAuth,
    addr: &UpstreamAddr,
) -> Result<SocketAddr, SocksConnectError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    socks5_login(reader, writer, auth).await?;

    Socks5Request::send_connect(writer, addr).await?;

    let rsp = Socks5Reply::recv(reader).await?;
    match rsp {
        Socks5Reply::Succeeded(addr) => Ok(addr),
        Socks5Reply::ConnectionTimedOut => Err(SocksConnectError::PeerTimeout),
        _ => Err(SocksConnectError::RequestFailed(format!(
            "request failed: {}",
            rsp.error_message()
        ))),
    }
}
