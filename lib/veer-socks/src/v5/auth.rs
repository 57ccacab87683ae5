/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use bytes::{BufMut, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use veer_types::net::SocksAuth;

use super::{SocksAuthMethod, SocksConnectError, SocksNegotiationError};

const USER_AUTH_VERSION: u8 = 0x01;

/// send the method selection message and return the method chosen by the server
pub(super) async fn send_and_recv_method<R, W>(
    reader: &mut R,
    writer: &mut W,
    auth: &SocksAuth,
) -> Result<SocksAuthMethod, SocksConnectError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let methods = SocksAuthMethod::offered(auth);
    let mut buf = BytesMut::with_capacity(2 + methods.len());
    buf.put_u8(0x05);
    buf.put_u8(methods.len() as u8);
    for method in methods {
        buf.put_u8(method.code());
    }
    writer
        .write_all(buf.as_ref())
        .await
        .map_err(SocksConnectError::WriteFailed)?;
    writer
        .flush()
        .await
        .map_err(SocksConnectError::WriteFailed)?;

    let mut rsp = [0u8; 2];
    reader
        .read_exact(&mut rsp)
        .await
        .map_err(SocksConnectError::ReadFailed)?;
    if rsp[0] != 0x05 {
        return Err(SocksNegotiationError::InvalidVersion.into());
    }
    match SocksAuthMethod::from(rsp[1]) {
        SocksAuthMethod::NoAcceptable => Err(SocksConnectError::NoAuthMethodAvailable),
        method => Ok(method),
    }
}

/// username/password sub-negotiation, see rfc1929
pub(super) async fn proceed_with_user<R, W>(
    reader: &mut R,
    writer: &mut W,
    username: &str,
    password: &str,
) -> Result<(), SocksConnectError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let ulen = u8::try_from(username.len()).map_err(|_| SocksConnectError::AuthFailed)?;
    let plen = u8::try_from(password.len()).map_err(|_| SocksConnectError::AuthFailed)?;

    let mut buf = BytesMut::with_capacity(3 + username.len() + password.len());
    buf.put_u8(USER_AUTH_VERSION);
    buf.put_u8(ulen);
    buf.put_slice(username.as_bytes());
    buf.put_u8(plen);
    buf.put_slice(password.as_bytes());
    writer
        .write_all(buf.as_ref())
        .await
        .map_err(SocksConnectError::WriteFailed)?;
    writer
        .flush()
        .await
        .map_err(SocksConnectError::WriteFailed)?;

    let mut rsp = [0u8; 2];
    reader
        .read_exact(&mut rsp)
        .await
        .map_err(SocksConnectError::ReadFailed)?;
    if rsp[0] != USER_AUTH_VERSION {
        return Err(SocksConnectError::UnsupportedAuthVersion);
    }
    if rsp[1] != 0x00 {
        return Err(SocksConnectError::AuthFailed);
    }
    Ok(())
}
