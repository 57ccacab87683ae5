/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, anyhow};
use log::{info, warn};
use tokio::io::AsyncWriteExt;

use crate::config::StreamConfig;
use crate::cookie::CookieJar;
use crate::loader::Loader;
use crate::opts::ProcArgs;
use crate::probe::TcpProbe;
use crate::request::RequestBody;
use crate::{ProxyDescriptor, RequestEnvelope, router};

pub async fn run(args: ProcArgs) -> anyhow::Result<ExitCode> {
    let mut request = RequestEnvelope::new(&args.method, args.url);
    *request.headers_mut() = args.headers;
    if let Some(data) = args.data {
        request.set_body(RequestBody::Buffer(data));
    }
    request.set_timeout_interval(args.timeout);

    if let Some(proxy) = &args.proxy {
        let mut descriptor = ProxyDescriptor::from(proxy);
        if args.probe.is_some() {
            descriptor = descriptor.with_probe(Arc::new(TcpProbe::new(proxy.peer().clone())));
        }
        info!("route all requests via {} proxy {}", proxy.kind(), proxy.peer());
        router::set_router(move |_: &RequestEnvelope| Some(descriptor.clone()));
    }

    let config = StreamConfig {
        min_tls_version: args.tls_min,
        ..Default::default()
    };
    let loader = Loader::new()
        .with_probe_mode(args.probe.unwrap_or_default())
        .with_stream_config(config)
        .with_cookie_jar(Arc::new(CookieJar::new()))
        .with_max_redirects(args.max_redirects);

    let timeout = request.timeout();
    let loaded = tokio::time::timeout(timeout, loader.load(request))
        .await
        .map_err(|_| anyhow!("request timed out after {timeout:?}"))??;

    let rsp = &loaded.response;
    info!("{} {} {}", rsp.version_str(), rsp.status, rsp.reason);
    for url in &loaded.redirects {
        info!("redirected to {url}");
    }

    match &args.output {
        Some(path) => tokio::fs::write(path, &loaded.body)
            .await
            .context(format!("failed to write to {}", path.display()))?,
        None => {
            let mut stdout = tokio::io::stdout();
            stdout
                .write_all(&loaded.body)
                .await
                .context("failed to write to stdout")?;
            stdout.flush().await.context("failed to flush stdout")?;
        }
    }

    if rsp.status >= 400 {
        warn!("server returned status {}", rsp.status);
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}
