/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use log::{debug, info};
use tokio::sync::mpsc;
use url::Url;

use crate::config::StreamConfig;
use crate::connection::StreamHttpClient;
use crate::cookie::CookieJar;
use crate::error::EngineError;
use crate::probe::ProbeMode;
use crate::protocol::ProxyProtocol;
use crate::router::{RouterSlot, global_router};
use crate::{LoadEvent, RequestEnvelope, ResponseEnvelope};

pub const DEFAULT_MAX_REDIRECTS: usize = 10;

#[derive(Debug)]
pub struct LoadedResponse {
    pub response: ResponseEnvelope,
    pub body: Bytes,
    /// urls of the requests issued after each redirect, in order
    pub redirects: Vec<Url>,
}

/// Keeps the running attempt alive until its events are drained.
enum Running {
    Routed(ProxyProtocol),
    Direct(StreamHttpClient),
}

impl Running {
    fn stop(&mut self) {
        match self {
            Running::Routed(protocol) => protocol.stop_loading(),
            Running::Direct(client) => client.invalidate_and_stop(),
        }
    }
}

enum AttemptOutcome {
    Done(ResponseEnvelope, Bytes),
    Redirect(RequestEnvelope),
}

/// Loads requests the way a host pipeline would.
///
/// Requests the router takes go through [`ProxyProtocol`], the others are
/// loaded directly. Redirects are followed with a fresh routing decision each.
pub struct Loader {
    router: Option<Arc<RouterSlot>>,
    probe_mode: ProbeMode,
    stream_config: StreamConfig,
    cookie_jar: Option<Arc<CookieJar>>,
    max_redirects: usize,
}

impl Default for Loader {
    fn default() -> Self {
        Loader {
            router: None,
            probe_mode: ProbeMode::default(),
            stream_config: StreamConfig::default(),
            cookie_jar: None,
            max_redirects: DEFAULT_MAX_REDIRECTS,
        }
    }
}

impl Loader {
    pub fn new() -> Self {
        Loader::default()
    }

    pub fn with_router(mut self, router: Arc<RouterSlot>) -> Self {
        self.router = Some(router);
        self
    }

    pub fn with_probe_mode(mut self, mode: ProbeMode) -> Self {
        self.probe_mode = mode;
        self
    }

    pub fn with_stream_config(mut self, config: StreamConfig) -> Self {
        self.stream_config = config;
        self
    }

    /// Send stored cookies and save the ones set by responses.
    pub fn with_cookie_jar(mut self, jar: Arc<CookieJar>) -> Self {
        self.stream_config.cookie_store = Some(jar.clone());
        self.cookie_jar = Some(jar);
        self
    }

    pub fn with_max_redirects(mut self, max: usize) -> Self {
        self.max_redirects = max;
        self
    }

    fn router_slot(&self) -> &RouterSlot {
        match &self.router {
            Some(slot) => slot,
            None => global_router(),
        }
    }

    fn start(
        &self,
        request: RequestEnvelope,
        events: mpsc::UnboundedSender<LoadEvent>,
    ) -> Result<Running, EngineError> {
        if self.router_slot().can_handle(&request) {
            let mut protocol = ProxyProtocol::new(request, events)
                .with_probe_mode(self.probe_mode)
                .with_stream_config(self.stream_config.clone());
            if let Some(slot) = &self.router {
                protocol = protocol.with_router(slot.clone());
            }
            protocol.start_loading();
            Ok(Running::Routed(protocol))
        } else {
            debug!("load {} on the default path", request.url());
            let mut client = StreamHttpClient::new(request, self.stream_config.clone(), events);
            client.start()?;
            Ok(Running::Direct(client))
        }
    }

    fn save_cookies(&self, response: &ResponseEnvelope) {
        if let Some(jar) = &self.cookie_jar {
            jar.store_response_cookies(&response.headers, &response.url);
        }
    }

    async fn run_attempt(&self, request: RequestEnvelope) -> Result<AttemptOutcome, EngineError> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut running = self.start(request, tx)?;

        let mut response = None;
        let mut body = BytesMut::new();
        let mut next = None;
        while let Some(event) = rx.recv().await {
            match event {
                LoadEvent::Response(rsp) => {
                    self.save_cookies(&rsp);
                    response = Some(rsp);
                }
                LoadEvent::Data(data) => body.extend_from_slice(&data),
                LoadEvent::Redirect(rsp, new_request) => {
                    self.save_cookies(&rsp);
                    next = Some(new_request);
                }
                LoadEvent::Completed(None) => break,
                LoadEvent::Completed(Some(EngineError::UserCancelled)) if next.is_some() => break,
                LoadEvent::Completed(Some(e)) => {
                    running.stop();
                    return Err(e);
                }
            }
        }
        running.stop();

        if let Some(new_request) = next {
            return Ok(AttemptOutcome::Redirect(new_request));
        }
        match response {
            Some(rsp) => Ok(AttemptOutcome::Done(rsp, body.freeze())),
            None => Err(EngineError::UserCancelled),
        }
    }

    pub async fn load(&self, request: RequestEnvelope) -> Result<LoadedResponse, EngineError> {
        let mut request = request;
        let mut redirects = Vec::new();
        loop {
            match self.run_attempt(request).await? {
                AttemptOutcome::Done(response, body) => {
                    return Ok(LoadedResponse {
                        response,
                        body,
                        redirects,
                    });
                }
                AttemptOutcome::Redirect(new_request) => {
                    if redirects.len() >= self.max_redirects {
                        return Err(EngineError::TooManyRedirects(self.max_redirects));
                    }
                    info!("follow redirect to {}", new_request.url());
                    redirects.push(new_request.url().clone());
                    request = new_request;
                }
            }
        }
    }
}
