/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use log::{debug, warn};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use veer_types::net::TlsVersion;

use crate::config::StreamConfig;
use crate::connection::StreamHttpClient;
use crate::cookie::CookieStore;
use crate::error::EngineError;
use crate::probe::{ProbeCallback, ProbeMode, Stoppable, probe_timeout};
use crate::router::{RouterSlot, global_router};
use crate::timer::Timer;
use crate::{LoadEvent, RequestEnvelope};

enum ProbeOutcome {
    Completed(Option<anyhow::Error>),
    CallbackDropped,
    TimedOut,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Idle,
    Probing,
    Loading,
    Finished,
}

/// Resources of the attempt in flight. Only the owner of the lock may touch them.
struct Attempt {
    events: Option<mpsc::UnboundedSender<LoadEvent>>,
    phase: Phase,
    timer: Option<Timer>,
    probe: Option<Box<dyn Stoppable>>,
    client: Option<StreamHttpClient>,
}

impl Attempt {
    fn send(&mut self, event: LoadEvent) {
        if let Some(events) = &self.events
            && events.send(event).is_err()
        {
            self.events = None;
        }
    }

    fn release(&mut self) {
        if let Some(mut timer) = self.timer.take() {
            timer.stop();
        }
        if let Some(mut probe) = self.probe.take() {
            probe.stop();
        }
        if let Some(mut client) = self.client.take() {
            client.invalidate_and_stop();
        }
    }

    fn finish(&mut self, e: Option<EngineError>) {
        if self.phase == Phase::Finished {
            return;
        }
        if let Some(e) = &e {
            debug!("attempt finished with error: {e}");
        }
        self.send(LoadEvent::Completed(e));
        self.events = None;
        self.phase = Phase::Finished;
        self.release();
    }
}

type SharedAttempt = Arc<Mutex<Attempt>>;

/// Settle the probe race and start the stream client if it was won.
///
/// Returns the receiver of the client events when loading has started.
fn resolve_probe(
    attempt: &Mutex<Attempt>,
    outcome: ProbeOutcome,
    request: RequestEnvelope,
    config: StreamConfig,
) -> Option<mpsc::UnboundedReceiver<LoadEvent>> {
    let mut attempt = attempt.lock().unwrap();
    if attempt.phase != Phase::Probing {
        return None;
    }
    if let Some(mut timer) = attempt.timer.take() {
        timer.stop();
    }

    match outcome {
        ProbeOutcome::Completed(None) => {
            // a completed probe has nothing left to stop
            attempt.probe = None;
        }
        ProbeOutcome::Completed(Some(e)) => {
            attempt.probe = None;
            attempt.finish(Some(EngineError::ProbeFailed(e)));
            return None;
        }
        ProbeOutcome::TimedOut => {
            debug!("probe for {} timed out", request.url());
            if let Some(mut probe) = attempt.probe.take() {
                probe.stop();
            }
            attempt.finish(Some(EngineError::ProbeTimeout));
            return None;
        }
        ProbeOutcome::CallbackDropped => {
            attempt.probe = None;
            attempt.finish(Some(EngineError::ProbeFailed(anyhow!(
                "probe dropped its completion callback"
            ))));
            return None;
        }
    }

    let (client_tx, client_rx) = mpsc::unbounded_channel();
    let mut client = StreamHttpClient::new(request, config, client_tx);
    if let Err(e) = client.start() {
        attempt.finish(Some(e));
        return None;
    }
    attempt.client = Some(client);
    attempt.phase = Phase::Loading;
    Some(client_rx)
}

/// Relay one client event outward. Returns false once the attempt is over.
fn relay(attempt: &Mutex<Attempt>, event: LoadEvent) -> bool {
    let mut attempt = attempt.lock().unwrap();
    if attempt.phase != Phase::Loading {
        return false;
    }
    match event {
        LoadEvent::Redirect(response, mut request) => {
            request.clear_routed();
            debug!("{} redirected to {}", response.url, request.url());
            attempt.send(LoadEvent::Redirect(response, request));
            attempt.finish(Some(EngineError::UserCancelled));
            false
        }
        LoadEvent::Completed(e) => {
            attempt.finish(e);
            false
        }
        event => {
            attempt.send(event);
            true
        }
    }
}

/// Wait for whichever of the probe and its deadline comes first.
async fn race_probe(
    probe_rx: oneshot::Receiver<Option<anyhow::Error>>,
    deadline_rx: Option<oneshot::Receiver<()>>,
) -> ProbeOutcome {
    let deadline = async move {
        if let Some(rx) = deadline_rx
            && rx.await.is_ok()
        {
            return;
        }
        // no timer, or a timer stopped before it fired
        std::future::pending::<()>().await
    };

    tokio::select! {
        biased;

        r = probe_rx => match r {
            Ok(e) => ProbeOutcome::Completed(e),
            Err(_) => ProbeOutcome::CallbackDropped,
        },
        _ = deadline => ProbeOutcome::TimedOut,
    }
}

async fn drive(
    attempt: SharedAttempt,
    request: RequestEnvelope,
    config: StreamConfig,
    probe_rx: oneshot::Receiver<Option<anyhow::Error>>,
    deadline_rx: Option<oneshot::Receiver<()>>,
) {
    let outcome = race_probe(probe_rx, deadline_rx).await;

    let Some(mut client_rx) = resolve_probe(&attempt, outcome, request, config) else {
        return;
    };
    while let Some(event) = client_rx.recv().await {
        if !relay(&attempt, event) {
            break;
        }
    }
}

/// Loads one request through the proxy its router picks.
///
/// An attempt runs the optional probe of the proxy, then a [`StreamHttpClient`]
/// through it, and reports the outcome as [`LoadEvent`]s. A redirect ends the
/// attempt with `Redirect` followed by `Completed(Some(EngineError::UserCancelled))`,
/// the new request no longer being marked as routed.
pub struct ProxyProtocol {
    request: RequestEnvelope,
    router: Option<Arc<RouterSlot>>,
    probe_mode: ProbeMode,
    stream_config: StreamConfig,
    attempt: SharedAttempt,
    driver: Option<JoinHandle<()>>,
}

impl ProxyProtocol {
    pub fn new(mut request: RequestEnvelope, events: mpsc::UnboundedSender<LoadEvent>) -> Self {
        request.mark_routed();
        ProxyProtocol {
            request,
            router: None,
            probe_mode: ProbeMode::default(),
            stream_config: StreamConfig::default(),
            attempt: Arc::new(Mutex::new(Attempt {
                events: Some(events),
                phase: Phase::Idle,
                timer: None,
                probe: None,
                client: None,
            })),
            driver: None,
        }
    }

    /// Route with this slot instead of the process wide one.
    pub fn with_router(mut self, router: Arc<RouterSlot>) -> Self {
        self.router = Some(router);
        self
    }

    pub fn with_probe_mode(mut self, mode: ProbeMode) -> Self {
        self.probe_mode = mode;
        self
    }

    pub fn with_min_tls_version(mut self, version: TlsVersion) -> Self {
        self.stream_config.min_tls_version = Some(version);
        self
    }

    pub fn with_cookie_store(mut self, store: Arc<dyn CookieStore>) -> Self {
        self.stream_config.cookie_store = Some(store);
        self
    }

    /// The proxy set in `config` is replaced by the routing decision.
    pub fn with_stream_config(mut self, config: StreamConfig) -> Self {
        self.stream_config = config;
        self
    }

    #[inline]
    pub fn request(&self) -> &RequestEnvelope {
        &self.request
    }

    fn router_slot(&self) -> &RouterSlot {
        match &self.router {
            Some(slot) => slot,
            None => global_router(),
        }
    }

    /// Start the attempt. Must be called within a tokio runtime.
    ///
    /// Failures are reported as a `Completed` event. Calls after the first one,
    /// or after `stop_loading()`, are ignored.
    pub fn start_loading(&mut self) {
        let mut attempt = self.attempt.lock().unwrap();
        if attempt.phase != Phase::Idle {
            warn!("loading of {} was already started", self.request.url());
            return;
        }

        let Some(host) = self.request.host().map(str::to_string) else {
            attempt.finish(Some(EngineError::NoHost));
            return;
        };
        let Some(descriptor) = self.router_slot().route(&self.request) else {
            attempt.finish(Some(EngineError::NoRoute));
            return;
        };
        let proxy = match descriptor.to_proxy() {
            Ok(proxy) => proxy,
            Err(e) => {
                attempt.finish(Some(e.into()));
                return;
            }
        };
        debug!(
            "load {} via {} proxy {}",
            self.request.url(),
            proxy.kind(),
            proxy.peer()
        );
        let config = self.stream_config.clone().with_proxy(proxy);

        let (probe_tx, probe_rx) = oneshot::channel();
        let mut deadline_rx = None;
        attempt.phase = Phase::Probing;
        match descriptor.probe() {
            Some(probe) => {
                let timeout = probe_timeout(self.request.timeout());
                debug!(
                    "probe {host} in {} mode, timeout {timeout:?}",
                    self.probe_mode.as_str()
                );
                if self.probe_mode == ProbeMode::Guarded {
                    let (timer_tx, timer_rx) = oneshot::channel();
                    let mut timer_tx = Some(timer_tx);
                    let mut timer = Timer::new(timeout, false, false, move || {
                        if let Some(tx) = timer_tx.take() {
                            let _ = tx.send(());
                        }
                    });
                    timer.start();
                    attempt.timer = Some(timer);
                    deadline_rx = Some(timer_rx);
                }
                let on_complete: ProbeCallback = Box::new(move |e| {
                    let _ = probe_tx.send(e);
                });
                attempt.probe = Some(probe.probe(&host, timeout, on_complete));
            }
            None => {
                let _ = probe_tx.send(None);
            }
        }
        drop(attempt);

        self.driver = Some(tokio::spawn(drive(
            self.attempt.clone(),
            self.request.clone(),
            config,
            probe_rx,
            deadline_rx,
        )));
    }

    /// Cancel the attempt. No event is delivered afterwards.
    ///
    /// Safe to call before `start_loading()` and more than once.
    pub fn stop_loading(&mut self) {
        {
            let mut attempt = self.attempt.lock().unwrap();
            attempt.events = None;
            if attempt.phase != Phase::Finished {
                debug!("stop loading {}", self.request.url());
                attempt.phase = Phase::Finished;
            }
            attempt.release();
        }
        if let Some(driver) = self.driver.take() {
            driver.abort();
        }
    }
}

impl Drop for ProxyProtocol {
    fn drop(&mut self) {
        self.stop_loading();
    }
}
