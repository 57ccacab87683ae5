/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::sync::{Arc, Mutex};

use bytes::BytesMut;
use futures_util::FutureExt;
use http::header::{ACCEPT, COOKIE, USER_AGENT};
use http::{HeaderValue, Method};
use log::{debug, trace, warn};
use rustls::ClientConfig;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use veer_http::{
    BodyFraming, HttpBodyDecoder, HttpBodyType, HttpRequestBuildError, HttpRequestHead,
    HttpResponseHead, HttpResponseHeadParser,
};

use super::ConnectionState;
use super::connect::{self, BoxStream};
use crate::config::StreamConfig;
use crate::error::{ConnectError, EngineError, StreamError};
use crate::request::{PASS_HEADER, RequestBody};
use crate::{LoadEvent, RequestEnvelope, ResponseEnvelope, tls};

const READ_CHUNK_SIZE: usize = 1024;
const MAX_DRAIN_SIZE: usize = 64 * 1024;
const CHUNK_LINE_MAX_SIZE: usize = 4096;
const REQUEST_BODY_CHUNK_SIZE: usize = 16 * 1024;

const DEFAULT_USER_AGENT: &str = concat!("veer/", env!("CARGO_PKG_VERSION"));

struct Shared {
    state: ConnectionState,
    events: Option<mpsc::UnboundedSender<LoadEvent>>,
}

impl Shared {
    fn emit(&mut self, next: ConnectionState, event: LoadEvent) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        let Some(events) = &self.events else {
            return false;
        };
        self.state = next;
        if events.send(event).is_err() {
            self.events = None;
            return false;
        }
        true
    }

    /// Emit the last event of this client and detach the receiver.
    fn finish(&mut self, next: ConnectionState, event: LoadEvent) {
        self.emit(next, event);
        self.events = None;
    }
}

type SharedState = Arc<Mutex<Shared>>;

fn expects_body(method: &Method) -> bool {
    *method == Method::POST || *method == Method::PUT || *method == Method::PATCH
}

/// Build the wire request head for `request`.
///
/// Stored cookies and default headers never replace a header set on the request.
pub(crate) fn build_request_head(
    request: &RequestEnvelope,
    config: &StreamConfig,
) -> Result<HttpRequestHead, EngineError> {
    let form = connect::target_form(request.url(), config);
    let mut head = HttpRequestHead::build(request.method(), request.url(), form).map_err(
        |e| match e {
            HttpRequestBuildError::NoHost => EngineError::NoHost,
            e => EngineError::MalformedRequest(e),
        },
    )?;

    head.extend_headers(request.headers());
    head.remove_header(PASS_HEADER.as_str());
    if let Some(store) = &config.cookie_store
        && let Some(cookies) = store.cookies(request.url())
    {
        head.append_if_absent(COOKIE, cookies);
    }
    head.append_if_absent(USER_AGENT, HeaderValue::from_static(DEFAULT_USER_AGENT));
    head.append_if_absent(ACCEPT, HeaderValue::from_static("*/*"));

    let framing = match request.body() {
        RequestBody::Empty if expects_body(head.method()) => BodyFraming::ContentLength(0),
        RequestBody::Empty => BodyFraming::None,
        RequestBody::Buffer(b) => BodyFraming::ContentLength(b.len() as u64),
        RequestBody::Stream(_) => BodyFraming::Chunked,
    };
    head.set_framing(framing);
    Ok(head)
}

/// The request to issue next if `response` redirects `request`.
fn redirect_request(
    request: &RequestEnvelope,
    response: &ResponseEnvelope,
) -> Option<RequestEnvelope> {
    if !response.is_redirect() {
        return None;
    }
    let location = response.location()?;

    let mut new_request = request.clone();
    new_request.set_url(location.clone());
    new_request.set_pipelining(true);
    if request.main_document_url() == Some(request.url()) {
        new_request.set_main_document_url(Some(location));
    }
    Some(new_request)
}

/// Read what the stream has to offer right now, waiting only for the first chunk.
async fn read_available<R>(reader: &mut R, buf: &mut BytesMut) -> Result<usize, StreamError>
where
    R: AsyncRead + Unpin,
{
    let mut chunk = [0u8; READ_CHUNK_SIZE];
    let nr = reader
        .read(&mut chunk)
        .await
        .map_err(StreamError::ReadFailed)?;
    if nr == 0 {
        return Ok(0);
    }
    buf.extend_from_slice(&chunk[..nr]);

    let mut total = nr;
    while total < MAX_DRAIN_SIZE {
        let Some(r) = reader.read(&mut chunk).now_or_never() else {
            break;
        };
        let nr = r.map_err(StreamError::ReadFailed)?;
        if nr == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..nr]);
        total += nr;
    }
    Ok(total)
}

async fn send_chunked<R, W>(reader: &mut R, writer: &mut W) -> Result<(), StreamError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; REQUEST_BODY_CHUNK_SIZE];
    loop {
        let nr = reader
            .read(&mut buf)
            .await
            .map_err(StreamError::ReadBodyFailed)?;
        if nr == 0 {
            break;
        }
        let size_line = format!("{nr:x}\r\n");
        writer
            .write_all(size_line.as_bytes())
            .await
            .map_err(StreamError::WriteFailed)?;
        writer
            .write_all(&buf[..nr])
            .await
            .map_err(StreamError::WriteFailed)?;
        writer
            .write_all(b"\r\n")
            .await
            .map_err(StreamError::WriteFailed)?;
    }
    writer
        .write_all(b"0\r\n\r\n")
        .await
        .map_err(StreamError::WriteFailed)
}

struct HttpTask {
    shared: SharedState,
    request: RequestEnvelope,
    config: StreamConfig,
    head: HttpRequestHead,
    tls_config: Option<Arc<ClientConfig>>,
}

impl HttpTask {
    fn emit(&self, next: ConnectionState, event: LoadEvent) -> bool {
        self.shared.lock().unwrap().emit(next, event)
    }

    async fn run(self) {
        let shared = self.shared.clone();
        let url = self.request.url().clone();
        match self.run_to_end().await {
            Ok(_) => trace!("stream client for {url} finished"),
            Err(e) => {
                debug!("stream client for {url} failed: {e}");
                shared.lock().unwrap().finish(
                    ConnectionState::Failed,
                    LoadEvent::Completed(Some(EngineError::StreamError(e))),
                );
            }
        }
    }

    async fn run_to_end(self) -> Result<(), StreamError> {
        let url = self.request.url();
        let mut stream = connect::connect(url, &self.config, self.tls_config.clone()).await?;
        self.send_request(&mut stream).await?;

        let mut buf = BytesMut::with_capacity(READ_CHUNK_SIZE * 4);
        let head = self.recv_response_head(&mut stream, &mut buf).await?;
        debug!("{url}: {:?} {} {}", head.version, head.code, head.reason);
        let response = ResponseEnvelope::new(&head, url.clone());

        if let Some(new_request) = redirect_request(&self.request, &response) {
            debug!("{url}: redirect to {}", new_request.url());
            let mut shared = self.shared.lock().unwrap();
            shared.finish(
                ConnectionState::Redirecting,
                LoadEvent::Redirect(response, new_request),
            );
            return Ok(());
        }

        let body_type = head.body_type(self.head.method());
        if !self.emit(
            ConnectionState::ResponseReceived,
            LoadEvent::Response(response),
        ) {
            return Ok(());
        }
        if let Some(body_type) = body_type {
            self.recv_body(&mut stream, buf, body_type).await?;
        }

        self.shared
            .lock()
            .unwrap()
            .finish(ConnectionState::Completed, LoadEvent::Completed(None));
        Ok(())
    }

    async fn send_request(&self, stream: &mut BoxStream) -> Result<(), StreamError> {
        let head = self.head.serialize();
        stream
            .write_all(&head)
            .await
            .map_err(StreamError::WriteFailed)?;

        match self.request.body() {
            RequestBody::Empty => {}
            RequestBody::Buffer(b) => {
                stream
                    .write_all(b)
                    .await
                    .map_err(StreamError::WriteFailed)?;
            }
            RequestBody::Stream(s) => match s.take() {
                Some(mut reader) => send_chunked(&mut reader, stream).await?,
                None => {
                    warn!(
                        "body stream of {} has already been consumed, send it empty",
                        self.request.url()
                    );
                    send_chunked(&mut tokio::io::empty(), stream).await?;
                }
            },
        }

        stream.flush().await.map_err(StreamError::WriteFailed)
    }

    async fn recv_response_head(
        &self,
        stream: &mut BoxStream,
        buf: &mut BytesMut,
    ) -> Result<HttpResponseHead, StreamError> {
        let mut parser = HttpResponseHeadParser::new(self.config.max_header_size);
        loop {
            let nr = read_available(stream, buf).await?;
            if nr == 0 {
                return Err(StreamError::RemoteClosed);
            }
            if let Some(head) = parser.parse(buf)? {
                return Ok(head);
            }
        }
    }

    async fn recv_body(
        &self,
        stream: &mut BoxStream,
        mut buf: BytesMut,
        body_type: HttpBodyType,
    ) -> Result<(), StreamError> {
        let mut decoder = HttpBodyDecoder::new(body_type, CHUNK_LINE_MAX_SIZE);
        let mut data = BytesMut::with_capacity(READ_CHUNK_SIZE * 4);
        loop {
            if !buf.is_empty() {
                let end = decoder.decode(&mut buf, &mut data)?;
                if !data.is_empty()
                    && !self.emit(
                        ConnectionState::ResponseReceived,
                        LoadEvent::Data(data.split().freeze()),
                    )
                {
                    return Ok(());
                }
                if end {
                    return Ok(());
                }
            }

            let nr = read_available(stream, &mut buf).await?;
            if nr == 0 {
                decoder.finish()?;
                return Ok(());
            }
        }
    }
}

/// Runs one http request over a raw byte stream and reports it as [`LoadEvent`]s.
///
/// The stream is opened directly or through the proxy set in the config.
/// Events stop as soon as [`StreamHttpClient::invalidate_and_stop`] is called,
/// which also happens on drop.
pub struct StreamHttpClient {
    request: RequestEnvelope,
    config: StreamConfig,
    shared: SharedState,
    task: Option<JoinHandle<()>>,
}

impl StreamHttpClient {
    pub fn new(
        request: RequestEnvelope,
        config: StreamConfig,
        events: mpsc::UnboundedSender<LoadEvent>,
    ) -> Self {
        StreamHttpClient {
            request,
            config,
            shared: Arc::new(Mutex::new(Shared {
                state: ConnectionState::Idle,
                events: Some(events),
            })),
            task: None,
        }
    }

    #[inline]
    pub fn request(&self) -> &RequestEnvelope {
        &self.request
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.lock().unwrap().state
    }

    /// Validate the request and spawn the task driving it.
    ///
    /// Must be called within a tokio runtime.
    pub fn start(&mut self) -> Result<(), EngineError> {
        if self.state() != ConnectionState::Idle {
            return Err(EngineError::AlreadyStarted);
        }

        let head = build_request_head(&self.request, &self.config)?;
        let tls_config = if self.request.url().scheme() == "https" {
            let config =
                tls::build_client_config(self.config.min_tls_version, &self.config.extra_roots)
                    .map_err(|e| StreamError::from(ConnectError::InvalidTlsConfig(e)))?;
            Some(config)
        } else {
            None
        };

        self.shared.lock().unwrap().state = ConnectionState::Open;
        debug!("start {} {}", self.request.method(), self.request.url());
        let task = HttpTask {
            shared: self.shared.clone(),
            request: self.request.clone(),
            config: self.config.clone(),
            head,
            tls_config,
        };
        self.task = Some(tokio::spawn(task.run()));
        Ok(())
    }

    /// Detach the receiver and close the stream. Safe to call more than once.
    pub fn invalidate_and_stop(&mut self) {
        {
            let mut shared = self.shared.lock().unwrap();
            shared.events = None;
            if !shared.state.is_terminal() {
                shared.state = ConnectionState::Cancelled;
            }
        }
        if let Some(task) = self.task.take() {
            debug!("stop stream client for {}", self.request.url());
            task.abort();
        }
    }
}

impl Drop for StreamHttpClient {
    fn drop(&mut self) {
        self.invalidate_and_stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use bytes::Bytes;
    use url::Url;

    use veer_types::net::{HttpProxy, Proxy, Socks5Proxy, TlsVersion, UpstreamAddr};

    use crate::cookie::CookieJar;
    use crate::testing::{self, OriginServer};

    fn socks_config(server: &OriginServer) -> StreamConfig {
        let peer = UpstreamAddr::from_ip_and_port(server.addr.ip(), server.addr.port());
        StreamConfig::default().with_proxy(Proxy::Socks5(Socks5Proxy::new(peer)))
    }

    async fn collect(rx: &mut mpsc::UnboundedReceiver<LoadEvent>) -> Vec<LoadEvent> {
        let mut events = Vec::new();
        while let Some(ev) = rx.recv().await {
            events.push(ev);
        }
        events
    }

    fn body_of(events: &[LoadEvent]) -> Bytes {
        let mut body = BytesMut::new();
        for ev in events {
            if let LoadEvent::Data(d) = ev {
                body.extend_from_slice(d);
            }
        }
        body.freeze()
    }

    #[test]
    fn request_head() {
        let url = Url::parse("http://example.com/path").unwrap();
        let jar = Arc::new(CookieJar::new());
        jar.add_cookie_str("a=stored", &url);
        let config = StreamConfig {
            cookie_store: Some(jar),
            ..Default::default()
        };

        let mut request = RequestEnvelope::new("POST", url.clone());
        request.mark_routed();
        let head = build_request_head(&request, &config).unwrap();
        let wire = String::from_utf8(head.serialize()).unwrap();
        assert!(wire.starts_with("POST /path HTTP/1.1\r\n"));
        assert!(wire.contains("cookie: a=stored\r\n"));
        assert!(wire.contains("Content-Length: 0\r\n"));
        assert!(!wire.contains("x-veer-pass"));

        let request = RequestEnvelope::get(url)
            .with_header(COOKIE, HeaderValue::from_static("a=explicit"))
            .with_header(USER_AGENT, HeaderValue::from_static("custom"));
        let head = build_request_head(&request, &config).unwrap();
        let cookies: Vec<_> = head.headers().get_all(COOKIE).iter().collect();
        assert_eq!(cookies, vec![&HeaderValue::from_static("a=explicit")]);
        assert_eq!(head.headers().get(USER_AGENT).unwrap(), "custom");
    }

    #[test]
    fn request_head_errors() {
        let config = StreamConfig::default();
        let url = Url::parse("http://example.com/").unwrap();
        let request = RequestEnvelope::new("GE T", url);
        assert!(matches!(
            build_request_head(&request, &config),
            Err(EngineError::MalformedRequest(_))
        ));

        let url = Url::parse("unix:/run/foo.socket").unwrap();
        let request = RequestEnvelope::get(url);
        assert!(build_request_head(&request, &config).is_err());
    }

    #[test]
    fn redirect_resolution() {
        let url = Url::parse("http://host/prev").unwrap();
        let mut request = RequestEnvelope::get(url.clone());
        request.set_main_document_url(Some(url.clone()));

        let mut response = ResponseEnvelope {
            status: 302,
            reason: "Found".to_string(),
            version: http::Version::HTTP_11,
            headers: http::HeaderMap::new(),
            url,
        };
        assert!(redirect_request(&request, &response).is_none());

        response
            .headers
            .insert(http::header::LOCATION, HeaderValue::from_static("/next"));
        let next = redirect_request(&request, &response).unwrap();
        assert_eq!(next.url().as_str(), "http://host/next");
        assert_eq!(next.main_document_url().unwrap().as_str(), "http://host/next");
        assert!(next.pipelining());

        request.set_main_document_url(Some(Url::parse("http://host/frame").unwrap()));
        let next = redirect_request(&request, &response).unwrap();
        assert_eq!(next.main_document_url().unwrap().as_str(), "http://host/frame");

        response.status = 303;
        assert!(redirect_request(&request, &response).is_none());
    }

    #[tokio::test]
    async fn socks5_content_length() {
        let server = testing::spawn_socks5_origin(vec![
            "HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nhello",
        ])
        .await;
        let url = Url::parse("http://example.com/").unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut client = StreamHttpClient::new(RequestEnvelope::get(url), socks_config(&server), tx);
        client.start().unwrap();

        let events = collect(&mut rx).await;
        assert!(matches!(&events[0], LoadEvent::Response(r) if r.status == 200));
        assert_eq!(body_of(&events), "hello");
        assert!(matches!(events.last(), Some(LoadEvent::Completed(None))));
        assert_eq!(client.state(), ConnectionState::Completed);

        let captured = server.captured().await;
        assert_eq!(captured.target.as_deref(), Some("example.com:80"));
        assert!(captured.request.starts_with(b"GET / HTTP/1.1\r\n"));
    }

    #[tokio::test]
    async fn chunked_in_pieces() {
        let server = testing::spawn_socks5_origin(vec![
            "HTTP/1.1 200 OK\r\nTransfer-",
            "Encoding: chunked\r\n\r\n5\r\nhel",
            "lo\r\n6\r\n world\r\n",
            "0\r\n\r\n",
        ])
        .await;
        let url = Url::parse("http://example.com/chunked").unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut client = StreamHttpClient::new(RequestEnvelope::get(url), socks_config(&server), tx);
        client.start().unwrap();

        let events = collect(&mut rx).await;
        assert!(matches!(&events[0], LoadEvent::Response(_)));
        assert_eq!(body_of(&events), "hello world");
        assert!(matches!(events.last(), Some(LoadEvent::Completed(None))));
    }

    #[tokio::test]
    async fn redirect_stops_client() {
        let server = testing::spawn_socks5_origin(vec![
            "HTTP/1.1 302 Found\r\nLocation: /next\r\nContent-Length: 0\r\n\r\n",
        ])
        .await;
        let url = Url::parse("http://example.com/prev").unwrap();
        let mut request = RequestEnvelope::get(url.clone());
        request.set_main_document_url(Some(url));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut client = StreamHttpClient::new(request, socks_config(&server), tx);
        client.start().unwrap();

        let events = collect(&mut rx).await;
        assert_eq!(events.len(), 1);
        let LoadEvent::Redirect(rsp, next) = &events[0] else {
            panic!("not a redirect event");
        };
        assert_eq!(rsp.status, 302);
        assert_eq!(next.url().as_str(), "http://example.com/next");
        assert_eq!(
            next.main_document_url().unwrap().as_str(),
            "http://example.com/next"
        );
        assert_eq!(client.state(), ConnectionState::Redirecting);
        client.invalidate_and_stop();
        assert_eq!(client.state(), ConnectionState::Redirecting);
    }

    #[tokio::test]
    async fn closed_before_response() {
        let server = testing::spawn_socks5_origin(vec!["HTTP/1.1 200 OK\r\n"]).await;
        let url = Url::parse("http://example.com/").unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut client = StreamHttpClient::new(RequestEnvelope::get(url), socks_config(&server), tx);
        client.start().unwrap();

        let events = collect(&mut rx).await;
        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            LoadEvent::Completed(Some(EngineError::StreamError(StreamError::RemoteClosed)))
        ));
        assert_eq!(client.state(), ConnectionState::Failed);
    }

    #[tokio::test]
    async fn truncated_body() {
        let server = testing::spawn_socks5_origin(vec![
            "HTTP/1.1 200 OK\r\nContent-Length: 10\r\n\r\nshort",
        ])
        .await;
        let url = Url::parse("http://example.com/").unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut client = StreamHttpClient::new(RequestEnvelope::get(url), socks_config(&server), tx);
        client.start().unwrap();

        let events = collect(&mut rx).await;
        assert!(matches!(&events[0], LoadEvent::Response(_)));
        assert!(matches!(
            events.last(),
            Some(LoadEvent::Completed(Some(EngineError::StreamError(
                StreamError::InvalidBody(_)
            ))))
        ));
    }

    #[tokio::test]
    async fn http_forward_proxy() {
        let server = testing::spawn_http_origin(vec![
            "HTTP/1.0 200 OK\r\n\r\nuntil the end",
        ])
        .await;
        let peer = UpstreamAddr::from_ip_and_port(server.addr.ip(), server.addr.port());
        let config = StreamConfig::default().with_proxy(Proxy::Http(HttpProxy::new(peer)));
        let url = Url::parse("http://example.com/x?y=1").unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut client = StreamHttpClient::new(RequestEnvelope::get(url), config, tx);
        client.start().unwrap();

        let events = collect(&mut rx).await;
        assert_eq!(body_of(&events), "until the end");
        assert!(matches!(events.last(), Some(LoadEvent::Completed(None))));

        let captured = server.captured().await;
        assert!(
            captured
                .request
                .starts_with(b"GET http://example.com/x?y=1 HTTP/1.1\r\n")
        );
    }

    fn https_get(config: StreamConfig) -> (StreamHttpClient, mpsc::UnboundedReceiver<LoadEvent>) {
        let url = Url::parse("https://example.com/").unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        (StreamHttpClient::new(RequestEnvelope::get(url), config, tx), rx)
    }

    #[tokio::test]
    async fn https_via_socks5() {
        let identity = testing::tls_identity("example.com", rustls::ALL_VERSIONS);
        let server = testing::spawn_tls_socks5_origin(
            identity.server_config.clone(),
            vec!["HTTP/1.1 200 OK\r\nContent-Length: 6\r\n\r\nsecure"],
        )
        .await;
        let mut config = socks_config(&server);
        config.extra_roots = vec![identity.root.clone()];
        config.min_tls_version = Some(TlsVersion::TLS1_3);

        let (mut client, mut rx) = https_get(config);
        client.start().unwrap();
        let events = collect(&mut rx).await;
        assert!(matches!(&events[0], LoadEvent::Response(r) if r.status == 200));
        assert_eq!(body_of(&events), "secure");
        assert!(matches!(events.last(), Some(LoadEvent::Completed(None))));

        let captured = server.captured().await;
        assert_eq!(captured.target.as_deref(), Some("example.com:443"));
        assert!(captured.request.starts_with(b"GET / HTTP/1.1\r\n"));
    }

    #[tokio::test]
    async fn https_via_http_tunnel() {
        let identity = testing::tls_identity("example.com", rustls::ALL_VERSIONS);
        let server = testing::spawn_tls_connect_origin(
            identity.server_config.clone(),
            vec!["HTTP/1.1 200 OK\r\nContent-Length: 7\r\n\r\ntunnels"],
        )
        .await;
        let peer = UpstreamAddr::from_ip_and_port(server.addr.ip(), server.addr.port());
        let mut config = StreamConfig::default().with_proxy(Proxy::Http(HttpProxy::new(peer)));
        config.extra_roots = vec![identity.root.clone()];

        let (mut client, mut rx) = https_get(config);
        client.start().unwrap();
        let events = collect(&mut rx).await;
        assert_eq!(body_of(&events), "tunnels");
        assert!(matches!(events.last(), Some(LoadEvent::Completed(None))));

        let captured = server.captured().await;
        assert_eq!(captured.target.as_deref(), Some("example.com:443"));
        // origin form inside the tunnel
        assert!(captured.request.starts_with(b"GET / HTTP/1.1\r\n"));
    }

    fn assert_tls_failure(events: &[LoadEvent]) {
        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            LoadEvent::Completed(Some(EngineError::StreamError(StreamError::ConnectFailed(
                ConnectError::TlsHandshakeFailed(_)
            ))))
        ));
    }

    #[tokio::test]
    async fn https_below_min_version() {
        let identity = testing::tls_identity("example.com", &[&rustls::version::TLS12]);
        let server = testing::spawn_tls_socks5_origin(
            identity.server_config.clone(),
            vec!["HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n"],
        )
        .await;
        let mut config = socks_config(&server);
        config.extra_roots = vec![identity.root.clone()];
        config.min_tls_version = Some(TlsVersion::TLS1_3);

        let (mut client, mut rx) = https_get(config);
        client.start().unwrap();
        assert_tls_failure(&collect(&mut rx).await);
        assert_eq!(client.state(), ConnectionState::Failed);
        assert!(server.captured().await.request.is_empty());
    }

    #[tokio::test]
    async fn https_untrusted_root() {
        let identity = testing::tls_identity("example.com", rustls::ALL_VERSIONS);
        let server = testing::spawn_tls_socks5_origin(
            identity.server_config.clone(),
            vec!["HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n"],
        )
        .await;

        let (mut client, mut rx) = https_get(socks_config(&server));
        client.start().unwrap();
        assert_tls_failure(&collect(&mut rx).await);
        assert!(server.captured().await.request.is_empty());
    }

    #[tokio::test]
    async fn start_and_stop() {
        let server = testing::spawn_silent_server().await;
        let url = Url::parse("http://example.com/").unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut client = StreamHttpClient::new(RequestEnvelope::get(url), socks_config(&server), tx);

        client.start().unwrap();
        assert!(matches!(client.start(), Err(EngineError::AlreadyStarted)));
        assert_eq!(client.state(), ConnectionState::Open);

        client.invalidate_and_stop();
        client.invalidate_and_stop();
        assert_eq!(client.state(), ConnectionState::Cancelled);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn malformed_request() {
        let url = Url::parse("http://example.com/").unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut client =
            StreamHttpClient::new(RequestEnvelope::new("GE T", url), StreamConfig::default(), tx);
        assert!(matches!(
            client.start(),
            Err(EngineError::MalformedRequest(_))
        ));
        assert_eq!(client.state(), ConnectionState::Idle);
        drop(client);
        assert!(rx.recv().await.is_none());
    }
}
