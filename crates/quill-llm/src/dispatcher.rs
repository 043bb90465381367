//! End-to-end orchestration of one logical request

use std::future::Future;
use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;

use eventsource_stream::{EventStreamError, Eventsource};
use futures_util::StreamExt;
use quill_config::Config;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Response};
use tokio_util::sync::CancellationToken;

use crate::adapter::{self, BackendAdapter};
use crate::auth::{AuthListener, CredentialStore, MemoryCredentialStore, TokenManager, TokenRefresher};
use crate::builder::{RequestBuilder, http_client};
use crate::classify::{self, truncate};
use crate::context::RequestContext;
use crate::error::LlmError;
use crate::notifier::{FinallyGuard, LifecycleListener, LifecycleNotifier};
use crate::types::{LlmRequest, NormalizedResponse, StreamEvent, Usage};

/// Payload that terminates a successful stream
pub const DONE_SENTINEL: &str = "[DONE]";

/// Message of the error raised when a stream ends before the sentinel
const MISSING_DONE: &str = "stream not received DONE";

/// Upper bound on payload text written to debug logs
const DEBUG_LOG_LIMIT: usize = 2048;

/// Result of a dispatch that was not a failure
///
/// Cancellation is an expected outcome, distinct from every [`LlmError`].
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    /// The exchange ran to completion
    Completed(T),
    /// The caller cancelled before a terminal result
    Cancelled,
}

impl<T> Outcome<T> {
    /// The completed value, if any
    pub fn completed(self) -> Option<T> {
        match self {
            Self::Completed(value) => Some(value),
            Self::Cancelled => None,
        }
    }

    /// Whether the dispatch was cancelled
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Orchestrates requests against one configured backend
///
/// Safe to share across tasks; each call allocates its own
/// [`RequestContext`].
pub struct Dispatcher {
    client: Client,
    builder: RequestBuilder,
    tokens: Arc<TokenManager>,
    notifier: Arc<LifecycleNotifier>,
    stream_idle_timeout: Duration,
    debug: bool,
}

impl Dispatcher {
    /// Start building a dispatcher from configuration
    pub fn builder(config: &Config) -> DispatcherBuilder<'_> {
        DispatcherBuilder {
            config,
            backend: None,
            store: None,
            refresher: None,
            auth_listener: None,
            listeners: Vec::new(),
            debug: false,
        }
    }

    /// Adapter for the configured backend
    pub fn adapter(&self) -> &dyn BackendAdapter {
        self.builder.adapter()
    }

    /// Token manager shared by every dispatch
    pub fn tokens(&self) -> &Arc<TokenManager> {
        &self.tokens
    }

    /// Lifecycle notifier; listeners may be added at any time
    pub fn notifier(&self) -> &Arc<LifecycleNotifier> {
        &self.notifier
    }

    /// Run a non-streaming request
    ///
    /// `on_start` and `on_finally` fire exactly once; between them exactly one
    /// of `on_done` or `on_error` fires unless the request is cancelled.
    ///
    /// # Errors
    ///
    /// Returns the classified failure. Streaming requests are rejected with
    /// `LlmError::InvalidRequest`.
    pub async fn execute(
        &self,
        request: &LlmRequest,
        cancel: &CancellationToken,
    ) -> Result<Outcome<NormalizedResponse>, LlmError> {
        let ctx = RequestContext::begin(self.debug);
        let _finally = FinallyGuard::start(&self.notifier, ctx.id);
        tracing::debug!(request_id = ctx.id, backend = self.adapter().name(), kind = ?request.kind(), "dispatch started");

        let result = if request.is_stream() {
            Err(LlmError::InvalidRequest(
                "streaming requests must use execute_stream".to_owned(),
            ))
        } else {
            self.exchange(&ctx, request, cancel).await
        };

        match &result {
            Ok(Outcome::Completed(response)) => self.succeed(&ctx, response.usage.as_ref()),
            Ok(Outcome::Cancelled) => self.cancelled(&ctx),
            Err(e) => self.fail(&ctx, e),
        }
        result
    }

    /// Run a streaming request, delivering [`StreamEvent`]s to `on_event`
    ///
    /// Unless cancelled, the callback sees exactly one `Done` or `Error`;
    /// `Closed` is always the last event. The returned value mirrors the
    /// terminal event, with the last usage reported by the stream.
    ///
    /// # Errors
    ///
    /// Returns the same classified failure that was delivered as
    /// `StreamEvent::Error`. Non-streaming requests are rejected with
    /// `LlmError::InvalidRequest`.
    pub async fn execute_stream<F>(
        &self,
        request: &LlmRequest,
        cancel: &CancellationToken,
        on_event: F,
    ) -> Result<Outcome<Option<Usage>>, LlmError>
    where
        F: FnMut(StreamEvent) + Send,
    {
        let ctx = RequestContext::begin(self.debug);
        let _finally = FinallyGuard::start(&self.notifier, ctx.id);
        tracing::debug!(request_id = ctx.id, backend = self.adapter().name(), kind = ?request.kind(), "stream started");

        let mut sink = EventSink::new(on_event);
        let result = if request.is_stream() {
            self.stream(&ctx, request, cancel, &mut sink).await
        } else {
            Err(LlmError::InvalidRequest(
                "non-streaming requests must use execute".to_owned(),
            ))
        };

        match &result {
            Ok(Outcome::Completed(usage)) => {
                self.succeed(&ctx, usage.as_ref());
                sink.emit(StreamEvent::Done);
            }
            Ok(Outcome::Cancelled) => self.cancelled(&ctx),
            Err(e) => {
                self.fail(&ctx, e);
                sink.emit(StreamEvent::Error(e.clone()));
            }
        }
        sink.emit(StreamEvent::Closed);
        result
    }

    async fn exchange(
        &self,
        ctx: &RequestContext,
        request: &LlmRequest,
        cancel: &CancellationToken,
    ) -> Result<Outcome<NormalizedResponse>, LlmError> {
        let Some(response) = self.send(ctx, request, cancel).await? else {
            return Ok(Outcome::Cancelled);
        };

        let status = response.status();
        let Some(body) = until_cancelled(cancel, response.text()).await else {
            return Ok(Outcome::Cancelled);
        };
        let body = body.map_err(|e| classify::transport(&e))?;
        if ctx.debug {
            tracing::debug!(request_id = ctx.id, %status, body = truncate(&body, DEBUG_LOG_LIMIT), "response body");
        }

        if !status.is_success() {
            return Err(classify::response(self.adapter(), status, &body));
        }

        let decoded = self.adapter().decode(&body)?;
        if let Some(backend_status) = &decoded.backend_status {
            return Err(classify::backend_status(self.adapter(), backend_status));
        }
        Ok(Outcome::Completed(decoded))
    }

    async fn stream<F>(
        &self,
        ctx: &RequestContext,
        request: &LlmRequest,
        cancel: &CancellationToken,
        sink: &mut EventSink<F>,
    ) -> Result<Outcome<Option<Usage>>, LlmError>
    where
        F: FnMut(StreamEvent) + Send,
    {
        let Some(response) = self.send(ctx, request, cancel).await? else {
            return Ok(Outcome::Cancelled);
        };

        let status = response.status();
        if !status.is_success() || !is_event_stream(&response) {
            // Backends report failures as a plain body even when a stream was asked for
            let Some(body) = until_cancelled(cancel, idle_bounded(self.stream_idle_timeout, response.text())).await
            else {
                return Ok(Outcome::Cancelled);
            };
            let body = body?;
            if ctx.debug {
                tracing::debug!(request_id = ctx.id, %status, body = truncate(&body, DEBUG_LOG_LIMIT), "non-stream response body");
            }
            return Err(classify::response(self.adapter(), status, &body));
        }
        sink.emit(StreamEvent::Connected);

        let adapter = self.adapter();
        let mut events = pin!(response.bytes_stream().eventsource());
        let mut usage = None;

        loop {
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => return Ok(Outcome::Cancelled),
                next = tokio::time::timeout(self.stream_idle_timeout, events.next()) => next,
            };

            let event = match next {
                Err(_) => return Err(idle_timeout(self.stream_idle_timeout)),
                Ok(None) => return Err(LlmError::StreamProtocol(MISSING_DONE.to_owned())),
                Ok(Some(Err(EventStreamError::Transport(e)))) => {
                    tracing::warn!(request_id = ctx.id, error = %e, "event stream interrupted");
                    return Err(LlmError::StreamProtocol(MISSING_DONE.to_owned()));
                }
                Ok(Some(Err(e))) => return Err(LlmError::StreamProtocol(format!("malformed event stream: {e}"))),
                Ok(Some(Ok(event))) => event,
            };

            let data = event.data.trim();
            if data.is_empty() {
                continue;
            }
            if data == DONE_SENTINEL {
                return Ok(Outcome::Completed(usage));
            }
            if ctx.debug {
                tracing::debug!(request_id = ctx.id, data = truncate(data, DEBUG_LOG_LIMIT), "stream event");
            }

            let chunk = adapter.decode(data)?;
            if let Some(backend_status) = &chunk.backend_status {
                return Err(classify::backend_status(adapter, backend_status));
            }

            // Usage usually arrives on the final chunk only
            let chunk_usage = chunk.usage;
            if chunk_usage.is_some() {
                usage = chunk_usage;
            }
            if !chunk.choices.is_empty() {
                sink.emit(StreamEvent::TokenChoices(chunk));
            }
            if let Some(chunk_usage) = chunk_usage {
                sink.emit(StreamEvent::TokenUsage(chunk_usage));
            }
        }
    }

    /// Validate, authorize, build and send; `None` when cancelled
    async fn send(
        &self,
        ctx: &RequestContext,
        request: &LlmRequest,
        cancel: &CancellationToken,
    ) -> Result<Option<Response>, LlmError> {
        request.validate()?;

        let Some(token) = until_cancelled(cancel, self.tokens.access_token()).await else {
            return Ok(None);
        };
        let http_request = self.builder.build(request, &token?)?;

        if ctx.debug
            && let Some(body) = http_request.body().and_then(reqwest::Body::as_bytes)
        {
            tracing::debug!(
                request_id = ctx.id,
                url = %http_request.url(),
                body = truncate(&String::from_utf8_lossy(body), DEBUG_LOG_LIMIT),
                "outbound request"
            );
        }

        let execute = self.client.execute(http_request);
        let sent = if request.is_stream() {
            // Streams carry no per-request timeout, so the idle ceiling covers the headers
            until_cancelled(cancel, idle_bounded(self.stream_idle_timeout, execute)).await
        } else {
            until_cancelled(cancel, async { execute.await.map_err(|e| classify::transport(&e)) }).await
        };
        sent.transpose()
    }

    fn succeed(&self, ctx: &RequestContext, usage: Option<&Usage>) {
        tracing::debug!(
            request_id = ctx.id,
            elapsed = ?ctx.elapsed(),
            prompt_tokens = usage.map(|u| u.prompt_tokens),
            completion_tokens = usage.map(|u| u.completion_tokens),
            "dispatch completed"
        );
        self.notifier.done(ctx.id, usage);
    }

    fn fail(&self, ctx: &RequestContext, error: &LlmError) {
        tracing::warn!(
            request_id = ctx.id,
            backend = self.adapter().name(),
            kind = ?error.kind(),
            error = %error,
            "dispatch failed"
        );
        if error.is_unauthorized() {
            self.tokens.invalidate();
        }
        self.notifier.error(ctx.id, error);
    }

    fn cancelled(&self, ctx: &RequestContext) {
        tracing::debug!(request_id = ctx.id, elapsed = ?ctx.elapsed(), "dispatch cancelled");
    }
}

/// Await `fut` unless `cancel` fires first
async fn until_cancelled<F: Future>(cancel: &CancellationToken, fut: F) -> Option<F::Output> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => None,
        out = fut => Some(out),
    }
}

/// Await a transport future for at most `limit`
async fn idle_bounded<T, F>(limit: Duration, fut: F) -> Result<T, LlmError>
where
    F: Future<Output = Result<T, reqwest::Error>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result.map_err(|e| classify::transport(&e)),
        Err(_) => Err(idle_timeout(limit)),
    }
}

fn idle_timeout(limit: Duration) -> LlmError {
    LlmError::Unknown(format!("stream idle for longer than {limit:?}"))
}

/// Whether the response declares an SSE body; a missing content type is taken as SSE
fn is_event_stream(response: &Response) -> bool {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_none_or(|v| v.trim_start().to_ascii_lowercase().starts_with("text/event-stream"))
}

/// Caller callback that admits one terminal event and nothing after `Closed`
struct EventSink<F> {
    on_event: F,
    terminated: bool,
    closed: bool,
}

impl<F: FnMut(StreamEvent)> EventSink<F> {
    const fn new(on_event: F) -> Self {
        Self {
            on_event,
            terminated: false,
            closed: false,
        }
    }

    fn emit(&mut self, event: StreamEvent) {
        if self.closed {
            return;
        }
        match &event {
            StreamEvent::Closed => self.closed = true,
            terminal if terminal.is_terminal() => {
                if self.terminated {
                    return;
                }
                self.terminated = true;
            }
            _ if self.terminated => return,
            _ => {}
        }
        (self.on_event)(event);
    }
}

/// Assembles a [`Dispatcher`] from configuration plus host collaborators
pub struct DispatcherBuilder<'a> {
    config: &'a Config,
    backend: Option<String>,
    store: Option<Arc<dyn CredentialStore>>,
    refresher: Option<Arc<dyn TokenRefresher>>,
    auth_listener: Option<Arc<dyn AuthListener>>,
    listeners: Vec<Arc<dyn LifecycleListener>>,
    debug: bool,
}

impl DispatcherBuilder<'_> {
    /// Use the named backend instead of the configured default
    #[must_use]
    pub fn backend(mut self, name: impl Into<String>) -> Self {
        self.backend = Some(name.into());
        self
    }

    /// Persist credentials through the given store (in-memory by default)
    #[must_use]
    pub fn credential_store(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Replace the HTTP refresher built from `auth.refresh_url`
    #[must_use]
    pub fn refresher(mut self, refresher: Arc<dyn TokenRefresher>) -> Self {
        self.refresher = Some(refresher);
        self
    }

    /// Receive credential refresh and sign-in notifications
    #[must_use]
    pub fn auth_listener(mut self, listener: Arc<dyn AuthListener>) -> Self {
        self.auth_listener = Some(listener);
        self
    }

    /// Register a lifecycle listener
    #[must_use]
    pub fn listener(mut self, listener: Arc<dyn LifecycleListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Log outbound bodies and stream payloads at debug level
    #[must_use]
    pub const fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Build the dispatcher
    ///
    /// # Errors
    ///
    /// Returns `LlmError::Config` if the backend cannot be resolved or the
    /// HTTP client or static headers are invalid.
    pub fn build(self) -> Result<Dispatcher, LlmError> {
        let config = self.config;
        let (name, backend) = config.llm.backend(self.backend.as_deref()).ok_or_else(|| match &self.backend {
            Some(name) => LlmError::Config(format!("unknown backend '{name}'")),
            None => LlmError::Config("no backend configured".to_owned()),
        })?;

        let client = http_client(&config.transport)?;
        let adapter = adapter::from_config(name, backend);
        let builder = RequestBuilder::new(
            client.clone(),
            adapter,
            backend,
            Some(config.transport.request_timeout),
        )?;

        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryCredentialStore::default()));
        let mut tokens = TokenManager::from_config(&config.auth, client.clone(), store);
        if let Some(refresher) = self.refresher {
            tokens = tokens.with_refresher(refresher);
        }
        if let Some(listener) = self.auth_listener {
            tokens = tokens.with_listener(listener);
        }

        let notifier = LifecycleNotifier::default();
        for listener in self.listeners {
            notifier.subscribe(listener);
        }

        tracing::debug!(backend = name, base_url = %backend.base_url, "dispatcher ready");

        Ok(Dispatcher {
            client,
            builder,
            tokens: Arc::new(tokens),
            notifier: Arc::new(notifier),
            stream_idle_timeout: config.transport.stream_idle_timeout,
            debug: self.debug,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use quill_config::{BackendConfig, BackendType, EndpointConfig};
    use url::Url;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::auth::Credentials;
    use crate::error::ErrorKind;
    use crate::types::{GenerationParams, Message};

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl Recorder {
        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }
    }

    impl LifecycleListener for Recorder {
        fn on_start(&self, _id: u64) {
            self.events.lock().unwrap().push("start".into());
        }

        fn on_done(&self, _id: u64, usage: Option<&Usage>) {
            let usage = usage.map_or_else(|| "none".to_owned(), |u| format!("{}+{}", u.prompt_tokens, u.completion_tokens));
            self.events.lock().unwrap().push(format!("done:{usage}"));
        }

        fn on_error(&self, _id: u64, error: &LlmError) {
            self.events.lock().unwrap().push(format!("error:{:?}", error.kind()));
        }

        fn on_finally(&self, _id: u64) {
            self.events.lock().unwrap().push("finally".into());
        }
    }

    fn config(server: &MockServer) -> Config {
        let mut config = Config::default();
        config.llm.backends.insert(
            "nova".into(),
            BackendConfig {
                backend_type: BackendType::Nova,
                base_url: Url::parse(&server.uri()).unwrap(),
                endpoints: EndpointConfig::default(),
                headers: Default::default(),
            },
        );
        config
    }

    fn dispatcher(server: &MockServer, store: Arc<MemoryCredentialStore>, recorder: Arc<Recorder>) -> Dispatcher {
        Dispatcher::builder(&config(server))
            .credential_store(store)
            .listener(recorder)
            .build()
            .unwrap()
    }

    fn signed_in() -> Arc<MemoryCredentialStore> {
        Arc::new(MemoryCredentialStore::with("default", Credentials::access_only("token-1")))
    }

    fn completion() -> LlmRequest {
        LlmRequest::completion(GenerationParams::new("nova-code"), "fn main")
    }

    fn streaming_chat() -> LlmRequest {
        LlmRequest::chat(
            GenerationParams::new("nova-chat").streaming(),
            vec![Message::User("hi".into())],
        )
    }

    fn sse(body: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_raw(body.to_owned(), "text/event-stream")
    }

    type StreamResult = Result<Outcome<Option<Usage>>, LlmError>;

    async fn collect_stream(dispatcher: &Dispatcher, request: &LlmRequest) -> (Vec<StreamEvent>, StreamResult) {
        let mut events = Vec::new();
        let result = dispatcher
            .execute_stream(request, &CancellationToken::new(), |event| events.push(event))
            .await;
        (events, result)
    }

    #[tokio::test]
    async fn json_completion_reports_usage() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/llm/completions"))
            .and(header("authorization", "Bearer token-1"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"{"choices":[{"text":"hi"}],"usage":{"prompt_tokens":3,"completion_tokens":1}}"#,
                "application/json",
            ))
            .expect(1)
            .mount(&server)
            .await;

        let recorder = Arc::new(Recorder::default());
        let dispatcher = dispatcher(&server, signed_in(), recorder.clone());
        let response = dispatcher
            .execute(&completion(), &CancellationToken::new())
            .await
            .unwrap()
            .completed()
            .unwrap();

        assert_eq!(response.first_token(), Some("hi"));
        assert_eq!(response.usage.unwrap().total(), 4);
        assert_eq!(recorder.events(), ["start", "done:3+1", "finally"]);
    }

    #[tokio::test]
    async fn backend_auth_code_invalidates_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_raw(
                r#"{"code":200002,"message":"bad token"}"#,
                "application/json",
            ))
            .mount(&server)
            .await;

        let store = signed_in();
        let recorder = Arc::new(Recorder::default());
        let dispatcher = dispatcher(&server, store.clone(), recorder.clone());
        let err = dispatcher
            .execute(&completion(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err, LlmError::Unauthorized("bad token".into()));
        assert!(store.get("default").is_none());
        assert_eq!(recorder.events(), ["start", "error:Unauthorized", "finally"]);
    }

    #[tokio::test]
    async fn server_error_is_classified() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("upstream exploded"))
            .mount(&server)
            .await;

        let dispatcher = dispatcher(&server, signed_in(), Arc::new(Recorder::default()));
        let err = dispatcher
            .execute(&completion(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err, LlmError::ServerError { status: 503 });
    }

    #[tokio::test]
    async fn undecodable_success_body_is_unknown() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let recorder = Arc::new(Recorder::default());
        let dispatcher = dispatcher(&server, signed_in(), recorder.clone());
        let err = dispatcher
            .execute(&completion(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unknown);
        assert_eq!(recorder.events(), ["start", "error:Unknown", "finally"]);
    }

    #[tokio::test]
    async fn missing_token_fails_before_sending() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let dispatcher = dispatcher(
            &server,
            Arc::new(MemoryCredentialStore::default()),
            Arc::new(Recorder::default()),
        );
        let err = dispatcher
            .execute(&completion(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err, LlmError::Unauthorized("access token is empty".into()));
    }

    #[tokio::test]
    async fn mode_mismatch_is_rejected() {
        let server = MockServer::start().await;
        let recorder = Arc::new(Recorder::default());
        let dispatcher = dispatcher(&server, signed_in(), recorder.clone());

        let err = dispatcher
            .execute(&streaming_chat(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);

        let (events, result) = collect_stream(&dispatcher, &completion()).await;
        assert!(result.is_err());
        assert!(matches!(events.as_slice(), [StreamEvent::Error(_), StreamEvent::Closed]));
    }

    #[tokio::test]
    async fn stream_delivers_chunks_then_done() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/llm/chat-completions"))
            .and(header("accept", "text/event-stream"))
            .respond_with(sse(concat!(
                "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n",
                "data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\n",
                "data: {\"choices\":[],\"usage\":{\"prompt_tokens\":5,\"completion_tokens\":2}}\n\n",
                "data: [DONE]\n\n",
            )))
            .mount(&server)
            .await;

        let recorder = Arc::new(Recorder::default());
        let dispatcher = dispatcher(&server, signed_in(), recorder.clone());
        let (events, result) = collect_stream(&dispatcher, &streaming_chat()).await;

        let usage = Usage {
            prompt_tokens: 5,
            completion_tokens: 2,
        };
        assert_eq!(result.unwrap(), Outcome::Completed(Some(usage)));
        assert_eq!(events.len(), 6);
        assert_eq!(events[0], StreamEvent::Connected);
        let StreamEvent::TokenChoices(first) = &events[1] else {
            panic!("expected token choices, got {:?}", events[1]);
        };
        assert_eq!(first.first_token(), Some("Hel"));
        assert!(matches!(events[2], StreamEvent::TokenChoices(_)));
        assert_eq!(events[3], StreamEvent::TokenUsage(usage));
        assert_eq!(events[4], StreamEvent::Done);
        assert_eq!(events[5], StreamEvent::Closed);
        assert_eq!(recorder.events(), ["start", "done:5+2", "finally"]);
    }

    #[tokio::test]
    async fn stream_without_sentinel_is_protocol_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(sse("data: {\"choices\":[{\"delta\":{\"content\":\"partial\"}}]}\n\n"))
            .mount(&server)
            .await;

        let dispatcher = dispatcher(&server, signed_in(), Arc::new(Recorder::default()));
        let (events, result) = collect_stream(&dispatcher, &streaming_chat()).await;

        let expected = LlmError::StreamProtocol("stream not received DONE".into());
        assert_eq!(result.unwrap_err(), expected);
        assert_eq!(events.len(), 4);
        assert!(matches!(events[1], StreamEvent::TokenChoices(_)));
        assert_eq!(events[2], StreamEvent::Error(expected));
        assert_eq!(events[3], StreamEvent::Closed);
        assert!(!events.contains(&StreamEvent::Done));
    }

    #[tokio::test]
    async fn in_stream_backend_status_keeps_partial_output() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(sse(concat!(
                "data: {\"choices\":[{\"delta\":{\"content\":\"ok\"}}]}\n\n",
                "data: {\"code\":18,\"message\":\"content blocked\"}\n\n",
                "data: [DONE]\n\n",
            )))
            .mount(&server)
            .await;

        let dispatcher = dispatcher(&server, signed_in(), Arc::new(Recorder::default()));
        let (events, result) = collect_stream(&dispatcher, &streaming_chat()).await;

        assert_eq!(result.unwrap_err(), LlmError::SensitiveContent("content blocked".into()));
        assert!(matches!(events[1], StreamEvent::TokenChoices(_)));
        assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
        assert_eq!(events.last(), Some(&StreamEvent::Closed));
    }

    #[tokio::test]
    async fn stream_open_failure_is_terminal_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_raw(
                r#"{"code":17,"message":"slow down"}"#,
                "application/json",
            ))
            .mount(&server)
            .await;

        let dispatcher = dispatcher(&server, signed_in(), Arc::new(Recorder::default()));
        let (events, result) = collect_stream(&dispatcher, &streaming_chat()).await;

        assert_eq!(result.unwrap_err(), LlmError::RateLimited("slow down".into()));
        assert_eq!(
            events,
            [
                StreamEvent::Error(LlmError::RateLimited("slow down".into())),
                StreamEvent::Closed
            ]
        );
    }

    #[tokio::test]
    async fn json_answer_to_stream_request_uses_code_table() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"{"code":200002,"message":"bad token"}"#,
                "application/json",
            ))
            .mount(&server)
            .await;

        let store = signed_in();
        let recorder = Arc::new(Recorder::default());
        let dispatcher = dispatcher(&server, store.clone(), recorder.clone());
        let (events, result) = collect_stream(&dispatcher, &streaming_chat()).await;

        let expected = LlmError::Unauthorized("bad token".into());
        assert_eq!(result.unwrap_err(), expected);
        assert_eq!(events, [StreamEvent::Error(expected), StreamEvent::Closed]);
        assert!(store.get("default").is_none());
        assert_eq!(recorder.events(), ["start", "error:Unauthorized", "finally"]);
    }

    #[tokio::test]
    async fn stream_headers_are_bounded_by_idle_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(sse("data: [DONE]\n\n").set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let mut config = config(&server);
        config.transport.stream_idle_timeout = Duration::from_millis(300);
        let recorder = Arc::new(Recorder::default());
        let dispatcher = Dispatcher::builder(&config)
            .credential_store(signed_in())
            .listener(recorder.clone())
            .build()
            .unwrap();

        let started = std::time::Instant::now();
        let (events, result) = collect_stream(&dispatcher, &streaming_chat()).await;

        assert!(started.elapsed() < Duration::from_secs(3));
        assert_eq!(result.unwrap_err().kind(), ErrorKind::Unknown);
        assert!(matches!(events.as_slice(), [StreamEvent::Error(_), StreamEvent::Closed]));
        assert_eq!(recorder.events(), ["start", "error:Unknown", "finally"]);
    }

    #[tokio::test]
    async fn dropped_dispatch_still_fires_finally() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(10)))
            .mount(&server)
            .await;

        let recorder = Arc::new(Recorder::default());
        let dispatcher = dispatcher(&server, signed_in(), recorder.clone());
        let cancel = CancellationToken::new();

        let elapsed = tokio::time::timeout(Duration::from_millis(200), dispatcher.execute(&completion(), &cancel)).await;

        assert!(elapsed.is_err());
        assert_eq!(recorder.events(), ["start", "finally"]);
    }

    #[tokio::test]
    async fn cancellation_is_not_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(10)))
            .mount(&server)
            .await;

        let recorder = Arc::new(Recorder::default());
        let dispatcher = dispatcher(&server, signed_in(), recorder.clone());
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let outcome = dispatcher.execute(&completion(), &cancel).await.unwrap();
        assert!(outcome.is_cancelled());
        assert_eq!(recorder.events(), ["start", "finally"]);
    }

    #[tokio::test]
    async fn unknown_backend_is_config_error() {
        let server = MockServer::start().await;
        let err = Dispatcher::builder(&config(&server))
            .backend("missing")
            .build()
            .err()
            .unwrap();
        assert_eq!(err, LlmError::Config("unknown backend 'missing'".into()));
    }

    #[tokio::test]
    async fn ids_differ_between_dispatches() {
        #[derive(Default)]
        struct Ids(Mutex<Vec<u64>>);

        impl LifecycleListener for Ids {
            fn on_start(&self, id: u64) {
                self.0.lock().unwrap().push(id);
            }
        }

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(r#"{"choices":[]}"#, "application/json"))
            .mount(&server)
            .await;

        let ids = Arc::new(Ids::default());
        let dispatcher = dispatcher(&server, signed_in(), Arc::new(Recorder::default()));
        dispatcher.notifier().subscribe(ids.clone());
        for _ in 0..3 {
            dispatcher.execute(&completion(), &CancellationToken::new()).await.unwrap();
        }

        let ids = ids.0.lock().unwrap().clone();
        assert_eq!(ids.len(), 3);
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(dispatcher.tokens().identity(), "default");
    }
}
