use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::Stream;
use futures::stream::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client as ReqwestClient, Response, header};
use serde::Deserialize;
use url::Url;

use crate::client_logger::ClientLogger;
use crate::endpoint::{self, CHAT_COMPLETIONS_PATH, MODELS_PATH};
use crate::error::{Error, Result};
use crate::observability::{
    CLIENT_REQUEST_DURATION, CLIENT_REQUEST_ERRORS, CLIENT_REQUESTS, DISCOVERY_FAILURES,
    OVERFLOW_DETECTED, OVERFLOW_FATAL, OVERFLOW_RECOVERED,
};
use crate::overflow::OverflowState;
use crate::sse::process_sse;
use crate::transcript::Transcript;
use crate::types::{
    ChatCompletion, ChatCompletionRequest, CompletionOptions, Message, ModelList, StreamEvent,
    Usage,
};

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Timeout for the model listing request made by [`ChatClient::discover_model`].
pub const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(5);

/// A lazy, finite stream of decoded events from a streamed completion.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>>;

/// The outcome of a non-streaming completion.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    /// The assistant's reply.
    pub content: String,

    /// Token accounting, when the server reported it.
    pub usage: Option<Usage>,

    /// How the overflow recovery policy ended for this turn.
    pub overflow: OverflowState,
}

impl Completion {
    /// Returns true if this reply came from the retry after a context overflow.
    pub fn recovered(&self) -> bool {
        self.overflow == OverflowState::Recovered
    }
}

/// Client for an OpenAI-compatible chat completions server.
#[derive(Clone)]
pub struct ChatClient {
    client: ReqwestClient,
    base_url: Url,
    endpoint: Url,
    timeout: Duration,
    logger: Option<Arc<dyn ClientLogger>>,
}

impl ChatClient {
    /// Create a new client for the server at `base_url`.
    ///
    /// The address is normalized with [`endpoint::resolve_base`], so
    /// `localhost:8000`, `http://localhost:8000/` and
    /// `http://localhost:8000/vram` all reach the same server.
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_options(base_url, None)
    }

    /// Create a new client with custom settings.
    pub fn with_options(base_url: &str, timeout: Option<Duration>) -> Result<Self> {
        let base_url = endpoint::resolve_base(base_url)?;
        let endpoint = endpoint::join(&base_url, CHAT_COMPLETIONS_PATH)?;

        let timeout = timeout.unwrap_or(DEFAULT_TIMEOUT);
        // Whole-request deadlines are set per call; streams are bounded per chunk.
        let client = ReqwestClient::builder()
            .connect_timeout(timeout)
            .build()
            .map_err(|e| {
                Error::http_client(
                    format!("Failed to build HTTP client: {e}"),
                    Some(Box::new(e)),
                )
            })?;

        Ok(Self {
            client,
            base_url,
            endpoint,
            timeout,
            logger: None,
        })
    }

    /// Attach a logger that observes every request, response and stream event.
    pub fn with_logger(mut self, logger: Arc<dyn ClientLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// The normalized server address.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The chat completions endpoint.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// The request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Create and return default headers for API requests.
    fn default_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        headers
    }

    fn transport_error(&self, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::timeout(
                format!("Request timed out: {e}"),
                Some(self.timeout.as_secs_f64()),
            )
        } else if e.is_connect() {
            Error::connection(format!("Connection error: {e}"), Some(Box::new(e)))
        } else {
            Error::http_client(format!("Request failed: {e}"), Some(Box::new(e)))
        }
    }

    /// Process API response errors and convert to our Error type
    async fn process_error_response(response: Response) -> Error {
        let status = response.status();

        // OpenAI nests the details under `error`; vLLM puts them at the top level.
        #[derive(Deserialize)]
        struct ErrorResponse {
            error: Option<ErrorDetail>,
            message: Option<String>,
            #[serde(rename = "type")]
            error_type: Option<String>,
        }

        #[derive(Deserialize)]
        struct ErrorDetail {
            #[serde(rename = "type")]
            error_type: Option<String>,
            message: Option<String>,
        }

        let error_body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return Error::http_client(
                    format!("Failed to read error response: {e}"),
                    Some(Box::new(e)),
                );
            }
        };

        let parsed = serde_json::from_str::<ErrorResponse>(&error_body).ok();
        let detail = parsed.as_ref().and_then(|p| p.error.as_ref());
        let error_type = detail
            .and_then(|d| d.error_type.clone())
            .or_else(|| parsed.as_ref().and_then(|p| p.error_type.clone()));
        let message = detail
            .and_then(|d| d.message.clone())
            .or_else(|| parsed.as_ref().and_then(|p| p.message.clone()));

        match message {
            Some(message) => Error::server(status.as_u16(), error_type, message),
            None if error_body.trim().is_empty() => Error::server_unstructured(
                status.as_u16(),
                status.canonical_reason().unwrap_or("unknown error"),
            ),
            None => Error::server_unstructured(status.as_u16(), error_body),
        }
    }

    /// Send one non-streaming request and decode the response.
    ///
    /// No recovery is attempted; see [`ChatClient::send_completion`].
    pub async fn send(&self, request: &ChatCompletionRequest) -> Result<ChatCompletion> {
        CLIENT_REQUESTS.click();
        if let Some(logger) = &self.logger {
            logger.log_request(request);
        }
        let start = Instant::now();
        let result = self.send_once(request).await;
        CLIENT_REQUEST_DURATION.add(start.elapsed().as_secs_f64());
        match &result {
            Ok(response) => {
                if let Some(logger) = &self.logger {
                    logger.log_response(response);
                }
            }
            Err(_) => CLIENT_REQUEST_ERRORS.click(),
        }
        result
    }

    async fn send_once(&self, request: &ChatCompletionRequest) -> Result<ChatCompletion> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .headers(self.default_headers())
            .timeout(self.timeout)
            .json(request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        if !response.status().is_success() {
            return Err(Self::process_error_response(response).await);
        }

        let body = response.bytes().await.map_err(|e| self.transport_error(e))?;
        serde_json::from_slice::<ChatCompletion>(&body).map_err(|e| {
            Error::protocol(
                format!("Failed to parse response: {e}"),
                Some(Box::new(e)),
            )
        })
    }

    /// Request a completion for `messages` and extract the reply text.
    ///
    /// The transcript is not modified.
    pub async fn complete(
        &self,
        messages: &[Message],
        options: &CompletionOptions,
    ) -> Result<Completion> {
        let response = self.send(&options.request(messages, false)).await?;
        let content = response
            .content()
            .ok_or_else(|| {
                Error::protocol("response has no choices[0].message.content", None)
            })?
            .to_string();
        Ok(Completion {
            content,
            usage: response.usage,
            overflow: OverflowState::Normal,
        })
    }

    /// Request a completion for `transcript` and append the reply to it.
    ///
    /// If the server reports that the prompt exceeds the model's context
    /// window, the transcript is cut down to its most recent user message and
    /// the request is retried exactly once.  On success the reply is appended
    /// to the shortened transcript; on failure the retry's error is returned
    /// and the transcript stays shortened.
    pub async fn send_completion(
        &self,
        transcript: &mut Transcript,
        options: &CompletionOptions,
    ) -> Result<Completion> {
        let mut state = OverflowState::Normal;
        loop {
            match self.complete(transcript.messages(), options).await {
                Ok(mut completion) => {
                    state = state.after_success();
                    if state == OverflowState::Recovered {
                        OVERFLOW_RECOVERED.click();
                        self.log_overflow(state, "retry with last user message succeeded");
                    }
                    transcript.push_assistant(completion.content.clone());
                    completion.overflow = state;
                    return Ok(completion);
                }
                Err(err) => {
                    state = state.after_failure(&err);
                    match state {
                        OverflowState::Overflowed => {
                            OVERFLOW_DETECTED.click();
                            self.log_overflow(state, &err.to_string());
                            if !transcript.retain_last_user() {
                                return Err(err);
                            }
                        }
                        OverflowState::Fatal => {
                            OVERFLOW_FATAL.click();
                            self.log_overflow(state, &err.to_string());
                        }
                        _ => {}
                    }
                    if !state.should_retry() {
                        return Err(err);
                    }
                }
            }
        }
    }

    fn log_overflow(&self, state: OverflowState, message: &str) {
        if let Some(logger) = &self.logger {
            logger.log_overflow(state, message);
        }
    }

    /// Send a streaming request for `transcript`.
    ///
    /// Returns once the response headers arrive.  The client timeout bounds
    /// the wait for the headers and then each gap between chunks, not the
    /// length of the whole reply.  The stream yields
    /// [`StreamEvent::Content`] fragments as the server produces them and ends
    /// after [`StreamEvent::Done`] or when the connection closes.  Streamed
    /// requests never go through overflow recovery.
    pub async fn stream_completion(
        &self,
        transcript: &Transcript,
        options: &CompletionOptions,
    ) -> Result<EventStream> {
        self.stream(&options.request(transcript.messages(), true))
            .await
    }

    /// Send a request with `stream` forced on and decode the event stream.
    pub async fn stream(&self, request: &ChatCompletionRequest) -> Result<EventStream> {
        let mut request = request.clone();
        request.stream = true;

        CLIENT_REQUESTS.click();
        if let Some(logger) = &self.logger {
            logger.log_request(&request);
        }

        let mut headers = self.default_headers();
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("text/event-stream"),
        );

        let start = Instant::now();
        let send = self
            .client
            .post(self.endpoint.clone())
            .headers(headers)
            .json(&request)
            .send();
        let response = match tokio::time::timeout(self.timeout, send).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                CLIENT_REQUEST_ERRORS.click();
                return Err(self.transport_error(e));
            }
            Err(_) => {
                CLIENT_REQUEST_ERRORS.click();
                return Err(Error::timeout(
                    "No response headers received",
                    Some(self.timeout.as_secs_f64()),
                ));
            }
        };
        CLIENT_REQUEST_DURATION.add(start.elapsed().as_secs_f64());

        if !response.status().is_success() {
            CLIENT_REQUEST_ERRORS.click();
            return Err(Self::process_error_response(response).await);
        }

        let events = process_sse(response.bytes_stream(), Some(self.timeout));
        match self.logger.clone() {
            Some(logger) => Ok(Box::pin(events.inspect(move |event| {
                if let Ok(event) = event {
                    logger.log_stream_event(event);
                }
            }))),
            None => Ok(Box::pin(events)),
        }
    }

    /// List the models served at the base URL.
    pub async fn list_models(&self) -> Result<ModelList> {
        let url = endpoint::join(&self.base_url, MODELS_PATH)?;
        let response = self
            .client
            .get(url)
            .headers(self.default_headers())
            .timeout(DISCOVERY_TIMEOUT)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        if !response.status().is_success() {
            return Err(Self::process_error_response(response).await);
        }

        let body = response.bytes().await.map_err(|e| self.transport_error(e))?;
        serde_json::from_slice::<ModelList>(&body).map_err(|e| {
            Error::protocol(
                format!("Failed to parse model list: {e}"),
                Some(Box::new(e)),
            )
        })
    }

    /// Identifier of the first model the server lists.
    ///
    /// Any failure (transport, status, parse, empty list) yields `None`; the
    /// caller decides whether that is fatal.
    pub async fn discover_model(&self) -> Option<String> {
        match self.list_models().await {
            Ok(models) => {
                let first = models.first_id().map(String::from);
                if first.is_none() {
                    DISCOVERY_FAILURES.click();
                }
                first
            }
            Err(_) => {
                DISCOVERY_FAILURES.click();
                None
            }
        }
    }
}

impl fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatClient")
            .field("base_url", &self.base_url.as_str())
            .field("endpoint", &self.endpoint.as_str())
            .field("timeout", &self.timeout)
            .field("logger", &self.logger.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = ChatClient::new("http://localhost:8000").unwrap();
        assert_eq!(client.base_url().as_str(), "http://localhost:8000/");
        assert_eq!(
            client.endpoint().as_str(),
            "http://localhost:8000/v1/chat/completions"
        );
        assert_eq!(client.timeout(), DEFAULT_TIMEOUT);

        let client =
            ChatClient::with_options("10.0.0.5:8000/vram", Some(Duration::from_secs(120)))
                .unwrap();
        assert_eq!(
            client.endpoint().as_str(),
            "http://10.0.0.5:8000/v1/chat/completions"
        );
        assert_eq!(client.timeout(), Duration::from_secs(120));
    }

    #[test]
    fn test_client_rejects_bad_url() {
        let err = ChatClient::new("http://").unwrap_err();
        assert!(err.is_config());
    }

    #[tokio::test]
    async fn test_discover_model_unreachable() {
        // Port 9 (discard) on localhost is closed on test machines.
        let client = ChatClient::with_options("http://127.0.0.1:9", Some(Duration::from_secs(1)))
            .unwrap();
        assert_eq!(client.discover_model().await, None);
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        let client = ChatClient::with_options("http://127.0.0.1:9", Some(Duration::from_secs(1)))
            .unwrap();
        let mut transcript = Transcript::new();
        transcript.push_user("hi");
        let err = client
            .send_completion(&mut transcript, &CompletionOptions::new("m1"))
            .await
            .unwrap_err();
        assert!(err.is_transport(), "unexpected error: {err:?}");
        assert_eq!(transcript.len(), 1);
    }
}
