//! HTTP client for the remote transcription and assistant endpoints.
//!
//! Every call is guarded by the [`TokenManager`]: a request is only built
//! once a non-expired (or freshly refreshed) access token is in hand, and
//! a token refreshed in the middle of a retry loop re-signs the next
//! attempt because the bearer header is resolved per attempt.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{StatusCode, multipart};
use serde::{Deserialize, Serialize};

use crate::auth::{AuthError, AuthTransport, TokenManager, TokenPair};
use crate::retry::{RetryPolicy, Transient};

/// A single attempt's failure below the application layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Connection-level failure: refusal, timeout, protocol error.
    #[error("http transport failure: {0}")]
    Http(#[from] reqwest::Error),
    /// The server answered outside the 2xx range.
    #[error("server replied with status {0}")]
    Status(StatusCode),
}

/// Errors surfaced by dispatch calls.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// No valid credential was available and refresh could not produce
    /// one. Recovery is an explicit re-login.
    #[error("not authenticated")]
    Unauthenticated,
    /// A single attempt failed at the transport level.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// Transport failures exhausted the retry budget.
    #[error("dispatch failed after {attempts} attempts: {last}")]
    DispatchFailed {
        attempts: u32,
        last: TransportError,
    },
    /// The server answered 2xx with an empty or invalid payload. Never
    /// retried: the request arrived, the answer just carried nothing.
    #[error("server returned an empty or invalid result")]
    EmptyResult,
}

impl Transient for DispatchError {
    fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

/// Endpoint location and per-call network policy for the [`ApiClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL every endpoint path is joined against.
    pub base_url: String,
    /// Optional session key forwarded for server-side payload decryption.
    pub session_key: Option<String>,
    /// Retry policy for the transcription upload.
    pub retry: RetryPolicy,
}

/// Parameters forwarded to the speech-synthesis endpoint.
#[derive(Debug, Clone)]
pub struct SpeechParams {
    pub voice: String,
    pub model: String,
    pub response_format: String,
    pub speed: f32,
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    identity: &'a str,
    device_token: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    prompt: &'a str,
    src_lang: &'a str,
    tgt_lang: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    response: Option<String>,
}

#[derive(Debug, Serialize)]
struct TranslateRequest<'a> {
    sentences: &'a [String],
    src_lang: &'a str,
    tgt_lang: &'a str,
}

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    translations: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct TranscribeResponse {
    text: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VisualQueryResponse {
    answer: Option<String>,
}

/// Builds the shared HTTP client with the pipeline's fixed timeout.
pub fn build_http_client(timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder().timeout(timeout).build()
}

fn join_url(base: &str, path: &str) -> String {
    format!("{}{path}", base.trim_end_matches('/'))
}

/// Drops non-2xx responses into the transport error bucket. The response
/// (and with it the pooled connection) is released on the error path.
fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, TransportError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(TransportError::Status(status))
    }
}

/// A body that fails to parse despite a 2xx status is a semantic failure,
/// not a transport one.
fn decode_as_empty(error: reqwest::Error) -> DispatchError {
    if error.is_decode() {
        DispatchError::EmptyResult
    } else {
        DispatchError::Transport(TransportError::Http(error))
    }
}

/// Accepts a transcription payload only when it carries text and no
/// server-reported error.
fn validate_transcription(response: TranscribeResponse) -> Result<String, DispatchError> {
    if let Some(error) = response.error.filter(|message| !message.is_empty()) {
        log::warn!("Transcription service reported: {error}");
        return Err(DispatchError::EmptyResult);
    }
    match response.text {
        Some(text) if !text.trim().is_empty() => Ok(text),
        _ => Err(DispatchError::EmptyResult),
    }
}

/// Rewraps a post-retry transport error with the attempt count.
fn finish_retried<T>(result: Result<T, DispatchError>, attempts: u32) -> Result<T, DispatchError> {
    result.map_err(|error| match error {
        DispatchError::Transport(last) => DispatchError::DispatchFailed { attempts, last },
        other => other,
    })
}

/// Authenticated client for the assistant endpoints.
pub struct ApiClient {
    http: reqwest::Client,
    config: ClientConfig,
    tokens: Arc<TokenManager>,
}

impl ApiClient {
    pub fn new(http: reqwest::Client, config: ClientConfig, tokens: Arc<TokenManager>) -> Self {
        Self {
            http,
            config,
            tokens,
        }
    }

    pub fn token_manager(&self) -> &Arc<TokenManager> {
        &self.tokens
    }

    fn endpoint(&self, path: &str) -> String {
        join_url(&self.config.base_url, path)
    }

    /// Resolves the bearer token for one attempt, refreshing proactively.
    /// Fails fast without touching the network when no usable credential
    /// can be produced.
    async fn bearer(&self) -> Result<String, DispatchError> {
        if !self.tokens.refresh_if_needed().await {
            return Err(DispatchError::Unauthenticated);
        }
        self.tokens
            .access_token()
            .ok_or(DispatchError::Unauthenticated)
    }

    fn decorate(&self, request: reqwest::RequestBuilder, token: &str) -> reqwest::RequestBuilder {
        let request = request.bearer_auth(token);
        match &self.config.session_key {
            Some(key) => request.header("x-session-key", key),
            None => request,
        }
    }

    /// Uploads one WAV-framed utterance for transcription.
    ///
    /// Transport failures are retried under the configured policy; a 2xx
    /// answer with no usable text is reported immediately.
    pub async fn transcribe(&self, wav: Vec<u8>, language: &str) -> Result<String, DispatchError> {
        let retry = self.config.retry;
        let url = self.endpoint("/transcribe/");

        let result = retry
            .run(|attempt| {
                let url = url.clone();
                let wav = wav.clone();
                async move {
                    let token = self.bearer().await?;
                    let file = multipart::Part::bytes(wav)
                        .file_name("utterance.wav")
                        .mime_str("audio/x-wav")
                        .map_err(TransportError::Http)?;
                    let form = multipart::Form::new().part("file", file);

                    log::debug!("Uploading utterance for transcription, attempt {attempt}");
                    let response = self
                        .decorate(self.http.post(&url), &token)
                        .query(&[("language", language)])
                        .multipart(form)
                        .send()
                        .await
                        .map_err(TransportError::Http)?;
                    let response = ensure_success(response)?;

                    let payload: TranscribeResponse =
                        response.json().await.map_err(decode_as_empty)?;
                    validate_transcription(payload)
                }
            })
            .await;

        finish_retried(result, retry.max_attempts)
    }

    /// Sends a prompt to the assistant and returns its reply.
    pub async fn chat(
        &self,
        prompt: &str,
        src_lang: &str,
        tgt_lang: &str,
    ) -> Result<String, DispatchError> {
        let token = self.bearer().await?;
        let response = self
            .decorate(self.http.post(self.endpoint("/v1/chat")), &token)
            .json(&ChatRequest {
                prompt,
                src_lang,
                tgt_lang,
            })
            .send()
            .await
            .map_err(TransportError::Http)?;
        let response = ensure_success(response)?;

        let payload: ChatResponse = response.json().await.map_err(decode_as_empty)?;
        match payload.response {
            Some(text) if !text.trim().is_empty() => Ok(text),
            _ => Err(DispatchError::EmptyResult),
        }
    }

    /// Translates a batch of sentences between the configured languages.
    pub async fn translate(
        &self,
        sentences: &[String],
        src_lang: &str,
        tgt_lang: &str,
    ) -> Result<Vec<String>, DispatchError> {
        let token = self.bearer().await?;
        let response = self
            .decorate(self.http.post(self.endpoint("/v1/translate")), &token)
            .json(&TranslateRequest {
                sentences,
                src_lang,
                tgt_lang,
            })
            .send()
            .await
            .map_err(TransportError::Http)?;
        let response = ensure_success(response)?;

        let payload: TranslateResponse = response.json().await.map_err(decode_as_empty)?;
        if payload.translations.is_empty() {
            Err(DispatchError::EmptyResult)
        } else {
            Ok(payload.translations)
        }
    }

    /// Asks a question about an image.
    pub async fn visual_query(
        &self,
        image: Vec<u8>,
        query: &str,
        src_lang: &str,
        tgt_lang: &str,
    ) -> Result<String, DispatchError> {
        let token = self.bearer().await?;
        let file = multipart::Part::bytes(image)
            .file_name("frame.jpg")
            .mime_str("image/jpeg")
            .map_err(TransportError::Http)?;
        let form = multipart::Form::new()
            .part("file", file)
            .text("query", query.to_string());

        let response = self
            .decorate(self.http.post(self.endpoint("/v1/visual_query")), &token)
            .query(&[("src_lang", src_lang), ("tgt_lang", tgt_lang)])
            .multipart(form)
            .send()
            .await
            .map_err(TransportError::Http)?;
        let response = ensure_success(response)?;

        let payload: VisualQueryResponse = response.json().await.map_err(decode_as_empty)?;
        match payload.answer {
            Some(answer) if !answer.trim().is_empty() => Ok(answer),
            _ => Err(DispatchError::EmptyResult),
        }
    }

    /// Synthesizes speech for the given text, returning raw audio bytes.
    pub async fn text_to_speech(
        &self,
        input: &str,
        params: &SpeechParams,
    ) -> Result<Vec<u8>, DispatchError> {
        let token = self.bearer().await?;
        let speed = params.speed.to_string();
        let response = self
            .decorate(self.http.post(self.endpoint("/v1/audio/speech")), &token)
            .query(&[
                ("input", input),
                ("voice", params.voice.as_str()),
                ("model", params.model.as_str()),
                ("response_format", params.response_format.as_str()),
                ("speed", speed.as_str()),
            ])
            .send()
            .await
            .map_err(TransportError::Http)?;
        let response = ensure_success(response)?;

        let bytes = response
            .bytes()
            .await
            .map_err(|error| DispatchError::Transport(TransportError::Http(error)))?;
        if bytes.is_empty() {
            Err(DispatchError::EmptyResult)
        } else {
            Ok(bytes.to_vec())
        }
    }
}

/// The unauthenticated login/refresh endpoints, used by the token manager
/// through the [`AuthTransport`] capability.
pub struct AuthEndpoint {
    http: reqwest::Client,
    base_url: String,
}

impl AuthEndpoint {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    async fn token_response(
        &self,
        response: Result<reqwest::Response, reqwest::Error>,
    ) -> Result<TokenPair, AuthError> {
        let response =
            response.map_err(|error| AuthError::Transport(error.without_url().to_string()))?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(AuthError::Rejected(format!("server replied {status}")));
        }
        if !status.is_success() {
            return Err(AuthError::Transport(format!("server replied {status}")));
        }

        let tokens: TokenResponse = response
            .json()
            .await
            .map_err(|error| AuthError::Transport(error.without_url().to_string()))?;
        Ok(TokenPair {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
        })
    }
}

#[async_trait]
impl AuthTransport for AuthEndpoint {
    async fn login(&self, identity: &str, device_token: &str) -> Result<TokenPair, AuthError> {
        let response = self
            .http
            .post(join_url(&self.base_url, "/v1/login"))
            .json(&LoginRequest {
                identity,
                device_token,
            })
            .send()
            .await;
        self.token_response(response).await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        let response = self
            .http
            .post(join_url(&self.base_url, "/v1/refresh"))
            .bearer_auth(refresh_token)
            .send()
            .await;
        self.token_response(response).await
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    #[test]
    fn urls_join_with_and_without_trailing_slash() {
        assert_eq!(
            join_url("https://api.example.com", "/v1/chat"),
            "https://api.example.com/v1/chat"
        );
        assert_eq!(
            join_url("https://api.example.com/", "/v1/chat"),
            "https://api.example.com/v1/chat"
        );
    }

    #[test]
    fn transcription_with_text_is_accepted() {
        let accepted = validate_transcription(TranscribeResponse {
            text: Some("hello there".into()),
            error: None,
        });
        assert_eq!(accepted.unwrap(), "hello there");
    }

    #[test]
    fn transcription_with_server_error_is_semantic_failure() {
        let rejected = validate_transcription(TranscribeResponse {
            text: Some("hello".into()),
            error: Some("model overloaded".into()),
        });
        assert!(matches!(rejected, Err(DispatchError::EmptyResult)));
    }

    #[test]
    fn transcription_without_text_is_semantic_failure() {
        for text in [None, Some(String::new()), Some("   ".into())] {
            let rejected = validate_transcription(TranscribeResponse { text, error: None });
            assert!(matches!(rejected, Err(DispatchError::EmptyResult)));
        }
    }

    #[test]
    fn only_transport_errors_are_transient() {
        let transport: DispatchError =
            TransportError::Status(StatusCode::INTERNAL_SERVER_ERROR).into();
        assert!(transport.is_transient());
        assert!(!DispatchError::Unauthenticated.is_transient());
        assert!(!DispatchError::EmptyResult.is_transient());
    }

    #[tokio::test(start_paused = true)]
    async fn persistent_server_errors_exhaust_into_dispatch_failed() {
        let retry = RetryPolicy::default();
        let calls = Cell::new(0u32);

        let result: Result<String, DispatchError> = retry
            .run(|_| {
                calls.set(calls.get() + 1);
                async {
                    Err(TransportError::Status(StatusCode::INTERNAL_SERVER_ERROR).into())
                }
            })
            .await;
        let result = finish_retried(result, retry.max_attempts);

        assert_eq!(calls.get(), retry.max_attempts);
        match result {
            Err(DispatchError::DispatchFailed { attempts, last }) => {
                assert_eq!(attempts, 3);
                assert!(matches!(
                    last,
                    TransportError::Status(StatusCode::INTERNAL_SERVER_ERROR)
                ));
            }
            other => panic!("expected DispatchFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn semantic_failures_bypass_the_retry_loop() {
        let retry = RetryPolicy::default();
        let calls = Cell::new(0u32);

        let result: Result<String, DispatchError> = retry
            .run(|_| {
                calls.set(calls.get() + 1);
                async { Err(DispatchError::EmptyResult) }
            })
            .await;
        let result = finish_retried(result, retry.max_attempts);

        assert_eq!(calls.get(), 1);
        assert!(matches!(result, Err(DispatchError::EmptyResult)));
    }
}
