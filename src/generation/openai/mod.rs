
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, Lines, Read};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::ContractQaError;
use crate::config::LlmConfig;
use crate::generation::{ChatMessage, FragmentIter, LanguageModel};

/// Client for any server speaking the OpenAI chat-completions protocol
///
/// Generation is attempted once; failures are reported, not retried.
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleClient {
    endpoint: String,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    api_key: Option<String>,
    timeout: Duration,
    agent: ureq::Agent,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Delta,
}

#[derive(Debug, Default, Deserialize)]
struct Delta {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

impl OpenAiCompatibleClient {
    /// Build a client from settings, reading the API key from the environment
    #[inline]
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)
            .with_context(|| format!("Invalid chat model base URL: {}", config.base_url))?;

        // Streamed bodies may legitimately outlive the timeout, so it bounds
        // everything up to the response head; full bodies get it per request
        let timeout = Duration::from_secs(config.timeout_secs);
        let agent = ureq::Agent::config_builder()
            .timeout_connect(Some(timeout))
            .timeout_send_request(Some(timeout))
            .timeout_send_body(Some(timeout))
            .timeout_recv_response(Some(timeout))
            .http_status_as_error(false)
            .build()
            .into();

        let api_key = config.api_key();
        if api_key.is_none() {
            warn!(
                "No API key found in ${}; sending unauthenticated requests",
                config.api_key_env
            );
        }

        Ok(Self {
            endpoint: format!(
                "{}/chat/completions",
                base_url.as_str().trim_end_matches('/')
            ),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            api_key,
            timeout,
            agent,
        })
    }

    #[inline]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    #[inline]
    pub fn model(&self) -> &str {
        &self.model
    }

    #[inline]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// One complete answer
    #[inline]
    pub fn chat(&self, messages: &[ChatMessage]) -> Result<String> {
        let mut response = self.send(messages, false)?;
        let body = response
            .body_mut()
            .read_to_string()
            .context("Failed to read completion response")?;

        let parsed: CompletionResponse =
            serde_json::from_str(&body).context("Failed to parse completion response")?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .context("Completion response contained no message")?;

        debug!("Received completion of {} chars", content.chars().count());
        Ok(content)
    }

    /// Answer fragments read from a server-sent event stream
    #[inline]
    pub fn chat_stream(
        &self,
        messages: &[ChatMessage],
    ) -> Result<SseFragments<ureq::BodyReader<'static>>> {
        let response = self.send(messages, true)?;
        Ok(SseFragments::new(response.into_body().into_reader()))
    }

    fn send(
        &self,
        messages: &[ChatMessage],
        stream: bool,
    ) -> Result<ureq::http::Response<ureq::Body>> {
        let request = ChatRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            stream,
        };
        let request_json =
            serde_json::to_string(&request).context("Failed to serialize chat request")?;

        debug!(
            "Sending {} messages to {} (model {}, stream {})",
            messages.len(),
            self.endpoint,
            self.model,
            stream
        );

        let mut builder = self
            .agent
            .post(&self.endpoint)
            .header("Content-Type", "application/json");
        if let Some(key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {key}"));
        }
        if !stream {
            builder = builder
                .config()
                .timeout_recv_body(Some(self.timeout))
                .build();
        }

        let mut response = builder
            .send(&request_json)
            .with_context(|| format!("Failed to reach {}", self.endpoint))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.body_mut().read_to_string().unwrap_or_default();
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .map(|envelope| envelope.error.message)
                .unwrap_or(body);
            warn!("Chat request failed with HTTP {}: {}", status.as_u16(), message);
            bail!("HTTP {}: {}", status.as_u16(), message.trim());
        }

        Ok(response)
    }
}

impl LanguageModel for OpenAiCompatibleClient {
    fn complete(&self, messages: &[ChatMessage]) -> crate::Result<String> {
        self.chat(messages)
            .map_err(|e| ContractQaError::Generation(format!("{e:#}")))
    }

    fn stream(&self, messages: &[ChatMessage]) -> crate::Result<FragmentIter> {
        let fragments = self
            .chat_stream(messages)
            .map_err(|e| ContractQaError::Generation(format!("{e:#}")))?;
        Ok(Box::new(fragments.map(|fragment| {
            fragment.map_err(|e| ContractQaError::Generation(format!("{e:#}")))
        })))
    }

    fn name(&self) -> &str {
        &self.model
    }
}

/// Content deltas parsed from `data:` lines until `[DONE]`
pub struct SseFragments<R> {
    lines: Lines<BufReader<R>>,
    done: bool,
}

impl<R: Read> SseFragments<R> {
    #[inline]
    pub fn new(reader: R) -> Self {
        Self {
            lines: BufReader::new(reader).lines(),
            done: false,
        }
    }
}

impl<R: Read> Iterator for SseFragments<R> {
    type Item = Result<String>;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            let line = match self.lines.next() {
                Some(Ok(line)) => line,
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(e).context("Failed to read answer stream"));
                }
                None => {
                    self.done = true;
                    return None;
                }
            };

            // Blank separators and `:` keep-alive comments carry no data
            let Some(data) = line.trim().strip_prefix("data:").map(str::trim_start) else {
                continue;
            };

            if data == "[DONE]" {
                self.done = true;
                return None;
            }

            match parse_event(data) {
                Ok(Some(text)) => return Some(Ok(text)),
                Ok(None) => {}
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
        None
    }
}

fn parse_event(data: &str) -> Result<Option<String>> {
    let chunk: StreamChunk =
        serde_json::from_str(data).with_context(|| format!("Malformed stream event: {data}"))?;

    if let Some(error) = chunk.error {
        bail!("Model reported an error mid-stream: {}", error.message);
    }

    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta.content)
        .filter(|content| !content.is_empty()))
}
