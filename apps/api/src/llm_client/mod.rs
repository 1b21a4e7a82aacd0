//! Streaming client for the Anthropic Messages API.
//!
//! Generation asks for `stream: true` and forwards text deltas as they
//! arrive. Opening the stream is retried on 429 and 5xx (529 is "overloaded");
//! once the reply is flowing, the first failure ends it.

pub mod events;
pub mod prompts;

use std::collections::VecDeque;
use std::time::Duration;

use futures::stream::{self, BoxStream, StreamExt};
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use events::{interpret, EventDecoder, RawEvent, TextEvent};

const MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";
/// Model used for question generation and library search.
pub const MODEL: &str = "claude-sonnet-4-5";
/// One question or one batch of short questions.
const MAX_TOKENS: u32 = 1024;
const MAX_ATTEMPTS: u32 = 3;
const BACKOFF_BASE: Duration = Duration::from_millis(500);
const MAX_RETRY_AFTER: Duration = Duration::from_secs(20);

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Model unavailable after {attempts} attempts, last: {last}")]
    Unavailable { attempts: u32, last: String },

    #[error("Model stream failed: {0}")]
    Stream(String),
}

pub type TextStream = BoxStream<'static, Result<TextEvent, LlmError>>;

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    stream: bool,
    messages: [UserTurn<'a>; 1],
}

#[derive(Debug, Serialize)]
struct UserTurn<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

#[derive(Clone)]
pub struct LlmClient {
    http: Client,
    api_key: String,
    url: String,
    backoff: Duration,
}

impl LlmClient {
    pub fn new(api_key: String) -> Result<Self, LlmError> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(120))
            .build()?;
        Ok(Self {
            http,
            api_key,
            url: MESSAGES_URL.to_string(),
            backoff: BACKOFF_BASE,
        })
    }

    /// Opens a streamed reply to `prompt`. Text arrives as `Delta`s; the
    /// stream ends after `Stop` or at the first error.
    pub async fn stream_text(&self, prompt: &str, system: &str) -> Result<TextStream, LlmError> {
        let body = MessagesRequest {
            model: MODEL,
            max_tokens: MAX_TOKENS,
            system,
            stream: true,
            messages: [UserTurn {
                role: "user",
                content: prompt,
            }],
        };
        let response = self.open(&body).await?;
        debug!("Model stream opened");
        Ok(text_events(response))
    }

    async fn open(&self, body: &MessagesRequest<'_>) -> Result<Response, LlmError> {
        let mut last = String::new();
        for attempt in 1..=MAX_ATTEMPTS {
            let sent = self
                .http
                .post(&self.url)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", API_VERSION)
                .json(body)
                .send()
                .await;

            let response = match sent {
                Ok(response) => response,
                Err(e) if e.is_connect() || e.is_timeout() => {
                    warn!(attempt, "Model request failed: {e}");
                    last = e.to_string();
                    self.pause(attempt, None).await;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let status = response.status();
            if status.is_success() {
                return Ok(response);
            }
            let retry_after = retry_after(&response);
            let message = error_message(response.text().await.unwrap_or_default());
            if !is_retryable(status) {
                return Err(LlmError::Api {
                    status: status.as_u16(),
                    message,
                });
            }
            warn!(attempt, status = status.as_u16(), "Model busy: {message}");
            last = format!("{status}: {message}");
            self.pause(attempt, retry_after).await;
        }
        Err(LlmError::Unavailable {
            attempts: MAX_ATTEMPTS,
            last,
        })
    }

    /// Backoff before the next attempt; none after the last one.
    async fn pause(&self, attempt: u32, retry_after: Option<Duration>) {
        if attempt == MAX_ATTEMPTS {
            return;
        }
        let delay = retry_after.unwrap_or(self.backoff * 2u32.pow(attempt - 1));
        tokio::time::sleep(delay).await;
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn retry_after(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(|secs| Duration::from_secs(secs).min(MAX_RETRY_AFTER))
}

fn error_message(body: String) -> String {
    serde_json::from_str::<ErrorEnvelope>(&body)
        .map(|e| e.error.message)
        .unwrap_or(body)
}

struct Reading {
    response: Response,
    decoder: EventDecoder,
    pending: VecDeque<RawEvent>,
}

/// Turns the response body into text events, reading it chunk by chunk.
fn text_events(response: Response) -> TextStream {
    let reading = Reading {
        response,
        decoder: EventDecoder::default(),
        pending: VecDeque::new(),
    };

    stream::unfold(Some(reading), |state| async move {
        let mut reading = state?;
        loop {
            if let Some(raw) = reading.pending.pop_front() {
                match interpret(&raw) {
                    Ok(None) => continue,
                    Ok(Some(TextEvent::Stop)) => return Some((Ok(TextEvent::Stop), None)),
                    Ok(Some(event)) => return Some((Ok(event), Some(reading))),
                    Err(e) => return Some((Err(e), None)),
                }
            }
            match reading.response.chunk().await {
                Ok(Some(bytes)) => {
                    let events = reading.decoder.push(&bytes);
                    reading.pending.extend(events);
                }
                Ok(None) => {
                    let cut = LlmError::Stream("reply ended before message_stop".to_string());
                    return Some((Err(cut), None));
                }
                Err(e) => return Some((Err(e.into()), None)),
            }
        }
    })
    .boxed()
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::task::JoinHandle;

    use super::events::fixtures::reply;
    use super::*;

    fn client(url: String) -> LlmClient {
        LlmClient {
            http: Client::builder().no_proxy().build().unwrap(),
            api_key: "sk-test".to_string(),
            url,
            backoff: Duration::ZERO,
        }
    }

    fn event_stream_response(body: &str) -> String {
        format!(
            "HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\nconnection: close\r\n\r\n{body}"
        )
    }

    fn json_response(status: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        )
    }

    /// Reads one request and returns its body.
    async fn read_request(socket: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                return String::new();
            }
            buf.extend_from_slice(&chunk[..n]);
            let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
                continue;
            };
            let head = String::from_utf8_lossy(&buf[..end]).to_lowercase();
            let length = head
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            let start = end + 4;
            if buf.len() >= start + length {
                return String::from_utf8_lossy(&buf[start..start + length]).into_owned();
            }
        }
    }

    /// Answers one connection per entry of `responses`, in order, and returns
    /// the request bodies it saw.
    async fn serve(responses: Vec<String>) -> (String, JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let mut bodies = Vec::new();
            for response in responses {
                let (mut socket, _) = listener.accept().await.unwrap();
                bodies.push(read_request(&mut socket).await);
                socket.write_all(response.as_bytes()).await.unwrap();
                socket.shutdown().await.unwrap();
            }
            bodies
        });
        (format!("http://{addr}/v1/messages"), server)
    }

    async fn collect(stream: TextStream) -> Vec<Result<TextEvent, LlmError>> {
        stream.collect().await
    }

    #[tokio::test]
    async fn test_streamed_question_arrives_as_deltas() {
        let (url, server) =
            serve(vec![event_stream_response(&reply(&["What is ", "a lifetime?"]))]).await;

        let stream = client(url)
            .stream_text("one question please", "plain text only")
            .await
            .unwrap();
        let events: Vec<TextEvent> = collect(stream)
            .await
            .into_iter()
            .map(|e| e.unwrap())
            .collect();

        assert_eq!(
            events,
            vec![
                TextEvent::Delta("What is ".to_string()),
                TextEvent::Delta("a lifetime?".to_string()),
                TextEvent::Stop,
            ]
        );
        let bodies = server.await.unwrap();
        let sent: serde_json::Value = serde_json::from_str(&bodies[0]).unwrap();
        assert_eq!(sent["stream"], true);
        assert_eq!(sent["model"], MODEL);
        assert_eq!(sent["system"], "plain text only");
        assert_eq!(sent["messages"][0]["content"], "one question please");
    }

    #[tokio::test]
    async fn test_overloaded_model_is_retried() {
        let (url, server) = serve(vec![
            json_response(
                "529 Overloaded",
                r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#,
            ),
            event_stream_response(&reply(&["[\"Explain sharding\"]"])),
        ])
        .await;

        let stream = client(url).stream_text("a batch", "json only").await.unwrap();
        let events = collect(stream).await;

        assert!(matches!(&events[0], Ok(TextEvent::Delta(text)) if text == "[\"Explain sharding\"]"));
        assert_eq!(server.await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_rejected_request_is_not_retried() {
        let (url, server) = serve(vec![json_response(
            "400 Bad Request",
            r#"{"type":"error","error":{"type":"invalid_request_error","message":"max_tokens too large"}}"#,
        )])
        .await;

        let err = client(url).stream_text("q", "s").await.err().unwrap();
        assert!(matches!(
            err,
            LlmError::Api { status: 400, ref message } if message == "max_tokens too large"
        ));
        assert_eq!(server.await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let busy = json_response("503 Service Unavailable", "{}");
        let (url, server) = serve(vec![busy.clone(), busy.clone(), busy]).await;

        let err = client(url).stream_text("q", "s").await.err().unwrap();
        assert!(matches!(err, LlmError::Unavailable { attempts: 3, .. }));
        assert_eq!(server.await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_reply_cut_short_ends_with_an_error() {
        let truncated = reply(&["Describe a time you"]);
        let truncated = &truncated[..truncated.find("event: content_block_stop").unwrap()];
        let (url, _server) = serve(vec![event_stream_response(truncated)]).await;

        let stream = client(url).stream_text("q", "s").await.unwrap();
        let events = collect(stream).await;

        assert!(matches!(&events[0], Ok(TextEvent::Delta(_))));
        assert!(matches!(events.last(), Some(Err(LlmError::Stream(_)))));
    }
}
