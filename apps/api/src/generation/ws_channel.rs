//! Generation over a WebSocket: send the request as one text frame, then read
//! JSON frames until a terminal one arrives.

use async_trait::async_trait;
use futures::{stream, SinkExt, StreamExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::Message;
use tracing::{debug, info};

use super::channel::{parse_frame, FrameStream, GenerationChannel, GenerationRequest};
use super::GenerationError;

pub struct WsGenerationChannel {
    url: String,
}

impl WsGenerationChannel {
    pub fn new(url: String) -> Self {
        Self { url }
    }
}

#[async_trait]
impl GenerationChannel for WsGenerationChannel {
    async fn open(&self, request: GenerationRequest) -> Result<FrameStream, GenerationError> {
        let (mut socket, _response) = connect_async(self.url.as_str())
            .await
            .map_err(|e| GenerationError::Channel(format!("connect {}: {e}", self.url)))?;
        info!(request_id = %request.request_id, "Generation socket connected");

        let payload = serde_json::to_string(&request)?;
        socket
            .send(Message::Text(payload))
            .await
            .map_err(|e| GenerationError::Channel(e.to_string()))?;

        // The socket lives inside the stream; dropping the stream closes it.
        let frames = stream::unfold(Some(socket), |state| async move {
            let mut socket = state?;
            loop {
                match socket.next().await {
                    Some(Ok(Message::Text(text))) => {
                        let frame = parse_frame(&text);
                        let finished = match &frame {
                            Ok(frame) => frame.is_terminal(),
                            Err(_) => true,
                        };
                        if finished {
                            let _ = socket.close(None).await;
                            return Some((frame, None));
                        }
                        return Some((frame, Some(socket)));
                    }
                    Some(Ok(Message::Close(close))) => {
                        debug!("Generation socket closed by server: {close:?}");
                        return Some((Err(GenerationError::Closed), None));
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        return Some((Err(GenerationError::Channel(e.to_string())), None));
                    }
                    None => return Some((Err(GenerationError::Closed), None)),
                }
            }
        });

        Ok(frames.boxed())
    }
}

#[cfg(test)]
mod tests {
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;
    use tokio_tungstenite::accept_async;

    use super::*;
    use crate::generation::channel::{collect_response, GenerationContext, GenerationFrame};
    use crate::models::question_set::Round;

    /// Accepts one connection, returns the first text frame it received and
    /// answers it with `replies`.
    async fn serve_once(replies: Vec<Message>) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(tcp).await.unwrap();
            let received = match ws.next().await {
                Some(Ok(Message::Text(text))) => text,
                other => panic!("expected a text frame, got {other:?}"),
            };
            for reply in replies {
                // The client may already have hung up after a terminal frame.
                let _ = ws.send(reply).await;
            }
            while let Some(Ok(_)) = ws.next().await {}
            received
        });
        (format!("ws://{addr}"), server)
    }

    fn frame(frame: &GenerationFrame) -> Message {
        Message::Text(serde_json::to_string(frame).unwrap())
    }

    fn request() -> GenerationRequest {
        GenerationRequest::question(
            Round::Position,
            GenerationContext {
                job_title: "Backend Engineer".to_string(),
                ..Default::default()
            },
            vec!["Describe a REST API you designed".to_string()],
        )
    }

    #[tokio::test]
    async fn test_request_is_one_text_frame_and_stream_stops_at_done() {
        let (url, server) = serve_once(vec![
            frame(&GenerationFrame::Delta {
                content: "How do you ".to_string(),
            }),
            frame(&GenerationFrame::Delta {
                content: "version an API?".to_string(),
            }),
            frame(&GenerationFrame::Done),
            frame(&GenerationFrame::Delta {
                content: "after the end".to_string(),
            }),
        ])
        .await;
        let sent = request();

        let frames = WsGenerationChannel::new(url).open(sent.clone()).await.unwrap();
        let frames: Vec<GenerationFrame> = frames.map(|f| f.unwrap()).collect().await;

        assert_eq!(frames.len(), 3);
        assert_eq!(frames.last(), Some(&GenerationFrame::Done));
        let received: GenerationRequest = serde_json::from_str(&server.await.unwrap()).unwrap();
        assert_eq!(received, sent);
    }

    #[tokio::test]
    async fn test_result_frame_is_collected() {
        let (url, _server) = serve_once(vec![frame(&GenerationFrame::Result {
            content: "What is idempotency?".to_string(),
        })])
        .await;

        let frames = WsGenerationChannel::new(url).open(request()).await.unwrap();
        assert_eq!(collect_response(frames).await.unwrap(), "What is idempotency?");
    }

    #[tokio::test]
    async fn test_close_before_done_is_closed() {
        let (url, _server) = serve_once(vec![
            frame(&GenerationFrame::Delta {
                content: "Half a ques".to_string(),
            }),
            Message::Close(None),
        ])
        .await;

        let frames = WsGenerationChannel::new(url).open(request()).await.unwrap();
        assert!(matches!(
            collect_response(frames).await,
            Err(GenerationError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_malformed_frame_ends_the_stream() {
        let (url, _server) = serve_once(vec![
            Message::Text("{not json".to_string()),
            frame(&GenerationFrame::Result {
                content: "never read".to_string(),
            }),
        ])
        .await;

        let mut frames = WsGenerationChannel::new(url).open(request()).await.unwrap();
        assert!(matches!(frames.next().await, Some(Err(GenerationError::Frame(_)))));
        assert!(frames.next().await.is_none());
    }

    #[tokio::test]
    async fn test_unreachable_service_is_a_channel_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = WsGenerationChannel::new(format!("ws://{addr}"))
            .open(request())
            .await;
        assert!(matches!(result, Err(GenerationError::Channel(_))));
    }
}
