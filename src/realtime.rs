// src/realtime.rs
//! Realtime channel: Server-Sent-Events decoding, the connect/subscribe
//! handshake and the `Subscription` handle that owns the live stream.

use std::collections::VecDeque;

use futures::stream::{BoxStream, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::ChatError;
use crate::models::chat::{RecordAction, RecordEvent};

/// Name of the first event the service sends on a new realtime connection.
pub const CONNECT_EVENT: &str = "PB_CONNECT";

const EVENT_BUFFER: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub id: Option<String>,
    pub event: String,
    pub data: String,
}

/// Incremental `text/event-stream` decoder. Chunks may split lines or events
/// anywhere; complete events are returned as soon as their blank line arrives.
/// Lines end in `\n`, `\r\n` or a lone `\r`.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    // Last chunk ended in `\r`; a leading `\n` in the next one belongs to it
    after_cr: bool,
    id: Option<String>,
    event: Option<String>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        let chunk = match chunk.split_first() {
            Some((b'\n', rest)) if self.after_cr => rest,
            _ => chunk,
        };
        self.after_cr = false;
        self.buffer.extend_from_slice(chunk);

        let buffer = std::mem::take(&mut self.buffer);
        let mut events = Vec::new();
        let mut start = 0;
        let mut cursor = 0;
        while cursor < buffer.len() {
            let end = match buffer[cursor] {
                b'\n' => cursor + 1,
                b'\r' if buffer.get(cursor + 1) == Some(&b'\n') => cursor + 2,
                b'\r' if cursor + 1 == buffer.len() => {
                    self.after_cr = true;
                    cursor + 1
                }
                b'\r' => cursor + 1,
                _ => {
                    cursor += 1;
                    continue;
                }
            };
            let line = String::from_utf8_lossy(&buffer[start..cursor]).into_owned();
            if let Some(event) = self.process_line(&line) {
                events.push(event);
            }
            start = end;
            cursor = end;
        }
        self.buffer = buffer[start..].to_vec();
        events
    }

    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            "id" => self.id = Some(value.to_string()),
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = self.event.take();
        let id = self.id.take();
        if self.data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseEvent {
            id,
            event: event.unwrap_or_else(|| "message".to_string()),
            data,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ConnectPayload {
    #[serde(rename = "clientId")]
    client_id: String,
}

/// Raw body chunks of the event stream.
pub type ByteStream = BoxStream<'static, Result<Vec<u8>, ChatError>>;

/// An open event stream that has completed the connect handshake but is not
/// yet forwarding anything.
pub struct RealtimeConnection {
    client_id: String,
    stream: ByteStream,
    decoder: SseDecoder,
    backlog: VecDeque<SseEvent>,
}

impl RealtimeConnection {
    /// Reads events until the connect event arrives and returns the connection
    /// with its client id.
    pub async fn handshake(mut stream: ByteStream) -> Result<Self, ChatError> {
        let mut decoder = SseDecoder::default();
        let mut backlog = VecDeque::new();

        let client_id = 'connect: loop {
            let chunk = match stream.next().await {
                Some(chunk) => chunk?,
                None => {
                    return Err(ChatError::Realtime(
                        "stream closed before the connect event".to_string(),
                    ))
                }
            };
            let mut events = decoder.push(&chunk).into_iter();
            while let Some(event) = events.next() {
                if event.event == CONNECT_EVENT {
                    let payload: ConnectPayload = serde_json::from_str(&event.data)?;
                    backlog.extend(events);
                    break 'connect payload.client_id;
                }
                tracing::debug!(event = %event.event, "Skipping realtime event before connect");
            }
        };

        tracing::debug!(client_id = %client_id, "Realtime connection established");
        Ok(Self {
            client_id,
            stream,
            decoder,
            backlog,
        })
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Spawns the reader that forwards record events for `topic` until the
    /// stream ends or the returned `Subscription` goes away.
    pub fn into_subscription(self, topic: String) -> Subscription {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let reader = tokio::spawn(forward_events(self, topic, tx));
        Subscription::new(rx, Some(reader))
    }
}

fn topic_base(topic: &str) -> &str {
    topic.split('?').next().unwrap_or(topic)
}

async fn forward_events(mut connection: RealtimeConnection, topic: String, tx: mpsc::Sender<RecordEvent>) {
    let wanted = topic_base(&topic).to_string();
    let mut pending = std::mem::take(&mut connection.backlog);

    loop {
        while let Some(event) = pending.pop_front() {
            if topic_base(&event.event) != wanted {
                continue;
            }
            match serde_json::from_str::<RecordEvent>(&event.data) {
                Ok(record_event) => {
                    if tx.send(record_event).await.is_err() {
                        return;
                    }
                }
                Err(e) => tracing::warn!("Dropping malformed realtime event: {}", e),
            }
        }

        match connection.stream.next().await {
            Some(Ok(chunk)) => pending.extend(connection.decoder.push(&chunk)),
            Some(Err(e)) => {
                tracing::error!(client_id = %connection.client_id, "Realtime stream failed: {}", e);
                return;
            }
            None => {
                tracing::info!(client_id = %connection.client_id, "Realtime stream closed by the service");
                return;
            }
        }
    }
}

/// Live subscription to the messages collection. Dropping it tears the
/// underlying stream down.
pub struct Subscription {
    events: mpsc::Receiver<RecordEvent>,
    action: Option<RecordAction>,
    reader: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn new(events: mpsc::Receiver<RecordEvent>, reader: Option<JoinHandle<()>>) -> Self {
        Self {
            events,
            action: None,
            reader,
        }
    }

    /// Restricts delivery to one kind of event.
    pub fn only(mut self, action: RecordAction) -> Self {
        self.action = Some(action);
        self
    }

    /// Next matching event, or `None` once the stream has ended.
    pub async fn next(&mut self) -> Option<RecordEvent> {
        loop {
            let event = self.events.recv().await?;
            if self.action.map_or(true, |action| action == event.action) {
                return Some(event);
            }
        }
    }

    pub fn unsubscribe(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        self.events.close();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn bytes_stream(chunks: Vec<&'static str>) -> ByteStream {
        stream::iter(chunks.into_iter().map(|c| Ok(c.as_bytes().to_vec()))).boxed()
    }

    #[test]
    fn test_decoder_handles_split_chunks() {
        let mut decoder = SseDecoder::default();
        assert!(decoder.push(b"event: PB_CON").is_empty());
        assert!(decoder.push(b"NECT\ndata: {\"clientId\"").is_empty());

        let events = decoder.push(b": \"abc\"}\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, "PB_CONNECT");
        assert_eq!(events[0].data, "{\"clientId\": \"abc\"}");
    }

    #[test]
    fn test_decoder_multiline_data_and_crlf() {
        let mut decoder = SseDecoder::default();
        let events = decoder.push(b"id: 7\r\ndata: one\r\ndata: two\r\n\r\n: keep-alive\n\n");
        assert_eq!(
            events,
            vec![SseEvent {
                id: Some("7".to_string()),
                event: "message".to_string(),
                data: "one\ntwo".to_string(),
            }]
        );
    }

    #[test]
    fn test_decoder_lone_carriage_returns() {
        let mut decoder = SseDecoder::default();
        let events = decoder.push(b"event: a\rdata: 1\r\revent: b\rdata: 2\r");
        assert_eq!(events.len(), 1);
        assert_eq!((events[0].event.as_str(), events[0].data.as_str()), ("a", "1"));

        // A CRLF split across chunks is still one line ending
        assert!(decoder.push(b"\n").is_empty());
        let events = decoder.push(b"\r\n");
        assert_eq!(events.len(), 1);
        assert_eq!((events[0].event.as_str(), events[0].data.as_str()), ("b", "2"));
    }

    #[test]
    fn test_decoder_many_events_in_one_chunk() {
        let mut decoder = SseDecoder::default();
        let chunk: String = (0..500).map(|i| format!("data: {}\n\n", i)).collect();
        let events = decoder.push(format!("{}data: tail", chunk).as_bytes());
        assert_eq!(events.len(), 500);
        assert_eq!(events[499].data, "499");

        let events = decoder.push(b"\n\n");
        assert_eq!(events[0].data, "tail");
    }

    #[tokio::test]
    async fn test_handshake_keeps_events_after_connect() {
        let stream = bytes_stream(vec![
            "event: PB_CONNECT\ndata: {\"clientId\":\"c1\"}\n\n\
             event: messages/*\ndata: {\"action\":\"create\",\"record\":{\"id\":\"m1\",\"text\":\"hi\",\"user\":\"u2\",\"created\":\"2024-03-01 09:15:00.000Z\"}}\n\n",
        ]);

        let connection = RealtimeConnection::handshake(stream).await.unwrap();
        assert_eq!(connection.client_id(), "c1");

        let mut subscription = connection.into_subscription("messages/*?options=%7B%7D".to_string());
        let event = subscription.next().await.unwrap();
        assert_eq!(event.record.id, "m1");
        assert!(subscription.next().await.is_none());
    }

    #[tokio::test]
    async fn test_handshake_fails_without_connect_event() {
        let stream = bytes_stream(vec!["data: hello\n\n"]);
        let err = RealtimeConnection::handshake(stream).await.err().unwrap();
        assert!(matches!(err, ChatError::Realtime(_)));
    }

    #[tokio::test]
    async fn test_subscription_filters_by_action() {
        let record = crate::models::chat::MessageRecord {
            id: "m1".to_string(),
            text: "hi".to_string(),
            user: "u2".to_string(),
            created: chrono::Utc::now(),
            expand: None,
        };
        let (tx, rx) = mpsc::channel(4);
        let mut subscription = Subscription::new(rx, None).only(RecordAction::Create);

        tx.send(RecordEvent { action: RecordAction::Update, record: record.clone() }).await.unwrap();
        tx.send(RecordEvent { action: RecordAction::Create, record }).await.unwrap();
        drop(tx);

        assert_eq!(subscription.next().await.unwrap().action, RecordAction::Create);
        assert!(subscription.next().await.is_none());
    }
}
