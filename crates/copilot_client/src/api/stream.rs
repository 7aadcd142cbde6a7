use std::pin::Pin;

use async_stream::stream;
use eventsource_stream::Eventsource;
use futures_util::{Stream, StreamExt};
use log::{debug, error, warn};
use reqwest::Response;

use crate::api::models::{ChatCompletionStreamChunk, StreamEvent};
use crate::error::CopilotError;

pub type UpstreamStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, CopilotError>> + Send>>;

/// Decodes the `data:` payload of one SSE event.
///
/// Returns `None` for blank payloads and for payloads that are not valid
/// chunk JSON; those are skipped instead of failing the stream.
pub fn parse_event_data(data: &str) -> Option<StreamEvent> {
    let data = data.trim();
    if data.is_empty() {
        return None;
    }
    if data == "[DONE]" {
        return Some(StreamEvent::Done);
    }
    match serde_json::from_str::<ChatCompletionStreamChunk>(data) {
        Ok(chunk) => Some(StreamEvent::Chunk(chunk)),
        Err(e) => {
            warn!("Skipping malformed stream chunk: {e}, data: {data}");
            None
        }
    }
}

/// Turns an open upstream response into a stream of chunks ending with
/// [`StreamEvent::Done`]. The stream stops after `[DONE]` even if the
/// connection stays open; dropping it closes the connection.
pub fn chat_completion_events(response: Response) -> UpstreamStream {
    Box::pin(stream! {
        let mut event_stream = response.bytes_stream().eventsource();
        while let Some(event_result) = event_stream.next().await {
            match event_result {
                Ok(message) => match parse_event_data(&message.data) {
                    Some(StreamEvent::Done) => {
                        debug!("Received [DONE] signal, closing stream.");
                        yield Ok(StreamEvent::Done);
                        return;
                    }
                    Some(event) => yield Ok(event),
                    None => continue,
                },
                Err(e) => {
                    error!("Error in SSE stream: {e}");
                    yield Err(CopilotError::Stream(e.to_string()));
                    return;
                }
            }
        }
    })
}
