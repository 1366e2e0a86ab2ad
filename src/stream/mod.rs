pub mod smooth;
pub mod sse;

use futures::{ Future, Stream };
use std::pin::Pin;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::llm::LlmError;
use crate::models::stream::StreamEvent;

pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, LlmError>> + Send>>;

const CHANNEL_CAPACITY: usize = 32;

/// Runs `producer` on its own task and exposes whatever it sends as a stream.
/// The producer sees a closed channel once the consumer is dropped.
pub fn create_streaming_response<T, F, Fut>(producer: F) -> Pin<Box<dyn Stream<Item = T> + Send>>
where
    T: Send + 'static,
    F: FnOnce(mpsc::Sender<T>) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);

    tokio::spawn(async move {
        producer(tx).await;
    });

    Box::pin(ReceiverStream::new(rx))
}

/// Turns a fixed list of events into an `EventStream`.
pub fn from_events(events: Vec<Result<StreamEvent, LlmError>>) -> EventStream {
    Box::pin(futures::stream::iter(events))
}
