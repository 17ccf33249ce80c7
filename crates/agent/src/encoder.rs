//! The ordered, cancellable event channel between a running turn and its
//! caller.
//!
//! [`event_channel`] returns the two halves. The loop owns the
//! [`EventSink`]; the caller gets an [`EventStream`]. The channel is bounded,
//! so a slow caller suspends the loop instead of growing a buffer. Dropping
//! the stream cancels the turn.

use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::Stream;
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, trace};

use crate::stream_event::{SequencedEvent, StreamEvent};

/// How long a cancelled turn waits for room to deliver its terminal event.
pub const TERMINAL_GRACE: Duration = Duration::from_secs(5);

/// Create a connected sink/stream pair holding at most `capacity` undelivered
/// events.
pub fn event_channel(capacity: usize) -> (EventSink, EventStream) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let cancel = CancellationToken::new();

    let sink = EventSink {
        tx,
        next_seq: 0,
        finished: false,
        cancel: cancel.clone(),
    };
    let stream = EventStream {
        rx,
        _guard: cancel.clone().drop_guard(),
        cancel,
    };
    (sink, stream)
}

/// Producer half. Stamps sequence numbers and enforces a single terminal
/// event.
#[derive(Debug)]
pub struct EventSink {
    tx: mpsc::Sender<SequencedEvent>,
    next_seq: u64,
    finished: bool,
    cancel: CancellationToken,
}

impl EventSink {
    /// Deliver one event, waiting for room in the channel.
    ///
    /// Returns `false` if the event was not delivered: a terminal event was
    /// already sent, the caller dropped the stream, or the turn was
    /// cancelled. A terminal event still goes out after cancellation while
    /// the caller holds the stream, waiting at most [`TERMINAL_GRACE`] for
    /// room.
    pub async fn emit(&mut self, event: StreamEvent) -> bool {
        if self.finished {
            trace!(event = event.event_type(), "Dropping event after terminal");
            return false;
        }
        let terminal = event.is_terminal();
        if terminal {
            self.finished = true;
        }

        let reserved = if self.cancel.is_cancelled() {
            None
        } else {
            tokio::select! {
                biased;
                permit = self.tx.reserve() => Some(permit),
                _ = self.cancel.cancelled() => None,
            }
        };
        let permit = match reserved {
            Some(permit) => permit.ok(),
            None if terminal => Self::reserve_for_terminal(&self.tx).await,
            None => None,
        };

        let Some(permit) = permit else {
            return false;
        };
        permit.send(SequencedEvent {
            seq: self.next_seq,
            event,
        });
        self.next_seq += 1;
        true
    }

    async fn reserve_for_terminal(
        tx: &mpsc::Sender<SequencedEvent>,
    ) -> Option<mpsc::Permit<'_, SequencedEvent>> {
        if tx.is_closed() {
            return None;
        }
        match tokio::time::timeout(TERMINAL_GRACE, tx.reserve()).await {
            Ok(permit) => permit.ok(),
            Err(_) => {
                debug!("Caller stopped reading, dropping terminal event");
                None
            }
        }
    }

    /// Whether a terminal event has been emitted.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Whether the caller still holds the stream.
    pub fn is_attached(&self) -> bool {
        !self.tx.is_closed()
    }

    /// Whether the caller asked to stop, explicitly or by going away.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Consumer half: a `Stream` of events in production order.
///
/// Dropping it cancels the turn.
#[derive(Debug)]
pub struct EventStream {
    rx: mpsc::Receiver<SequencedEvent>,
    cancel: CancellationToken,
    _guard: DropGuard,
}

impl EventStream {
    /// Ask the turn to stop at its next suspension point.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Stream for EventStream {
    type Item = SequencedEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream_event::ErrorCode;
    use futures::StreamExt;

    fn token(text: &str) -> StreamEvent {
        StreamEvent::Token { text: text.into() }
    }

    #[tokio::test]
    async fn sequence_numbers_follow_production_order() {
        let (mut sink, stream) = event_channel(8);
        assert!(sink.emit(token("a")).await);
        assert!(sink.emit(token("b")).await);
        assert!(sink.emit(StreamEvent::error(ErrorCode::Provider, "x")).await);
        drop(sink);

        let events: Vec<SequencedEvent> = stream.collect().await;
        let seqs: Vec<u64> = events.iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![0, 1, 2]);
        assert_eq!(events[0].event, token("a"));
    }

    #[tokio::test]
    async fn nothing_after_terminal() {
        let (mut sink, stream) = event_channel(8);
        assert!(sink.emit(StreamEvent::error(ErrorCode::Internal, "x")).await);
        assert!(sink.is_finished());
        assert!(!sink.emit(token("late")).await);
        assert!(!sink.emit(StreamEvent::error(ErrorCode::Internal, "again")).await);
        drop(sink);

        let events: Vec<SequencedEvent> = stream.collect().await;
        assert_eq!(events.len(), 1);
    }

    #[tokio::test]
    async fn dropping_stream_cancels() {
        let (mut sink, stream) = event_channel(8);
        assert!(sink.is_attached());
        drop(stream);
        assert!(sink.is_cancelled());
        assert!(!sink.is_attached());
        assert!(!sink.emit(token("a")).await);
    }

    #[tokio::test]
    async fn explicit_cancel_unblocks_full_channel() {
        let (mut sink, stream) = event_channel(1);
        assert!(sink.emit(token("a")).await);

        let waiting = tokio::spawn(async move { sink.emit(token("b")).await });
        tokio::task::yield_now().await;
        stream.cancel();
        assert!(!waiting.await.unwrap());
        assert!(stream.is_cancelled());
    }

    #[tokio::test]
    async fn back_pressure_waits_for_reader() {
        let (mut sink, mut stream) = event_channel(1);
        let producer = tokio::spawn(async move {
            for i in 0..5 {
                assert!(sink.emit(token(&i.to_string())).await);
            }
        });

        let mut seen = Vec::new();
        while let Some(event) = stream.next().await {
            seen.push(event.seq);
        }
        producer.await.unwrap();
        assert_eq!(seen, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn cancelled_reader_still_gets_terminal_event() {
        let (mut sink, stream) = event_channel(1);
        assert!(sink.emit(token("a")).await);
        stream.cancel();

        assert!(!sink.emit(token("b")).await);
        let terminal = tokio::spawn(async move {
            sink.emit(StreamEvent::error(ErrorCode::Cancelled, "turn cancelled"))
                .await
        });

        let events: Vec<SequencedEvent> = stream.collect().await;
        assert!(terminal.await.unwrap());
        let types: Vec<&str> = events.iter().map(|e| e.event.event_type()).collect();
        assert_eq!(types, vec!["token", "error"]);
        assert_eq!(events[1].seq, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn terminal_event_gives_up_on_stalled_reader() {
        let (mut sink, stream) = event_channel(1);
        assert!(sink.emit(token("a")).await);
        stream.cancel();

        let started = tokio::time::Instant::now();
        assert!(!sink.emit(StreamEvent::error(ErrorCode::Cancelled, "x")).await);
        assert_eq!(started.elapsed(), TERMINAL_GRACE);
        drop(stream);
    }
}
