//! The inbound "submit turn" operation.
//!
//! [`ConversationRuntime::submit_turn`] validates the input, takes the
//! thread, records the user message and spawns the agent loop. Everything
//! after that reaches the caller through the returned [`EventStream`].

use std::sync::Arc;

use nexus_config::AppConfig;
use nexus_core::error::SubmitError;
use nexus_core::message::{NewMessage, ThreadId};
use nexus_core::provider::ReasoningProvider;
use nexus_core::thread::{ThreadLease, ThreadStore};
use nexus_tools::ToolDispatcher;
use tracing::{info, warn};

use crate::encoder::{EventStream, event_channel};
use crate::loop_runner::{AgentLoop, LoopSettings};

pub struct ConversationRuntime {
    agent: Arc<AgentLoop>,
    event_buffer: usize,
    max_input_chars: usize,
}

impl ConversationRuntime {
    pub fn new(agent: Arc<AgentLoop>, event_buffer: usize, max_input_chars: usize) -> Self {
        Self {
            agent,
            event_buffer,
            max_input_chars,
        }
    }

    /// Wire a runtime from configuration and its collaborators.
    pub fn from_config(
        config: &AppConfig,
        provider: Arc<dyn ReasoningProvider>,
        dispatcher: Arc<ToolDispatcher>,
        store: Arc<dyn ThreadStore>,
    ) -> Self {
        let agent = AgentLoop::new(provider, dispatcher, store, LoopSettings::from_config(config));
        Self::new(
            Arc::new(agent),
            config.agent.event_buffer,
            config.agent.max_input_chars,
        )
    }

    pub fn store(&self) -> &Arc<dyn ThreadStore> {
        self.agent.store()
    }

    pub fn dispatcher(&self) -> &Arc<ToolDispatcher> {
        self.agent.dispatcher()
    }

    pub fn max_input_chars(&self) -> usize {
        self.max_input_chars
    }

    /// Start a turn on `thread_id`.
    ///
    /// Fails without touching the thread when the input is invalid or the
    /// thread already has a turn in flight. Must be called inside a tokio
    /// runtime; the loop runs on its own task.
    pub async fn submit_turn(
        &self,
        thread_id: ThreadId,
        user_content: impl Into<String>,
    ) -> Result<EventStream, SubmitError> {
        let content = user_content.into();
        self.validate(&thread_id, &content)?;

        let Some(lease) = ThreadLease::acquire(self.agent.store().clone(), thread_id.clone()) else {
            warn!(thread_id = %thread_id, "Rejected turn on busy thread");
            return Err(SubmitError::ThreadBusy(thread_id.to_string()));
        };

        info!(thread_id = %thread_id, content_len = content.chars().count(), "Turn accepted");

        // Dropping the lease on failure frees the thread again.
        self.agent
            .store()
            .append(&thread_id, NewMessage::user(content))
            .await
            .map_err(|e| SubmitError::Store(e.to_string()))?;

        let (sink, stream) = event_channel(self.event_buffer);
        let agent = self.agent.clone();
        tokio::spawn(async move {
            agent.run(lease, sink).await;
        });

        Ok(stream)
    }

    fn validate(&self, thread_id: &ThreadId, content: &str) -> Result<(), SubmitError> {
        if thread_id.as_str().trim().is_empty() {
            return Err(SubmitError::InvalidInput("thread id must not be empty".into()));
        }
        if content.trim().is_empty() {
            return Err(SubmitError::InvalidInput("message content must not be empty".into()));
        }
        let chars = content.chars().count();
        if chars > self.max_input_chars {
            return Err(SubmitError::InvalidInput(format!(
                "message too long ({chars} characters, limit {})",
                self.max_input_chars
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream_event::{SequencedEvent, StreamEvent};
    use crate::test_helpers::{ScriptedProvider, Step, price_dispatcher};
    use async_trait::async_trait;
    use futures::StreamExt;
    use nexus_core::error::StoreError;
    use nexus_core::message::{Message, MessageContent, Role, ToolOutput};
    use nexus_sessions::InMemoryThreadStore;
    use std::time::Duration;

    fn runtime(provider: ScriptedProvider, store: Arc<dyn ThreadStore>) -> ConversationRuntime {
        let agent = AgentLoop::new(
            Arc::new(provider),
            Arc::new(price_dispatcher()),
            store,
            LoopSettings::default(),
        );
        ConversationRuntime::new(Arc::new(agent), 64, 10_000)
    }

    #[tokio::test]
    async fn price_question_end_to_end() {
        let store = Arc::new(InMemoryThreadStore::new());
        let rt = runtime(
            ScriptedProvider::new(vec![
                Step::tool_calls(&[("call_1", "X")]),
                Step::text(&["X is ", "42"]),
            ]),
            store.clone(),
        );

        let events: Vec<SequencedEvent> = rt
            .submit_turn("t1".into(), "price of X")
            .await
            .unwrap()
            .collect()
            .await;

        let seqs: Vec<u64> = events.iter().map(|e| e.seq).collect();
        assert_eq!(seqs, (0..events.len() as u64).collect::<Vec<_>>());

        let types: Vec<&str> = events.iter().map(|e| e.event.event_type()).collect();
        assert_eq!(
            types,
            vec!["tool_call_issued", "tool_result", "token", "token", "done"]
        );
        let StreamEvent::ToolResult { output, served_from_cache, .. } = &events[1].event else {
            panic!("expected tool result");
        };
        assert_eq!(*output, ToolOutput::Ok { value: serde_json::json!(42) });
        assert!(!served_from_cache);

        let history: Vec<Message> = store.snapshot(&"t1".into()).await.unwrap();
        let roles: Vec<Role> = history.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Tool, Role::Assistant]);
        assert_eq!(history[0].content.text(), Some("price of X"));
        let MessageContent::ToolResult(payload) = &history[1].content else {
            panic!("expected tool payload");
        };
        assert_eq!(payload.call_id, "call_1");
        assert_eq!(payload.arguments, serde_json::json!({"ticker": "X"}));
        assert_eq!(history[2].content.text(), Some("X is 42"));
        assert_eq!(
            history.iter().map(|m| m.seq).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );

        // Thread is free once `done` has been seen
        assert!(store.try_acquire(&"t1".into()));
    }

    #[tokio::test]
    async fn dropping_stream_mid_dispatch_leaves_only_user_message() {
        let store = Arc::new(InMemoryThreadStore::new());
        let agent = AgentLoop::new(
            Arc::new(ScriptedProvider::new(vec![
                Step::tool_calls(&[("call_1", "X"), ("call_2", "Y")]),
                Step::text(&["both are 42"]),
            ])),
            Arc::new(price_dispatcher()),
            store.clone(),
            LoopSettings::default(),
        );
        let rt = ConversationRuntime::new(Arc::new(agent), 1, 10_000);

        let mut stream = rt.submit_turn("t1".into(), "X and Y?").await.unwrap();
        let first = stream.next().await.unwrap();
        assert_eq!(first.event.event_type(), "tool_call_issued");
        tokio::time::sleep(Duration::from_millis(200)).await;
        drop(stream);

        // The next turn can start once the cancelled one let go of the thread
        let next = loop {
            match rt.submit_turn("t1".into(), "again").await {
                Err(SubmitError::ThreadBusy(_)) => {
                    tokio::time::sleep(Duration::from_millis(10)).await
                }
                other => break other,
            }
        };
        drop(next.unwrap());

        let history = store.snapshot(&"t1".into()).await.unwrap();
        let roles: Vec<Role> = history.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::User]);
    }

    #[tokio::test(start_paused = true)]
    async fn busy_thread_rejected_without_stream() {
        let store = Arc::new(InMemoryThreadStore::new());
        let rt = runtime(
            ScriptedProvider::new(vec![
                Step::text(&["slow answer"]).delayed(Duration::from_secs(5)),
                Step::text(&["other thread"]),
            ]),
            store.clone(),
        );

        let first = rt.submit_turn("t1".into(), "one").await.unwrap();
        let second = rt.submit_turn("t1".into(), "two").await;
        assert_eq!(second.err(), Some(SubmitError::ThreadBusy("t1".into())));

        // The rejected message was never recorded
        assert_eq!(store.snapshot(&"t1".into()).await.unwrap().len(), 1);

        // Other threads are unaffected
        let other: Vec<SequencedEvent> = rt
            .submit_turn("t2".into(), "hi")
            .await
            .unwrap()
            .collect()
            .await;
        assert!(matches!(other.last().unwrap().event, StreamEvent::Done { .. }));

        let events: Vec<SequencedEvent> = first.collect().await;
        assert!(matches!(events.last().unwrap().event, StreamEvent::Done { .. }));
        assert!(rt.submit_turn("t1".into(), "three").await.is_ok());
    }

    #[tokio::test]
    async fn invalid_input_rejected() {
        let store = Arc::new(InMemoryThreadStore::new());
        let rt = runtime(ScriptedProvider::new(vec![]), store.clone());

        assert!(matches!(
            rt.submit_turn("t".into(), "   ").await,
            Err(SubmitError::InvalidInput(_))
        ));
        assert!(matches!(
            rt.submit_turn("t".into(), "x".repeat(10_001)).await,
            Err(SubmitError::InvalidInput(_))
        ));
        assert!(matches!(
            rt.submit_turn("".into(), "hello").await,
            Err(SubmitError::InvalidInput(_))
        ));
        assert!(store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_releases_thread_and_commits_nothing() {
        let store = Arc::new(InMemoryThreadStore::new());
        let rt = runtime(
            ScriptedProvider::new(vec![
                Step::text(&["never", "seen"]).delayed(Duration::from_secs(5)),
                Step::text(&["fine"]),
            ]),
            store.clone(),
        );

        let stream = rt.submit_turn("t1".into(), "q").await.unwrap();
        stream.cancel();
        let events: Vec<SequencedEvent> = stream.collect().await;
        let last = events.last().unwrap();
        assert!(matches!(
            last.event,
            StreamEvent::Error {
                code: crate::stream_event::ErrorCode::Cancelled,
                ..
            }
        ));

        assert_eq!(store.snapshot(&"t1".into()).await.unwrap().len(), 1);
        let again: Vec<SequencedEvent> = rt
            .submit_turn("t1".into(), "retry")
            .await
            .unwrap()
            .collect()
            .await;
        assert!(matches!(again.last().unwrap().event, StreamEvent::Done { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_stream_releases_thread() {
        let store = Arc::new(InMemoryThreadStore::new());
        let rt = runtime(
            ScriptedProvider::new(vec![
                Step::text(&["a", "b"]).delayed(Duration::from_secs(1)),
            ]),
            store.clone(),
        );

        drop(rt.submit_turn("t1".into(), "q").await.unwrap());

        let mut released = false;
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            if store.try_acquire(&"t1".into()) {
                released = true;
                break;
            }
        }
        assert!(released);
        assert_eq!(store.snapshot(&"t1".into()).await.unwrap().len(), 1);
    }

    struct RejectingStore;

    #[async_trait]
    impl ThreadStore for RejectingStore {
        async fn append(&self, thread_id: &ThreadId, _message: NewMessage) -> Result<Message, StoreError> {
            Err(StoreError::WriteRejected {
                thread_id: thread_id.to_string(),
                reason: "read-only".into(),
            })
        }
        async fn snapshot(&self, _thread_id: &ThreadId) -> Result<Vec<Message>, StoreError> {
            Ok(Vec::new())
        }
        fn try_acquire(&self, _thread_id: &ThreadId) -> bool {
            true
        }
        fn release(&self, _thread_id: &ThreadId) {}
    }

    #[tokio::test]
    async fn store_failure_on_submit() {
        let rt = runtime(ScriptedProvider::new(vec![]), Arc::new(RejectingStore));
        assert!(matches!(
            rt.submit_turn("t".into(), "q").await,
            Err(SubmitError::Store(_))
        ));
    }

    #[tokio::test]
    async fn repeated_price_question_served_from_cache() {
        let store = Arc::new(InMemoryThreadStore::new());
        let rt = runtime(
            ScriptedProvider::new(vec![
                Step::tool_calls(&[("a", "X")]),
                Step::text(&["42"]),
                Step::tool_calls(&[("b", "x")]),
                Step::text(&["still 42"]),
            ]),
            store,
        );

        rt.submit_turn("t".into(), "q1").await.unwrap().collect::<Vec<_>>().await;
        let events: Vec<SequencedEvent> = rt
            .submit_turn("t".into(), "q2")
            .await
            .unwrap()
            .collect()
            .await;
        let cached = events.iter().any(|e| {
            matches!(
                e.event,
                StreamEvent::ToolResult {
                    served_from_cache: true,
                    ..
                }
            )
        });
        assert!(cached);
    }

    #[tokio::test(start_paused = true)]
    async fn cached_price_expires_after_ttl() {
        let store = Arc::new(InMemoryThreadStore::new());
        let rt = runtime(
            ScriptedProvider::new(vec![
                Step::tool_calls(&[("a", "X")]),
                Step::text(&["X is 42"]),
                Step::tool_calls(&[("b", "X")]),
                Step::text(&["X is 42"]),
                Step::tool_calls(&[("c", "X")]),
                Step::text(&["X is 42"]),
            ]),
            store,
        );

        async fn served_from_cache(rt: &ConversationRuntime, prompt: &str) -> bool {
            let events: Vec<SequencedEvent> = rt
                .submit_turn("t1".into(), prompt)
                .await
                .unwrap()
                .collect()
                .await;
            events.iter().any(|e| {
                matches!(
                    e.event,
                    StreamEvent::ToolResult {
                        served_from_cache: true,
                        ..
                    }
                )
            })
        }

        assert!(!served_from_cache(&rt, "price of X").await);
        tokio::time::advance(Duration::from_secs(30)).await;
        assert!(served_from_cache(&rt, "price of X again").await);
        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(!served_from_cache(&rt, "and now?").await);
    }
}
