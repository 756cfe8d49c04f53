use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use tandem_core::ActionRecord;
use tandem_dom::PageHandle;

use crate::jitter::Jitter;
use crate::state::SessionState;

/// One pending replay. Queued actions live in memory only; a page reload
/// loses whatever is still pending.
#[derive(Debug, Clone)]
pub struct QueuedAction {
    pub payload: ActionRecord,
    pub enqueued_at: DateTime<Utc>,
}

struct QueueShared {
    state: Arc<SessionState>,
    page: PageHandle,
    jitter: Arc<dyn Jitter>,
    queue: Mutex<VecDeque<QueuedAction>>,
    draining: AtomicBool,
}

/// Ordered replay queue for one follower client.
///
/// Strict FIFO: one drain task exists at a time, popping the head, waiting
/// a jittered delay below the session's `maxDelayMs`, then applying the
/// action with the executing flag raised. A failed apply (address drift) is
/// logged and dropped; the drain continues with the next action.
#[derive(Clone)]
pub struct ReplayQueue {
    shared: Arc<QueueShared>,
}

impl ReplayQueue {
    pub fn new(state: Arc<SessionState>, page: PageHandle, jitter: Arc<dyn Jitter>) -> Self {
        Self {
            shared: Arc::new(QueueShared {
                state,
                page,
                jitter,
                queue: Mutex::new(VecDeque::new()),
                draining: AtomicBool::new(false),
            }),
        }
    }

    pub fn enqueue(&self, payload: ActionRecord) {
        {
            let mut queue = self.shared.queue.lock().unwrap();
            queue.push_back(QueuedAction {
                payload,
                enqueued_at: Utc::now(),
            });
            debug!(
                client_id = %self.shared.state.client_id(),
                pending = queue.len(),
                "action enqueued"
            );
        }
        if !self.shared.draining.swap(true, Ordering::SeqCst) {
            tokio::spawn(drain(Arc::clone(&self.shared)));
        }
    }

    /// Drop all pending actions, as a page teardown would.
    pub fn clear(&self) {
        self.shared.queue.lock().unwrap().clear();
    }

    pub fn len(&self) -> usize {
        self.shared.queue.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True while a drain task is alive (even if currently sleeping).
    pub fn is_draining(&self) -> bool {
        self.shared.draining.load(Ordering::SeqCst)
    }
}

async fn drain(shared: Arc<QueueShared>) {
    loop {
        let next = shared.queue.lock().unwrap().pop_front();
        let Some(action) = next else {
            shared.draining.store(false, Ordering::SeqCst);
            // An enqueue may have slipped in between the empty pop and the
            // flag clearing without spawning its own drain; re-arm for it.
            let rearm = !shared.queue.lock().unwrap().is_empty()
                && !shared.draining.swap(true, Ordering::SeqCst);
            if rearm {
                continue;
            }
            return;
        };

        let delay = shared.jitter.delay(shared.state.max_delay_ms());
        tokio::time::sleep(delay).await;

        // No cancellation point above: a role toggle or disconnect during
        // the sleep still lets this replay fire. The executing flag keeps
        // it out of the broadcast path regardless.
        shared.state.set_replay_executing(true);
        if let Err(e) = shared.page.apply_action(&action.payload) {
            warn!(
                client_id = %shared.state.client_id(),
                error = %e,
                "replicated action dropped"
            );
        }
        shared.state.set_replay_executing(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tandem_core::ActionKind;
    use tandem_dom::PageEvent;
    use crate::jitter::ZeroJitter;

    const PAGE: &str = r#"
        <html><body>
            <input type="text" id="a">
            <input type="text" id="b">
            <input type="text" id="c">
            <button id="go">go</button>
        </body></html>
    "#;

    fn record(path: &str, value: &str) -> ActionRecord {
        ActionRecord {
            tag_name: "INPUT".to_string(),
            kind: ActionKind::Input,
            value: Some(value.to_string()),
            target_path: path.to_string(),
        }
    }

    async fn settled(queue: &ReplayQueue) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !queue.is_empty() || queue.is_draining() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("queue did not settle");
    }

    #[tokio::test]
    async fn test_strict_fifo_order() {
        let page = PageHandle::parse(PAGE);
        let state = SessionState::new("f1", 1000);
        let queue = ReplayQueue::new(state, page.clone(), Arc::new(ZeroJitter));
        let mut events = page.subscribe();

        let inputs = page.select_all("input");
        for (i, id) in inputs.iter().enumerate() {
            let path = page.locate(*id).unwrap();
            queue.enqueue(record(&path, &format!("v{i}")));
        }
        settled(&queue).await;

        for i in 0..3 {
            let event = events.recv().await.unwrap();
            assert_eq!(event.value.as_deref(), Some(format!("v{i}").as_str()));
        }
        assert_eq!(page.value_of(inputs[2]).as_deref(), Some("v2"));
    }

    #[tokio::test]
    async fn test_unresolvable_action_is_dropped_and_drain_continues() {
        let page = PageHandle::parse(PAGE);
        let state = SessionState::new("f1", 1000);
        let queue = ReplayQueue::new(state, page.clone(), Arc::new(ZeroJitter));

        let good = page.locate(page.select_first("#go").unwrap()).unwrap();
        queue.enqueue(record("/html/body/div[9]/input", "lost"));
        queue.enqueue(ActionRecord::click("BUTTON", &good));
        settled(&queue).await;

        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_executing_flag_raised_during_apply() {
        let page = PageHandle::parse(PAGE);
        let state = SessionState::new("f1", 1000);
        let queue = ReplayQueue::new(state.clone(), page.clone(), Arc::new(ZeroJitter));

        let observed = Arc::new(AtomicBool::new(false));
        let observed_in = Arc::clone(&observed);
        let state_in = Arc::clone(&state);
        page.add_observer(Arc::new(move |_event: &PageEvent| {
            if state_in.replay_executing() {
                observed_in.store(true, Ordering::SeqCst);
            }
        }));

        let path = page.locate(page.select_first("#a").unwrap()).unwrap();
        queue.enqueue(record(&path, "x"));
        settled(&queue).await;

        assert!(observed.load(Ordering::SeqCst));
        assert!(!state.replay_executing());
    }

    #[tokio::test]
    async fn test_ten_actions_complete_promptly() {
        let page = PageHandle::parse(PAGE);
        let state = SessionState::new("f1", 500);
        let queue = ReplayQueue::new(
            state,
            page.clone(),
            Arc::new(crate::jitter::UniformJitter::seeded(99)),
        );
        let path = page.locate(page.select_first("#a").unwrap()).unwrap();
        for i in 0..10 {
            queue.enqueue(record(&path, &format!("v{i}")));
        }
        // Ten delays each below 500ms: well under the 5s settle timeout.
        settled(&queue).await;
        assert_eq!(
            page.value_of(page.select_first("#a").unwrap()).as_deref(),
            Some("v9")
        );
    }
}
