use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::debug;

use tandem_core::ActionRecord;
use tandem_dom::{PageEvent, PageHandle};

use crate::state::SessionState;

/// Document-level capture filter: observes every click/input/change before
/// element handlers run, suppresses everything that is not genuine master
/// input, and forwards the rest — encoded — to the broadcast outbox.
pub struct CaptureFilter;

impl CaptureFilter {
    /// Install the filter on a page. Encoded actions land on `outbox`,
    /// where the runtime's broadcast loop picks them up.
    pub fn install(
        page: &PageHandle,
        state: Arc<SessionState>,
        outbox: mpsc::UnboundedSender<ActionRecord>,
    ) {
        let page = page.clone();
        let observer_page = page.clone();
        page.add_observer(Arc::new(move |event: &PageEvent| {
            // 1. A marker on the target means this very event is the echo of
            //    our own replay; consume the marker and stop.
            if observer_page.take_marker(event.target) {
                debug!(client_id = %state.client_id(), "discarded programmatic echo");
                return;
            }
            // 2. Explicit opt-out.
            if event.ignore {
                return;
            }
            // 3. Followers never broadcast.
            if !state.is_master() {
                return;
            }
            // 4. Defense in depth: nothing observed while a replay is
            //    executing is user input, marker or not.
            if state.replay_executing() {
                debug!(client_id = %state.client_id(), "discarded event observed during replay");
                return;
            }
            if let Some(record) = encode(&observer_page, event) {
                let _ = outbox.send(record);
            }
        }));
    }
}

/// Encode a captured event into an action record: tag name, kind, value,
/// and the structural path of the target.
fn encode(page: &PageHandle, event: &PageEvent) -> Option<ActionRecord> {
    let (tag_name, current_value) = page.describe(event.target)?;
    let target_path = page.locate(event.target)?;
    let value = event
        .kind
        .is_value_mutation()
        .then(|| event.value.clone().unwrap_or(current_value));
    Some(ActionRecord {
        tag_name,
        kind: event.kind,
        value,
        target_path,
    })
}
