use ego_tree::NodeId;
use tandem_core::ActionKind;

/// One document-level event as seen by a capture-phase listener.
///
/// Listeners observe every click/input/change before any element-level
/// handler could stop propagation; whether the event came from the user or
/// from a synthetic dispatch is not visible here — the capture filter tells
/// them apart through the programmatic marker and the executing flag.
#[derive(Debug, Clone)]
pub struct PageEvent {
    pub target: NodeId,
    pub kind: ActionKind,
    pub value: Option<String>,
    /// Explicit request to skip capture; escape hatch for collaborator
    /// modules that raise events of their own.
    pub ignore: bool,
}
