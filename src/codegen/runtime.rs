//! Shim connecting generated dispatch code to the shared runtime.
//!
//! Generated modules never own a queue, timer wheel, or scheduler of their own — they drive the
//! same [Fsm]/[Datamodel] the interpreter uses, via [Fsm::enqueue_internal] and
//! [Fsm::executeContent], and read the active configuration out of the same `GlobalData`
//! the interpreter maintains. This keeps `codegen` and the interpreter behaviorally identical
//! for anything not inlined, by construction rather than by parallel re-implementation.

use crate::datamodel::Datamodel;
use crate::fsm::{Event, Fsm, StateId};

/// Converts between a generated `State` enum and the document model's raw [StateId].
/// Each generated module provides its own `impl GeneratedState for State`.
pub trait GeneratedState: Copy + Eq {
    fn from_id(id: StateId) -> Self;
    fn to_id(self) -> StateId;
}

/// Converts between a generated `Event` enum (with its `Other(String)` fallback) and the runtime
/// event name carried on [Event]/raised through [Fsm::enqueue_internal].
pub trait GeneratedEvent: Clone {
    fn from_name(name: &str) -> Self;
    fn name(&self) -> String;
}

/// Raises a generated event on the session's internal queue, through the exact same
/// [Fsm::enqueue_internal] path `<raise>` content uses at runtime.
pub fn raise<Ev: GeneratedEvent>(fsm: &mut Fsm, datamodel: &mut dyn Datamodel, event: &Ev) {
    fsm.enqueue_internal(datamodel, Event::new_simple(&event.name()));
}

/// Reads the live configuration, translated into the generated `State` enum, for host code that
/// wants typed access instead of raw [StateId]s. Does not allocate a second copy of the
/// configuration; this is a read-only snapshot of `GlobalData::configuration`.
pub fn configuration<St: GeneratedState>(datamodel: &dyn Datamodel) -> Vec<St> {
    datamodel
        .global_s()
        .lock()
        .configuration
        .toList()
        .iterator()
        .map(|sid| St::from_id(*sid))
        .collect()
}

/// True if `state` (generated enum) is in the live configuration.
pub fn is_in_state<St: GeneratedState>(datamodel: &dyn Datamodel, state: St) -> bool {
    datamodel
        .global_s()
        .lock()
        .configuration
        .isMember(&state.to_id())
}
