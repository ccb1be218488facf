//! Builds the static, document-order intermediate representation [generator](super::generator)
//! turns into source text.
//!
//! Everything here is computed once, at generation time, from a parsed [Fsm] — the same document
//! model the interpreter (`Fsm::interpret`) walks at runtime. Structural facts (LCCA, proper
//! ancestry) are obtained by calling the *same* `fsm::` helpers the interpreter calls, not by
//! re-deriving them; see `findLCCA`/`getProperAncestors`/`isDescendant` below.

use crate::executable_content::{TYPE_ASSIGN, TYPE_LOG, TYPE_RAISE};
use crate::executable_content::{Assign, Log, Raise};
use crate::fsm::{ExecutableContentId, Fsm, List, StateId, Transition, TransitionId, TransitionType};

/// One inlined action, captured directly from the matching executable-content struct's literal
/// string fields — no expression evaluation happens at generation time.
#[derive(Debug, Clone)]
pub enum InlineAction {
    Raise { event: String },
    Assign { location: String, expr: String },
    Log { label: String, expression: String },
}

/// How a content block's actions will be emitted.
#[derive(Debug, Clone)]
pub enum ContentPlan {
    /// No executable content (`ExecutableContentId == 0`).
    None,
    /// The block is exactly one or more [InlineAction]s; straight-line code is emitted for it.
    Inline(Vec<InlineAction>),
    /// Something the generator can't inline without re-deriving expression evaluation (an `if`,
    /// `foreach`, `send`, `cancel`, `script`, or any content mixing inlineable and non-inlineable
    /// items) — falls back to `fsm.executeContent(datamodel, id)`, the shared runtime path.
    Delegated(ExecutableContentId),
}

#[derive(Debug, Clone)]
pub struct StateInfo {
    pub id: StateId,
    pub name: String,
    /// PascalCase identifier for the generated `State` enum variant.
    pub ident: String,
    pub onentry: ContentPlan,
    pub onexit: ContentPlan,
}

#[derive(Debug, Clone)]
pub struct TransitionInfo {
    pub id: TransitionId,
    pub doc_id: u32,
    pub source: StateId,
    pub targets: Vec<StateId>,
    pub events: Vec<String>,
    pub wildcard: bool,
    pub cond: Option<String>,
    pub transition_type: TransitionType,
    pub content: ContentPlan,
    /// Least common compound ancestor of source and targets, precomputed via [Fsm::findLCCA].
    /// `None` for targetless transitions (no domain to compute).
    pub lcca: Option<StateId>,
}

/// The distinct literal event names referenced anywhere in the document's transitions, in first-
/// seen document order. Wildcards (`*`) and dotted prefixes are kept as written; the generated
/// `Event` enum carries one variant per entry here plus a fallback `Other(String)`.
pub struct CodegenModel {
    pub fsm_name: String,
    pub states: Vec<StateInfo>,
    pub transitions: Vec<TransitionInfo>,
    pub event_names: Vec<String>,
}

impl CodegenModel {
    pub fn from_fsm(fsm: &Fsm) -> CodegenModel {
        let mut used_idents = std::collections::HashSet::new();
        let states = fsm
            .states
            .iter()
            .map(|s| {
                let mut ident = pascal_case(&s.name);
                if !used_idents.insert(ident.clone()) {
                    ident = format!("{}{}", ident, s.id);
                    used_idents.insert(ident.clone());
                }
                StateInfo {
                    id: s.id,
                    name: s.name.clone(),
                    ident,
                    onentry: plan_content(fsm, s.onentry),
                    onexit: plan_content(fsm, s.onexit),
                }
            })
            .collect();

        let mut ordered: Vec<&Transition> = fsm.transitions.values().collect();
        ordered.sort_by(|t1, t2| fsm.transition_document_order(t1, t2));

        let mut event_names: Vec<String> = Vec::new();
        let mut seen = std::collections::HashSet::new();
        for t in &ordered {
            for ev in &t.events {
                if seen.insert(ev.clone()) {
                    event_names.push(ev.clone());
                }
            }
        }

        let transitions = ordered
            .iter()
            .map(|t| TransitionInfo {
                id: t.id,
                doc_id: t.doc_id,
                source: t.source,
                targets: t.target.clone(),
                events: t.events.clone(),
                wildcard: t.wildcard,
                cond: t.cond.clone(),
                transition_type: t.transition_type,
                content: plan_content(fsm, t.content),
                lcca: lcca_of(fsm, t),
            })
            .collect();

        CodegenModel {
            fsm_name: fsm.name.clone(),
            states,
            transitions,
            event_names,
        }
    }
}

/// Precomputes the transition's domain root via the shared `findLCCA`/history-state helpers.
/// Returns `None` when any target is a history pseudo-state: the effective target (and thus the
/// true domain) depends on `historyValue`, which is only known at runtime, so the generator must
/// not bake in a stale answer.
fn lcca_of(fsm: &Fsm, t: &Transition) -> Option<StateId> {
    if t.target.is_empty() {
        return None;
    }
    if t.target.iter().any(|sid| fsm.isHistoryState(*sid)) {
        return None;
    }
    let mut all = vec![t.source];
    all.extend(t.target.iter().copied());
    Some(fsm.findLCCA(&List::from_array(&all)))
}

fn plan_content(fsm: &Fsm, id: ExecutableContentId) -> ContentPlan {
    if id == 0 {
        return ContentPlan::None;
    }
    match fsm.executableContent.get(&id) {
        None => ContentPlan::Delegated(id),
        Some(items) => {
            let mut inlined = Vec::with_capacity(items.len());
            for item in items {
                match item.get_type() {
                    TYPE_RAISE => {
                        let r = item.as_any().downcast_ref::<Raise>().unwrap();
                        inlined.push(InlineAction::Raise {
                            event: r.event.clone(),
                        });
                    }
                    TYPE_ASSIGN => {
                        let a = item.as_any().downcast_ref::<Assign>().unwrap();
                        inlined.push(InlineAction::Assign {
                            location: a.location.clone(),
                            expr: a.expr.clone(),
                        });
                    }
                    TYPE_LOG => {
                        let l = item.as_any().downcast_ref::<Log>().unwrap();
                        inlined.push(InlineAction::Log {
                            label: l.label.clone(),
                            expression: l.expression.clone(),
                        });
                    }
                    _ => return ContentPlan::Delegated(id),
                }
            }
            ContentPlan::Inline(inlined)
        }
    }
}

/// `some_state_id` -> `SomeStateId`. Non-identifier characters (SCXML ids may contain `.`, `-`)
/// are dropped; a leading digit gets an `S` prefix so the result is a legal Rust identifier.
pub fn pascal_case(name: &str) -> String {
    let mut out = String::new();
    let mut capitalize_next = true;
    for c in name.chars() {
        if c.is_alphanumeric() {
            if capitalize_next {
                out.extend(c.to_uppercase());
                capitalize_next = false;
            } else {
                out.push(c);
            }
        } else {
            capitalize_next = true;
        }
    }
    if out.is_empty() {
        out.push_str("State");
    } else if out.chars().next().unwrap().is_numeric() {
        out.insert(0, 'S');
    }
    out
}

/// Turns an event descriptor into a legal `Event` enum variant name, e.g. `"error.execution"` ->
/// `ErrorExecution`, `"*"` -> `Any`.
pub fn event_ident(descriptor: &str) -> String {
    if descriptor == "*" {
        return "Any".to_string();
    }
    let ident = pascal_case(descriptor);
    if ident == "State" {
        "Event".to_string()
    } else {
        ident
    }
}
