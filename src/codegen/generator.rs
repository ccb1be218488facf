//! Emits Rust source text from a [CodegenModel].
//!
//! The emitted module never reimplements transition selection, exit/entry-set computation, or
//! conflict resolution: the `TRANSITION_TABLE` it builds is read by host code that still drives
//! the shared `Fsm`/`Datamodel` machinery (see [crate::codegen::runtime]) for anything the
//! generator couldn't fully inline.

use std::fmt::Write;

use crate::codegen::model::{event_ident, CodegenModel, ContentPlan, InlineAction};
use crate::fsm::TransitionType;

pub fn generate(model: &CodegenModel) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "//! Generated by `rfsm::codegen` from `{}`.", model.fsm_name);
    let _ = writeln!(out, "//! Do not edit by hand; regenerate from the source document instead.");
    let _ = writeln!(out);
    let _ = writeln!(out, "use rfsm::datamodel::Datamodel;");
    let _ = writeln!(out, "use rfsm::fsm::{{Event as RuntimeEvent, Fsm}};");
    let _ = writeln!(out);

    emit_state_enum(&mut out, model);
    let _ = writeln!(out);
    emit_event_enum(&mut out, model);
    let _ = writeln!(out);
    emit_transition_table(&mut out, model);
    let _ = writeln!(out);
    emit_onentry_onexit(&mut out, model);
    let _ = writeln!(out);
    emit_transition_content(&mut out, model);

    out
}

fn emit_state_enum(out: &mut String, model: &CodegenModel) {
    let _ = writeln!(out, "#[derive(Debug, Clone, Copy, PartialEq, Eq)]");
    let _ = writeln!(out, "pub enum State {{");
    for s in &model.states {
        let _ = writeln!(out, "    {},", s.ident);
    }
    let _ = writeln!(out, "}}");
    let _ = writeln!(out);
    let _ = writeln!(out, "impl rfsm::codegen::runtime::GeneratedState for State {{");
    let _ = writeln!(out, "    fn from_id(id: u32) -> Self {{");
    let _ = writeln!(out, "        match id {{");
    for s in &model.states {
        let _ = writeln!(out, "            {} => State::{},", s.id, s.ident);
    }
    let _ = writeln!(out, "            other => panic!(\"unknown generated state id {{}}\", other),");
    let _ = writeln!(out, "        }}");
    let _ = writeln!(out, "    }}");
    let _ = writeln!(out);
    let _ = writeln!(out, "    fn to_id(self) -> u32 {{");
    let _ = writeln!(out, "        match self {{");
    for s in &model.states {
        let _ = writeln!(out, "            State::{} => {},", s.ident, s.id);
    }
    let _ = writeln!(out, "        }}");
    let _ = writeln!(out, "    }}");
    let _ = writeln!(out, "}}");
}

fn emit_event_enum(out: &mut String, model: &CodegenModel) {
    let mut idents: Vec<(String, String)> = Vec::new();
    let mut used = std::collections::HashSet::new();
    for name in &model.event_names {
        if name == "*" {
            continue;
        }
        let mut ident = event_ident(name);
        if !used.insert(ident.clone()) {
            ident = format!("{}{}", ident, idents.len());
            used.insert(ident.clone());
        }
        idents.push((ident, name.clone()));
    }

    let _ = writeln!(out, "#[derive(Debug, Clone, PartialEq, Eq)]");
    let _ = writeln!(out, "pub enum Event {{");
    for (ident, _) in &idents {
        let _ = writeln!(out, "    {},", ident);
    }
    let _ = writeln!(out, "    /// Any event name the generator couldn't enumerate statically\n    /// (dynamically raised/sent events).");
    let _ = writeln!(out, "    Other(String),");
    let _ = writeln!(out, "}}");
    let _ = writeln!(out);
    let _ = writeln!(out, "impl rfsm::codegen::runtime::GeneratedEvent for Event {{");
    let _ = writeln!(out, "    fn from_name(name: &str) -> Self {{");
    let _ = writeln!(out, "        match name {{");
    for (ident, name) in &idents {
        let _ = writeln!(out, "            {:?} => Event::{},", name, ident);
    }
    let _ = writeln!(out, "            other => Event::Other(other.to_string()),");
    let _ = writeln!(out, "        }}");
    let _ = writeln!(out, "    }}");
    let _ = writeln!(out);
    let _ = writeln!(out, "    fn name(&self) -> String {{");
    let _ = writeln!(out, "        match self {{");
    for (ident, name) in &idents {
        let _ = writeln!(out, "            Event::{} => {:?}.to_string(),", ident, name);
    }
    let _ = writeln!(out, "            Event::Other(s) => s.clone(),");
    let _ = writeln!(out, "        }}");
    let _ = writeln!(out, "    }}");
    let _ = writeln!(out, "}}");
}

fn opt_str(v: &Option<String>) -> String {
    match v {
        None => "None".to_string(),
        Some(s) => format!("Some({:?})", s),
    }
}

fn transition_type_ident(t: TransitionType) -> &'static str {
    match t {
        TransitionType::Internal => "Internal",
        TransitionType::External => "External",
    }
}

fn emit_transition_table(out: &mut String, model: &CodegenModel) {
    let _ = writeln!(out, "#[derive(Debug, Clone, Copy, PartialEq, Eq)]");
    let _ = writeln!(out, "pub enum TransitionKind {{ Internal, External }}");
    let _ = writeln!(out);
    let _ = writeln!(out, "/// One row per document transition, in document order (= selection priority).");
    let _ = writeln!(out, "/// `lcca`/`source`/`targets` are the document-model `StateId`s wrapped as `u32` (not the");
    let _ = writeln!(out, "/// generated [State] enum), so this table stays valid even if [State] variants are");
    let _ = writeln!(out, "/// reordered; host code maps them through `State::from_id` as needed.");
    let _ = writeln!(out, "#[derive(Debug, Clone, Copy)]");
    let _ = writeln!(out, "pub struct TransitionDescriptor {{");
    let _ = writeln!(out, "    pub id: u32,");
    let _ = writeln!(out, "    pub source: u32,");
    let _ = writeln!(out, "    pub targets: &'static [u32],");
    let _ = writeln!(out, "    pub wildcard: bool,");
    let _ = writeln!(out, "    pub events: &'static [&'static str],");
    let _ = writeln!(out, "    pub cond: Option<&'static str>,");
    let _ = writeln!(out, "    pub kind: TransitionKind,");
    let _ = writeln!(out, "    /// Document-order priority; lower wins on conflict (see");
    let _ = writeln!(out, "    /// `Fsm::removeConflictingTransitions`, still the authority at runtime).");
    let _ = writeln!(out, "    pub priority: u32,");
    let _ = writeln!(out, "    /// Precomputed via `Fsm::findLCCA` at generation time; `None` when any target is a");
    let _ = writeln!(out, "    /// history pseudo-state (the true domain depends on runtime `historyValue`).");
    let _ = writeln!(out, "    pub lcca: Option<u32>,");
    let _ = writeln!(out, "}}");
    let _ = writeln!(out);
    let _ = writeln!(out, "pub const TRANSITION_TABLE: &[TransitionDescriptor] = &[");
    for t in &model.transitions {
        let targets = t
            .targets
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        let events = t
            .events
            .iter()
            .map(|e| format!("{:?}", e))
            .collect::<Vec<_>>()
            .join(", ");
        let lcca = match t.lcca {
            None => "None".to_string(),
            Some(id) => format!("Some({})", id),
        };
        let _ = writeln!(
            out,
            "    TransitionDescriptor {{ id: {}, source: {}, targets: &[{}], wildcard: {}, events: &[{}], cond: {}, kind: TransitionKind::{}, priority: {}, lcca: {} }},",
            t.id,
            t.source,
            targets,
            t.wildcard,
            events,
            opt_str(&t.cond),
            transition_type_ident(t.transition_type),
            t.doc_id,
            lcca,
        );
    }
    let _ = writeln!(out, "];");
}

fn emit_inline_actions(out: &mut String, indent: &str, actions: &[InlineAction]) {
    for action in actions {
        match action {
            InlineAction::Raise { event } => {
                let _ = writeln!(
                    out,
                    "{}fsm.enqueue_internal(datamodel, RuntimeEvent::new_simple({:?}));",
                    indent, event
                );
            }
            InlineAction::Assign { location, expr } => {
                let _ = writeln!(
                    out,
                    "{}datamodel.assign({:?}, {:?});",
                    indent, location, expr
                );
            }
            InlineAction::Log { expression, .. } => {
                let _ = writeln!(out, "{}if let Ok(l) = datamodel.execute({:?}) {{", indent, expression);
                let _ = writeln!(out, "{}    datamodel.log(&l);", indent);
                let _ = writeln!(out, "{}}}", indent);
            }
        }
    }
}

fn emit_onentry_onexit(out: &mut String, model: &CodegenModel) {
    let _ = writeln!(
        out,
        "pub fn run_onentry(state: State, fsm: &mut Fsm, datamodel: &mut dyn Datamodel) {{"
    );
    let _ = writeln!(out, "    match state {{");
    for s in &model.states {
        let _ = writeln!(out, "        State::{} => {{", s.ident);
        emit_content_plan_indented(out, &s.onentry, "            ");
        let _ = writeln!(out, "        }}");
    }
    let _ = writeln!(out, "    }}");
    let _ = writeln!(out, "}}");
    let _ = writeln!(out);

    let _ = writeln!(
        out,
        "pub fn run_onexit(state: State, fsm: &mut Fsm, datamodel: &mut dyn Datamodel) {{"
    );
    let _ = writeln!(out, "    match state {{");
    for s in &model.states {
        let _ = writeln!(out, "        State::{} => {{", s.ident);
        emit_content_plan_indented(out, &s.onexit, "            ");
        let _ = writeln!(out, "        }}");
    }
    let _ = writeln!(out, "    }}");
    let _ = writeln!(out, "}}");
}

fn emit_content_plan_indented(out: &mut String, plan: &ContentPlan, indent: &str) {
    match plan {
        ContentPlan::None => {
            let _ = writeln!(out, "{}// no executable content", indent);
        }
        ContentPlan::Inline(actions) => emit_inline_actions(out, indent, actions),
        ContentPlan::Delegated(id) => {
            let _ = writeln!(out, "{}fsm.executeContent(datamodel, {});", indent, id);
        }
    }
}

fn emit_transition_content(out: &mut String, model: &CodegenModel) {
    let _ = writeln!(
        out,
        "pub fn run_transition_content(transition_id: u32, fsm: &mut Fsm, datamodel: &mut dyn Datamodel) {{"
    );
    let _ = writeln!(out, "    match transition_id {{");
    for t in &model.transitions {
        if matches!(t.content, ContentPlan::None) {
            continue;
        }
        let _ = writeln!(out, "        {} => {{", t.id);
        emit_content_plan_indented(out, &t.content, "            ");
        let _ = writeln!(out, "        }}");
    }
    let _ = writeln!(out, "        _ => {{}}");
    let _ = writeln!(out, "    }}");
    let _ = writeln!(out, "}}");
}
