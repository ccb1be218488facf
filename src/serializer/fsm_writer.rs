//! Serializes a parsed [Fsm] into the compact binary form written by [crate::serializer].
//!
//! This is purely a fast-reload persistence format for the *interpreter* (skip re-parsing XML on
//! the next run); it has nothing to do with the `codegen` source-code generator.

use std::io::Write;

use crate::fsm::{Fsm, HistoryType, State, Transition, TransitionType};
use crate::serializer::protocol_writer::ProtocolWriter;

fn history_type_to_u8(t: &HistoryType) -> u8 {
    match t {
        HistoryType::None => 0,
        HistoryType::Shallow => 1,
        HistoryType::Deep => 2,
    }
}

fn transition_type_to_u8(t: &TransitionType) -> u8 {
    match t {
        TransitionType::External => 0,
        TransitionType::Internal => 1,
    }
}

pub struct FsmWriter<W: Write> {
    writer: Box<dyn ProtocolWriter<W>>,
}

impl<W: Write> FsmWriter<W> {
    pub fn new(writer: Box<dyn ProtocolWriter<W>>) -> FsmWriter<W> {
        FsmWriter { writer }
    }

    pub fn close(&mut self) {
        self.writer.close();
    }

    pub fn write(&mut self, fsm: &Fsm) {
        self.writer.write_version();
        self.writer.write_str(&fsm.name);
        self.writer.write_str(&fsm.version);
        self.writer.write_str(&fsm.datamodel);
        self.writer.write_boolean(fsm.binding == crate::fsm::BindingType::Late);
        self.writer.write_uint(fsm.pseudo_root as u64);
        self.writer.write_uint(fsm.script as u64);

        self.writer.write_uint(fsm.states.len() as u64);
        for state in &fsm.states {
            self.write_state(state);
        }

        self.writer.write_uint(fsm.transitions.len() as u64);
        let mut ids: Vec<&u32> = fsm.transitions.keys().collect();
        ids.sort();
        for id in ids {
            self.write_transition(fsm.transitions.get(id).unwrap());
        }
    }

    fn write_state(&mut self, state: &State) {
        self.writer.write_uint(state.id as u64);
        self.writer.write_uint(state.doc_id as u64);
        self.writer.write_str(&state.name);
        self.writer.write_uint(state.parent as u64);
        self.writer.write_uint(state.initial as u64);
        self.writer.write_boolean(state.is_parallel);
        self.writer.write_boolean(state.is_final);
        self.writer.write_u8(history_type_to_u8(&state.history_type));
        self.writer.write_uint(state.onentry as u64);
        self.writer.write_uint(state.onexit as u64);

        self.writer.write_uint(state.states.len() as u64);
        for sub in &state.states {
            self.writer.write_uint(*sub as u64);
        }

        self.writer.write_uint(state.data.values.len() as u64);
        let mut keys: Vec<&String> = state.data.values.keys().collect();
        keys.sort();
        for key in keys {
            self.writer.write_str(key);
            self.writer.write_str(&state.data.values.get(key).unwrap().to_string());
        }
    }

    fn write_transition(&mut self, t: &Transition) {
        self.writer.write_uint(t.id as u64);
        self.writer.write_uint(t.doc_id as u64);
        self.writer.write_uint(t.source as u64);
        self.writer.write_uint(t.target.len() as u64);
        for target in &t.target {
            self.writer.write_uint(*target as u64);
        }
        self.writer.write_boolean(t.wildcard);
        self.writer.write_uint(t.events.len() as u64);
        for event in &t.events {
            self.writer.write_str(event);
        }
        self.writer.write_option_string(&t.cond);
        self.writer.write_u8(transition_type_to_u8(&t.transition_type));
        self.writer.write_uint(t.content as u64);
    }
}
