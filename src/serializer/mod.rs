//! Binary persistence of a parsed [crate::fsm::Fsm], independent of XML parsing.\
//! See [crate::serializer::fsm_writer::FsmWriter] and `bin/scxml_to_fsm.rs`.

pub mod default_protocol_definitions;
pub mod default_protocol_writer;
pub mod fsm_writer;
pub mod protocol_reader;
pub mod protocol_writer;
