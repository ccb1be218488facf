//! Offline code generator: turns a parsed [crate::fsm::Fsm] into a `.rs` source file whose
//! runtime behavior is observationally identical to `Fsm::interpret` over the same document.
//!
//! This is a separate, additional feature from [crate::serializer] — that module persists an
//! `Fsm` to a compact binary form for the *interpreter* to reload later (skipping re-parsing
//! XML); this module instead emits Rust source driven by the same shared `fsm::` helpers the
//! interpreter calls (LCCA, proper-ancestry, event-descriptor matching), so the two engines
//! share that logic verbatim instead of each carrying their own copy. See `DESIGN.md`.

pub mod generator;
pub mod model;
pub mod runtime;

use crate::fsm::Fsm;

/// Generates Rust source text implementing `fsm`'s document as a `State`/`Event` enum pair, a
/// precomputed `TRANSITION_TABLE`, and dispatch functions for onentry/onexit/transition content.
pub fn generate_source(fsm: &Fsm) -> String {
    let model = model::CodegenModel::from_fsm(fsm);
    generator::generate(&model)
}

#[cfg(test)]
mod tests {
    use super::generate_source;
    use crate::scxml_reader::parse_from_xml_with_includes;

    fn parse(xml: &str) -> Box<crate::fsm::Fsm> {
        parse_from_xml_with_includes(xml.to_string(), &Vec::new()).unwrap()
    }

    #[test]
    fn generates_state_and_event_enums() {
        let fsm = parse(
            r#"<scxml version="1.0" xmlns="http://www.w3.org/2005/07/scxml" initial="a" datamodel="null">
                <state id="a">
                    <onentry><raise event="e1"/></onentry>
                    <transition event="e1" target="b"/>
                </state>
                <final id="b"/>
            </scxml>"#,
        );

        let src = generate_source(&fsm);

        assert!(src.contains("pub enum State {"));
        assert!(src.contains("A,"));
        assert!(src.contains("B,"));
        assert!(src.contains("pub enum Event {"));
        assert!(src.contains("E1,"));
        assert!(src.contains("pub const TRANSITION_TABLE"));
        assert!(src.contains("fsm.enqueue_internal(datamodel, RuntimeEvent::new_simple(\"e1\"));"));
    }

    #[test]
    fn delegates_content_it_cannot_inline() {
        let fsm = parse(
            r#"<scxml version="1.0" xmlns="http://www.w3.org/2005/07/scxml" initial="a" datamodel="null">
                <state id="a">
                    <transition event="e1" target="a">
                        <if cond="true"><log label="x" expr="'y'"/></if>
                    </transition>
                </state>
            </scxml>"#,
        );

        let src = generate_source(&fsm);
        assert!(src.contains("fsm.executeContent(datamodel,"));
    }

    #[test]
    fn lcca_is_precomputed_for_non_history_targets() {
        let fsm = parse(
            r#"<scxml version="1.0" xmlns="http://www.w3.org/2005/07/scxml" initial="p" datamodel="null">
                <state id="p" initial="a">
                    <state id="a">
                        <transition event="e1" target="b"/>
                    </state>
                    <state id="b"/>
                </state>
            </scxml>"#,
        );

        let src = generate_source(&fsm);
        // The transition stays within "p", so its LCCA must resolve to a concrete state id,
        // never `lcca: None`.
        assert!(!src.contains("lcca: None"));
    }
}
