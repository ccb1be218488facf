//! Reads an SCXML document into a [Fsm].
//!
//! Built on `quick-xml`'s pull parser. Because the document model is a flat `Vec<State>`
//! addressed by index ([StateId]) rather than a tree of references, transition targets and the
//! `initial` attribute are recorded as raw name strings while parsing and resolved to ids in a
//! second pass once the whole document has been read.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::str;

use log::error;
use quick_xml::events::attributes::Attributes;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::executable_content::{Assign, Expression, ForEach, If, Log, Raise, Script};
use crate::executable_content::ExecutableContent;
use crate::fsm::{
    map_history_type, map_transition_type, BindingType, Cancel, CommonContent, DoneData,
    ExecutableContentId, Fsm, HistoryType, Invoke, Parameter, SendParameters, State, StateId,
    Transition, TransitionId,
};
use crate::ArgOption;

pub type AttributeMap = HashMap<String, String>;

/// Argument option to specify additional include search paths, e.g. "-include path/to/dir".
pub const INCLUDE_PATH_ARGUMENT_OPTION: ArgOption = ArgOption {
    name: "include",
    required: false,
    with_value: true,
};

/// Parses the "-include" command line argument(s) into a list of search paths.
pub fn include_path_from_arguments(named_options: &HashMap<&'static str, String>) -> Vec<PathBuf> {
    match named_options.get(INCLUDE_PATH_ARGUMENT_OPTION.name) {
        None => Vec::new(),
        Some(value) => value
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .collect(),
    }
}

/// Loads and parses the SCXML document at `uri`. `uri` may be a plain file path or an
/// `http(s):` URL.
pub fn parse_from_uri(uri: String, include_paths: &Vec<PathBuf>) -> Result<Box<Fsm>, String> {
    let xml = load_uri(&uri, include_paths)?;
    parse_from_xml_with_includes(xml, include_paths)
}

pub fn read_from_xml_file(path: String, include_paths: &Vec<PathBuf>) -> Result<Box<Fsm>, String> {
    parse_from_uri(path, include_paths)
}

/// Parses the given XML text, without support for `<xi:include>`.
pub fn parse_from_xml(xml: String) -> Result<Box<Fsm>, String> {
    parse_from_xml_with_includes(xml, &Vec::new())
}

/// Parses the given XML text.
pub fn parse_from_xml_with_includes(
    xml: String,
    include_paths: &Vec<PathBuf>,
) -> Result<Box<Fsm>, String> {
    let mut rs = ReaderState::new();
    rs.include_paths = include_paths.clone();
    rs.parse_document(&xml)?;
    rs.resolve()?;
    Ok(rs.fsm)
}

fn load_uri(uri: &str, include_paths: &Vec<PathBuf>) -> Result<String, String> {
    if uri.starts_with("http://") || uri.starts_with("https://") {
        return ureq::get(uri)
            .call()
            .map_err(|e| format!("Failed to fetch '{}': {}", uri, e))?
            .into_string()
            .map_err(|e| format!("Failed to read response from '{}': {}", uri, e));
    }
    let path = uri.strip_prefix("file://").unwrap_or(uri);
    read_file_with_includes(Path::new(path), include_paths)
}

fn read_file_with_includes(path: &Path, include_paths: &Vec<PathBuf>) -> Result<String, String> {
    if path.is_file() {
        return fs::read_to_string(path).map_err(|e| format!("Failed to read '{:?}': {}", path, e));
    }
    for dir in include_paths {
        let candidate = dir.join(path);
        if candidate.is_file() {
            return fs::read_to_string(&candidate)
                .map_err(|e| format!("Failed to read '{:?}': {}", candidate, e));
        }
    }
    Err(format!("File not found: '{:?}'", path))
}

const TAG_SCXML: &str = "scxml";
const TAG_STATE: &str = "state";
const TAG_PARALLEL: &str = "parallel";
const TAG_FINAL: &str = "final";
const TAG_HISTORY: &str = "history";
const TAG_INITIAL: &str = "initial";
const TAG_TRANSITION: &str = "transition";
const TAG_ONENTRY: &str = "onentry";
const TAG_ONEXIT: &str = "onexit";
const TAG_DATAMODEL: &str = "datamodel";
const TAG_DATA: &str = "data";
const TAG_RAISE: &str = "raise";
const TAG_IF: &str = "if";
const TAG_ELSEIF: &str = "elseif";
const TAG_ELSE: &str = "else";
const TAG_FOREACH: &str = "foreach";
const TAG_LOG: &str = "log";
const TAG_ASSIGN: &str = "assign";
const TAG_SCRIPT: &str = "script";
const TAG_SEND: &str = "send";
const TAG_CANCEL: &str = "cancel";
const TAG_INVOKE: &str = "invoke";
const TAG_FINALIZE: &str = "finalize";
const TAG_PARAM: &str = "param";
const TAG_DONEDATA: &str = "donedata";
const TAG_CONTENT: &str = "content";

type ContentVec = Vec<Box<dyn ExecutableContent>>;

/// Nesting frames, mirroring the element nesting of the document being parsed. Every frame that
/// can directly contain executable-content children ("a content sink") exposes a `push` path in
/// [ReaderState::push_content].
enum Frame {
    /// Inside `<scxml>`/`<state>`/`<parallel>`/`<final>`/`<history>`, but not inside any
    /// executable content block: only structural children are expected here.
    State(StateId),
    Initial(StateId),
    /// Tracks whether a `<script src=...>`'s content was already pushed to the enclosing
    /// content sink in `start_element`, so `end_element` doesn't also push inline text.
    Script { src_handled: bool },
    /// `<data id=... expr=... | src=...>`; `value` is `None` until resolved from `expr`/`src`
    /// or, failing that, the element's inline text at `</data>`.
    Data { id: String, value: Option<String> },
    OnEntry(ContentVec),
    OnExit(ContentVec),
    TransitionBody(TransitionId, ContentVec),
    FinalizeBody(ContentVec),
    ForEachBody {
        array: String,
        item: String,
        index: String,
        body: ContentVec,
    },
    /// A `<if>`/`<elseif>`/`<else>` chain. `current`/`current_cond` describe the branch presently
    /// being collected; `segments` holds the branches already closed.
    If {
        segments: Vec<(Option<String>, ContentVec)>,
        current_cond: Option<String>,
        current: ContentVec,
    },
    Send(SendParameters),
    Invoke(Invoke),
    Params(Vec<Parameter>),
    DoneData(DoneData),
    Content(CommonContent),
    /// Unrecognized or structural-only element (e.g. `<datamodel>`, `<data>`); text/attributes
    /// already consumed in `start_element`.
    Ignored,
}

struct PendingTarget {
    transition_id: TransitionId,
    names: Vec<String>,
}

struct ReaderState {
    fsm: Box<Fsm>,
    stack: Vec<Frame>,
    text: String,
    doc_id_counter: u32,
    generated_id_counter: u32,
    pending_targets: Vec<PendingTarget>,
    pending_initial: Vec<(StateId, String)>,
    include_paths: Vec<PathBuf>,
}

impl ReaderState {
    fn new() -> ReaderState {
        ReaderState {
            fsm: Box::new(Fsm::new()),
            stack: Vec::new(),
            text: String::new(),
            doc_id_counter: 0,
            generated_id_counter: 0,
            pending_targets: Vec::new(),
            pending_initial: Vec::new(),
            include_paths: Vec::new(),
        }
    }

    fn next_doc_id(&mut self) -> u32 {
        self.doc_id_counter += 1;
        self.doc_id_counter
    }

    fn generate_name(&mut self, prefix: &str) -> String {
        self.generated_id_counter += 1;
        format!("__{}{}", prefix, self.generated_id_counter)
    }

    fn alloc_content(&mut self, content: ContentVec) -> ExecutableContentId {
        if content.is_empty() {
            return 0;
        }
        let id = (self.fsm.executableContent.len() + 1) as ExecutableContentId;
        self.fsm.executableContent.insert(id, content);
        id
    }

    fn push_state(&mut self, name: String, parent: Option<StateId>) -> Result<StateId, String> {
        if let Some(p) = parent {
            let parent_state = self.fsm.get_state_by_id(p);
            if parent_state.is_final {
                return Err(format!(
                    "Illegal nesting: '{}' is a child of final state '{}'",
                    name, parent_state.name
                ));
            }
        }
        if self.fsm.statesNames.contains_key(&name) {
            return Err(format!("Duplicate state id '{}'", name));
        }
        let mut s = State::new(&name);
        let id = (self.fsm.states.len() + 1) as StateId;
        s.id = id;
        s.doc_id = self.next_doc_id();
        if let Some(p) = parent {
            s.parent = p;
        }
        self.fsm.states.push(s);
        self.fsm.statesNames.insert(name, id);
        if let Some(p) = parent {
            self.fsm.get_state_by_id_mut(p).states.push(id);
        }
        Ok(id)
    }

    fn current_state(&self) -> Option<StateId> {
        self.stack.iter().rev().find_map(|f| match f {
            Frame::State(id) | Frame::Initial(id) => Some(*id),
            _ => None,
        })
    }

    /// Pushes a finished executable-content item into the nearest content-accumulating frame.
    fn push_content(&mut self, item: Box<dyn ExecutableContent>) {
        match self.stack.last_mut() {
            Some(Frame::OnEntry(v))
            | Some(Frame::OnExit(v))
            | Some(Frame::TransitionBody(_, v))
            | Some(Frame::FinalizeBody(v))
            | Some(Frame::ForEachBody { body: v, .. }) => v.push(item),
            Some(Frame::If { current, .. }) => current.push(item),
            Some(Frame::State(_)) => {
                // Top-level <script> directly under <scxml>/<state>: run once at document init.
                let id = self.alloc_content(vec![item]);
                self.fsm.script = id;
            }
            other => {
                error!("Executable content outside of a supported context: frame present = {}", other.is_some());
            }
        }
    }

    fn read_src(&self, src: &str) -> Option<String> {
        match read_file_with_includes(Path::new(src), &self.include_paths) {
            Ok(s) => Some(s),
            Err(msg) => {
                error!("{}", msg);
                None
            }
        }
    }

    fn parse_document(&mut self, xml: &str) -> Result<(), String> {
        let mut reader = Reader::from_str(xml);
        reader.trim_text(true);
        let mut buf = Vec::new();

        loop {
            let event = reader
                .read_event_into(&mut buf)
                .map_err(|e| format!("XML error at position {}: {:?}", reader.buffer_position(), e))?;
            match event {
                Event::Eof => break,
                Event::Start(e) => {
                    let name = local_name(&e);
                    let attrs = decode_attributes(&reader, &mut e.attributes());
                    self.start_element(&name, &attrs)?;
                }
                Event::Empty(e) => {
                    let name = local_name(&e);
                    let attrs = decode_attributes(&reader, &mut e.attributes());
                    self.start_element(&name, &attrs)?;
                    self.end_element(&name)?;
                }
                Event::End(e) => {
                    let name = str::from_utf8(e.name().as_ref())
                        .unwrap_or("")
                        .rsplit(':')
                        .next()
                        .unwrap_or("")
                        .to_string();
                    self.end_element(&name)?;
                }
                Event::Text(e) => {
                    if let Ok(t) = e.unescape() {
                        self.text.push_str(t.as_ref());
                    }
                }
                Event::CData(e) => {
                    if let Ok(t) = str::from_utf8(e.as_ref()) {
                        self.text.push_str(t);
                    }
                }
                _ => {}
            }
            buf.clear();
        }
        Ok(())
    }

    fn start_element(&mut self, name: &str, attrs: &AttributeMap) -> Result<(), String> {
        self.text.clear();
        match name {
            TAG_SCXML => {
                let root_name = attrs.get("name").cloned().unwrap_or_else(|| "main".to_string());
                let root = self.push_state(root_name.clone(), None)?;
                self.fsm.pseudo_root = root;
                self.fsm.name = root_name;
                if let Some(v) = attrs.get("version") {
                    self.fsm.version = v.clone();
                }
                if let Some(dm) = attrs.get(TAG_DATAMODEL) {
                    self.fsm.datamodel = dm.clone();
                }
                if let Some(b) = attrs.get("binding") {
                    if let Ok(bt) = b.parse::<BindingType>() {
                        self.fsm.binding = bt;
                    }
                }
                if let Some(initial) = attrs.get(TAG_INITIAL) {
                    self.pending_initial.push((root, initial.clone()));
                }
                self.stack.push(Frame::State(root));
            }
            TAG_STATE | TAG_PARALLEL | TAG_FINAL => {
                let parent = self.current_state();
                let name_attr = attrs
                    .get("id")
                    .cloned()
                    .ok_or_else(|| format!("Missing required attribute 'id' on <{}>", name))?;
                let id = self.push_state(name_attr, parent)?;
                {
                    let st = self.fsm.get_state_by_id_mut(id);
                    st.is_parallel = name == TAG_PARALLEL;
                    st.is_final = name == TAG_FINAL;
                }
                if let Some(initial) = attrs.get(TAG_INITIAL) {
                    self.pending_initial.push((id, initial.clone()));
                }
                self.stack.push(Frame::State(id));
            }
            TAG_HISTORY => {
                let parent = self.current_state();
                let name_attr = attrs.get("id").cloned().unwrap_or_else(|| self.generate_name("history"));
                let id = self.push_state(name_attr, parent)?;
                {
                    let st = self.fsm.get_state_by_id_mut(id);
                    st.history_type = attrs.get("type").map(map_history_type).unwrap_or(HistoryType::Shallow);
                }
                if let Some(p) = parent {
                    self.fsm.get_state_by_id_mut(p).history.push(id);
                }
                self.stack.push(Frame::State(id));
            }
            TAG_INITIAL => {
                let parent = self
                    .current_state()
                    .ok_or_else(|| "<initial> outside of a state".to_string())?;
                self.stack.push(Frame::Initial(parent));
            }
            TAG_TRANSITION => {
                let mut t = Transition::new();
                t.doc_id = self.next_doc_id();
                if let Some(ev) = attrs.get("event") {
                    t.wildcard = ev.trim() == "*";
                    t.events = ev.split_whitespace().map(|s| s.to_string()).collect();
                }
                if let Some(cond) = attrs.get("cond") {
                    t.cond = Some(cond.clone());
                }
                if let Some(tt) = attrs.get("type") {
                    t.transition_type = map_transition_type(tt);
                }
                let tid = t.id;
                let is_initial = matches!(self.stack.last(), Some(Frame::Initial(_)));
                if let Some(source) = self.current_state() {
                    t.source = source;
                }
                if let Some(target) = attrs.get("target") {
                    let names: Vec<String> = target.split_whitespace().map(|s| s.to_string()).collect();
                    if !names.is_empty() {
                        self.pending_targets.push(PendingTarget { transition_id: tid, names });
                    }
                }
                self.fsm.transitions.insert(tid, t);
                if is_initial {
                    if let Some(Frame::Initial(parent)) = self.stack.last() {
                        let parent = *parent;
                        self.fsm.get_state_by_id_mut(parent).initial = tid;
                    }
                } else if let Some(source) = self.current_state() {
                    self.fsm.get_state_by_id_mut(source).transitions.push(tid);
                }
                self.stack.push(Frame::TransitionBody(tid, Vec::new()));
            }
            TAG_ONENTRY => self.stack.push(Frame::OnEntry(Vec::new())),
            TAG_ONEXIT => self.stack.push(Frame::OnExit(Vec::new())),
            TAG_DATAMODEL => self.stack.push(Frame::Ignored),
            TAG_DATA => {
                let id = attrs.get("id").cloned().unwrap_or_default();
                let value = attrs
                    .get("expr")
                    .cloned()
                    .or_else(|| attrs.get("src").and_then(|src| self.read_src(src)));
                self.stack.push(Frame::Data { id, value });
            }
            TAG_RAISE => {
                let event = attrs.get("event").cloned().unwrap_or_default();
                self.push_content(Box::new(Raise { event }));
                self.stack.push(Frame::Ignored);
            }
            TAG_LOG => {
                let label = attrs.get("label").cloned();
                let expr = attrs.get("expr").cloned().unwrap_or_default();
                self.push_content(Box::new(Log::new(&label.as_ref(), &expr)));
                self.stack.push(Frame::Ignored);
            }
            TAG_ASSIGN => {
                let location = attrs.get("location").cloned().unwrap_or_default();
                let expr = attrs.get("expr").cloned().unwrap_or_default();
                self.push_content(Box::new(Assign { location, expr }));
                self.stack.push(Frame::Ignored);
            }
            TAG_SCRIPT => {
                let src_text = attrs.get("src").and_then(|src| self.read_src(src));
                // Resolve `src` content while the enclosing content-sink frame is still on top
                // of the stack, since `push_content` looks there; `Frame::Script` then only
                // needs to remember whether that already happened.
                let src_handled = if let Some(text) = src_text {
                    self.finish_script(text);
                    true
                } else {
                    false
                };
                self.stack.push(Frame::Script { src_handled });
            }
            TAG_CANCEL => {
                let send_id = attrs.get("sendid").cloned().unwrap_or_default();
                let send_id_expr = attrs.get("sendidexpr").cloned().unwrap_or_default();
                self.push_content(Box::new(Cancel { send_id, send_id_expr }));
                self.stack.push(Frame::Ignored);
            }
            TAG_IF => {
                let cond = attrs.get("cond").cloned().unwrap_or_default();
                self.stack.push(Frame::If {
                    segments: Vec::new(),
                    current_cond: Some(cond),
                    current: Vec::new(),
                });
            }
            TAG_ELSEIF | TAG_ELSE => {
                self.close_if_segment()?;
                let cond = if name == TAG_ELSEIF {
                    Some(attrs.get("cond").cloned().unwrap_or_default())
                } else {
                    None
                };
                match self.stack.last_mut() {
                    Some(Frame::If { current_cond, .. }) => *current_cond = cond,
                    _ => return Err(format!("<{}> outside of <if>", name)),
                }
            }
            TAG_FOREACH => {
                self.stack.push(Frame::ForEachBody {
                    array: attrs.get("array").cloned().unwrap_or_default(),
                    item: attrs.get("item").cloned().unwrap_or_default(),
                    index: attrs.get("index").cloned().unwrap_or_default(),
                    body: Vec::new(),
                });
            }
            TAG_SEND => {
                let mut sp = SendParameters::new();
                sp.name_location = attrs.get("idlocation").cloned().unwrap_or_default();
                sp.name = attrs.get("id").cloned().unwrap_or_default();
                sp.event = attrs.get("event").cloned().unwrap_or_default();
                sp.event_expr = attrs.get("eventexpr").cloned().unwrap_or_default();
                sp.target = attrs.get("target").cloned().unwrap_or_default();
                sp.target_expr = attrs.get("targetexpr").cloned().unwrap_or_default();
                sp.type_value = attrs.get("type").cloned().unwrap_or_default();
                sp.type_expr = attrs.get("typeexpr").cloned().unwrap_or_default();
                sp.name_list = attrs.get("namelist").cloned().unwrap_or_default();
                if let Some(d) = attrs.get("delay") {
                    sp.delay_ms = crate::executable_content::parse_duration_to_milliseconds(d).max(0) as u64;
                }
                sp.delay_expr = attrs.get("delayexpr").cloned().unwrap_or_default();
                self.stack.push(Frame::Send(sp));
            }
            TAG_INVOKE => {
                let mut inv = Invoke::new();
                inv.doc_id = self.next_doc_id();
                inv.external_id_location = attrs.get("idlocation").cloned().unwrap_or_default();
                inv.type_name = attrs.get("type").cloned().unwrap_or_default();
                inv.type_expr = attrs.get("typeexpr").cloned().unwrap_or_default();
                inv.src = attrs.get("src").cloned().unwrap_or_default();
                inv.src_expr = attrs.get("srcexpr").cloned().unwrap_or_default();
                inv.autoforward = attrs.get("autoforward").map(|v| v == "true").unwrap_or(false);
                if let Some(nl) = attrs.get("namelist") {
                    inv.name_list = nl.split_whitespace().map(|s| s.to_string()).collect();
                }
                if let Some(id) = attrs.get("id") {
                    inv.invoke_id = id.clone();
                }
                if let Some(state) = self.current_state() {
                    inv.parent_state_name = self.fsm.get_state_by_id(state).name.clone();
                }
                self.stack.push(Frame::Invoke(inv));
            }
            TAG_FINALIZE => self.stack.push(Frame::FinalizeBody(Vec::new())),
            TAG_PARAM => {
                let p = Parameter {
                    name: attrs.get("name").cloned().unwrap_or_default(),
                    expr: attrs.get("expr").cloned().unwrap_or_default(),
                    location: attrs.get("location").cloned().unwrap_or_default(),
                };
                match self.stack.last_mut() {
                    Some(Frame::Params(v)) => v.push(p),
                    _ => self.stack.push(Frame::Params(vec![p])),
                }
            }
            TAG_DONEDATA => self.stack.push(Frame::DoneData(DoneData::new())),
            TAG_CONTENT => self.stack.push(Frame::Content(CommonContent::new())),
            _ => self.stack.push(Frame::Ignored),
        }
        Ok(())
    }

    fn finish_script(&mut self, text: String) {
        let expr_id = self.alloc_content(vec![Box::new(Expression { content: text })]);
        self.push_content(Box::new(Script { content: vec![expr_id] }));
    }

    fn close_if_segment(&mut self) -> Result<(), String> {
        match self.stack.last_mut() {
            Some(Frame::If { segments, current_cond, current }) => {
                segments.push((current_cond.take(), std::mem::take(current)));
                Ok(())
            }
            _ => Err("<elseif>/<else>/</if> outside of <if>".to_string()),
        }
    }

    fn end_element(&mut self, name: &str) -> Result<(), String> {
        match name {
            TAG_SCXML | TAG_STATE | TAG_PARALLEL | TAG_FINAL | TAG_HISTORY | TAG_INITIAL => {
                self.stack.pop();
            }
            TAG_TRANSITION => {
                if let Some(Frame::TransitionBody(tid, body)) = self.stack.pop() {
                    let id = self.alloc_content(body);
                    if let Some(t) = self.fsm.transitions.get_mut(&tid) {
                        t.content = id;
                    }
                }
            }
            TAG_ONENTRY => {
                if let Some(Frame::OnEntry(body)) = self.stack.pop() {
                    let id = self.alloc_content(body);
                    if let Some(state) = self.current_state() {
                        self.fsm.get_state_by_id_mut(state).onentry = id;
                    }
                }
            }
            TAG_ONEXIT => {
                if let Some(Frame::OnExit(body)) = self.stack.pop() {
                    let id = self.alloc_content(body);
                    if let Some(state) = self.current_state() {
                        self.fsm.get_state_by_id_mut(state).onexit = id;
                    }
                }
            }
            TAG_DATA => {
                let text = self.text.clone();
                if let Some(Frame::Data { id, value }) = self.stack.pop() {
                    let resolved = value.or_else(|| {
                        let t = text.trim();
                        if t.is_empty() {
                            None
                        } else {
                            Some(t.to_string())
                        }
                    });
                    if let (Some(state), Some(v)) = (self.current_state(), resolved) {
                        self.fsm
                            .get_state_by_id_mut(state)
                            .data
                            .values
                            .insert(id, crate::datamodel::Data::String(v));
                    }
                }
            }
            TAG_DATAMODEL | TAG_RAISE | TAG_CANCEL => {
                self.stack.pop();
            }
            TAG_LOG | TAG_ASSIGN => {
                self.stack.pop();
            }
            TAG_SCRIPT => {
                let text = self.text.clone();
                let src_handled = matches!(self.stack.pop(), Some(Frame::Script { src_handled: true }));
                if !src_handled && !text.trim().is_empty() {
                    self.finish_script(text.trim().to_string());
                }
            }
            TAG_IF => {
                self.close_if_segment()?;
                if let Some(Frame::If { segments, .. }) = self.stack.pop() {
                    let if_box = fold_if_segments(self, segments);
                    self.push_content(if_box);
                }
            }
            TAG_ELSEIF | TAG_ELSE => {}
            TAG_FOREACH => {
                if let Some(Frame::ForEachBody { array, item, index, body }) = self.stack.pop() {
                    let content = self.alloc_content(body);
                    self.push_content(Box::new(ForEach { array, item, index, content }));
                }
            }
            TAG_SEND => {
                if let Some(Frame::Send(sp)) = self.stack.pop() {
                    self.push_content(Box::new(sp));
                }
            }
            TAG_INVOKE => {
                if let Some(Frame::Invoke(inv)) = self.stack.pop() {
                    if let Some(state) = self.current_state() {
                        self.fsm.get_state_by_id_mut(state).invoke.push(inv);
                    }
                }
            }
            TAG_FINALIZE => {
                if let Some(Frame::FinalizeBody(body)) = self.stack.pop() {
                    let id = self.alloc_content(body);
                    if let Some(Frame::Invoke(inv)) = self.stack.last_mut() {
                        inv.finalize = id;
                    }
                }
            }
            TAG_PARAM => {
                // Params accumulate in a single `Frame::Params` shared by all sibling <param>
                // elements; nothing to do until the enclosing element closes.
            }
            TAG_DONEDATA => {
                if let Some(Frame::DoneData(dd)) = self.stack.pop() {
                    if let Some(state) = self.current_state() {
                        self.fsm.get_state_by_id_mut(state).donedata = Some(dd);
                    }
                }
            }
            TAG_CONTENT => {
                if let Some(Frame::Content(mut cc)) = self.stack.pop() {
                    if cc.content.is_none() && !self.text.trim().is_empty() {
                        cc.content = Some(self.text.trim().to_string());
                    }
                    self.attach_content(cc);
                }
            }
            _ => {
                // Could be the closing tag of a pending Frame::Params (attached lazily, see
                // below) or a genuinely unknown/ignored element.
                if matches!(self.stack.last(), Some(Frame::Params(_))) {
                    self.attach_params();
                } else {
                    self.stack.pop();
                }
            }
        }
        self.text.clear();
        Ok(())
    }

    /// Attaches a just-closed `<param>` list (held in `Frame::Params`) to its parent: `<send>`,
    /// `<invoke>` or `<donedata>`. Called when the enclosing element (not `<param>` itself)
    /// closes, since sibling `<param>`s share one frame.
    fn attach_params(&mut self) {
        if let Some(Frame::Params(params)) = self.stack.pop() {
            match self.stack.last_mut() {
                Some(Frame::Send(sp)) => sp.params = Some(params),
                Some(Frame::Invoke(inv)) => inv.params = Some(params),
                Some(Frame::DoneData(dd)) => dd.params = Some(params),
                _ => {}
            }
        }
    }

    fn attach_content(&mut self, cc: CommonContent) {
        match self.stack.last_mut() {
            Some(Frame::Send(sp)) => sp.content = Some(cc),
            Some(Frame::Invoke(inv)) => inv.content = Some(cc),
            Some(Frame::DoneData(dd)) => dd.content = Some(cc),
            _ => {}
        }
    }

    /// Resolves all pending `initial=`/`<transition target=>` name references to [StateId]s.
    fn resolve(&mut self) -> Result<(), String> {
        for (state, initial) in std::mem::take(&mut self.pending_initial) {
            let names: Vec<String> = initial.split_whitespace().map(|s| s.to_string()).collect();
            if names.is_empty() {
                continue;
            }
            let targets = self.resolve_names(&names)?;
            let mut t = Transition::new();
            t.doc_id = self.next_doc_id();
            t.source = state;
            t.target = targets;
            let tid = t.id;
            self.fsm.transitions.insert(tid, t);
            self.fsm.get_state_by_id_mut(state).initial = tid;
        }
        for pt in std::mem::take(&mut self.pending_targets) {
            let targets = self.resolve_names(&pt.names)?;
            if let Some(t) = self.fsm.transitions.get_mut(&pt.transition_id) {
                t.target = targets;
            }
        }
        Ok(())
    }

    fn resolve_names(&self, names: &[String]) -> Result<Vec<StateId>, String> {
        names
            .iter()
            .map(|n| {
                self.fsm
                    .statesNames
                    .get(n)
                    .copied()
                    .ok_or_else(|| format!("Unknown state reference '{}'", n))
            })
            .collect()
    }
}

fn local_name(e: &BytesStart) -> String {
    str::from_utf8(e.name().as_ref())
        .unwrap_or("")
        .rsplit(':')
        .next()
        .unwrap_or("")
        .to_string()
}

fn decode_attributes(reader: &Reader<&[u8]>, attr: &mut Attributes) -> AttributeMap {
    attr.filter_map(|attr_result| match attr_result {
        Ok(a) => {
            let key = reader.decoder().decode(a.key.as_ref()).ok()?;
            let value = a.decode_and_unescape_value(reader).ok()?;
            Some((key.to_string(), value.to_string()))
        }
        Err(err) => {
            error!("Unable to read attribute: {:?}", err);
            None
        }
    })
    .collect()
}

/// Folds a closed `<if>`/`<elseif>`/`<else>` chain into a single nested [If] tree, allocating a
/// content-block id per nesting level (the innermost/last branch first).
fn fold_if_segments(
    rs: &mut ReaderState,
    segments: Vec<(Option<String>, ContentVec)>,
) -> Box<dyn ExecutableContent> {
    let mut iter = segments.into_iter().rev().peekable();
    let mut else_id: ExecutableContentId = 0;
    if let Some((cond, _)) = iter.peek() {
        if cond.is_none() {
            let (_, body) = iter.next().unwrap();
            else_id = rs.alloc_content(body);
        }
    }
    let mut top: Option<Box<dyn ExecutableContent>> = None;
    for (cond, body) in iter {
        if let Some(prev) = top.take() {
            else_id = rs.alloc_content(vec![prev]);
        }
        let content_id = rs.alloc_content(body);
        top = Some(Box::new(If {
            condition: cond.unwrap_or_default(),
            content: content_id,
            else_content: else_id,
        }));
    }
    top.unwrap_or_else(|| Box::new(If { condition: "false".to_string(), content: 0, else_content: 0 }))
}
