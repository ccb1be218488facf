//! Runtime tracing of the interpreter algorithm.
//!
//! This is an implementation detail, not part of the W3C recommendation: it lets a caller
//! (or a running FSM itself, via "tron"/"troff" commands, see [crate::handle_trace]) observe
//! method entry/exit, state transitions and events as the interpreter algorithm executes.

use std::cell::Cell;
use std::collections::HashMap;
use std::fmt::Display;
use std::ops::{BitOr, BitOrAssign};
use std::str::FromStr;
use std::sync::atomic::{AtomicU8, Ordering};

use crate::fsm::{Event, State};
use crate::ArgOption;

/// Argument option to specify trace flags on the command line, e.g. "-trace all".
pub const TRACE_ARGUMENT_OPTION: ArgOption = ArgOption {
    name: "trace",
    required: false,
    with_value: true,
};

/// A set of trace categories. Several categories can be combined, e.g. `TraceMode::METHODS |
/// TraceMode::STATES`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TraceMode(u8);

impl TraceMode {
    pub const NONE: TraceMode = TraceMode(0);
    pub const METHODS: TraceMode = TraceMode(1 << 0);
    pub const STATES: TraceMode = TraceMode(1 << 1);
    pub const EVENTS: TraceMode = TraceMode(1 << 2);
    pub const ARGUMENTS: TraceMode = TraceMode(1 << 3);
    pub const RESULTS: TraceMode = TraceMode(1 << 4);
    pub const ALL: TraceMode =
        TraceMode(TraceMode::METHODS.0 | TraceMode::STATES.0 | TraceMode::EVENTS.0 | TraceMode::ARGUMENTS.0 | TraceMode::RESULTS.0);

    pub fn contains(&self, other: TraceMode) -> bool {
        (self.0 & other.0) == other.0
    }

    /// Raw bitmask, for storage in an `AtomicU8`.
    pub fn bits(&self) -> u8 {
        self.0
    }

    /// Reconstructs a `TraceMode` from a raw bitmask previously obtained via [TraceMode::bits].
    pub fn from_bits(bits: u8) -> TraceMode {
        TraceMode(bits)
    }

    /// Returns this mode with `other` additionally enabled.
    pub fn with(&self, other: TraceMode) -> TraceMode {
        TraceMode(self.0 | other.0)
    }

    /// Returns this mode with `other` disabled.
    pub fn without(&self, other: TraceMode) -> TraceMode {
        TraceMode(self.0 & !other.0)
    }

    /// Parses the "-trace" command line argument, if given. Defaults to [TraceMode::NONE].
    pub fn from_arguments(named_options: &HashMap<&'static str, String>) -> TraceMode {
        match named_options.get(TRACE_ARGUMENT_OPTION.name) {
            None => TraceMode::NONE,
            Some(value) => {
                let mut mode = TraceMode::NONE;
                for token in value.split(|c: char| c == ',' || c.is_whitespace()) {
                    if !token.is_empty() {
                        if let Ok(m) = TraceMode::from_str(token) {
                            mode |= m;
                        }
                    }
                }
                mode
            }
        }
    }
}

impl BitOr for TraceMode {
    type Output = TraceMode;
    fn bitor(self, rhs: Self) -> Self::Output {
        TraceMode(self.0 | rhs.0)
    }
}

impl BitOrAssign for TraceMode {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl FromStr for TraceMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "methods" => Ok(TraceMode::METHODS),
            "states" => Ok(TraceMode::STATES),
            "events" => Ok(TraceMode::EVENTS),
            "arguments" => Ok(TraceMode::ARGUMENTS),
            "results" => Ok(TraceMode::RESULTS),
            "all" => Ok(TraceMode::ALL),
            "" | "none" => Ok(TraceMode::NONE),
            _ => Err(()),
        }
    }
}

impl Display for TraceMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.contains(TraceMode::ALL) {
            write!(f, "all")
        } else if self.contains(TraceMode::METHODS) {
            write!(f, "methods")
        } else if self.contains(TraceMode::STATES) {
            write!(f, "states")
        } else if self.contains(TraceMode::EVENTS) {
            write!(f, "events")
        } else if self.contains(TraceMode::ARGUMENTS) {
            write!(f, "arguments")
        } else if self.contains(TraceMode::RESULTS) {
            write!(f, "results")
        } else {
            write!(f, "none")
        }
    }
}

/// Observes the interpreter algorithm while it runs.
///
/// Implementations must be usable from the FSM's worker thread with only `&self` access (the
/// methods that are called from deep inside read-only helper methods of [crate::fsm::Fsm]), so
/// any mutable bookkeeping (indentation, counters) has to use interior mutability.
pub trait Tracer: Send {
    /// Replaces the currently active trace categories.
    fn enable_trace(&mut self, mode: TraceMode);

    /// Returns the currently active trace categories.
    fn trace_mode(&self) -> TraceMode;

    fn enter_method(&self, what: &str);
    fn exit_method(&self, what: &str);

    /// Traces a free-form message.
    fn trace(&self, what: &str);

    fn trace_argument(&self, name: &str, value: &dyn Display);
    fn trace_result(&self, name: &str, value: &dyn Display);

    fn trace_enter_state(&self, state: &State);
    fn trace_exit_state(&self, state: &State);

    fn event_internal_received(&self, event: &Event);
    fn event_external_received(&self, event: &Event);
    fn event_internal_send(&self, event: &Event);
}

thread_local! {
    static INDENT: Cell<usize> = Cell::new(0);
}

/// Default [Tracer] implementation, logging through the `log` crate with indentation per
/// nested method call.
pub struct DefaultTracer {
    mode: AtomicU8,
}

impl DefaultTracer {
    pub fn new() -> DefaultTracer {
        DefaultTracer {
            mode: AtomicU8::new(TraceMode::NONE.0),
        }
    }

    fn indent(&self) -> String {
        INDENT.with(|d| "  ".repeat(d.get()))
    }

    fn mode(&self) -> TraceMode {
        TraceMode(self.mode.load(Ordering::Relaxed))
    }
}

impl Default for DefaultTracer {
    fn default() -> Self {
        DefaultTracer::new()
    }
}

impl Tracer for DefaultTracer {
    fn enable_trace(&mut self, mode: TraceMode) {
        self.mode.store(mode.0, Ordering::Relaxed);
    }

    fn trace_mode(&self) -> TraceMode {
        self.mode()
    }

    fn enter_method(&self, what: &str) {
        if self.mode().contains(TraceMode::METHODS) {
            log::debug!("{}> {}", self.indent(), what);
        }
        INDENT.with(|d| d.set(d.get() + 1));
    }

    fn exit_method(&self, what: &str) {
        INDENT.with(|d| d.set(d.get().saturating_sub(1)));
        if self.mode().contains(TraceMode::METHODS) {
            log::debug!("{}< {}", self.indent(), what);
        }
    }

    fn trace(&self, what: &str) {
        log::debug!("{}{}", self.indent(), what);
    }

    fn trace_argument(&self, name: &str, value: &dyn Display) {
        if self.mode().contains(TraceMode::ARGUMENTS) {
            log::debug!("{} {} = {}", self.indent(), name, value);
        }
    }

    fn trace_result(&self, name: &str, value: &dyn Display) {
        if self.mode().contains(TraceMode::RESULTS) {
            log::debug!("{} {} = {}", self.indent(), name, value);
        }
    }

    fn trace_enter_state(&self, state: &State) {
        if self.mode().contains(TraceMode::STATES) {
            log::debug!("{}enter state {}", self.indent(), state);
        }
    }

    fn trace_exit_state(&self, state: &State) {
        if self.mode().contains(TraceMode::STATES) {
            log::debug!("{}exit state {}", self.indent(), state);
        }
    }

    fn event_internal_received(&self, event: &Event) {
        if self.mode().contains(TraceMode::EVENTS) {
            log::debug!("{}internal event received: {}", self.indent(), event);
        }
    }

    fn event_external_received(&self, event: &Event) {
        if self.mode().contains(TraceMode::EVENTS) {
            log::debug!("{}external event received: {}", self.indent(), event);
        }
    }

    fn event_internal_send(&self, event: &Event) {
        if self.mode().contains(TraceMode::EVENTS) {
            log::debug!("{}internal event sent: {}", self.indent(), event);
        }
    }
}
