//! A [crate::tracer::Tracer] used by the test harness (see [crate::test]).
//!
//! In addition to the normal logging a [DefaultTracer](crate::tracer::DefaultTracer) does, it
//! keeps track of the live state configuration so a test can assert on the final configuration
//! reached, and offers a watchdog to abort a test that never terminates.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::mpsc::{channel, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[cfg(test)]
use std::println as error;
#[cfg(not(test))]
use log::error;

use crate::fsm::{Event, State, StateId};
use crate::tracer::{TraceMode, Tracer};

/// Prints the message and terminates the process with a non-zero exit code.
pub fn abort_test(msg: String) -> ! {
    error!("{}", msg);
    std::process::exit(1);
}

/// Shared map of state-name to state-id, reflecting the live configuration of a running FSM.
pub type FsmConfig = Arc<Mutex<HashMap<String, StateId>>>;

pub struct TestTracer {
    mode: AtomicU8,
    config: FsmConfig,
}

impl TestTracer {
    pub fn new() -> TestTracer {
        TestTracer {
            mode: AtomicU8::new(TraceMode::NONE.bits()),
            config: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Returns a handle to the live configuration, updated as states are entered/exited.
    pub fn get_fsm_config(&self) -> FsmConfig {
        self.config.clone()
    }

    /// Starts a watchdog thread that aborts the test if not disabled within `timeout_ms`.
    pub fn start_watchdog(test_name: &str, timeout_ms: u64) -> Box<Sender<String>> {
        let (tx, rx) = channel::<String>();
        let name = test_name.to_string();
        thread::spawn(move || {
            if rx.recv_timeout(Duration::from_millis(timeout_ms)).is_err() {
                abort_test(format!("Test '{}' timed out after {} ms", name, timeout_ms));
            }
        });
        Box::new(tx)
    }

    /// Disables a watchdog started via [TestTracer::start_watchdog].
    pub fn disable_watchdog(sender: &Sender<String>) {
        let _ = sender.send("done".to_string());
    }

    /// Checks that all states named in `expected` are part of `current`.
    /// Returns the joined expected states on success, or the first missing state name on failure.
    pub fn verify_final_configuration(expected: &Vec<String>, current: &FsmConfig) -> Result<String, String> {
        let guard = current.lock().unwrap();
        for name in expected {
            if !guard.contains_key(name) {
                return Err(name.clone());
            }
        }
        Ok(expected.join(","))
    }

    fn mode(&self) -> TraceMode {
        TraceMode::from_bits(self.mode.load(Ordering::Relaxed))
    }
}

impl Default for TestTracer {
    fn default() -> Self {
        TestTracer::new()
    }
}

impl Tracer for TestTracer {
    fn enable_trace(&mut self, mode: TraceMode) {
        self.mode.store(mode.bits(), Ordering::Relaxed);
    }

    fn trace_mode(&self) -> TraceMode {
        self.mode()
    }

    fn enter_method(&self, what: &str) {
        if self.mode().contains(TraceMode::METHODS) {
            println!("> {}", what);
        }
    }

    fn exit_method(&self, what: &str) {
        if self.mode().contains(TraceMode::METHODS) {
            println!("< {}", what);
        }
    }

    fn trace(&self, what: &str) {
        println!("{}", what);
    }

    fn trace_argument(&self, name: &str, value: &dyn std::fmt::Display) {
        if self.mode().contains(TraceMode::ARGUMENTS) {
            println!(" {} = {}", name, value);
        }
    }

    fn trace_result(&self, name: &str, value: &dyn std::fmt::Display) {
        if self.mode().contains(TraceMode::RESULTS) {
            println!(" {} = {}", name, value);
        }
    }

    fn trace_enter_state(&self, state: &State) {
        self.config.lock().unwrap().insert(state.name.clone(), state.id);
        if self.mode().contains(TraceMode::STATES) {
            println!("enter state {}", state);
        }
    }

    fn trace_exit_state(&self, state: &State) {
        self.config.lock().unwrap().remove(&state.name);
        if self.mode().contains(TraceMode::STATES) {
            println!("exit state {}", state);
        }
    }

    fn event_internal_received(&self, event: &Event) {
        if self.mode().contains(TraceMode::EVENTS) {
            println!("internal event received: {}", event);
        }
    }

    fn event_external_received(&self, event: &Event) {
        if self.mode().contains(TraceMode::EVENTS) {
            println!("external event received: {}", event);
        }
    }

    fn event_internal_send(&self, event: &Event) {
        if self.mode().contains(TraceMode::EVENTS) {
            println!("internal event sent: {}", event);
        }
    }
}
