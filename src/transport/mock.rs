//! Scripted in-memory transport for state machine tests.

use std::sync::Arc;

use parking_lot::Mutex;
use url::Url;

use crate::error::{Error, Result};

use super::{EventSink, Transport, TransportHandle};

/// What the mock does when asked to open a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OpenBehavior {
    /// Record the handle and wait for the test to emit events.
    Manual,
    /// Emit `Opened` right away.
    Accept,
    /// Emit `Errored` then `Closed` right away.
    Refuse,
    /// Fail synchronously.
    Throw,
}

#[derive(Debug)]
struct MockState {
    behavior: OpenBehavior,
    fail_sends: bool,
    loop_gone: bool,
    opened: Vec<(String, EventSink)>,
    sent: Vec<String>,
    closes: usize,
}

/// Cloneable test transport; clones share state.
#[derive(Debug, Clone)]
pub(crate) struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub(crate) fn new(behavior: OpenBehavior) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                behavior,
                fail_sends: false,
                loop_gone: false,
                opened: Vec::new(),
                sent: Vec::new(),
                closes: 0,
            })),
        }
    }

    pub(crate) fn set_behavior(&self, behavior: OpenBehavior) {
        self.state.lock().behavior = behavior;
    }

    pub(crate) fn fail_sends(&self, fail: bool) {
        self.state.lock().fail_sends = fail;
    }

    /// Makes sends report that the socket loop already exited.
    pub(crate) fn end_loop(&self) {
        self.state.lock().loop_gone = true;
    }

    /// Number of `open` calls, including ones that threw.
    pub(crate) fn open_count(&self) -> usize {
        self.state.lock().opened.len()
    }

    pub(crate) fn urls(&self) -> Vec<String> {
        self.state.lock().opened.iter().map(|(url, _)| url.clone()).collect()
    }

    /// Sink of the most recently opened handle.
    pub(crate) fn last_sink(&self) -> EventSink {
        self.state
            .lock()
            .opened
            .last()
            .map(|(_, sink)| sink.clone())
            .expect("no handle opened yet")
    }

    pub(crate) fn sink(&self, index: usize) -> EventSink {
        self.state.lock().opened[index].1.clone()
    }

    pub(crate) fn sent(&self) -> Vec<String> {
        self.state.lock().sent.clone()
    }

    pub(crate) fn close_count(&self) -> usize {
        self.state.lock().closes
    }
}

impl Transport for MockTransport {
    fn open(&self, url: &Url, sink: EventSink) -> Result<Box<dyn TransportHandle>> {
        let behavior = {
            let mut state = self.state.lock();
            state.opened.push((url.to_string(), sink.clone()));
            state.behavior
        };

        match behavior {
            OpenBehavior::Manual => {}
            OpenBehavior::Accept => {
                sink.opened();
            }
            OpenBehavior::Refuse => {
                sink.errored("connection refused");
                sink.closed();
            }
            OpenBehavior::Throw => {
                return Err(Error::open_failed(url.as_str(), "socket constructor threw"));
            }
        }

        Ok(Box::new(MockHandle {
            state: Arc::clone(&self.state),
            sink,
        }))
    }
}

struct MockHandle {
    state: Arc<Mutex<MockState>>,
    sink: EventSink,
}

impl TransportHandle for MockHandle {
    fn send(&self, text: &str) -> Result<()> {
        let mut state = self.state.lock();
        if state.loop_gone {
            return Err(Error::ConnectionClosed);
        }
        if state.fail_sends {
            return Err(Error::send_failed("socket is not writable"));
        }
        state.sent.push(text.to_string());
        Ok(())
    }

    fn close(&self) {
        self.sink.detach();
        self.state.lock().closes += 1;
    }
}
