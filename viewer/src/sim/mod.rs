//! Scripted stand-ins for the runtime, the GL device and the host.
//!
//! Every call lands in a shared [`CallLog`] in the order it was made, so
//! tests and the headless binary can check protocol ordering directly.

mod gl;
mod host;
mod runtime;

use std::cell::RefCell;
use std::rc::Rc;

pub use gl::SimGl;
pub use host::{RecordingRenderer, SimContext, SimSceneProvider};
pub use runtime::{SimRuntime, SIM_RUNTIME_NAME};

/// Ordered record of calls, shared between every simulated collaborator.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    entries: Rc<RefCell<Vec<String>>>,
}

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: impl Into<String>) {
        self.entries.borrow_mut().push(entry.into());
    }

    /// Snapshot of every entry.
    pub fn names(&self) -> Vec<String> {
        self.entries.borrow().clone()
    }

    /// Entries containing `needle`.
    pub fn matching(&self, needle: &str) -> Vec<String> {
        self.entries
            .borrow()
            .iter()
            .filter(|e| e.contains(needle))
            .cloned()
            .collect()
    }

    pub fn count(&self, needle: &str) -> usize {
        self.entries
            .borrow()
            .iter()
            .filter(|e| e.contains(needle))
            .count()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }
}
