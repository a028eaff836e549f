//! `PdxUnreadDataExpiryTask` (spec §4.7): single-shot release of preserved
//! PDX-unread-field buffers after a bounded timeout, so objects round-tripped
//! through a mismatched schema don't pin memory indefinitely.

use parking_lot::Mutex;

use super::task::ExpiryTask;

/// Holds an opaque unread-fields buffer until either the owning object is
/// re-serialized (consuming it) or this task's timeout releases it.
pub struct PdxUnreadDataExpiryTask {
    buffer: Mutex<Option<Vec<u8>>>,
}

impl PdxUnreadDataExpiryTask {
    pub fn new(buffer: Vec<u8>) -> Self {
        PdxUnreadDataExpiryTask {
            buffer: Mutex::new(Some(buffer)),
        }
    }

    /// Consumes the buffer if it hasn't already been released, e.g. when
    /// the object is re-serialized before the timeout fires.
    pub fn take(&self) -> Option<Vec<u8>> {
        self.buffer.lock().take()
    }
}

impl ExpiryTask for PdxUnreadDataExpiryTask {
    fn on_expire(&self) -> bool {
        self.buffer.lock().take();
        true
    }
}
