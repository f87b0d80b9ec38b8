//! Helpers shared between the unit tests.

use parking_lot::Mutex;

use crate::ThresholdEvent;
use crate::ThresholdListener;

static LOGGER_INIT: once_cell::sync::Lazy<()> = once_cell::sync::Lazy::new(|| {
    env_logger::init();
});

pub fn enable_logger() {
    *LOGGER_INIT;
}

/// Listener that keeps every event it is handed.
#[derive(Default)]
pub struct CollectingListener {
    pub events: Mutex<Vec<ThresholdEvent>>,
}

impl ThresholdListener for CollectingListener {
    fn notify(
        &self,
        event: &ThresholdEvent,
    ) {
        self.events.lock().push(event.clone());
    }
}
