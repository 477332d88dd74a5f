//! User-facing notification contracts for terminal failures.

// self
use crate::_prelude::*;

/// Sink for toast-style failure notifications.
///
/// The executor reports every terminal failure here unless the call suppressed notifications;
/// silent internal calls (re-authentication, quota status checks) always suppress. The sink
/// must tolerate being called from the drain task, so implementations stay non-blocking.
pub trait NotificationSink
where
	Self: Send + Sync,
{
	/// Reports a terminal failure for the given topic (usually the request path).
	fn error(&self, topic: &str, message: &str);
}

/// Sink that discards every notification; the default for headless embedders.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopNotificationSink;
impl NotificationSink for NoopNotificationSink {
	fn error(&self, _topic: &str, _message: &str) {}
}

/// Sink that records notifications in memory for assertions in tests and demos.
#[derive(Clone, Debug, Default)]
pub struct RecordingNotificationSink(Arc<Mutex<Vec<(String, String)>>>);
impl RecordingNotificationSink {
	/// Returns the recorded `(topic, message)` pairs in arrival order.
	pub fn recorded(&self) -> Vec<(String, String)> {
		self.0.lock().clone()
	}
}
impl NotificationSink for RecordingNotificationSink {
	fn error(&self, topic: &str, message: &str) {
		self.0.lock().push((topic.into(), message.into()));
	}
}
