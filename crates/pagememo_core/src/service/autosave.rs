//! Deadline-based debounce for autosave.
//!
//! The debouncer never reads a clock; callers pass `now` so the window can be
//! driven from a UI timer, a test, or a polling loop.

/// Delay between the last text edit and its autosave.
pub const DEFAULT_AUTOSAVE_DELAY_MS: i64 = 500;

/// Coalesces scheduled values so only the latest one is delivered.
#[derive(Debug, Clone)]
pub struct Debouncer<T> {
    delay_ms: i64,
    pending: Option<(T, i64)>,
}

impl<T> Debouncer<T> {
    pub fn new(delay_ms: i64) -> Self {
        Self {
            delay_ms: delay_ms.max(0),
            pending: None,
        }
    }

    pub fn delay_ms(&self) -> i64 {
        self.delay_ms
    }

    /// Replaces any pending value and restarts the window at `now`.
    pub fn schedule(&mut self, value: T, now: i64) {
        self.pending = Some((value, now.saturating_add(self.delay_ms)));
    }

    /// Deadline of the pending value, if any.
    pub fn deadline(&self) -> Option<i64> {
        self.pending.as_ref().map(|(_, deadline)| *deadline)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Pending value regardless of its deadline.
    pub fn pending(&self) -> Option<&T> {
        self.pending.as_ref().map(|(value, _)| value)
    }

    /// Pending value once its deadline has been reached.
    ///
    /// The value stays pending until [`Debouncer::cancel`], so a failed
    /// delivery can be retried.
    pub fn due(&self, now: i64) -> Option<&T> {
        match &self.pending {
            Some((value, deadline)) if now >= *deadline => Some(value),
            _ => None,
        }
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }
}

impl<T> Default for Debouncer<T> {
    fn default() -> Self {
        Self::new(DEFAULT_AUTOSAVE_DELAY_MS)
    }
}

#[cfg(test)]
mod tests {
    use super::{Debouncer, DEFAULT_AUTOSAVE_DELAY_MS};

    #[test]
    fn value_is_held_until_deadline() {
        let mut debouncer = Debouncer::new(500);
        debouncer.schedule("a", 1_000);
        assert_eq!(debouncer.deadline(), Some(1_500));
        assert_eq!(debouncer.due(1_499), None);
        assert_eq!(debouncer.due(1_500), Some(&"a"));
        assert!(debouncer.is_pending());

        debouncer.cancel();
        assert!(!debouncer.is_pending());
        assert_eq!(debouncer.due(10_000), None);
    }

    #[test]
    fn rescheduling_coalesces_and_extends_window() {
        let mut debouncer = Debouncer::new(500);
        debouncer.schedule(1, 0);
        debouncer.schedule(2, 300);
        assert_eq!(debouncer.due(600), None);
        assert_eq!(debouncer.due(800), Some(&2));
    }

    #[test]
    fn pending_ignores_deadline_and_cancel_clears() {
        let mut debouncer = Debouncer::<u8>::default();
        assert_eq!(debouncer.delay_ms(), DEFAULT_AUTOSAVE_DELAY_MS);
        debouncer.schedule(7, 0);
        assert_eq!(debouncer.pending(), Some(&7));

        debouncer.cancel();
        assert_eq!(debouncer.pending(), None);
    }
}
