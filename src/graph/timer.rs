//! Cancelable delayed work driven by an explicit clock.
//!
//! Times are seconds on whatever monotonic clock the caller uses (the UI
//! passes `egui`'s input time). Nothing here sleeps or spawns.

/// At most one pending payload with a deadline. Scheduling replaces
/// whatever was pending.
#[derive(Clone, Debug)]
pub struct DelayedTask<T> {
    pending: Option<(f64, T)>,
}

impl<T> Default for DelayedTask<T> {
    fn default() -> Self {
        Self { pending: None }
    }
}

impl<T> DelayedTask<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules `payload` to fire `delay` seconds after `now`, returning the
    /// payload it displaced.
    pub fn schedule(&mut self, now: f64, delay: f64, payload: T) -> Option<T> {
        self.pending
            .replace((now + delay.max(0.0), payload))
            .map(|(_, previous)| previous)
    }

    pub fn cancel(&mut self) -> Option<T> {
        self.pending.take().map(|(_, payload)| payload)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn deadline(&self) -> Option<f64> {
        self.pending.as_ref().map(|(deadline, _)| *deadline)
    }

    pub fn payload(&self) -> Option<&T> {
        self.pending.as_ref().map(|(_, payload)| payload)
    }

    /// Takes the payload once its deadline has passed.
    pub fn poll(&mut self, now: f64) -> Option<T> {
        match self.pending {
            Some((deadline, _)) if now >= deadline => self.cancel(),
            _ => None,
        }
    }
}

/// Collapses a burst of triggers into one, fired `delay` seconds after the
/// last trigger.
#[derive(Clone, Debug)]
pub struct Debounce<T> {
    delay: f64,
    task: DelayedTask<T>,
}

impl<T> Debounce<T> {
    pub fn new(delay: f64) -> Self {
        Self {
            delay,
            task: DelayedTask::new(),
        }
    }

    pub fn trigger(&mut self, now: f64, value: T) {
        self.task.schedule(now, self.delay, value);
    }

    pub fn poll(&mut self, now: f64) -> Option<T> {
        self.task.poll(now)
    }

    pub fn deadline(&self) -> Option<f64> {
        self.task.deadline()
    }

    /// The value waiting to fire.
    pub fn pending(&self) -> Option<&T> {
        self.task.payload()
    }

    pub fn cancel(&mut self) {
        self.task.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_fires_once_after_deadline() {
        let mut task = DelayedTask::new();
        task.schedule(1.0, 0.35, 'x');

        assert_eq!(task.poll(1.2), None);
        assert_eq!(task.deadline(), Some(1.35));
        assert_eq!(task.poll(1.35), Some('x'));
        assert_eq!(task.poll(5.0), None);
    }

    #[test]
    fn rescheduling_replaces_pending_payload() {
        let mut task = DelayedTask::new();
        assert_eq!(task.schedule(0.0, 1.0, 1), None);
        assert_eq!(task.schedule(0.5, 1.0, 2), Some(1));
        assert_eq!(task.poll(1.2), None);
        assert_eq!(task.poll(1.5), Some(2));
    }

    #[test]
    fn cancel_clears_pending_payload() {
        let mut task = DelayedTask::new();
        task.schedule(0.0, 0.1, "scroll");
        assert_eq!(task.cancel(), Some("scroll"));
        assert!(!task.is_pending());
        assert_eq!(task.poll(10.0), None);
    }

    #[test]
    fn debounce_waits_for_quiet_period() {
        let mut resize = Debounce::new(0.2);
        resize.trigger(0.0, (800.0, 600.0));
        resize.trigger(0.1, (820.0, 600.0));
        resize.trigger(0.25, (840.0, 610.0));

        assert_eq!(resize.pending(), Some(&(840.0, 610.0)));
        assert_eq!(resize.poll(0.3), None);
        assert_eq!(resize.poll(0.5), Some((840.0, 610.0)));
        assert_eq!(resize.pending(), None);
        assert_eq!(resize.deadline(), None);
    }
}
