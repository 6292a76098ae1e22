use std::time::{Duration, Instant};

/// Named timers owned by the game session. Each is independently
/// cancellable; firing order within a tick is fixed to the enum order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    /// 1-second countdown of the session clock.
    Countdown,
    /// 1-second rival advance (multiplayer only).
    Rival,
    /// One-shot coasting decay, re-armed after every speed change.
    Decay,
}

const TASKS: [Task; 3] = [Task::Countdown, Task::Rival, Task::Decay];

#[derive(Debug, Clone, Copy)]
struct Entry {
    due: Instant,
    every: Option<Duration>,
}

/// Cooperative scheduler polled from the app tick. All state mutation
/// stays on the polling thread, so no locking is needed.
#[derive(Debug, Default)]
pub struct Scheduler {
    entries: [Option<Entry>; 3],
}

fn slot(task: Task) -> usize {
    match task {
        Task::Countdown => 0,
        Task::Rival => 1,
        Task::Decay => 2,
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a one-shot task. Re-arming an already scheduled task replaces
    /// its deadline.
    pub fn schedule(&mut self, task: Task, delay: Duration, now: Instant) {
        self.entries[slot(task)] = Some(Entry {
            due: now + delay,
            every: None,
        });
    }

    /// Arm a task that re-fires at a fixed interval until cancelled.
    pub fn schedule_repeating(&mut self, task: Task, every: Duration, now: Instant) {
        self.entries[slot(task)] = Some(Entry {
            due: now + every,
            every: Some(every),
        });
    }

    pub fn cancel(&mut self, task: Task) {
        self.entries[slot(task)] = None;
    }

    pub fn cancel_all(&mut self) {
        self.entries = [None; 3];
    }

    pub fn is_scheduled(&self, task: Task) -> bool {
        self.entries[slot(task)].is_some()
    }

    /// Collect every firing due at `now`, in task order. A repeating task
    /// that fell behind fires once per missed interval so ticks are never
    /// silently dropped; one-shot tasks are disarmed after firing.
    pub fn fire(&mut self, now: Instant) -> Vec<Task> {
        let mut fired = Vec::new();
        for task in TASKS {
            let idx = slot(task);
            let Some(entry) = self.entries[idx].as_mut() else {
                continue;
            };
            match entry.every {
                Some(every) => {
                    while entry.due <= now {
                        entry.due += every;
                        fired.push(task);
                    }
                }
                None => {
                    if entry.due <= now {
                        self.entries[idx] = None;
                        fired.push(task);
                    }
                }
            }
        }
        fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_shot_fires_once() {
        let now = Instant::now();
        let mut s = Scheduler::new();
        s.schedule(Task::Decay, Duration::from_secs(1), now);

        assert!(s.fire(now).is_empty());
        let later = now + Duration::from_secs(1);
        assert_eq!(s.fire(later), vec![Task::Decay]);
        assert!(!s.is_scheduled(Task::Decay));
        assert!(s.fire(later + Duration::from_secs(5)).is_empty());
    }

    #[test]
    fn test_repeating_fires_every_interval() {
        let now = Instant::now();
        let mut s = Scheduler::new();
        s.schedule_repeating(Task::Countdown, Duration::from_secs(1), now);

        assert!(s.fire(now + Duration::from_millis(900)).is_empty());
        assert_eq!(
            s.fire(now + Duration::from_millis(1100)),
            vec![Task::Countdown]
        );
        assert_eq!(
            s.fire(now + Duration::from_millis(2100)),
            vec![Task::Countdown]
        );
        assert!(s.is_scheduled(Task::Countdown));
    }

    #[test]
    fn test_repeating_catches_up_after_a_stall() {
        let now = Instant::now();
        let mut s = Scheduler::new();
        s.schedule_repeating(Task::Rival, Duration::from_secs(1), now);

        // Polled 3.5s late: three intervals elapsed, three firings
        let fired = s.fire(now + Duration::from_millis(3500));
        assert_eq!(fired, vec![Task::Rival, Task::Rival, Task::Rival]);
    }

    #[test]
    fn test_rearm_replaces_deadline() {
        let now = Instant::now();
        let mut s = Scheduler::new();
        s.schedule(Task::Decay, Duration::from_secs(1), now);
        // Re-armed 500ms in; the old deadline no longer applies
        s.schedule(
            Task::Decay,
            Duration::from_secs(1),
            now + Duration::from_millis(500),
        );

        assert!(s.fire(now + Duration::from_millis(1100)).is_empty());
        assert_eq!(s.fire(now + Duration::from_millis(1500)), vec![Task::Decay]);
    }

    #[test]
    fn test_cancel_and_cancel_all() {
        let now = Instant::now();
        let mut s = Scheduler::new();
        s.schedule_repeating(Task::Countdown, Duration::from_secs(1), now);
        s.schedule_repeating(Task::Rival, Duration::from_secs(1), now);
        s.schedule(Task::Decay, Duration::from_secs(1), now);

        s.cancel(Task::Rival);
        assert!(s.is_scheduled(Task::Countdown));
        assert!(!s.is_scheduled(Task::Rival));

        s.cancel_all();
        assert!(s.fire(now + Duration::from_secs(10)).is_empty());
    }

    #[test]
    fn test_fixed_firing_order() {
        let now = Instant::now();
        let mut s = Scheduler::new();
        s.schedule(Task::Decay, Duration::from_secs(1), now);
        s.schedule_repeating(Task::Rival, Duration::from_secs(1), now);
        s.schedule_repeating(Task::Countdown, Duration::from_secs(1), now);

        let fired = s.fire(now + Duration::from_secs(1));
        assert_eq!(fired, vec![Task::Countdown, Task::Rival, Task::Decay]);
    }
}
