//! Reference [`Blocker`]: parks futures-based tasks on a `poll(2)` loop.

use std::{
    collections::HashMap,
    fmt,
    io::Result,
    os::fd::RawFd,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    task::Poll,
    time::{Duration, Instant},
};

use crate::{
    poller::{PollEvent, UnixPoller},
    task::{self, TaskHandle},
    timewheel::TimeWheel,
    Blocker, Direction,
};

#[derive(Debug)]
struct Waiter {
    task: Option<TaskHandle>,
    generation: u64,
    has_deadline: bool,
}

#[derive(Debug)]
struct Waiters {
    read_ops: HashMap<RawFd, Vec<Waiter>>,
    write_ops: HashMap<RawFd, Vec<Waiter>>,
    time_wheel: TimeWheel<(RawFd, Direction, u64)>,
    /// Waiters still parked with a deadline.
    deadlines: usize,
    generation: u64,
    last_tick: Instant,
}

impl Waiters {
    fn new(steps: u64) -> Self {
        Self {
            read_ops: Default::default(),
            write_ops: Default::default(),
            time_wheel: TimeWheel::new(steps),
            deadlines: 0,
            generation: 0,
            last_tick: Instant::now(),
        }
    }

    fn ops(&mut self, direction: Direction) -> &mut HashMap<RawFd, Vec<Waiter>> {
        match direction {
            Direction::Read => &mut self.read_ops,
            Direction::Write => &mut self.write_ops,
        }
    }

    fn append(&mut self, fd: RawFd, direction: Direction, task: Option<TaskHandle>, ticks: Option<u64>) {
        self.generation += 1;

        let generation = self.generation;

        self.ops(direction)
            .entry(fd)
            .or_default()
            .push(Waiter {
                task,
                generation,
                has_deadline: ticks.is_some(),
            });

        if let Some(ticks) = ticks {
            self.deadlines += 1;

            // Nothing pending on the wheel, so no ticks are owed to it.
            if self.time_wheel.is_empty() {
                self.last_tick = Instant::now();
            }

            self.time_wheel.add(ticks, (fd, direction, generation));
        }
    }

    fn to_poll_events(&self) -> Vec<PollEvent> {
        let mut poll_events = vec![];

        for fd in self.read_ops.keys() {
            poll_events.push(PollEvent::Readable(*fd));
        }

        for fd in self.write_ops.keys() {
            poll_events.push(PollEvent::Writable(*fd));
        }

        poll_events
    }

    fn remove_fired(&mut self, events: &[PollEvent]) -> Vec<Waiter> {
        let mut fired = vec![];

        for event in events {
            let removed = match event {
                PollEvent::Readable(fd) => self.read_ops.remove(fd),
                PollEvent::Writable(fd) => self.write_ops.remove(fd),
            };

            fired.extend(removed.into_iter().flatten());
        }

        self.forget_deadlines(&fired);

        fired
    }

    /// Account for waiters leaving; once no deadline is live, the entries
    /// still on the wheel belong to woken waiters and are dropped.
    fn forget_deadlines(&mut self, removed: &[Waiter]) {
        self.deadlines -= removed.iter().filter(|w| w.has_deadline).count();

        if self.deadlines == 0 && !self.time_wheel.is_empty() {
            log::trace!(target:"green_reactor", "drop stale deadlines");
            self.time_wheel.clear();
        }
    }

    fn has_deadlines(&self) -> bool {
        self.deadlines > 0
    }

    fn remove_expired(&mut self, tick_duration: Duration) -> Vec<Waiter> {
        let elapsed = self.last_tick.elapsed();

        let steps = (elapsed.as_nanos() / tick_duration.as_nanos()) as u64;

        self.last_tick += Duration::from_nanos((steps as u128 * tick_duration.as_nanos()) as u64);

        let mut expired = vec![];

        for _ in 0..steps {
            if self.time_wheel.is_empty() {
                break;
            }

            if let Poll::Ready(keys) = self.time_wheel.tick() {
                for (fd, direction, generation) in keys {
                    let ops = self.ops(direction);

                    // Already woken by readiness if missing.
                    if let Some(waiters) = ops.get_mut(&fd) {
                        if let Some(index) = waiters.iter().position(|w| w.generation == generation) {
                            expired.push(waiters.remove(index));
                        }

                        if waiters.is_empty() {
                            ops.remove(&fd);
                        }
                    }
                }
            }
        }

        self.forget_deadlines(&expired);

        expired
    }

    fn len(&self) -> usize {
        self.read_ops.values().map(Vec::len).sum::<usize>()
            + self.write_ops.values().map(Vec::len).sum::<usize>()
    }
}

/// `poll(2)` based scheduler bridge.
///
/// Each suspension registers the current [`TaskHandle`] under its descriptor
/// and direction. [`poll_once`](Self::poll_once) wakes the tasks whose
/// descriptor became ready and expires those whose deadline passed.
/// Several tasks may wait on the same descriptor and direction; all of them
/// are woken together.
#[derive(Clone)]
pub struct PollReactor {
    poller: UnixPoller,
    waiters: Arc<Mutex<Waiters>>,
    tick_duration: Duration,
}

impl Default for PollReactor {
    fn default() -> Self {
        Self::new(Duration::from_millis(10), 1024)
    }
}

impl fmt::Debug for PollReactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PollReactor")
            .field("waiters", &self.waiters())
            .field("tick_duration", &self.tick_duration)
            .finish()
    }
}

impl PollReactor {
    /// Create a reactor whose deadlines have `tick_duration` resolution,
    /// using a time wheel with `steps` slots.
    pub fn new(tick_duration: Duration, steps: u64) -> Self {
        Self {
            poller: UnixPoller::new(),
            waiters: Arc::new(Mutex::new(Waiters::new(steps))),
            tick_duration: tick_duration.max(Duration::from_millis(1)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Waiters> {
        self.waiters.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wait up to `timeout` for registered descriptors, then wake ready and
    /// expired tasks. Returns the number of suspensions resolved.
    pub fn poll_once(&self, timeout: Duration) -> Result<usize> {
        let (events, has_deadlines) = {
            let waiters = self.lock();

            (waiters.to_poll_events(), waiters.has_deadlines())
        };

        // Deadlines are only checked between polls.
        let timeout = if has_deadlines {
            timeout.min(self.tick_duration)
        } else {
            timeout
        };

        let fired = self.poller.poll_once(&events, timeout)?;

        let (ready, expired) = {
            let mut waiters = self.lock();

            let ready = waiters.remove_fired(&fired);

            let expired = waiters.remove_expired(self.tick_duration);

            (ready, expired)
        };

        let resolved = ready.len() + expired.len();

        for task in ready.iter().filter_map(|w| w.task.as_ref()) {
            task.wake();
        }

        for task in expired.iter().filter_map(|w| w.task.as_ref()) {
            task.expire();
        }

        log::trace!(target:"green_reactor", "poll_once ready({}) expired({})", ready.len(), expired.len());

        Ok(resolved)
    }

    /// Get the count of pending suspensions.
    pub fn waiters(&self) -> usize {
        self.lock().len()
    }

    fn park(&self, fd: RawFd, direction: Direction, timeout: Option<Duration>) {
        let task = task::current();

        if task.is_none() {
            log::warn!(target:"green_reactor", "fd({}) wait {} outside of a task, nothing to wake", fd, direction);
        }

        let ticks = timeout.map(|timeout| {
            let tick = self.tick_duration.as_nanos();

            ((timeout.as_nanos() + tick - 1) / tick) as u64
        });

        self.lock().append(fd, direction, task, ticks);
    }
}

impl Blocker for PollReactor {
    fn wait_readable(&self, fd: RawFd, timeout: Option<Duration>) {
        self.park(fd, Direction::Read, timeout)
    }

    fn wait_writable(&self, fd: RawFd, timeout: Option<Duration>) {
        self.park(fd, Direction::Write, timeout)
    }
}
