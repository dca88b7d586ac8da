//! Hashed time wheel for suspension deadlines.

use std::collections::HashMap;
use std::task::Poll;

#[derive(Debug)]
struct Slot<T> {
    round: u64,
    value: T,
}

#[derive(Debug)]
pub(crate) struct TimeWheel<T> {
    hashed: HashMap<u64, Vec<Slot<T>>>,
    steps: u64,
    tick: u64,
    len: usize,
}

impl<T> TimeWheel<T> {
    // create new hashed time wheel instance with `steps` slots
    pub fn new(steps: u64) -> Self {
        TimeWheel {
            steps: steps.max(1),
            hashed: HashMap::new(),
            tick: 0,
            len: 0,
        }
    }

    /// Schedule `value` to fire on the `ticks`-th call to [`tick`](Self::tick) from now.
    pub fn add(&mut self, ticks: u64, value: T) {
        let ticks = ticks.max(1);

        let slot = (self.tick + ticks - 1) % self.steps;
        let round = (ticks - 1) / self.steps;

        log::trace!(
            "add timeout({}) to slot({}) with round({}), current tick is {}",
            ticks,
            slot,
            round,
            self.tick
        );

        self.hashed
            .entry(slot)
            .or_default()
            .push(Slot { value, round });

        self.len += 1;
    }

    /// Advance one tick, returning the values that fired.
    pub fn tick(&mut self) -> Poll<Vec<T>> {
        let step = self.tick % self.steps;

        self.tick += 1;

        let slots = match self.hashed.remove(&step) {
            Some(slots) => slots,
            None => return Poll::Pending,
        };

        let mut fired = vec![];
        let mut reserved = vec![];

        for slot in slots {
            if slot.round == 0 {
                fired.push(slot.value);
            } else {
                reserved.push(Slot {
                    value: slot.value,
                    round: slot.round - 1,
                });
            }
        }

        if !reserved.is_empty() {
            self.hashed.insert(step, reserved);
        }

        self.len -= fired.len();

        if fired.is_empty() {
            Poll::Pending
        } else {
            Poll::Ready(fired)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Drop every pending value.
    pub fn clear(&mut self) {
        self.hashed.clear();
        self.len = 0;
    }
}
