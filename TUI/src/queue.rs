//! Paced display of incoming thought and status lines.
//!
//! Lines can arrive in bursts; they are handed to the view one at a time with
//! a fixed gap between them, in arrival order. The queue is driven by the main
//! loop's tick: [`AnimationQueue::poll`] releases an item only when the drain
//! is due, so nothing here owns a timer that could outlive a reset.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThoughtItem {
    pub text: String,
    pub is_status: bool,
}

impl ThoughtItem {
    pub fn thought(text: impl Into<String>) -> Self {
        Self { text: text.into(), is_status: false }
    }

    pub fn status(text: impl Into<String>) -> Self {
        Self { text: text.into(), is_status: true }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Drain {
    Idle,
    /// The next item may be released at this instant.
    Due(Instant),
}

#[derive(Debug)]
pub struct AnimationQueue {
    items: VecDeque<ThoughtItem>,
    drain: Drain,
    delay: Duration,
}

impl AnimationQueue {
    pub fn new(delay: Duration) -> Self {
        Self {
            items: VecDeque::new(),
            drain: Drain::Idle,
            delay,
        }
    }

    /// Append an item. An idle drain restarts right away.
    pub fn enqueue(&mut self, item: ThoughtItem, now: Instant) {
        self.items.push_back(item);
        if self.drain == Drain::Idle {
            self.drain = Drain::Due(now);
        }
    }

    /// Release the next item if the drain is due.
    pub fn poll(&mut self, now: Instant) -> Option<ThoughtItem> {
        let Drain::Due(at) = self.drain else {
            return None;
        };
        if now < at {
            return None;
        }

        match self.items.pop_front() {
            Some(item) => {
                self.drain = Drain::Due(now + self.delay);
                Some(item)
            }
            None => {
                self.drain = Drain::Idle;
                None
            }
        }
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.drain = Drain::Idle;
    }

    pub fn is_idle(&self) -> bool {
        self.drain == Drain::Idle
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
