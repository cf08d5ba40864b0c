//! Single-threaded observable counters.
//!
//! The whole election and session machinery runs on one duty-cycle thread,
//! so counters are plain `Rc<Cell<i64>>` pairs: the owning component keeps
//! the [`Counter`] and mutates it, observers poll through a
//! [`ReadableCounter`] between ticks.

// Copyright 2021 The quorus Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::cell::Cell;
use std::rc::Rc;

use crate::constant::NULL_VALUE;

#[derive(Debug)]
struct Slot {
    value: Cell<i64>,
    closed: Cell<bool>,
}

/// The owner side of a counter.  Updates after `close()` are no-ops.
#[derive(Debug, Clone)]
pub struct Counter {
    slot: Rc<Slot>,
}

impl Counter {
    pub fn new(initial: i64) -> Counter {
        Counter {
            slot: Rc::new(Slot {
                value: Cell::new(initial),
                closed: Cell::new(false),
            }),
        }
    }

    pub fn get(&self) -> i64 {
        self.slot.value.get()
    }

    pub fn set(&self, value: i64) {
        if !self.slot.closed.get() {
            self.slot.value.set(value);
        }
    }

    pub fn increment(&self) -> i64 {
        let next = self.slot.value.get() + 1;
        self.set(next);
        next
    }

    /// Advance the counter, never moving it backwards.
    pub fn propose_max(&self, value: i64) -> bool {
        if value > self.slot.value.get() {
            self.set(value);
            true
        } else {
            false
        }
    }

    pub fn close(&self) {
        self.slot.closed.set(true);
    }

    pub fn is_closed(&self) -> bool {
        self.slot.closed.get()
    }

    pub fn reader(&self) -> ReadableCounter {
        ReadableCounter {
            slot: Rc::clone(&self.slot),
        }
    }
}

impl Default for Counter {
    fn default() -> Counter {
        Counter::new(NULL_VALUE)
    }
}

/// The observer side of a counter.
#[derive(Debug, Clone)]
pub struct ReadableCounter {
    slot: Rc<Slot>,
}

impl ReadableCounter {
    pub fn get(&self) -> i64 {
        self.slot.value.get()
    }

    pub fn is_closed(&self) -> bool {
        self.slot.closed.get()
    }
}
