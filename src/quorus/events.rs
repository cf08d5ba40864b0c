//! The event/audit sink.
//!
//! A single [`EventSink`] is constructed by process startup with the set of
//! enabled event codes and handed to the components that report events.
//! The enabled mask is fixed at construction and never mutated afterwards,
//! so the sink can be shared freely on the duty-cycle thread.

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

use chrono::prelude::*;
use log::info;

/// Observable cluster events, each mapping to one bit of the enabled mask.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ClusterEvent {
    StateChange = 0,
    RoleChange = 1,
    CanvassPosition = 2,
    RequestVote = 3,
    NewLeadershipTerm = 4,
    AppendedPosition = 5,
    SessionOpen = 6,
    SessionClose = 7,
    SessionReject = 8,
    BackupStateChange = 9,
}

impl ClusterEvent {
    pub fn mask_bit(self) -> u64 {
        1u64 << (self as u64)
    }

    /// A mask with every event enabled.
    pub fn all() -> u64 {
        (ClusterEvent::BackupStateChange.mask_bit() << 1) - 1
    }
}

#[derive(Debug)]
pub struct EventSink {
    member_id: i32,
    enabled_mask: u64,
}

impl EventSink {
    pub fn new(member_id: i32, enabled_mask: u64) -> EventSink {
        EventSink {
            member_id,
            enabled_mask,
        }
    }

    /// A sink which drops everything.
    pub fn disabled(member_id: i32) -> EventSink {
        EventSink::new(member_id, 0)
    }

    pub fn is_enabled(&self, event: ClusterEvent) -> bool {
        self.enabled_mask & event.mask_bit() != 0
    }

    pub fn log_state_change(&self, event: ClusterEvent, from: &str, to: &str) {
        if self.is_enabled(event) {
            info!(
                "{} member {} {:?}: {} -> {}",
                Local::now().to_rfc3339(),
                self.member_id,
                event,
                from,
                to
            );
        }
    }

    pub fn log_event(&self, event: ClusterEvent, detail: std::fmt::Arguments) {
        if self.is_enabled(event) {
            info!(
                "{} member {} {:?}: {}",
                Local::now().to_rfc3339(),
                self.member_id,
                event,
                detail
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_controls_enablement() {
        let sink = EventSink::new(
            1,
            ClusterEvent::StateChange.mask_bit() | ClusterEvent::SessionOpen.mask_bit(),
        );
        assert_eq!(sink.is_enabled(ClusterEvent::StateChange), true);
        assert_eq!(sink.is_enabled(ClusterEvent::SessionOpen), true);
        assert_eq!(sink.is_enabled(ClusterEvent::RequestVote), false);

        let all = EventSink::new(1, ClusterEvent::all());
        assert_eq!(all.is_enabled(ClusterEvent::BackupStateChange), true);

        let none = EventSink::disabled(1);
        assert_eq!(none.is_enabled(ClusterEvent::StateChange), false);
    }
}
