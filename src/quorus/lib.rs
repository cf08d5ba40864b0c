//! # quorus
//!
//! `quorus` is the coordination core of a clustered replicated state
//! machine: quorum leader election in the raft family plus the lifecycle
//! of client sessions tracked by the elected leader.
//!
//! The crate deliberately stops at the state machines.  Byte-level log
//! storage, the wire transport and its codecs, authentication credential
//! exchange and archive catch-up mechanics are all external collaborators
//! reached through capability traits, so every piece here is drivable from
//! a single-threaded duty cycle and testable with plain mock objects:
//!
//! - [`Election`] canvasses peer positions, runs candidate/follower
//!   ballots, commits leadership terms and synchronizes log replay after a
//!   win, driven by `do_work(now_ns)` and decoded [`StatusMessage`]s.
//! - [`ClusterSession`] tracks one client on the leader, from connect
//!   through challenge/authentication to open, rejection or close.
//! - [`ClusterBackup`] lets a read-only replica chase the leader's live
//!   log position and publishes its progress through a pollable counter.
//!
//! All of it is single-threaded by design; shared observability goes
//! through [`Counter`]/[`ReadableCounter`] rather than atomics or locks.

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

extern crate chrono;
extern crate log;
extern crate rand;
extern crate serde;
extern crate thiserror;

mod backup;
mod election;
mod error;
mod member;
mod session;

pub mod constant;
pub mod counters;
pub mod events;
pub mod transport;
pub mod types;

pub use crate::backup::{BackupArchive, BackupOptions, BackupState, ClusterBackup};
pub use crate::counters::{Counter, ReadableCounter};
pub use crate::election::{
    Clients, ConsensusAgent, Election, ElectionOptions, ElectionState, RecordingLog,
    StatusPublisher,
};
pub use crate::error::Error;
pub use crate::events::{ClusterEvent, EventSink};
pub use crate::member::{member_index_by_id, ClusterMember};
pub use crate::session::{
    check_encoded_membership_query_length, check_encoded_principal_length, ClusterSession,
    SessionState,
};
pub use crate::types::{CloseReason, EventCode, Role, StatusMessage};
