//! Catch-up tracking for read-only backup replicas.
//!
//! A [`ClusterBackup`] does not vote.  It periodically queries the cluster
//! for the current leader and log extent, replays the gap through the
//! archive collaborator, then live-tails the leader's recording and
//! publishes progress through a pollable counter.

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

use log::debug;

use crate::constant::*;
use crate::counters::{Counter, ReadableCounter};
use crate::error::Error;
use crate::events::{ClusterEvent, EventSink};
use crate::member::ClusterMember;
use crate::session::check_encoded_membership_query_length;

/// The options for running a backup replica.
#[derive(Debug, Clone)]
pub struct BackupOptions {
    /// The interval between cluster backup queries while waiting for a
    /// response.
    ///
    /// default: 60s
    pub backup_query_interval_ms: i64,

    /// How long replay or live-tailing may stall before falling back to a
    /// fresh backup query.
    ///
    /// default: 10s
    pub backup_progress_timeout_ms: i64,
}

impl Default for BackupOptions {
    fn default() -> BackupOptions {
        BackupOptions {
            backup_query_interval_ms: 60_000,
            backup_progress_timeout_ms: 10_000,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BackupState {
    BackupQuery,
    SnapshotRetrieve,
    LiveLogReplay,
    UpdateRecordingLog,
    BackingUp,
    Closed,
}

impl std::fmt::Display for BackupState {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// The archive seam a backup replica drives its catch-up through.  All
/// methods are polled from the duty cycle and never block.
pub trait BackupArchive {
    /// Begin retrieving the latest snapshot for the leader's recording.
    fn retrieve_latest_snapshot(&mut self, log_recording_id: i64);

    /// The base log position of the retrieved snapshot once retrieval has
    /// finished, `None` while still in progress.
    fn poll_snapshot_retrieved(&mut self) -> Option<i64>;

    /// Begin replaying `[from_position, to_position)` of the leader's
    /// recording into the local recording.
    fn start_log_replay(&mut self, log_recording_id: i64, from_position: i64, to_position: i64);

    /// The local replay position, advancing toward the replay target.
    fn replay_position(&mut self) -> i64;

    /// Fold the retrieved terms into the local recording log, returning
    /// whether the update has completed.
    fn update_recording_log(&mut self, log_recording_id: i64, leader_log_position: i64) -> bool;

    /// The locally recorded position of the live-tailed leader log.
    fn recorded_position(&mut self, log_recording_id: i64) -> i64;
}

pub struct ClusterBackup {
    options: BackupOptions,
    state: BackupState,
    members: Vec<ClusterMember>,
    leader_member_id: i32,
    log_recording_id: i64,
    leader_log_position: i64,
    local_log_position: i64,
    encoded_credentials: Vec<u8>,

    replay_started: bool,
    snapshot_requested: bool,
    time_of_last_progress_ms: i64,

    live_log_position: Counter,
    next_query_deadline_ms: Counter,
    event_sink: EventSink,
}

impl ClusterBackup {
    /// `local_log_position` is the recorded extent already on disk, or
    /// `NULL_POSITION` for a fresh replica.  `next_query_deadline_ms` is
    /// re-seeded from its persisted value so restarting the querying loop
    /// does not trigger a query storm.
    pub fn new(
        local_log_position: i64,
        next_query_deadline_ms: i64,
        encoded_credentials: Option<&[u8]>,
        options: BackupOptions,
        event_sink: EventSink,
    ) -> Result<ClusterBackup, Error> {
        if let Some(credentials) = encoded_credentials {
            check_encoded_membership_query_length(credentials)?;
        }

        Ok(ClusterBackup {
            options,
            state: BackupState::BackupQuery,
            members: Vec::new(),
            leader_member_id: NULL_MEMBER_ID,
            log_recording_id: NULL_VALUE,
            leader_log_position: NULL_POSITION,
            local_log_position,
            encoded_credentials: encoded_credentials.map(<[u8]>::to_vec).unwrap_or_default(),
            replay_started: false,
            snapshot_requested: false,
            time_of_last_progress_ms: 0,
            live_log_position: Counter::new(local_log_position),
            next_query_deadline_ms: Counter::new(next_query_deadline_ms),
            event_sink,
        })
    }

    pub fn state(&self) -> BackupState {
        self.state
    }

    pub fn members(&self) -> &[ClusterMember] {
        &self.members
    }

    pub fn leader_member_id(&self) -> i32 {
        self.leader_member_id
    }

    /// Credentials attached to each backup query.
    pub fn query_credentials(&self) -> &[u8] {
        &self.encoded_credentials
    }

    /// Progress observable: the replica's view of the live log position.
    /// Never moves backwards.
    pub fn live_log_position(&self) -> ReadableCounter {
        self.live_log_position.reader()
    }

    pub fn next_query_deadline_ms(&self) -> i64 {
        self.next_query_deadline_ms.get()
    }

    /// Force the next duty cycle in `BackupQuery` to issue a query
    /// immediately.
    pub fn reset_next_query_deadline(&mut self, now_ms: i64) {
        self.next_query_deadline_ms.set(now_ms);
    }

    pub fn close(&mut self) {
        self.live_log_position.close();
        self.next_query_deadline_ms.close();
        self.transition(BackupState::Closed);
    }

    /// Advance the state machine.  Returns the count of work items done;
    /// in `BackupQuery` a non-zero return tells the caller to issue a
    /// backup query to the cluster.
    pub fn do_work(&mut self, now_ms: i64, archive: &mut dyn BackupArchive) -> u32 {
        match self.state {
            BackupState::BackupQuery => self.backup_query(now_ms),
            BackupState::SnapshotRetrieve => self.snapshot_retrieve(now_ms, archive),
            BackupState::LiveLogReplay => self.live_log_replay(now_ms, archive),
            BackupState::UpdateRecordingLog => self.update_recording_log(now_ms, archive),
            BackupState::BackingUp => self.backing_up(now_ms, archive),
            BackupState::Closed => 0,
        }
    }

    /// Handle the response to a backup query.  Ignored outside
    /// `BackupQuery`; a malformed member descriptor fails the response.
    pub fn on_backup_response(
        &mut self,
        leader_member_id: i32,
        log_recording_id: i64,
        leader_log_position: i64,
        members_descriptor: &str,
    ) -> Result<(), Error> {
        if BackupState::BackupQuery != self.state {
            return Ok(());
        }

        let members = ClusterMember::parse(members_descriptor)?;
        if !members.iter().any(|m| m.id == leader_member_id) {
            return Err(Error::InvalidMemberId(leader_member_id));
        }

        self.members = members;
        self.leader_member_id = leader_member_id;
        self.log_recording_id = log_recording_id;
        self.leader_log_position = leader_log_position;
        self.replay_started = false;
        self.snapshot_requested = false;

        if self.local_log_position == NULL_POSITION {
            self.transition(BackupState::SnapshotRetrieve);
        } else if self.local_log_position >= leader_log_position {
            self.transition(BackupState::UpdateRecordingLog);
        } else {
            self.transition(BackupState::LiveLogReplay);
        }

        Ok(())
    }

    fn backup_query(&mut self, now_ms: i64) -> u32 {
        if now_ms >= self.next_query_deadline_ms.get() {
            self.next_query_deadline_ms
                .set(now_ms + self.options.backup_query_interval_ms);
            debug!("backup query due, next deadline {}", self.next_query_deadline_ms.get());
            return 1;
        }
        0
    }

    fn snapshot_retrieve(&mut self, now_ms: i64, archive: &mut dyn BackupArchive) -> u32 {
        if !self.snapshot_requested {
            self.snapshot_requested = true;
            self.time_of_last_progress_ms = now_ms;
            archive.retrieve_latest_snapshot(self.log_recording_id);
            return 1;
        }

        if let Some(snapshot_position) = archive.poll_snapshot_retrieved() {
            self.local_log_position = snapshot_position;
            self.live_log_position.propose_max(snapshot_position);
            if self.local_log_position >= self.leader_log_position {
                self.transition(BackupState::UpdateRecordingLog);
            } else {
                self.transition(BackupState::LiveLogReplay);
            }
            return 1;
        }

        self.check_progress(now_ms)
    }

    fn live_log_replay(&mut self, now_ms: i64, archive: &mut dyn BackupArchive) -> u32 {
        if !self.replay_started {
            self.replay_started = true;
            self.time_of_last_progress_ms = now_ms;
            archive.start_log_replay(
                self.log_recording_id,
                std::cmp::max(self.local_log_position, 0),
                self.leader_log_position,
            );
            return 1;
        }

        let replay_position = archive.replay_position();
        if self.live_log_position.propose_max(replay_position) {
            self.time_of_last_progress_ms = now_ms;
            self.local_log_position = replay_position;
            if replay_position >= self.leader_log_position {
                self.transition(BackupState::UpdateRecordingLog);
            }
            return 1;
        }

        self.check_progress(now_ms)
    }

    fn update_recording_log(&mut self, now_ms: i64, archive: &mut dyn BackupArchive) -> u32 {
        if archive.update_recording_log(self.log_recording_id, self.leader_log_position) {
            self.time_of_last_progress_ms = now_ms;
            self.transition(BackupState::BackingUp);
            return 1;
        }
        self.check_progress(now_ms)
    }

    fn backing_up(&mut self, now_ms: i64, archive: &mut dyn BackupArchive) -> u32 {
        let recorded_position = archive.recorded_position(self.log_recording_id);
        if self.live_log_position.propose_max(recorded_position) {
            self.time_of_last_progress_ms = now_ms;
            self.local_log_position = recorded_position;
            return 1;
        }

        self.check_progress(now_ms)
    }

    /// Fall back to a fresh backup query when the archive has stalled,
    /// forcing the query out on the next duty cycle.
    fn check_progress(&mut self, now_ms: i64) -> u32 {
        if now_ms >= self.time_of_last_progress_ms + self.options.backup_progress_timeout_ms {
            self.next_query_deadline_ms.set(now_ms);
            self.transition(BackupState::BackupQuery);
            return 1;
        }
        0
    }

    fn transition(&mut self, next: BackupState) {
        if next == self.state {
            return;
        }

        self.event_sink.log_state_change(
            ClusterEvent::BackupStateChange,
            &format!("{}", self.state),
            &format!("{}", next),
        );
        debug!(
            "backup {} -> {} leader {} recording {} position {}",
            self.state, next, self.leader_member_id, self.log_recording_id, self.leader_log_position
        );
        self.state = next;
    }
}
