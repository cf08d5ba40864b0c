//! The leader-election and leadership-transition state machine.
//!
//! An [`Election`] consumes decoded peer status messages and a periodic
//! `do_work(now_ns)` tick, and drives the member through canvassing,
//! nomination, balloting and post-election log-replay synchronization.
//! Durable term records and application role changes go through the
//! consensus-agent collaborator; outbound peer traffic goes through the
//! status-publisher collaborator.  Everything runs on one duty-cycle
//! thread and never blocks.

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

use std::collections::HashMap;

use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::constant::*;
use crate::counters::Counter;
use crate::error::Error;
use crate::events::{ClusterEvent, EventSink};
use crate::member::{self, ClusterMember};
use crate::types::{Role, StatusMessage};

/// The options for running an election.
#[derive(Debug, Clone)]
pub struct ElectionOptions {
    /// How long a ballot may remain undecided before it is abandoned and
    /// canvassing restarts.
    ///
    /// default: 1s
    pub election_timeout_ns: i64,

    /// The interval at which a canvassing member re-broadcasts its
    /// position to the other members.
    ///
    /// default: 20ms
    pub election_status_interval_ns: i64,

    /// The interval at which an elected leader re-announces the new
    /// leadership term until every follower has acknowledged it.
    ///
    /// default: 200ms
    pub leader_heartbeat_interval_ns: i64,

    /// How long a ready follower waits for the surrounding machinery to
    /// confirm completion before it falls back to canvassing.
    ///
    /// default: 10s
    pub leader_heartbeat_timeout_ns: i64,

    /// How long a member canvasses on startup before bidding with only a
    /// quorum of reported positions.
    ///
    /// default: 60s
    pub startup_canvass_timeout_ns: i64,

    /// If set, only this member may bid for leadership, and it bids as
    /// soon as a quorum has canvassed rather than waiting out the canvass
    /// deadline.  It still requires a full ballot majority to win.
    pub appointed_leader_id: i32,

    /// Seed for the nomination backoff, so election timing is
    /// reproducible.
    pub random_seed: u64,
}

impl Default for ElectionOptions {
    fn default() -> ElectionOptions {
        ElectionOptions {
            election_timeout_ns: 1_000_000_000,
            election_status_interval_ns: 20_000_000,
            leader_heartbeat_interval_ns: 200_000_000,
            leader_heartbeat_timeout_ns: 10_000_000_000,
            startup_canvass_timeout_ns: 60_000_000_000,
            appointed_leader_id: NULL_MEMBER_ID,
            random_seed: 0,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ElectionState {
    Init,
    Canvass,
    Nominate,
    CandidateBallot,
    FollowerBallot,
    LeaderReplay,
    LeaderReady,
    FollowerReplay,
    FollowerReady,
    Closed,
}

impl ElectionState {
    pub fn code(self) -> i64 {
        match self {
            ElectionState::Init => 0,
            ElectionState::Canvass => 1,
            ElectionState::Nominate => 2,
            ElectionState::CandidateBallot => 3,
            ElectionState::FollowerBallot => 4,
            ElectionState::LeaderReplay => 5,
            ElectionState::LeaderReady => 6,
            ElectionState::FollowerReplay => 7,
            ElectionState::FollowerReady => 8,
            ElectionState::Closed => 9,
        }
    }
}

impl std::fmt::Display for ElectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// The consensus-agent seam: durable term records aside, everything the
/// election needs from the surrounding replication machinery.
pub trait ConsensusAgent {
    fn role(&self) -> Role;

    fn set_role(&mut self, role: Role);

    /// Step down and flush in-flight work so a new leader can be elected
    /// at `log_position`.
    fn prepare_for_new_leadership(&mut self, log_position: i64);

    fn log_recording_id(&self) -> i64;

    /// Open the new leadership term's log publication, returning its log
    /// session id.
    fn add_new_log_publication(&mut self) -> i32;

    fn become_leader(&mut self, leadership_term_id: i64, log_position: i64, log_session_id: i32);

    fn become_follower(
        &mut self,
        leadership_term_id: i64,
        log_position: i64,
        leader_member_id: i32,
        log_session_id: i32,
    );

    /// Subscribe to and record the announced leader log.
    fn follow_log(&mut self, log_session_id: i32);

    /// Has the local log replay reached `log_position`?  Polled once per
    /// tick, never awaited.
    fn has_replay_reached(&mut self, log_position: i64) -> bool;

    /// Has follower catch-up reached the announced live position?
    fn has_catchup_reached_live_position(&mut self, log_position: i64) -> bool;

    /// Does the surrounding machinery confirm the election is complete?
    fn election_complete(&mut self) -> bool;
}

/// Outbound member status traffic.  Each method returns whether the
/// message was accepted for sending.
pub trait StatusPublisher {
    fn canvass_position(
        &mut self,
        publication: crate::transport::PublicationHandle,
        leadership_term_id: i64,
        log_position: i64,
        follower_member_id: i32,
    ) -> bool;

    fn request_vote(
        &mut self,
        publication: crate::transport::PublicationHandle,
        leadership_term_id: i64,
        log_position: i64,
        candidate_term_id: i64,
        candidate_id: i32,
    ) -> bool;

    fn place_vote(
        &mut self,
        publication: crate::transport::PublicationHandle,
        candidate_term_id: i64,
        leadership_term_id: i64,
        log_position: i64,
        candidate_id: i32,
        follower_member_id: i32,
        vote: bool,
    ) -> bool;

    fn new_leadership_term(
        &mut self,
        publication: crate::transport::PublicationHandle,
        leadership_term_id: i64,
        candidate_term_id: i64,
        log_position: i64,
        timestamp_ms: i64,
        leader_member_id: i32,
        log_session_id: i32,
    ) -> bool;

    fn appended_position(
        &mut self,
        publication: crate::transport::PublicationHandle,
        leadership_term_id: i64,
        log_position: i64,
        member_id: i32,
    ) -> bool;
}

/// The durable term record, one entry per committed leadership term.
pub trait RecordingLog {
    fn append_term(
        &mut self,
        log_recording_id: i64,
        leadership_term_id: i64,
        log_position: i64,
        timestamp_ms: i64,
    );

    fn get_term_timestamp(&self, leadership_term_id: i64) -> i64;
}

/// The collaborators borrowed for the duration of one duty-cycle call.
pub struct Clients<'a> {
    pub agent: &'a mut dyn ConsensusAgent,
    pub publisher: &'a mut dyn StatusPublisher,
    pub recording_log: &'a mut dyn RecordingLog,
}

pub struct Election {
    options: ElectionOptions,
    members: Vec<ClusterMember>,
    index_by_id: HashMap<i32, usize>,
    this_member_index: usize,
    state: ElectionState,
    is_startup: bool,

    /// Leadership term of the last locally appended log entry; fixed for
    /// the lifetime of this election.
    log_leadership_term_id: i64,
    leadership_term_id: i64,
    candidate_term_id: i64,
    log_position: i64,
    catchup_position: i64,
    leader_member_id: i32,
    log_session_id: i32,
    vote_granted_to: i32,
    replay_begun: bool,

    last_now_ns: i64,
    time_of_last_state_change_ns: i64,
    time_of_last_update_ns: i64,
    nomination_deadline_ns: i64,

    state_counter: Counter,
    event_sink: EventSink,
    rng: StdRng,
}

impl Election {
    pub fn new(
        is_startup: bool,
        leadership_term_id: i64,
        log_position: i64,
        members: Vec<ClusterMember>,
        this_member_id: i32,
        options: ElectionOptions,
        event_sink: EventSink,
        state_counter: Counter,
    ) -> Result<Election, Error> {
        let index_by_id = member::member_index_by_id(&members);
        let this_member_index = *index_by_id
            .get(&this_member_id)
            .ok_or(Error::InvalidMemberId(this_member_id))?;
        let rng = StdRng::seed_from_u64(options.random_seed.wrapping_add(this_member_id as u64));

        state_counter.set(ElectionState::Init.code());

        Ok(Election {
            options,
            members,
            index_by_id,
            this_member_index,
            state: ElectionState::Init,
            is_startup,
            log_leadership_term_id: leadership_term_id,
            leadership_term_id,
            candidate_term_id: NULL_VALUE,
            log_position,
            catchup_position: NULL_POSITION,
            leader_member_id: NULL_MEMBER_ID,
            log_session_id: NULL_SESSION_ID,
            vote_granted_to: NULL_MEMBER_ID,
            replay_begun: false,
            last_now_ns: 0,
            time_of_last_state_change_ns: 0,
            time_of_last_update_ns: 0,
            nomination_deadline_ns: 0,
            state_counter,
            event_sink,
            rng,
        })
    }

    pub fn state(&self) -> ElectionState {
        self.state
    }

    pub fn leadership_term_id(&self) -> i64 {
        self.leadership_term_id
    }

    pub fn candidate_term_id(&self) -> i64 {
        self.candidate_term_id
    }

    pub fn log_position(&self) -> i64 {
        self.log_position
    }

    pub fn leader_member_id(&self) -> i32 {
        self.leader_member_id
    }

    pub fn log_session_id(&self) -> i32 {
        self.log_session_id
    }

    pub fn set_log_session_id(&mut self, log_session_id: i32) {
        self.log_session_id = log_session_id;
    }

    pub fn members(&self) -> &[ClusterMember] {
        &self.members
    }

    fn this_member_id(&self) -> i32 {
        self.members[self.this_member_index].id
    }

    /// Advance the state machine.  `now_ns` must be non-decreasing across
    /// calls.
    pub fn do_work(&mut self, now_ns: i64, clients: &mut Clients) -> u32 {
        self.last_now_ns = now_ns;
        match self.state {
            ElectionState::Init => self.init(now_ns, clients),
            ElectionState::Canvass => self.canvass(now_ns, clients),
            ElectionState::Nominate => self.nominate(now_ns, clients),
            ElectionState::CandidateBallot => self.candidate_ballot(now_ns, clients),
            ElectionState::FollowerBallot => self.follower_ballot(now_ns, clients),
            ElectionState::LeaderReplay => self.leader_replay(now_ns, clients),
            ElectionState::LeaderReady => self.leader_ready(now_ns, clients),
            ElectionState::FollowerReplay => self.follower_replay(now_ns, clients),
            ElectionState::FollowerReady => self.follower_ready(now_ns, clients),
            ElectionState::Closed => 0,
        }
    }

    /// Dispatch a decoded status message to its handler.
    pub fn on_status_message(&mut self, message: StatusMessage, clients: &mut Clients) {
        match message {
            StatusMessage::CanvassPosition(msg) => {
                self.on_canvass_position(msg.leadership_term_id, msg.log_position, msg.follower_member_id)
            }
            StatusMessage::RequestVote(msg) => self.on_request_vote(
                msg.leadership_term_id,
                msg.log_position,
                msg.candidate_term_id,
                msg.candidate_id,
                clients,
            ),
            StatusMessage::Vote(msg) => self.on_vote(
                msg.candidate_term_id,
                msg.leadership_term_id,
                msg.log_position,
                msg.candidate_id,
                msg.follower_member_id,
                msg.vote,
            ),
            StatusMessage::NewLeadershipTerm(msg) => self.on_new_leadership_term(
                msg.leadership_term_id,
                msg.candidate_term_id,
                msg.log_position,
                msg.timestamp_ms,
                msg.leader_member_id,
                msg.log_session_id,
            ),
            StatusMessage::AppendedPosition(msg) => {
                self.on_appended_position(msg.leadership_term_id, msg.log_position, msg.follower_member_id)
            }
        }
    }

    /// Record a peer's canvassed position.  Positions for a stale term are
    /// dropped, as are unknown member ids.
    pub fn on_canvass_position(
        &mut self,
        leadership_term_id: i64,
        log_position: i64,
        follower_member_id: i32,
    ) {
        if leadership_term_id < self.leadership_term_id {
            return;
        }

        if let Some(&index) = self.index_by_id.get(&follower_member_id) {
            self.event_sink.log_event(
                ClusterEvent::CanvassPosition,
                format_args!(
                    "member {} canvassed term {} position {}",
                    follower_member_id, leadership_term_id, log_position
                ),
            );
            let follower = &mut self.members[index];
            follower.leadership_term_id = leadership_term_id;
            follower.log_position = log_position;
        }
    }

    /// Handle a candidate's ballot.  The vote is granted only if the
    /// candidate's term is new and its log is not behind ours; a duplicate
    /// request for the already-granted term is re-granted.
    pub fn on_request_vote(
        &mut self,
        leadership_term_id: i64,
        log_position: i64,
        candidate_term_id: i64,
        candidate_id: i32,
        clients: &mut Clients,
    ) {
        let candidate_index = match self.index_by_id.get(&candidate_id) {
            Some(&index) => index,
            None => return,
        };
        let publication = match self.members[candidate_index].publication {
            Some(publication) => publication,
            None => return,
        };
        let this_id = self.this_member_id();

        if ElectionState::FollowerBallot == self.state
            && candidate_term_id == self.candidate_term_id
            && candidate_id == self.vote_granted_to
        {
            clients.publisher.place_vote(
                publication,
                candidate_term_id,
                self.log_leadership_term_id,
                self.log_position,
                candidate_id,
                this_id,
                true,
            );
            return;
        }

        let granted = if candidate_term_id <= self.leadership_term_id
            || candidate_term_id <= self.candidate_term_id
        {
            false
        } else if member::compare_log(
            self.log_leadership_term_id,
            self.log_position,
            leadership_term_id,
            log_position,
        ) == std::cmp::Ordering::Greater
        {
            // A candidate behind our log never gets a vote, but its term
            // is adopted so the next local bid strictly exceeds it.
            self.candidate_term_id = candidate_term_id;
            false
        } else {
            match self.state {
                ElectionState::Canvass
                | ElectionState::Nominate
                | ElectionState::CandidateBallot
                | ElectionState::FollowerBallot => {
                    self.candidate_term_id = candidate_term_id;
                    self.vote_granted_to = candidate_id;
                    self.transition(ElectionState::FollowerBallot);
                    true
                }
                _ => false,
            }
        };

        clients.publisher.place_vote(
            publication,
            candidate_term_id,
            self.log_leadership_term_id,
            self.log_position,
            candidate_id,
            this_id,
            granted,
        );
    }

    /// Tally a follower's vote for our current ballot.  Votes for a stale
    /// term or another candidate are dropped.
    pub fn on_vote(
        &mut self,
        candidate_term_id: i64,
        leadership_term_id: i64,
        log_position: i64,
        candidate_id: i32,
        follower_member_id: i32,
        vote: bool,
    ) {
        if ElectionState::CandidateBallot != self.state
            || candidate_term_id != self.candidate_term_id
            || candidate_id != self.this_member_id()
        {
            return;
        }

        if let Some(&index) = self.index_by_id.get(&follower_member_id) {
            let follower = &mut self.members[index];
            follower.candidate_term_id = candidate_term_id;
            follower.leadership_term_id = leadership_term_id;
            follower.log_position = log_position;
            follower.vote = Some(vote);
        }
    }

    /// Adopt an announced leadership term from a known leader.
    pub fn on_new_leadership_term(
        &mut self,
        _leadership_term_id: i64,
        candidate_term_id: i64,
        log_position: i64,
        _timestamp_ms: i64,
        leader_member_id: i32,
        log_session_id: i32,
    ) {
        let leader_index = match self.index_by_id.get(&leader_member_id) {
            Some(&index) => index,
            None => return,
        };

        match self.state {
            ElectionState::Canvass
            | ElectionState::Nominate
            | ElectionState::CandidateBallot
            | ElectionState::FollowerBallot => {
                if candidate_term_id < self.candidate_term_id
                    || candidate_term_id <= self.leadership_term_id
                {
                    return;
                }

                self.event_sink.log_event(
                    ClusterEvent::NewLeadershipTerm,
                    format_args!(
                        "leader {} announced term {} at position {}",
                        leader_member_id, candidate_term_id, log_position
                    ),
                );

                let leader = &mut self.members[leader_index];
                leader.leadership_term_id = candidate_term_id;
                leader.log_position = log_position;

                self.leadership_term_id = candidate_term_id;
                self.candidate_term_id = std::cmp::max(self.candidate_term_id, candidate_term_id);
                self.leader_member_id = leader_member_id;
                self.log_session_id = log_session_id;
                self.catchup_position = log_position;
                self.transition(ElectionState::FollowerReplay);
            }
            _ => {}
        }
    }

    /// Record a member's appended position.  Counts toward the canvass
    /// tally while canvassing and toward readiness acks once a leader is
    /// broadcasting; stale terms are dropped.
    pub fn on_appended_position(&mut self, leadership_term_id: i64, log_position: i64, member_id: i32) {
        if leadership_term_id < self.leadership_term_id {
            return;
        }

        if let Some(&index) = self.index_by_id.get(&member_id) {
            self.event_sink.log_event(
                ClusterEvent::AppendedPosition,
                format_args!(
                    "member {} appended term {} position {}",
                    member_id, leadership_term_id, log_position
                ),
            );
            let follower = &mut self.members[index];
            follower.leadership_term_id = leadership_term_id;
            follower.log_position = log_position;
        }
    }

    fn init(&mut self, now_ns: i64, clients: &mut Clients) -> u32 {
        if Role::Leader == clients.agent.role() {
            clients.agent.prepare_for_new_leadership(self.log_position);
            clients.agent.set_role(Role::Follower);
        }

        if self.members.len() == 1 {
            self.candidate_term_id = self.leadership_term_id + 1;
            self.leader_member_id = self.this_member_id();
            self.transition(ElectionState::LeaderReplay);
        } else {
            self.enter_canvass(now_ns, clients);
        }
        1
    }

    fn canvass(&mut self, now_ns: i64, clients: &mut Clients) -> u32 {
        let mut work_count = 0;

        if now_ns >= self.time_of_last_update_ns + self.options.election_status_interval_ns {
            self.time_of_last_update_ns = now_ns;
            let this_id = self.this_member_id();
            for index in 0..self.members.len() {
                if index == self.this_member_index {
                    continue;
                }
                if let Some(publication) = self.members[index].publication {
                    clients.publisher.canvass_position(
                        publication,
                        self.log_leadership_term_id,
                        self.log_position,
                        this_id,
                    );
                }
            }
            work_count += 1;
        }

        let appointed_leader_id = self.options.appointed_leader_id;
        let this_id = self.this_member_id();
        if appointed_leader_id != NULL_MEMBER_ID && appointed_leader_id != this_id {
            return work_count;
        }

        let canvass_timeout_ns = if self.is_startup {
            self.options.startup_canvass_timeout_ns
        } else {
            self.options.election_timeout_ns
        };
        let canvass_deadline_ns = self.time_of_last_state_change_ns + canvass_timeout_ns;

        let candidate = &self.members[self.this_member_index];
        let may_bid = member::is_unanimous_candidate(&self.members, candidate)
            || (member::is_quorum_candidate(&self.members, candidate)
                && (appointed_leader_id == this_id || now_ns >= canvass_deadline_ns));

        if may_bid {
            // Backoff biased by the member's index so colliding bids from
            // simultaneous canvassers stay rare.
            let half_timeout_ns = self.options.election_timeout_ns >> 1;
            let step_ns = std::cmp::max(1, half_timeout_ns / self.members.len() as i64);
            let delay_ns = step_ns * self.this_member_index as i64 + self.rng.gen_range(0..step_ns);
            self.nomination_deadline_ns = now_ns + delay_ns;
            self.transition(ElectionState::Nominate);
            work_count += 1;
        }

        work_count
    }

    fn nominate(&mut self, now_ns: i64, clients: &mut Clients) -> u32 {
        if now_ns >= self.nomination_deadline_ns {
            self.candidate_term_id =
                std::cmp::max(self.candidate_term_id + 1, self.leadership_term_id + 1);
            let this_id = self.this_member_id();
            member::become_candidate(&mut self.members, self.candidate_term_id, this_id);
            self.vote_granted_to = this_id;
            clients.agent.set_role(Role::Candidate);
            self.transition(ElectionState::CandidateBallot);
            return 1;
        }
        0
    }

    fn candidate_ballot(&mut self, now_ns: i64, clients: &mut Clients) -> u32 {
        let mut work_count = 0;

        if member::has_won_vote_on_full_count(&self.members, self.candidate_term_id) {
            self.leader_member_id = self.this_member_id();
            self.transition(ElectionState::LeaderReplay);
            work_count += 1;
        } else if now_ns >= self.time_of_last_state_change_ns + self.options.election_timeout_ns {
            if member::has_majority_vote(&self.members, self.candidate_term_id) {
                self.leader_member_id = self.this_member_id();
                self.transition(ElectionState::LeaderReplay);
            } else {
                // Bid abandoned; candidate_term_id is retained so the next
                // bid strictly increases it.
                self.is_startup = false;
                self.enter_canvass(now_ns, clients);
            }
            work_count += 1;
        } else {
            let this_id = self.this_member_id();
            for index in 0..self.members.len() {
                if self.members[index].is_ballot_sent {
                    continue;
                }
                let publication = match self.members[index].publication {
                    Some(publication) => publication,
                    None => continue,
                };
                self.members[index].is_ballot_sent = clients.publisher.request_vote(
                    publication,
                    self.log_leadership_term_id,
                    self.log_position,
                    self.candidate_term_id,
                    this_id,
                );
                work_count += 1;
            }
        }

        work_count
    }

    fn follower_ballot(&mut self, now_ns: i64, clients: &mut Clients) -> u32 {
        if now_ns >= self.time_of_last_state_change_ns + self.options.election_timeout_ns {
            self.is_startup = false;
            self.enter_canvass(now_ns, clients);
            return 1;
        }
        0
    }

    fn leader_replay(&mut self, now_ns: i64, clients: &mut Clients) -> u32 {
        let mut work_count = 0;

        if !self.replay_begun {
            self.replay_begun = true;
            member::reset_log_positions(&mut self.members, NULL_POSITION);
            let this_member = &mut self.members[self.this_member_index];
            this_member.leadership_term_id = self.candidate_term_id;
            this_member.log_position = self.log_position;
            work_count += 1;
        }

        if clients.agent.has_replay_reached(self.log_position) {
            self.leadership_term_id = self.candidate_term_id;
            self.log_session_id = clients.agent.add_new_log_publication();
            clients.recording_log.append_term(
                clients.agent.log_recording_id(),
                self.leadership_term_id,
                self.log_position,
                now_ns / 1_000_000,
            );
            clients.agent.become_leader(
                self.leadership_term_id,
                self.log_position,
                self.log_session_id,
            );
            self.replay_begun = false;
            self.transition(ElectionState::LeaderReady);
            work_count += 1;
        }

        work_count
    }

    fn leader_ready(&mut self, now_ns: i64, clients: &mut Clients) -> u32 {
        if member::have_voters_reached_position(&self.members, self.log_position, self.leadership_term_id)
        {
            if clients.agent.election_complete() {
                self.close();
            }
            return 1;
        }

        if now_ns >= self.time_of_last_update_ns + self.options.leader_heartbeat_interval_ns {
            self.time_of_last_update_ns = now_ns;
            let this_id = self.this_member_id();
            let timestamp_ms = clients.recording_log.get_term_timestamp(self.leadership_term_id);
            for index in 0..self.members.len() {
                if index == self.this_member_index {
                    continue;
                }
                if let Some(publication) = self.members[index].publication {
                    clients.publisher.new_leadership_term(
                        publication,
                        self.log_leadership_term_id,
                        self.leadership_term_id,
                        self.log_position,
                        timestamp_ms,
                        this_id,
                        self.log_session_id,
                    );
                }
            }
            return 1;
        }

        0
    }

    fn follower_replay(&mut self, _now_ns: i64, clients: &mut Clients) -> u32 {
        if !self.replay_begun {
            self.replay_begun = true;
            clients.agent.follow_log(self.log_session_id);
            return 1;
        }

        if clients.agent.has_catchup_reached_live_position(self.catchup_position) {
            self.log_position = std::cmp::max(self.log_position, self.catchup_position);
            clients.agent.become_follower(
                self.leadership_term_id,
                self.log_position,
                self.leader_member_id,
                self.log_session_id,
            );
            if Role::Follower != clients.agent.role() {
                clients.agent.set_role(Role::Follower);
            }
            self.replay_begun = false;
            self.transition(ElectionState::FollowerReady);
            return 1;
        }

        0
    }

    fn follower_ready(&mut self, now_ns: i64, clients: &mut Clients) -> u32 {
        let leader_publication = self
            .index_by_id
            .get(&self.leader_member_id)
            .and_then(|&index| self.members[index].publication);

        let this_id = self.this_member_id();
        let appended = match leader_publication {
            Some(publication) => clients.publisher.appended_position(
                publication,
                self.leadership_term_id,
                self.log_position,
                this_id,
            ),
            None => false,
        };

        if appended {
            if clients.agent.election_complete() {
                self.close();
            }
        } else if now_ns >= self.time_of_last_state_change_ns + self.options.leader_heartbeat_timeout_ns
        {
            self.is_startup = false;
            self.enter_canvass(now_ns, clients);
        }

        1
    }

    fn enter_canvass(&mut self, _now_ns: i64, clients: &mut Clients) {
        for m in self.members.iter_mut() {
            m.reset_ballot();
        }
        let this_member = &mut self.members[self.this_member_index];
        this_member.leadership_term_id = self.log_leadership_term_id;
        this_member.log_position = self.log_position;
        self.vote_granted_to = NULL_MEMBER_ID;

        if Role::Follower != clients.agent.role() {
            clients.agent.set_role(Role::Follower);
        }
        self.transition(ElectionState::Canvass);
    }

    fn transition(&mut self, next: ElectionState) {
        if next == self.state {
            return;
        }

        self.event_sink.log_state_change(
            ClusterEvent::StateChange,
            &format!("{}", self.state),
            &format!("{}", next),
        );
        debug!(
            "member {} election {} -> {} at term {} position {}",
            self.this_member_id(),
            self.state,
            next,
            self.leadership_term_id,
            self.log_position
        );

        self.state = next;
        self.state_counter.set(next.code());
        self.time_of_last_state_change_ns = self.last_now_ns;
        self.time_of_last_update_ns = self.last_now_ns;
    }

    fn close(&mut self) {
        self.transition(ElectionState::Closed);
        self.state_counter.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use log::{Metadata, Record};

    use crate::transport::PublicationHandle;
    use crate::types::{RequestVoteMsg, VoteMsg};

    struct SimpleLogger;
    impl log::Log for SimpleLogger {
        fn enabled(&self, _metadata: &Metadata) -> bool {
            true
        }

        fn log(&self, record: &Record) {
            println!(
                "[{} - {} - {}:{}] {}",
                record.level(),
                record.target(),
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                record.args()
            );
        }

        fn flush(&self) {}
    }

    static LOGGER: SimpleLogger = SimpleLogger;
    static SETUP_LOGGER: std::sync::Once = std::sync::Once::new();

    const RECORDING_ID: i64 = 1;
    const NEW_LOG_SESSION_ID: i32 = 99;

    struct MockAgent {
        role: Role,
        replay_reached: bool,
        catchup_reached: bool,
        election_complete: bool,
        prepared_for_new_leadership: Option<i64>,
        became_leader: Option<(i64, i64, i32)>,
        became_follower: Option<(i64, i64, i32, i32)>,
        followed_log_session_id: Option<i32>,
        election_complete_calls: u32,
    }

    impl Default for MockAgent {
        fn default() -> MockAgent {
            MockAgent {
                role: Role::Follower,
                replay_reached: true,
                catchup_reached: true,
                election_complete: false,
                prepared_for_new_leadership: None,
                became_leader: None,
                became_follower: None,
                followed_log_session_id: None,
                election_complete_calls: 0,
            }
        }
    }

    impl ConsensusAgent for MockAgent {
        fn role(&self) -> Role {
            self.role
        }

        fn set_role(&mut self, role: Role) {
            self.role = role;
        }

        fn prepare_for_new_leadership(&mut self, log_position: i64) {
            self.prepared_for_new_leadership = Some(log_position);
        }

        fn log_recording_id(&self) -> i64 {
            RECORDING_ID
        }

        fn add_new_log_publication(&mut self) -> i32 {
            NEW_LOG_SESSION_ID
        }

        fn become_leader(&mut self, leadership_term_id: i64, log_position: i64, log_session_id: i32) {
            self.became_leader = Some((leadership_term_id, log_position, log_session_id));
        }

        fn become_follower(
            &mut self,
            leadership_term_id: i64,
            log_position: i64,
            leader_member_id: i32,
            log_session_id: i32,
        ) {
            self.became_follower =
                Some((leadership_term_id, log_position, leader_member_id, log_session_id));
        }

        fn follow_log(&mut self, log_session_id: i32) {
            self.followed_log_session_id = Some(log_session_id);
        }

        fn has_replay_reached(&mut self, _log_position: i64) -> bool {
            self.replay_reached
        }

        fn has_catchup_reached_live_position(&mut self, _log_position: i64) -> bool {
            self.catchup_reached
        }

        fn election_complete(&mut self) -> bool {
            self.election_complete_calls += 1;
            self.election_complete
        }
    }

    #[derive(Default)]
    struct MockPublisher {
        canvass_positions: Vec<(PublicationHandle, i64, i64, i32)>,
        request_votes: Vec<(PublicationHandle, i64, i64, i64, i32)>,
        place_votes: Vec<(PublicationHandle, i64, i64, i64, i32, i32, bool)>,
        new_leadership_terms: Vec<(PublicationHandle, i64, i64, i64, i64, i32, i32)>,
        appended_positions: Vec<(PublicationHandle, i64, i64, i32)>,
    }

    impl StatusPublisher for MockPublisher {
        fn canvass_position(
            &mut self,
            publication: PublicationHandle,
            leadership_term_id: i64,
            log_position: i64,
            follower_member_id: i32,
        ) -> bool {
            self.canvass_positions
                .push((publication, leadership_term_id, log_position, follower_member_id));
            true
        }

        fn request_vote(
            &mut self,
            publication: PublicationHandle,
            leadership_term_id: i64,
            log_position: i64,
            candidate_term_id: i64,
            candidate_id: i32,
        ) -> bool {
            self.request_votes.push((
                publication,
                leadership_term_id,
                log_position,
                candidate_term_id,
                candidate_id,
            ));
            true
        }

        fn place_vote(
            &mut self,
            publication: PublicationHandle,
            candidate_term_id: i64,
            leadership_term_id: i64,
            log_position: i64,
            candidate_id: i32,
            follower_member_id: i32,
            vote: bool,
        ) -> bool {
            self.place_votes.push((
                publication,
                candidate_term_id,
                leadership_term_id,
                log_position,
                candidate_id,
                follower_member_id,
                vote,
            ));
            true
        }

        fn new_leadership_term(
            &mut self,
            publication: PublicationHandle,
            leadership_term_id: i64,
            candidate_term_id: i64,
            log_position: i64,
            timestamp_ms: i64,
            leader_member_id: i32,
            log_session_id: i32,
        ) -> bool {
            self.new_leadership_terms.push((
                publication,
                leadership_term_id,
                candidate_term_id,
                log_position,
                timestamp_ms,
                leader_member_id,
                log_session_id,
            ));
            true
        }

        fn appended_position(
            &mut self,
            publication: PublicationHandle,
            leadership_term_id: i64,
            log_position: i64,
            member_id: i32,
        ) -> bool {
            self.appended_positions
                .push((publication, leadership_term_id, log_position, member_id));
            true
        }
    }

    #[derive(Default)]
    struct MockRecordingLog {
        terms: Vec<(i64, i64, i64, i64)>,
        term_timestamp_ms: i64,
    }

    impl RecordingLog for MockRecordingLog {
        fn append_term(
            &mut self,
            log_recording_id: i64,
            leadership_term_id: i64,
            log_position: i64,
            timestamp_ms: i64,
        ) {
            self.terms
                .push((log_recording_id, leadership_term_id, log_position, timestamp_ms));
        }

        fn get_term_timestamp(&self, _leadership_term_id: i64) -> i64 {
            self.term_timestamp_ms
        }
    }

    struct Harness {
        agent: MockAgent,
        publisher: MockPublisher,
        recording_log: MockRecordingLog,
    }

    impl Default for Harness {
        fn default() -> Harness {
            SETUP_LOGGER.call_once(|| {
                log::set_logger(&LOGGER)
                    .map(|()| log::set_max_level(log::LevelFilter::Debug))
                    .expect("init logger");
            });
            Harness {
                agent: MockAgent::default(),
                publisher: MockPublisher::default(),
                recording_log: MockRecordingLog::default(),
            }
        }
    }

    impl Harness {
        fn clients(&mut self) -> Clients<'_> {
            Clients {
                agent: &mut self.agent,
                publisher: &mut self.publisher,
                recording_log: &mut self.recording_log,
            }
        }
    }

    const ELECTION_TIMEOUT_NS: i64 = 1_000_000;
    const STATUS_INTERVAL_NS: i64 = 10_000;
    const HEARTBEAT_INTERVAL_NS: i64 = 100_000;
    const HEARTBEAT_TIMEOUT_NS: i64 = 10_000_000;
    const STARTUP_CANVASS_TIMEOUT_NS: i64 = 5_000_000;

    fn test_options() -> ElectionOptions {
        ElectionOptions {
            election_timeout_ns: ELECTION_TIMEOUT_NS,
            election_status_interval_ns: STATUS_INTERVAL_NS,
            leader_heartbeat_interval_ns: HEARTBEAT_INTERVAL_NS,
            leader_heartbeat_timeout_ns: HEARTBEAT_TIMEOUT_NS,
            startup_canvass_timeout_ns: STARTUP_CANVASS_TIMEOUT_NS,
            appointed_leader_id: NULL_MEMBER_ID,
            random_seed: 42,
        }
    }

    fn three_members() -> Vec<ClusterMember> {
        let mut members = ClusterMember::parse(
            "0,clientEndpoint,memberEndpoint,logEndpoint,transferEndpoint,archiveEndpoint|\
             1,clientEndpoint,memberEndpoint,logEndpoint,transferEndpoint,archiveEndpoint|\
             2,clientEndpoint,memberEndpoint,logEndpoint,transferEndpoint,archiveEndpoint|",
        )
        .expect("parse members");
        for (index, member) in members.iter_mut().enumerate() {
            member.publication = Some(PublicationHandle(index as u64));
        }
        members
    }

    fn new_election(
        is_startup: bool,
        leadership_term_id: i64,
        log_position: i64,
        members: Vec<ClusterMember>,
        this_member_id: i32,
        options: ElectionOptions,
        state_counter: Counter,
    ) -> Election {
        Election::new(
            is_startup,
            leadership_term_id,
            log_position,
            members,
            this_member_id,
            options,
            EventSink::disabled(this_member_id),
            state_counter,
        )
        .expect("new election")
    }

    #[test]
    fn elects_single_member_cluster_leader() {
        let mut harness = Harness::default();
        let members = ClusterMember::parse(
            "0,clientEndpoint,memberEndpoint,logEndpoint,transferEndpoint,archiveEndpoint",
        )
        .expect("parse member");
        let mut election =
            new_election(true, NULL_VALUE, 0, members, 0, test_options(), Counter::default());

        assert_eq!(election.state(), ElectionState::Init);

        let t1 = 1;
        election.do_work(t1, &mut harness.clients());
        election.do_work(t1, &mut harness.clients());

        assert_eq!(election.state(), ElectionState::LeaderReady);
        assert_eq!(election.leadership_term_id(), 0);
        assert_eq!(harness.agent.became_leader, Some((0, 0, NEW_LOG_SESSION_ID)));
        assert_eq!(
            harness.recording_log.terms,
            vec![(RECORDING_ID, 0, 0, t1 / 1_000_000)]
        );
        assert_eq!(harness.publisher.request_votes.len(), 0);
        assert_eq!(harness.publisher.canvass_positions.len(), 0);
    }

    #[test]
    fn elects_appointed_leader() {
        let mut harness = Harness::default();
        let mut options = test_options();
        options.appointed_leader_id = 0;
        let counter = Counter::default();
        let state_reader = counter.reader();
        let mut election = new_election(true, NULL_VALUE, 0, three_members(), 0, options, counter);

        let t1 = 1;
        election.do_work(t1, &mut harness.clients());
        assert_eq!(election.state(), ElectionState::Canvass);

        election.on_canvass_position(NULL_VALUE, 0, 1);
        election.on_canvass_position(NULL_VALUE, 0, 2);

        let t2 = 2;
        election.do_work(t2, &mut harness.clients());
        assert_eq!(election.state(), ElectionState::Nominate);

        let t3 = t2 + (ELECTION_TIMEOUT_NS >> 1);
        election.do_work(t3, &mut harness.clients());
        assert_eq!(election.state(), ElectionState::CandidateBallot);
        assert_eq!(harness.agent.role, Role::Candidate);
        assert_eq!(election.candidate_term_id(), 0);

        election.do_work(t3, &mut harness.clients());
        assert_eq!(
            harness.publisher.request_votes,
            vec![
                (PublicationHandle(1), NULL_VALUE, 0, 0, 0),
                (PublicationHandle(2), NULL_VALUE, 0, 0, 0),
            ]
        );

        election.on_vote(0, NULL_VALUE, 0, 0, 1, true);
        election.on_vote(0, NULL_VALUE, 0, 0, 2, true);

        let t4 = t3 + 1;
        election.do_work(t4, &mut harness.clients());
        assert_eq!(election.state(), ElectionState::LeaderReplay);

        let t5 = t4 + 1;
        election.do_work(t5, &mut harness.clients());
        assert_eq!(election.state(), ElectionState::LeaderReady);
        assert_eq!(election.leadership_term_id(), 0);
        assert_eq!(harness.agent.became_leader, Some((0, 0, NEW_LOG_SESSION_ID)));
        assert_eq!(
            harness.recording_log.terms,
            vec![(RECORDING_ID, 0, 0, t5 / 1_000_000)]
        );
        assert_eq!(election.members()[1].log_position, NULL_POSITION);
        assert_eq!(election.members()[2].log_position, NULL_POSITION);

        harness.recording_log.term_timestamp_ms = 777;
        election.set_log_session_id(-7);
        let t6 = t5 + HEARTBEAT_INTERVAL_NS;
        election.do_work(t6, &mut harness.clients());
        assert_eq!(
            harness.publisher.new_leadership_terms,
            vec![
                (PublicationHandle(1), NULL_VALUE, 0, 0, 777, 0, -7),
                (PublicationHandle(2), NULL_VALUE, 0, 0, 777, 0, -7),
            ]
        );
        assert_eq!(election.state(), ElectionState::LeaderReady);

        harness.agent.election_complete = true;
        election.on_appended_position(0, 0, 1);
        election.on_appended_position(0, 0, 2);

        let t7 = t6 + 1;
        election.do_work(t7, &mut harness.clients());
        assert_eq!(election.state(), ElectionState::Closed);
        assert_eq!(harness.agent.election_complete_calls, 1);
        assert_eq!(state_reader.is_closed(), true);
    }

    #[test]
    fn votes_for_appointed_leader_and_follows() {
        let mut harness = Harness::default();
        let counter = Counter::default();
        let state_reader = counter.reader();
        let mut election =
            new_election(true, NULL_VALUE, 0, three_members(), 1, test_options(), counter);

        let t1 = 1;
        election.do_work(t1, &mut harness.clients());
        assert_eq!(election.state(), ElectionState::Canvass);

        election.on_request_vote(NULL_VALUE, 0, 0, 0, &mut harness.clients());
        assert_eq!(
            harness.publisher.place_votes,
            vec![(PublicationHandle(0), 0, NULL_VALUE, 0, 0, 1, true)]
        );
        assert_eq!(election.state(), ElectionState::FollowerBallot);

        election.on_new_leadership_term(NULL_VALUE, 0, 0, 2, 0, -7);
        assert_eq!(election.state(), ElectionState::FollowerReplay);
        assert_eq!(election.leadership_term_id(), 0);
        assert_eq!(election.log_session_id(), -7);

        let t2 = 2;
        election.do_work(t2, &mut harness.clients());
        election.do_work(t2, &mut harness.clients());
        assert_eq!(election.state(), ElectionState::FollowerReady);
        assert_eq!(harness.agent.followed_log_session_id, Some(-7));
        assert_eq!(harness.agent.became_follower, Some((0, 0, 0, -7)));

        harness.agent.election_complete = true;
        let t3 = 3;
        election.do_work(t3, &mut harness.clients());
        assert_eq!(
            harness.publisher.appended_positions,
            vec![(PublicationHandle(0), 0, 0, 1)]
        );
        assert_eq!(election.state(), ElectionState::Closed);
        assert_eq!(state_reader.is_closed(), true);
    }

    #[test]
    fn canvasses_members_in_successful_leadership_bid() {
        let mut harness = Harness::default();
        let mut election = new_election(
            true,
            NULL_VALUE,
            0,
            three_members(),
            1,
            test_options(),
            Counter::default(),
        );

        let t1 = 1;
        election.do_work(t1, &mut harness.clients());
        assert_eq!(election.state(), ElectionState::Canvass);

        let t2 = t1 + STATUS_INTERVAL_NS;
        election.do_work(t2, &mut harness.clients());
        assert_eq!(
            harness.publisher.canvass_positions,
            vec![
                (PublicationHandle(0), NULL_VALUE, 0, 1),
                (PublicationHandle(2), NULL_VALUE, 0, 1),
            ]
        );
        assert_eq!(election.state(), ElectionState::Canvass);

        election.on_canvass_position(NULL_VALUE, 0, 0);
        election.on_canvass_position(NULL_VALUE, 0, 2);

        let t3 = t2 + 1;
        election.do_work(t3, &mut harness.clients());
        assert_eq!(election.state(), ElectionState::Nominate);
    }

    #[test]
    fn stays_canvassing_when_a_peer_is_ahead() {
        let mut harness = Harness::default();
        let mut election = new_election(
            true,
            NULL_VALUE,
            0,
            three_members(),
            0,
            test_options(),
            Counter::default(),
        );

        let t1 = 1;
        election.do_work(t1, &mut harness.clients());
        assert_eq!(election.state(), ElectionState::Canvass);

        election.on_canvass_position(NULL_VALUE + 1, 0, 1);
        election.on_canvass_position(NULL_VALUE, 0, 2);

        let t2 = t1 + 1;
        election.do_work(t2, &mut harness.clients());
        assert_eq!(election.state(), ElectionState::Canvass);
    }

    #[test]
    fn votes_for_candidate_during_nomination() {
        let mut harness = Harness::default();
        let mut election = new_election(
            true,
            NULL_VALUE,
            0,
            three_members(),
            1,
            test_options(),
            Counter::default(),
        );

        let t1 = 1;
        election.do_work(t1, &mut harness.clients());

        election.on_canvass_position(NULL_VALUE, 0, 0);
        election.on_canvass_position(NULL_VALUE, 0, 2);

        let t2 = t1 + 1;
        election.do_work(t2, &mut harness.clients());
        assert_eq!(election.state(), ElectionState::Nominate);

        election.on_request_vote(NULL_VALUE, 0, 0, 0, &mut harness.clients());
        assert_eq!(election.state(), ElectionState::FollowerBallot);
        assert_eq!(
            harness.publisher.place_votes,
            vec![(PublicationHandle(0), 0, NULL_VALUE, 0, 0, 1, true)]
        );
    }

    #[test]
    fn canvass_times_out_with_quorum() {
        let mut harness = Harness::default();
        let mut election = new_election(
            true,
            NULL_VALUE,
            0,
            three_members(),
            1,
            test_options(),
            Counter::default(),
        );

        let t1 = 1;
        election.do_work(t1, &mut harness.clients());
        assert_eq!(election.state(), ElectionState::Canvass);

        // An appended position counts toward the canvass tally too.
        election.on_appended_position(NULL_VALUE, 0, 0);

        let t2 = t1 + 1;
        election.do_work(t2, &mut harness.clients());
        assert_eq!(election.state(), ElectionState::Canvass);

        let t3 = t2 + STARTUP_CANVASS_TIMEOUT_NS;
        election.do_work(t3, &mut harness.clients());
        assert_eq!(election.state(), ElectionState::Nominate);
    }

    #[test]
    fn wins_candidate_ballot_with_majority_at_timeout() {
        let mut harness = Harness::default();
        let mut election = new_election(
            true,
            NULL_VALUE,
            0,
            three_members(),
            1,
            test_options(),
            Counter::default(),
        );

        let t1 = 1;
        election.do_work(t1, &mut harness.clients());
        election.on_canvass_position(NULL_VALUE, 0, 0);
        election.on_canvass_position(NULL_VALUE, 0, 2);

        let t2 = t1 + 1;
        election.do_work(t2, &mut harness.clients());
        assert_eq!(election.state(), ElectionState::Nominate);

        let t3 = t2 + (ELECTION_TIMEOUT_NS >> 1);
        election.do_work(t3, &mut harness.clients());
        assert_eq!(election.state(), ElectionState::CandidateBallot);

        election.on_vote(0, NULL_VALUE, 0, 1, 2, true);

        // One of two ballots is in: not a full count, so the win is only
        // declared once the ballot window closes.
        let t4 = t3 + ELECTION_TIMEOUT_NS;
        election.do_work(t4, &mut harness.clients());
        assert_eq!(election.state(), ElectionState::LeaderReplay);
    }

    #[test]
    fn elects_candidate_on_full_vote_count() {
        let mut harness = Harness::default();
        let mut election = new_election(
            true,
            NULL_VALUE,
            0,
            three_members(),
            1,
            test_options(),
            Counter::default(),
        );

        let t1 = 1;
        election.do_work(t1, &mut harness.clients());
        election.on_canvass_position(NULL_VALUE, 0, 0);
        election.on_canvass_position(NULL_VALUE, 0, 2);

        let t2 = t1 + 1;
        election.do_work(t2, &mut harness.clients());

        let t3 = t2 + (ELECTION_TIMEOUT_NS >> 1);
        election.do_work(t3, &mut harness.clients());
        assert_eq!(election.state(), ElectionState::CandidateBallot);

        // A no vote from one member still leaves self + one other, which
        // is a majority of three on a full count.
        election.on_vote(0, NULL_VALUE, 0, 1, 0, false);
        election.on_vote(0, NULL_VALUE, 0, 1, 2, true);

        let t4 = t3 + 1;
        election.do_work(t4, &mut harness.clients());
        assert_eq!(election.state(), ElectionState::LeaderReplay);
    }

    #[test]
    fn candidate_ballot_times_out_without_majority() {
        let mut harness = Harness::default();
        let mut election = new_election(
            true,
            NULL_VALUE,
            0,
            three_members(),
            1,
            test_options(),
            Counter::default(),
        );

        let t1 = 1;
        election.do_work(t1, &mut harness.clients());
        election.on_canvass_position(NULL_VALUE, 0, 0);
        election.on_canvass_position(NULL_VALUE, 0, 2);

        let t2 = t1 + 1;
        election.do_work(t2, &mut harness.clients());

        let t3 = t2 + (ELECTION_TIMEOUT_NS >> 1);
        election.do_work(t3, &mut harness.clients());
        assert_eq!(election.state(), ElectionState::CandidateBallot);

        let t4 = t3 + ELECTION_TIMEOUT_NS;
        election.do_work(t4, &mut harness.clients());
        assert_eq!(election.state(), ElectionState::Canvass);
        assert_eq!(election.leadership_term_id(), NULL_VALUE);
        assert_eq!(election.candidate_term_id(), NULL_VALUE + 1);
    }

    #[test]
    fn split_vote_retry_strictly_increases_candidate_term() {
        let mut harness = Harness::default();
        let mut election = new_election(
            true,
            NULL_VALUE,
            0,
            three_members(),
            1,
            test_options(),
            Counter::default(),
        );

        let t1 = 1;
        election.do_work(t1, &mut harness.clients());
        election.on_canvass_position(NULL_VALUE, 0, 0);

        let t2 = t1 + STARTUP_CANVASS_TIMEOUT_NS;
        election.do_work(t2, &mut harness.clients());
        assert_eq!(election.state(), ElectionState::Nominate);

        let t3 = t2 + (ELECTION_TIMEOUT_NS >> 1);
        election.do_work(t3, &mut harness.clients());
        assert_eq!(election.state(), ElectionState::CandidateBallot);

        let t4 = t3 + 1;
        election.on_vote(0, NULL_VALUE, 0, 1, 2, false);
        election.do_work(t4, &mut harness.clients());
        assert_eq!(election.state(), ElectionState::CandidateBallot);

        let t5 = t4 + ELECTION_TIMEOUT_NS;
        election.do_work(t5, &mut harness.clients());
        assert_eq!(election.state(), ElectionState::Canvass);
        assert_eq!(election.candidate_term_id(), 0);

        election.on_canvass_position(NULL_VALUE, 0, 0);

        let t6 = t5 + 1;
        election.do_work(t6, &mut harness.clients());
        assert_eq!(election.state(), ElectionState::Canvass);

        // The post-failure canvass deadline is the election timeout, not
        // the startup canvass timeout.
        let t7 = t6 + ELECTION_TIMEOUT_NS;
        election.do_work(t7, &mut harness.clients());
        assert_eq!(election.state(), ElectionState::Nominate);

        let t8 = t7 + ELECTION_TIMEOUT_NS;
        election.do_work(t8, &mut harness.clients());
        assert_eq!(election.state(), ElectionState::CandidateBallot);
        assert_eq!(election.candidate_term_id(), 1);

        let t9 = t8 + 1;
        election.do_work(t9, &mut harness.clients());

        election.on_vote(1, 0, 0, 1, 2, true);

        let t10 = t9 + ELECTION_TIMEOUT_NS;
        election.do_work(t10, &mut harness.clients());
        assert_eq!(election.state(), ElectionState::LeaderReplay);

        let t11 = t10 + 1;
        election.do_work(t11, &mut harness.clients());
        assert_eq!(election.state(), ElectionState::LeaderReady);
        assert_eq!(election.leadership_term_id(), 1);
    }

    #[test]
    fn follower_ballot_times_out_without_leader_emerging() {
        let mut harness = Harness::default();
        let mut election = new_election(
            true,
            NULL_VALUE,
            0,
            three_members(),
            1,
            test_options(),
            Counter::default(),
        );

        let t1 = 1;
        election.do_work(t1, &mut harness.clients());
        assert_eq!(election.state(), ElectionState::Canvass);

        election.on_request_vote(NULL_VALUE, 0, 0, 0, &mut harness.clients());

        let t2 = t1 + 1;
        election.do_work(t2, &mut harness.clients());
        assert_eq!(election.state(), ElectionState::FollowerBallot);

        let t3 = t2 + ELECTION_TIMEOUT_NS;
        election.do_work(t3, &mut harness.clients());
        assert_eq!(election.state(), ElectionState::Canvass);
        assert_eq!(election.leadership_term_id(), NULL_VALUE);
    }

    #[test]
    fn leader_steps_down_when_entering_new_election() {
        let mut harness = Harness::default();
        harness.agent.role = Role::Leader;
        let mut election = new_election(
            false,
            1,
            120,
            three_members(),
            0,
            test_options(),
            Counter::default(),
        );

        let t1 = 1;
        election.do_work(t1, &mut harness.clients());
        assert_eq!(election.state(), ElectionState::Canvass);
        assert_eq!(harness.agent.prepared_for_new_leadership, Some(120));
        assert_eq!(harness.agent.role, Role::Follower);
    }

    #[test]
    fn duplicate_vote_requests_are_regranted() {
        let mut harness = Harness::default();
        let mut election = new_election(
            true,
            NULL_VALUE,
            0,
            three_members(),
            1,
            test_options(),
            Counter::default(),
        );

        election.do_work(1, &mut harness.clients());
        election.on_request_vote(NULL_VALUE, 0, 0, 0, &mut harness.clients());
        election.on_request_vote(NULL_VALUE, 0, 0, 0, &mut harness.clients());

        assert_eq!(harness.publisher.place_votes.len(), 2);
        assert_eq!(harness.publisher.place_votes[0].6, true);
        assert_eq!(harness.publisher.place_votes[1].6, true);
        assert_eq!(election.candidate_term_id(), 0);

        // A competing ballot for the same term is refused.
        election.on_request_vote(NULL_VALUE, 0, 0, 2, &mut harness.clients());
        assert_eq!(
            harness.publisher.place_votes[2],
            (PublicationHandle(2), 0, NULL_VALUE, 0, 2, 1, false)
        );
    }

    #[test]
    fn rejects_candidate_with_stale_log() {
        let mut harness = Harness::default();
        let mut election = new_election(
            true,
            1,
            100,
            three_members(),
            1,
            test_options(),
            Counter::default(),
        );

        election.do_work(1, &mut harness.clients());
        election.on_request_vote(0, 50, 2, 0, &mut harness.clients());

        assert_eq!(election.state(), ElectionState::Canvass);
        assert_eq!(
            harness.publisher.place_votes,
            vec![(PublicationHandle(0), 2, 1, 100, 0, 1, false)]
        );
        // The refused term is still adopted so our next bid exceeds it.
        assert_eq!(election.candidate_term_id(), 2);
    }

    #[test]
    fn stale_and_unknown_messages_are_dropped() {
        let mut harness = Harness::default();
        let mut election = new_election(
            true,
            1,
            100,
            three_members(),
            1,
            test_options(),
            Counter::default(),
        );

        election.do_work(1, &mut harness.clients());

        // Unknown member ids are silently ignored.
        election.on_canvass_position(1, 100, 9);
        election.on_appended_position(1, 100, 9);
        election.on_new_leadership_term(1, 2, 100, 0, 9, -7);
        election.on_request_vote(1, 100, 2, 9, &mut harness.clients());
        assert_eq!(election.state(), ElectionState::Canvass);
        assert_eq!(harness.publisher.place_votes.len(), 0);

        // Stale terms are silently ignored.
        election.on_canvass_position(0, 50, 0);
        assert_eq!(election.members()[0].log_position, NULL_POSITION);
        election.on_appended_position(0, 50, 0);
        assert_eq!(election.members()[0].log_position, NULL_POSITION);

        // Votes are dropped unless a matching ballot is in progress.
        election.on_vote(2, 1, 100, 1, 0, true);
        assert_eq!(election.members()[0].vote, None);
    }

    #[test]
    fn dispatches_status_messages_by_variant() {
        let mut harness = Harness::default();
        let mut election = new_election(
            true,
            NULL_VALUE,
            0,
            three_members(),
            1,
            test_options(),
            Counter::default(),
        );

        election.do_work(1, &mut harness.clients());

        election.on_status_message(
            StatusMessage::RequestVote(RequestVoteMsg {
                leadership_term_id: NULL_VALUE,
                log_position: 0,
                candidate_term_id: 0,
                candidate_id: 0,
            }),
            &mut harness.clients(),
        );
        assert_eq!(election.state(), ElectionState::FollowerBallot);
        assert_eq!(harness.publisher.place_votes.len(), 1);

        election.on_status_message(
            StatusMessage::Vote(VoteMsg {
                candidate_term_id: 0,
                leadership_term_id: NULL_VALUE,
                log_position: 0,
                candidate_id: 1,
                follower_member_id: 2,
                vote: true,
            }),
            &mut harness.clients(),
        );
        // Not balloting, so the vote is dropped.
        assert_eq!(election.members()[2].vote, None);
    }
}
