//! The crate `types` defines a set types used by quorus.

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

use serde::{Deserialize, Serialize};

/// The role a member plays in the cluster, as reported by and driven
/// through the consensus agent.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Leader,
    Candidate,
    Follower,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Why a client session was closed.  `None` while the session is open.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CloseReason {
    None,
    ClientAction,
    ServiceAction,
    Timeout,
}

/// Machine-readable codes surfaced to clients on session responses and
/// rejections.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventCode {
    Ok,
    Error,
    Challenged,
    AuthenticationRejected,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanvassPositionMsg {
    pub leadership_term_id: i64,
    pub log_position: i64,
    pub follower_member_id: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestVoteMsg {
    pub leadership_term_id: i64,
    pub log_position: i64,
    pub candidate_term_id: i64,
    pub candidate_id: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteMsg {
    pub candidate_term_id: i64,
    pub leadership_term_id: i64,
    pub log_position: i64,
    pub candidate_id: i32,
    pub follower_member_id: i32,
    pub vote: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewLeadershipTermMsg {
    pub leadership_term_id: i64,
    pub candidate_term_id: i64,
    pub log_position: i64,
    pub timestamp_ms: i64,
    pub leader_member_id: i32,
    pub log_session_id: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppendedPositionMsg {
    pub leadership_term_id: i64,
    pub log_position: i64,
    pub follower_member_id: i32,
}

/// The closed set of member status messages exchanged during elections.
///
/// Dispatch is a single match over this enum, so adding a message kind is
/// one variant plus one dispatch arm.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StatusMessage {
    CanvassPosition(CanvassPositionMsg),
    RequestVote(RequestVoteMsg),
    Vote(VoteMsg),
    NewLeadershipTerm(NewLeadershipTermMsg),
    AppendedPosition(AppendedPositionMsg),
}

impl std::fmt::Display for StatusMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let msg = match &self {
            StatusMessage::CanvassPosition(_) => "CanvassPosition",
            StatusMessage::RequestVote(_) => "RequestVote",
            StatusMessage::Vote(_) => "Vote",
            StatusMessage::NewLeadershipTerm(_) => "NewLeadershipTerm",
            StatusMessage::AppendedPosition(_) => "AppendedPosition",
        };
        write!(f, "{}", msg)
    }
}
