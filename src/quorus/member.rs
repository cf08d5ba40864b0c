//! Per-peer identity and ballot bookkeeping.
//!
//! A [`ClusterMember`] is constructed once from cluster configuration and
//! reused across elections; the per-round fields are reset at the start of
//! each ballot.  The quorum arithmetic over a member slice lives here next
//! to the record it inspects.

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

use serde::{Deserialize, Serialize};

use crate::constant::*;
use crate::error::Error;
use crate::transport::PublicationHandle;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterMember {
    pub id: i32,
    pub client_endpoint: String,
    pub member_endpoint: String,
    pub log_endpoint: String,
    pub transfer_endpoint: String,
    pub archive_endpoint: String,

    /// Last leadership term this member has advertised.
    pub leadership_term_id: i64,

    /// Last replicated log position this member has advertised.
    pub log_position: i64,

    /// The term this member has been balloted for in the current round.
    pub candidate_term_id: i64,

    pub is_ballot_sent: bool,

    /// The member's vote in the current round, `None` while undecided.
    pub vote: Option<bool>,

    /// Outbound publication owned by the transport collaborator.
    #[serde(skip)]
    pub publication: Option<PublicationHandle>,
}

impl ClusterMember {
    pub fn new(
        id: i32,
        client_endpoint: String,
        member_endpoint: String,
        log_endpoint: String,
        transfer_endpoint: String,
        archive_endpoint: String,
    ) -> ClusterMember {
        ClusterMember {
            id,
            client_endpoint,
            member_endpoint,
            log_endpoint,
            transfer_endpoint,
            archive_endpoint,
            leadership_term_id: NULL_VALUE,
            log_position: NULL_POSITION,
            candidate_term_id: NULL_VALUE,
            is_ballot_sent: false,
            vote: None,
            publication: None,
        }
    }

    /// Parse the pipe-separated member descriptor text format, one member
    /// per `id,client,member,log,transfer,archive` record.
    pub fn parse(descriptor: &str) -> Result<Vec<ClusterMember>, Error> {
        let mut members = Vec::new();
        for record in descriptor.split('|') {
            if record.is_empty() {
                continue;
            }
            let fields = record.split(',').collect::<Vec<_>>();
            if fields.len() != 6 {
                return Err(Error::InvalidMemberDescriptor(record.to_string()));
            }
            let id = fields[0]
                .parse::<i32>()
                .map_err(|_| Error::InvalidMemberDescriptor(record.to_string()))?;
            members.push(ClusterMember::new(
                id,
                fields[1].to_string(),
                fields[2].to_string(),
                fields[3].to_string(),
                fields[4].to_string(),
                fields[5].to_string(),
            ));
        }
        if members.is_empty() {
            return Err(Error::InvalidMemberDescriptor(descriptor.to_string()));
        }
        Ok(members)
    }

    /// The inverse of [`ClusterMember::parse`].
    pub fn encode_as_string(members: &[ClusterMember]) -> String {
        members
            .iter()
            .map(|m| {
                format!(
                    "{},{},{},{},{},{}",
                    m.id,
                    m.client_endpoint,
                    m.member_endpoint,
                    m.log_endpoint,
                    m.transfer_endpoint,
                    m.archive_endpoint
                )
            })
            .collect::<Vec<_>>()
            .join("|")
    }

    /// Clear the per-round canvass and ballot fields.
    pub fn reset_ballot(&mut self) {
        self.leadership_term_id = NULL_VALUE;
        self.log_position = NULL_POSITION;
        self.candidate_term_id = NULL_VALUE;
        self.is_ballot_sent = false;
        self.vote = None;
    }

    /// Has this member advertised a canvass position for the current round?
    pub fn has_canvassed(&self) -> bool {
        self.log_position != NULL_POSITION
    }
}

/// Build the id to array-index lookup map for a member slice.
pub fn member_index_by_id(members: &[ClusterMember]) -> HashMap<i32, usize> {
    members
        .iter()
        .enumerate()
        .map(|(index, m)| (m.id, index))
        .collect::<HashMap<_, _>>()
}

/// Order two log states by `(leadership_term_id, log_position)`.
pub fn compare_log(
    lhs_term_id: i64,
    lhs_position: i64,
    rhs_term_id: i64,
    rhs_position: i64,
) -> std::cmp::Ordering {
    (lhs_term_id, lhs_position).cmp(&(rhs_term_id, rhs_position))
}

/// All members have canvassed and none is ahead of the candidate.
pub fn is_unanimous_candidate(members: &[ClusterMember], candidate: &ClusterMember) -> bool {
    members.iter().all(|m| {
        m.has_canvassed()
            && compare_log(
                candidate.leadership_term_id,
                candidate.log_position,
                m.leadership_term_id,
                m.log_position,
            ) != std::cmp::Ordering::Less
    })
}

/// A quorum of members have canvassed positions the candidate is not
/// behind.
pub fn is_quorum_candidate(members: &[ClusterMember], candidate: &ClusterMember) -> bool {
    let possible_votes = members
        .iter()
        .filter(|m| {
            m.has_canvassed()
                && compare_log(
                    candidate.leadership_term_id,
                    candidate.log_position,
                    m.leadership_term_id,
                    m.log_position,
                ) != std::cmp::Ordering::Less
        })
        .count();

    possible_votes >= quorum_threshold(members.len())
}

/// Begin a ballot: the candidate votes for itself, every other member
/// becomes undecided with no ballot sent.
pub fn become_candidate(members: &mut [ClusterMember], candidate_term_id: i64, candidate_id: i32) {
    for member in members.iter_mut() {
        if member.id == candidate_id {
            member.vote = Some(true);
            member.candidate_term_id = candidate_term_id;
            member.is_ballot_sent = true;
        } else {
            member.vote = None;
            member.candidate_term_id = NULL_VALUE;
            member.is_ballot_sent = false;
        }
    }
}

/// Every member has decided for this term and the affirmative votes reach
/// majority.  Distinct member ids only; an abstention fails the full count.
pub fn has_won_vote_on_full_count(members: &[ClusterMember], candidate_term_id: i64) -> bool {
    let mut votes = 0;
    for member in members {
        if member.candidate_term_id != candidate_term_id {
            return false;
        }
        match member.vote {
            Some(true) => votes += 1,
            Some(false) => {}
            None => return false,
        }
    }
    votes >= quorum_threshold(members.len())
}

/// The affirmative votes recorded for this term reach majority, undecided
/// members notwithstanding.
pub fn has_majority_vote(members: &[ClusterMember], candidate_term_id: i64) -> bool {
    let votes = members
        .iter()
        .filter(|m| m.candidate_term_id == candidate_term_id && m.vote == Some(true))
        .count();

    votes >= quorum_threshold(members.len())
}

/// Every member has acknowledged `position` for `leadership_term_id`.
pub fn have_voters_reached_position(
    members: &[ClusterMember],
    position: i64,
    leadership_term_id: i64,
) -> bool {
    members
        .iter()
        .all(|m| m.leadership_term_id == leadership_term_id && m.log_position >= position)
}

pub fn reset_log_positions(members: &mut [ClusterMember], position: i64) {
    for member in members.iter_mut() {
        member.log_position = position;
    }
}
