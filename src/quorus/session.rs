//! Per-client session state tracked by the current leader.
//!
//! Sessions are independent of the election protocol but driven by it: a
//! leadership change disconnects response publications and the new leader
//! reconstructs sessions from the replicated log.  All mutation happens on
//! the single duty-cycle thread of the owning leader.

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

use log::warn;

use crate::constant::*;
use crate::error::Error;
use crate::transport::{Publication, Transport};
use crate::types::{CloseReason, EventCode};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SessionState {
    Init,
    Connected,
    Challenged,
    Authenticated,
    Rejected,
    Open,
    Closed,
}

pub struct ClusterSession {
    id: i64,
    correlation_id: i64,
    opened_log_position: i64,
    time_of_last_activity_ns: i64,
    response_stream_id: i32,
    response_channel: String,
    response_publication: Option<Box<dyn Publication>>,
    state: SessionState,
    close_reason: CloseReason,
    event_code: Option<EventCode>,
    response_detail: Option<String>,
    encoded_principal: Vec<u8>,
    has_new_leader_event_pending: bool,
    is_backup_query: bool,
}

impl ClusterSession {
    pub fn new(id: i64, response_stream_id: i32, response_channel: String) -> ClusterSession {
        ClusterSession {
            id,
            correlation_id: NULL_VALUE,
            opened_log_position: NULL_POSITION,
            time_of_last_activity_ns: 0,
            response_stream_id,
            response_channel,
            response_publication: None,
            state: SessionState::Init,
            close_reason: CloseReason::None,
            event_code: None,
            response_detail: None,
            encoded_principal: Vec::new(),
            has_new_leader_event_pending: false,
            is_backup_query: false,
        }
    }

    /// Reconstruct a session from a persisted snapshot.  A recorded close
    /// reason means the session was closed before the snapshot was taken.
    pub fn restore(
        id: i64,
        correlation_id: i64,
        opened_log_position: i64,
        time_of_last_activity_ns: i64,
        response_stream_id: i32,
        response_channel: String,
        close_reason: CloseReason,
    ) -> ClusterSession {
        let state = if close_reason != CloseReason::None {
            SessionState::Closed
        } else {
            SessionState::Open
        };

        ClusterSession {
            id,
            correlation_id,
            opened_log_position,
            time_of_last_activity_ns,
            response_stream_id,
            response_channel,
            response_publication: None,
            state,
            close_reason,
            event_code: None,
            response_detail: None,
            encoded_principal: Vec::new(),
            has_new_leader_event_pending: false,
            is_backup_query: false,
        }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn set_state(&mut self, state: SessionState) {
        self.state = state;
    }

    pub fn response_stream_id(&self) -> i32 {
        self.response_stream_id
    }

    pub fn response_channel(&self) -> &str {
        &self.response_channel
    }

    pub fn close_reason(&self) -> CloseReason {
        self.close_reason
    }

    /// Add the response publication for this session.  Calling this twice
    /// without an intervening `close()`/`disconnect()` is a caller-contract
    /// breach and fails; a malformed response channel is swallowed and the
    /// session simply stays unconnected.
    pub fn connect(&mut self, transport: &mut dyn Transport) -> Result<(), Error> {
        if self.response_publication.is_some() {
            return Err(Error::PublicationAlreadyAdded(self.id));
        }

        match transport.add_publication(&self.response_channel, self.response_stream_id) {
            Ok(publication) => {
                self.response_publication = Some(publication);
                Ok(())
            }
            Err(Error::InvalidChannel(channel)) => {
                warn!(
                    "session {} response channel {} is invalid, staying unconnected",
                    self.id, channel
                );
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Release the response publication without closing the logical
    /// session, e.g. on leadership change pending re-election.
    pub fn disconnect(&mut self) {
        if let Some(mut publication) = self.response_publication.take() {
            publication.close();
        }
    }

    pub fn close(&mut self, close_reason: CloseReason) {
        self.close_reason = close_reason;
        self.disconnect();
        self.state = SessionState::Closed;
    }

    pub fn is_response_publication_connected(&self) -> bool {
        self.response_publication
            .as_ref()
            .map(|p| p.is_connected())
            .unwrap_or(false)
    }

    /// Forward to the response publication, or report the absence of one.
    /// [`NOT_CONNECTED`] means "no destination", which callers must treat
    /// differently from a back-pressured send.
    pub fn offer(&mut self, buffer: &[u8]) -> i64 {
        match &mut self.response_publication {
            Some(publication) => publication.offer(buffer),
            None => NOT_CONNECTED,
        }
    }

    pub fn try_claim(&mut self, length: usize) -> i64 {
        match &mut self.response_publication {
            Some(publication) => publication.try_claim(length),
            None => NOT_CONNECTED,
        }
    }

    /// Record an optional authentication principal and move to
    /// `Authenticated`.  The principal is kept until the session opens.
    pub fn authenticate(&mut self, encoded_principal: Option<&[u8]>) -> Result<(), Error> {
        if let Some(principal) = encoded_principal {
            check_encoded_principal_length(principal)?;
            self.encoded_principal = principal.to_vec();
        }
        self.state = SessionState::Authenticated;
        Ok(())
    }

    /// Record the log position at which the session became visible to the
    /// replicated log.  The principal is no longer needed once open.
    pub fn open(&mut self, opened_log_position: i64) {
        self.opened_log_position = opened_log_position;
        self.state = SessionState::Open;
        self.encoded_principal = Vec::new();
    }

    pub fn encoded_principal(&self) -> &[u8] {
        &self.encoded_principal
    }

    /// Record a rejection; the caller is responsible for closing.
    pub fn reject(&mut self, code: EventCode, detail: String) {
        self.state = SessionState::Rejected;
        self.event_code = Some(code);
        self.response_detail = Some(detail);
    }

    pub fn event_code(&self) -> Option<EventCode> {
        self.event_code
    }

    pub fn response_detail(&self) -> Option<&str> {
        self.response_detail.as_deref()
    }

    pub fn last_activity(&mut self, time_ns: i64, correlation_id: i64) {
        self.time_of_last_activity_ns = time_ns;
        self.correlation_id = correlation_id;
    }

    pub fn time_of_last_activity_ns(&self) -> i64 {
        self.time_of_last_activity_ns
    }

    pub fn set_time_of_last_activity_ns(&mut self, time_ns: i64) {
        self.time_of_last_activity_ns = time_ns;
    }

    pub fn has_timed_out(&self, now_ns: i64, timeout_ns: i64) -> bool {
        now_ns > self.time_of_last_activity_ns + timeout_ns
    }

    pub fn correlation_id(&self) -> i64 {
        self.correlation_id
    }

    pub fn opened_log_position(&self) -> i64 {
        self.opened_log_position
    }

    pub fn has_new_leader_event_pending(&self) -> bool {
        self.has_new_leader_event_pending
    }

    pub fn set_new_leader_event_pending(&mut self, pending: bool) {
        self.has_new_leader_event_pending = pending;
    }

    pub fn is_backup_query(&self) -> bool {
        self.is_backup_query
    }

    pub fn set_backup_query(&mut self, is_backup_query: bool) {
        self.is_backup_query = is_backup_query;
    }
}

impl std::fmt::Debug for ClusterSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterSession")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("correlation_id", &self.correlation_id)
            .field("opened_log_position", &self.opened_log_position)
            .field("response_stream_id", &self.response_stream_id)
            .field("response_channel", &self.response_channel)
            .field("close_reason", &self.close_reason)
            .finish()
    }
}

pub fn check_encoded_principal_length(encoded_principal: &[u8]) -> Result<(), Error> {
    if encoded_principal.len() > MAX_ENCODED_PRINCIPAL_LENGTH {
        Err(Error::MaxEncodedPrincipalExceeded(encoded_principal.len()))
    } else {
        Ok(())
    }
}

pub fn check_encoded_membership_query_length(encoded_query: &[u8]) -> Result<(), Error> {
    if encoded_query.len() > MAX_ENCODED_MEMBERSHIP_QUERY_LENGTH {
        Err(Error::MaxEncodedMembershipQueryExceeded(encoded_query.len()))
    } else {
        Ok(())
    }
}
