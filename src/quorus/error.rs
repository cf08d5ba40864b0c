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

use std::sync::Arc;

use crate::constant::{MAX_ENCODED_MEMBERSHIP_QUERY_LENGTH, MAX_ENCODED_PRINCIPAL_LENGTH};
use crate::types::EventCode;

#[derive(thiserror::Error, Debug, Clone)]
pub enum Error {
    /// An encoded principal exceeded its byte bound.  Fatal for the
    /// operation that produced it, never fatal for the process.
    #[error(
        "encoded principal max length {} exceeded: length={0}",
        MAX_ENCODED_PRINCIPAL_LENGTH
    )]
    MaxEncodedPrincipalExceeded(usize),

    /// An encoded membership query exceeded its byte bound.
    #[error(
        "encoded membership query max length {} exceeded: length={0}",
        MAX_ENCODED_MEMBERSHIP_QUERY_LENGTH
    )]
    MaxEncodedMembershipQueryExceeded(usize),

    /// A response publication was added to a session which already has one.
    /// Indicates a caller-contract breach, never silently overwritten.
    #[error("response publication already added for session {0}")]
    PublicationAlreadyAdded(i64),

    /// The cluster member descriptor text could not be parsed.
    #[error("invalid cluster member descriptor: {0}")]
    InvalidMemberDescriptor(String),

    /// A member id which is not part of the configured cluster.
    #[error("unknown cluster member id: {0}")]
    InvalidMemberId(i32),

    /// A channel given to the transport was malformed.  The affected
    /// session or member degrades to "not connected" and may retry.
    #[error("invalid channel: {0}")]
    InvalidChannel(String),

    /// A session was rejected with a machine-readable code.  Surfaced to
    /// the initiating client as a distinct, non-retryable failure.
    #[error("session rejected: {code:?} {detail}")]
    SessionRejected { code: EventCode, detail: String },

    #[error("broken io request")]
    Io(Arc<std::io::Error>),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::Io(Arc::new(err))
    }
}
