//! The crate `constant` defines a set constant used by quorus.

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

/// A special value is used to mark an unset id or term.
pub const NULL_VALUE: i64 = -1;

/// A special value is used to mark an unknown replicated log position.
pub const NULL_POSITION: i64 = -1;

/// A special value is used to mark an illegal or unset member id.
pub const NULL_MEMBER_ID: i32 = -1;

/// A special value is used to mark an unset log session id.
pub const NULL_SESSION_ID: i32 = -1;

/// Returned by offer/claim when no destination publication exists.
pub const NOT_CONNECTED: i64 = -1;

/// Returned by offer/claim when the publication rejected the send due to
/// back pressure.  Distinct from [`NOT_CONNECTED`]: callers must be able to
/// tell "retry later" apart from "nowhere to send".
pub const BACK_PRESSURED: i64 = -2;

/// Returned by offer/claim when an administrative action is in progress.
pub const ADMIN_ACTION: i64 = -3;

/// Returned by offer/claim when the publication has been closed.
pub const PUBLICATION_CLOSED: i64 = -4;

/// The maximum number of bytes of an encoded authentication principal.
pub const MAX_ENCODED_PRINCIPAL_LENGTH: usize = 4 * 1024;

/// The maximum number of bytes of an encoded membership query.
pub const MAX_ENCODED_MEMBERSHIP_QUERY_LENGTH: usize = 4 * 1024;

/// The number of affirmative voters required to win a ballot over a cluster
/// of `member_count` members, including the candidate itself.
pub fn quorum_threshold(member_count: usize) -> usize {
    member_count / 2 + 1
}
