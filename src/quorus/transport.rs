//! Capability traits over the wire-level transport.
//!
//! The byte-level transport is an external collaborator.  This module only
//! defines the seams the election and session machinery needs: an owned
//! outbound [`Publication`] for session responses, a copyable
//! [`PublicationHandle`] referencing a transport-owned publication for
//! member status traffic, and the [`Transport`] factory.

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

use crate::error::Error;

/// A reference to a transport-owned outbound publication.  Cluster members
/// hold one of these, never the publication itself.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PublicationHandle(pub u64);

/// An exclusively-owned outbound stream.
pub trait Publication {
    /// Append a buffer, returning the new stream position or one of the
    /// negative sentinels in [`crate::constant`].
    fn offer(&mut self, buffer: &[u8]) -> i64;

    /// Claim a range for zero-copy encoding, returning the new stream
    /// position or a negative sentinel.
    fn try_claim(&mut self, length: usize) -> i64;

    fn is_connected(&self) -> bool;

    fn close(&mut self);
}

/// The factory seam through which sessions obtain response publications.
pub trait Transport {
    /// Add a publication for `channel`/`stream_id`.
    ///
    /// A malformed channel fails with [`Error::InvalidChannel`]; callers in
    /// this crate swallow that failure and degrade to "not connected".
    fn add_publication(
        &mut self,
        channel: &str,
        stream_id: i32,
    ) -> Result<Box<dyn Publication>, Error>;
}
