// Copyright (c) 2023 The TQUIC Authors.
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

use std::time::Duration;
use std::time::Instant;

/// Minimum RTT observed on the flow.
///
/// By default the estimate only ever goes down for the lifetime of the flow.
/// With an expiry configured, an estimate older than the expiry is replaced
/// by the next valid sample whatever its value, so that a path whose
/// propagation delay grew is eventually re-learned.
#[derive(Debug)]
pub struct MinRttTracker {
    /// The minimum RTT, None if no valid sample has been seen.
    min_rtt: Option<Duration>,

    /// The time at which the current min_rtt sample was obtained.
    stamp: Option<Instant>,

    /// Optional lifetime of a min_rtt sample.
    expiry: Option<Duration>,
}

impl MinRttTracker {
    /// Create a tracker. A seeded `initial_min_rtt` is stamped with `now`,
    /// so that it expires like any other sample.
    pub fn new(
        initial_min_rtt: Option<Duration>,
        expiry: Option<Duration>,
        now: Instant,
    ) -> Self {
        Self {
            min_rtt: initial_min_rtt,
            stamp: initial_min_rtt.map(|_| now),
            expiry,
        }
    }

    /// Feed an RTT sample, None meaning the sample carried no valid RTT.
    ///
    /// Return true if the estimate was replaced.
    pub fn observe(&mut self, rtt: Option<Duration>, now: Instant) -> bool {
        let rtt = match rtt {
            Some(rtt) => rtt,
            None => return false,
        };

        let is_lower = self.min_rtt.map_or(true, |min_rtt| rtt <= min_rtt);
        if !is_lower && !self.is_expired(now) {
            return false;
        }

        self.min_rtt = Some(rtt);
        self.stamp = Some(now);
        true
    }

    /// Whether the current estimate outlived the configured expiry.
    pub fn is_expired(&self, now: Instant) -> bool {
        match (self.expiry, self.stamp) {
            (Some(expiry), Some(stamp)) => now.saturating_duration_since(stamp) > expiry,
            _ => false,
        }
    }

    /// Return the minimum RTT, None if unknown.
    pub fn get(&self) -> Option<Duration> {
        self.min_rtt
    }

    /// Return the time the current estimate was taken.
    pub fn stamp(&self) -> Option<Instant> {
        self.stamp
    }
}
