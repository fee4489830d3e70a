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

use super::fixed_point::Bandwidth;
use super::fixed_point::Gain;

/// Max count of rounds without significant bandwidth growth, before the pipe
/// is supposed to be filled.
pub const FULL_BW_COUNT_THRESHOLD: u32 = 3;

/// Full bandwidth detector, used to leave the startup phase.
///
/// It looks for a plateau in the bandwidth estimate: as long as the estimate
/// grows by at least `Gain::FULL_BW_THRESH` (1.25x, matching what the startup
/// gain can produce per round) it keeps a new baseline, and it latches once
/// `FULL_BW_COUNT_THRESHOLD` consecutive checks saw less growth.
#[derive(Debug, Default)]
pub struct FullBandwidthDetector {
    /// Baseline level delivery rate.
    full_bw: Bandwidth,

    /// The number of checks without much growth.
    full_bw_count: u32,

    /// Whether the pipe was ever filled. Never goes back to false.
    reached: bool,
}

impl FullBandwidthDetector {
    /// Check the current bandwidth estimate against the baseline.
    ///
    /// Application-limited samples say nothing about the available
    /// capacity and are skipped.
    pub fn check(&mut self, max_bw: Bandwidth, is_app_limited: bool) -> bool {
        if self.reached || is_app_limited {
            return self.reached;
        }

        // Bandwidth still growing?
        if max_bw >= self.full_bw.mul_gain(Gain::FULL_BW_THRESH) {
            self.full_bw = max_bw;
            self.full_bw_count = 0;
            return false;
        }

        // Another round w/o much growth.
        self.full_bw_count = self.full_bw_count.saturating_add(1);
        if self.full_bw_count >= FULL_BW_COUNT_THRESHOLD {
            self.reached = true;
        }

        self.reached
    }

    /// Whether full bandwidth has been reached.
    pub fn is_reached(&self) -> bool {
        self.reached
    }

    /// The current baseline.
    pub fn full_bw(&self) -> Bandwidth {
        self.full_bw
    }

    /// Consecutive checks without significant growth.
    pub fn stall_count(&self) -> u32 {
        self.full_bw_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bw(n: u64) -> Bandwidth {
        Bandwidth::from_raw(n)
    }

    #[test]
    fn full_bw_plateau() {
        let mut d = FullBandwidthDetector::default();
        assert!(!d.is_reached());

        // Any estimate beats the zero baseline.
        assert!(!d.check(bw(100), false));
        assert_eq!(d.full_bw(), bw(100));
        assert_eq!(d.stall_count(), 0);

        // 1.25x growth resets the count.
        assert!(!d.check(bw(125), false));
        assert_eq!(d.full_bw(), bw(125));
        assert_eq!(d.stall_count(), 0);

        // 125 * 1.25 = 156.25, truncated to 156.
        assert!(!d.check(bw(155), false));
        assert_eq!(d.stall_count(), 1);
        assert!(!d.check(bw(155), false));
        assert_eq!(d.stall_count(), 2);
        assert_eq!(d.full_bw(), bw(125));

        // App-limited samples are skipped.
        assert!(!d.check(bw(100), true));
        assert_eq!(d.stall_count(), 2);

        assert!(d.check(bw(155), false));
        assert!(d.is_reached());
        assert_eq!(d.stall_count(), FULL_BW_COUNT_THRESHOLD);
    }

    #[test]
    fn full_bw_latches() {
        let mut d = FullBandwidthDetector::default();
        d.check(bw(1000), false);
        for _ in 0..FULL_BW_COUNT_THRESHOLD {
            d.check(bw(1000), false);
        }
        assert!(d.is_reached());

        // Later growth never clears the latch nor touches the baseline.
        assert!(d.check(bw(1_000_000), false));
        assert!(d.check(bw(0), true));
        assert_eq!(d.full_bw(), bw(1000));
        assert!(d.is_reached());
    }

    #[test]
    fn full_bw_growth_interrupts_stall() {
        let mut d = FullBandwidthDetector::default();
        d.check(bw(1000), false);
        d.check(bw(1000), false);
        d.check(bw(1000), false);
        assert_eq!(d.stall_count(), 2);

        // Growth on the third round starts over.
        assert!(!d.check(bw(1250), false));
        assert_eq!(d.stall_count(), 0);
        assert!(!d.check(bw(1250), false));
        assert!(!d.check(bw(1250), false));
        assert!(d.check(bw(1250), false));
    }
}
