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

//! A round-indexed windowed max filter for the bottleneck bandwidth.
//!
//! Delivery rate samples are noisy and mostly underestimate the bottleneck,
//! so the estimate is the supremum over the last few packet-timed rounds
//! rather than an average. The filter keeps the best sample of each round
//! it has seen within the window, at most `MAX_BW_FILTER_ROUNDS` entries,
//! and therefore always reports the exact windowed maximum.

use smallvec::SmallVec;

use super::fixed_point::Bandwidth;

/// Upper bound of the filter window, in rounds.
pub const MAX_BW_FILTER_ROUNDS: u64 = 10;

/// EWMA weight denominator, i.e. every sample moves the average by 1/8.
const BW_EWMA_ALPHA: u64 = 8;

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
struct BwSample {
    /// Round trip count.
    round: u64,

    /// Best delivery rate of the round.
    bw: Bandwidth,
}

/// Windowed max of delivery rate samples, indexed by round trip count.
#[derive(Debug)]
pub struct BandwidthFilter {
    /// The window length in rounds.
    window: u64,

    /// One entry per round in ascending round order.
    samples: SmallVec<[BwSample; MAX_BW_FILTER_ROUNDS as usize]>,
}

impl BandwidthFilter {
    /// Create a filter spanning `window` rounds, bounded to
    /// `[1, MAX_BW_FILTER_ROUNDS]`.
    pub fn new(window: u64) -> Self {
        Self {
            window: window.clamp(1, MAX_BW_FILTER_ROUNDS),
            samples: SmallVec::new(),
        }
    }

    /// Forget every sample.
    pub fn reset(&mut self) {
        self.samples.clear();
    }

    /// Insert the rate observed in `round` and return the windowed max.
    pub fn update(&mut self, round: u64, bw: Bandwidth) -> Bandwidth {
        if let Some(last) = self.samples.last_mut() {
            // Rounds should be monotonically increasing.
            if round < last.round {
                return self.get();
            }

            if round == last.round {
                last.bw = last.bw.max(bw);
                return self.get();
            }
        }

        // Purge rounds that slid out of the window.
        let window = self.window;
        self.samples.retain(|s| round.saturating_sub(s.round) < window);
        self.samples.push(BwSample { round, bw });

        debug_assert!(self.samples.len() as u64 <= self.window);
        self.get()
    }

    /// Get the windowed max.
    pub fn get(&self) -> Bandwidth {
        self.samples
            .iter()
            .map(|s| s.bw)
            .max()
            .unwrap_or(Bandwidth::ZERO)
    }

    /// Number of rounds currently held.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl Default for BandwidthFilter {
    fn default() -> Self {
        Self::new(MAX_BW_FILTER_ROUNDS)
    }
}

/// Exponentially weighted moving average of the windowed max.
#[derive(Debug, Default)]
pub struct SmoothedBandwidth {
    bw: Bandwidth,
}

impl SmoothedBandwidth {
    /// Fold one filter output into the average.
    ///
    /// The first non-zero value seeds the average directly.
    pub fn update(&mut self, max_bw: Bandwidth) -> Bandwidth {
        let prev = self.bw.raw();
        let next = if prev == 0 {
            max_bw.raw()
        } else {
            prev / BW_EWMA_ALPHA * (BW_EWMA_ALPHA - 1)
                + prev % BW_EWMA_ALPHA * (BW_EWMA_ALPHA - 1) / BW_EWMA_ALPHA
                + max_bw.raw() / BW_EWMA_ALPHA
        };

        self.bw = Bandwidth::from_raw(next);
        self.bw
    }

    pub fn get(&self) -> Bandwidth {
        self.bw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bw(n: u64) -> Bandwidth {
        Bandwidth::from_raw(n)
    }

    #[test]
    fn bw_filter_window_bound() {
        assert_eq!(BandwidthFilter::new(0).window, 1);
        assert_eq!(BandwidthFilter::new(100).window, MAX_BW_FILTER_ROUNDS);
        assert_eq!(BandwidthFilter::default().window, MAX_BW_FILTER_ROUNDS);
    }

    #[test]
    fn bw_filter_update_max() {
        let mut filter = BandwidthFilter::default();
        assert_eq!(filter.get(), Bandwidth::ZERO);
        assert!(filter.is_empty());

        // Uninitialised.
        assert_eq!(filter.update(1, bw(200)), bw(200));
        // Same round keeps the round max.
        assert_eq!(filter.update(1, bw(120)), bw(200));
        assert_eq!(filter.len(), 1);
        // Lower samples in later rounds do not lower the max.
        assert_eq!(filter.update(2, bw(150)), bw(200));
        assert_eq!(filter.update(5, bw(100)), bw(200));
        // Time should be monotonically increasing.
        assert_eq!(filter.update(4, bw(900)), bw(200));
        assert_eq!(filter.len(), 3);

        // Round 1 is still inside a window of 10 rounds at round 10.
        assert_eq!(filter.update(10, bw(90)), bw(200));
        // And slides out at round 11.
        assert_eq!(filter.update(11, bw(80)), bw(150));
        assert_eq!(filter.update(12, bw(80)), bw(100));
        assert_eq!(filter.update(14, bw(80)), bw(100));
        assert_eq!(filter.update(15, bw(80)), bw(90));
        // Nothing left in window but the new sample.
        assert_eq!(filter.update(100, bw(10)), bw(10));
        assert_eq!(filter.len(), 1);

        filter.reset();
        assert_eq!(filter.get(), Bandwidth::ZERO);
    }

    #[test]
    fn bw_filter_zero_rate() {
        let mut filter = BandwidthFilter::new(3);
        assert_eq!(filter.update(1, bw(0)), bw(0));
        assert_eq!(filter.update(2, bw(50)), bw(50));
        // Zero samples are kept but never raise the max.
        assert_eq!(filter.update(3, bw(0)), bw(50));
        assert_eq!(filter.update(4, bw(0)), bw(50));
        assert_eq!(filter.update(5, bw(0)), bw(0));
    }

    #[test]
    fn bw_filter_bounded_entries() {
        let mut filter = BandwidthFilter::default();
        for round in 0..1000 {
            filter.update(round, bw(round % 17));
            assert!(filter.len() as u64 <= MAX_BW_FILTER_ROUNDS);
        }
        // Only rounds 990..=999 are left in the window.
        let expected = (990..1000).map(|r| r % 17).max().unwrap();
        assert_eq!(filter.get(), bw(expected));
    }

    #[test]
    fn smoothed_bw() {
        let mut s = SmoothedBandwidth::default();
        assert_eq!(s.get(), Bandwidth::ZERO);

        // Zero does not seed.
        assert_eq!(s.update(bw(0)), bw(0));
        // First non-zero value seeds.
        assert_eq!(s.update(bw(800)), bw(800));
        // 800 * 7 / 8 + 1600 / 8
        assert_eq!(s.update(bw(1600)), bw(900));
        // 900 * 7 / 8 + 0 = 787.5, truncated.
        assert_eq!(s.update(bw(0)), bw(787));

        // A constant input is a fixed point when divisible by 8.
        let mut s = SmoothedBandwidth::default();
        let v = Bandwidth::from_segments_per_usec(1000);
        for _ in 0..100 {
            assert_eq!(s.update(v), v);
        }
    }
}
