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

//! Base-2 fixed-point quantities used by the controller.
//!
//! Delivery rates are kept in segments per microsecond scaled by 2^24 and
//! gains are scaled by 2^8. All multiplications go through 128-bit
//! intermediates and saturate when narrowed back.

use std::fmt;
use std::time::Duration;

use serde::Serialize;

/// Scale of [`Bandwidth`], in bits.
pub const BW_SCALE: u32 = 24;

/// Raw value of one segment per microsecond.
pub const BW_UNIT: u64 = 1 << BW_SCALE;

/// Scale of [`Gain`], in bits.
pub const GAIN_SCALE: u32 = 8;

/// Raw value of a gain of 1.0.
pub const GAIN_UNIT: u32 = 1 << GAIN_SCALE;

const USEC_PER_SEC: u128 = 1_000_000;

/// Narrow a 128-bit intermediate back to 64 bits.
pub(crate) fn saturate_u64(v: u128) -> u64 {
    u64::try_from(v).unwrap_or(u64::MAX)
}

/// Delivery rate in segments per microsecond, scaled by `BW_UNIT`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Bandwidth(u64);

impl Bandwidth {
    pub const ZERO: Bandwidth = Bandwidth(0);

    /// Wrap a value already scaled by `BW_UNIT`.
    pub const fn from_raw(raw: u64) -> Self {
        Bandwidth(raw)
    }

    /// Build a rate of `n` whole segments per microsecond.
    pub fn from_segments_per_usec(n: u64) -> Self {
        Bandwidth(n.saturating_mul(BW_UNIT))
    }

    /// Rate of `delivered` segments over `interval`.
    ///
    /// Return None if the interval is shorter than one microsecond, since no
    /// meaningful rate can be derived from it.
    pub fn from_delivery(delivered: u64, interval: Duration) -> Option<Self> {
        let interval_us = interval.as_micros();
        if interval_us == 0 {
            return None;
        }

        let bw = delivered as u128 * BW_UNIT as u128 / interval_us;
        Some(Bandwidth(saturate_u64(bw)))
    }

    /// Raw scaled value.
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Scale by a gain, truncating.
    pub fn mul_gain(self, gain: Gain) -> Self {
        let v = (self.0 as u128 * gain.raw() as u128) >> GAIN_SCALE;
        Bandwidth(saturate_u64(v))
    }

    /// Convert to bytes per second for segments of `mss` bytes.
    pub fn to_bytes_per_sec(self, mss: u32) -> u64 {
        let v = (self.0 as u128 * mss as u128 * USEC_PER_SEC) >> BW_SCALE;
        saturate_u64(v)
    }
}

impl fmt::Display for Bandwidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 >> BW_SCALE;
        let frac = (self.0 & (BW_UNIT - 1)) * 1000 >> BW_SCALE;
        write!(f, "{}.{:03}pkt/us", whole, frac)
    }
}

/// Multiplier applied to an estimate, scaled by `GAIN_UNIT`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Gain(u32);

impl Gain {
    /// A gain of exactly 1.0.
    pub const UNIT: Gain = Gain(GAIN_UNIT);

    /// Startup gain, 2/ln(2) rounded up so the sending rate can double
    /// every round.
    pub const STARTUP: Gain = Gain(GAIN_UNIT * 2885 / 1000 + 1);

    /// Gain used for both pacing and cwnd once the pipe is full. It
    /// tolerates delayed and stretched ACKs.
    pub const STEADY: Gain = Gain(GAIN_UNIT * 2);

    /// Bandwidth growth (1.25x) that still counts as "more bandwidth may be
    /// available".
    pub const FULL_BW_THRESH: Gain = Gain(GAIN_UNIT * 5 / 4);

    /// Floor of the decrease phase relative to the estimated BDP (0.8x).
    pub const FLOOR: Gain = Gain(GAIN_UNIT * 80 / 100);

    /// Wrap a value already scaled by `GAIN_UNIT`.
    pub const fn from_raw(raw: u32) -> Self {
        Gain(raw)
    }

    /// Raw scaled value.
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Gain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 >> GAIN_SCALE;
        let frac = (self.0 & (GAIN_UNIT - 1)) * 1000 >> GAIN_SCALE;
        write!(f, "{}.{:03}", whole, frac)
    }
}
