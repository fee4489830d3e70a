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

//! Conversion of the path model into control parameters.
//!
//! Both functions are pure: the same (bandwidth, RTT, gain) always yields the
//! same window and rate. Rounding follows the kernel BBR family: the window
//! is rounded up so that a non-zero BDP never yields a zero window, and every
//! other step truncates.

use std::time::Duration;

use super::fixed_point::saturate_u64;
use super::fixed_point::Bandwidth;
use super::fixed_point::Gain;
use super::fixed_point::BW_SCALE;
use super::fixed_point::BW_UNIT;
use super::fixed_point::GAIN_SCALE;

/// Default initial congestion window in segments, used when no BDP can be
/// estimated because no RTT sample exists yet.
pub const DEFAULT_INITIAL_CWND: u32 = 10;

const USEC_PER_SEC: u128 = 1_000_000;

/// Window (in segments) needed to keep `gain` times the BDP in flight.
///
/// `ceil(bw * min_rtt * gain)`. If `round_even` is set, the result is rounded
/// up to the next even segment count to reduce the effect of delayed ACKs.
pub fn target_window(
    bw: Bandwidth,
    min_rtt: Option<Duration>,
    gain: Gain,
    round_even: bool,
) -> u32 {
    // No valid RTT sample yet?
    let min_rtt = match min_rtt {
        Some(min_rtt) => min_rtt,
        None => return DEFAULT_INITIAL_CWND,
    };

    let w = bw.raw() as u128 * min_rtt.as_micros();

    // Apply a gain to the given value, then remove the BW_SCALE shift.
    let cwnd = (((w * gain.raw() as u128) >> GAIN_SCALE) + BW_UNIT as u128 - 1) >> BW_SCALE;
    let cwnd = u32::try_from(cwnd).unwrap_or(u32::MAX);

    if round_even && cwnd % 2 == 1 {
        return cwnd.saturating_add(1);
    }

    cwnd
}

/// Pacing rate in bytes per second for `gain` times `bw`, bounded by the
/// transport's `max_pacing_rate`.
pub fn pacing_rate(bw: Bandwidth, gain: Gain, mss: u32, max_pacing_rate: u64) -> u64 {
    let rate = bw.raw() as u128 * mss as u128;
    let rate = (rate * gain.raw() as u128) >> GAIN_SCALE;
    let rate = (rate * USEC_PER_SEC) >> BW_SCALE;

    saturate_u64(rate).min(max_pacing_rate)
}

/// Nominal bandwidth of a window sent once per `rtt`, used to seed the pacing
/// rate before any delivery rate is known.
pub fn window_bandwidth(cwnd: u32, rtt: Duration) -> Bandwidth {
    let rtt = rtt.max(Duration::from_micros(1));
    Bandwidth::from_delivery(cwnd as u64, rtt).unwrap_or(Bandwidth::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_window_without_rtt() {
        let bw = Bandwidth::from_segments_per_usec(1000);
        assert_eq!(target_window(bw, None, Gain::UNIT, false), DEFAULT_INITIAL_CWND);
        assert_eq!(target_window(bw, None, Gain::STARTUP, true), DEFAULT_INITIAL_CWND);
        assert_eq!(target_window(Bandwidth::ZERO, None, Gain::UNIT, false), 10);
    }

    #[test]
    fn target_window_bdp() {
        let bw = Bandwidth::from_segments_per_usec(1000);
        let rtt = Some(Duration::from_micros(100));

        assert_eq!(target_window(bw, rtt, Gain::UNIT, false), 100_000);
        assert_eq!(target_window(bw, rtt, Gain::STEADY, false), 200_000);
        // 100000 * 204 / 256 = 79687.5, rounded up.
        assert_eq!(target_window(bw, rtt, Gain::FLOOR, false), 79_688);
        assert_eq!(target_window(bw, rtt, Gain::FLOOR, true), 79_688);
        // 100000 * 739 / 256 = 288671.875, rounded up.
        assert_eq!(target_window(bw, rtt, Gain::STARTUP, false), 288_672);

        // Zero bandwidth or zero RTT means an empty pipe.
        assert_eq!(target_window(Bandwidth::ZERO, rtt, Gain::UNIT, false), 0);
        assert_eq!(target_window(bw, Some(Duration::ZERO), Gain::UNIT, false), 0);
    }

    #[test]
    fn target_window_rounding() {
        // 1/3 segment per us over 10us is 3.33 segments.
        let bw = Bandwidth::from_delivery(1, Duration::from_micros(3)).unwrap();
        let rtt = Some(Duration::from_micros(10));
        assert_eq!(target_window(bw, rtt, Gain::UNIT, false), 4);
        assert_eq!(target_window(bw, rtt, Gain::UNIT, true), 4);

        // Exactly 3 segments stays at 3, unless even rounding applies.
        let bw = Bandwidth::from_segments_per_usec(1);
        let rtt = Some(Duration::from_micros(3));
        assert_eq!(target_window(bw, rtt, Gain::UNIT, false), 3);
        assert_eq!(target_window(bw, rtt, Gain::UNIT, true), 4);
    }

    #[test]
    fn target_window_saturates() {
        let bw = Bandwidth::from_raw(u64::MAX);
        let rtt = Some(Duration::from_secs(100));
        assert_eq!(target_window(bw, rtt, Gain::STARTUP, false), u32::MAX);
        assert_eq!(target_window(bw, rtt, Gain::STARTUP, true), u32::MAX);
    }

    #[test]
    fn pacing_rate_conversion() {
        // 1 segment per 10us of 1000 bytes is 100MB/s, less the truncation of
        // the scaled rate.
        let bw = Bandwidth::from_delivery(1, Duration::from_micros(10)).unwrap();
        assert_eq!(pacing_rate(bw, Gain::UNIT, 1000, u64::MAX), 99_999_964);
        assert_eq!(
            pacing_rate(Bandwidth::from_segments_per_usec(1), Gain::UNIT, 1000, u64::MAX),
            1_000_000_000
        );
        assert_eq!(
            pacing_rate(Bandwidth::from_segments_per_usec(1), Gain::STEADY, 1000, u64::MAX),
            2_000_000_000
        );

        // Bounded by the transport.
        assert_eq!(
            pacing_rate(Bandwidth::from_segments_per_usec(1), Gain::STEADY, 1000, 12_500),
            12_500
        );
        assert_eq!(pacing_rate(Bandwidth::ZERO, Gain::STARTUP, 1000, u64::MAX), 0);
        assert_eq!(
            pacing_rate(Bandwidth::from_raw(u64::MAX), Gain::STARTUP, u32::MAX, u64::MAX),
            u64::MAX
        );
    }

    #[test]
    fn window_bandwidth_seed() {
        assert_eq!(
            window_bandwidth(10, Duration::from_micros(10)),
            Bandwidth::from_segments_per_usec(1)
        );
        // Sub-microsecond RTTs are treated as 1us.
        assert_eq!(
            window_bandwidth(10, Duration::ZERO),
            Bandwidth::from_segments_per_usec(10)
        );
    }
}
