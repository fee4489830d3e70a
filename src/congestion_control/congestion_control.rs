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

use core::str::FromStr;
use std::fmt;
use std::io::Write;
use std::time::Duration;
use std::time::Instant;

use serde::Serialize;
use strum_macros::EnumIter;
use strum_macros::IntoStaticStr;

use crate::Error;
use crate::Result;
pub use bandwidth_filter::BandwidthFilter;
pub use bandwidth_filter::SmoothedBandwidth;
pub use bandwidth_filter::MAX_BW_FILTER_ROUNDS;
pub use bdp::pacing_rate;
pub use bdp::target_window;
pub use bdp::DEFAULT_INITIAL_CWND;
pub use fixed_point::Bandwidth;
pub use fixed_point::Gain;
pub use fixed_point::BW_SCALE;
pub use fixed_point::BW_UNIT;
pub use fixed_point::GAIN_SCALE;
pub use fixed_point::GAIN_UNIT;
pub use full_bw::FullBandwidthDetector;
pub use lbbr::Lbbr;
pub use lbbr::LbbrConfig;
pub use lbbr::Phase;
pub use min_rtt::MinRttTracker;

/// The minimal congestion window in segments. The window never goes below
/// it, whatever the model says.
pub const MIN_CWND: u32 = 2;

/// Sentinel slow start threshold, meaning "not set".
pub const INFINITE_SSTHRESH: u32 = u32::MAX;

/// Available flavours of the Linear BBR window controller.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Default, EnumIter, IntoStaticStr)]
pub enum CongestionControlVariant {
    /// After startup, the window saws around the estimated BDP: it grows
    /// additively up to twice the BDP, then backs off exponentially down to
    /// 0.8 BDP, and starts over. Pacing follows a smoothed bandwidth.
    #[default]
    #[strum(serialize = "LBBR")]
    Oscillating,

    /// After startup, classic slow start up to ssthresh followed by additive
    /// increase, never backing off on its own. Windows are rounded to an
    /// even segment count.
    #[strum(serialize = "LBBR-BASIC")]
    Basic,
}

impl FromStr for CongestionControlVariant {
    type Err = Error;

    fn from_str(variant: &str) -> Result<CongestionControlVariant> {
        if variant.eq_ignore_ascii_case("lbbr") || variant.eq_ignore_ascii_case("oscillating")
        {
            Ok(CongestionControlVariant::Oscillating)
        } else if variant.eq_ignore_ascii_case("lbbr-basic")
            || variant.eq_ignore_ascii_case("basic")
        {
            Ok(CongestionControlVariant::Basic)
        } else {
            Err(Error::InvalidConfig(format!("unknown variant {}", variant)))
        }
    }
}

impl fmt::Display for CongestionControlVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name: &'static str = self.into();
        write!(f, "{}", name)
    }
}

/// Delivery rate sample produced by the transport for an ACK event.
#[derive(Debug, Clone, Copy)]
pub struct RateSample {
    /// Time the ACK was processed.
    pub now: Instant,

    /// Segments delivered over the sampling interval.
    pub delivered: u64,

    /// The length of the sampling interval. Zero means no valid rate.
    pub interval: Duration,

    /// The RTT sample, None if the ACK carried no valid RTT.
    pub rtt: Option<Duration>,

    /// Whether the sample was taken while the sender was application-limited.
    pub is_app_limited: bool,

    /// The cumulative delivered count when the most recently acknowledged
    /// segment was sent.
    pub prior_delivered: u64,

    /// Segments newly acknowledged or selectively acknowledged by this ACK.
    pub acked_sacked: u32,
}

impl Default for RateSample {
    fn default() -> Self {
        Self {
            now: Instant::now(),
            delivered: 0,
            interval: Duration::ZERO,
            rtt: None,
            is_app_limited: false,
            prior_delivered: 0,
            acked_sacked: 0,
        }
    }
}

/// Snapshot of the transport state the controller reads on each sample.
#[derive(Debug, Clone, Copy)]
pub struct TransportState {
    /// Total segments delivered over the lifetime of the flow.
    pub delivered: u64,

    /// Segments currently in flight.
    pub in_flight: u32,

    /// Upper bound of the congestion window in segments.
    pub cwnd_clamp: u32,

    /// Upper bound of the pacing rate in bytes per second.
    pub max_pacing_rate: u64,

    /// Whether the sender was limited by the congestion window.
    pub is_cwnd_limited: bool,

    /// Maximum segment size in bytes.
    pub mss: u32,
}

impl Default for TransportState {
    fn default() -> Self {
        Self {
            delivered: 0,
            in_flight: 0,
            cwnd_clamp: u32::MAX,
            max_pacing_rate: u64::MAX,
            is_cwnd_limited: true,
            mss: crate::DEFAULT_MSS,
        }
    }
}

/// Congestion control statistics.
#[derive(Debug, Default, Clone, Serialize)]
pub struct CongestionStats {
    /// Rate samples processed.
    pub samples: u64,

    /// Samples without a usable delivery rate.
    pub invalid_rate_samples: u64,

    /// Samples without a valid RTT.
    pub invalid_rtt_samples: u64,

    /// Segments acked in startup.
    pub acked_in_startup: u64,

    /// Total segments acked.
    pub acked_in_total: u64,
}

/// Diagnostics snapshot of a congestion controller.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CongestionInfo {
    /// Bandwidth estimate in bytes per second.
    pub bw: u64,

    /// Minimum RTT in microseconds, absent if unknown.
    pub min_rtt_us: Option<u64>,

    /// Internal slow start threshold in segments.
    pub ssthresh: u32,

    /// Window matching the estimated BDP, in segments.
    pub target_cwnd: u32,

    /// Current phase name.
    pub phase: &'static str,

    /// Current congestion window in segments.
    pub cwnd: u32,

    /// Current pacing rate in bytes per second.
    pub pacing_rate: u64,

    /// Count of packet-timed round trips.
    pub round_count: u64,
}

impl CongestionInfo {
    /// Write the snapshot as a single JSON line.
    pub fn write_json<W: Write>(&self, writer: &mut W) -> Result<()> {
        serde_json::to_writer(&mut *writer, self)?;
        writer.write_all(b"\n")?;
        Ok(())
    }
}

/// Congestion control interfaces.
///
/// The owner of a flow drives the controller with one rate sample per ACK
/// event, serially, and reads back the window and the pacing rate.
pub trait CongestionController {
    /// Name of congestion control algorithm.
    fn name(&self) -> &str;

    /// Update the path model and the control parameters from a rate sample.
    fn on_rate_sample(&mut self, sample: &RateSample, transport: &TransportState);

    /// Current congestion window in segments.
    fn congestion_window(&self) -> u32;

    /// Current pacing rate in bytes per second.
    /// If the algorithm does not estimate pacing rate, return None.
    fn pacing_rate(&self) -> Option<u64> {
        None
    }

    /// Slow start threshold reported to the transport for loss response.
    fn ssthresh(&self) -> u32 {
        INFINITE_SSTHRESH
    }

    /// Check if in slow start.
    fn in_slow_start(&self) -> bool {
        false
    }

    /// Initial congestion window.
    fn initial_window(&self) -> u32;

    /// Minimal congestion window.
    fn minimal_window(&self) -> u32 {
        MIN_CWND
    }

    /// Diagnostics snapshot, read from the owning context only.
    fn info(&self) -> Option<CongestionInfo> {
        None
    }

    /// Congestion stats.
    fn stats(&self) -> &CongestionStats;
}

impl fmt::Debug for dyn CongestionController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "congestion controller.")
    }
}

/// Build a congestion controller.
pub fn build_congestion_controller(conf: &LbbrConfig) -> Result<Box<dyn CongestionController>> {
    conf.validate()?;
    Ok(Box::new(Lbbr::new(conf.clone())))
}


mod bandwidth_filter;
mod bdp;
mod fixed_point;
mod full_bw;
mod lbbr;
mod min_rtt;
