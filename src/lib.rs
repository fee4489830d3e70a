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

//! LBBR is a Linear BBR congestion control engine, driven by delivery rate
//! samples and meant to be embedded in a transport stack.
//!
//! ## Features
//!
//! * **Model based**: the engine keeps a model of the path made of the
//!   windowed maximum delivery rate and the minimum round-trip time, and
//!   derives the congestion window and the pacing rate from it.
//! * **BBR startup**: the window tracks a high-gain multiple of the estimated
//!   BDP until the bandwidth estimate stops growing.
//! * **Linear steady state**: instead of gain cycling, the window saws around
//!   the estimated BDP, with additive increase and exponential back-off.
//! * **Deterministic**: all arithmetic is integer fixed-point, the same
//!   sequence of samples always yields the same windows and rates.
//!
//! ## Get started
//!
//! A transport creates one controller per flow with
//! [`build_congestion_controller`], feeds it a [`RateSample`] together with a
//! [`TransportState`] snapshot on every ACK event, and reads back
//! [`CongestionController::congestion_window`] and
//! [`CongestionController::pacing_rate`].
//!
//! The `lbbr_sim` tool in `tools/` drives the engine over a simulated link
//! and is a complete example.

/// Default maximum segment size in bytes, used until the transport reports
/// its own.
pub const DEFAULT_MSS: u32 = 1460;

/// A specialized [`Result`] type for LBBR operations.
///
/// This type is used throughout the public API for any operation that
/// can produce an error.
///
/// [`Result`]: https://doc.rust-lang.org/std/result/enum.Result.html
pub type Result<T> = std::result::Result<T, Error>;


pub use crate::congestion_control::build_congestion_controller;
pub use crate::congestion_control::pacing_rate;
pub use crate::congestion_control::target_window;
pub use crate::congestion_control::Bandwidth;
pub use crate::congestion_control::BandwidthFilter;
pub use crate::congestion_control::CongestionControlVariant;
pub use crate::congestion_control::CongestionController;
pub use crate::congestion_control::CongestionInfo;
pub use crate::congestion_control::CongestionStats;
pub use crate::congestion_control::FullBandwidthDetector;
pub use crate::congestion_control::Gain;
pub use crate::congestion_control::Lbbr;
pub use crate::congestion_control::LbbrConfig;
pub use crate::congestion_control::MinRttTracker;
pub use crate::congestion_control::Phase;
pub use crate::congestion_control::RateSample;
pub use crate::congestion_control::SmoothedBandwidth;
pub use crate::congestion_control::TransportState;
pub use crate::congestion_control::BW_SCALE;
pub use crate::congestion_control::BW_UNIT;
pub use crate::congestion_control::DEFAULT_INITIAL_CWND;
pub use crate::congestion_control::GAIN_SCALE;
pub use crate::congestion_control::GAIN_UNIT;
pub use crate::congestion_control::INFINITE_SSTHRESH;
pub use crate::congestion_control::MAX_BW_FILTER_ROUNDS;
pub use crate::congestion_control::MIN_CWND;
pub use crate::error::Error;

#[path = "congestion_control/congestion_control.rs"]
mod congestion_control;

pub mod error;
