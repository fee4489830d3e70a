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

//! Linear BBR Congestion Control.
//!
//! Like BBR, Linear BBR builds an explicit model of the path from the
//! delivery rate and round-trip time samples of the flow: the maximum recent
//! bandwidth and the minimum round-trip delay. Startup is BBR's: the window
//! tracks a high-gain multiple of the estimated BDP until the bandwidth
//! estimate plateaus.
//!
//! The steady state differs. Instead of gain cycling with a ProbeRTT phase,
//! the window moves along a sawtooth around the BDP: additive increase until
//! the window exceeds twice the BDP, then exponential back-off down to 0.8
//! BDP, and again. Loss response is left entirely to the transport, which is
//! why the reported slow start threshold is always infinite.

use std::time::Duration;
use std::time::Instant;

use log::*;
use strum_macros::IntoStaticStr;

use super::bandwidth_filter::BandwidthFilter;
use super::bandwidth_filter::SmoothedBandwidth;
use super::bandwidth_filter::MAX_BW_FILTER_ROUNDS;
use super::bdp;
use super::fixed_point::Bandwidth;
use super::fixed_point::Gain;
use super::full_bw::FullBandwidthDetector;
use super::min_rtt::MinRttTracker;
use super::CongestionControlVariant;
use super::CongestionController;
use super::CongestionInfo;
use super::CongestionStats;
use super::RateSample;
use super::TransportState;
use super::INFINITE_SSTHRESH;
use super::MIN_CWND;
use crate::Error;
use crate::Result;

/// RTT assumed for the initial pacing rate when none is known.
const DEFAULT_PACING_RTT: Duration = Duration::from_millis(1);

/// LBBR configurable parameters.
#[derive(Debug, Clone)]
pub struct LbbrConfig {
    /// Window controller flavour.
    variant: CongestionControlVariant,

    /// Initial congestion window in segments.
    initial_cwnd: u32,

    /// Length of the bandwidth max filter, in rounds.
    bw_filter_rounds: u64,

    /// Lifetime of a min RTT sample. None keeps the min RTT for the whole
    /// flow.
    min_rtt_expiry: Option<Duration>,

    /// Min RTT already known to the transport when the flow starts.
    initial_min_rtt: Option<Duration>,

    /// Segment size in bytes assumed until the transport reports one.
    mss: u32,
}

impl LbbrConfig {
    pub fn new(
        variant: CongestionControlVariant,
        initial_cwnd: u32,
        initial_min_rtt: Option<Duration>,
        mss: u32,
    ) -> Self {
        Self {
            variant,
            initial_cwnd,
            initial_min_rtt,
            mss,
            ..Self::default()
        }
    }

    /// Set the window controller flavour.
    pub fn set_variant(&mut self, variant: CongestionControlVariant) -> &mut Self {
        self.variant = variant;
        self
    }

    /// Set the initial congestion window in segments.
    pub fn set_initial_cwnd(&mut self, initial_cwnd: u32) -> &mut Self {
        self.initial_cwnd = initial_cwnd;
        self
    }

    /// Set the length of the bandwidth filter, in rounds.
    pub fn set_bw_filter_rounds(&mut self, rounds: u64) -> &mut Self {
        self.bw_filter_rounds = rounds;
        self
    }

    /// Enable expiry of the min RTT estimate.
    pub fn set_min_rtt_expiry(&mut self, expiry: Option<Duration>) -> &mut Self {
        self.min_rtt_expiry = expiry;
        self
    }

    /// Seed the min RTT estimate.
    pub fn set_initial_min_rtt(&mut self, min_rtt: Option<Duration>) -> &mut Self {
        self.initial_min_rtt = min_rtt;
        self
    }

    /// Set the segment size assumed before the first sample.
    pub fn set_mss(&mut self, mss: u32) -> &mut Self {
        self.mss = mss;
        self
    }

    pub fn variant(&self) -> CongestionControlVariant {
        self.variant
    }

    /// Check that the parameters describe a usable controller.
    pub fn validate(&self) -> Result<()> {
        if self.initial_cwnd < MIN_CWND {
            return Err(Error::InvalidConfig(format!(
                "initial_cwnd {} below {}",
                self.initial_cwnd, MIN_CWND
            )));
        }

        if !(1..=MAX_BW_FILTER_ROUNDS).contains(&self.bw_filter_rounds) {
            return Err(Error::InvalidConfig(format!(
                "bw_filter_rounds {} not in [1, {}]",
                self.bw_filter_rounds, MAX_BW_FILTER_ROUNDS
            )));
        }

        if self.min_rtt_expiry == Some(Duration::ZERO) {
            return Err(Error::InvalidConfig("zero min_rtt_expiry".into()));
        }

        if self.mss == 0 {
            return Err(Error::InvalidConfig("zero mss".into()));
        }

        Ok(())
    }
}

impl Default for LbbrConfig {
    fn default() -> Self {
        Self {
            variant: CongestionControlVariant::default(),
            initial_cwnd: bdp::DEFAULT_INITIAL_CWND,
            bw_filter_rounds: MAX_BW_FILTER_ROUNDS,
            min_rtt_expiry: None,
            initial_min_rtt: None,
            mss: crate::DEFAULT_MSS,
        }
    }
}

/// LBBR phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoStaticStr)]
pub enum Phase {
    /// Exponential ramp up until the bandwidth estimate plateaus.
    Startup,

    /// Growing the window towards twice the BDP. The basic variant stays
    /// here for the rest of the flow.
    SteadyIncrease,

    /// Backing off towards the floor below the BDP.
    SteadyDecrease,
}

/// Round trip counter for tracking packet-timed round trips which starts
/// at the transmission of some segment, and then end at the ack of that segment.
#[derive(Debug, Default)]
struct RoundTripCounter {
    /// Count of packet-timed round trips.
    round_count: u64,

    /// Set once per packet-timed round trip, on samples that advance
    /// round_count.
    is_round_start: bool,

    /// Delivered count denoting the end of a packet-timed round trip.
    next_round_delivered: u64,
}

/// Linear BBR Congestion Control Algorithm.
///
/// One instance per flow, owned by the transport and driven serially by
/// [`CongestionController::on_rate_sample`].
#[derive(Debug)]
pub struct Lbbr {
    /// Configurable parameters.
    config: LbbrConfig,

    /// Statistics.
    stats: CongestionStats,

    /// Current phase.
    phase: Phase,

    /// Congestion window in segments.
    cwnd: u32,

    /// Acked segments not yet turned into a window change.
    cwnd_cnt: u32,

    /// Pacing rate in bytes per second.
    pacing_rate: u64,

    /// Windowed max of the delivery rate.
    bw_filter: BandwidthFilter,

    /// EWMA of the windowed max.
    smoothed_bw: SmoothedBandwidth,

    /// Min RTT estimator.
    min_rtt: MinRttTracker,

    /// Whether the pacing rate was seeded from a real RTT.
    has_seen_rtt: bool,

    /// Counter of packet-timed round trips.
    round: RoundTripCounter,

    /// Startup exit condition.
    full_bw: FullBandwidthDetector,

    /// Gain applied to the bandwidth for pacing.
    pacing_gain: Gain,

    /// Gain bounding the window in steady state.
    cwnd_gain: Gain,

    /// Half the window at startup exit, infinite before.
    ssthresh: u32,

    /// Window at which the decrease phase stops.
    floor_cwnd: u32,

    /// Exponent of the next decrease step.
    decrease_step: u32,

    /// Segment size from the last transport snapshot.
    mss: u32,
}

impl Lbbr {
    pub fn new(config: LbbrConfig) -> Self {
        let initial_cwnd = config.initial_cwnd.max(MIN_CWND);
        let mss = config.mss;
        let now = Instant::now();

        let mut lbbr = Self {
            stats: Default::default(),
            phase: Phase::Startup,
            cwnd: initial_cwnd,
            cwnd_cnt: 0,
            pacing_rate: 0,
            bw_filter: BandwidthFilter::new(config.bw_filter_rounds),
            smoothed_bw: Default::default(),
            min_rtt: MinRttTracker::new(config.initial_min_rtt, config.min_rtt_expiry, now),
            has_seen_rtt: false,
            round: Default::default(),
            full_bw: Default::default(),
            pacing_gain: Gain::STARTUP,
            cwnd_gain: Gain::STARTUP,
            ssthresh: INFINITE_SSTHRESH,
            floor_cwnd: 0,
            decrease_step: 0,
            mss,
            config,
        };
        lbbr.init_pacing_rate(u64::MAX);

        lbbr
    }

    /// Seed the pacing rate from the window and the best RTT known.
    ///
    /// Before the first delivery rate sample, the nominal bandwidth is one
    /// window per RTT, paced at the startup gain.
    fn init_pacing_rate(&mut self, max_pacing_rate: u64) {
        let rtt = match self.min_rtt.get() {
            Some(rtt) => {
                self.has_seen_rtt = true;
                rtt
            }
            None => DEFAULT_PACING_RTT,
        };

        let bw = bdp::window_bandwidth(self.cwnd, rtt);
        self.pacing_rate = bdp::pacing_rate(bw, Gain::STARTUP, self.mss, max_pacing_rate);
    }

    /// Update the virtual time tracked by the round counter.
    ///
    /// A round ends on the ACK of any segment sent after the segment that
    /// started it, i.e. once the sample's send-time delivered count reaches
    /// the delivered count at the start of the round.
    fn update_round(&mut self, sample: &RateSample, transport: &TransportState) {
        if sample.prior_delivered >= self.round.next_round_delivered {
            self.round.next_round_delivered = transport.delivered;
            self.round.round_count += 1;
            self.round.is_round_start = true;
        } else {
            self.round.is_round_start = false;
        }
    }

    /// Feed the delivery rate of the sample to the bandwidth filter.
    fn update_max_bw(&mut self, sample: &RateSample) {
        let bw = match Bandwidth::from_delivery(sample.delivered, sample.interval) {
            Some(bw) => bw,
            None => {
                self.stats.invalid_rate_samples += 1;
                return;
            }
        };

        // App-limited samples underestimate the path, unless they beat the
        // current estimate anyway.
        if !sample.is_app_limited || bw >= self.max_bw() {
            self.bw_filter.update(self.round.round_count, bw);
        }

        self.smoothed_bw.update(self.bw_filter.get());
    }

    /// Look for a bandwidth plateau, once per round.
    fn check_full_bw_reached(&mut self, sample: &RateSample) {
        if !self.round.is_round_start {
            return;
        }

        let was_reached = self.full_bw.is_reached();
        if self.full_bw.check(self.max_bw(), sample.is_app_limited) && !was_reached {
            debug!(
                "{}. full bandwidth reached at round {}, bw={}",
                self.name(),
                self.round.round_count,
                self.max_bw()
            );
        }
    }

    fn update_min_rtt(&mut self, sample: &RateSample) {
        if sample.rtt.is_none() {
            self.stats.invalid_rtt_samples += 1;
        }

        self.min_rtt.observe(sample.rtt, sample.now);
    }

    /// On every sample, update the path model.
    fn update_model(&mut self, sample: &RateSample, transport: &TransportState) {
        self.update_round(sample, transport);
        self.update_max_bw(sample);
        self.check_full_bw_reached(sample);
        self.update_min_rtt(sample);
    }

    /// Bandwidth the pacing rate is derived from.
    fn pacing_bw(&self) -> Bandwidth {
        match self.config.variant {
            CongestionControlVariant::Oscillating => self.smoothed_bw.get(),
            CongestionControlVariant::Basic => self.max_bw(),
        }
    }

    /// Update the pacing rate from the bandwidth estimate.
    ///
    /// Before the pipe is full the rate is only ever raised, so that a
    /// premature low estimate does not throttle startup.
    fn set_pacing_rate(&mut self, transport: &TransportState) {
        if !self.has_seen_rtt && self.min_rtt.get().is_some() {
            self.init_pacing_rate(transport.max_pacing_rate);
        }

        let rate = bdp::pacing_rate(
            self.pacing_bw(),
            self.pacing_gain,
            self.mss,
            transport.max_pacing_rate,
        );
        if self.full_bw.is_reached() || rate > self.pacing_rate {
            self.pacing_rate = rate;
        }

        self.pacing_rate = self.pacing_rate.min(transport.max_pacing_rate);
    }

    /// Window for `gain` times the estimated BDP.
    fn target_cwnd(&self, bw: Bandwidth, gain: Gain) -> u32 {
        let round_even = self.config.variant == CongestionControlVariant::Basic;
        bdp::target_window(bw, self.min_rtt.get(), gain, round_even)
    }

    /// Leave startup. Runs once, on the first sample after full bandwidth
    /// was reached.
    fn exit_startup(&mut self) {
        self.cwnd_gain = Gain::STEADY;
        self.pacing_gain = Gain::STEADY;
        self.ssthresh = (self.cwnd >> 1).max(MIN_CWND);
        self.cwnd_cnt = 0;
        self.enter_phase(Phase::SteadyIncrease);
    }

    fn enter_phase(&mut self, phase: Phase) {
        debug!(
            "{}. {:?} -> {:?}, cwnd={} floor={} ssthresh={}",
            self.name(),
            self.phase,
            phase,
            self.cwnd,
            self.floor_cwnd,
            self.ssthresh
        );
        self.phase = phase;
    }

    /// Add acked segments to the counter and return how many full windows
    /// it holds, consuming them.
    fn accumulate_acked(&mut self, acked: u32) -> u32 {
        self.cwnd_cnt = self.cwnd_cnt.saturating_add(acked);
        let delta = self.cwnd_cnt / self.cwnd;
        self.cwnd_cnt -= delta * self.cwnd;
        delta
    }

    /// Adjust the congestion window.
    fn set_cwnd(&mut self, acked: u32, transport: &TransportState) {
        if acked == 0 {
            return;
        }

        let clamp = transport.cwnd_clamp.max(MIN_CWND);
        let bw = self.max_bw();

        // Track a high-gain multiple of the BDP until the pipe is full.
        if !self.full_bw.is_reached() {
            self.cwnd = self.target_cwnd(bw, Gain::STARTUP).clamp(MIN_CWND, clamp);
            return;
        }

        if self.ssthresh == INFINITE_SSTHRESH {
            self.exit_startup();
        }

        self.cwnd = self.cwnd.clamp(MIN_CWND, clamp);

        match self.config.variant {
            CongestionControlVariant::Oscillating => self.oscillate(acked, bw, clamp),
            CongestionControlVariant::Basic => {
                self.additive_increase(acked, bw, clamp, transport)
            }
        }
    }

    /// Steady state of the oscillating variant.
    ///
    /// The sample that pushes the window above the upper bound is also
    /// accounted to the decrease phase it starts.
    fn oscillate(&mut self, acked: u32, bw: Bandwidth, clamp: u32) {
        if self.phase == Phase::SteadyIncrease {
            let target_cwnd = self.target_cwnd(bw, Gain::UNIT);
            let upper_cwnd = self.target_cwnd(bw, self.cwnd_gain);

            if self.cwnd < target_cwnd {
                self.cwnd = target_cwnd.min(clamp);
            }

            let delta = self.accumulate_acked(acked);
            self.cwnd = self.cwnd.saturating_add(delta).clamp(MIN_CWND, clamp);

            if self.cwnd > upper_cwnd {
                self.floor_cwnd = self.target_cwnd(bw, Gain::FLOOR).max(MIN_CWND);
                self.decrease_step = 0;
                self.enter_phase(Phase::SteadyDecrease);
            }
        }

        if self.phase == Phase::SteadyDecrease {
            let delta = self.accumulate_acked(acked);
            if delta > 0 {
                // Back off exponentially, but never below the floor.
                self.decrease_step = self.decrease_step.saturating_add(delta);
                let step = 1_u32
                    .checked_shl(self.decrease_step)
                    .unwrap_or(u32::MAX)
                    .min(self.cwnd.saturating_sub(self.floor_cwnd));
                self.cwnd = (self.cwnd - step).clamp(MIN_CWND, clamp);
            }

            if self.cwnd <= self.floor_cwnd {
                self.enter_phase(Phase::SteadyIncrease);
            }
        }
    }

    /// Whether the window is what limits the sender.
    fn is_cwnd_limited(&self, transport: &TransportState) -> bool {
        if self.cwnd < self.ssthresh {
            return self.cwnd < transport.in_flight.saturating_mul(2);
        }

        transport.is_cwnd_limited
    }

    /// Grow the window by the acked segments up to ssthresh, and return the
    /// segments left over.
    fn slow_start(&mut self, acked: u32, clamp: u32) -> u32 {
        let cwnd = self.cwnd.saturating_add(acked).min(self.ssthresh);
        let used = cwnd.saturating_sub(self.cwnd);
        self.cwnd = cwnd.clamp(MIN_CWND, clamp);

        acked - used
    }

    /// Steady state of the basic variant: slow start up to ssthresh, then
    /// one segment per window of acked segments.
    fn additive_increase(
        &mut self,
        acked: u32,
        bw: Bandwidth,
        clamp: u32,
        transport: &TransportState,
    ) {
        let target_cwnd = self.target_cwnd(bw, Gain::UNIT);
        if self.cwnd < target_cwnd {
            self.cwnd = target_cwnd.min(clamp);
        }

        if !self.is_cwnd_limited(transport) {
            return;
        }

        let mut acked = acked;
        if self.cwnd < self.ssthresh {
            acked = self.slow_start(acked, clamp);
            if acked == 0 {
                return;
            }
        }

        let delta = self.accumulate_acked(acked);
        self.cwnd = self.cwnd.saturating_add(delta).clamp(MIN_CWND, clamp);
    }

    /// Current bandwidth estimate, the windowed max of delivery rates.
    pub fn max_bw(&self) -> Bandwidth {
        self.bw_filter.get()
    }

    /// EWMA of the bandwidth estimate.
    pub fn smoothed_bw(&self) -> Bandwidth {
        self.smoothed_bw.get()
    }

    /// Minimum RTT, None if unknown.
    pub fn min_rtt(&self) -> Option<Duration> {
        self.min_rtt.get()
    }

    /// Whether startup has seen the bandwidth plateau.
    pub fn is_full_bw_reached(&self) -> bool {
        self.full_bw.is_reached()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn round_count(&self) -> u64 {
        self.round.round_count
    }

    /// Internal slow start threshold, set when startup ends.
    pub fn startup_ssthresh(&self) -> u32 {
        self.ssthresh
    }

    /// Window at which the decrease phase ends.
    pub fn floor_cwnd(&self) -> u32 {
        self.floor_cwnd
    }

    /// Exponent of the last decrease step.
    pub fn decrease_step(&self) -> u32 {
        self.decrease_step
    }

    pub fn pacing_gain(&self) -> Gain {
        self.pacing_gain
    }

    pub fn cwnd_gain(&self) -> Gain {
        self.cwnd_gain
    }
}

impl CongestionController for Lbbr {
    fn name(&self) -> &str {
        self.config.variant.into()
    }

    fn on_rate_sample(&mut self, sample: &RateSample, transport: &TransportState) {
        let acked = sample.acked_sacked as u64;
        self.stats.samples += 1;
        self.stats.acked_in_total = self.stats.acked_in_total.saturating_add(acked);
        if self.phase == Phase::Startup {
            self.stats.acked_in_startup = self.stats.acked_in_startup.saturating_add(acked);
        }
        self.mss = transport.mss.max(1);

        self.update_model(sample, transport);
        self.set_pacing_rate(transport);
        self.set_cwnd(sample.acked_sacked, transport);

        debug_assert!(self.cwnd >= MIN_CWND);
        debug_assert!(self.cwnd <= transport.cwnd_clamp.max(MIN_CWND) || sample.acked_sacked == 0);

        trace!(
            "{}. round={} max_bw={} smoothed_bw={} min_rtt={:?} phase={:?} cwnd={} pacing_rate={}",
            self.name(),
            self.round.round_count,
            self.max_bw(),
            self.smoothed_bw(),
            self.min_rtt(),
            self.phase,
            self.cwnd,
            self.pacing_rate
        );
    }

    fn congestion_window(&self) -> u32 {
        self.cwnd
    }

    fn pacing_rate(&self) -> Option<u64> {
        Some(self.pacing_rate)
    }

    fn in_slow_start(&self) -> bool {
        self.phase == Phase::Startup || self.cwnd < self.ssthresh
    }

    fn initial_window(&self) -> u32 {
        self.config.initial_cwnd
    }

    fn info(&self) -> Option<CongestionInfo> {
        let min_rtt_us = self
            .min_rtt()
            .map(|rtt| u64::try_from(rtt.as_micros()).unwrap_or(u64::MAX));

        Some(CongestionInfo {
            bw: self.max_bw().to_bytes_per_sec(self.mss),
            min_rtt_us,
            ssthresh: self.ssthresh,
            target_cwnd: self.target_cwnd(self.max_bw(), Gain::UNIT),
            phase: self.phase.into(),
            cwnd: self.cwnd,
            pacing_rate: self.pacing_rate,
            round_count: self.round.round_count,
        })
    }

    fn stats(&self) -> &CongestionStats {
        &self.stats
    }
}
