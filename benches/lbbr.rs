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

use criterion::black_box;
use criterion::criterion_group;
use criterion::criterion_main;
use criterion::Criterion;

use lbbr::target_window;
use lbbr::Bandwidth;
use lbbr::BandwidthFilter;
use lbbr::CongestionControlVariant;
use lbbr::CongestionController;
use lbbr::Gain;
use lbbr::Lbbr;
use lbbr::LbbrConfig;
use lbbr::RateSample;
use lbbr::TransportState;

/// Samples of a flow stuck at 1000 segments per 100us.
fn samples(count: u64) -> Vec<(RateSample, TransportState)> {
    let now = Instant::now();
    let mut transport = TransportState::default();

    (0..count)
        .map(|i| {
            let prior_delivered = transport.delivered;
            transport.delivered += 100_000;
            let sample = RateSample {
                now: now + Duration::from_micros(100 * i),
                delivered: 100_000,
                interval: Duration::from_micros(100),
                rtt: Some(Duration::from_micros(100 + i % 7)),
                is_app_limited: false,
                prior_delivered,
                acked_sacked: 100_000,
            };
            (sample, transport)
        })
        .collect()
}

fn rate_sample_benchmark(c: &mut Criterion, variant: CongestionControlVariant) {
    const RANGE: u64 = 10_000;
    let samples = samples(RANGE);
    let mut conf = LbbrConfig::default();
    conf.set_variant(variant);

    c.bench_function(&format!("{} on rate sample", variant), |b| {
        b.iter(|| {
            let mut lbbr = Lbbr::new(conf.clone());
            for (sample, transport) in samples.iter() {
                lbbr.on_rate_sample(sample, transport);
            }
            lbbr.congestion_window()
        })
    });
}

pub fn rate_sample_benchmark_oscillating(c: &mut Criterion) {
    rate_sample_benchmark(c, CongestionControlVariant::Oscillating);
}

pub fn rate_sample_benchmark_basic(c: &mut Criterion) {
    rate_sample_benchmark(c, CongestionControlVariant::Basic);
}

pub fn bandwidth_filter_benchmark(c: &mut Criterion) {
    let mut filter = BandwidthFilter::new(10);
    let mut round = 0;
    c.bench_function("bandwidth filter update", |b| {
        b.iter(|| {
            round += 1;
            filter.update(round, Bandwidth::from_raw(black_box(round * 7919 % 100_000)))
        })
    });
}

pub fn target_window_benchmark(c: &mut Criterion) {
    let bw = Bandwidth::from_segments_per_usec(1000);
    let rtt = Some(Duration::from_micros(100));
    c.bench_function("target window", |b| {
        b.iter(|| target_window(black_box(bw), black_box(rtt), Gain::STARTUP, true))
    });
}

criterion_group!(
    benches,
    rate_sample_benchmark_oscillating,
    rate_sample_benchmark_basic,
    bandwidth_filter_benchmark,
    target_window_benchmark,
);
criterion_main!(benches);
