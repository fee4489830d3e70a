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

use std::io::Write;
use std::time::Duration;

use clap::Parser;
use log::info;
use statrs::statistics::Data;
use statrs::statistics::Distribution;
use statrs::statistics::Max;
use statrs::statistics::Min;
use statrs::statistics::OrderStatistics;

use lbbr::build_congestion_controller;
use lbbr::CongestionControlVariant;
use lbbr::CongestionController;
use lbbr::CongestionInfo;
use lbbr::LbbrConfig;
use lbbr_tools::Link;
use lbbr_tools::LinkConfig;
use lbbr_tools::Result;

#[derive(Parser, Debug, Clone)]
#[clap(name = "lbbr_sim")]
pub struct SimOpt {
    /// Bottleneck bandwidth in segments per millisecond.
    #[clap(short, long, default_value = "100", value_name = "NUM")]
    pub bandwidth: u64,

    /// Propagation round-trip time in milliseconds.
    #[clap(short, long, default_value = "10", value_name = "TIME")]
    pub rtt: u64,

    /// Number of rounds to simulate.
    #[clap(short = 'n', long, default_value = "100", value_name = "NUM")]
    pub rounds: u64,

    /// Window controller flavour, support LBBR/LBBR-BASIC.
    #[clap(long, default_value = "LBBR", value_name = "STR")]
    pub variant: CongestionControlVariant,

    /// Max random delay added to RTT samples, in microseconds.
    #[clap(long, default_value = "0", value_name = "TIME")]
    pub jitter: u64,

    /// Seed of the jitter generator.
    #[clap(long, default_value = "0", value_name = "NUM")]
    pub seed: u64,

    /// Segment size in bytes.
    #[clap(long, default_value = "1460", value_name = "NUM")]
    pub mss: u32,

    /// Congestion window clamp in segments.
    #[clap(long, default_value_t = u32::MAX, value_name = "NUM")]
    pub clamp: u32,

    /// Print one JSON record per round instead of plain text.
    #[clap(long)]
    pub json: bool,

    /// Log level, support OFF/ERROR/WARN/INFO/DEBUG/TRACE.
    #[clap(long, default_value = "INFO", value_name = "STR")]
    pub log_level: log::LevelFilter,
}

fn print_round<W: Write>(out: &mut W, round: u64, info: &CongestionInfo) -> Result<()> {
    let min_rtt = match info.min_rtt_us {
        Some(v) => format!("{}us", v),
        None => "-".into(),
    };

    writeln!(
        out,
        "round {} phase {} cwnd {} target {} pacing_rate {} bw {} min_rtt {}",
        round, info.phase, info.cwnd, info.target_cwnd, info.pacing_rate, info.bw, min_rtt
    )?;

    Ok(())
}

fn print_summary<W: Write>(
    out: &mut W,
    cc: &dyn CongestionController,
    cwnd_samples: Vec<f64>,
) -> Result<()> {
    let stats = cc.stats();
    writeln!(
        out,
        "{}: samples {}, acked in startup {}, acked in total {}",
        cc.name(),
        stats.samples,
        stats.acked_in_startup,
        stats.acked_in_total
    )?;

    if cwnd_samples.is_empty() {
        return Ok(());
    }

    let mut s = Data::new(cwnd_samples);
    writeln!(out, "cwnd (segments):")?;
    writeln!(
        out,
        "\tmin: {:.2}, max: {:.2}, mean: {:.2}, sd: {:.2}",
        s.min(),
        s.max(),
        s.mean().unwrap_or(0.0),
        s.std_dev().unwrap_or(0.0),
    )?;
    writeln!(
        out,
        "\tmedian: {:.2}, p10: {:.2}, p90: {:.2}",
        s.median(),
        s.percentile(10),
        s.percentile(90),
    )?;

    Ok(())
}

fn main() -> Result<()> {
    let option = SimOpt::parse();

    env_logger::builder()
        .filter_level(option.log_level)
        .format_timestamp_millis()
        .init();

    let mut conf = LbbrConfig::default();
    conf.set_variant(option.variant).set_mss(option.mss);
    let mut cc = build_congestion_controller(&conf)?;

    let mut link = Link::new(
        LinkConfig {
            bandwidth: option.bandwidth,
            rtt: Duration::from_millis(option.rtt),
            jitter: Duration::from_micros(option.jitter),
            mss: option.mss,
            cwnd_clamp: option.clamp,
        },
        option.seed,
    )?;
    info!(
        "{} over {} segments/ms, {}ms, bdp {} segments",
        cc.name(),
        option.bandwidth,
        option.rtt,
        link.bdp()
    );

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let mut cwnd_samples = Vec::new();

    for round in 1..=option.rounds {
        link.round(cc.as_mut());

        let info = match cc.info() {
            Some(info) => info,
            None => continue,
        };
        if option.json {
            info.write_json(&mut out)?;
        } else {
            print_round(&mut out, round, &info)?;
        }
        cwnd_samples.push(info.cwnd as f64);
    }

    if !option.json {
        print_summary(&mut out, cc.as_ref(), cwnd_samples)?;
    }

    Ok(())
}
