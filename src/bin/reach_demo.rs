//! Reach-mode CLI driver
//!
//! Builds a small 2-D rotation system (two coupled 1-D blocks under a dense
//! rotation generator) and runs it to a horizon, printing one line per step
//! with the full-state support in a few fixed directions.

#![forbid(unsafe_code)]

use std::env;

use block_reach::{
    BlockEngine, DenseMatrixPower, EngineConfig, Flowpipe, Partition, SetOps, SetValue,
    TerminationPolicy,
};
use ndarray::Array2;
use tracing::info;

fn parse_flag(args: &[String], key: &str) -> Option<String> {
    let mut it = args.iter();
    while let Some(a) = it.next() {
        if a == key {
            return it.next().cloned();
        }
    }
    None
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let args: Vec<String> = env::args().collect();

    let horizon: usize = parse_flag(&args, "--horizon").and_then(|s| s.parse().ok()).unwrap_or(20);
    let delta: f64 = parse_flag(&args, "--delta").and_then(|s| s.parse().ok()).unwrap_or(0.1);
    let theta: f64 = parse_flag(&args, "--theta").and_then(|s| s.parse().ok()).unwrap_or(0.2);

    // Two 1-D blocks, x and y, coupled by a small-angle rotation generator:
    // A = [[0, -theta], [theta, 0]], Phi = exp(A * delta) approximated via
    // the dense backend's repeated right-multiplication against a one-step
    // rotation matrix.
    let partition = Partition::new(2, vec![0..1, 1..2])?;
    let (c, s) = (theta.cos(), theta.sin());
    let one_step = Array2::from_shape_vec((2, 2), vec![c, -s, s, c])?;
    let matrix_power = DenseMatrixPower::new(one_step)?;

    let config = EngineConfig::new(&partition, horizon, delta);
    let initial = vec![SetValue::Interval { lo: 0.9, hi: 1.1 }, SetValue::Interval { lo: -0.1, hi: 0.1 }];
    let inputs = vec![SetValue::Zero(1), SetValue::Zero(1)];

    let engine = BlockEngine::new(
        partition,
        matrix_power,
        config,
        initial,
        inputs,
        vec![],
        TerminationPolicy::Horizon { horizon },
        vec![],
        None,
    )?;

    info!(horizon, delta, theta, "starting reach run");
    let flowpipe = Flowpipe::from_run(engine, delta, None)?;

    println!("step  time      support(+x)   support(+y)");
    for record in flowpipe.records() {
        let sx = record.state.support(&ndarray::Array1::from(vec![1.0, 0.0]))?;
        let sy = record.state.support(&ndarray::Array1::from(vec![0.0, 1.0]))?;
        println!("{:>4}  {:>7.3}  {:>10.4}  {:>10.4}", record.step, record.t_end, sx, sy);
    }

    if let Some(kind) = flowpipe.truncated_at() {
        println!("truncated early: {kind:?}");
    } else {
        println!("ran to horizon ({} steps recorded)", flowpipe.len());
    }

    Ok(())
}
