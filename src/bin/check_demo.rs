//! Check-mode CLI driver
//!
//! Runs the same translation-chain scenario as the property-checking engine:
//! a single 1-D block drifting under a constant input, checked against a
//! bound. Reports the first violating step, or `0` if the bound holds
//! throughout.

#![forbid(unsafe_code)]

use std::env;

use block_reach::{
    BlockEngine, DenseMatrixPower, EngineConfig, Partition, PropertyPredicate, SetOps, SetValue,
    TerminationPolicy,
};
use ndarray::{Array1, Array2};
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

    let horizon: usize = parse_flag(&args, "--horizon").and_then(|s| s.parse().ok()).unwrap_or(10);
    let delta: f64 = parse_flag(&args, "--delta").and_then(|s| s.parse().ok()).unwrap_or(1.0);
    let bound: f64 = parse_flag(&args, "--bound").and_then(|s| s.parse().ok()).unwrap_or(5.5);
    let eager = parse_flag(&args, "--eager").map(|s| s != "0").unwrap_or(true);

    let partition = Partition::new(1, vec![0..1])?;
    let matrix_power = DenseMatrixPower::new(Array2::eye(1))?;
    let config = EngineConfig::new(&partition, horizon, delta);
    let initial = vec![SetValue::Interval { lo: 0.0, hi: 0.0 }];
    let inputs = vec![SetValue::Interval { lo: 1.0, hi: 1.0 }];

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

    let predicate: PropertyPredicate =
        Box::new(move |s: &SetValue| s.support(&Array1::from(vec![1.0])).unwrap_or(0.0) > bound);

    info!(horizon, delta, bound, eager, "starting check run");
    let violating_step = block_reach::check(engine, predicate, eager)?;

    if violating_step == 0 {
        println!("property held throughout the horizon ({horizon} steps)");
    } else {
        println!("property violated at step {violating_step}");
    }

    Ok(())
}
