use anyhow::{bail, Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};

use serde_json::json;

use econsim::config::SimConfig;
use econsim::logging::{log, obj, v_str, Domain, Level};
use econsim::sim::SimState;
use econsim::snapshot::TickSnapshot;

/// Replays a seeded run and checks it tick-by-tick.
///
/// With a path argument the run is compared against a recorded snapshot
/// file (as written by the main binary with `SNAPSHOT_PATH`); without one
/// the same config is simply run twice.
fn main() -> Result<()> {
    let cfg = SimConfig::from_env();
    let reference = match std::env::args().nth(1) {
        Some(path) => load_snapshots(&path)?,
        None => record(&cfg),
    };
    if reference.is_empty() {
        bail!("no snapshots to replay");
    }

    let mut sim = SimState::bootstrap(cfg);
    for expected in &reference {
        while sim.tick < expected.tick {
            sim.step();
        }
        let actual = sim.snapshot();
        if actual.digest() != expected.digest() {
            bail!(
                "divergence at tick {}: expected {} got {}",
                expected.tick,
                expected.digest(),
                actual.digest()
            );
        }
    }
    log(
        Level::Info,
        Domain::Audit,
        "replay_ok",
        obj(&[
            ("ticks", json!(sim.tick)),
            ("checked", json!(reference.len())),
            ("state_hash", v_str(&sim.snapshot().digest())),
        ]),
    );
    Ok(())
}

fn record(cfg: &SimConfig) -> Vec<TickSnapshot> {
    let mut sim = SimState::bootstrap(cfg.clone());
    let mut out = vec![sim.snapshot()];
    for _ in 0..cfg.ticks {
        sim.step();
        out.push(sim.snapshot());
    }
    out
}

fn load_snapshots(path: &str) -> Result<Vec<TickSnapshot>> {
    let file = File::open(path).with_context(|| format!("cannot open {}", path))?;
    let mut out = Vec::new();
    for (n, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let snap: TickSnapshot = serde_json::from_str(&line)
            .with_context(|| format!("bad snapshot on line {}", n + 1))?;
        out.push(snap);
    }
    Ok(out)
}
