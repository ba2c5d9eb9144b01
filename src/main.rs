use anyhow::Result;
use serde_json::json;
use std::path::PathBuf;

use econsim::config::SimConfig;
use econsim::logging::{log, obj, v_str, Domain, Level};
use econsim::sim::SimState;
use econsim::snapshot::SnapshotWriter;
use econsim::verify::invariants::{assert_money_conservation, assert_state_invariants};

fn main() -> Result<()> {
    let cfg = SimConfig::from_env();
    let snapshot_path = std::env::var("SNAPSHOT_PATH").ok().map(PathBuf::from);
    let strict = std::env::var("STRICT").as_deref() == Ok("1");

    log(
        Level::Info,
        Domain::System,
        "start",
        obj(&[
            ("config", serde_json::to_value(&cfg)?),
            (
                "snapshot_path",
                snapshot_path
                    .as_ref()
                    .map(|p| v_str(&p.to_string_lossy()))
                    .unwrap_or(serde_json::Value::Null),
            ),
        ]),
    );

    let mut writer = match &snapshot_path {
        Some(path) => Some(SnapshotWriter::create(path)?),
        None => None,
    };

    let mut sim = SimState::bootstrap(cfg.clone());
    if let Some(w) = writer.as_mut() {
        w.append(&sim.snapshot())?;
    }

    let mut trades = 0usize;
    let mut halts = 0u64;
    for _ in 0..cfg.ticks {
        let before = sim.total_money();
        let report = sim.step();
        trades += report.transactions.len();
        if report.halt.is_some() {
            halts += 1;
        }
        if strict {
            assert_money_conservation(before, sim.total_money(), &report)?;
            assert_state_invariants(&sim)?;
        }
        if let Some(w) = writer.as_mut() {
            w.append(&sim.snapshot())?;
        }
        if sim.alive_count() == 0 {
            log(
                Level::Warn,
                Domain::System,
                "extinct",
                obj(&[("tick", json!(sim.tick))]),
            );
            break;
        }
    }

    if let Some(w) = writer {
        w.finish()?;
    }

    let last = sim.snapshot();
    log(
        Level::Info,
        Domain::System,
        "session_summary",
        obj(&[
            ("ticks", json!(sim.tick)),
            ("trades", json!(trades)),
            ("halts", json!(halts)),
            ("alive", json!(sim.alive_count())),
            ("mean_qol", json!(last.mean_qol)),
            ("prices", serde_json::to_value(&last.prices)?),
            ("state_hash", v_str(&last.digest())),
        ]),
    );
    Ok(())
}
