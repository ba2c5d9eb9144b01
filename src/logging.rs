//! Structured logging for the simulation.
//!
//! Every record is one JSON line on stdout carrying a wall-clock timestamp,
//! a run id, a monotonically increasing sequence number, a level and a
//! domain. When `LOG_DIR` is set the same lines are also written under
//! `<LOG_DIR>/<run_id>/` (`events.jsonl` for info and above, `trace.jsonl`
//! for trace/debug).

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fs::{create_dir_all, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};

use crate::agent::AgentId;
use crate::resource::ResourceKind;

// =============================================================================
// Log Levels
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
    Fatal = 5,
}

impl Level {
    pub fn from_env() -> Self {
        match std::env::var("LOG_LEVEL").as_deref() {
            Ok("trace") => Level::Trace,
            Ok("debug") => Level::Debug,
            Ok("info") => Level::Info,
            Ok("warn") => Level::Warn,
            Ok("error") => Level::Error,
            Ok("fatal") => Level::Fatal,
            _ => Level::Info,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Trace => "trace",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
            Level::Fatal => "fatal",
        }
    }
}

// =============================================================================
// Log Domains
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Market, // Queue, clearing, prices
    Agent,  // Production, death
    Tax,    // Salary, treasury
    Tick,   // Per-tick summaries
    System, // Startup, shutdown
    Audit,  // Replay digests
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Market => "market",
            Domain::Agent => "agent",
            Domain::Tax => "tax",
            Domain::Tick => "tick",
            Domain::System => "system",
            Domain::Audit => "audit",
        }
    }

    pub fn is_enabled(&self) -> bool {
        // LOG_DOMAINS: comma-separated list or "all"
        match std::env::var("LOG_DOMAINS").as_deref() {
            Ok("all") | Err(_) => true,
            Ok(domains) => domains.split(',').any(|d| d.trim() == self.as_str()),
        }
    }
}

// =============================================================================
// Run context
// =============================================================================

static LOG_SEQ: AtomicU64 = AtomicU64::new(0);
static RUN_CONTEXT: OnceLock<RunContext> = OnceLock::new();

fn next_seq() -> u64 {
    LOG_SEQ.fetch_add(1, Ordering::SeqCst)
}

#[derive(Debug)]
struct RunContext {
    run_id: String,
    sinks: Option<Sinks>,
}

#[derive(Debug)]
struct Sinks {
    events: Mutex<BufWriter<File>>,
    trace: Mutex<BufWriter<File>>,
}

fn ensure_run_context() -> &'static RunContext {
    RUN_CONTEXT.get_or_init(|| {
        let run_id = std::env::var("RUN_ID")
            .unwrap_or_else(|_| format!("r-{}-{}", ts_epoch_ms(), process::id()));
        let sinks = std::env::var("LOG_DIR")
            .ok()
            .and_then(|base| open_sinks(PathBuf::from(base).join(&run_id), &run_id));
        RunContext { run_id, sinks }
    })
}

fn open_sinks(run_dir: PathBuf, run_id: &str) -> Option<Sinks> {
    if let Err(err) = create_dir_all(&run_dir) {
        eprintln!("[log] failed to create run dir: {}", err);
        return None;
    }
    let _ = std::fs::write(
        run_dir.join("manifest.json"),
        json!({
            "run_id": run_id,
            "ts": ts_now(),
            "pid": process::id(),
            "log_dir": run_dir.to_string_lossy(),
        })
        .to_string(),
    );
    let open = |name: &str| match File::create(run_dir.join(name)) {
        Ok(f) => Some(Mutex::new(BufWriter::new(f))),
        Err(err) => {
            eprintln!("[log] failed to create {}: {}", name, err);
            None
        }
    };
    Some(Sinks {
        events: open("events.jsonl")?,
        trace: open("trace.jsonl")?,
    })
}

fn write_line(writer: &Mutex<BufWriter<File>>, line: &str) {
    if let Ok(mut w) = writer.lock() {
        let _ = writeln!(w, "{}", line);
        let _ = w.flush();
    }
}

// =============================================================================
// Core logging functions
// =============================================================================

/// RFC3339 timestamp with milliseconds
pub fn ts_now() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

pub fn ts_epoch_ms() -> u64 {
    Utc::now().timestamp_millis() as u64
}

/// Emit a structured log entry
pub fn log(level: Level, domain: Domain, event: &str, fields: Map<String, Value>) {
    let min_level = Level::from_env();
    if level < min_level || !domain.is_enabled() {
        return;
    }
    emit_record(level, domain, event, fields);
}

fn emit_record(level: Level, domain: Domain, event: &str, mut fields: Map<String, Value>) {
    let ctx = ensure_run_context();
    let msg = fields.remove("msg").unwrap_or(Value::String(String::new()));
    let tick = fields.remove("tick");

    let mut entry = Map::new();
    entry.insert("ts".to_string(), json!(ts_now()));
    entry.insert("run_id".to_string(), json!(ctx.run_id));
    entry.insert("seq".to_string(), json!(next_seq()));
    entry.insert("lvl".to_string(), json!(level.as_str().to_uppercase()));
    entry.insert("component".to_string(), json!(domain.as_str()));
    entry.insert("event".to_string(), json!(event));
    entry.insert("msg".to_string(), msg);
    if let Some(tick) = tick {
        entry.insert("tick".to_string(), tick);
    }
    entry.insert("data".to_string(), Value::Object(fields));

    let line = Value::Object(entry).to_string();
    if let Some(sinks) = &ctx.sinks {
        match level {
            Level::Trace | Level::Debug => write_line(&sinks.trace, &line),
            _ => write_line(&sinks.events, &line),
        }
    }
    println!("{}", line);
}

// =============================================================================
// Domain-Specific Logging Helpers
// =============================================================================

pub fn log_trade(
    tick: u64,
    seller: AgentId,
    buyer: AgentId,
    kind: ResourceKind,
    price: i64,
    tax: i64,
) {
    log(
        Level::Debug,
        Domain::Market,
        "trade",
        obj(&[
            ("tick", json!(tick)),
            ("seller", json!(seller)),
            ("buyer", json!(buyer)),
            ("kind", v_str(kind.as_str())),
            ("price", json!(price)),
            ("tax", json!(tax)),
        ]),
    );
}

pub fn log_price_change(tick: u64, kind: ResourceKind, old: i64, new: i64, unmet: bool) {
    log(
        Level::Debug,
        Domain::Market,
        "price_change",
        obj(&[
            ("tick", json!(tick)),
            ("kind", v_str(kind.as_str())),
            ("old", json!(old)),
            ("new", json!(new)),
            ("unmet", json!(unmet)),
        ]),
    );
}

pub fn log_clearing_halt(tick: u64, reason: &str) {
    log(
        Level::Warn,
        Domain::Market,
        "clearing_halt",
        obj(&[("tick", json!(tick)), ("msg", v_str(reason))]),
    );
}

pub fn log_death(tick: u64, agent: AgentId, role: ResourceKind) {
    log(
        Level::Info,
        Domain::Agent,
        "death",
        obj(&[
            ("tick", json!(tick)),
            ("agent", json!(agent)),
            ("role", v_str(role.as_str())),
        ]),
    );
}

pub fn log_remint(tick: u64, average_money: f64, divisor: i64) {
    log(
        Level::Info,
        Domain::Tax,
        "remint",
        obj(&[
            ("tick", json!(tick)),
            ("average_money", v_num(average_money)),
            ("divisor", json!(divisor)),
        ]),
    );
}

pub fn log_tick_summary(
    tick: u64,
    trades: usize,
    alive: usize,
    mean_qol: f64,
    treasury: i64,
    state_hash: &str,
) {
    log(
        Level::Info,
        Domain::Tick,
        "tick_summary",
        obj(&[
            ("tick", json!(tick)),
            ("trades", json!(trades)),
            ("alive", json!(alive)),
            ("mean_qol", v_num(mean_qol)),
            ("treasury", json!(treasury)),
            ("state_hash", v_str(state_hash)),
        ]),
    );
}

// =============================================================================
// Field builders
// =============================================================================

pub fn obj(pairs: &[(&str, Value)]) -> Map<String, Value> {
    let mut map = Map::new();
    for (k, v) in pairs {
        map.insert((*k).to_string(), v.clone());
    }
    map
}

pub fn v_str(s: &str) -> Value {
    Value::String(s.to_string())
}

pub fn v_num(n: f64) -> Value {
    json!(n)
}
