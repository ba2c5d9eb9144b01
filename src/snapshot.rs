//! Read-only view of the simulation for external observers.
//!
//! Renderers and replay tools consume [`TickSnapshot`]s; nothing here feeds
//! back into the simulation.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::agent::{Agent, AgentId};
use crate::market::Market;
use crate::resource::{Ledger, ResourceKind};
use crate::tax::TaxAuthority;

/// Every participant in the economy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "actor", rename_all = "snake_case")]
pub enum Actor {
    Agent {
        id: AgentId,
        alive: bool,
        role: ResourceKind,
        ledger: Ledger,
        qol: i64,
    },
    TaxAuthority {
        treasury: i64,
        rate: f64,
    },
}

impl Actor {
    pub fn from_agent(agent: &Agent) -> Self {
        Actor::Agent {
            id: agent.id,
            alive: agent.alive,
            role: agent.role(),
            ledger: agent.ledger,
            qol: agent.quality_of_life(),
        }
    }

    pub fn from_tax_authority(tax: &TaxAuthority) -> Self {
        Actor::TaxAuthority {
            treasury: tax.treasury,
            rate: tax.rate,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickSnapshot {
    pub tick: u64,
    pub actors: Vec<Actor>,
    pub prices: BTreeMap<ResourceKind, i64>,
    pub mean_qol: f64,
}

impl TickSnapshot {
    pub fn capture(tick: u64, agents: &[Agent], tax: &TaxAuthority, market: &Market) -> Self {
        let mut actors: Vec<Actor> = agents.iter().map(Actor::from_agent).collect();
        actors.push(Actor::from_tax_authority(tax));
        Self {
            tick,
            actors,
            prices: market.prices().clone(),
            mean_qol: mean_qol(agents),
        }
    }

    /// SHA-256 over the tick, every actor and the price table.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.tick.to_le_bytes());
        for actor in &self.actors {
            match actor {
                Actor::Agent {
                    id, alive, role, ledger, ..
                } => {
                    hasher.update(id.0.to_le_bytes());
                    hasher.update([*alive as u8]);
                    hasher.update(role.as_str().as_bytes());
                    for (_, qty) in ledger.iter() {
                        hasher.update(qty.to_le_bytes());
                    }
                }
                Actor::TaxAuthority { treasury, rate } => {
                    hasher.update(treasury.to_le_bytes());
                    hasher.update(rate.to_bits().to_le_bytes());
                }
            }
        }
        for (kind, price) in &self.prices {
            hasher.update(kind.as_str().as_bytes());
            hasher.update(price.to_le_bytes());
        }
        hex::encode(hasher.finalize())
    }
}

/// Mean QoL over live producing agents, rounded to two decimals.
pub fn mean_qol(agents: &[Agent]) -> f64 {
    let producers: Vec<&Agent> = agents
        .iter()
        .filter(|a| a.alive && a.is_producer())
        .collect();
    if producers.is_empty() {
        return 0.0;
    }
    let total: i64 = producers.iter().map(|a| a.quality_of_life()).sum();
    let mean = total as f64 / producers.len() as f64;
    (mean * 100.0).round() / 100.0
}

/// Appends snapshots as JSON lines.
#[derive(Debug)]
pub struct SnapshotWriter {
    writer: BufWriter<File>,
}

impl SnapshotWriter {
    pub fn create(path: &Path) -> Result<Self> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        Ok(Self {
            writer: BufWriter::new(File::create(path)?),
        })
    }

    pub fn append(&mut self, snapshot: &TickSnapshot) -> Result<()> {
        serde_json::to_writer(&mut self.writer, snapshot)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    pub fn finish(mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}
