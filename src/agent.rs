//! Resource-producing agents.
//!
//! Each agent produces exactly one kind and consumes the others every tick.
//! Agents whose role is `Money` are clerks: they produce nothing, consume
//! everything, and live off the salary paid by the tax authority.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::resource::{Ledger, ResourceKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(pub u32);

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "a{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub alive: bool,
    /// Produced kind; `Money` marks a clerk. Never changes.
    role: ResourceKind,
    pub ledger: Ledger,
}

impl Agent {
    pub fn new(id: AgentId, role: ResourceKind, ledger: Ledger) -> Self {
        Self {
            id,
            alive: true,
            role,
            ledger,
        }
    }

    pub fn role(&self) -> ResourceKind {
        self.role
    }

    pub fn is_clerk(&self) -> bool {
        self.role == ResourceKind::Money
    }

    pub fn is_producer(&self) -> bool {
        self.role.is_consumable()
    }

    pub fn consumable_resources(&self) -> Vec<(ResourceKind, i64)> {
        self.ledger.consumables().collect()
    }

    /// Produce the own kind, consume every other consumable kind.
    ///
    /// Consumption is `max(1, stock / 3)` so stock always drains; results
    /// are clamped at zero. Death is not decided here.
    pub fn produce_or_consume(&mut self, production: i64) {
        for (kind, qty) in self.consumable_resources() {
            let next = if kind == self.role {
                qty + production
            } else {
                qty - consumption(qty)
            };
            self.ledger.set(kind, next.max(0));
        }
    }

    /// Minimum held quantity across consumable kinds, never below zero.
    pub fn quality_of_life(&self) -> i64 {
        self.ledger
            .consumables()
            .map(|(_, q)| q)
            .min()
            .unwrap_or(0)
            .max(0)
    }

    /// True when some other consumable kind is strictly scarcer than `kind`,
    /// i.e. giving up one unit of `kind` does not touch the bottleneck.
    pub fn keeps_qol(&self, kind: ResourceKind) -> bool {
        let held = self.ledger.get(kind);
        self.ledger
            .consumables()
            .any(|(other, q)| other != kind && q < held)
    }

    /// Any consumable kind at the zero clamp.
    pub fn is_depleted(&self) -> bool {
        self.ledger.consumables().any(|(_, q)| q <= 0)
    }
}

fn consumption(qty: i64) -> i64 {
    (qty / 3).max(1)
}
