//! Resource kinds and the per-actor ledger.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed set of resources in the economy.
///
/// `Food`, `Water` and `Wood` are produced and consumed; `Money` is only a
/// medium of exchange and is never consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Food,
    Water,
    Wood,
    Money,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 4] = [
        ResourceKind::Food,
        ResourceKind::Water,
        ResourceKind::Wood,
        ResourceKind::Money,
    ];

    /// Every kind an agent can produce and consume.
    pub const PRODUCED: [ResourceKind; 3] =
        [ResourceKind::Food, ResourceKind::Water, ResourceKind::Wood];

    pub fn is_consumable(self) -> bool {
        !matches!(self, ResourceKind::Money)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Food => "food",
            ResourceKind::Water => "water",
            ResourceKind::Wood => "wood",
            ResourceKind::Money => "money",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Quantity held for every resource kind.
///
/// Money may go transiently negative inside a settlement; produced kinds
/// are clamped at zero by the code that consumes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Ledger {
    pub food: i64,
    pub water: i64,
    pub wood: i64,
    pub money: i64,
}

impl Ledger {
    pub fn new(money: i64, stock: i64) -> Self {
        Self {
            food: stock,
            water: stock,
            wood: stock,
            money,
        }
    }

    pub fn get(&self, kind: ResourceKind) -> i64 {
        match kind {
            ResourceKind::Food => self.food,
            ResourceKind::Water => self.water,
            ResourceKind::Wood => self.wood,
            ResourceKind::Money => self.money,
        }
    }

    pub fn get_mut(&mut self, kind: ResourceKind) -> &mut i64 {
        match kind {
            ResourceKind::Food => &mut self.food,
            ResourceKind::Water => &mut self.water,
            ResourceKind::Wood => &mut self.wood,
            ResourceKind::Money => &mut self.money,
        }
    }

    pub fn set(&mut self, kind: ResourceKind, qty: i64) {
        *self.get_mut(kind) = qty;
    }

    /// Consumable kinds paired with their current quantity.
    pub fn consumables(&self) -> impl Iterator<Item = (ResourceKind, i64)> + '_ {
        ResourceKind::PRODUCED.iter().map(move |&k| (k, self.get(k)))
    }

    pub fn iter(&self) -> impl Iterator<Item = (ResourceKind, i64)> + '_ {
        ResourceKind::ALL.iter().map(move |&k| (k, self.get(k)))
    }
}
