use serde::{Deserialize, Serialize};

use crate::market::DEFAULT_MAX_PASSES;
use crate::tax::TreasuryPolicy;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    pub seed: u64,
    pub ticks: u64,
    /// Units of its own kind a producer adds each tick.
    pub production: i64,
    pub starting_money: i64,
    pub starting_stock: i64,
    pub producers_per_kind: usize,
    pub clerks: usize,
    pub tax_rate: f64,
    pub initial_treasury: i64,
    pub initial_price: i64,
    /// Clerk salary = total price level * this.
    pub salary_multiplier: i64,
    /// Treasury top-up = total price level * this.
    pub treasury_multiplier: i64,
    pub treasury_policy: TreasuryPolicy,
    /// Average money per live agent that triggers a remint.
    pub remint_limit: i64,
    pub remint_divisor: i64,
    pub max_passes: u32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            ticks: 100,
            production: 10,
            starting_money: 50,
            starting_stock: 3,
            producers_per_kind: 1,
            clerks: 3,
            tax_rate: 0.1,
            initial_treasury: 1000,
            initial_price: 10,
            salary_multiplier: 4,
            treasury_multiplier: 33,
            treasury_policy: TreasuryPolicy::Floor,
            remint_limit: 100_000,
            remint_divisor: 10,
            max_passes: DEFAULT_MAX_PASSES,
        }
    }
}

impl SimConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            seed: std::env::var("SEED").ok().and_then(|v| v.parse().ok()).unwrap_or(d.seed),
            ticks: std::env::var("TICKS").ok().and_then(|v| v.parse().ok()).unwrap_or(d.ticks),
            production: std::env::var("PRODUCTION").ok().and_then(|v| v.parse().ok()).unwrap_or(d.production),
            starting_money: std::env::var("STARTING_MONEY").ok().and_then(|v| v.parse().ok()).unwrap_or(d.starting_money),
            starting_stock: std::env::var("STARTING_STOCK").ok().and_then(|v| v.parse().ok()).unwrap_or(d.starting_stock),
            producers_per_kind: std::env::var("PRODUCERS_PER_KIND").ok().and_then(|v| v.parse().ok()).unwrap_or(d.producers_per_kind),
            clerks: std::env::var("CLERKS").ok().and_then(|v| v.parse().ok()).unwrap_or(d.clerks),
            tax_rate: std::env::var("TAX_RATE").ok().and_then(|v| v.parse().ok()).filter(|r: &f64| (0.0..1.0).contains(r)).unwrap_or(d.tax_rate),
            initial_treasury: std::env::var("TREASURY").ok().and_then(|v| v.parse().ok()).unwrap_or(d.initial_treasury),
            initial_price: std::env::var("PRICE").ok().and_then(|v| v.parse().ok()).filter(|p: &i64| *p >= 1).unwrap_or(d.initial_price),
            salary_multiplier: std::env::var("SALARY_MULT").ok().and_then(|v| v.parse().ok()).unwrap_or(d.salary_multiplier),
            treasury_multiplier: std::env::var("FLOOR_MULT").ok().and_then(|v| v.parse().ok()).unwrap_or(d.treasury_multiplier),
            treasury_policy: std::env::var("TREASURY_POLICY").ok().and_then(|v| TreasuryPolicy::parse(&v)).unwrap_or(d.treasury_policy),
            remint_limit: std::env::var("REMINT_LIMIT").ok().and_then(|v| v.parse().ok()).unwrap_or(d.remint_limit),
            remint_divisor: std::env::var("REMINT_DIVISOR").ok().and_then(|v| v.parse().ok()).filter(|v: &i64| *v >= 2).unwrap_or(d.remint_divisor),
            max_passes: std::env::var("MAX_PASSES").ok().and_then(|v| v.parse().ok()).filter(|p: &u32| *p >= 1).unwrap_or(d.max_passes),
        }
    }
}
