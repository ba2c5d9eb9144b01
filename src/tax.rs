//! The tax authority: collects tax on trades, pays clerks, keeps a treasury.

use serde::{Deserialize, Serialize};

use crate::agent::Agent;

/// How the treasury is topped up each tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreasuryPolicy {
    /// `max(current, amount)`
    Floor,
    /// Unconditionally set to `amount`.
    Reset,
}

impl TreasuryPolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "floor" => Some(TreasuryPolicy::Floor),
            "reset" => Some(TreasuryPolicy::Reset),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxAuthority {
    pub treasury: i64,
    /// Fraction in `[0, 1)`.
    pub rate: f64,
}

impl TaxAuthority {
    pub fn new(treasury: i64, rate: f64) -> Self {
        Self {
            treasury,
            rate: rate.clamp(0.0, 0.999),
        }
    }

    /// Tax owed on a paid amount; at least 1 so cheap goods still pay.
    pub fn calculate_tax(&self, cost: i64) -> i64 {
        ((self.rate * cost as f64).floor() as i64).max(1)
    }

    /// Top up each live clerk's money to `refill` from the treasury.
    ///
    /// All-or-nothing per clerk: if the treasury cannot cover the full
    /// shortfall the clerk is skipped. Returns the total paid out.
    pub fn distribute_salary(&mut self, agents: &mut [Agent], refill: i64) -> i64 {
        let mut paid = 0;
        for agent in agents.iter_mut().filter(|a| a.alive && a.is_clerk()) {
            let shortfall = refill - agent.ledger.money;
            if shortfall <= 0 || self.treasury < shortfall {
                continue;
            }
            agent.ledger.money += shortfall;
            self.treasury -= shortfall;
            paid += shortfall;
        }
        paid
    }

    /// Raise the treasury to at least `floor`. Returns the money created.
    pub fn ensure_minimum_treasury(&mut self, floor: i64) -> i64 {
        let minted = (floor - self.treasury).max(0);
        self.treasury += minted;
        minted
    }

    /// Apply `policy` with `amount`. Returns the net money created,
    /// negative when a reset shrinks the treasury.
    pub fn replenish(&mut self, policy: TreasuryPolicy, amount: i64) -> i64 {
        match policy {
            TreasuryPolicy::Floor => self.ensure_minimum_treasury(amount),
            TreasuryPolicy::Reset => {
                let delta = amount - self.treasury;
                self.treasury = amount;
                delta
            }
        }
    }
}
