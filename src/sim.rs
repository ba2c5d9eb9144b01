//! Tick driver.
//!
//! One call to [`SimState::step`] runs, in order:
//! 1. production/consumption for every live agent
//! 2. money-supply correction (remint) when balances grow too large
//! 3. salary to clerks, then the treasury top-up
//! 4. queue rebuild and market clearing
//! 5. price adjustment from the clearing record
//! 6. death marking
//!
//! Agents trade only out of stock produced this tick, and an agent that
//! hits zero can still take part in its last trade before it is marked.

use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::BTreeMap;

use crate::agent::{Agent, AgentId};
use crate::config::SimConfig;
use crate::logging;
use crate::market::{ClearingHalt, ClearingRecord, Market};
use crate::resource::{Ledger, ResourceKind};
use crate::snapshot::TickSnapshot;
use crate::tax::TaxAuthority;
use crate::transaction::Transaction;

/// What happened during one tick.
#[derive(Debug, Clone)]
pub struct TickReport {
    pub tick: u64,
    pub transactions: Vec<Transaction>,
    pub tax_collected: i64,
    pub salary_paid: i64,
    /// Net money created by the treasury top-up.
    pub minted: i64,
    pub reminted: bool,
    /// `None` when clearing halted and prices were left alone.
    pub record: Option<ClearingRecord>,
    pub halt: Option<ClearingHalt>,
    pub died: Vec<AgentId>,
    pub prices: BTreeMap<ResourceKind, i64>,
}

/// The whole simulation, owned by the driver and threaded through each tick.
#[derive(Debug, Clone)]
pub struct SimState {
    pub tick: u64,
    pub agents: Vec<Agent>,
    pub tax_authority: TaxAuthority,
    pub market: Market,
    cfg: SimConfig,
    rng: StdRng,
}

impl SimState {
    pub fn new(
        cfg: SimConfig,
        agents: Vec<Agent>,
        tax_authority: TaxAuthority,
        market: Market,
    ) -> Self {
        let rng = StdRng::seed_from_u64(cfg.seed);
        let market = market.with_max_passes(cfg.max_passes);
        Self {
            tick: 0,
            agents,
            tax_authority,
            market,
            cfg,
            rng,
        }
    }

    /// Default population: `producers_per_kind` producers of every produced
    /// kind followed by `clerks` clerks.
    pub fn bootstrap(cfg: SimConfig) -> Self {
        let roles = ResourceKind::PRODUCED
            .iter()
            .flat_map(|&k| std::iter::repeat(k).take(cfg.producers_per_kind))
            .chain(std::iter::repeat(ResourceKind::Money).take(cfg.clerks));
        let agents = roles
            .enumerate()
            .map(|(i, role)| {
                Agent::new(
                    AgentId(i as u32),
                    role,
                    Ledger::new(cfg.starting_money, cfg.starting_stock),
                )
            })
            .collect();
        let tax = TaxAuthority::new(cfg.initial_treasury, cfg.tax_rate);
        let market = Market::new(cfg.initial_price);
        Self::new(cfg, agents, tax, market)
    }

    pub fn alive_count(&self) -> usize {
        self.agents.iter().filter(|a| a.alive).count()
    }

    /// Money held by every agent plus the treasury.
    pub fn total_money(&self) -> i64 {
        self.agents.iter().map(|a| a.ledger.money).sum::<i64>() + self.tax_authority.treasury
    }

    pub fn snapshot(&self) -> TickSnapshot {
        TickSnapshot::capture(self.tick, &self.agents, &self.tax_authority, &self.market)
    }

    pub fn step(&mut self) -> TickReport {
        self.tick += 1;
        let tick = self.tick;

        for agent in self.agents.iter_mut().filter(|a| a.alive) {
            agent.produce_or_consume(self.cfg.production);
        }

        let reminted = match remint(
            &mut self.agents,
            &mut self.tax_authority,
            &mut self.market,
            self.cfg.remint_limit,
            self.cfg.remint_divisor,
        ) {
            Some(average) => {
                logging::log_remint(tick, average, self.cfg.remint_divisor);
                true
            }
            None => false,
        };

        let salary = self.market.total_price(self.cfg.salary_multiplier);
        let salary_paid = self.tax_authority.distribute_salary(&mut self.agents, salary);
        let floor = self.market.total_price(self.cfg.treasury_multiplier);
        let minted = self.tax_authority.replenish(self.cfg.treasury_policy, floor);

        self.market.setup_queue(&self.agents, &mut self.rng);
        let clearing = self
            .market
            .clear(&mut self.agents, &mut self.tax_authority, &mut self.rng);
        let record = match clearing.halt {
            Some(halt) => {
                logging::log_clearing_halt(tick, &halt.to_string());
                None
            }
            None => {
                for (kind, old, new) in self.market.adjust_prices(&clearing.record) {
                    let unmet = clearing.record.get(&kind).copied().unwrap_or(false);
                    logging::log_price_change(tick, kind, old, new, unmet);
                }
                Some(clearing.record)
            }
        };
        let transactions = clearing.transactions;
        for tx in &transactions {
            logging::log_trade(tick, tx.seller, tx.buyer, tx.kind, tx.price, tx.tax);
        }

        let died = mark_dead(&mut self.agents);
        for id in &died {
            if let Some(agent) = self.agents.iter().find(|a| a.id == *id) {
                logging::log_death(tick, *id, agent.role());
            }
        }

        let snapshot = self.snapshot();
        logging::log_tick_summary(
            tick,
            transactions.len(),
            self.alive_count(),
            snapshot.mean_qol,
            self.tax_authority.treasury,
            &snapshot.digest(),
        );

        TickReport {
            tick,
            tax_collected: transactions.iter().map(|t| t.tax).sum(),
            transactions,
            salary_paid,
            minted,
            reminted,
            record,
            halt: clearing.halt,
            died,
            prices: self.market.prices().clone(),
        }
    }
}

/// Divide all live money, the treasury and prices by `divisor` once the
/// average live balance reaches `limit`. Returns that average when it fires.
pub fn remint(
    agents: &mut [Agent],
    tax_authority: &mut TaxAuthority,
    market: &mut Market,
    limit: i64,
    divisor: i64,
) -> Option<f64> {
    let alive: Vec<&mut Agent> = agents.iter_mut().filter(|a| a.alive).collect();
    if alive.is_empty() || divisor < 2 {
        return None;
    }
    let wallet: i64 = alive.iter().map(|a| a.ledger.money).sum();
    let average = wallet as f64 / alive.len() as f64;
    if average < limit as f64 {
        return None;
    }
    for agent in alive {
        agent.ledger.money /= divisor;
    }
    tax_authority.treasury /= divisor;
    market.deflate(divisor);
    Some(average)
}

/// Mark every live agent with a depleted consumable as dead.
pub fn mark_dead(agents: &mut [Agent]) -> Vec<AgentId> {
    let mut died = Vec::new();
    for agent in agents.iter_mut().filter(|a| a.alive && a.is_depleted()) {
        agent.alive = false;
        died.push(agent.id);
    }
    died
}
