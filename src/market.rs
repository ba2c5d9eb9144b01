//! Market clearing and price discovery.
//!
//! Each tick the market builds a queue of sale candidates (one per producer
//! willing to part with its own good), shuffles it, then scans it
//! circularly matching sellers with willing buyers:
//!
//! ```text
//!   cursor ──► [ a1:food ][ ✗ ][ a4:wood ][ a2:water ] ──┐
//!        ▲                                                │
//!        └──────────── wrap: reset had_sale ◄─────────────┘
//! ```
//!
//! Exhausted slots are tombstoned in place, never compacted, so indices of
//! the surviving entries stay stable while the cursor wraps. The outcome of
//! the scan, per kind, feeds back into prices for the next tick.

use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::agent::{Agent, AgentId};
use crate::resource::ResourceKind;
use crate::tax::TaxAuthority;
use crate::transaction::Transaction;

pub const DEFAULT_MAX_PASSES: u32 = 1000;

/// An offer to sell one unit at a time of `kind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaleCandidate {
    pub seller: AgentId,
    pub kind: ResourceKind,
}

/// One queue slot. `removed` slots keep their position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaleSlot {
    pub candidate: SaleCandidate,
    pub removed: bool,
    /// Seller was alive and willing but no buyer was found on some attempt.
    pub unmet: bool,
}

impl SaleSlot {
    fn new(candidate: SaleCandidate) -> Self {
        Self {
            candidate,
            removed: false,
            unmet: false,
        }
    }

    pub fn is_active(&self) -> bool {
        !self.removed
    }
}

/// Per-kind clearing outcome.
///
/// `true`: some willing seller found no buyer (excess supply).
/// `false`: sellers of the kind were never left without a buyer.
/// Kinds that were never offered have no entry.
pub type ClearingRecord = BTreeMap<ResourceKind, bool>;

/// Why a clearing run stopped before the queue was exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearingHalt {
    /// Money showed up as a sale candidate.
    MoneyOffered { seller: AgentId },
    /// The scan wrapped more than the allowed number of times.
    PassLimit { passes: u32 },
}

impl fmt::Display for ClearingHalt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClearingHalt::MoneyOffered { seller } => {
                write!(f, "money offered as a good by {}", seller)
            }
            ClearingHalt::PassLimit { passes } => {
                write!(f, "clearing exceeded {} passes", passes)
            }
        }
    }
}

impl std::error::Error for ClearingHalt {}

/// Result of one clearing run.
///
/// A halted run still carries every trade settled before the halt; its
/// record is left empty so prices stay put.
#[derive(Debug, Clone, Default)]
pub struct Clearing {
    pub transactions: Vec<Transaction>,
    pub record: ClearingRecord,
    pub passes: u32,
    pub halt: Option<ClearingHalt>,
}

impl Clearing {
    fn halted(mut self, halt: ClearingHalt) -> Self {
        self.halt = Some(halt);
        self
    }
}

#[derive(Debug, Clone)]
pub struct Market {
    prices: BTreeMap<ResourceKind, i64>,
    queue: Vec<SaleSlot>,
    max_passes: u32,
}

impl Market {
    pub fn new(initial_price: i64) -> Self {
        Self {
            prices: ResourceKind::PRODUCED
                .iter()
                .map(|&k| (k, initial_price.max(1)))
                .collect(),
            queue: Vec::new(),
            max_passes: DEFAULT_MAX_PASSES,
        }
    }

    pub fn with_max_passes(mut self, max_passes: u32) -> Self {
        self.max_passes = max_passes.max(1);
        self
    }

    pub fn price(&self, kind: ResourceKind) -> i64 {
        self.prices.get(&kind).copied().unwrap_or(1)
    }

    pub fn set_price(&mut self, kind: ResourceKind, price: i64) {
        if kind.is_consumable() {
            self.prices.insert(kind, price.max(1));
        }
    }

    pub fn prices(&self) -> &BTreeMap<ResourceKind, i64> {
        &self.prices
    }

    /// Sum of all prices times `multiplier`.
    pub fn total_price(&self, multiplier: i64) -> i64 {
        self.prices.values().map(|p| p * multiplier).sum()
    }

    /// Divide every price by `divisor`, keeping the floor of 1.
    /// Divisors below 2 leave prices untouched.
    pub fn deflate(&mut self, divisor: i64) {
        if divisor < 2 {
            return;
        }
        for price in self.prices.values_mut() {
            *price = (*price / divisor).max(1);
        }
    }

    pub fn queue(&self) -> &[SaleSlot] {
        &self.queue
    }

    /// Rebuild the sale queue: every live producer whose own good is in
    /// stock and not its bottleneck offers it. The queue is then shuffled.
    pub fn setup_queue<R: Rng + ?Sized>(&mut self, agents: &[Agent], rng: &mut R) {
        self.queue.clear();
        for agent in agents.iter().filter(|a| a.alive) {
            for (kind, qty) in agent.consumable_resources() {
                if kind == agent.role() && qty > 0 && agent.keeps_qol(kind) {
                    self.queue.push(SaleSlot::new(SaleCandidate {
                        seller: agent.id,
                        kind,
                    }));
                }
            }
        }
        self.queue.shuffle(rng);
    }

    /// Run the clearing loop over the current queue.
    ///
    /// The cursor stays on a slot while it keeps finding buyers and only
    /// advances when a search comes up empty. The scan stops when the cursor
    /// lands on a tombstone, or when a full pass ends without any sale.
    /// A money candidate or too many passes halts the run early.
    pub fn clear<R: Rng + ?Sized>(
        &mut self,
        agents: &mut [Agent],
        tax_authority: &mut TaxAuthority,
        rng: &mut R,
    ) -> Clearing {
        let mut clearing = Clearing::default();
        let len = self.queue.len();
        if len == 0 {
            return clearing;
        }

        let index: HashMap<AgentId, usize> =
            agents.iter().enumerate().map(|(i, a)| (a.id, i)).collect();

        let mut cursor = 0;
        let mut had_sale = false;
        clearing.passes = 1;

        while self.queue[cursor].is_active() {
            let SaleCandidate { seller, kind } = self.queue[cursor].candidate;
            if !kind.is_consumable() {
                return clearing.halted(ClearingHalt::MoneyOffered { seller });
            }

            let seller_idx = index.get(&seller).copied();
            let price = self.price(kind);
            let buyer_idx = match seller_idx {
                Some(s) if agents[s].alive => find_buyer(agents, s, kind, price, rng),
                _ => None,
            };

            let slot = &mut self.queue[cursor];
            match (seller_idx, buyer_idx) {
                (Some(s), Some(b)) => {
                    let (seller_agent, buyer_agent) = pair_mut(agents, s, b);
                    if let Some(tx) =
                        Transaction::settle(buyer_agent, seller_agent, kind, price, tax_authority)
                    {
                        clearing.transactions.push(tx);
                    }
                    had_sale = true;
                }
                (Some(s), None) if agents[s].alive && agents[s].keeps_qol(kind) => {
                    slot.unmet = true;
                }
                _ => {}
            }

            let exhausted = match seller_idx {
                Some(s) => !agents[s].alive || !agents[s].keeps_qol(kind),
                None => true,
            };
            if exhausted {
                slot.removed = true;
            }

            if buyer_idx.is_some() {
                continue;
            }
            if cursor == len - 1 && !had_sale {
                break;
            }
            cursor = (cursor + 1) % len;
            if cursor == 0 {
                had_sale = false;
                clearing.passes += 1;
                if clearing.passes > self.max_passes {
                    return clearing.halted(ClearingHalt::PassLimit {
                        passes: self.max_passes,
                    });
                }
            }
        }

        clearing.record = self.record();
        clearing
    }

    /// Per-kind outcome of the last clearing run.
    pub fn record(&self) -> ClearingRecord {
        let mut record = ClearingRecord::new();
        for slot in &self.queue {
            let entry = record.entry(slot.candidate.kind).or_insert(false);
            *entry |= slot.unmet;
        }
        record
    }

    /// Move prices from a clearing record: unmet supply lowers the price
    /// by 5% (floor), otherwise it rises by 5% (ceiling). Never below 1.
    /// Returns `(kind, old, new)` for every kind in the record.
    pub fn adjust_prices(&mut self, record: &ClearingRecord) -> Vec<(ResourceKind, i64, i64)> {
        let mut changes = Vec::new();
        for (&kind, &unmet) in record {
            let Some(price) = self.prices.get_mut(&kind) else {
                continue;
            };
            let old = *price;
            let next = if unmet {
                old * 95 / 100
            } else {
                (old * 105 + 99) / 100
            };
            *price = next.max(1);
            changes.push((kind, old, *price));
        }
        changes
    }
}

/// Pick a buyer for one unit of `kind`: a live agent other than the seller
/// that would not keep its QoL by selling `kind` and can afford `price`.
/// Candidates are tried in random order.
fn find_buyer<R: Rng + ?Sized>(
    agents: &[Agent],
    seller: usize,
    kind: ResourceKind,
    price: i64,
    rng: &mut R,
) -> Option<usize> {
    let mut willing: Vec<usize> = agents
        .iter()
        .enumerate()
        .filter(|(i, a)| *i != seller && a.alive && !a.keeps_qol(kind))
        .map(|(i, _)| i)
        .collect();
    willing.shuffle(rng);
    willing
        .into_iter()
        .find(|&i| agents[i].ledger.money >= price)
}

/// Two distinct mutable borrows out of one slice.
fn pair_mut(agents: &mut [Agent], a: usize, b: usize) -> (&mut Agent, &mut Agent) {
    debug_assert_ne!(a, b);
    if a < b {
        let (lo, hi) = agents.split_at_mut(b);
        (&mut lo[a], &mut hi[0])
    } else {
        let (lo, hi) = agents.split_at_mut(a);
        (&mut hi[0], &mut lo[b])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::Ledger;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn agent(id: u32, role: ResourceKind, money: i64, stock: [i64; 3]) -> Agent {
        let mut ledger = Ledger::new(money, 0);
        ledger.food = stock[0];
        ledger.water = stock[1];
        ledger.wood = stock[2];
        Agent::new(AgentId(id), role, ledger)
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn test_queue_only_offers_own_surplus() {
        let agents = vec![
            // food producer with surplus food
            agent(1, ResourceKind::Food, 50, [13, 2, 2]),
            // water producer whose water is the bottleneck
            agent(2, ResourceKind::Water, 50, [5, 1, 5]),
            // wood producer holding surplus food it did not produce
            agent(3, ResourceKind::Wood, 50, [20, 4, 4]),
            agent(4, ResourceKind::Money, 150, [9, 2, 2]),
        ];
        let mut market = Market::new(10);
        market.setup_queue(&agents, &mut rng());
        let offers: Vec<_> = market.queue().iter().map(|s| s.candidate).collect();
        assert_eq!(
            offers,
            vec![SaleCandidate {
                seller: AgentId(1),
                kind: ResourceKind::Food
            }]
        );
    }

    #[test]
    fn test_queue_skips_dead_agents() {
        let mut agents = vec![agent(1, ResourceKind::Food, 50, [13, 2, 2])];
        agents[0].alive = false;
        let mut market = Market::new(10);
        market.setup_queue(&agents, &mut rng());
        assert!(market.queue().is_empty());
    }

    #[test]
    fn test_queue_rebuilt_each_time() {
        let agents = vec![
            agent(1, ResourceKind::Food, 50, [13, 2, 2]),
            agent(2, ResourceKind::Wood, 50, [2, 2, 13]),
        ];
        let mut market = Market::new(10);
        market.setup_queue(&agents, &mut rng());
        market.setup_queue(&agents, &mut rng());
        assert_eq!(market.queue().len(), 2);
    }

    #[test]
    fn test_simple_trade_settles_once() {
        let mut agents = vec![
            agent(1, ResourceKind::Food, 50, [13, 2, 2]),
            agent(2, ResourceKind::Money, 150, [2, 2, 2]),
        ];
        let mut tax = TaxAuthority::new(1000, 0.1);
        let mut market = Market::new(10);
        let mut r = rng();
        market.setup_queue(&agents, &mut r);

        let clearing = market.clear(&mut agents, &mut tax, &mut r);

        assert_eq!(clearing.transactions.len(), 1);
        assert_eq!(agents[0].ledger.food, 12);
        assert_eq!(agents[0].ledger.money, 59);
        assert_eq!(agents[1].ledger.food, 3);
        assert_eq!(agents[1].ledger.money, 140);
        assert_eq!(tax.treasury, 1001);
        // seller still willing, but the only buyer is now satisfied
        assert_eq!(clearing.record.get(&ResourceKind::Food), Some(&true));
    }

    #[test]
    fn test_unfulfilled_sale_lowers_price() {
        let mut agents = vec![
            agent(1, ResourceKind::Wood, 50, [2, 2, 13]),
            // broke buyer
            agent(2, ResourceKind::Money, 5, [2, 2, 2]),
        ];
        let mut tax = TaxAuthority::new(1000, 0.1);
        let mut market = Market::new(10);
        let mut r = rng();
        market.setup_queue(&agents, &mut r);

        let clearing = market.clear(&mut agents, &mut tax, &mut r);
        assert!(clearing.transactions.is_empty());
        assert_eq!(clearing.record, ClearingRecord::from([(ResourceKind::Wood, true)]));

        market.adjust_prices(&clearing.record);
        assert!(market.price(ResourceKind::Wood) < 10);
        assert_eq!(market.price(ResourceKind::Food), 10);
    }

    #[test]
    fn test_seller_exhausted_before_buyers_run_out() {
        // seller can give up exactly one unit before food ties the minimum
        let mut agents = vec![
            agent(1, ResourceKind::Food, 50, [3, 2, 2]),
            agent(2, ResourceKind::Money, 500, [0, 5, 5]),
            agent(3, ResourceKind::Money, 500, [0, 5, 5]),
        ];
        let mut tax = TaxAuthority::new(0, 0.1);
        let mut market = Market::new(10);
        let mut r = rng();
        market.setup_queue(&agents, &mut r);

        let clearing = market.clear(&mut agents, &mut tax, &mut r);
        assert_eq!(clearing.transactions.len(), 1);
        assert_eq!(agents[0].ledger.food, 2);
        assert!(market.queue()[0].removed);
        assert_eq!(clearing.record.get(&ResourceKind::Food), Some(&false));
    }

    #[test]
    fn test_buyers_must_afford_price() {
        let mut agents = vec![
            agent(1, ResourceKind::Water, 0, [2, 20, 2]),
            agent(2, ResourceKind::Money, 9, [2, 0, 2]),
            agent(3, ResourceKind::Money, 10, [2, 0, 2]),
        ];
        let mut tax = TaxAuthority::new(0, 0.1);
        let mut market = Market::new(10);
        let mut r = rng();
        market.setup_queue(&agents, &mut r);

        let clearing = market.clear(&mut agents, &mut tax, &mut r);
        assert_eq!(clearing.transactions.len(), 1);
        assert_eq!(clearing.transactions[0].buyer, AgentId(3));
        assert_eq!(agents[1].ledger.money, 9);
        assert_eq!(agents[2].ledger.money, 0);
    }

    #[test]
    fn test_dead_agents_never_buy() {
        let mut agents = vec![
            agent(1, ResourceKind::Food, 50, [13, 2, 2]),
            agent(2, ResourceKind::Money, 500, [0, 0, 0]),
        ];
        agents[1].alive = false;
        let mut tax = TaxAuthority::new(0, 0.1);
        let mut market = Market::new(10);
        let mut r = rng();
        market.setup_queue(&agents, &mut r);

        let clearing = market.clear(&mut agents, &mut tax, &mut r);
        assert!(clearing.transactions.is_empty());
        assert_eq!(agents[1].ledger.food, 0);
    }

    #[test]
    fn test_money_candidate_halts_clearing() {
        let mut agents = vec![agent(1, ResourceKind::Money, 50, [2, 2, 2])];
        let mut tax = TaxAuthority::new(0, 0.1);
        let mut market = Market::new(10);
        market.queue.push(SaleSlot::new(SaleCandidate {
            seller: AgentId(1),
            kind: ResourceKind::Money,
        }));

        let before = agents.clone();
        let clearing = market.clear(&mut agents, &mut tax, &mut rng());
        assert_eq!(
            clearing.halt,
            Some(ClearingHalt::MoneyOffered { seller: AgentId(1) })
        );
        assert!(clearing.record.is_empty());
        assert_eq!(agents, before);
    }

    #[test]
    fn test_pass_limit_reports_halt() {
        // both slots sell during the first pass, so the scan has to wrap
        // and a cap of one pass trips on it
        let mut agents = vec![
            agent(1, ResourceKind::Food, 500, [40, 2, 2]),
            agent(2, ResourceKind::Wood, 500, [2, 2, 40]),
            agent(3, ResourceKind::Money, 5000, [0, 0, 0]),
        ];
        let mut tax = TaxAuthority::new(0, 0.1);
        let mut market = Market::new(10).with_max_passes(1);
        let mut r = rng();
        market.setup_queue(&agents, &mut r);

        let clearing = market.clear(&mut agents, &mut tax, &mut r);
        assert_eq!(clearing.halt, Some(ClearingHalt::PassLimit { passes: 1 }));
        assert!(clearing.record.is_empty());
        // trades from the first pass already moved money and stay reported
        assert!(!clearing.transactions.is_empty());
        let tax_collected: i64 = clearing.transactions.iter().map(|t| t.tax).sum();
        assert_eq!(tax.treasury, tax_collected);
    }

    #[test]
    fn test_dead_seller_slot_is_skipped() {
        let mut agents = vec![
            agent(1, ResourceKind::Food, 50, [13, 2, 2]),
            agent(2, ResourceKind::Wood, 50, [2, 2, 13]),
            agent(3, ResourceKind::Money, 500, [0, 0, 0]),
        ];
        let mut tax = TaxAuthority::new(0, 0.1);
        let mut market = Market::new(10);
        for (seller, kind) in [(1, ResourceKind::Food), (2, ResourceKind::Wood)] {
            market.queue.push(SaleSlot::new(SaleCandidate {
                seller: AgentId(seller),
                kind,
            }));
        }
        agents[0].alive = false;

        let clearing = market.clear(&mut agents, &mut tax, &mut rng());

        assert!(clearing.halt.is_none());
        assert!(market.queue()[0].removed);
        assert!(!market.queue()[0].unmet);
        // the cursor moved on and the live wood seller still traded
        assert_eq!(clearing.transactions.len(), 1);
        assert_eq!(clearing.transactions[0].seller, AgentId(2));
        assert_eq!(agents[0].ledger.food, 13);
        assert_eq!(agents[0].ledger.money, 50);
        assert_eq!(agents[2].ledger.food, 0);
        assert_eq!(clearing.record.get(&ResourceKind::Food), Some(&false));
        assert_eq!(clearing.record.get(&ResourceKind::Wood), Some(&true));
    }

    #[test]
    fn test_empty_queue_yields_empty_record() {
        let mut agents: Vec<Agent> = Vec::new();
        let mut tax = TaxAuthority::new(0, 0.1);
        let mut market = Market::new(10);
        let clearing = market.clear(&mut agents, &mut tax, &mut rng());
        assert!(clearing.record.is_empty());
        assert!(clearing.transactions.is_empty());
    }

    #[test]
    fn test_price_adjustment_steps() {
        let mut market = Market::new(10);
        let record = ClearingRecord::from([
            (ResourceKind::Food, true),
            (ResourceKind::Water, false),
        ]);
        let changes = market.adjust_prices(&record);
        assert_eq!(market.price(ResourceKind::Food), 9);
        assert_eq!(market.price(ResourceKind::Water), 11);
        assert_eq!(market.price(ResourceKind::Wood), 10);
        assert_eq!(changes.len(), 2);
    }

    #[test]
    fn test_price_floor_is_one() {
        let mut market = Market::new(1);
        let record = ClearingRecord::from([(ResourceKind::Food, true)]);
        for _ in 0..5 {
            market.adjust_prices(&record);
        }
        assert_eq!(market.price(ResourceKind::Food), 1);

        market.adjust_prices(&ClearingRecord::from([(ResourceKind::Food, false)]));
        assert_eq!(market.price(ResourceKind::Food), 2);
    }

    #[test]
    fn test_money_never_priced() {
        let mut market = Market::new(10);
        market.set_price(ResourceKind::Money, 99);
        assert!(!market.prices().contains_key(&ResourceKind::Money));
        market.adjust_prices(&ClearingRecord::from([(ResourceKind::Money, false)]));
        assert!(!market.prices().contains_key(&ResourceKind::Money));
    }

    #[test]
    fn test_total_price_and_deflate() {
        let mut market = Market::new(10);
        assert_eq!(market.total_price(1), 30);
        assert_eq!(market.total_price(33), 990);
        market.set_price(ResourceKind::Wood, 5);
        market.deflate(10);
        assert_eq!(market.price(ResourceKind::Food), 1);
        assert_eq!(market.price(ResourceKind::Wood), 1);
    }

    #[test]
    fn test_deflate_ignores_degenerate_divisors() {
        let mut market = Market::new(10);
        market.deflate(0);
        market.deflate(1);
        market.deflate(-3);
        assert_eq!(market.total_price(1), 30);
    }

    #[test]
    fn test_clearing_terminates_for_many_seeds() {
        for seed in 0..200u64 {
            let mut r = StdRng::seed_from_u64(seed);
            let mut agents: Vec<Agent> = (0..12)
                .map(|i| {
                    let role = [
                        ResourceKind::Food,
                        ResourceKind::Water,
                        ResourceKind::Wood,
                        ResourceKind::Money,
                    ][i % 4];
                    let stock = [
                        r.gen_range(0..30),
                        r.gen_range(0..30),
                        r.gen_range(0..30),
                    ];
                    agent(i as u32, role, r.gen_range(0..400), stock)
                })
                .collect();
            let mut tax = TaxAuthority::new(1000, 0.1);
            let mut market = Market::new(r.gen_range(1..40));
            market.setup_queue(&agents, &mut r);
            let clearing = market.clear(&mut agents, &mut tax, &mut r);
            assert!(clearing.halt.is_none(), "seed {} halted: {:?}", seed, clearing.halt);
        }
    }
}
