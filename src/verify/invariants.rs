use crate::agent::Agent;
use crate::market::Market;
use crate::resource::ResourceKind;
use crate::sim::{SimState, TickReport};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvariantViolation {
    pub msg: String,
}

impl std::fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.msg)
    }
}

impl std::error::Error for InvariantViolation {}

pub fn assert_price_invariants(market: &Market) -> Result<(), InvariantViolation> {
    for kind in ResourceKind::PRODUCED {
        let price = market.price(kind);
        if price < 1 {
            return Err(InvariantViolation {
                msg: format!("price of {} below 1: {}", kind, price),
            });
        }
    }
    if market.prices().contains_key(&ResourceKind::Money) {
        return Err(InvariantViolation {
            msg: "money has a price".to_string(),
        });
    }
    Ok(())
}

pub fn assert_agent_invariants(agent: &Agent) -> Result<(), InvariantViolation> {
    if let Some((kind, qty)) = agent.ledger.consumables().find(|(_, q)| *q < 0) {
        return Err(InvariantViolation {
            msg: format!("{} holds negative {}: {}", agent.id, kind, qty),
        });
    }
    if agent.ledger.money < 0 {
        return Err(InvariantViolation {
            msg: format!("{} holds negative money: {}", agent.id, agent.ledger.money),
        });
    }
    if agent.quality_of_life() < 0 {
        return Err(InvariantViolation {
            msg: format!("{} has negative qol", agent.id),
        });
    }
    if !agent.alive && !agent.is_depleted() {
        return Err(InvariantViolation {
            msg: format!("{} dead with no depleted resource", agent.id),
        });
    }
    Ok(())
}

/// Money moves between agents and the treasury; it is only created by the
/// treasury top-up and only shrunk by a remint.
pub fn assert_money_conservation(
    before: i64,
    after: i64,
    report: &TickReport,
) -> Result<(), InvariantViolation> {
    if report.reminted {
        return Ok(());
    }
    let expected = before + report.minted;
    if after != expected {
        return Err(InvariantViolation {
            msg: format!(
                "money not conserved on tick {}: before={} minted={} after={}",
                report.tick, before, report.minted, after
            ),
        });
    }
    Ok(())
}

pub fn assert_state_invariants(sim: &SimState) -> Result<(), InvariantViolation> {
    assert_price_invariants(&sim.market)?;
    for agent in &sim.agents {
        assert_agent_invariants(agent)?;
    }
    if sim.tax_authority.treasury < 0 {
        return Err(InvariantViolation {
            msg: "treasury negative".to_string(),
        });
    }
    Ok(())
}
