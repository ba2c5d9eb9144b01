//! Settlement of a single matched trade.

use serde::{Deserialize, Serialize};

use crate::agent::{Agent, AgentId};
use crate::resource::ResourceKind;
use crate::tax::TaxAuthority;

/// One unit of `kind` moving from `seller` to `buyer` at `price`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub buyer: AgentId,
    pub seller: AgentId,
    pub kind: ResourceKind,
    pub price: i64,
    pub tax: i64,
}

impl Transaction {
    /// Move one unit, charge the buyer, pay the seller net of tax and credit
    /// the tax to the treasury. Money is never traded as a good: returns
    /// `None` and leaves every ledger untouched.
    pub fn settle(
        buyer: &mut Agent,
        seller: &mut Agent,
        kind: ResourceKind,
        price: i64,
        tax_authority: &mut TaxAuthority,
    ) -> Option<Transaction> {
        if !kind.is_consumable() {
            return None;
        }

        *seller.ledger.get_mut(kind) -= 1;
        *buyer.ledger.get_mut(kind) += 1;

        buyer.ledger.money -= price;
        let tax = tax_authority.calculate_tax(price);
        seller.ledger.money += price - tax;
        tax_authority.treasury += tax;

        Some(Transaction {
            buyer: buyer.id,
            seller: seller.id,
            kind,
            price,
            tax,
        })
    }
}
