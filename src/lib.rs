//! Closed-economy simulation.
//!
//! A fixed population of producers and clerks, a tax authority and a market
//! run a deterministic, single-threaded tick loop:
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌──────────────┐
//! │    Agents    │────►│ TaxAuthority │────►│    Market    │
//! │ produce/eat  │     │ salary/floor │     │ queue/clear  │
//! └──────────────┘     └──────────────┘     └──────────────┘
//!        ▲                                         │
//!        │            ┌──────────────┐             │
//!        └────────────│ death check  │◄── prices ◄─┘
//!                     └──────────────┘
//! ```
//!
//! Start from [`sim::SimState::bootstrap`] and call
//! [`sim::SimState::step`] once per tick.

pub mod agent;
pub mod config;
pub mod logging;
pub mod market;
pub mod resource;
pub mod sim;
pub mod snapshot;
pub mod tax;
pub mod transaction;
pub mod verify;
