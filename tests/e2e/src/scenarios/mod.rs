//! Delivery scenarios over real HTTP.

mod delivery;
mod outage;
