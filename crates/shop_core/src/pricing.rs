//! crates/shop_core/src/pricing.rs
//!
//! Read-time pricing rules. Nothing here is ever cached on a cart line.

use crate::domain::{Money, Offer, Product};
use chrono::NaiveDate;

/// The price to charge on `today`: the offer price when one is set and `today`
/// lies inside the offer window (both bounds inclusive), else the base price.
pub fn effective_price(base_price: Money, offer: &Offer, today: NaiveDate) -> Money {
    match (offer.price, offer.starts_on, offer.ends_on) {
        (Some(price), Some(start), Some(end)) if start <= today && today <= end => price,
        _ => base_price,
    }
}

impl Product {
    pub fn effective_price(&self, today: NaiveDate) -> Money {
        effective_price(self.current_price, &self.offer, today)
    }
}
