//! Simulated traffic source driven by the local time of day.

use std::collections::HashMap;

use jiff::Timestamp;
use jiff::tz::TimeZone;

use crate::error::CollaboratorError;
use crate::model::{Coordinate, Order, OrderId, TrafficCondition};
use crate::traits::TrafficSource;

/// Classifies every order by the local hour at lookup time:
/// rush hours are heavy, lunch is moderate, nights are clear.
#[derive(Debug, Clone)]
pub struct TimeOfDayTraffic {
    time_zone: TimeZone,
}

impl Default for TimeOfDayTraffic {
    fn default() -> Self {
        Self { time_zone: TimeZone::UTC }
    }
}

impl TimeOfDayTraffic {
    pub fn new(time_zone: TimeZone) -> Self {
        Self { time_zone }
    }

    pub fn condition_at(&self, at: Timestamp) -> TrafficCondition {
        match at.to_zoned(self.time_zone.clone()).hour() {
            7..=9 | 17..=19 => TrafficCondition::Heavy,
            12..=13 => TrafficCondition::Moderate,
            22..=23 | 0..=5 => TrafficCondition::Clear,
            _ => TrafficCondition::Light,
        }
    }
}

impl TrafficSource for TimeOfDayTraffic {
    fn lookup(
        &self,
        orders: &[Order],
        _driver_location: Coordinate,
        at: Timestamp,
    ) -> Result<HashMap<OrderId, TrafficCondition>, CollaboratorError> {
        let condition = self.condition_at(at);
        Ok(orders.iter().map(|order| (order.id.clone(), condition)).collect())
    }
}
