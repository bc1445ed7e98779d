//! Multi-criteria scoring of order sequences.
//!
//! A sequence is a permutation of order indices. Pickups are visited in
//! sequence order, then deliveries in the same relative order. The score is
//! a weighted sum of four sub-scores, each in `[0, 1]`, higher is better.
//!
//! Orders already in the vehicle ("collected") have no pickup leg: the pickup
//! walk skips them and only their delivery is routed.

use jiff::Timestamp;

use crate::config::EngineOptions;
use crate::error::{MatrixError, PlannerError};
use crate::matrix::{delivery_index, pickup_index, DistanceMatrix, ORIGIN_INDEX};
use crate::model::{OptimizationCriteria, PreparationWindow, TrafficCondition};

/// Delivery-window sub-score used until customer time windows are modeled.
pub const DELIVERY_WINDOW_PLACEHOLDER: f64 = 0.8;

/// The four normalized criteria of a sequence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubScores {
    pub distance: f64,
    pub preparation: f64,
    pub traffic: f64,
    pub delivery_window: f64,
}

impl SubScores {
    pub fn weighted(&self, criteria: &OptimizationCriteria) -> f64 {
        self.distance * criteria.distance()
            + self.preparation * criteria.preparation_time()
            + self.traffic * criteria.traffic()
            + self.delivery_window * criteria.delivery_window()
    }
}

#[derive(Debug, Clone, Copy)]
struct Readiness {
    /// Minutes from departure until the order is ready. Negative if already ready.
    ready_offset_min: f64,
    confidence: f64,
}

/// Everything needed to score sequences of one batch.
#[derive(Debug, Clone)]
pub struct ScoringContext {
    matrix: DistanceMatrix,
    order_count: usize,
    windows: Vec<Option<PreparationWindow>>,
    readiness: Vec<Option<Readiness>>,
    collected: Vec<bool>,
    traffic: Vec<TrafficCondition>,
    departure: Timestamp,
    speed_kmh: f64,
    pickup_dwell_min: f64,
    distance_ceiling_km: f64,
    preparation_grace_min: f64,
}

impl ScoringContext {
    /// `windows` and `traffic` are indexed like the order list the matrix was built from.
    pub fn new(
        matrix: DistanceMatrix,
        windows: Vec<Option<PreparationWindow>>,
        traffic: Vec<TrafficCondition>,
        departure: Timestamp,
        options: &EngineOptions,
    ) -> Result<Self, PlannerError> {
        let order_count = windows.len();
        if traffic.len() != order_count {
            return Err(PlannerError::InputMismatch {
                orders: order_count,
                traffic: traffic.len(),
            });
        }
        if matrix.size() != 2 * order_count + 1 {
            return Err(MatrixError::DimensionMismatch {
                expected: 2 * order_count + 1,
                actual: matrix.size(),
            }
            .into());
        }

        let readiness = windows
            .iter()
            .map(|window| {
                window.as_ref().map(|window| Readiness {
                    ready_offset_min: window.estimated_ready.duration_since(departure).as_secs_f64() / 60.0,
                    confidence: window.confidence,
                })
            })
            .collect();

        Ok(Self {
            matrix,
            order_count,
            windows,
            readiness,
            collected: vec![false; order_count],
            traffic,
            departure,
            speed_kmh: options.average_speed_kmh,
            pickup_dwell_min: options.pickup_dwell.as_secs_f64() / 60.0,
            distance_ceiling_km: options.distance_ceiling_km,
            preparation_grace_min: options.preparation_grace_minutes,
        })
    }

    /// Marks orders whose pickup already happened, indexed like the order list.
    pub fn with_collected(mut self, collected: Vec<bool>) -> Self {
        self.collected = collected;
        self
    }

    pub fn is_collected(&self, order: usize) -> bool {
        self.collected.get(order).copied().unwrap_or(false)
    }

    pub fn order_count(&self) -> usize {
        self.order_count
    }

    pub fn matrix(&self) -> &DistanceMatrix {
        &self.matrix
    }

    pub fn window(&self, order: usize) -> Option<&PreparationWindow> {
        self.windows.get(order).and_then(Option::as_ref)
    }

    pub fn traffic(&self, order: usize) -> TrafficCondition {
        self.traffic.get(order).copied().unwrap_or_default()
    }

    pub fn departure(&self) -> Timestamp {
        self.departure
    }

    /// Total kilometers from the origin through all pickups, then all deliveries.
    pub fn route_distance_km(&self, sequence: &[usize]) -> f64 {
        let n = self.order_count;
        let points = sequence
            .iter()
            .filter(|&&order| !self.is_collected(order))
            .map(|&order| pickup_index(order))
            .chain(sequence.iter().map(|&order| delivery_index(order, n)));

        let mut previous = ORIGIN_INDEX;
        let mut total = 0.0;
        for point in points {
            total += self.matrix.get(previous, point);
            previous = point;
        }
        total
    }

    pub fn sub_scores(&self, sequence: &[usize]) -> SubScores {
        SubScores {
            distance: self.distance_score(self.route_distance_km(sequence)),
            preparation: self.preparation_score(sequence),
            traffic: self.traffic_score(sequence),
            delivery_window: DELIVERY_WINDOW_PLACEHOLDER,
        }
    }

    /// Quality of a complete sequence in `[0, 1]`.
    pub fn evaluate_sequence(&self, sequence: &[usize], criteria: &OptimizationCriteria) -> f64 {
        self.sub_scores(sequence).weighted(criteria)
    }

    /// Quality of visiting `to` right after `from` (`None` is the driver origin).
    ///
    /// Applies the same formulas as [`evaluate_sequence`](Self::evaluate_sequence)
    /// to a single pickup leg. A collected `to` costs nothing; a collected
    /// `from` leaves the driver at the origin.
    pub fn evaluate_transition(&self, from: Option<usize>, to: usize, criteria: &OptimizationCriteria) -> f64 {
        let from_point = match from {
            Some(from) if !self.is_collected(from) => pickup_index(from),
            _ => ORIGIN_INDEX,
        };
        let leg_km = if self.is_collected(to) {
            0.0
        } else {
            self.matrix.get(from_point, pickup_index(to))
        };
        let arrival_min = self.minutes_for(leg_km);

        SubScores {
            distance: self.distance_score(leg_km),
            preparation: self.preparation_at(to, arrival_min).unwrap_or(1.0),
            traffic: self.traffic(to).score(),
            delivery_window: DELIVERY_WINDOW_PLACEHOLDER,
        }
        .weighted(criteria)
    }

    fn distance_score(&self, km: f64) -> f64 {
        if self.distance_ceiling_km <= 0.0 {
            return 0.0;
        }
        (1.0 - km / self.distance_ceiling_km).max(0.0)
    }

    fn preparation_score(&self, sequence: &[usize]) -> f64 {
        let mut previous = ORIGIN_INDEX;
        let mut clock_min = 0.0;
        let mut total = 0.0;
        let mut scored = 0usize;

        for &order in sequence.iter().filter(|&&order| !self.is_collected(order)) {
            let point = pickup_index(order);
            clock_min += self.minutes_for(self.matrix.get(previous, point));
            if let Some(score) = self.preparation_at(order, clock_min) {
                total += score;
                scored += 1;
            }
            clock_min += self.pickup_dwell_min;
            previous = point;
        }

        if scored == 0 { 1.0 } else { total / scored as f64 }
    }

    /// Confidence of `order`, attenuated by how long the driver waits for it.
    fn preparation_at(&self, order: usize, arrival_min: f64) -> Option<f64> {
        if self.is_collected(order) {
            return None;
        }
        let readiness = self.readiness.get(order).copied().flatten()?;
        let delay_min = readiness.ready_offset_min - arrival_min;
        if delay_min <= 0.0 {
            return Some(readiness.confidence);
        }
        let attenuation = if self.preparation_grace_min > 0.0 {
            (1.0 - delay_min / self.preparation_grace_min).max(0.0)
        } else {
            0.0
        };
        Some(readiness.confidence * attenuation)
    }

    fn traffic_score(&self, sequence: &[usize]) -> f64 {
        if sequence.is_empty() {
            return 1.0;
        }
        let total: f64 = sequence.iter().map(|&order| self.traffic(order).score()).sum();
        total / sequence.len() as f64
    }

    fn minutes_for(&self, km: f64) -> f64 {
        if self.speed_kmh <= 0.0 {
            return 0.0;
        }
        km / self.speed_kmh * 60.0
    }
}

/// Transition scores for every `(from, to)` pair, computed once per solve.
#[derive(Debug, Clone)]
pub struct TransitionTable {
    order_count: usize,
    values: Vec<f64>,
}

impl TransitionTable {
    pub fn new(context: &ScoringContext, criteria: &OptimizationCriteria) -> Self {
        let n = context.order_count();
        let mut values = Vec::with_capacity((n + 1) * n);
        for from in std::iter::once(None).chain((0..n).map(Some)) {
            for to in 0..n {
                values.push(context.evaluate_transition(from, to, criteria));
            }
        }
        Self { order_count: n, values }
    }

    pub fn get(&self, from: Option<usize>, to: usize) -> f64 {
        let row = from.map_or(0, |from| from + 1);
        self.values[row * self.order_count + to]
    }
}

/// Whether `sequence` visits each of `order_count` orders exactly once.
pub fn is_permutation(sequence: &[usize], order_count: usize) -> bool {
    if sequence.len() != order_count {
        return false;
    }
    let mut seen = vec![false; order_count];
    for &order in sequence {
        match seen.get_mut(order) {
            Some(slot) if !*slot => *slot = true,
            _ => return false,
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::haversine::HaversineMatrix;
    use crate::model::{Coordinate, Order};
    use jiff::SignedDuration;

    fn line_orders() -> Vec<Order> {
        // pickups and deliveries spread east of the origin along the equator
        (0..3)
            .map(|i| {
                let lng = 0.01 * (i as f64 + 1.0);
                Order::new(format!("o{i}"), Some(Coordinate::new(0.0, lng)), Coordinate::new(0.001, lng))
            })
            .collect()
    }

    fn context(windows: Vec<Option<PreparationWindow>>, traffic: Vec<TrafficCondition>) -> ScoringContext {
        let orders = line_orders();
        let matrix = DistanceMatrix::for_orders(Coordinate::new(0.0, 0.0), &orders, &HaversineMatrix).unwrap();
        ScoringContext::new(matrix, windows, traffic, Timestamp::UNIX_EPOCH, &EngineOptions::default()).unwrap()
    }

    fn plain_context() -> ScoringContext {
        context(vec![None; 3], vec![TrafficCondition::Unknown; 3])
    }

    #[test]
    fn shorter_sequence_scores_higher() {
        let ctx = plain_context();
        let criteria = OptimizationCriteria::default();
        let forward = ctx.evaluate_sequence(&[0, 1, 2], &criteria);
        let zigzag = ctx.evaluate_sequence(&[2, 0, 1], &criteria);
        assert!(forward > zigzag, "{forward} should beat {zigzag}");
    }

    #[test]
    fn distance_score_floors_at_zero() {
        let ctx = plain_context();
        assert_eq!(ctx.distance_score(80.0), 0.0);
        assert!((ctx.distance_score(25.0) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn empty_inputs_use_neutral_sub_scores() {
        let scores = plain_context().sub_scores(&[0, 1, 2]);
        assert_eq!(scores.preparation, 1.0);
        assert!((scores.traffic - 0.6).abs() < 1e-12);
        assert_eq!(scores.delivery_window, DELIVERY_WINDOW_PLACEHOLDER);
    }

    #[test]
    fn traffic_score_averages_mapping() {
        let ctx = context(
            vec![None; 3],
            vec![TrafficCondition::Clear, TrafficCondition::Heavy, TrafficCondition::Severe],
        );
        let scores = ctx.sub_scores(&[0, 1, 2]);
        assert!((scores.traffic - (1.0 + 0.4 + 0.2) / 3.0).abs() < 1e-12);
    }

    #[test]
    fn waiting_for_an_unready_order_attenuates_confidence() {
        let ready_late = Timestamp::UNIX_EPOCH + SignedDuration::from_mins(120);
        let ready_now = Timestamp::UNIX_EPOCH;
        let late = context(
            vec![Some(PreparationWindow::new("o0", ready_late, 0.9)), None, None],
            vec![TrafficCondition::Clear; 3],
        );
        let ready = context(
            vec![Some(PreparationWindow::new("o0", ready_now, 0.9)), None, None],
            vec![TrafficCondition::Clear; 3],
        );

        assert_eq!(late.sub_scores(&[0, 1, 2]).preparation, 0.0);
        assert!((ready.sub_scores(&[0, 1, 2]).preparation - 0.9).abs() < 1e-12);
    }

    #[test]
    fn visiting_an_unready_order_later_helps() {
        // o0 is ready 12 minutes after departure: picking it up last waits less
        let ready_at = Timestamp::UNIX_EPOCH + SignedDuration::from_mins(12);
        let ctx = context(
            vec![Some(PreparationWindow::new("o0", ready_at, 1.0)), None, None],
            vec![TrafficCondition::Clear; 3],
        );
        let first = ctx.sub_scores(&[0, 1, 2]).preparation;
        let last = ctx.sub_scores(&[1, 2, 0]).preparation;
        assert!(last > first, "{last} should beat {first}");
    }

    #[test]
    fn transition_table_matches_direct_evaluation() {
        let ctx = plain_context();
        let criteria = OptimizationCriteria::default();
        let table = TransitionTable::new(&ctx, &criteria);
        assert_eq!(table.get(None, 1), ctx.evaluate_transition(None, 1, &criteria));
        assert_eq!(table.get(Some(2), 0), ctx.evaluate_transition(Some(2), 0, &criteria));
    }

    #[test]
    fn nearer_transition_scores_higher() {
        let ctx = plain_context();
        let criteria = OptimizationCriteria::default();
        assert!(ctx.evaluate_transition(None, 0, &criteria) > ctx.evaluate_transition(None, 2, &criteria));
    }

    /// One order: origin to pickup `to_pickup` km, pickup to delivery `to_delivery` km.
    fn single_order_context(to_pickup: f64, to_delivery: f64, traffic: TrafficCondition) -> ScoringContext {
        let total = to_pickup + to_delivery;
        let matrix = DistanceMatrix::from_rows(vec![
            vec![0.0, to_pickup, total],
            vec![to_pickup, 0.0, to_delivery],
            vec![total, to_delivery, 0.0],
        ])
        .unwrap();
        let window = PreparationWindow::new("o0", Timestamp::UNIX_EPOCH, 0.8);
        ScoringContext::new(matrix, vec![Some(window)], vec![traffic], Timestamp::UNIX_EPOCH, &EngineOptions::default())
            .unwrap()
    }

    #[test]
    fn weight_order_is_irrelevant_only_when_sub_scores_agree() {
        let forward = OptimizationCriteria::new(0.4, 0.3, 0.2, 0.1).unwrap();
        let reversed = OptimizationCriteria::new(0.1, 0.2, 0.3, 0.4).unwrap();
        let rotated = OptimizationCriteria::new(0.3, 0.2, 0.1, 0.4).unwrap();

        // 10 km of 50 and Light traffic: every sub-score is 0.8
        let level = single_order_context(4.0, 6.0, TrafficCondition::Light);
        let scores = level.sub_scores(&[0]);
        for sub in [scores.distance, scores.preparation, scores.traffic, scores.delivery_window] {
            assert!((sub - 0.8).abs() < 1e-12, "{scores:?}");
        }
        for criteria in [forward, reversed, rotated] {
            assert!((level.evaluate_sequence(&[0], &criteria) - 0.8).abs() < 1e-12);
        }

        // Clear traffic lifts one sub-score above the rest
        let uneven = single_order_context(4.0, 6.0, TrafficCondition::Clear);
        let a = uneven.evaluate_sequence(&[0], &forward);
        let b = uneven.evaluate_sequence(&[0], &reversed);
        assert!((a - b).abs() > 1e-6, "{a} vs {b}");
    }

    #[test]
    fn collected_orders_skip_the_pickup_walk() {
        let ready_late = Timestamp::UNIX_EPOCH + SignedDuration::from_mins(120);
        let ctx = context(
            vec![Some(PreparationWindow::new("o0", ready_late, 0.9)), None, None],
            vec![TrafficCondition::Clear; 3],
        );
        let full = ctx.route_distance_km(&[0, 1, 2]);
        assert_eq!(ctx.sub_scores(&[0, 1, 2]).preparation, 0.0);

        let ctx = ctx.with_collected(vec![true, false, false]);
        assert!(ctx.is_collected(0) && !ctx.is_collected(1));
        let m = ctx.matrix();
        let expected = m.get(ORIGIN_INDEX, pickup_index(1))
            + m.get(pickup_index(1), pickup_index(2))
            + m.get(pickup_index(2), delivery_index(0, 3))
            + m.get(delivery_index(0, 3), delivery_index(1, 3))
            + m.get(delivery_index(1, 3), delivery_index(2, 3));
        assert!((ctx.route_distance_km(&[0, 1, 2]) - expected).abs() < 1e-12);
        assert!(ctx.route_distance_km(&[0, 1, 2]) <= full + 1e-9);
        // the late kitchen no longer matters once the food is in the car
        assert_eq!(ctx.sub_scores(&[0, 1, 2]).preparation, 1.0);

        let criteria = OptimizationCriteria::default();
        assert!(ctx.evaluate_transition(None, 0, &criteria) >= ctx.evaluate_transition(None, 1, &criteria));
    }

    #[test]
    fn detects_permutations() {
        assert!(is_permutation(&[2, 0, 1], 3));
        assert!(!is_permutation(&[0, 0, 1], 3));
        assert!(!is_permutation(&[0, 1], 3));
        assert!(!is_permutation(&[0, 1, 3], 3));
    }
}
