//! Error types for the planner and the reoptimization controller.

use thiserror::Error;

use crate::model::RouteId;

/// Errors returned by [`OptimizationCriteria::new`](crate::model::OptimizationCriteria::new).
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CriteriaError {
    #[error("criteria weight `{name}` must be finite and non-negative, got {value}")]
    InvalidWeight { name: &'static str, value: f64 },

    #[error("criteria weights must sum to 1.0, got {sum}")]
    WeightSum { sum: f64 },
}

/// A distance matrix that cannot be used for solving.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum MatrixError {
    #[error("matrix row {row} has {len} entries, expected {expected}")]
    NotSquare { row: usize, len: usize, expected: usize },

    #[error("matrix covers {actual} points, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("matrix entry ({row}, {col}) is not a finite non-negative distance: {value}")]
    InvalidEntry { row: usize, col: usize, value: f64 },

    #[error("no route between points {row} and {col}")]
    Unroutable { row: usize, col: usize },

    #[error("distance provider failed: {0}")]
    Provider(String),
}

/// Errors surfaced by [`RouteOptimizer`](crate::engine::RouteOptimizer).
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PlannerError {
    #[error("cannot plan a route without orders")]
    EmptyOrders,

    #[error("invalid optimization criteria: {0}")]
    Criteria(#[from] CriteriaError),

    #[error("invalid distance matrix: {0}")]
    Matrix(#[from] MatrixError),

    #[error("{orders} preparation entries but {traffic} traffic entries")]
    InputMismatch { orders: usize, traffic: usize },

    #[error("sequence is not a permutation of {orders} orders: {sequence:?}")]
    InvalidSequence { orders: usize, sequence: Vec<usize> },
}

/// A transient failure reported by an external collaborator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{collaborator} failed: {message}")]
pub struct CollaboratorError {
    pub collaborator: &'static str,
    pub message: String,
}

impl CollaboratorError {
    pub fn new(collaborator: &'static str, message: impl Into<String>) -> Self {
        Self {
            collaborator,
            message: message.into(),
        }
    }
}

/// Failures inside a single reoptimization attempt. Never escape the controller.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ReoptimizationError {
    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),

    #[error(transparent)]
    Planner(#[from] PlannerError),

    #[error("evaluation aborted: {0}")]
    Aborted(String),
}

/// Errors returned by the public [`ReoptimizationController`](crate::controller::ReoptimizationController) API.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ControllerError {
    #[error("route {0} is already monitored")]
    AlreadyMonitored(RouteId),

    #[error("route {0} is not monitored")]
    NotMonitored(RouteId),

    #[error("monitor for route {0} has shut down")]
    WorkerUnavailable(RouteId),

    #[error("route {0} has no waypoints")]
    EmptyRoute(RouteId),
}
