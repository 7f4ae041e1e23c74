//! Instance selection strategies.

use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rand::Rng;

use super::ServiceInstance;

/// Picks one backend out of the instances a registry returned.
pub trait InstanceSelector: Send + Sync {
    /// `None` only when nothing is eligible.
    fn select(&self, instances: &[ServiceInstance]) -> Option<ServiceInstance>;

    /// Strategy name for logs.
    fn name(&self) -> &'static str;
}

/// Always the first instance.
#[derive(Debug, Default)]
pub struct FirstInstance;

impl InstanceSelector for FirstInstance {
    fn select(&self, instances: &[ServiceInstance]) -> Option<ServiceInstance> {
        instances.first().cloned()
    }

    fn name(&self) -> &'static str {
        "first"
    }
}

/// Rotates through instances across calls.
#[derive(Debug, Default)]
pub struct RoundRobin {
    next: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl InstanceSelector for RoundRobin {
    fn select(&self, instances: &[ServiceInstance]) -> Option<ServiceInstance> {
        if instances.is_empty() {
            return None;
        }
        let index = self.next.fetch_add(1, Ordering::Relaxed) % instances.len();
        instances.get(index).cloned()
    }

    fn name(&self) -> &'static str {
        "round-robin"
    }
}

/// Uniformly random instance.
#[derive(Debug, Default)]
pub struct RandomInstance;

impl InstanceSelector for RandomInstance {
    fn select(&self, instances: &[ServiceInstance]) -> Option<ServiceInstance> {
        if instances.is_empty() {
            return None;
        }
        let index = rand::thread_rng().gen_range(0..instances.len());
        instances.get(index).cloned()
    }

    fn name(&self) -> &'static str {
        "random"
    }
}

/// Drops instances not reporting UP, then delegates.
pub struct HealthAware<S> {
    inner: S,
}

impl<S: InstanceSelector> HealthAware<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }
}

impl<S: InstanceSelector> InstanceSelector for HealthAware<S> {
    fn select(&self, instances: &[ServiceInstance]) -> Option<ServiceInstance> {
        let healthy: Vec<ServiceInstance> = instances
            .iter()
            .filter(|instance| instance.is_healthy())
            .cloned()
            .collect();
        self.inner.select(&healthy)
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }
}

/// Configurable selection strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionStrategy {
    First,
    RoundRobin,
    Random,
}

impl FromStr for SelectionStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "first" => Ok(SelectionStrategy::First),
            "round-robin" | "round_robin" | "roundrobin" => Ok(SelectionStrategy::RoundRobin),
            "random" => Ok(SelectionStrategy::Random),
            other => Err(format!("unknown selection strategy: {}", other)),
        }
    }
}

/// Build the selector described by configuration.
pub fn build_selector(strategy: SelectionStrategy, health_aware: bool) -> Arc<dyn InstanceSelector> {
    match (strategy, health_aware) {
        (SelectionStrategy::First, false) => Arc::new(FirstInstance),
        (SelectionStrategy::First, true) => Arc::new(HealthAware::new(FirstInstance)),
        (SelectionStrategy::RoundRobin, false) => Arc::new(RoundRobin::new()),
        (SelectionStrategy::RoundRobin, true) => Arc::new(HealthAware::new(RoundRobin::new())),
        (SelectionStrategy::Random, false) => Arc::new(RandomInstance),
        (SelectionStrategy::Random, true) => Arc::new(HealthAware::new(RandomInstance)),
    }
}
