//! Service discovery: registry lookups and instance selection.

mod registry;
mod selector;

pub use registry::{EurekaRegistry, InstanceStatus, ServiceInstance, ServiceRegistry, StaticRegistry};
pub use selector::{
    build_selector, FirstInstance, HealthAware, InstanceSelector, RandomInstance, RoundRobin,
    SelectionStrategy,
};
