//! Service registry lookups.
//!
//! A registry maps a logical service name to the instances currently
//! registered under it. Two implementations are provided: a fixed list taken
//! from configuration and a client for Eureka-compatible registries.

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::{header::ACCEPT, StatusCode};
use serde::Deserialize;
use tracing::debug;

use common::NotifyError;

/// Health reported by the registry for one instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceStatus {
    Up,
    Down,
    Starting,
    OutOfService,
    Unknown,
}

impl From<&str> for InstanceStatus {
    fn from(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "UP" => InstanceStatus::Up,
            "DOWN" => InstanceStatus::Down,
            "STARTING" => InstanceStatus::Starting,
            "OUT_OF_SERVICE" => InstanceStatus::OutOfService,
            _ => InstanceStatus::Unknown,
        }
    }
}

/// One addressable instance of a service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceInstance {
    pub instance_id: String,
    /// Scheme, host and port, without trailing slash
    pub base_uri: String,
    pub status: InstanceStatus,
}

impl ServiceInstance {
    /// Instance reported as UP, identified by its base URI.
    pub fn new(base_uri: impl Into<String>) -> Self {
        let base_uri = base_uri.into().trim_end_matches('/').to_string();
        Self {
            instance_id: base_uri.clone(),
            base_uri,
            status: InstanceStatus::Up,
        }
    }

    pub fn with_status(mut self, status: InstanceStatus) -> Self {
        self.status = status;
        self
    }

    pub fn is_healthy(&self) -> bool {
        self.status == InstanceStatus::Up
    }

    /// Absolute URI of `path` on this instance.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_uri, path.trim_start_matches('/'))
    }
}

/// Discovery directory.
#[async_trait]
pub trait ServiceRegistry: Send + Sync {
    /// All instances registered under `service_name`; empty when none are.
    async fn resolve(&self, service_name: &str) -> Result<Vec<ServiceInstance>, NotifyError>;
}

/// Registry backed by configuration. Names match case-insensitively.
#[derive(Debug, Default, Clone)]
pub struct StaticRegistry {
    services: HashMap<String, Vec<ServiceInstance>>,
}

impl StaticRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `base_uris` under `service_name`.
    pub fn with_service<I, S>(mut self, service_name: &str, base_uris: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let instances = base_uris.into_iter().map(ServiceInstance::new).collect();
        self.services
            .insert(service_name.to_ascii_lowercase(), instances);
        self
    }

    /// Register fully described instances under `service_name`.
    pub fn with_instances(mut self, service_name: &str, instances: Vec<ServiceInstance>) -> Self {
        self.services
            .insert(service_name.to_ascii_lowercase(), instances);
        self
    }
}

#[async_trait]
impl ServiceRegistry for StaticRegistry {
    async fn resolve(&self, service_name: &str) -> Result<Vec<ServiceInstance>, NotifyError> {
        Ok(self
            .services
            .get(&service_name.to_ascii_lowercase())
            .cloned()
            .unwrap_or_default())
    }
}

/// Client for a Eureka-compatible registry (`GET /eureka/apps/{NAME}`).
pub struct EurekaRegistry {
    apps_url: String,
    http: reqwest::Client,
}

impl EurekaRegistry {
    /// `registry_url` may or may not already end in `/eureka`.
    pub fn new(registry_url: &str, http: reqwest::Client) -> Self {
        let base = registry_url.trim_end_matches('/');
        let apps_url = if base.ends_with("/eureka") {
            format!("{}/apps", base)
        } else {
            format!("{}/eureka/apps", base)
        };
        Self { apps_url, http }
    }

    fn app_url(&self, service_name: &str) -> String {
        format!("{}/{}", self.apps_url, service_name.to_ascii_uppercase())
    }
}

#[async_trait]
impl ServiceRegistry for EurekaRegistry {
    async fn resolve(&self, service_name: &str) -> Result<Vec<ServiceInstance>, NotifyError> {
        let url = self.app_url(service_name);
        debug!(%url, "Querying service registry");

        let response = self
            .http
            .get(&url)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(NotifyError::discovery)?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !response.status().is_success() {
            return Err(NotifyError::discovery(format!(
                "registry answered {} for {}",
                response.status(),
                service_name
            )));
        }

        let envelope: EurekaEnvelope = response.json().await.map_err(NotifyError::discovery)?;
        Ok(envelope.into_instances())
    }
}

#[derive(Debug, Deserialize)]
struct EurekaEnvelope {
    application: EurekaApplication,
}

#[derive(Debug, Deserialize)]
struct EurekaApplication {
    #[serde(default)]
    instance: Option<OneOrMany<EurekaInstance>>,
}

/// Eureka renders a lone instance as an object instead of a one-element array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EurekaInstance {
    instance_id: Option<String>,
    host_name: String,
    status: String,
    port: EurekaPort,
}

#[derive(Debug, Deserialize)]
struct EurekaPort {
    #[serde(rename = "$")]
    value: u16,
}

impl EurekaEnvelope {
    fn into_instances(self) -> Vec<ServiceInstance> {
        let instances = match self.application.instance {
            Some(OneOrMany::One(instance)) => vec![instance],
            Some(OneOrMany::Many(instances)) => instances,
            None => Vec::new(),
        };

        instances
            .into_iter()
            .map(|instance| {
                let base_uri = format!("http://{}:{}", instance.host_name, instance.port.value);
                ServiceInstance {
                    instance_id: instance.instance_id.unwrap_or_else(|| base_uri.clone()),
                    base_uri,
                    status: InstanceStatus::from(instance.status.as_str()),
                }
            })
            .collect()
    }
}
