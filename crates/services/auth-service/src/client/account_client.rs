//! HTTP client pushing account lifecycle changes to the Account service.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use common::{HttpClientConfig, NotifyError};
use domain::{DormancyNotice, UserDetail, UserId, ACCOUNT_DORMANCY_PATH, ACCOUNT_RESOURCE_PATH};

use crate::discovery::{InstanceSelector, ServiceRegistry};

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// Notifications the Auth service sends to the Account service.
///
/// Each call is a single attempt; retries are the caller's business.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait AccountNotifier: Send + Sync {
    /// Push the details of a newly registered user
    async fn notify_registration(&self, detail: &UserDetail) -> Result<(), NotifyError>;

    /// Tell the Account service that a user went dormant
    async fn notify_dormancy(&self, id: UserId) -> Result<(), NotifyError>;
}

/// Discovery-backed HTTP implementation of [`AccountNotifier`].
pub struct AccountClient {
    registry: Arc<dyn ServiceRegistry>,
    selector: Arc<dyn InstanceSelector>,
    http: reqwest::Client,
    service_name: String,
}

impl AccountClient {
    pub fn new(
        registry: Arc<dyn ServiceRegistry>,
        selector: Arc<dyn InstanceSelector>,
        http: reqwest::Client,
        service_name: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            selector,
            http,
            service_name: service_name.into(),
        }
    }

    /// HTTP client with the configured timeouts.
    pub fn http_client(config: &HttpClientConfig) -> Result<reqwest::Client, reqwest::Error> {
        reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.request_timeout())
            .build()
    }

    /// Resolve an instance and POST `body` as JSON to `path` on it.
    async fn post<T: Serialize + Sync>(&self, path: &str, body: &T) -> Result<(), NotifyError> {
        let instances = self.registry.resolve(&self.service_name).await?;
        if instances.is_empty() {
            return Err(NotifyError::no_instances(&self.service_name));
        }

        let instance = self
            .selector
            .select(&instances)
            .ok_or_else(|| NotifyError::no_instances(&self.service_name))?;
        let url = instance.endpoint(path);
        debug!(
            service = %self.service_name,
            instance = %instance.instance_id,
            strategy = self.selector.name(),
            %url,
            "Sending account notification"
        );

        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(NotifyError::RemoteRejected(status.as_u16()))
        }
    }
}

#[async_trait]
impl AccountNotifier for AccountClient {
    async fn notify_registration(&self, detail: &UserDetail) -> Result<(), NotifyError> {
        self.post(ACCOUNT_RESOURCE_PATH, detail).await
    }

    async fn notify_dormancy(&self, id: UserId) -> Result<(), NotifyError> {
        self.post(ACCOUNT_DORMANCY_PATH, &DormancyNotice { id }).await
    }
}

fn classify_transport_error(err: reqwest::Error) -> NotifyError {
    let cause = if err.is_timeout() {
        "timed out"
    } else if err.is_connect() {
        "connection failed"
    } else {
        "request failed"
    };
    NotifyError::TransportFailure(format!("{}: {}", cause, err))
}
