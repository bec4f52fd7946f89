//! Defines the provisioning collaborator and the global client that
//! talks to the container instance management API.

use crate::conf::{CredentialSettings, Settings};
use crate::credential::{Credential, TokenProvider};
use crate::error::SubmissionError;
use crate::request::ContainerGroup;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use envy::from_env;
use once_cell::sync::OnceCell;
use reqwest::StatusCode;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};

/// The provisioning API's answer to a submitted container group.
/// Being accepted means the group was accepted for provisioning, not
/// that its container is running.
#[derive(Debug, Clone, PartialEq)]
pub struct Accepted {
    /// The container group name.
    pub name: String,

    /// The HTTP status of the response, 201 for a new group and 200
    /// for an update.
    pub status: u16,

    /// The provisioning state reported in the response body, if any.
    pub provisioning_state: Option<String>,

    /// The URL of the long-running operation, if any. Never polled.
    pub operation: Option<String>,
}

/// Something that can create or update a container group.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Provisioner: Send + Sync {
    /// Submit a container group under the given resource group and
    /// name. Returns once the submission is accepted.
    async fn create_or_update(
        &self,
        resource_group: &str,
        name: &str,
        group: &ContainerGroup,
    ) -> Result<Accepted, SubmissionError>;
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatedProperties {
    #[serde(default)]
    provisioning_state: Option<String>,
}

#[derive(Deserialize)]
struct Created {
    #[serde(default)]
    properties: Option<CreatedProperties>,
}

/// Client for the container groups of a single subscription.
pub struct ContainerGroupsClient {
    http: reqwest::Client,
    endpoint: String,
    subscription_id: String,
    api_version: String,
    tokens: TokenProvider,
}

impl ContainerGroupsClient {
    pub fn new(
        http: reqwest::Client,
        endpoint: &str,
        subscription_id: &str,
        api_version: &str,
        credential: Credential,
    ) -> Self {
        ContainerGroupsClient {
            tokens: TokenProvider::new(http.clone(), credential),
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            subscription_id: subscription_id.to_string(),
            api_version: api_version.to_string(),
        }
    }

    /// The management URL of a container group.
    pub fn url(&self, resource_group: &str, name: &str) -> String {
        format!(
            "{}/subscriptions/{}/resourceGroups/{}/providers/Microsoft.ContainerInstance/containerGroups/{}",
            self.endpoint, self.subscription_id, resource_group, name
        )
    }
}

#[async_trait]
impl Provisioner for ContainerGroupsClient {
    #[instrument(skip(self, group))]
    async fn create_or_update(
        &self,
        resource_group: &str,
        name: &str,
        group: &ContainerGroup,
    ) -> Result<Accepted, SubmissionError> {
        let token = self.tokens.token().await?;
        let response = self
            .http
            .put(self.url(resource_group, name))
            .query(&[("api-version", self.api_version.as_str())])
            .bearer_auth(token)
            .json(group)
            .send()
            .await?;
        let status = response.status();
        if status != StatusCode::OK && status != StatusCode::CREATED {
            let body = response.text().await.unwrap_or_default();
            return Err(SubmissionError::Rejected(status, body));
        }
        let operation = response
            .headers()
            .get("Azure-AsyncOperation")
            .and_then(|value| value.to_str().ok())
            .map(String::from);
        let provisioning_state = response
            .json::<Created>()
            .await
            .ok()
            .and_then(|created| created.properties)
            .and_then(|properties| properties.provisioning_state);
        info!(
            status = status.as_u16(),
            ?provisioning_state,
            "Container group accepted"
        );
        Ok(Accepted {
            name: name.to_string(),
            status: status.as_u16(),
            provisioning_state,
            operation,
        })
    }
}

/// Global provisioning client instance.
static CURRENT: OnceCell<Arc<ContainerGroupsClient>> = OnceCell::new();

/// Initialize the global provisioning client.
pub fn init(settings: &Settings) -> Result<()> {
    let credential_settings: CredentialSettings = from_env()?;
    let credential = Credential::from_settings(credential_settings);
    let client = ContainerGroupsClient::new(
        reqwest::Client::new(),
        &settings.management_endpoint,
        &settings.subscription_id,
        &settings.api_version,
        credential,
    );
    CURRENT
        .set(Arc::new(client))
        .map_err(|_| anyhow!("client::CURRENT was already initialized"))
}

/// Get the current provisioning client instance, or panic if it
/// hasn't been initialized.
pub fn current() -> Arc<ContainerGroupsClient> {
    CURRENT.get().expect("client is not initialized").clone()
}
