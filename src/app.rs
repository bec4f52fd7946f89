//! Defines the read-only application state and the handling of a
//! batch of change notifications.

use crate::client::{Accepted, Provisioner};
use crate::conf::Settings;
use crate::error::{HandlerError, MalformedUriError};
use crate::event::{decode_batch, records};
use crate::request::{
    container_group_name, AzureFileVolume, Container, ContainerGroup, ContainerGroupProperties,
    ContainerProperties, Diagnostics, EnvironmentVariable, ImageRegistryCredential, LogAnalytics,
    ResourceRequests, ResourceRequirements, Volume, VolumeMount, BASEDIR_VAR, CONFIG_VAR,
    VOLUME_NAME,
};
use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use envy::from_env;
use once_cell::sync::OnceCell;
use serde_json::Value;
use tracing::{info, instrument, warn};

/// An App is an initialized application state, derived from
/// settings.
pub struct App {
    /// The original settings.
    pub settings: Settings,
}

/// What happened to the records of a batch.
#[derive(Debug, Default, PartialEq)]
pub struct Report {
    /// Records seen.
    pub records: usize,

    /// Records skipped because they aren't file writes.
    pub skipped_operation: usize,

    /// Records skipped because their URI lacks the server path.
    pub skipped_malformed: usize,

    /// Records skipped because they aren't configuration files.
    pub skipped_extension: usize,

    /// Container groups accepted for provisioning, in submission
    /// order.
    pub accepted: Vec<Accepted>,
}

impl App {
    /// Initialize an App instance given a settings struct. Consumes
    /// the settings struct.
    pub fn new(settings: Settings) -> Result<Self> {
        // An empty server path matches every URI and an empty
        // extension matches every file
        if settings.storage_serverpath.is_empty() {
            return Err(anyhow!("storage_serverpath must not be empty"));
        }
        if settings.config_extension.is_empty() {
            return Err(anyhow!("config_extension must not be empty"));
        }
        Ok(App { settings })
    }

    /// Extract the uploaded file's name from a resource URI: the text
    /// following the server path, with the query string cut off first.
    pub fn extract_filename(&self, uri: &str) -> Result<String, MalformedUriError> {
        let serverpath = &self.settings.storage_serverpath;
        let path = uri.split('?').next().unwrap_or_default();
        let start = path.find(serverpath.as_str()).ok_or_else(|| MalformedUriError {
            uri: uri.to_string(),
            serverpath: serverpath.clone(),
        })? + serverpath.len();
        Ok(path[start..].to_string())
    }

    /// Whether the filename denotes a configuration file.
    pub fn is_config_file(&self, filename: &str) -> bool {
        filename.ends_with(self.settings.config_extension.as_str())
    }

    /// Build the container group that processes the given
    /// configuration file, named after `now`.
    pub fn provisioning_request(
        &self,
        filename: &str,
        now: DateTime<Utc>,
    ) -> (String, ContainerGroup) {
        let settings = &self.settings;
        let name = container_group_name(now);
        let container = Container {
            name: name.clone(),
            properties: ContainerProperties {
                image: settings.azurecr_image.clone(),
                resources: ResourceRequirements {
                    requests: ResourceRequests {
                        memory_in_gb: settings.memory_in_gb,
                        cpu: settings.cpu,
                    },
                },
                volume_mounts: vec![VolumeMount {
                    name: VOLUME_NAME.to_string(),
                    mount_path: settings.volume_mount_dir.clone(),
                }],
                environment_variables: vec![
                    EnvironmentVariable {
                        name: BASEDIR_VAR.to_string(),
                        value: settings.base_dir.clone(),
                    },
                    EnvironmentVariable {
                        name: CONFIG_VAR.to_string(),
                        value: format!("{}{}", settings.config_dir, filename),
                    },
                ],
            },
        };
        let group = ContainerGroup {
            location: settings.location.clone(),
            properties: ContainerGroupProperties {
                containers: vec![container],
                os_type: String::from("Linux"),
                restart_policy: String::from("Never"),
                volumes: vec![Volume {
                    name: VOLUME_NAME.to_string(),
                    azure_file: AzureFileVolume {
                        share_name: settings.storage_sharename.clone(),
                        storage_account_name: settings.storage_account_name.clone(),
                        storage_account_key: settings.storage_account_key.clone(),
                        read_only: false,
                    },
                }],
                diagnostics: Diagnostics {
                    log_analytics: LogAnalytics {
                        workspace_id: settings.loganalytics_workspace_id.clone(),
                        workspace_key: settings.loganalytics_workspace_key.clone(),
                    },
                },
                image_registry_credentials: vec![ImageRegistryCredential {
                    server: settings.azurecr.clone(),
                    username: settings.azurecr_user.clone(),
                    password: settings.azurecr_password.clone(),
                }],
            },
        };
        (name, group)
    }

    /// Handle a batch payload, naming container groups after the
    /// current time.
    pub async fn handle<P>(&self, payload: &Value, provisioner: &P) -> Result<Report, HandlerError>
    where
        P: Provisioner + ?Sized,
    {
        self.handle_at(payload, provisioner, Utc::now).await
    }

    /// Handle a batch payload: submit a container group for every
    /// written configuration file, one record at a time. The first
    /// failed submission aborts the batch; groups submitted before it
    /// stay submitted.
    #[instrument(skip_all)]
    pub async fn handle_at<P, C>(
        &self,
        payload: &Value,
        provisioner: &P,
        clock: C,
    ) -> Result<Report, HandlerError>
    where
        P: Provisioner + ?Sized,
        C: Fn() -> DateTime<Utc>,
    {
        let events = decode_batch(payload)?;
        let mut report = Report::default();
        for record in records(events) {
            report.records += 1;
            if record.operation_name != self.settings.write_operation {
                info!(operation = %record.operation_name, "Ignoring non-write operation");
                report.skipped_operation += 1;
                continue;
            }
            let filename = match self.extract_filename(&record.uri) {
                Ok(filename) => filename,
                Err(e) => {
                    warn!("Skipping record: {}", e);
                    report.skipped_malformed += 1;
                    continue;
                }
            };
            if !self.is_config_file(&filename) {
                info!(%filename, "Ignoring non-configuration file");
                report.skipped_extension += 1;
                continue;
            }

            info!(%filename, "Found configuration file, creating container group");
            let (name, group) = self.provisioning_request(&filename, clock());
            let accepted = provisioner
                .create_or_update(&self.settings.resource_group, &name, &group)
                .await
                .map_err(|source| HandlerError::Submission {
                    name: name.clone(),
                    filename: filename.clone(),
                    source,
                })?;
            info!(%name, %filename, "Container group submitted");
            report.accepted.push(accepted);
        }
        Ok(report)
    }
}

/// Global App instance.
static CURRENT: OnceCell<App> = OnceCell::new();

/// Initialize the global App instance.
pub fn init() -> Result<()> {
    let settings = from_env()?;
    let app = App::new(settings)?;
    CURRENT
        .set(app)
        .map_err(|_| anyhow!("app::CURRENT was already initialized"))
}

/// Get the current App instance, or panic if it hasn't been
/// initialized.
pub fn current() -> &'static App {
    CURRENT.get().expect("app is not initialized")
}
