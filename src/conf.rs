//! Defines configuration as read from the environment.

use serde::Deserialize;

/// Default `resource_group` value.
fn default_resource_group() -> String {
    String::from("motomap_container")
}

/// Default `location` value.
fn default_location() -> String {
    String::from("Central US")
}

/// Default `write_operation` value.
fn default_write_operation() -> String {
    String::from("PutRange")
}

/// Default `config_extension` value.
fn default_config_extension() -> String {
    String::from(".yml")
}

/// Default `config_dir` value.
fn default_config_dir() -> String {
    String::from("/mapdata/")
}

/// Default `base_dir` value.
fn default_base_dir() -> String {
    String::from("/motomap/")
}

/// Default `memory_in_gb` value.
fn default_memory_in_gb() -> f64 {
    5.0
}

/// Default `cpu` value.
fn default_cpu() -> f64 {
    1.0
}

/// Default `management_endpoint` value.
fn default_management_endpoint() -> String {
    String::from("https://management.azure.com")
}

/// Default `api_version` value.
fn default_api_version() -> String {
    String::from("2023-05-01")
}

/// Default `authority_host` value.
fn default_authority_host() -> String {
    String::from("https://login.microsoftonline.com")
}

/// The provisioner reacts to file share change notifications by
/// creating a container group that processes the uploaded file. The
/// configuration must be given as environment variables.
#[derive(Deserialize)]
pub struct Settings {
    /// Name of the event hub the trigger listens to. Consumed by the
    /// functions host binding; kept here so that a misconfigured
    /// deployment fails at startup.
    pub event_hub_name: String,

    /// Connection string for the event hub. Consumed by the functions
    /// host binding.
    pub event_hub_connectionstring: String,

    /// The path segment that precedes the uploaded file's name inside
    /// a notification's resource URI, e.g. `"/container/"`.
    pub storage_serverpath: String,

    /// The subscription that owns the resource group where container
    /// groups are created.
    pub subscription_id: String,

    /// The container registry server.
    pub azurecr: String,

    /// The container registry user.
    pub azurecr_user: String,

    /// The container registry password.
    pub azurecr_password: String,

    /// The file share mounted into the container.
    pub storage_sharename: String,

    /// The storage account holding the file share.
    pub storage_account_name: String,

    /// The access key of the storage account.
    pub storage_account_key: String,

    /// The path at which the file share is mounted in the container.
    pub volume_mount_dir: String,

    /// The log analytics workspace receiving container logs.
    pub loganalytics_workspace_id: String,

    /// The log analytics workspace key.
    pub loganalytics_workspace_key: String,

    /// The image run by the provisioned container.
    pub azurecr_image: String,

    /// The resource group where container groups are created.
    #[serde(default = "default_resource_group")]
    pub resource_group: String,

    /// The region where container groups are created.
    #[serde(default = "default_location")]
    pub location: String,

    /// The operation name that denotes a file write in change
    /// notifications. Any other operation is ignored.
    #[serde(default = "default_write_operation")]
    pub write_operation: String,

    /// The literal, case-sensitive suffix of configuration files.
    #[serde(default = "default_config_extension")]
    pub config_extension: String,

    /// The directory, as seen by the container, that is prepended to
    /// the uploaded file's name to form `MOTOMAP_CONFIG`.
    #[serde(default = "default_config_dir")]
    pub config_dir: String,

    /// The value given to `MOTOMAP_BASEDIR`.
    #[serde(default = "default_base_dir")]
    pub base_dir: String,

    /// Memory requested for the container, in GB.
    #[serde(default = "default_memory_in_gb")]
    pub memory_in_gb: f64,

    /// CPU cores requested for the container.
    #[serde(default = "default_cpu")]
    pub cpu: f64,

    /// Base URL of the resource management API.
    #[serde(default = "default_management_endpoint")]
    pub management_endpoint: String,

    /// Version of the container instance API.
    #[serde(default = "default_api_version")]
    pub api_version: String,
}

/// Identity variables used to obtain management API tokens. Which
/// ones are set decides the credential used; see
/// [`crate::credential`].
#[derive(Deserialize, Default)]
pub struct CredentialSettings {
    /// Tenant of a service principal.
    #[serde(default)]
    pub azure_tenant_id: Option<String>,

    /// Client id of a service principal, or of a user-assigned
    /// managed identity.
    #[serde(default)]
    pub azure_client_id: Option<String>,

    /// Secret of a service principal.
    #[serde(default)]
    pub azure_client_secret: Option<String>,

    /// Authority used for the client secret flow.
    #[serde(default = "default_authority_host")]
    pub azure_authority_host: String,

    /// Managed identity endpoint, injected by the functions host.
    #[serde(default)]
    pub identity_endpoint: Option<String>,

    /// Managed identity header secret, injected by the functions host.
    #[serde(default)]
    pub identity_header: Option<String>,
}

/// Settings as a realistic deployment would provide them, with the
/// given variables added or replaced.
#[cfg(any(test, feature = "testing"))]
pub fn fixture_with(overrides: &[(&str, &str)]) -> Settings {
    let vars: Vec<(String, String)> = [
        ("EVENT_HUB_NAME", "mapupload"),
        ("EVENT_HUB_CONNECTIONSTRING", "Endpoint=sb://hub.servicebus.windows.net/"),
        ("STORAGE_SERVERPATH", "/container/"),
        ("SUBSCRIPTION_ID", "00000000-0000-0000-0000-000000000000"),
        ("AZURECR", "motomap.azurecr.io"),
        ("AZURECR_USER", "motomap"),
        ("AZURECR_PASSWORD", "registry-password"),
        ("STORAGE_SHARENAME", "mapdata"),
        ("STORAGE_ACCOUNT_NAME", "acct"),
        ("STORAGE_ACCOUNT_KEY", "account-key"),
        ("VOLUME_MOUNT_DIR", "/mapdata"),
        ("LOGANALYTICS_WORKSPACE_ID", "workspace"),
        ("LOGANALYTICS_WORKSPACE_KEY", "workspace-key"),
        ("AZURECR_IMAGE", "motomap.azurecr.io/motomap:latest"),
    ]
    .iter()
    .filter(|(key, _)| overrides.iter().all(|(replaced, _)| replaced != key))
    .chain(overrides.iter())
    .map(|(key, value)| (key.to_string(), value.to_string()))
    .collect();
    envy::from_iter(vars).expect("fixture settings are complete")
}

/// [`fixture_with`] without overrides.
#[cfg(any(test, feature = "testing"))]
pub fn fixture() -> Settings {
    fixture_with(&[])
}
