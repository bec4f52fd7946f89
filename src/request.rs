//! Defines the container group description submitted to the
//! provisioning API, in its JSON wire format.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Prefix of every container group name.
pub const NAME_PREFIX: &str = "motomap-";

/// Name of the file share volume, both in the group and in the
/// container's mount.
pub const VOLUME_NAME: &str = "mapdata";

/// Environment variable holding the container's base directory.
pub const BASEDIR_VAR: &str = "MOTOMAP_BASEDIR";

/// Environment variable holding the path of the uploaded file.
pub const CONFIG_VAR: &str = "MOTOMAP_CONFIG";

/// Build the name of a container group created at `now`. Names have
/// second resolution, so two groups created within the same second
/// get the same name.
pub fn container_group_name(now: DateTime<Utc>) -> String {
    format!("{}{}", NAME_PREFIX, now.format("%Y%m%d-%H%M%S"))
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ContainerGroup {
    pub location: String,
    pub properties: ContainerGroupProperties,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContainerGroupProperties {
    pub containers: Vec<Container>,
    pub os_type: String,
    pub restart_policy: String,
    pub volumes: Vec<Volume>,
    pub diagnostics: Diagnostics,
    pub image_registry_credentials: Vec<ImageRegistryCredential>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Container {
    pub name: String,
    pub properties: ContainerProperties,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContainerProperties {
    pub image: String,
    pub resources: ResourceRequirements,
    pub volume_mounts: Vec<VolumeMount>,
    pub environment_variables: Vec<EnvironmentVariable>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ResourceRequirements {
    pub requests: ResourceRequests,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ResourceRequests {
    #[serde(rename = "memoryInGB")]
    pub memory_in_gb: f64,
    pub cpu: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VolumeMount {
    pub name: String,
    pub mount_path: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EnvironmentVariable {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Volume {
    pub name: String,
    pub azure_file: AzureFileVolume,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AzureFileVolume {
    pub share_name: String,
    pub storage_account_name: String,
    pub storage_account_key: String,
    pub read_only: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostics {
    pub log_analytics: LogAnalytics,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LogAnalytics {
    pub workspace_id: String,
    pub workspace_key: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ImageRegistryCredential {
    pub server: String,
    pub username: String,
    pub password: String,
}

impl ContainerGroup {
    /// The value of an environment variable of the group's first
    /// container.
    pub fn env(&self, name: &str) -> Option<&str> {
        self.properties
            .containers
            .first()?
            .properties
            .environment_variables
            .iter()
            .find(|var| var.name == name)
            .map(|var| var.value.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_container_group_name() {
        let now = Utc.with_ymd_and_hms(2023, 7, 4, 9, 5, 3).unwrap();
        assert_eq!(container_group_name(now), "motomap-20230704-090503");
    }

    #[test]
    fn test_wire_format() {
        let group = ContainerGroup {
            location: "Central US".into(),
            properties: ContainerGroupProperties {
                containers: vec![Container {
                    name: "motomap-20230704-090503".into(),
                    properties: ContainerProperties {
                        image: "registry/motomap:latest".into(),
                        resources: ResourceRequirements {
                            requests: ResourceRequests {
                                memory_in_gb: 5.0,
                                cpu: 1.0,
                            },
                        },
                        volume_mounts: vec![VolumeMount {
                            name: VOLUME_NAME.into(),
                            mount_path: "/mapdata".into(),
                        }],
                        environment_variables: vec![EnvironmentVariable {
                            name: CONFIG_VAR.into(),
                            value: "/mapdata/route.yml".into(),
                        }],
                    },
                }],
                os_type: "Linux".into(),
                restart_policy: "Never".into(),
                volumes: vec![Volume {
                    name: VOLUME_NAME.into(),
                    azure_file: AzureFileVolume {
                        share_name: "share".into(),
                        storage_account_name: "acct".into(),
                        storage_account_key: "key".into(),
                        read_only: false,
                    },
                }],
                diagnostics: Diagnostics {
                    log_analytics: LogAnalytics {
                        workspace_id: "ws".into(),
                        workspace_key: "wskey".into(),
                    },
                },
                image_registry_credentials: vec![ImageRegistryCredential {
                    server: "registry".into(),
                    username: "user".into(),
                    password: "pass".into(),
                }],
            },
        };

        assert_eq!(group.env(CONFIG_VAR), Some("/mapdata/route.yml"));
        assert_eq!(group.env(BASEDIR_VAR), None);
        assert_eq!(
            serde_json::to_value(&group).unwrap(),
            json!({
                "location": "Central US",
                "properties": {
                    "containers": [{
                        "name": "motomap-20230704-090503",
                        "properties": {
                            "image": "registry/motomap:latest",
                            "resources": {"requests": {"memoryInGB": 5.0, "cpu": 1.0}},
                            "volumeMounts": [{"name": "mapdata", "mountPath": "/mapdata"}],
                            "environmentVariables": [
                                {"name": "MOTOMAP_CONFIG", "value": "/mapdata/route.yml"}
                            ]
                        }
                    }],
                    "osType": "Linux",
                    "restartPolicy": "Never",
                    "volumes": [{
                        "name": "mapdata",
                        "azureFile": {
                            "shareName": "share",
                            "storageAccountName": "acct",
                            "storageAccountKey": "key",
                            "readOnly": false
                        }
                    }],
                    "diagnostics": {"logAnalytics": {"workspaceId": "ws", "workspaceKey": "wskey"}},
                    "imageRegistryCredentials": [
                        {"server": "registry", "username": "user", "password": "pass"}
                    ]
                }
            })
        );
    }
}
