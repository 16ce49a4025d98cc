use serde::{Deserialize, Serialize};

/// Connection URLs for one controller.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiConfig {
    pub api_url: String,
    pub socket_url: String,
}

impl ApiConfig {
    #[must_use]
    pub fn new(api_url: impl Into<String>, socket_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            socket_url: socket_url.into(),
        }
    }

    /// Both URLs are filled in, i.e. this is not a placeholder.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.api_url.is_empty() && !self.socket_url.is_empty()
    }
}

/// A remembered controller endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    pub api_url: String,
    pub socket_url: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub active: bool,
}

impl Instance {
    #[must_use]
    pub fn new(api: &ApiConfig, name: impl Into<String>, active: bool) -> Self {
        Self {
            api_url: api.api_url.clone(),
            socket_url: api.socket_url.clone(),
            name: name.into(),
            active,
        }
    }
}

/// Rename request, located by `api_url`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceName {
    pub api_url: String,
    pub name: String,
}
