//! Config slice: connection URLs, remembered instances, and the file and
//! local config trees.
//!
//! Operations that touch durable storage build the next value first and
//! only commit it to `self` once the write succeeded, so the in-memory list
//! and the stored one never disagree.

mod merge;
mod validation;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

use lunadeck_types::{
    ApiConfig, FileConfig, Instance, InstanceName, LocalConfig, Macro, TempPreset,
};

use crate::error::Result;
use crate::storage::{INSTANCES_KEY, LOCAL_CONFIG_KEY, Storage};

pub use merge::{deep_merge, has_path, leaf_patches, set_path};
pub use validation::warn_unknown_fields;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfigState {
    pub api_url: String,
    pub socket_url: String,
    pub unsaved_changes: bool,
    pub layout_mode: bool,
    pub instances: Vec<Instance>,
    pub local_config: LocalConfig,
    pub file_config: FileConfig,
}

/// Outcome of fetching the file config from the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileConfigLoad {
    /// A config file was found and loaded.
    Loaded,
    /// The server answered, but no config file exists yet.
    Missing,
    /// The server could not be asked.
    Unavailable,
}

impl FileConfigLoad {
    /// The server was reachable, whether or not it had a file.
    #[must_use]
    pub fn server_answered(self) -> bool {
        matches!(self, Self::Loaded | Self::Missing)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InstancesInit {
    pub api_config: Option<ApiConfig>,
    pub file_config: FileConfigLoad,
}

/// `scheme://host` of `api_url` followed by `path`, dropping any port. A URL
/// without a host (`printer:7125`) keeps only its scheme. Falls back to plain
/// concatenation when `api_url` does not parse.
#[must_use]
pub fn camera_url(api_url: &str, path: &str) -> String {
    match Url::parse(api_url) {
        Ok(url) => format!("{}://{}{path}", url.scheme(), url.host_str().unwrap_or_default()),
        Err(err) => {
            debug!("Camera url from unparsable api url {api_url:?}: {err}");
            format!("{api_url}{path}")
        }
    }
}

fn load_instances(storage: &dyn Storage) -> Result<Vec<Instance>> {
    let Some(raw) = storage.get(INSTANCES_KEY)? else {
        return Ok(Vec::new());
    };
    match serde_json::from_str(&raw) {
        Ok(instances) => Ok(instances),
        Err(err) => {
            warn!("Ignoring unreadable {INSTANCES_KEY}: {err}");
            Ok(Vec::new())
        }
    }
}

fn persist_instances(storage: &dyn Storage, instances: &[Instance]) -> Result<()> {
    storage.set(INSTANCES_KEY, &serde_json::to_string(instances)?)
}

fn merge_file_config(current: &FileConfig, payload: &Value) -> Result<FileConfig> {
    let base = serde_json::to_value(current)?;

    let mut tree = base.clone();
    deep_merge(&mut tree, payload);
    if let Ok(config) = serde_json::from_value(tree) {
        return Ok(config);
    }

    // Apply one leaf at a time and keep only what still fits
    let mut tree = base;
    for (path, patch) in leaf_patches(payload) {
        let mut next = tree.clone();
        deep_merge(&mut next, &patch);
        match serde_json::from_value::<FileConfig>(next.clone()) {
            Ok(_) => tree = next,
            Err(err) => warn!("Ignoring file config field {path}: {err}"),
        }
    }
    Ok(serde_json::from_value(tree)?)
}

impl ConfigState {
    /// Replace every field with its default.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Merge a loaded file config over the current one, or, when there is
    /// none, point the camera at the API host.
    ///
    /// Payload values of the wrong type are skipped with a warning and the
    /// current value is kept; the rest of the payload still applies.
    ///
    /// # Errors
    ///
    /// Returns `Error::Json` if the current config cannot be serialized.
    pub fn init_file(&mut self, payload: Option<&Value>) -> Result<()> {
        match payload {
            Some(payload) if !payload.is_null() => {
                warn_unknown_fields(payload, "file config");
                self.file_config = merge_file_config(&self.file_config, payload)?;
            }
            _ => {
                self.file_config.camera.url = camera_url(&self.api_url, &self.file_config.camera.url);
            }
        }
        Ok(())
    }

    /// Replace the local config with the stored one, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be read or holds invalid JSON.
    pub fn init_local(&mut self, storage: &dyn Storage) -> Result<()> {
        if let Some(raw) = storage.get(LOCAL_CONFIG_KEY)? {
            self.local_config = serde_json::from_str(&raw)?;
        }
        Ok(())
    }

    pub fn init_api_config(&mut self, api: &ApiConfig) {
        self.api_url.clone_from(&api.api_url);
        self.socket_url.clone_from(&api.socket_url);
    }

    /// Load the stored instance list and mark the current endpoint active.
    ///
    /// An unknown endpoint is only remembered once the server has answered
    /// and both URLs are set. The list is written back on every call.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be read or written.
    pub fn init_instances(&mut self, payload: &InstancesInit, storage: &dyn Storage) -> Result<()> {
        let mut instances = load_instances(storage)?;
        let api = payload.api_config.clone().unwrap_or_default();
        let name = &self.file_config.general.instance_name;

        match instances.iter().position(|i| i.api_url == api.api_url) {
            Some(index) => {
                for (i, instance) in instances.iter_mut().enumerate() {
                    instance.active = i == index;
                    if i == index {
                        instance.name.clone_from(name);
                    }
                }
            }
            None if payload.file_config.server_answered() && api.is_complete() => {
                for instance in &mut instances {
                    instance.active = false;
                }
                info!("Remembering instance {} ({name})", api.api_url);
                instances.push(Instance::new(&api, name.clone(), true));
            }
            None => {}
        }

        persist_instances(storage, &instances)?;
        self.instances = instances;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error if storage cannot be written.
    pub fn update_instance_name(
        &mut self,
        payload: &InstanceName,
        storage: &dyn Storage,
    ) -> Result<()> {
        let mut instances = self.instances.clone();
        if let Some(instance) = instances.iter_mut().find(|i| i.api_url == payload.api_url) {
            instance.name.clone_from(&payload.name);
        }
        persist_instances(storage, &instances)?;
        self.instances = instances;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error if storage cannot be written.
    pub fn remove_instance(&mut self, api_url: &str, storage: &dyn Storage) -> Result<()> {
        let mut instances = self.instances.clone();
        instances.retain(|i| i.api_url != api_url);
        persist_instances(storage, &instances)?;
        self.instances = instances;
        Ok(())
    }

    /// Write `value` at a dotted path such as `fileConfig.general.instanceName`.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidPath` for a malformed path and `Error::Json`
    /// when the value does not fit the field; state is unchanged on error.
    pub fn save_generic(&mut self, key: &str, value: Value) -> Result<()> {
        let mut tree = serde_json::to_value(&*self)?;
        if !has_path(&tree, key) {
            warn!("Saving {key}, which has no default value");
        }
        set_path(&mut tree, key, value)?;
        *self = serde_json::from_value(tree)?;
        Ok(())
    }

    /// Shallow-merge `payload` over the local config and persist the result.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be written.
    pub fn save_local(&mut self, payload: &LocalConfig, storage: &dyn Storage) -> Result<()> {
        let config = self.local_config.merged(payload);
        storage.set(LOCAL_CONFIG_KEY, &serde_json::to_string(&config)?)?;
        self.local_config = config;
        Ok(())
    }

    pub fn set_unsaved_changes(&mut self, unsaved: bool) {
        self.unsaved_changes = unsaved;
    }

    pub fn set_layout_mode(&mut self, layout_mode: bool) {
        self.layout_mode = layout_mode;
    }

    pub fn update_hidden_macros(&mut self, macro_: &Macro) {
        let hidden = &mut self.file_config.dashboard.hidden_macros;
        let index = hidden.iter().position(|name| *name == macro_.name);
        match (macro_.visible, index) {
            (true, Some(i)) => {
                hidden.remove(i);
            }
            (false, None) => hidden.push(macro_.name.clone()),
            _ => {}
        }
    }

    /// Replace the preset at `index`, or append when `index` is negative
    /// or past the end.
    pub fn update_preset(&mut self, index: i64, preset: TempPreset) {
        let presets = &mut self.file_config.dashboard.temp_presets;
        match usize::try_from(index) {
            Ok(i) if i < presets.len() => presets[i] = preset,
            _ => presets.push(preset),
        }
    }

    pub fn remove_preset(&mut self, index: usize) {
        let presets = &mut self.file_config.dashboard.temp_presets;
        if index < presets.len() {
            presets.remove(index);
        }
    }

    #[must_use]
    pub fn active_instance(&self) -> Option<&Instance> {
        self.instances.iter().find(|i| i.active)
    }
}
