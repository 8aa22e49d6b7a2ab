//! Projector settings
//!
//! The settings file (`projector.yaml` in the workspace) is optional. Every
//! section falls back to the built-in defaults below, and networks declared in
//! the file are merged over the built-in network table.

use crate::port::Protocol;
use crate::resolver::{EnvContext, resolve_env_vars};
use crate::{ConfigError, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::Path;
use tracing::debug;

/// Default settings file name inside the workspace
pub const SETTINGS_FILE: &str = "projector.yaml";

/// Only supported settings version
pub const SETTINGS_VERSION: &str = "1.0";

/// Child-index path from a template root to a directive
pub type SlotPath = Vec<usize>;

/// Root settings structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Settings version
    #[serde(default = "default_version")]
    pub version: String,

    /// Manifest file used when no manifest directory is given
    #[serde(default = "default_manifest")]
    pub manifest: String,

    /// Base record file, relative to the workspace
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_file: Option<String>,

    /// Network table overrides
    #[serde(default)]
    pub networks: IndexMap<String, NetworkSettings>,

    /// Drop-in splice rules
    #[serde(default = "default_drop_ins")]
    pub drop_ins: Vec<DropInRule>,

    /// External build command
    #[serde(default)]
    pub build: BuildSettings,

    /// Template slot table overrides
    #[serde(default)]
    pub slots: SlotSettings,
}

impl Default for Settings {
    fn default() -> Self {
        let mut settings = Self {
            version: default_version(),
            manifest: default_manifest(),
            base_file: None,
            networks: IndexMap::new(),
            drop_ins: default_drop_ins(),
            build: BuildSettings::default(),
            slots: SlotSettings::default(),
        };
        settings.apply_builtin_networks();
        settings
    }
}

/// Per-network settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkSettings {
    /// Domain suffix for services on this network
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,

    /// Address of the reverse proxy serving this network
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_address: Option<String>,
}

/// Splice a drop-in document into the artifact of one template kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropInRule {
    /// Target domain the rule applies to
    pub domain: String,
    /// Template kind receiving the drop-in
    pub kind: Protocol,
    /// Drop-in document, relative to the workspace
    pub path: String,
}

/// External build step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildSettings {
    /// Program to run
    #[serde(default = "default_build_command")]
    pub command: String,
    /// Arguments placed before `-d <dir> <file>`
    #[serde(default = "default_build_args")]
    pub args: Vec<String>,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            command: default_build_command(),
            args: default_build_args(),
        }
    }
}

/// Optional slot table overrides per template kind
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SlotSettings {
    /// Stream template slots
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<SlotTable>,
    /// HTTP template slots
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http: Option<SlotTable>,
}

/// Where generated values go inside an entry template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotTable {
    /// Listen directive receiving the host port
    pub listen: SlotPath,
    /// Directive receiving the FQDN; stream templates have none
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_name: Option<SlotPath>,
    /// Directive receiving the upstream address
    pub upstream: SlotPath,
}

impl SlotTable {
    /// Slots matching the shipped entry templates
    pub fn default_for(kind: Protocol) -> Self {
        match kind {
            // server { listen; proxy_pass; }
            Protocol::Stream => Self {
                listen: vec![0],
                server_name: None,
                upstream: vec![1],
            },
            // server { listen; server_name; include; location / { proxy_pass; } }
            Protocol::Http => Self {
                listen: vec![0],
                server_name: Some(vec![1]),
                upstream: vec![3, 0],
            },
        }
    }
}

/// Resolved projection target for one network
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkTarget {
    /// Network name
    pub network: String,
    /// Domain suffix appended to service names
    pub domain_suffix: String,
    /// Reverse proxy address, required for DNS records
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy_address: Option<String>,
}

impl Settings {
    /// Resolve the target for `network`, with an optional domain override
    pub fn target(&self, network: &str, domain_override: Option<&str>) -> Result<NetworkTarget> {
        let entry = self.networks.get(network);

        let domain_suffix = domain_override
            .map(str::to_string)
            .or_else(|| entry.and_then(|e| e.domain.clone()))
            .ok_or_else(|| ConfigError::UnknownNetwork(network.to_string()))?;

        Ok(NetworkTarget {
            network: network.to_string(),
            domain_suffix,
            proxy_address: entry.and_then(|e| e.proxy_address.clone()),
        })
    }

    /// First drop-in rule matching `domain` and `kind`
    pub fn drop_in_for(&self, domain: &str, kind: Protocol) -> Option<&DropInRule> {
        self.drop_ins
            .iter()
            .find(|rule| rule.domain == domain && rule.kind == kind)
    }

    /// Slot table for `kind`, falling back to the built-in one
    pub fn slots_for(&self, kind: Protocol) -> SlotTable {
        let configured = match kind {
            Protocol::Stream => self.slots.stream.as_ref(),
            Protocol::Http => self.slots.http.as_ref(),
        };
        configured
            .cloned()
            .unwrap_or_else(|| SlotTable::default_for(kind))
    }

    fn apply_builtin_networks(&mut self) {
        let mut merged = IndexMap::new();
        for (name, domain) in BUILTIN_NETWORKS {
            merged.insert(
                name.to_string(),
                NetworkSettings {
                    domain: Some(domain.to_string()),
                    proxy_address: None,
                },
            );
        }

        for (name, configured) in std::mem::take(&mut self.networks) {
            let entry = merged.entry(name).or_insert_with(NetworkSettings::default);
            if configured.domain.is_some() {
                entry.domain = configured.domain;
            }
            if configured.proxy_address.is_some() {
                entry.proxy_address = configured.proxy_address;
            }
        }

        self.networks = merged;
    }

    fn resolve_env(&mut self, env: &EnvContext) -> Result<()> {
        for network in self.networks.values_mut() {
            if let Some(domain) = &network.domain {
                network.domain = Some(resolve_env_vars(domain, env)?);
            }
            if let Some(address) = &network.proxy_address {
                network.proxy_address = Some(resolve_env_vars(address, env)?);
            }
        }
        if let Some(base_file) = &self.base_file {
            self.base_file = Some(resolve_env_vars(base_file, env)?);
        }
        self.build.command = resolve_env_vars(&self.build.command, env)?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.version != SETTINGS_VERSION {
            return Err(ConfigError::ValidationError(format!(
                "Unsupported version: {}, expected {}",
                self.version, SETTINGS_VERSION
            )));
        }

        for (kind, table) in [
            (Protocol::Stream, &self.slots.stream),
            (Protocol::Http, &self.slots.http),
        ] {
            let Some(table) = table else { continue };
            let mut paths = vec![("listen", &table.listen), ("upstream", &table.upstream)];
            if let Some(server_name) = &table.server_name {
                paths.push(("server_name", server_name));
            }
            for (slot, path) in paths {
                if path.is_empty() {
                    return Err(ConfigError::ValidationError(format!(
                        "Slot '{}' of the {} template has an empty path",
                        slot, kind
                    )));
                }
            }
        }

        for rule in &self.drop_ins {
            if rule.domain.is_empty() || rule.path.is_empty() {
                return Err(ConfigError::ValidationError(
                    "Drop-in rules need both a domain and a path".to_string(),
                ));
            }
        }

        if self.build.command.is_empty() {
            return Err(ConfigError::ValidationError(
                "Build command must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

/// Load settings from `path`; a missing file yields the defaults
pub fn load_settings(path: impl AsRef<Path>, env: &EnvContext) -> Result<Settings> {
    let path = path.as_ref();
    match std::fs::read_to_string(path) {
        Ok(content) => {
            debug!(settings = %path.display(), "Loading settings");
            parse_settings_str(&content, env)
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(settings = %path.display(), "No settings file, using defaults");
            Ok(Settings::default())
        }
        Err(e) => Err(e.into()),
    }
}

/// Parse settings from a YAML string
pub fn parse_settings_str(content: &str, env: &EnvContext) -> Result<Settings> {
    let mut settings: Settings = serde_yaml::from_str(content)?;
    settings.apply_builtin_networks();
    settings.resolve_env(env)?;
    settings.validate()?;
    Ok(settings)
}

const BUILTIN_NETWORKS: [(&str, &str); 3] = [
    ("internal", "lab.example.com"),
    ("external", "example.com"),
    ("iot", "iot.lab.example.com"),
];

fn default_version() -> String {
    SETTINGS_VERSION.to_string()
}

fn default_manifest() -> String {
    "docker-compose.yml".to_string()
}

fn default_drop_ins() -> Vec<DropInRule> {
    vec![DropInRule {
        domain: "example.com".to_string(),
        kind: Protocol::Http,
        path: "http-external-drop-in.conf".to_string(),
    }]
}

fn default_build_command() -> String {
    "crossplane".to_string()
}

fn default_build_args() -> Vec<String> {
    vec!["build".to_string(), "-f".to_string()]
}
