//! Service manifest loading
//!
//! Manifests are docker-compose documents. Only the `services` mapping and,
//! within each service, `networks` and `ports` are read; every other key is
//! ignored.

use crate::port::{PortBinding, parse_port};
use crate::resolver::{EnvContext, resolve_env_vars};
use crate::{ConfigError, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Services keyed by name, in manifest order
pub type Services = IndexMap<String, ServiceSpec>;

/// A service as seen by the projector
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceSpec {
    /// Container/service name
    pub name: String,
    /// Networks the service is attached to
    pub networks: BTreeSet<String>,
    /// Published ports, in declaration order
    pub ports: Vec<PortBinding>,
}

impl ServiceSpec {
    /// Whether the service is attached to `network`
    pub fn is_on(&self, network: &str) -> bool {
        self.networks.contains(network)
    }
}

#[derive(Debug, Deserialize)]
struct ManifestFile {
    services: IndexMap<String, ManifestService>,
}

#[derive(Debug, Deserialize)]
struct ManifestService {
    #[serde(default)]
    networks: Option<NetworksField>,
    #[serde(default)]
    ports: Vec<PortEntry>,
}

/// Compose accepts either a list of names or a mapping of name to options
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NetworksField {
    List(Vec<String>),
    Map(IndexMap<String, serde_yaml::Value>),
}

impl NetworksField {
    fn into_names(self) -> BTreeSet<String> {
        match self {
            NetworksField::List(names) => names.into_iter().collect(),
            NetworksField::Map(map) => map.into_keys().collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PortEntry {
    /// Bare container port
    Number(u16),
    /// Short syntax string
    Short(String),
}

/// Load a single manifest file
pub fn load_manifest(path: impl AsRef<Path>, env: &EnvContext) -> Result<Services> {
    let path = path.as_ref();
    debug!(manifest = %path.display(), "Loading manifest");

    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ManifestRead {
        path: path.to_path_buf(),
        source,
    })?;

    let services = parse_manifest_str(&content, path, env)?;
    info!(manifest = %path.display(), services = services.len(), "Loaded manifest");
    Ok(services)
}

/// Load and merge every `*.yml` / `*.yaml` file in `dir`.
///
/// Files are merged in file-name order; a service defined again in a later
/// file replaces the earlier entry as a whole.
pub fn load_manifest_dir(dir: impl AsRef<Path>, env: &EnvContext) -> Result<Services> {
    let dir = dir.as_ref();
    let read_err = |source| ConfigError::ManifestRead {
        path: dir.to_path_buf(),
        source,
    };

    let mut files: Vec<PathBuf> = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(read_err)? {
        let path = entry.map_err(read_err)?.path();
        let is_manifest = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext == "yml" || ext == "yaml");
        if is_manifest && path.is_file() {
            files.push(path);
        }
    }

    if files.is_empty() {
        return Err(ConfigError::NoManifests(dir.to_path_buf()));
    }
    files.sort();

    let mut services = Services::new();
    for file in &files {
        merge_services(&mut services, load_manifest(file, env)?);
    }

    Ok(services)
}

/// Parse manifest content; `origin` is only used in error messages
pub fn parse_manifest_str(content: &str, origin: &Path, env: &EnvContext) -> Result<Services> {
    let manifest: ManifestFile =
        serde_yaml::from_str(content).map_err(|source| ConfigError::ManifestParse {
            path: origin.to_path_buf(),
            source,
        })?;

    let mut services = Services::with_capacity(manifest.services.len());
    for (name, raw) in manifest.services {
        let spec = convert_service(&name, raw, env)?;
        services.insert(name, spec);
    }

    Ok(services)
}

/// Overlay `overlay` onto `base`, last write wins per service.
///
/// A replaced service keeps its original position.
pub fn merge_services(base: &mut Services, overlay: Services) {
    for (name, spec) in overlay {
        if base.insert(name.clone(), spec).is_some() {
            debug!(service = %name, "Service overridden by later manifest");
        }
    }
}

fn convert_service(name: &str, raw: ManifestService, env: &EnvContext) -> Result<ServiceSpec> {
    let mut ports = Vec::with_capacity(raw.ports.len());
    for entry in raw.ports {
        let text = match entry {
            PortEntry::Number(port) => port.to_string(),
            PortEntry::Short(text) => resolve_env_vars(&text, env)?,
        };
        let binding = parse_port(&text).ok_or_else(|| ConfigError::InvalidPort {
            service: name.to_string(),
            port: text.clone(),
        })?;
        ports.push(binding);
    }

    Ok(ServiceSpec {
        name: name.to_string(),
        networks: raw.networks.map(NetworksField::into_names).unwrap_or_default(),
        ports,
    })
}
