//! End-to-end projection runs
//!
//! Every input is read and every artifact is built in memory before the
//! first file is written, so a failing run leaves no partial output.

use crate::classify::classify;
use crate::dedup::{BaseRecordSet, emission_order, filter, unique};
use crate::error::{ProjectionError, Result};
use crate::sink::{ExternalBuild, output_dir, write_payload, write_records};
use crate::synthesize::{DnsRecord, dns_records, proxy_blocks};
use crate::tree::{ConfigNode, DropIn, Payload, TreeBuilder, load_document};
use indexmap::IndexMap;
use projection_config::{
    EnvContext, NetworkTarget, Protocol, Services, Settings, load_manifest, load_manifest_dir,
};
use std::path::{Path, PathBuf};
use tracing::info;

/// Root directory all relative paths are resolved against
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    /// Create a workspace rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Workspace root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a path; absolute paths are returned unchanged
    pub fn join(&self, path: impl AsRef<Path>) -> PathBuf {
        self.root.join(path)
    }

    /// `<kind>-master-template.conf`
    pub fn master_template(&self, kind: Protocol) -> PathBuf {
        self.join(format!("{kind}-master-template.conf"))
    }

    /// `<kind>-entry-template.conf`
    pub fn entry_template(&self, kind: Protocol) -> PathBuf {
        self.join(format!("{kind}-entry-template.conf"))
    }

    /// `<prefix><kind>-output.conf`
    pub fn intermediate(&self, prefix: &str, kind: Protocol) -> PathBuf {
        self.join(format!("{prefix}{kind}-output.conf"))
    }
}

/// File name the external build writes for `kind`
pub fn output_file_name(prefix: &str, kind: Protocol) -> String {
    format!("{prefix}{kind}.conf")
}

/// Load the manifest set for a run.
///
/// With `manifest_dir`, every manifest in that directory is merged; otherwise
/// the single manifest named in settings is read.
pub fn load_services(
    workspace: &Workspace,
    settings: &Settings,
    manifest_dir: Option<&Path>,
    env: &EnvContext,
) -> Result<Services> {
    let services = match manifest_dir {
        Some(dir) => load_manifest_dir(workspace.join(dir), env)?,
        None => load_manifest(workspace.join(&settings.manifest), env)?,
    };
    Ok(services)
}

fn load_base(
    workspace: &Workspace,
    settings: &Settings,
    base_file: Option<&Path>,
) -> Result<BaseRecordSet> {
    let configured = base_file
        .map(Path::to_path_buf)
        .or_else(|| settings.base_file.as_ref().map(PathBuf::from));

    match configured {
        Some(path) => BaseRecordSet::load(workspace.join(path)),
        None => Ok(BaseRecordSet::default()),
    }
}

/// Options for the nginx projection
#[derive(Debug, Clone, Default)]
pub struct NginxOptions {
    /// Network the proxy serves
    pub network: String,
    /// Domain suffix override
    pub domain_name: Option<String>,
    /// Prefix for every generated file name
    pub output_prefix: String,
    /// Base record file, relative to the workspace
    pub base_file: Option<PathBuf>,
    /// Write intermediate payloads only
    pub skip_build: bool,
}

/// One generated nginx artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Template kind
    pub kind: Protocol,
    /// Intermediate payload path
    pub intermediate: PathBuf,
    /// Final config path written by the external build
    pub output: PathBuf,
    /// Number of generated server blocks
    pub blocks: usize,
}

/// Build the stream and http payloads without writing anything
pub fn prepare_nginx(
    workspace: &Workspace,
    settings: &Settings,
    services: &Services,
    options: &NginxOptions,
) -> Result<Vec<(Artifact, Payload)>> {
    let target = settings.target(&options.network, options.domain_name.as_deref())?;
    let base = load_base(workspace, settings, options.base_file.as_deref())?;
    let classification = classify(services, &options.network);

    let mut prepared = Vec::with_capacity(Protocol::ALL.len());
    for kind in Protocol::ALL {
        let master: Payload = load_document(workspace.master_template(kind))?;
        let template: ConfigNode = load_document(workspace.entry_template(kind))?;
        let builder = TreeBuilder::new(kind, template, settings.slots_for(kind))?;

        let drop_in = settings
            .drop_in_for(&target.domain_suffix, kind)
            .map(|rule| DropIn::load(workspace.join(&rule.path)))
            .transpose()?;

        let blocks = filter(proxy_blocks(classification.by_protocol(kind), &target), &base);
        let mut payload = builder.build(&master, &blocks, drop_in.as_ref())?;

        let file_name = output_file_name(&options.output_prefix, kind);
        let Some(file) = payload.config.first_mut() else {
            return Err(ProjectionError::template_shape(
                format!("{kind} master template"),
                "payload has no config entries",
            ));
        };
        file.file = file_name.clone();

        info!(
            kind = %kind,
            domain = %target.domain_suffix,
            blocks = blocks.len(),
            "Prepared nginx artifact"
        );
        prepared.push((
            Artifact {
                kind,
                intermediate: workspace.intermediate(&options.output_prefix, kind),
                output: workspace.join(file_name),
                blocks: blocks.len(),
            },
            payload,
        ));
    }

    Ok(prepared)
}

/// Write the nginx payloads and run the external build on each.
///
/// A build failure aborts the run; intermediates already written stay on
/// disk for inspection.
pub async fn project_nginx(
    workspace: &Workspace,
    settings: &Settings,
    services: &Services,
    options: &NginxOptions,
    build: &dyn ExternalBuild,
) -> Result<Vec<Artifact>> {
    let prepared = prepare_nginx(workspace, settings, services, options)?;

    for (artifact, payload) in &prepared {
        write_payload(payload, &artifact.intermediate)?;
    }

    let artifacts: Vec<Artifact> = prepared.into_iter().map(|(artifact, _)| artifact).collect();
    if !options.skip_build {
        for artifact in &artifacts {
            build
                .render(&artifact.intermediate, output_dir(&artifact.intermediate))
                .await?;
        }
    }

    Ok(artifacts)
}

/// Options for the DNS record projection
#[derive(Debug, Clone, Default)]
pub struct RecordsOptions {
    /// Networks to project; emitted external first, then internal
    pub networks: Vec<String>,
    /// Proxy address per network, overriding settings
    pub proxy_addresses: IndexMap<String, String>,
    /// Base record file, relative to the workspace
    pub base_file: Option<PathBuf>,
    /// Record file to write, relative to the workspace
    pub output: PathBuf,
}

/// Resolve the targets for a record run, in emission order
pub fn record_targets(
    settings: &Settings,
    networks: &[String],
    proxy_addresses: &IndexMap<String, String>,
) -> Result<Vec<NetworkTarget>> {
    emission_order(networks)
        .iter()
        .map(|network| {
            let mut target = settings.target(network, None)?;
            if let Some(address) = proxy_addresses.get(network) {
                target.proxy_address = Some(address.clone());
            }
            if target.proxy_address.is_none() {
                return Err(ProjectionError::MissingProxyAddress(network.clone()));
            }
            Ok(target)
        })
        .collect()
}

/// Synthesize, deduplicate and order the records for `targets`
pub fn collect_records(
    services: &Services,
    targets: &[NetworkTarget],
    base: &BaseRecordSet,
) -> Result<Vec<DnsRecord>> {
    let mut records = Vec::new();
    for target in targets {
        let classification = classify(services, &target.network);
        let candidates = dns_records(services, &classification, target)?;
        records.extend(filter(candidates, base));
    }
    Ok(unique(records))
}

/// Build and write the record file
pub fn project_records(
    workspace: &Workspace,
    settings: &Settings,
    services: &Services,
    options: &RecordsOptions,
) -> Result<Vec<DnsRecord>> {
    let targets = record_targets(settings, &options.networks, &options.proxy_addresses)?;
    let base = load_base(workspace, settings, options.base_file.as_deref())?;
    let records = collect_records(services, &targets, &base)?;

    write_records(&records, &workspace.join(&options.output))?;
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workspace_paths() {
        let workspace = Workspace::new("/srv/nginx");
        assert_eq!(
            workspace.master_template(Protocol::Stream),
            PathBuf::from("/srv/nginx/stream-master-template.conf")
        );
        assert_eq!(
            workspace.entry_template(Protocol::Http),
            PathBuf::from("/srv/nginx/http-entry-template.conf")
        );
        assert_eq!(
            workspace.intermediate("lab-", Protocol::Http),
            PathBuf::from("/srv/nginx/lab-http-output.conf")
        );
        assert_eq!(
            workspace.join("/etc/pihole/custom.list"),
            PathBuf::from("/etc/pihole/custom.list")
        );
        assert_eq!(output_file_name("lab-", Protocol::Stream), "lab-stream.conf");
    }

    #[test]
    fn test_record_targets_require_proxy_address() {
        let settings = Settings::default();
        let networks = vec!["internal".to_string(), "external".to_string()];

        let err = record_targets(&settings, &networks, &IndexMap::new()).unwrap_err();
        assert!(matches!(err, ProjectionError::MissingProxyAddress(_)));

        let mut addresses = IndexMap::new();
        addresses.insert("internal".to_string(), "10.0.0.2".to_string());
        addresses.insert("external".to_string(), "10.0.0.3".to_string());
        let targets = record_targets(&settings, &networks, &addresses).unwrap();
        let order: Vec<&str> = targets.iter().map(|t| t.network.as_str()).collect();
        assert_eq!(order, vec!["external", "internal"]);
    }
}
