use super::{Session, WorkspaceArgs};
use anyhow::{Context, Result};
use clap::Args;
use projection_core::{RecordsOptions, project_records};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Args, Debug)]
pub struct RecordsArgs {
    #[command(flatten)]
    pub workspace: WorkspaceArgs,

    /// Networks to emit records for
    #[arg(long = "network", default_values = ["external", "internal"])]
    pub networks: Vec<String>,

    /// Proxy address for a network, as NETWORK=ADDRESS
    #[arg(long = "proxy-address", value_parser = parse_assignment)]
    pub proxy_addresses: Vec<(String, String)>,

    /// Record file, relative to the workspace
    #[arg(long, default_value = "records.list")]
    pub output: PathBuf,

    /// Prefix for the record file name
    #[arg(long, default_value = "")]
    pub output_prefix: String,

    /// Base record file; names it defines are not emitted again
    #[arg(long)]
    pub base_file: Option<PathBuf>,
}

fn parse_assignment(value: &str) -> std::result::Result<(String, String), String> {
    match value.split_once('=') {
        Some((network, address)) if !network.is_empty() && !address.is_empty() => {
            Ok((network.to_string(), address.to_string()))
        }
        _ => Err(format!("expected NETWORK=ADDRESS, got '{value}'")),
    }
}

fn prefixed(output: &Path, prefix: &str) -> PathBuf {
    match output.file_name() {
        Some(name) if !prefix.is_empty() => {
            output.with_file_name(format!("{prefix}{}", name.to_string_lossy()))
        }
        _ => output.to_path_buf(),
    }
}

pub fn run(settings_path: Option<&Path>, args: RecordsArgs) -> Result<()> {
    let session = Session::open(&args.workspace, settings_path)?;

    let options = RecordsOptions {
        networks: args.networks,
        proxy_addresses: args.proxy_addresses.into_iter().collect(),
        base_file: args.base_file,
        output: prefixed(&args.output, &args.output_prefix),
    };

    let records = project_records(
        &session.workspace,
        &session.settings,
        &session.services,
        &options,
    )
    .context("Failed to generate DNS records")?;

    info!(
        records = records.len(),
        output = %session.workspace.join(&options.output).display(),
        "Generated DNS records"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_assignment() {
        assert_eq!(
            parse_assignment("internal=10.0.0.2").unwrap(),
            ("internal".to_string(), "10.0.0.2".to_string())
        );
        assert!(parse_assignment("internal").is_err());
        assert!(parse_assignment("=10.0.0.2").is_err());
    }

    #[test]
    fn test_prefixed_output() {
        assert_eq!(prefixed(Path::new("records.list"), ""), PathBuf::from("records.list"));
        assert_eq!(
            prefixed(Path::new("dns/records.list"), "lab-"),
            PathBuf::from("dns/lab-records.list")
        );
    }
}
