//! Artifact writers and the external build step

use crate::error::{ProjectionError, Result};
use crate::synthesize::DnsRecord;
use crate::tree::Payload;
use async_process::{Command, Stdio};
use async_trait::async_trait;
use projection_config::BuildSettings;
use std::io::Write as _;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// Render a payload as pretty JSON with a trailing newline
pub fn render_payload(payload: &Payload) -> Result<String> {
    let mut json = serde_json::to_string_pretty(payload)?;
    json.push('\n');
    Ok(json)
}

/// Render records as `address fqdn` lines
pub fn render_records(records: &[DnsRecord]) -> String {
    records.iter().map(|record| format!("{record}\n")).collect()
}

/// Write the intermediate payload to `destination`
pub fn write_payload(payload: &Payload, destination: &Path) -> Result<()> {
    write_atomic(destination, render_payload(payload)?.as_bytes())?;
    info!(artifact = %destination.display(), "Wrote payload");
    Ok(())
}

/// Write a flat record file to `destination`
pub fn write_records(records: &[DnsRecord], destination: &Path) -> Result<()> {
    write_atomic(destination, render_records(records).as_bytes())?;
    info!(artifact = %destination.display(), records = records.len(), "Wrote records");
    Ok(())
}

/// Mode of every written artifact; other containers read them
#[cfg(unix)]
pub const ARTIFACT_MODE: u32 = 0o644;

/// Write through a temp file in the destination directory, then rename
fn write_atomic(destination: &Path, contents: &[u8]) -> Result<()> {
    let write_err = |source| ProjectionError::Write {
        path: destination.to_path_buf(),
        source,
    };

    let dir = output_dir(destination);
    let mut file = NamedTempFile::new_in(dir).map_err(write_err)?;
    file.write_all(contents).map_err(write_err)?;
    file.flush().map_err(write_err)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.as_file()
            .set_permissions(std::fs::Permissions::from_mode(ARTIFACT_MODE))
            .map_err(write_err)?;
    }
    file.persist(destination).map_err(|e| write_err(e.error))?;
    Ok(())
}

/// Directory an artifact lives in
pub fn output_dir(destination: &Path) -> &Path {
    match destination.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Turns an intermediate payload file into final nginx syntax
#[async_trait]
pub trait ExternalBuild: Send + Sync {
    /// Render `intermediate`, writing the result into `output_dir`
    async fn render(&self, intermediate: &Path, output_dir: &Path) -> Result<()>;
}

/// Runs an external program such as `crossplane build -f`
#[derive(Debug, Clone)]
pub struct CommandBuild {
    program: String,
    args: Vec<String>,
}

impl CommandBuild {
    /// Create a build step for `program` with leading `args`
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Create the build step configured in settings
    pub fn from_settings(settings: &BuildSettings) -> Self {
        Self::new(settings.command.clone(), settings.args.clone())
    }

    fn command_line(&self, intermediate: &Path, output_dir: &Path) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line.push_str(&format!(
            " -d {} {}",
            output_dir.display(),
            intermediate.display()
        ));
        line
    }
}

#[async_trait]
impl ExternalBuild for CommandBuild {
    async fn render(&self, intermediate: &Path, output_dir: &Path) -> Result<()> {
        let command_line = self.command_line(intermediate, output_dir);
        debug!(command = %command_line, "Running external build");

        let output = Command::new(&self.program)
            .args(&self.args)
            .arg("-d")
            .arg(output_dir)
            .arg(intermediate)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|source| ProjectionError::BuildSpawn {
                command: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            let mut diagnostics = String::from_utf8_lossy(&output.stderr).into_owned();
            diagnostics.push_str(&String::from_utf8_lossy(&output.stdout));
            return Err(ProjectionError::BuildFailed {
                command: command_line,
                status: output.status.to_string(),
                output: diagnostics.trim_end().to_string(),
            });
        }

        // Whatever the tool prints on success is passed through unchanged
        std::io::stdout()
            .write_all(&output.stdout)
            .and_then(|_| std::io::stderr().write_all(&output.stderr))
            .map_err(|source| ProjectionError::Write {
                path: "<stdio>".into(),
                source,
            })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{ConfigFile, ConfigNode};
    use tempfile::TempDir;

    fn payload() -> Payload {
        Payload {
            status: "ok".to_string(),
            errors: vec![],
            config: vec![ConfigFile {
                file: "stream.conf".to_string(),
                status: "ok".to_string(),
                errors: vec![],
                parsed: vec![ConfigNode::with_block("stream", vec![], vec![])],
            }],
        }
    }

    #[test]
    fn test_render_records() {
        let records = vec![
            DnsRecord {
                address: "10.0.0.3".to_string(),
                fqdn: "web.example.com".to_string(),
            },
            DnsRecord {
                address: "10.0.0.2".to_string(),
                fqdn: "db.lab.example.com".to_string(),
            },
        ];
        assert_eq!(
            render_records(&records),
            "10.0.0.3 web.example.com\n10.0.0.2 db.lab.example.com\n"
        );
        assert_eq!(render_records(&[]), "");
    }

    #[test]
    fn test_write_payload_is_byte_stable() {
        let dir = TempDir::new().unwrap();
        let destination = dir.path().join("stream-output.conf");

        write_payload(&payload(), &destination).unwrap();
        let first = std::fs::read(&destination).unwrap();
        write_payload(&payload(), &destination).unwrap();
        let second = std::fs::read(&destination).unwrap();

        assert_eq!(first, second);
        let parsed: Payload = serde_json::from_slice(&first).unwrap();
        assert_eq!(parsed, payload());
    }

    #[cfg(unix)]
    #[test]
    fn test_artifacts_are_world_readable() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let records = dir.path().join("records.list");
        let payload_path = dir.path().join("http-output.conf");

        write_records(&[], &records).unwrap();
        write_payload(&payload(), &payload_path).unwrap();

        for path in [&records, &payload_path] {
            let mode = std::fs::metadata(path).unwrap().permissions().mode() & 0o777;
            assert_eq!(mode, ARTIFACT_MODE, "{}", path.display());
        }
    }

    #[test]
    fn test_write_to_missing_dir_fails() {
        let dir = TempDir::new().unwrap();
        let destination = dir.path().join("missing").join("records.list");

        let err = write_records(&[], &destination).unwrap_err();
        assert!(matches!(err, ProjectionError::Write { .. }));
    }

    #[test]
    fn test_output_dir() {
        assert_eq!(output_dir(Path::new("/srv/nginx/http-output.conf")), Path::new("/srv/nginx"));
        assert_eq!(output_dir(Path::new("http-output.conf")), Path::new("."));
    }

    #[test]
    fn test_command_line() {
        let build = CommandBuild::from_settings(&BuildSettings::default());
        assert_eq!(
            build.command_line(Path::new("/w/http-output.conf"), Path::new("/w")),
            "crossplane build -f -d /w /w/http-output.conf"
        );
    }

    #[cfg(unix)]
    #[smol_potat::test]
    async fn test_build_success() {
        let dir = TempDir::new().unwrap();
        let build = CommandBuild::new("true", vec![]);
        build
            .render(&dir.path().join("stream-output.conf"), dir.path())
            .await
            .unwrap();
    }

    #[cfg(unix)]
    #[smol_potat::test]
    async fn test_build_failure_carries_diagnostics() {
        let dir = TempDir::new().unwrap();
        let build = CommandBuild::new(
            "sh",
            vec![
                "-c".to_string(),
                "echo 'unknown directive' >&2; exit 3".to_string(),
                "build".to_string(),
            ],
        );

        let err = build
            .render(&dir.path().join("http-output.conf"), dir.path())
            .await
            .unwrap_err();

        match err {
            ProjectionError::BuildFailed { output, status, .. } => {
                assert!(output.contains("unknown directive"));
                assert!(status.contains('3'));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[smol_potat::test]
    async fn test_missing_program_is_spawn_error() {
        let dir = TempDir::new().unwrap();
        let build = CommandBuild::new("projector-no-such-build-tool", vec![]);

        let err = build
            .render(&dir.path().join("http-output.conf"), dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, ProjectionError::BuildSpawn { .. }));
    }
}
