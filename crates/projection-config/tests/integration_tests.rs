//! Integration tests for projection-config

use projection_config::{
    ConfigError, EnvContext, Protocol, SETTINGS_FILE, Settings, load_manifest, load_manifest_dir,
    load_settings,
};
use std::fs;
use tempfile::TempDir;

fn write(dir: &TempDir, name: &str, content: &str) {
    fs::write(dir.path().join(name), content).unwrap();
}

#[test]
fn test_full_manifest_loading() {
    let dir = TempDir::new().unwrap();
    write(
        &dir,
        "docker-compose.yml",
        r#"
version: "3.8"
services:
  nginx:
    image: nginx:1.25
    networks: [internal, external]
    ports:
      - "80:80"
      - "443:443"
  gitlab:
    image: gitlab/gitlab-ce
    networks:
      internal: {}
    ports:
      - "8929:80"
      - "2222:22/tcp"
  portainer:
    image: portainer/portainer-ce
    networks: [internal]
    ports:
      - "127.0.0.1:9000:9000"
  watchtower:
    image: containrrr/watchtower
networks:
  internal:
    external: true
"#,
    );

    let services =
        load_manifest(dir.path().join("docker-compose.yml"), &EnvContext::default()).unwrap();
    assert_eq!(services.len(), 4);

    let gitlab = &services["gitlab"];
    assert_eq!(gitlab.ports.len(), 2);
    assert_eq!(gitlab.ports[0].protocol, Protocol::Http);
    assert_eq!(gitlab.ports[1].protocol, Protocol::Stream);
    assert_eq!(gitlab.ports[1].host_port, "2222");
    assert_eq!(gitlab.ports[1].container_port, "22");

    assert!(services["portainer"].ports[0].is_loopback());
    assert!(services["nginx"].is_on("external"));
    assert!(services["watchtower"].ports.is_empty());
}

#[test]
fn test_missing_manifest_is_error() {
    let dir = TempDir::new().unwrap();
    let err = load_manifest(dir.path().join("docker-compose.yml"), &EnvContext::default())
        .unwrap_err();
    assert!(matches!(err, ConfigError::ManifestRead { .. }));
}

#[test]
fn test_manifest_dir_merges_in_name_order() {
    let dir = TempDir::new().unwrap();
    write(
        &dir,
        "10-base.yml",
        r#"
services:
  web: { networks: [internal], ports: ["8080"] }
  db: { networks: [internal], ports: ["5432/tcp"] }
"#,
    );
    write(
        &dir,
        "20-override.yaml",
        r#"
services:
  web: { networks: [external], ports: ["443:9090"] }
"#,
    );
    write(&dir, "notes.txt", "not a manifest");

    let services = load_manifest_dir(dir.path(), &EnvContext::default()).unwrap();
    let names: Vec<&str> = services.keys().map(String::as_str).collect();
    assert_eq!(names, vec!["web", "db"]);
    assert!(services["web"].is_on("external"));
    assert!(!services["web"].is_on("internal"));
    assert_eq!(services["web"].ports[0].container_port, "9090");
}

#[test]
fn test_empty_manifest_dir_is_error() {
    let dir = TempDir::new().unwrap();
    write(&dir, "README.md", "nothing here");

    let err = load_manifest_dir(dir.path(), &EnvContext::default()).unwrap_err();
    assert!(matches!(err, ConfigError::NoManifests(_)));
}

#[test]
fn test_missing_settings_file_uses_defaults() {
    let dir = TempDir::new().unwrap();
    let settings = load_settings(dir.path().join(SETTINGS_FILE), &EnvContext::default()).unwrap();
    assert_eq!(settings, Settings::default());
}

#[test]
fn test_settings_file() {
    let dir = TempDir::new().unwrap();
    write(
        &dir,
        SETTINGS_FILE,
        r#"
version: "1.0"
manifest: compose.yaml
base_file: pihole/custom.list
networks:
  external:
    domain: example.net
    proxy_address: 203.0.113.10
drop_ins:
  - domain: example.net
    kind: http
    path: drop-ins/external.json
build:
  command: /usr/local/bin/crossplane
"#,
    );

    let settings = load_settings(dir.path().join(SETTINGS_FILE), &EnvContext::default()).unwrap();
    assert_eq!(settings.manifest, "compose.yaml");
    assert_eq!(settings.base_file.as_deref(), Some("pihole/custom.list"));
    assert_eq!(settings.build.command, "/usr/local/bin/crossplane");
    assert_eq!(settings.build.args, vec!["build", "-f"]);

    let external = settings.target("external", None).unwrap();
    assert_eq!(external.domain_suffix, "example.net");
    assert_eq!(external.proxy_address.as_deref(), Some("203.0.113.10"));

    let rule = settings.drop_in_for("example.net", Protocol::Http).unwrap();
    assert_eq!(rule.path, "drop-ins/external.json");
    // Explicit rules replace the built-in one
    assert!(settings.drop_in_for("example.com", Protocol::Http).is_none());
}
