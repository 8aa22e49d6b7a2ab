//! Service classification by network and protocol class

use indexmap::IndexMap;
use projection_config::{PortBinding, Protocol, Services};
use serde::Serialize;
use tracing::debug;

/// Host port every HTTP service is published on behind TLS termination
pub const HTTPS_PORT: &str = "443";

/// Bindings of one network, split by protocol class
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Classification {
    /// Raw TCP bindings keyed by service
    pub stream: IndexMap<String, PortBinding>,
    /// HTTP bindings keyed by service
    pub http: IndexMap<String, PortBinding>,
}

impl Classification {
    /// Bindings of one protocol class
    pub fn by_protocol(&self, protocol: Protocol) -> &IndexMap<String, PortBinding> {
        match protocol {
            Protocol::Stream => &self.stream,
            Protocol::Http => &self.http,
        }
    }

    /// Services with at least one binding, in manifest order
    pub fn service_names<'a>(&self, services: &'a Services) -> Vec<&'a str> {
        services
            .keys()
            .filter(|name| self.stream.contains_key(*name) || self.http.contains_key(*name))
            .map(String::as_str)
            .collect()
    }

    /// Whether nothing is exposed on this network
    pub fn is_empty(&self) -> bool {
        self.stream.is_empty() && self.http.is_empty()
    }
}

/// Classify the bindings of every service attached to `network`.
///
/// Loopback-only bindings are dropped. When a service declares several
/// bindings of the same class, the last one wins.
pub fn classify(services: &Services, network: &str) -> Classification {
    let mut classification = Classification::default();

    for (name, service) in services {
        if !service.is_on(network) {
            continue;
        }

        for binding in &service.ports {
            if binding.is_loopback() {
                debug!(
                    service = %name,
                    port = %binding.host_port,
                    "Skipping loopback-only binding"
                );
                continue;
            }

            match binding.protocol {
                Protocol::Stream => {
                    classification.stream.insert(name.clone(), binding.clone());
                }
                Protocol::Http => {
                    classification
                        .http
                        .insert(name.clone(), normalize_http(binding));
                }
            }
        }
    }

    debug!(
        network,
        stream = classification.stream.len(),
        http = classification.http.len(),
        "Classified services"
    );
    classification
}

fn normalize_http(binding: &PortBinding) -> PortBinding {
    PortBinding {
        host_port: HTTPS_PORT.to_string(),
        ..binding.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use projection_config::{EnvContext, parse_manifest_str};
    use std::path::Path;

    fn services(yaml: &str) -> Services {
        parse_manifest_str(yaml, Path::new("test.yml"), &EnvContext::default()).unwrap()
    }

    #[test]
    fn test_network_membership() {
        let services = services(
            r#"
services:
  web: { networks: [external], ports: ["443:8080"] }
  db: { networks: [internal], ports: ["5432/tcp"] }
"#,
        );

        let external = classify(&services, "external");
        assert_eq!(external.http.len(), 1);
        assert!(external.stream.is_empty());
        assert_eq!(external.http["web"].container_port, "8080");

        let internal = classify(&services, "internal");
        assert!(internal.http.is_empty());
        assert_eq!(internal.stream.len(), 1);
        assert_eq!(internal.stream["db"].host_port, "5432");

        assert!(classify(&services, "iot").is_empty());
    }

    #[test]
    fn test_http_host_port_normalized() {
        let services = services(
            r#"
services:
  grafana: { networks: [internal], ports: ["3000"] }
  gitea: { networks: [internal], ports: ["8443:3000", "2222:22/tcp"] }
"#,
        );

        let classification = classify(&services, "internal");
        assert_eq!(classification.http["grafana"].host_port, HTTPS_PORT);
        assert_eq!(classification.http["grafana"].container_port, "3000");
        assert_eq!(classification.http["gitea"].host_port, HTTPS_PORT);
        // Stream bindings keep their published port
        assert_eq!(classification.stream["gitea"].host_port, "2222");
    }

    #[test]
    fn test_loopback_bindings_excluded() {
        let services = services(
            r#"
services:
  portainer: { networks: [internal], ports: ["127.0.0.1:9000:9000"] }
  mqtt: { networks: [internal], ports: ["127.0.0.1:1883:1883/tcp", "8883/tcp"] }
"#,
        );

        let classification = classify(&services, "internal");
        assert!(!classification.http.contains_key("portainer"));
        assert!(!classification.stream.contains_key("portainer"));
        assert_eq!(classification.stream["mqtt"].host_port, "8883");
    }

    #[test]
    fn test_last_binding_of_a_class_wins() {
        let services = services(
            r#"
services:
  minecraft: { networks: [external], ports: ["25565/tcp", "25575/tcp"] }
"#,
        );

        let classification = classify(&services, "external");
        assert_eq!(classification.stream.len(), 1);
        assert_eq!(classification.stream["minecraft"].host_port, "25575");
    }

    #[test]
    fn test_every_non_loopback_class_is_represented() {
        let services = services(
            r#"
services:
  a: { networks: [lan], ports: ["80", "22/tcp"] }
  b: { networks: [lan], ports: ["127.0.0.1:81:81", "8081"] }
  c: { networks: [lan] }
"#,
        );

        let classification = classify(&services, "lan");
        for (name, service) in &services {
            for binding in service.ports.iter().filter(|b| !b.is_loopback()) {
                let in_stream = classification.stream.contains_key(name);
                let in_http = classification.http.contains_key(name);
                match binding.protocol {
                    Protocol::Stream => assert!(in_stream, "{name} missing from stream"),
                    Protocol::Http => assert!(in_http, "{name} missing from http"),
                }
            }
        }
        assert_eq!(classification.service_names(&services), vec!["a", "b"]);
    }
}
