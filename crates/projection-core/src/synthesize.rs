//! Record synthesis
//!
//! Turns classified bindings into output records. Everything here is pure.

use crate::classify::Classification;
use crate::error::{ProjectionError, Result};
use indexmap::IndexMap;
use projection_config::{NetworkTarget, PortBinding, Protocol, Services};
use serde::Serialize;
use std::fmt;

/// Anything identified by a fully qualified domain name
pub trait Fqdn {
    /// The record's FQDN
    fn fqdn(&self) -> &str;
}

/// Host-list line mapping an FQDN to a proxy address
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DnsRecord {
    /// Address the name resolves to
    pub address: String,
    /// Fully qualified name
    pub fqdn: String,
}

impl fmt::Display for DnsRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.address, self.fqdn)
    }
}

impl Fqdn for DnsRecord {
    fn fqdn(&self) -> &str {
        &self.fqdn
    }
}

/// Values for one instantiated reverse-proxy server block
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProxyBlock {
    /// Template the block is built from
    pub template_kind: Protocol,
    /// Port the proxy listens on
    pub host_port: String,
    /// Where traffic is forwarded
    pub upstream_address: String,
    /// Public name of the service
    pub server_name: String,
}

impl Fqdn for ProxyBlock {
    fn fqdn(&self) -> &str {
        &self.server_name
    }
}

/// `<service>.<domain suffix>`
pub fn fqdn(service_name: &str, target: &NetworkTarget) -> String {
    format!("{}.{}", service_name, target.domain_suffix)
}

/// Build the proxy block for one classified binding
pub fn synthesize_proxy(
    service_name: &str,
    binding: &PortBinding,
    target: &NetworkTarget,
) -> ProxyBlock {
    let upstream_address = match binding.protocol {
        Protocol::Http => format!("http://{}:{}", service_name, binding.container_port),
        Protocol::Stream => format!("{}:{}", service_name, binding.container_port),
    };

    ProxyBlock {
        template_kind: binding.protocol,
        host_port: binding.host_port.clone(),
        upstream_address,
        server_name: fqdn(service_name, target),
    }
}

/// Build the DNS record pointing a service at the network's proxy
pub fn synthesize_dns(service_name: &str, target: &NetworkTarget) -> Result<DnsRecord> {
    let address = target
        .proxy_address
        .clone()
        .ok_or_else(|| ProjectionError::MissingProxyAddress(target.network.clone()))?;

    Ok(DnsRecord {
        address,
        fqdn: fqdn(service_name, target),
    })
}

/// Proxy blocks for every binding of one class, in manifest order
pub fn proxy_blocks(
    bindings: &IndexMap<String, PortBinding>,
    target: &NetworkTarget,
) -> Vec<ProxyBlock> {
    bindings
        .iter()
        .map(|(name, binding)| synthesize_proxy(name, binding, target))
        .collect()
}

/// One DNS record per service exposing at least one binding
pub fn dns_records(
    services: &Services,
    classification: &Classification,
    target: &NetworkTarget,
) -> Result<Vec<DnsRecord>> {
    classification
        .service_names(services)
        .into_iter()
        .map(|name| synthesize_dns(name, target))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use projection_config::parse_port;

    fn target(domain: &str, proxy: Option<&str>) -> NetworkTarget {
        NetworkTarget {
            network: "external".to_string(),
            domain_suffix: domain.to_string(),
            proxy_address: proxy.map(str::to_string),
        }
    }

    #[test]
    fn test_http_proxy_block() {
        let mut binding = parse_port("443:8080").unwrap();
        binding.host_port = "443".to_string();

        let block = synthesize_proxy("web", &binding, &target("example.com", None));
        assert_eq!(block.template_kind, Protocol::Http);
        assert_eq!(block.host_port, "443");
        assert_eq!(block.upstream_address, "http://web:8080");
        assert_eq!(block.server_name, "web.example.com");
    }

    #[test]
    fn test_stream_proxy_block() {
        let binding = parse_port("2222:22/tcp").unwrap();

        let block = synthesize_proxy("gitlab", &binding, &target("lab.example.com", None));
        assert_eq!(block.template_kind, Protocol::Stream);
        assert_eq!(block.host_port, "2222");
        assert_eq!(block.upstream_address, "gitlab:22");
        assert_eq!(block.fqdn(), "gitlab.lab.example.com");
    }

    #[test]
    fn test_dns_record() {
        let record = synthesize_dns("web", &target("example.com", Some("10.0.0.3"))).unwrap();
        assert_eq!(record.fqdn, "web.example.com");
        assert_eq!(record.address, "10.0.0.3");
        assert_eq!(record.to_string(), "10.0.0.3 web.example.com");
    }

    #[test]
    fn test_dns_record_needs_proxy_address() {
        let err = synthesize_dns("web", &target("example.com", None)).unwrap_err();
        assert!(matches!(err, ProjectionError::MissingProxyAddress(ref n) if n == "external"));
    }

    #[test]
    fn test_proxy_blocks_keep_class_order() {
        let mut bindings = IndexMap::new();
        bindings.insert("grafana".to_string(), parse_port("3000").unwrap());
        bindings.insert("api".to_string(), parse_port("8080").unwrap());

        let target = target("example.com", None);
        let first = proxy_blocks(&bindings, &target);
        assert_eq!(first, proxy_blocks(&bindings, &target));

        let names: Vec<&str> = first.iter().map(Fqdn::fqdn).collect();
        assert_eq!(names, vec!["grafana.example.com", "api.example.com"]);
    }
}
