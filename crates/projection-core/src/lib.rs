//! # Projection Core
//!
//! Projects a set of declared services onto generated proxy and DNS
//! configuration.
//!
//! A run flows through the modules in order:
//!
//! - [`classify`] splits each service's published ports into stream and
//!   http bindings for one network
//! - [`synthesize`] turns bindings into [`ProxyBlock`]s and [`DnsRecord`]s
//! - [`dedup`] drops anything a hand-maintained base file already defines
//! - [`tree`] clones the entry template once per block and grafts the
//!   copies into the master template
//! - [`sink`] writes the artifacts and hands payloads to the external build
//!
//! [`pipeline`] wires these together for the nginx and records runs.

#![warn(missing_docs)]

pub mod classify;
pub mod dedup;
pub mod error;
pub mod pipeline;
pub mod sink;
pub mod synthesize;
pub mod tree;

pub use classify::{Classification, HTTPS_PORT, classify};
pub use dedup::{BaseRecordSet, emission_order, emission_rank, filter, unique};
pub use error::{ProjectionError, Result};
pub use pipeline::{
    Artifact, NginxOptions, RecordsOptions, Workspace, collect_records, load_services,
    output_file_name, prepare_nginx, project_nginx, project_records, record_targets,
};
pub use sink::{
    CommandBuild, ExternalBuild, render_payload, render_records, write_payload, write_records,
};
pub use synthesize::{
    DnsRecord, Fqdn, ProxyBlock, dns_records, proxy_blocks, synthesize_dns, synthesize_proxy,
};
pub use tree::{ConfigFile, ConfigNode, DropIn, DropInSource, Payload, TreeBuilder, load_document};
