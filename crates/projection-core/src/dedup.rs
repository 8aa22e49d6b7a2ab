//! Base record deduplication and emission ordering
//!
//! The base file is authoritative: any FQDN it already defines is never
//! emitted by a projection run.

use crate::error::{ProjectionError, Result};
use crate::synthesize::Fqdn;
use std::collections::{BTreeSet, HashSet};
use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, info};

/// FQDNs already claimed by the base record file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BaseRecordSet {
    fqdns: BTreeSet<String>,
}

impl BaseRecordSet {
    /// Parse a host-list file; the second field of each line is the FQDN.
    ///
    /// Blank lines, `#` comments and lines with a single field are ignored.
    pub fn parse(content: &str) -> Self {
        content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter_map(|line| line.split_whitespace().nth(1))
            .map(str::to_string)
            .collect()
    }

    /// Load the base file; a missing file is an empty set
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let base = Self::parse(&content);
                info!(base_file = %path.display(), records = base.len(), "Loaded base records");
                Ok(base)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(base_file = %path.display(), "Base file absent, using empty set");
                Ok(Self::default())
            }
            Err(source) => Err(ProjectionError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Whether `fqdn` is already claimed
    pub fn contains(&self, fqdn: &str) -> bool {
        self.fqdns.contains(fqdn)
    }

    /// Number of claimed names
    pub fn len(&self) -> usize {
        self.fqdns.len()
    }

    /// Whether no names are claimed
    pub fn is_empty(&self) -> bool {
        self.fqdns.is_empty()
    }
}

impl FromIterator<String> for BaseRecordSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self {
            fqdns: iter.into_iter().collect(),
        }
    }
}

/// Drop candidates whose FQDN the base set already defines, keeping order
pub fn filter<R: Fqdn>(candidates: Vec<R>, base: &BaseRecordSet) -> Vec<R> {
    candidates
        .into_iter()
        .filter(|candidate| {
            let claimed = base.contains(candidate.fqdn());
            if claimed {
                debug!(fqdn = candidate.fqdn(), "Suppressed by base record");
            }
            !claimed
        })
        .collect()
}

/// Keep only the first record for each FQDN
pub fn unique<R: Fqdn>(records: Vec<R>) -> Vec<R> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|record| seen.insert(record.fqdn().to_string()))
        .collect()
}

/// Rank of a network in a mixed artifact; external records come first
pub fn emission_rank(network: &str) -> u8 {
    match network {
        "external" => 0,
        "internal" => 1,
        _ => 2,
    }
}

/// Reorder networks for emission, stable within a rank
pub fn emission_order(networks: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut ordered: Vec<String> = networks
        .iter()
        .filter(|network| seen.insert(network.as_str()))
        .cloned()
        .collect();
    ordered.sort_by_key(|network| emission_rank(network));
    ordered
}
