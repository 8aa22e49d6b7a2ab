//! Crossplane configuration trees
//!
//! The nginx artifacts are built as crossplane JSON payloads: a master
//! payload provides the root tree, an entry template provides the server
//! block instantiated once per service, and optional drop-in documents are
//! spliced in ahead of the generated blocks.
//!
//! Nodes are plain values. Instantiation clones the template, so no child
//! list is ever shared between the template and an instance.

use crate::error::{ProjectionError, Result};
use crate::synthesize::ProxyBlock;
use projection_config::{Protocol, SlotPath, SlotTable};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::error::Category;
use std::path::Path;
use tracing::debug;

/// A single nginx directive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigNode {
    /// Directive name
    pub directive: String,
    /// Source line, when parsed from a file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u64>,
    /// Directive arguments
    #[serde(default)]
    pub args: Vec<String>,
    /// Indexes of included configs (crossplane `include` handling)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub includes: Option<Vec<usize>>,
    /// Child directives; `None` for simple directives
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block: Option<Vec<ConfigNode>>,
    /// Source file, when parsed from a file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    /// Comment text for `#` nodes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl ConfigNode {
    /// A simple directive
    pub fn new(directive: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            directive: directive.into(),
            line: None,
            args,
            includes: None,
            block: None,
            file: None,
            comment: None,
        }
    }

    /// A block directive
    pub fn with_block(
        directive: impl Into<String>,
        args: Vec<String>,
        block: Vec<ConfigNode>,
    ) -> Self {
        Self {
            block: Some(block),
            ..Self::new(directive, args)
        }
    }

    /// Resolve a child-index path below this node
    pub fn descendant(&self, path: &[usize]) -> Option<&ConfigNode> {
        path.iter()
            .try_fold(self, |node, &index| node.block.as_ref()?.get(index))
    }

    /// Resolve a child-index path below this node, mutably
    pub fn descendant_mut(&mut self, path: &[usize]) -> Option<&mut ConfigNode> {
        let mut node = self;
        for &index in path {
            node = node.block.as_mut()?.get_mut(index)?;
        }
        Some(node)
    }
}

/// One parsed file inside a payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigFile {
    /// File name the external build writes
    pub file: String,
    /// Parse status
    #[serde(default = "default_status")]
    pub status: String,
    /// Parse errors
    #[serde(default)]
    pub errors: Vec<serde_json::Value>,
    /// Top-level directives
    #[serde(default)]
    pub parsed: Vec<ConfigNode>,
}

/// A crossplane payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    /// Overall status
    #[serde(default = "default_status")]
    pub status: String,
    /// Overall errors
    #[serde(default)]
    pub errors: Vec<serde_json::Value>,
    /// Parsed files
    pub config: Vec<ConfigFile>,
}

impl Payload {
    /// The server list generated blocks are appended to:
    /// the block of the first directive of the first file
    pub fn insertion_point(&self) -> Option<&Vec<ConfigNode>> {
        self.config.first()?.parsed.first()?.block.as_ref()
    }

    fn insertion_point_mut(&mut self, document: &str) -> Result<&mut Vec<ConfigNode>> {
        self.config
            .first_mut()
            .and_then(|file| file.parsed.first_mut())
            .and_then(|node| node.block.as_mut())
            .ok_or_else(|| {
                ProjectionError::template_shape(document, "no block at config[0].parsed[0]")
            })
    }

    /// Name of the file the external build writes
    pub fn output_file(&self) -> Option<&str> {
        self.config.first().map(|file| file.file.as_str())
    }
}

fn default_status() -> String {
    "ok".to_string()
}

/// Shapes a drop-in document may take on disk
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DropInSource {
    /// A full payload; its insertion-point children are the drop-in
    Payload(Payload),
    /// Several nodes
    Many(Vec<ConfigNode>),
    /// A single node
    Single(ConfigNode),
}

/// Drop-in nodes, normalized to a list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DropIn {
    nodes: Vec<ConfigNode>,
}

impl DropIn {
    /// Normalize a drop-in document
    pub fn from_source(source: DropInSource, document: &str) -> Result<Self> {
        let nodes = match source {
            DropInSource::Single(node) => vec![node],
            DropInSource::Many(nodes) => nodes,
            DropInSource::Payload(payload) => payload
                .insertion_point()
                .cloned()
                .ok_or_else(|| {
                    ProjectionError::template_shape(document, "no block at config[0].parsed[0]")
                })?,
        };
        Ok(Self { nodes })
    }

    /// Parse a drop-in document from JSON text
    pub fn parse_str(content: &str, document: &str) -> Result<Self> {
        let source: DropInSource = serde_json::from_str(content).map_err(|e| {
            ProjectionError::template_shape(
                document,
                format!("expected a node object, an array of nodes or a payload ({e})"),
            )
        })?;
        Self::from_source(source, document)
    }

    /// Load a drop-in document
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = read(path)?;
        Self::parse_str(&content, &path.display().to_string())
    }

    /// The nodes, in document order
    pub fn nodes(&self) -> &[ConfigNode] {
        &self.nodes
    }
}

/// Load a JSON document, reporting shape mismatches as template errors
pub fn load_document<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let content = read(path)?;
    serde_json::from_str(&content).map_err(|source| match source.classify() {
        Category::Data => {
            ProjectionError::template_shape(path.display().to_string(), source.to_string())
        }
        Category::Io | Category::Syntax | Category::Eof => ProjectionError::Json {
            path: path.to_path_buf(),
            source,
        },
    })
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|source| ProjectionError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Instantiates an entry template per proxy block and assembles the tree
#[derive(Debug, Clone)]
pub struct TreeBuilder {
    kind: Protocol,
    template: ConfigNode,
    slots: SlotTable,
}

impl TreeBuilder {
    /// Create a builder, checking every slot resolves in `template`
    pub fn new(kind: Protocol, template: ConfigNode, slots: SlotTable) -> Result<Self> {
        let builder = Self {
            kind,
            template,
            slots,
        };
        for (slot, path) in builder.slot_paths() {
            if builder.template.descendant(path).is_none() {
                return Err(builder.missing_slot(slot, path));
            }
        }
        Ok(builder)
    }

    /// Template kind
    pub fn kind(&self) -> Protocol {
        self.kind
    }

    /// The pristine entry template
    pub fn template(&self) -> &ConfigNode {
        &self.template
    }

    /// Deep-copy the template and fill its slots for `block`.
    ///
    /// Values are appended after any arguments the template already carries.
    pub fn instantiate(&self, block: &ProxyBlock) -> Result<ConfigNode> {
        let mut instance = self.template.clone();

        self.fill(&mut instance, "listen", &self.slots.listen, &block.host_port)?;
        if let Some(path) = &self.slots.server_name {
            self.fill(&mut instance, "server_name", path, &block.server_name)?;
        }
        self.fill(&mut instance, "upstream", &self.slots.upstream, &block.upstream_address)?;

        Ok(instance)
    }

    /// Build a complete payload from `master`.
    ///
    /// Drop-in nodes come first, then one instance per block in order.
    /// Neither `master`, the template nor the drop-in is modified.
    pub fn build(
        &self,
        master: &Payload,
        blocks: &[ProxyBlock],
        drop_in: Option<&DropIn>,
    ) -> Result<Payload> {
        let mut root = master.clone();
        let document = format!("{} master template", self.kind);

        let mut instances = Vec::with_capacity(blocks.len());
        for block in blocks {
            instances.push(self.instantiate(block)?);
        }

        let servers = root.insertion_point_mut(&document)?;
        if let Some(drop_in) = drop_in {
            debug!(kind = %self.kind, nodes = drop_in.nodes().len(), "Splicing drop-in");
            servers.extend(drop_in.nodes().iter().cloned());
        }
        servers.extend(instances);

        debug!(kind = %self.kind, blocks = blocks.len(), "Built config tree");
        Ok(root)
    }

    fn fill(
        &self,
        instance: &mut ConfigNode,
        slot: &str,
        path: &SlotPath,
        value: &str,
    ) -> Result<()> {
        let node = instance
            .descendant_mut(path)
            .ok_or_else(|| self.missing_slot(slot, path))?;
        node.args.push(value.to_string());
        Ok(())
    }

    fn slot_paths(&self) -> Vec<(&'static str, &SlotPath)> {
        let mut paths = vec![("listen", &self.slots.listen)];
        if let Some(path) = &self.slots.server_name {
            paths.push(("server_name", path));
        }
        paths.push(("upstream", &self.slots.upstream));
        paths
    }

    fn missing_slot(&self, slot: &str, path: &SlotPath) -> ProjectionError {
        ProjectionError::template_shape(
            format!("{} entry template", self.kind),
            format!("slot '{}' at {:?} does not exist", slot, path),
        )
    }
}
