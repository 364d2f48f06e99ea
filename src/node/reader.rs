use super::{Scalar, StructuredNode};

/// Read-only, dotted-path view over a [`StructuredNode`] (spec §4.3).
///
/// Dotted paths traverse mappings only (`"metadata.creationTimestamp"`);
/// sequence elements are reached via [`NodeReader::children`] iteration,
/// which is how every modifier in this crate walks
/// `status.containerStatuses[]`-shaped data.
#[derive(Debug, Clone, Copy)]
pub struct NodeReader<'a> {
    node: &'a StructuredNode,
}

impl<'a> NodeReader<'a> {
    pub fn new(node: &'a StructuredNode) -> Self {
        Self { node }
    }

    pub fn node(&self) -> &'a StructuredNode {
        self.node
    }

    fn navigate(&self, path: &str) -> Option<&'a StructuredNode> {
        if path.is_empty() {
            return Some(self.node);
        }
        let mut current = self.node;
        for segment in path.split('.') {
            match current {
                StructuredNode::Mapping(map) => {
                    current = map.get(segment)?;
                }
                _ => return None,
            }
        }
        Some(current)
    }

    pub fn get_reader(&self, path: &str) -> Option<NodeReader<'a>> {
        self.navigate(path).map(NodeReader::new)
    }

    pub fn read_string(&self, path: &str) -> Option<String> {
        match self.navigate(path)? {
            StructuredNode::Scalar(Scalar::String(s)) => Some(s.clone()),
            StructuredNode::Scalar(other) => Some(other.to_string()),
            _ => None,
        }
    }

    pub fn read_int(&self, path: &str) -> Option<i64> {
        match self.navigate(path)? {
            StructuredNode::Scalar(Scalar::Int(i)) => Some(*i),
            StructuredNode::Scalar(Scalar::Float(f)) => Some(*f as i64),
            _ => None,
        }
    }

    pub fn read_bool(&self, path: &str) -> Option<bool> {
        match self.navigate(path)? {
            StructuredNode::Scalar(Scalar::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn exists(&self, path: &str) -> bool {
        self.navigate(path).is_some()
    }

    /// Iterate this node's children, if it is a mapping or sequence.
    /// Sequence children are keyed by their stringified index.
    pub fn children(&self) -> Box<dyn Iterator<Item = (String, NodeReader<'a>)> + 'a> {
        match self.node {
            StructuredNode::Mapping(map) => Box::new(
                map.iter()
                    .map(|(k, v)| (k.clone(), NodeReader::new(v))),
            ),
            StructuredNode::Sequence(items) => Box::new(
                items
                    .iter()
                    .enumerate()
                    .map(|(i, v)| (i.to_string(), NodeReader::new(v))),
            ),
            _ => Box::new(std::iter::empty()),
        }
    }

    pub fn as_sequence_readers(&self) -> Vec<NodeReader<'a>> {
        match self.node {
            StructuredNode::Sequence(items) => items.iter().map(NodeReader::new).collect(),
            _ => Vec::new(),
        }
    }

    /// `NodeReader::Serialize(format)` (spec §4.3).
    pub fn serialize(&self, format: SerializeFormat) -> String {
        match format {
            SerializeFormat::Json => self.node.to_json_string(),
            SerializeFormat::Yaml => self.node.to_yaml_string(),
        }
    }
}

/// Output format for [`NodeReader::serialize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerializeFormat {
    Json,
    Yaml,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> StructuredNode {
        StructuredNode::mapping([
            (
                "metadata".to_string(),
                StructuredNode::mapping([
                    ("name".to_string(), StructuredNode::string("nginx")),
                    (
                        "labels".to_string(),
                        StructuredNode::mapping([("app".to_string(), StructuredNode::string("web"))]),
                    ),
                ]),
            ),
            (
                "spec".to_string(),
                StructuredNode::mapping([("replicas".to_string(), StructuredNode::int(3))]),
            ),
        ])
    }

    #[test]
    fn dotted_path_reads_nested_string() {
        let node = sample();
        assert_eq!(
            node.reader().read_string("metadata.name").as_deref(),
            Some("nginx")
        );
        assert_eq!(
            node.reader().read_string("metadata.labels.app").as_deref(),
            Some("web")
        );
    }

    #[test]
    fn dotted_path_reads_int() {
        let node = sample();
        assert_eq!(node.reader().read_int("spec.replicas"), Some(3));
    }

    #[test]
    fn missing_path_returns_none() {
        let node = sample();
        assert_eq!(node.reader().read_string("spec.missing"), None);
        assert_eq!(node.reader().read_string("nope.nope"), None);
    }

    #[test]
    fn children_iterates_mapping_entries() {
        let node = sample();
        let keys: Vec<String> = node.reader().children().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["metadata", "spec"]);
    }
}
