//! Linked-data graph document — the wire format of a stack definition.
//!
//! A definition is a context block plus an ordered `@graph` of nodes. Nodes
//! are polymorphic via one-or-many `@type` markers; we keep the markers as a
//! plain list and answer membership questions instead of reflecting.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use super::container::ContainerSpec;

/// A `{"@id": …}` reference to another node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRef {
    #[serde(rename = "@id")]
    pub id: String,
}

impl NodeRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Accept `"@type": "Stack"` and `"@type": ["Stack", "ItemList"]` alike.
fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(s)) => vec![s],
        Some(OneOrMany::Many(v)) => v,
    })
}

fn serialize_types<S>(types: &[String], serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    if types.len() == 1 {
        serializer.serialize_str(&types[0])
    } else {
        types.serialize(serializer)
    }
}

/// One node of the `@graph`. Stack, host, rack, and datacenter nodes all
/// share this shape; type markers decide which role a node plays. Unknown
/// fields are retained in `extra` so topology nodes survive a round trip.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphNode {
    #[serde(default, rename = "@id")]
    pub id: String,
    #[serde(
        default,
        rename = "@type",
        deserialize_with = "one_or_many",
        serialize_with = "serialize_types"
    )]
    pub types: Vec<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub has_part: Vec<ContainerSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub located_in_host: Option<NodeRef>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl GraphNode {
    /// True when any type marker contains the given fragment.
    pub fn has_type_containing(&self, fragment: &str) -> bool {
        self.types.iter().any(|t| t.contains(fragment))
    }

    /// True when any type marker equals the given string.
    pub fn has_type(&self, marker: &str) -> bool {
        self.types.iter().any(|t| t == marker)
    }

    /// A node qualifies as the stack node when a type marker contains
    /// `Stack`, or equals `SoftwareApplication` or `ItemList`.
    pub fn is_stack_node(&self) -> bool {
        self.has_type_containing("Stack")
            || self.has_type("SoftwareApplication")
            || self.has_type("ItemList")
    }
}

/// The full definition document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StackDefinition {
    #[serde(default, rename = "@context", skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
    #[serde(default, rename = "@graph")]
    pub graph: Vec<GraphNode>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_type_marker() {
        let node: GraphNode =
            serde_json::from_str(r#"{"@id": "x", "@type": "ContainerStack"}"#).unwrap();
        assert_eq!(node.types, vec!["ContainerStack"]);
        assert!(node.is_stack_node());
    }

    #[test]
    fn test_multiple_type_markers() {
        let node: GraphNode = serde_json::from_str(
            r#"{"@id": "x", "@type": ["ItemList", "SoftwareApplication"]}"#,
        )
        .unwrap();
        assert_eq!(node.types.len(), 2);
        assert!(node.is_stack_node());
    }

    #[test]
    fn test_missing_type_marker() {
        let node: GraphNode = serde_json::from_str(r#"{"@id": "x"}"#).unwrap();
        assert!(node.types.is_empty());
        assert!(!node.is_stack_node());
    }

    #[test]
    fn test_topology_node_is_not_stack() {
        let node: GraphNode =
            serde_json::from_str(r#"{"@id": "h", "@type": "Host", "name": "node-a"}"#).unwrap();
        assert!(!node.is_stack_node());
        assert!(node.has_type("Host"));
    }

    #[test]
    fn test_definition_round_trip_retains_extra_fields() {
        let json = r#"{
            "@context": {"@vocab": "https://schema.org/"},
            "@graph": [
                {
                    "@id": "https://graphium.example/stacks/web",
                    "@type": "Stack",
                    "name": "web",
                    "has_part": [{"@id": "c1", "name": "web", "image": "nginx"}],
                    "located_in_host": {"@id": "https://graphium.example/hosts/h1"},
                    "network": {"name": "web-net", "driver": "bridge"}
                },
                {"@id": "https://graphium.example/hosts/h1", "@type": "Host", "name": "h1"}
            ]
        }"#;
        let def: StackDefinition = serde_json::from_str(json).unwrap();
        assert_eq!(def.graph.len(), 2);
        let stack = &def.graph[0];
        assert!(stack.is_stack_node());
        assert_eq!(stack.has_part.len(), 1);
        assert_eq!(
            stack.located_in_host.as_ref().unwrap().id,
            "https://graphium.example/hosts/h1"
        );
        assert!(stack.extra.contains_key("network"));

        let back = serde_json::to_value(&def).unwrap();
        assert_eq!(back["@graph"][0]["network"]["name"], "web-net");
        // single markers serialize back as a bare string
        assert_eq!(back["@graph"][0]["@type"], "Stack");
    }
}
