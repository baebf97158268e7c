//! Plan serializer — turn a parsed plan back into a definition document.
//!
//! The rebuilt document carries the validated (fully-defaulted) specs, the
//! original stack node's identity and host reference, and minimal topology
//! nodes, so re-parsing yields structurally equal waves and host map.

use serde_json::json;

use super::plan::{DeploymentPlan, TopologyNode};
use crate::model::{GraphNode, StackDefinition};

pub fn plan_to_definition(plan: &DeploymentPlan) -> StackDefinition {
    let mut stack_node = plan.stack_node.clone();
    stack_node.has_part = plan.container_specs.clone();
    if let Some(network) = &plan.network {
        stack_node.extra.insert(
            "network".to_string(),
            serde_json::to_value(network).unwrap_or_default(),
        );
    }

    let mut graph = vec![stack_node];
    let topology_nodes = plan
        .topology
        .datacenters
        .iter()
        .map(|n| (n, "Datacenter"))
        .chain(plan.topology.racks.iter().map(|n| (n, "Rack")))
        .chain(plan.topology.hosts.iter().map(|n| (n, "Host")));
    for (node, fallback_kind) in topology_nodes {
        graph.push(topology_graph_node(node, fallback_kind));
    }

    StackDefinition {
        context: Some(json!({"@vocab": "https://schema.org/"})),
        graph,
    }
}

fn topology_graph_node(node: &TopologyNode, fallback_kind: &str) -> GraphNode {
    GraphNode {
        id: node.id.clone(),
        types: vec![if node.kind.is_empty() {
            fallback_kind.to_string()
        } else {
            node.kind.clone()
        }],
        name: node.name.clone(),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::StackParser;
    use crate::hosts::HostResolver;
    use crate::model::Host;
    use crate::store::{DocumentStore, MemoryStore, TypedStore};
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_round_trip_waves_and_host_map() {
        let store = Arc::new(MemoryStore::new());
        let typed = TypedStore::new(store.clone() as Arc<dyn DocumentStore>);
        typed
            .save("host-1", &Host::new("host-1", "host-1"))
            .await
            .unwrap();
        let parser = StackParser::new(HostResolver::new(store));

        let definition: StackDefinition = serde_json::from_value(json!({
            "@context": {},
            "@graph": [
                {
                    "@id": "https://g.example/stacks/web",
                    "@type": "Stack",
                    "name": "web",
                    "located_in_host": {"@id": "host-1"},
                    "network": {"name": "web-net"},
                    "has_part": [
                        {"@id": "c-db", "name": "db", "image": "postgres:16",
                         "ports": [{"container_port": 5432, "host_port": 5432}]},
                        {"@id": "c-api", "name": "api", "image": "api:1", "depends_on": ["db"]}
                    ]
                },
                {"@id": "rack-1", "@type": "Rack", "name": "rack-1"}
            ]
        }))
        .unwrap();

        let first = parser.parse(&definition).await;
        assert!(first.is_ok(), "errors: {:?}", first.errors);
        let plan = first.plan.unwrap();

        let reserialized = plan_to_definition(&plan);
        let second = parser.parse(&reserialized).await;
        assert!(second.is_ok(), "errors: {:?}", second.errors);
        let replan = second.plan.unwrap();

        assert_eq!(plan.dependency_graph, replan.dependency_graph);
        assert_eq!(plan.host_map, replan.host_map);
        assert_eq!(
            plan.network.as_ref().map(|n| &n.name),
            replan.network.as_ref().map(|n| &n.name)
        );
        assert_eq!(plan.topology.racks.len(), replan.topology.racks.len());
    }
}
