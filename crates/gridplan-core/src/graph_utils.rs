use crate::{Edge, Node, RegionId, System};
use petgraph::algo::is_cyclic_directed;
use petgraph::visit::{EdgeFiltered, EdgeRef};
use petgraph::Direction;

/// Walks parent links from `region` up to its root, nearest first.
pub fn region_ancestors(system: &System, region: &str) -> Vec<RegionId> {
    let mut ancestors = Vec::new();
    let Some(mut current) = system.region_index(region) else {
        return ancestors;
    };
    // bounded by node count so a malformed graph cannot loop forever
    for _ in 0..system.graph().node_count() {
        let parent = system
            .graph()
            .edges_directed(current, Direction::Outgoing)
            .find(|e| matches!(e.weight(), Edge::Parent))
            .map(|e| e.target());
        match parent {
            Some(next) => {
                if let Node::Region(r) = &system.graph()[next] {
                    ancestors.push(r.id.clone());
                }
                current = next;
            }
            None => break,
        }
    }
    ancestors
}

/// Longest parent chain in the hierarchy (a lone region has depth 1).
pub fn hierarchy_depth(system: &System) -> usize {
    system
        .regions()
        .map(|r| region_ancestors(system, r.id.as_str()).len() + 1)
        .max()
        .unwrap_or(0)
}

/// Checks the region hierarchy: acyclic, at most one parent per region, and
/// every parent strictly coarser than its child. Returns one message per
/// problem, keyed by region id.
pub fn check_region_hierarchy(system: &System) -> Vec<(RegionId, String)> {
    let mut problems = Vec::new();
    let graph = system.graph();

    let parents_only = EdgeFiltered::from_fn(graph, |e| matches!(e.weight(), Edge::Parent));
    if is_cyclic_directed(&parents_only) {
        problems.push((
            RegionId::new("hierarchy"),
            "region parent links form a cycle".to_string(),
        ));
    }

    for region in system.regions() {
        let Some(idx) = system.region_index(region.id.as_str()) else {
            continue;
        };
        let parents: Vec<_> = graph
            .edges_directed(idx, Direction::Outgoing)
            .filter(|e| matches!(e.weight(), Edge::Parent))
            .map(|e| e.target())
            .collect();
        if parents.len() > 1 {
            problems.push((
                region.id.clone(),
                format!("region has {} parents", parents.len()),
            ));
        }
        for parent_idx in parents {
            if let Node::Region(parent) = &graph[parent_idx] {
                if parent.level <= region.level {
                    problems.push((
                        region.id.clone(),
                        format!(
                            "parent '{}' ({}) is not coarser than {}",
                            parent.id,
                            parent.level.as_str(),
                            region.level.as_str()
                        ),
                    ));
                }
                if region.parent.as_ref() != Some(&parent.id) {
                    problems.push((
                        region.id.clone(),
                        format!("parent edge to '{}' disagrees with recorded parent", parent.id),
                    ));
                }
            }
        }
    }
    problems
}
