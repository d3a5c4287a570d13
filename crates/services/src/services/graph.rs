//! Node/edge view of the path network.
//!
//! Every path is an edge between the nodes at its two endpoints. Endpoints
//! sharing the exact same coordinates are the same node.

use std::collections::{BTreeMap, HashMap};

use db::models::path::Path;
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utils::{geometry::Coord3, wkt::WktError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct GraphEdge {
    pub nodes_id: [i64; 2],
    pub length: f64,
    /// Id of the path this edge stands for.
    pub id: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
pub struct PathGraph {
    /// node id -> neighbour node id -> edge id
    pub nodes: BTreeMap<i64, BTreeMap<i64, i64>>,
    /// edge id (the path id) -> edge
    pub edges: BTreeMap<i64, GraphEdge>,
}

/// Bit pattern of each ordinate; adding `0.0` folds `-0.0` into `0.0`.
fn coord_key(c: &Coord3) -> (u64, u64, u64) {
    (
        (c.x + 0.0).to_bits(),
        (c.y + 0.0).to_bits(),
        (c.z + 0.0).to_bits(),
    )
}

/// Assigns node ids from 1 upwards in first-seen order.
#[derive(Default)]
struct NodeIds {
    ids: HashMap<(u64, u64, u64), i64>,
}

impl NodeIds {
    fn get(&mut self, c: &Coord3) -> i64 {
        let next = self.ids.len() as i64 + 1;
        *self.ids.entry(coord_key(c)).or_insert(next)
    }
}

pub fn build_graph(paths: &[Path]) -> Result<PathGraph, WktError> {
    let mut node_ids = NodeIds::default();
    let mut graph = PathGraph::default();

    for path in paths {
        let coords = path.coords()?;
        let (Some(first), Some(last)) = (coords.first(), coords.last()) else {
            continue;
        };
        let source = node_ids.get(first);
        let dest = node_ids.get(last);

        graph.edges.insert(
            path.id,
            GraphEdge {
                nodes_id: [source, dest],
                length: path.length,
                id: path.id,
            },
        );
        graph.nodes.entry(source).or_default().insert(dest, path.id);
        graph.nodes.entry(dest).or_default().insert(source, path.id);
    }

    Ok(graph)
}
