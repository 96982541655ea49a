//! Connectivity queries over the in-service topology.
//!
//! Outages can split a case into islands. Only buses in the island holding the
//! swing bus are energized; everything else is blacked out for the solve.

use crate::Case;
use petgraph::algo::connected_components;
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::Bfs;

/// Graph over in-service buses with one edge per in-service branch or
/// transformer. Node weights are bus arena positions.
pub fn in_service_graph(case: &Case) -> UnGraph<usize, ()> {
    let mut graph = UnGraph::<usize, ()>::with_capacity(case.buses().len(), case.branches().len());
    let nodes: Vec<NodeIndex> = (0..case.buses().len()).map(|idx| graph.add_node(idx)).collect();

    let series = case
        .branches()
        .iter()
        .filter(|b| b.in_service)
        .map(|b| (b.from_bus, b.to_bus))
        .chain(
            case.transformers()
                .iter()
                .filter(|t| t.in_service)
                .map(|t| (t.from_bus, t.to_bus)),
        );
    for (from, to) in series {
        if let (Some(i), Some(j)) = (case.bus_position(from), case.bus_position(to)) {
            if case.buses()[i].in_service && case.buses()[j].in_service {
                graph.add_edge(nodes[i], nodes[j], ());
            }
        }
    }
    graph
}

/// Per-bus flag (by arena position): connected to the swing bus through in-service elements.
pub fn energized_buses(case: &Case) -> Vec<bool> {
    let mut energized = vec![false; case.buses().len()];
    let Some(swing) = case.swing_bus().and_then(|b| case.bus_position(b.id)) else {
        return energized;
    };
    let graph = in_service_graph(case);
    let mut bfs = Bfs::new(&graph, NodeIndex::new(swing));
    while let Some(node) = bfs.next(&graph) {
        energized[graph[node]] = true;
    }
    energized
}

/// Number of islands formed by in-service buses.
pub fn island_count(case: &Case) -> usize {
    let graph = in_service_graph(case);
    let out_of_service = case.buses().iter().filter(|b| !b.in_service).count();
    connected_components(&graph) - out_of_service
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Branch, Bus, BusId, BusKind, Transformer};

    fn radial() -> Case {
        let mut case = Case::new("radial", 100.0);
        case.add_bus(Bus::new(BusId::new(1)).with_kind(BusKind::Swing))
            .unwrap();
        for id in 2..=4 {
            case.add_bus(Bus::new(BusId::new(id))).unwrap();
        }
        case.add_branch(Branch::new(BusId::new(1), BusId::new(2), 0.1))
            .unwrap();
        case.add_transformer(Transformer::new(BusId::new(2), BusId::new(3), 0.1))
            .unwrap();
        case.add_branch(Branch::new(BusId::new(3), BusId::new(4), 0.1))
            .unwrap();
        case
    }

    #[test]
    fn intact_radial_is_fully_energized() {
        let case = radial();
        assert_eq!(energized_buses(&case), vec![true; 4]);
        assert_eq!(island_count(&case), 1);
    }

    #[test]
    fn transformer_outage_blacks_out_downstream() {
        let mut case = radial();
        case.set_transformer_in_service(0, false);
        assert_eq!(energized_buses(&case), vec![true, true, false, false]);
        assert_eq!(island_count(&case), 2);
    }

    #[test]
    fn out_of_service_bus_breaks_the_path() {
        let mut case = radial();
        let mut bus = case.bus(BusId::new(3)).cloned().unwrap();
        bus.in_service = false;
        let mut rebuilt = Case::new("radial", 100.0);
        for b in case.buses() {
            rebuilt
                .add_bus(if b.id == bus.id { bus.clone() } else { b.clone() })
                .unwrap();
        }
        for br in case.branches() {
            rebuilt.add_branch(br.clone()).unwrap();
        }
        for t in case.transformers() {
            rebuilt.add_transformer(t.clone()).unwrap();
        }
        case = rebuilt;
        assert_eq!(energized_buses(&case), vec![true, true, false, false]);
        assert_eq!(island_count(&case), 2);
    }

    #[test]
    fn no_swing_means_nothing_energized() {
        let mut case = Case::new("floating", 100.0);
        case.add_bus(Bus::new(BusId::new(1))).unwrap();
        assert_eq!(energized_buses(&case), vec![false]);
    }
}
