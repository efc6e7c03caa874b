use std::collections::{HashMap, HashSet};

use petgraph::dot::{Config, Dot};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Dfs;

use crate::error::{CompileError, Result};
use crate::handle::PassId;
use crate::pass::{Pass, UseKind};
use crate::resources::NameEntry;

/// Execution order for one frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schedule {
    /// Every pass reachable from a sink, dependencies first.
    pub order: Vec<PassId>,
    /// Passes nothing presented or exported depends on.
    pub culled: Vec<PassId>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    OnStack,
    Done,
}

/// Builds the dependency graph of `passes` and orders it from the sinks.
///
/// Node `i` of the graph is pass `i`; an edge points from a consumer to the
/// pass it depends on.
pub fn resolve(
    passes: &[Pass],
    names: &HashMap<String, NameEntry>,
    presentation: Option<&str>,
) -> Result<Schedule> {
    let Dependencies {
        mut graph,
        write_after_read,
    } = dependency_graph(passes, names)?;

    let sinks = find_sinks(passes, presentation);
    if sinks.is_empty() && !passes.is_empty() {
        log::warn!("Frame has no sink pass; nothing will execute");
    }

    // Liveness follows data and explicit edges only. Ordering an in-place
    // modification after a reader must not keep that reader alive.
    let live = reachable(&graph, &sinks);
    let mut full = graph.clone();
    for &(consumer, reader) in &write_after_read {
        add_dependency(&mut full, consumer, reader);
        if live[consumer] && live[reader] {
            add_dependency(&mut graph, consumer, reader);
        }
    }

    if log::log_enabled!(log::Level::Trace) {
        log::trace!(
            "Frame graph dependencies:\n{:?}",
            Dot::with_config(&full, &[Config::EdgeNoLabel])
        );
    }

    let mut marks = vec![Mark::Unvisited; passes.len()];
    let mut order = Vec::with_capacity(passes.len());
    for sink in sinks {
        visit(&graph, passes, sink, &mut marks, &mut order)?;
    }

    // Unreachable passes never run, but a cycle among them is still a bug.
    let mut culled = Vec::new();
    for index in 0..passes.len() {
        visit(&full, passes, NodeIndex::new(index), &mut marks, &mut culled)?;
    }

    Ok(Schedule {
        order: order.into_iter().map(|node| PassId::new(node.index())).collect(),
        culled: culled
            .into_iter()
            .map(|node| PassId::new(node.index()))
            .collect(),
    })
}

struct Dependencies<'p> {
    /// Read-to-producer and explicit edges.
    graph: DiGraph<&'p str, ()>,
    /// (modifying pass, reader of the version it overwrites) pairs.
    write_after_read: Vec<(usize, usize)>,
}

fn dependency_graph<'p>(
    passes: &'p [Pass],
    names: &HashMap<String, NameEntry>,
) -> Result<Dependencies<'p>> {
    let mut graph = DiGraph::with_capacity(passes.len(), passes.len());
    for pass in passes {
        graph.add_node(pass.name());
    }

    // Readers of every name, for ordering in-place modifications after them.
    let mut readers: HashMap<&str, Vec<usize>> = HashMap::new();
    for (index, pass) in passes.iter().enumerate() {
        for name in pass.uses().iter().filter_map(|resource_use| resource_use.reads_name()) {
            readers.entry(name).or_default().push(index);
        }
    }

    let mut write_after_read = Vec::new();
    for (consumer, pass) in passes.iter().enumerate() {
        for resource_use in pass.uses() {
            let Some(name) = resource_use.reads_name() else {
                continue;
            };
            let entry = names
                .get(name)
                .ok_or_else(|| CompileError::UnresolvedResource {
                    pass: pass.name().to_string(),
                    name: name.to_string(),
                })?;
            if let Some(producer) = entry.writer {
                add_dependency(&mut graph, consumer, producer.index());
            }

            if resource_use.kind == UseKind::ReadWrite {
                for &reader in readers.get(name).into_iter().flatten() {
                    if reader != consumer {
                        write_after_read.push((consumer, reader));
                    }
                }
            }
        }

        for dependency in pass.explicit_dependencies() {
            if dependency.index() >= passes.len() {
                return Err(CompileError::UnknownPass { pass: *dependency });
            }
            add_dependency(&mut graph, consumer, dependency.index());
        }
    }

    Ok(Dependencies {
        graph,
        write_after_read,
    })
}

fn reachable(graph: &DiGraph<&str, ()>, sinks: &[NodeIndex]) -> Vec<bool> {
    let mut live = vec![false; graph.node_count()];
    let mut dfs = Dfs::empty(graph);
    for &sink in sinks {
        dfs.move_to(sink);
        while let Some(node) = dfs.next(graph) {
            live[node.index()] = true;
        }
    }
    live
}

fn add_dependency(graph: &mut DiGraph<&str, ()>, consumer: usize, producer: usize) {
    if consumer != producer {
        graph.update_edge(NodeIndex::new(consumer), NodeIndex::new(producer), ());
    }
}

/// Passes whose output leaves the frame: the presentation target, or an
/// external resource nobody reads afterwards.
fn find_sinks(passes: &[Pass], presentation: Option<&str>) -> Vec<NodeIndex> {
    let read: HashSet<&str> = passes
        .iter()
        .flat_map(|pass| pass.uses())
        .filter_map(|resource_use| resource_use.reads_name())
        .collect();

    passes
        .iter()
        .enumerate()
        .filter(|(_, pass)| {
            pass.uses().iter().any(|resource_use| {
                resource_use.handle.is_external()
                    && resource_use.writes_name().is_some_and(|name| {
                        Some(name) == presentation || !read.contains(name)
                    })
            })
        })
        .map(|(index, _)| NodeIndex::new(index))
        .collect()
}

/// Post-order walk. A dependency found on the current stack is a cycle.
fn visit(
    graph: &DiGraph<&str, ()>,
    passes: &[Pass],
    node: NodeIndex,
    marks: &mut [Mark],
    order: &mut Vec<NodeIndex>,
) -> Result<()> {
    match marks[node.index()] {
        Mark::Done => return Ok(()),
        Mark::OnStack => {
            return Err(CompileError::CycleDetected {
                pass: passes[node.index()].name().to_string(),
            });
        }
        Mark::Unvisited => {}
    }

    marks[node.index()] = Mark::OnStack;

    let mut dependencies: Vec<NodeIndex> = graph.neighbors(node).collect();
    dependencies.sort_unstable();
    for dependency in dependencies {
        visit(graph, passes, dependency, marks, order)?;
    }

    marks[node.index()] = Mark::Done;
    order.push(node);
    Ok(())
}
