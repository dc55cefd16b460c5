//! `order` command handler

use anyhow::{Context, Result};
use topology::{GraphNode, Stack};

fn format_order(nodes: &[&GraphNode]) -> String {
    nodes
        .iter()
        .enumerate()
        .map(|(i, node)| format!("{:>2}. {} ({})", i + 1, node.logical_id, node.kind))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Prints the creation order, or the teardown order when `teardown` is set.
pub fn handle_order(stack: &Stack, teardown: bool) -> Result<()> {
    let graph = stack
        .dependency_graph()
        .context("Failed to build dependency graph")?;
    let order = if teardown {
        graph.teardown_order()
    } else {
        graph.creation_order()
    };
    let nodes = order.context("Stack has no valid order")?;

    println!("{}", format_order(&nodes));
    Ok(())
}

#[cfg(test)]
mod tests {
    use topology::StackSettings;

    use super::*;

    #[test]
    fn creation_order_starts_with_a_leaf_and_lists_every_resource() {
        let stack = Stack::build(&StackSettings::default());
        let graph = stack.dependency_graph().unwrap();
        let text = format_order(&graph.creation_order().unwrap());

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 13);
        assert!(lines[0].starts_with(" 1. "));
        assert!(lines.iter().any(|l| l.contains("CodePipeline (")));
    }
}
