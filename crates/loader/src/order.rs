use std::collections::VecDeque;

use ahash::RandomState;
use common::{LoadError, LoadResult};
use hashbrown::HashMap;
use schema::Schema;

type Map<K, V> = HashMap<K, V, RandomState>;

/// Compute a table insertion order in which every table appears after the
/// tables it references, directly or transitively.
///
/// Edges run from the referenced table to the referencing table;
/// self-references are excluded, since a table never has to precede
/// itself. Ties between independent tables are broken by declaration
/// order, so the result is stable for a given schema. A cross-table cycle
/// is fatal: no order exists that satisfies it.
pub fn insertion_order(schema: &Schema) -> LoadResult<Vec<String>> {
    let names: Vec<&str> = schema.tables().map(|t| t.name()).collect();
    let mut dependents: Map<&str, Vec<&str>> =
        names.iter().map(|name| (*name, Vec::new())).collect();
    let mut in_degree: Map<&str, usize> = names.iter().map(|name| (*name, 0usize)).collect();

    for table in schema.tables() {
        for fk in table.foreign_keys() {
            let from = fk.referenced_table.as_str();
            let to = table.name();
            if from == to {
                continue;
            }
            let Some(edges) = dependents.get_mut(from) else {
                return Err(LoadError::Schema(format!(
                    "table '{to}' references unknown table '{from}'"
                )));
            };
            if edges.contains(&to) {
                continue;
            }
            edges.push(to);
            if let Some(degree) = in_degree.get_mut(to) {
                *degree += 1;
            }
        }
    }

    let mut ready: VecDeque<&str> = names
        .iter()
        .copied()
        .filter(|name| in_degree.get(name) == Some(&0))
        .collect();
    let mut order = Vec::with_capacity(names.len());
    while let Some(name) = ready.pop_front() {
        order.push(name.to_string());
        let Some(edges) = dependents.get(name) else {
            continue;
        };
        for &dependent in edges {
            if let Some(degree) = in_degree.get_mut(dependent) {
                *degree -= 1;
                if *degree == 0 {
                    ready.push_back(dependent);
                }
            }
        }
    }

    if order.len() != names.len() {
        let stuck: Vec<&str> = names
            .iter()
            .copied()
            .filter(|name| in_degree.get(name).is_some_and(|degree| *degree > 0))
            .collect();
        return Err(LoadError::Cycle(format!(
            "foreign keys between tables [{}] form a cycle; no insertion order exists",
            stuck.join(", ")
        )));
    }
    Ok(order)
}
