//! Execution ordering for section lists.
//!
//! [`resolve_order`] is a depth-first topological sort that never fails:
//! unknown `dependsOn` ids are dropped and cycles are cut where the walk
//! meets an already-visited section. Use
//! [`validate_sections`](crate::sections::validate::validate_sections) to
//! report those problems up front.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::sections::SectionDefinition;

/// Reorder `sections` so every dependency precedes its dependents.
///
/// Sections are visited in input order, so sections without edges keep their
/// relative order. `priority` is ignored. When ids repeat, `dependsOn` lookups
/// find the first definition; every definition still appears once.
pub fn resolve_order(sections: &[SectionDefinition]) -> Vec<&SectionDefinition> {
    let mut by_id: HashMap<&str, usize> = HashMap::new();
    for (i, section) in sections.iter().enumerate() {
        by_id.entry(section.id.as_str()).or_insert(i);
    }

    let mut visited: HashSet<usize> = HashSet::with_capacity(sections.len());
    let mut order = Vec::with_capacity(sections.len());
    for index in 0..sections.len() {
        visit(index, sections, &by_id, &mut visited, &mut order);
    }
    order
}

fn visit<'a>(
    index: usize,
    sections: &'a [SectionDefinition],
    by_id: &HashMap<&str, usize>,
    visited: &mut HashSet<usize>,
    order: &mut Vec<&'a SectionDefinition>,
) {
    if !visited.insert(index) {
        return;
    }
    let section = &sections[index];
    for dep in &section.depends_on {
        match by_id.get(dep.as_str()) {
            Some(&dep_index) => visit(dep_index, sections, by_id, visited, order),
            None => debug!("[resolve] '{}' depends on unknown '{dep}'; ignoring", section.id),
        }
    }
    order.push(section);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(id: &str, deps: &[&str]) -> SectionDefinition {
        SectionDefinition::new(id, id, id).depends_on(deps.iter().copied())
    }

    fn ids<'a>(order: &[&'a SectionDefinition]) -> Vec<&'a str> {
        order.iter().map(|s| s.id.as_str()).collect()
    }

    #[test]
    fn independent_sections_keep_input_order() {
        let sections = vec![section("c", &[]), section("a", &[]), section("b", &[])];
        assert_eq!(ids(&resolve_order(&sections)), vec!["c", "a", "b"]);
    }

    #[test]
    fn dependencies_move_ahead() {
        let sections = vec![
            section("plan", &["memories", "goals"]),
            section("goals", &[]),
            section("memories", &[]),
        ];
        assert_eq!(ids(&resolve_order(&sections)), vec!["memories", "goals", "plan"]);
    }

    #[test]
    fn priority_is_ignored() {
        let sections = vec![section("a", &[]).with_priority(9), section("b", &[]).with_priority(1)];
        assert_eq!(ids(&resolve_order(&sections)), vec!["a", "b"]);
    }

    #[test]
    fn dangling_dependency_is_dropped() {
        let sections = vec![section("a", &["ghost"]), section("b", &["a"])];
        assert_eq!(ids(&resolve_order(&sections)), vec!["a", "b"]);
    }

    #[test]
    fn cycles_terminate_with_every_section_once() {
        let sections = vec![section("a", &["b"]), section("b", &["a"]), section("c", &["c"])];
        let order = ids(&resolve_order(&sections));
        assert_eq!(order, vec!["b", "a", "c"]);
    }

    #[test]
    fn output_is_a_topological_order() {
        let sections = vec![
            section("quick", &["plan", "caller"]),
            section("plan", &["curriculum", "history"]),
            section("curriculum", &["domain"]),
            section("caller", &[]),
            section("history", &[]),
            section("domain", &["caller"]),
        ];
        let order = ids(&resolve_order(&sections));
        let position = |id: &str| order.iter().position(|x| *x == id).unwrap();
        for s in &sections {
            for dep in &s.depends_on {
                assert!(position(dep) < position(&s.id), "{dep} must precede {}", s.id);
            }
        }
        assert_eq!(order.len(), sections.len());
    }
}
