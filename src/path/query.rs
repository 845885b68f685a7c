//! Resolution of archetype paths against an [`RmTree`].

use serde::Serialize;

use super::{ArchetypePath, PathSegment};
use crate::error::PathError;
use crate::tree::{NodeId, RmTree};

/// A node found by a path query together with the path that identifies it
/// uniquely in the current tree state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedMatch {
    #[serde(skip)]
    pub node: NodeId,
    pub path: ArchetypePath,
}

impl ResolvedMatch {
    pub fn new(node: NodeId, path: ArchetypePath) -> Self {
        Self { node, path }
    }

    pub fn path_string(&self) -> String {
        self.path.to_string()
    }
}

impl RmTree {
    /// Parses `path` and resolves it from the root.
    pub fn resolve(&self, path: &str) -> Result<Vec<ResolvedMatch>, PathError> {
        let query: ArchetypePath = path.parse()?;
        Ok(self.find_all(&query))
    }

    /// Every node matching `query` from the root. Never constructs anything;
    /// an empty result means the path is absent.
    pub fn find_all(&self, query: &ArchetypePath) -> Vec<ResolvedMatch> {
        self.find_all_from(self.root(), &ArchetypePath::root(), query)
    }

    /// Every node matching `query` below `start`, whose own resolved path is `start_path`.
    pub fn find_all_from(
        &self,
        start: NodeId,
        start_path: &ArchetypePath,
        query: &ArchetypePath,
    ) -> Vec<ResolvedMatch> {
        let mut current = vec![ResolvedMatch::new(start, start_path.clone())];
        for segment in query.segments() {
            let mut next = Vec::new();
            for found in &current {
                for child in self.matching_children(found.node, segment) {
                    let step = self.child_segment(found.node, &segment.attribute, child);
                    next.push(ResolvedMatch::new(child, found.path.child(step)));
                }
            }
            if next.is_empty() {
                return next;
            }
            current = next;
        }
        current
    }

    /// Exactly one match, no match, or a multiplicity error listing all matches.
    pub fn find_single(&self, query: &ArchetypePath) -> Result<Option<ResolvedMatch>, PathError> {
        let mut matches = self.find_all(query);
        match matches.len() {
            0 => Ok(None),
            1 => Ok(matches.pop()),
            _ => Err(PathError::Multiplicity {
                path: query.to_string(),
                matches: matches.iter().map(ResolvedMatch::path_string).collect(),
            }),
        }
    }

    /// Longest resolvable unique prefix of `query`, followed by the rest of
    /// the query as written. This is the path a constructor would create.
    pub fn most_specific_path(
        &self,
        start: NodeId,
        start_path: &ArchetypePath,
        query: &ArchetypePath,
    ) -> ArchetypePath {
        let mut node = start;
        let mut resolved = start_path.clone();
        for (position, segment) in query.segments().iter().enumerate() {
            let children = self.matching_children(node, segment);
            match children.as_slice() {
                [child] => {
                    let step = self.child_segment(node, &segment.attribute, *child);
                    resolved = resolved.child(step);
                    node = *child;
                }
                _ => {
                    for rest in &query.segments()[position..] {
                        resolved = resolved.child(rest.clone());
                    }
                    return resolved;
                }
            }
        }
        resolved
    }

    /// Children of `parent` selected by one query segment, in storage order.
    fn matching_children(&self, parent: NodeId, segment: &PathSegment) -> Vec<NodeId> {
        let children = self.children(parent, &segment.attribute);
        let candidates: Vec<NodeId> = match &segment.node_id {
            Some(node_id) => {
                let exact: Vec<NodeId> = children
                    .iter()
                    .copied()
                    .filter(|child| self.archetype_node_id(*child) == Some(node_id.as_str()))
                    .collect();
                if exact.is_empty() {
                    // value objects carry no node id; the id in the path names their constraint
                    children
                        .iter()
                        .copied()
                        .filter(|child| self.archetype_node_id(*child).is_none())
                        .collect()
                } else {
                    exact
                }
            }
            None if segment.index.is_some() => {
                let unnamed: Vec<NodeId> = children
                    .iter()
                    .copied()
                    .filter(|child| self.archetype_node_id(*child).is_none())
                    .collect();
                if unnamed.is_empty() {
                    children.to_vec()
                } else {
                    unnamed
                }
            }
            None => children.to_vec(),
        };

        match segment.index {
            Some(index) => candidates.get(index - 1).copied().into_iter().collect(),
            None => candidates,
        }
    }

    /// The disambiguated segment addressing `child` under `parent.attribute`.
    pub(crate) fn child_segment(&self, parent: NodeId, attribute: &str, child: NodeId) -> PathSegment {
        let siblings = self.children(parent, attribute);
        let mut segment = PathSegment::new(attribute);
        match self.archetype_node_id(child) {
            Some(node_id) => {
                let same_id: Vec<NodeId> = siblings
                    .iter()
                    .copied()
                    .filter(|sibling| self.archetype_node_id(*sibling) == Some(node_id))
                    .collect();
                segment.node_id = Some(node_id.to_string());
                if same_id.len() > 1 {
                    segment.index = same_id
                        .iter()
                        .position(|sibling| *sibling == child)
                        .map(|position| position + 1);
                }
            }
            None => {
                let unnamed: Vec<NodeId> = siblings
                    .iter()
                    .copied()
                    .filter(|sibling| self.archetype_node_id(*sibling).is_none())
                    .collect();
                // a bare segment would also select every named sibling
                if siblings.len() > 1 {
                    segment.index = unnamed
                        .iter()
                        .position(|sibling| *sibling == child)
                        .map(|position| position + 1);
                }
            }
        }
        segment
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{PrimitiveValue, RmObject};

    fn two_events() -> RmTree {
        let mut tree = RmTree::with_root(RmObject::new("HISTORY").with_node_id("id2"));
        let root = tree.root();
        for magnitude in [76.0, 60.0] {
            let event = tree
                .add_object(root, "events", RmObject::new("POINT_EVENT").with_node_id("id3"))
                .unwrap();
            let value = tree
                .add_object(event, "value", RmObject::new("DV_QUANTITY"))
                .unwrap();
            tree.set_primitive(value, "magnitude", PrimitiveValue::Real(magnitude))
                .unwrap();
        }
        tree.add_object(root, "events", RmObject::new("POINT_EVENT").with_node_id("id9"))
            .unwrap();
        tree
    }

    #[test]
    fn appends_occurrence_indices_only_for_repeated_ids() {
        let tree = two_events();
        let paths: Vec<String> = tree
            .resolve("/events")
            .unwrap()
            .iter()
            .map(ResolvedMatch::path_string)
            .collect();
        assert_eq!(paths, vec!["/events[id3, 1]", "/events[id3, 2]", "/events[id9]"]);
    }

    #[test]
    fn value_objects_match_constraint_ids() {
        let tree = two_events();
        let matches = tree.resolve("/events[id3]/value[id13]/magnitude").unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[1].path_string(), "/events[id3, 2]/value/magnitude");
        assert_eq!(
            tree.primitive(matches[1].node),
            Some(&PrimitiveValue::Real(60.0))
        );
    }

    #[test]
    fn resolved_paths_resolve_back_to_the_same_node() {
        let tree = two_events();
        for found in tree.resolve("/events/value/magnitude").unwrap() {
            let again = tree.find_single(&found.path).unwrap().unwrap();
            assert_eq!(again, found);
        }
    }

    #[test]
    fn unnamed_children_next_to_named_siblings_are_indexed() {
        let mut tree = RmTree::with_root(RmObject::new("ITEM_TREE").with_node_id("id4"));
        let root = tree.root();
        tree.add_object(root, "items", RmObject::new("ELEMENT").with_node_id("id5"))
            .unwrap();
        tree.add_object(root, "items", RmObject::new("ELEMENT"))
            .unwrap();

        let paths: Vec<String> = tree
            .resolve("/items")
            .unwrap()
            .iter()
            .map(ResolvedMatch::path_string)
            .collect();
        assert_eq!(paths, vec!["/items[id5]", "/items[1]"]);
        for found in tree.resolve("/items").unwrap() {
            let again = tree.find_single(&found.path).unwrap().unwrap();
            assert_eq!(again, found);
        }
    }

    #[test]
    fn find_single_reports_every_match() {
        let tree = two_events();
        let query: ArchetypePath = "/events[id3]".parse().unwrap();
        match tree.find_single(&query) {
            Err(PathError::Multiplicity { matches, .. }) => {
                assert_eq!(matches, vec!["/events[id3, 1]", "/events[id3, 2]"]);
            }
            other => panic!("expected multiplicity error, got {other:?}"),
        }
    }

    #[test]
    fn absent_paths_resolve_to_nothing() {
        let tree = two_events();
        assert!(tree.resolve("/events[id4]/value").unwrap().is_empty());
        assert!(tree.resolve("/events[id3, 3]").unwrap().is_empty());
    }

    #[test]
    fn most_specific_path_stops_at_ambiguity_or_absence() {
        let tree = two_events();
        let root = ArchetypePath::root();
        let missing: ArchetypePath = "/events[id9]/data[id4]/items[id5]".parse().unwrap();
        assert_eq!(
            tree.most_specific_path(tree.root(), &root, &missing)
                .to_string(),
            "/events[id9]/data[id4]/items[id5]"
        );
        let ambiguous: ArchetypePath = "/events[id3]/value/units".parse().unwrap();
        assert_eq!(
            tree.most_specific_path(tree.root(), &root, &ambiguous)
                .to_string(),
            "/events[id3]/value/units"
        );
        let indexed: ArchetypePath = "/events[id3,2]/value/units".parse().unwrap();
        assert_eq!(
            tree.most_specific_path(tree.root(), &root, &indexed)
                .to_string(),
            "/events[id3, 2]/value/units"
        );
    }
}
