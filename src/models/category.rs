use super::{default_true, trim, trim_opt, validate_slug, IndexSpec, Model, RecordId};
use crate::documents::Document;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use validator::Validate;

/// A listing category; `parent` makes the set a tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(custom(function = "validate_slug"))]
    pub slug: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    #[validate(length(max = 500))]
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub parent: Option<RecordId>,
}

impl Model for Category {
    const COLLECTION: &'static str = "categories";

    fn indexes() -> &'static [IndexSpec] {
        const INDEXES: &[IndexSpec] = &[IndexSpec::unique(&["slug"]), IndexSpec::secondary(&["parent"])];
        INDEXES
    }

    fn normalize(&mut self) {
        trim(&mut self.name);
        trim_opt(&mut self.image);
        trim_opt(&mut self.description);
        self.slug = self.slug.trim().to_lowercase();
    }
}

/// Parent/child navigation over a loaded set of categories.
///
/// A category whose parent is not in the set is treated as a root.
/// Walks stop at the first repeated node, so a corrupt parent cycle
/// terminates instead of looping.
#[derive(Debug, Clone)]
pub struct CategoryTree {
    nodes: HashMap<RecordId, Document<Category>>,
    children: HashMap<RecordId, Vec<RecordId>>,
    roots: Vec<RecordId>,
}

impl CategoryTree {
    pub fn new(categories: Vec<Document<Category>>) -> Self {
        let nodes: HashMap<RecordId, Document<Category>> =
            categories.into_iter().map(|c| (c.id.clone(), c)).collect();

        let mut children: HashMap<RecordId, Vec<RecordId>> = HashMap::new();
        let mut roots = Vec::new();
        for (id, doc) in &nodes {
            match &doc.data.parent {
                Some(parent) if nodes.contains_key(parent) => {
                    children.entry(parent.clone()).or_default().push(id.clone())
                }
                _ => roots.push(id.clone()),
            }
        }
        // Stable output: by name, then id
        let by_name = |a: &RecordId, b: &RecordId| {
            let (na, nb) = (&nodes[a].data.name, &nodes[b].data.name);
            na.cmp(nb).then_with(|| a.cmp(b))
        };
        roots.sort_by(by_name);
        for list in children.values_mut() {
            list.sort_by(by_name);
        }

        Self { nodes, children, roots }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: &RecordId) -> Option<&Document<Category>> {
        self.nodes.get(id)
    }

    pub fn roots(&self) -> Vec<&Document<Category>> {
        self.roots.iter().map(|id| &self.nodes[id]).collect()
    }

    /// Direct children of `id`
    pub fn children(&self, id: &RecordId) -> Vec<&Document<Category>> {
        self.children
            .get(id)
            .map(|ids| ids.iter().map(|c| &self.nodes[c]).collect())
            .unwrap_or_default()
    }

    /// Parents of `id`, nearest first
    pub fn ancestors(&self, id: &RecordId) -> Vec<&Document<Category>> {
        let mut out = Vec::new();
        let mut seen = HashSet::from([id.clone()]);
        let mut current = self.nodes.get(id).and_then(|c| c.data.parent.as_ref());
        while let Some(parent_id) = current {
            if !seen.insert(parent_id.clone()) {
                break;
            }
            let Some(parent) = self.nodes.get(parent_id) else {
                break;
            };
            out.push(parent);
            current = parent.data.parent.as_ref();
        }
        out
    }

    /// Everything below `id`, breadth first
    pub fn descendants(&self, id: &RecordId) -> Vec<&Document<Category>> {
        let mut out = Vec::new();
        let mut seen = HashSet::from([id.clone()]);
        let mut queue: VecDeque<&RecordId> = VecDeque::from([id]);
        while let Some(next) = queue.pop_front() {
            for child in self.children.get(next).into_iter().flatten() {
                if seen.insert(child.clone()) {
                    out.push(&self.nodes[child]);
                    queue.push_back(child);
                }
            }
        }
        out
    }

    /// Names from the root down to `id`, e.g. `["Vehicles", "Cars"]`
    pub fn path(&self, id: &RecordId) -> Vec<&str> {
        let Some(node) = self.nodes.get(id) else {
            return Vec::new();
        };
        let mut names: Vec<&str> = self.ancestors(id).iter().map(|c| c.data.name.as_str()).collect();
        names.reverse();
        names.push(node.data.name.as_str());
        names
    }

    /// Categories whose parent id points at nothing in the set
    pub fn orphans(&self) -> Vec<&Document<Category>> {
        let mut out: Vec<_> = self
            .nodes
            .values()
            .filter(|c| matches!(&c.data.parent, Some(p) if !self.nodes.contains_key(p)))
            .collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        out
    }
}
