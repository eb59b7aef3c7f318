//! In-memory Group Tree
//!
//! Parent-pointer tree of groups with POM leaves, built from the flat lists
//! the store returns. Moves are validated with an ancestor walk from the
//! candidate parent and applied by detaching from the old list and appending
//! to the new one; no other subtree is touched.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::domain::{DomainError, DomainResult, Group, Pom};

/// A row in the tree: either a group or a POM leaf
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "camelCase")]
pub enum TreeEntry {
    Group(u32),
    Pom(u32),
}

/// POM as shown in the tree
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PomSummary {
    pub id: u32,
    pub name: String,
    pub group_id: Option<u32>,
    pub element_count: usize,
    pub has_snapshot: bool,
    pub has_screenshot: bool,
}

impl From<&Pom> for PomSummary {
    fn from(pom: &Pom) -> Self {
        Self {
            id: pom.id,
            name: pom.name.clone(),
            group_id: pom.group_id,
            element_count: pom.elements.len(),
            has_snapshot: pom.has_snapshot(),
            has_screenshot: pom.screenshot_url.is_some(),
        }
    }
}

#[derive(Debug, Clone)]
struct GroupNode {
    group: Group,
    children: Vec<u32>,
    poms: Vec<u32>,
}

/// Nested view of a group for the UI
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeNode {
    pub group: Group,
    pub children: Vec<TreeNode>,
    pub poms: Vec<PomSummary>,
}

/// Whole tree: root groups and root-level POMs
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeSnapshot {
    pub groups: Vec<TreeNode>,
    pub poms: Vec<PomSummary>,
}

/// One display row of the flattened tree
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeRow {
    pub entry: TreeEntry,
    pub depth: usize,
    pub label: String,
}

#[derive(Debug, Clone, Default)]
pub struct GroupTree {
    groups: HashMap<u32, GroupNode>,
    poms: HashMap<u32, PomSummary>,
    root_groups: Vec<u32>,
    root_poms: Vec<u32>,
}

impl GroupTree {
    /// Build from flat lists. Groups whose parent is missing, or whose stored
    /// parent chain loops, are shown at the root.
    pub fn build(groups: &[Group], poms: &[Pom]) -> Self {
        let mut tree = Self::default();

        for group in groups {
            tree.groups.insert(
                group.id,
                GroupNode { group: group.clone(), children: Vec::new(), poms: Vec::new() },
            );
        }

        for group in groups {
            match group.parent_id {
                Some(pid) if tree.groups.contains_key(&pid) && !tree.chain_loops(group.id) => {
                    if let Some(parent) = tree.groups.get_mut(&pid) {
                        parent.children.push(group.id);
                    }
                }
                Some(pid) => {
                    log::warn!("Group {} has unusable parent {}; showing it at the root", group.id, pid);
                    if let Some(node) = tree.groups.get_mut(&group.id) {
                        node.group.parent_id = None;
                    }
                    tree.root_groups.push(group.id);
                }
                None => tree.root_groups.push(group.id),
            }
        }

        for pom in poms {
            tree.insert_pom(PomSummary::from(pom));
        }

        tree
    }

    /// Whether following parent_id from `id` revisits a group
    fn chain_loops(&self, id: u32) -> bool {
        let mut seen = HashSet::new();
        let mut current = Some(id);
        while let Some(gid) = current {
            if !seen.insert(gid) {
                return true;
            }
            current = self.groups.get(&gid).and_then(|n| n.group.parent_id);
        }
        false
    }

    pub fn group(&self, id: u32) -> Option<&Group> {
        self.groups.get(&id).map(|n| &n.group)
    }

    pub fn pom(&self, id: u32) -> Option<&PomSummary> {
        self.poms.get(&id)
    }

    pub fn contains(&self, entry: TreeEntry) -> bool {
        match entry {
            TreeEntry::Group(id) => self.groups.contains_key(&id),
            TreeEntry::Pom(id) => self.poms.contains_key(&id),
        }
    }

    /// Current parent group of a row (None = root)
    pub fn parent_of(&self, entry: TreeEntry) -> Option<u32> {
        match entry {
            TreeEntry::Group(id) => self.group(id).and_then(|g| g.parent_id),
            TreeEntry::Pom(id) => self.pom(id).and_then(|p| p.group_id),
        }
    }

    pub fn children_of(&self, parent: Option<u32>) -> &[u32] {
        match parent {
            Some(pid) => self.groups.get(&pid).map(|n| n.children.as_slice()).unwrap_or(&[]),
            None => &self.root_groups,
        }
    }

    pub fn poms_of(&self, group: Option<u32>) -> &[u32] {
        match group {
            Some(gid) => self.groups.get(&gid).map(|n| n.poms.as_slice()).unwrap_or(&[]),
            None => &self.root_poms,
        }
    }

    /// Ancestors of a group, nearest first
    pub fn ancestors(&self, id: u32) -> Vec<u32> {
        let mut chain = Vec::new();
        let mut seen = HashSet::from([id]);
        let mut current = self.group(id).and_then(|g| g.parent_id);
        while let Some(gid) = current {
            if !seen.insert(gid) {
                break;
            }
            chain.push(gid);
            current = self.group(gid).and_then(|g| g.parent_id);
        }
        chain
    }

    /// Whether `candidate` lies strictly below `ancestor`
    pub fn is_descendant(&self, candidate: u32, ancestor: u32) -> bool {
        self.ancestors(candidate).contains(&ancestor)
    }

    /// Validate moving group `id` under `new_parent` without changing anything
    pub fn check_reparent(&self, id: u32, new_parent: Option<u32>) -> DomainResult<()> {
        if !self.groups.contains_key(&id) {
            return Err(DomainError::NotFound(format!("Group {} not found", id)));
        }
        let Some(pid) = new_parent else {
            return Ok(());
        };
        if !self.groups.contains_key(&pid) {
            return Err(DomainError::NotFound(format!("Group {} not found", pid)));
        }
        if pid == id {
            return Err(DomainError::InvalidInput(format!(
                "Cannot move group '{}' into itself",
                self.groups[&id].group.name
            )));
        }
        if self.is_descendant(pid, id) {
            return Err(DomainError::InvalidInput(format!(
                "Cannot move group '{}' into its own descendant '{}'",
                self.groups[&id].group.name, self.groups[&pid].group.name
            )));
        }
        Ok(())
    }

    /// Validate filing POM `id` under `group`; only existence matters
    pub fn check_reparent_leaf(&self, id: u32, group: Option<u32>) -> DomainResult<()> {
        if !self.poms.contains_key(&id) {
            return Err(DomainError::NotFound(format!("POM {} not found", id)));
        }
        if let Some(gid) = group {
            if !self.groups.contains_key(&gid) {
                return Err(DomainError::NotFound(format!("Group {} not found", gid)));
            }
        }
        Ok(())
    }

    /// Apply an already validated group move
    pub fn apply_reparent(&mut self, id: u32, new_parent: Option<u32>) {
        let Some(old_parent) = self.groups.get(&id).map(|n| n.group.parent_id) else {
            return;
        };

        match old_parent {
            Some(pid) => {
                if let Some(parent) = self.groups.get_mut(&pid) {
                    parent.children.retain(|&c| c != id);
                }
            }
            None => self.root_groups.retain(|&g| g != id),
        }

        // An unknown parent falls back to the root
        let attached = match new_parent.and_then(|pid| self.groups.get_mut(&pid)) {
            Some(parent) => {
                parent.children.push(id);
                new_parent
            }
            None => {
                self.root_groups.push(id);
                None
            }
        };

        if let Some(node) = self.groups.get_mut(&id) {
            node.group.parent_id = attached;
        }
    }

    /// Apply an already validated POM move
    pub fn apply_reparent_leaf(&mut self, id: u32, group: Option<u32>) {
        let Some(old_group) = self.poms.get(&id).map(|p| p.group_id) else {
            return;
        };

        match old_group.and_then(|gid| self.groups.get_mut(&gid)) {
            Some(node) => node.poms.retain(|&p| p != id),
            None => self.root_poms.retain(|&p| p != id),
        }

        let filed = match group.and_then(|gid| self.groups.get_mut(&gid)) {
            Some(node) => {
                node.poms.push(id);
                group
            }
            None => {
                self.root_poms.push(id);
                None
            }
        };

        if let Some(pom) = self.poms.get_mut(&id) {
            pom.group_id = filed;
        }
    }

    /// Add a freshly created group
    pub fn insert_group(&mut self, group: Group) {
        let id = group.id;
        let parent = group.parent_id.filter(|pid| self.groups.contains_key(pid));
        self.groups.insert(
            id,
            GroupNode {
                group: Group { parent_id: parent, ..group },
                children: Vec::new(),
                poms: Vec::new(),
            },
        );
        match parent.and_then(|pid| self.groups.get_mut(&pid)) {
            Some(node) => node.children.push(id),
            None => self.root_groups.push(id),
        }
    }

    /// Replace the stored record of a group (rename); placement is unchanged
    pub fn update_group(&mut self, group: &Group) {
        if let Some(node) = self.groups.get_mut(&group.id) {
            node.group.name = group.name.clone();
            node.group.updated_at = group.updated_at;
        }
    }

    /// Remove a group; its children and POMs move to the root
    pub fn remove_group(&mut self, id: u32) {
        let Some(node) = self.groups.remove(&id) else {
            return;
        };

        match node.group.parent_id.and_then(|pid| self.groups.get_mut(&pid)) {
            Some(parent) => parent.children.retain(|&c| c != id),
            None => self.root_groups.retain(|&g| g != id),
        }

        for child in node.children {
            if let Some(child_node) = self.groups.get_mut(&child) {
                child_node.group.parent_id = None;
                self.root_groups.push(child);
            }
        }
        for pom in node.poms {
            if let Some(summary) = self.poms.get_mut(&pom) {
                summary.group_id = None;
                self.root_poms.push(pom);
            }
        }
    }

    /// Add a POM leaf, or refresh one and re-file it under its group
    pub fn insert_pom(&mut self, summary: PomSummary) {
        let id = summary.id;
        self.remove_pom(id);

        let group = summary.group_id.filter(|gid| self.groups.contains_key(gid));
        self.poms.insert(id, PomSummary { group_id: group, ..summary });
        match group.and_then(|gid| self.groups.get_mut(&gid)) {
            Some(node) => node.poms.push(id),
            None => self.root_poms.push(id),
        }
    }

    pub fn remove_pom(&mut self, id: u32) {
        let Some(summary) = self.poms.remove(&id) else {
            return;
        };
        match summary.group_id.and_then(|gid| self.groups.get_mut(&gid)) {
            Some(node) => node.poms.retain(|&p| p != id),
            None => self.root_poms.retain(|&p| p != id),
        }
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn pom_count(&self) -> usize {
        self.poms.len()
    }

    /// Nested copy for serialization
    pub fn snapshot(&self) -> TreeSnapshot {
        TreeSnapshot {
            groups: self.root_groups.iter().filter_map(|&id| self.node_view(id)).collect(),
            poms: self.root_poms.iter().filter_map(|id| self.poms.get(id).cloned()).collect(),
        }
    }

    fn node_view(&self, id: u32) -> Option<TreeNode> {
        let node = self.groups.get(&id)?;
        Some(TreeNode {
            group: node.group.clone(),
            children: node.children.iter().filter_map(|&c| self.node_view(c)).collect(),
            poms: node.poms.iter().filter_map(|p| self.poms.get(p).cloned()).collect(),
        })
    }

    /// Display-order rows. Within each level groups come before POMs;
    /// collapsed groups hide their contents.
    pub fn flatten(&self, collapsed: &HashSet<u32>) -> Vec<TreeRow> {
        let mut rows = Vec::with_capacity(self.groups.len() + self.poms.len());
        self.flatten_level(None, 0, collapsed, &mut rows);
        rows
    }

    fn flatten_level(
        &self,
        parent: Option<u32>,
        depth: usize,
        collapsed: &HashSet<u32>,
        rows: &mut Vec<TreeRow>,
    ) {
        for &gid in self.children_of(parent) {
            let Some(node) = self.groups.get(&gid) else {
                continue;
            };
            rows.push(TreeRow {
                entry: TreeEntry::Group(gid),
                depth,
                label: node.group.name.clone(),
            });
            if !collapsed.contains(&gid) {
                self.flatten_level(Some(gid), depth + 1, collapsed, rows);
            }
        }
        for pid in self.poms_of(parent) {
            if let Some(pom) = self.poms.get(pid) {
                rows.push(TreeRow {
                    entry: TreeEntry::Pom(pom.id),
                    depth,
                    label: pom.name.clone(),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> GroupTree {
        // 1 Root
        //   2 Child
        //     3 Grandchild
        // 4 Other
        let groups = vec![
            Group::new(1, "Root".to_string()),
            Group::new_child(2, "Child".to_string(), 1),
            Group::new_child(3, "Grandchild".to_string(), 2),
            Group::new(4, "Other".to_string()),
        ];
        let mut login = Pom::new(10, "Login".to_string());
        login.group_id = Some(2);
        let loose = Pom::new(11, "Loose".to_string());
        GroupTree::build(&groups, &[login, loose])
    }

    fn ids(rows: &[TreeRow]) -> Vec<TreeEntry> {
        rows.iter().map(|r| r.entry).collect()
    }

    #[test]
    fn test_build_places_nodes() {
        let tree = sample();
        assert_eq!(tree.children_of(None), &[1, 4]);
        assert_eq!(tree.children_of(Some(1)), &[2]);
        assert_eq!(tree.poms_of(Some(2)), &[10]);
        assert_eq!(tree.poms_of(None), &[11]);
        assert_eq!(tree.ancestors(3), vec![2, 1]);
    }

    #[test]
    fn test_build_recovers_from_stored_cycle_and_orphans() {
        let groups = vec![
            Group::new_child(1, "A".to_string(), 2),
            Group::new_child(2, "B".to_string(), 1),
            Group::new_child(3, "Orphan".to_string(), 99),
        ];
        let tree = GroupTree::build(&groups, &[]);
        for id in [1, 2, 3] {
            assert!(tree.group(id).is_some());
        }
        assert!(tree.children_of(None).contains(&3));
        // Every group is reachable from the root rows
        let rows = tree.flatten(&HashSet::new());
        assert_eq!(rows.len(), 3);
    }

    #[test]
    fn test_reject_move_into_self() {
        let tree = sample();
        let err = tree.check_reparent(1, Some(1)).unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn test_reject_move_into_descendant() {
        let tree = sample();
        assert!(matches!(tree.check_reparent(1, Some(3)), Err(DomainError::InvalidInput(_))));
        assert!(matches!(tree.check_reparent(2, Some(3)), Err(DomainError::InvalidInput(_))));
        assert!(tree.check_reparent(3, Some(1)).is_ok());
        assert!(tree.check_reparent(3, None).is_ok());
    }

    #[test]
    fn test_missing_ids_are_not_found() {
        let tree = sample();
        assert!(matches!(tree.check_reparent(42, None), Err(DomainError::NotFound(_))));
        assert!(matches!(tree.check_reparent(1, Some(42)), Err(DomainError::NotFound(_))));
        assert!(matches!(tree.check_reparent_leaf(42, None), Err(DomainError::NotFound(_))));
        assert!(matches!(tree.check_reparent_leaf(10, Some(42)), Err(DomainError::NotFound(_))));
        assert!(tree.check_reparent_leaf(10, None).is_ok());
    }

    #[test]
    fn test_apply_reparent_keeps_other_subtrees() {
        let mut tree = sample();
        tree.apply_reparent(2, Some(4));

        assert!(tree.children_of(Some(1)).is_empty());
        assert_eq!(tree.children_of(Some(4)), &[2]);
        // The moved subtree travels intact
        assert_eq!(tree.children_of(Some(2)), &[3]);
        assert_eq!(tree.poms_of(Some(2)), &[10]);
        assert_eq!(tree.ancestors(3), vec![2, 4]);
        assert_eq!(tree.group(2).and_then(|g| g.parent_id), Some(4));
    }

    #[test]
    fn test_apply_reparent_to_and_from_root() {
        let mut tree = sample();
        tree.apply_reparent(3, None);
        assert_eq!(tree.children_of(None), &[1, 4, 3]);
        assert!(tree.group(3).is_some_and(|g| g.is_root()));

        tree.apply_reparent(1, Some(3));
        assert_eq!(tree.children_of(None), &[4, 3]);
        assert_eq!(tree.ancestors(2), vec![1, 3]);
    }

    #[test]
    fn test_apply_reparent_leaf() {
        let mut tree = sample();
        tree.apply_reparent_leaf(11, Some(1));
        assert!(tree.poms_of(None).is_empty());
        assert_eq!(tree.poms_of(Some(1)), &[11]);

        tree.apply_reparent_leaf(10, None);
        assert!(tree.poms_of(Some(2)).is_empty());
        assert_eq!(tree.pom(10).and_then(|p| p.group_id), None);
    }

    #[test]
    fn test_remove_group_moves_contents_to_root() {
        let mut tree = sample();
        tree.remove_group(2);

        assert!(tree.group(2).is_none());
        assert!(tree.children_of(Some(1)).is_empty());
        assert!(tree.children_of(None).contains(&3));
        assert!(tree.poms_of(None).contains(&10));
        assert_eq!(tree.pom(10).and_then(|p| p.group_id), None);
    }

    #[test]
    fn test_insert_and_refresh_pom() {
        let mut tree = sample();
        let mut pom = Pom::new(12, "Search".to_string());
        pom.group_id = Some(4);
        tree.insert_pom(PomSummary::from(&pom));
        assert_eq!(tree.poms_of(Some(4)), &[12]);

        pom.name = "Search v2".to_string();
        pom.group_id = Some(1);
        tree.insert_pom(PomSummary::from(&pom));
        assert!(tree.poms_of(Some(4)).is_empty());
        assert_eq!(tree.pom(12).map(|p| p.name.as_str()), Some("Search v2"));
        assert_eq!(tree.pom_count(), 3);

        tree.remove_pom(12);
        assert!(tree.poms_of(Some(1)).is_empty());
    }

    #[test]
    fn test_flatten_orders_and_collapses() {
        let tree = sample();
        let rows = tree.flatten(&HashSet::new());
        assert_eq!(
            ids(&rows),
            vec![
                TreeEntry::Group(1),
                TreeEntry::Group(2),
                TreeEntry::Group(3),
                TreeEntry::Pom(10),
                TreeEntry::Group(4),
                TreeEntry::Pom(11),
            ]
        );
        assert_eq!(rows[2].depth, 2);
        assert_eq!(rows[3].depth, 2);

        let collapsed = tree.flatten(&HashSet::from([2]));
        assert_eq!(
            ids(&collapsed),
            vec![TreeEntry::Group(1), TreeEntry::Group(2), TreeEntry::Group(4), TreeEntry::Pom(11)]
        );
    }

    #[test]
    fn test_snapshot_nests() {
        let tree = sample();
        let snapshot = tree.snapshot();
        assert_eq!(snapshot.groups.len(), 2);
        assert_eq!(snapshot.groups[0].children[0].poms[0].name, "Login");
        assert_eq!(snapshot.poms.len(), 1);

        let json = serde_json::to_value(TreeEntry::Pom(3)).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "pom", "id": 3}));
    }
}
