//! Drag-and-drop relocation of a box within the region tree, keeping the
//! page list and group member lists in agreement.

use tracing::debug;

use super::PageSession;
use super::group::GroupId;
use super::region::RegionId;

/// Where a dragged box was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropTarget {
    Region(RegionId),
    Group(GroupId),
    Root,
}

/// Moves `source` to the current position of `dest`. When `dest` is not in
/// the list, `source` stays where it was, or is appended if it was absent.
pub fn insert_before<T: PartialEq + Copy>(list: &mut Vec<T>, dest: T, source: T) {
    if dest == source {
        return;
    }
    let previous = list.iter().position(|item| *item == source);
    if let Some(index) = previous {
        list.remove(index);
    }
    match list.iter().position(|item| *item == dest) {
        Some(index) => list.insert(index, source),
        None => match previous {
            Some(index) => list.insert(index, source),
            None => list.push(source),
        },
    }
}

impl PageSession {
    /// Relocates a box onto a drop target. Illegal moves are ignored;
    /// returns whether the page list or any group changed.
    pub fn relocate(&mut self, source: RegionId, target: DropTarget) -> bool {
        if !self.regions.get(&source).map(|r| r.is_box()).unwrap_or(false) {
            return false;
        }
        let before = self.layout_snapshot();
        match target {
            DropTarget::Region(dest) => {
                if dest == source {
                    return false;
                }
                let Some(dest) = self.regions.get(&dest).filter(|r| r.is_box()) else {
                    return false;
                };
                let (dest, dest_group) = (dest.id, dest.group);
                match dest_group {
                    Some(group) => self.drop_into_member(source, dest, group),
                    None => {
                        self.detach(source);
                        insert_before(&mut self.page_list, dest, source);
                    }
                }
            }
            DropTarget::Group(group) => {
                if !self.groups.contains_key(&group) {
                    return false;
                }
                self.drop_on_header(source, group);
            }
            DropTarget::Root => {
                self.detach(source);
            }
        }
        let changed = self.layout_snapshot() != before;
        if changed {
            debug!("relocated {} onto {:?}", source, target);
        }
        changed
    }

    fn drop_into_member(&mut self, source: RegionId, dest: RegionId, group: GroupId) {
        let source_group = self.regions.get(&source).and_then(|r| r.group);
        if source_group != Some(group) {
            self.detach(source);
            if let Some(region) = self.regions.get_mut(&source) {
                region.group = Some(group);
            }
        }
        insert_before(&mut self.page_list, dest, source);
        if let Some(entry) = self.groups.get_mut(&group) {
            insert_before(&mut entry.members, dest, source);
        }
        self.refresh_bounds(group);
    }

    fn drop_on_header(&mut self, source: RegionId, group: GroupId) {
        let source_group = self.regions.get(&source).and_then(|r| r.group);
        if source_group == Some(group) {
            if let Some(entry) = self.groups.get_mut(&group) {
                entry.members.retain(|member| *member != source);
            }
        } else {
            self.detach(source);
        }
        let first_remaining = self
            .groups
            .get(&group)
            .and_then(|entry| entry.members.first().copied());
        if let Some(entry) = self.groups.get_mut(&group) {
            entry.members.insert(0, source);
        }
        if let Some(region) = self.regions.get_mut(&source) {
            region.group = Some(group);
        }
        if let Some(first) = first_remaining {
            insert_before(&mut self.page_list, first, source);
        }
        self.refresh_bounds(group);
    }

    fn layout_snapshot(&self) -> (Vec<RegionId>, Vec<(GroupId, Vec<RegionId>)>) {
        (
            self.page_list.clone(),
            self.groups
                .iter()
                .map(|(id, group)| (*id, group.members.clone()))
                .collect(),
        )
    }
}
