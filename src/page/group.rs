use std::fmt;

use tracing::debug;

use super::PageSession;
use super::geometry::{Rect, bounding_rect};
use super::region::RegionId;
use crate::lstmbox::FILLER;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(pub(crate) u32);

impl GroupId {
    pub fn number(self) -> u32 {
        self.0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "G{}", self.0)
    }
}

/// Ordered Box members plus their cached bounding rectangle.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub(crate) id: GroupId,
    pub(crate) members: Vec<RegionId>,
    pub(crate) bounds: Rect,
}

impl Group {
    pub fn id(&self) -> GroupId {
        self.id
    }

    pub fn number(&self) -> u32 {
        self.id.0
    }

    pub fn members(&self) -> &[RegionId] {
        &self.members
    }

    pub fn contains(&self, id: RegionId) -> bool {
        self.members.contains(&id)
    }

    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    pub fn header(&self) -> String {
        format!("[[{}]]", self.id)
    }
}

impl PageSession {
    /// Groups two or more boxes, ordered by page position. Members leave
    /// their previous groups first.
    pub fn group_regions(&mut self, ids: &[RegionId]) -> Option<GroupId> {
        let mut members = Vec::new();
        for id in ids {
            if members.contains(id) {
                continue;
            }
            if self.regions.get(id).map(|r| r.is_box()).unwrap_or(false) {
                members.push(*id);
            }
        }
        if members.len() < 2 {
            return None;
        }
        members.sort_by_key(|id| self.page_index(*id).unwrap_or(usize::MAX));
        for id in &members {
            self.detach(*id);
        }
        let group = self.allocate_group();
        for id in &members {
            if let Some(region) = self.regions.get_mut(id) {
                region.group = Some(group);
            }
        }
        self.groups.insert(
            group,
            Group {
                id: group,
                members,
                bounds: Rect::default(),
            },
        );
        self.refresh_bounds(group);
        debug!("created {}", group);
        Some(group)
    }

    /// Removes the given boxes from their groups, disbanding emptied groups.
    pub fn ungroup(&mut self, ids: &[RegionId]) -> usize {
        ids.iter().filter(|id| self.detach(**id)).count()
    }

    /// Recomputes the bounds of every group touched by `ids`.
    pub fn refresh_group_bounds(&mut self, ids: &[RegionId]) {
        let mut touched = ids
            .iter()
            .filter_map(|id| self.regions.get(id).and_then(|r| r.group))
            .collect::<Vec<_>>();
        touched.sort();
        touched.dedup();
        for group in touched {
            self.refresh_bounds(group);
        }
    }

    pub fn refresh_all_group_bounds(&mut self) {
        let ids = self.groups.keys().copied().collect::<Vec<_>>();
        for group in ids {
            self.refresh_bounds(group);
        }
    }

    /// Non-filler member texts joined by `separator`.
    pub fn collate(&self, group: GroupId, separator: &str) -> Option<String> {
        let group = self.groups.get(&group)?;
        let texts = group
            .members
            .iter()
            .filter_map(|id| self.regions.get(id))
            .map(|region| region.text.as_str())
            .filter(|text| *text != FILLER)
            .collect::<Vec<_>>();
        Some(texts.join(separator))
    }

    /// Every group's collation in group-number order, one paragraph each.
    pub fn collate_all(&self, separator: &str) -> String {
        self.groups
            .keys()
            .filter_map(|group| self.collate(*group, separator))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    pub(crate) fn allocate_group(&mut self) -> GroupId {
        let group = GroupId(self.next_group);
        self.next_group += 1;
        group
    }

    /// Takes `id` out of its group; an emptied group is disbanded.
    pub(crate) fn detach(&mut self, id: RegionId) -> bool {
        let Some(group) = self.regions.get_mut(&id).and_then(|r| r.group.take()) else {
            return false;
        };
        let emptied = match self.groups.get_mut(&group) {
            Some(entry) => {
                entry.members.retain(|member| *member != id);
                entry.members.is_empty()
            }
            None => false,
        };
        if emptied {
            self.groups.remove(&group);
            debug!("disbanded {}", group);
        } else {
            self.refresh_bounds(group);
        }
        true
    }

    pub(crate) fn refresh_bounds(&mut self, group: GroupId) {
        let Some(entry) = self.groups.get(&group) else {
            return;
        };
        let rects = entry
            .members
            .iter()
            .filter_map(|id| self.regions.get(id))
            .map(|region| region.rect)
            .collect::<Vec<_>>();
        let bounds = bounding_rect(&rects).unwrap_or_default();
        if let Some(entry) = self.groups.get_mut(&group) {
            entry.bounds = bounds;
        }
    }
}
