use super::group::GroupId;
use super::reconcile::DropTarget;
use super::region::{Region, RegionId};
use super::{OverlayKind, PageSession};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    Box(RegionId),
    Ellipse(RegionId),
    GroupHeader(GroupId),
}

/// One row of the region tree view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub kind: ItemKind,
    pub depth: usize,
    pub text: String,
    /// `None` for group headers, which use the group brush.
    pub overlay: Option<OverlayKind>,
}

impl TreeEntry {
    pub fn drop_target(&self) -> DropTarget {
        match self.kind {
            ItemKind::Box(id) | ItemKind::Ellipse(id) => DropTarget::Region(id),
            ItemKind::GroupHeader(group) => DropTarget::Group(group),
        }
    }

    fn region(region: &Region, depth: usize) -> Self {
        let (kind, text) = match region.label() {
            Some(label) => (
                ItemKind::Ellipse(region.id()),
                label.display_text.replace('\n', " "),
            ),
            None => (ItemKind::Box(region.id()), region.text().to_string()),
        };
        Self {
            kind,
            depth,
            text,
            overlay: Some(region.overlay_kind(false)),
        }
    }
}

impl PageSession {
    /// Group headers with their members in group-number order, then
    /// ungrouped boxes in page order, then ellipses.
    pub fn tree(&self) -> Vec<TreeEntry> {
        let mut entries = Vec::new();
        for group in self.groups.values() {
            entries.push(TreeEntry {
                kind: ItemKind::GroupHeader(group.id),
                depth: 0,
                text: group.header(),
                overlay: None,
            });
            for region in group.members.iter().filter_map(|id| self.regions.get(id)) {
                entries.push(TreeEntry::region(region, 1));
            }
        }
        for region in self.boxes().filter(|region| region.group.is_none()) {
            entries.push(TreeEntry::region(region, 0));
        }
        for region in self.ellipses() {
            entries.push(TreeEntry::region(region, 0));
        }
        entries
    }

    pub fn render_tree(&self) -> String {
        self.tree()
            .iter()
            .map(|entry| format!("{}{}", "  ".repeat(entry.depth), entry.text))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lstmbox::FILLER;
    use crate::page::{EllipseLabel, Rect};
    use crate::test_util::session_with_boxes;

    #[test]
    fn renders_groups_then_loose_boxes() {
        let (mut session, ids) = session_with_boxes(&["あい", "うえ", FILLER, "お", "か"]);
        session.group_regions(&[ids[3], ids[1]]).expect("group");
        session.group_regions(&[ids[0], ids[4]]).expect("group");
        session.add_ellipse(
            Rect::new(0.0, 0.0, 50.0, 50.0),
            EllipseLabel {
                display_text: "WHAT\nTHE".to_string(),
                font_size: 25,
                font_family: "Wild Words".to_string(),
            },
        );
        insta::assert_snapshot!(session.render_tree(), @r"
        [[G1]]
          うえ
          お
        [[G2]]
          あい
          か
        ␟
        WHAT THE
        ");
    }

    #[test]
    fn entries_map_to_drop_targets() {
        let (mut session, ids) = session_with_boxes(&["a", "b", "c"]);
        let group = session.group_regions(&[ids[0], ids[1]]).expect("group");
        session.set_flag(&[ids[2]], true);
        let tree = session.tree();
        assert_eq!(tree[0].drop_target(), DropTarget::Group(group));
        assert_eq!(tree[1].drop_target(), DropTarget::Region(ids[0]));
        assert_eq!(tree[3].overlay, Some(OverlayKind::Flagged));
        assert_eq!(tree[0].overlay, None);

        assert!(session.relocate(ids[2], tree[0].drop_target()));
        let tree = session.tree();
        assert_eq!(tree.len(), 4);
        assert_eq!(tree[1].kind, ItemKind::Box(ids[2]));
    }
}
