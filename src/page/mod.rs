//! Region model for one page: boxes and ellipses, the canonical page list
//! of boxes, and the numbered group registry.

mod geometry;
mod group;
mod populate;
mod reconcile;
mod region;
mod tree;

use indexmap::IndexMap;
use std::collections::BTreeMap;
use tracing::debug;

use crate::lstmbox::Orientation;

pub use geometry::{Rect, bounding_rect};
pub use group::{Group, GroupId};
pub use populate::{Fit, TextFit};
pub use reconcile::{DropTarget, insert_before};
pub use region::{EllipseLabel, Region, RegionId, RegionKind};
pub use tree::{ItemKind, TreeEntry};

/// Brush category a region is drawn with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayKind {
    Selected,
    Filler,
    Label,
    Flagged,
    Text,
}

#[derive(Debug, Clone)]
pub struct PageSession {
    image_width: f64,
    image_height: f64,
    orientation: Orientation,
    regions: IndexMap<RegionId, Region>,
    page_list: Vec<RegionId>,
    groups: BTreeMap<GroupId, Group>,
    next_region: u64,
    next_group: u32,
}

impl PageSession {
    pub fn new(image_width: u32, image_height: u32, orientation: Orientation) -> Self {
        Self {
            image_width: image_width as f64,
            image_height: image_height as f64,
            orientation,
            regions: IndexMap::new(),
            page_list: Vec::new(),
            groups: BTreeMap::new(),
            next_region: 1,
            next_group: 1,
        }
    }

    pub fn image_width(&self) -> f64 {
        self.image_width
    }

    pub fn image_height(&self) -> f64 {
        self.image_height
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn region(&self, id: RegionId) -> Option<&Region> {
        self.regions.get(&id)
    }

    /// All regions in creation order.
    pub fn regions(&self) -> impl Iterator<Item = &Region> {
        self.regions.values()
    }

    pub fn page_list(&self) -> &[RegionId] {
        &self.page_list
    }

    pub fn page_index(&self, id: RegionId) -> Option<usize> {
        self.page_list.iter().position(|entry| *entry == id)
    }

    /// Boxes in page-list order.
    pub fn boxes(&self) -> impl Iterator<Item = &Region> {
        self.page_list.iter().filter_map(|id| self.regions.get(id))
    }

    /// Ellipses in creation order.
    pub fn ellipses(&self) -> impl Iterator<Item = &Region> {
        self.regions.values().filter(|region| region.is_ellipse())
    }

    /// Groups in number order.
    pub fn groups(&self) -> impl Iterator<Item = &Group> {
        self.groups.values()
    }

    pub fn group(&self, id: GroupId) -> Option<&Group> {
        self.groups.get(&id)
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn add_box(&mut self, rect: Rect, text: &str) -> RegionId {
        let id = self.insert_region(RegionKind::Box, rect, text.to_string());
        self.page_list.push(id);
        id
    }

    /// Ellipse text stays the filler; the label carries what is drawn.
    pub fn add_ellipse(&mut self, rect: Rect, label: EllipseLabel) -> RegionId {
        self.insert_region(
            RegionKind::Ellipse(label),
            rect,
            crate::lstmbox::FILLER.to_string(),
        )
    }

    pub fn remove(&mut self, ids: &[RegionId]) -> usize {
        let mut removed = 0;
        for id in ids {
            if !self.regions.contains_key(id) {
                continue;
            }
            self.detach(*id);
            self.page_list.retain(|entry| entry != id);
            self.regions.shift_remove(id);
            removed += 1;
        }
        if removed > 0 {
            debug!("removed {} region(s)", removed);
        }
        removed
    }

    pub fn remove_flagged(&mut self) -> usize {
        let flagged = self
            .regions
            .values()
            .filter(|region| region.flagged)
            .map(|region| region.id)
            .collect::<Vec<_>>();
        self.remove(&flagged)
    }

    /// Moves regions back to where they were created; boxes also get their
    /// original text back, refitted.
    pub fn restore(&mut self, ids: &[RegionId], fit: &TextFit<'_>) -> usize {
        let mut restored = 0;
        for id in ids {
            let Some(region) = self.regions.get_mut(id) else {
                continue;
            };
            region.rect.x = region.orig_rect.x;
            region.rect.y = region.orig_rect.y;
            if region.is_box() {
                let orig_text = region.orig_text.clone();
                self.apply_text(*id, &orig_text, fit);
            }
            restored += 1;
        }
        self.refresh_group_bounds(ids);
        restored
    }

    /// Only boxes carry a user-set flag.
    pub fn set_flag(&mut self, ids: &[RegionId], flagged: bool) -> usize {
        let mut changed = 0;
        for id in ids {
            if let Some(region) = self.regions.get_mut(id) {
                if region.is_box() {
                    region.flagged = flagged;
                    changed += 1;
                }
            }
        }
        changed
    }

    /// Replaces a region's text, normalizing width and refitting its size.
    pub fn set_text(&mut self, id: RegionId, text: &str, fit: &TextFit<'_>) -> bool {
        if !self.regions.contains_key(&id) {
            return false;
        }
        self.apply_text(id, text, fit);
        self.refresh_group_bounds(&[id]);
        true
    }

    /// Replaces the rectangle outright.
    pub fn set_bounds(&mut self, id: RegionId, rect: Rect) -> bool {
        let Some(region) = self.regions.get_mut(&id) else {
            return false;
        };
        region.rect = rect;
        self.refresh_group_bounds(&[id]);
        true
    }

    pub fn resize(&mut self, id: RegionId, w: f64, h: f64) -> bool {
        let Some(region) = self.regions.get_mut(&id) else {
            return false;
        };
        region.rect = region.rect.with_size(w, h);
        self.refresh_group_bounds(&[id]);
        true
    }

    /// Multiplies width and height by `factor`, keeping the top-left corner.
    pub fn scale(&mut self, ids: &[RegionId], factor: f64) -> usize {
        let mut changed = 0;
        for id in ids {
            if let Some(region) = self.regions.get_mut(id) {
                region.rect = region.rect.scaled(factor);
                changed += 1;
            }
        }
        self.refresh_group_bounds(ids);
        changed
    }

    pub fn displace(&mut self, ids: &[RegionId], dx: f64, dy: f64) -> usize {
        let mut changed = 0;
        for id in ids {
            if let Some(region) = self.regions.get_mut(id) {
                region.rect = region.rect.translated(dx, dy);
                changed += 1;
            }
        }
        self.refresh_group_bounds(ids);
        changed
    }

    pub fn set_hidden(&mut self, ids: &[RegionId], hidden: bool) -> usize {
        let mut changed = 0;
        for id in ids {
            if let Some(region) = self.regions.get_mut(id) {
                region.hidden = hidden;
                changed += 1;
            }
        }
        changed
    }

    pub fn unhide_all(&mut self) {
        for region in self.regions.values_mut() {
            region.hidden = false;
        }
    }

    pub fn set_label_text(&mut self, id: RegionId, display_text: &str) -> bool {
        self.with_label(id, |label| label.display_text = display_text.to_string())
    }

    /// Font sizes are stored as magnitudes.
    pub fn set_label_font_size(&mut self, id: RegionId, font_size: i64) -> bool {
        if font_size == 0 {
            return false;
        }
        let size = u32::try_from(font_size.unsigned_abs()).unwrap_or(u32::MAX);
        self.with_label(id, |label| label.font_size = size)
    }

    pub fn set_label_font_family(&mut self, id: RegionId, family: &str) -> bool {
        if family.trim().is_empty() {
            return false;
        }
        self.with_label(id, |label| label.font_family = family.to_string())
    }

    pub fn capitalize_label(&mut self, id: RegionId) -> bool {
        self.with_label(id, |label| label.display_text = label.display_text.to_uppercase())
    }

    /// Mean current width and height over all boxes.
    pub fn average_box_size(&self) -> (f64, f64) {
        let count = self.page_list.len();
        if count == 0 {
            return (0.0, 0.0);
        }
        let (w, h) = self
            .boxes()
            .fold((0.0, 0.0), |(w, h), region| (w + region.rect.w, h + region.rect.h));
        (w / count as f64, h / count as f64)
    }

    fn insert_region(&mut self, kind: RegionKind, rect: Rect, text: String) -> RegionId {
        let id = RegionId(self.next_region);
        self.next_region += 1;
        self.regions.insert(id, region::Region::new(id, kind, rect, text));
        id
    }

    fn with_label(&mut self, id: RegionId, edit: impl FnOnce(&mut EllipseLabel)) -> bool {
        match self.regions.get_mut(&id).map(|region| &mut region.kind) {
            Some(RegionKind::Ellipse(label)) => {
                edit(label);
                true
            }
            _ => false,
        }
    }

    fn apply_text(&mut self, id: RegionId, text: &str, fit: &TextFit<'_>) {
        let Some(region) = self.regions.get_mut(&id) else {
            return;
        };
        let text = fit.normalize(text);
        if text != crate::lstmbox::FILLER {
            region.rect = fit.fit_rect(&text, region.rect);
        }
        region.text = text;
    }
}
