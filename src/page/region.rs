use std::fmt;

use super::geometry::Rect;
use super::group::GroupId;
use super::OverlayKind;
use crate::lstmbox::{FILLER, Orientation};

/// Session-scoped handle; never reused within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegionId(pub(crate) u64);

impl RegionId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R{}", self.0)
    }
}

/// Free text drawn inside an ellipse region.
#[derive(Debug, Clone, PartialEq)]
pub struct EllipseLabel {
    pub display_text: String,
    pub font_size: u32,
    pub font_family: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RegionKind {
    Box,
    Ellipse(EllipseLabel),
}

#[derive(Debug, Clone)]
pub struct Region {
    pub(crate) id: RegionId,
    pub(crate) kind: RegionKind,
    pub(crate) rect: Rect,
    pub(crate) orig_rect: Rect,
    pub(crate) actual_w: f64,
    pub(crate) actual_h: f64,
    pub(crate) text: String,
    pub(crate) orig_text: String,
    pub(crate) flagged: bool,
    pub(crate) group: Option<GroupId>,
    pub(crate) hidden: bool,
}

impl Region {
    pub(crate) fn new(id: RegionId, kind: RegionKind, rect: Rect, text: String) -> Self {
        Self {
            id,
            kind,
            rect,
            orig_rect: rect,
            actual_w: rect.w,
            actual_h: rect.h,
            orig_text: text.clone(),
            text,
            flagged: false,
            group: None,
            hidden: false,
        }
    }

    pub fn id(&self) -> RegionId {
        self.id
    }

    pub fn kind(&self) -> &RegionKind {
        &self.kind
    }

    pub fn is_box(&self) -> bool {
        matches!(self.kind, RegionKind::Box)
    }

    pub fn is_ellipse(&self) -> bool {
        matches!(self.kind, RegionKind::Ellipse(_))
    }

    pub fn label(&self) -> Option<&EllipseLabel> {
        match &self.kind {
            RegionKind::Ellipse(label) => Some(label),
            RegionKind::Box => None,
        }
    }

    pub fn rect(&self) -> Rect {
        self.rect
    }

    pub fn orig_rect(&self) -> Rect {
        self.orig_rect
    }

    /// Geometry recorded at creation.
    pub fn actual_size(&self) -> (f64, f64) {
        (self.actual_w, self.actual_h)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn orig_text(&self) -> &str {
        &self.orig_text
    }

    pub fn is_filler(&self) -> bool {
        self.text == FILLER
    }

    pub fn is_flagged(&self) -> bool {
        self.flagged
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn group(&self) -> Option<GroupId> {
        self.group
    }

    /// Extent along the reading direction over the extent across it, from
    /// the creation geometry.
    pub fn aspect_ratio(&self, orientation: Orientation) -> f64 {
        let (along, across) = match orientation {
            Orientation::Vertical => (self.actual_h, self.actual_w),
            Orientation::Horizontal => (self.actual_w, self.actual_h),
        };
        if across == 0.0 { 0.0 } else { along / across }
    }

    pub fn overlay_kind(&self, selected: bool) -> OverlayKind {
        if selected {
            return OverlayKind::Selected;
        }
        if self.is_filler() {
            return match self.kind {
                RegionKind::Box => OverlayKind::Filler,
                RegionKind::Ellipse(_) => OverlayKind::Label,
            };
        }
        if self.flagged {
            OverlayKind::Flagged
        } else {
            OverlayKind::Text
        }
    }
}
