use std::collections::HashMap;

use tracing::debug;

use super::geometry::Rect;
use super::group::{Group, GroupId};
use super::region::RegionId;
use super::PageSession;
use crate::font::TextMeasure;
use crate::lstmbox::{FILLER, Orientation, Segment};
use crate::settings::Settings;
use crate::width;

/// Resizes a box around its text along the reading direction.
#[derive(Clone, Copy)]
pub struct TextFit<'a> {
    measure: &'a dyn TextMeasure,
    orientation: Orientation,
    point_size: f32,
    length_bias: f64,
    full_width: bool,
}

impl<'a> TextFit<'a> {
    pub fn new(
        measure: &'a dyn TextMeasure,
        orientation: Orientation,
        point_size: f32,
        length_bias: f64,
        full_width: bool,
    ) -> Self {
        Self {
            measure,
            orientation,
            point_size,
            length_bias,
            full_width,
        }
    }

    pub fn from_settings(settings: &Settings, measure: &'a dyn TextMeasure) -> Self {
        Self::new(
            measure,
            Orientation::from_vertical(settings.vertical),
            settings.point_size,
            settings.length_bias,
            settings.full_width,
        )
    }

    pub fn normalize(&self, text: &str) -> String {
        width::normalize(text, self.full_width)
    }

    /// Keeps the width (vertical) or height (horizontal) and derives the
    /// other side from the text's aspect ratio.
    pub fn fit_rect(&self, text: &str, rect: Rect) -> Rect {
        let aspect =
            self.measure.text_aspect_ratio(text, self.point_size) as f64 * self.length_bias;
        match self.orientation {
            Orientation::Vertical => rect.with_size(rect.w, aspect * rect.w),
            Orientation::Horizontal => rect.with_size(aspect * rect.h, rect.h),
        }
    }
}

/// How imported segments are sized.
#[derive(Clone, Copy)]
pub enum Fit<'a> {
    /// Geometry and text verbatim, for saved layouts.
    Exact,
    /// Boxes refitted to their text and text width-normalized, for fresh
    /// recognizer output.
    Text(TextFit<'a>),
}

impl PageSession {
    /// Adds one box per segment, in segment order, and rebuilds groups from
    /// non-zero tags. Boxes with a suspicious aspect ratio are flagged.
    pub fn import_segments(
        &mut self,
        segments: impl IntoIterator<Item = Segment>,
        fit: Fit<'_>,
        suspicious_aspect_ratio: f64,
    ) -> Vec<RegionId> {
        let mut tag_groups: HashMap<u32, GroupId> = HashMap::new();
        let mut imported = Vec::new();
        for segment in segments {
            let coords = &segment.coords;
            let (w, h) = (coords.width() as f64, coords.height() as f64);
            let segment_rect = Rect::new(
                coords.left as f64,
                self.image_height - coords.top as f64,
                w,
                h,
            );
            let is_filler = segment.text == FILLER;
            let (rect, text) = match fit {
                Fit::Exact => (segment_rect, segment.text.clone()),
                Fit::Text(fit) => {
                    let rect = if is_filler {
                        segment_rect
                    } else {
                        fit.fit_rect(&segment.text, segment_rect)
                    };
                    (rect, fit.normalize(&segment.text))
                }
            };

            let id = self.add_box(rect, &text);
            let orientation = self.orientation;
            if let Some(region) = self.regions.get_mut(&id) {
                region.actual_w = w;
                region.actual_h = h;
                if !is_filler && region.aspect_ratio(orientation) < suspicious_aspect_ratio {
                    region.flagged = true;
                }
            }

            if segment.group_tag != 0 {
                let group = match tag_groups.get(&segment.group_tag) {
                    Some(group) => *group,
                    None => {
                        let group = self.claim_group(segment.group_tag);
                        tag_groups.insert(segment.group_tag, group);
                        group
                    }
                };
                self.join_group(id, group);
            }
            imported.push(id);
        }
        debug!(
            "imported {} segment(s) into {} group(s)",
            imported.len(),
            tag_groups.len()
        );
        imported
    }

    /// The tag's own number while the counter has not passed it, otherwise
    /// a fresh one.
    fn claim_group(&mut self, tag: u32) -> GroupId {
        if tag >= self.next_group {
            self.next_group = tag.saturating_add(1);
            GroupId(tag)
        } else {
            self.allocate_group()
        }
    }

    fn join_group(&mut self, id: RegionId, group: GroupId) {
        let entry = self.groups.entry(group).or_insert_with(|| Group {
            id: group,
            members: Vec::new(),
            bounds: Rect::default(),
        });
        entry.members.push(id);
        if let Some(region) = self.regions.get_mut(&id) {
            region.group = Some(group);
        }
        self.refresh_bounds(group);
    }
}
