use crate::lstmbox::read_segments;
use crate::page::{Fit, PageSession, Rect, RegionId};

/// Box layout text: grouped boxes first (group-number order, member order),
/// then ungrouped boxes in page order. One line per character, no trailing
/// newline.
pub fn export_box(session: &PageSession) -> String {
    let height = session.image_height();
    let mut lines = Vec::new();
    for group in session.groups() {
        for region in group.members().iter().filter_map(|id| session.region(*id)) {
            push_region_lines(&mut lines, region.text(), region.rect(), height, group.number());
        }
    }
    for region in session.boxes().filter(|region| region.group().is_none()) {
        push_region_lines(&mut lines, region.text(), region.rect(), height, 0);
    }
    lines.join("\n")
}

/// Parses box text in the session's orientation and adds its segments.
pub fn import_box(
    session: &mut PageSession,
    input: &str,
    fit: Fit<'_>,
    suspicious_aspect_ratio: f64,
) -> Vec<RegionId> {
    let segments = read_segments(input, session.orientation()).into_segments();
    session.import_segments(segments, fit, suspicious_aspect_ratio)
}

/// `left bottom right top` in image space, rounded half to even.
pub fn box_coordinates(rect: Rect, image_height: f64) -> [i64; 4] {
    let top = image_height - rect.y;
    [rect.x, top - rect.h, rect.x + rect.w, top].map(round_half_even)
}

pub(crate) fn round_half_even(value: f64) -> i64 {
    value.round_ties_even() as i64
}

fn push_region_lines(lines: &mut Vec<String>, text: &str, rect: Rect, height: f64, tag: u32) {
    let [left, bottom, right, top] = box_coordinates(rect, height);
    for ch in text.chars().filter(|ch| *ch != '\n') {
        lines.push(format!("{} {} {} {} {} {}", ch, left, bottom, right, top, tag));
    }
}
