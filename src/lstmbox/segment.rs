use indexmap::IndexMap;

use super::{BoxCoords, CharacterBox, FILLER};

/// Grouping key: the four coordinates, group tag excluded.
pub type SegmentKey = BoxCoords;

/// Characters sharing one coordinate tuple, in read order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub text: String,
    pub coords: BoxCoords,
    pub group_tag: u32,
}

impl Segment {
    pub fn is_filler(&self) -> bool {
        self.text == FILLER
    }
}

/// Segments keyed by coordinates, iterated in first-occurrence order.
#[derive(Debug, Clone, Default)]
pub struct SegmentMap {
    segments: IndexMap<SegmentKey, Segment>,
}

impl SegmentMap {
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn get(&self, key: &SegmentKey) -> Option<&Segment> {
        self.segments.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Segment> {
        self.segments.values()
    }

    /// Flat `(text, coords, tag)` list in first-occurrence order.
    pub fn to_list(&self) -> Vec<(String, BoxCoords, u32)> {
        self.segments
            .values()
            .map(|segment| {
                (
                    segment.text.clone(),
                    segment.coords.clone(),
                    segment.group_tag,
                )
            })
            .collect()
    }

    pub fn into_segments(self) -> Vec<Segment> {
        self.segments.into_values().collect()
    }
}

pub fn build_segments(boxes: Vec<CharacterBox>) -> SegmentMap {
    let mut segments: IndexMap<SegmentKey, Segment> = IndexMap::new();
    for entry in boxes {
        let segment = segments
            .entry(entry.coords.clone())
            .or_insert_with(|| Segment {
                text: String::new(),
                coords: entry.coords.clone(),
                group_tag: entry.group_tag,
            });
        segment.text.push_str(&entry.ch);
        segment.group_tag = entry.group_tag;
    }
    SegmentMap { segments }
}
