//! Per-character box output of the recognizer (`lstmbox` format).
//!
//! Each line is `<char> <left> <bottom> <right> <top> [<group tag>]` in image
//! space with the origin at the bottom-left corner. Parsing is best effort:
//! empty and malformed numeric tokens are skipped rather than rejected, so a
//! bad token shifts the remaining values left.

mod segment;

use tracing::debug;

pub use segment::{Segment, SegmentKey, SegmentMap, build_segments};

/// Placeholder text for regions without recognized content.
pub const FILLER: &str = "\u{241F}";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Vertical,
    Horizontal,
}

impl Orientation {
    pub fn from_vertical(vertical: bool) -> Self {
        if vertical {
            Orientation::Vertical
        } else {
            Orientation::Horizontal
        }
    }
}

/// One parsed line before cleaning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    pub token: String,
    pub values: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct BoxCoords {
    pub left: i64,
    pub bottom: i64,
    pub right: i64,
    pub top: i64,
}

impl BoxCoords {
    pub fn width(&self) -> i64 {
        self.right - self.left
    }

    pub fn height(&self) -> i64 {
        self.top - self.bottom
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacterBox {
    pub ch: String,
    pub coords: BoxCoords,
    pub group_tag: u32,
}

impl CharacterBox {
    pub fn is_filler(&self) -> bool {
        self.ch == FILLER
    }
}

pub fn parse_records(input: &str) -> Vec<RawRecord> {
    input.split('\n').map(parse_line).collect()
}

pub fn parse_line(line: &str) -> RawRecord {
    let line = line.trim_end_matches(['\n', '\r']);
    let mut tokens = line.split(' ');
    let token = tokens.next().unwrap_or_default().to_string();
    let values = tokens
        .filter(|value| !value.is_empty())
        .filter_map(|value| value.parse::<i64>().ok())
        .collect();
    RawRecord { token, values }
}

pub fn clean_records(records: Vec<RawRecord>, orientation: Orientation) -> Vec<CharacterBox> {
    let mut cleaned = Vec::with_capacity(records.len());
    for record in records {
        if record.token == "\t" {
            continue;
        }
        let ch = if record.token.is_empty() {
            match orientation {
                Orientation::Vertical => continue,
                Orientation::Horizontal => " ".to_string(),
            }
        } else {
            record.token
        };
        if record.values.len() < 4 {
            if !record.values.is_empty() {
                debug!("skipping box record with {} values", record.values.len());
            }
            continue;
        }
        let coords = BoxCoords {
            left: record.values[0],
            bottom: record.values[1],
            right: record.values[2],
            top: record.values[3],
        };
        let group_tag = record
            .values
            .get(4)
            .and_then(|tag| u32::try_from(*tag).ok())
            .unwrap_or(0);
        cleaned.push(CharacterBox {
            ch,
            coords,
            group_tag,
        });
    }
    cleaned
}

/// Parse, clean and segment box text in one pass.
pub fn read_segments(input: &str, orientation: Orientation) -> SegmentMap {
    build_segments(clean_records(parse_records(input), orientation))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_coordinates_and_optional_tag() {
        let record = parse_line("あ 10 20 30 40 2\n");
        assert_eq!(record.token, "あ");
        assert_eq!(record.values, vec![10, 20, 30, 40, 2]);

        let boxes = clean_records(vec![parse_line("い 1 2 3 4")], Orientation::Vertical);
        assert_eq!(boxes[0].group_tag, 0);
        assert_eq!(boxes[0].coords.width(), 2);
        assert_eq!(boxes[0].coords.height(), 2);
    }

    #[test]
    fn malformed_integers_are_skipped_not_fatal() {
        let record = parse_line("x 10 oops 30 40 50 0");
        assert_eq!(record.values, vec![10, 30, 40, 50, 0]);
        let boxes = clean_records(vec![record], Orientation::Vertical);
        assert_eq!(
            boxes[0].coords,
            BoxCoords {
                left: 10,
                bottom: 30,
                right: 40,
                top: 50
            }
        );
    }

    #[test]
    fn space_character_depends_on_orientation() {
        let input = "A 0 0 10 10 0\n  0 0 10 10 0\nB 0 0 10 10 0";
        let vertical = clean_records(parse_records(input), Orientation::Vertical);
        assert_eq!(vertical.len(), 2);

        let horizontal = clean_records(parse_records(input), Orientation::Horizontal);
        let chars = horizontal.iter().map(|b| b.ch.as_str()).collect::<String>();
        assert_eq!(chars, "A B");
    }

    #[test]
    fn tabs_and_blank_lines_are_dropped() {
        let input = "\t 0 0 1 1 0\nA 0 0 1 1 0\n\n\n";
        for orientation in [Orientation::Vertical, Orientation::Horizontal] {
            let boxes = clean_records(parse_records(input), orientation);
            assert_eq!(boxes.len(), 1, "{:?}", orientation);
            assert_eq!(boxes[0].ch, "A");
        }
    }

    #[test]
    fn carriage_returns_are_stripped() {
        let record = parse_line("A 1 2 3 4 5\r");
        assert_eq!(record.values, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn negative_tags_fall_back_to_ungrouped() {
        let boxes = clean_records(vec![parse_line("A 1 2 3 4 -1")], Orientation::Vertical);
        assert_eq!(boxes[0].group_tag, 0);
    }
}
