use tracing::warn;

use super::boxfmt::round_half_even;
use crate::page::{EllipseLabel, PageSession, Rect, RegionId};

pub const RECORD_SEPARATOR: &str = "::|--|::";
pub const FIELD_SEPARATOR: &str = "::||::";

/// `display_text, font_size, font_family, x, y, w, h` per ellipse, in
/// creation order.
pub fn export_ellipse(session: &PageSession) -> String {
    session
        .ellipses()
        .filter_map(|region| region.label().map(|label| (label, region.rect())))
        .map(|(label, rect)| {
            [
                label.display_text.clone(),
                label.font_size.to_string(),
                label.font_family.clone(),
                round_half_even(rect.x).to_string(),
                round_half_even(rect.y).to_string(),
                round_half_even(rect.w).to_string(),
                round_half_even(rect.h).to_string(),
            ]
            .join(FIELD_SEPARATOR)
        })
        .collect::<Vec<_>>()
        .join(RECORD_SEPARATOR)
}

pub fn parse_ellipse(input: &str) -> Vec<(Rect, EllipseLabel)> {
    if input.trim().is_empty() {
        return Vec::new();
    }
    input
        .split(RECORD_SEPARATOR)
        .enumerate()
        .filter_map(|(index, record)| {
            let parsed = parse_record(record);
            if parsed.is_none() {
                warn!("skipping malformed ellipse record {}", index);
            }
            parsed
        })
        .collect()
}

pub fn import_ellipse(session: &mut PageSession, input: &str) -> Vec<RegionId> {
    parse_ellipse(input)
        .into_iter()
        .map(|(rect, label)| session.add_ellipse(rect, label))
        .collect()
}

fn parse_record(record: &str) -> Option<(Rect, EllipseLabel)> {
    let fields = record.split(FIELD_SEPARATOR).collect::<Vec<_>>();
    let [display_text, font_size, font_family, x, y, w, h] = fields.as_slice() else {
        return None;
    };
    let font_size = font_size.trim().parse::<i64>().ok()?.unsigned_abs();
    let rect = Rect::new(number(x)?, number(y)?, number(w)?, number(h)?);
    Some((
        rect,
        EllipseLabel {
            display_text: display_text.to_string(),
            font_size: u32::try_from(font_size).ok()?,
            font_family: font_family.to_string(),
        },
    ))
}

fn number(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lstmbox::Orientation;

    fn sample_session() -> PageSession {
        let mut session = PageSession::new(800, 1200, Orientation::Vertical);
        session.add_ellipse(
            Rect::new(10.4, 20.5, 100.0, 60.5),
            EllipseLabel {
                display_text: "WAIT!\nNO".to_string(),
                font_size: 25,
                font_family: "Wild Words".to_string(),
            },
        );
        session.add_ellipse(
            Rect::new(300.0, 400.0, 80.0, 80.0),
            EllipseLabel {
                display_text: "ok".to_string(),
                font_size: 18,
                font_family: "Comic Neue".to_string(),
            },
        );
        session
    }

    #[test]
    fn export_uses_both_separators() {
        insta::assert_snapshot!(
            export_ellipse(&sample_session()),
            @r"
        WAIT!
        NO::||::25::||::Wild Words::||::10::||::20::||::100::||::60::|--|::ok::||::18::||::Comic Neue::||::300::||::400::||::80::||::80
        "
        );
    }

    #[test]
    fn export_import_export_is_identical() {
        let exported = export_ellipse(&sample_session());
        let mut session = PageSession::new(800, 1200, Orientation::Vertical);
        assert_eq!(import_ellipse(&mut session, &exported).len(), 2);
        assert_eq!(export_ellipse(&session), exported);
    }

    #[test]
    fn malformed_records_are_skipped() {
        let input = "a::||::12::||::Sans::||::1::||::2::||::3::||::4::|--|::broken::|--|::b::||::x::||::Sans::||::1::||::2::||::3::||::4";
        let parsed = parse_ellipse(input);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].1.display_text, "a");
        assert_eq!(parsed[0].0, Rect::new(1.0, 2.0, 3.0, 4.0));
        assert!(parse_ellipse("").is_empty());
    }
}
