//! Half-width / full-width conversion for the printable ASCII range.

const FULL_WIDTH_OFFSET: u32 = 0xFEE0;

pub fn half_to_full(text: &str) -> String {
    text.chars()
        .map(|ch| match ch as u32 {
            code @ 0x21..=0x7E => char::from_u32(code + FULL_WIDTH_OFFSET).unwrap_or(ch),
            _ => ch,
        })
        .collect()
}

pub fn full_to_half(text: &str) -> String {
    text.chars()
        .map(|ch| match ch as u32 {
            code @ 0xFF01..=0xFF5E => char::from_u32(code - FULL_WIDTH_OFFSET).unwrap_or(ch),
            _ => ch,
        })
        .collect()
}

pub fn normalize(text: &str, full_width: bool) -> String {
    if full_width {
        half_to_full(text)
    } else {
        full_to_half(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_ascii_both_ways() {
        assert_eq!(half_to_full("A1!?"), "Ａ１！？");
        assert_eq!(full_to_half("Ａ１！？"), "A1!?");
    }

    #[test]
    fn leaves_spaces_kana_and_sentinel_alone() {
        assert_eq!(half_to_full("あ ␟"), "あ ␟");
        assert_eq!(full_to_half("あ ␟"), "あ ␟");
    }
}
