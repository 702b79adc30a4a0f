//! Column-letter arithmetic for spreadsheet-style addresses.
//!
//! Columns are zero-based everywhere in the engine; the letter form only
//! appears inside rendered range strings. Multi-letter columns are fully
//! supported (`"AA"`, `"AB"`, ...), so tables wider than 26 columns address
//! correctly.

/// Convert a zero-based column index to its letter form (`0 -> "A"`,
/// `27 -> "AB"`).
pub fn column_to_letters(mut col: u32) -> String {
    let mut buf = Vec::new();
    loop {
        let rem = (col % 26) as u8;
        buf.push(b'A' + rem);
        col /= 26;
        if col == 0 {
            break;
        }
        col -= 1;
    }
    buf.reverse();
    String::from_utf8(buf).expect("only ASCII A-Z")
}

/// Inverse of [`column_to_letters`]; `None` for anything but uppercase A-Z.
pub fn letters_to_column(s: &str) -> Option<u32> {
    if s.is_empty() {
        return None;
    }
    let mut col: u32 = 0;
    for (idx, ch) in s.bytes().enumerate() {
        if !ch.is_ascii_uppercase() {
            return None;
        }
        let val = (ch - b'A') as u32;
        col = col.checked_mul(26)?;
        col = col.checked_add(val)?;
        if idx != s.len() - 1 {
            col = col.checked_add(1)?;
        }
    }
    Some(col)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_letters() {
        assert_eq!(column_to_letters(0), "A");
        assert_eq!(column_to_letters(1), "B");
        assert_eq!(column_to_letters(25), "Z");
    }

    #[test]
    fn multi_letters() {
        assert_eq!(column_to_letters(26), "AA");
        assert_eq!(column_to_letters(27), "AB");
        assert_eq!(column_to_letters(701), "ZZ");
        assert_eq!(column_to_letters(702), "AAA");
    }

    #[test]
    fn letters_roundtrip() {
        for col in [0u32, 1, 25, 26, 27, 700, 701, 702, 16_383] {
            assert_eq!(letters_to_column(&column_to_letters(col)), Some(col));
        }
    }

    #[test]
    fn letters_reject_garbage() {
        assert_eq!(letters_to_column(""), None);
        assert_eq!(letters_to_column("a"), None);
        assert_eq!(letters_to_column("A1"), None);
    }
}
