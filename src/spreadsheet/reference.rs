//! Column letters and A1-style cell references.

/// Returns the column letters for a zero-based column index (0 -> "A", 26 -> "AA").
pub fn column_name(col: usize) -> String {
    let mut column = col + 1;
    let mut name = String::new();
    while column > 0 {
        column -= 1;
        name.insert(0, char::from(b'A' + (column % 26) as u8));
        column /= 26;
    }
    name
}

/// Rows addressable in a worksheet (row 1048576).
pub(crate) const MAX_ROWS: usize = 1_048_576;
/// Columns addressable in a worksheet (column XFD).
pub(crate) const MAX_COLUMNS: usize = 16_384;

/// Parses an A1-style reference into a zero-based (row, col) position.
///
/// References beyond `XFD1048576` are rejected.
pub(crate) fn reference_to_index(reference: &str) -> Option<(usize, usize)> {
    let split = reference.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = reference.split_at(split);
    if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let col = letters.bytes().try_fold(0usize, |acc, byte| {
        let digit = (byte.to_ascii_uppercase() - b'A') as usize + 1;
        acc.checked_mul(26)?.checked_add(digit).filter(|col| *col <= MAX_COLUMNS)
    })?;
    let row = digits.parse::<usize>().ok().filter(|row| (1..=MAX_ROWS).contains(row))?;
    Some((row - 1, col - 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_names() {
        assert_eq!(column_name(0), "A");
        assert_eq!(column_name(25), "Z");
        assert_eq!(column_name(26), "AA");
        assert_eq!(column_name(701), "ZZ");
        assert_eq!(column_name(702), "AAA");
    }

    #[test]
    fn references() {
        assert_eq!(reference_to_index("A1"), Some((0, 0)));
        assert_eq!(reference_to_index("ab10"), Some((9, 27)));
        assert_eq!(reference_to_index("XFD1048576"), Some((MAX_ROWS - 1, MAX_COLUMNS - 1)));
    }

    #[test]
    fn malformed_references() {
        assert_eq!(reference_to_index(""), None);
        assert_eq!(reference_to_index("12"), None);
        assert_eq!(reference_to_index("A0"), None);
        assert_eq!(reference_to_index("A1B"), None);
        assert_eq!(reference_to_index("ZZZZZZZZZZZZZZ1"), None);
        assert_eq!(reference_to_index("XFE1"), None);
        assert_eq!(reference_to_index("A1048577"), None);
        assert_eq!(reference_to_index("A99999999999999999999999"), None);
    }
}
