//! Avatar fallbacks: initials and a stable color derived from a display name.

#[cfg(test)]
#[path = "avatar_test.rs"]
mod tests;

const PALETTE: [&str; 19] = [
    "#F44336", "#E91E63", "#9C27B0", "#673AB7", "#3F51B5", "#2196F3", "#03A9F4", "#00BCD4", "#009688", "#4CAF50",
    "#8BC34A", "#CDDC39", "#FFEB3B", "#FFC107", "#FF9800", "#FF5722", "#795548", "#9E9E9E", "#607D8B",
];

/// Up to two uppercase initials: first letter of the first and last word.
#[must_use]
pub fn initials(name: &str) -> String {
    let parts: Vec<&str> = name.trim().split(' ').collect();
    let first_char = |part: &str| part.chars().next();

    match parts.as_slice() {
        [only] => first_char(only).map(|c| c.to_uppercase().collect()).unwrap_or_default(),
        [first, .., last] => match (first_char(first), first_char(last)) {
            (Some(a), Some(b)) => format!("{a}{b}").to_uppercase(),
            _ => String::new(),
        },
        [] => String::new(),
    }
}

/// Palette color for `name`; identical names always map to the same color.
///
/// Uses the 31-multiplier hash over UTF-16 code units with 32-bit wrap-around,
/// so colors match the ones shown by the web client.
#[must_use]
pub fn color_for_name(name: &str) -> &'static str {
    if name.is_empty() {
        return PALETTE[0];
    }
    let hash = name
        .encode_utf16()
        .fold(0i32, |hash, unit| i32::from(unit).wrapping_add(hash.wrapping_shl(5).wrapping_sub(hash)));
    let len = u32::try_from(PALETTE.len()).unwrap_or(u32::MAX);
    let index = usize::try_from(hash.unsigned_abs() % len).unwrap_or(0);
    PALETTE[index]
}
