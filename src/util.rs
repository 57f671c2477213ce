// Characters stripped from file names. '-' is included because Windows rejects a
// trailing '-' after a space; removing it everywhere keeps the rule simple.
pub const INVALID_FILENAME_CHARS: &[char] = &['\\', '/', ':', '*', '?', '<', '>', '|', '-'];

/// Remove every character in [`INVALID_FILENAME_CHARS`] from `name`.
///
/// Characters are dropped, not replaced: `"a*b.txt"` becomes `"ab.txt"`.
/// A name made only of invalid characters comes back empty; callers that turn
/// the result into a path (see [`crate::paths::destination_in`]) reject that.
pub fn sanitize_filename(name: &str) -> String {
    name.chars().filter(|c| !INVALID_FILENAME_CHARS.contains(c)).collect()
}

// DOS device names stay reserved on Windows whatever extension follows them.
#[cfg(windows)]
const DEVICE_NAMES: &[&str] = &["CON", "PRN", "AUX", "NUL"];

#[cfg(windows)]
fn is_device_name(stem: &str) -> bool {
    if DEVICE_NAMES.iter().any(|d| stem.eq_ignore_ascii_case(d)) {
        return true;
    }
    match stem.as_bytes() {
        [a, b, c, n] => {
            let port = [*a, *b, *c];
            (port.eq_ignore_ascii_case(b"COM") || port.eq_ignore_ascii_case(b"LPT")) && (b'1'..=b'9').contains(n)
        }
        _ => false,
    }
}

/// Whether `segment` names exactly one entry directly inside a directory, so
/// that `dir.join(segment)` neither escapes `dir` nor descends below it.
pub fn is_safe_path_segment(segment: &str) -> bool {
    if matches!(segment, "" | "." | "..") || segment.contains(['/', '\\']) {
        return false;
    }
    #[cfg(windows)]
    {
        let stem = segment.split('.').next().unwrap_or_default();
        if segment.contains(':') || segment.ends_with([' ', '.']) || is_device_name(stem) {
            return false;
        }
    }
    true
}
