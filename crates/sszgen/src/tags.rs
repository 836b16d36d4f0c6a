//! Field tag parsing.
//!
//! A tag string is a whitespace-separated list of `key:"value"` tokens,
//! carried by a `#[ssz("...")]` attribute on a record field. Recognised keys
//! are `ssz`, `ssz-size` and `ssz-max`. Anything malformed (missing colon,
//! unquoted value, non-numeric integer) reads as "not present".

/// Returns the raw value for `key`, or `None` when the key is absent or the
/// tag string is malformed.
pub fn lookup(tags: &str, key: &str) -> Option<String> {
    let tags = tags.trim();

    for token in tags.split_whitespace() {
        let mut parts = token.splitn(2, ':');
        let name = parts.next()?;
        let val = parts.next()?;
        if val.contains(':') {
            return None;
        }
        if !val.starts_with('"') || !val.ends_with('"') || val.len() < 2 {
            return None;
        }
        if name != key {
            continue;
        }
        return Some(val.trim_matches('"').to_string());
    }
    None
}

/// Decodes tags of the form `ssz-size:"32"`.
pub fn lookup_int(tags: &str, key: &str) -> Option<u64> {
    lookup(tags, key)?.parse::<u64>().ok()
}

/// Decodes tags of the form `ssz-size:"33,32"`. A `?` in the first position
/// reads as 0, meaning the outer dimension is deferred to `ssz-max`.
pub fn lookup_tuple(tags: &str, key: &str) -> Option<(u64, u64)> {
    let raw = lookup(tags, key)?;

    let mut parts = raw.split(',');
    let first_raw = parts.next()?;
    let second_raw = parts.next()?;
    if parts.next().is_some() {
        return None;
    }

    let first = if first_raw == "?" {
        0
    } else {
        first_raw.parse::<u64>().ok()?
    };
    let second = second_raw.parse::<u64>().ok()?;
    Some((first, second))
}
