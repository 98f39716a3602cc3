//! Address parsing for the state bus.
//!
//! Paths are slash-separated segments, each `name` or `name[index]`.
//! `name` and `name[0]` address the same entry; the canonical form drops
//! a zero index so lookups agree however the entry was spelled.

use crate::error::PathError;

/// Canonical form of one segment, or an error naming the whole path.
pub fn canonical_segment(path: &str, segment: &str) -> Result<String, PathError> {
    let (name, index) = parse_segment(path, segment)?;
    Ok(if index == 0 {
        name.to_string()
    } else {
        format!("{}[{}]", name, index)
    })
}

/// Split a segment into its base name and index.
pub fn parse_segment<'a>(path: &str, segment: &'a str) -> Result<(&'a str, u32), PathError> {
    let bad = || PathError::BadIndex {
        path: path.to_string(),
        segment: segment.to_string(),
    };

    let Some(open) = segment.find('[') else {
        if segment.is_empty() {
            return Err(PathError::EmptySegment(path.to_string()));
        }
        if segment.contains(']') {
            return Err(bad());
        }
        return Ok((segment, 0));
    };

    let name = &segment[..open];
    if name.is_empty() {
        return Err(PathError::EmptySegment(path.to_string()));
    }
    let rest = &segment[open + 1..];
    let Some(digits) = rest.strip_suffix(']') else {
        return Err(bad());
    };
    let index = digits.parse::<u32>().map_err(|_| bad())?;
    Ok((name, index))
}

/// Base name of a (possibly indexed) segment: `component[3]` -> `component`.
pub fn base_name(segment: &str) -> &str {
    match segment.find('[') {
        Some(pos) => &segment[..pos],
        None => segment,
    }
}

/// Canonical segments of a node path. `""` and `"/"` are the root.
pub fn split_node_path(path: &str) -> Result<Vec<String>, PathError> {
    let trimmed = path.trim_start_matches('/').trim_end_matches('/');
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    trimmed
        .split('/')
        .map(|seg| canonical_segment(path, seg))
        .collect()
}

/// Split `/node/path/attr` at the last slash.
pub fn split_address(address: &str) -> Result<(&str, &str), PathError> {
    match address.rfind('/') {
        Some(pos) if pos + 1 < address.len() => Ok((&address[..pos], &address[pos + 1..])),
        _ => Err(PathError::NoAttribute(address.to_string())),
    }
}

/// Join a canonical child segment onto a canonical parent path.
pub fn join(parent: &str, segment: &str) -> String {
    if parent == "/" {
        format!("/{}", segment)
    } else {
        format!("{}/{}", parent, segment)
    }
}
