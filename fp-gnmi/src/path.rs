//! Conversion between XPath-like strings and gNMI paths.
//!
//! Strings look like `/interfaces/interface[name=Ethernet1/1]/state`, with
//! an optional `origin:` prefix (`openconfig:/system`). Key values may
//! contain `/`; a literal `]` or `\` inside a value is escaped with `\`.

use std::collections::HashMap;

use crate::error::{GnmiError, Result};
use crate::gnmi::{Path, PathElem};

fn invalid(path: &str, reason: impl Into<String>) -> GnmiError {
    GnmiError::InvalidPath {
        path: path.to_string(),
        reason: reason.into(),
    }
}

/// Parse an XPath-like string into a gNMI [`Path`].
pub fn parse_path(input: &str) -> Result<Path> {
    let (origin, rest) = match input.split_once(":/") {
        Some((origin, rest)) if !origin.contains(['/', '[']) => (origin.to_string(), rest),
        _ => (String::new(), input),
    };

    let elem = split_segments(input, rest)?
        .into_iter()
        .map(|segment| parse_elem(input, segment))
        .collect::<Result<Vec<_>>>()?;

    Ok(Path {
        origin,
        elem,
        ..Default::default()
    })
}

/// Split on `/` outside of key selectors, skipping empty segments.
fn split_segments<'a>(input: &str, path: &'a str) -> Result<Vec<&'a str>> {
    let mut segments = Vec::new();
    let mut depth = false;
    let mut escaped = false;
    let mut start = 0;

    for (i, c) in path.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if depth => escaped = true,
            '[' if !depth => depth = true,
            ']' if depth => depth = false,
            '/' if !depth => {
                if i > start {
                    segments.push(&path[start..i]);
                }
                start = i + 1;
            }
            _ => {}
        }
    }

    if depth {
        return Err(invalid(input, "unterminated key selector"));
    }
    if start < path.len() {
        segments.push(&path[start..]);
    }

    Ok(segments)
}

/// Parse `name[k1=v1][k2=v2]` into a [`PathElem`].
fn parse_elem(input: &str, segment: &str) -> Result<PathElem> {
    let (name, mut rest) = match segment.find('[') {
        Some(pos) => segment.split_at(pos),
        None => (segment, ""),
    };
    if name.is_empty() {
        return Err(invalid(input, format!("missing element name in '{segment}'")));
    }
    if name.contains(']') {
        return Err(invalid(input, format!("unexpected ']' in '{segment}'")));
    }

    let mut key = HashMap::new();
    while !rest.is_empty() {
        let Some(selector) = rest.strip_prefix('[') else {
            return Err(invalid(input, format!("expected '[' in '{segment}'")));
        };
        let Some((k, after_eq)) = selector.split_once('=') else {
            return Err(invalid(input, format!("missing '=' in '{segment}'")));
        };
        if k.is_empty() || k.contains(']') {
            return Err(invalid(input, format!("bad key name in '{segment}'")));
        }

        let mut value = String::new();
        let mut chars = after_eq.char_indices();
        let mut end = None;
        while let Some((i, c)) = chars.next() {
            match c {
                '\\' => match chars.next() {
                    Some((_, escaped)) => value.push(escaped),
                    None => break,
                },
                ']' => {
                    end = Some(i);
                    break;
                }
                c => value.push(c),
            }
        }
        let Some(end) = end else {
            return Err(invalid(input, format!("unterminated key in '{segment}'")));
        };

        key.insert(k.to_string(), value);
        rest = &after_eq[end + 1..];
    }

    Ok(PathElem {
        name: name.to_string(),
        key,
    })
}

/// Render a gNMI [`Path`] as a string. Keys are sorted for stable output.
pub fn path_to_string(path: &Path) -> String {
    let mut out = String::new();
    if !path.origin.is_empty() {
        out.push_str(&path.origin);
        out.push(':');
    }

    for elem in &path.elem {
        out.push('/');
        out.push_str(&elem.name);

        let mut keys: Vec<_> = elem.key.iter().collect();
        keys.sort();
        for (k, v) in keys {
            out.push('[');
            out.push_str(k);
            out.push('=');
            for c in v.chars() {
                if c == ']' || c == '\\' {
                    out.push('\\');
                }
                out.push(c);
            }
            out.push(']');
        }
    }

    if path.elem.is_empty() {
        out.push('/');
    }
    out
}

/// Append `path` to `prefix`, as a target does when a notification carries
/// a prefix.
pub fn join_paths(prefix: Option<&Path>, path: &Path) -> Path {
    match prefix {
        Some(prefix) => {
            let mut joined = prefix.clone();
            joined.elem.extend(path.elem.iter().cloned());
            if joined.origin.is_empty() {
                joined.origin = path.origin.clone();
            }
            joined
        }
        None => path.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_path_simple() {
        let path = parse_path("/interfaces/interface/state").unwrap();
        assert_eq!(path.elem.len(), 3);
        assert_eq!(path.elem[0].name, "interfaces");
        assert_eq!(path.elem[1].name, "interface");
        assert_eq!(path.elem[2].name, "state");
        assert!(path.origin.is_empty());
    }

    #[test]
    fn test_parse_path_with_keys() {
        let path = parse_path("/interfaces/interface[name=Ethernet1/1]/state").unwrap();
        assert_eq!(path.elem.len(), 3);
        assert_eq!(path.elem[1].name, "interface");
        assert_eq!(
            path.elem[1].key.get("name"),
            Some(&"Ethernet1/1".to_string())
        );
    }

    #[test]
    fn test_parse_path_multiple_keys_and_origin() {
        let path = parse_path(
            "openconfig:/network-instances/network-instance[name=DEFAULT]/protocols/protocol[identifier=BGP][name=BGP]",
        )
        .unwrap();

        assert_eq!(path.origin, "openconfig");
        let protocol = &path.elem[3];
        assert_eq!(protocol.key.len(), 2);
        assert_eq!(protocol.key["identifier"], "BGP");
        assert_eq!(protocol.key["name"], "BGP");
    }

    #[test]
    fn test_parse_escaped_bracket() {
        let path = parse_path(r"/a/b[k=x\]y]/c").unwrap();
        assert_eq!(path.elem[1].key["k"], "x]y");
        assert_eq!(path.elem[2].name, "c");
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_path("/a/b[name=x").is_err());
        assert!(parse_path("/a/[name=x]").is_err());
        assert!(parse_path("/a/b[name]").is_err());
        assert!(parse_path("/a/b[=x]").is_err());
        assert!(parse_path("/a/b[k=v]junk").is_err());
    }

    #[test]
    fn test_root_path() {
        let path = parse_path("/").unwrap();
        assert!(path.elem.is_empty());
        assert_eq!(path_to_string(&path), "/");
    }

    #[test]
    fn test_path_to_string() {
        let mut path = Path::default();
        path.elem.push(PathElem {
            name: "interfaces".to_string(),
            key: HashMap::new(),
        });
        path.elem.push(PathElem {
            name: "interface".to_string(),
            key: [("name".to_string(), "eth0".to_string())]
                .into_iter()
                .collect(),
        });

        assert_eq!(path_to_string(&path), "/interfaces/interface[name=eth0]");
    }

    #[test]
    fn test_string_round_trip_is_stable() {
        let input = r"openconfig:/components/component[name=0/RP0/CPU0]/state/oper-status";
        let path = parse_path(input).unwrap();
        assert_eq!(path_to_string(&path), input);

        let escaped = r"/a/b[k=x\]y\\z]";
        assert_eq!(path_to_string(&parse_path(escaped).unwrap()), escaped);
    }

    #[test]
    fn test_join_paths() {
        let prefix = parse_path("openconfig:/interfaces/interface[name=eth0]").unwrap();
        let leaf = parse_path("/state/counters/in-octets").unwrap();

        let joined = join_paths(Some(&prefix), &leaf);
        assert_eq!(
            path_to_string(&joined),
            "openconfig:/interfaces/interface[name=eth0]/state/counters/in-octets"
        );
        assert_eq!(join_paths(None, &leaf), leaf);
    }
}
