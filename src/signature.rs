use crate::specmap::ArgumentDescriptor;

const INPUT_PREFIX: &str = "input";

/// Builds the argument map of a `call` record from its signature. Position 0
/// of the map covers the signature itself; each `%n`, `%b` or `%s` marker adds
/// one input named `input0`, `input1`, ... in order of appearance. A marker
/// counts only when it opens a whitespace-separated fragment; one preceded by
/// a backslash is literal text.
pub fn parse_arg_map(proccode: &str) -> Vec<ArgumentDescriptor> {
    let mut arg_map = vec![ArgumentDescriptor::Placeholder];
    for (index, kind) in markers(proccode).into_iter().enumerate() {
        let shadow = match kind {
            'n' => Some("math_number".to_string()),
            's' => Some("text".to_string()),
            _ => None,
        };
        arg_map.push(ArgumentDescriptor::Input {
            name: format!("{}{}", INPUT_PREFIX, index),
            shadow,
        });
    }
    arg_map
}

pub fn argument_ids(proccode: &str) -> Vec<String> {
    parse_arg_map(proccode)
        .into_iter()
        .filter_map(|descriptor| match descriptor {
            ArgumentDescriptor::Input { name, .. } => Some(name),
            _ => None,
        })
        .collect()
}

fn is_marker_at(chars: &[char], index: usize) -> bool {
    chars.get(index) == Some(&'%') && matches!(chars.get(index + 1), Some('n' | 'b' | 's'))
}

/// Splits in front of every unescaped marker, keeping the character that
/// precedes the `%` at the start of the next fragment.
fn fragments(proccode: &str) -> Vec<String> {
    let chars = proccode.chars().collect::<Vec<_>>();
    let mut out = Vec::new();
    let mut start = 0;
    for p in 1..chars.len() {
        if chars[p] != '\\' && is_marker_at(&chars, p + 1) {
            out.push(chars[start..p].iter().collect());
            start = p;
        }
    }
    out.push(chars[start..].iter().collect());
    out
}

fn markers(proccode: &str) -> Vec<char> {
    fragments(proccode)
        .iter()
        .filter_map(|fragment| {
            let mut chars = fragment.trim().chars();
            match (chars.next(), chars.next()) {
                (Some('%'), Some(kind @ ('n' | 'b' | 's'))) => Some(kind),
                _ => None,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_follow_marker_order() {
        assert_eq!(argument_ids("abc %n %b %s"), vec!["input0", "input1", "input2"]);
        assert_eq!(argument_ids("say %s then wait %n secs"), vec!["input0", "input1"]);
        assert!(argument_ids("jump").is_empty());
        assert!(argument_ids("").is_empty());
    }

    #[test]
    fn markers_record_shadow_kinds() {
        let map = parse_arg_map("move %n if %b label %s");
        assert_eq!(map.len(), 4);
        assert_eq!(map[0], ArgumentDescriptor::Placeholder);
        assert_eq!(
            map[1],
            ArgumentDescriptor::Input {
                name: "input0".to_string(),
                shadow: Some("math_number".to_string())
            }
        );
        assert_eq!(
            map[2],
            ArgumentDescriptor::Input {
                name: "input1".to_string(),
                shadow: None
            }
        );
        assert_eq!(
            map[3],
            ArgumentDescriptor::Input {
                name: "input2".to_string(),
                shadow: Some("text".to_string())
            }
        );
    }

    #[test]
    fn escaped_and_malformed_markers_are_literal() {
        assert_eq!(argument_ids(r"100\%n sure %s"), vec!["input0"]);
        assert_eq!(argument_ids("50% off %x %"), Vec::<String>::new());
        assert!(argument_ids("tight%nfit").is_empty());
        assert_eq!(argument_ids("%n first"), vec!["input0"]);
    }
}
