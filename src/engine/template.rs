//! Template interpolation and key normalization.
//!
//! Templates use `{field}` placeholders resolved against the [`Context`].
//! A field may index into mapping values with `[key]` or `.key` chains, so a
//! buffer assembled across several lines can be addressed as `{record[name]}`.
//! `{{` and `}}` produce literal braces; an unclosed `{` is copied through.
//!
//! Interpolation never fails:
//!
//! ```text
//! {missing}          -> UNKNOWN_CONTEXT_KEY_missing
//! {record[missing]}  -> _missing_not_found
//! {record}           -> {"name":"c1t0d0s0"}     (mappings/lists render as JSON)
//! ```
//!
//! Format specs and conversions (`{val:>8}`, `{val!r}`) are dropped: the value
//! is looked up and rendered as if they were absent.

use super::context::Context;
use crate::Value;

/// Interpolate `template` against `ctx`.
pub fn interpolate(template: &str, ctx: &Context) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(pos) = rest.find(['{', '}']) {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];

        if tail.starts_with("{{") || tail.starts_with("}}") {
            out.push_str(&tail[..1]);
            rest = &tail[2..];
            continue;
        }
        if tail.starts_with('}') {
            out.push('}');
            rest = &tail[1..];
            continue;
        }

        match tail.find('}') {
            Some(close) => {
                out.push_str(&lookup(&tail[1..close], ctx));
                rest = &tail[close + 1..];
            }
            None => {
                out.push_str(tail);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

fn lookup(field: &str, ctx: &Context) -> String {
    let (head, accessors) = split_field(field);
    let Some(mut node) = ctx.get(head) else {
        return format!("UNKNOWN_CONTEXT_KEY_{head}");
    };
    for key in accessors {
        let next = match node {
            Value::Map(map) => map.get(key),
            Value::List(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
            Value::Str(_) => None,
        };
        match next {
            Some(value) => node = value,
            None => return format!("_{key}_not_found"),
        }
    }
    node.to_string()
}

/// Split `record[name].sub` into `("record", ["name", "sub"])`.
fn split_field(field: &str) -> (&str, Vec<&str>) {
    let field = field.split([':', '!']).next().unwrap_or_default().trim();
    let head_end = field.find(['[', '.']).unwrap_or(field.len());
    let (head, mut rest) = field.split_at(head_end);
    let mut accessors = Vec::new();

    while !rest.is_empty() {
        if let Some(inner) = rest.strip_prefix('[') {
            let close = inner.find(']').unwrap_or(inner.len());
            accessors.push(&inner[..close]);
            rest = inner.get(close + 1..).unwrap_or("");
        } else if let Some(inner) = rest.strip_prefix('.') {
            let end = inner.find(['[', '.']).unwrap_or(inner.len());
            accessors.push(&inner[..end]);
            rest = &inner[end..];
        } else {
            break;
        }
    }
    (head, accessors)
}

/// Normalize a computed key into a safe identifier.
///
/// Lowercases, strips leading/trailing non-word characters, and collapses inner
/// runs of non-word characters (and of `_`) into a single `_`.
///
/// ```
/// use statescan::normalize_key;
///
/// assert_eq!(normalize_key("this my key"), "this_my_key");
/// assert_eq!(normalize_key("this -my- %key%"), "this_my_key");
/// ```
pub fn normalize_key(raw: &str) -> String {
    let lower = raw.trim().to_lowercase();
    let stripped = regex!(r"^\W+").replace(&lower, "");
    let stripped = regex!(r"\W+$").replace(&stripped, "");
    let joined = regex!(r"\W+").replace_all(&stripped, "_");
    regex!(r"_+").replace_all(&joined, "_").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> Context {
        let mut ctx = Context::new();
        ctx.insert("key", "first name");
        ctx.insert("val", "Eric");
        let mut record = crate::Tree::new();
        record.insert("name".into(), "c1t0d0s0".into());
        record.insert("tags".into(), Value::List(vec!["a".into(), "b".into()]));
        ctx.insert("record", Value::Map(record));
        ctx
    }

    #[test]
    fn plain_fields() {
        assert_eq!(interpolate("{key} = {val}", &ctx()), "first name = Eric");
        assert_eq!(interpolate("no placeholders", &ctx()), "no placeholders");
    }

    #[test]
    fn missing_keys_use_sentinels() {
        assert_eq!(interpolate("{nope}", &ctx()), "UNKNOWN_CONTEXT_KEY_nope");
        assert_eq!(interpolate("{record[size]}", &ctx()), "_size_not_found");
        assert_eq!(interpolate("{val[0]}", &ctx()), "_0_not_found");
    }

    #[test]
    fn indexing_into_mappings_and_lists() {
        assert_eq!(interpolate("disks.{record[name]}", &ctx()), "disks.c1t0d0s0");
        assert_eq!(interpolate("{record.name}", &ctx()), "c1t0d0s0");
        assert_eq!(interpolate("{record[tags][1]}", &ctx()), "b");
    }

    #[test]
    fn structured_values_render_as_json() {
        assert_eq!(interpolate("{record[tags]}", &ctx()), r#"["a","b"]"#);
    }

    #[test]
    fn format_specs_are_ignored() {
        assert_eq!(interpolate("[{val:>8}]", &ctx()), "[Eric]");
        assert_eq!(interpolate("{record[name]!r}", &ctx()), "c1t0d0s0");
    }

    #[test]
    fn braces_escape_and_unclosed() {
        assert_eq!(interpolate("{{{val}}}", &ctx()), "{Eric}");
        assert_eq!(interpolate("open {val", &ctx()), "open {val");
        assert_eq!(interpolate("stray } brace", &ctx()), "stray } brace");
    }

    #[test]
    fn normalization() {
        assert_eq!(normalize_key("First Name"), "first_name");
        assert_eq!(normalize_key("  --Disk/Size (GB)--  "), "disk_size_gb");
        assert_eq!(normalize_key("a__b"), "a_b");
        assert_eq!(normalize_key("_private"), "_private");
        assert_eq!(normalize_key("Ünïcode Kéy"), "ünïcode_kéy");
        assert_eq!(normalize_key(""), "");
    }
}
