//! Storage location and value resolution for a fired rule.
//!
//! ```text
//! CompiledPath ──┬─ open_target      (reset / create the differed buffer)
//!                └─ resolve_segments (interpolate + normalize each segment)
//!
//! FilterSpec ──── resolve_value
//!                   Func      -> (value, optional replacement context)
//!                   BackRef   -> clone of a context entry
//!                   Literal   -> as-is
//!                   Template  -> interpolated string
//!                   None      -> mapping of named captures
//! ```
//!
//! The buffer is opened before segments and filter are evaluated, so a `>name`
//! rule that reads `<name` sees the freshly emptied buffer.

use super::compiled_rules::{BufferMode, CompiledPath, FilterError, FilterSpec, PathRoot};
use super::context::Context;
use super::template::interpolate;
use super::tree::Segment;
use crate::{Tree, Value};
use regex::Captures;

/// Reset (`>`) or create (`>>`) the buffer a path writes into. No-op for tree paths.
pub(crate) fn open_target(path: &CompiledPath, ctx: &mut Context) {
    if let PathRoot::Buffer { name, mode } = &path.root {
        ctx.open_buffer(name, *mode);
    }
}

pub(crate) fn resolve_segments(path: &CompiledPath, ctx: &Context) -> Vec<Segment> {
    path.segments.iter().map(|template| Segment::parse(&interpolate(template, ctx))).collect()
}

/// Compute the value to store. Only a filter function can fail or replace the context.
pub(crate) fn resolve_value(
    filter: &FilterSpec,
    caps: &Captures<'_>,
    captured: Tree,
    ctx: &Context,
) -> Result<(Value, Option<Context>), FilterError> {
    let value = match filter {
        FilterSpec::Func(f) => return f(caps, ctx),
        FilterSpec::BackRef(name) => ctx.back_ref(name),
        FilterSpec::Literal(value) => value.clone(),
        FilterSpec::Template(template) => Value::Str(interpolate(template, ctx)),
        FilterSpec::None => Value::Map(captured),
    };
    Ok((value, None))
}

/// Human readable location for logs and traces, e.g. `>>disk_info.state`.
pub(crate) fn describe_location(path: &CompiledPath, segments: &[Segment]) -> String {
    let mut parts: Vec<String> = Vec::with_capacity(segments.len() + 1);
    match &path.root {
        PathRoot::Tree => {}
        PathRoot::Buffer { name, mode: BufferMode::Replace } => parts.push(format!(">{name}")),
        PathRoot::Buffer { name, mode: BufferMode::Merge } => parts.push(format!(">>{name}")),
    }
    parts.extend(segments.iter().map(|s| if s.list { format!("{}[]", s.key) } else { s.key.clone() }));
    parts.join(".")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::compiled_rules::{CompiledRules, PathSpec, RegexFlags, RuleDef};
    use regex::Regex;

    fn compiled_path(spec: &str) -> CompiledPath {
        let rules = CompiledRules::new(vec![RuleDef::new("", "x").path(PathSpec::from(spec))], RegexFlags::empty())
            .unwrap();
        rules.iter().next().unwrap().path.clone().unwrap()
    }

    #[test]
    fn segments_interpolate_then_normalize() {
        let mut ctx = Context::new();
        ctx.insert("diskname", "C1T0D0S0");
        ctx.insert("key", "Mount Point");
        let path = compiled_path("disks.{diskname}.{key}");
        let segments = resolve_segments(&path, &ctx);
        assert_eq!(describe_location(&path, &segments), "disks.c1t0d0s0.mount_point");
    }

    #[test]
    fn missing_key_degrades_visibly() {
        let path = compiled_path("disks.{diskname}");
        let segments = resolve_segments(&path, &Context::new());
        assert_eq!(segments[1].key, "unknown_context_key_diskname");
    }

    #[test]
    fn open_target_resets_replace_buffers_only() {
        let mut ctx = Context::new();
        ctx.insert("rec", Value::Map(Tree::from_iter([("a".to_string(), Value::from("1"))])));

        open_target(&compiled_path(">>rec.{key}"), &mut ctx);
        assert_eq!(ctx.get("rec").and_then(|v| v.get("a")), Some(&Value::from("1")));

        open_target(&compiled_path(">rec"), &mut ctx);
        assert_eq!(ctx.get("rec"), Some(&Value::empty_map()));
    }

    #[test]
    fn filter_precedence() {
        let re = Regex::new(r"(?P<val>\w+)").unwrap();
        let caps = re.captures("hello").unwrap();
        let mut ctx = Context::new();
        ctx.insert("val", "hello");
        let captured = || Tree::from_iter([("val".to_string(), Value::from("hello"))]);

        let (v, _) = resolve_value(&FilterSpec::from("<- {val} -"), &caps, captured(), &ctx).unwrap();
        assert_eq!(v, Value::empty_map());

        let (v, _) = resolve_value(&FilterSpec::from("[{val}]"), &caps, captured(), &ctx).unwrap();
        assert_eq!(v, "[hello]");

        let (v, _) = resolve_value(&FilterSpec::None, &caps, captured(), &ctx).unwrap();
        assert_eq!(v, Value::Map(captured()));

        let func = FilterSpec::func(|caps, ctx| {
            let mut next = ctx.clone();
            next.insert("seen", "yes");
            Ok((Value::from(caps["val"].to_uppercase()), Some(next)))
        });
        let (v, next) = resolve_value(&func, &caps, captured(), &ctx).unwrap();
        assert_eq!(v, "HELLO");
        assert_eq!(next.and_then(|c| c.get("seen").cloned()), Some(Value::from("yes")));
    }
}
