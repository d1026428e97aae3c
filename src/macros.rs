/// Lazily compiled static regex for engine internals.
macro_rules! regex {
    ($pat:literal) => {{
        static RE: once_cell::sync::Lazy<regex::Regex> =
            once_cell::sync::Lazy::new(|| regex::Regex::new($pat).expect("built-in regex must compile"));
        &*RE
    }};
}

/// Build a rule table from tuple literals.
///
/// Each entry is `(if_state, goto_state, pattern, path, filter)`:
///
/// - `if_state`: `""` (any state), `"a,b"`, or an array expression of state names.
/// - `goto_state`: `None`, `""`, a state name, `"__continue__"` or `"__stop__"`.
/// - `pattern`: a string literal or an expression convertible to [`PatternSpec`](crate::PatternSpec).
/// - `path`: `None` (store nothing) or a dotted string / array of segments.
/// - `filter`: `None`, `{}` (empty mapping), a string (`"<name"` back-reference or a
///   template), or a parenthesized expression convertible to [`FilterSpec`](crate::FilterSpec).
///
/// ```
/// use statescan::rules;
///
/// let table = rules![
///     ("top", "disk", r"\{", ">disk_info", {}),
///     ("disk", "", r"(?P<key>.*):(?P<val>.*)", ">>disk_info.{key}", "{val}"),
///     ("disk", "top", r"\}", "disks.{disk_info[name]}", "<disk_info"),
/// ];
/// assert_eq!(table.len(), 3);
/// ```
#[macro_export]
macro_rules! rules {
    ( $( ($guard:tt, $goto:tt, $pattern:tt, $path:tt, $filter:tt) ),* $(,)? ) => {
        vec![ $(
            $crate::RuleDef {
                guard: $crate::__rule_guard!($guard),
                transition: $crate::__rule_goto!($goto),
                pattern: $crate::PatternSpec::from($pattern),
                path: $crate::__rule_path!($path),
                filter: $crate::__rule_filter!($filter),
            }
        ),* ]
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __rule_guard {
    (None) => {
        $crate::StateGuard::Any
    };
    ([]) => {
        $crate::StateGuard::Any
    };
    ($guard:expr) => {
        $crate::StateGuard::from($guard)
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __rule_goto {
    (None) => {
        $crate::Transition::Stay
    };
    ($goto:expr) => {
        $crate::Transition::parse($goto)
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __rule_path {
    (None) => {
        ::core::option::Option::None
    };
    ($path:expr) => {
        ::core::option::Option::Some($crate::PathSpec::from($path))
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __rule_filter {
    (None) => {
        $crate::FilterSpec::None
    };
    ({}) => {
        $crate::FilterSpec::Literal($crate::Value::empty_map())
    };
    ($filter:expr) => {
        $crate::FilterSpec::from($filter)
    };
}
