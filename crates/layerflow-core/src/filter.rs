//! 文字列に対する合成可能な述語
//!
//! ```
//! use layerflow_core::filter::{any_of, starts_with};
//!
//! let ubuntu_or_alpine = starts_with("ubuntu") | starts_with("alpine");
//! assert!(ubuntu_or_alpine.matches("alpine-3.9"));
//!
//! let not_conda = !any_of(["conda"]);
//! assert!(not_conda.matches("cuda"));
//! ```

use crate::error::{ImageError, Result};
use std::fmt;
use std::ops::{BitAnd, BitOr, Not};
use std::sync::Arc;

type Predicate = dyn Fn(&str) -> bool + Send + Sync;

/// 述語
///
/// `|` で OR、`&` で AND、`!` で否定を合成できます。
#[derive(Clone)]
pub struct Filter {
    predicate: Arc<Predicate>,
}

impl Filter {
    pub fn new(predicate: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        Self {
            predicate: Arc::new(predicate),
        }
    }

    pub fn matches(&self, value: &str) -> bool {
        (self.predicate)(value)
    }

    /// 値が存在しない場合は常に `false`
    pub fn matches_opt(&self, value: Option<&str>) -> bool {
        value.is_some_and(|v| self.matches(v))
    }
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Filter").finish_non_exhaustive()
    }
}

impl BitOr for Filter {
    type Output = Filter;

    fn bitor(self, rhs: Filter) -> Filter {
        Filter::new(move |value| self.matches(value) || rhs.matches(value))
    }
}

impl BitAnd for Filter {
    type Output = Filter;

    fn bitand(self, rhs: Filter) -> Filter {
        Filter::new(move |value| self.matches(value) && rhs.matches(value))
    }
}

impl Not for Filter {
    type Output = Filter;

    fn not(self) -> Filter {
        Filter::new(move |value| !self.matches(value))
    }
}

pub fn starts_with(prefix: impl Into<String>) -> Filter {
    let prefix = prefix.into();
    Filter::new(move |value| value.starts_with(&prefix))
}

/// いずれかの値と完全一致
pub fn any_of<I, S>(values: I) -> Filter
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let values: Vec<String> = values.into_iter().map(Into::into).collect();
    Filter::new(move |value| values.iter().any(|v| v == value))
}

/// 部分文字列を含む
pub fn has(needle: impl Into<String>) -> Filter {
    let needle = needle.into();
    Filter::new(move |value| value.contains(&needle))
}

/// globパターン（`*`, `?`, `[...]`）に一致
pub fn matching(pattern: &str) -> Result<Filter> {
    let pattern = glob::Pattern::new(pattern).map_err(|e| {
        ImageError::Validation(format!("無効なパターンです: `{}` ({})", pattern, e))
    })?;
    Ok(Filter::new(move |value| pattern.matches(value)))
}

/// いずれかのglobパターンに一致
pub fn any_matching<I, S>(patterns: I) -> Result<Filter>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let filters = patterns
        .into_iter()
        .map(|p| matching(p.as_ref()))
        .collect::<Result<Vec<_>>>()?;
    Ok(Filter::new(move |value| {
        filters.iter().any(|f| f.matches(value))
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_with() {
        let filter = starts_with("ubuntu");
        assert!(filter.matches("ubuntu-18.04"));
        assert!(!filter.matches("alpine-3.9"));
    }

    #[test]
    fn test_composition() {
        let either = starts_with("ubuntu") | starts_with("alpine");
        assert!(either.matches("ubuntu-16.04"));
        assert!(either.matches("alpine-3.9"));
        assert!(!either.matches("debian-9"));

        let both = starts_with("ubuntu") & has("18");
        assert!(both.matches("ubuntu-18.04"));
        assert!(!both.matches("ubuntu-16.04"));

        let neither = !either;
        assert!(neither.matches("debian-9"));
    }

    #[test]
    fn test_any_of() {
        let filter = any_of(["cpp", "python-3"]);
        assert!(filter.matches("cpp"));
        assert!(!filter.matches("cpp-benchmark"));
    }

    #[test]
    fn test_matching() {
        let filter = matching("python-3*").unwrap();
        assert!(filter.matches("python-3.7"));
        assert!(!filter.matches("python-2.7"));

        let any = any_matching(["*-benchmark", "java-*"]).unwrap();
        assert!(any.matches("cpp-benchmark"));
        assert!(any.matches("java-11"));
        assert!(!any.matches("cpp"));
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(matches!(matching("[abc"), Err(ImageError::Validation(_))));
    }

    #[test]
    fn test_absent_value_never_matches() {
        assert!(!starts_with("").matches_opt(None));
        assert!(!(!starts_with("x")).matches_opt(None));
        assert!(starts_with("").matches_opt(Some("conda")));
    }
}
