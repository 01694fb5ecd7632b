use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::str::FromStr;

use thiserror::Error;

// -----------------------------------------------------------------------------
// FilterInfo

/// What the unmarshaller is about to do, as shown to an [`UnmarshallingFilter`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FilterInfo<'a> {
    /// The class about to be resolved, if any.
    pub class_name: Option<&'a str>,
    /// The length of the array, list or map about to be allocated.
    pub array_length: Option<usize>,
    /// Current nesting depth of the read.
    pub depth: usize,
    /// Instance handles assigned so far.
    pub references: usize,
    /// Bytes consumed so far.
    pub stream_bytes: u64,
}

/// The verdict of an [`UnmarshallingFilter`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterStatus {
    Accept,
    Reject,
    /// No opinion. Treated like [`FilterStatus::Accept`].
    Undecided,
}

// -----------------------------------------------------------------------------
// UnmarshallingFilter

/// Guards the read side against unwanted classes and oversized input.
///
/// Consulted before each class is resolved, before each array or container
/// is allocated, and for each new object. Closures implement this trait.
pub trait UnmarshallingFilter: Send + Sync {
    fn check_input(&self, info: &FilterInfo<'_>) -> FilterStatus;
}

impl<F> UnmarshallingFilter for F
where
    F: Fn(&FilterInfo<'_>) -> FilterStatus + Send + Sync,
{
    #[inline]
    fn check_input(&self, info: &FilterInfo<'_>) -> FilterStatus {
        self(info)
    }
}

// -----------------------------------------------------------------------------
// PatternFilter

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum FilterPatternError {
    #[error("unknown filter limit `{0}`")]
    UnknownLimit(String),
    #[error("invalid value `{value}` for filter limit `{key}`")]
    InvalidLimit { key: String, value: String },
    #[error("empty class pattern")]
    EmptyPattern,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Matcher {
    /// `a.b.C`
    Exact(String),
    /// `a.b.*`, holding `a.b.`
    Package(String),
    /// `a.b.**`, holding `a.b.`
    Subpackages(String),
    /// `a.b.Pre*`, holding `a.b.Pre`
    Prefix(String),
    /// `*`
    Any,
}

impl Matcher {
    fn matches(&self, name: &str) -> bool {
        match self {
            Self::Exact(exact) => name == exact,
            Self::Package(pkg) => name
                .strip_prefix(pkg.as_str())
                .is_some_and(|rest| !rest.contains('.')),
            Self::Subpackages(pkg) => name.starts_with(pkg.as_str()),
            Self::Prefix(prefix) => name.starts_with(prefix.as_str()),
            Self::Any => true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct ClassPattern {
    matcher: Matcher,
    reject: bool,
}

/// A filter parsed from a `;`-separated pattern string.
///
/// - `maxdepth=N`, `maxrefs=N`, `maxbytes=N`, `maxarray=N` reject input
///   exceeding the limit.
/// - `a.b.C` matches one class, `a.b.*` a package, `a.b.**` a package and
///   its subpackages, `Pre*` a name prefix and `*` everything.
/// - A leading `!` rejects the match instead of accepting it.
///
/// Limits are checked first. Class patterns are tried in order and the
/// first match decides. Classes matching no pattern are undecided.
///
/// # Examples
///
/// ```
/// use gw_marshal::strategy::{FilterInfo, FilterStatus, PatternFilter, UnmarshallingFilter};
///
/// let filter: PatternFilter = "maxarray=16;shop.*;!*".parse().unwrap();
/// let info = |class_name, array_length| FilterInfo {
///     class_name,
///     array_length,
///     depth: 1,
///     references: 0,
///     stream_bytes: 0,
/// };
///
/// assert_eq!(filter.check_input(&info(Some("shop.Order"), None)), FilterStatus::Accept);
/// assert_eq!(filter.check_input(&info(Some("shop.sub.Order"), None)), FilterStatus::Reject);
/// assert_eq!(filter.check_input(&info(None, Some(17))), FilterStatus::Reject);
/// assert_eq!(filter.check_input(&info(None, Some(16))), FilterStatus::Undecided);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PatternFilter {
    max_depth: Option<usize>,
    max_refs: Option<usize>,
    max_bytes: Option<u64>,
    max_array: Option<usize>,
    patterns: Vec<ClassPattern>,
}

impl PatternFilter {
    /// Parses a pattern string. See the type documentation for the syntax.
    pub fn parse(pattern: &str) -> Result<Self, FilterPatternError> {
        let mut filter = Self::default();

        for part in pattern.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            if let Some((key, value)) = part.split_once('=') {
                let (key, value) = (key.trim(), value.trim());
                let invalid = || FilterPatternError::InvalidLimit {
                    key: key.to_string(),
                    value: value.to_string(),
                };
                let limit: u64 = value.parse().map_err(|_| invalid())?;
                let as_usize = || usize::try_from(limit).map_err(|_| invalid());
                match key {
                    "maxdepth" => filter.max_depth = Some(as_usize()?),
                    "maxrefs" => filter.max_refs = Some(as_usize()?),
                    "maxarray" => filter.max_array = Some(as_usize()?),
                    "maxbytes" => filter.max_bytes = Some(limit),
                    _ => return Err(FilterPatternError::UnknownLimit(key.to_string())),
                }
                continue;
            }

            let (reject, body) = match part.strip_prefix('!') {
                Some(rest) => (true, rest.trim()),
                None => (false, part),
            };
            let matcher = if body.is_empty() {
                return Err(FilterPatternError::EmptyPattern);
            } else if body == "*" {
                Matcher::Any
            } else if let Some(pkg) = body.strip_suffix(".**") {
                Matcher::Subpackages(alloc::format!("{pkg}."))
            } else if let Some(pkg) = body.strip_suffix(".*") {
                Matcher::Package(alloc::format!("{pkg}."))
            } else if let Some(prefix) = body.strip_suffix('*') {
                Matcher::Prefix(prefix.to_string())
            } else {
                Matcher::Exact(body.to_string())
            };
            filter.patterns.push(ClassPattern { matcher, reject });
        }

        Ok(filter)
    }
}

impl FromStr for PatternFilter {
    type Err = FilterPatternError;

    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl UnmarshallingFilter for PatternFilter {
    fn check_input(&self, info: &FilterInfo<'_>) -> FilterStatus {
        let exceeds = |limit: Option<usize>, actual: usize| limit.is_some_and(|max| actual > max);

        if info
            .array_length
            .is_some_and(|len| exceeds(self.max_array, len))
            || exceeds(self.max_depth, info.depth)
            || exceeds(self.max_refs, info.references)
            || self.max_bytes.is_some_and(|max| info.stream_bytes > max)
        {
            return FilterStatus::Reject;
        }

        let Some(name) = info.class_name else {
            return FilterStatus::Undecided;
        };
        self.patterns
            .iter()
            .find(|p| p.matcher.matches(name))
            .map_or(FilterStatus::Undecided, |p| {
                if p.reject {
                    FilterStatus::Reject
                } else {
                    FilterStatus::Accept
                }
            })
    }
}
