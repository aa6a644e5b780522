//! Tags: name/value annotations on records and handling entries
//!
//! Tag collections are ordered for storage but unordered for matching.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::error::{StreamError, StreamResult};
use crate::strategy::TagMatchStrategy;

/// A name/value pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Tag {
    /// Tag name, never blank
    pub name: String,
    /// Optional tag value
    pub value: Option<String>,
}

impl Tag {
    /// Tag with a value
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
        }
    }

    /// Tag with only a name
    pub fn flag(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(v) => write!(f, "{}={}", self.name, v),
            None => f.write_str(&self.name),
        }
    }
}

/// Validate a tag collection
///
/// # Errors
///
/// Returns `InvalidArgument` if any tag has a blank name.
pub fn validate_tags(tags: &[Tag]) -> StreamResult<()> {
    if let Some(position) = tags.iter().position(|t| t.name.trim().is_empty()) {
        return Err(StreamError::invalid_argument(format!(
            "tag at position {} has a blank name",
            position
        )));
    }
    Ok(())
}

/// Collect tags from a loosely typed source, rejecting missing elements
///
/// # Errors
///
/// Returns `InvalidArgument` if any element is `None` or has a blank name.
pub fn collect_tags<I>(tags: I) -> StreamResult<Vec<Tag>>
where
    I: IntoIterator<Item = Option<Tag>>,
{
    let mut collected = Vec::new();
    for (position, tag) in tags.into_iter().enumerate() {
        match tag {
            Some(tag) => collected.push(tag),
            None => {
                return Err(StreamError::invalid_argument(format!(
                    "tag collection contains a null element at position {}",
                    position
                )))
            }
        }
    }
    validate_tags(&collected)?;
    Ok(collected)
}

/// Whether `candidate` tags satisfy `query` tags under the strategy
///
/// An empty query imposes no constraint.
///
/// # Errors
///
/// Returns `InvalidArgument` for the `Unknown` strategy.
pub fn tags_match(candidate: &[Tag], query: &[Tag], strategy: TagMatchStrategy) -> StreamResult<bool> {
    strategy.validate()?;
    if query.is_empty() {
        return Ok(true);
    }

    let candidate: HashSet<&Tag> = candidate.iter().collect();
    let result = match strategy {
        TagMatchStrategy::RecordContainsAllQueryTags => query.iter().all(|t| candidate.contains(t)),
        TagMatchStrategy::RecordContainsAnyQueryTag => query.iter().any(|t| candidate.contains(t)),
        TagMatchStrategy::RecordTagsEqualQueryTags => {
            let query: HashSet<&Tag> = query.iter().collect();
            candidate == query
        }
        TagMatchStrategy::Unknown => {
            return Err(StreamError::invalid_argument("tag match strategy is Unknown"))
        }
    };
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(pairs: &[(&str, &str)]) -> Vec<Tag> {
        pairs.iter().map(|(n, v)| Tag::new(*n, *v)).collect()
    }

    #[test]
    fn superset_is_default_behavior() {
        let candidate = tags(&[("env", "prod"), ("team", "core"), ("extra", "x")]);
        let query = tags(&[("team", "core"), ("env", "prod")]);
        assert!(tags_match(&candidate, &query, TagMatchStrategy::default()).unwrap());
        let missing = tags(&[("env", "dev")]);
        assert!(!tags_match(&candidate, &missing, TagMatchStrategy::default()).unwrap());
    }

    #[test]
    fn any_strategy() {
        let candidate = tags(&[("env", "prod")]);
        let query = tags(&[("env", "dev"), ("env", "prod")]);
        assert!(tags_match(&candidate, &query, TagMatchStrategy::RecordContainsAnyQueryTag).unwrap());
        assert!(!tags_match(&candidate, &query, TagMatchStrategy::RecordContainsAllQueryTags).unwrap());
    }

    #[test]
    fn equality_is_order_insensitive() {
        let candidate = tags(&[("a", "1"), ("b", "2")]);
        let query = tags(&[("b", "2"), ("a", "1")]);
        assert!(tags_match(&candidate, &query, TagMatchStrategy::RecordTagsEqualQueryTags).unwrap());
        let wider = tags(&[("a", "1"), ("b", "2"), ("c", "3")]);
        assert!(!tags_match(&wider, &query, TagMatchStrategy::RecordTagsEqualQueryTags).unwrap());
    }

    #[test]
    fn empty_query_matches_everything() {
        let candidate = tags(&[("a", "1")]);
        assert!(tags_match(&candidate, &[], TagMatchStrategy::RecordTagsEqualQueryTags).unwrap());
        assert!(tags_match(&[], &[], TagMatchStrategy::RecordContainsAnyQueryTag).unwrap());
    }

    #[test]
    fn unknown_strategy_rejected() {
        assert!(tags_match(&[], &[], TagMatchStrategy::Unknown).is_err());
    }

    #[test]
    fn null_element_rejected() {
        let err = collect_tags(vec![Some(Tag::flag("a")), None]).unwrap_err();
        assert!(err.is_invalid_argument());
        assert!(err.to_string().contains("position 1"));
        assert_eq!(collect_tags(vec![Some(Tag::flag("a"))]).unwrap().len(), 1);
    }

    #[test]
    fn blank_name_rejected() {
        assert!(validate_tags(&[Tag::new(" ", "x")]).is_err());
        assert!(validate_tags(&[Tag::flag("ok")]).is_ok());
    }
}
