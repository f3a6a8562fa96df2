use common::domain::{DomainError, DomainResult};

const SINGLE_LEVEL_WILDCARD: &str = "+";
const MULTI_LEVEL_WILDCARD: &str = "#";
const SHARED_SUBSCRIPTION_PREFIX: &str = "$share/";
const QUEUE_SUBSCRIPTION_PREFIX: &str = "$queue/";

/// Check that `filter` is a well-formed MQTT subscription filter.
///
/// `+` must occupy a whole level, `#` must occupy the whole last level.
/// Shared (`$share/<group>/<filter>`) and queue (`$queue/<filter>`) subscriptions
/// are accepted when the group is a plain level and the inner filter is valid.
///
/// # Examples
/// ```
/// use ingestion::mqtt::validate_topic_filter;
///
/// assert!(validate_topic_filter("aiotgarage/+/+/presence").is_ok());
/// assert!(validate_topic_filter("aiotgarage/#/presence").is_err());
/// ```
pub fn validate_topic_filter(filter: &str) -> DomainResult<()> {
    if filter.is_empty() {
        return Err(DomainError::InvalidTopicFilter(
            "topic filter cannot be empty".to_string(),
        ));
    }

    if let Some(rest) = filter.strip_prefix(SHARED_SUBSCRIPTION_PREFIX) {
        match rest.split_once('/') {
            Some((group, inner))
                if !group.is_empty() && !group.contains(['+', '#']) && !inner.is_empty() => {}
            _ => {
                return Err(DomainError::InvalidTopicFilter(format!(
                    "shared subscription '{}' must be $share/<group>/<filter>",
                    filter
                )))
            }
        }
    }
    if filter == "$queue/" {
        return Err(DomainError::InvalidTopicFilter(
            "queue subscription needs a filter after $queue/".to_string(),
        ));
    }

    let delivered = delivered_topic_filter(filter);
    let levels: Vec<&str> = delivered.split('/').collect();
    let last = levels.len() - 1;

    for (index, level) in levels.iter().enumerate() {
        if level.contains('#') && (*level != MULTI_LEVEL_WILDCARD || index != last) {
            return Err(DomainError::InvalidTopicFilter(format!(
                "'#' must be the whole final level in '{}'",
                filter
            )));
        }
        if level.contains('+') && *level != SINGLE_LEVEL_WILDCARD {
            return Err(DomainError::InvalidTopicFilter(format!(
                "'+' must occupy a whole level in '{}'",
                filter
            )));
        }
    }

    Ok(())
}

/// The part of a subscription filter that delivered topics are matched against.
///
/// Brokers strip `$share/<group>/` and `$queue/` before delivery, so those prefixes
/// never appear in a received topic.
pub fn delivered_topic_filter(filter: &str) -> &str {
    if let Some(rest) = filter.strip_prefix(SHARED_SUBSCRIPTION_PREFIX) {
        return rest.split_once('/').map_or(rest, |(_, inner)| inner);
    }
    filter.strip_prefix(QUEUE_SUBSCRIPTION_PREFIX).unwrap_or(filter)
}

/// Returns true when `topic` is matched by the subscription `filter`.
///
/// Topics starting with `$` are not matched by a leading wildcard.
pub fn topic_matches(filter: &str, topic: &str) -> bool {
    if topic.starts_with('$')
        && (filter.starts_with(SINGLE_LEVEL_WILDCARD) || filter.starts_with(MULTI_LEVEL_WILDCARD))
    {
        return false;
    }

    let mut filter_levels = filter.split('/');
    let mut topic_levels = topic.split('/');

    loop {
        match (filter_levels.next(), topic_levels.next()) {
            // `#` also matches the parent level, so "a/#" matches "a"
            (Some(MULTI_LEVEL_WILDCARD), _) => return true,
            (Some(SINGLE_LEVEL_WILDCARD), Some(_)) => continue,
            (Some(expected), Some(actual)) if expected == actual => continue,
            (None, None) => return true,
            _ => return false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_accepts_wildcards_in_whole_levels() {
        assert!(validate_topic_filter("aiotgarage/+/+/presence").is_ok());
        assert!(validate_topic_filter("automaatio/#").is_ok());
        assert!(validate_topic_filter("#").is_ok());
        assert!(validate_topic_filter("+").is_ok());
        assert!(validate_topic_filter("plain/topic").is_ok());
    }

    #[test]
    fn test_validate_rejects_empty() {
        assert!(validate_topic_filter("").is_err());
    }

    #[test]
    fn test_validate_rejects_misplaced_multi_level() {
        assert!(validate_topic_filter("a/#/b").is_err());
        assert!(validate_topic_filter("a/b#").is_err());
    }

    #[test]
    fn test_validate_rejects_partial_single_level() {
        assert!(validate_topic_filter("a/b+/c").is_err());
        assert!(validate_topic_filter("a/++").is_err());
    }

    #[test]
    fn test_single_level_wildcard_matches_exactly_one_level() {
        let filter = "aiotgarage/+/+/presence";
        assert!(topic_matches(filter, "aiotgarage/hall/cam1/presence"));
        assert!(!topic_matches(filter, "aiotgarage/hall/presence"));
        assert!(!topic_matches(filter, "aiotgarage/hall/cam1/extra/presence"));
        assert!(!topic_matches(filter, "other/hall/cam1/presence"));
    }

    #[test]
    fn test_multi_level_wildcard_matches_remaining_levels() {
        assert!(topic_matches("automaatio/#", "automaatio/a/b/c"));
        assert!(topic_matches("automaatio/#", "automaatio"));
        assert!(topic_matches("#", "anything/at/all"));
        assert!(!topic_matches("automaatio/#", "other/a"));
    }

    #[test]
    fn test_empty_levels_are_levels() {
        assert!(topic_matches("a/+/c", "a//c"));
        assert!(!topic_matches("a/b", "a/b/"));
    }

    #[test]
    fn test_system_topics_not_matched_by_leading_wildcard() {
        assert!(!topic_matches("#", "$SYS/broker/uptime"));
        assert!(!topic_matches("+/broker/uptime", "$SYS/broker/uptime"));
        assert!(topic_matches("$SYS/#", "$SYS/broker/uptime"));
    }

    #[test]
    fn test_shared_and_queue_subscriptions_validated_on_inner_filter() {
        assert!(validate_topic_filter("$share/bridges/aiotgarage/+/+/presence").is_ok());
        assert!(validate_topic_filter("$queue/aiotgarage/#").is_ok());
        assert!(validate_topic_filter("$share/bridges").is_err());
        assert!(validate_topic_filter("$share//aiotgarage/#").is_err());
        assert!(validate_topic_filter("$share/+/aiotgarage/#").is_err());
        assert!(validate_topic_filter("$share/bridges/a/#/b").is_err());
        assert!(validate_topic_filter("$queue/").is_err());
    }

    #[test]
    fn test_delivered_filter_drops_subscription_prefix() {
        assert_eq!(
            delivered_topic_filter("$share/bridges/aiotgarage/+/+/presence"),
            "aiotgarage/+/+/presence"
        );
        assert_eq!(delivered_topic_filter("$queue/automaatio/#"), "automaatio/#");
        assert_eq!(delivered_topic_filter("aiotgarage/+/+/presence"), "aiotgarage/+/+/presence");
        assert_eq!(delivered_topic_filter("$SYS/#"), "$SYS/#");
    }
}
