//! Free-text alert queries, English and Chinese.
//!
//! Rules run in a fixed order and later rules overwrite earlier ones:
//! today, relative duration, `top N`, sort phrases, severity, host group,
//! host, explicit limit. Parsing never fails; text that matches nothing
//! yields the default query.
//!
//! This is keyword spotting, not grammar. Known limits: negations ("not
//! high") still select the severity, the dictionary matches substrings
//! ("errors" selects 4, and the sort phrase "按严重" also selects 4),
//! repeated parenthesized digits are kept as written, and only the first
//! host and the first group mentioned are captured.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::types::{AlertQuery, SortKey, TimeRange};

const SECONDS_PER_MINUTE: i64 = 60;
const SECONDS_PER_HOUR: i64 = 3_600;
const SECONDS_PER_DAY: i64 = 86_400;

static RELATIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:最近|last|recent|past)\s*(\d+)\s*(分钟|分|小时|天|(?:minutes?|mins?|hours?|hrs?|h|days?|d)\b)",
    )
    .expect("relative duration pattern")
});

static TOP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\btop\s*(\d+)").expect("top pattern"));

static BY_SEVERITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)by\s+severity|按严重").expect("severity sort pattern"));

static BY_FREQUENCY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)by\s+frequency|按频率").expect("frequency sort pattern"));

static BY_TIME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)by\s+time|按时间").expect("time sort pattern"));

static SEVERITY_DIGIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\((\d)\)").expect("severity digit pattern"));

static GROUP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:主机组\s*[:：]?|host[\s_-]?group\s*[:：])\s*([\w-]+)")
        .expect("group pattern")
});

static HOST_ZH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"主机\s*[:：]?\s*([\w.-]+)").expect("host pattern"));

static HOST_EN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bhost\s*[:：]\s*([\w.-]+)").expect("host pattern"));

static LIMIT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:限制条数\s*[:：]?|\blimit\s*[:：])\s*(\d+)").expect("limit pattern")
});

/// Severity words, matched as substrings of the lower-cased text
const SEVERITY_WORDS: &[(&str, i32)] = &[
    ("disaster", 5),
    ("critical", 5),
    ("灾难", 5),
    ("high", 4),
    ("error", 4),
    ("严重", 4),
    ("average", 3),
    ("warning", 3),
    ("警告", 3),
    ("information", 1),
    ("信息", 1),
    ("not classified", 0),
    ("未分类", 0),
];

/// Translate free text into a structured query, using the current time for
/// relative windows.
pub fn parse_alert_query(text: &str) -> AlertQuery {
    parse_alert_query_at(text, Utc::now())
}

/// [`parse_alert_query`] with an explicit wall clock.
pub fn parse_alert_query_at(text: &str, now: DateTime<Utc>) -> AlertQuery {
    let text = text.trim();
    let lower = text.to_lowercase();
    let mut query = AlertQuery::new();

    if lower.contains("today") || text.contains("今日") || text.contains("今天") {
        query.time_range = Some(TimeRange::today(now));
    }

    if let Some(caps) = RELATIVE.captures(text) {
        if let Ok(n) = caps[1].parse::<i64>() {
            let seconds = n.saturating_mul(unit_seconds(&caps[2]));
            query.time_range = Some(TimeRange::last(now, seconds));
        }
    }

    if let Some(caps) = TOP.captures(text) {
        query.sort_by = Some(SortKey::Severity);
        if let Some(n) = positive(&caps[1]) {
            query.limit = n;
        }
    }

    if BY_SEVERITY.is_match(text) {
        query.sort_by = Some(SortKey::Severity);
    }
    if BY_FREQUENCY.is_match(text) {
        query.sort_by = Some(SortKey::Frequency);
    }
    if BY_TIME.is_match(text) {
        query.sort_by = Some(SortKey::Time);
    }

    query.severities = severities(text, &lower);

    if let Some(caps) = GROUP.captures(text) {
        query.host_groups = Some(vec![caps[1].to_string()]);
    }

    if let Some(host) = host(text) {
        query.hosts = Some(vec![host]);
    }

    if let Some(caps) = LIMIT.captures(text) {
        if let Some(n) = positive(&caps[1]) {
            query.limit = n;
        }
    }

    query
}

fn unit_seconds(unit: &str) -> i64 {
    let unit = unit.to_lowercase();
    if unit.starts_with('分') || unit.starts_with('m') {
        SECONDS_PER_MINUTE
    } else if unit.starts_with('小') || unit.starts_with('h') {
        SECONDS_PER_HOUR
    } else {
        SECONDS_PER_DAY
    }
}

fn positive(digits: &str) -> Option<i64> {
    digits.parse::<i64>().ok().filter(|n| *n >= 1)
}

/// Parenthesized digits such as `(4)` win, exactly as written. Otherwise
/// the dictionary picks, sorted and distinct.
fn severities(text: &str, lower: &str) -> Option<Vec<i32>> {
    let explicit: Vec<i32> = SEVERITY_DIGIT
        .captures_iter(text)
        .filter_map(|caps| caps[1].parse::<i32>().ok())
        .collect();
    if !explicit.is_empty() {
        return Some(explicit);
    }

    let mut picks: Vec<i32> = SEVERITY_WORDS
        .iter()
        .filter(|(word, _)| lower.contains(word))
        .map(|(_, sev)| *sev)
        .collect();
    picks.sort_unstable();
    picks.dedup();

    (!picks.is_empty()).then_some(picks)
}

fn host(text: &str) -> Option<String> {
    // "主机组" is the group label; its "主机" prefix must not capture "组..."
    let zh = HOST_ZH
        .captures_iter(text)
        .map(|caps| caps[1].to_string())
        .find(|token| !token.starts_with('组'));

    zh.or_else(|| HOST_EN.captures(text).map(|caps| caps[1].to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 11, 27, 5, 30, 0).unwrap()
    }

    #[test]
    fn test_top_n_by_severity() {
        let q = parse_alert_query_at("top 5 by severity", now());

        assert_eq!(q.limit, 5);
        assert_eq!(q.sort_by, Some(SortKey::Severity));
        assert_eq!(q.time_range, None);
        assert_eq!(q.severities, None);
    }

    #[test]
    fn test_critical_alerts_today() {
        let q = parse_alert_query_at("critical alerts today", now());

        assert_eq!(q.severities, Some(vec![5]));
        assert_eq!(q.time_range, Some(TimeRange::today(now())));
        assert_eq!(q.limit, 100);
    }

    #[test]
    fn test_plain_text_gives_default_query() {
        assert_eq!(parse_alert_query_at("hello there", now()), AlertQuery::default());
        assert_eq!(parse_alert_query_at("", now()), AlertQuery::default());
    }

    #[test]
    fn test_parenthesized_digits_win_over_dictionary() {
        let q = parse_alert_query_at("disaster (4) and (2) and (4)", now());
        assert_eq!(q.severities, Some(vec![4, 2, 4]));
    }

    #[test]
    fn test_dictionary_is_sorted_and_distinct() {
        let q = parse_alert_query_at("High and critical or Disaster, warning", now());
        assert_eq!(q.severities, Some(vec![3, 4, 5]));

        let q = parse_alert_query_at("未分类 信息", now());
        assert_eq!(q.severities, Some(vec![0, 1]));
    }

    #[test]
    fn test_relative_durations() {
        let end = now().timestamp();

        let q = parse_alert_query_at("最近30分钟的告警", now());
        assert_eq!(q.time_range, Some(TimeRange::new(end - 1_800, end)));

        let q = parse_alert_query_at("最近 2 小时", now());
        assert_eq!(q.time_range, Some(TimeRange::new(end - 7_200, end)));

        let q = parse_alert_query_at("alerts from the last 3 days", now());
        assert_eq!(q.time_range, Some(TimeRange::new(end - 259_200, end)));

        let q = parse_alert_query_at("past 15 min", now());
        assert_eq!(q.time_range, Some(TimeRange::new(end - 900, end)));

        let q = parse_alert_query_at("last 6h", now());
        assert_eq!(q.time_range, Some(TimeRange::new(end - 21_600, end)));
    }

    #[test]
    fn test_relative_duration_overrides_today() {
        let end = now().timestamp();
        let q = parse_alert_query_at("today, last 10 minutes", now());
        assert_eq!(q.time_range, Some(TimeRange::new(end - 600, end)));
    }

    #[test]
    fn test_later_sort_phrase_wins() {
        let q = parse_alert_query_at("top 3 by frequency", now());
        assert_eq!(q.limit, 3);
        assert_eq!(q.sort_by, Some(SortKey::Frequency));

        let q = parse_alert_query_at("按严重 按时间", now());
        assert_eq!(q.sort_by, Some(SortKey::Time));
    }

    #[test]
    fn test_severity_sort_phrase_also_selects_high() {
        let q = parse_alert_query_at("按严重排序", now());
        assert_eq!(q.sort_by, Some(SortKey::Severity));
        assert_eq!(q.severities, Some(vec![4]));
    }

    #[test]
    fn test_chinese_group_host_and_limit() {
        let q = parse_alert_query_at("主机组:Linux-servers 主机：web-01.prod 限制条数 20 严重", now());

        assert_eq!(q.host_groups, Some(vec!["Linux-servers".to_string()]));
        assert_eq!(q.hosts, Some(vec!["web-01.prod".to_string()]));
        assert_eq!(q.limit, 20);
        assert_eq!(q.severities, Some(vec![4]));
    }

    #[test]
    fn test_group_label_alone_sets_no_host() {
        let q = parse_alert_query_at("主机组 databases", now());
        assert_eq!(q.host_groups, Some(vec!["databases".to_string()]));
        assert_eq!(q.hosts, None);
    }

    #[test]
    fn test_english_group_host_and_limit() {
        let q = parse_alert_query_at("host group: db host: db-01 limit: 7", now());

        assert_eq!(q.host_groups, Some(vec!["db".to_string()]));
        assert_eq!(q.hosts, Some(vec!["db-01".to_string()]));
        assert_eq!(q.limit, 7);
    }

    #[test]
    fn test_zero_limits_keep_previous_value() {
        let q = parse_alert_query_at("top 0", now());
        assert_eq!(q.limit, 100);
        assert_eq!(q.sort_by, Some(SortKey::Severity));

        let q = parse_alert_query_at("top 4 限制条数:0", now());
        assert_eq!(q.limit, 4);
    }

    #[test]
    fn test_explicit_limit_overrides_top() {
        let q = parse_alert_query_at("top 10 limit: 2", now());
        assert_eq!(q.limit, 2);
    }
}
