use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;

use super::models::{RawDetection, SubmarineEta};
use super::normalizer::normalize;

/// Countdown notations seen in the voyage list, in precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeFormat {
    /// `1:05`, `12:40`
    Colon,
    /// `1時間 05分`, `2時間`
    HoursMinutes,
    /// `49分`
    MinutesOnly,
}

pub struct FormatMatcher {
    pub format: TimeFormat,
    pattern: Regex,
}

impl FormatMatcher {
    fn new(format: TimeFormat, pattern: &str) -> Self {
        let pattern = match Regex::new(pattern) {
            Ok(regex) => regex,
            Err(err) => panic!("invalid built-in pattern for {format:?}: {err}"),
        };
        Self { format, pattern }
    }

    /// Minutes encoded in `segment`, or `None` when this notation is absent or reads as zero.
    pub fn parse(&self, segment: &str) -> Option<u32> {
        let caps = self.pattern.captures(segment)?;
        let number = |name: &str| -> Option<u32> {
            caps.name(name).and_then(|m| m.as_str().parse::<u32>().ok())
        };

        let minutes = match self.format {
            TimeFormat::Colon => {
                let mm = number("m")?;
                if mm >= 60 {
                    return None;
                }
                number("h")?.checked_mul(60)?.checked_add(mm)?
            }
            TimeFormat::HoursMinutes => {
                let hours = number("h")?;
                let mm = number("m").unwrap_or(0);
                hours.checked_mul(60)?.checked_add(mm)?
            }
            TimeFormat::MinutesOnly => number("m")?,
        };

        (minutes > 0).then_some(minutes)
    }
}

fn matchers() -> &'static [FormatMatcher] {
    static MATCHERS: OnceLock<Vec<FormatMatcher>> = OnceLock::new();
    MATCHERS.get_or_init(|| {
        vec![
            FormatMatcher::new(
                TimeFormat::Colon,
                r"(?:^|\D)(?P<h>\d{1,2})\s*:\s*(?P<m>\d{2})(?:\D|$)",
            ),
            FormatMatcher::new(
                TimeFormat::HoursMinutes,
                r"(?P<h>\d{1,3})\s*時間(?:\s*(?P<m>\d{1,3})\s*分)?",
            ),
            FormatMatcher::new(TimeFormat::MinutesOnly, r"(?P<m>\d{1,4})\s*分"),
        ]
    })
}

fn bracket_pattern() -> &'static Regex {
    static BRACKET: OnceLock<Regex> = OnceLock::new();
    BRACKET.get_or_init(|| match Regex::new(r"\[([^\]]*)\]") {
        Ok(regex) => regex,
        Err(err) => panic!("invalid bracket pattern: {err}"),
    })
}

/// First matcher that yields a positive value wins.
pub fn parse_remaining(segment: &str) -> Option<u32> {
    matchers().iter().find_map(|matcher| matcher.parse(segment))
}

/// Split an already normalized line into name and countdown segments.
pub fn detect_line(line: &str) -> Option<RawDetection> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let brackets = bracket_pattern();
    let (name, rest) = match brackets.find(line) {
        Some(first) => (line[..first.start()].trim(), &line[first.start()..]),
        None => match line.split_once(char::is_whitespace) {
            Some((head, tail)) => (head, tail),
            None => (line, ""),
        },
    };
    if name.is_empty() {
        return None;
    }

    let bracket_segment = brackets
        .captures_iter(rest)
        .last()
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string());
    let tail_segment = brackets.replace_all(rest, " ").into_owned();

    Some(RawDetection {
        name: name.to_string(),
        bracket_segment,
        tail_segment,
    })
}

fn remaining_for(detection: &RawDetection) -> Option<u32> {
    detection
        .bracket_segment
        .as_deref()
        .and_then(parse_remaining)
        .or_else(|| parse_remaining(&detection.tail_segment))
}

/// Every line of `text` that yields a name and a positive countdown, in input order.
/// Duplicates are kept; see [`super::reconcile`].
pub fn parse_candidates(text: &str, now: DateTime<Utc>) -> Vec<SubmarineEta> {
    let normalized = normalize(text);
    normalized
        .lines()
        .filter_map(detect_line)
        .filter_map(|detection| {
            let remaining = remaining_for(&detection)?;
            Some(SubmarineEta::new(detection.name, remaining, now))
        })
        .collect()
}
