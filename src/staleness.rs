//! Generation stamps embedded in captured pages and the policy deciding
//! whether a captured page must be regenerated.

use std::borrow::Cow;
use std::cmp::Ordering;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

static STAMP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<!--\s*StaticMirror:\s*generated=([^;]+);\s*version=([^\s;]+)\s*-->")
        .expect("static pattern")
});

/// Machine-readable record of when and by which version a page was captured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationStamp {
    pub generated_at: DateTime<Utc>,
    pub version: String,
}

impl GenerationStamp {
    pub fn new(generated_at: DateTime<Utc>, version: impl Into<String>) -> Self {
        Self {
            generated_at,
            version: version.into(),
        }
    }

    pub fn render(&self) -> String {
        format!(
            "<!-- StaticMirror: generated={}; version={} -->",
            self.generated_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.version
        )
    }

    /// Raw fields of the last stamp in `html`, which is the one appended at
    /// capture time. The timestamp is left unparsed.
    pub fn find(html: &str) -> Option<(String, String)> {
        let caps = STAMP.captures_iter(html).last()?;
        Some((caps[1].trim().to_string(), caps[2].trim().to_string()))
    }

    /// Removes every stamp-shaped comment, so page content cannot carry a
    /// stamp of its own into the captured file.
    pub fn strip(html: &str) -> Cow<'_, str> {
        STAMP.replace_all(html, "")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Freshness {
    Fresh,
    /// No captured file exists yet.
    Missing,
    /// The file carries no stamp (foreign or legacy file).
    Unstamped,
    InvalidTimestamp(String),
    OlderVersion { cached: String },
    /// Stamped later than the current time.
    FromFuture { ahead_secs: i64 },
    Expired { age_secs: i64 },
}

impl Freshness {
    pub fn is_stale(&self) -> bool {
        !matches!(self, Freshness::Fresh)
    }
}

#[derive(Debug, Clone)]
pub struct StalenessPolicy {
    pub current_version: String,
    /// Zero disables the age check; the version check always applies.
    pub ttl: Duration,
}

impl StalenessPolicy {
    pub fn new(current_version: impl Into<String>, ttl: Duration) -> Self {
        Self {
            current_version: current_version.into(),
            ttl,
        }
    }

    /// Judges a previously captured page (`None` when nothing was captured).
    pub fn evaluate(&self, captured: Option<&str>, now: DateTime<Utc>) -> Freshness {
        let Some(html) = captured else {
            return Freshness::Missing;
        };
        let Some((generated, version)) = GenerationStamp::find(html) else {
            return Freshness::Unstamped;
        };

        if compare_versions(&version, &self.current_version) == Ordering::Less {
            return Freshness::OlderVersion { cached: version };
        }

        let generated_at = match DateTime::parse_from_rfc3339(&generated) {
            Ok(at) => at.with_timezone(&Utc),
            Err(_) => return Freshness::InvalidTimestamp(generated),
        };

        let age_secs = (now - generated_at).num_seconds();
        if age_secs < 0 {
            return Freshness::FromFuture {
                ahead_secs: -age_secs,
            };
        }
        if self.ttl.is_zero() {
            return Freshness::Fresh;
        }

        let ttl_secs = i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX);
        if age_secs > ttl_secs {
            Freshness::Expired { age_secs }
        } else {
            Freshness::Fresh
        }
    }
}

/// Dot-separated version comparison. Numeric parts compare as numbers,
/// other parts lexically, and missing parts count as `0`.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let left: Vec<&str> = a.split('.').collect();
    let right: Vec<&str> = b.split('.').collect();

    for i in 0..left.len().max(right.len()) {
        let l = left.get(i).copied().unwrap_or("0");
        let r = right.get(i).copied().unwrap_or("0");
        let ordering = match (l.parse::<u64>(), r.parse::<u64>()) {
            (Ok(l), Ok(r)) => l.cmp(&r),
            _ => l.cmp(r),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn page(stamp: &GenerationStamp) -> String {
        format!("<html><body><p>hi</p>{}</body></html>", stamp.render())
    }

    #[test]
    fn test_stamp_renders_and_is_found() {
        let stamp = GenerationStamp::new(now(), "1.2.0");
        assert_eq!(
            stamp.render(),
            "<!-- StaticMirror: generated=2026-03-01T12:00:00Z; version=1.2.0 -->"
        );
        assert_eq!(
            GenerationStamp::find(&page(&stamp)),
            Some(("2026-03-01T12:00:00Z".to_string(), "1.2.0".to_string()))
        );
    }

    #[test]
    fn test_missing_and_unstamped_are_stale() {
        let policy = StalenessPolicy::new("1.0.0", Duration::from_secs(3600));
        assert_eq!(policy.evaluate(None, now()), Freshness::Missing);
        assert_eq!(
            policy.evaluate(Some("<html><body>old</body></html>"), now()),
            Freshness::Unstamped
        );
    }

    #[test]
    fn test_current_version_within_ttl_is_fresh() {
        let policy = StalenessPolicy::new("1.0.0", Duration::from_secs(3600));
        let html = page(&GenerationStamp::new(now(), "1.0.0"));
        assert_eq!(policy.evaluate(Some(&html), now()), Freshness::Fresh);
    }

    #[test]
    fn test_older_version_is_stale_regardless_of_age() {
        let policy = StalenessPolicy::new("1.10.0", Duration::ZERO);
        let html = page(&GenerationStamp::new(now(), "1.9.3"));
        assert_eq!(
            policy.evaluate(Some(&html), now()),
            Freshness::OlderVersion {
                cached: "1.9.3".into()
            }
        );
    }

    #[test]
    fn test_ttl_expiry_and_zero_ttl() {
        let stamp = GenerationStamp::new(now() - chrono::Duration::hours(2), "1.0.0");
        let html = page(&stamp);

        let hourly = StalenessPolicy::new("1.0.0", Duration::from_secs(3600));
        assert_eq!(
            hourly.evaluate(Some(&html), now()),
            Freshness::Expired { age_secs: 7200 }
        );

        let forever = StalenessPolicy::new("1.0.0", Duration::ZERO);
        assert_eq!(forever.evaluate(Some(&html), now()), Freshness::Fresh);
    }

    #[test]
    fn test_unparseable_timestamp_is_stale() {
        let html = "<!-- StaticMirror: generated=yesterday; version=1.0.0 -->";
        let policy = StalenessPolicy::new("1.0.0", Duration::from_secs(60));
        assert!(policy.evaluate(Some(html), now()).is_stale());
    }

    #[test]
    fn test_future_stamp_is_stale_even_without_ttl() {
        let html = page(&GenerationStamp::new(now() + chrono::Duration::days(365), "1.0.0"));
        for ttl in [Duration::ZERO, Duration::from_secs(3600)] {
            let policy = StalenessPolicy::new("1.0.0", ttl);
            assert_eq!(
                policy.evaluate(Some(&html), now()),
                Freshness::FromFuture {
                    ahead_secs: 365 * 86_400
                }
            );
        }
    }

    #[test]
    fn test_huge_ttl_does_not_wrap() {
        let html = page(&GenerationStamp::new(now() - chrono::Duration::days(30), "1.0.0"));
        let policy = StalenessPolicy::new("1.0.0", Duration::from_secs(u64::MAX));
        assert_eq!(policy.evaluate(Some(&html), now()), Freshness::Fresh);
    }

    #[test]
    fn test_last_stamp_wins_and_strip_removes_all() {
        let forged = "<!-- StaticMirror: generated=2099-01-01T00:00:00Z; version=999 -->";
        let ours = GenerationStamp::new(now(), "1.0.0");
        let html = format!("<body><p>{forged}</p>{}</body>", ours.render());

        assert_eq!(
            GenerationStamp::find(&html),
            Some(("2026-03-01T12:00:00Z".to_string(), "1.0.0".to_string()))
        );
        let stripped = GenerationStamp::strip(&html);
        assert_eq!(stripped, "<body><p></p></body>");
        assert_eq!(GenerationStamp::find(&stripped), None);
    }

    #[test]
    fn test_compare_versions() {
        assert_eq!(compare_versions("1.10", "1.9"), Ordering::Greater);
        assert_eq!(compare_versions("2.1", "2.1.0"), Ordering::Equal);
        assert_eq!(compare_versions("2.0", "2.0.1"), Ordering::Less);
        assert_eq!(compare_versions("1.0.0-beta", "1.0.0-rc"), Ordering::Less);
    }
}
