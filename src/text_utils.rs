use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use sha2::{Digest, Sha256};

/// Hex encoded SHA-256 of the whole file, front-matter included.
pub fn content_hash(raw: &[u8]) -> String {
    hex::encode(Sha256::digest(raw))
}

/// Url friendly name of a title, e.g. `Ábaco & Friends!` becomes `abaco-friends`.
pub fn slugify(title: &str) -> String {
    let ascii = unidecode::unidecode(title);

    let mut slug = String::with_capacity(ascii.len());
    let mut pending_sep = false;
    for c in ascii.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_sep && !slug.is_empty() {
                slug.push('-');
            }
            pending_sep = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_sep = true;
        }
    }
    slug
}

fn to_int<T: std::str::FromStr>(num_str: Option<&str>, default: T, date_str: &str) -> Result<T, String> {
    match num_str {
        None => Ok(default),
        Some(num_str) => num_str.parse::<T>()
            .map_err(|_| format!("Error parsing {} from the date {}", num_str, date_str)),
    }
}

fn numeric_date_time(caps: &Captures, buf: &str) -> Result<NaiveDateTime, String> {
    let get = |i: usize| caps.get(i).map(|m| m.as_str());

    let y: i32 = to_int(get(1), 0, buf)?;
    let m: u32 = to_int(get(2), 1, buf)?;
    let d: u32 = to_int(get(3), 1, buf)?;
    let h: u32 = to_int(get(4), 0, buf)?;
    let mn: u32 = to_int(get(5), 0, buf)?;
    let s: u32 = to_int(get(6), 0, buf)?;

    // ".5" is half a second, so the fraction is right padded up to nanoseconds
    let nanos: u32 = match get(7) {
        None => 0,
        Some(frac) => {
            let digits = format!("{:0<9}", &frac[1..]);
            to_int(Some(&digits[..9]), 0, buf)?
        }
    };

    let date = NaiveDate::from_ymd_opt(y, m, d)
        .ok_or_else(|| format!("Invalid calendar date {}", buf))?;
    let time = NaiveTime::from_hms_nano_opt(h, mn, s, nanos)
        .ok_or_else(|| format!("Invalid time of day {}", buf))?;

    Ok(NaiveDateTime::new(date, time))
}

/// Lenient date parser for front-matter values.
///
/// Accepts RFC 3339, RFC 2822, numeric dates with optional time
/// (`2024-1-2`, `2024/01/02 10:42`, `2017-09-10 10:42:32.123`, `2024-05`, `2024`)
/// and dates with month names (`January 2, 2024`, `2 Jan 2024`).
/// Values carrying an offset are converted to UTC.
pub fn parse_date_time(buf: &str) -> Result<NaiveDateTime, String> {
    lazy_static! {
        static ref NUMERIC_REGEX: Regex = Regex::new(
            r"^(\d{4})(?:[-/](\d{1,2})(?:[-/](\d{1,2})(?:[ T](\d{1,2}):(\d{1,2})(?::(\d{1,2})(\.\d{1,9})?)?)?)?)?$"
        ).unwrap();
    }

    let buf = buf.trim();
    if buf.is_empty() {
        return Err("Empty date".to_string());
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(buf) {
        return Ok(dt.naive_utc());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(buf) {
        return Ok(dt.naive_utc());
    }
    if let Ok(dt) = DateTime::parse_from_str(buf, "%Y-%m-%d %H:%M:%S %z") {
        return Ok(dt.naive_utc());
    }

    if let Some(caps) = NUMERIC_REGEX.captures(buf) {
        return numeric_date_time(&caps, buf);
    }

    for fmt in ["%B %d, %Y %H:%M", "%B %d, %Y %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(buf, fmt) {
            return Ok(dt);
        }
    }
    for fmt in ["%B %d, %Y", "%B %d %Y", "%d %B %Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(buf, fmt) {
            return Ok(NaiveDateTime::new(date, NaiveTime::MIN));
        }
    }

    Err(format!("Unable to parse date time {}", buf))
}

pub fn format_date_time(date_time: &NaiveDateTime) -> String {
    date_time.format("%Y-%m-%d %H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use chrono::{Datelike, Timelike};

    use super::*;

    #[test]
    fn test_parse_date_time() {
        let date_time = parse_date_time("2017-09-10 10:42:32.123").unwrap();
        assert_eq!(format_date_time(&date_time), "2017-09-10 10:42:32");
        assert_eq!(date_time.nanosecond(), 123_000_000);

        let date_time = parse_date_time("2017-09-10 10:42:32").unwrap();
        assert_eq!(format_date_time(&date_time), "2017-09-10 10:42:32");

        let date_time = parse_date_time("2024-01-01").unwrap();
        assert_eq!(format_date_time(&date_time), "2024-01-01 00:00:00");

        let date_time = parse_date_time("  2024-1-2 9:05 ").unwrap();
        assert_eq!(format_date_time(&date_time), "2024-01-02 09:05:00");

        let date_time = parse_date_time("2024/03/04").unwrap();
        assert_eq!(format_date_time(&date_time), "2024-03-04 00:00:00");

        let date_time = parse_date_time("2024-05").unwrap();
        assert_eq!(format_date_time(&date_time), "2024-05-01 00:00:00");

        let date_time = parse_date_time("2019").unwrap();
        assert_eq!(date_time.year(), 2019);
    }

    #[test]
    fn test_parse_date_time_with_zone() {
        let date_time = parse_date_time("2024-02-27T06:20:53+02:00").unwrap();
        assert_eq!(format_date_time(&date_time), "2024-02-27 04:20:53");

        let date_time = parse_date_time("Tue, 2 Jan 2024 05:06:07 +0000").unwrap();
        assert_eq!(format_date_time(&date_time), "2024-01-02 05:06:07");

        let date_time = parse_date_time("2024-01-02 05:06:07 -0100").unwrap();
        assert_eq!(format_date_time(&date_time), "2024-01-02 06:06:07");
    }

    #[test]
    fn test_parse_date_time_month_names() {
        let date_time = parse_date_time("January 2, 2024").unwrap();
        assert_eq!(format_date_time(&date_time), "2024-01-02 00:00:00");

        let date_time = parse_date_time("Jan 2, 2024").unwrap();
        assert_eq!(format_date_time(&date_time), "2024-01-02 00:00:00");

        let date_time = parse_date_time("2 March 2024").unwrap();
        assert_eq!(format_date_time(&date_time), "2024-03-02 00:00:00");
    }

    #[test]
    fn test_parse_date_time_invalid() {
        assert!(parse_date_time("").is_err());
        assert!(parse_date_time("yesterday-ish").is_err());
        assert!(parse_date_time("2024-13-01").is_err());
        assert!(parse_date_time("2024-02-30").is_err());
        assert!(parse_date_time("2024-01-01 25:00").is_err());
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Hello World"), "hello-world");
        assert_eq!(slugify("  Rust: 10 things -- you (should) know!  "), "rust-10-things-you-should-know");
        assert_eq!(slugify("Post title of mine ábaco - dir2"), "post-title-of-mine-abaco-dir2");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn test_slugify_idempotent() {
        for title in ["Hello World", "Ça va? Très bien", "a--b__c", "Über straße 42"] {
            let once = slugify(title);
            assert_eq!(slugify(&once), once);
            assert!(once.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
            assert!(!once.starts_with('-') && !once.ends_with('-'));
        }
    }

    #[test]
    fn test_content_hash() {
        let a = content_hash(b"title: a\ndate: 2024-01-01\n\nbody");
        let b = content_hash(b"title: a\ndate: 2024-01-01\n\nbody");
        let c = content_hash(b"title: a\ndate: 2024-01-02\n\nbody");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
        assert_eq!(
            content_hash(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
