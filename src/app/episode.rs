use chrono::{DateTime, Local, Locale, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Queue entry handed to the player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Episode {
    pub(crate) title: String,
    pub(crate) members: String,
    pub(crate) thumbnail: String,
    pub(crate) duration: u32,
    pub(crate) url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct EpisodeDetail {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) members: String,
    pub(crate) thumbnail: String,
    pub(crate) published_at: String,
    pub(crate) duration: u32,
    pub(crate) duration_as_string: String,
    pub(crate) description: String,
    pub(crate) url: String,
}

impl EpisodeDetail {
    pub(crate) fn to_episode(&self) -> Episode {
        Episode {
            title: self.title.clone(),
            members: self.members.clone(),
            thumbnail: self.thumbnail.clone(),
            duration: self.duration,
            url: self.url.clone(),
        }
    }
}

pub(crate) fn duration_to_time_string(total_seconds: u32) -> String {
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

/// Wall-clock publish time in `tz`. Inputs without an offset are already
/// wall-clock time and are kept as is.
pub(crate) fn parse_published_at<Tz: TimeZone>(raw: &str, tz: &Tz) -> Option<NaiveDateTime> {
    let trimmed = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(tz).naive_local());
    }
    for pattern in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, pattern) {
            return Some(naive);
        }
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

/// Short Brazilian Portuguese date in local time, e.g. `8 jan 21`.
/// Unparseable input is returned unchanged.
pub(crate) fn format_published_at(raw: &str) -> String {
    format_published_at_in(raw, &Local)
}

pub(crate) fn format_published_at_in<Tz: TimeZone>(raw: &str, tz: &Tz) -> String {
    parse_published_at(raw, tz)
        .map(|naive| {
            Utc.from_utc_datetime(&naive)
                .format_localized("%-d %b %y", Locale::pt_BR)
                .to_string()
        })
        .unwrap_or_else(|| raw.to_string())
}

/// Reduces an HTML description to wrapped-friendly plain text.
pub(crate) fn html_to_text(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut tag = String::new();
    let mut in_tag = false;

    for ch in html.chars() {
        match ch {
            '<' => {
                in_tag = true;
                tag.clear();
            }
            '>' if in_tag => {
                in_tag = false;
                let name = tag
                    .trim_start_matches('/')
                    .split(|c: char| c.is_whitespace() || c == '/')
                    .next()
                    .unwrap_or("")
                    .to_ascii_lowercase();
                if matches!(name.as_str(), "p" | "br" | "li" | "div") && !out.ends_with('\n') {
                    out.push('\n');
                }
            }
            _ if in_tag => tag.push(ch),
            _ => out.push(ch),
        }
    }

    let decoded = decode_entities(&out);

    decoded
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn decode_entities(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        let decoded = tail
            .find(';')
            .filter(|end| *end <= 10)
            .and_then(|end| decode_entity(&tail[1..end]).map(|ch| (ch, end)));
        match decoded {
            Some((ch, end)) => {
                out.push(ch);
                rest = &tail[end + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(name: &str) -> Option<char> {
    let code = if let Some(hex) = name
        .strip_prefix("#x")
        .or_else(|| name.strip_prefix("#X"))
    {
        u32::from_str_radix(hex, 16).ok()?
    } else if let Some(dec) = name.strip_prefix('#') {
        dec.parse::<u32>().ok()?
    } else {
        return match name {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            "nbsp" => Some(' '),
            _ => None,
        };
    };
    char::from_u32(code)
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    if max <= 3 {
        return s.chars().take(max).collect();
    }
    s.chars().take(max - 3).collect::<String>() + "..."
}
