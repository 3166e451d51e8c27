use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::fmt;

use crate::error::{Error, Result};
use crate::xml::find_element;

/// Order of preference for the source date
const RELEASE_DATE_TAGS: &[(&str, DateSource)] = &[
    ("releasedate", DateSource::ReleaseDate),
    ("premiered", DateSource::Premiered),
];

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateSource {
    ReleaseDate,
    Premiered,
}

impl DateSource {
    pub fn tag(self) -> &'static str {
        match self {
            DateSource::ReleaseDate => "releasedate",
            DateSource::Premiered => "premiered",
        }
    }
}

/// Release date of a movie pinned to the configured time of day
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateValue {
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub source: DateSource,
}

impl DateValue {
    pub fn datetime(&self) -> NaiveDateTime {
        self.date.and_time(self.time)
    }

    /// The string written into both the metadata and the descriptor file
    pub fn timestamp(&self) -> String {
        self.datetime().format(TIMESTAMP_FORMAT).to_string()
    }
}

impl fmt::Display for DateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.timestamp())
    }
}

/// Extract the release date from metadata file content, falling back to the
/// premiere date when the release date is absent, empty or unparsable.
pub fn extract_date(content: &str, time: NaiveTime) -> Result<DateValue> {
    for (tag, source) in RELEASE_DATE_TAGS {
        let Some(element) = find_element(content, tag)? else {
            continue;
        };
        if let Some(date) = parse_date(&element.text) {
            return Ok(DateValue {
                date,
                time,
                source: *source,
            });
        }
        tracing::debug!(tag = *tag, value = %element.text.trim(), "unusable date field");
    }

    Err(Error::MissingDate {
        primary: RELEASE_DATE_TAGS[0].0,
        fallback: RELEASE_DATE_TAGS[1].0,
    })
}

/// Parse the leading `YYYY-MM-DD` token of a field; any trailing time is ignored
fn parse_date(s: &str) -> Option<NaiveDate> {
    let token = s.split_whitespace().next()?;
    NaiveDate::parse_from_str(token, "%Y-%m-%d").ok()
}
