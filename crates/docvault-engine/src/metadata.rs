//! Document metadata: the Info dictionary and PDF date strings.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use lopdf::{Dictionary, Document, Object};
use serde::{Deserialize, Serialize};

/// Metadata summary returned by a successful load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub page_count: u32,
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub creation_date: Option<DateTime<FixedOffset>>,
    pub modification_date: Option<DateTime<FixedOffset>>,
    /// Size of the byte buffer the document was loaded from.
    pub byte_size: usize,
}

pub(crate) fn read_document_info(doc: &Document, byte_size: usize) -> DocumentInfo {
    let info = info_dictionary(doc);
    let text = |key: &[u8]| info.and_then(|d| d.get(key).ok()).and_then(text_string);
    let date = |key: &[u8]| text(key).and_then(|s| parse_pdf_date(&s));

    DocumentInfo {
        page_count: doc.get_pages().len() as u32,
        title: text(b"Title"),
        author: text(b"Author"),
        subject: text(b"Subject"),
        creator: text(b"Creator"),
        producer: text(b"Producer"),
        creation_date: date(b"CreationDate"),
        modification_date: date(b"ModDate"),
        byte_size,
    }
}

/// Resolve the trailer's Info entry to a dictionary, if present.
fn info_dictionary(doc: &Document) -> Option<&Dictionary> {
    let obj = doc.trailer.get(b"Info").ok()?;
    let obj = match obj {
        Object::Reference(id) => doc.get_object(*id).ok()?,
        other => other,
    };
    obj.as_dict().ok()
}

/// Decode a PDF text string: UTF-16BE when the BOM is present, otherwise
/// treat the bytes as text directly (PDFDocEncoding is ASCII-compatible
/// for the range that matters here).
fn text_string(obj: &Object) -> Option<String> {
    let Object::String(bytes, _) = obj else {
        return None;
    };
    if bytes.starts_with(&[0xFE, 0xFF]) {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        Some(String::from_utf16_lossy(&units))
    } else {
        Some(String::from_utf8_lossy(bytes).into_owned())
    }
}

/// Parse a PDF date string such as `D:20240131120000+01'00'`.
///
/// Everything after the year is optional; missing components default to
/// the start of their range and a missing timezone is treated as UTC.
pub fn parse_pdf_date(raw: &str) -> Option<DateTime<FixedOffset>> {
    let s = raw.strip_prefix("D:").unwrap_or(raw);

    let year: i32 = s.get(0..4)?.parse().ok()?;
    let month = two_digits(s, 4).unwrap_or(1);
    let day = two_digits(s, 6).unwrap_or(1);
    let hour = two_digits(s, 8).unwrap_or(0);
    let minute = two_digits(s, 10).unwrap_or(0);
    let second = two_digits(s, 12).unwrap_or(0);

    // The timezone suffix may follow any prefix of the optional
    // components, so locate it rather than assuming a full timestamp.
    let offset = s
        .get(4..)
        .and_then(|rest| rest.find(['Z', '+', '-']))
        .and_then(|at| parse_utc_offset(&s[4 + at..]))
        .or_else(|| FixedOffset::east_opt(0))?;

    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    let time = NaiveTime::from_hms_opt(hour, minute, second)?;
    offset
        .from_local_datetime(&NaiveDateTime::new(date, time))
        .single()
}

fn two_digits(s: &str, at: usize) -> Option<u32> {
    s.get(at..at + 2)?.parse().ok()
}

/// Parse the `Z` / `+HH'mm'` / `-HH'mm'` suffix of a PDF date.
fn parse_utc_offset(rest: &str) -> Option<FixedOffset> {
    match rest.chars().next()? {
        'Z' => FixedOffset::east_opt(0),
        sign @ ('+' | '-') => {
            let hours: i32 = rest.get(1..3)?.parse().ok()?;
            let minutes: i32 = rest
                .get(4..6)
                .and_then(|m| m.parse().ok())
                .unwrap_or(0);
            let seconds = hours * 3600 + minutes * 60;
            FixedOffset::east_opt(if sign == '-' { -seconds } else { seconds })
        }
        _ => None,
    }
}
