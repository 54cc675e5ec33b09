//! Streaming XML decoder for push bodies.
//!
//! Decodes straight into a (pooled) [`Request`], reusing its string
//! buffers instead of building a fresh value per push. Bodies look like:
//!
//! ```text
//! <xml>
//!   <ToUserName><![CDATA[gh_123]]></ToUserName>
//!   <CreateTime>1400000000</CreateTime>
//!   <MsgType><![CDATA[text]]></MsgType>
//!   <Content><![CDATA[hello]]></Content>
//! </xml>
//! ```

use std::str::FromStr;

use quick_xml::events::Event;
use quick_xml::Reader;
use thiserror::Error;

use super::request::Request;
use crate::pool::Reusable;

/// Name of the document root element.
const ROOT_ELEMENT: &[u8] = b"xml";

/// Errors produced while decoding a push body.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Malformed XML.
    #[error("malformed XML: {0}")]
    Xml(#[from] quick_xml::Error),

    /// CDATA section that is not valid UTF-8.
    #[error("invalid UTF-8 in CDATA: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    /// Empty body or no element at all.
    #[error("missing <xml> root element")]
    MissingRoot,

    /// Root element is not `<xml>`.
    #[error("unexpected root element <{0}>")]
    UnexpectedRoot(String),

    /// Document ended before the root element was closed.
    #[error("document truncated inside <xml>")]
    Truncated,

    /// A numeric field did not parse.
    #[error("invalid value {value:?} for {field}")]
    InvalidNumber { field: &'static str, value: String },
}

/// Direct children of `<xml>` that map onto [`Request`] fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    ToUserName,
    FromUserName,
    CreateTime,
    MsgType,
    Content,
    MsgId,
    PicUrl,
    MediaId,
    Format,
    Recognition,
    ThumbMediaId,
    LocationX,
    LocationY,
    Scale,
    Label,
    Title,
    Description,
    Url,
    Event,
    EventKey,
    Ticket,
    Latitude,
    Longitude,
    Precision,
    Status,
    TotalCount,
    FilterCount,
    SentCount,
    ErrorCount,
}

impl Field {
    fn from_tag(tag: &[u8]) -> Option<Self> {
        let field = match tag {
            b"ToUserName" => Field::ToUserName,
            b"FromUserName" => Field::FromUserName,
            b"CreateTime" => Field::CreateTime,
            b"MsgType" => Field::MsgType,
            b"Content" => Field::Content,
            b"MsgId" | b"MsgID" => Field::MsgId,
            b"PicUrl" => Field::PicUrl,
            b"MediaId" => Field::MediaId,
            b"Format" => Field::Format,
            b"Recognition" => Field::Recognition,
            b"ThumbMediaId" => Field::ThumbMediaId,
            b"Location_X" => Field::LocationX,
            b"Location_Y" => Field::LocationY,
            b"Scale" => Field::Scale,
            b"Label" => Field::Label,
            b"Title" => Field::Title,
            b"Description" => Field::Description,
            b"Url" => Field::Url,
            b"Event" => Field::Event,
            b"EventKey" => Field::EventKey,
            b"Ticket" => Field::Ticket,
            b"Latitude" => Field::Latitude,
            b"Longitude" => Field::Longitude,
            b"Precision" => Field::Precision,
            b"Status" => Field::Status,
            b"TotalCount" => Field::TotalCount,
            b"FilterCount" => Field::FilterCount,
            b"SentCount" => Field::SentCount,
            b"ErrorCount" => Field::ErrorCount,
            _ => return None,
        };
        Some(field)
    }

    fn name(self) -> &'static str {
        match self {
            Field::ToUserName => "ToUserName",
            Field::FromUserName => "FromUserName",
            Field::CreateTime => "CreateTime",
            Field::MsgType => "MsgType",
            Field::Content => "Content",
            Field::MsgId => "MsgId",
            Field::PicUrl => "PicUrl",
            Field::MediaId => "MediaId",
            Field::Format => "Format",
            Field::Recognition => "Recognition",
            Field::ThumbMediaId => "ThumbMediaId",
            Field::LocationX => "Location_X",
            Field::LocationY => "Location_Y",
            Field::Scale => "Scale",
            Field::Label => "Label",
            Field::Title => "Title",
            Field::Description => "Description",
            Field::Url => "Url",
            Field::Event => "Event",
            Field::EventKey => "EventKey",
            Field::Ticket => "Ticket",
            Field::Latitude => "Latitude",
            Field::Longitude => "Longitude",
            Field::Precision => "Precision",
            Field::Status => "Status",
            Field::TotalCount => "TotalCount",
            Field::FilterCount => "FilterCount",
            Field::SentCount => "SentCount",
            Field::ErrorCount => "ErrorCount",
        }
    }
}

/// Parse a numeric field value, naming the field on failure.
fn parse_number<T: FromStr>(field: Field, text: &str) -> Result<T, DecodeError> {
    text.trim().parse().map_err(|_| DecodeError::InvalidNumber {
        field: field.name(),
        value: text.to_string(),
    })
}

/// Text buffer backing a string field, or `None` for numeric fields.
fn text_slot(target: &mut Request, field: Field) -> Option<&mut String> {
    let slot = match field {
        Field::ToUserName => &mut target.to_user_name,
        Field::FromUserName => &mut target.from_user_name,
        Field::MsgType => &mut target.msg_type,
        Field::Content => &mut target.content,
        Field::PicUrl => &mut target.pic_url,
        Field::MediaId => &mut target.media_id,
        Field::Format => &mut target.format,
        Field::Recognition => &mut target.recognition,
        Field::ThumbMediaId => &mut target.thumb_media_id,
        Field::Label => &mut target.label,
        Field::Title => &mut target.title,
        Field::Description => &mut target.description,
        Field::Url => &mut target.url,
        Field::Event => &mut target.event,
        Field::EventKey => &mut target.event_key,
        Field::Ticket => &mut target.ticket,
        Field::Status => &mut target.status,
        _ => return None,
    };
    Some(slot)
}

/// Restore a field to its zero value (a repeated element replaces the earlier one).
fn clear_field(target: &mut Request, field: Field) {
    if let Some(slot) = text_slot(target, field) {
        slot.clear();
        return;
    }
    match field {
        Field::CreateTime => target.create_time = 0,
        Field::MsgId => target.msg_id = 0,
        Field::LocationX => target.location_x = 0.0,
        Field::LocationY => target.location_y = 0.0,
        Field::Scale => target.scale = 0,
        Field::Latitude => target.latitude = 0.0,
        Field::Longitude => target.longitude = 0.0,
        Field::Precision => target.precision = 0.0,
        Field::TotalCount => target.total_count = 0,
        Field::FilterCount => target.filter_count = 0,
        Field::SentCount => target.sent_count = 0,
        Field::ErrorCount => target.error_count = 0,
        _ => {}
    }
}

/// Append one chunk of element content.
///
/// String fields append straight into the target. Numeric fields collect
/// into `scratch` and are parsed once the element closes, so text split
/// across several chunks (text plus CDATA) is joined either way.
fn append_field(target: &mut Request, field: Field, text: &str, scratch: &mut String) {
    match text_slot(target, field) {
        Some(slot) => slot.push_str(text),
        None => scratch.push_str(text),
    }
}

/// Parse the collected content of a closed numeric field.
///
/// Empty content leaves the zero value set when the element opened.
fn finish_field(target: &mut Request, field: Field, text: &str) -> Result<(), DecodeError> {
    if text.is_empty() {
        return Ok(());
    }
    match field {
        Field::CreateTime => target.create_time = parse_number(field, text)?,
        Field::MsgId => target.msg_id = parse_number(field, text)?,
        Field::LocationX => target.location_x = parse_number(field, text)?,
        Field::LocationY => target.location_y = parse_number(field, text)?,
        Field::Scale => target.scale = parse_number(field, text)?,
        Field::Latitude => target.latitude = parse_number(field, text)?,
        Field::Longitude => target.longitude = parse_number(field, text)?,
        Field::Precision => target.precision = parse_number(field, text)?,
        Field::TotalCount => target.total_count = parse_number(field, text)?,
        Field::FilterCount => target.filter_count = parse_number(field, text)?,
        Field::SentCount => target.sent_count = parse_number(field, text)?,
        Field::ErrorCount => target.error_count = parse_number(field, text)?,
        _ => {}
    }
    Ok(())
}

/// Decode a push body into `target`.
///
/// `target` is reset first, so the result never carries data from a
/// previous decode, even when the new document omits fields. On error the
/// target holds a partial decode and should be discarded.
///
/// Character data of string fields is kept exactly as sent, whitespace
/// included.
pub fn decode_into(body: &[u8], target: &mut Request) -> Result<(), DecodeError> {
    target.reset();

    let mut reader = Reader::from_reader(body);

    let mut depth = 0usize;
    let mut seen_root = false;
    let mut current: Option<Field> = None;
    let mut scratch = String::new();

    loop {
        match reader.read_event()? {
            Event::Start(start) => {
                depth += 1;
                match depth {
                    1 => {
                        check_root(start.local_name().as_ref())?;
                        seen_root = true;
                    }
                    2 => {
                        current = Field::from_tag(start.local_name().as_ref());
                        if let Some(field) = current {
                            clear_field(target, field);
                        }
                    }
                    _ => {}
                }
            }
            Event::Empty(empty) => match depth {
                0 => {
                    check_root(empty.local_name().as_ref())?;
                    seen_root = true;
                }
                1 => {
                    if let Some(field) = Field::from_tag(empty.local_name().as_ref()) {
                        clear_field(target, field);
                    }
                }
                _ => {}
            },
            Event::Text(text) if depth == 2 => {
                if let Some(field) = current {
                    let text = text.unescape()?;
                    append_field(target, field, &text, &mut scratch);
                }
            }
            Event::CData(cdata) if depth == 2 => {
                if let Some(field) = current {
                    let raw = cdata.into_inner();
                    append_field(target, field, std::str::from_utf8(&raw)?, &mut scratch);
                }
            }
            Event::End(_) => {
                if depth == 2 {
                    if let Some(field) = current.take() {
                        finish_field(target, field, &scratch)?;
                        scratch.clear();
                    }
                }
                depth = depth.saturating_sub(1);
                if depth == 0 && seen_root {
                    break;
                }
            }
            Event::Eof => {
                if depth > 0 {
                    return Err(DecodeError::Truncated);
                }
                break;
            }
            _ => {}
        }
    }

    if !seen_root {
        return Err(DecodeError::MissingRoot);
    }
    Ok(())
}

fn check_root(name: &[u8]) -> Result<(), DecodeError> {
    if name == ROOT_ELEMENT {
        Ok(())
    } else {
        Err(DecodeError::UnexpectedRoot(
            String::from_utf8_lossy(name).into_owned(),
        ))
    }
}
