//! The decoded push message and its discriminators.

use std::fmt;

use crate::pool::Reusable;

/// Message kind literals as sent in `MsgType`.
pub const MSG_TYPE_TEXT: &str = "text";
pub const MSG_TYPE_IMAGE: &str = "image";
pub const MSG_TYPE_VOICE: &str = "voice";
pub const MSG_TYPE_VIDEO: &str = "video";
pub const MSG_TYPE_LOCATION: &str = "location";
pub const MSG_TYPE_LINK: &str = "link";
pub const MSG_TYPE_EVENT: &str = "event";

/// Event kind literals as sent in `Event`.
pub const EVENT_SUBSCRIBE: &str = "subscribe";
pub const EVENT_UNSUBSCRIBE: &str = "unsubscribe";
pub const EVENT_SCAN: &str = "SCAN";
pub const EVENT_LOCATION: &str = "LOCATION";
pub const EVENT_CLICK: &str = "CLICK";
pub const EVENT_VIEW: &str = "VIEW";
pub const EVENT_MASS_SEND_JOB_FINISH: &str = "MASSSENDJOBFINISH";

/// Top-level message kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Text,
    Image,
    Voice,
    Video,
    Location,
    Link,
    Event,
    /// A kind this crate does not know about (yet).
    Unrecognized,
}

impl MessageKind {
    /// Parse a `MsgType` value. Matching is case-sensitive.
    pub fn parse(msg_type: &str) -> Self {
        match msg_type {
            MSG_TYPE_TEXT => MessageKind::Text,
            MSG_TYPE_IMAGE => MessageKind::Image,
            MSG_TYPE_VOICE => MessageKind::Voice,
            MSG_TYPE_VIDEO => MessageKind::Video,
            MSG_TYPE_LOCATION => MessageKind::Location,
            MSG_TYPE_LINK => MessageKind::Link,
            MSG_TYPE_EVENT => MessageKind::Event,
            _ => MessageKind::Unrecognized,
        }
    }
}

/// Event sub-kind, meaningful only when the message kind is `event`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Subscribe,
    Unsubscribe,
    Scan,
    Location,
    Click,
    View,
    MassSendJobFinish,
    Unrecognized,
}

impl EventKind {
    /// Parse an `Event` value. Matching is case-sensitive.
    pub fn parse(event: &str) -> Self {
        match event {
            EVENT_SUBSCRIBE => EventKind::Subscribe,
            EVENT_UNSUBSCRIBE => EventKind::Unsubscribe,
            EVENT_SCAN => EventKind::Scan,
            EVENT_LOCATION => EventKind::Location,
            EVENT_CLICK => EventKind::Click,
            EVENT_VIEW => EventKind::View,
            EVENT_MASS_SEND_JOB_FINISH => EventKind::MassSendJobFinish,
            _ => EventKind::Unrecognized,
        }
    }
}

/// One inbound push, decoded from the `<xml>` body.
///
/// A single flat record covers every message and event kind; fields that a
/// given kind does not carry stay at their zero value.
///
/// Values of this type are pooled. Handlers only ever see `&Request` for
/// the duration of one call and must copy out anything they want to keep.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Request {
    // Common header
    /// Official account that received the push
    pub to_user_name: String,
    /// OpenID of the sending user
    pub from_user_name: String,
    /// Unix timestamp of the push
    pub create_time: i64,
    /// Message kind discriminator
    pub msg_type: String,

    // text
    pub content: String,

    /// Message id (`MsgId`, or `MsgID` on mass-send job reports)
    pub msg_id: i64,

    // image, voice, video
    pub pic_url: String,
    pub media_id: String,
    /// Voice codec, e.g. `amr`
    pub format: String,
    /// Speech recognition result; non-empty only when recognition is enabled
    pub recognition: String,
    pub thumb_media_id: String,

    // location message
    pub location_x: f64,
    pub location_y: f64,
    pub scale: i32,
    pub label: String,

    // link
    pub title: String,
    pub description: String,
    pub url: String,

    // event
    /// Event sub-kind discriminator
    pub event: String,
    pub event_key: String,
    /// QR code ticket; set when a subscribe came from scanning a code
    pub ticket: String,
    pub latitude: f64,
    pub longitude: f64,
    pub precision: f64,

    // MASSSENDJOBFINISH
    pub status: String,
    pub total_count: i32,
    pub filter_count: i32,
    pub sent_count: i32,
    pub error_count: i32,
}

impl Request {
    /// The top-level message kind.
    pub fn kind(&self) -> MessageKind {
        MessageKind::parse(&self.msg_type)
    }

    /// The event sub-kind. Only meaningful when [`Request::kind`] is
    /// [`MessageKind::Event`].
    pub fn event_kind(&self) -> EventKind {
        EventKind::parse(&self.event)
    }
}

impl Reusable for Request {
    /// Zero every field in place, keeping string capacity.
    fn reset(&mut self) {
        self.to_user_name.clear();
        self.from_user_name.clear();
        self.create_time = 0;
        self.msg_type.clear();
        self.content.clear();
        self.msg_id = 0;
        self.pic_url.clear();
        self.media_id.clear();
        self.format.clear();
        self.recognition.clear();
        self.thumb_media_id.clear();
        self.location_x = 0.0;
        self.location_y = 0.0;
        self.scale = 0;
        self.label.clear();
        self.title.clear();
        self.description.clear();
        self.url.clear();
        self.event.clear();
        self.event_key.clear();
        self.ticket.clear();
        self.latitude = 0.0;
        self.longitude = 0.0;
        self.precision = 0.0;
        self.status.clear();
        self.total_count = 0;
        self.filter_count = 0;
        self.sent_count = 0;
        self.error_count = 0;
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MessageKind::Text => MSG_TYPE_TEXT,
            MessageKind::Image => MSG_TYPE_IMAGE,
            MessageKind::Voice => MSG_TYPE_VOICE,
            MessageKind::Video => MSG_TYPE_VIDEO,
            MessageKind::Location => MSG_TYPE_LOCATION,
            MessageKind::Link => MSG_TYPE_LINK,
            MessageKind::Event => MSG_TYPE_EVENT,
            MessageKind::Unrecognized => "unrecognized",
        };
        f.write_str(s)
    }
}
