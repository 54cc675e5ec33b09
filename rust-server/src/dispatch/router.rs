//! Two-level routing: message kind, then event kind.

use std::fmt;

use crate::message::{EventKind, MessageKind, Request};

/// Destination of a decoded push.
///
/// Fifteen known routes plus [`Route::Unknown`] for kinds this crate does
/// not recognize. Every decoded push maps to exactly one route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Text,
    Image,
    /// Voice without a speech recognition result
    Voice,
    /// Voice carrying a speech recognition result
    VoiceRecognition,
    Video,
    Location,
    Link,
    /// Plain subscribe (no QR ticket)
    SubscribeEvent,
    /// Subscribe triggered by scanning a parametric QR code
    SubscribeEventByScan,
    UnsubscribeEvent,
    ScanEvent,
    /// Periodic location report (distinct from a location message)
    LocationEvent,
    ClickEvent,
    ViewEvent,
    MassSendJobFinishEvent,
    /// Authentic and well-formed, but of an unrecognized kind
    Unknown,
}

impl Route {
    /// All routes, in declaration order.
    pub const ALL: [Route; 16] = [
        Route::Text,
        Route::Image,
        Route::Voice,
        Route::VoiceRecognition,
        Route::Video,
        Route::Location,
        Route::Link,
        Route::SubscribeEvent,
        Route::SubscribeEventByScan,
        Route::UnsubscribeEvent,
        Route::ScanEvent,
        Route::LocationEvent,
        Route::ClickEvent,
        Route::ViewEvent,
        Route::MassSendJobFinishEvent,
        Route::Unknown,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Route::Text => "text",
            Route::Image => "image",
            Route::Voice => "voice",
            Route::VoiceRecognition => "voice_recognition",
            Route::Video => "video",
            Route::Location => "location",
            Route::Link => "link",
            Route::SubscribeEvent => "subscribe_event",
            Route::SubscribeEventByScan => "subscribe_event_by_scan",
            Route::UnsubscribeEvent => "unsubscribe_event",
            Route::ScanEvent => "scan_event",
            Route::LocationEvent => "location_event",
            Route::ClickEvent => "click_event",
            Route::ViewEvent => "view_event",
            Route::MassSendJobFinishEvent => "mass_send_job_finish_event",
            Route::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pick the route for a decoded push.
pub fn route(message: &Request) -> Route {
    match message.kind() {
        MessageKind::Text => Route::Text,
        MessageKind::Voice if message.recognition.is_empty() => Route::Voice,
        MessageKind::Voice => Route::VoiceRecognition,
        MessageKind::Location => Route::Location,
        MessageKind::Link => Route::Link,
        MessageKind::Image => Route::Image,
        MessageKind::Video => Route::Video,
        MessageKind::Event => route_event(message),
        MessageKind::Unrecognized => Route::Unknown,
    }
}

fn route_event(message: &Request) -> Route {
    match message.event_kind() {
        EventKind::Subscribe if message.ticket.is_empty() => Route::SubscribeEvent,
        EventKind::Subscribe => Route::SubscribeEventByScan,
        EventKind::Unsubscribe => Route::UnsubscribeEvent,
        EventKind::Scan => Route::ScanEvent,
        EventKind::Location => Route::LocationEvent,
        EventKind::Click => Route::ClickEvent,
        EventKind::View => Route::ViewEvent,
        EventKind::MassSendJobFinish => Route::MassSendJobFinishEvent,
        EventKind::Unrecognized => Route::Unknown,
    }
}
