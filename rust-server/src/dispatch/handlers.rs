//! Handler callback types, default handlers and the handler registry.

use std::sync::Arc;

use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::{debug, warn};

use super::error::DispatchError;
use super::router::Route;
use crate::message::Request;

/// Handler for a decoded push.
///
/// Receives the original request head and a borrow of the pooled message.
/// The message is recycled as soon as the handler returns, so anything
/// worth keeping must be copied out.
pub type MessageHandler = Arc<dyn Fn(&Parts, &Request) -> Response + Send + Sync>;

/// Handler for rejected exchanges (bad query, failed signature, bad body).
pub type InvalidRequestHandler = Arc<dyn Fn(&Parts, &DispatchError) -> Response + Send + Sync>;

/// Logs the rejection and answers with a generic status line.
pub fn default_invalid_request(parts: &Parts, err: &DispatchError) -> Response {
    let status = err.status();
    warn!(
        method = %parts.method,
        path = %parts.uri.path(),
        status = status.as_u16(),
        error = %err,
        "wechat_invalid_request"
    );
    (status, status.canonical_reason().unwrap_or_default()).into_response()
}

/// Logs the unrecognized push and answers with an empty 200.
pub fn default_unknown_request(_parts: &Parts, message: &Request) -> Response {
    warn!(
        msg_type = %message.msg_type,
        event = %message.event,
        from_user = %message.from_user_name,
        "wechat_unknown_request"
    );
    StatusCode::OK.into_response()
}

/// Default for a known route: logs and replies with an empty 200, which
/// the platform treats as "no reply".
fn default_message_handler(route: Route) -> MessageHandler {
    Arc::new(move |_parts: &Parts, message: &Request| {
        debug!(
            route = route.as_str(),
            from_user = %message.from_user_name,
            msg_id = message.msg_id,
            "wechat_default_handler"
        );
        StatusCode::OK.into_response()
    })
}

/// Handler registry: one active handler for every route at all times.
#[derive(Clone)]
pub struct Handlers {
    pub(crate) invalid: InvalidRequestHandler,
    pub(crate) unknown: MessageHandler,
    pub(crate) text: MessageHandler,
    pub(crate) image: MessageHandler,
    pub(crate) voice: MessageHandler,
    pub(crate) voice_recognition: MessageHandler,
    pub(crate) video: MessageHandler,
    pub(crate) location: MessageHandler,
    pub(crate) link: MessageHandler,
    pub(crate) subscribe_event: MessageHandler,
    pub(crate) subscribe_event_by_scan: MessageHandler,
    pub(crate) unsubscribe_event: MessageHandler,
    pub(crate) scan_event: MessageHandler,
    pub(crate) location_event: MessageHandler,
    pub(crate) click_event: MessageHandler,
    pub(crate) view_event: MessageHandler,
    pub(crate) mass_send_job_finish_event: MessageHandler,
}

impl Default for Handlers {
    fn default() -> Self {
        Self {
            invalid: Arc::new(default_invalid_request),
            unknown: Arc::new(default_unknown_request),
            text: default_message_handler(Route::Text),
            image: default_message_handler(Route::Image),
            voice: default_message_handler(Route::Voice),
            voice_recognition: default_message_handler(Route::VoiceRecognition),
            video: default_message_handler(Route::Video),
            location: default_message_handler(Route::Location),
            link: default_message_handler(Route::Link),
            subscribe_event: default_message_handler(Route::SubscribeEvent),
            subscribe_event_by_scan: default_message_handler(Route::SubscribeEventByScan),
            unsubscribe_event: default_message_handler(Route::UnsubscribeEvent),
            scan_event: default_message_handler(Route::ScanEvent),
            location_event: default_message_handler(Route::LocationEvent),
            click_event: default_message_handler(Route::ClickEvent),
            view_event: default_message_handler(Route::ViewEvent),
            mass_send_job_finish_event: default_message_handler(Route::MassSendJobFinishEvent),
        }
    }
}

impl Handlers {
    /// Handler currently registered for `route`.
    pub fn get(&self, route: Route) -> &MessageHandler {
        match route {
            Route::Text => &self.text,
            Route::Image => &self.image,
            Route::Voice => &self.voice,
            Route::VoiceRecognition => &self.voice_recognition,
            Route::Video => &self.video,
            Route::Location => &self.location,
            Route::Link => &self.link,
            Route::SubscribeEvent => &self.subscribe_event,
            Route::SubscribeEventByScan => &self.subscribe_event_by_scan,
            Route::UnsubscribeEvent => &self.unsubscribe_event,
            Route::ScanEvent => &self.scan_event,
            Route::LocationEvent => &self.location_event,
            Route::ClickEvent => &self.click_event,
            Route::ViewEvent => &self.view_event,
            Route::MassSendJobFinishEvent => &self.mass_send_job_finish_event,
            Route::Unknown => &self.unknown,
        }
    }

    pub(crate) fn set(&mut self, route: Route, handler: MessageHandler) {
        let slot = match route {
            Route::Text => &mut self.text,
            Route::Image => &mut self.image,
            Route::Voice => &mut self.voice,
            Route::VoiceRecognition => &mut self.voice_recognition,
            Route::Video => &mut self.video,
            Route::Location => &mut self.location,
            Route::Link => &mut self.link,
            Route::SubscribeEvent => &mut self.subscribe_event,
            Route::SubscribeEventByScan => &mut self.subscribe_event_by_scan,
            Route::UnsubscribeEvent => &mut self.unsubscribe_event,
            Route::ScanEvent => &mut self.scan_event,
            Route::LocationEvent => &mut self.location_event,
            Route::ClickEvent => &mut self.click_event,
            Route::ViewEvent => &mut self.view_event,
            Route::MassSendJobFinishEvent => &mut self.mass_send_job_finish_event,
            Route::Unknown => &mut self.unknown,
        };
        *slot = handler;
    }

    /// The invalid-request handler.
    pub fn invalid(&self) -> &InvalidRequestHandler {
        &self.invalid
    }
}
