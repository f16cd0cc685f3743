/*!
 * Response Outparam
 * One-shot slot through which a guest handler answers an incoming request
 */

use super::body::TrailerReceiver;
use super::messages::OutgoingResponse;
use crate::core::ProtocolViolation;
use crate::streams::BodyStream;
use crate::table::HostResource;
use crate::translate::ErrorCode;
use parking_lot::Mutex;
use reqwest::header::HeaderMap;
use std::fmt;
use tokio::sync::oneshot;
use tracing::debug;

/// Response as delivered to the embedder
pub struct ServedResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: BodyStream,
    pub trailers: TrailerReceiver,
}

impl fmt::Debug for ServedResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServedResponse")
            .field("status", &self.status)
            .field("headers", &self.headers.len())
            .finish()
    }
}

/// Receives the handler's answer, or the error it reported
pub type ResponseReceiver = oneshot::Receiver<Result<ServedResponse, ErrorCode>>;

pub struct ResponseOutparam {
    tx: Mutex<Option<oneshot::Sender<Result<ServedResponse, ErrorCode>>>>,
}

impl ResponseOutparam {
    pub(crate) fn new() -> (Self, ResponseReceiver) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                tx: Mutex::new(Some(tx)),
            },
            rx,
        )
    }

    /// Deliver the response. A second call is a protocol violation.
    pub fn set(&self, response: Result<&OutgoingResponse, ErrorCode>) -> Result<(), ProtocolViolation> {
        let tx = self
            .tx
            .lock()
            .take()
            .ok_or(ProtocolViolation::AlreadyResponded)?;
        let served = response.map(OutgoingResponse::serve);
        if let Ok(response) = &served {
            debug!(status = response.status, "response delivered");
        }
        // The embedder may have given up on this request
        let _ = tx.send(served);
        Ok(())
    }

    pub fn is_set(&self) -> bool {
        self.tx.lock().is_none()
    }
}

impl HostResource for ResponseOutparam {}

impl fmt::Debug for ResponseOutparam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseOutparam")
            .field("set", &self.is_set())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Fields;

    #[test]
    fn test_second_set_is_already_responded() {
        let (outparam, mut rx) = ResponseOutparam::new();
        let response = OutgoingResponse::new(Fields::new(), 16);
        response.set_status_code(201).unwrap();

        outparam.set(Ok(&response)).unwrap();
        assert_eq!(
            outparam.set(Err(ErrorCode::Io)).unwrap_err(),
            ProtocolViolation::AlreadyResponded
        );
        let served = rx.try_recv().unwrap().unwrap();
        assert_eq!(served.status, 201);
    }

    #[test]
    fn test_error_response_delivered() {
        let (outparam, mut rx) = ResponseOutparam::new();
        outparam.set(Err(ErrorCode::Timeout)).unwrap();
        assert!(matches!(rx.try_recv().unwrap(), Err(ErrorCode::Timeout)));
    }
}
