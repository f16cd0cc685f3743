/*!
 * HTTP Bridge
 * Request/response resources whose bodies are streams
 */

mod body;
mod bridge;
mod client;
mod fields;
mod future;
mod messages;
mod outparam;
mod types;

pub use body::{IncomingBody, OutgoingBody, TrailerReceiver};
pub use bridge::HttpBridge;
pub use client::{HttpClient, NativeRequest, NativeResponse, ReqwestClient};
pub use fields::{Fields, ForbiddenHeaders, HeaderError, HeaderPolicy, DEFAULT_FORBIDDEN_HEADERS};
pub use future::FutureIncomingResponse;
pub use messages::{
    IncomingRequest, IncomingResponse, NativeIncomingRequest, OutgoingRequest, OutgoingResponse,
    RequestHead,
};
pub use outparam::{ResponseOutparam, ResponseReceiver, ServedResponse};
pub use types::{Method, RequestOptions, Scheme};
