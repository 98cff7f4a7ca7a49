//! Response builders

use bytes::Bytes;
use http_body_util::{combinators::BoxBody, BodyExt, Full};
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Response, StatusCode};
use serde::Serialize;
use std::convert::Infallible;

pub type HttpResponse = Response<BoxBody<Bytes, Infallible>>;

pub const JSON: &str = "application/json";
pub const TEXT: &str = "text/plain;charset=UTF-8";

/// Create a full body
pub fn full_body(data: impl Into<Bytes>) -> BoxBody<Bytes, Infallible> {
    Full::new(data.into()).boxed()
}

fn with_content_type(
    status: StatusCode,
    content_type: &'static str,
    body: impl Into<Bytes>,
) -> HttpResponse {
    let mut response = Response::new(full_body(body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

pub fn text(status: StatusCode, message: &str) -> HttpResponse {
    with_content_type(status, TEXT, message.to_string())
}

pub fn json<T: Serialize>(status: StatusCode, value: &T) -> Result<HttpResponse, serde_json::Error> {
    let body = serde_json::to_vec(value)?;
    Ok(with_content_type(status, JSON, body))
}

/// Pass stored bytes through untouched, labelled as JSON whatever they hold
pub fn raw_json(body: String) -> HttpResponse {
    with_content_type(StatusCode::OK, JSON, body)
}
