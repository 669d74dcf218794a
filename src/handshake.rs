//! Key derivation and validation of the HTTP upgrade heads.
//!
//! Nothing in here touches the transport; the connection drives the I/O and
//! feeds the buffered bytes to the parsers below until a head is complete.

use base64::{Engine as _, engine::general_purpose};
use httparse::Status;
use rand_core::RngCore;
use sha1::{Digest, Sha1};

use crate::{error::HandshakeError, http::HeaderExt};

const GUID: &[u8] = b"258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Returns a fresh base64 encoded 16 byte `sec-websocket-key`.
pub fn generate_sec_key<Rng: RngCore>(rng: &mut Rng) -> String {
    let mut key: [u8; 16] = [0; 16];

    rng.fill_bytes(&mut key);

    general_purpose::STANDARD.encode(key)
}

/// Returns the `sec-websocket-accept` value for `sec_key`.
pub fn generate_sec_accept(sec_key: &[u8]) -> String {
    let mut sha1 = Sha1::new();

    sha1.update(sec_key);
    sha1.update(GUID);

    general_purpose::STANDARD.encode(sha1.finalize())
}

/// Parses and validates a `101` response to a request carrying a key whose
/// accept value is `sec_accept`.
///
/// Returns the length of the response head once it is complete.
pub(crate) fn parse_response<const N: usize>(
    src: &[u8],
    sec_accept: &str,
) -> Result<Option<usize>, HandshakeError> {
    let mut headers = [httparse::EMPTY_HEADER; N];
    let mut response = httparse::Response::new(&mut headers);

    let len = match response.parse(src)? {
        Status::Complete(len) => len,
        Status::Partial => return Ok(None),
    };

    if response.code != Some(101) || response.reason != Some("Switching Protocols") {
        return Err(HandshakeError::InvalidStatusCode);
    }

    if !response
        .headers
        .header_value_str("upgrade")
        .is_some_and(|v| v.eq_ignore_ascii_case("websocket"))
    {
        return Err(HandshakeError::MissingOrInvalidUpgrade);
    }

    if !response.headers.header_has_token("connection", "upgrade") {
        return Err(HandshakeError::MissingOrInvalidConnection);
    }

    if response
        .headers
        .header_value("sec-websocket-accept")
        .is_none_or(|v| v != sec_accept.as_bytes())
    {
        return Err(HandshakeError::MissingOrInvalidAccept);
    }

    Ok(Some(len))
}

/// Parses an upgrade request.
///
/// Once the head is complete, returns its length together with either the
/// accept value to answer with or the reason the request is refused.
#[allow(clippy::type_complexity)]
pub(crate) fn parse_request<const N: usize>(
    src: &[u8],
) -> Result<Option<(Result<String, HandshakeError>, usize)>, HandshakeError> {
    let mut headers = [httparse::EMPTY_HEADER; N];
    let mut request = httparse::Request::new(&mut headers);

    let len = match request.parse(src)? {
        Status::Complete(len) => len,
        Status::Partial => return Ok(None),
    };

    if request.method != Some("GET") {
        return Ok(Some((Err(HandshakeError::WrongHttpMethod), len)));
    }

    let upgrade = request
        .headers
        .header_value_str("upgrade")
        .is_some_and(|v| v.eq_ignore_ascii_case("websocket"));

    if !upgrade || !request.headers.header_has_token("connection", "upgrade") {
        return Ok(Some((Err(HandshakeError::NotWebSocket), len)));
    }

    match request
        .headers
        .header_value("sec-websocket-key")
        .filter(|key| !key.is_empty())
    {
        None => Ok(Some((Err(HandshakeError::MissingSecKey), len))),
        Some(key) => Ok(Some((Ok(generate_sec_accept(key)), len))),
    }
}

/// Status line and body answering a refused upgrade request.
pub(crate) fn rejection(error: &HandshakeError) -> Option<(u16, &'static str, &'static [u8])> {
    match error {
        HandshakeError::WrongHttpMethod => {
            Some((405, "Method Not Allowed", b"405 must GET\n".as_slice()))
        }
        HandshakeError::NotWebSocket => Some((
            400,
            "Bad Request",
            b"400 not websocket protocol\n".as_slice(),
        )),
        HandshakeError::MissingSecKey => Some((400, "Bad Request", b"400 bad Key\n".as_slice())),
        _ => None,
    }
}
