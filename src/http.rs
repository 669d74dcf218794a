//! The minimal HTTP/1.1 needed for the upgrade exchange.

pub use httparse::Header;

/// Case-insensitive header lookups.
pub trait HeaderExt<'buf> {
    /// Returns the first header named `name`.
    fn header(&self, name: &str) -> Option<&Header<'buf>>;

    /// Returns the raw value of the first header named `name`.
    fn header_value(&self, name: &str) -> Option<&'buf [u8]>;

    /// Returns the value of the first header named `name` if it is UTF-8.
    fn header_value_str(&self, name: &str) -> Option<&'buf str>;

    /// Returns `true` if the comma separated value of `name` contains `token`.
    fn header_has_token(&self, name: &str, token: &str) -> bool;
}

impl<'buf> HeaderExt<'buf> for [Header<'buf>] {
    fn header(&self, name: &str) -> Option<&Header<'buf>> {
        self.iter().find(|h| h.name.eq_ignore_ascii_case(name))
    }

    fn header_value(&self, name: &str) -> Option<&'buf [u8]> {
        self.header(name).map(|h| h.value)
    }

    fn header_value_str(&self, name: &str) -> Option<&'buf str> {
        self.header_value(name)
            .and_then(|v| core::str::from_utf8(v).ok())
    }

    fn header_has_token(&self, name: &str, token: &str) -> bool {
        self.header_value_str(name).is_some_and(|v| {
            v.split(',')
                .any(|part| part.trim().eq_ignore_ascii_case(token))
        })
    }
}

fn write_headers(dst: &mut Vec<u8>, headers: &[Header<'_>]) {
    for header in headers.iter() {
        dst.extend_from_slice(header.name.as_bytes());
        dst.extend_from_slice(b": ");
        dst.extend_from_slice(header.value);
        dst.extend_from_slice(b"\r\n");
    }
}

#[derive(Debug)]
pub(crate) struct Request<'headers, 'buf> {
    method: &'buf str,
    path: &'buf str,
    headers: &'headers [Header<'buf>],
    additional_headers: &'headers [Header<'buf>],
}

impl<'headers, 'buf> Request<'headers, 'buf> {
    pub(crate) const fn get(
        path: &'buf str,
        headers: &'headers [Header<'buf>],
        additional_headers: &'headers [Header<'buf>],
    ) -> Self {
        Request {
            method: "GET",
            path,
            headers,
            additional_headers,
        }
    }

    pub(crate) fn encode(&self, dst: &mut Vec<u8>) {
        dst.extend_from_slice(self.method.as_bytes());
        dst.extend_from_slice(b" ");
        dst.extend_from_slice(self.path.as_bytes());
        dst.extend_from_slice(b" HTTP/1.1\r\n");

        write_headers(dst, self.headers);
        write_headers(dst, self.additional_headers);

        dst.extend_from_slice(b"\r\n");
    }
}

#[derive(Debug)]
pub(crate) struct Response<'headers, 'buf> {
    code: u16,
    reason: &'buf str,
    headers: &'headers [Header<'buf>],
    additional_headers: &'headers [Header<'buf>],
    body: &'buf [u8],
}

impl<'headers, 'buf> Response<'headers, 'buf> {
    pub(crate) const fn switching_protocols(
        headers: &'headers [Header<'buf>],
        additional_headers: &'headers [Header<'buf>],
    ) -> Self {
        Response {
            code: 101,
            reason: "Switching Protocols",
            headers,
            additional_headers,
            body: b"",
        }
    }

    /// A plain-text rejection. `headers` are written before the body headers.
    pub(crate) const fn rejection(
        code: u16,
        reason: &'buf str,
        headers: &'headers [Header<'buf>],
        body: &'buf [u8],
    ) -> Self {
        Response {
            code,
            reason,
            headers,
            additional_headers: &[],
            body,
        }
    }

    pub(crate) fn encode(&self, dst: &mut Vec<u8>) {
        dst.extend_from_slice(b"HTTP/1.1 ");
        dst.extend_from_slice(self.code.to_string().as_bytes());
        dst.extend_from_slice(b" ");
        dst.extend_from_slice(self.reason.as_bytes());
        dst.extend_from_slice(b"\r\n");

        write_headers(dst, self.headers);
        write_headers(dst, self.additional_headers);

        if !self.body.is_empty() {
            dst.extend_from_slice(b"content-length: ");
            dst.extend_from_slice(self.body.len().to_string().as_bytes());
            dst.extend_from_slice(b"\r\n");
        }

        dst.extend_from_slice(b"\r\n");
        dst.extend_from_slice(self.body);
    }
}
