//! Inbound RPC request type.

use bytes::Bytes;

use crate::error::{Error, Result};

/// An inbound call, decoded by the transport.
///
/// Requests are immutable once built. An interceptor that needs different
/// metadata builds a replacement with [`Request::with_header`] and hands
/// that to the next handler; the original stays untouched for any other
/// layer still holding it.
#[derive(Clone, Debug, Default)]
pub struct Request {
    caller: String,
    service: String,
    procedure: String,
    encoding: String,
    headers: Vec<(String, String)>,
    body: Bytes,
}

impl Request {
    pub fn builder(service: impl Into<String>, procedure: impl Into<String>) -> RequestBuilder {
        RequestBuilder {
            req: Request {
                service: service.into(),
                procedure: procedure.into(),
                ..Request::default()
            },
        }
    }

    pub fn caller(&self) -> &str { &self.caller }
    pub fn service(&self) -> &str { &self.service }
    pub fn procedure(&self) -> &str { &self.procedure }
    pub fn encoding(&self) -> &str { &self.encoding }
    pub fn headers(&self) -> &[(String, String)] { &self.headers }
    pub fn body(&self) -> &Bytes { &self.body }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns a copy of this request with `name` set to `value`.
    ///
    /// The body is shared, not copied.
    pub fn with_header(&self, name: impl Into<String>, value: impl Into<String>) -> Request {
        let mut req = self.clone();
        set_header(&mut req.headers, name.into(), value.into());
        req
    }

    /// Rejects requests missing the metadata every call must carry.
    pub fn validate(&self) -> Result<()> {
        let missing = [
            ("caller", &self.caller),
            ("service", &self.service),
            ("procedure", &self.procedure),
        ]
        .into_iter()
        .find(|(_, v)| v.is_empty());

        match missing {
            Some((field, _)) => Err(Error::bad_request(format!("missing {field}"))),
            None => Ok(()),
        }
    }
}

/// Builder returned by [`Request::builder`].
pub struct RequestBuilder {
    req: Request,
}

impl RequestBuilder {
    pub fn caller(mut self, caller: impl Into<String>) -> Self {
        self.req.caller = caller.into();
        self
    }

    pub fn encoding(mut self, encoding: impl Into<String>) -> Self {
        self.req.encoding = encoding.into();
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        set_header(&mut self.req.headers, name.into(), value.into());
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.req.body = body.into();
        self
    }

    pub fn build(self) -> Request {
        self.req
    }
}

fn set_header(headers: &mut Vec<(String, String)>, name: String, value: String) {
    match headers.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(&name)) {
        Some(slot) => slot.1 = value,
        None => headers.push((name, value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn echo() -> Request {
        Request::builder("keyvalue", "get")
            .caller("client")
            .encoding("json")
            .header("Trace-Id", "t-1")
            .body(&b"{}"[..])
            .build()
    }

    #[test]
    fn header_lookup_ignores_case() {
        let req = echo();
        assert_eq!(req.header("trace-id"), Some("t-1"));
        assert_eq!(req.header("TRACE-ID"), Some("t-1"));
        assert_eq!(req.header("missing"), None);
    }

    #[test]
    fn with_header_leaves_original_untouched() {
        let req = echo();
        let rewritten = req.with_header("trace-id", "t-2").with_header("shard", "7");

        assert_eq!(req.header("trace-id"), Some("t-1"));
        assert_eq!(req.headers().len(), 1);
        assert_eq!(rewritten.header("Trace-Id"), Some("t-2"));
        assert_eq!(rewritten.header("shard"), Some("7"));
        assert_eq!(rewritten.body(), req.body());
    }

    #[test]
    fn validate_names_the_missing_field() {
        assert!(echo().validate().is_ok());

        let err = Request::builder("keyvalue", "get").build().validate().unwrap_err();
        assert_eq!(err.to_string(), "bad request: missing caller");

        let err = Request::builder("keyvalue", "").caller("c").build().validate().unwrap_err();
        assert_eq!(err.to_string(), "bad request: missing procedure");
    }
}
