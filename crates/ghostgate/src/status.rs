//! Status codes carried by handler results.
//!
//! A guarded handler's result may carry an HTTP status. [`StatusCarrier`]
//! covers the shapes handlers actually return: plain values (no status),
//! `(body, status)` pairs and triples, `(status, body)` pairs, `Result`s of
//! those, and types exposing a status field. Anything else can be returned
//! through [`Plain`] or [`WithStatus`].

use reqwest::StatusCode;

pub trait StatusCarrier {
    /// HTTP status carried by this value, if any.
    fn status_code(&self) -> Option<u16> {
        None
    }
}

/// A result counts as successful unless it carries a 5xx-or-above status.
pub fn is_success(status_code: Option<u16>) -> bool {
    status_code.map_or(true, |code| code < 500)
}

/// Wraps any value so it can be returned from a guarded handler without a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Plain<T>(pub T);

impl<T> StatusCarrier for Plain<T> {}

/// Attach a status to any value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithStatus<T> {
    pub body: T,
    pub status: u16,
}

impl<T> StatusCarrier for WithStatus<T> {
    fn status_code(&self) -> Option<u16> {
        Some(self.status)
    }
}

impl StatusCarrier for () {}
impl StatusCarrier for String {}
impl StatusCarrier for &str {}
impl StatusCarrier for Vec<u8> {}
impl StatusCarrier for bool {}
impl StatusCarrier for serde_json::Value {}

impl StatusCarrier for StatusCode {
    fn status_code(&self) -> Option<u16> {
        Some(self.as_u16())
    }
}

impl StatusCarrier for reqwest::Response {
    fn status_code(&self) -> Option<u16> {
        Some(self.status().as_u16())
    }
}

impl<A> StatusCarrier for (A, u16) {
    fn status_code(&self) -> Option<u16> {
        Some(self.1)
    }
}

impl<A, C> StatusCarrier for (A, u16, C) {
    fn status_code(&self) -> Option<u16> {
        Some(self.1)
    }
}

impl<A> StatusCarrier for (A, StatusCode) {
    fn status_code(&self) -> Option<u16> {
        Some(self.1.as_u16())
    }
}

impl<A, C> StatusCarrier for (A, StatusCode, C) {
    fn status_code(&self) -> Option<u16> {
        Some(self.1.as_u16())
    }
}

macro_rules! status_first {
    ($($body:ty),*) => {$(
        impl StatusCarrier for (StatusCode, $body) {
            fn status_code(&self) -> Option<u16> {
                Some(self.0.as_u16())
            }
        }
    )*};
}

status_first!(String, &str, Vec<u8>, serde_json::Value);

/// Either arm may carry the status.
impl<T: StatusCarrier, E: StatusCarrier> StatusCarrier for Result<T, E> {
    fn status_code(&self) -> Option<u16> {
        match self {
            Ok(value) => value.status_code(),
            Err(err) => err.status_code(),
        }
    }
}

impl<T: StatusCarrier> StatusCarrier for Option<T> {
    fn status_code(&self) -> Option<u16> {
        self.as_ref().and_then(StatusCarrier::status_code)
    }
}

impl<T: StatusCarrier + ?Sized> StatusCarrier for Box<T> {
    fn status_code(&self) -> Option<u16> {
        (**self).status_code()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_threshold() {
        assert!(is_success(None));
        assert!(is_success(Some(200)));
        assert!(is_success(Some(404)));
        assert!(is_success(Some(499)));
        assert!(!is_success(Some(500)));
        assert!(!is_success(Some(503)));
    }

    #[test]
    fn test_shapes() {
        assert_eq!("ok".status_code(), None);
        assert_eq!(String::from("ok").status_code(), None);
        assert_eq!(Plain(42).status_code(), None);
        assert_eq!(serde_json::json!({"status_code": 500}).status_code(), None);

        assert_eq!(("body", 404u16).status_code(), Some(404));
        assert_eq!(("body", 503u16, "headers").status_code(), Some(503));
        assert_eq!(("body", StatusCode::CREATED).status_code(), Some(201));
        assert_eq!(StatusCode::BAD_GATEWAY.status_code(), Some(502));
        assert_eq!(
            WithStatus {
                body: (),
                status: 418
            }
            .status_code(),
            Some(418)
        );
        assert_eq!(Some(("x", 500u16)).status_code(), Some(500));
        assert_eq!(None::<String>.status_code(), None);
    }

    #[test]
    fn test_status_first_and_results() {
        assert_eq!((StatusCode::NOT_FOUND, "missing").status_code(), Some(404));
        assert_eq!(
            (StatusCode::OK, serde_json::json!({"ok": true})).status_code(),
            Some(200)
        );

        let ok: Result<String, (StatusCode, String)> = Ok("fine".to_string());
        assert_eq!(ok.status_code(), None);
        assert!(is_success(ok.status_code()));

        let failed: Result<String, (StatusCode, String)> =
            Err((StatusCode::SERVICE_UNAVAILABLE, "down".to_string()));
        assert_eq!(failed.status_code(), Some(503));
        assert!(!is_success(failed.status_code()));

        let created: Result<(&str, u16), StatusCode> = Ok(("made", 201));
        assert_eq!(created.status_code(), Some(201));
    }
}
