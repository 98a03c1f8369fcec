//! Classification of Mill API response bodies.
//!
//! Every endpoint answers with `{ errorCode?, success?, data? }`. The
//! classifier maps that envelope to a small taxonomy the rest of the client
//! branches on; it never fails itself.

use http::StatusCode;
use serde_json::Value;

/// Transient server-side faults; the caller may retry later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteFault {
    /// errorCode 101
    RemoteSystem,
    /// errorCode 102, the UDS gateway behind the open API
    Uds,
}

impl core::fmt::Display for RemoteFault {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            RemoteFault::RemoteSystem => write!(f, "remote system error (101)"),
            RemoteFault::Uds => write!(f, "UDS error (102)"),
        }
    }
}

/// Terminal rejections of the current call; the numeric code is preserved
/// for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientFault {
    WrongAccessKey,
    UserNotFound,
    InvalidAuthorizationCode,
    AccountLapsed,
    RefreshTokenExpired,
    RefreshTokenInvalid,
    DeviceNotOwned,
    DeviceNotFound,
    Other(i64),
}

impl ClientFault {
    fn from_code(code: i64) -> ClientFault {
        match code {
            201 => ClientFault::WrongAccessKey,
            221 => ClientFault::UserNotFound,
            222 => ClientFault::InvalidAuthorizationCode,
            223 | 243 => ClientFault::AccountLapsed,
            241 => ClientFault::RefreshTokenExpired,
            242 => ClientFault::RefreshTokenInvalid,
            303 => ClientFault::DeviceNotOwned,
            304 => ClientFault::DeviceNotFound,
            other => ClientFault::Other(other),
        }
    }

    pub fn code(&self) -> i64 {
        match self {
            ClientFault::WrongAccessKey => 201,
            ClientFault::UserNotFound => 221,
            ClientFault::InvalidAuthorizationCode => 222,
            ClientFault::AccountLapsed => 223,
            ClientFault::RefreshTokenExpired => 241,
            ClientFault::RefreshTokenInvalid => 242,
            ClientFault::DeviceNotOwned => 303,
            ClientFault::DeviceNotFound => 304,
            ClientFault::Other(code) => *code,
        }
    }
}

impl core::fmt::Display for ClientFault {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ClientFault::WrongAccessKey => write!(f, "wrong access key (201)"),
            ClientFault::UserNotFound => write!(f, "user does not exist (221)"),
            ClientFault::InvalidAuthorizationCode => write!(f, "authorization code is invalid (222)"),
            ClientFault::AccountLapsed => write!(f, "application account has lapsed"),
            ClientFault::RefreshTokenExpired => write!(f, "refresh token is wrong or expired (241)"),
            ClientFault::RefreshTokenInvalid => write!(f, "refresh token is wrong (242)"),
            ClientFault::DeviceNotOwned => write!(f, "the device is not yours (303)"),
            ClientFault::DeviceNotFound => write!(f, "cannot find device info (304)"),
            ClientFault::Other(code) => write!(f, "error code {}", code),
        }
    }
}

/// Outcome of inspecting one response envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiOutcome {
    /// HTTP 200, `success: true`, no error code. Carries the `data` object
    /// when the endpoint returned one.
    Success(Option<Value>),
    Remote(RemoteFault),
    Client(ClientFault),
    /// Anything else: unexpected status, missing success flag, unknown shape.
    Failure,
}

pub fn classify(status: StatusCode, body: &Value) -> ApiOutcome {
    // errorCode 0 is the API's "no error" filler and falls through to the
    // success check.
    if let Some(code) = body.get("errorCode").and_then(Value::as_i64)
        && code != 0
    {
        return match code {
            101 => ApiOutcome::Remote(RemoteFault::RemoteSystem),
            102 => ApiOutcome::Remote(RemoteFault::Uds),
            other => ApiOutcome::Client(ClientFault::from_code(other)),
        };
    }

    let success = body.get("success").and_then(Value::as_bool).unwrap_or(false);
    if status == StatusCode::OK && success {
        ApiOutcome::Success(body.get("data").cloned())
    } else {
        ApiOutcome::Failure
    }
}
