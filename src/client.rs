//! Session client for the Mill heater open API.
//!
//! Owns the whole session: the authentication handshake (API key/secret →
//! authorization code → access/refresh token pair), the token-validity
//! decision made before every authenticated call, and the throttled
//! reconciliation of remote rooms/heaters into the local entity store.
//!
//! One `MillClient` is one account session. Methods take `&mut self` and
//! assume non-overlapping calls; callers needing shared access must
//! serialize externally (e.g. a mutex around the client).

use chrono::{TimeDelta, Utc};
use log::{debug, error};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::{Duration, Instant};

use crate::models::mill::*;
use crate::response::{classify, ApiOutcome, ClientFault, RemoteFault};
use crate::store::EntityStore;
use crate::transport::{Transport, TransportError, UreqTransport, DEFAULT_TIMEOUT};

const API_ENDPOINT: &str = "https://api.millheat.com";
/// Minimum spacing between two heater syncs issued on behalf of readers.
const MIN_TIME_BETWEEN_UPDATES: Duration = Duration::from_secs(10);
/// Tokens with more remaining lifetime than this are used as-is.
const TOKEN_GUARD_BAND_HOURS: i64 = 2;

#[derive(Debug)]
pub enum MillError {
    /// An authenticated operation was issued before any successful
    /// authentication. Contract error, no network call is attempted.
    NotConnected,
    /// `request_access_token` was called before an authorization code was
    /// obtained.
    NoAuthorizationCode,
    /// The session was closed; the transport has been released.
    SessionClosed,
    Transport(TransportError),
    /// Transient server-side fault; retry later.
    RemoteUnavailable(RemoteFault),
    /// The server rejected the call with a specific error code.
    Rejected(ClientFault),
    /// A successful envelope carried a `data` payload we could not decode.
    Decode(String),
    /// Response did not match the success contract (missing flag, bad
    /// status, missing header...).
    Unexpected(String),
}

impl core::fmt::Display for MillError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            MillError::NotConnected => write!(f, "not connected: authenticate first"),
            MillError::NoAuthorizationCode => write!(f, "no authorization code obtained yet"),
            MillError::SessionClosed => write!(f, "session closed"),
            MillError::Transport(e) => write!(f, "transport error: {}", e),
            MillError::RemoteUnavailable(e) => write!(f, "service unavailable: {}", e),
            MillError::Rejected(e) => write!(f, "rejected: {}", e),
            MillError::Decode(s) => write!(f, "decode error: {}", s),
            MillError::Unexpected(s) => write!(f, "unexpected response: {}", s),
        }
    }
}

impl std::error::Error for MillError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MillError::Transport(e) => Some(e),
            _ => None,
        }
    }
}

impl From<TransportError> for MillError {
    fn from(value: TransportError) -> Self {
        MillError::Transport(value)
    }
}

/// Credential material owned exclusively by the client. The token set is
/// populated atomically: a failed handshake or refresh leaves the previous
/// material intact.
#[derive(Debug, Default)]
struct Credential {
    authorization_code: Option<String>,
    tokens: Option<TokenSet>,
}

pub struct MillClient<T: Transport = UreqTransport> {
    transport: Option<T>,
    access_key: String,
    secret_token: String,
    username: String,
    password: String,
    credential: Credential,
    store: EntityStore,
    last_heater_sync: Option<Instant>,
}

impl MillClient<UreqTransport> {
    pub fn new(
        access_key: impl Into<String>,
        secret_token: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self::with_timeout(access_key, secret_token, username, password, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(
        access_key: impl Into<String>,
        secret_token: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self::with_transport(UreqTransport::new(timeout), access_key, secret_token, username, password)
    }
}

impl<T: Transport> MillClient<T> {
    pub fn with_transport(
        transport: T,
        access_key: impl Into<String>,
        secret_token: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        MillClient {
            transport: Some(transport),
            access_key: access_key.into(),
            secret_token: secret_token.into(),
            username: username.into(),
            password: password.into(),
            credential: Credential::default(),
            store: EntityStore::default(),
            last_heater_sync: None,
        }
    }

    fn url(path: &str) -> String {
        format!("{}{}", API_ENDPOINT, path)
    }

    fn transport(&self) -> Result<&T, MillError> {
        self.transport.as_ref().ok_or(MillError::SessionClosed)
    }

    fn fault_for(outcome: ApiOutcome, endpoint: &str) -> MillError {
        match outcome {
            ApiOutcome::Remote(fault) => {
                error!("{}: {}", endpoint, fault);
                MillError::RemoteUnavailable(fault)
            }
            ApiOutcome::Client(fault) => {
                error!("{}: {}", endpoint, fault);
                MillError::Rejected(fault)
            }
            ApiOutcome::Success(_) | ApiOutcome::Failure => {
                error!("{}: response did not match the success contract", endpoint);
                MillError::Unexpected(format!("{}: unsuccessful response", endpoint))
            }
        }
    }

    fn decode<D: DeserializeOwned>(value: Value) -> Result<D, MillError> {
        serde_path_to_error::deserialize(value).map_err(|e| MillError::Decode(e.to_string()))
    }

    fn decode_tokens(data: Option<Value>) -> Result<TokenSet, MillError> {
        let value = data.ok_or_else(|| MillError::Unexpected("token response carried no data".to_string()))?;
        Self::decode(value)
    }

    // =====================
    // Credential lifecycle
    // =====================

    /// Runs the full handshake: authorization code, then access token.
    pub fn connect(&mut self) -> Result<(), MillError> {
        self.request_authorization_code()?;
        self.request_access_token()
    }

    /// Exchanges the API key/secret for a short-lived authorization code.
    /// The code arrives in a response header, not the body.
    pub fn request_authorization_code(&mut self) -> Result<(), MillError> {
        let headers = [
            ("access_key", self.access_key.as_str()),
            ("secret_token", self.secret_token.as_str()),
        ];
        let resp = self.transport()?.post(&Self::url("/share/applyAuthCode"), &headers, &[])?;
        match classify(resp.status, &resp.body) {
            ApiOutcome::Success(_) => {
                let code = resp.header("authorization_code").ok_or_else(|| {
                    MillError::Unexpected("applyAuthCode: authorization_code header missing".to_string())
                })?;
                self.credential.authorization_code = Some(code.to_string());
                debug!("obtained authorization code");
                Ok(())
            }
            other => Err(Self::fault_for(other, "applyAuthCode")),
        }
    }

    /// Exchanges the authorization code plus account credentials for an
    /// access/refresh token pair. A failure leaves any prior tokens intact.
    pub fn request_access_token(&mut self) -> Result<(), MillError> {
        let code = self
            .credential
            .authorization_code
            .clone()
            .ok_or(MillError::NoAuthorizationCode)?;
        let params = [
            ("username", self.username.clone()),
            ("password", self.password.clone()),
        ];
        let resp = self.transport()?.post(
            &Self::url("/share/applyAccessToken"),
            &[("authorization_code", code.as_str())],
            &params,
        )?;
        match classify(resp.status, &resp.body) {
            ApiOutcome::Success(data) => {
                let tokens = Self::decode_tokens(data)?;
                debug!("access token issued, expires {}", tokens.expires_at);
                self.credential.tokens = Some(tokens);
                Ok(())
            }
            other => Err(Self::fault_for(other, "applyAccessToken")),
        }
    }

    /// Returns an access token that is valid right now, refreshing or fully
    /// re-authenticating as needed. Policy, evaluated in order:
    ///
    /// 1. never authenticated: `NotConnected`
    /// 2. more than two hours of lifetime left: cached token, no network
    /// 3. refresh token itself expired: full handshake
    /// 4. otherwise: refresh endpoint; any fault means no usable token
    pub fn valid_token(&mut self) -> Result<String, MillError> {
        let Some(tokens) = &self.credential.tokens else {
            return Err(MillError::NotConnected);
        };
        let now = Utc::now();
        if tokens.expires_at - now > TimeDelta::hours(TOKEN_GUARD_BAND_HOURS) {
            return Ok(tokens.access_token.clone());
        }
        let refresh_token = tokens.refresh_token.clone();
        if tokens.refresh_expires_at < now {
            debug!("refresh token expired, reauthenticating");
            self.connect()?;
            return match &self.credential.tokens {
                Some(t) => Ok(t.access_token.clone()),
                None => Err(MillError::NotConnected),
            };
        }

        let params = [("refreshtoken", refresh_token)];
        let resp = self.transport()?.post(&Self::url("/share/refreshtoken"), &[], &params)?;
        match classify(resp.status, &resp.body) {
            ApiOutcome::Success(data) => {
                let tokens = Self::decode_tokens(data)?;
                debug!("access token refreshed, expires {}", tokens.expires_at);
                let access = tokens.access_token.clone();
                self.credential.tokens = Some(tokens);
                Ok(access)
            }
            other => Err(Self::fault_for(other, "refreshtoken")),
        }
    }

    // =====================
    // Request dispatch
    // =====================

    /// Sends one authenticated call and unwraps its `data` payload.
    /// Fail-fast: no retry at this layer.
    fn request(&mut self, path: &str, params: &[(&str, String)]) -> Result<Value, MillError> {
        let token = self.valid_token()?;
        debug!("POST {}", path);
        let resp = self
            .transport()?
            .post(&Self::url(path), &[("access_token", token.as_str())], params)?;
        match classify(resp.status, &resp.body) {
            ApiOutcome::Success(data) => Ok(data.unwrap_or(Value::Null)),
            other => Err(Self::fault_for(other, path)),
        }
    }

    // =====================
    // Synchronization
    // =====================

    pub fn home_list(&mut self) -> Result<Vec<HomeEntry>, MillError> {
        let data = self.request("/uds/selectHomeList", &[])?;
        let homes: HomeListData = Self::decode(data)?;
        Ok(homes.home_list)
    }

    /// Fetches every home's room list and merges it into the store.
    pub fn sync_rooms(&mut self) -> Result<(), MillError> {
        let homes = self.home_list()?;
        for home in homes {
            let params = [("homeId", home.home_id.to_string())];
            let data = self.request("/uds/selectRoombyHome", &params)?;
            let rooms: RoomListData = Self::decode(data)?;
            for entry in rooms.room_list {
                self.store.upsert_room(entry);
            }
        }
        Ok(())
    }

    /// Fetches roomless ("independent") devices per home, then the device
    /// list of every known room, and merges all sightings by device id.
    /// Per-room sightings come last, so they win when sources disagree.
    pub fn sync_heaters(&mut self) -> Result<(), MillError> {
        let homes = self.home_list()?;
        let mut sightings: Vec<(Option<RoomId>, DeviceEntry)> = Vec::new();
        for home in homes {
            let params = [("homeId", home.home_id.to_string())];
            let data = self.request("/uds/getIndependentDevices", &params)?;
            let list: IndependentDeviceData = Self::decode(data)?;
            sightings.extend(list.device_info_list.into_iter().flatten().map(|d| (None, d)));
        }
        for room_id in self.store.room_ids() {
            let params = [("roomId", room_id.to_string())];
            let data = self.request("/uds/selectDevicebyRoom", &params)?;
            let list: RoomDeviceData = Self::decode(data)?;
            sightings.extend(list.device_list.into_iter().flatten().map(|d| (Some(room_id), d)));
        }
        for (seen_in, entry) in sightings {
            self.store.upsert_heater(entry, seen_in);
        }
        Ok(())
    }

    /// Public read-side entry point: at most one underlying heater sync per
    /// ten-second window, however often readers poll. The marker moves
    /// before the fetch so a slow or failing sync cannot cause a burst.
    pub fn throttled_sync_heaters(&mut self) -> Result<(), MillError> {
        if let Some(last) = self.last_heater_sync
            && last.elapsed() < MIN_TIME_BETWEEN_UPDATES
        {
            return Ok(());
        }
        self.last_heater_sync = Some(Instant::now());
        self.sync_heaters()
    }

    /// Reads one heater through the throttle; `None` if the id is unknown
    /// after the (possibly suppressed) sync.
    pub fn device(&mut self, device_id: DeviceId) -> Result<Option<&Heater>, MillError> {
        self.throttled_sync_heaters()?;
        Ok(self.store.heater(device_id))
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    // =====================
    // Mutations
    // =====================

    /// Sets a heater's target temperature. The local cache is not updated
    /// optimistically; the next throttled sync picks up the change.
    pub fn set_heater_temp(&mut self, device_id: DeviceId, set_temp: f64) -> Result<(), MillError> {
        let params = [
            ("deviceId", device_id.to_string()),
            ("holdTemp", (set_temp as i64).to_string()),
            ("operation", 1.to_string()),
        ];
        self.request("/uds/deviceControlForOpenApi", &params)?;
        Ok(())
    }

    /// Releases the transport. Every subsequent operation fails with
    /// `SessionClosed`.
    pub fn close(&mut self) {
        if self.transport.take().is_some() {
            debug!("session closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::WireResponse;
    use http::StatusCode;
    use serde_json::json;
    use std::cell::RefCell;
    use std::collections::VecDeque;

    #[derive(Debug)]
    struct RecordedCall {
        url: String,
        headers: Vec<(String, String)>,
        params: Vec<(String, String)>,
    }

    #[derive(Default)]
    struct MockTransport {
        responses: RefCell<VecDeque<Result<WireResponse, TransportError>>>,
        calls: RefCell<Vec<RecordedCall>>,
    }

    impl MockTransport {
        fn new() -> MockTransport {
            MockTransport::default()
        }

        fn push(&self, resp: WireResponse) {
            self.responses.borrow_mut().push_back(Ok(resp));
        }

        fn push_err(&self, err: TransportError) {
            self.responses.borrow_mut().push_back(Err(err));
        }

        fn call_count(&self) -> usize {
            self.calls.borrow().len()
        }

        fn last_call<R>(&self, f: impl FnOnce(&RecordedCall) -> R) -> R {
            let calls = self.calls.borrow();
            f(calls.last().expect("at least one call recorded"))
        }
    }

    impl Transport for &MockTransport {
        fn post(
            &self,
            url: &str,
            headers: &[(&str, &str)],
            params: &[(&str, String)],
        ) -> Result<WireResponse, TransportError> {
            self.calls.borrow_mut().push(RecordedCall {
                url: url.to_string(),
                headers: headers.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
                params: params.iter().map(|(k, v)| (k.to_string(), v.clone())).collect(),
            });
            self.responses
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| panic!("unexpected call to {}", url))
        }
    }

    fn ok_body(body: serde_json::Value) -> WireResponse {
        WireResponse {
            status: StatusCode::OK,
            headers: Vec::new(),
            body,
        }
    }

    fn auth_code_resp(code: &str) -> WireResponse {
        WireResponse {
            status: StatusCode::OK,
            headers: vec![("authorization_code".to_string(), code.to_string())],
            body: json!({"success": true}),
        }
    }

    fn token_resp(access: &str, refresh: &str, expires_in: TimeDelta, refresh_in: TimeDelta) -> WireResponse {
        let now = Utc::now();
        ok_body(json!({
            "success": true,
            "data": {
                "access_token": access,
                "refresh_token": refresh,
                "expireTime": (now + expires_in).timestamp_millis(),
                "refresh_expireTime": (now + refresh_in).timestamp_millis(),
            }
        }))
    }

    fn client(mock: &MockTransport) -> MillClient<&MockTransport> {
        MillClient::with_transport(mock, "key", "secret", "user", "pass")
    }

    /// Connects with a token expiring `expires_in` from now.
    fn connected(mock: &MockTransport, expires_in: TimeDelta, refresh_in: TimeDelta) -> MillClient<&MockTransport> {
        mock.push(auth_code_resp("ABC"));
        mock.push(token_resp("T1", "R1", expires_in, refresh_in));
        let mut c = client(mock);
        c.connect().expect("handshake succeeds");
        c
    }

    #[test]
    fn handshake_then_cached_token_without_extra_calls() {
        let mock = MockTransport::new();
        let mut c = connected(&mock, TimeDelta::hours(3), TimeDelta::days(30));
        assert_eq!(mock.call_count(), 2);

        {
            let calls = mock.calls.borrow();
            assert_eq!(calls[0].url, "https://api.millheat.com/share/applyAuthCode");
            assert!(calls[0].headers.contains(&("access_key".to_string(), "key".to_string())));
            assert!(calls[0].headers.contains(&("secret_token".to_string(), "secret".to_string())));
            assert_eq!(calls[1].url, "https://api.millheat.com/share/applyAccessToken");
            assert!(calls[1].headers.contains(&("authorization_code".to_string(), "ABC".to_string())));
            assert!(calls[1].params.contains(&("username".to_string(), "user".to_string())));
            assert!(calls[1].params.contains(&("password".to_string(), "pass".to_string())));
        }

        // comfortably valid token: zero additional network calls
        assert_eq!(c.valid_token().unwrap(), "T1");
        assert_eq!(mock.call_count(), 2);
    }

    #[test]
    fn near_expiry_token_is_refreshed_exactly_once() {
        let mock = MockTransport::new();
        let mut c = connected(&mock, TimeDelta::hours(1), TimeDelta::days(30));

        mock.push(token_resp("T2", "R2", TimeDelta::hours(3), TimeDelta::days(30)));
        assert_eq!(c.valid_token().unwrap(), "T2");
        assert_eq!(mock.call_count(), 3);
        mock.last_call(|call| {
            assert_eq!(call.url, "https://api.millheat.com/share/refreshtoken");
            assert_eq!(call.params, vec![("refreshtoken".to_string(), "R1".to_string())]);
        });

        // new token is comfortably valid, no further traffic
        assert_eq!(c.valid_token().unwrap(), "T2");
        assert_eq!(mock.call_count(), 3);
    }

    #[test]
    fn expired_refresh_token_triggers_full_reauthentication() {
        let mock = MockTransport::new();
        let mut c = connected(&mock, -TimeDelta::hours(1), -TimeDelta::seconds(1));

        mock.push(auth_code_resp("DEF"));
        mock.push(token_resp("T3", "R3", TimeDelta::hours(3), TimeDelta::days(30)));
        assert_eq!(c.valid_token().unwrap(), "T3");
        assert_eq!(mock.call_count(), 4);
    }

    #[test]
    fn failed_refresh_yields_no_usable_token() {
        let mock = MockTransport::new();
        let mut c = connected(&mock, TimeDelta::hours(1), TimeDelta::days(30));

        mock.push(ok_body(json!({"errorCode": 241})));
        let err = c.valid_token().unwrap_err();
        assert!(matches!(err, MillError::Rejected(ClientFault::RefreshTokenExpired)));

        // prior credential untouched: the next attempt refreshes again
        mock.push(token_resp("T2", "R2", TimeDelta::hours(3), TimeDelta::days(30)));
        assert_eq!(c.valid_token().unwrap(), "T2");
    }

    #[test]
    fn authenticated_calls_before_connect_fail_without_network() {
        let mock = MockTransport::new();
        let mut c = client(&mock);
        assert!(matches!(c.valid_token(), Err(MillError::NotConnected)));
        assert!(matches!(c.sync_rooms(), Err(MillError::NotConnected)));
        assert_eq!(mock.call_count(), 0);
    }

    #[test]
    fn access_token_request_requires_an_authorization_code() {
        let mock = MockTransport::new();
        let mut c = client(&mock);
        assert!(matches!(c.request_access_token(), Err(MillError::NoAuthorizationCode)));
        assert_eq!(mock.call_count(), 0);
    }

    #[test]
    fn failed_handshake_leaves_credential_untouched() {
        let mock = MockTransport::new();
        let mut c = client(&mock);
        mock.push(ok_body(json!({"errorCode": 201})));
        let err = c.connect().unwrap_err();
        assert!(matches!(err, MillError::Rejected(ClientFault::WrongAccessKey)));
        assert!(matches!(c.valid_token(), Err(MillError::NotConnected)));
    }

    #[test]
    fn sync_rooms_is_idempotent() {
        let mock = MockTransport::new();
        let mut c = connected(&mock, TimeDelta::hours(3), TimeDelta::days(30));

        let homes = ok_body(json!({"success": true, "data": {"homeList": [{"homeId": 1}]}}));
        let rooms = ok_body(json!({"success": true, "data": {"roomList": [
            {"roomId": 4, "roomName": "Office", "comfortTemp": 22.0, "sleepTemp": 18.0},
            {"roomId": 5, "roomName": "Hall", "heatStatus": 1},
        ]}}));
        mock.push(homes.clone());
        mock.push(rooms.clone());
        c.sync_rooms().unwrap();
        let first = c.store().rooms().clone();
        assert_eq!(first.len(), 2);

        mock.push(homes);
        mock.push(rooms);
        c.sync_rooms().unwrap();
        assert_eq!(c.store().rooms(), &first);
    }

    #[test]
    fn sync_rooms_merges_omitted_fields() {
        let mock = MockTransport::new();
        let mut c = connected(&mock, TimeDelta::hours(3), TimeDelta::days(30));

        mock.push(ok_body(json!({"success": true, "data": {"homeList": [{"homeId": 1}]}})));
        mock.push(ok_body(json!({"success": true, "data": {"roomList": [
            {"roomId": 4, "sleepTemp": 18.0, "comfortTemp": 22.0},
        ]}})));
        c.sync_rooms().unwrap();

        // second sync omits sleepTemp: prior value survives, present fields update
        mock.push(ok_body(json!({"success": true, "data": {"homeList": [{"homeId": 1}]}})));
        mock.push(ok_body(json!({"success": true, "data": {"roomList": [
            {"roomId": 4, "comfortTemp": 23.0},
        ]}})));
        c.sync_rooms().unwrap();

        let room = c.store().room(RoomId(4)).unwrap();
        assert_eq!(room.sleep_temp, Some(18.0));
        assert_eq!(room.comfort_temp, Some(23.0));
    }

    #[test]
    fn sync_heaters_merges_independent_and_per_room_sightings() {
        let mock = MockTransport::new();
        let mut c = connected(&mock, TimeDelta::hours(3), TimeDelta::days(30));

        mock.push(ok_body(json!({"success": true, "data": {"homeList": [{"homeId": 1}]}})));
        mock.push(ok_body(json!({"success": true, "data": {"roomList": [{"roomId": 4}]}})));
        c.sync_rooms().unwrap();

        mock.push(ok_body(json!({"success": true, "data": {"homeList": [{"homeId": 1}]}})));
        mock.push(ok_body(json!({"success": true, "data": {"deviceInfoList": [
            null,
            {"deviceId": 9, "deviceName": "Panel", "currentTemp": 20.0},
        ]}})));
        mock.push(ok_body(json!({"success": true, "data": {"deviceList": [
            {"deviceId": 9, "currentTemp": 21.0},
        ]}})));
        c.sync_heaters().unwrap();

        // the per-room sighting came last and wins; earlier fields are kept
        let heater = c.store().heater(DeviceId(9)).unwrap();
        assert_eq!(heater.current_temp, Some(21.0));
        assert_eq!(heater.name.as_deref(), Some("Panel"));
        assert_eq!(heater.room, Some(RoomId(4)));
        assert_eq!(c.store().heaters().len(), 1);
    }

    #[test]
    fn device_query_fault_produces_no_upsert() {
        let mock = MockTransport::new();
        let mut c = connected(&mock, TimeDelta::hours(3), TimeDelta::days(30));

        mock.push(ok_body(json!({"errorCode": 304})));
        let err = c.device(DeviceId(9)).unwrap_err();
        assert!(matches!(err, MillError::Rejected(ClientFault::DeviceNotFound)));
        assert!(c.store().heaters().is_empty());
    }

    #[test]
    fn throttle_suppresses_back_to_back_syncs() {
        let mock = MockTransport::new();
        let mut c = connected(&mock, TimeDelta::hours(3), TimeDelta::days(30));

        mock.push(ok_body(json!({"success": true, "data": {"homeList": []}})));
        c.throttled_sync_heaters().unwrap();
        assert_eq!(mock.call_count(), 3);

        // inside the window: no fetch at all
        c.throttled_sync_heaters().unwrap();
        assert_eq!(c.device(DeviceId(9)).unwrap(), None);
        assert_eq!(mock.call_count(), 3);
    }

    #[test]
    fn throttle_marker_advances_even_when_the_fetch_fails() {
        let mock = MockTransport::new();
        let mut c = connected(&mock, TimeDelta::hours(3), TimeDelta::days(30));

        mock.push(ok_body(json!({"errorCode": 101})));
        assert!(matches!(
            c.throttled_sync_heaters(),
            Err(MillError::RemoteUnavailable(RemoteFault::RemoteSystem))
        ));
        assert_eq!(mock.call_count(), 3);

        // the failed attempt consumed the window
        c.throttled_sync_heaters().unwrap();
        assert_eq!(mock.call_count(), 3);
    }

    #[test]
    fn transport_failure_surfaces_and_nothing_is_cached() {
        let mock = MockTransport::new();
        let mut c = connected(&mock, TimeDelta::hours(3), TimeDelta::days(30));

        mock.push_err(TransportError::Network("connection timed out".to_string()));
        assert!(matches!(c.sync_rooms(), Err(MillError::Transport(_))));
        assert!(c.store().rooms().is_empty());
    }

    #[test]
    fn set_heater_temp_sends_the_control_payload() {
        let mock = MockTransport::new();
        let mut c = connected(&mock, TimeDelta::hours(3), TimeDelta::days(30));

        mock.push(ok_body(json!({"success": true, "data": {}})));
        c.set_heater_temp(DeviceId(9), 21.7).unwrap();
        mock.last_call(|call| {
            assert_eq!(call.url, "https://api.millheat.com/uds/deviceControlForOpenApi");
            assert!(call.headers.iter().any(|(k, v)| k == "access_token" && v == "T1"));
            assert_eq!(
                call.params,
                vec![
                    ("deviceId".to_string(), "9".to_string()),
                    ("holdTemp".to_string(), "21".to_string()),
                    ("operation".to_string(), "1".to_string()),
                ]
            );
        });
        // no optimistic cache update
        assert!(c.store().heaters().is_empty());
    }

    #[test]
    fn closed_session_rejects_further_operations() {
        let mock = MockTransport::new();
        let mut c = connected(&mock, TimeDelta::hours(3), TimeDelta::days(30));
        c.close();
        assert!(matches!(c.set_heater_temp(DeviceId(9), 20.0), Err(MillError::SessionClosed)));
        assert!(matches!(c.connect(), Err(MillError::SessionClosed)));
        assert_eq!(mock.call_count(), 2);
    }
}
