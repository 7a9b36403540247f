/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 25/10/25
******************************************************************************/

//! The client session state machine.
//!
//! A [`ClientSession`] opens the `create_session` stream, runs a single
//! reader task that drives the message parser, rebinds the session when the
//! server sends a LOOP, and dispatches decoded item updates to the
//! registered subscription listeners.

use crate::client::ClientConfig;
use crate::connection::HttpCaller;
use crate::protocol::{ControlMessage, MessageStream, SessionMessage};
use crate::subscription::{SubscriptionEntry, SubscriptionListener, Subscriptions};
use crate::utils::Error;
use futures::TryStreamExt;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tokio_util::io::StreamReader;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Maximum tolerated difference between the client's and the server's idea
/// of the session age before a warning is logged.
const MAX_CLOCK_SKEW_SECONDS: i64 = 5;

/// Interval of the bound-state polling loop.
const BIND_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A client session with a Lightstreamer server.
///
/// The session is created by [`ClientSession::connect`] (or
/// [`ClientSession::start`] for callers that want to await the bind
/// themselves) and lives until the server terminates it, the transport
/// fails, or [`ClientSession::disconnect`] is called. Subscriptions are
/// added with [`ClientSession::subscribe`] and live until the session
/// terminates.
pub struct ClientSession {
    shared: Arc<Shared>,
    cancel: CancellationToken,
}

impl std::fmt::Debug for ClientSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSession").finish_non_exhaustive()
    }
}

struct Shared {
    caller: HttpCaller,
    session_form: Vec<(&'static str, String)>,
    session_id: RwLock<Option<String>>,
    created_at: Mutex<Option<Instant>>,
    request_limit: AtomicU32,
    keep_alive: AtomicU32,
    time_difference: AtomicI64,
    next_id: AtomicU32,
    connections: AtomicI64,
    subscriptions: Subscriptions,
}

/// What the reader should do once a stream is exhausted.
enum Flow {
    /// A LOOP message was received: rebind after the given delay (seconds).
    Rebind(u64),
    /// EOF or a fatal read error: the session is over.
    Closed,
}

impl ClientSession {
    /// Opens a session and waits for it to become bound.
    ///
    /// Sends `create_session`, starts the reader task and waits up to
    /// `config.bind_timeout` for the server's CONOK. On timeout the session
    /// is disconnected before the error is returned, so no further requests
    /// are issued.
    ///
    /// # Errors
    ///
    /// Returns the transport or server error of the `create_session`
    /// request, or [`Error::BindTimeout`] when no CONOK arrives in time.
    pub async fn connect(config: ClientConfig) -> Result<Self, Error> {
        let bind_timeout = config.bind_timeout;
        let session = Self::start(config).await?;
        if let Err(e) = session.established(bind_timeout).await {
            session.disconnect();
            return Err(e);
        }
        Ok(session)
    }

    /// Opens a session and returns as soon as the `create_session` request
    /// completes, before the server's CONOK.
    ///
    /// The session is still unbound on return and [`subscribe`] will fail
    /// until it is; use [`established`] to wait for the bind.
    ///
    /// [`subscribe`]: ClientSession::subscribe
    /// [`established`]: ClientSession::established
    ///
    /// # Errors
    ///
    /// Returns the transport or server error of the `create_session`
    /// request.
    pub async fn start(config: ClientConfig) -> Result<Self, Error> {
        let shared = Arc::new(Shared {
            caller: HttpCaller::new(config.http_client.clone(), config.server_url.clone()),
            session_form: config.session_form(),
            session_id: RwLock::new(None),
            created_at: Mutex::new(None),
            request_limit: AtomicU32::new(0),
            keep_alive: AtomicU32::new(0),
            time_difference: AtomicI64::new(0),
            next_id: AtomicU32::new(0),
            connections: AtomicI64::new(0),
            subscriptions: Subscriptions::default(),
        });
        let response = shared.create_session().await?;
        let cancel = CancellationToken::new();
        tokio::spawn(Shared::run(shared.clone(), cancel.clone(), response));
        Ok(Self { shared, cancel })
    }

    /// Waits for the session to be bound, polling until `timeout` elapses.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BindTimeout`] when the timeout elapses first, or
    /// [`Error::Canceled`] when the session is disconnected while waiting.
    pub async fn established(&self, timeout: Duration) -> Result<(), Error> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.is_bound() {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(Error::BindTimeout);
            }
            tokio::select! {
                _ = self.cancel.cancelled() => return Err(Error::Canceled),
                _ = sleep(BIND_POLL_INTERVAL) => {}
            }
        }
    }

    /// Returns `true` once the server has assigned a session id.
    ///
    /// The id is kept through rebinds and after an END-driven termination;
    /// it is only cleared when a rebind fails and the session becomes
    /// unusable.
    pub fn is_bound(&self) -> bool {
        self.shared
            .session_id
            .read()
            .as_deref()
            .is_some_and(|id| !id.is_empty())
    }

    /// The last observed difference between the client's session age and
    /// the server's, in seconds. Positive when the client clock runs ahead.
    pub fn time_difference(&self) -> i64 {
        self.shared.time_difference.load(Ordering::Relaxed)
    }

    /// Registers a new subscription for the given data adapter and group,
    /// asking for data adhering to `schema`. Received updates are decoded
    /// and passed to `listener`.
    ///
    /// If `max_frequency` is set, the server is asked to limit updates to
    /// that many per second; the server may ignore it and no client-side
    /// throttling is applied. All subscriptions are in MERGE mode. Returns
    /// the allocated subscription id.
    ///
    /// # Errors
    ///
    /// - [`Error::Canceled`] when the session has been disconnected; no
    ///   request is issued.
    /// - [`Error::NotConnected`] when the session is not bound yet; no
    ///   request is issued.
    /// - [`Error::Rejected`] with the server's code and message on REQERR.
    /// - [`Error::UnexpectedReply`] on any other control reply.
    pub async fn subscribe<L>(
        &self,
        adapter: &str,
        group: &str,
        schema: &[&str],
        max_frequency: Option<f64>,
        listener: L,
    ) -> Result<u32, Error>
    where
        L: SubscriptionListener + 'static,
    {
        if self.cancel.is_cancelled() {
            return Err(Error::Canceled);
        }
        let Some(session_id) = self
            .shared
            .session_id
            .read()
            .clone()
            .filter(|id| !id.is_empty())
        else {
            return Err(Error::NotConnected);
        };

        let subscription_id = self.shared.allocate_id();
        let request_id = self.shared.allocate_id();
        let mut form = vec![
            ("LS_op", "add".to_string()),
            ("LS_reqId", request_id.to_string()),
            ("LS_session", session_id),
            ("LS_subId", subscription_id.to_string()),
            ("LS_data_adapter", adapter.to_string()),
            ("LS_group", group.to_string()),
            ("LS_schema", schema.join(" ")),
            ("LS_mode", "MERGE".to_string()),
        ];
        if let Some(frequency) = max_frequency {
            form.push(("LS_requested_max_frequency", frequency.to_string()));
        }

        let reply = tokio::select! {
            _ = self.cancel.cancelled() => return Err(Error::Canceled),
            reply = self.shared.caller.control(&form) => reply?,
        };
        match ControlMessage::parse(&reply)? {
            ControlMessage::Reqok { .. } => {
                // Register before returning, so the first U for this id
                // finds the entry.
                self.shared
                    .subscriptions
                    .add(subscription_id, SubscriptionEntry::new(group, Box::new(listener)));
                debug!(subscription = subscription_id, group = %group, "subscription registered");
                Ok(subscription_id)
            }
            ControlMessage::Reqerr { code, message, .. } => Err(Error::Rejected { code, message }),
            ControlMessage::Unsupported { kind, .. } => Err(Error::UnexpectedReply(kind)),
        }
    }

    /// Closes the session: the streaming body is dropped, any pending
    /// rebind sleep is aborted and the reader task exits. Idempotent.
    pub fn disconnect(&self) {
        self.cancel.cancel();
    }
}

impl Drop for ClientSession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl Shared {
    async fn create_session(&self) -> Result<reqwest::Response, Error> {
        let response = self.caller.create_session(&self.session_form).await?;
        *self.created_at.lock() = Some(Instant::now());
        Ok(response)
    }

    async fn bind_session(&self) -> Result<reqwest::Response, Error> {
        let session_id = self
            .session_id
            .read()
            .clone()
            .ok_or(Error::NotConnected)?;
        let response = self.caller.bind_session(&session_id).await?;
        *self.created_at.lock() = Some(Instant::now());
        Ok(response)
    }

    /// Allocates the next id. Request and subscription ids are drawn from
    /// the same counter, keeping each sequence strictly increasing and the
    /// two sequences disjoint.
    fn allocate_id(&self) -> u32 {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// The reader task: at most one per session. LOOP-driven rebinds are
    /// handled in place, so the current stream is fully released before its
    /// successor is opened.
    async fn run(shared: Arc<Shared>, cancel: CancellationToken, response: reqwest::Response) {
        debug!(
            count = shared.connections.fetch_add(1, Ordering::Relaxed) + 1,
            "serving connection"
        );
        let mut response = Some(response);
        while let Some(body) = response.take() {
            let outcome = tokio::select! {
                _ = cancel.cancelled() => break,
                outcome = shared.serve(body) => outcome,
            };
            let Flow::Rebind(delay) = outcome else {
                break;
            };
            if delay > 0 {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = sleep(Duration::from_secs(delay)) => {}
                }
            }
            let rebound = tokio::select! {
                _ = cancel.cancelled() => break,
                rebound = shared.bind_session() => rebound,
            };
            match rebound {
                Ok(next) => response = Some(next),
                Err(e) => {
                    warn!(error = %e, "rebind failed");
                    // The session is unusable from here on; unbind so that
                    // subscribe reports it.
                    *shared.session_id.write() = None;
                    break;
                }
            }
        }
        debug!(
            count = shared.connections.fetch_sub(1, Ordering::Relaxed) - 1,
            "connection closed"
        );
    }

    /// Drains one streaming body. Returns on LOOP (the body is dropped
    /// here, which closes it), EOF or a read failure.
    async fn serve(&self, response: reqwest::Response) -> Flow {
        let body = StreamReader::new(Box::pin(
            response.bytes_stream().map_err(std::io::Error::other),
        ));
        let mut messages = MessageStream::new(body);
        while let Some(message) = messages.next().await {
            match message {
                Ok(SessionMessage::Loop { expected_delay }) => {
                    debug!(delay = expected_delay, "rebinding session");
                    return Flow::Rebind(expected_delay);
                }
                Ok(message) => self.handle_message(message),
                Err(Error::Parse { line, reason }) => {
                    warn!(line = %line, reason = %reason, "skipping unparseable line");
                }
                Err(e) => {
                    warn!(error = %e, "stream read failed");
                    return Flow::Closed;
                }
            }
        }
        Flow::Closed
    }

    fn handle_message(&self, message: SessionMessage) {
        match message {
            SessionMessage::Conok {
                session_id,
                request_limit,
                keep_alive,
                ..
            } => {
                self.request_limit.store(request_limit, Ordering::Relaxed);
                self.keep_alive.store(keep_alive, Ordering::Relaxed);
                debug!(session_id = %session_id, keep_alive, "session established");
                *self.session_id.write() = Some(session_id);
            }
            SessionMessage::Sync {
                seconds_since_initial_header,
            } => self.handle_sync(seconds_since_initial_header),
            SessionMessage::Update {
                subscription,
                item,
                values,
            } => self.handle_update(subscription, item, &values),
            SessionMessage::End { code, message } => {
                info!(code, message = %message, "session terminated by server");
            }
            SessionMessage::Unsupported { kind, args } => {
                debug!(kind = %kind, ?args, "ignoring unsupported message");
            }
            // Handled by serve before this is reached.
            SessionMessage::Loop { .. } => {}
            SessionMessage::Servname { .. }
            | SessionMessage::Clientip { .. }
            | SessionMessage::Cons { .. }
            | SessionMessage::Noop { .. }
            | SessionMessage::Probe
            | SessionMessage::Subok { .. }
            | SessionMessage::Conf { .. }
            | SessionMessage::Prog { .. } => {}
        }
    }

    fn handle_sync(&self, server_seconds: u64) {
        let Some(created) = *self.created_at.lock() else {
            return;
        };
        let elapsed = created.elapsed().as_secs() as i64;
        let delta = elapsed - server_seconds as i64;
        self.time_difference.store(delta, Ordering::Relaxed);
        if delta.abs() > MAX_CLOCK_SKEW_SECONDS {
            warn!(delta, "session clock skew detected");
        } else {
            debug!(delta, "time sync");
        }
    }

    fn handle_update(&self, subscription: u32, item: u32, update: &[String]) {
        let Some(entry) = self.subscriptions.get(subscription) else {
            warn!(subscription, "no subscription found for update");
            return;
        };
        match entry.apply(item, update) {
            // The registry and item locks are released here; the listener
            // may re-enter subscribe.
            Ok(values) => entry.notify(item, &values),
            Err(e) => {
                warn!(subscription, item, group = %entry.group(), error = %e, "dropping invalid update");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shared() -> Shared {
        Shared {
            caller: HttpCaller::new(reqwest::Client::new(), "http://localhost"),
            session_form: Vec::new(),
            session_id: RwLock::new(None),
            created_at: Mutex::new(None),
            request_limit: AtomicU32::new(0),
            keep_alive: AtomicU32::new(0),
            time_difference: AtomicI64::new(0),
            next_id: AtomicU32::new(0),
            connections: AtomicI64::new(0),
            subscriptions: Subscriptions::default(),
        }
    }

    #[test]
    fn test_allocate_id_is_monotonic() {
        let shared = shared();
        let first = shared.allocate_id();
        let second = shared.allocate_id();
        let third = shared.allocate_id();
        assert_eq!((first, second, third), (1, 2, 3));
    }

    #[test]
    fn test_conok_binds_session() {
        let shared = shared();
        shared.handle_message(SessionMessage::Conok {
            session_id: "S123".to_string(),
            request_limit: 50000,
            keep_alive: 5000,
            control_link: "*".to_string(),
        });
        assert_eq!(shared.session_id.read().as_deref(), Some("S123"));
        assert_eq!(shared.keep_alive.load(Ordering::Relaxed), 5000);
        assert_eq!(shared.request_limit.load(Ordering::Relaxed), 50000);
    }

    #[test]
    fn test_sync_stores_time_difference() {
        let shared = shared();
        *shared.created_at.lock() = Some(Instant::now() - Duration::from_secs(30));
        shared.handle_sync(10);
        assert_eq!(shared.time_difference.load(Ordering::Relaxed), 20);
    }

    #[test]
    fn test_sync_without_creation_time_is_ignored() {
        let shared = shared();
        shared.handle_sync(10);
        assert_eq!(shared.time_difference.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_update_dispatches_to_listener() {
        let shared = shared();
        let (listener, mut rx) = crate::subscription::ChannelListener::create_channel();
        shared
            .subscriptions
            .add(1, SubscriptionEntry::new("g", Box::new(listener)));

        shared.handle_update(1, 1, &["foo%20bar".to_string(), "42".to_string()]);
        let (item, values) = rx.try_recv().unwrap();
        assert_eq!(item, 1);
        assert_eq!(values.to_string(), "foo bar,42");

        // Subsequent updates are deltas over the stored snapshot.
        shared.handle_update(1, 1, &["".to_string(), "43".to_string()]);
        let (_, values) = rx.try_recv().unwrap();
        assert_eq!(values.to_string(), "foo bar,43");
    }

    #[test]
    fn test_update_for_unknown_subscription_is_dropped() {
        let shared = shared();
        // Must not panic; the update is logged and dropped.
        shared.handle_update(99, 1, &["x".to_string()]);
    }

    #[test]
    fn test_invalid_update_does_not_notify() {
        let shared = shared();
        let (listener, mut rx) = crate::subscription::ChannelListener::create_channel();
        shared
            .subscriptions
            .add(1, SubscriptionEntry::new("g", Box::new(listener)));

        shared.handle_update(1, 1, &["1".to_string(), "2".to_string()]);
        rx.try_recv().unwrap();

        shared.handle_update(1, 1, &["1".to_string()]);
        assert!(rx.try_recv().is_err());
    }
}
