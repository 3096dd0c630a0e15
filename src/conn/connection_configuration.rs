use crate::DrivelineError;
use debug_ignore::DebugIgnore;
use std::sync::Arc;
use std::time::Duration;

/// Sink for non-fatal errors (framing violations, undecodable server
/// messages, late replies for finished consumers).
pub(crate) type ErrorSink = Arc<dyn Fn(&DrivelineError) + Send + Sync>;

/// Configuration of a [`Client`](crate::Client).
///
/// An instance is normally created with `default()` and adjusted as needed
/// with the `with_*` builder methods or the setters.
#[derive(Clone, Debug)]
pub struct ConnectionConfiguration {
    max_reconnect: i32,
    reconnect_wait: Duration,
    max_reconnect_wait: Duration,
    max_in_flight: usize,
    connect_timeout: Duration,
    http_headers: Vec<(String, String)>,
    error_handler: DebugIgnore<Option<ErrorSink>>,
}

impl Default for ConnectionConfiguration {
    fn default() -> Self {
        Self {
            max_reconnect: Self::RECONNECT_FOREVER,
            reconnect_wait: Self::DEFAULT_RECONNECT_WAIT,
            max_reconnect_wait: Self::DEFAULT_RECONNECT_WAIT
                .saturating_mul(Self::MAX_RECONNECT_WAIT_RATIO),
            max_in_flight: Self::DEFAULT_MAX_IN_FLIGHT,
            connect_timeout: Self::DEFAULT_CONNECT_TIMEOUT,
            http_headers: Vec::new(),
            error_handler: DebugIgnore(None),
        }
    }
}

impl ConnectionConfiguration {
    /// Value of `max_reconnect` that lets the client retry forever.
    pub const RECONNECT_FOREVER: i32 = -1;

    /// Default base delay between reconnection attempts.
    pub const DEFAULT_RECONNECT_WAIT: Duration = Duration::from_secs(1);

    /// `max_reconnect_wait` is raised to this multiple of `reconnect_wait`
    /// whenever a new `reconnect_wait` would exceed it.
    pub const MAX_RECONNECT_WAIT_RATIO: u32 = 5;

    /// Default number of outgoing messages that can be buffered before
    /// senders block.
    pub const DEFAULT_MAX_IN_FLIGHT: usize = 100;

    /// Default time budget for a single connection attempt, handshake
    /// included.
    pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

    /// Returns the bound on consecutive failed reconnection attempts;
    /// `RECONNECT_FOREVER` means unbounded.
    pub fn max_reconnect(&self) -> i32 {
        self.max_reconnect
    }
    /// Limits the number of consecutive failed reconnection attempts.
    pub fn set_max_reconnect(&mut self, max: i32) {
        self.max_reconnect = max;
    }
    /// Builder-method for limiting consecutive failed reconnection attempts.
    #[must_use]
    pub fn with_max_reconnect(mut self, max: i32) -> Self {
        self.set_max_reconnect(max);
        self
    }
    /// Builder-method for retrying forever.
    #[must_use]
    pub fn with_reconnect_forever(mut self) -> Self {
        self.set_max_reconnect(Self::RECONNECT_FOREVER);
        self
    }

    /// Returns the base delay between reconnection attempts.
    pub fn reconnect_wait(&self) -> Duration {
        self.reconnect_wait
    }
    /// Sets the base delay between reconnection attempts.
    ///
    /// Raises `max_reconnect_wait` to five times the given value when it
    /// would otherwise fall below the base delay.
    pub fn set_reconnect_wait(&mut self, wait: Duration) {
        self.reconnect_wait = wait;
        if self.max_reconnect_wait < wait {
            self.max_reconnect_wait = wait.saturating_mul(Self::MAX_RECONNECT_WAIT_RATIO);
        }
    }
    /// Builder-method for setting the base reconnection delay.
    #[must_use]
    pub fn with_reconnect_wait(mut self, wait: Duration) -> Self {
        self.set_reconnect_wait(wait);
        self
    }

    /// Returns the cap applied to the reconnection delay.
    pub fn max_reconnect_wait(&self) -> Duration {
        self.max_reconnect_wait
    }
    /// Sets the cap applied to the reconnection delay.
    pub fn set_max_reconnect_wait(&mut self, wait: Duration) {
        self.max_reconnect_wait = wait;
    }
    /// Builder-method for setting the reconnection delay cap.
    #[must_use]
    pub fn with_max_reconnect_wait(mut self, wait: Duration) -> Self {
        self.set_max_reconnect_wait(wait);
        self
    }

    /// Returns the outbound queue capacity.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }
    /// Sets the number of outgoing messages that can be buffered before
    /// senders block.
    pub fn set_max_in_flight(&mut self, count: usize) {
        self.max_in_flight = count.max(1);
    }
    /// Builder-method for setting the outbound queue capacity.
    #[must_use]
    pub fn with_max_in_flight(mut self, count: usize) -> Self {
        self.set_max_in_flight(count);
        self
    }

    /// Returns the time budget for a single connection attempt.
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }
    /// Sets the time budget for a single connection attempt.
    pub fn set_connect_timeout(&mut self, timeout: Duration) {
        self.connect_timeout = timeout;
    }
    /// Builder-method for setting the connection attempt time budget.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.set_connect_timeout(timeout);
        self
    }

    /// Returns the additional headers sent with the upgrade request.
    pub fn http_headers(&self) -> &[(String, String)] {
        &self.http_headers
    }
    /// Adds a header to the upgrade request.
    pub fn add_http_header(&mut self, name: &str, value: &str) {
        self.http_headers.push((name.to_owned(), value.to_owned()));
    }
    /// Builder-method for adding a header to the upgrade request.
    #[must_use]
    pub fn with_http_header(mut self, name: &str, value: &str) -> Self {
        self.add_http_header(name, value);
        self
    }

    /// Installs a sink for non-fatal errors. Without one, such errors are
    /// logged at warn level.
    pub fn set_error_handler<H>(&mut self, handler: H)
    where
        H: Fn(&DrivelineError) + Send + Sync + 'static,
    {
        self.error_handler = DebugIgnore(Some(Arc::new(handler)));
    }
    /// Builder-method for installing a sink for non-fatal errors.
    #[must_use]
    pub fn with_error_handler<H>(mut self, handler: H) -> Self
    where
        H: Fn(&DrivelineError) + Send + Sync + 'static,
    {
        self.set_error_handler(handler);
        self
    }

    pub(crate) fn error_handler(&self) -> Option<ErrorSink> {
        self.error_handler.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ConnectionConfiguration::default();
        assert_eq!(config.max_reconnect(), -1);
        assert_eq!(config.reconnect_wait(), Duration::from_secs(1));
        assert_eq!(config.max_reconnect_wait(), Duration::from_secs(5));
        assert_eq!(config.max_in_flight(), 100);
        assert_eq!(config.connect_timeout(), Duration::from_secs(2));
    }

    #[test]
    fn reconnect_wait_raises_the_cap() {
        let config = ConnectionConfiguration::default()
            .with_reconnect_wait(Duration::from_secs(10));
        assert_eq!(config.max_reconnect_wait(), Duration::from_secs(50));

        // a small wait leaves an explicitly configured cap alone
        let config = ConnectionConfiguration::default()
            .with_max_reconnect_wait(Duration::from_secs(30))
            .with_reconnect_wait(Duration::from_secs(10));
        assert_eq!(config.max_reconnect_wait(), Duration::from_secs(30));
    }

    #[test]
    fn max_in_flight_is_at_least_one() {
        let config = ConnectionConfiguration::default().with_max_in_flight(0);
        assert_eq!(config.max_in_flight(), 1);
    }
}
