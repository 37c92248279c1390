//! The `ReadingClient` capability and its REST implementation.
//!
//! # Design
//! Callers depend on the `ReadingClient` trait so tests can substitute
//! `mock::MockReadingClient`. `ReadingRestClient` holds a `UrlResolver` and a
//! `Transport`, both read-only after construction, so one client can serve
//! any number of threads. Every call resolves the prefix afresh, sends exactly
//! one request, and returns on the first failure.

use std::sync::Arc;

use tracing::debug;

use crate::context::CallContext;
use crate::endpoint::{EndpointParams, Endpointer, UrlResolver};
use crate::error::ClientError;
use crate::model::Reading;
use crate::request::{ReadingQuery, ReadingRequests};
use crate::transport::{Transport, UreqTransport};

/// Operations on the readings resource of the core-data service.
pub trait ReadingClient: Send + Sync {
    /// All readings.
    fn readings(&self, ctx: &CallContext) -> Result<Vec<Reading>, ClientError>;

    /// Total number of readings.
    fn reading_count(&self, ctx: &CallContext) -> Result<u64, ClientError>;

    /// The reading with the given id.
    fn reading(&self, id: &str, ctx: &CallContext) -> Result<Reading, ClientError>;

    /// Up to `limit` readings from a device.
    fn readings_for_device(
        &self,
        device_id: &str,
        limit: u32,
        ctx: &CallContext,
    ) -> Result<Vec<Reading>, ClientError>;

    /// Up to `limit` readings for a value descriptor name from a device.
    fn readings_for_name_and_device(
        &self,
        name: &str,
        device_id: &str,
        limit: u32,
        ctx: &CallContext,
    ) -> Result<Vec<Reading>, ClientError>;

    /// Up to `limit` readings for a value descriptor name.
    fn readings_for_name(
        &self,
        name: &str,
        limit: u32,
        ctx: &CallContext,
    ) -> Result<Vec<Reading>, ClientError>;

    /// Up to `limit` readings with a unit-of-measure label.
    fn readings_for_uom_label(
        &self,
        uom_label: &str,
        limit: u32,
        ctx: &CallContext,
    ) -> Result<Vec<Reading>, ClientError>;

    /// Up to `limit` readings carrying a label.
    fn readings_for_label(
        &self,
        label: &str,
        limit: u32,
        ctx: &CallContext,
    ) -> Result<Vec<Reading>, ClientError>;

    /// Up to `limit` readings of a type.
    fn readings_for_type(
        &self,
        reading_type: &str,
        limit: u32,
        ctx: &CallContext,
    ) -> Result<Vec<Reading>, ClientError>;

    /// Up to `limit` readings created between `start` and `end`.
    fn readings_for_interval(
        &self,
        start: i64,
        end: i64,
        limit: u32,
        ctx: &CallContext,
    ) -> Result<Vec<Reading>, ClientError>;

    /// Store a reading and return the id the service assigned to it.
    fn add(&self, reading: &Reading, ctx: &CallContext) -> Result<String, ClientError>;

    /// Remove the reading with the given id.
    fn delete(&self, id: &str, ctx: &CallContext) -> Result<(), ClientError>;
}

/// `ReadingClient` talking to the service over HTTP.
#[derive(Debug, Clone)]
pub struct ReadingRestClient<T = UreqTransport> {
    resolver: UrlResolver,
    transport: T,
}

impl ReadingRestClient<UreqTransport> {
    pub fn new(params: EndpointParams, endpointer: Arc<dyn Endpointer>) -> Self {
        Self::with_transport(params, endpointer, UreqTransport::new())
    }
}

impl<T: Transport> ReadingRestClient<T> {
    pub fn with_transport(params: EndpointParams, endpointer: Arc<dyn Endpointer>, transport: T) -> Self {
        Self {
            resolver: UrlResolver::new(params, endpointer),
            transport,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn requests(&self, ctx: &CallContext) -> Result<ReadingRequests, ClientError> {
        ctx.check()?;
        let prefix = self.resolver.prefix()?;
        Ok(ReadingRequests::new(&prefix))
    }

    fn list(&self, query: ReadingQuery<'_>, ctx: &CallContext) -> Result<Vec<Reading>, ClientError> {
        let requests = self.requests(ctx)?;
        let response = self.transport.execute(requests.build_list(&query), ctx)?;
        ctx.check()?;
        let readings = requests.parse_list(response)?;
        debug!(?query, count = readings.len(), "listed readings");
        Ok(readings)
    }
}

fn require_id(id: &str) -> Result<(), ClientError> {
    if id.is_empty() {
        return Err(ClientError::InvalidArgument("reading id must not be empty"));
    }
    Ok(())
}

impl<T: Transport> ReadingClient for ReadingRestClient<T> {
    fn readings(&self, ctx: &CallContext) -> Result<Vec<Reading>, ClientError> {
        self.list(ReadingQuery::All, ctx)
    }

    fn reading_count(&self, ctx: &CallContext) -> Result<u64, ClientError> {
        let requests = self.requests(ctx)?;
        let response = self.transport.execute(requests.build_count(), ctx)?;
        ctx.check()?;
        requests.parse_count(response)
    }

    fn reading(&self, id: &str, ctx: &CallContext) -> Result<Reading, ClientError> {
        require_id(id)?;
        let requests = self.requests(ctx)?;
        let response = self.transport.execute(requests.build_get(id), ctx)?;
        ctx.check()?;
        requests.parse_reading(response)
    }

    fn readings_for_device(
        &self,
        device_id: &str,
        limit: u32,
        ctx: &CallContext,
    ) -> Result<Vec<Reading>, ClientError> {
        self.list(ReadingQuery::Device { device_id, limit }, ctx)
    }

    fn readings_for_name_and_device(
        &self,
        name: &str,
        device_id: &str,
        limit: u32,
        ctx: &CallContext,
    ) -> Result<Vec<Reading>, ClientError> {
        self.list(
            ReadingQuery::NameAndDevice {
                name,
                device_id,
                limit,
            },
            ctx,
        )
    }

    fn readings_for_name(
        &self,
        name: &str,
        limit: u32,
        ctx: &CallContext,
    ) -> Result<Vec<Reading>, ClientError> {
        self.list(ReadingQuery::Name { name, limit }, ctx)
    }

    fn readings_for_uom_label(
        &self,
        uom_label: &str,
        limit: u32,
        ctx: &CallContext,
    ) -> Result<Vec<Reading>, ClientError> {
        self.list(ReadingQuery::UomLabel { uom_label, limit }, ctx)
    }

    fn readings_for_label(
        &self,
        label: &str,
        limit: u32,
        ctx: &CallContext,
    ) -> Result<Vec<Reading>, ClientError> {
        self.list(ReadingQuery::Label { label, limit }, ctx)
    }

    fn readings_for_type(
        &self,
        reading_type: &str,
        limit: u32,
        ctx: &CallContext,
    ) -> Result<Vec<Reading>, ClientError> {
        self.list(
            ReadingQuery::Type {
                reading_type,
                limit,
            },
            ctx,
        )
    }

    fn readings_for_interval(
        &self,
        start: i64,
        end: i64,
        limit: u32,
        ctx: &CallContext,
    ) -> Result<Vec<Reading>, ClientError> {
        self.list(ReadingQuery::Interval { start, end, limit }, ctx)
    }

    fn add(&self, reading: &Reading, ctx: &CallContext) -> Result<String, ClientError> {
        let requests = self.requests(ctx)?;
        let request = requests.build_add(reading)?;
        let response = self.transport.execute(request, ctx)?;
        ctx.check()?;
        let id = requests.parse_add(response)?;
        debug!(%id, "added reading");
        Ok(id)
    }

    fn delete(&self, id: &str, ctx: &CallContext) -> Result<(), ClientError> {
        require_id(id)?;
        let requests = self.requests(ctx)?;
        let response = self.transport.execute(requests.build_delete(id), ctx)?;
        ctx.check()?;
        requests.parse_delete(response)
    }
}

#[cfg(any(test, feature = "mock"))]
pub mod mock {
    //! In-memory `ReadingClient` for tests of code that uses the client.

    use std::sync::Mutex;

    use super::{CallContext, ClientError, Reading, ReadingClient};

    /// A recorded call on `MockReadingClient`.
    #[derive(Debug, Clone, PartialEq)]
    pub enum Call {
        Readings,
        ReadingCount,
        Reading(String),
        ForDevice(String, u32),
        ForNameAndDevice(String, String, u32),
        ForName(String, u32),
        ForUomLabel(String, u32),
        ForLabel(String, u32),
        ForType(String, u32),
        ForInterval(i64, i64, u32),
        Add(Reading),
        Delete(String),
    }

    /// `ReadingClient` that answers from configured results and records calls.
    ///
    /// List operations answer with `set_list_result` (default: empty list),
    /// `reading` with `set_reading_result` (default: `NotFound`), `reading_count`
    /// with `set_count_result` (default: `Ok(0)`), `add` with `set_add_result`
    /// (default: `"mock-id"`), and `delete` with `set_delete_result`
    /// (default: `Ok`). A cancelled context fails every call before it is
    /// recorded. Results are reused until replaced.
    #[derive(Debug, Default)]
    pub struct MockReadingClient {
        list_result: Mutex<Option<Result<Vec<Reading>, String>>>,
        reading_result: Mutex<Option<Result<Reading, String>>>,
        count_result: Mutex<Option<Result<u64, String>>>,
        add_result: Mutex<Option<Result<String, String>>>,
        delete_result: Mutex<Option<Result<(), String>>>,
        calls: Mutex<Vec<Call>>,
    }

    impl MockReadingClient {
        pub fn new() -> Self {
            Self::default()
        }

        /// Answer list operations with `readings`, or with a transport error.
        pub fn set_list_result(&self, result: Result<Vec<Reading>, String>) {
            *self.list_result.lock().unwrap() = Some(result);
        }

        pub fn set_reading_result(&self, result: Result<Reading, String>) {
            *self.reading_result.lock().unwrap() = Some(result);
        }

        pub fn set_count_result(&self, result: Result<u64, String>) {
            *self.count_result.lock().unwrap() = Some(result);
        }

        pub fn set_add_result(&self, result: Result<String, String>) {
            *self.add_result.lock().unwrap() = Some(result);
        }

        pub fn set_delete_result(&self, result: Result<(), String>) {
            *self.delete_result.lock().unwrap() = Some(result);
        }

        pub fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, ctx: &CallContext, call: Call) -> Result<(), ClientError> {
            ctx.check()?;
            self.calls.lock().unwrap().push(call);
            Ok(())
        }

        fn list(&self, ctx: &CallContext, call: Call) -> Result<Vec<Reading>, ClientError> {
            self.record(ctx, call)?;
            match self.list_result.lock().unwrap().clone() {
                Some(Ok(readings)) => Ok(readings),
                Some(Err(msg)) => Err(ClientError::Transport(msg)),
                None => Ok(Vec::new()),
            }
        }
    }

    impl ReadingClient for MockReadingClient {
        fn readings(&self, ctx: &CallContext) -> Result<Vec<Reading>, ClientError> {
            self.list(ctx, Call::Readings)
        }

        fn reading_count(&self, ctx: &CallContext) -> Result<u64, ClientError> {
            self.record(ctx, Call::ReadingCount)?;
            match self.count_result.lock().unwrap().clone() {
                Some(Ok(count)) => Ok(count),
                Some(Err(msg)) => Err(ClientError::Transport(msg)),
                None => Ok(0),
            }
        }

        fn reading(&self, id: &str, ctx: &CallContext) -> Result<Reading, ClientError> {
            self.record(ctx, Call::Reading(id.to_string()))?;
            match self.reading_result.lock().unwrap().clone() {
                Some(Ok(reading)) => Ok(reading),
                Some(Err(msg)) => Err(ClientError::Transport(msg)),
                None => Err(ClientError::NotFound { body: id.to_string() }),
            }
        }

        fn readings_for_device(
            &self,
            device_id: &str,
            limit: u32,
            ctx: &CallContext,
        ) -> Result<Vec<Reading>, ClientError> {
            self.list(ctx, Call::ForDevice(device_id.to_string(), limit))
        }

        fn readings_for_name_and_device(
            &self,
            name: &str,
            device_id: &str,
            limit: u32,
            ctx: &CallContext,
        ) -> Result<Vec<Reading>, ClientError> {
            self.list(
                ctx,
                Call::ForNameAndDevice(name.to_string(), device_id.to_string(), limit),
            )
        }

        fn readings_for_name(
            &self,
            name: &str,
            limit: u32,
            ctx: &CallContext,
        ) -> Result<Vec<Reading>, ClientError> {
            self.list(ctx, Call::ForName(name.to_string(), limit))
        }

        fn readings_for_uom_label(
            &self,
            uom_label: &str,
            limit: u32,
            ctx: &CallContext,
        ) -> Result<Vec<Reading>, ClientError> {
            self.list(ctx, Call::ForUomLabel(uom_label.to_string(), limit))
        }

        fn readings_for_label(
            &self,
            label: &str,
            limit: u32,
            ctx: &CallContext,
        ) -> Result<Vec<Reading>, ClientError> {
            self.list(ctx, Call::ForLabel(label.to_string(), limit))
        }

        fn readings_for_type(
            &self,
            reading_type: &str,
            limit: u32,
            ctx: &CallContext,
        ) -> Result<Vec<Reading>, ClientError> {
            self.list(ctx, Call::ForType(reading_type.to_string(), limit))
        }

        fn readings_for_interval(
            &self,
            start: i64,
            end: i64,
            limit: u32,
            ctx: &CallContext,
        ) -> Result<Vec<Reading>, ClientError> {
            self.list(ctx, Call::ForInterval(start, end, limit))
        }

        fn add(&self, reading: &Reading, ctx: &CallContext) -> Result<String, ClientError> {
            self.record(ctx, Call::Add(reading.clone()))?;
            match self.add_result.lock().unwrap().clone() {
                Some(Ok(id)) => Ok(id),
                Some(Err(msg)) => Err(ClientError::Transport(msg)),
                None => Ok("mock-id".to_string()),
            }
        }

        fn delete(&self, id: &str, ctx: &CallContext) -> Result<(), ClientError> {
            self.record(ctx, Call::Delete(id.to_string()))?;
            match self.delete_result.lock().unwrap().clone() {
                Some(Ok(())) | None => Ok(()),
                Some(Err(msg)) => Err(ClientError::Transport(msg)),
            }
        }
    }
}
