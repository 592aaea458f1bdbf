//! A metrics handler for sending samples to [InfluxDB][influxdb] over UDP, using the [line protocol][line_protocol].
//!
//! [influxdb]: https://www.influxdata.com/
//! [line_protocol]: https://docs.influxdata.com/influxdb/v1/write_protocols/line_protocol_tutorial/
//!
//! # Usage
//!
//! ```no_run
//! # use metrics_exporter_influxdb::{InfluxDbBuilder, Metric};
//! // First, create a builder and point it at the server.
//! //
//! // A handler without a server or port still builds, but it logs an error and never emits anything.
//! let handler = InfluxDbBuilder::default()
//!     .with_server("127.0.0.1")
//!     .with_port(8089)
//!     .with_prefix("app.")
//!     .with_default_dimension("env", "prod")
//!     .build();
//!
//! // Batches can be emitted directly...
//! let metric = Metric::new("cpu.load", 0.73).with_dimension("host", "web01");
//! handler.emit(&[metric]);
//!
//! // ...or handed to a forwarder thread, which buffers them and emits on an interval.
//! let forwarder = InfluxDbBuilder::default()
//!     .with_server("127.0.0.1")
//!     .with_port(8089)
//!     .spawn()
//!     .expect("failed to spawn forwarder");
//! forwarder.send(Metric::new("requests", 1.0)).expect("forwarder should be running");
//! forwarder.shutdown();
//! ```
//!
//! # Wire format
//!
//! Every metric becomes a single line:
//!
//! ```text
//! <prefix><name>[,<key>=<value>]* value=<float> <unix seconds>\n
//! ```
//!
//! Names, dimension keys and dimension values are sanitized: anything other than alphanumerics and a small set of
//! punctuation is replaced with `_`. Dots survive in names, but not in dimensions. Dimensions are always written in
//! ascending order of their sanitized key, so a given series always produces the same tag section.
//!
//! # Delivery
//!
//! Delivery is fire-and-forget. Every batch opens a fresh UDP socket and writes one datagram per line; a batch that
//! cannot connect is dropped as a whole, and lines lost in transit are never noticed. Nothing is retried.
//!
//! # Telemetry
//!
//! The handler counts batches and lines sent or dropped, and reports them through the `metrics` facade under the
//! `influxdb.handler` namespace.

#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg), deny(rustdoc::broken_intra_doc_links))]

mod builder;
pub use self::builder::{BuildError, InfluxDbBuilder};

mod dimensions;
pub use self::dimensions::collect_dimensions;

mod forwarder;
pub use self::forwarder::{spawn_forwarder, Forwarder, ForwarderHandle};

mod handler;
pub use self::handler::{EmitError, Handler, InfluxDbHandler, INFLUXDB_HANDLER_NAME};

mod metric;
pub use self::metric::Metric;

mod options;
pub use self::options::HandlerOptions;

mod registry;
pub use self::registry::{HandlerFactory, HandlerRegistry};

mod sanitize;
pub use self::sanitize::{sanitize, sanitize_name, Sanitizer};

mod telemetry;

mod transport;
pub use self::transport::{RemoteAddr, Transport, UdpConnection, UdpTransport};

mod writer;
pub use self::writer::{encode, LineEncoder, ValueFormat};
