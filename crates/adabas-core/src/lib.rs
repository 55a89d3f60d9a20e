#![warn(missing_docs)]

//! Adabas client core: ACBX/ABD framing, the ADATCP transport, the call
//! engine with buffer-grow retries and session state, and the FDT parser.

pub mod codec;
pub mod acbx;
pub mod abd;
pub mod response;
pub mod error;
pub mod logging;
pub mod config;
pub mod url;
pub mod id;
pub mod driver;
pub mod frame;
pub mod wire;
pub mod tls;
pub mod adatcp;
pub mod engine;
pub mod field;
pub mod fdt;

pub use abd::{Abd, Buffer, BufferId};
pub use acbx::{Acbx, CommandCode};
pub use adatcp::AdaTcp;
pub use codec::Endian;
pub use config::{ClientConfig, RetryConfig, TcpConfig, TlsConfig};
pub use driver::{DefaultDriverFactory, DriverFactory, NativeDriver, TransportDriver};
pub use engine::CallEngine;
pub use error::{AdabasError, DatabaseError, GenericError, Result};
pub use fdt::Fdt;
pub use field::{Definition, FieldNode, FieldOptions, FieldType, NodeId, NodeKind};
pub use id::{AdaId, Platform, SessionId};
pub use logging::{Logger, NullLogger, TracingLogger};
pub use url::{Driver, Url};
