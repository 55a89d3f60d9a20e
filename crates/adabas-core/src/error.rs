//! Error types: database responses, client generic errors and transport
//! failures, unified in [`AdabasError`].

use thiserror::Error;

use crate::acbx::Acbx;
use crate::response;

/// Generic error codes raised by the client itself rather than the database.
pub mod codes {
    /// Command code rejected before the call was sent.
    pub const INVALID_COMMAND_BEFORE_CALL: u32 = 2;
    /// Command code in the returned control block is not a known command.
    pub const INVALID_COMMAND_AFTER_CALL: u32 = 3;
    /// FDT entry with an identifier other than F, S, T, P, C, H or R.
    pub const UNKNOWN_FDT_IDENTIFIER: u32 = 11;
    /// Floating point field whose length is neither 4 nor 8.
    pub const INVALID_FLOAT_LENGTH: u32 = 12;
    /// Field format character not understood.
    pub const UNKNOWN_FORMAT: u32 = 13;
    /// FDT entry or one of its counts does not fit its one byte slot.
    pub const FDT_ENTRY_TOO_LONG: u32 = 14;
    /// No native access library is linked in.
    pub const NATIVE_UNAVAILABLE: u32 = 49;
    /// Database id outside 1..255.
    pub const DBID_OUT_OF_RANGE: u32 = 67;
    /// Entire Network style target (tcpip, or native with a port).
    pub const ENTIRE_NETWORK_UNSUPPORTED: u32 = 68;
    /// Database id is not a number.
    pub const DBID_NOT_NUMERIC: u32 = 70;
    /// URL does not match any accepted form.
    pub const INVALID_URL: u32 = 71;
    /// Port is not a number.
    pub const PORT_NOT_NUMERIC: u32 = 72;
    /// Reply length shorter than the frame headers.
    pub const HEADER_TOO_SHORT: u32 = 90;
    /// Server answered with headers only, carrying its own error code.
    pub const SERVER_ERROR: u32 = 91;
    /// Fewer bytes than announced were available.
    pub const SHORT_READ: u32 = 92;
    /// URL scheme is none of native, adatcp or adatcps.
    pub const UNKNOWN_SCHEME: u32 = 99;
    /// No connection to disconnect or send on.
    pub const ALREADY_DISCONNECTED: u32 = 114;
    /// Driver cannot serve the URL.
    pub const UNKNOWN_DRIVER: u32 = 131;
    /// Frame without the `ADATCP` eyecatcher.
    pub const MISSING_EYECATCHER: u32 = 160;
    /// Connect answered with something other than a connect reply.
    pub const CONNECT_REPLY_TYPE: u32 = 161;
    /// Data reply of another data type than requested.
    pub const DATA_TYPE_MISMATCH: u32 = 162;
    /// Cluster database announced no members.
    pub const CLUSTER_LIST_EMPTY: u32 = 163;
    /// Data request answered with something other than a data reply.
    pub const DATA_REPLY_TYPE: u32 = 164;
    /// Announced payload above the configured maximum.
    pub const PAYLOAD_TOO_LARGE: u32 = 165;
}

/// Error raised by the client with a stable numeric code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("ADG{code:07}: {message}")]
pub struct GenericError {
    /// Numeric code, stable across releases.
    pub code: u32,
    /// Human readable detail.
    pub message: String,
}

impl GenericError {
    /// Error with an explicit code and message.
    pub fn new(code: u32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Code 2.
    pub fn invalid_command_before_call(cmd: &str) -> Self {
        Self::new(
            codes::INVALID_COMMAND_BEFORE_CALL,
            format!("Invalid command code '{}' before call", cmd),
        )
    }

    /// Code 3.
    pub fn invalid_command_after_call(cmd: &str) -> Self {
        Self::new(
            codes::INVALID_COMMAND_AFTER_CALL,
            format!("Invalid command code '{}' returned by call", cmd),
        )
    }

    /// Code 11.
    pub fn unknown_fdt_identifier(id: u8) -> Self {
        Self::new(
            codes::UNKNOWN_FDT_IDENTIFIER,
            format!("Unknown field identifier '{}' (0x{:02x})", id as char, id),
        )
    }

    /// Code 12.
    pub fn invalid_float_length(length: u32) -> Self {
        Self::new(
            codes::INVALID_FLOAT_LENGTH,
            format!("Invalid length {} for floating point field", length),
        )
    }

    /// Code 13.
    pub fn unknown_format(format: u8) -> Self {
        Self::new(
            codes::UNKNOWN_FORMAT,
            format!("Unknown field format '{}'", format as char),
        )
    }

    /// Code 49.
    pub fn native_unavailable() -> Self {
        Self::new(
            codes::NATIVE_UNAVAILABLE,
            "Native local access is not available, use an adatcp URL",
        )
    }

    /// Code 67.
    pub fn dbid_out_of_range(dbid: u64) -> Self {
        Self::new(
            codes::DBID_OUT_OF_RANGE,
            format!("Database id {} out of range 1..255", dbid),
        )
    }

    /// Code 68.
    pub fn entire_network_unsupported() -> Self {
        Self::new(
            codes::ENTIRE_NETWORK_UNSUPPORTED,
            "Entire Network client not supported, use port 0 and native access",
        )
    }

    /// Code 70.
    pub fn dbid_not_numeric(value: &str) -> Self {
        Self::new(
            codes::DBID_NOT_NUMERIC,
            format!("Database id not numeric: {}", value),
        )
    }

    /// Code 71.
    pub fn invalid_url(url: &str) -> Self {
        Self::new(codes::INVALID_URL, format!("Invalid URL: {}", url))
    }

    /// Code 72.
    pub fn port_not_numeric(value: &str) -> Self {
        Self::new(
            codes::PORT_NOT_NUMERIC,
            format!("Port not numeric: {}", value),
        )
    }

    /// Code 90.
    pub fn header_too_short(length: u32) -> Self {
        Self::new(
            codes::HEADER_TOO_SHORT,
            format!("Received length {} shorter than header", length),
        )
    }

    /// Code 91, carrying the code the server put in the outer header.
    pub fn server_error(code: u32) -> Self {
        Self::new(
            codes::SERVER_ERROR,
            format!("Server returned error code {}", code),
        )
    }

    /// Code 92.
    pub fn short_read(detail: impl std::fmt::Display) -> Self {
        Self::new(codes::SHORT_READ, format!("Short read: {}", detail))
    }

    /// Code 99.
    pub fn unknown_scheme(scheme: &str) -> Self {
        Self::new(
            codes::UNKNOWN_SCHEME,
            format!("Unknown URL scheme '{}'", scheme),
        )
    }

    /// Code 114.
    pub fn already_disconnected() -> Self {
        Self::new(codes::ALREADY_DISCONNECTED, "Connection already disconnected")
    }

    /// Code 131.
    pub fn unknown_driver(driver: &str) -> Self {
        Self::new(
            codes::UNKNOWN_DRIVER,
            format!("Unknown or unusable driver '{}'", driver),
        )
    }

    /// Code 160.
    pub fn missing_eyecatcher(frame: &str) -> Self {
        Self::new(
            codes::MISSING_EYECATCHER,
            format!("{} does not carry the ADATCP eyecatcher", frame),
        )
    }

    /// Code 161.
    pub fn connect_reply_type(got: u32) -> Self {
        Self::new(
            codes::CONNECT_REPLY_TYPE,
            format!("Connect reply has buffer type {}, expected connect reply", got),
        )
    }

    /// Code 162.
    pub fn data_type_mismatch(got: u32, expected: u32) -> Self {
        Self::new(
            codes::DATA_TYPE_MISMATCH,
            format!("Data reply has type {}, expected {}", got, expected),
        )
    }

    /// Code 163.
    pub fn cluster_list_empty() -> Self {
        Self::new(codes::CLUSTER_LIST_EMPTY, "Cluster node list is empty")
    }

    /// Code 164.
    pub fn data_reply_type(got: u32) -> Self {
        Self::new(
            codes::DATA_REPLY_TYPE,
            format!("Reply has buffer type {}, expected data reply", got),
        )
    }

    /// Code 165.
    pub fn payload_too_large(size: u64, max: u64) -> Self {
        Self::new(
            codes::PAYLOAD_TOO_LARGE,
            format!("Payload of {} bytes exceeds maximum {}", size, max),
        )
    }

    /// Code 14.
    pub fn fdt_entry_too_long(name: &str, what: &str, value: usize) -> Self {
        Self::new(
            codes::FDT_ENTRY_TOO_LONG,
            format!("FDT entry {}: {} {} exceeds 255", name, what, value),
        )
    }
}

/// A response code above EOF reported by the database.
///
/// Carries the control block of the failed call so callers can inspect the
/// subcode, error offset and error buffer id.
#[derive(Debug, Clone, Error)]
#[error("{code}: {message} (rsp={response},subrsp={subcode},dbid={target},file={file})")]
pub struct DatabaseError {
    /// Response code.
    pub response: u16,
    /// Error subcode.
    pub subcode: u16,
    /// Message code, `ADAGE` followed by response and subcode in hex.
    pub code: String,
    /// Response text.
    pub message: String,
    /// Target URL the call was sent to.
    pub target: String,
    /// File number of the failed call.
    pub file: u32,
    /// Control block as returned by the database.
    pub acbx: Box<Acbx>,
}

impl DatabaseError {
    /// Builds the error from a returned control block.
    pub fn new(acbx: &Acbx, target: impl Into<String>) -> Self {
        let response = acbx.response;
        let subcode = acbx.subcode;
        Self {
            response,
            subcode,
            code: format!("ADAGE{:02X}{:03X}", response, subcode),
            message: response::message(response).to_string(),
            target: target.into(),
            file: acbx.file,
            acbx: Box::new(acbx.clone()),
        }
    }
}

/// Every error the client returns.
#[derive(Debug, Error)]
pub enum AdabasError {
    /// The database answered with a response code above EOF.
    #[error(transparent)]
    Database(Box<DatabaseError>),

    /// The client rejected the call or the exchange.
    #[error(transparent)]
    Generic(#[from] GenericError),

    /// TLS configuration could not be loaded.
    #[error("TLS setup failed: {reason}")]
    Tls {
        /// What went wrong.
        reason: String,
    },

    /// Configuration document could not be parsed.
    #[error("invalid client configuration: {reason}")]
    Config {
        /// Parser message.
        reason: String,
    },

    /// TCP connect did not finish in time.
    #[error("connect to {addr} timed out after {timeout_ms}ms")]
    ConnectTimeout {
        /// Address dialed.
        addr: String,
        /// Configured timeout.
        timeout_ms: u64,
    },

    /// Socket level failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl AdabasError {
    /// Numeric code of the error: the response code for database errors,
    /// otherwise the generic code.
    pub fn code(&self) -> u32 {
        match self {
            AdabasError::Database(e) => u32::from(e.response),
            AdabasError::Generic(e) => e.code,
            AdabasError::Tls { .. } => codes::UNKNOWN_DRIVER,
            AdabasError::Config { .. } => 0,
            AdabasError::ConnectTimeout { .. } => u32::from(response::SYSTEM_COMMUNICATION),
            AdabasError::Io(_) => codes::SHORT_READ,
        }
    }

    /// Response code if this is a database error.
    pub fn response(&self) -> Option<u16> {
        match self {
            AdabasError::Database(e) => Some(e.response),
            _ => None,
        }
    }

    /// Whether the error came from the transport rather than the database.
    pub fn is_transport(&self) -> bool {
        !matches!(self, AdabasError::Database(_))
    }
}

impl From<DatabaseError> for AdabasError {
    fn from(e: DatabaseError) -> Self {
        AdabasError::Database(Box::new(e))
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, AdabasError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generic_display() {
        let err = GenericError::server_error(7);
        assert_eq!(err.to_string(), "ADG0000091: Server returned error code 7");
    }

    #[test]
    fn test_database_error_code() {
        let mut acbx = Acbx::new(12);
        acbx.response = 53;
        acbx.subcode = 2;
        acbx.file = 11;
        let err = DatabaseError::new(&acbx, "12(adatcp://localhost:60001)");
        assert_eq!(err.code, "ADAGE35002");
        let text = err.to_string();
        assert!(text.contains("Record buffer too short"));
        assert!(text.contains("rsp=53,subrsp=2"));
        assert!(text.contains("file=11"));
        assert_eq!(err.acbx.dbid, 12);
    }

    #[test]
    fn test_error_codes() {
        let err: AdabasError = GenericError::already_disconnected().into();
        assert_eq!(err.code(), 114);
        assert!(err.is_transport());

        let mut acbx = Acbx::new(1);
        acbx.response = 148;
        let err: AdabasError = DatabaseError::new(&acbx, "1").into();
        assert_eq!(err.code(), 148);
        assert_eq!(err.response(), Some(148));
        assert!(!err.is_transport());

        let io = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof");
        let err: AdabasError = io.into();
        assert_eq!(err.code(), 92);
    }

    #[test]
    fn test_size_limit_errors() {
        let err = GenericError::payload_too_large(5000, 4096);
        assert_eq!(err.code, 165);
        assert!(err.to_string().starts_with("ADG0000165"));
        assert_eq!(GenericError::fdt_entry_too_long("AA", "length", 300).code, 14);
    }
}
