//! Database response codes returned in the ACBX.
//!
//! Codes 0..=3 report a completed call; everything above is an error that
//! the call engine turns into a [`crate::error::DatabaseError`].

/// Normal completion.
pub const NORMAL: u16 = 0;
/// ISN list not sorted.
pub const ISN_NOT_SORTED: u16 = 1;
/// Function not completely executed.
pub const FUNCTION_INCOMPLETE: u16 = 2;
/// End of file reached.
pub const EOF: u16 = 3;
/// S2/S9 not allowed for expanded files.
pub const EXPANDED_FILES: u16 = 4;
/// Error in system view compression.
pub const VIEW_COMPRESSION: u16 = 5;
/// SX command interrupted because of timeout.
pub const SX_INTERRUPTED: u16 = 7;
/// Transaction aborted by the nucleus.
pub const TRANSACTION_ABORTED: u16 = 9;
/// Too many occurrences for a periodic group.
pub const TOO_MANY_PE_OCCURRENCES: u16 = 10;
/// DDL command failed.
pub const DDL_COMMAND_FAILED: u16 = 15;
/// Subcommand of the MC call failed.
pub const SUB_COMMAND_FAILED: u16 = 16;
/// Invalid or unauthorized file number.
pub const INVALID_FILE_NUMBER: u16 = 17;
/// File number changed during command sequence.
pub const FILE_CHANGED: u16 = 18;
/// Command not allowed for ACC user.
pub const ACC_NOT_ALLOWED: u16 = 19;
/// Invalid command identification value.
pub const INVALID_CID: u16 = 20;
/// Inconsistent usage of a command.
pub const INCONSISTENT_COMMAND: u16 = 21;
/// Invalid command code.
pub const INVALID_COMMAND: u16 = 22;
/// Invalid starting ISN for L2/L5.
pub const INVALID_START_ISN: u16 = 23;
/// Invalid ISN found in ISN buffer.
pub const INVALID_ISN_BUFFER: u16 = 24;
/// ISN in ISN lower limit not found.
pub const ISN_LL_NOT_FOUND: u16 = 25;
/// Invalid ISN buffer length or ISN quantity.
pub const INVALID_ISN_BUFFER_LENGTH: u16 = 26;
/// LWP parameter too small.
pub const LWP_TOO_SMALL: u16 = 27;
/// Invalid additions-1 contents for L3/L6/S9.
pub const INVALID_ADDITIONS_1: u16 = 28;
/// Missing V option during forced value start.
pub const MISSING_V_OPTION: u16 = 29;
/// Invalid command option.
pub const INVALID_COMMAND_OPTION: u16 = 34;
/// Syntax error in format buffer.
pub const FORMAT_BUFFER_SYNTAX: u16 = 40;
/// Error in format buffer.
pub const FORMAT_BUFFER_ERROR: u16 = 41;
/// Internal format buffer too small.
pub const INTERNAL_FORMAT_BUFFER_SMALL: u16 = 42;
/// Inconsistent descriptor definition for L9.
pub const INCONSISTENT_DESCRIPTOR: u16 = 43;
/// Format buffer cannot be used for update.
pub const FORMAT_BUFFER_NOT_UPDATABLE: u16 = 44;
/// Field count for PE or MU overflowed.
pub const FIELD_COUNT_OVERFLOW: u16 = 45;
/// Format buffer usage mismatch for command ID.
pub const FORMAT_BUFFER_MISMATCH: u16 = 46;
/// Maximum number of held ISNs reached.
pub const HOLD_ISN_OVERFLOW: u16 = 47;
/// File or user ID not available at open time.
pub const FILE_NOT_AVAILABLE: u16 = 48;
/// Compressed record too long.
pub const COMPRESSED_TOO_LONG: u16 = 49;
/// Syntax error in record buffer for open.
pub const RECORD_BUFFER_OPEN_SYNTAX: u16 = 50;
/// Invalid record buffer contents during open.
pub const RECORD_BUFFER_OPEN_INVALID: u16 = 51;
/// Invalid data in record or value buffer.
pub const INVALID_RECORD_OR_VALUE: u16 = 52;
/// Record buffer too short; the engine grows record buffers and retries.
pub const RECORD_BUFFER_TOO_SHORT: u16 = 53;
/// Record buffer too long.
pub const RECORD_BUFFER_TOO_LONG: u16 = 54;
/// Incompatible format conversion or truncation.
pub const FORMAT_CONVERSION: u16 = 55;
/// Descriptor value too long.
pub const DESCRIPTOR_TOO_LONG: u16 = 56;
/// Unknown descriptor in search buffer for L9.
pub const UNKNOWN_DESCRIPTOR: u16 = 57;
/// Format not found for selection criterion.
pub const FORMAT_NOT_FOUND: u16 = 58;
/// Format conversion for subfield not possible.
pub const SUBFIELD_CONVERSION: u16 = 59;
/// Syntax error in search buffer.
pub const SEARCH_BUFFER_SYNTAX: u16 = 60;
/// Error in search buffer.
pub const SEARCH_BUFFER_ERROR: u16 = 61;
/// Inconsistent length in search and value buffer.
pub const LENGTH_SPECIFICATION: u16 = 62;
/// Unknown command identification in search buffer.
pub const UNKNOWN_CID_IN_SEARCH: u16 = 63;
/// Error communicating with utilities.
pub const UTILITY_COMMUNICATION: u16 = 64;
/// Space calculation error.
pub const SPACE_CALCULATION: u16 = 65;
/// Invalid client number.
pub const INVALID_CLIENT_NUMBER: u16 = 66;
/// Internal error decompressing superfields.
pub const SUPERFIELD_DECOMPRESS: u16 = 67;
/// Nondescriptor search issued though the facility is off.
pub const NONDESCRIPTOR_SEARCH_OFF: u16 = 68;
/// No space in table of sequential commands.
pub const NO_SPACE_SEQUENTIAL: u16 = 70;
/// No space in table of search results.
pub const NO_SPACE_SEARCH_RESULT: u16 = 71;
/// No space for user in user queue.
pub const NO_SPACE_USER_QUEUE: u16 = 72;
/// No space for search result in WORK.
pub const NO_SPACE_WORK_RESULT: u16 = 73;
/// No temporary space on WORK for search.
pub const NO_TEMP_SPACE_WORK: u16 = 74;
/// Extent overflow in file control block.
pub const EXTENT_OVERFLOW_FCB: u16 = 75;
/// Overflow in inverted list index.
pub const INVERTED_LIST_OVERFLOW: u16 = 76;
/// No space available for ASSO/DATA.
pub const NO_SPACE_ASSO_DATA: u16 = 77;
/// Free space table overflow.
pub const FREE_SPACE_TABLE_OVERFLOW: u16 = 78;
/// Hyperdescriptor not available.
pub const HYPERDESCRIPTOR_NOT_AVAILABLE: u16 = 79;
/// Invalid ISN from hyperexit.
pub const HYPEREXIT_INVALID_ISN_MF: u16 = 82;
/// Invalid ISN from hyperexit or hypertable overflow.
pub const HYPEREXIT_INVALID_ISN: u16 = 83;
/// Workpool overflow during sub/super update.
pub const WORKPOOL_OVERFLOW: u16 = 84;
/// DVT overflow during update.
pub const DVT_OVERFLOW: u16 = 85;
/// Hyperdescriptor error.
pub const HYPERDESCRIPTOR_ERROR: u16 = 86;
/// Buffer pool locked.
pub const BUFFER_POOL_LOCKED: u16 = 87;
/// Insufficient memory.
pub const INSUFFICIENT_MEMORY: u16 = 88;
/// Unique descriptor already present.
pub const UNIQUE_DESCRIPTOR_PRESENT: u16 = 98;
/// I/O error.
pub const IO_ERROR: u16 = 99;
/// Invalid ISN.
pub const INVALID_ISN: u16 = 113;
/// Refresh file not permitted.
pub const REFRESH_NOT_PERMITTED: u16 = 114;
/// Internal error during LOB processing.
pub const LOB_ERROR: u16 = 132;
/// ISN to be updated not held by user.
pub const ISN_NOT_HELD: u16 = 144;
/// ISN already held by another user.
pub const ISN_HELD_BY_OTHER: u16 = 145;
/// Invalid buffer length specification.
pub const INVALID_BUFFER_LENGTH: u16 = 146;
/// User buffer not accessible.
pub const USER_BUFFER_NOT_ACCESSIBLE: u16 = 147;
/// Database not active or not reachable.
pub const NOT_ACTIVE: u16 = 148;
/// System communication error.
pub const SYSTEM_COMMUNICATION: u16 = 149;
/// Too many nuclei used in parallel.
pub const TOO_MANY_NUCLEI: u16 = 150;
/// No space in command queue.
pub const COMMAND_QUEUE_FULL: u16 = 151;
/// User buffer greater than IUB size.
pub const USER_BUFFER_TOO_LARGE: u16 = 152;
/// Call already pending.
pub const CALL_PENDING: u16 = 153;
/// Call canceled.
pub const CALL_CANCELED: u16 = 154;
/// All buffer pool space used.
pub const BUFFER_POOL_FULL: u16 = 162;
/// Inverted list descriptor not found.
pub const DESCRIPTOR_NOT_FOUND: u16 = 165;
/// Inverted list value not found.
pub const DV_NOT_FOUND: u16 = 166;
/// Inverted list value already present.
pub const DV_ALREADY_PRESENT: u16 = 167;
/// Invalid RABN.
pub const INVALID_RABN: u16 = 170;
/// ISN value invalid.
pub const INVALID_ISN_VALUE: u16 = 172;
/// Invalid DATA RABN.
pub const INVALID_DATA_RABN: u16 = 173;
/// Error in inverted list.
pub const INVERTED_LIST_ERROR: u16 = 176;
/// Record not located in DATA block.
pub const RECORD_NOT_LOCATED: u16 = 177;
/// ET data not found in WORK.
pub const ET_DATA_MISSING: u16 = 182;
/// Security violation.
pub const SECURITY_VIOLATION: u16 = 200;
/// Invalid password.
pub const INVALID_PASSWORD: u16 = 201;
/// Invalid password for file.
pub const INVALID_FILE_PASSWORD: u16 = 202;
/// Password already in use.
pub const PASSWORD_IN_USE: u16 = 204;
/// SAF security login required.
pub const SAF_LOGIN_REQUIRED: u16 = 208;
/// Security login with invalid user.
pub const SAF_INVALID_USER: u16 = 209;
/// Receive buffer lost.
pub const RECEIVE_BUFFER_LOST: u16 = 210;
/// Only local utility usage allowed.
pub const LOCAL_UTILITY_ONLY: u16 = 211;
/// Functionality not yet implemented.
pub const NOT_YET_IMPLEMENTED: u16 = 212;
/// Connection timeout, available to layers that impose one.
pub const TIMEOUT: u16 = 224;
/// Error in link routine.
pub const LINK_ERROR: u16 = 228;
/// Mismatch in the calling protocol.
pub const PROTOCOL_MISMATCH: u16 = 230;
/// User exit load error.
pub const USER_EXIT_LOAD: u16 = 241;
/// Double allocation error.
pub const DOUBLE_ALLOCATION: u16 = 242;
/// Invalid GCB or FCB extent.
pub const INVALID_EXTENT: u16 = 243;
/// Pending utility entries in UCB.
pub const PENDING_UTILITY: u16 = 245;
/// Utility communication block overflow.
pub const UCB_OVERFLOW: u16 = 246;
/// Ident not found in UCB.
pub const UCB_IDENT_NOT_FOUND: u16 = 247;
/// Function not yet implemented.
pub const FUNCTION_NOT_IMPLEMENTED: u16 = 250;
/// Invalid utility call.
pub const INVALID_UTILITY_CALL: u16 = 251;
/// Invalid function call.
pub const INVALID_FUNCTION_CALL: u16 = 252;
/// System file not loaded or inconsistent.
pub const SYSTEM_FILE_NOT_LOADED: u16 = 253;
/// Insufficient space in attached buffer.
pub const ATTACHED_BUFFER_SPACE: u16 = 255;

const MESSAGES: &[(u16, &str)] = &[
    (NORMAL, "Normal successful completion"),
    (ISN_NOT_SORTED, "ISN list not sorted"),
    (FUNCTION_INCOMPLETE, "Function not completely executed"),
    (EOF, "End of file reached"),
    (EXPANDED_FILES, "S2/S9 not allowed for expanded files"),
    (VIEW_COMPRESSION, "Error in system view compression"),
    (SX_INTERRUPTED, "SX command interrupted because of timeout"),
    (TRANSACTION_ABORTED, "Transaction aborted"),
    (TOO_MANY_PE_OCCURRENCES, "Too many occurrences for a periodic group"),
    (DDL_COMMAND_FAILED, "DDL command failed"),
    (SUB_COMMAND_FAILED, "Subcommand of the MC call failed"),
    (INVALID_FILE_NUMBER, "Invalid or unauthorized file number"),
    (FILE_CHANGED, "File number changed during command sequence"),
    (ACC_NOT_ALLOWED, "Command not allowed for ACC user"),
    (INVALID_CID, "Invalid command identification value"),
    (INCONSISTENT_COMMAND, "Inconsistent usage of a command"),
    (INVALID_COMMAND, "Invalid command code"),
    (INVALID_START_ISN, "Invalid starting ISN for L2/L5"),
    (INVALID_ISN_BUFFER, "Invalid ISN found in ISN buffer"),
    (ISN_LL_NOT_FOUND, "ISN in ISN lower limit not found"),
    (INVALID_ISN_BUFFER_LENGTH, "Invalid ISN buffer length or ISN quantity"),
    (LWP_TOO_SMALL, "LWP parameter too small"),
    (INVALID_ADDITIONS_1, "Invalid additions-1 contents for L3/L6/S9"),
    (MISSING_V_OPTION, "Missing V option during forced value start"),
    (INVALID_COMMAND_OPTION, "Invalid command option"),
    (FORMAT_BUFFER_SYNTAX, "Syntax error in format buffer"),
    (FORMAT_BUFFER_ERROR, "Error in format buffer"),
    (INTERNAL_FORMAT_BUFFER_SMALL, "Internal format buffer too small"),
    (INCONSISTENT_DESCRIPTOR, "Inconsistent descriptor definition for L9"),
    (FORMAT_BUFFER_NOT_UPDATABLE, "Format buffer cannot be used for update"),
    (FIELD_COUNT_OVERFLOW, "Field count for PE or MU overflowed"),
    (FORMAT_BUFFER_MISMATCH, "Format buffer usage mismatch for command ID"),
    (HOLD_ISN_OVERFLOW, "Maximum number of held ISNs reached"),
    (FILE_NOT_AVAILABLE, "File or user ID not available at open time"),
    (COMPRESSED_TOO_LONG, "Compressed record too long"),
    (RECORD_BUFFER_OPEN_SYNTAX, "Syntax error in record buffer for open"),
    (RECORD_BUFFER_OPEN_INVALID, "Invalid record buffer contents during open"),
    (INVALID_RECORD_OR_VALUE, "Invalid data in record or value buffer"),
    (RECORD_BUFFER_TOO_SHORT, "Record buffer too short"),
    (RECORD_BUFFER_TOO_LONG, "Record buffer too long"),
    (FORMAT_CONVERSION, "Incompatible format conversion or truncation"),
    (DESCRIPTOR_TOO_LONG, "Descriptor value too long"),
    (UNKNOWN_DESCRIPTOR, "Unknown descriptor in search buffer for L9"),
    (FORMAT_NOT_FOUND, "Format not found for selection criterion"),
    (SUBFIELD_CONVERSION, "Format conversion for subfield not possible"),
    (SEARCH_BUFFER_SYNTAX, "Syntax error in search buffer"),
    (SEARCH_BUFFER_ERROR, "Error in search buffer"),
    (LENGTH_SPECIFICATION, "Inconsistent length in search and value buffer"),
    (UNKNOWN_CID_IN_SEARCH, "Unknown command identification in search buffer"),
    (UTILITY_COMMUNICATION, "Error communicating with utilities"),
    (SPACE_CALCULATION, "Space calculation error"),
    (INVALID_CLIENT_NUMBER, "Invalid client number"),
    (SUPERFIELD_DECOMPRESS, "Internal error decompressing superfields"),
    (NONDESCRIPTOR_SEARCH_OFF, "Nondescriptor search issued though facility is off"),
    (NO_SPACE_SEQUENTIAL, "No space in table of sequential commands"),
    (NO_SPACE_SEARCH_RESULT, "No space in table of search results"),
    (NO_SPACE_USER_QUEUE, "No space for user in user queue"),
    (NO_SPACE_WORK_RESULT, "No space for search result in WORK"),
    (NO_TEMP_SPACE_WORK, "No temporary space on WORK for search"),
    (EXTENT_OVERFLOW_FCB, "Extent overflow in file control block"),
    (INVERTED_LIST_OVERFLOW, "Overflow in inverted list index"),
    (NO_SPACE_ASSO_DATA, "No space available for ASSO/DATA"),
    (FREE_SPACE_TABLE_OVERFLOW, "Free space table overflow"),
    (HYPERDESCRIPTOR_NOT_AVAILABLE, "Hyperdescriptor not available"),
    (HYPEREXIT_INVALID_ISN_MF, "Invalid ISN from hyperexit"),
    (HYPEREXIT_INVALID_ISN, "Invalid ISN from hyperexit or hypertable overflow"),
    (WORKPOOL_OVERFLOW, "Workpool overflow during sub/super update"),
    (DVT_OVERFLOW, "DVT overflow during update"),
    (HYPERDESCRIPTOR_ERROR, "Hyperdescriptor error"),
    (BUFFER_POOL_LOCKED, "Buffer pool locked"),
    (INSUFFICIENT_MEMORY, "Insufficient memory"),
    (UNIQUE_DESCRIPTOR_PRESENT, "Unique descriptor already present"),
    (IO_ERROR, "I/O error"),
    (INVALID_ISN, "Invalid ISN"),
    (REFRESH_NOT_PERMITTED, "Refresh file not permitted"),
    (LOB_ERROR, "Internal error during LOB processing"),
    (ISN_NOT_HELD, "ISN to be updated not held by user"),
    (ISN_HELD_BY_OTHER, "ISN already held by another user"),
    (INVALID_BUFFER_LENGTH, "Invalid buffer length specification"),
    (USER_BUFFER_NOT_ACCESSIBLE, "User buffer not accessible"),
    (NOT_ACTIVE, "Database not active or accessible"),
    (SYSTEM_COMMUNICATION, "System communication error"),
    (TOO_MANY_NUCLEI, "Too many nuclei used in parallel"),
    (COMMAND_QUEUE_FULL, "No space in command queue"),
    (USER_BUFFER_TOO_LARGE, "User buffer greater than IUB size"),
    (CALL_PENDING, "Call already pending"),
    (CALL_CANCELED, "Call canceled"),
    (BUFFER_POOL_FULL, "All buffer pool space used"),
    (DESCRIPTOR_NOT_FOUND, "Inverted list descriptor not found"),
    (DV_NOT_FOUND, "Inverted list value not found"),
    (DV_ALREADY_PRESENT, "Inverted list value already present"),
    (INVALID_RABN, "Invalid RABN"),
    (INVALID_ISN_VALUE, "ISN value invalid"),
    (INVALID_DATA_RABN, "Invalid DATA RABN"),
    (INVERTED_LIST_ERROR, "Error in inverted list"),
    (RECORD_NOT_LOCATED, "Record not located in DATA block"),
    (ET_DATA_MISSING, "ET data not found in WORK"),
    (SECURITY_VIOLATION, "Security violation"),
    (INVALID_PASSWORD, "Invalid password"),
    (INVALID_FILE_PASSWORD, "Invalid password for file"),
    (PASSWORD_IN_USE, "Password already in use"),
    (SAF_LOGIN_REQUIRED, "Security login required"),
    (SAF_INVALID_USER, "Security login with invalid user"),
    (RECEIVE_BUFFER_LOST, "Receive buffer lost"),
    (LOCAL_UTILITY_ONLY, "Only local utility usage allowed"),
    (NOT_YET_IMPLEMENTED, "Functionality not yet implemented"),
    (TIMEOUT, "Connection timeout"),
    (LINK_ERROR, "Error in link routine"),
    (PROTOCOL_MISMATCH, "Mismatch in the calling protocol"),
    (USER_EXIT_LOAD, "User exit load error"),
    (DOUBLE_ALLOCATION, "Double allocation error"),
    (INVALID_EXTENT, "Invalid GCB or FCB extent"),
    (PENDING_UTILITY, "Pending utility entries in UCB"),
    (UCB_OVERFLOW, "Utility communication block overflow"),
    (UCB_IDENT_NOT_FOUND, "Ident not found in UCB"),
    (FUNCTION_NOT_IMPLEMENTED, "Function not yet implemented"),
    (INVALID_UTILITY_CALL, "Invalid utility call"),
    (INVALID_FUNCTION_CALL, "Invalid function call"),
    (SYSTEM_FILE_NOT_LOADED, "System file not loaded or inconsistent"),
    (ATTACHED_BUFFER_SPACE, "Insufficient space in attached buffer"),
];

/// Short text for a response code.
pub fn message(response: u16) -> &'static str {
    MESSAGES
        .iter()
        .find(|(code, _)| *code == response)
        .map(|(_, text)| *text)
        .unwrap_or("Unknown response code")
}

/// Whether `response` must be surfaced as an error.
pub fn is_error(response: u16) -> bool {
    response > EOF
}

/// Responses after which the server no longer holds session state.
pub fn resets_session(response: u16) -> bool {
    matches!(
        response,
        NOT_ACTIVE | TRANSACTION_ABORTED | SYSTEM_COMMUNICATION
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_errors() {
        for rsp in [NORMAL, ISN_NOT_SORTED, FUNCTION_INCOMPLETE, EOF] {
            assert!(!is_error(rsp));
        }
        assert!(is_error(EXPANDED_FILES));
        assert!(is_error(RECORD_BUFFER_TOO_SHORT));
    }

    #[test]
    fn test_session_resets() {
        assert!(resets_session(148));
        assert!(resets_session(9));
        assert!(resets_session(149));
        assert!(!resets_session(53));
        assert!(!resets_session(0));
    }

    #[test]
    fn test_messages() {
        assert_eq!(message(53), "Record buffer too short");
        assert_eq!(message(148), "Database not active or accessible");
        assert_eq!(message(1000), "Unknown response code");
    }

    #[test]
    fn test_ambiguous_codes_keep_integer_values() {
        assert_eq!(NONDESCRIPTOR_SEARCH_OFF, 68);
        assert_eq!(FREE_SPACE_TABLE_OVERFLOW, 78);
        assert_eq!(HOLD_ISN_OVERFLOW, 47);
        assert_eq!(FILE_NOT_AVAILABLE, 48);
    }

    #[test]
    fn test_table_has_unique_codes() {
        let mut codes: Vec<u16> = MESSAGES.iter().map(|(c, _)| *c).collect();
        let before = codes.len();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), before);
    }
}
