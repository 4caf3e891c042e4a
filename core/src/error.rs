/// JSON-RPC 2.0 error codes used by the server.
pub mod codes {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;
}

/// Machine codes attached to in-band tool failures.
pub mod tool_codes {
    pub const MISSING_ARGUMENT: &str = "missing_argument";
    pub const INVALID_ARGUMENT: &str = "invalid_argument";
    pub const UNKNOWN_OPERATION: &str = "unknown_operation";
    pub const API_ERROR: &str = "api_error";
    pub const CONNECTION_ERROR: &str = "connection_error";
    pub const PARSE_ERROR: &str = "parse_error";
    pub const FETCH_ERROR: &str = "fetch_error";
}
