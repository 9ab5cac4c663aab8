use thiserror::Error;

use crate::units::Unit;

pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can abort a compile or simulate call.
#[derive(Debug, Error)]
pub enum Error {
    #[error("bad connection: {0}")]
    MalformedConnection(String),

    #[error("unresolved endpoint {endpoint}: {reason}")]
    UnresolvedEndpoint { endpoint: String, reason: String },

    #[error("name `{0}` is declared more than once")]
    DuplicateName(String),

    #[error("name `{0}` is reserved")]
    ReservedName(String),

    #[error("floating connections for {}", .0.join(", "))]
    FloatingPorts(Vec<String>),

    #[error("invalid device template: {0}")]
    TemplateSyntax(String),

    #[error("nothing tied to ground")]
    NoGroundConnection,

    #[error("failed to find port: {instance}.{port}")]
    PortNotFound { instance: String, port: String },

    #[error("failed to find param: {instance}:{param}")]
    ParameterMissing { instance: String, param: String },

    #[error("param {instance}:{param} expects {expected}, got {found}")]
    ParameterUnit {
        instance: String,
        param: String,
        expected: Unit,
        found: Unit,
    },

    #[error("invalid analysis: {0}")]
    InvalidAnalysis(String),

    #[error("invalid quantity `{0}`")]
    InvalidQuantity(String),

    #[error("failed to start simulator `{executable}`: {source}")]
    SimulatorSpawn {
        executable: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("simulator produced no result tables (captured {} bytes of output)", .output.len())]
    EmptyOutput { output: String },

    #[error("unsupported rawfile format: {0}")]
    UnsupportedFormat(String),

    #[error("rawfile line {line}: {message}")]
    RawfileParse { line: usize, message: String },

    #[error("rawfile line {line}: malformed sample `{text}`")]
    MalformedSample { line: usize, text: String },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
