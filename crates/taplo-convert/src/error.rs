/// Why a conversion between TOML and JSON failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionError {
    /// The input is not valid JSON.
    InvalidJson(String),
    /// The top-level JSON value is not an object, so it cannot become a
    /// TOML document.
    NotAnObject { found: &'static str },
    /// A `null` was found and nulls are configured to be errors.
    Null { path: String },
    /// An unsigned integer does not fit into TOML's 64-bit signed integers.
    IntegerOutOfRange { path: String, value: String },
    /// JSON cannot represent `nan` or `inf`.
    NonFiniteFloat { path: String },
}

impl std::fmt::Display for ConversionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConversionError::InvalidJson(message) => write!(f, "invalid JSON: {message}"),
            ConversionError::NotAnObject { found } => {
                write!(f, "expected a JSON object at the top level, found {found}")
            }
            ConversionError::Null { path } => {
                write!(f, "TOML has no null value (at `{path}`)")
            }
            ConversionError::IntegerOutOfRange { path, value } => {
                write!(f, "integer {value} at `{path}` does not fit in 64 bits")
            }
            ConversionError::NonFiniteFloat { path } => {
                write!(f, "the float at `{path}` cannot be represented in JSON")
            }
        }
    }
}

impl std::error::Error for ConversionError {}
