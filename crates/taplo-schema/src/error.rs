use taplo_config::EnvError;

/// Why a schema could not be loaded or an association registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// The schema URL uses a scheme we cannot load from.
    UnsupportedScheme { url: String },
    /// No bundled schema exists under this `taplo://` URL.
    UnknownBuiltin { url: String },
    /// Reading or fetching the schema failed.
    Env(EnvError),
    /// The schema is not valid JSON.
    InvalidJson { url: String, message: String },
    /// An association pattern failed to compile.
    Pattern { pattern: String, message: String },
}

impl std::fmt::Display for SchemaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchemaError::UnsupportedScheme { url } => {
                write!(f, "cannot load schema {url}: unsupported URL scheme")
            }
            SchemaError::UnknownBuiltin { url } => write!(f, "no bundled schema named {url}"),
            SchemaError::Env(e) => write!(f, "{e}"),
            SchemaError::InvalidJson { url, message } => {
                write!(f, "schema {url} is not valid JSON: {message}")
            }
            SchemaError::Pattern { pattern, message } => {
                write!(f, "invalid association pattern `{pattern}`: {message}")
            }
        }
    }
}

impl std::error::Error for SchemaError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SchemaError::Env(e) => Some(e),
            _ => None,
        }
    }
}

impl From<EnvError> for SchemaError {
    fn from(e: EnvError) -> Self {
        SchemaError::Env(e)
    }
}
