use std::path::PathBuf;

/// Feil fra eksterne kall (nett/auth/payload-form).
/// Callere degraderer til "ingen data" i stedet for å propagere videre.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("http error: {0}")]
    Http(String),

    #[error("unexpected payload shape: {0}")]
    Shape(String),

    #[error("missing session token in {0:?}")]
    Session(PathBuf),
}

impl From<ureq::Error> for FetchError {
    fn from(e: ureq::Error) -> Self {
        FetchError::Http(e.to_string())
    }
}

impl From<std::io::Error> for FetchError {
    fn from(e: std::io::Error) -> Self {
        FetchError::Http(e.to_string())
    }
}

/// Feil i CSV-lagring og skjemamigrering.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("io error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("csv error on {path:?}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

impl StoreError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io { path: path.into(), source }
    }

    pub fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        StoreError::Csv { path: path.into(), source }
    }
}

/// Fatale oppsettsfeil: mangler sesjon eller påkrevd konfig.
/// Disse avbryter kjøringen før noe blir skrevet.
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("activity filter file not found: {0:?}")]
    FilterNotFound(PathBuf),

    #[error("could not parse {path:?}: {detail}")]
    FilterParse { path: PathBuf, detail: String },

    #[error("login failed: {0}")]
    Login(#[from] FetchError),

    #[error("invalid config value for {key}: {value}")]
    Config { key: &'static str, value: String },
}
