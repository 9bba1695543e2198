use thiserror::Error;

#[derive(Error, Debug)]
pub enum IssuerError {
    /// The tool ran and exited unsuccessfully
    #[error("{operation} failed with exit code {exit_code:?}: {}", summarize(.stderr, .stdout))]
    Issuance {
        operation: String,
        exit_code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    #[error("{operation} did not finish within {seconds}s and was killed")]
    Timeout { operation: String, seconds: u64 },

    #[error("Failed to start {program}: {reason}")]
    Spawn { program: String, reason: String },

    /// The tool reported success but its artifacts cannot be located
    #[error("Could not resolve certificate output: {0}")]
    OutputResolution(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl IssuerError {
    pub fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        IssuerError::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }
}

/// Last non-empty line of stderr, falling back to stdout
fn summarize(stderr: &str, stdout: &str) -> String {
    [stderr, stdout]
        .iter()
        .flat_map(|s| s.lines().rev())
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("no output")
        .to_string()
}
