//! Connection URL handling for in-memory node databases.
//!
//! Nodes describe their database with a data source URL such as
//! `jdbc:h2:mem:notaryDb;DB_CLOSE_ON_EXIT=FALSE`. Once the TCP server is up,
//! the same database is reachable as `jdbc:h2:tcp://localhost:9092/notaryDb`.
//!
//! ## Terminology
//!
//! - **Data source URL**: the in-process URL a node was configured with
//! - **Database name**: the segment after `mem:`, up to the first `;` or `:`
//! - **Endpoint**: the externally reachable TCP URL for a database name

use std::fmt;

/// Scheme shared by in-process and TCP URLs.
pub const URL_SCHEME: &str = "jdbc:h2:";

/// Marker for in-memory databases, following [`URL_SCHEME`].
pub const MEM_MARKER: &str = "mem:";

/// Options appended to URLs built with [`mem_url`].
pub const DEFAULT_MEM_OPTIONS: &str = "DB_CLOSE_ON_EXIT=FALSE";

/// Error returned when a data source URL does not name an in-memory database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractError {
    url: String,
}

impl ExtractError {
    fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
        }
    }

    /// The URL that failed to parse.
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl fmt::Display for ExtractError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "could not extract db name from {}", self.url)
    }
}

impl std::error::Error for ExtractError {}

/// Extracts the in-memory database name from a data source URL.
///
/// The URL must start with `jdbc:h2:mem:`. The name runs until the first
/// `;` or `:` and must not be empty. Anything after the name is ignored.
pub fn database_name(url: &str) -> Result<&str, ExtractError> {
    let rest = url
        .strip_prefix(URL_SCHEME)
        .and_then(|rest| rest.strip_prefix(MEM_MARKER))
        .ok_or_else(|| ExtractError::new(url))?;

    let end = rest.find([';', ':']).unwrap_or(rest.len());
    let name = &rest[..end];
    if name.is_empty() {
        return Err(ExtractError::new(url));
    }
    Ok(name)
}

/// Builds the data source URL for an in-memory database.
pub fn mem_url(name: &str) -> String {
    format!("{URL_SCHEME}{MEM_MARKER}{name};{DEFAULT_MEM_OPTIONS}")
}

/// An externally reachable database URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    pub database: String,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16, database: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            database: database.into(),
        }
    }

    /// Derives the endpoint for a node's data source URL.
    pub fn for_data_source(host: &str, port: u16, url: &str) -> Result<Self, ExtractError> {
        let database = database_name(url)?;
        Ok(Self::new(host, port, database))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}tcp://{}:{}/{}",
            URL_SCHEME, self.host, self.port, self.database
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_name_with_options() {
        assert_eq!(
            database_name("jdbc:h2:mem:notaryDb;DB_CLOSE_ON_EXIT=FALSE").unwrap(),
            "notaryDb"
        );
    }

    #[test]
    fn test_database_name_without_options() {
        assert_eq!(database_name("jdbc:h2:mem:partyA").unwrap(), "partyA");
    }

    #[test]
    fn test_database_name_stops_at_colon() {
        assert_eq!(database_name("jdbc:h2:mem:partyB:extra").unwrap(), "partyB");
    }

    #[test]
    fn test_database_name_rejects_other_schemes() {
        for url in [
            "jdbc:h2:tcp://localhost:9092/notaryDb",
            "jdbc:h2:file:/tmp/notaryDb",
            "jdbc:postgresql:mem:notaryDb",
            "h2:mem:notaryDb",
            " jdbc:h2:mem:notaryDb",
            "",
        ] {
            let err = database_name(url).unwrap_err();
            assert_eq!(err.url(), url);
        }
    }

    #[test]
    fn test_database_name_rejects_empty_name() {
        assert!(database_name("jdbc:h2:mem:").is_err());
        assert!(database_name("jdbc:h2:mem:;DB_CLOSE_ON_EXIT=FALSE").is_err());
        assert!(database_name("jdbc:h2:mem::x").is_err());
    }

    #[test]
    fn test_extract_error_names_url() {
        let err = database_name("jdbc:sqlite::memory:").unwrap_err();
        assert_eq!(
            err.to_string(),
            "could not extract db name from jdbc:sqlite::memory:"
        );
    }

    #[test]
    fn test_mem_url_round_trips_name() {
        let url = mem_url("bankA");
        assert_eq!(url, "jdbc:h2:mem:bankA;DB_CLOSE_ON_EXIT=FALSE");
        assert_eq!(database_name(&url).unwrap(), "bankA");
    }

    #[test]
    fn test_endpoint_display() {
        let endpoint =
            Endpoint::for_data_source("localhost", 9092, "jdbc:h2:mem:notaryDb;X=1").unwrap();
        assert_eq!(
            endpoint.to_string(),
            "jdbc:h2:tcp://localhost:9092/notaryDb"
        );
    }
}
