use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The method an endpoint answers to when none is configured.
pub const DEFAULT_HTTP_METHOD: &str = "GET";

/// Name of the repeatable query parameter carrying external arguments.
pub const ARGS_QUERY_PARAMETER: &str = "args";

/// The complete server configuration.
///
/// Every field is optional in the serialized form, missing values fall back to their defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Route path (matched exactly) to endpoint definition.
    pub endpoints: BTreeMap<String, Endpoint>,
    /// Host or ip address to bind, empty means all interfaces.
    pub listen_address: String,
    pub listen_port: u16,
}

/// A single route bound to an executable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoint {
    /// Path or name of the executable, resolved through `PATH` like a shell would.
    pub command: String,
    /// Static arguments, always passed before any external arguments.
    pub arguments: Vec<String>,
    /// Case-insensitive HTTP method, empty means [`DEFAULT_HTTP_METHOD`].
    pub http_method: String,
    /// Append the `args` query parameters to [`Endpoint::arguments`].
    pub allow_external_arguments: bool,
    /// Connect the request body to the standard input of the process.
    pub allow_stdin: bool,
    pub discard_stderr: bool,
    pub discard_stdout: bool,
}

impl Endpoint {
    /// The configured method, or [`DEFAULT_HTTP_METHOD`] if unset.
    pub fn http_method(&self) -> &str {
        if self.http_method.is_empty() {
            DEFAULT_HTTP_METHOD
        } else {
            &self.http_method
        }
    }

    /// Builds the argument list for one invocation.
    ///
    /// The static arguments are copied, so concurrent invocations never share a list.
    /// External arguments are dropped unless [`Endpoint::allow_external_arguments`] is set.
    pub fn arguments_with(&self, external: ExternalArguments) -> Vec<String> {
        let mut arguments = self.arguments.clone();
        if self.allow_external_arguments {
            arguments.extend(external.0);
        }
        arguments
    }
}

/// Caller supplied arguments, the values of every `args` query parameter in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExternalArguments(pub Vec<String>);

impl ExternalArguments {
    /// Collects all `args` values of an url encoded query string.
    ///
    /// Other parameters are ignored.
    ///
    /// # Errors
    /// If the query is not valid `application/x-www-form-urlencoded` data.
    pub fn from_query(query: &str) -> Result<Self, serde_urlencoded::de::Error> {
        let pairs: Vec<(String, String)> = serde_urlencoded::from_str(query)?;
        Ok(Self(
            pairs
                .into_iter()
                .filter(|(key, _)| key == ARGS_QUERY_PARAMETER)
                .map(|(_, value)| value)
                .collect(),
        ))
    }
}

/// Describes the json response of every endpoint.
///
/// # Serialized Example
/// ```
/// # let ser = r#"
/// {
///     "start_time": "2024-05-01T12:00:00.000000001Z",
///     "end_time": "2024-05-01T12:00:00.002Z",
///     "stdout": "hello\n",
///     "exit_code": 0
/// }
/// # "#;
/// # let deser: httpwrap_api::api::CommandResponse
/// #    = serde_json::from_str(ser).expect("failed parsing");
/// # assert_eq!(deser.exit_code, Some(0));
/// # assert!(deser.stderr.is_none());
/// # assert!(!deser.failed_to_start());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResponse {
    /// Taken right before the process is spawned.
    pub start_time: DateTime<Utc>,
    /// Taken after the process exited, or after spawning failed.
    pub end_time: DateTime<Utc>,
    /// Missing if the endpoint discards stdout or the process never started.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
    /// Exit code of the process or -1 if it was terminated by a signal.
    ///
    /// Missing if the process never started.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    /// Why the process could not be started.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CommandResponse {
    pub fn failed_to_start(&self) -> bool {
        self.error.is_some()
    }
}
