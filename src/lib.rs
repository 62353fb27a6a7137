//! This crate holds the shared types of httpwrap, a server exposing configured commands as http endpoints.
//! The canonical server implementation lives in the same repository.
//!
//! Every endpoint is bound to one executable by the [`api::Config`].
//! A request runs the executable once and answers with an [`api::CommandResponse`].
//!
//! ## Usage
//! * `<METHOD> /<route>` runs the command of the endpoint configured at `/<route>`.
//!   The method must match [`api::Endpoint::http_method`], otherwise `400` is returned.
//! * `?args=a&args=b` appends `a` and `b` to the static arguments,
//!   only if [`api::Endpoint::allow_external_arguments`] is set.
//! * The request body becomes the standard input, only if [`api::Endpoint::allow_stdin`] is set.
//!
//! The status is `500` if the command could not be started and `200` otherwise,
//! the exit code of the process is part of the response body.
//!
//! ## Long running jobs
//! The calls just wait until the command terminates and return then.
//! *Make sure your commands always terminate* in order to not lock up valuable resources.
//! Output is buffered in memory without any limit.
//!
//! ## Security
//! The api does not include any security measures.
//! Make sure it is only reachable from trusted hosts, e.g. by means of ssh port forwarding.

pub mod api;
