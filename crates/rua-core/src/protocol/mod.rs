//! Message protocol between extension surfaces and the background runtime.
//!
//! Every surface talks to the background process by sending a JSON request
//! (or an ordered array of requests) and waiting for the correlated answer.
//! See [`request`] for the envelope shapes.

pub mod request;

pub use request::{parse_request, Inbound, Outbound, Request, Response, Route, SETTINGS_ACTION};
