//! Pet-name suggestion client.
//!
//! ARCHITECTURE
//! ============
//! - `net`: `reqwest` adapters for the hosted auth service, the generation
//!   event endpoint, and the saved-names API, behind the traits in
//!   `net::types`.
//! - `services`: session tracking, name generation, and saved-name
//!   persistence, each independent of transport.
//! - `app`: the session-gated controller that ties the services to the form.
//! - `view`: pure rendering of controller state.
//! - `terminal`: the interactive command loop driven by the binary.

pub mod app;
pub mod config;
pub mod net;
pub mod services;
pub mod state;
pub mod terminal;
pub mod view;

#[cfg(test)]
mod test_helpers;
