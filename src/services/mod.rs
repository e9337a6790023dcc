//! Domain services driven by the controller.
//!
//! ARCHITECTURE
//! ============
//! Each service owns one slice of client state and talks to exactly one
//! remote collaborator through its trait. The controller in `app` wires them
//! together and supplies the request-scoped session.

pub mod generation;
pub mod saved_names;
pub mod session;
