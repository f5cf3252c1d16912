//! Request handlers, grouped by surface
//!
//! Handlers bind the JSON body, run the gate where the route mutates, call
//! the service layer, and shape the reply. No SQL lives here.

pub mod auth;
pub mod graph;
pub mod roadmaps;
