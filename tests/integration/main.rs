//! Integration test crate: drives the full session stack against an
//! in-process mock game authority (axum, WebSocket + REST).

mod mock_authority;
mod session_flow;
