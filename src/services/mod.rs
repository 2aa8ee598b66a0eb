//! Domain services used by the websocket routes.
//!
//! ARCHITECTURE
//! ============
//! `room` owns live membership and fan-out, `element` owns the storage side
//! of each drawing operation, and `spatial` / `identity` are the pure pieces
//! both of them lean on. Route handlers stay focused on protocol translation.

pub mod element;
pub mod identity;
pub mod room;
pub mod spatial;
