//! Domain Layer
//!
//! Entities, value objects, and ports of the proxy verification engine.

pub mod entities;
pub mod ports;
pub mod value_objects;
