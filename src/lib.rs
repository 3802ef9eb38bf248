//! Block-diagram network model with incremental connector routing.
//!
//! The crate keeps a diagram of named blocks, their sockets and the
//! orthogonal-routed connectors between them, and maintains the connector
//! geometry incrementally as blocks move and segments are dragged. A
//! [`scene::Scene`] projects the model into stable visual items for a
//! rendering layer and runs the interactive connection-creation workflow.
//!
//! The binary `blocknet` offers check/dump/demo/convert commands over the
//! XML and binary file formats.

pub mod arena;
pub mod generator;
pub mod geometry;
pub mod model;
pub mod parser;
pub mod routing;
pub mod scene;
