//! State of the interactive connection-creation workflow.

use crate::model::{BlockHandle, ConnectorHandle};

/// Where the scene is in the connection-creation workflow.
///
/// The pending helper block and its synthetic connector live only inside the
/// `Dragging` state; they never outlive a single interaction. A full network
/// replace first resolves or abandons this state, so no handle in here can
/// dangle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// Normal editing.
    Idle,
    /// Connection mode is armed: unconnected outlets are hover-reactive,
    /// inlets are drop targets, block and segment dragging is disabled.
    Pending,
    /// A connection is being dragged out from an outlet socket.
    Dragging {
        /// The transient helper block tracking the pointer.
        helper: BlockHandle,
        /// The synthetic connector from the source outlet to the helper's
        /// inlet socket. Discarded on release, never reused.
        connector: ConnectorHandle,
        /// Flat address of the source outlet.
        source: String,
    },
}

impl ConnectionState {
    pub fn is_idle(&self) -> bool {
        matches!(self, ConnectionState::Idle)
    }
}
