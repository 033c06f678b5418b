use chain_core::{GridError, StoreError};

use crate::coordinator::InitPhase;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum GatewayError {
    #[error("cannot connect to {host}:{port} (client id {client_id})")]
    Connect {
        host: String,
        port: u16,
        client_id: i32,
    },

    #[error("gateway is not connected")]
    NotConnected,

    /// Every producer of the event queue is gone.
    #[error("gateway event queue disconnected")]
    Disconnected,
}

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Grid(#[from] GridError),

    #[error("initialization out of order: expected {expected:?}, found {found:?}")]
    Phase { expected: InitPhase, found: InitPhase },
}
