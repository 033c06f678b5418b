use chain_events::{InstrumentKey, Strike, WireId};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("no instrument mapped to wire id {0}")]
    UnknownWireId(WireId),

    #[error("no instrument for {0}")]
    UnknownKey(InstrumentKey),

    #[error("instrument chain not populated yet")]
    NotPopulated,

    #[error("instrument chain already populated")]
    AlreadyPopulated,

    #[error("strike set is empty")]
    EmptyChain,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum GridError {
    #[error("display grid already initialized")]
    AlreadyInitialized,

    #[error("center strike {0} is not in the strike set")]
    CenterNotInChain(Strike),
}
