pub mod event;
pub mod instrument;

pub use event::{
    ContractDescriptor, ContractMetadata, EventHandler, GatewayEvent, OptionChainParameters,
    RequestId, SecType, dispatch,
};
pub use instrument::{InstrumentKey, STRIKE_SCALE, Side, Strike, TickField, WireId};
