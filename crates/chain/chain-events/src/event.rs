use std::collections::BTreeSet;

use crate::instrument::{Side, Strike, TickField, WireId};

/// Id the gateway echoes back on request/response style callbacks.
#[repr(transparent)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct RequestId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SecType {
    Future,
    FutureOption,
}

impl SecType {
    pub fn code(self) -> &'static str {
        match self {
            SecType::Future => "FUT",
            SecType::FutureOption => "FOP",
        }
    }
}

/// What we send the gateway to identify a contract. Option fields are
/// left empty for the underlying future.
#[derive(Clone, Debug, PartialEq)]
pub struct ContractDescriptor {
    pub symbol: String,
    pub sec_type: SecType,
    pub exchange: String,
    pub currency: String,
    /// Last trade date or contract month, `YYYYMMDD`.
    pub expiry: String,
    pub strike: Option<Strike>,
    pub side: Option<Side>,
    /// Known once metadata for the contract has been received.
    pub contract_id: Option<i64>,
}

impl ContractDescriptor {
    pub fn future(symbol: &str, exchange: &str, currency: &str, expiry: &str) -> Self {
        Self {
            symbol: symbol.to_owned(),
            sec_type: SecType::Future,
            exchange: exchange.to_owned(),
            currency: currency.to_owned(),
            expiry: expiry.to_owned(),
            strike: None,
            side: None,
            contract_id: None,
        }
    }

    /// Option on `underlying` with the same symbol, venue and expiry.
    pub fn option_on(underlying: &ContractDescriptor, strike: Strike, side: Side) -> Self {
        Self {
            sec_type: SecType::FutureOption,
            strike: Some(strike),
            side: Some(side),
            contract_id: None,
            ..underlying.clone()
        }
    }
}

/// Contract details as returned by the gateway.
#[derive(Clone, Debug, PartialEq)]
pub struct ContractMetadata {
    pub contract: ContractDescriptor,
    pub contract_id: i64,
    pub trading_class: String,
    pub multiplier: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct OptionChainParameters {
    pub request_id: RequestId,
    pub exchange: String,
    pub underlying_contract_id: i64,
    pub trading_class: String,
    pub multiplier: String,
    pub expirations: BTreeSet<String>,
    pub strikes: BTreeSet<Strike>,
}

/// A decoded gateway message. The gateway reader thread produces these into
/// the shared event queue; whoever pops one hands it to [`dispatch`].
#[derive(Clone, Debug, PartialEq)]
pub enum GatewayEvent {
    ContractMetadata {
        request_id: RequestId,
        metadata: ContractMetadata,
    },
    Error {
        /// Request or wire id the error refers to, `-1` for session notices.
        id: i64,
        code: i32,
        message: String,
    },
    MarketDataTypeAck {
        request_id: i64,
        data_type: i32,
    },
    OptionChainParameters(OptionChainParameters),
    TickPrice {
        wire_id: WireId,
        field: TickField,
        price: f64,
    },
}

/// Callback surface invoked for every decoded gateway event.
///
/// Handlers are shared between the bootstrap thread and every worker, so all
/// methods take `&self` and must do their own locking. A handler never
/// returns an error: failures are logged and the event is dropped.
pub trait EventHandler: Send + Sync {
    fn on_contract_metadata(&self, request_id: RequestId, metadata: &ContractMetadata);

    fn on_error(&self, id: i64, code: i32, message: &str);

    fn on_market_data_type_ack(&self, _request_id: i64, _data_type: i32) {}

    fn on_option_chain_parameters(&self, params: &OptionChainParameters);

    fn on_tick_price(&self, wire_id: WireId, field: TickField, price: f64);
}

/// Routes one event to the matching callback.
pub fn dispatch<H: EventHandler + ?Sized>(handler: &H, event: &GatewayEvent) {
    match event {
        GatewayEvent::ContractMetadata {
            request_id,
            metadata,
        } => handler.on_contract_metadata(*request_id, metadata),
        GatewayEvent::Error { id, code, message } => handler.on_error(*id, *code, message),
        GatewayEvent::MarketDataTypeAck {
            request_id,
            data_type,
        } => handler.on_market_data_type_ack(*request_id, *data_type),
        GatewayEvent::OptionChainParameters(params) => handler.on_option_chain_parameters(params),
        GatewayEvent::TickPrice {
            wire_id,
            field,
            price,
        } => handler.on_tick_price(*wire_id, *field, *price),
    }
}
