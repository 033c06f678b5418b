use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chain_core::{DisplayGrid, InstrumentStore};
use chain_events::{
    ContractDescriptor, ContractMetadata, EventHandler, InstrumentKey, OptionChainParameters,
    RequestId, SecType, Strike, TickField, WireId,
};
use parking_lot::Mutex;

use crate::coordinator::InitPhase;
use crate::error::GatewayError;
use crate::gateway::Gateway;

/// What the user picked at startup: one underlying future and one expiry.
#[derive(Clone, Debug, PartialEq)]
pub struct Session {
    pub symbol: String,
    pub expiry: String,
    pub exchange: String,
    pub currency: String,
    pub market_data_type: i32,
}

impl Session {
    pub fn underlying(&self) -> ContractDescriptor {
        ContractDescriptor::future(&self.symbol, &self.exchange, &self.currency, &self.expiry)
    }
}

/// Application context for one session.
///
/// Owns the instrument store and a handle to the gateway, and implements the
/// gateway callback surface. It is shared (`Arc`) between the bootstrap
/// thread, which drives initialization, and the worker pool.
pub struct ChainEngine {
    pub(crate) session: Session,
    pub(crate) gateway: Arc<dyn Gateway>,
    pub(crate) store: InstrumentStore,
    pub(crate) phase: Mutex<InitPhase>,
    pub(crate) ready: AtomicBool,
    pub(crate) underlying_subscribed: AtomicBool,
    /// First accepted strike set from the chain parameters callback.
    pub(crate) discovered: Mutex<Option<BTreeSet<Strike>>>,
}

impl ChainEngine {
    pub fn new(session: Session, gateway: Arc<dyn Gateway>, grid: Arc<DisplayGrid>) -> Self {
        let store = InstrumentStore::new(session.underlying(), grid);
        Self {
            session,
            gateway,
            store,
            phase: Mutex::new(InitPhase::Uninitialized),
            ready: AtomicBool::new(false),
            underlying_subscribed: AtomicBool::new(false),
            discovered: Mutex::new(None),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn store(&self) -> &InstrumentStore {
        &self.store
    }

    pub fn grid(&self) -> &Arc<DisplayGrid> {
        self.store.grid()
    }

    pub fn gateway(&self) -> &Arc<dyn Gateway> {
        &self.gateway
    }

    /// Polled by whoever waits for initialization; flips to `true` once.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    pub fn phase(&self) -> InitPhase {
        *self.phase.lock()
    }

    /// Connects the gateway. The returned guard cancels subscriptions and
    /// disconnects when dropped, whatever path the caller leaves by.
    pub fn connect(
        &self,
        host: &str,
        port: u16,
        client_id: i32,
    ) -> Result<Connection<'_>, GatewayError> {
        tracing::info!(host, port, client_id, "connecting");
        match self.gateway.connect(host, port, client_id) {
            Ok(()) => {
                tracing::info!(host, port, client_id, "connected");
                Ok(Connection { engine: self })
            }
            Err(e) => {
                tracing::error!(host, port, client_id, "cannot connect");
                Err(e)
            }
        }
    }

    fn accepts(&self, trading_class: &str) -> bool {
        trading_class == self.session.symbol
    }
}

pub struct Connection<'a> {
    engine: &'a ChainEngine,
}

impl Drop for Connection<'_> {
    fn drop(&mut self) {
        self.engine.cancel_market_data();
        self.engine.gateway.disconnect();
        tracing::info!("disconnected");
    }
}

impl EventHandler for ChainEngine {
    fn on_contract_metadata(&self, request_id: RequestId, metadata: &ContractMetadata) {
        if !self.accepts(&metadata.trading_class) {
            tracing::debug!(
                request_id = request_id.0,
                trading_class = %metadata.trading_class,
                "ignoring metadata for other trading class"
            );
            return;
        }

        let contract = &metadata.contract;
        tracing::info!(
            request_id = request_id.0,
            symbol = %contract.symbol,
            contract_id = metadata.contract_id,
            sec_type = contract.sec_type.code(),
            strike = ?contract.strike,
            side = ?contract.side,
            expiry = %contract.expiry,
            "received contract metadata"
        );

        match contract.sec_type {
            SecType::Future => self.store.set_underlying_metadata(metadata.clone()),
            SecType::FutureOption => {
                let (Some(strike), Some(side)) = (contract.strike, contract.side) else {
                    tracing::warn!(request_id = request_id.0, "option metadata without strike/side");
                    return;
                };
                let key = InstrumentKey::new(strike, side);
                match self.store.register_contract_metadata(&key, metadata.clone()) {
                    Ok(true) => {
                        let received = self.store.increment_ready_counter();
                        tracing::debug!(key = %key, received, "metadata counted");
                    }
                    Ok(false) => tracing::debug!(key = %key, "duplicate metadata"),
                    Err(e) => tracing::warn!(error = %e, "dropping contract metadata"),
                }
            }
        }
    }

    fn on_error(&self, id: i64, code: i32, message: &str) {
        // 2100..2199 are connection/farm status notices, not failures
        if (2100..2200).contains(&code) {
            tracing::info!(id, code, message, "gateway notice");
        } else {
            tracing::warn!(id, code, message, "gateway error");
        }
    }

    fn on_market_data_type_ack(&self, request_id: i64, data_type: i32) {
        tracing::info!(request_id, data_type, "market data type");
    }

    fn on_option_chain_parameters(&self, params: &OptionChainParameters) {
        if !self.accepts(&params.trading_class) {
            tracing::debug!(
                request_id = params.request_id.0,
                trading_class = %params.trading_class,
                "ignoring chain parameters for other trading class"
            );
            return;
        }

        let mut discovered = self.discovered.lock();
        if discovered.is_some() {
            return;
        }
        tracing::info!(
            request_id = params.request_id.0,
            underlying_contract_id = params.underlying_contract_id,
            strikes = params.strikes.len(),
            "received option chain"
        );
        *discovered = Some(params.strikes.clone());
    }

    fn on_tick_price(&self, wire_id: WireId, field: TickField, price: f64) {
        tracing::info!(wire_id = wire_id.0, field = field.name(), price, "tick price");

        // negative is the gateway's "no quote" marker
        if !price.is_finite() || price < 0.0 {
            tracing::debug!(wire_id = wire_id.0, price, "ignoring unset price");
            return;
        }

        if wire_id.is_underlying() {
            self.store.set_underlying_field(field, price);
            return;
        }
        if let Err(e) = self.store.set_instrument_field(wire_id, field, price) {
            tracing::warn!(wire_id = wire_id.0, error = %e, "dropping tick");
        }
    }
}
