//! In-process stand-in for the brokerage gateway.
//!
//! Answers requests the way the real gateway does (on its own schedule, via
//! the shared event queue) and runs a ticker thread that random-walks every
//! subscribed contract.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chain_config::SimConfig;
use chain_engine::{CancelToken, Gateway, GatewayError};
use chain_events::{
    ContractDescriptor, ContractMetadata, GatewayEvent, OptionChainParameters, RequestId,
    SecType, Side, Strike, TickField, WireId,
};
use crossbeam_channel::{Receiver, Sender, select, unbounded};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Minimum price increment of the simulated quotes.
const TICK_SIZE: f64 = 0.25;
const MULTIPLIER: &str = "50";
/// Extrinsic value added to every simulated option.
const TIME_VALUE: f64 = 10.0;

pub struct SimGateway {
    shared: Arc<Shared>,
    ticker: Mutex<Option<Ticker>>,
}

struct Ticker {
    token: CancelToken,
    handle: JoinHandle<()>,
}

struct Shared {
    config: SimConfig,
    tx: Sender<GatewayEvent>,
    rx: Receiver<GatewayEvent>,
    connected: AtomicBool,
    next_request: AtomicU32,
    market: Mutex<Market>,
}

struct Market {
    underlying: f64,
    expiry: Option<String>,
    /// Current mid of every subscribed contract.
    subscriptions: BTreeMap<WireId, f64>,
}

impl SimGateway {
    pub fn new(config: SimConfig) -> Self {
        let (tx, rx) = unbounded();
        let underlying = round_to_tick(config.underlying_price);
        Self {
            shared: Arc::new(Shared {
                config,
                tx,
                rx,
                connected: AtomicBool::new(false),
                next_request: AtomicU32::new(1),
                market: Mutex::new(Market {
                    underlying,
                    expiry: None,
                    subscriptions: BTreeMap::new(),
                }),
            }),
            ticker: Mutex::new(None),
        }
    }

    /// The strike ladder the chain parameters report: `strike_count` strikes,
    /// `strike_step` apart, centered on the starting underlying price.
    pub fn strikes(&self) -> BTreeSet<Strike> {
        let config = &self.shared.config;
        let step = config.strike_step;
        let center = (config.underlying_price / step).round() * step;
        let first = center - step * (config.strike_count / 2) as f64;
        (0..config.strike_count)
            .map(|i| Strike::from_f64(first + step * i as f64))
            .collect()
    }

    pub fn subscription_count(&self) -> usize {
        self.shared.market.lock().subscriptions.len()
    }

    fn check_connected(&self) -> Result<(), GatewayError> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(GatewayError::NotConnected)
        }
    }

    fn next_request_id(&self) -> RequestId {
        RequestId(self.shared.next_request.fetch_add(1, Ordering::Relaxed))
    }
}

impl Shared {
    fn push(&self, event: GatewayEvent) {
        // we hold a receiver ourselves, so the queue cannot be disconnected
        let _ = self.tx.send(event);
    }

    fn push_quote(&self, wire_id: WireId, mid: f64) {
        let bid = (mid - TICK_SIZE).max(0.0);
        self.push(GatewayEvent::TickPrice {
            wire_id,
            field: TickField::Bid,
            price: bid,
        });
        self.push(GatewayEvent::TickPrice {
            wire_id,
            field: TickField::Ask,
            price: mid + TICK_SIZE,
        });
        self.push(GatewayEvent::TickPrice {
            wire_id,
            field: TickField::Last,
            price: mid,
        });
    }
}

impl Gateway for SimGateway {
    fn connect(&self, host: &str, port: u16, client_id: i32) -> Result<(), GatewayError> {
        if port == 0 {
            return Err(GatewayError::Connect {
                host: host.to_string(),
                port,
                client_id,
            });
        }
        let mut ticker = self.ticker.lock();
        if ticker.is_some() {
            return Ok(());
        }

        self.shared.connected.store(true, Ordering::Release);
        self.shared.push(GatewayEvent::Error {
            id: -1,
            code: 2104,
            message: "Market data farm connection is OK:simfarm".to_string(),
        });

        let token = CancelToken::new();
        let shared = Arc::clone(&self.shared);
        let ticker_token = token.clone();
        let handle = thread::Builder::new()
            .name("sim-ticker".to_string())
            .spawn(move || run_ticker(&shared, &ticker_token))
            .map_err(|e| {
                tracing::error!(error = %e, "cannot start sim ticker");
                self.shared.connected.store(false, Ordering::Release);
                GatewayError::Connect {
                    host: host.to_string(),
                    port,
                    client_id,
                }
            })?;
        *ticker = Some(Ticker { token, handle });
        tracing::debug!(host, port, client_id, "sim gateway connected");
        Ok(())
    }

    fn disconnect(&self) {
        self.shared.connected.store(false, Ordering::Release);
        if let Some(ticker) = self.ticker.lock().take() {
            ticker.token.cancel();
            if ticker.handle.join().is_err() {
                tracing::error!("sim ticker panicked");
            }
        }
        self.shared.market.lock().subscriptions.clear();
    }

    fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::Acquire)
    }

    fn events(&self) -> Receiver<GatewayEvent> {
        self.shared.rx.clone()
    }

    fn request_contract_metadata(
        &self,
        contract: &ContractDescriptor,
    ) -> Result<RequestId, GatewayError> {
        self.check_connected()?;
        let request_id = self.next_request_id();
        let base = self.shared.config.contract_id;

        let contract_id = match (contract.sec_type, contract.strike, contract.side) {
            (SecType::Future, _, _) => {
                self.shared.market.lock().expiry = Some(contract.expiry.clone());
                base
            }
            // calls odd, puts even, in strike order
            (SecType::FutureOption, Some(strike), Some(side)) => {
                let offset = strike.0 * 2 + i64::from(side == Side::Put);
                base + 1 + offset
            }
            (SecType::FutureOption, _, _) => {
                self.shared.push(GatewayEvent::Error {
                    id: i64::from(request_id.0),
                    code: 200,
                    message: "No security definition has been found for the request".to_string(),
                });
                return Ok(request_id);
            }
        };

        self.shared.push(GatewayEvent::ContractMetadata {
            request_id,
            metadata: ContractMetadata {
                contract: ContractDescriptor {
                    contract_id: Some(contract_id),
                    ..contract.clone()
                },
                contract_id,
                trading_class: contract.symbol.clone(),
                multiplier: MULTIPLIER.to_string(),
            },
        });
        Ok(request_id)
    }

    fn request_option_chain_parameters(
        &self,
        symbol: &str,
        exchange: &str,
        _sec_type: SecType,
        _currency: &str,
        underlying_contract_id: i64,
    ) -> Result<RequestId, GatewayError> {
        self.check_connected()?;
        let request_id = self.next_request_id();
        let expirations: BTreeSet<String> =
            self.shared.market.lock().expiry.iter().cloned().collect();
        let strikes = self.strikes();

        // a weekly class on the same underlying, listed first
        let weekly: BTreeSet<Strike> = strikes.iter().step_by(2).copied().collect();
        for (trading_class, strikes) in [(format!("{symbol}W1"), weekly), (symbol.to_string(), strikes)]
        {
            self.shared
                .push(GatewayEvent::OptionChainParameters(OptionChainParameters {
                    request_id,
                    exchange: exchange.to_string(),
                    underlying_contract_id,
                    trading_class,
                    multiplier: MULTIPLIER.to_string(),
                    expirations: expirations.clone(),
                    strikes,
                }));
        }
        Ok(request_id)
    }

    fn request_market_data_type(&self, data_type: i32) -> Result<(), GatewayError> {
        self.check_connected()?;
        self.shared.push(GatewayEvent::MarketDataTypeAck {
            request_id: -1,
            data_type,
        });
        Ok(())
    }

    fn request_market_data(
        &self,
        wire_id: WireId,
        contract: &ContractDescriptor,
    ) -> Result<(), GatewayError> {
        self.check_connected()?;
        let mut market = self.shared.market.lock();
        let mid = match (contract.strike, contract.side) {
            (Some(strike), Some(side)) => option_mid(market.underlying, strike, side),
            _ => market.underlying,
        };
        market.subscriptions.insert(wire_id, mid);
        drop(market);

        self.shared.push_quote(wire_id, mid);
        Ok(())
    }

    fn cancel_market_data(&self, wire_id: WireId) -> Result<(), GatewayError> {
        self.check_connected()?;
        if self.shared.market.lock().subscriptions.remove(&wire_id).is_none() {
            tracing::debug!(wire_id = wire_id.0, "cancel for unknown subscription");
        }
        Ok(())
    }
}

impl Drop for SimGateway {
    fn drop(&mut self) {
        self.disconnect();
    }
}

fn run_ticker(shared: &Shared, token: &CancelToken) {
    let interval = Duration::from_millis(shared.config.tick_interval_ms);
    let step = shared.config.strike_step;
    let mut rng = StdRng::from_entropy();

    loop {
        select! {
            recv(token.signal()) -> _ => break,
            default(interval) => {}
        }
        if token.is_cancelled() {
            break;
        }

        let mut market = shared.market.lock();
        market.underlying =
            round_to_tick((market.underlying + rng.gen_range(-0.1..0.1) * step).max(TICK_SIZE));
        let underlying = market.underlying;

        let quotes: Vec<(WireId, f64)> = market
            .subscriptions
            .iter_mut()
            .map(|(wire_id, mid)| {
                *mid = if wire_id.is_underlying() {
                    underlying
                } else {
                    round_to_tick((*mid + rng.gen_range(-1.0..1.0) * TICK_SIZE).max(TICK_SIZE))
                };
                (*wire_id, *mid)
            })
            .collect();
        drop(market);

        for (wire_id, mid) in quotes {
            shared.push_quote(wire_id, mid);
        }
    }
    tracing::debug!("sim ticker stopped");
}

fn option_mid(underlying: f64, strike: Strike, side: Side) -> f64 {
    let intrinsic = match side {
        Side::Call => underlying - strike.as_f64(),
        Side::Put => strike.as_f64() - underlying,
    };
    round_to_tick(intrinsic.max(0.0) + TIME_VALUE)
}

fn round_to_tick(px: f64) -> f64 {
    (px / TICK_SIZE).round() * TICK_SIZE
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SimConfig {
        SimConfig {
            underlying_price: 5002.0,
            strike_step: 5.0,
            strike_count: 10,
            tick_interval_ms: 5,
            contract_id: 500_000,
        }
    }

    fn drain(gateway: &SimGateway) -> Vec<GatewayEvent> {
        gateway.events().try_iter().collect()
    }

    #[test]
    fn refuses_port_zero() {
        let gateway = SimGateway::new(config());
        assert!(matches!(
            gateway.connect("localhost", 0, 1),
            Err(GatewayError::Connect { port: 0, .. })
        ));
        assert!(!gateway.is_connected());
    }

    #[test]
    fn requests_need_a_connection() {
        let gateway = SimGateway::new(config());
        let underlying = ContractDescriptor::future("ES", "CME", "USD", "20241220");
        assert_eq!(
            gateway.request_contract_metadata(&underlying),
            Err(GatewayError::NotConnected)
        );
        assert_eq!(
            gateway.request_market_data_type(3),
            Err(GatewayError::NotConnected)
        );
    }

    #[test]
    fn connect_announces_farm_status() {
        let gateway = SimGateway::new(config());
        gateway.connect("localhost", 7497, 1).unwrap();
        let first = gateway.events().recv().unwrap();
        assert!(matches!(first, GatewayEvent::Error { code: 2104, .. }));
        gateway.disconnect();
        assert!(!gateway.is_connected());
    }

    #[test]
    fn strike_ladder_is_centered_on_the_underlying() {
        let gateway = SimGateway::new(config());
        let strikes = gateway.strikes();
        assert_eq!(strikes.len(), 10);
        assert_eq!(strikes.first(), Some(&Strike::from_f64(4975.0)));
        assert_eq!(strikes.last(), Some(&Strike::from_f64(5020.0)));
    }

    #[test]
    fn chain_parameters_list_weekly_class_first() {
        let gateway = SimGateway::new(config());
        gateway.connect("localhost", 7497, 1).unwrap();
        let underlying = ContractDescriptor::future("ES", "CME", "USD", "20241220");
        gateway.request_contract_metadata(&underlying).unwrap();
        gateway
            .request_option_chain_parameters("ES", "CME", SecType::Future, "USD", 500_000)
            .unwrap();

        let sets: Vec<OptionChainParameters> = drain(&gateway)
            .into_iter()
            .filter_map(|event| match event {
                GatewayEvent::OptionChainParameters(params) => Some(params),
                _ => None,
            })
            .collect();
        assert_eq!(sets.len(), 2);
        assert_eq!(sets[0].trading_class, "ESW1");
        assert_eq!(sets[1].trading_class, "ES");
        assert_eq!(sets[1].strikes, gateway.strikes());
        assert!(sets[1].expirations.contains("20241220"));
    }

    #[test]
    fn option_metadata_ids_are_distinct() {
        let gateway = SimGateway::new(config());
        gateway.connect("localhost", 7497, 1).unwrap();
        let underlying = ContractDescriptor::future("ES", "CME", "USD", "20241220");
        let strike = Strike::from_f64(5000.0);
        for side in [Side::Call, Side::Put] {
            let option = ContractDescriptor::option_on(&underlying, strike, side);
            gateway.request_contract_metadata(&option).unwrap();
        }

        let ids: Vec<i64> = drain(&gateway)
            .into_iter()
            .filter_map(|event| match event {
                GatewayEvent::ContractMetadata { metadata, .. } => Some(metadata.contract_id),
                _ => None,
            })
            .collect();
        assert_eq!(ids.len(), 2);
        assert_ne!(ids[0], ids[1]);
    }

    #[test]
    fn subscription_ticks_until_cancelled() {
        let gateway = SimGateway::new(config());
        gateway.connect("localhost", 7497, 1).unwrap();
        let underlying = ContractDescriptor::future("ES", "CME", "USD", "20241220");
        gateway
            .request_market_data(WireId::UNDERLYING, &underlying)
            .unwrap();
        assert_eq!(gateway.subscription_count(), 1);

        let events = gateway.events();
        let mut last_seen = 0;
        while last_seen < 3 {
            let event = events
                .recv_timeout(Duration::from_secs(5))
                .expect("sim ticks");
            if let GatewayEvent::TickPrice {
                wire_id,
                field: TickField::Last,
                price,
            } = event
            {
                assert!(wire_id.is_underlying());
                assert!(price > 0.0);
                last_seen += 1;
            }
        }

        gateway.cancel_market_data(WireId::UNDERLYING).unwrap();
        assert_eq!(gateway.subscription_count(), 0);
    }

    #[test]
    fn option_mid_is_intrinsic_plus_time_value() {
        let strike = Strike::from_f64(4990.0);
        assert_eq!(option_mid(5000.0, strike, Side::Call), 20.0);
        assert_eq!(option_mid(5000.0, strike, Side::Put), 10.0);
    }
}
