//! Startup sequence: underlying, strikes, per-instrument metadata, underlying
//! price, then the grid.
//!
//! Every wait here pumps the gateway on the calling thread, so the callbacks
//! that complete a phase run in between checks. No lock is held across a
//! pump.

use std::collections::BTreeSet;
use std::sync::atomic::Ordering;

use chain_core::{StoreError, closest_strike};
use chain_events::{InstrumentKey, SecType, Side, Strike, TickField, WireId};

use crate::engine::ChainEngine;
use crate::error::{GatewayError, InitError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitPhase {
    Uninitialized,
    AwaitingContractMetadata,
    AwaitingUnderlyingPrice,
    Ready,
}

impl ChainEngine {
    /// Runs the whole startup sequence. Returns the strike the grid is
    /// centered on.
    pub fn bootstrap(&self) -> Result<Strike, InitError> {
        self.resolve_underlying()?;
        let strikes = self.discover_strikes()?;
        self.initialize_chain(strikes)
    }

    /// Asks for the underlying future's metadata and waits for its contract id.
    pub fn resolve_underlying(&self) -> Result<i64, InitError> {
        let contract = self.store.underlying_contract();
        let request_id = self.gateway.request_contract_metadata(&contract)?;
        tracing::info!(
            request_id = request_id.0,
            symbol = %contract.symbol,
            expiry = %contract.expiry,
            "requested underlying metadata"
        );

        loop {
            if let Some(contract_id) = self.store.underlying_contract_id() {
                return Ok(contract_id);
            }
            self.pump()?;
        }
    }

    /// Requests the option chain of the resolved underlying and waits for the
    /// first matching strike set.
    pub fn discover_strikes(&self) -> Result<BTreeSet<Strike>, InitError> {
        let underlying_contract_id = match self.store.underlying_contract_id() {
            Some(id) => id,
            None => self.resolve_underlying()?,
        };
        let request_id = self.gateway.request_option_chain_parameters(
            &self.session.symbol,
            &self.session.exchange,
            SecType::Future,
            &self.session.currency,
            underlying_contract_id,
        )?;
        tracing::info!(
            request_id = request_id.0,
            underlying_contract_id,
            "requested option chain"
        );

        loop {
            let found = self.discovered.lock().clone();
            if let Some(strikes) = found {
                return Ok(strikes);
            }
            self.pump()?;
        }
    }

    /// Builds the store from `strikes`, waits for metadata on every option and
    /// for the underlying's last price, then lays out the grid around the
    /// strike closest to it.
    pub fn initialize_chain(&self, strikes: BTreeSet<Strike>) -> Result<Strike, InitError> {
        self.expect_phase(InitPhase::Uninitialized)?;
        let expected = strikes.len() * 2;
        self.store.populate(strikes)?;
        self.transition(InitPhase::Uninitialized, InitPhase::AwaitingContractMetadata)?;

        for record in self.store.records() {
            let contract = record.state.lock().contract.clone();
            let request_id = self.gateway.request_contract_metadata(&contract)?;
            tracing::debug!(request_id = request_id.0, key = %record.key, "requested metadata");
        }
        tracing::info!(expected, "waiting for option metadata");
        while self.store.ready_count() < expected {
            self.pump()?;
        }
        tracing::info!(received = self.store.ready_count(), "option metadata complete");

        self.transition(
            InitPhase::AwaitingContractMetadata,
            InitPhase::AwaitingUnderlyingPrice,
        )?;
        self.gateway
            .request_market_data_type(self.session.market_data_type)?;
        let underlying = self.store.underlying_contract();
        self.gateway
            .request_market_data(WireId::UNDERLYING, &underlying)?;
        self.underlying_subscribed.store(true, Ordering::Release);

        let last = loop {
            if let Some(price) = self.store.underlying_field(TickField::Last) {
                break price;
            }
            self.pump()?;
        };

        let strikes = self.store.strikes().ok_or(StoreError::NotPopulated)?;
        let center = closest_strike(strikes, last).ok_or(StoreError::EmptyChain)?;
        self.store.grid().initialize(strikes, center)?;

        self.transition(InitPhase::AwaitingUnderlyingPrice, InitPhase::Ready)?;
        if self
            .ready
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(InitError::Phase {
                expected: InitPhase::AwaitingUnderlyingPrice,
                found: InitPhase::Ready,
            });
        }
        tracing::info!(underlying = last, center = %center, "option chain ready");
        Ok(center)
    }

    /// Subscribes both sides of every strike the grid shows. Returns the
    /// number of subscriptions sent.
    pub fn subscribe_visible(&self) -> Result<usize, InitError> {
        self.expect_phase(InitPhase::Ready)?;

        let mut sent = 0;
        for strike in self.store.grid().visible_strikes() {
            for side in [Side::Call, Side::Put] {
                let record = self.store.record_by_key(&InstrumentKey::new(strike, side))?;
                let contract = record.state.lock().resolved_contract();
                self.gateway.request_market_data(record.wire_id, &contract)?;
                tracing::info!(
                    wire_id = record.wire_id.0,
                    key = %record.key,
                    contract_id = ?contract.contract_id,
                    "requested market data"
                );
                sent += 1;
            }
        }
        Ok(sent)
    }

    /// Cancels whatever has been requested so far: the underlying once its
    /// subscription went out, every instrument wire id once ready. Failures
    /// are logged, not returned: this runs on the way out.
    pub fn cancel_market_data(&self) {
        let underlying = self
            .underlying_subscribed
            .load(Ordering::Acquire)
            .then_some(WireId::UNDERLYING);
        let instruments = self
            .is_ready()
            .then(|| self.store.records().iter().map(|record| record.wire_id))
            .into_iter()
            .flatten();

        let mut cancelled = 0;
        for wire_id in underlying.into_iter().chain(instruments) {
            if let Err(e) = self.gateway.cancel_market_data(wire_id) {
                tracing::warn!(wire_id = wire_id.0, error = %e, "cancel failed");
            }
            cancelled += 1;
        }
        if cancelled > 0 {
            tracing::info!(cancelled, "cancelled market data requests");
        }
    }

    fn pump(&self) -> Result<usize, GatewayError> {
        self.gateway.process_one_batch(self)
    }

    fn expect_phase(&self, expected: InitPhase) -> Result<(), InitError> {
        let found = *self.phase.lock();
        if found != expected {
            return Err(InitError::Phase { expected, found });
        }
        Ok(())
    }

    fn transition(&self, from: InitPhase, to: InitPhase) -> Result<(), InitError> {
        let mut phase = self.phase.lock();
        if *phase != from {
            return Err(InitError::Phase {
                expected: from,
                found: *phase,
            });
        }
        tracing::debug!(from = ?from, to = ?to, "init phase");
        *phase = to;
        Ok(())
    }
}
