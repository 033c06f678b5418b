// InstrumentStore - every per-instrument record plus the underlying.
//
// Layout
// ------
// Wire ids are dense (1..=2N, see id_mapper.rs), so records live in a flat
// Vec indexed by `wire_id - 1`. A tick lookup is one bounds check and one
// index, no hashing. Lookups by (strike, side) go through the mapper first.
//
// The chain is written exactly once (`populate`) and is immutable afterwards,
// so it sits in a OnceLock and readers never take a lock to find a record.
// Only the record itself is locked.
//
// Locking
// -------
//   underlying  : its own mutex, never touches the grid
//   instrument  : one mutex per record
//   grid        : one mutex, taken while the instrument mutex is held
//
// Order is always instrument -> grid. The grid never calls back into the
// store so the reverse order cannot happen. The log sink lock is taken last
// by the tracing call and released before it returns.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use chain_events::{
    ContractDescriptor, ContractMetadata, InstrumentKey, Side, Strike, TickField, WireId,
};

use crate::display_grid::DisplayGrid;
use crate::error::StoreError;
use crate::id_mapper::IdMapper;
use crate::instrument_record::{InstrumentRecord, Quote, UnderlyingRecord};

struct Chain {
    strikes: BTreeSet<Strike>,
    mapper: IdMapper,
    records: Vec<InstrumentRecord>,
}

pub struct InstrumentStore {
    underlying: UnderlyingRecord,
    chain: OnceLock<Chain>,
    grid: Arc<DisplayGrid>,
    ready_counter: AtomicUsize,
}

impl InstrumentStore {
    pub fn new(underlying: ContractDescriptor, grid: Arc<DisplayGrid>) -> Self {
        Self {
            underlying: UnderlyingRecord::new(underlying),
            chain: OnceLock::new(),
            grid,
            ready_counter: AtomicUsize::new(0),
        }
    }

    /// Creates one call and one put record per strike and assigns wire ids.
    /// Option descriptors are derived from the underlying's resolved contract.
    pub fn populate(&self, strikes: BTreeSet<Strike>) -> Result<&IdMapper, StoreError> {
        if strikes.is_empty() {
            return Err(StoreError::EmptyChain);
        }
        if self.chain.get().is_some() {
            return Err(StoreError::AlreadyPopulated);
        }

        let template = self.underlying_contract();
        let mapper = IdMapper::build(&strikes);
        let records = mapper
            .iter()
            .map(|(wire_id, key)| {
                let contract = ContractDescriptor::option_on(&template, key.strike, key.side);
                InstrumentRecord::new(key, wire_id, contract)
            })
            .collect();

        self.chain
            .set(Chain {
                strikes,
                mapper,
                records,
            })
            .map_err(|_| StoreError::AlreadyPopulated)?;

        let chain = self.chain()?;
        tracing::debug!(
            strikes = chain.strikes.len(),
            instruments = chain.records.len(),
            "instrument chain populated"
        );
        Ok(&chain.mapper)
    }

    #[inline]
    fn chain(&self) -> Result<&Chain, StoreError> {
        self.chain.get().ok_or(StoreError::NotPopulated)
    }

    pub fn is_populated(&self) -> bool {
        self.chain.get().is_some()
    }

    pub fn strikes(&self) -> Option<&BTreeSet<Strike>> {
        self.chain.get().map(|c| &c.strikes)
    }

    pub fn mapper(&self) -> Option<&IdMapper> {
        self.chain.get().map(|c| &c.mapper)
    }

    /// All records in wire id order; empty before `populate`.
    pub fn records(&self) -> &[InstrumentRecord] {
        self.chain.get().map_or(&[], |c| c.records.as_slice())
    }

    pub fn instrument_count(&self) -> usize {
        self.records().len()
    }

    pub fn grid(&self) -> &Arc<DisplayGrid> {
        &self.grid
    }

    #[inline]
    pub fn record(&self, wire_id: WireId) -> Result<&InstrumentRecord, StoreError> {
        let chain = self.chain()?;
        let slot = chain
            .mapper
            .slot(wire_id)
            .ok_or(StoreError::UnknownWireId(wire_id))?;
        Ok(&chain.records[slot])
    }

    pub fn record_by_key(&self, key: &InstrumentKey) -> Result<&InstrumentRecord, StoreError> {
        let wire_id = self
            .chain()?
            .mapper
            .to_wire_id(key)
            .ok_or(StoreError::UnknownKey(*key))?;
        self.record(wire_id)
    }

    // ---- underlying ----

    pub fn set_underlying_field(&self, field: TickField, price: f64) {
        let mut state = self.underlying.state.lock();
        state.quote.set(field, price);
        tracing::trace!(field = field.name(), price, "underlying updated");
    }

    pub fn underlying_field(&self, field: TickField) -> Option<f64> {
        self.underlying.quote().get(field)
    }

    pub fn underlying_quote(&self) -> Quote {
        self.underlying.quote()
    }

    pub fn set_underlying_metadata(&self, metadata: ContractMetadata) {
        let mut state = self.underlying.state.lock();
        tracing::debug!(contract_id = metadata.contract_id, "underlying metadata set");
        state.metadata = Some(metadata);
    }

    pub fn underlying_contract(&self) -> ContractDescriptor {
        self.underlying.state.lock().resolved_contract()
    }

    pub fn underlying_contract_id(&self) -> Option<i64> {
        self.underlying
            .state
            .lock()
            .metadata
            .as_ref()
            .map(|m| m.contract_id)
    }

    // ---- instruments ----

    /// Stores a price and redraws the matching grid cell while the record is
    /// still locked, so the grid never shows an older value than the store.
    pub fn set_instrument_field(
        &self,
        wire_id: WireId,
        field: TickField,
        price: f64,
    ) -> Result<(), StoreError> {
        let record = self.record(wire_id)?;
        let mut state = record.state.lock();
        state.quote.set(field, price);
        let drawn = self.grid.write_quote(record.key, field, price);
        tracing::trace!(
            wire_id = wire_id.0,
            key = %record.key,
            field = field.name(),
            price,
            drawn,
            "instrument updated"
        );
        drop(state);
        Ok(())
    }

    pub fn instrument_field(&self, wire_id: WireId, field: TickField) -> Result<Option<f64>, StoreError> {
        Ok(self.record(wire_id)?.quote().get(field))
    }

    pub fn instrument_quote(&self, key: &InstrumentKey) -> Result<Quote, StoreError> {
        Ok(self.record_by_key(key)?.quote())
    }

    /// Returns `true` the first time metadata arrives for `key`, `false` when
    /// it replaces an earlier answer.
    pub fn register_contract_metadata(
        &self,
        key: &InstrumentKey,
        metadata: ContractMetadata,
    ) -> Result<bool, StoreError> {
        let record = self.record_by_key(key)?;
        let mut state = record.state.lock();
        tracing::debug!(
            key = %key,
            contract_id = metadata.contract_id,
            "instrument metadata registered"
        );
        Ok(state.metadata.replace(metadata).is_none())
    }

    /// Descriptor to subscribe `key` with.
    pub fn contract(&self, key: &InstrumentKey) -> Result<ContractDescriptor, StoreError> {
        Ok(self.record_by_key(key)?.state.lock().resolved_contract())
    }

    /// Wire ids of the call and put at `strike`.
    pub fn wire_ids_at(&self, strike: Strike) -> Result<(WireId, WireId), StoreError> {
        let mapper = &self.chain()?.mapper;
        let call = InstrumentKey::new(strike, Side::Call);
        let put = InstrumentKey::new(strike, Side::Put);
        Ok((
            mapper.to_wire_id(&call).ok_or(StoreError::UnknownKey(call))?,
            mapper.to_wire_id(&put).ok_or(StoreError::UnknownKey(put))?,
        ))
    }

    // ---- readiness ----

    /// Counts one received metadata callback, returns the new total.
    pub fn increment_ready_counter(&self) -> usize {
        self.ready_counter.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn ready_count(&self) -> usize {
        self.ready_counter.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display_grid::{Column, GRID_ROWS, GRID_WIDTH};
    use crate::surface::MemorySurface;
    use std::thread;

    fn store(strikes: &[f64]) -> InstrumentStore {
        let grid = Arc::new(DisplayGrid::new(Box::new(MemorySurface::new(
            GRID_ROWS, GRID_WIDTH,
        ))));
        let fut = ContractDescriptor::future("ES", "CME", "USD", "20241220");
        let store = InstrumentStore::new(fut, grid);
        store
            .populate(strikes.iter().map(|p| Strike::from_f64(*p)).collect())
            .unwrap();
        store
    }

    #[test]
    fn two_records_per_strike() {
        let s = store(&[90.0, 100.0, 110.0]);
        assert_eq!(s.instrument_count(), 6);
        for (i, record) in s.records().iter().enumerate() {
            assert_eq!(record.wire_id, WireId(i as u32 + 1));
            let contract = record.state.lock().contract.clone();
            assert_eq!(contract.strike, Some(record.key.strike));
            assert_eq!(contract.side, Some(record.key.side));
            assert_eq!(contract.symbol, "ES");
        }
    }

    #[test]
    fn populate_rules() {
        let s = store(&[100.0]);
        assert_eq!(
            s.populate([Strike::from_f64(1.0)].into_iter().collect()).err(),
            Some(StoreError::AlreadyPopulated)
        );

        let grid = Arc::new(DisplayGrid::new(Box::new(MemorySurface::new(1, 1))));
        let empty = InstrumentStore::new(ContractDescriptor::future("ES", "CME", "USD", "x"), grid);
        assert_eq!(
            empty.populate(BTreeSet::new()).err(),
            Some(StoreError::EmptyChain)
        );
        assert_eq!(
            empty.set_instrument_field(WireId(1), TickField::Bid, 1.0),
            Err(StoreError::NotPopulated)
        );
    }

    #[test]
    fn unknown_wire_id_is_an_error() {
        let s = store(&[100.0]);
        assert_eq!(
            s.set_instrument_field(WireId(3), TickField::Bid, 1.0),
            Err(StoreError::UnknownWireId(WireId(3)))
        );
        assert_eq!(
            s.set_instrument_field(WireId::UNDERLYING, TickField::Bid, 1.0),
            Err(StoreError::UnknownWireId(WireId::UNDERLYING))
        );
    }

    #[test]
    fn field_updates_reach_store_and_grid() {
        let s = store(&[100.0, 110.0]);
        s.grid()
            .initialize(s.strikes().unwrap(), Strike::from_f64(100.0))
            .unwrap();

        let put_100 = WireId(2);
        s.set_instrument_field(put_100, TickField::Last, 2.5).unwrap();
        assert_eq!(s.instrument_field(put_100, TickField::Last), Ok(Some(2.5)));
        assert_eq!(s.instrument_field(put_100, TickField::Bid), Ok(None));

        let row = s.grid().row_of(Strike::from_f64(100.0)).unwrap();
        assert_eq!(s.grid().cell(row, Column::PutLast).unwrap(), "2.50");
    }

    #[test]
    fn underlying_is_separate_and_zero_is_a_price() {
        let s = store(&[100.0]);
        assert_eq!(s.underlying_field(TickField::Last), None);
        s.set_underlying_field(TickField::Last, 0.0);
        assert_eq!(s.underlying_field(TickField::Last), Some(0.0));
        assert_eq!(s.instrument_field(WireId(1), TickField::Last), Ok(None));
    }

    #[test]
    fn metadata_registration_resolves_contract() {
        let s = store(&[100.0]);
        let key = InstrumentKey::new(Strike::from_f64(100.0), Side::Call);
        let contract = s.contract(&key).unwrap();
        assert_eq!(contract.contract_id, None);

        let meta = ContractMetadata {
            contract: contract.clone(),
            contract_id: 1234,
            trading_class: "ES".into(),
            multiplier: "50".into(),
        };
        assert_eq!(s.register_contract_metadata(&key, meta.clone()), Ok(true));
        assert_eq!(s.register_contract_metadata(&key, meta), Ok(false));
        assert_eq!(s.contract(&key).unwrap().contract_id, Some(1234));

        let missing = InstrumentKey::new(Strike::from_f64(105.0), Side::Call);
        assert_eq!(
            s.register_contract_metadata(
                &missing,
                ContractMetadata {
                    contract,
                    contract_id: 1,
                    trading_class: "ES".into(),
                    multiplier: "50".into(),
                }
            ),
            Err(StoreError::UnknownKey(missing))
        );
    }

    /// Concurrent increments from many threads are never lost.
    #[test]
    fn ready_counter_counts_every_increment() {
        let s = store(&[100.0]);
        thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    for _ in 0..1_000 {
                        s.increment_ready_counter();
                    }
                });
            }
        });
        assert_eq!(s.ready_count(), 8_000);
    }

    #[test]
    fn wire_ids_at_strike() {
        let s = store(&[100.0, 110.0]);
        assert_eq!(
            s.wire_ids_at(Strike::from_f64(110.0)),
            Ok((WireId(3), WireId(4)))
        );
        assert!(s.wire_ids_at(Strike::from_f64(120.0)).is_err());
    }
}
