// Per-instrument state. Every record carries its own lock so updates to
// unrelated strikes never contend.
//
// Prices are Option<f64>: None means the gateway has not sent the field yet,
// Some(0.0) is a real zero.

use chain_events::{ContractDescriptor, ContractMetadata, InstrumentKey, TickField, WireId};
use parking_lot::Mutex;

/// Latest bid/ask/last of one contract.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Quote {
    pub bid: Option<f64>,
    pub ask: Option<f64>,
    pub last: Option<f64>,
}

impl Quote {
    #[inline]
    pub fn get(&self, field: TickField) -> Option<f64> {
        match field {
            TickField::Bid => self.bid,
            TickField::Ask => self.ask,
            TickField::Last => self.last,
        }
    }

    #[inline]
    pub fn set(&mut self, field: TickField, price: f64) {
        let slot = match field {
            TickField::Bid => &mut self.bid,
            TickField::Ask => &mut self.ask,
            TickField::Last => &mut self.last,
        };
        *slot = Some(price);
    }
}

/// Mutable part of a record, guarded by the record's lock.
#[derive(Debug)]
pub struct ContractState {
    pub quote: Quote,
    /// What we asked the gateway for.
    pub contract: ContractDescriptor,
    /// What the gateway answered with. `None` until the metadata callback.
    pub metadata: Option<ContractMetadata>,
}

impl ContractState {
    fn new(contract: ContractDescriptor) -> Self {
        Self {
            quote: Quote::default(),
            contract,
            metadata: None,
        }
    }

    /// Descriptor to subscribe with: the gateway's version once known, so it
    /// carries the contract id.
    pub fn resolved_contract(&self) -> ContractDescriptor {
        match &self.metadata {
            Some(meta) => ContractDescriptor {
                contract_id: Some(meta.contract_id),
                ..meta.contract.clone()
            },
            None => self.contract.clone(),
        }
    }
}

#[derive(Debug)]
pub struct InstrumentRecord {
    pub key: InstrumentKey,
    pub wire_id: WireId,
    pub state: Mutex<ContractState>,
}

impl InstrumentRecord {
    pub fn new(key: InstrumentKey, wire_id: WireId, contract: ContractDescriptor) -> Self {
        Self {
            key,
            wire_id,
            state: Mutex::new(ContractState::new(contract)),
        }
    }

    pub fn quote(&self) -> Quote {
        self.state.lock().quote
    }
}

/// The underlying future. Singleton per session, never drawn in the grid.
#[derive(Debug)]
pub struct UnderlyingRecord {
    pub state: Mutex<ContractState>,
}

impl UnderlyingRecord {
    pub fn new(contract: ContractDescriptor) -> Self {
        Self {
            state: Mutex::new(ContractState::new(contract)),
        }
    }

    pub fn quote(&self) -> Quote {
        self.state.lock().quote
    }
}
