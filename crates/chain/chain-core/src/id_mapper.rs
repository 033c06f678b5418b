// Wire ids are dense: options get 1..=2N in ascending strike order, call before
// put. That lets the reverse lookup be a plain Vec indexed by `id - 1` and
// the forward lookup a hash map.
// Both sides are built once and never mutated afterwards.

use std::collections::{BTreeSet, HashMap};

use chain_events::{InstrumentKey, Side, Strike, WireId};

/// Result of resolving a wire id.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WireTarget {
    Underlying,
    Instrument(InstrumentKey),
}

#[derive(Debug, Default)]
pub struct IdMapper {
    by_wire: Vec<InstrumentKey>,
    by_key: HashMap<InstrumentKey, WireId>,
}

impl IdMapper {
    /// Assigns ids in a single pass over the ascending strike set.
    pub fn build(strikes: &BTreeSet<Strike>) -> Self {
        let mut by_wire = Vec::with_capacity(strikes.len() * 2);
        let mut by_key = HashMap::with_capacity(strikes.len() * 2);

        for &strike in strikes {
            for side in [Side::Call, Side::Put] {
                let key = InstrumentKey::new(strike, side);
                by_wire.push(key);
                by_key.insert(key, WireId(by_wire.len() as u32));
            }
        }

        Self { by_wire, by_key }
    }

    #[inline]
    pub fn to_key(&self, wire_id: WireId) -> Option<WireTarget> {
        if wire_id.is_underlying() {
            return Some(WireTarget::Underlying);
        }
        self.by_wire
            .get(wire_id.0 as usize - 1)
            .map(|key| WireTarget::Instrument(*key))
    }

    #[inline]
    pub fn to_wire_id(&self, key: &InstrumentKey) -> Option<WireId> {
        self.by_key.get(key).copied()
    }

    /// Slot of `wire_id` in a dense per-instrument vector.
    #[inline]
    pub(crate) fn slot(&self, wire_id: WireId) -> Option<usize> {
        let slot = (wire_id.0 as usize).checked_sub(1)?;
        (slot < self.by_wire.len()).then_some(slot)
    }

    pub fn len(&self) -> usize {
        self.by_wire.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_wire.is_empty()
    }

    /// All instrument ids in ascending order with their keys.
    pub fn iter(&self) -> impl Iterator<Item = (WireId, InstrumentKey)> + '_ {
        self.by_wire
            .iter()
            .enumerate()
            .map(|(i, key)| (WireId(i as u32 + 1), *key))
    }
}
