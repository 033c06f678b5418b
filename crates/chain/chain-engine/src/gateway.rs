//! Contract of the external gateway client.
//!
//! The client owns the wire protocol: connection, framing, decoding and
//! request encoding. It runs its own reader thread that pushes every decoded
//! message as a [`GatewayEvent`] into a shared MPMC queue. Consumers either
//! pump that queue from one thread ([`process_one_batch`], used by the
//! initialization barrier) or hand it to the worker pool.

use chain_events::{
    ContractDescriptor, EventHandler, GatewayEvent, RequestId, SecType, WireId, dispatch,
};
use crossbeam_channel::Receiver;

use crate::error::GatewayError;

pub trait Gateway: Send + Sync {
    fn connect(&self, host: &str, port: u16, client_id: i32) -> Result<(), GatewayError>;

    fn disconnect(&self);

    fn is_connected(&self) -> bool;

    /// Consumer end of the decoded event queue. Every clone pops from the
    /// same queue, each event goes to exactly one of them.
    fn events(&self) -> Receiver<GatewayEvent>;

    /// Fire and forget; the answer arrives as `ContractMetadata` events.
    fn request_contract_metadata(
        &self,
        contract: &ContractDescriptor,
    ) -> Result<RequestId, GatewayError>;

    fn request_option_chain_parameters(
        &self,
        symbol: &str,
        exchange: &str,
        sec_type: SecType,
        currency: &str,
        underlying_contract_id: i64,
    ) -> Result<RequestId, GatewayError>;

    fn request_market_data_type(&self, data_type: i32) -> Result<(), GatewayError>;

    /// Subscribes `contract`; its ticks arrive tagged with `wire_id`.
    fn request_market_data(
        &self,
        wire_id: WireId,
        contract: &ContractDescriptor,
    ) -> Result<(), GatewayError>;

    fn cancel_market_data(&self, wire_id: WireId) -> Result<(), GatewayError>;

    /// Blocks for gateway activity and dispatches it on the calling thread.
    fn process_one_batch(&self, handler: &dyn EventHandler) -> Result<usize, GatewayError> {
        process_one_batch(&self.events(), handler)
    }
}

/// Waits for one event, then dispatches it together with whatever was already
/// queued behind it. Returns the number of events dispatched.
///
/// There is no timeout. A connected gateway that never sends anything blocks
/// the caller forever; only a queue with no producers left returns
/// [`GatewayError::Disconnected`].
pub fn process_one_batch<H: EventHandler + ?Sized>(
    events: &Receiver<GatewayEvent>,
    handler: &H,
) -> Result<usize, GatewayError> {
    let first = events.recv().map_err(|_| GatewayError::Disconnected)?;
    dispatch(handler, &first);

    // only what is queued right now, a busy feed must not pin the caller here
    let pending = events.len();
    let mut count = 1;
    for _ in 0..pending {
        match events.try_recv() {
            Ok(event) => {
                dispatch(handler, &event);
                count += 1;
            }
            Err(_) => break,
        }
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chain_events::{ContractMetadata, OptionChainParameters, TickField};
    use crossbeam_channel::unbounded;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Count(AtomicUsize);

    impl EventHandler for Count {
        fn on_contract_metadata(&self, _: RequestId, _: &ContractMetadata) {}
        fn on_error(&self, _: i64, _: i32, _: &str) {}
        fn on_option_chain_parameters(&self, _: &OptionChainParameters) {}
        fn on_tick_price(&self, _: WireId, _: TickField, _: f64) {
            self.0.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn tick(id: u32) -> GatewayEvent {
        GatewayEvent::TickPrice {
            wire_id: WireId(id),
            field: TickField::Bid,
            price: 1.0,
        }
    }

    #[test]
    fn batch_drains_what_is_queued() {
        let (tx, rx) = unbounded();
        for i in 0..5 {
            tx.send(tick(i)).unwrap();
        }
        let handler = Count::default();
        assert_eq!(process_one_batch(&rx, &handler), Ok(5));
        assert_eq!(handler.0.load(Ordering::Relaxed), 5);
        assert!(rx.is_empty());
    }

    #[test]
    fn batch_reports_closed_queue() {
        let (tx, rx) = unbounded::<GatewayEvent>();
        tx.send(tick(1)).unwrap();
        drop(tx);
        let handler = Count::default();
        assert_eq!(process_one_batch(&rx, &handler), Ok(1));
        assert_eq!(
            process_one_batch(&rx, &handler),
            Err(GatewayError::Disconnected)
        );
    }
}
