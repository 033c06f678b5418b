pub mod display_grid;
pub mod error;
pub mod format;
pub mod id_mapper;
pub mod instrument_record;
pub mod instrument_store;
pub mod strike_search;
pub mod surface;

pub use display_grid::{COLUMN_WIDTH, Column, DisplayGrid, GRID_COLUMNS, GRID_ROWS, GRID_WIDTH};
pub use error::{GridError, StoreError};
pub use format::{format_price, format_strike};
pub use id_mapper::{IdMapper, WireTarget};
pub use instrument_record::{InstrumentRecord, Quote, UnderlyingRecord};
pub use instrument_store::InstrumentStore;
pub use strike_search::closest_strike;
pub use surface::{MemorySurface, Surface};
