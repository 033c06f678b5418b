//! Fixed size strike grid.
//!
//! ```text
//! row  0 |  Bid  |  Ask  | Last  | Strike |  Bid  |  Ask  | Last  |   header
//! row  1 |       |       |       |  4925  |       |       |       |
//!  ...
//! row 16 | 12.25 | 12.75 | 12.50 |  5000  | 11.00 | 11.50 | 11.25 |   closest strike
//!  ...
//! row 32 |       |       |       |  5080  |       |       |       |
//! ```
//!
//! The visible window is fixed once by [`DisplayGrid::initialize`]; strikes
//! outside it are tracked by the store but never drawn. Every cell write goes
//! through the one grid lock. Callers holding an instrument lock may write
//! cells; the grid never calls back into the store, which keeps the lock
//! order instrument -> grid.

use std::collections::{BTreeSet, HashMap};
use std::ops::Bound::{Excluded, Unbounded};
use std::sync::OnceLock;

use chain_events::{InstrumentKey, Side, Strike, TickField};
use parking_lot::Mutex;

use crate::error::GridError;
use crate::format::{center_in, format_price, format_strike};
use crate::surface::Surface;

/// Total rows, header included. Odd so the closest strike sits in the middle.
pub const GRID_ROWS: u16 = 33;
pub const GRID_COLUMNS: usize = 7;
pub const GRID_WIDTH: u16 = 70;
pub const COLUMN_WIDTH: u16 = GRID_WIDTH / GRID_COLUMNS as u16;

const HEADER_ROW: u16 = 0;
const CENTER_ROW: u16 = GRID_ROWS / 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Column {
    CallBid = 0,
    CallAsk = 1,
    CallLast = 2,
    Strike = 3,
    PutBid = 4,
    PutAsk = 5,
    PutLast = 6,
}

impl Column {
    pub const ALL: [Column; GRID_COLUMNS] = [
        Column::CallBid,
        Column::CallAsk,
        Column::CallLast,
        Column::Strike,
        Column::PutBid,
        Column::PutAsk,
        Column::PutLast,
    ];

    pub fn for_quote(side: Side, field: TickField) -> Column {
        match (side, field) {
            (Side::Call, TickField::Bid) => Column::CallBid,
            (Side::Call, TickField::Ask) => Column::CallAsk,
            (Side::Call, TickField::Last) => Column::CallLast,
            (Side::Put, TickField::Bid) => Column::PutBid,
            (Side::Put, TickField::Ask) => Column::PutAsk,
            (Side::Put, TickField::Last) => Column::PutLast,
        }
    }

    pub fn header(self) -> &'static str {
        match self {
            Column::CallBid | Column::PutBid => "Bid",
            Column::CallAsk | Column::PutAsk => "Ask",
            Column::CallLast | Column::PutLast => "Last",
            Column::Strike => "Strike",
        }
    }

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

struct Window {
    rows: HashMap<Strike, u16>,
    center: Strike,
}

struct GridInner {
    surface: Box<dyn Surface>,
    cells: Vec<[String; GRID_COLUMNS]>,
}

impl GridInner {
    fn put_cell(&mut self, row: u16, column: Column, text: &str) {
        let Some(cells) = self.cells.get_mut(row as usize) else {
            return;
        };
        cells[column.index()] = text.to_owned();
        let col = column.index() as u16 * COLUMN_WIDTH;
        self.surface
            .put_str(row, col, &center_in(text, COLUMN_WIDTH as usize));
    }
}

pub struct DisplayGrid {
    inner: Mutex<GridInner>,
    window: OnceLock<Window>,
}

impl DisplayGrid {
    pub fn new(surface: Box<dyn Surface>) -> Self {
        Self {
            inner: Mutex::new(GridInner {
                surface,
                cells: vec![Default::default(); GRID_ROWS as usize],
            }),
            window: OnceLock::new(),
        }
    }

    /// Lays out the visible window around `center` and draws the header and
    /// strike labels. Can only succeed once.
    pub fn initialize(&self, strikes: &BTreeSet<Strike>, center: Strike) -> Result<(), GridError> {
        if !strikes.contains(&center) {
            return Err(GridError::CenterNotInChain(center));
        }

        let mut inner = self.inner.lock();
        if self.window.get().is_some() {
            return Err(GridError::AlreadyInitialized);
        }

        let mut rows = HashMap::with_capacity(GRID_ROWS as usize);
        rows.insert(center, CENTER_ROW);
        // successors fill downward to the last row
        for (strike, row) in strikes
            .range((Excluded(center), Unbounded))
            .zip(CENTER_ROW + 1..GRID_ROWS)
        {
            rows.insert(*strike, row);
        }
        // predecessors fill upward, row 0 is the header
        for (strike, row) in strikes
            .range(..center)
            .rev()
            .zip((HEADER_ROW + 1..CENTER_ROW).rev())
        {
            rows.insert(*strike, row);
        }

        for column in Column::ALL {
            inner.put_cell(HEADER_ROW, column, column.header());
        }
        for (strike, row) in &rows {
            inner.put_cell(*row, Column::Strike, &format_strike(*strike));
        }
        inner.surface.flush();

        let visible = rows.len();
        if self.window.set(Window { rows, center }).is_err() {
            return Err(GridError::AlreadyInitialized);
        }
        tracing::info!(center = %center, visible, "display grid initialized");
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.window.get().is_some()
    }

    #[inline]
    pub fn row_of(&self, strike: Strike) -> Option<u16> {
        self.window.get()?.rows.get(&strike).copied()
    }

    pub fn center_strike(&self) -> Option<Strike> {
        self.window.get().map(|w| w.center)
    }

    pub fn window_len(&self) -> usize {
        self.window.get().map_or(0, |w| w.rows.len())
    }

    /// Visible strikes, top row first.
    pub fn visible_strikes(&self) -> Vec<Strike> {
        let Some(window) = self.window.get() else {
            return Vec::new();
        };
        let mut strikes: Vec<(u16, Strike)> =
            window.rows.iter().map(|(s, r)| (*r, *s)).collect();
        strikes.sort_unstable();
        strikes.into_iter().map(|(_, s)| s).collect()
    }

    /// Writes one centered cell and flushes it to the surface.
    pub fn write_cell(&self, row: u16, column: Column, text: &str) {
        let mut inner = self.inner.lock();
        inner.put_cell(row, column, text);
        inner.surface.flush();
    }

    /// Draws a live price for `key`. Returns `false` when the strike is not
    /// in the visible window.
    pub fn write_quote(&self, key: InstrumentKey, field: TickField, price: f64) -> bool {
        let Some(row) = self.row_of(key.strike) else {
            return false;
        };
        self.write_cell(row, Column::for_quote(key.side, field), &format_price(price));
        true
    }

    /// Text last written to a cell, `None` outside the grid.
    pub fn cell(&self, row: u16, column: Column) -> Option<String> {
        let inner = self.inner.lock();
        inner
            .cells
            .get(row as usize)
            .map(|cells| cells[column.index()].clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::MemorySurface;

    fn grid() -> DisplayGrid {
        DisplayGrid::new(Box::new(MemorySurface::new(GRID_ROWS, GRID_WIDTH)))
    }

    fn ladder(from: f64, step: f64, n: usize) -> BTreeSet<Strike> {
        (0..n)
            .map(|i| Strike::from_f64(from + step * i as f64))
            .collect()
    }

    /// 20 strikes centered in the middle of the chain all fit in the
    /// 32 usable rows, and the center row holds the closest strike.
    #[test]
    fn window_holds_whole_small_chain() {
        let strikes = ladder(100.0, 5.0, 20);
        let center = Strike::from_f64(150.0);
        let g = grid();
        g.initialize(&strikes, center).unwrap();

        assert_eq!(g.window_len(), 20.min(GRID_ROWS as usize - 1));
        assert_eq!(g.row_of(center), Some(CENTER_ROW));
        assert_eq!(g.cell(CENTER_ROW, Column::Strike).unwrap(), "150");
        assert_eq!(g.row_of(Strike::from_f64(145.0)), Some(CENTER_ROW - 1));
        assert_eq!(g.row_of(Strike::from_f64(155.0)), Some(CENTER_ROW + 1));
        assert_eq!(g.center_strike(), Some(center));
    }

    /// A long chain is cut at the row limits: 15 strikes above the center
    /// (rows 1..=15) and 16 below (rows 17..=32).
    #[test]
    fn window_clips_long_chain() {
        let strikes = ladder(4000.0, 5.0, 400);
        let center = Strike::from_f64(5000.0);
        let g = grid();
        g.initialize(&strikes, center).unwrap();

        assert_eq!(g.window_len(), GRID_ROWS as usize - 1);
        let visible = g.visible_strikes();
        assert_eq!(visible.first(), Some(&Strike::from_f64(4925.0)));
        assert_eq!(visible.last(), Some(&Strike::from_f64(5080.0)));
        assert_eq!(g.row_of(Strike::from_f64(4925.0)), Some(1));
        assert_eq!(g.row_of(Strike::from_f64(5080.0)), Some(GRID_ROWS - 1));
        assert_eq!(g.row_of(Strike::from_f64(4920.0)), None);
        assert_eq!(g.row_of(Strike::from_f64(5085.0)), None);
    }

    /// Center at the bottom of the chain: nothing above, successors only.
    #[test]
    fn window_at_chain_edge() {
        let strikes = ladder(100.0, 10.0, 3);
        let g = grid();
        g.initialize(&strikes, Strike::from_f64(100.0)).unwrap();
        assert_eq!(g.window_len(), 3);
        assert_eq!(
            g.visible_strikes(),
            vec![
                Strike::from_f64(100.0),
                Strike::from_f64(110.0),
                Strike::from_f64(120.0)
            ]
        );
        assert_eq!(g.row_of(Strike::from_f64(120.0)), Some(CENTER_ROW + 2));
    }

    #[test]
    fn header_and_quotes() {
        let strikes = ladder(100.0, 10.0, 2);
        let g = grid();
        g.initialize(&strikes, Strike::from_f64(110.0)).unwrap();
        assert_eq!(g.cell(0, Column::Strike).unwrap(), "Strike");
        assert_eq!(g.cell(0, Column::PutLast).unwrap(), "Last");

        let put = InstrumentKey::new(Strike::from_f64(100.0), Side::Put);
        assert!(g.write_quote(put, TickField::Ask, 1.5));
        assert_eq!(g.cell(CENTER_ROW - 1, Column::PutAsk).unwrap(), "1.50");

        let hidden = InstrumentKey::new(Strike::from_f64(90.0), Side::Call);
        assert!(!g.write_quote(hidden, TickField::Bid, 2.0));
    }

    #[test]
    fn initialize_only_once_and_needs_known_center() {
        let strikes = ladder(100.0, 10.0, 2);
        let g = grid();
        assert_eq!(
            g.initialize(&strikes, Strike::from_f64(105.0)),
            Err(GridError::CenterNotInChain(Strike::from_f64(105.0)))
        );
        assert!(!g.is_initialized());
        g.initialize(&strikes, Strike::from_f64(100.0)).unwrap();
        assert_eq!(
            g.initialize(&strikes, Strike::from_f64(110.0)),
            Err(GridError::AlreadyInitialized)
        );
        assert_eq!(g.center_strike(), Some(Strike::from_f64(100.0)));
    }

    #[test]
    fn uninitialized_grid_draws_nothing() {
        let g = grid();
        let key = InstrumentKey::new(Strike::from_f64(100.0), Side::Call);
        assert!(!g.write_quote(key, TickField::Last, 3.0));
        assert!(g.visible_strikes().is_empty());
        assert_eq!(g.cell(GRID_ROWS, Column::Strike), None);
    }
}
