/// Something the display grid can draw text onto.
///
/// Coordinates are grid relative: `row` is a grid row, `col` a character
/// offset from the grid's left edge. Implementations are only ever called
/// with the grid lock held, so they need no locking of their own.
pub trait Surface: Send {
    fn put_str(&mut self, row: u16, col: u16, text: &str);

    /// Makes everything written so far visible.
    fn flush(&mut self) {}
}

/// Character buffer surface. Used headless and in tests.
pub struct MemorySurface {
    lines: Vec<Vec<char>>,
}

impl MemorySurface {
    pub fn new(rows: u16, width: u16) -> Self {
        Self {
            lines: vec![vec![' '; width as usize]; rows as usize],
        }
    }

    pub fn line(&self, row: u16) -> Option<String> {
        self.lines.get(row as usize).map(|l| l.iter().collect())
    }
}

impl Surface for MemorySurface {
    fn put_str(&mut self, row: u16, col: u16, text: &str) {
        let Some(line) = self.lines.get_mut(row as usize) else {
            return;
        };
        for (slot, ch) in line.iter_mut().skip(col as usize).zip(text.chars()) {
            *slot = ch;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_clip_to_buffer() {
        let mut s = MemorySurface::new(2, 6);
        s.put_str(0, 4, "abcd");
        s.put_str(1, 0, "xy");
        s.put_str(5, 0, "ignored");
        assert_eq!(s.line(0).unwrap(), "    ab");
        assert_eq!(s.line(1).unwrap(), "xy    ");
        assert_eq!(s.line(2), None);
    }
}
