//! Rate sparkline widget for inline visualization

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    widgets::Widget,
};

/// Block characters for different rate levels (8 levels)
const BLOCKS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// A sparkline widget showing daily rates, scaled between their minimum and maximum
pub struct RateSparkline<'a> {
    /// Rate for each day, oldest first
    rates: &'a [f64],
    min: f64,
    max: f64,
    /// Style for the sparkline
    style: Style,
    /// Style for the most recent day
    latest_style: Style,
}

impl<'a> RateSparkline<'a> {
    pub fn new(rates: &'a [f64]) -> Self {
        let min = rates.iter().copied().fold(f64::INFINITY, f64::min);
        let max = rates.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Self {
            rates,
            min,
            max,
            style: Style::default().fg(Color::Cyan),
            latest_style: Style::default().fg(Color::Yellow),
        }
    }

    fn rate_to_block(&self, rate: f64) -> char {
        let range = self.max - self.min;
        // A flat series sits mid-height
        if !range.is_finite() || range <= f64::EPSILON {
            return BLOCKS[3];
        }
        let normalized = ((rate - self.min) / range).clamp(0.0, 1.0);
        let index = ((normalized * 7.0).round() as usize).min(7);
        BLOCKS[index]
    }
}

impl<'a> Widget for RateSparkline<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.width == 0 || area.height == 0 {
            return;
        }

        // Keep the most recent days when the area is narrow
        let width = area.width as usize;
        let skip = self.rates.len().saturating_sub(width);
        let last = self.rates.len().saturating_sub(1);

        for (i, rate) in self.rates.iter().enumerate().skip(skip) {
            let x = area.x + (i - skip) as u16;
            let style = if i == last {
                self.latest_style
            } else {
                self.style
            };

            if let Some(cell) = buf.cell_mut((x, area.y)) {
                cell.set_char(self.rate_to_block(*rate)).set_style(style);
            }
        }
    }
}
