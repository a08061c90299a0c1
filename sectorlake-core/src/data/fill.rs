//! Forward fill for the in-progress period.
//!
//! Last observation carried forward, per field, over open/high/low/close/
//! volume. Dividends and splits are events and are never filled. Values
//! before the first observation of a field stay `NaN`. With `limit = Some(n)`
//! at most `n` consecutive gaps per field are filled; the rest stay `NaN`.

use crate::domain::PriceBar;

#[derive(Debug, Default, Clone, Copy)]
struct FieldFill {
    last: Option<f64>,
    gap: usize,
}

impl FieldFill {
    fn apply(&mut self, value: &mut f64, limit: Option<usize>) {
        if !value.is_nan() {
            self.last = Some(*value);
            self.gap = 0;
            return;
        }
        self.gap += 1;
        if let Some(last) = self.last {
            if limit.map_or(true, |n| self.gap <= n) {
                *value = last;
            }
        }
    }
}

/// Fill missing quote fields from the prior bar. Bars keep their order.
pub fn forward_fill(mut bars: Vec<PriceBar>, limit: Option<usize>) -> Vec<PriceBar> {
    let mut state = [FieldFill::default(); 5];
    for bar in &mut bars {
        for (fill, value) in state.iter_mut().zip(bar.quote_fields_mut()) {
            fill.apply(value, limit);
        }
    }
    bars
}
