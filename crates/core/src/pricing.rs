//! Cart and order arithmetic.
//!
//! Everything here is pure and uses [`Decimal`] so that `9.00 × 3` is
//! exactly `27.00`. Totals are always recomputed from the lines; callers
//! never adjust a stored total incrementally.

use rust_decimal::Decimal;

/// A priced line: anything with a unit price, a quantity and a stored total.
pub trait Priced {
    fn unit_price(&self) -> Decimal;
    fn quantity(&self) -> i32;
    fn total(&self) -> Decimal;
    fn set_total(&mut self, total: Decimal);
}

/// `unit_price × quantity`.
#[must_use]
pub fn line_total(unit_price: Decimal, quantity: i32) -> Decimal {
    unit_price * Decimal::from(quantity)
}

/// Sum of the stored line totals.
#[must_use]
pub fn cart_total<L: Priced>(lines: &[L]) -> Decimal {
    lines.iter().map(Priced::total).sum()
}

/// Largest quantity a single cart line may hold.
pub const MAX_LINE_QUANTITY: i32 = 999;

/// Quantity used when adding to a cart: anything below one becomes one.
#[must_use]
pub const fn normalize_add_quantity(quantity: i32) -> i32 {
    if quantity < 1 { 1 } else { quantity }
}

/// Quantity of a line after adding `added` to `current`, or `None` when the
/// result would exceed [`MAX_LINE_QUANTITY`].
#[must_use]
pub const fn merge_quantity(current: i32, added: i32) -> Option<i32> {
    match current.checked_add(added) {
        Some(merged) if merged <= MAX_LINE_QUANTITY => Some(merged),
        _ => None,
    }
}

/// Total number of units across `lines`.
#[must_use]
pub fn unit_count<L: Priced>(lines: &[L]) -> i64 {
    lines.iter().map(|l| i64::from(l.quantity())).sum()
}

/// Refresh every line total from its unit price and quantity, then return
/// the new grand total.
pub fn recompute<L: Priced>(lines: &mut [L]) -> Decimal {
    for line in lines.iter_mut() {
        line.set_total(line_total(line.unit_price(), line.quantity()));
    }
    cart_total(lines)
}
