//! Time-weighted average price: N equal slices spread at uniform offsets
//! over `duration` (spec §4.H TWAP). If a slice's deadline passes without a
//! terminal status it's cancelled; a final [`njord_core::ExecutionReport`]
//! is emitted on completion or timeout.

use crate::{
    conservation::default_tolerance,
    error::ExecutionError,
    executor::{build_report, drive_slice, ExecutionContext, FillAccumulator},
    slice::Slice,
};
use njord_core::ExecutionReport;
use rust_decimal::Decimal;

/// Produce `n` equal slices of `total_qty / n`, uniformly spaced over
/// `duration_ns` starting at `start_ts_ns`. The last slice absorbs any
/// rounding remainder so the sum is exactly `total_qty`, mirroring the
/// teacher's slice-quantity generation (last element absorbs the diff).
pub fn plan_twap_slices(
    execution_id: &str,
    total_qty: Decimal,
    n: u32,
    start_ts_ns: i64,
    duration_ns: i64,
    limit_price: Option<Decimal>,
) -> Result<Vec<Slice>, ExecutionError> {
    if n == 0 {
        return Err(ExecutionError::EmptyPlan);
    }
    let n_dec = Decimal::from(n);
    let per_slice = total_qty / n_dec;
    let offset_ns = if n > 1 { duration_ns / i64::from(n - 1) } else { 0 };

    let mut slices = Vec::with_capacity(n as usize);
    let mut allocated = Decimal::ZERO;
    for idx in 0..n {
        let qty = if idx == n - 1 {
            total_qty - allocated
        } else {
            per_slice
        };
        allocated += qty;
        let scheduled_ts_ns = start_ts_ns + offset_ns * i64::from(idx);
        slices.push(Slice::new(execution_id, idx, scheduled_ts_ns, qty, limit_price));
    }
    Ok(slices)
}

pub async fn run_twap(
    ctx: &ExecutionContext,
    mut slices: Vec<Slice>,
    start_ts_ns: i64,
) -> Result<ExecutionReport, ExecutionError> {
    let tol = default_tolerance();
    debug_assert!(crate::conservation::within_conservation_band(
        ctx.total_qty,
        Decimal::ZERO,
        slices.iter().map(|s| s.qty).sum(),
        tol,
    ));

    let mut fills = ctx.subscribe_fills();
    let mut accumulator = FillAccumulator::default();

    for slice in slices.iter_mut() {
        drive_slice(ctx, slice, &mut fills, &mut accumulator).await?;
    }

    let report = build_report(ctx, &slices, &accumulator, start_ts_ns, Some(ctx.clock.now_ns()));
    ctx.publish_report(&report).await?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn plan_twap_produces_equal_slices_summing_to_total() {
        let slices = plan_twap_slices("e1", dec!(10), 4, 0, 3_000_000_000, None).unwrap();
        assert_eq!(slices.len(), 4);
        let sum: Decimal = slices.iter().map(|s| s.qty).sum();
        assert_eq!(sum, dec!(10));
        assert_eq!(slices[0].scheduled_ts_ns, 0);
        assert_eq!(slices[3].scheduled_ts_ns, 3_000_000_000);
    }

    #[test]
    fn plan_twap_rejects_zero_slices() {
        assert!(matches!(plan_twap_slices("e1", dec!(10), 0, 0, 0, None), Err(ExecutionError::EmptyPlan)));
    }

    #[test]
    fn plan_twap_handles_indivisible_quantity() {
        let slices = plan_twap_slices("e1", dec!(10), 3, 0, 0, None).unwrap();
        let sum: Decimal = slices.iter().map(|s| s.qty).sum();
        assert_eq!(sum, dec!(10));
    }
}
