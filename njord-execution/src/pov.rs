//! Percentage of volume: track a rolling market-volume estimate and emit a
//! slice sized at `target_pov × observed_volume_since_last_tick` per tick,
//! capped by remaining capacity. Ticks with volume below
//! `min_volume_threshold` emit nothing and accrue "debt" that the next
//! non-starved tick may use to catch up (spec §4.H POV).

use crate::{
    conservation::remaining_capacity,
    error::ExecutionError,
    executor::{build_report, drive_slice, ExecutionContext, FillAccumulator},
    slice::Slice,
};
use njord_core::ExecutionReport;
use rust_decimal::Decimal;

pub async fn run_pov(
    ctx: &ExecutionContext,
    target_pov: Decimal,
    min_volume_threshold: Decimal,
    tick_interval_ns: i64,
    observed_volumes: Vec<Decimal>,
    start_ts_ns: i64,
    limit_price: Option<Decimal>,
) -> Result<ExecutionReport, ExecutionError> {
    let mut fills = ctx.subscribe_fills();
    let mut accumulator = FillAccumulator::default();
    let mut slices: Vec<Slice> = Vec::new();
    let mut idx = 0u32;
    let mut debt = Decimal::ZERO;

    for (tick, volume) in observed_volumes.iter().enumerate() {
        let scheduled_ts_ns = start_ts_ns + tick_interval_ns * tick as i64;

        if *volume < min_volume_threshold {
            debt += target_pov * volume;
            continue;
        }

        let target_qty = target_pov * volume + debt;
        debt = Decimal::ZERO;
        let cap = remaining_capacity(ctx.total_qty, accumulator.filled_qty, Decimal::ZERO);
        let qty = target_qty.min(cap);
        if qty <= Decimal::ZERO {
            continue;
        }

        let mut slice = Slice::new(&ctx.execution_id, idx, scheduled_ts_ns, qty, limit_price);
        idx += 1;
        drive_slice(ctx, &mut slice, &mut fills, &mut accumulator).await?;
        slices.push(slice);
    }

    let remaining = remaining_capacity(ctx.total_qty, accumulator.filled_qty, Decimal::ZERO);
    if remaining > Decimal::new(1, 3) {
        let residual_ts = start_ts_ns + tick_interval_ns * observed_volumes.len() as i64;
        let mut residual = Slice::new(&ctx.execution_id, idx, residual_ts, remaining, limit_price);
        residual.residual = true;
        drive_slice(ctx, &mut residual, &mut fills, &mut accumulator).await?;
        slices.push(residual);
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
    fn below_threshold_ticks_accrue_debt_not_slices() {
        let mut debt = Decimal::ZERO;
        let target_pov = dec!(0.1);
        let min_threshold = dec!(5);
        for volume in [dec!(2), dec!(3)] {
            if volume < min_threshold {
                debt += target_pov * volume;
            }
        }
        assert_eq!(debt, dec!(0.5));
    }
}
