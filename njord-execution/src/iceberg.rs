//! Iceberg: keep only a fraction of `total_qty` visible at a time. A
//! replenishment is a fresh child intent through the Risk Engine once the
//! current visible slice has filled past `replenish_threshold` (spec §4.H
//! Iceberg).

use crate::{
    conservation::remaining_capacity,
    error::ExecutionError,
    executor::{build_report, ExecutionContext, FillAccumulator},
    slice::{Slice, SliceStatus},
};
use futures::StreamExt;
use njord_core::ExecutionReport;
use rust_decimal::Decimal;
use tracing::warn;

pub async fn run_iceberg(
    ctx: &ExecutionContext,
    visible_ratio: Decimal,
    replenish_threshold: Decimal,
    limit_price: Decimal,
    start_ts_ns: i64,
) -> Result<ExecutionReport, ExecutionError> {
    let mut fills = ctx.subscribe_fills();
    let mut accumulator = FillAccumulator::default();
    let mut slices: Vec<Slice> = Vec::new();
    let mut idx = 0u32;
    let visible_qty_base = (ctx.total_qty * visible_ratio).max(Decimal::ZERO);

    loop {
        let remaining = remaining_capacity(ctx.total_qty, accumulator.filled_qty, Decimal::ZERO);
        if remaining <= Decimal::ZERO {
            break;
        }
        let qty = visible_qty_base.min(remaining);
        if qty <= Decimal::ZERO {
            break;
        }

        let mut slice = Slice::new(&ctx.execution_id, idx, ctx.clock.now_ns(), qty, Some(limit_price));
        idx += 1;
        ctx.publish_child(&slice).await?;
        slice.status = SliceStatus::Sent;

        let threshold_qty = qty * replenish_threshold;
        loop {
            match fills.next().await {
                Some(Ok(fill)) if fill.intent_id == slice.slice_id => {
                    slice.filled_qty += fill.qty;
                    accumulator.record(&fill);
                    if slice.is_materially_filled() {
                        slice.status = SliceStatus::Filled;
                        break;
                    }
                    if slice.filled_qty >= threshold_qty {
                        slice.status = SliceStatus::PartiallyFilled;
                        break;
                    }
                }
                Some(Ok(_)) => continue,
                Some(Err(err)) => {
                    warn!(%err, "fills.new deserialize error, skipping");
                    continue;
                }
                None => {
                    slice.status = SliceStatus::Cancelled;
                    slices.push(slice);
                    let report = build_report(ctx, &slices, &accumulator, start_ts_ns, Some(ctx.clock.now_ns()));
                    ctx.publish_report(&report).await?;
                    return Ok(report);
                }
            }
        }
        slices.push(slice);
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
    fn visible_qty_capped_by_remaining_capacity() {
        let remaining = remaining_capacity(dec!(10), dec!(9), dec!(0));
        let visible_qty_base = dec!(10) * dec!(0.2);
        assert_eq!(visible_qty_base.min(remaining), dec!(1));
    }
}
