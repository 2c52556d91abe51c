use crate::{
    error::ExecutionError,
    slice::{Slice, SliceStatus},
};
use futures::StreamExt;
use njord_bus::{Bus, BusSubscription};
use njord_core::{
    client_order_id, CancelRequest, Clock, ExecutionReport, ExecutionStatus, FillEvent, Meta,
    OrderIntent, OrderType, Side,
};
use njord_journal::Journal;
use rust_decimal::Decimal;
use serde_json::json;
use std::sync::Arc;
use tracing::warn;

/// Shared state every execution algorithm publishes through: child intents
/// always go out on `strat.intent`, landing in the Risk Engine exactly like
/// a strategy-originated intent — executors never talk to the Broker
/// Adapter directly (spec §4.H).
pub struct ExecutionContext {
    pub execution_id: String,
    pub strategy_id: String,
    pub symbol: String,
    pub side: Side,
    pub kind: OrderType,
    pub algo_type: &'static str,
    pub total_qty: Decimal,
    pub bus: Bus,
    pub clock: Arc<dyn Clock>,
    pub meta_store: Arc<njord_core::IntentMetaStore>,
    pub report_journal: Journal,
    /// Per-slice deadline, measured from `scheduled_ts_ns`.
    pub slice_timeout_ns: i64,
}

impl ExecutionContext {
    pub async fn publish_child(&self, slice: &Slice) -> Result<(), ExecutionError> {
        let mut meta: Meta = Meta::new();
        meta.insert("execution_id".to_string(), json!(self.execution_id));
        meta.insert("slice_id".to_string(), json!(slice.slice_id));
        meta.insert("algo_type".to_string(), json!(self.algo_type));
        if slice.residual {
            meta.insert("residual".to_string(), json!(true));
        }
        self.meta_store.record(&slice.slice_id, meta.clone());

        let intent = OrderIntent {
            intent_id: slice.slice_id.clone(),
            ts_ns: self.clock.now_ns(),
            strategy_id: self.strategy_id.clone(),
            symbol: self.symbol.clone(),
            side: self.side,
            kind: self.kind,
            qty: slice.qty,
            limit_price: slice.limit_price,
            meta,
        };
        self.bus
            .publish("strat.intent", &intent)
            .await
            .map_err(|e| ExecutionError::Bus(e.to_string()))
    }

    pub async fn publish_cancel(&self, slice: &Slice) -> Result<(), ExecutionError> {
        let cancel = CancelRequest {
            client_order_id: client_order_id(&slice.slice_id),
            intent_id: slice.slice_id.clone(),
            ts_ns: self.clock.now_ns(),
        };
        self.bus
            .publish("orders.cancel", &cancel)
            .await
            .map_err(|e| ExecutionError::Bus(e.to_string()))
    }

    pub async fn publish_report(&self, report: &ExecutionReport) -> Result<(), ExecutionError> {
        self.bus
            .publish("execution.report", report)
            .await
            .map_err(|e| ExecutionError::Bus(e.to_string()))?;
        self.report_journal
            .append(report)
            .await
            .map_err(|e| ExecutionError::Journal(e.to_string()))
    }

    pub fn subscribe_fills(&self) -> BusSubscription<FillEvent> {
        self.bus.subscribe("fills.new")
    }
}

/// Running totals accumulated while slices fill, used to compute
/// `ExecutionReport.avg_fill_price`/`total_fees` without re-deriving them
/// from journal replay.
#[derive(Debug, Default, Clone, Copy)]
pub struct FillAccumulator {
    pub filled_qty: Decimal,
    pub notional: Decimal,
    pub fees: Decimal,
}

impl FillAccumulator {
    pub fn record(&mut self, fill: &FillEvent) {
        self.filled_qty += fill.qty;
        self.notional += fill.qty * fill.price;
        self.fees += fill.fee;
    }

    pub fn avg_price(&self) -> Decimal {
        if self.filled_qty.is_zero() {
            Decimal::ZERO
        } else {
            self.notional / self.filled_qty
        }
    }
}

/// Emit one slice at its schedule point, then wait for either a materially
/// complete fill or the slice deadline, whichever comes first. Slices are
/// driven strictly in order — the schedule order equals the emission order
/// (spec §5 ordering guarantees).
pub async fn drive_slice(
    ctx: &ExecutionContext,
    slice: &mut Slice,
    fills: &mut BusSubscription<FillEvent>,
    accumulator: &mut FillAccumulator,
) -> Result<(), ExecutionError> {
    let now = ctx.clock.now_ns();
    if slice.scheduled_ts_ns > now {
        ctx.clock.sleep(slice.scheduled_ts_ns - now).await;
    }

    ctx.publish_child(slice).await?;
    slice.status = SliceStatus::Sent;

    let deadline_ns = slice.scheduled_ts_ns.max(ctx.clock.now_ns()) + ctx.slice_timeout_ns;

    loop {
        let now = ctx.clock.now_ns();
        if now >= deadline_ns {
            slice.status = SliceStatus::TimedOut;
            ctx.publish_cancel(slice).await?;
            return Ok(());
        }
        let remaining = deadline_ns - now;

        tokio::select! {
            _ = ctx.clock.sleep(remaining) => {
                slice.status = SliceStatus::TimedOut;
                ctx.publish_cancel(slice).await?;
                return Ok(());
            }
            next = fills.next() => {
                match next {
                    Some(Ok(fill)) if fill.intent_id == slice.slice_id => {
                        slice.filled_qty += fill.qty;
                        accumulator.record(&fill);
                        if slice.is_materially_filled() {
                            slice.status = SliceStatus::Filled;
                            return Ok(());
                        }
                        slice.status = SliceStatus::PartiallyFilled;
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(err)) => {
                        warn!(%err, "fills.new deserialize error, skipping");
                        continue;
                    }
                    None => return Ok(()),
                }
            }
        }
    }
}

pub fn report_status(slices: &[Slice]) -> ExecutionStatus {
    if slices.iter().any(|s| s.status == SliceStatus::TimedOut) {
        ExecutionStatus::Failed
    } else if slices.iter().all(|s| s.status == SliceStatus::Filled) {
        ExecutionStatus::Completed
    } else if slices.iter().any(|s| s.status == SliceStatus::Cancelled) {
        ExecutionStatus::Cancelled
    } else {
        ExecutionStatus::Running
    }
}

/// `slices_total`/`slices_completed` exclude residual slices (Open Question
/// resolution 3 in the requirements doc): residual fills still count toward
/// `filled_qty` but the slice itself isn't part of the planned count.
pub fn build_report(
    ctx: &ExecutionContext,
    slices: &[Slice],
    accumulator: &FillAccumulator,
    start_ts_ns: i64,
    end_ts_ns: Option<i64>,
) -> ExecutionReport {
    let planned_slices: Vec<&Slice> = slices.iter().filter(|s| !s.residual).collect();
    ExecutionReport {
        execution_id: ctx.execution_id.clone(),
        symbol: ctx.symbol.clone(),
        total_qty: ctx.total_qty,
        filled_qty: accumulator.filled_qty,
        avg_fill_price: accumulator.avg_price(),
        total_fees: accumulator.fees,
        slices_completed: planned_slices.iter().filter(|s| s.status == SliceStatus::Filled).count() as u32,
        slices_total: planned_slices.len() as u32,
        status: report_status(slices),
        start_ts_ns,
        end_ts_ns,
    }
}
