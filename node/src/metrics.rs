//! # Prometheus Metrics
//!
//! Counters and gauges for a vault, fed from its committed event stream.
//! Only committed events reach this module, so a rolled-back operation is
//! never counted as a deposit or a liquidity move.
//!
//! All metrics live in a dedicated [`prometheus::Registry`] under the
//! `pulse` prefix.

use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Registry, TextEncoder};

use pulse_contracts::{EventRecord, VaultEvent, VaultState};

/// Holds all Prometheus metric handles for a simulation.
#[derive(Clone)]
pub struct VaultMetrics {
    registry: Registry,
    /// Committed deposits.
    pub deposits_total: IntCounter,
    /// Committed withdrawals.
    pub withdrawals_total: IntCounter,
    /// Base asset paid to the treasury.
    pub treasury_fees_total: IntCounter,
    /// Adds into the pool.
    pub liquidity_added_total: IntCounter,
    /// Removals from the pool.
    pub liquidity_removed_total: IntCounter,
    /// Yield distributions.
    pub yield_distributions_total: IntCounter,
    /// Operations that failed and were rolled back.
    pub failed_operations_total: IntCounter,
    /// Total assets after the last committed step.
    pub total_assets: IntGauge,
    /// Outstanding shares.
    pub share_supply: IntGauge,
    /// Base asset held outside the pool.
    pub idle_balance: IntGauge,
    /// Pool-position units held.
    pub pool_position_units: IntGauge,
    /// Size distribution of deposits, in base units.
    pub deposit_size: Histogram,
}

fn counter(registry: &Registry, name: &str, help: &str) -> Result<IntCounter, prometheus::Error> {
    let metric = IntCounter::new(name, help)?;
    registry.register(Box::new(metric.clone()))?;
    Ok(metric)
}

fn gauge(registry: &Registry, name: &str, help: &str) -> Result<IntGauge, prometheus::Error> {
    let metric = IntGauge::new(name, help)?;
    registry.register(Box::new(metric.clone()))?;
    Ok(metric)
}

impl VaultMetrics {
    /// Creates and registers all metrics.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("pulse".into()), None)?;

        let deposit_size = Histogram::with_opts(
            HistogramOpts::new("deposit_size", "Deposit amounts in base units").buckets(vec![
                1e3, 1e4, 1e5, 1e6, 1e7, 1e8, 1e9,
            ]),
        )?;
        registry.register(Box::new(deposit_size.clone()))?;

        Ok(Self {
            deposits_total: counter(&registry, "deposits_total", "Committed deposits")?,
            withdrawals_total: counter(&registry, "withdrawals_total", "Committed withdrawals")?,
            treasury_fees_total: counter(
                &registry,
                "treasury_fees_total",
                "Base asset paid to the treasury",
            )?,
            liquidity_added_total: counter(
                &registry,
                "liquidity_added_total",
                "Liquidity additions into the pool",
            )?,
            liquidity_removed_total: counter(
                &registry,
                "liquidity_removed_total",
                "Liquidity removals from the pool",
            )?,
            yield_distributions_total: counter(
                &registry,
                "yield_distributions_total",
                "Yield distributions",
            )?,
            failed_operations_total: counter(
                &registry,
                "failed_operations_total",
                "Operations rolled back with an error",
            )?,
            total_assets: gauge(&registry, "total_assets", "Vault total assets in base units")?,
            share_supply: gauge(&registry, "share_supply", "Outstanding vault shares")?,
            idle_balance: gauge(&registry, "idle_balance", "Base asset held outside the pool")?,
            pool_position_units: gauge(
                &registry,
                "pool_position_units",
                "Pool-position units held by the vault",
            )?,
            deposit_size,
            registry,
        })
    }

    /// Counts one committed event.
    pub fn observe(&self, record: &EventRecord) {
        match &record.event {
            VaultEvent::Deposit { amount, .. } => {
                self.deposits_total.inc();
                self.deposit_size.observe(*amount as f64);
            }
            VaultEvent::Withdraw { fee, .. } => {
                self.withdrawals_total.inc();
                self.treasury_fees_total.inc_by(*fee);
            }
            VaultEvent::LiquidityAdded { .. } => self.liquidity_added_total.inc(),
            VaultEvent::LiquidityRemoved { .. } => self.liquidity_removed_total.inc(),
            VaultEvent::YieldDistributed { .. } => self.yield_distributions_total.inc(),
            VaultEvent::VaultCreated { .. }
            | VaultEvent::Deactivated { .. }
            | VaultEvent::ConfigUpdated { .. }
            | VaultEvent::QuoteProvisioned { .. } => {}
        }
    }

    /// Refreshes the gauges from committed state.
    pub fn record_state(&self, state: &VaultState, total_assets: u64) {
        self.total_assets.set(clamp(total_assets));
        self.share_supply.set(clamp(state.share_supply));
        self.idle_balance.set(clamp(state.idle_balance));
        self.pool_position_units.set(clamp(state.pool_position_units));
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// Gauges are `i64`; amounts are `u64`.
fn clamp(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(event: VaultEvent) -> EventRecord {
        EventRecord {
            vault_id: Default::default(),
            sequence: 0,
            at: Utc::now(),
            event,
        }
    }

    #[test]
    fn events_drive_counters() {
        let metrics = VaultMetrics::new().unwrap();
        metrics.observe(&record(VaultEvent::Deposit {
            caller: "alice".into(),
            amount: 1_000_000,
            shares: 1_000_000,
        }));
        metrics.observe(&record(VaultEvent::Withdraw {
            caller: "alice".into(),
            shares: 500_000,
            net_amount: 497_500,
            fee: 2_500,
        }));
        assert_eq!(metrics.deposits_total.get(), 1);
        assert_eq!(metrics.withdrawals_total.get(), 1);
        assert_eq!(metrics.treasury_fees_total.get(), 2_500);

        let text = metrics.encode().unwrap();
        assert!(text.contains("pulse_deposits_total 1"));
        assert!(text.contains("pulse_treasury_fees_total 2500"));
    }
}
