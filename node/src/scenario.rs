//! # Scenario Runner
//!
//! Replays a JSON-described sequence of vault operations against a fresh
//! in-memory host: one ledger, one seeded constant-product pool, one
//! factory, one vault.
//!
//! ```json
//! {
//!   "factory": { "owner": "owner", "treasury": "treasury", "quote_asset": "USDC" },
//!   "base":  { "id": "EVT",  "decimals": 6 },
//!   "quote": { "id": "USDC", "decimals": 6 },
//!   "pool":  { "base_reserve": 10000000, "quote_reserve": 5000000 },
//!   "vault": { "base_asset": "EVT", "event_id": 1, "name": "Finals", "symbol": "vFIN" },
//!   "quote_inventory": 1000000,
//!   "accounts": [ { "address": "alice", "base": 1000000 } ],
//!   "steps": [ { "action": "deposit", "caller": "alice", "amount": 1000000 } ]
//! }
//! ```
//!
//! Each step is its own unit of work. A failing step is reported and the
//! run moves on to the next one.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use pulse_contracts::{FactoryConfig, PoolBinding, VaultFactory, VaultHandle, VaultParams, VaultState};
use pulse_protocol::clock::ManualClock;
use pulse_protocol::ledger::{AssetInfo, AssetLedger, InMemoryLedger};
use pulse_protocol::pool::{AddLiquidityRequest, ConstantProductPool, PoolRouter};
use pulse_protocol::types::{Address, Amount, AssetId, Bps};

use crate::metrics::VaultMetrics;

/// Mints every seeded asset.
const ISSUER: &str = "issuer";
/// Provides the pool's initial liquidity.
const SEEDER: &str = "seeder";
/// The pool's ledger account.
const POOL_ADDRESS: &str = "pool";

// ---------------------------------------------------------------------------
// Scenario file
// ---------------------------------------------------------------------------

/// A complete simulation description.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Factory-wide settings; also names the quote asset.
    pub factory: FactoryConfig,
    /// The vault's deposit asset.
    pub base: AssetSpec,
    /// The pairing asset. Its id must equal `factory.quote_asset`.
    pub quote: AssetSpec,
    /// Initial pool reserves.
    pub pool: PoolSeed,
    /// Parameters of the one vault created.
    pub vault: VaultParams,
    /// Quote asset the owner provisions right after creation.
    #[serde(default)]
    pub quote_inventory: Amount,
    /// Accounts funded before the first step.
    #[serde(default)]
    pub accounts: Vec<AccountSeed>,
    /// Simulated start time; defaults to the wall clock.
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,
    /// What happens, in order.
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetSpec {
    pub id: AssetId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_decimals")]
    pub decimals: u8,
}

fn default_decimals() -> u8 {
    6
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolSeed {
    pub base_reserve: Amount,
    pub quote_reserve: Amount,
    #[serde(default)]
    pub swap_fee_bps: Option<Bps>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountSeed {
    pub address: Address,
    #[serde(default)]
    pub base: Amount,
    #[serde(default)]
    pub quote: Amount,
}

/// One scenario step. Owner-only steps run as `factory.owner`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    /// Approve the vault and deposit.
    Deposit { caller: Address, amount: Amount },
    /// Withdraw `shares`, or the caller's whole balance when omitted.
    Withdraw {
        caller: Address,
        #[serde(default)]
        shares: Option<Amount>,
    },
    /// Trade against the pool directly, moving its price.
    Swap {
        trader: Address,
        asset_in: AssetId,
        amount: Amount,
    },
    Rebalance,
    DistributeYield,
    /// Move the simulated clock forward.
    Advance { seconds: i64 },
    Deactivate,
    SetTargetAllocation { bps: Bps },
}

impl Step {
    fn name(&self) -> &'static str {
        match self {
            Step::Deposit { .. } => "deposit",
            Step::Withdraw { .. } => "withdraw",
            Step::Swap { .. } => "swap",
            Step::Rebalance => "rebalance",
            Step::DistributeYield => "distribute_yield",
            Step::Advance { .. } => "advance",
            Step::Deactivate => "deactivate",
            Step::SetTargetAllocation { .. } => "set_target_allocation",
        }
    }
}

/// Reads and parses a scenario file.
pub fn load_scenario(path: &Path) -> Result<Scenario> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read scenario {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse scenario {}", path.display()))
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// How one step went.
#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub index: usize,
    pub action: &'static str,
    pub ok: bool,
    pub detail: String,
}

/// Summary of a finished run.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub steps: Vec<StepReport>,
    pub events: usize,
    pub total_assets: Amount,
    pub share_price: Amount,
    pub state: VaultState,
}

impl SimulationReport {
    pub fn failed_steps(&self) -> usize {
        self.steps.iter().filter(|s| !s.ok).count()
    }
}

// ---------------------------------------------------------------------------
// Simulation
// ---------------------------------------------------------------------------

/// The in-memory world a scenario runs in.
pub struct Simulation {
    ledger: Arc<InMemoryLedger>,
    clock: Arc<ManualClock>,
    pool: Arc<ConstantProductPool>,
    vault: VaultHandle,
    owner: Address,
}

impl Simulation {
    /// Builds the ledger, seeds the pool and accounts, and creates the vault.
    pub fn build(scenario: &Scenario) -> Result<Self> {
        if scenario.quote.id != scenario.factory.quote_asset {
            return Err(anyhow!(
                "quote asset {} does not match factory quote asset {}",
                scenario.quote.id,
                scenario.factory.quote_asset
            ));
        }
        let ledger = Arc::new(InMemoryLedger::new());
        let clock = Arc::new(ManualClock::new(scenario.start.unwrap_or_else(Utc::now)));
        let issuer = Address::from(ISSUER);

        for spec in [&scenario.base, &scenario.quote] {
            let name = spec.name.clone().unwrap_or_else(|| spec.id.to_string());
            ledger
                .register_asset(
                    AssetInfo::new(spec.id.clone(), name, spec.id.to_string(), spec.decimals),
                    issuer.clone(),
                )
                .with_context(|| format!("failed to register {}", spec.id))?;
        }

        let mut pool = ConstantProductPool::new(
            ledger.clone(),
            clock.clone(),
            POOL_ADDRESS.into(),
            scenario.base.id.clone(),
            scenario.quote.id.clone(),
        )
        .context("failed to create pool")?;
        if let Some(fee) = scenario.pool.swap_fee_bps {
            pool = pool.with_swap_fee(fee);
        }
        let pool = Arc::new(pool);
        seed_pool(&ledger, &pool, scenario)?;

        for account in &scenario.accounts {
            mint(&ledger, &scenario.base.id, &account.address, account.base)?;
            mint(&ledger, &scenario.quote.id, &account.address, account.quote)?;
        }

        let owner = scenario.factory.owner.clone();
        let mut factory = VaultFactory::new(
            scenario.factory.clone(),
            ledger.clone(),
            ledger.clone(),
            clock.clone(),
        )
        .context("failed to create factory")?;
        let vault = factory
            .create_vault(
                &owner,
                scenario.vault.clone(),
                PoolBinding::from_pool(pool.clone()),
            )
            .context("failed to create vault")?;

        if scenario.quote_inventory > 0 {
            mint(&ledger, &scenario.quote.id, &owner, scenario.quote_inventory)?;
            let mut guard = vault.lock();
            ledger.approve(
                &scenario.quote.id,
                &owner,
                guard.address(),
                scenario.quote_inventory,
            )?;
            guard
                .provision_quote(&owner, scenario.quote_inventory)
                .context("failed to provision quote inventory")?;
        }

        Ok(Self {
            ledger,
            clock,
            pool,
            vault,
            owner,
        })
    }

    /// The vault under simulation.
    pub fn vault(&self) -> &VaultHandle {
        &self.vault
    }

    /// Executes one step. Errors are the step's own failure, not the run's.
    pub fn run_step(&self, step: &Step) -> Result<String> {
        match step {
            Step::Deposit { caller, amount } => {
                let mut vault = self.vault.lock();
                let base = vault.state().base_asset.clone();
                self.ledger.approve(&base, caller, vault.address(), *amount)?;
                let shares = vault.deposit(caller, *amount)?;
                Ok(format!("{} deposited {}, minted {} shares", caller, amount, shares))
            }
            Step::Withdraw { caller, shares } => {
                let mut vault = self.vault.lock();
                let shares = match shares {
                    Some(shares) => *shares,
                    None => self
                        .ledger
                        .balance_of(&vault.state().share_asset, caller),
                };
                let receipt = vault.withdraw(caller, shares)?;
                Ok(format!(
                    "{} burned {} shares for {} (fee {})",
                    caller, receipt.shares, receipt.net, receipt.fee
                ))
            }
            Step::Swap {
                trader,
                asset_in,
                amount,
            } => {
                let out = self.pool.swap(trader, asset_in, *amount, 0)?;
                Ok(format!("{} swapped {} {} for {}", trader, amount, asset_in, out))
            }
            Step::Rebalance => {
                let action = self.vault.lock().rebalance(&self.owner)?;
                Ok(format!("{:?}", action))
            }
            Step::DistributeYield => {
                let amount = self.vault.lock().distribute_yield(&self.owner)?;
                Ok(format!("reinvested {}", amount))
            }
            Step::Advance { seconds } => {
                let now = Duration::try_seconds(*seconds)
                    .and_then(|by| self.clock.advance(by))
                    .ok_or_else(|| anyhow!("cannot advance the clock by {}s", seconds))?;
                Ok(format!("clock advanced {}s to {}", seconds, now))
            }
            Step::Deactivate => {
                self.vault.lock().deactivate(&self.owner)?;
                Ok("vault deactivated".to_string())
            }
            Step::SetTargetAllocation { bps } => {
                self.vault.lock().set_target_allocation(&self.owner, *bps)?;
                Ok(format!("target allocation set to {} bps", bps))
            }
        }
    }
}

fn mint(ledger: &InMemoryLedger, asset: &AssetId, to: &Address, amount: Amount) -> Result<()> {
    if amount > 0 {
        ledger
            .mint(asset, &Address::from(ISSUER), to, amount)
            .with_context(|| format!("failed to fund {} with {} {}", to, amount, asset))?;
    }
    Ok(())
}

fn seed_pool(ledger: &InMemoryLedger, pool: &ConstantProductPool, scenario: &Scenario) -> Result<()> {
    let seed = &scenario.pool;
    if seed.base_reserve == 0 && seed.quote_reserve == 0 {
        return Ok(());
    }
    let seeder = Address::from(SEEDER);
    let (base, quote) = (&scenario.base.id, &scenario.quote.id);
    mint(ledger, base, &seeder, seed.base_reserve)?;
    mint(ledger, quote, &seeder, seed.quote_reserve)?;
    ledger.approve(base, &seeder, pool.address(), seed.base_reserve)?;
    ledger.approve(quote, &seeder, pool.address(), seed.quote_reserve)?;
    pool.add_liquidity(&AddLiquidityRequest {
        asset_a: base.clone(),
        asset_b: quote.clone(),
        amount_a_desired: seed.base_reserve,
        amount_b_desired: seed.quote_reserve,
        amount_a_min: 0,
        amount_b_min: 0,
        provider: seeder.clone(),
        recipient: seeder,
        deadline: pool.deadline_in(60),
    })
    .context("failed to seed pool")?;
    Ok(())
}

/// Runs every step, writing committed events to `out` as JSON lines.
pub fn run(scenario: &Scenario, out: &mut dyn Write, metrics: &VaultMetrics) -> Result<SimulationReport> {
    let simulation = Simulation::build(scenario)?;
    let mut events = publish(&simulation, out, metrics)?;
    let mut steps = Vec::with_capacity(scenario.steps.len());

    for (index, step) in scenario.steps.iter().enumerate() {
        let outcome = simulation.run_step(step);
        let report = match outcome {
            Ok(detail) => {
                tracing::info!(index, action = step.name(), %detail, "step committed");
                StepReport {
                    index,
                    action: step.name(),
                    ok: true,
                    detail,
                }
            }
            Err(err) => {
                metrics.failed_operations_total.inc();
                tracing::warn!(index, action = step.name(), error = %err, "step failed");
                StepReport {
                    index,
                    action: step.name(),
                    ok: false,
                    detail: err.to_string(),
                }
            }
        };
        steps.push(report);
        events += publish(&simulation, out, metrics)?;
    }

    let vault = simulation.vault().lock();
    Ok(SimulationReport {
        steps,
        events,
        total_assets: vault.total_assets()?,
        share_price: vault.share_price()?,
        state: vault.state().clone(),
    })
}

/// Drains committed events to `out` and the metrics. Returns how many.
fn publish(simulation: &Simulation, out: &mut dyn Write, metrics: &VaultMetrics) -> Result<usize> {
    let mut vault = simulation.vault().lock();
    let records = vault.drain_events();
    for record in &records {
        serde_json::to_writer(&mut *out, record).context("failed to write event")?;
        writeln!(out)?;
        metrics.observe(record);
    }
    metrics.record_state(vault.state(), vault.total_assets()?);
    Ok(records.len())
}
