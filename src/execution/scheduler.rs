use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use alloy::primitives::Address;
use metrics::{counter, gauge, histogram};
use rand::Rng;
use tokio::sync::watch;

use crate::chain::contract::DEFAULT_CONTRACT_ADDRESS;
use crate::chain::ChainClient;
use crate::errors::CycleError;
use crate::models::{
    AccountPool, AdvancePolicy, CycleReport, DirectionMode, FundingAccount, FundingRequirement,
    RotationSnapshot, RotationState, TransactionRecord, WorkerAccount,
};

use super::action_executor::ActionExecutor;
use super::funding::FundingPlanner;
use super::gas::{GasEstimator, DEFAULT_PREFUND_GAS_LIMIT};
use super::retry::{with_retry, RetryPolicy};
use super::sampler::{ActionSampler, ActionTemplate, StakeBounds};
use super::state_store::RotationStore;

/// Configuration for the rotation scheduler.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub contract: Address,
    pub template: ActionTemplate,
    pub stake: StakeBounds,
    pub direction_mode: DirectionMode,
    pub advance_policy: AdvancePolicy,
    pub base_interval: Duration,
    /// Stop after this many cycles; `None` runs until shutdown.
    pub max_cycles: Option<u64>,
    pub prefund_gas_limit: u64,
    pub confirmation_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            contract: DEFAULT_CONTRACT_ADDRESS,
            template: ActionTemplate::default(),
            stake: StakeBounds {
                min: 10_000_000_000_000, // 0.00001 ether
                max: 20_000_000_000_000, // 0.00002 ether
            },
            direction_mode: DirectionMode::Alternate,
            advance_policy: AdvancePolicy::Always,
            base_interval: Duration::from_secs(1200),
            max_cycles: None,
            prefund_gas_limit: DEFAULT_PREFUND_GAS_LIMIT,
            confirmation_timeout: Duration::from_secs(120),
            retry: RetryPolicy::default(),
        }
    }
}

/// Drives the rotating pool: one action per cycle, funded on demand.
///
/// Each cycle draws an action, picks the scheduled account (or the first
/// already-funded account after it, or force-funds the scheduled one),
/// estimates gas, executes, then advances the cursor. A failing cycle is
/// logged and abandoned; the scheduler itself keeps running.
pub struct RotationScheduler<C, R> {
    chain: Arc<C>,
    pool: AccountPool,
    config: SchedulerConfig,
    planner: FundingPlanner<C>,
    estimator: GasEstimator<C>,
    executor: ActionExecutor<C>,
    sampler: ActionSampler<R>,
    state: RotationState,
    store: Option<RotationStore>,
    pause_flag: Arc<AtomicBool>,
    status_tx: watch::Sender<RotationSnapshot>,
    last_report: Option<CycleReport>,
}

impl<C: ChainClient, R: Rng> RotationScheduler<C, R> {
    pub fn new(
        chain: Arc<C>,
        pool: AccountPool,
        funder: FundingAccount,
        config: SchedulerConfig,
        rng: R,
    ) -> Self {
        let planner = FundingPlanner::new(
            chain.clone(),
            funder,
            config.retry,
            config.confirmation_timeout,
        );
        let estimator = GasEstimator::new(
            chain.clone(),
            config.contract,
            config.prefund_gas_limit,
            config.retry,
        );
        let executor = ActionExecutor::new(
            chain.clone(),
            config.contract,
            config.retry,
            config.confirmation_timeout,
        );
        let sampler = ActionSampler::new(config.template, config.stake, config.direction_mode, rng);
        let state = RotationState::default();
        let (status_tx, _) = watch::channel(RotationSnapshot {
            state,
            pool_size: pool.len(),
            paused: false,
            last_cycle: None,
        });

        Self {
            chain,
            pool,
            config,
            planner,
            estimator,
            executor,
            sampler,
            state,
            store: None,
            pause_flag: Arc::new(AtomicBool::new(false)),
            status_tx,
            last_report: None,
        }
    }

    /// Resume from a previously saved cursor.
    pub fn with_state(mut self, mut state: RotationState) -> Self {
        if state.current_index >= self.pool.len() {
            state.current_index = 0;
        }
        self.state = state;
        self.publish();
        self
    }

    /// Persist the cursor after every cycle.
    pub fn with_store(mut self, store: RotationStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Share a pause flag with the ops API.
    pub fn with_pause_flag(mut self, pause_flag: Arc<AtomicBool>) -> Self {
        self.pause_flag = pause_flag;
        self
    }

    pub fn pause_flag(&self) -> Arc<AtomicBool> {
        self.pause_flag.clone()
    }

    /// Receiver that sees a fresh [`RotationSnapshot`] at every cycle boundary.
    pub fn subscribe(&self) -> watch::Receiver<RotationSnapshot> {
        self.status_tx.subscribe()
    }

    pub fn state(&self) -> RotationState {
        self.state
    }

    pub fn snapshot(&self) -> RotationSnapshot {
        RotationSnapshot {
            state: self.state,
            pool_size: self.pool.len(),
            paused: self.pause_flag.load(Ordering::Relaxed),
            last_cycle: self.last_report.clone(),
        }
    }

    /// Run cycles until `max_cycles` is reached or `shutdown` turns true.
    ///
    /// Shutdown is only observed between cycles, never in the middle of one.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> RotationState {
        tracing::info!(
            pool_size = self.pool.len(),
            start_index = self.state.current_index,
            cycles_completed = self.state.cycles_completed,
            interval_secs = self.config.base_interval.as_secs(),
            max_cycles = ?self.config.max_cycles,
            direction_mode = %self.config.direction_mode,
            advance_policy = %self.config.advance_policy,
            "Rotation scheduler started"
        );

        loop {
            if *shutdown.borrow() {
                tracing::info!("Shutdown requested, stopping scheduler");
                break;
            }
            if self.limit_reached() {
                tracing::info!(cycles = self.state.cycles_completed, "Max cycles reached");
                break;
            }

            if self.pause_flag.load(Ordering::Relaxed) {
                tracing::info!(index = self.state.current_index, "Scheduler paused, skipping cycle");
                self.publish();
            } else {
                self.run_cycle().await;
                if self.limit_reached() {
                    tracing::info!(cycles = self.state.cycles_completed, "Max cycles reached");
                    break;
                }
            }

            let delay = self.sampler.jittered(self.config.base_interval);
            tracing::debug!(sleep_secs = delay.as_secs_f64(), "Sleeping until next cycle");

            let sleep = tokio::time::sleep(delay);
            tokio::pin!(sleep);
            tokio::select! {
                _ = &mut sleep => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        // Nobody can signal shutdown any more; finish the sleep.
                        (&mut sleep).await;
                    }
                }
            }
        }

        self.state
    }

    /// Run one full cycle: select, fund, estimate, execute, advance, publish.
    pub async fn run_cycle(&mut self) -> CycleReport {
        let started = Instant::now();
        let mut report = CycleReport::new(self.state.cycles_completed, self.state.current_index);

        match self.attempt(&mut report).await {
            Ok(record) => {
                tracing::info!(
                    cycle_id = %report.cycle_id,
                    cycle = report.cycle,
                    scheduled = report.scheduled_index,
                    executed = ?report.executed_index,
                    account = %record.account,
                    failover = report.failover,
                    force_funded = report.force_funded,
                    direction = ?report.direction,
                    stake = ?report.stake,
                    gas_price = ?report.gas_price,
                    gas_estimate = ?report.gas_estimate,
                    tx_hash = %record.tx_hash,
                    block = record.block_number,
                    "Cycle executed"
                );
                report.record = Some(record);
            }
            Err(e) => {
                tracing::warn!(
                    cycle_id = %report.cycle_id,
                    cycle = report.cycle,
                    scheduled = report.scheduled_index,
                    executed = ?report.executed_index,
                    failover = report.failover,
                    direction = ?report.direction,
                    stake = ?report.stake,
                    gas_price = ?report.gas_price,
                    gas_estimate = ?report.gas_estimate,
                    reason = e.reason(),
                    error = %e,
                    "Cycle abandoned"
                );
                counter!("cycles_abandoned_total", "reason" => e.reason()).increment(1);
                report.abandoned = Some(e.reason());
                report.error = Some(e.to_string());
            }
        }

        let advance = self
            .config
            .advance_policy
            .should_advance(report.scheduled_index, report.confirmed_index());
        if !advance {
            tracing::info!(
                index = report.scheduled_index,
                "Failover executed, keeping cursor on scheduled account"
            );
        }
        self.state.complete_cycle(self.pool.len(), advance);

        counter!("cycles_completed_total").increment(1);
        gauge!("rotation_index").set(self.state.current_index as f64);
        histogram!("cycle_duration_seconds").record(started.elapsed().as_secs_f64());

        self.persist().await;
        self.last_report = Some(report.clone());
        self.publish();

        report
    }

    async fn attempt(&mut self, report: &mut CycleReport) -> Result<TransactionRecord, CycleError> {
        let action = self.sampler.draw(report.cycle);
        report.direction = Some(action.direction());
        report.stake = Some(action.stake());

        let chain = &*self.chain;
        let gas_price = with_retry("gas_price", &self.config.retry, move || chain.gas_price())
            .await
            .map_err(|e| e.into_cycle_error("gas_price", |err| CycleError::from_submission("gas_price", err)))?;
        report.gas_price = Some(gas_price);

        let selection = self
            .planner
            .requirement(action.stake(), gas_price, self.config.prefund_gas_limit);
        let scheduled = self.pool.get(report.scheduled_index);
        let account = self.select_account(scheduled, &selection, report).await?;
        report.executed_index = Some(account.index);
        report.account = Some(account.address);

        let quote = self
            .estimator
            .quote(&self.planner, &account, &action, gas_price)
            .await?;
        report.gas_estimate = Some(quote.gas_estimate);

        self.executor.execute(&account, &action, &quote).await
    }

    /// Scheduled account if it already covers `requirement`, else the first
    /// covered account after it in pool order, else the scheduled account
    /// after topping it up.
    async fn select_account(
        &self,
        scheduled: WorkerAccount,
        requirement: &FundingRequirement,
        report: &mut CycleReport,
    ) -> Result<WorkerAccount, CycleError> {
        let balance = self.planner.balance_of(scheduled.address).await?;
        if balance >= requirement.total {
            return Ok(scheduled);
        }

        tracing::debug!(
            index = scheduled.index,
            balance = %balance,
            required = %requirement.total,
            "Scheduled account underfunded, scanning pool"
        );

        for candidate in self.pool.failover_order(scheduled.index) {
            let balance = self.planner.balance_of(candidate.address).await?;
            if balance >= requirement.total {
                tracing::info!(
                    scheduled = scheduled.index,
                    executing = candidate.index,
                    "Failing over to funded account"
                );
                counter!("failovers_total").increment(1);
                report.failover = true;
                return Ok(candidate);
            }
        }

        tracing::info!(index = scheduled.index, "No funded account in pool, force-funding scheduled account");
        self.planner.ensure_funded(&scheduled, requirement).await?;
        counter!("force_funds_total").increment(1);
        report.force_funded = true;
        Ok(scheduled)
    }

    fn limit_reached(&self) -> bool {
        self.config
            .max_cycles
            .is_some_and(|max| self.state.cycles_completed >= max)
    }

    async fn persist(&self) {
        if let Some(store) = &self.store {
            if let Err(e) = store.save(&self.state).await {
                tracing::error!(error = %e, path = %store.path().display(), "Failed to persist rotation state");
            }
        }
    }

    fn publish(&self) {
        self.status_tx.send_replace(self.snapshot());
    }
}
