//! Basket Vault Pallet
//!
//! Custodial vault that diversifies a base asset into an equal-weight basket.
//!
//! ## Execution model
//! Every mutating entry point first reads the external cost signal. When the cost exceeds the
//! configured threshold the request is parked in the trade queue and the call returns at once;
//! otherwise it executes synchronously. Swaps are routed to the better of a constant-product and a
//! concentrated-liquidity venue and must clear a slippage bound within a short deadline. A swap
//! that cannot settle is not an error for the caller: it becomes a queue entry that a later drain
//! (`process_queue` or the idle hook) retries with a cooldown until it settles or exhausts its
//! retry budget.
//!
//! ## Accounting
//! Depositors hold a base-denominated claim. Deposit and withdrawal fees accrue into a single pool
//! owned by the fee collector. The queue, the ledger and the accrued fees are only ever mutated by
//! the single call holding the execution lock.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub use pallet::*;

pub mod types;
pub use types::*;

mod ledger;
mod queue;
mod rebalance;
mod router;

#[cfg(test)]
pub mod mock;

#[cfg(feature = "runtime-benchmarks")]
mod benchmarking;

pub mod weights;
pub use weights::WeightInfo;

/// Log target for everything the vault reports
pub const LOG_TARGET: &str = "runtime::basket-vault";

#[frame::pallet]
pub mod pallet {
  use super::*;
  use frame::prelude::*;
  use polkadot_sdk::frame_support::{
    PalletId,
    storage::with_storage_layer,
    traits::{EnsureOrigin, fungible, fungibles, tokens::Preservation},
  };
  use polkadot_sdk::sp_runtime::{
    Permill,
    traits::{AccountIdConversion, Zero},
  };
  use primitives::AssetInspector;
  use scale_info::prelude::vec::Vec;

  #[pallet::config]
  pub trait Config: frame_system::Config {
    /// Native currency interface
    type Currency: fungible::Inspect<Self::AccountId, Balance = Balance>
      + fungible::Mutate<Self::AccountId>;

    /// Asset management interface
    type Assets: fungibles::Inspect<Self::AccountId, AssetId = u32, Balance = Balance>
      + fungibles::Mutate<Self::AccountId>;

    /// Constant-product pricing venue
    type ConstantProductVenue: PricingVenue<Self::AccountId, BlockNumberFor<Self>>;

    /// Concentrated-liquidity pricing venue, also the primary source of unit prices
    type ConcentratedVenue: ConcentratedLiquidityVenue<Self::AccountId, BlockNumberFor<Self>>;

    /// External execution cost signal
    type CostOracle: CostOracle;

    /// Origin allowed to replace the portfolio configuration and liquidate the vault
    type AdminOrigin: EnsureOrigin<Self::RuntimeOrigin>;

    /// Origin allowed to trigger rebalances and queue drains
    type KeeperOrigin: EnsureOrigin<Self::RuntimeOrigin>;

    /// Externally managed pause flag
    type PauseSwitch: Get<bool>;

    /// Pallet ID for custody account derivation
    #[pallet::constant]
    type PalletId: Get<PalletId>;

    /// Asset deposits are made and withdrawn in
    #[pallet::constant]
    type BaseAsset: Get<AssetKind>;

    /// Privileged account exempt from deposit fees
    #[pallet::constant]
    type OwnerAccount: Get<Self::AccountId>;

    /// Recipient of accrued fees
    #[pallet::constant]
    type FeeCollector: Get<Self::AccountId>;

    /// Blocks a deferred operation waits before it is eligible again
    #[pallet::constant]
    type RetryCooldown: Get<BlockNumberFor<Self>>;

    /// Blocks a venue has to satisfy the minimum output of a swap
    #[pallet::constant]
    type SwapValidity: Get<BlockNumberFor<Self>>;

    /// Per-basket-asset amount a routed leg has to exceed
    #[pallet::constant]
    type MinMeaningfulUnit: Get<Balance>;

    /// Maximum number of basket assets
    #[pallet::constant]
    type MaxBasketSize: Get<u32>;

    /// Maximum number of pending operations
    #[pallet::constant]
    type MaxQueueLength: Get<u32>;

    /// Entries drained per block by the idle hook
    #[pallet::constant]
    type IdleBatchSize: Get<u32>;

    /// Weight information
    type WeightInfo: WeightInfo;

    /// Helper for benchmarking
    #[cfg(feature = "runtime-benchmarks")]
    type BenchmarkHelper: crate::types::BenchmarkHelper<Self::AccountId>;
  }

  #[pallet::pallet]
  pub struct Pallet<T>(PhantomData<T>);

  pub type QueuedOperationOf<T> =
    QueuedOperation<<T as frame_system::Config>::AccountId, BlockNumberFor<T>>;

  /// Ordered basket of assets the vault allocates across
  #[pallet::storage]
  pub type Basket<T: Config> = StorageValue<_, BoundedVec<AssetKind, T::MaxBasketSize>, ValueQuery>;

  /// Fee rates, thresholds and limits; `None` until configured
  #[pallet::storage]
  pub type Parameters<T: Config> = StorageValue<_, PortfolioParameters, OptionQuery>;

  /// Base-denominated claim of each depositor
  #[pallet::storage]
  pub type DepositorBalances<T: Config> =
    StorageMap<_, Blake2_128Concat, T::AccountId, Balance, ValueQuery>;

  /// Sum of all depositor balances
  #[pallet::storage]
  pub type TotalDeposits<T: Config> = StorageValue<_, Balance, ValueQuery>;

  /// Base-asset fees owed to the fee collector
  #[pallet::storage]
  pub type AccruedFees<T: Config> = StorageValue<_, Balance, ValueQuery>;

  /// Base asset held in escrow for cost-gated deposits that are not credited yet
  #[pallet::storage]
  pub type PendingDeposits<T: Config> = StorageValue<_, Balance, ValueQuery>;

  /// Pending operations. Removal swaps with the last entry, so order is best-effort.
  #[pallet::storage]
  pub type TradeQueue<T: Config> =
    StorageValue<_, BoundedVec<QueuedOperationOf<T>, T::MaxQueueLength>, ValueQuery>;

  /// Identifier handed to the next queued operation
  #[pallet::storage]
  pub type NextOperationId<T: Config> = StorageValue<_, OperationId, ValueQuery>;

  /// Set while a mutating call is in flight
  #[pallet::storage]
  pub type ExecutionLock<T: Config> = StorageValue<_, bool, ValueQuery>;

  #[pallet::event]
  #[pallet::generate_deposit(pub(crate) fn deposit_event)]
  pub enum Event<T: Config> {
    /// Base asset credited to a depositor
    Deposited {
      who: T::AccountId,
      amount: Balance,
      fee: Balance,
      credited: Balance,
    },
    /// Base asset withdrawn; the balance is debited by `amount`, `paid_out` leaves the vault
    Withdrawn {
      who: T::AccountId,
      amount: Balance,
      fee: Balance,
      paid_out: Balance,
    },
    /// Pro-rata basket slice withdrawn in kind
    WithdrawnInKind {
      who: T::AccountId,
      balance: Balance,
      share: Balance,
      fees_accrued: Balance,
    },
    /// Accrued fees paid to the fee collector
    FeesClaimed {
      collector: T::AccountId,
      amount: Balance,
    },
    /// Operation parked in the trade queue
    OperationQueued {
      id: OperationId,
      initiator: T::AccountId,
      kind: OperationKind,
      reason: DeferralReason,
      asset_in: AssetKind,
      asset_out: AssetKind,
      amount_in: Balance,
      next_eligible: BlockNumberFor<T>,
    },
    /// Queued operation pushed back by a cooldown
    OperationRescheduled {
      id: OperationId,
      reason: DeferralReason,
      retry_count: u32,
      next_eligible: BlockNumberFor<T>,
    },
    /// Queued operation settled and removed
    OperationProcessed {
      id: OperationId,
      kind: OperationKind,
      reason: DeferralReason,
    },
    /// Queued operation exhausted its retries and was removed
    OperationPermanentlyFailed {
      id: OperationId,
      initiator: T::AccountId,
      kind: OperationKind,
      retry_count: u32,
    },
    /// One drain pass finished
    BatchProcessed {
      completed: u32,
      dropped: u32,
      rescheduled: u32,
      remaining: u32,
    },
    /// Swap settled on a venue
    SwapExecuted {
      venue: Venue,
      asset_in: AssetKind,
      asset_out: AssetKind,
      amount_in: Balance,
      amount_out: Balance,
    },
    /// Equal-weight rebalance pass finished
    RebalanceCompleted {
      total_value: Balance,
      target_value: Balance,
      legs_executed: u32,
      legs_queued: u32,
      legs_skipped: u32,
    },
    /// Basket sold and the base-asset pool distributed
    LiquidationCompleted {
      pool: Balance,
      distributed: Balance,
      fee_collector_share: Balance,
      dust: Balance,
      legs_queued: u32,
    },
    /// Portfolio configuration replaced
    PortfolioConfigured { basket_size: u32 },
  }

  #[pallet::error]
  pub enum Error<T> {
    /// Amount is zero
    ZeroAmount,
    /// Amount split across the basket is below the minimum meaningful unit
    AmountTooSmall,
    /// Basket size outside of the allowed bounds
    InvalidBasketSize,
    /// Basket lists the same asset twice
    DuplicateBasketAsset,
    /// Base asset cannot be a basket member
    BaseAssetInBasket,
    /// Fee rate above the allowed maximum
    FeeRateTooHigh,
    /// Slippage tolerance above the allowed maximum
    SlippageToleranceTooHigh,
    /// Retry limit must be positive
    InvalidRetryLimit,
    /// Portfolio has not been configured
    NotConfigured,
    /// Action would leave the vault below its minimum operating reserve
    ReserveBreached,
    /// Cost oracle reading is stale or unavailable
    CostOracleUnavailable,
    /// Cost oracle returned a non-positive reading
    InvalidCostReading,
    /// Neither venue can quote the pair
    NoQuoteAvailable,
    /// Executed output below the minimum acceptable output
    SlippageExceeded,
    /// No unit price for a basket asset
    NoPriceAvailable,
    /// Trade queue is at capacity
    QueueFull,
    /// A mutating call is already in flight
    ReentrantCall,
    /// Vault is paused
    EnginePaused,
    /// Withdrawal exceeds the depositor's balance
    InsufficientBalance,
    /// Vault holds too little of the base asset for the payout
    InsufficientLiquidity,
    /// Depositor has no balance
    NothingToWithdraw,
    /// No fees accrued
    NoFeesAccrued,
    /// Arithmetic overflow in calculation
    ArithmeticOverflow,
  }

  impl<T> From<ConfigViolation> for Error<T> {
    fn from(violation: ConfigViolation) -> Self {
      match violation {
        ConfigViolation::BasketSize => Error::<T>::InvalidBasketSize,
        ConfigViolation::DuplicateAsset => Error::<T>::DuplicateBasketAsset,
        ConfigViolation::BaseAssetInBasket => Error::<T>::BaseAssetInBasket,
        ConfigViolation::FeeRate => Error::<T>::FeeRateTooHigh,
        ConfigViolation::SlippageTolerance => Error::<T>::SlippageToleranceTooHigh,
        ConfigViolation::RetryLimit => Error::<T>::InvalidRetryLimit,
      }
    }
  }

  #[pallet::call]
  impl<T: Config> Pallet<T> {
    /// Deposit base asset. Credited and diversified now, or queued when cost is high.
    #[pallet::call_index(0)]
    #[pallet::weight(T::WeightInfo::deposit(T::MaxBasketSize::get()))]
    pub fn deposit(origin: OriginFor<T>, amount: Balance) -> DispatchResult {
      let who = ensure_signed(origin)?;
      Self::ensure_not_paused()?;
      Self::with_execution_lock(|| Self::do_deposit(&who, amount))
    }

    /// Withdraw `amount` of the caller's balance in the base asset, net of the withdrawal fee
    #[pallet::call_index(1)]
    #[pallet::weight(T::WeightInfo::withdraw())]
    pub fn withdraw(origin: OriginFor<T>, amount: Balance) -> DispatchResult {
      let who = ensure_signed(origin)?;
      Self::ensure_not_paused()?;
      Self::with_execution_lock(|| Self::do_withdraw(&who, amount))
    }

    /// Withdraw the caller's whole balance as a pro-rata slice of every basket asset
    #[pallet::call_index(2)]
    #[pallet::weight(T::WeightInfo::withdraw_in_kind(T::MaxBasketSize::get()))]
    pub fn withdraw_in_kind(origin: OriginFor<T>) -> DispatchResult {
      let who = ensure_signed(origin)?;
      Self::ensure_not_paused()?;
      Self::with_execution_lock(|| Self::do_withdraw_in_kind(&who))
    }

    /// Rebalance the basket to equal weights, or queue the request when cost is high
    #[pallet::call_index(3)]
    #[pallet::weight(T::WeightInfo::rebalance(T::MaxBasketSize::get()))]
    pub fn rebalance(origin: OriginFor<T>) -> DispatchResult {
      let who = Self::ensure_keeper(origin)?;
      Self::ensure_not_paused()?;
      Self::with_execution_lock(|| Self::do_rebalance(&who))
    }

    /// Drain up to `limit` settled or dropped entries from the trade queue
    #[pallet::call_index(4)]
    #[pallet::weight(Pallet::<T>::drain_weight(*limit))]
    pub fn process_queue(origin: OriginFor<T>, limit: u32) -> DispatchResultWithPostInfo {
      T::KeeperOrigin::ensure_origin(origin)?;
      Self::ensure_not_paused()?;
      let summary = Self::with_execution_lock(|| Self::process_batch(limit))?;
      Ok(Some(Self::batch_weight(&summary)).into())
    }

    /// Sell the basket and distribute the base-asset pool to every depositor
    #[pallet::call_index(5)]
    #[pallet::weight(T::WeightInfo::liquidate_all(T::MaxBasketSize::get()))]
    pub fn liquidate_all(origin: OriginFor<T>) -> DispatchResult {
      T::AdminOrigin::ensure_origin(origin)?;
      Self::ensure_not_paused()?;
      let initiator = T::OwnerAccount::get();
      Self::with_execution_lock(|| Self::do_liquidate_all(&initiator))
    }

    /// Pay accrued fees to the fee collector
    #[pallet::call_index(6)]
    #[pallet::weight(T::WeightInfo::claim_fees())]
    pub fn claim_fees(origin: OriginFor<T>) -> DispatchResult {
      ensure_signed(origin)?;
      Self::ensure_not_paused()?;
      Self::with_execution_lock(Self::do_claim_fees)
    }

    /// Replace the basket and its parameters after bounds validation (governance only)
    #[pallet::call_index(7)]
    #[pallet::weight(T::WeightInfo::set_portfolio_config(basket.len() as u32))]
    pub fn set_portfolio_config(
      origin: OriginFor<T>,
      basket: BoundedVec<AssetKind, T::MaxBasketSize>,
      params: PortfolioParameters,
    ) -> DispatchResult {
      T::AdminOrigin::ensure_origin(origin)?;
      let config = PortfolioConfig {
        basket: basket.clone().into_inner(),
        params,
      };
      config
        .validate(T::BaseAsset::get())
        .map_err(Error::<T>::from)?;
      Basket::<T>::put(basket);
      Parameters::<T>::put(params);
      Self::deposit_event(Event::PortfolioConfigured {
        basket_size: config.basket_size(),
      });
      Ok(())
    }
  }

  #[pallet::hooks]
  impl<T: Config> Hooks<BlockNumberFor<T>> for Pallet<T> {
    /// Scheduled drain of the trade queue within the leftover block weight
    fn on_idle(_n: BlockNumberFor<T>, remaining_weight: Weight) -> Weight {
      let gate_reads = T::DbWeight::get().reads(2);
      let batch = T::IdleBatchSize::get();
      let drain_weight = Self::drain_weight(batch);
      if batch == 0
        || T::PauseSwitch::get()
        || TradeQueue::<T>::decode_len().unwrap_or(0) == 0
        || !remaining_weight.all_gte(gate_reads.saturating_add(drain_weight))
      {
        return gate_reads;
      }
      let drained: Result<BatchSummary, DispatchError> =
        with_storage_layer(|| Self::with_execution_lock(|| Self::process_batch(batch)));
      match drained {
        Ok(summary) => gate_reads.saturating_add(Self::batch_weight(&summary)),
        Err(error) => {
          log::warn!(target: LOG_TARGET, "idle drain aborted: {:?}", error);
          gate_reads.saturating_add(drain_weight)
        }
      }
    }

    #[cfg(feature = "try-runtime")]
    fn try_state(_n: BlockNumberFor<T>) -> Result<(), polkadot_sdk::sp_runtime::TryRuntimeError> {
      Self::do_try_state()
    }
  }

  impl<T: Config> Pallet<T> {
    /// Custody account of the vault
    pub fn account_id() -> T::AccountId {
      T::PalletId::get().into_account_truncating()
    }

    /// Current validated configuration snapshot
    pub fn portfolio_config() -> Result<PortfolioConfig, DispatchError> {
      let params = Parameters::<T>::get().ok_or(Error::<T>::NotConfigured)?;
      Ok(PortfolioConfig {
        basket: Basket::<T>::get().into_inner(),
        params,
      })
    }

    /// Amount of `asset` held by the vault
    pub fn holdings(asset: AssetKind) -> Balance {
      let vault = Self::account_id();
      match asset.fungibles_id() {
        None => <T::Currency as fungible::Inspect<T::AccountId>>::balance(&vault),
        Some(id) => <T::Assets as fungibles::Inspect<T::AccountId>>::balance(id, &vault),
      }
    }

    pub(crate) fn transfer_asset(
      asset: AssetKind,
      from: &T::AccountId,
      to: &T::AccountId,
      amount: Balance,
      preservation: Preservation,
    ) -> DispatchResult {
      if amount.is_zero() {
        return Ok(());
      }
      match asset.fungibles_id() {
        None => {
          <T::Currency as fungible::Mutate<T::AccountId>>::transfer(
            from,
            to,
            amount,
            preservation,
          )?;
        }
        Some(id) => {
          <T::Assets as fungibles::Mutate<T::AccountId>>::transfer(
            id,
            from,
            to,
            amount,
            preservation,
          )?;
        }
      }
      Ok(())
    }

    /// Validated cost reading; stale or non-positive readings abort the caller.
    pub(crate) fn read_cost() -> Result<u128, DispatchError> {
      let cost = T::CostOracle::current_cost().map_err(|error| {
        log::debug!(target: LOG_TARGET, "cost oracle read failed: {:?}", error);
        Error::<T>::CostOracleUnavailable
      })?;
      ensure!(!cost.is_zero(), Error::<T>::InvalidCostReading);
      Ok(cost)
    }

    /// Base asset held by the vault minus deposits still waiting in escrow
    pub fn free_base() -> Balance {
      Self::holdings(T::BaseAsset::get()).saturating_sub(PendingDeposits::<T>::get())
    }

    pub(crate) fn ensure_reserve(params: &PortfolioParameters) -> DispatchResult {
      ensure!(
        Self::free_base() >= params.min_reserve,
        Error::<T>::ReserveBreached
      );
      Ok(())
    }

    /// Heaviest deferred action a queue entry can replay
    fn replay_weight() -> Weight {
      let basket = T::MaxBasketSize::get();
      T::WeightInfo::rebalance(basket)
        .max(T::WeightInfo::liquidate_all(basket))
        .max(T::WeightInfo::deposit(basket))
    }

    /// Upper bound of a drain pass: every queued entry may be retried once and up to `limit`
    /// deferred actions may be replayed.
    pub fn drain_weight(limit: u32) -> Weight {
      let capacity = T::MaxQueueLength::get();
      T::WeightInfo::process_queue(capacity)
        .saturating_add(Self::replay_weight().saturating_mul(limit.min(capacity) as u64))
    }

    /// Weight actually spent by a finished drain pass
    pub(crate) fn batch_weight(summary: &BatchSummary) -> Weight {
      T::WeightInfo::process_queue(summary.swaps_attempted)
        .saturating_add(Self::replay_weight().saturating_mul(summary.replays_attempted as u64))
    }

    fn ensure_not_paused() -> DispatchResult {
      ensure!(!T::PauseSwitch::get(), Error::<T>::EnginePaused);
      Ok(())
    }

    /// Keeper calls may come from a plain signed origin; queued work is attributed to it.
    fn ensure_keeper(origin: OriginFor<T>) -> Result<T::AccountId, DispatchError> {
      let raw: Result<frame_system::RawOrigin<T::AccountId>, OriginFor<T>> = origin.clone().into();
      let signer = match raw {
        Ok(frame_system::RawOrigin::Signed(who)) => Some(who),
        _ => None,
      };
      T::KeeperOrigin::ensure_origin(origin)?;
      Ok(signer.unwrap_or_else(Self::account_id))
    }

    /// Run `f` as the only mutating invocation in flight. Nested entries fail with
    /// `ReentrantCall`; the lock is released on every exit path.
    pub(crate) fn with_execution_lock<R>(
      f: impl FnOnce() -> Result<R, DispatchError>,
    ) -> Result<R, DispatchError> {
      ensure!(!ExecutionLock::<T>::get(), Error::<T>::ReentrantCall);
      ExecutionLock::<T>::put(true);
      let result = f();
      ExecutionLock::<T>::kill();
      result
    }

    #[cfg(any(test, feature = "try-runtime"))]
    pub fn do_try_state() -> Result<(), DispatchError> {
      let recorded = DepositorBalances::<T>::iter_values()
        .fold(0u128, |acc, balance| acc.saturating_add(balance));
      ensure!(
        recorded == TotalDeposits::<T>::get(),
        "total deposits diverge from depositor balances"
      );
      ensure!(
        !ExecutionLock::<T>::get(),
        "execution lock outlived its invocation"
      );
      ensure!(
        Self::holdings(T::BaseAsset::get()) >= PendingDeposits::<T>::get(),
        "escrowed deposits exceed base holdings"
      );
      let escrowed = TradeQueue::<T>::get()
        .iter()
        .filter(|operation| {
          operation.kind == OperationKind::Deposit && operation.reason == DeferralReason::CostGate
        })
        .fold(0u128, |acc, operation| acc.saturating_add(operation.amount_in));
      ensure!(
        escrowed == PendingDeposits::<T>::get(),
        "escrow diverges from queued deposits"
      );
      let queue = TradeQueue::<T>::get();
      let next_id = NextOperationId::<T>::get();
      ensure!(
        queue.iter().all(|operation| operation.id < next_id),
        "queued operation carries an unassigned id"
      );
      if let Some(params) = Parameters::<T>::get() {
        ensure!(
          queue
            .iter()
            .all(|operation| operation.retry_count <= params.max_retry_attempts),
          "queued operation exceeded the retry limit"
        );
      }
      Ok(())
    }
  }

  /// Genesis portfolio configuration; an empty basket leaves the vault unconfigured
  #[pallet::genesis_config]
  #[derive(frame::prelude::DefaultNoBound)]
  pub struct GenesisConfig<T: Config> {
    pub basket: Vec<AssetKind>,
    pub deposit_fee: Permill,
    pub withdrawal_fee: Permill,
    pub slippage_tolerance: Permill,
    pub cost_threshold: u128,
    pub min_reserve: Balance,
    pub max_retry_attempts: u32,
    #[serde(skip)]
    pub _marker: core::marker::PhantomData<T>,
  }

  #[pallet::genesis_build]
  impl<T: Config> BuildGenesisConfig for GenesisConfig<T> {
    fn build(&self) {
      // Custody account survives zero native balance via provider reference
      frame_system::Pallet::<T>::inc_providers(&Pallet::<T>::account_id());
      if self.basket.is_empty() {
        return;
      }
      let config = PortfolioConfig {
        basket: self.basket.clone(),
        params: PortfolioParameters {
          deposit_fee: self.deposit_fee,
          withdrawal_fee: self.withdrawal_fee,
          slippage_tolerance: self.slippage_tolerance,
          cost_threshold: self.cost_threshold,
          min_reserve: self.min_reserve,
          max_retry_attempts: self.max_retry_attempts,
        },
      };
      config
        .validate(T::BaseAsset::get())
        .expect("Genesis portfolio configuration out of bounds");
      let basket: BoundedVec<AssetKind, T::MaxBasketSize> = config
        .basket
        .clone()
        .try_into()
        .expect("Genesis basket exceeds max basket size");
      Basket::<T>::put(basket);
      Parameters::<T>::put(config.params);
    }
  }
}
