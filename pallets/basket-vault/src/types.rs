use codec::{Decode, DecodeWithMemTracking, Encode, MaxEncodedLen};
use polkadot_sdk::sp_core::U256;
use polkadot_sdk::sp_runtime::{DispatchError, PerThing, Permill};
use primitives::params::{MAX_BASKET_SIZE, MAX_FEE_RATE, MAX_SLIPPAGE_TOLERANCE, MIN_BASKET_SIZE};
use scale_info::TypeInfo;
use scale_info::prelude::vec::Vec;

// Re-export AssetKind from primitives as the single source of truth
pub use primitives::AssetKind;
pub use primitives::ecosystem::Balance;

/// Monotonic identifier assigned to every queued operation
pub type OperationId = u64;

/// Pricing venue families the router compares
#[derive(
  Clone, Copy, Debug, Decode, DecodeWithMemTracking, Encode, Eq, PartialEq, TypeInfo, MaxEncodedLen,
)]
pub enum Venue {
  /// Constant-product (x * y = k) pool
  ConstantProduct,
  /// Concentrated-liquidity pool
  ConcentratedLiquidity,
}

/// Flow that created a queued operation
#[derive(
  Clone, Copy, Debug, Decode, DecodeWithMemTracking, Encode, Eq, PartialEq, TypeInfo, MaxEncodedLen,
)]
pub enum OperationKind {
  Deposit,
  Rebalance,
  Liquidation,
}

/// Why an operation sits in the queue
#[derive(
  Clone, Copy, Debug, Decode, DecodeWithMemTracking, Encode, Eq, PartialEq, TypeInfo, MaxEncodedLen,
)]
pub enum DeferralReason {
  /// Execution cost exceeded the threshold when the operation was requested
  CostGate,
  /// A routed swap could not be executed within its slippage bound or deadline
  SlippageFailure,
}

/// Cost gate decision
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ExecutionPath {
  Immediate,
  Deferred,
}

impl ExecutionPath {
  /// Defer when the current cost strictly exceeds the threshold.
  pub fn decide(current_cost: u128, threshold: u128) -> Self {
    if current_cost > threshold {
      ExecutionPath::Deferred
    } else {
      ExecutionPath::Immediate
    }
  }
}

/// Pending operation with retry metadata.
///
/// `next_eligible` is always set to `now + cooldown` on deferral, so it never decreases for a
/// given entry. `retry_count` only moves when an attempt actually fails.
#[derive(
  Clone, Debug, Decode, DecodeWithMemTracking, Encode, Eq, PartialEq, TypeInfo, MaxEncodedLen,
)]
pub struct QueuedOperation<AccountId, BlockNumber> {
  pub id: OperationId,
  pub initiator: AccountId,
  pub asset_in: AssetKind,
  pub asset_out: AssetKind,
  pub amount_in: Balance,
  pub kind: OperationKind,
  pub retry_count: u32,
  pub next_eligible: BlockNumber,
  pub reason: DeferralReason,
}

/// Result of routing one swap leg
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SwapOutcome {
  /// Swap settled, carrying the amount received
  Executed(Balance),
  /// Execution failed and the leg was deferred onto the queue
  Queued(OperationId),
}

/// Scalar portfolio parameters owned by governance and read by the core
#[derive(
  Clone,
  Copy,
  Debug,
  Decode,
  DecodeWithMemTracking,
  Default,
  Encode,
  Eq,
  PartialEq,
  TypeInfo,
  MaxEncodedLen,
)]
pub struct PortfolioParameters {
  pub deposit_fee: Permill,
  pub withdrawal_fee: Permill,
  pub slippage_tolerance: Permill,
  pub cost_threshold: u128,
  pub min_reserve: Balance,
  pub max_retry_attempts: u32,
}

/// Validated snapshot of the basket and its parameters
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PortfolioConfig {
  pub basket: Vec<AssetKind>,
  pub params: PortfolioParameters,
}

/// Configuration bound violations detected at the update boundary
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConfigViolation {
  BasketSize,
  DuplicateAsset,
  BaseAssetInBasket,
  FeeRate,
  SlippageTolerance,
  RetryLimit,
}

impl PortfolioConfig {
  pub fn basket_size(&self) -> u32 {
    self.basket.len() as u32
  }

  pub fn validate(&self, base_asset: AssetKind) -> Result<(), ConfigViolation> {
    let size = self.basket_size();
    if !(MIN_BASKET_SIZE..=MAX_BASKET_SIZE).contains(&size) {
      return Err(ConfigViolation::BasketSize);
    }
    if self.basket.contains(&base_asset) {
      return Err(ConfigViolation::BaseAssetInBasket);
    }
    let mut sorted = self.basket.clone();
    sorted.sort();
    if sorted.windows(2).any(|pair| pair[0] == pair[1]) {
      return Err(ConfigViolation::DuplicateAsset);
    }
    if self.params.deposit_fee > MAX_FEE_RATE || self.params.withdrawal_fee > MAX_FEE_RATE {
      return Err(ConfigViolation::FeeRate);
    }
    if self.params.slippage_tolerance > MAX_SLIPPAGE_TOLERANCE {
      return Err(ConfigViolation::SlippageTolerance);
    }
    if self.params.max_retry_attempts == 0 {
      return Err(ConfigViolation::RetryLimit);
    }
    Ok(())
  }
}

/// Counters reported by one queue drain pass
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct BatchSummary {
  pub completed: u32,
  pub dropped: u32,
  pub rescheduled: u32,
  /// Routed swap retries attempted, whatever their outcome
  pub swaps_attempted: u32,
  /// Deferred actions replayed, whatever their outcome
  pub replays_attempted: u32,
}

impl BatchSummary {
  /// Entries that consumed batch budget
  pub fn settled(&self) -> u32 {
    self.completed.saturating_add(self.dropped)
  }
}

/// `a * b / c` in 256-bit intermediate precision, `None` on division by zero or overflow
pub fn mul_div(a: Balance, b: Balance, c: Balance) -> Option<Balance> {
  if c == 0 {
    return None;
  }
  let result = U256::from(a).checked_mul(U256::from(b))?.checked_div(U256::from(c))?;
  if result > U256::from(u128::MAX) {
    return None;
  }
  Some(result.as_u128())
}

/// Pick the better of two quotes; ties favour the constant-product venue.
pub fn select_venue(
  constant_product: Option<Balance>,
  concentrated: Option<Balance>,
) -> Option<(Venue, Balance)> {
  let cp = constant_product.filter(|out| *out > 0);
  let cl = concentrated.filter(|out| *out > 0);
  match (cp, cl) {
    (Some(a), Some(b)) if b > a => Some((Venue::ConcentratedLiquidity, b)),
    (Some(a), _) => Some((Venue::ConstantProduct, a)),
    (None, Some(b)) => Some((Venue::ConcentratedLiquidity, b)),
    (None, None) => None,
  }
}

/// `expected * (1 - tolerance)`, rounded down
pub fn min_acceptable_out(expected_out: Balance, tolerance: Permill) -> Balance {
  tolerance.left_from_one().mul_floor(expected_out)
}

/// Equal-weight target: `(total, total / n)`. Truncation loss is not redistributed.
pub fn equal_weight_target(values: &[Balance]) -> (Balance, Balance) {
  let total = values
    .iter()
    .fold(0u128, |acc, value| acc.saturating_add(*value));
  let target = match values.len() as u128 {
    0 => 0,
    n => total / n,
  };
  (total, target)
}

/// Read-only cost signal (e.g. the fee multiplier of the host chain)
pub trait CostOracle {
  /// Positive cost reading, or an error when the reading is stale or invalid
  fn current_cost() -> Result<u128, DispatchError>;
}

/// Exchange venue offering read-only quotes and execution
pub trait PricingVenue<AccountId, BlockNumber> {
  /// Output estimate for `amount_in`; must not mutate venue state
  fn quote(amount_in: Balance, asset_in: AssetKind, asset_out: AssetKind) -> Option<Balance>;

  /// Execute, failing if `min_out` cannot be met before `deadline`
  fn swap(
    who: &AccountId,
    amount_in: Balance,
    asset_in: AssetKind,
    asset_out: AssetKind,
    min_out: Balance,
    recipient: &AccountId,
    deadline: BlockNumber,
  ) -> Result<Balance, DispatchError>;
}

/// Concentrated-liquidity venue exposing its pool price
pub trait ConcentratedLiquidityVenue<AccountId, BlockNumber>:
  PricingVenue<AccountId, BlockNumber>
{
  /// `base` received per `PRECISION` units of `asset` at the current pool price, if a pool exists
  fn spot_price(asset: AssetKind, base: AssetKind) -> Option<Balance>;
}

/// Helper for benchmarking
#[cfg(feature = "runtime-benchmarks")]
pub trait BenchmarkHelper<AccountId> {
  /// Make both venues able to quote and execute `asset <-> base`
  fn setup_venues(asset: AssetKind, base: AssetKind);
  /// Credit `amount` of `asset` to `who`
  fn fund(asset: AssetKind, who: &AccountId, amount: Balance);
}
