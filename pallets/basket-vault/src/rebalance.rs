//! Equal-weight rebalancing.

use crate::*;
use frame::prelude::*;
use polkadot_sdk::sp_runtime::traits::Zero;
use primitives::params::PRECISION;
use scale_info::prelude::vec::Vec;

#[derive(Default)]
struct LegTally {
  executed: u32,
  queued: u32,
  skipped: u32,
}

impl<T: Config> Pallet<T> {
  pub(crate) fn do_rebalance(initiator: &T::AccountId) -> DispatchResult {
    let config = Self::portfolio_config()?;
    let cost = Self::read_cost()?;
    match ExecutionPath::decide(cost, config.params.cost_threshold) {
      ExecutionPath::Deferred => {
        let base = T::BaseAsset::get();
        Self::enqueue(
          initiator,
          OperationKind::Rebalance,
          DeferralReason::CostGate,
          base,
          base,
          Zero::zero(),
        )?;
        Ok(())
      }
      ExecutionPath::Immediate => Self::rebalance_portfolio(initiator, &config),
    }
  }

  /// Base asset received per `PRECISION` units of `asset`.
  ///
  /// The concentrated-liquidity pool price is preferred; a constant-product quote for one
  /// `PRECISION` lot is the fallback.
  pub fn unit_price(asset: AssetKind) -> Option<Balance> {
    let base = T::BaseAsset::get();
    T::ConcentratedVenue::spot_price(asset, base)
      .filter(|price| !price.is_zero())
      .or_else(|| {
        T::ConstantProductVenue::quote(PRECISION, asset, base).filter(|price| !price.is_zero())
      })
  }

  /// Move every basket asset toward `total_value / n`.
  ///
  /// All prices are read before the first swap, so a missing price aborts without side
  /// effects. Sells run before buys so their proceeds fund the deficits.
  pub(crate) fn rebalance_portfolio(
    initiator: &T::AccountId,
    config: &PortfolioConfig,
  ) -> DispatchResult {
    let base = T::BaseAsset::get();
    let mut positions: Vec<(AssetKind, Balance, Balance)> =
      Vec::with_capacity(config.basket.len());
    for asset in config.basket.iter().copied() {
      let price = Self::unit_price(asset).ok_or(Error::<T>::NoPriceAvailable)?;
      let value =
        mul_div(Self::holdings(asset), price, PRECISION).ok_or(Error::<T>::ArithmeticOverflow)?;
      positions.push((asset, price, value));
    }
    let values: Vec<Balance> = positions.iter().map(|(_, _, value)| *value).collect();
    let (total_value, target_value) = equal_weight_target(&values);

    let mut tally = LegTally::default();
    for (asset, price, value) in positions.iter().filter(|(_, _, value)| *value > target_value) {
      let excess = mul_div(value - target_value, PRECISION, *price)
        .ok_or(Error::<T>::ArithmeticOverflow)?
        .min(Self::holdings(*asset));
      Self::route_leg(initiator, *asset, base, excess, config, &mut tally)?;
    }
    for (asset, _, value) in positions.iter().filter(|(_, _, value)| *value < target_value) {
      Self::route_leg(initiator, base, *asset, target_value - value, config, &mut tally)?;
    }

    log::debug!(
      target: LOG_TARGET,
      "rebalanced to {} per asset: {} executed, {} queued, {} skipped",
      target_value,
      tally.executed,
      tally.queued,
      tally.skipped
    );
    Self::deposit_event(Event::RebalanceCompleted {
      total_value,
      target_value,
      legs_executed: tally.executed,
      legs_queued: tally.queued,
      legs_skipped: tally.skipped,
    });
    Ok(())
  }

  fn route_leg(
    initiator: &T::AccountId,
    asset_in: AssetKind,
    asset_out: AssetKind,
    amount_in: Balance,
    config: &PortfolioConfig,
    tally: &mut LegTally,
  ) -> DispatchResult {
    if !Self::is_meaningful_amount(amount_in, config.basket_size()) {
      tally.skipped += 1;
      return Ok(());
    }
    match Self::execute_or_defer(
      initiator,
      OperationKind::Rebalance,
      asset_in,
      asset_out,
      amount_in,
      config,
    )? {
      SwapOutcome::Executed(_) => tally.executed += 1,
      SwapOutcome::Queued(_) => tally.queued += 1,
    }
    Ok(())
  }
}
