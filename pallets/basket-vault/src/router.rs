//! Venue selection and swap execution.
//!
//! Both venues are quoted for every leg and the larger output wins, with ties going to the
//! constant-product venue. A failed execution never surfaces to the caller: the leg is parked in
//! the trade queue with `DeferralReason::SlippageFailure`.

use crate::*;
use frame::prelude::*;
use polkadot_sdk::frame_support::storage::with_storage_layer;
use polkadot_sdk::sp_runtime::{
  Permill,
  traits::{Saturating, Zero},
};

impl<T: Config> Pallet<T> {
  /// Whether `amount` split across `basket_size` assets leaves more than the minimum unit per asset.
  pub fn is_meaningful_amount(amount: Balance, basket_size: u32) -> bool {
    match amount.checked_div(basket_size as Balance) {
      Some(per_asset) => !per_asset.is_zero() && per_asset > T::MinMeaningfulUnit::get(),
      None => false,
    }
  }

  /// Fail-fast validation performed before any venue is queried
  pub(crate) fn ensure_meaningful_amount(amount: Balance, basket_size: u32) -> DispatchResult {
    ensure!(
      Self::is_meaningful_amount(amount, basket_size),
      Error::<T>::AmountTooSmall
    );
    Ok(())
  }

  /// Best output across both venues for `amount_in`
  pub fn best_quote(
    amount_in: Balance,
    asset_in: AssetKind,
    asset_out: AssetKind,
  ) -> Option<(Venue, Balance)> {
    select_venue(
      T::ConstantProductVenue::quote(amount_in, asset_in, asset_out),
      T::ConcentratedVenue::quote(amount_in, asset_in, asset_out),
    )
  }

  /// Execute one swap from and to the custody account on the better venue.
  ///
  /// Runs in its own storage layer so a venue failing halfway leaves nothing behind.
  pub(crate) fn try_swap(
    asset_in: AssetKind,
    asset_out: AssetKind,
    amount_in: Balance,
    tolerance: Permill,
  ) -> Result<Balance, DispatchError> {
    with_storage_layer(|| {
      let (venue, expected_out) =
        Self::best_quote(amount_in, asset_in, asset_out).ok_or(Error::<T>::NoQuoteAvailable)?;
      let min_out = min_acceptable_out(expected_out, tolerance);
      let vault = Self::account_id();
      let deadline =
        frame_system::Pallet::<T>::block_number().saturating_add(T::SwapValidity::get());

      let amount_out = match venue {
        Venue::ConstantProduct => T::ConstantProductVenue::swap(
          &vault, amount_in, asset_in, asset_out, min_out, &vault, deadline,
        )?,
        Venue::ConcentratedLiquidity => T::ConcentratedVenue::swap(
          &vault, amount_in, asset_in, asset_out, min_out, &vault, deadline,
        )?,
      };
      ensure!(amount_out >= min_out, Error::<T>::SlippageExceeded);

      Self::deposit_event(Event::SwapExecuted {
        venue,
        asset_in,
        asset_out,
        amount_in,
        amount_out,
      });
      Ok(amount_out)
    })
  }

  /// Swap now, or queue the leg for retry when execution fails
  pub(crate) fn execute_or_defer(
    initiator: &T::AccountId,
    kind: OperationKind,
    asset_in: AssetKind,
    asset_out: AssetKind,
    amount_in: Balance,
    config: &PortfolioConfig,
  ) -> Result<SwapOutcome, DispatchError> {
    match Self::try_swap(
      asset_in,
      asset_out,
      amount_in,
      config.params.slippage_tolerance,
    ) {
      Ok(amount_out) => Ok(SwapOutcome::Executed(amount_out)),
      Err(error) => {
        log::debug!(
          target: LOG_TARGET,
          "swap of {} {:?} -> {:?} deferred: {:?}",
          amount_in,
          asset_in,
          asset_out,
          error
        );
        let id = Self::enqueue(
          initiator,
          kind,
          DeferralReason::SlippageFailure,
          asset_in,
          asset_out,
          amount_in,
        )?;
        Ok(SwapOutcome::Queued(id))
      }
    }
  }

  /// Split `amount` of the base asset evenly across the basket.
  ///
  /// The division remainder stays in the base asset.
  pub(crate) fn diversify(
    initiator: &T::AccountId,
    amount: Balance,
    config: &PortfolioConfig,
  ) -> DispatchResult {
    let basket_size = config.basket_size();
    Self::ensure_meaningful_amount(amount, basket_size)?;
    let per_asset = amount / basket_size as Balance;
    let base = T::BaseAsset::get();
    for asset in config.basket.iter().copied() {
      Self::execute_or_defer(
        initiator,
        OperationKind::Deposit,
        base,
        asset,
        per_asset,
        config,
      )?;
    }
    Ok(())
  }
}
