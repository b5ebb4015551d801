//! Depositor balances, fee accrual, withdrawals and liquidation.

use crate::*;
use frame::prelude::*;
use polkadot_sdk::frame_support::traits::tokens::Preservation;
use polkadot_sdk::sp_runtime::{
  PerThing,
  traits::{Saturating, Zero},
};
use primitives::params::SHARE_PRECISION;
use scale_info::prelude::vec::Vec;

impl<T: Config> Pallet<T> {
  pub(crate) fn do_deposit(who: &T::AccountId, amount: Balance) -> DispatchResult {
    ensure!(!amount.is_zero(), Error::<T>::ZeroAmount);
    let config = Self::portfolio_config()?;
    // Only the net amount is split across the basket
    let credited = amount.saturating_sub(Self::deposit_fee(who, amount, &config.params));
    Self::ensure_meaningful_amount(credited, config.basket_size())?;
    let cost = Self::read_cost()?;

    let base = T::BaseAsset::get();
    Self::transfer_asset(
      base,
      who,
      &Self::account_id(),
      amount,
      Preservation::Preserve,
    )?;

    match ExecutionPath::decide(cost, config.params.cost_threshold) {
      ExecutionPath::Deferred => {
        Self::enqueue(
          who,
          OperationKind::Deposit,
          DeferralReason::CostGate,
          base,
          base,
          amount,
        )?;
        PendingDeposits::<T>::mutate(|pending| *pending = pending.saturating_add(amount));
        Ok(())
      }
      ExecutionPath::Immediate => {
        Self::settle_deposit(who, amount, &config)?;
        Self::ensure_reserve(&config.params)
      }
    }
  }

  fn deposit_fee(who: &T::AccountId, amount: Balance, params: &PortfolioParameters) -> Balance {
    if *who == T::OwnerAccount::get() {
      Zero::zero()
    } else {
      params.deposit_fee.mul_floor(amount)
    }
  }

  /// Credit the ledger, then spread the net amount across the basket
  pub(crate) fn settle_deposit(
    who: &T::AccountId,
    amount: Balance,
    config: &PortfolioConfig,
  ) -> DispatchResult {
    let credited = Self::credit_deposit(who, amount, &config.params);
    Self::diversify(who, credited, config)
  }

  /// Split `amount` into fee and credit. The owner account pays no deposit fee.
  pub(crate) fn credit_deposit(
    who: &T::AccountId,
    amount: Balance,
    params: &PortfolioParameters,
  ) -> Balance {
    let fee = Self::deposit_fee(who, amount, params);
    let credited = amount.saturating_sub(fee);

    DepositorBalances::<T>::mutate(who, |balance| *balance = balance.saturating_add(credited));
    TotalDeposits::<T>::mutate(|total| *total = total.saturating_add(credited));
    AccruedFees::<T>::mutate(|fees| *fees = fees.saturating_add(fee));

    Self::deposit_event(Event::Deposited {
      who: who.clone(),
      amount,
      fee,
      credited,
    });
    credited
  }

  fn debit(who: &T::AccountId, amount: Balance) {
    DepositorBalances::<T>::mutate_exists(who, |entry| {
      let remaining = entry.unwrap_or_default().saturating_sub(amount);
      *entry = if remaining.is_zero() {
        None
      } else {
        Some(remaining)
      };
    });
    TotalDeposits::<T>::mutate(|total| *total = total.saturating_sub(amount));
  }

  fn accrue_fees(amount: Balance) {
    if !amount.is_zero() {
      AccruedFees::<T>::mutate(|fees| *fees = fees.saturating_add(amount));
    }
  }

  /// Send base asset out of custody without dipping under the operating reserve
  fn pay_out_base(to: &T::AccountId, amount: Balance, params: &PortfolioParameters) -> DispatchResult {
    let held = Self::free_base();
    ensure!(held >= amount, Error::<T>::InsufficientLiquidity);
    ensure!(
      held.saturating_sub(amount) >= params.min_reserve,
      Error::<T>::ReserveBreached
    );
    Self::transfer_asset(
      T::BaseAsset::get(),
      &Self::account_id(),
      to,
      amount,
      Preservation::Expendable,
    )
  }

  pub(crate) fn do_withdraw(who: &T::AccountId, amount: Balance) -> DispatchResult {
    ensure!(!amount.is_zero(), Error::<T>::ZeroAmount);
    let config = Self::portfolio_config()?;
    ensure!(
      amount <= DepositorBalances::<T>::get(who),
      Error::<T>::InsufficientBalance
    );

    let fee = config.params.withdrawal_fee.mul_floor(amount);
    let paid_out = amount.saturating_sub(fee);
    Self::debit(who, amount);
    Self::accrue_fees(fee);
    Self::pay_out_base(who, paid_out, &config.params)?;

    Self::deposit_event(Event::Withdrawn {
      who: who.clone(),
      amount,
      fee,
      paid_out,
    });
    Ok(())
  }

  /// Hand out the caller's pro-rata slice of every basket asset.
  ///
  /// The withdrawal fee is carved from each slice and sold for the base asset; slices too small
  /// to route stay in custody.
  pub(crate) fn do_withdraw_in_kind(who: &T::AccountId) -> DispatchResult {
    let config = Self::portfolio_config()?;
    let balance = DepositorBalances::<T>::get(who);
    ensure!(!balance.is_zero(), Error::<T>::NothingToWithdraw);
    let share = mul_div(balance, SHARE_PRECISION, TotalDeposits::<T>::get())
      .ok_or(Error::<T>::ArithmeticOverflow)?;

    let base = T::BaseAsset::get();
    let vault = Self::account_id();
    let mut fees_accrued: Balance = Zero::zero();
    for asset in config.basket.iter().copied() {
      let portion = mul_div(Self::holdings(asset), share, SHARE_PRECISION)
        .ok_or(Error::<T>::ArithmeticOverflow)?;
      if portion.is_zero() {
        continue;
      }
      let fee_slice = config.params.withdrawal_fee.mul_floor(portion);
      if Self::is_meaningful_amount(fee_slice, config.basket_size()) {
        let outcome = Self::execute_or_defer(
          who,
          OperationKind::Liquidation,
          asset,
          base,
          fee_slice,
          &config,
        )?;
        if let SwapOutcome::Executed(proceeds) = outcome {
          fees_accrued = fees_accrued.saturating_add(proceeds);
        }
      }
      Self::transfer_asset(
        asset,
        &vault,
        who,
        portion.saturating_sub(fee_slice),
        Preservation::Expendable,
      )?;
    }

    Self::debit(who, balance);
    Self::accrue_fees(fees_accrued);
    Self::deposit_event(Event::WithdrawnInKind {
      who: who.clone(),
      balance,
      share,
      fees_accrued,
    });
    Ok(())
  }

  pub(crate) fn do_claim_fees() -> DispatchResult {
    let config = Self::portfolio_config()?;
    let amount = AccruedFees::<T>::take();
    ensure!(!amount.is_zero(), Error::<T>::NoFeesAccrued);
    let collector = T::FeeCollector::get();
    Self::pay_out_base(&collector, amount, &config.params)?;
    Self::deposit_event(Event::FeesClaimed { collector, amount });
    Ok(())
  }

  pub(crate) fn do_liquidate_all(initiator: &T::AccountId) -> DispatchResult {
    let config = Self::portfolio_config()?;
    let cost = Self::read_cost()?;
    match ExecutionPath::decide(cost, config.params.cost_threshold) {
      ExecutionPath::Deferred => {
        let base = T::BaseAsset::get();
        Self::enqueue(
          initiator,
          OperationKind::Liquidation,
          DeferralReason::CostGate,
          base,
          base,
          Zero::zero(),
        )?;
        Ok(())
      }
      ExecutionPath::Immediate => Self::liquidate_portfolio(initiator, &config),
    }
  }

  /// Sell the basket, then distribute the free base asset above the reserve.
  ///
  /// Base escrowed for queued deposits is not part of the pool.
  ///
  /// Accrued fees are carved out first for the fee collector. Every depositor receives
  /// `distributable * balance / total`; the truncation remainder stays in custody as dust.
  pub(crate) fn liquidate_portfolio(
    initiator: &T::AccountId,
    config: &PortfolioConfig,
  ) -> DispatchResult {
    let base = T::BaseAsset::get();
    let basket_size = config.basket_size();
    let mut legs_queued = 0u32;
    for asset in config.basket.iter().copied() {
      let held = Self::holdings(asset);
      if !Self::is_meaningful_amount(held, basket_size) {
        continue;
      }
      let outcome = Self::execute_or_defer(
        initiator,
        OperationKind::Liquidation,
        asset,
        base,
        held,
        config,
      )?;
      if matches!(outcome, SwapOutcome::Queued(_)) {
        legs_queued = legs_queued.saturating_add(1);
      }
    }

    let vault = Self::account_id();
    let pool = Self::free_base().saturating_sub(config.params.min_reserve);
    let fee_share = AccruedFees::<T>::take().min(pool);
    let distributable = pool.saturating_sub(fee_share);
    let total = TotalDeposits::<T>::take();
    let collector = T::FeeCollector::get();

    let depositors: Vec<(T::AccountId, Balance)> = DepositorBalances::<T>::drain().collect();
    let mut distributed: Balance = Zero::zero();
    let mut fee_collector_share = fee_share;
    for (depositor, balance) in depositors {
      let share =
        mul_div(distributable, balance, total).ok_or(Error::<T>::ArithmeticOverflow)?;
      if depositor == collector {
        fee_collector_share = fee_collector_share.saturating_add(share);
        continue;
      }
      Self::transfer_asset(base, &vault, &depositor, share, Preservation::Expendable)?;
      distributed = distributed.saturating_add(share);
    }
    Self::transfer_asset(
      base,
      &vault,
      &collector,
      fee_collector_share,
      Preservation::Expendable,
    )?;

    let dust = pool
      .saturating_sub(distributed)
      .saturating_sub(fee_collector_share);
    log::info!(
      target: LOG_TARGET,
      "liquidated pool of {}: {} to depositors, {} to collector, {} dust",
      pool,
      distributed,
      fee_collector_share,
      dust
    );
    Self::deposit_event(Event::LiquidationCompleted {
      pool,
      distributed,
      fee_collector_share,
      dust,
      legs_queued,
    });
    Ok(())
  }
}
