extern crate alloc;

use crate::*;
use alloc::vec::Vec;
use frame::deps::frame_benchmarking::{account, v2::*};
use frame::deps::frame_support::traits::EnsureOrigin;
use frame::deps::frame_system;
use frame::deps::frame_system::RawOrigin;
use frame::deps::sp_runtime::{Permill, traits::Saturating};
use frame::prelude::*;
use primitives::ecosystem::params::{MIN_BASKET_SIZE, PRECISION};

/// Install a basket of `size` local assets with venues that can always settle.
fn configure<T: Config>(size: u32) -> PortfolioConfig {
  let base = T::BaseAsset::get();
  let basket: Vec<AssetKind> = (1..=size).map(AssetKind::Local).collect();
  for asset in basket.iter() {
    T::BenchmarkHelper::setup_venues(*asset, base);
  }
  let params = PortfolioParameters {
    deposit_fee: Permill::from_percent(1),
    withdrawal_fee: Permill::from_percent(1),
    slippage_tolerance: Permill::from_percent(5),
    cost_threshold: u128::MAX,
    min_reserve: 0,
    max_retry_attempts: 3,
  };
  let bounded: BoundedVec<AssetKind, T::MaxBasketSize> = basket
    .clone()
    .try_into()
    .expect("benchmark basket fits MaxBasketSize");
  Basket::<T>::put(bounded);
  Parameters::<T>::put(params);
  PortfolioConfig { basket, params }
}

fn seed_depositor<T: Config>(who: &T::AccountId, amount: Balance) {
  DepositorBalances::<T>::insert(who, amount);
  TotalDeposits::<T>::mutate(|total| *total = total.saturating_add(amount));
}

#[benchmarks]
mod benches {
  use super::*;

  #[benchmark]
  fn deposit(n: Linear<{ MIN_BASKET_SIZE }, { T::MaxBasketSize::get() }>) {
    configure::<T>(n);
    let caller: T::AccountId = whitelisted_caller();
    let amount = 1_000 * PRECISION;
    T::BenchmarkHelper::fund(T::BaseAsset::get(), &caller, amount.saturating_mul(2));

    #[extrinsic_call]
    deposit(RawOrigin::Signed(caller.clone()), amount);

    assert!(DepositorBalances::<T>::get(&caller) > 0);
  }

  #[benchmark]
  fn withdraw() {
    configure::<T>(MIN_BASKET_SIZE);
    let caller: T::AccountId = whitelisted_caller();
    let amount = 1_000 * PRECISION;
    seed_depositor::<T>(&caller, amount);
    T::BenchmarkHelper::fund(T::BaseAsset::get(), &Pallet::<T>::account_id(), amount);

    #[extrinsic_call]
    withdraw(RawOrigin::Signed(caller.clone()), amount);

    assert_eq!(DepositorBalances::<T>::get(&caller), 0);
  }

  #[benchmark]
  fn withdraw_in_kind(n: Linear<{ MIN_BASKET_SIZE }, { T::MaxBasketSize::get() }>) {
    let config = configure::<T>(n);
    let caller: T::AccountId = whitelisted_caller();
    let other: T::AccountId = account("depositor", 0, 0);
    seed_depositor::<T>(&caller, 500 * PRECISION);
    seed_depositor::<T>(&other, 500 * PRECISION);
    let vault = Pallet::<T>::account_id();
    for asset in config.basket.iter() {
      T::BenchmarkHelper::fund(*asset, &vault, 1_000 * PRECISION);
    }

    #[extrinsic_call]
    withdraw_in_kind(RawOrigin::Signed(caller.clone()));

    assert_eq!(DepositorBalances::<T>::get(&caller), 0);
  }

  #[benchmark]
  fn rebalance(n: Linear<{ MIN_BASKET_SIZE }, { T::MaxBasketSize::get() }>) {
    let config = configure::<T>(n);
    let vault = Pallet::<T>::account_id();
    for (index, asset) in config.basket.iter().enumerate() {
      // Every other asset is overweight so each leg trades
      let amount = if index % 2 == 0 { 2_000 * PRECISION } else { 1_000 * PRECISION };
      T::BenchmarkHelper::fund(*asset, &vault, amount);
    }
    let origin = T::KeeperOrigin::try_successful_origin()
      .expect("KeeperOrigin must have a successful origin");

    #[extrinsic_call]
    rebalance(origin as T::RuntimeOrigin);
  }

  #[benchmark]
  fn process_queue(n: Linear<1, 32>) {
    let config = configure::<T>(MIN_BASKET_SIZE);
    let base = T::BaseAsset::get();
    let initiator: T::AccountId = account("initiator", 0, 0);
    let vault = Pallet::<T>::account_id();
    T::BenchmarkHelper::fund(base, &vault, (n as Balance + 1) * PRECISION);
    for i in 0..n {
      let asset = config.basket[(i % MIN_BASKET_SIZE) as usize];
      Pallet::<T>::enqueue(
        &initiator,
        OperationKind::Deposit,
        DeferralReason::SlippageFailure,
        base,
        asset,
        PRECISION,
      )
      .expect("queue has room");
    }
    let eligible =
      frame_system::Pallet::<T>::block_number().saturating_add(T::RetryCooldown::get());
    frame_system::Pallet::<T>::set_block_number(eligible);
    let origin = T::KeeperOrigin::try_successful_origin()
      .expect("KeeperOrigin must have a successful origin");

    #[extrinsic_call]
    process_queue(origin as T::RuntimeOrigin, n);

    assert!(TradeQueue::<T>::get().is_empty());
  }

  #[benchmark]
  fn liquidate_all(n: Linear<{ MIN_BASKET_SIZE }, { T::MaxBasketSize::get() }>) {
    let config = configure::<T>(n);
    let vault = Pallet::<T>::account_id();
    for asset in config.basket.iter() {
      T::BenchmarkHelper::fund(*asset, &vault, 100 * PRECISION);
    }
    seed_depositor::<T>(&account("depositor", 0, 0), 600 * PRECISION);
    seed_depositor::<T>(&account("depositor", 1, 0), 300 * PRECISION);
    AccruedFees::<T>::put(10 * PRECISION);
    let origin =
      T::AdminOrigin::try_successful_origin().expect("AdminOrigin must have a successful origin");

    #[extrinsic_call]
    liquidate_all(origin as T::RuntimeOrigin);

    assert_eq!(TotalDeposits::<T>::get(), 0);
  }

  #[benchmark]
  fn claim_fees() {
    configure::<T>(MIN_BASKET_SIZE);
    let caller: T::AccountId = whitelisted_caller();
    let fees = 100 * PRECISION;
    AccruedFees::<T>::put(fees);
    T::BenchmarkHelper::fund(T::BaseAsset::get(), &Pallet::<T>::account_id(), fees);

    #[extrinsic_call]
    claim_fees(RawOrigin::Signed(caller));

    assert_eq!(AccruedFees::<T>::get(), 0);
  }

  #[benchmark]
  fn set_portfolio_config(n: Linear<{ MIN_BASKET_SIZE }, { T::MaxBasketSize::get() }>) {
    let basket: BoundedVec<AssetKind, T::MaxBasketSize> = (1..=n)
      .map(AssetKind::Local)
      .collect::<Vec<_>>()
      .try_into()
      .expect("benchmark basket fits MaxBasketSize");
    let params = PortfolioParameters {
      deposit_fee: Permill::from_percent(1),
      withdrawal_fee: Permill::from_percent(1),
      slippage_tolerance: Permill::from_percent(1),
      cost_threshold: 100,
      min_reserve: 0,
      max_retry_attempts: 3,
    };
    let origin =
      T::AdminOrigin::try_successful_origin().expect("AdminOrigin must have a successful origin");

    #[extrinsic_call]
    set_portfolio_config(origin as T::RuntimeOrigin, basket, params);

    assert_eq!(Basket::<T>::decode_len(), Some(n as usize));
  }

  #[cfg(test)]
  use crate::mock::{Test, new_test_ext};
  #[cfg(test)]
  impl_benchmark_test_suite!(Pallet, new_test_ext(), Test);
}
