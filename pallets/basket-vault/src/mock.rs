use crate as pallet_basket_vault;

use polkadot_sdk::frame_support::traits::fungible::Mutate as FungibleMutate;
use polkadot_sdk::frame_support::traits::fungibles::Mutate as FungiblesMutate;
use polkadot_sdk::frame_support::traits::tokens::Preservation;
use polkadot_sdk::frame_support::{
  PalletId, construct_runtime, derive_impl, parameter_types,
  traits::{ConstU32, ConstU64, ConstU128, Get},
};
use polkadot_sdk::frame_system;
use polkadot_sdk::sp_runtime::{
  BuildStorage, DispatchError, DispatchResult, PerThing, Permill,
  testing::H256,
  traits::{BlakeTwo256, IdentityLookup},
};

use crate::types::{
  AssetKind, Balance, ConcentratedLiquidityVenue, CostOracle, PricingVenue, Venue, mul_div,
};
use primitives::ecosystem::{
  pallet_ids::BASKET_VAULT_PALLET_ID,
  params::{MAX_BASKET_SIZE, PRECISION, RETRY_COOLDOWN_BLOCKS, SWAP_VALIDITY_BLOCKS},
};
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};

pub const ALICE: u64 = 1;
pub const BOB: u64 = 2;
pub const CHARLIE: u64 = 3;
pub const OWNER: u64 = 100;
pub const FEE_COLLECTOR: u64 = 200;
pub const KEEPER: u64 = 300;
/// Counterparty account of both mock venues
pub const POOL_ACCOUNT: u64 = 12345;

pub const BASE: AssetKind = AssetKind::Native;
pub const BASKET_SIZE: u32 = 10;
pub const COST_THRESHOLD: u128 = 100;
pub const RETRY_COOLDOWN: u64 = RETRY_COOLDOWN_BLOCKS as u64;
pub const MAX_RETRIES: u32 = 3;
pub const MIN_MEANINGFUL_UNIT: u128 = 10;
pub const INITIAL_BALANCE: u128 = 1_000_000 * PRECISION;
pub const POOL_RESERVE: u128 = 1_000_000 * PRECISION;

// State containers for stateful mocks
thread_local! {
    // Constant-product pools: sorted (AssetA, AssetB) -> (ReserveA, ReserveB)
    pub static CP_POOLS: RefCell<BTreeMap<(AssetKind, AssetKind), (u128, u128)>> = const { RefCell::new(BTreeMap::new()) };

    // Concentrated-liquidity prices: asset -> base received per PRECISION units
    pub static CL_PRICES: RefCell<BTreeMap<AssetKind, u128>> = const { RefCell::new(BTreeMap::new()) };

    // Quote overrides applied to every pair of a venue
    pub static FIXED_QUOTES: RefCell<Vec<(Venue, u128)>> = const { RefCell::new(Vec::new()) };

    // Swaps touching these assets are rejected by both venues
    pub static FAILING_ASSETS: RefCell<BTreeSet<AssetKind>> = const { RefCell::new(BTreeSet::new()) };

    // Fraction of the quoted output withheld on execution
    pub static EXECUTION_SHORTFALL: RefCell<Permill> = const { RefCell::new(Permill::from_parts(0)) };

    pub static QUOTE_CALLS: RefCell<u32> = const { RefCell::new(0) };

    // `None` models a stale oracle
    pub static COST_READING: RefCell<Option<u128>> = const { RefCell::new(Some(1)) };

    pub static PAUSED: RefCell<bool> = const { RefCell::new(false) };

    // Deposit issued from inside the next venue execution
    pub static REENTRANT_DEPOSIT: RefCell<Option<(u64, u128)>> = const { RefCell::new(None) };
    pub static REENTRY_RESULT: RefCell<Option<DispatchResult>> = const { RefCell::new(None) };
}

pub fn set_cp_pool(asset_a: AssetKind, asset_b: AssetKind, reserve_a: u128, reserve_b: u128) {
  CP_POOLS.with(|p| {
    let mut pools = p.borrow_mut();
    if asset_a < asset_b {
      pools.insert((asset_a, asset_b), (reserve_a, reserve_b));
    } else {
      pools.insert((asset_b, asset_a), (reserve_b, reserve_a));
    }
  });
}

pub fn set_cl_price(asset: AssetKind, price: u128) {
  CL_PRICES.with(|p| p.borrow_mut().insert(asset, price));
}

pub fn clear_cl_price(asset: AssetKind) {
  CL_PRICES.with(|p| p.borrow_mut().remove(&asset));
}

pub fn fix_quote(venue: Venue, amount_out: u128) {
  FIXED_QUOTES.with(|q| {
    let mut quotes = q.borrow_mut();
    quotes.retain(|(v, _)| *v != venue);
    quotes.push((venue, amount_out));
  });
}

pub fn fail_asset(asset: AssetKind) {
  FAILING_ASSETS.with(|f| f.borrow_mut().insert(asset));
}

pub fn heal_asset(asset: AssetKind) {
  FAILING_ASSETS.with(|f| f.borrow_mut().remove(&asset));
}

pub fn set_execution_shortfall(shortfall: Permill) {
  EXECUTION_SHORTFALL.with(|s| *s.borrow_mut() = shortfall);
}

pub fn set_cost(reading: Option<u128>) {
  COST_READING.with(|c| *c.borrow_mut() = reading);
}

pub fn set_paused(paused: bool) {
  PAUSED.with(|p| *p.borrow_mut() = paused);
}

pub fn arm_reentrant_deposit(who: u64, amount: u128) {
  REENTRANT_DEPOSIT.with(|r| *r.borrow_mut() = Some((who, amount)));
}

pub fn reentry_result() -> Option<DispatchResult> {
  REENTRY_RESULT.with(|r| r.borrow().clone())
}

pub fn quote_calls() -> u32 {
  QUOTE_CALLS.with(|c| *c.borrow())
}

pub fn reset_quote_calls() {
  QUOTE_CALLS.with(|c| *c.borrow_mut() = 0);
}

pub fn cp_reserves(asset_in: AssetKind, asset_out: AssetKind) -> Option<(u128, u128)> {
  CP_POOLS.with(|p| {
    let pools = p.borrow();
    if let Some((a, b)) = pools.get(&(asset_in, asset_out)) {
      Some((*a, *b))
    } else {
      pools.get(&(asset_out, asset_in)).map(|(a, b)| (*b, *a))
    }
  })
}

type Block = frame_system::mocking::MockBlock<Test>;

construct_runtime!(
  pub struct Test {
    System: frame_system,
    Balances: polkadot_sdk::pallet_balances,
    Assets: polkadot_sdk::pallet_assets,
    BasketVault: pallet_basket_vault,
  }
);

#[derive_impl(frame_system::config_preludes::TestDefaultConfig)]
impl frame_system::Config for Test {
  type Block = Block;
  type AccountId = u64;
  type Lookup = IdentityLookup<Self::AccountId>;
  type Hash = H256;
  type Hashing = BlakeTwo256;
  type AccountData = polkadot_sdk::pallet_balances::AccountData<u128>;
}

impl polkadot_sdk::pallet_balances::Config for Test {
  type MaxLocks = ();
  type MaxReserves = ();
  type ReserveIdentifier = [u8; 8];
  type Balance = u128;
  type DustRemoval = ();
  type RuntimeEvent = RuntimeEvent;
  type ExistentialDeposit = ConstU128<1>;
  type AccountStore = System;
  type WeightInfo = ();
  type FreezeIdentifier = ();
  type MaxFreezes = ();
  type RuntimeHoldReason = ();
  type RuntimeFreezeReason = ();
  type DoneSlashHandler = ();
}

impl polkadot_sdk::pallet_assets::Config for Test {
  type RuntimeEvent = RuntimeEvent;
  type Balance = u128;
  type AssetId = u32;
  type AssetIdParameter = u32;
  type Currency = Balances;
  type CreateOrigin = polkadot_sdk::frame_support::traits::AsEnsureOriginWithArg<
    frame_system::EnsureSigned<Self::AccountId>,
  >;
  type ForceOrigin = frame_system::EnsureRoot<Self::AccountId>;
  type AssetDeposit = ConstU128<1>;
  type AssetAccountDeposit = ConstU128<1>;
  type MetadataDepositBase = ConstU128<1>;
  type MetadataDepositPerByte = ConstU128<1>;
  type ApprovalDeposit = ConstU128<1>;
  type StringLimit = ConstU32<50>;
  type Freezer = ();
  type Extra = ();
  type ReserveData = ();
  type CallbackHandle = ();
  type WeightInfo = ();
  type RemoveItemsLimit = ConstU32<5>;
  type Holder = ();
  #[cfg(feature = "runtime-benchmarks")]
  type BenchmarkHelper = AssetBenchmarkHelper;
}

#[cfg(feature = "runtime-benchmarks")]
pub struct AssetBenchmarkHelper;

#[cfg(feature = "runtime-benchmarks")]
impl polkadot_sdk::pallet_assets::BenchmarkHelper<u32, ()> for AssetBenchmarkHelper {
  fn create_asset_id_parameter(id: u32) -> u32 {
    id
  }
  fn create_reserve_id_parameter(_id: u32) -> () {
    ()
  }
}

// MOCK IMPLEMENTATIONS

fn record_quote() {
  QUOTE_CALLS.with(|c| *c.borrow_mut() += 1);
}

fn fixed_quote(venue: Venue) -> Option<u128> {
  FIXED_QUOTES.with(|q| {
    q.borrow()
      .iter()
      .find(|(v, _)| *v == venue)
      .map(|(_, out)| *out)
  })
}

fn take_from(asset: AssetKind, who: &u64, amount: u128) -> DispatchResult {
  match asset {
    AssetKind::Native => {
      <Balances as FungibleMutate<u64>>::transfer(
        who,
        &POOL_ACCOUNT,
        amount,
        Preservation::Expendable,
      )?;
    }
    AssetKind::Local(id) | AssetKind::Foreign(id) => {
      <Assets as FungiblesMutate<u64>>::transfer(
        id,
        who,
        &POOL_ACCOUNT,
        amount,
        Preservation::Expendable,
      )?;
    }
  }
  Ok(())
}

fn give_to(asset: AssetKind, who: &u64, amount: u128) -> DispatchResult {
  match asset {
    AssetKind::Native => {
      <Balances as FungibleMutate<u64>>::mint_into(who, amount)?;
    }
    AssetKind::Local(id) | AssetKind::Foreign(id) => {
      <Assets as FungiblesMutate<u64>>::mint_into(id, who, amount)?;
    }
  }
  Ok(())
}

/// Shared execution path of both venues: deadline, failure injection, re-entry attempt,
/// shortfall, then settlement against the pool account.
fn settle_swap(
  who: &u64,
  amount_in: u128,
  asset_in: AssetKind,
  asset_out: AssetKind,
  quoted: u128,
  min_out: u128,
  recipient: &u64,
  deadline: u64,
) -> Result<u128, DispatchError> {
  if System::block_number() > deadline {
    return Err(DispatchError::Other("DeadlineExpired"));
  }
  let rejected = FAILING_ASSETS.with(|f| {
    let failing = f.borrow();
    failing.contains(&asset_in) || failing.contains(&asset_out)
  });
  if rejected {
    return Err(DispatchError::Other("VenueRejected"));
  }
  if let Some((depositor, amount)) = REENTRANT_DEPOSIT.with(|r| r.borrow_mut().take()) {
    let result = BasketVault::deposit(RuntimeOrigin::signed(depositor), amount);
    REENTRY_RESULT.with(|r| *r.borrow_mut() = Some(result.clone()));
    result?;
  }

  let delivered = EXECUTION_SHORTFALL
    .with(|s| *s.borrow())
    .left_from_one()
    .mul_floor(quoted);
  if delivered < min_out {
    return Err(DispatchError::Other("SlippageExceeded"));
  }
  take_from(asset_in, who, amount_in)?;
  give_to(asset_out, recipient, delivered)?;
  Ok(delivered)
}

pub struct MockConstantProduct;
impl PricingVenue<u64, u64> for MockConstantProduct {
  fn quote(amount_in: Balance, asset_in: AssetKind, asset_out: AssetKind) -> Option<Balance> {
    record_quote();
    if let Some(out) = fixed_quote(Venue::ConstantProduct) {
      return Some(out);
    }
    let (reserve_in, reserve_out) = cp_reserves(asset_in, asset_out)?;
    if reserve_in == 0 || reserve_out == 0 {
      return None;
    }
    // XYK Formula: y_out = (x_in * y_res) / (x_res + x_in)
    mul_div(amount_in, reserve_out, reserve_in.saturating_add(amount_in))
  }

  fn swap(
    who: &u64,
    amount_in: Balance,
    asset_in: AssetKind,
    asset_out: AssetKind,
    min_out: Balance,
    recipient: &u64,
    deadline: u64,
  ) -> Result<Balance, DispatchError> {
    let quoted = Self::quote(amount_in, asset_in, asset_out)
      .ok_or(DispatchError::Other("Pool not found"))?;
    let delivered = settle_swap(
      who, amount_in, asset_in, asset_out, quoted, min_out, recipient, deadline,
    )?;
    if let Some((reserve_in, reserve_out)) = cp_reserves(asset_in, asset_out) {
      set_cp_pool(
        asset_in,
        asset_out,
        reserve_in.saturating_add(amount_in),
        reserve_out.saturating_sub(delivered),
      );
    }
    Ok(delivered)
  }
}

pub struct MockConcentrated;
impl PricingVenue<u64, u64> for MockConcentrated {
  fn quote(amount_in: Balance, asset_in: AssetKind, asset_out: AssetKind) -> Option<Balance> {
    record_quote();
    if let Some(out) = fixed_quote(Venue::ConcentratedLiquidity) {
      return Some(out);
    }
    if asset_out == BASE {
      let price = CL_PRICES.with(|p| p.borrow().get(&asset_in).copied())?;
      mul_div(amount_in, price, PRECISION)
    } else if asset_in == BASE {
      let price = CL_PRICES.with(|p| p.borrow().get(&asset_out).copied())?;
      mul_div(amount_in, PRECISION, price)
    } else {
      None
    }
  }

  fn swap(
    who: &u64,
    amount_in: Balance,
    asset_in: AssetKind,
    asset_out: AssetKind,
    min_out: Balance,
    recipient: &u64,
    deadline: u64,
  ) -> Result<Balance, DispatchError> {
    let quoted = Self::quote(amount_in, asset_in, asset_out)
      .ok_or(DispatchError::Other("Position not found"))?;
    settle_swap(
      who, amount_in, asset_in, asset_out, quoted, min_out, recipient, deadline,
    )
  }
}

impl ConcentratedLiquidityVenue<u64, u64> for MockConcentrated {
  fn spot_price(asset: AssetKind, base: AssetKind) -> Option<Balance> {
    if base != BASE {
      return None;
    }
    CL_PRICES.with(|p| p.borrow().get(&asset).copied())
  }
}

pub struct MockCostOracle;
impl CostOracle for MockCostOracle {
  fn current_cost() -> Result<u128, DispatchError> {
    COST_READING
      .with(|c| *c.borrow())
      .ok_or(DispatchError::Other("Stale cost reading"))
  }
}

pub struct PauseSwitch;
impl Get<bool> for PauseSwitch {
  fn get() -> bool {
    PAUSED.with(|p| *p.borrow())
  }
}

parameter_types! {
  pub const VaultPalletId: PalletId = PalletId(*BASKET_VAULT_PALLET_ID);
  pub const BaseAsset: AssetKind = BASE;
}

impl pallet_basket_vault::Config for Test {
  type Currency = Balances;
  type Assets = Assets;
  type ConstantProductVenue = MockConstantProduct;
  type ConcentratedVenue = MockConcentrated;
  type CostOracle = MockCostOracle;
  type AdminOrigin = frame_system::EnsureRoot<u64>;
  type KeeperOrigin = frame_system::EnsureSigned<u64>;
  type PauseSwitch = PauseSwitch;
  type PalletId = VaultPalletId;
  type BaseAsset = BaseAsset;
  type OwnerAccount = ConstU64<OWNER>;
  type FeeCollector = ConstU64<FEE_COLLECTOR>;
  type RetryCooldown = ConstU64<RETRY_COOLDOWN>;
  type SwapValidity = ConstU64<{ SWAP_VALIDITY_BLOCKS as u64 }>;
  type MinMeaningfulUnit = ConstU128<MIN_MEANINGFUL_UNIT>;
  type MaxBasketSize = ConstU32<MAX_BASKET_SIZE>;
  type MaxQueueLength = ConstU32<64>;
  type IdleBatchSize = ConstU32<4>;
  type WeightInfo = ();
  #[cfg(feature = "runtime-benchmarks")]
  type BenchmarkHelper = VaultBenchmarkHelper;
}

#[cfg(feature = "runtime-benchmarks")]
pub struct VaultBenchmarkHelper;

#[cfg(feature = "runtime-benchmarks")]
impl crate::types::BenchmarkHelper<u64> for VaultBenchmarkHelper {
  fn setup_venues(asset: AssetKind, base: AssetKind) {
    if let AssetKind::Local(id) | AssetKind::Foreign(id) = asset {
      let _ = Assets::force_create(RuntimeOrigin::root(), id, POOL_ACCOUNT, true, 1);
    }
    set_cp_pool(asset, base, POOL_RESERVE, POOL_RESERVE);
    set_cl_price(asset, PRECISION);
  }

  fn fund(asset: AssetKind, who: &u64, amount: u128) {
    let _ = give_to(asset, who, amount);
  }
}

pub fn default_basket() -> Vec<AssetKind> {
  (1..=BASKET_SIZE).map(AssetKind::Local).collect()
}

fn reset_mocks() {
  CP_POOLS.with(|p| p.borrow_mut().clear());
  CL_PRICES.with(|p| p.borrow_mut().clear());
  FIXED_QUOTES.with(|q| q.borrow_mut().clear());
  FAILING_ASSETS.with(|f| f.borrow_mut().clear());
  set_execution_shortfall(Permill::zero());
  reset_quote_calls();
  set_cost(Some(1));
  set_paused(false);
  REENTRANT_DEPOSIT.with(|r| *r.borrow_mut() = None);
  REENTRY_RESULT.with(|r| *r.borrow_mut() = None);
}

pub fn new_test_ext() -> polkadot_sdk::sp_io::TestExternalities {
  reset_mocks();

  let mut storage = frame_system::GenesisConfig::<Test>::default()
    .build_storage()
    .unwrap();
  pallet_basket_vault::GenesisConfig::<Test> {
    basket: default_basket(),
    deposit_fee: Permill::from_percent(3),
    withdrawal_fee: Permill::from_percent(3),
    slippage_tolerance: Permill::from_percent(1),
    cost_threshold: COST_THRESHOLD,
    min_reserve: 0,
    max_retry_attempts: MAX_RETRIES,
    _marker: Default::default(),
  }
  .assimilate_storage(&mut storage)
  .unwrap();
  let mut ext: polkadot_sdk::sp_io::TestExternalities = storage.into();

  ext.execute_with(|| {
    System::set_block_number(1);

    for account in [ALICE, BOB, CHARLIE, OWNER, FEE_COLLECTOR, KEEPER, POOL_ACCOUNT] {
      let _ = <Balances as FungibleMutate<u64>>::mint_into(&account, INITIAL_BALANCE);
    }

    // Assets 1..=10 form the basket; 11 and 12 only trade on the constant-product venue
    for asset_id in 1..=12u32 {
      let asset = AssetKind::Local(asset_id);
      let _ = Assets::force_create(RuntimeOrigin::root(), asset_id, POOL_ACCOUNT, true, 1);
      set_cp_pool(asset, BASE, POOL_RESERVE, POOL_RESERVE);
      if asset_id <= BASKET_SIZE {
        set_cl_price(asset, PRECISION);
      }
    }
  });
  ext
}
