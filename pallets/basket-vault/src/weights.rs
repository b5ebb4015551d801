#![cfg_attr(rustfmt, rustfmt_skip)]
#![allow(unused_parens)]
#![allow(unused_imports)]
#![allow(missing_docs)]

use polkadot_sdk::frame_support::{traits::Get, weights::{Weight, constants::RocksDbWeight}};
use core::marker::PhantomData;

pub trait WeightInfo {
	fn deposit(n: u32) -> Weight;
	fn withdraw() -> Weight;
	fn withdraw_in_kind(n: u32) -> Weight;
	fn rebalance(n: u32) -> Weight;
	fn process_queue(n: u32) -> Weight;
	fn liquidate_all(n: u32) -> Weight;
	fn claim_fees() -> Weight;
	fn set_portfolio_config(n: u32) -> Weight;
}

/// `n` is the basket size for swap-bearing calls and the batch size for `process_queue`.
pub struct SubstrateWeight<T>(PhantomData<T>);
impl<T: polkadot_sdk::frame_system::Config> WeightInfo for SubstrateWeight<T> {
	fn deposit(n: u32) -> Weight {
		Weight::from_parts(60_000_000, 4000)
			.saturating_add(Weight::from_parts(45_000_000, 2500).saturating_mul(n.into()))
			.saturating_add(T::DbWeight::get().reads(8))
			.saturating_add(T::DbWeight::get().reads((4_u64).saturating_mul(n.into())))
			.saturating_add(T::DbWeight::get().writes(6))
			.saturating_add(T::DbWeight::get().writes((4_u64).saturating_mul(n.into())))
	}
	fn withdraw() -> Weight {
		Weight::from_parts(45_000_000, 3500)
			.saturating_add(T::DbWeight::get().reads(6))
			.saturating_add(T::DbWeight::get().writes(5))
	}
	fn withdraw_in_kind(n: u32) -> Weight {
		Weight::from_parts(50_000_000, 3500)
			.saturating_add(Weight::from_parts(60_000_000, 3000).saturating_mul(n.into()))
			.saturating_add(T::DbWeight::get().reads(6))
			.saturating_add(T::DbWeight::get().reads((5_u64).saturating_mul(n.into())))
			.saturating_add(T::DbWeight::get().writes(5))
			.saturating_add(T::DbWeight::get().writes((5_u64).saturating_mul(n.into())))
	}
	fn rebalance(n: u32) -> Weight {
		Weight::from_parts(40_000_000, 3000)
			.saturating_add(Weight::from_parts(70_000_000, 3000).saturating_mul(n.into()))
			.saturating_add(T::DbWeight::get().reads(5))
			.saturating_add(T::DbWeight::get().reads((6_u64).saturating_mul(n.into())))
			.saturating_add(T::DbWeight::get().writes(3))
			.saturating_add(T::DbWeight::get().writes((4_u64).saturating_mul(n.into())))
	}
	fn process_queue(n: u32) -> Weight {
		Weight::from_parts(30_000_000, 3000)
			.saturating_add(Weight::from_parts(55_000_000, 3000).saturating_mul(n.into()))
			.saturating_add(T::DbWeight::get().reads(4))
			.saturating_add(T::DbWeight::get().reads((5_u64).saturating_mul(n.into())))
			.saturating_add(T::DbWeight::get().writes(2))
			.saturating_add(T::DbWeight::get().writes((5_u64).saturating_mul(n.into())))
	}
	fn liquidate_all(n: u32) -> Weight {
		Weight::from_parts(80_000_000, 5000)
			.saturating_add(Weight::from_parts(75_000_000, 3500).saturating_mul(n.into()))
			.saturating_add(T::DbWeight::get().reads(8))
			.saturating_add(T::DbWeight::get().reads((5_u64).saturating_mul(n.into())))
			.saturating_add(T::DbWeight::get().writes(8))
			.saturating_add(T::DbWeight::get().writes((4_u64).saturating_mul(n.into())))
	}
	fn claim_fees() -> Weight {
		Weight::from_parts(35_000_000, 3000)
			.saturating_add(T::DbWeight::get().reads(5))
			.saturating_add(T::DbWeight::get().writes(4))
	}
	fn set_portfolio_config(n: u32) -> Weight {
		Weight::from_parts(20_000_000, 2000)
			.saturating_add(Weight::from_parts(150_000, 0).saturating_mul(n.into()))
			.saturating_add(T::DbWeight::get().writes(2))
	}
}

impl WeightInfo for () {
	fn deposit(n: u32) -> Weight {
		Weight::from_parts(60_000_000, 4000)
			.saturating_add(Weight::from_parts(45_000_000, 2500).saturating_mul(n.into()))
			.saturating_add(RocksDbWeight::get().reads(8))
			.saturating_add(RocksDbWeight::get().writes(6))
	}
	fn withdraw() -> Weight {
		Weight::from_parts(45_000_000, 3500)
			.saturating_add(RocksDbWeight::get().reads(6))
			.saturating_add(RocksDbWeight::get().writes(5))
	}
	fn withdraw_in_kind(n: u32) -> Weight {
		Weight::from_parts(50_000_000, 3500)
			.saturating_add(Weight::from_parts(60_000_000, 3000).saturating_mul(n.into()))
	}
	fn rebalance(n: u32) -> Weight {
		Weight::from_parts(40_000_000, 3000)
			.saturating_add(Weight::from_parts(70_000_000, 3000).saturating_mul(n.into()))
	}
	fn process_queue(n: u32) -> Weight {
		Weight::from_parts(30_000_000, 3000)
			.saturating_add(Weight::from_parts(55_000_000, 3000).saturating_mul(n.into()))
	}
	fn liquidate_all(n: u32) -> Weight {
		Weight::from_parts(80_000_000, 5000)
			.saturating_add(Weight::from_parts(75_000_000, 3500).saturating_mul(n.into()))
	}
	fn claim_fees() -> Weight {
		Weight::from_parts(35_000_000, 3000)
			.saturating_add(RocksDbWeight::get().reads(5))
			.saturating_add(RocksDbWeight::get().writes(4))
	}
	fn set_portfolio_config(n: u32) -> Weight {
		Weight::from_parts(20_000_000, 2000)
			.saturating_add(Weight::from_parts(150_000, 0).saturating_mul(n.into()))
	}
}
