//! Ecosystem constants for the basket vault
//!
//! Pallet identifiers used to derive custody accounts and the numeric bounds that the
//! portfolio configuration is validated against. Runtime configurations and mocks re-use
//! these values so that every deployment agrees on precision and limits.

/// Balance type alias for consistency across the workspace
pub type Balance = u128;

/// Pallet identifiers for deriving pallet-owned accounts.
pub mod pallet_ids {
  /// Basket vault custody account
  pub const BASKET_VAULT_PALLET_ID: &[u8; 8] = b"bsktvlt0";
}

/// Mathematical constants and configuration bounds.
pub mod params {
  use super::Balance;
  use sp_arithmetic::Permill;

  /// Precision scalar for unit prices (10^12).
  ///
  /// A unit price is the base-asset amount received for `PRECISION` units of an asset,
  /// so `value = holdings * price / PRECISION`.
  pub const PRECISION: Balance = 1_000_000_000_000;

  /// Precision of a depositor's share of the pool during in-kind withdrawals (10^18).
  pub const SHARE_PRECISION: Balance = 1_000_000_000_000_000_000;

  /// Smallest basket the vault may be configured with.
  pub const MIN_BASKET_SIZE: u32 = 10;

  /// Largest basket the vault may be configured with.
  pub const MAX_BASKET_SIZE: u32 = 150;

  /// Upper bound for deposit and withdrawal fee rates (3%).
  pub const MAX_FEE_RATE: Permill = Permill::from_percent(3);

  /// Upper bound for the slippage tolerance applied to routed swaps (10%).
  pub const MAX_SLIPPAGE_TOLERANCE: Permill = Permill::from_percent(10);

  /// Blocks a deferred operation waits before it becomes eligible again (10 blocks ~ 1 minute).
  pub const RETRY_COOLDOWN_BLOCKS: u32 = 10;

  /// Blocks a venue has to satisfy the minimum output of a routed swap.
  pub const SWAP_VALIDITY_BLOCKS: u32 = 1;
}
