//! Shared primitive types used across the authorization core.

/// A stable, unique identifier for a money account.
pub type AccountId = String;

/// Reference to a ledger-side posting (hold, release, withdrawal).
pub type TransactionRef = String;

/// Account tier identifier.
pub type TierId = i64;

/// Client classification axis (individual, merchant, NGO, ...).
pub type ClientTypeId = i64;

/// Activation channel axis (branch, agent, digital, ...).
pub type ChannelId = i64;

/// Bank identifier for inter-bank transfers.
pub type BankId = i64;

/// A currency-scaled monetary amount.
pub type Amount = rust_decimal::Decimal;
