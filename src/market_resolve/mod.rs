// ============================================================================
// Market Resolve Module - Pricing & Settlement Arithmetic
// ============================================================================
//
//   - odds: yes-percentage, decimal odds and potential returns
//   - settlement: pari-mutuel payouts when a market is resolved
//
// ============================================================================

pub mod odds;
pub mod settlement;

pub use odds::*;
pub use settlement::*;
