use alloy::primitives::{address, Address, Bytes, U256};
use alloy::sol_types::SolCall;

use crate::models::PendingAction;

/// Position contract on BSC mainnet.
pub const DEFAULT_CONTRACT_ADDRESS: Address = address!("0x1b3f2f99cc5eaD46084075751372F9dE9133f18e");

/// Prices are fixed-point with this many decimals.
pub const PRICE_DECIMALS: u8 = 8;

alloy::sol! {
    /// Payable position entry points of the trading contract.
    interface IPositionBook {
        function long(uint8 pair, uint256 targetPrice, uint256 duration, bool stakeUSDT, uint256 usdtAmount) external payable;
        function short(uint8 pair, uint256 targetPrice, uint256 duration, bool stakeUSDT, uint256 usdtAmount) external payable;
    }
}

/// ABI-encode the contract call for `action`. The stake travels as the
/// transaction value, not as an argument.
pub fn encode_call(action: &PendingAction) -> Bytes {
    match action {
        PendingAction::IncreasePosition(p) => {
            let call = IPositionBook::longCall {
                pair: p.pair,
                targetPrice: p.target_price,
                duration: U256::from(p.duration_secs),
                stakeUSDT: p.use_secondary_asset,
                usdtAmount: p.secondary_asset_amount,
            };
            Bytes::from(call.abi_encode())
        }
        PendingAction::DecreasePosition(p) => {
            let call = IPositionBook::shortCall {
                pair: p.pair,
                targetPrice: p.target_price,
                duration: U256::from(p.duration_secs),
                stakeUSDT: p.use_secondary_asset,
                usdtAmount: p.secondary_asset_amount,
            };
            Bytes::from(call.abi_encode())
        }
    }
}

/// Contract function name, for logs.
pub fn function_name(action: &PendingAction) -> &'static str {
    match action {
        PendingAction::IncreasePosition(_) => "long",
        PendingAction::DecreasePosition(_) => "short",
    }
}
