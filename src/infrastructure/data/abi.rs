// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@on1.no>

use crate::domain::constants::{
    STAKE_ARG_SLOTS, STAKE_SELECTOR, SWAP_SELECTOR, SWAP_ZERO_SLOTS,
};
use alloy::primitives::{Address, Bytes, U256};
use alloy::sol;
use alloy::sol_types::{SolCall, SolValue};

sol! {
    #[derive(Debug, PartialEq, Eq)]
    #[sol(rpc)]
    contract ERC20 {
        function balanceOf(address) external view returns (uint256);
        function allowance(address owner, address spender) external view returns (uint256);
        function approve(address spender, uint256 amount) external returns (bool);
    }
}

pub fn encode_approve(spender: Address, amount: U256) -> Bytes {
    ERC20::approveCall { spender, amount }.abi_encode().into()
}

/// `0x095e7a95` + `(sender, amountIn, 0, 0, 0, 0, 0)`. The trailing zeros are slippage
/// and padding fields the pool accepts as zero.
pub fn encode_swap(sender: Address, amount_in: U256) -> Bytes {
    let mut data = SWAP_SELECTOR.to_vec();
    data.extend_from_slice(&(sender, amount_in).abi_encode_params());
    for _ in 0..SWAP_ZERO_SLOTS {
        data.extend_from_slice(&U256::ZERO.to_be_bytes::<32>());
    }
    data.into()
}

/// `0x1a5f0f00` + ten `uint256` words, amount first, the rest reserved and zero.
pub fn encode_stake(amount: U256) -> Bytes {
    let mut words = [U256::ZERO; STAKE_ARG_SLOTS];
    words[0] = amount;
    let mut data = STAKE_SELECTOR.to_vec();
    for word in words {
        data.extend_from_slice(&word.to_be_bytes::<32>());
    }
    data.into()
}
