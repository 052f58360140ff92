//! Contract ABIs and calldata builders

use alloy::primitives::{Address, Bytes, U256};
use alloy::sol;
use alloy::sol_types::SolCall;

sol! {
    interface IERC20 {
        function symbol() external view returns (string);
        function decimals() external view returns (uint8);
        function balanceOf(address account) external view returns (uint256);
        function allowance(address owner, address spender) external view returns (uint256);
        function approve(address spender, uint256 value) external returns (bool);
        function transfer(address to, uint256 value) external returns (bool);
    }
}

sol! {
    interface IUniswapV2Router02 {
        function factory() external view returns (address);
        function WETH() external view returns (address);
        function getAmountsOut(uint256 amountIn, address[] path) external view returns (uint256[] amounts);
        function getAmountsIn(uint256 amountOut, address[] path) external view returns (uint256[] amounts);
        function swapExactTokensForTokens(uint256 amountIn, uint256 amountOutMin, address[] path, address to, uint256 deadline) external returns (uint256[] amounts);
        function swapExactETHForTokens(uint256 amountOutMin, address[] path, address to, uint256 deadline) external payable returns (uint256[] amounts);
        function swapExactTokensForETH(uint256 amountIn, uint256 amountOutMin, address[] path, address to, uint256 deadline) external returns (uint256[] amounts);
    }
}

pub fn erc20_approve(spender: Address, value: U256) -> Bytes {
    IERC20::approveCall { spender, value }.abi_encode().into()
}

pub fn erc20_transfer(to: Address, value: U256) -> Bytes {
    IERC20::transferCall { to, value }.abi_encode().into()
}

/// Swap calldata selected by which side is the native coin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwapCall {
    /// native -> token, `value` carries the input
    ExactEthForTokens {
        amount_out_min: U256,
        path: Vec<Address>,
        to: Address,
        deadline: U256,
    },
    /// token -> native
    ExactTokensForEth {
        amount_in: U256,
        amount_out_min: U256,
        path: Vec<Address>,
        to: Address,
        deadline: U256,
    },
    /// token -> token
    ExactTokensForTokens {
        amount_in: U256,
        amount_out_min: U256,
        path: Vec<Address>,
        to: Address,
        deadline: U256,
    },
}

impl SwapCall {
    pub fn function_name(&self) -> &'static str {
        match self {
            SwapCall::ExactEthForTokens { .. } => "swapExactETHForTokens",
            SwapCall::ExactTokensForEth { .. } => "swapExactTokensForETH",
            SwapCall::ExactTokensForTokens { .. } => "swapExactTokensForTokens",
        }
    }

    pub fn encode(&self) -> Bytes {
        match self.clone() {
            SwapCall::ExactEthForTokens {
                amount_out_min,
                path,
                to,
                deadline,
            } => IUniswapV2Router02::swapExactETHForTokensCall {
                amountOutMin: amount_out_min,
                path,
                to,
                deadline,
            }
            .abi_encode()
            .into(),
            SwapCall::ExactTokensForEth {
                amount_in,
                amount_out_min,
                path,
                to,
                deadline,
            } => IUniswapV2Router02::swapExactTokensForETHCall {
                amountIn: amount_in,
                amountOutMin: amount_out_min,
                path,
                to,
                deadline,
            }
            .abi_encode()
            .into(),
            SwapCall::ExactTokensForTokens {
                amount_in,
                amount_out_min,
                path,
                to,
                deadline,
            } => IUniswapV2Router02::swapExactTokensForTokensCall {
                amountIn: amount_in,
                amountOutMin: amount_out_min,
                path,
                to,
                deadline,
            }
            .abi_encode()
            .into(),
        }
    }
}
