//! Workloads and the contract calls they encode.

use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::SolCall;

alloy_sol_macro::sol! {
    interface IMintableErc20 {
        function mint(address to, uint256 amount) external;
        function transfer(address to, uint256 amount) external returns (bool);
    }

    interface IMintableErc721 {
        function mint(address to) external;
        function transferFrom(address from, address to, uint256 tokenId) external;
    }

    interface IMintableErc1155 {
        function mint(address to, uint256 amount) external;
        function safeTransferFrom(
            address from,
            address to,
            uint256 id,
            uint256 amount,
            bytes data
        ) external;
    }
}

/// Gas limit used for plain value transfers.
pub const NATIVE_TRANSFER_GAS_LIMIT: u64 = 21_000;

/// Gas limit used for token contract calls.
pub const CONTRACT_CALL_GAS_LIMIT: u64 = 200_000;

/// The kind of transaction a run sends, without its parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkloadKind {
    /// ERC20 `mint(to, amount)`.
    Erc20Mint,
    /// ERC20 `transfer(to, amount)`.
    Erc20Transfer,
    /// ERC721 `mint(to)`.
    Erc721Mint,
    /// ERC721 `transferFrom(owner, to, id)`.
    Erc721Transfer,
    /// ERC1155 `mint(to, amount)`.
    Erc1155Mint,
    /// ERC1155 `safeTransferFrom(owner, to, id, amount, "")`.
    Erc1155Transfer,
    /// Value transfer from a single sender.
    NativeTransfer,
    /// Value transfer spread round-robin over several senders.
    MultiTransfer,
}

impl WorkloadKind {
    /// Returns the label used in results file names.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Erc20Mint => "mint_erc20",
            Self::Erc20Transfer => "transfer_erc20",
            Self::Erc721Mint => "mint_erc721",
            Self::Erc721Transfer => "transfer_erc721",
            Self::Erc1155Mint => "mint_erc1155",
            Self::Erc1155Transfer => "transfer_erc1155",
            Self::NativeTransfer => "transfer_native",
            Self::MultiTransfer => "transfer_multi",
        }
    }

    /// Returns `true` for workloads that call a token contract.
    pub const fn is_contract_call(&self) -> bool {
        !matches!(self, Self::NativeTransfer | Self::MultiTransfer)
    }

    /// Returns the gas limit used when the configuration does not set one.
    pub const fn default_gas_limit(&self) -> u64 {
        if self.is_contract_call() { CONTRACT_CALL_GAS_LIMIT } else { NATIVE_TRANSFER_GAS_LIMIT }
    }
}

/// A workload with its target contract and amounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Workload {
    /// ERC20 mint of `amount` to the recipient.
    Erc20Mint {
        /// Token contract.
        token: Address,
        /// Minted amount.
        amount: U256,
    },
    /// ERC20 transfer of `amount` to the recipient.
    Erc20Transfer {
        /// Token contract.
        token: Address,
        /// Transferred amount.
        amount: U256,
    },
    /// ERC721 mint to the sender.
    Erc721Mint {
        /// Token contract.
        token: Address,
    },
    /// ERC721 transfer of token `id` from the sender to the recipient.
    Erc721Transfer {
        /// Token contract.
        token: Address,
    },
    /// ERC1155 mint of `amount` to the sender.
    Erc1155Mint {
        /// Token contract.
        token: Address,
        /// Minted amount.
        amount: U256,
    },
    /// ERC1155 transfer of `amount` of token `id` from the sender to the recipient.
    Erc1155Transfer {
        /// Token contract.
        token: Address,
        /// Transferred amount.
        amount: U256,
    },
    /// Value transfer from the shared sender.
    NativeTransfer {
        /// Transferred value in wei.
        value: U256,
    },
    /// Value transfer from one of several senders.
    MultiTransfer {
        /// Transferred value in wei.
        value: U256,
    },
}

/// Target, value and calldata of one transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    /// Callee or value recipient.
    pub to: Address,
    /// Attached value in wei.
    pub value: U256,
    /// ABI encoded calldata; empty for value transfers.
    pub input: Bytes,
}

impl Workload {
    /// Returns the parameterless kind.
    pub const fn kind(&self) -> WorkloadKind {
        match self {
            Self::Erc20Mint { .. } => WorkloadKind::Erc20Mint,
            Self::Erc20Transfer { .. } => WorkloadKind::Erc20Transfer,
            Self::Erc721Mint { .. } => WorkloadKind::Erc721Mint,
            Self::Erc721Transfer { .. } => WorkloadKind::Erc721Transfer,
            Self::Erc1155Mint { .. } => WorkloadKind::Erc1155Mint,
            Self::Erc1155Transfer { .. } => WorkloadKind::Erc1155Transfer,
            Self::NativeTransfer { .. } => WorkloadKind::NativeTransfer,
            Self::MultiTransfer { .. } => WorkloadKind::MultiTransfer,
        }
    }

    /// Returns the label used in results file names.
    pub const fn label(&self) -> &'static str {
        self.kind().label()
    }

    /// Builds the call for task `id` sent by `sender` towards `recipient`.
    ///
    /// Token transfers move token `id`, which the sender is expected to own.
    pub fn call(&self, id: u64, sender: Address, recipient: Address) -> Call {
        let token_id = U256::from(id);
        let contract =
            |to: Address, input: Vec<u8>| Call { to, value: U256::ZERO, input: input.into() };

        match *self {
            Self::Erc20Mint { token, amount } => {
                contract(token, IMintableErc20::mintCall { to: recipient, amount }.abi_encode())
            }
            Self::Erc20Transfer { token, amount } => contract(
                token,
                IMintableErc20::transferCall { to: recipient, amount }.abi_encode(),
            ),
            Self::Erc721Mint { token } => {
                contract(token, IMintableErc721::mintCall { to: sender }.abi_encode())
            }
            Self::Erc721Transfer { token } => contract(
                token,
                IMintableErc721::transferFromCall { from: sender, to: recipient, tokenId: token_id }
                    .abi_encode(),
            ),
            Self::Erc1155Mint { token, amount } => {
                contract(token, IMintableErc1155::mintCall { to: sender, amount }.abi_encode())
            }
            Self::Erc1155Transfer { token, amount } => contract(
                token,
                IMintableErc1155::safeTransferFromCall {
                    from: sender,
                    to: recipient,
                    id: token_id,
                    amount,
                    data: Bytes::new(),
                }
                .abi_encode(),
            ),
            Self::NativeTransfer { value } | Self::MultiTransfer { value } => {
                Call { to: recipient, value, input: Bytes::new() }
            }
        }
    }
}
