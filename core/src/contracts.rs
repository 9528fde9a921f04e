use ethers::abi::{parse_abi, Detokenize, Tokenize};
use ethers::contract::BaseContract;
use ethers::types::{Address, Bytes, U256};
use thiserror::Error;

// ── Interface definitions ─────────────────────────────────────────────────────

const MIXER_ABI: &[&str] = &["function split(address recipient, uint256 rounds) external payable"];

const STAKING_ABI: &[&str] = &[
    "function deposit(uint256 amount) external",
    "function withdrawCapital(uint256 amount) external",
    "function claimReward() external",
    "function getClaimableAmount(address investor, uint256 nftBalance) external view returns (uint256)",
    "function depositInfo(address investor) external view returns (uint256, uint256)",
    "function claimInfo(address investor) external view returns (uint256, uint256, uint256)",
];

const TOKEN_ABI: &[&str] = &[
    "function approve(address spender, uint256 amount) external returns (bool)",
    "function allowance(address owner, address spender) external view returns (uint256)",
    "function balanceOf(address account) external view returns (uint256)",
    "function decimals() external view returns (uint8)",
];

#[derive(Error, Debug)]
pub enum ContractError {
    #[error("Invalid ABI definition: {0}")]
    Abi(String),

    #[error("Failed to encode {function}: {details}")]
    Encode {
        function: &'static str,
        details: String,
    },

    #[error("Failed to decode {function} output: {details}")]
    Decode {
        function: &'static str,
        details: String,
    },
}

/// A contract invocation ready to hand to the wallet: target, calldata and
/// attached native value.
#[derive(Debug, Clone, PartialEq)]
pub struct ContractCall {
    pub to: Address,
    pub function: &'static str,
    pub data: Bytes,
    pub value: U256,
}

#[derive(Debug, Clone)]
struct Interface {
    address: Address,
    abi: BaseContract,
}

impl Interface {
    fn new(address: Address, definition: &[&str]) -> Result<Self, ContractError> {
        let abi = parse_abi(definition).map_err(|e| ContractError::Abi(e.to_string()))?;
        Ok(Self {
            address,
            abi: BaseContract::from(abi),
        })
    }

    fn call<T: Tokenize>(
        &self,
        function: &'static str,
        args: T,
        value: U256,
    ) -> Result<ContractCall, ContractError> {
        let data = self
            .abi
            .encode(function, args)
            .map_err(|e| ContractError::Encode {
                function,
                details: e.to_string(),
            })?;
        Ok(ContractCall {
            to: self.address,
            function,
            data,
            value,
        })
    }

    fn decode<D: Detokenize>(&self, function: &'static str, output: &Bytes) -> Result<D, ContractError> {
        self.abi
            .decode_output(function, output)
            .map_err(|e| ContractError::Decode {
                function,
                details: e.to_string(),
            })
    }
}

// ── Mixer ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Mixer(Interface);

impl Mixer {
    pub fn new(address: Address) -> Result<Self, ContractError> {
        Interface::new(address, MIXER_ABI).map(Self)
    }

    pub fn address(&self) -> Address {
        self.0.address
    }

    /// `split(recipient, rounds)` paying `value` wei into the mixer.
    pub fn split(
        &self,
        recipient: Address,
        rounds: u64,
        value: U256,
    ) -> Result<ContractCall, ContractError> {
        self.0.call("split", (recipient, U256::from(rounds)), value)
    }
}

// ── Staking ───────────────────────────────────────────────────────────────────

/// `depositInfo(investor)` result.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DepositInfo {
    pub amount: U256,
    pub deposited_at: U256,
}

/// `claimInfo(investor)` result.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ClaimInfo {
    pub earned: U256,
    pub last_claim_at: U256,
    pub next_claim_at: U256,
}

#[derive(Debug, Clone)]
pub struct Staking(Interface);

impl Staking {
    pub fn new(address: Address) -> Result<Self, ContractError> {
        Interface::new(address, STAKING_ABI).map(Self)
    }

    pub fn address(&self) -> Address {
        self.0.address
    }

    pub fn deposit(&self, amount: U256) -> Result<ContractCall, ContractError> {
        self.0.call("deposit", amount, U256::zero())
    }

    pub fn withdraw_capital(&self, amount: U256) -> Result<ContractCall, ContractError> {
        self.0.call("withdrawCapital", amount, U256::zero())
    }

    pub fn claim_reward(&self) -> Result<ContractCall, ContractError> {
        self.0.call("claimReward", (), U256::zero())
    }

    pub fn get_claimable_amount(
        &self,
        investor: Address,
        nft_balance: U256,
    ) -> Result<ContractCall, ContractError> {
        self.0
            .call("getClaimableAmount", (investor, nft_balance), U256::zero())
    }

    pub fn decode_claimable_amount(&self, output: &Bytes) -> Result<U256, ContractError> {
        self.0.decode("getClaimableAmount", output)
    }

    pub fn deposit_info(&self, investor: Address) -> Result<ContractCall, ContractError> {
        self.0.call("depositInfo", investor, U256::zero())
    }

    pub fn decode_deposit_info(&self, output: &Bytes) -> Result<DepositInfo, ContractError> {
        let (amount, deposited_at): (U256, U256) = self.0.decode("depositInfo", output)?;
        Ok(DepositInfo {
            amount,
            deposited_at,
        })
    }

    pub fn claim_info(&self, investor: Address) -> Result<ContractCall, ContractError> {
        self.0.call("claimInfo", investor, U256::zero())
    }

    pub fn decode_claim_info(&self, output: &Bytes) -> Result<ClaimInfo, ContractError> {
        let (earned, last_claim_at, next_claim_at): (U256, U256, U256) =
            self.0.decode("claimInfo", output)?;
        Ok(ClaimInfo {
            earned,
            last_claim_at,
            next_claim_at,
        })
    }
}

// ── Staked token ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct StakeToken(Interface);

impl StakeToken {
    pub fn new(address: Address) -> Result<Self, ContractError> {
        Interface::new(address, TOKEN_ABI).map(Self)
    }

    pub fn address(&self) -> Address {
        self.0.address
    }

    pub fn approve(&self, spender: Address, amount: U256) -> Result<ContractCall, ContractError> {
        self.0.call("approve", (spender, amount), U256::zero())
    }

    pub fn allowance(&self, owner: Address, spender: Address) -> Result<ContractCall, ContractError> {
        self.0.call("allowance", (owner, spender), U256::zero())
    }

    pub fn decode_allowance(&self, output: &Bytes) -> Result<U256, ContractError> {
        self.0.decode("allowance", output)
    }

    pub fn balance_of(&self, account: Address) -> Result<ContractCall, ContractError> {
        self.0.call("balanceOf", account, U256::zero())
    }

    pub fn decode_balance_of(&self, output: &Bytes) -> Result<U256, ContractError> {
        self.0.decode("balanceOf", output)
    }

    pub fn decimals(&self) -> Result<ContractCall, ContractError> {
        self.0.call("decimals", (), U256::zero())
    }

    pub fn decode_decimals(&self, output: &Bytes) -> Result<u8, ContractError> {
        self.0.decode("decimals", output)
    }
}

/// The three contracts the forms talk to.
#[derive(Debug, Clone)]
pub struct Deployment {
    pub mixer: Mixer,
    pub staking: Staking,
    pub token: StakeToken,
}

impl Deployment {
    pub fn new(mixer: Address, staking: Address, token: Address) -> Result<Self, ContractError> {
        Ok(Self {
            mixer: Mixer::new(mixer)?,
            staking: Staking::new(staking)?,
            token: StakeToken::new(token)?,
        })
    }
}
