use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Currencies offered by the transfer form's source/destination selectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Token {
    #[default]
    Eth,
    Usdt,
    Usdc,
}

impl Token {
    pub const ALL: [Token; 3] = [Token::Eth, Token::Usdt, Token::Usdc];

    pub fn symbol(&self) -> &'static str {
        match self {
            Token::Eth => "ETH",
            Token::Usdt => "USDT",
            Token::Usdc => "USDC",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Token::Eth => "Ethereum",
            Token::Usdt => "Tether",
            Token::Usdc => "USD Coin",
        }
    }

    /// Selector caption, e.g. `Ethereum (ETH)`.
    pub fn label(&self) -> String {
        format!("{} ({})", self.name(), self.symbol())
    }
}
