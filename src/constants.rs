/// Well-known token addresses (lowercase hex)
///
/// Stablecoin entries let the webhook parser attach a USD value before the
/// market-data lookup runs. Keep these lowercase; address comparison across
/// the codebase is done on the lowercase form.
pub mod tokens {
    /// Wrapped Ether
    pub const WETH: &str = "0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2";
    /// USDC (Circle USD Coin)
    pub const USDC: &str = "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48";
    /// USDT (Tether USD)
    pub const USDT: &str = "0xdac17f958d2ee523a2206206994597c13d831ec7";
    /// DAI (Maker stablecoin)
    pub const DAI: &str = "0x6b175474e89094c44da98b954eedeac495271d0f";
}

/// DEX router addresses used by swap classification (lowercase hex)
pub mod routers {
    /// Uniswap V2 Router02
    pub const UNISWAP_V2: &str = "0x7a250d5630b4cf539739df2c5dacb4c659f2488d";
    /// Uniswap V3 SwapRouter
    pub const UNISWAP_V3: &str = "0xe592427a0aece92de3edee1f18e0157c05861564";
    /// Uniswap Universal Router
    pub const UNISWAP_UNIVERSAL: &str = "0x3fc91a3afd70395cd496c647d5a6cc9d4b2b7fad";
    /// SushiSwap Router
    pub const SUSHISWAP: &str = "0xd9e1ce17f2641f24ae83637ab66a2cca9c378b9f";
    /// 1inch Aggregation Router v5
    pub const ONEINCH_V5: &str = "0x1111111254eeb25477b68fb85ed929f73a960582";
    /// 0x Exchange Proxy
    pub const ZEROX_PROXY: &str = "0xdef1c0ded9bec7f1a1670819833240f027b25eff";
}

/// Stablecoin symbols treated as 1:1 with USD during pre-enrichment
pub const STABLE_SYMBOLS: [&str; 3] = ["USDC", "USDT", "DAI"];
