//! vbUSDC -> WETH swaps through the Sushi V2 router

use alloy::primitives::{Address, B256, U256};
use alloy::providers::DynProvider;
use async_trait::async_trait;
use tracing::info;

use crate::chain::contracts::{ISushiV2Router, IERC20};
use crate::chain::{chain_err, TxOutcome};
use crate::types::{AgentError, Result};

/// Swap deadline offset
pub const SWAP_DEADLINE_SECS: u64 = 20 * 60;

/// Executes an exact-input swap and returns the swap transaction hash
#[async_trait]
pub trait SwapExecutor: Send + Sync {
    async fn swap_exact_in(
        &self,
        amount_in: U256,
        min_amount_out: U256,
        recipient: Address,
    ) -> Result<B256>;
}

/// Token and router calls behind the swap flow. Writes resolve once mined.
#[async_trait]
pub trait RouterCalls: Send + Sync {
    async fn allowance(&self, token: Address, owner: Address, spender: Address) -> Result<U256>;

    async fn approve(&self, token: Address, spender: Address, amount: U256) -> Result<TxOutcome>;

    async fn swap_exact_tokens_for_tokens(
        &self,
        router: Address,
        amount_in: U256,
        min_amount_out: U256,
        path: Vec<Address>,
        recipient: Address,
        deadline: u64,
    ) -> Result<TxOutcome>;
}

/// [`RouterCalls`] over contract bindings, signed by the provider's wallet
pub struct ContractRouterCalls {
    provider: DynProvider,
}

impl ContractRouterCalls {
    pub fn new(provider: DynProvider) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl RouterCalls for ContractRouterCalls {
    async fn allowance(&self, token: Address, owner: Address, spender: Address) -> Result<U256> {
        let token = IERC20::new(token, self.provider.clone());
        let result = token.allowance(owner, spender).call().await.map_err(chain_err)?;
        Ok(result.remaining)
    }

    async fn approve(&self, token: Address, spender: Address, amount: U256) -> Result<TxOutcome> {
        let token = IERC20::new(token, self.provider.clone());
        let receipt = token
            .approve(spender, amount)
            .send()
            .await
            .map_err(chain_err)?
            .get_receipt()
            .await
            .map_err(chain_err)?;
        Ok(TxOutcome::from(&receipt))
    }

    async fn swap_exact_tokens_for_tokens(
        &self,
        router: Address,
        amount_in: U256,
        min_amount_out: U256,
        path: Vec<Address>,
        recipient: Address,
        deadline: u64,
    ) -> Result<TxOutcome> {
        let router = ISushiV2Router::new(router, self.provider.clone());
        let receipt = router
            .swapExactTokensForTokens(amount_in, min_amount_out, path, recipient, U256::from(deadline))
            .send()
            .await
            .map_err(chain_err)?
            .get_receipt()
            .await
            .map_err(chain_err)?;
        Ok(TxOutcome::from(&receipt))
    }
}

/// Router-backed executor. Tokens are spent from the operator wallet.
pub struct RouterSwapExecutor<C = ContractRouterCalls> {
    calls: C,
    owner: Address,
    router: Address,
    token_in: Address,
    token_out: Address,
}

impl RouterSwapExecutor {
    pub fn new(
        provider: DynProvider,
        owner: Address,
        router: Address,
        token_in: Address,
        token_out: Address,
    ) -> Self {
        Self::with_calls(ContractRouterCalls::new(provider), owner, router, token_in, token_out)
    }
}

impl<C: RouterCalls> RouterSwapExecutor<C> {
    pub fn with_calls(
        calls: C,
        owner: Address,
        router: Address,
        token_in: Address,
        token_out: Address,
    ) -> Self {
        Self {
            calls,
            owner,
            router,
            token_in,
            token_out,
        }
    }

    fn check_configured(&self) -> Result<()> {
        if self.token_in.is_zero() || self.token_out.is_zero() {
            return Err(AgentError::Config(
                "Token addresses not configured. Set VBUSDC_TOKEN_ADDRESS and WETH_TOKEN_ADDRESS"
                    .to_string(),
            ));
        }
        if self.router.is_zero() {
            return Err(AgentError::Config(
                "Router address not configured. Set SUSHI_ROUTER_ADDRESS".to_string(),
            ));
        }
        Ok(())
    }

    /// Approve the router for exactly `amount_in` when the current allowance is short
    async fn ensure_allowance(&self, amount_in: U256) -> Result<()> {
        let allowance = self
            .calls
            .allowance(self.token_in, self.owner, self.router)
            .await?;

        if allowance >= amount_in {
            return Ok(());
        }

        info!(%allowance, %amount_in, router = %self.router, "Approving router");
        let approval = self
            .calls
            .approve(self.token_in, self.router, amount_in)
            .await?;

        if !approval.success {
            return Err(AgentError::Chain(format!("approval reverted: {}", approval.tx_hash)));
        }
        info!(tx = %approval.tx_hash, "Router approval mined");
        Ok(())
    }
}

#[async_trait]
impl<C: RouterCalls> SwapExecutor for RouterSwapExecutor<C> {
    async fn swap_exact_in(
        &self,
        amount_in: U256,
        min_amount_out: U256,
        recipient: Address,
    ) -> Result<B256> {
        self.check_configured()?;
        self.ensure_allowance(amount_in).await?;

        let deadline = chrono::Utc::now().timestamp().max(0) as u64 + SWAP_DEADLINE_SECS;

        info!(%amount_in, %min_amount_out, %recipient, "Submitting swapExactTokensForTokens");
        let swap = self
            .calls
            .swap_exact_tokens_for_tokens(
                self.router,
                amount_in,
                min_amount_out,
                vec![self.token_in, self.token_out],
                recipient,
                deadline,
            )
            .await?;

        if !swap.success {
            return Err(AgentError::Chain(format!("swap reverted: {}", swap.tx_hash)));
        }

        info!(tx = %swap.tx_hash, "Swap mined");
        Ok(swap.tx_hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::ChainContext;
    use std::sync::Mutex;

    const OWNER: Address = Address::new([0x01; 20]);
    const ROUTER: Address = Address::new([0x02; 20]);
    const USDC: Address = Address::new([0x03; 20]);
    const WETH: Address = Address::new([0x04; 20]);
    const AGENT: Address = Address::new([0x05; 20]);

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Allowance { token: Address, owner: Address, spender: Address },
        Approve { token: Address, spender: Address, amount: U256 },
        Swap { amount_in: U256, min_out: U256, path: Vec<Address>, recipient: Address, deadline: u64 },
    }

    struct RecordingCalls {
        allowance: U256,
        approve_succeeds: bool,
        swap_succeeds: bool,
        calls: Mutex<Vec<Call>>,
    }

    impl RecordingCalls {
        fn new(allowance: u64) -> Self {
            Self {
                allowance: U256::from(allowance),
                approve_succeeds: true,
                swap_succeeds: true,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RouterCalls for RecordingCalls {
        async fn allowance(&self, token: Address, owner: Address, spender: Address) -> Result<U256> {
            self.calls.lock().unwrap().push(Call::Allowance { token, owner, spender });
            Ok(self.allowance)
        }

        async fn approve(&self, token: Address, spender: Address, amount: U256) -> Result<TxOutcome> {
            self.calls.lock().unwrap().push(Call::Approve { token, spender, amount });
            Ok(TxOutcome {
                tx_hash: B256::repeat_byte(0xaa),
                success: self.approve_succeeds,
            })
        }

        async fn swap_exact_tokens_for_tokens(
            &self,
            _router: Address,
            amount_in: U256,
            min_amount_out: U256,
            path: Vec<Address>,
            recipient: Address,
            deadline: u64,
        ) -> Result<TxOutcome> {
            self.calls.lock().unwrap().push(Call::Swap {
                amount_in,
                min_out: min_amount_out,
                path,
                recipient,
                deadline,
            });
            Ok(TxOutcome {
                tx_hash: B256::repeat_byte(0xbb),
                success: self.swap_succeeds,
            })
        }
    }

    fn executor(calls: RecordingCalls) -> RouterSwapExecutor<RecordingCalls> {
        RouterSwapExecutor::with_calls(calls, OWNER, ROUTER, USDC, WETH)
    }

    #[tokio::test]
    async fn test_sufficient_allowance_skips_approval() {
        let executor = executor(RecordingCalls::new(5_000));

        let tx = executor
            .swap_exact_in(U256::from(5_000u64), U256::from(7u64), AGENT)
            .await
            .unwrap();
        assert_eq!(tx, B256::repeat_byte(0xbb));

        let calls = executor.calls.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(
            calls[0],
            Call::Allowance { token: USDC, owner: OWNER, spender: ROUTER }
        );
        assert!(matches!(calls[1], Call::Swap { .. }));
    }

    #[tokio::test]
    async fn test_short_allowance_approves_exact_amount_before_swap() {
        let executor = executor(RecordingCalls::new(10));
        let before = chrono::Utc::now().timestamp() as u64;

        executor
            .swap_exact_in(U256::from(1_000_000u64), U256::from(42u64), AGENT)
            .await
            .unwrap();

        let after = chrono::Utc::now().timestamp() as u64;
        let calls = executor.calls.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(
            calls[1],
            Call::Approve { token: USDC, spender: ROUTER, amount: U256::from(1_000_000u64) }
        );
        match &calls[2] {
            Call::Swap { amount_in, min_out, path, recipient, deadline } => {
                assert_eq!(*amount_in, U256::from(1_000_000u64));
                assert_eq!(*min_out, U256::from(42u64));
                assert_eq!(path, &vec![USDC, WETH]);
                assert_eq!(*recipient, AGENT);
                assert!(*deadline >= before + SWAP_DEADLINE_SECS);
                assert!(*deadline <= after + SWAP_DEADLINE_SECS);
            }
            other => panic!("expected swap, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_reverted_approval_stops_before_swap() {
        let mut calls = RecordingCalls::new(0);
        calls.approve_succeeds = false;
        let executor = executor(calls);

        let err = executor
            .swap_exact_in(U256::from(100u64), U256::ZERO, AGENT)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("approval reverted"));
        assert!(!executor
            .calls
            .calls()
            .iter()
            .any(|c| matches!(c, Call::Swap { .. })));
    }

    #[tokio::test]
    async fn test_reverted_swap_is_an_error() {
        let mut calls = RecordingCalls::new(1_000);
        calls.swap_succeeds = false;
        let executor = executor(calls);

        let err = executor
            .swap_exact_in(U256::from(100u64), U256::ZERO, AGENT)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("swap reverted"));
    }

    #[tokio::test]
    async fn test_unconfigured_tokens_fail_before_rpc() {
        let provider = ChainContext::read_only("http://127.0.0.1:1").unwrap();
        let executor = RouterSwapExecutor::new(
            provider,
            Address::ZERO,
            Address::repeat_byte(0x11),
            Address::ZERO,
            Address::ZERO,
        );

        let err = executor
            .swap_exact_in(U256::from(1u64), U256::ZERO, Address::ZERO)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Token addresses not configured"));
    }
}
