//! Solidity bindings for the contracts the backend talks to

alloy::sol! {
    /// SovereignAgentRegistry (minimal surface used by the backend)
    #[sol(rpc)]
    interface ISovereignAgentRegistry {
        event AgentRegistered(
            address indexed human,
            address indexed agentWallet,
            uint256 initialTrustScore,
            uint256 timestamp
        );
        event TrustScoreUpdated(
            address indexed agentWallet,
            uint256 oldScore,
            uint256 newScore,
            uint256 timestamp
        );

        function registerAgent(address human, address agentWallet, uint256 initialTrustScore) external;
        function updateTrustScore(address agentWallet, uint256 newScore) external;
        function agentOf(address human) external view returns (address agent);
        function trustScore(address agentWallet) external view returns (uint256 score);
        function isVerified(address human) external view returns (bool verified);
        function getAgentData(address human) external view returns (address agent, uint256 score, bool verified);
    }

    #[sol(rpc)]
    interface IERC20 {
        function balanceOf(address owner) external view returns (uint256 balance);
        function allowance(address owner, address spender) external view returns (uint256 remaining);
        function approve(address spender, uint256 amount) external returns (bool success);
    }

    /// Sushi V2 router
    #[sol(rpc)]
    interface ISushiV2Router {
        function swapExactTokensForTokens(
            uint256 amountIn,
            uint256 amountOutMin,
            address[] calldata path,
            address to,
            uint256 deadline
        ) external returns (uint256[] memory amounts);
    }

    /// iden3 State contract (global identity state tree roots)
    #[sol(rpc)]
    interface IState {
        struct GistRootInfo {
            uint256 root;
            uint256 replacedByRoot;
            uint256 createdAtTimestamp;
            uint256 replacedAtTimestamp;
            uint256 createdAtBlock;
            uint256 replacedAtBlock;
        }

        function getGISTRootInfo(uint256 root) external view returns (GistRootInfo memory info);
    }
}
