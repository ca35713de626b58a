//! Contract interfaces generated via alloy's sol! macro.

use alloy::sol;

sol! {
    // Rebalancer contract interface
    #[sol(rpc)]
    interface IRebalancer {
        function summParams() external view returns (uint8 stage, uint64 stepsDone);
        function getPositionState() external view returns (
            int24 currentTick,
            int24 tickLower,
            int24 tickUpper,
            uint128 liquidity,
            uint160 sqrtPriceX96
        );
        function startSummarizeTrades() external;
        function summarizeUsersStates() external;
        function rebalance(int24 tickLower, int24 tickUpper) external;
    }

    // Factory used to spin up a fresh rebalancer in development mode
    #[sol(rpc)]
    interface IRebalancerFactory {
        event RebalancerCreated(address rebalancer);

        function createRebalancer(address tokenA, address tokenB, uint24 fee) external returns (address);
    }
}
