use alloy::sol;

sol! {
    type Id is bytes32;

    #[derive(Debug)]
    struct MarketParams {
        address loanToken;
        address collateralToken;
        address oracle;
        address irm;
        uint256 lltv;
    }

    #[sol(rpc)]
    contract IMorpho {
        // ========== events ============
        event CreateMarket(Id indexed id, MarketParams marketParams);

        // ========= functions =========
        function createMarket(MarketParams memory marketParams) external;
        function supply(
            MarketParams memory marketParams,
            uint256 assets,
            uint256 shares,
            address onBehalf,
            bytes memory data
        ) external returns (uint256 assetsSupplied, uint256 sharesSupplied);
        function supplyCollateral(
            MarketParams memory marketParams,
            uint256 assets,
            address onBehalf,
            bytes memory data
        ) external;
        function borrow(
            MarketParams memory marketParams,
            uint256 assets,
            uint256 shares,
            address onBehalf,
            address receiver
        ) external returns (uint256 assetsBorrowed, uint256 sharesBorrowed);
        #[derive(Debug)]
        function position(bytes32 id, address user)
            external
            view
            returns (uint256 supplyShares, uint128 borrowShares, uint128 collateral);
    }

    #[sol(rpc)]
    contract IOracle {
        function latestAnswer() external view returns (int256 answer);
        function description() external view returns (string memory);
        function decimals() external view returns (uint8);
    }
}
