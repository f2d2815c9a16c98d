// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.
use alloy::sol;

sol! {
    #[derive(Debug)]
    #[sol(rpc)]
    contract PredictionMarket {
        event BetPlaced(
            uint256 indexed marketId,
            address indexed bettor,
            bytes32 handle,
            bytes inputProof,
            uint256 timestamp
        );

        function getMarketCount() external view returns (uint256);

        function getMarket(uint256 marketId) external view returns (
            string memory question,
            uint256 categoryId,
            uint256 deadline,
            address creator,
            bool resolved,
            bool winningSide,
            uint256 targetPrice,
            uint256 participantCount,
            bytes32 aggregatedHandle,
            bytes memory inputProof
        );

        function placeEncryptedBet(
            uint256 marketId,
            bytes calldata encryptedData,
            bytes calldata inputProof,
            bool side
        ) external;

        function resolveMarket(
            uint256 marketId,
            bytes32 aggregatedHandle,
            bytes calldata proof,
            bool winningSide
        ) external;
    }
}
