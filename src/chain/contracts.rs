//! ABI bindings for on-chain contracts.
//!
//! Uses alloy's `sol!` macro to generate type-safe Rust bindings for the
//! Solidity interfaces the harness drives:
//!
//! - **NftMarketplace**: list / buy / cancel / update listings and withdraw
//!   seller proceeds. Failures are custom errors prefixed `NftMarketplace__`.
//! - **BasicNft**: the ERC-721 collection the scenarios mint from.

use alloy::sol;

// ---------------------------------------------------------------------------
// NftMarketplace
// ---------------------------------------------------------------------------

sol! {
    /// Marketplace escrow-free listing contract.
    ///
    /// Listings are keyed by `(nftAddress, tokenId)`. The token stays with
    /// the seller until `buyItem`, so the marketplace must be the approved
    /// operator for every listed token.
    #[sol(rpc)]
    contract NftMarketplace {
        struct Listing {
            uint256 price;
            address seller;
        }

        error NftMarketplace__PriceMustBeAboveZero();
        error NftMarketplace__NotApprovedForMarketplace();
        error NftMarketplace__AlreadyListed(address nftAddress, uint256 tokenId);
        error NftMarketplace__NotListed(address nftAddress, uint256 tokenId);
        error NftMarketplace__NotOwner();
        error NftMarketplace__PriceNotMet(address nftAddress, uint256 tokenId, uint256 price);
        error NftMarketplace__NoProceeds();

        event NftMarketplace__ItemListed(
            address indexed seller,
            address indexed nftAddress,
            uint256 indexed tokenId,
            uint256 price
        );

        event ItemBought(
            address indexed buyer,
            address indexed nftAddress,
            uint256 indexed tokenId,
            uint256 price
        );

        event NftMarketplace__ItemCancelled(
            address indexed seller,
            address indexed nftAddress,
            uint256 indexed tokenId
        );

        function listItem(address nftAddress, uint256 tokenId, uint256 price) external;

        function buyItem(address nftAddress, uint256 tokenId) external payable;

        function cancelListing(address nftAddress, uint256 tokenId) external;

        function updateListing(address nftAddress, uint256 tokenId, uint256 newPrice) external;

        function withdrawProceeds() external;

        function getListing(address nftAddress, uint256 tokenId)
            external
            view
            returns (Listing memory);

        function getProceeds(address seller) external view returns (uint256);
    }
}

// ---------------------------------------------------------------------------
// BasicNft (ERC-721)
// ---------------------------------------------------------------------------

sol! {
    /// Minimal ERC-721 collection with an open `mintNft`.
    ///
    /// Token ids are assigned sequentially from `getTokenCounter()`.
    #[sol(rpc)]
    contract BasicNft {
        function mintNft() external returns (uint256);

        function approve(address to, uint256 tokenId) external;

        function getApproved(uint256 tokenId) external view returns (address);

        function ownerOf(uint256 tokenId) external view returns (address);

        function getTokenCounter() external view returns (uint256);

        function tokenURI(uint256 tokenId) external view returns (string memory);

        event Transfer(address indexed from, address indexed to, uint256 indexed tokenId);

        event Approval(address indexed owner, address indexed approved, uint256 indexed tokenId);
    }
}

/// Contract names as recorded in deployment records and artifacts.
pub mod names {
    pub const NFT_MARKETPLACE: &str = "NftMarketplace";
    pub const BASIC_NFT: &str = "BasicNft";
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
