pub mod mock_auctioneer;
