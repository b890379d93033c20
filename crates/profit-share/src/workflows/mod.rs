pub mod profit_sharing;
