// src/fetch/mod.rs
//! Remote side of a run: enumerate the yearly listing, pick the quarter
//! archives, then download and unpack them.

pub mod listing;
pub mod quarters;
pub mod zips;

pub use listing::{HttpListingClient, ListingClient};
pub use quarters::{parse_quarter, resolve, ArchiveLocation, QuarterKey};
pub use zips::{download_archive, download_file, extract_archive, package_output, retrieve_all};
