pub mod browser;
pub mod openrent;
pub mod traits;
pub mod types;

pub use openrent::OpenRentSource;
pub use traits::ListingSource;
pub use types::SearchParams;
