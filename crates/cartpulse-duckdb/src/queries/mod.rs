pub mod conversion;
pub mod feed;
pub mod hourly;
pub mod top_popups;
pub mod windows;
