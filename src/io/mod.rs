/// CSV export of tick records and the daily archive.
pub mod export;
