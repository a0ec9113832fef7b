pub mod account_queries;
pub mod meter_reading_queries;
