pub mod csv_price_adapter;
pub mod file_config_adapter;
pub mod yahoo_adapter;
