pub mod app_state;
pub mod data_series;
pub mod events;
pub mod graph_state;
pub mod label;
pub mod label_store;
pub mod theme;
