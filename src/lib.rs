//! MOPH Report Relay Library
//!
//! Fetches report datasets from the MOPH open-data API and loads them into a
//! PostgreSQL table, one transaction per request.
//!
//! # Modules
//!
//! - `config`: Configuration management.
//! - `db`: Database connection and pool management.
//! - `db_storage`: Report table storage and the store/batch traits.
//! - `errors`: Error handling types.
//! - `handlers`: HTTP router and request handlers.
//! - `models`: Request, report and row models.
//! - `relay`: The fetch-and-save pipeline.
//! - `report_client`: Report API client.

pub mod config;
pub mod db;
pub mod db_storage;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod relay;
pub mod report_client;
