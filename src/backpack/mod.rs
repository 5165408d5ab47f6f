//! Backpack module - REST and websocket clients for the Backpack exchange

pub mod auth;
pub mod client;
pub mod instructions;
pub mod messages;
pub mod rest;
pub mod websocket;

pub use client::BackpackClient;
