//! Instruction → endpoint registry for the Backpack REST API

use reqwest::Method;
use std::collections::HashMap;

use crate::common::errors::{ClientError, Result};

/// Whether an instruction requires signed headers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Public,
    Private,
}

/// Resolved endpoint for one instruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub method: Method,
    pub path: &'static str,
    pub access: Access,
}

impl Endpoint {
    pub fn is_private(&self) -> bool {
        self.access == Access::Private
    }
}

const PUBLIC: &[(&str, &str, &str)] = &[
    ("assets", "GET", "/api/v1/assets"),
    ("markets", "GET", "/api/v1/markets"),
    ("ticker", "GET", "/api/v1/ticker"),
    ("depth", "GET", "/api/v1/depth"),
    ("klines", "GET", "/api/v1/klines"),
    ("status", "GET", "/api/v1/status"),
    ("ping", "GET", "/api/v1/ping"),
    ("time", "GET", "/api/v1/time"),
    ("trades", "GET", "/api/v1/trades"),
];

const PRIVATE: &[(&str, &str, &str)] = &[
    ("balanceQuery", "GET", "/api/v1/capital"),
    ("depositAddressQuery", "GET", "/wapi/v1/capital/deposit/address"),
    ("depositQueryAll", "GET", "/wapi/v1/capital/deposits"),
    ("orderHistoryQueryAll", "GET", "/wapi/v1/history/orders"),
    ("fillHistoryQueryAll", "GET", "/wapi/v1/history/fills"),
    ("orderQuery", "GET", "/api/v1/order"),
    ("orderExecute", "POST", "/api/v1/order"),
    ("orderCancel", "DELETE", "/api/v1/order"),
    ("orderQueryAll", "GET", "/api/v1/orders"),
    ("orderCancelAll", "DELETE", "/api/v1/orders"),
    ("withdraw", "POST", "/wapi/v1/capital/withdrawals"),
    ("withdrawalQueryAll", "GET", "/wapi/v1/capital/withdrawals"),
];

/// Immutable lookup table built once and handed to the REST client
#[derive(Debug, Clone)]
pub struct InstructionRegistry {
    endpoints: HashMap<&'static str, Endpoint>,
}

impl InstructionRegistry {
    /// The Backpack instruction set
    pub fn backpack() -> Self {
        let mut endpoints = HashMap::with_capacity(PUBLIC.len() + PRIVATE.len());
        let tables = [(PUBLIC, Access::Public), (PRIVATE, Access::Private)];
        for (table, access) in tables {
            for &(name, method, path) in table {
                let method = match method {
                    "POST" => Method::POST,
                    "DELETE" => Method::DELETE,
                    _ => Method::GET,
                };
                endpoints.insert(name, Endpoint { method, path, access });
            }
        }
        Self { endpoints }
    }

    /// Resolve an instruction, failing on unknown names
    pub fn get(&self, instruction: &str) -> Result<&Endpoint> {
        self.endpoints
            .get(instruction)
            .ok_or_else(|| ClientError::UnknownInstruction(instruction.to_string()))
    }
}

impl Default for InstructionRegistry {
    fn default() -> Self {
        Self::backpack()
    }
}
