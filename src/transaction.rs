//! Transaction data shape.
//!
//! Transactions travel on their own topic but have no wire encoding or
//! validation rules yet; only the in-memory shape is defined here.

use crate::blockchain::OWNER_SIZE;
use std::collections::HashMap;

/// A 91-byte DER public key identifying a sender or recipient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OwnerKey(pub [u8; OWNER_SIZE]);

impl OwnerKey {
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl From<[u8; OWNER_SIZE]> for OwnerKey {
    fn from(bytes: [u8; OWNER_SIZE]) -> Self {
        OwnerKey(bytes)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub input: OwnerKey,
    /// Amount per recipient. Each recipient appears at most once.
    pub outputs: HashMap<OwnerKey, f64>,
}

impl Transaction {
    pub fn new(input: OwnerKey) -> Self {
        Transaction {
            input,
            outputs: HashMap::new(),
        }
    }

    /// Sets the amount paid to `recipient`, returning the amount it replaces.
    pub fn add_output(&mut self, recipient: OwnerKey, amount: f64) -> Option<f64> {
        self.outputs.insert(recipient, amount)
    }

    pub fn total_output(&self) -> f64 {
        self.outputs.values().sum()
    }
}
