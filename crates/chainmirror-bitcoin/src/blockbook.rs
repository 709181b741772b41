//! Blockbook REST response shapes (API v2).
//!
//! Only the fields the mirror reads are declared. Amounts are strings in
//! satoshis.

use serde::Deserialize;

use chainmirror_core::RawTransaction;

/// `GET {base}`
#[derive(Debug, Deserialize)]
pub struct Status {
    pub blockbook: BlockbookInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockbookInfo {
    pub best_height: u64,
}

/// One page of `GET {base}/block/{height|hash}?page=N`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockPage {
    #[serde(default = "first_page")]
    pub page: u32,
    #[serde(default = "first_page")]
    pub total_pages: u32,
    pub hash: String,
    /// Absent on the genesis block.
    #[serde(default)]
    pub previous_block_hash: Option<String>,
    pub height: u64,
    pub time: i64,
    #[serde(default)]
    pub txs: Vec<Tx>,
}

fn first_page() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
pub struct Tx {
    pub txid: String,
    #[serde(default)]
    pub vin: Vec<Vin>,
    #[serde(default)]
    pub vout: Vec<Vout>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vin {
    #[serde(default)]
    pub addresses: Vec<String>,
    /// `false` for scripts that only carry a description (OP_RETURN and the like).
    #[serde(default)]
    pub is_address: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vout {
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub addresses: Vec<String>,
    #[serde(default)]
    pub is_address: Option<bool>,
}

/// `GET {base}/address/{addr}?details=basic`
#[derive(Debug, Deserialize)]
pub struct AddressInfo {
    pub balance: String,
}

fn first_address(addresses: &[String], is_address: Option<bool>) -> Option<String> {
    if is_address == Some(false) {
        return None;
    }
    addresses.first().filter(|a| !a.is_empty()).cloned()
}

impl Tx {
    /// Sender is the first input's first address, recipient and value come
    /// from the first output.
    pub fn into_raw(self) -> RawTransaction {
        let from = self
            .vin
            .first()
            .and_then(|vin| first_address(&vin.addresses, vin.is_address));
        let (to, value) = match self.vout.first() {
            Some(vout) => (
                first_address(&vout.addresses, vout.is_address),
                vout.value.clone().unwrap_or_else(|| "0".into()),
            ),
            None => (None, "0".into()),
        };
        RawTransaction {
            hash: self.txid,
            from,
            to,
            value,
        }
    }
}
