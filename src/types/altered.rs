use std::collections::BTreeMap;

/// One reason an address was touched while processing a block. An address can
/// accumulate several entries (sender of one transaction, NFT receiver of
/// another), which is why the collection below is a multiset.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlteredAccount {
    pub is_sender: bool,
    pub is_esdt_operation: bool,
    pub is_nft_operation: bool,
    pub token_identifier: String,
    pub nft_nonce: u64,
    pub is_create: bool,
    pub balance_change: bool,
}

impl AlteredAccount {
    fn is_token_operation(&self) -> bool {
        self.is_esdt_operation || self.is_nft_operation
    }
}

/// Altered addresses of one block, keyed by the human-readable address.
/// Block-local; handed to the accounts indexer and discarded.
#[derive(Debug, Clone, Default)]
pub struct AlteredAccounts {
    altered: BTreeMap<String, Vec<AlteredAccount>>,
}

impl AlteredAccounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, key: &str, mut account: AlteredAccount) {
        if !self.altered.contains_key(key) {
            self.altered.insert(key.to_owned(), vec![account]);
            return;
        }

        let entries = match self.altered.get_mut(key) {
            Some(entries) => entries,
            None => return,
        };

        if !account.is_token_operation() {
            // A plain balance change folds into the first entry.
            entries[0].is_sender = entries[0].is_sender || account.is_sender;
            entries[0].balance_change = entries[0].balance_change || account.balance_change;
            return;
        }

        let mut sender_count = 0;
        for entry in entries.iter_mut() {
            let is_sender = entry.is_sender || account.is_sender;
            if is_sender {
                sender_count += 1;
            }

            let should_rewrite = account.is_token_operation() && !entry.is_token_operation();
            if should_rewrite {
                entry.token_identifier = account.token_identifier;
                entry.nft_nonce = account.nft_nonce;
                entry.is_nft_operation = account.is_nft_operation;
                entry.is_esdt_operation = account.is_esdt_operation;
                entry.is_create = account.is_create;
                entry.is_sender = is_sender;
                entry.balance_change = entry.balance_change || account.balance_change;
                return;
            }

            let already_exists = entry.token_identifier == account.token_identifier
                && entry.nft_nonce == account.nft_nonce;
            if already_exists {
                entry.is_sender = is_sender && sender_count == 1;
                entry.is_create = entry.is_create || account.is_create;
                entry.balance_change = entry.balance_change || account.balance_change;
                return;
            }
        }

        if sender_count > 0 {
            // The regular balance movement was already recorded on an earlier
            // entry; this one only tracks the token operation.
            account.is_sender = false;
        }

        entries.push(account);
    }

    pub fn get(&self, key: &str) -> Option<&[AlteredAccount]> {
        self.altered.get(key).map(|entries| entries.as_slice())
    }

    pub fn get_all(&self) -> &BTreeMap<String, Vec<AlteredAccount>> {
        &self.altered
    }

    pub fn len(&self) -> usize {
        self.altered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.altered.is_empty()
    }
}
