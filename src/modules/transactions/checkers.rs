use super::schemas::{ScResult, Transaction};
use crate::modules::datafield::{ESDT_NFT_TRANSFER, MULTI_ESDT_NFT_TRANSFER};
use crate::{AT_SEPARATOR, OK_HEX_ENCODED};

pub(crate) const GAS_REFUND_FOR_RELAYER_MESSAGE: &str = "gas refund for relayer";

// hex("user error"), the VM's verdict for a failed user-level call
const USER_ERROR_HEX_ENCODED: &str = "75736572206572726f72";

const MIN_ARGUMENTS_NFT_OR_MULTI_TRANSFER: usize = 4;

/// The VM appends "@<hex(ok)>" to the payload of a successful result; very
/// old blocks carry the plain "@ok" form.
pub(crate) fn is_sc_result_successful(data: &[u8]) -> bool {
    let ok_new_version = format!("{}{}", AT_SEPARATOR, OK_HEX_ENCODED);
    let ok_old_version = format!("{}ok", AT_SEPARATOR);

    contains_subslice(data, ok_new_version.as_bytes())
        || contains_subslice(data, ok_old_version.as_bytes())
}

fn contains_subslice(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.len() >= needle.len() && haystack.windows(needle.len()).any(|window| window == needle)
}

fn is_data_ok(data: &[u8]) -> bool {
    let ok_prefix = format!("{}{}", AT_SEPARATOR, OK_HEX_ENCODED);

    data.starts_with(ok_prefix.as_bytes())
}

/// A direct refund hop: the result pays the sender back on the very next
/// nonce, chained to the transaction itself, with a success payload.
pub(crate) fn is_scr_for_sender_with_refund(scr: &ScResult, tx: &Transaction) -> bool {
    let is_for_sender = scr.receiver == tx.sender;
    let is_right_nonce = scr.nonce == tx.nonce + 1;
    let is_from_current_tx = scr.prev_tx_hash == tx.hash;

    is_from_current_tx && is_for_sender && is_right_nonce && is_data_ok(scr.data.as_slice())
}

/// A refund signal on any later hop: value coming back with a success marker
/// or the relayer-refund message.
pub(crate) fn is_scr_with_refund(scr: &ScResult) -> bool {
    let has_refund = !scr.value.is_zero();
    let is_successful = is_sc_result_successful(scr.data.as_slice());
    let is_relayer_refund =
        scr.return_message.as_deref() == Some(GAS_REFUND_FOR_RELAYER_MESSAGE);
    let is_not_first_hop = scr.original_tx_hash != scr.prev_tx_hash;

    has_refund && (is_successful || is_relayer_refund) && is_not_first_hop
}

/// The relayer fronts the fee, so the refund hop pays the outer sender back.
pub(crate) fn is_refund_for_relayed(scr: &ScResult, tx: &Transaction) -> bool {
    scr.receiver == tx.sender && is_scr_with_refund(scr)
}

pub(crate) fn has_successful_scrs(tx: &Transaction) -> bool {
    tx.smart_contract_results
        .iter()
        .any(|scr| is_sc_result_successful(scr.data.as_slice()))
}

/// An in-flight continuation: a token transfer hop that has not reached its
/// destination shard yet. Every attached result counts, not only the last
/// one.
pub(crate) fn has_cross_shard_pending_transfer(tx: &Transaction) -> bool {
    tx.smart_contract_results.iter().any(|scr| {
        is_nft_or_multi_transfer_data(scr.data.as_slice())
            && scr.sender_shard != scr.receiver_shard
    })
}

fn is_nft_or_multi_transfer_data(data: &[u8]) -> bool {
    let text = match std::str::from_utf8(data) {
        Ok(text) => text,
        Err(_) => return false,
    };

    let mut segments = text.split(AT_SEPARATOR);
    let function = segments.next().unwrap_or_default();
    if segments.next().is_none() {
        return false;
    }

    function == ESDT_NFT_TRANSFER || function == MULTI_ESDT_NFT_TRANSFER
}

/// Relayed transactions are only treated as such once a result chain exists;
/// the prefix alone can be forged by any payload.
pub(crate) fn is_relayed_tx(tx: &Transaction) -> bool {
    tx.is_relayed && !tx.smart_contract_results.is_empty()
}

pub(crate) fn is_esdt_nft_transfer_with_user_error(data: &[u8]) -> bool {
    let text = match std::str::from_utf8(data) {
        Ok(text) => text,
        Err(_) => return false,
    };

    let segments: Vec<&str> = text.split(AT_SEPARATOR).collect();
    let is_nft_or_multi_transfer = segments.first().map_or(false, |function| {
        *function == ESDT_NFT_TRANSFER || *function == MULTI_ESDT_NFT_TRANSFER
    });
    if !is_nft_or_multi_transfer || segments.len() < MIN_ARGUMENTS_NFT_OR_MULTI_TRANSFER {
        return false;
    }

    segments.last() == Some(&USER_ERROR_HEX_ENCODED)
}

pub(crate) fn is_cross_shard_on_source_shard(tx: &Transaction, self_shard_id: u32) -> bool {
    tx.sender_shard != tx.receiver_shard && tx.sender_shard == self_shard_id
}

/// Same-shard token transfer that produced results; its serializer shape must
/// not clobber a status the cross-shard path already wrote.
pub(crate) fn is_nft_transfer_or_multi_transfer(tx: &Transaction) -> bool {
    if tx.smart_contract_results.is_empty() || tx.sender_shard != tx.receiver_shard {
        return false;
    }

    let text = match std::str::from_utf8(tx.data.as_slice()) {
        Ok(text) => text,
        Err(_) => return false,
    };

    let segments: Vec<&str> = text.split(AT_SEPARATOR).collect();
    if segments.len() < MIN_ARGUMENTS_NFT_OR_MULTI_TRANSFER {
        return false;
    }

    segments[0] == ESDT_NFT_TRANSFER || segments[0] == MULTI_ESDT_NFT_TRANSFER
}

#[cfg(test)]
mod tests {
    use super::super::tests::{test_scr_doc, test_tx_doc};
    use super::*;
    use crate::types::Amount;

    #[test]
    fn test_is_sc_result_successful() {
        assert!(is_sc_result_successful(b"@6f6b"));
        assert!(is_sc_result_successful(b"dummy@6f6b@aa"));
        assert!(is_sc_result_successful(b"@ok"));
        assert!(!is_sc_result_successful(b"@75736572206572726f72"));
        assert!(!is_sc_result_successful(b""));
    }

    #[test]
    fn test_is_scr_for_sender_with_refund() {
        let tx = test_tx_doc("aa01", 79, 0, 1);
        let mut scr = test_scr_doc("cc03", "aa01", "aa01", b"@6f6b".to_vec());
        scr.receiver = tx.sender.clone();
        scr.nonce = tx.nonce + 1;
        scr.value = Amount::from(100u64);
        assert!(is_scr_for_sender_with_refund(&scr, &tx));

        // wrong nonce
        scr.nonce = tx.nonce;
        assert!(!is_scr_for_sender_with_refund(&scr, &tx));
        scr.nonce = tx.nonce + 1;

        // chained to another hop
        scr.prev_tx_hash = "ff99".to_owned();
        assert!(!is_scr_for_sender_with_refund(&scr, &tx));
    }

    #[test]
    fn test_is_scr_with_refund_requires_later_hop() {
        let mut scr = test_scr_doc("cc03", "aa01", "bb02", b"@6f6b".to_vec());
        scr.value = Amount::from(100u64);
        assert!(is_scr_with_refund(&scr));

        // first hop: prev == original
        let mut first_hop = scr.clone();
        first_hop.prev_tx_hash = "aa01".to_owned();
        assert!(!is_scr_with_refund(&first_hop));

        // no value coming back
        let mut no_value = scr.clone();
        no_value.value = Amount::zero();
        assert!(!is_scr_with_refund(&no_value));

        // relayer refunds qualify through the return message alone
        scr.data = b"anything".to_vec().into();
        scr.return_message = Some(GAS_REFUND_FOR_RELAYER_MESSAGE.to_owned());
        assert!(is_scr_with_refund(&scr));
    }

    #[test]
    fn test_has_cross_shard_pending_transfer_scans_every_scr() {
        let mut tx = test_tx_doc("aa01", 1, 0, 0);

        let mut plain = test_scr_doc("cc03", "aa01", "aa01", b"@6f6b".to_vec());
        plain.sender_shard = 0;
        plain.receiver_shard = 0;

        let mut in_flight =
            test_scr_doc("dd04", "aa01", "cc03", b"ESDTNFTTransfer@aa@01@01".to_vec());
        in_flight.sender_shard = 0;
        in_flight.receiver_shard = 1;

        // the in-flight hop is first, followed by an unrelated result: it
        // must still be found
        tx.smart_contract_results = vec![in_flight.clone(), plain.clone()];
        assert!(has_cross_shard_pending_transfer(&tx));

        tx.smart_contract_results = vec![plain.clone(), in_flight];
        assert!(has_cross_shard_pending_transfer(&tx));

        tx.smart_contract_results = vec![plain];
        assert!(!has_cross_shard_pending_transfer(&tx));
    }

    #[test]
    fn test_is_esdt_nft_transfer_with_user_error() {
        assert!(is_esdt_nft_transfer_with_user_error(
            b"ESDTNFTTransfer@aa@01@01@75736572206572726f72"
        ));
        assert!(is_esdt_nft_transfer_with_user_error(
            b"MultiESDTNFTTransfer@aa@01@01@75736572206572726f72"
        ));
        // success marker is not an error
        assert!(!is_esdt_nft_transfer_with_user_error(
            b"ESDTNFTTransfer@aa@01@01@6f6b"
        ));
        // too short
        assert!(!is_esdt_nft_transfer_with_user_error(
            b"ESDTNFTTransfer@75736572206572726f72"
        ));
        assert!(!is_esdt_nft_transfer_with_user_error(
            b"ESDTTransfer@aa@01@01@75736572206572726f72"
        ));
    }

    #[test]
    fn test_is_nft_transfer_or_multi_transfer_needs_same_shard_and_scrs() {
        let mut tx = test_tx_doc("aa01", 1, 0, 0);
        tx.data = b"ESDTNFTTransfer@aa@01@01@bb".to_vec().into();
        assert!(!is_nft_transfer_or_multi_transfer(&tx));

        tx.smart_contract_results = vec![test_scr_doc("cc03", "aa01", "aa01", vec![])];
        assert!(is_nft_transfer_or_multi_transfer(&tx));

        tx.receiver_shard = 1;
        assert!(!is_nft_transfer_or_multi_transfer(&tx));
    }
}
