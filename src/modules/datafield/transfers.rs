use crate::interfaces::{AddressCodec, ShardCoordinator};
use crate::types::{Address, Amount};

use super::{
    compute_token_identifier, is_ascii_string, OperationParser, ResponseParseData, ESDT_NFT_TRANSFER,
    ESDT_TRANSFER, MULTI_ESDT_NFT_TRANSFER,
};

const MIN_ARGUMENTS_ESDT_TRANSFER: usize = 2;
const MIN_ARGUMENTS_NFT_TRANSFER: usize = 3;
// token, nonce, quantity, receiver
const MIN_ARGUMENTS_NFT_TRANSFER_SELF: usize = 4;

pub(super) fn parse_esdt_transfer(args: &[Vec<u8>], receiver: &Address) -> ResponseParseData {
    let mut response = ResponseParseData::with_operation(ESDT_TRANSFER);

    if args.len() < MIN_ARGUMENTS_ESDT_TRANSFER {
        return response;
    }

    let token = match ascii_argument(&args[0]) {
        Some(token) => token,
        None => return response,
    };

    if receiver.is_smart_contract() {
        if let Some(function) = args.get(2).and_then(|arg| ascii_argument(arg)) {
            response.function = function;
        }
    }

    response.tokens.push(token);
    response
        .esdt_values
        .push(Amount::from_bytes_be(&args[1]).to_string());

    response
}

pub(super) fn parse_esdt_nft_transfer(
    parser: &OperationParser,
    args: &[Vec<u8>],
    sender: &Address,
    receiver: &Address,
) -> ResponseParseData {
    let mut response = ResponseParseData::with_operation(ESDT_NFT_TRANSFER);

    // When the transfer is sent to self, the logical receiver travels inside
    // the argument list (4th argument); downstream hops carry it as the outer
    // receiver instead.
    let is_self_call = sender == receiver;
    let min_args = if is_self_call {
        MIN_ARGUMENTS_NFT_TRANSFER_SELF
    } else {
        MIN_ARGUMENTS_NFT_TRANSFER
    };
    if args.len() < min_args {
        return response;
    }

    let token = match ascii_argument(&args[0]) {
        Some(token) => token,
        None => return response,
    };
    let nonce = decode_nonce(&args[1]);
    let quantity = Amount::from_bytes_be(&args[2]);

    let logical_receiver = if is_self_call {
        Address::from(args[3].as_slice())
    } else {
        receiver.clone()
    };
    let call_function_index = min_args;

    if logical_receiver.is_smart_contract() {
        if let Some(function) = args
            .get(call_function_index)
            .and_then(|arg| ascii_argument(arg))
        {
            response.function = function;
        }
    }

    let receiver_encoded = match parser.address_codec().encode(&logical_receiver) {
        Ok(encoded) => encoded,
        Err(_) => return response,
    };

    response
        .tokens
        .push(compute_token_identifier(&token, nonce));
    response.esdt_values.push(quantity.to_string());
    response.receivers.push(receiver_encoded);
    response
        .receivers_shard_ids
        .push(parser.shard_coordinator().compute_id(&logical_receiver));

    response
}

pub(super) fn parse_multi_esdt_nft_transfer(
    parser: &OperationParser,
    args: &[Vec<u8>],
    sender: &Address,
    receiver: &Address,
) -> ResponseParseData {
    let mut response = ResponseParseData::with_operation(MULTI_ESDT_NFT_TRANSFER);

    // Self-call layout: receiver, number of transfers, then the triplets.
    // Forwarded layout: number of transfers first, outer receiver applies.
    let is_self_call = sender == receiver;
    let (logical_receiver, num_index) = if is_self_call {
        match args.first() {
            Some(arg) => (Address::from(arg.as_slice()), 1),
            None => return response,
        }
    } else {
        (receiver.clone(), 0)
    };

    let num_transfers = match args.get(num_index) {
        Some(arg) => decode_nonce(arg) as usize,
        None => return response,
    };

    let triplets_start = num_index + 1;
    if num_transfers == 0 || args.len() < triplets_start + 3 * num_transfers {
        return response;
    }

    if logical_receiver.is_smart_contract() {
        if let Some(function) = args
            .get(triplets_start + 3 * num_transfers)
            .and_then(|arg| ascii_argument(arg))
        {
            response.function = function;
        }
    }

    let receiver_encoded = match parser.address_codec().encode(&logical_receiver) {
        Ok(encoded) => encoded,
        Err(_) => return response,
    };
    let receiver_shard_id = parser.shard_coordinator().compute_id(&logical_receiver);

    for transfer in 0..num_transfers {
        let offset = triplets_start + 3 * transfer;

        let token = match ascii_argument(&args[offset]) {
            Some(token) => token,
            None => continue,
        };
        let nonce = decode_nonce(&args[offset + 1]);
        let value = Amount::from_bytes_be(&args[offset + 2]);

        // fungible entries of the batch carry nonce zero and keep the plain
        // identifier
        response.tokens.push(compute_token_identifier(&token, nonce));
        response.esdt_values.push(value.to_string());
        response.receivers.push(receiver_encoded.clone());
        response.receivers_shard_ids.push(receiver_shard_id);
    }

    response
}

fn ascii_argument(arg: &[u8]) -> Option<String> {
    match std::str::from_utf8(arg) {
        Ok(text) if !text.is_empty() && is_ascii_string(text) => Some(text.to_owned()),
        _ => None,
    }
}

fn decode_nonce(arg: &[u8]) -> u64 {
    Amount::from_bytes_be(arg)
        .0
        .to_u64_digits()
        .first()
        .copied()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::super::tests::{contract_address, parser, user_address};
    use super::*;
    use crate::interfaces::{AddressCodec, ShardCoordinator};

    fn payload(parts: &[&str]) -> Vec<u8> {
        parts.join("@").into_bytes()
    }

    #[test]
    fn test_esdt_transfer_round_trip() {
        let parser = parser();
        let data = payload(&["ESDTTransfer", &hex::encode("MIIU-abcdef"), "03e8"]);
        let response = parser.parse(&data, &user_address(1), &user_address(2));

        assert_eq!(response.operation, "ESDTTransfer");
        assert_eq!(response.tokens, vec!["MIIU-abcdef"]);
        assert_eq!(response.esdt_values, vec!["1000"]);
        assert!(response.function.is_empty());
        assert!(response.receivers.is_empty());
    }

    #[test]
    fn test_esdt_transfer_towards_contract_captures_function() {
        let parser = parser();
        let data = payload(&[
            "ESDTTransfer",
            &hex::encode("MIIU-abcdef"),
            "05",
            &hex::encode("swapTokensFixedInput"),
        ]);
        let response = parser.parse(&data, &user_address(1), &contract_address(2));

        assert_eq!(response.function, "swapTokensFixedInput");
        assert_eq!(response.esdt_values, vec!["5"]);
    }

    #[test]
    fn test_esdt_nft_transfer_round_trip_on_destination_hop() {
        let parser = parser();
        let data = payload(&["ESDTNFTTransfer", &hex::encode("NFT-123456"), "0f", "01"]);
        let receiver = user_address(2);
        let response = parser.parse(&data, &user_address(1), &receiver);

        assert_eq!(response.operation, "ESDTNFTTransfer");
        assert_eq!(response.tokens, vec!["NFT-123456-0f"]);
        assert_eq!(response.esdt_values, vec!["1"]);
        assert_eq!(
            response.receivers,
            vec![parser.address_codec().encode(&receiver).unwrap()]
        );
        assert_eq!(
            response.receivers_shard_ids,
            vec![parser.shard_coordinator().compute_id(&receiver)]
        );
    }

    #[test]
    fn test_esdt_nft_transfer_self_call_takes_receiver_from_arguments() {
        let parser = parser();
        let sender = user_address(1);
        let logical_receiver = user_address(2);
        let data = payload(&[
            "ESDTNFTTransfer",
            &hex::encode("NFT-123456"),
            "0f",
            "01",
            &hex::encode(logical_receiver.as_bytes()),
        ]);

        let response = parser.parse(&data, &sender, &sender);

        assert_eq!(
            response.receivers,
            vec![parser.address_codec().encode(&logical_receiver).unwrap()]
        );
        assert_eq!(
            response.receivers_shard_ids,
            vec![parser.shard_coordinator().compute_id(&logical_receiver)]
        );
    }

    #[test]
    fn test_esdt_nft_transfer_too_few_arguments() {
        let parser = parser();
        let data = payload(&["ESDTNFTTransfer", &hex::encode("NFT-123456"), "0f"]);
        let sender = user_address(1);
        let response = parser.parse(&data, &sender, &sender);

        assert_eq!(response.operation, "ESDTNFTTransfer");
        assert!(response.tokens.is_empty());
    }

    #[test]
    fn test_multi_esdt_nft_transfer_round_trip_self_call() {
        let parser = parser();
        let sender = user_address(1);
        let logical_receiver = user_address(2);
        let data = payload(&[
            "MultiESDTNFTTransfer",
            &hex::encode(logical_receiver.as_bytes()),
            "02",
            &hex::encode("NFT-123456"),
            "0f",
            "01",
            &hex::encode("MIIU-abcdef"),
            "00",
            "03e8",
        ]);

        let response = parser.parse(&data, &sender, &sender);

        assert_eq!(response.operation, "MultiESDTNFTTransfer");
        assert_eq!(response.tokens, vec!["NFT-123456-0f", "MIIU-abcdef"]);
        assert_eq!(response.esdt_values, vec!["1", "1000"]);
        assert_eq!(response.receivers.len(), 2);
        assert_eq!(response.receivers_shard_ids.len(), 2);
    }

    #[test]
    fn test_multi_esdt_nft_transfer_forwarded_hop_uses_outer_receiver() {
        let parser = parser();
        let receiver = user_address(2);
        let data = payload(&[
            "MultiESDTNFTTransfer",
            "01",
            &hex::encode("NFT-123456"),
            "0f",
            "01",
        ]);

        let response = parser.parse(&data, &user_address(1), &receiver);

        assert_eq!(
            response.receivers,
            vec![parser.address_codec().encode(&receiver).unwrap()]
        );
    }

    #[test]
    fn test_multi_esdt_nft_transfer_with_contract_call() {
        let parser = parser();
        let sender = user_address(1);
        let logical_receiver = contract_address(2);
        let data = payload(&[
            "MultiESDTNFTTransfer",
            &hex::encode(logical_receiver.as_bytes()),
            "01",
            &hex::encode("MIIU-abcdef"),
            "00",
            "64",
            &hex::encode("enterFarm"),
        ]);

        let response = parser.parse(&data, &sender, &sender);

        assert_eq!(response.function, "enterFarm");
        assert_eq!(response.tokens, vec!["MIIU-abcdef"]);
        assert_eq!(response.esdt_values, vec!["100"]);
    }

    #[test]
    fn test_multi_esdt_nft_transfer_truncated_triplets() {
        let parser = parser();
        let sender = user_address(1);
        let data = payload(&[
            "MultiESDTNFTTransfer",
            &hex::encode(user_address(2).as_bytes()),
            "02",
            &hex::encode("NFT-123456"),
            "0f",
            "01",
        ]);

        let response = parser.parse(&data, &sender, &sender);
        assert_eq!(response.operation, "MultiESDTNFTTransfer");
        assert!(response.tokens.is_empty());
    }
}
