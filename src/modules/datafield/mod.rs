use std::collections::HashSet;
use std::sync::Arc;

use crate::interfaces::{AddressCodec, ShardCoordinator};
use crate::types::{Address, Amount};
use crate::AT_SEPARATOR;

mod transfers;

pub(crate) const OPERATION_TRANSFER: &str = "transfer";
pub(crate) const OPERATION_DEPLOY: &str = "scDeploy";

pub(crate) const ESDT_TRANSFER: &str = "ESDTTransfer";
pub(crate) const ESDT_NFT_TRANSFER: &str = "ESDTNFTTransfer";
pub(crate) const MULTI_ESDT_NFT_TRANSFER: &str = "MultiESDTNFTTransfer";
pub(crate) const ESDT_NFT_CREATE: &str = "ESDTNFTCreate";
pub(crate) const ESDT_NFT_BURN: &str = "ESDTNFTBurn";
pub(crate) const ESDT_NFT_ADD_QUANTITY: &str = "ESDTNFTAddQuantity";
pub(crate) const RELAYED_TX: &str = "relayedTx";
pub(crate) const RELAYED_TX_V2: &str = "relayedTxV2";

const ESDT_LOCAL_BURN: &str = "ESDTLocalBurn";
const ESDT_LOCAL_MINT: &str = "ESDTLocalMint";
const ESDT_WIPE: &str = "ESDTWipe";
const ESDT_FREEZE: &str = "ESDTFreeze";
const ESDT_UNFREEZE: &str = "ESDTUnFreeze";

const MIN_ARGUMENTS_QUANTITY_OPERATION_ESDT: usize = 2;
const MIN_ARGUMENTS_QUANTITY_OPERATION_NFT: usize = 3;

const ESDT_IDENTIFIER_SEPARATOR: u8 = b'-';
const ESDT_RANDOM_SEQUENCE_LENGTH: usize = 6;

/// Structured description of what a payload does. Ephemeral: consumed by the
/// builder/processor that requested the parse.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseParseData {
    pub operation: String,
    pub function: String,
    pub esdt_values: Vec<String>,
    pub tokens: Vec<String>,
    pub receivers: Vec<String>,
    pub receivers_shard_ids: Vec<u32>,
    pub is_relayed: bool,
}

impl ResponseParseData {
    fn with_operation(operation: &str) -> Self {
        Self {
            operation: operation.to_owned(),
            ..Self::default()
        }
    }
}

/// Recognized builtin-function names, grouped by the argument layout they
/// share. Built once at startup; the parser only ever reads them.
#[derive(Debug)]
struct OperationTables {
    quantity_esdt: HashSet<&'static str>,
    quantity_nft: HashSet<&'static str>,
    blocking: HashSet<&'static str>,
    relayed: HashSet<&'static str>,
    esdt_annotating: HashSet<&'static str>,
    nft_annotating: HashSet<&'static str>,
}

impl OperationTables {
    fn new() -> Self {
        Self {
            quantity_esdt: HashSet::from([ESDT_LOCAL_BURN, ESDT_LOCAL_MINT]),
            quantity_nft: HashSet::from([ESDT_NFT_CREATE, ESDT_NFT_BURN, ESDT_NFT_ADD_QUANTITY]),
            blocking: HashSet::from([ESDT_WIPE, ESDT_FREEZE, ESDT_UNFREEZE]),
            relayed: HashSet::from([RELAYED_TX, RELAYED_TX_V2]),
            esdt_annotating: HashSet::from([
                ESDT_TRANSFER,
                ESDT_LOCAL_BURN,
                ESDT_LOCAL_MINT,
                ESDT_WIPE,
                ESDT_FREEZE,
                ESDT_UNFREEZE,
            ]),
            nft_annotating: HashSet::from([
                ESDT_NFT_TRANSFER,
                MULTI_ESDT_NFT_TRANSFER,
                ESDT_NFT_CREATE,
                ESDT_NFT_BURN,
                ESDT_NFT_ADD_QUANTITY,
            ]),
        }
    }
}

/// Decodes a transaction/SCR payload into an operation descriptor. Pure and
/// shareable: no state beyond the immutable tables and the collaborators.
pub struct OperationParser {
    tables: OperationTables,
    address_codec: Arc<dyn AddressCodec + Send + Sync>,
    shard_coordinator: Arc<dyn ShardCoordinator + Send + Sync>,
}

impl OperationParser {
    pub fn new(
        address_codec: Arc<dyn AddressCodec + Send + Sync>,
        shard_coordinator: Arc<dyn ShardCoordinator + Send + Sync>,
    ) -> Self {
        Self {
            tables: OperationTables::new(),
            address_codec,
            shard_coordinator,
        }
    }

    /// An unparsable payload is a plain transfer, never an error: indexing
    /// must not reject what the chain already executed.
    pub fn parse(&self, data: &[u8], sender: &Address, receiver: &Address) -> ResponseParseData {
        let mut response = ResponseParseData::with_operation(OPERATION_TRANSFER);

        if !data.is_empty() && receiver.is_empty_address() {
            response.operation = OPERATION_DEPLOY.to_owned();
            return response;
        }

        let (function, args) = match split_data_field(data) {
            Some(parsed) => parsed,
            None => return response,
        };

        match function.as_str() {
            ESDT_TRANSFER => transfers::parse_esdt_transfer(&args, receiver),
            ESDT_NFT_TRANSFER => transfers::parse_esdt_nft_transfer(self, &args, sender, receiver),
            MULTI_ESDT_NFT_TRANSFER => {
                transfers::parse_multi_esdt_nft_transfer(self, &args, sender, receiver)
            }
            name if self.tables.quantity_esdt.contains(name) => {
                parse_quantity_operation_esdt(&args, name)
            }
            name if self.tables.quantity_nft.contains(name) => {
                parse_quantity_operation_nft(&args, name)
            }
            name if self.tables.blocking.contains(name) => {
                parse_blocking_operation_esdt(&args, name)
            }
            name if self.tables.relayed.contains(name) => {
                // the inner transaction is inspected by the caller if needed
                response.is_relayed = true;
                response
            }
            name => {
                if !name.is_empty() && receiver.is_smart_contract() && is_ascii_string(name) {
                    response.function = name.to_owned();
                }
                response
            }
        }
    }

    /// Whether the parsed operation moves or manages a fungible token.
    pub fn is_esdt_operation(&self, operation: &str) -> bool {
        self.tables.esdt_annotating.contains(operation)
    }

    /// Whether the parsed operation touches an NFT (or a batched transfer
    /// that can carry NFTs).
    pub fn is_nft_operation(&self, operation: &str) -> bool {
        self.tables.nft_annotating.contains(operation)
    }

    pub(crate) fn address_codec(&self) -> &(dyn AddressCodec + Send + Sync) {
        self.address_codec.as_ref()
    }

    pub(crate) fn shard_coordinator(&self) -> &(dyn ShardCoordinator + Send + Sync) {
        self.shard_coordinator.as_ref()
    }
}

/// `@`-separated payload: an ASCII function name followed by hex-encoded
/// arguments. Any undecodable argument makes the whole payload unparsable.
fn split_data_field(data: &[u8]) -> Option<(String, Vec<Vec<u8>>)> {
    if data.is_empty() {
        return None;
    }

    let text = std::str::from_utf8(data).ok()?;
    let mut segments = text.split(AT_SEPARATOR);

    let function = segments.next()?.to_owned();
    let mut args = Vec::new();
    for segment in segments {
        args.push(hex::decode(segment).ok()?);
    }

    Some((function, args))
}

fn parse_quantity_operation_esdt(args: &[Vec<u8>], function: &str) -> ResponseParseData {
    let mut response = ResponseParseData::with_operation(function);

    if args.len() < MIN_ARGUMENTS_QUANTITY_OPERATION_ESDT {
        return response;
    }

    let token = match std::str::from_utf8(&args[0]) {
        Ok(token) if is_ascii_string(token) => token,
        _ => return response,
    };

    response.tokens.push(token.to_owned());
    response
        .esdt_values
        .push(Amount::from_bytes_be(&args[1]).to_string());

    response
}

fn parse_quantity_operation_nft(args: &[Vec<u8>], function: &str) -> ResponseParseData {
    let mut response = ResponseParseData::with_operation(function);

    if args.len() < MIN_ARGUMENTS_QUANTITY_OPERATION_NFT {
        return response;
    }

    let token = match std::str::from_utf8(&args[0]) {
        Ok(token) if is_ascii_string(token) => token,
        _ => return response,
    };

    let nonce = Amount::from_bytes_be(&args[1]).0.to_u64_digits();
    let nonce = nonce.first().copied().unwrap_or(0);
    response.tokens.push(compute_token_identifier(token, nonce));
    response
        .esdt_values
        .push(Amount::from_bytes_be(&args[2]).to_string());

    response
}

fn parse_blocking_operation_esdt(args: &[Vec<u8>], function: &str) -> ResponseParseData {
    let mut response = ResponseParseData::with_operation(function);

    let arg = match args.first() {
        Some(arg) => arg,
        None => return response,
    };

    let (token, nonce) = extract_token_identifier_and_nonce(arg);
    let token = match std::str::from_utf8(&token) {
        Ok(token) if is_ascii_string(token) => token,
        _ => return response,
    };

    response.tokens.push(compute_token_identifier(token, nonce));
    response
}

/// `TOKEN-rrrrrrNN..`: the trailing bytes of the identifier segment past the
/// fixed-length random sequence encode the NFT nonce.
pub(crate) fn extract_token_identifier_and_nonce(arg: &[u8]) -> (Vec<u8>, u64) {
    let mut split = arg.splitn(2, |b| *b == ESDT_IDENTIFIER_SEPARATOR);
    let ticker = split.next().unwrap_or_default();
    let rest = match split.next() {
        Some(rest) => rest,
        None => return (arg.to_vec(), 0),
    };

    if rest.len() <= ESDT_RANDOM_SEQUENCE_LENGTH {
        return (arg.to_vec(), 0);
    }

    let mut identifier = ticker.to_vec();
    identifier.push(ESDT_IDENTIFIER_SEPARATOR);
    identifier.extend_from_slice(&rest[..ESDT_RANDOM_SEQUENCE_LENGTH]);

    let nonce = Amount::from_bytes_be(&rest[ESDT_RANDOM_SEQUENCE_LENGTH..]);
    (identifier, nonce.0.to_u64_digits().first().copied().unwrap_or(0))
}

/// NFT identifiers denormalize the nonce as a hex suffix.
pub(crate) fn compute_token_identifier(token: &str, nonce: u64) -> String {
    if nonce == 0 {
        return token.to_owned();
    }

    let nonce_bytes = Amount::from(nonce).0.to_bytes_be();
    format!("{}-{}", token, hex::encode(nonce_bytes))
}

pub(crate) fn is_ascii_string(input: &str) -> bool {
    input.bytes().all(|b| b <= 0x7F)
}
