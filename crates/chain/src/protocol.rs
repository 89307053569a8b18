//! Wire types (§6): [`Block`], [`Transaction`], [`Operation`], and the
//! receipt-shaped [`ProgramFrame`]/[`BlockReceipt`]/[`TransactionReceipt`]
//! records a node keeps after applying them.
//!
//! Canonical encoding lives here as `Encode`/`Decode` impls (from
//! `basalt-codec`) in the exact field order §6 specifies, and digest
//! derivation (`id(block)`, `id(tx)`) is implemented as free functions next
//! to the types they operate on, mirroring `ethrex_common::types::Block`'s
//! habit of keeping RLP encoding and hashing beside the struct definition.

use basalt_codec::{Decode, Encode, decode_vec, encode_vec};
use basalt_common::{Account, Digest};
use basalt_crypto::{Hasher, Signature};

use crate::error::ControllerError;

/// One `{signer, signature}` pair authorizing a transaction (§6). Only user
/// accounts sign; a program account never appears as a signer here.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Authorization {
    pub signer: Account,
    pub signature: Signature,
}

impl Encode for Authorization {
    fn encode(&self, out: &mut Vec<u8>) {
        self.signer.encode(out);
        self.signature.encode(out);
    }
}

impl Decode for Authorization {
    fn decode(buf: &[u8]) -> Result<(Self, &[u8]), basalt_codec::CodecError> {
        let (signer, rest) = Account::decode(buf)?;
        let (signature, rest) = Signature::decode(rest)?;
        Ok((Authorization { signer, signature }, rest))
    }
}

/// A `call_program` operation's input (§6's "Program input/output" row,
/// minus the receipt-only `code`/`stdout`/`stderr`/`id`/`depth` fields).
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct ProgramInput {
    pub arguments: Vec<String>,
    pub stdin: Vec<u8>,
}

impl Encode for ProgramInput {
    fn encode(&self, out: &mut Vec<u8>) {
        encode_vec(&self.arguments, out);
        self.stdin.encode(out);
    }
}

impl Decode for ProgramInput {
    fn decode(buf: &[u8]) -> Result<(Self, &[u8]), basalt_codec::CodecError> {
        let (arguments, rest) = decode_vec::<String>(buf)?;
        let (stdin, rest) = Vec::<u8>::decode(rest)?;
        Ok((ProgramInput { arguments, stdin }, rest))
    }
}

/// A single operation inside a transaction (§6). Tag 0 uploads a program's
/// bytecode; tag 1 invokes one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Operation {
    UploadProgram { id: Account, bytecode: Vec<u8> },
    CallProgram { id: Account, input: ProgramInput },
}

impl Operation {
    pub const TAG_UPLOAD_PROGRAM: u8 = 0;
    pub const TAG_CALL_PROGRAM: u8 = 1;

    pub fn program_id(&self) -> Account {
        match self {
            Operation::UploadProgram { id, .. } => *id,
            Operation::CallProgram { id, .. } => *id,
        }
    }
}

impl Encode for Operation {
    fn encode(&self, out: &mut Vec<u8>) {
        match self {
            Operation::UploadProgram { id, bytecode } => {
                out.push(Self::TAG_UPLOAD_PROGRAM);
                id.encode(out);
                bytecode.encode(out);
            }
            Operation::CallProgram { id, input } => {
                out.push(Self::TAG_CALL_PROGRAM);
                id.encode(out);
                input.encode(out);
            }
        }
    }
}

impl Decode for Operation {
    fn decode(buf: &[u8]) -> Result<(Self, &[u8]), basalt_codec::CodecError> {
        let (tag, rest) = buf
            .split_first()
            .ok_or(basalt_codec::CodecError::InvalidLength {
                expected: 1,
                actual: 0,
            })?;
        let (id, rest) = Account::decode(rest)?;
        match *tag {
            Self::TAG_UPLOAD_PROGRAM => {
                let (bytecode, rest) = Vec::<u8>::decode(rest)?;
                Ok((Operation::UploadProgram { id, bytecode }, rest))
            }
            Self::TAG_CALL_PROGRAM => {
                let (input, rest) = ProgramInput::decode(rest)?;
                Ok((Operation::CallProgram { id, input }, rest))
            }
            other => Err(basalt_codec::CodecError::UnknownTag(other)),
        }
    }
}

/// A transaction (§6). `id` is derived by [`compute_transaction_id`] and
/// must equal the carried field (validated by the controller, not here).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    pub id: Digest,
    pub network_id: Digest,
    pub resource_limit: u64,
    pub payer: Account,
    pub payee: Account,
    pub nonce: u64,
    pub operations: Vec<Operation>,
    pub authorizations: Vec<Authorization>,
}

impl Encode for Transaction {
    fn encode(&self, out: &mut Vec<u8>) {
        self.id.encode(out);
        self.network_id.encode(out);
        self.resource_limit.encode(out);
        self.payer.encode(out);
        self.payee.encode(out);
        self.nonce.encode(out);
        encode_vec(&self.operations, out);
        encode_vec(&self.authorizations, out);
    }
}

impl Decode for Transaction {
    fn decode(buf: &[u8]) -> Result<(Self, &[u8]), basalt_codec::CodecError> {
        let (id, rest) = Digest::decode(buf)?;
        let (network_id, rest) = Digest::decode(rest)?;
        let (resource_limit, rest) = u64::decode(rest)?;
        let (payer, rest) = Account::decode(rest)?;
        let (payee, rest) = Account::decode(rest)?;
        let (nonce, rest) = u64::decode(rest)?;
        let (operations, rest) = decode_vec::<Operation>(rest)?;
        let (authorizations, rest) = decode_vec::<Authorization>(rest)?;
        Ok((
            Transaction {
                id,
                network_id,
                resource_limit,
                payer,
                payee,
                nonce,
                operations,
                authorizations,
            },
            rest,
        ))
    }
}

/// Derives `id(tx) = hash(network_id || resource_limit || payer || payee ||
/// nonce || encoded(ops) || concat(auth.signer))` (§6). Note this digest
/// covers the operations' *canonical encoding*, not each authorization's
/// signature - the signatures authenticate this id, they are not part of
/// it.
pub fn compute_transaction_id(tx: &Transaction) -> Digest {
    let mut hasher = Hasher::new();
    hasher.update(tx.network_id.as_bytes());
    hasher.update_u64(tx.resource_limit);
    hasher.update(&[tx.payer.tag as u8]);
    hasher.update(&tx.payer.address);
    hasher.update(&[tx.payee.tag as u8]);
    hasher.update(&tx.payee.address);
    hasher.update_u64(tx.nonce);
    let mut ops_buf = Vec::new();
    encode_vec(&tx.operations, &mut ops_buf);
    hasher.update(&ops_buf);
    for auth in &tx.authorizations {
        hasher.update(&[auth.signer.tag as u8]);
        hasher.update(&auth.signer.address);
    }
    hasher.finalize()
}

/// A block (§6). `transactions` is length-prefixed on the wire and feeds
/// `id(block)` as the concatenation of each transaction's own `id`, not a
/// full re-encoding of every transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
    pub id: Digest,
    pub previous: Digest,
    pub height: u64,
    pub timestamp: u64,
    pub state_merkle_root: Digest,
    pub transactions: Vec<Transaction>,
    pub signer: Account,
    pub signature: Signature,
}

impl Encode for Block {
    fn encode(&self, out: &mut Vec<u8>) {
        self.id.encode(out);
        self.previous.encode(out);
        self.height.encode(out);
        self.timestamp.encode(out);
        self.state_merkle_root.encode(out);
        encode_vec(&self.transactions, out);
        self.signer.encode(out);
        self.signature.encode(out);
    }
}

impl Decode for Block {
    fn decode(buf: &[u8]) -> Result<(Self, &[u8]), basalt_codec::CodecError> {
        let (id, rest) = Digest::decode(buf)?;
        let (previous, rest) = Digest::decode(rest)?;
        let (height, rest) = u64::decode(rest)?;
        let (timestamp, rest) = u64::decode(rest)?;
        let (state_merkle_root, rest) = Digest::decode(rest)?;
        let (transactions, rest) = decode_vec::<Transaction>(rest)?;
        let (signer, rest) = Account::decode(rest)?;
        let (signature, rest) = Signature::decode(rest)?;
        Ok((
            Block {
                id,
                previous,
                height,
                timestamp,
                state_merkle_root,
                transactions,
                signer,
                signature,
            },
            rest,
        ))
    }
}

/// Derives `id(block) = hash(previous || height || timestamp ||
/// state_merkle_root || concat(tx.id) || signer)` (§6).
pub fn compute_block_id(block: &Block) -> Digest {
    let mut hasher = Hasher::new();
    hasher.update(block.previous.as_bytes());
    hasher.update_u64(block.height);
    hasher.update_u64(block.timestamp);
    hasher.update(block.state_merkle_root.as_bytes());
    for tx in &block.transactions {
        hasher.update(tx.id.as_bytes());
    }
    hasher.update(&[block.signer.tag as u8]);
    hasher.update(&block.signer.address);
    hasher.finalize()
}

/// An event record (named in §6's glossary-adjacent material and resolved
/// as an Open Question in `DESIGN.md`: `impacted` is not enforced
/// non-empty or bounded). `seq` is assigned by the chronicler, monotonic
/// across one block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Event {
    pub seq: u64,
    pub name: String,
    pub data: Vec<u8>,
    pub impacted: Vec<Account>,
}

/// One call frame's captured I/O and identity, in receipt form (a
/// [`crate::call_stack::CallFrame`] plus its depth; §3's "Program frame").
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProgramFrame {
    pub id: Account,
    pub depth: u32,
    pub arguments: Vec<String>,
    pub stdin: Vec<u8>,
    pub code: i32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

/// The receipt for one applied transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionReceipt {
    pub transaction_id: Digest,
    pub reverted: bool,
    pub resources_used: u64,
    pub frames: Vec<ProgramFrame>,
    pub events: Vec<Event>,
}

/// The receipt for one applied block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockReceipt {
    pub block_id: Digest,
    pub height: u64,
    pub resources_used: u64,
    pub state_merkle_root: Digest,
    pub transaction_receipts: Vec<TransactionReceipt>,
}

/// Validates that `tx.id` matches its own canonical digest derivation,
/// independent of signature checks (§8, property 9's `make_id` half).
pub fn verify_transaction_id(tx: &Transaction) -> Result<(), ControllerError> {
    if compute_transaction_id(tx) != tx.id {
        return Err(ControllerError::MalformedTransaction);
    }
    Ok(())
}

/// Validates that `block.id` matches its own canonical digest derivation.
pub fn verify_block_id(block: &Block) -> Result<(), ControllerError> {
    if compute_block_id(block) != block.id {
        return Err(ControllerError::MalformedBlock);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use basalt_common::AccountTag;

    fn sample_tx() -> Transaction {
        let mut tx = Transaction {
            id: Digest::ZERO,
            network_id: Digest::from_bytes([1u8; 32]),
            resource_limit: 1000,
            payer: Account::user([2u8; 32]),
            payee: Account::user([3u8; 32]),
            nonce: 1,
            operations: vec![Operation::UploadProgram {
                id: Account::program([4u8; 32]),
                bytecode: vec![1, 2, 3],
            }],
            authorizations: vec![Authorization {
                signer: Account::user([2u8; 32]),
                signature: Signature::from_bytes([9u8; 64]),
            }],
        };
        tx.id = compute_transaction_id(&tx);
        tx
    }

    #[test]
    fn transaction_round_trips_through_encoding() {
        let tx = sample_tx();
        let mut buf = Vec::new();
        tx.encode(&mut buf);
        let (decoded, rest) = Transaction::decode(&buf).unwrap();
        assert_eq!(decoded, tx);
        assert!(rest.is_empty());
    }

    #[test]
    fn transaction_id_changes_with_any_field() {
        let tx = sample_tx();
        let mut other = tx.clone();
        other.nonce += 1;
        assert_ne!(compute_transaction_id(&tx), compute_transaction_id(&other));
    }

    #[test]
    fn verify_transaction_id_catches_tampering() {
        let mut tx = sample_tx();
        assert!(verify_transaction_id(&tx).is_ok());
        tx.nonce += 1;
        assert!(verify_transaction_id(&tx).is_err());
    }

    #[test]
    fn block_id_covers_transaction_ids_not_full_transactions() {
        let tx = sample_tx();
        let mut block = Block {
            id: Digest::ZERO,
            previous: Digest::ZERO,
            height: 1,
            timestamp: 1,
            state_merkle_root: Digest::from_bytes([5u8; 32]),
            transactions: vec![tx.clone()],
            signer: Account::user([6u8; 32]),
            signature: Signature::from_bytes([7u8; 64]),
        };
        block.id = compute_block_id(&block);
        assert!(verify_block_id(&block).is_ok());

        let mut other_tx = tx;
        other_tx.authorizations[0].signature = Signature::from_bytes([0u8; 64]);
        // Only the tx's own id feeds the block id, not its signatures.
        let mut block2 = block.clone();
        block2.transactions = vec![other_tx];
        assert_eq!(compute_block_id(&block), compute_block_id(&block2));
    }

    #[test]
    fn operation_round_trips() {
        let call = Operation::CallProgram {
            id: Account::program([1u8; 32]),
            input: ProgramInput {
                arguments: vec!["a".to_string(), "b".to_string()],
                stdin: vec![1, 2, 3],
            },
        };
        let mut buf = Vec::new();
        call.encode(&mut buf);
        let (decoded, rest) = Operation::decode(&buf).unwrap();
        assert_eq!(decoded, call);
        assert!(rest.is_empty());
    }

    #[test]
    fn account_tag_is_part_of_public_api_for_program_ids() {
        assert_eq!(Account::program([0u8; 32]).tag, AccountTag::Program);
    }
}
