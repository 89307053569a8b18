//! The execution controller (§4.10): block and transaction validation,
//! resource metering, and deterministic receipt assembly.
//!
//! [`Controller`] is the single entry point a node embeds: `apply_block`
//! drives the whole pipeline (syntactic validation, nonce/signature checks,
//! per-transaction resource sessions, VM dispatch through
//! [`crate::host_bridge::ExecutionContext`], merkle verification, and
//! permanent-node installation), and `read_program` is the read-only side
//! door §9's Open Question resolves `read_program` into - a temporary,
//! discarded state node with no payer to charge.
//!
//! Mirrors the shape of `ethrex_blockchain::Blockchain::add_block`: one
//! object holding the state index and VM, one `#[instrument]`-decorated
//! pipeline method per unit of work, narrow private helpers for the system
//! object spaces (nonce, account credit, resource limits, chain metadata)
//! this controller alone owns the layout of.

use std::collections::HashSet;
use std::sync::Arc;

use basalt_codec::{Decode, Encode};
use basalt_common::constants::{
    KEY_LAST_BLOCK_TIMESTAMP, SPACE_ACCOUNT_RESOURCES, SPACE_CHAIN_META, SPACE_RESOURCE_LIMITS,
    SPACE_TRANSACTION_NONCE,
};
use basalt_common::{Account, Digest, ObjectSpace};
use basalt_crypto::PublicKey;
use basalt_state_db::{Database, PermanentStateNode, StateDbError, TemporaryStateNode};
use basalt_vm::{ProgramOutput, VirtualMachine, VmError};
use tracing::{debug, instrument, warn};

use crate::config::{ControllerConfig, ResourceLimits};
use crate::error::{ControllerError, ReversionError};
use crate::host_bridge::{self, ExecutionContext};
use crate::protocol::{
    Block, BlockReceipt, Operation, ProgramInput, Transaction, TransactionReceipt,
    verify_block_id, verify_transaction_id,
};
use crate::resource::{ResourceMeter, Session};

fn read_u64_temp(node: &TemporaryStateNode, space: &ObjectSpace, key: &[u8]) -> u64 {
    node.get(space, key)
        .and_then(|bytes| <[u8; 8]>::try_from(bytes.as_slice()).ok())
        .map(u64::from_le_bytes)
        .unwrap_or(0)
}

fn write_u64_temp(
    node: &TemporaryStateNode,
    space: &ObjectSpace,
    key: &[u8],
    value: u64,
) -> Result<(), StateDbError> {
    node.put(space, key, value.to_le_bytes().to_vec()).map(|_| ())
}

fn read_u64_permanent(node: &PermanentStateNode, space: &ObjectSpace, key: &[u8]) -> u64 {
    node.get(space, key)
        .and_then(|bytes| <[u8; 8]>::try_from(bytes.as_slice()).ok())
        .map(u64::from_le_bytes)
        .unwrap_or(0)
}

/// Reads a payer's stored resource credit, defaulting to unlimited when
/// unset.
///
/// Resolved Open Question: genesis has no way to pre-fund an account (the
/// index's root delta is born complete - §4.2/§4.3 - so nothing can ever be
/// written into it), and minting/token-economics are explicit Non-goals
/// (§1). Treating an unset `account_resources` entry as `u64::MAX` keeps
/// `tx.resource_limit` as the real, always-enforced spending cap per
/// transaction while not requiring a funding operation this core is
/// explicitly not responsible for.
fn account_resources(node: &TemporaryStateNode, account: Account) -> u64 {
    node.get(&ObjectSpace::system(SPACE_ACCOUNT_RESOURCES), &account.address)
        .and_then(|bytes| <[u8; 8]>::try_from(bytes.as_slice()).ok())
        .map(u64::from_le_bytes)
        .unwrap_or(u64::MAX)
}

fn debit_account_resources(
    node: &TemporaryStateNode,
    account: Account,
    amount: u64,
) -> Result<(), StateDbError> {
    let remaining = account_resources(node, account).saturating_sub(amount);
    write_u64_temp(
        node,
        &ObjectSpace::system(SPACE_ACCOUNT_RESOURCES),
        &account.address,
        remaining,
    )
}

/// The execution controller. Cheap to `Clone`-like-share: hold it behind an
/// `Arc` at the node level, the same way [`basalt_state_db::Database`] and
/// [`basalt_vm::VirtualMachine`] are shared.
pub struct Controller {
    database: Arc<Database>,
    vm: Arc<VirtualMachine>,
    config: ControllerConfig,
    network_id: Digest,
    default_resource_limits: ResourceLimits,
}

impl Controller {
    pub fn new(
        database: Arc<Database>,
        vm: Arc<VirtualMachine>,
        config: ControllerConfig,
        network_id: Digest,
        default_resource_limits: ResourceLimits,
    ) -> Self {
        Controller {
            database,
            vm,
            config,
            network_id,
            default_resource_limits,
        }
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.database
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Reads the `resource_limits` system object space off `node`, falling
    /// back to this controller's configured default when genesis never set
    /// one (§3.3).
    fn resource_limits_of(&self, node: &PermanentStateNode) -> ResourceLimits {
        node.get(&ObjectSpace::system(SPACE_RESOURCE_LIMITS), b"")
            .and_then(|bytes| ResourceLimits::decode(&bytes).ok())
            .map(|(limits, _)| limits)
            .unwrap_or(self.default_resource_limits)
    }

    /// Verifies a user account's signature over `digest` against the
    /// authorization set, mapping any failure uniformly.
    fn verify_user_signature(
        signer: Account,
        digest: &Digest,
        signature: &basalt_crypto::Signature,
    ) -> Result<(), ControllerError> {
        let key = PublicKey::from_bytes(signer.address);
        basalt_crypto::verify(&key, digest, signature).map_err(|_| ControllerError::InvalidSignature)
    }

    /// Applies one block to its parent (§4.10's block pipeline). On success,
    /// the resulting state node is installed as a permanent child of the
    /// parent and may become the new head (per the database's fork-choice
    /// policy); on any error, no state mutation is observable and the head
    /// is unchanged.
    #[instrument(level = "debug", skip_all, fields(block_id = %block.id, height = block.height))]
    pub fn apply_block(&self, block: &Block, now: u64) -> Result<BlockReceipt, ControllerError> {
        verify_block_id(block)?;
        if block.height == 0 {
            return Err(ControllerError::MalformedBlock);
        }
        if block.timestamp == 0 {
            return Err(ControllerError::MalformedBlock);
        }
        if !block.signer.is_user() {
            return Err(ControllerError::InvalidSignature);
        }
        Self::verify_user_signature(block.signer, &block.id, &block.signature)?;

        let parent = self
            .database
            .node(block.previous)
            .map_err(|_| ControllerError::UnknownPreviousBlock)?;

        let expected_height = parent.revision() + 1;
        if block.height != expected_height {
            return Err(ControllerError::UnexpectedHeight);
        }

        // Defense-in-depth: `Database::commit` (§4.3) prunes every node
        // outside the new root's subtree, so a `previous` naming a block
        // behind the committed root normally fails the lookup above as
        // `UnknownPreviousBlock` already. This guards the case that
        // invariant is ever relaxed.
        let root_revision = self.database.root().map_err(ControllerError::from)?.revision();
        if parent.revision() < root_revision {
            return Err(ControllerError::PreIrreversibilityBlock);
        }

        let parent_timestamp =
            read_u64_permanent(&parent, &ObjectSpace::system(SPACE_CHAIN_META), KEY_LAST_BLOCK_TIMESTAMP);
        let max_timestamp = now.saturating_add(self.config.clock_skew_secs);
        if block.timestamp <= parent_timestamp || block.timestamp > max_timestamp {
            return Err(ControllerError::TimestampOutOfBounds);
        }

        let (block_node, transaction_receipts, resources_used) = self.execute(&parent, block)?;

        block_node.mark_complete();
        let computed_root = block_node.merkle_root().map_err(ControllerError::from)?;
        if computed_root != block.state_merkle_root {
            warn!(%computed_root, expected = %block.state_merkle_root, "state merkle mismatch");
            return Err(ControllerError::StateMerkleMismatch);
        }

        self.database
            .install_permanent(block_node.into_delta())
            .map_err(ControllerError::from)?;

        Ok(BlockReceipt {
            block_id: block.id,
            height: block.height,
            resources_used,
            state_merkle_root: computed_root,
            transaction_receipts,
        })
    }

    /// Runs every state mutation `apply_block` performs short of finalizing:
    /// builds the block's temporary working node, charges network bandwidth
    /// for the block's own encoding, applies each transaction in order, and
    /// records the new `last_block_timestamp`. Shared between `apply_block`
    /// and [`Self::preview_state_root`] so a block producer (or a test)
    /// never has to hand-duplicate this sequence to predict a root.
    fn execute(
        &self,
        parent: &PermanentStateNode,
        block: &Block,
    ) -> Result<(TemporaryStateNode, Vec<TransactionReceipt>, u64), ControllerError> {
        let block_node = parent.make_temporary_child(block.id);

        let limits = self.resource_limits_of(parent);
        let mut block_meter = ResourceMeter::new(limits);
        let mut block_bytes = Vec::new();
        block.encode(&mut block_bytes);
        block_meter
            .charge_network_bandwidth(block_bytes.len() as u64)
            .map_err(ControllerError::from)?;
        let mut resources_used = block_meter.used().network_bandwidth;

        debug!(transactions = block.transactions.len(), "applying block");

        let mut transaction_receipts = Vec::with_capacity(block.transactions.len());
        let mut event_seq = 0u64;
        for tx in &block.transactions {
            let (receipt, next_seq) = self.apply_transaction(&block_node, tx, limits, event_seq)?;
            event_seq = next_seq;
            resources_used = resources_used.saturating_add(receipt.resources_used);
            transaction_receipts.push(receipt);
        }

        write_u64_temp(
            &block_node,
            &ObjectSpace::system(SPACE_CHAIN_META),
            KEY_LAST_BLOCK_TIMESTAMP,
            block.timestamp,
        )
        .map_err(ControllerError::from)?;

        Ok((block_node, transaction_receipts, resources_used))
    }

    /// Computes the state merkle root `apply_block` would compute for
    /// `block` against its stated `previous` parent, without installing
    /// anything. A block producer calls this to fill in a candidate
    /// block's `state_merkle_root` before signing it; `apply_block` then
    /// only has to confirm the signed value agrees. Since nothing is
    /// written to the database until `install_permanent` runs, calling
    /// [`Self::execute`] here and again from a subsequent `apply_block`
    /// call against the same unmodified parent is guaranteed to produce
    /// byte-identical state.
    pub fn preview_state_root(&self, block: &Block) -> Result<Digest, ControllerError> {
        let parent = self
            .database
            .node(block.previous)
            .map_err(|_| ControllerError::UnknownPreviousBlock)?;
        let (block_node, _, _) = self.execute(&parent, block)?;
        block_node.mark_complete();
        block_node.merkle_root().map_err(ControllerError::from)
    }

    /// Applies one transaction's operations against `block_node` (§4.10's
    /// transaction pipeline). Returns the assembled receipt and the next
    /// event sequence number the block's chronicler should continue from -
    /// unchanged from `event_seq_start` when the transaction reverted, since
    /// a reverted transaction's own event sequence numbers are never
    /// observed for real (§5's block-wide event ordering guarantee).
    #[instrument(level = "debug", skip_all, fields(tx_id = %tx.id, nonce = tx.nonce))]
    fn apply_transaction(
        &self,
        block_node: &TemporaryStateNode,
        tx: &Transaction,
        limits: ResourceLimits,
        event_seq_start: u64,
    ) -> Result<(TransactionReceipt, u64), ControllerError> {
        verify_transaction_id(tx)?;
        if tx.network_id != self.network_id {
            return Err(ControllerError::NetworkIdMismatch);
        }
        if !tx.payer.is_user() {
            return Err(ControllerError::AuthorizationFailure);
        }

        let mut required_signers = vec![tx.payer];
        if tx.payee != tx.payer && tx.payee.is_user() {
            required_signers.push(tx.payee);
        }
        for signer in &required_signers {
            let auth = tx
                .authorizations
                .iter()
                .find(|a| a.signer == *signer)
                .ok_or(ControllerError::AuthorizationFailure)?;
            Self::verify_user_signature(*signer, &tx.id, &auth.signature)?;
        }

        let nonce_space = ObjectSpace::system(SPACE_TRANSACTION_NONCE);
        let prior_nonce = read_u64_temp(block_node, &nonce_space, &tx.payer.address);
        if tx.nonce == 0 || prior_nonce != tx.nonce - 1 {
            return Err(ControllerError::InvalidNonce);
        }

        if account_resources(block_node, tx.payer) < tx.resource_limit {
            return Err(ControllerError::InsufficientResources);
        }

        // Nonce advancement happens on the block's own working state, ahead
        // of the transaction's speculative node - it is never rolled back,
        // even if the transaction itself reverts (§8 property 8: accepted
        // nonces are strictly monotonic, replay is rejected regardless of
        // whether the replayed transaction would have succeeded).
        write_u64_temp(block_node, &nonce_space, &tx.payer.address, tx.nonce)
            .map_err(ControllerError::from)?;

        let tx_node = block_node.make_child(tx.id);
        let authorized_signers = required_signers;
        let mut session = Session::new(limits, tx.resource_limit, event_seq_start);
        let mut freshly_uploaded: HashSet<Account> = HashSet::new();
        let mut reversion: Option<ReversionError> = None;

        'ops: for op in &tx.operations {
            match op {
                Operation::UploadProgram { id, bytecode } => {
                    if bytecode.is_empty() {
                        reversion = Some(ReversionError::InvalidProgram);
                        break 'ops;
                    }
                    let space = host_bridge::program_data_space();
                    match tx_node.put(&space, &id.address, bytecode.clone()) {
                        Ok(delta) => {
                            if let Err(e) = session.charge_disk_storage(delta) {
                                reversion = Some(e.into());
                                break 'ops;
                            }
                        }
                        Err(_) => {
                            reversion = Some(ReversionError::InvalidAccount);
                            break 'ops;
                        }
                    }
                    freshly_uploaded.insert(*id);
                }
                Operation::CallProgram { id, input } => {
                    let ctx = ExecutionContext::new(
                        tx_node.clone(),
                        self.vm.clone(),
                        session,
                        authorized_signers.clone(),
                        self.config.stack_limit,
                        false,
                    );
                    let result = ctx.invoke(*id, input.arguments.clone(), input.stdin.clone());
                    session = ctx.into_session();
                    match result {
                        Ok(_frame) => {}
                        Err(VmError::InstantiateFailure) if freshly_uploaded.contains(id) => {
                            // A program this same transaction just uploaded
                            // failed to instantiate: the transaction itself
                            // is malformed, not merely unlucky at runtime
                            // (§7's propagation policy carve-out).
                            return Err(ControllerError::MalformedTransaction);
                        }
                        Err(e) => {
                            reversion = Some(e.into());
                            break 'ops;
                        }
                    }
                }
            }
        }

        let used = session.used_resources();
        debit_account_resources(block_node, tx.payer, used).map_err(ControllerError::from)?;

        if let Some(reason) = reversion {
            debug!(error = %reason, "transaction reverted");
            let (frames, events) = session.recorder.into_parts();
            let receipt = TransactionReceipt {
                transaction_id: tx.id,
                reverted: true,
                resources_used: used,
                frames,
                events,
            };
            Ok((receipt, event_seq_start))
        } else {
            tx_node.squash().map_err(ControllerError::from)?;
            let next_seq = session.recorder.next_event_seq();
            let (frames, events) = session.recorder.into_parts();
            let receipt = TransactionReceipt {
                transaction_id: tx.id,
                reverted: false,
                resources_used: used,
                frames,
                events,
            };
            Ok((receipt, next_seq))
        }
    }

    /// Runs `program` read-only against the current head, discarding every
    /// write attempt and the working node itself afterward (§9's resolved
    /// Open Question: `read_program` is state-node-only and read-only, with
    /// no payer to charge and nothing persisted).
    #[instrument(level = "debug", skip_all, fields(program = ?program))]
    pub fn read_program(
        &self,
        program: Account,
        input: ProgramInput,
    ) -> Result<ProgramOutput, ReversionError> {
        let head = self
            .database
            .head_node()
            .map_err(|_| ReversionError::InvalidAccount)?;
        let limits = self.resource_limits_of(&head);
        let node = head.make_temporary_child(program.address.into());
        let session = Session::new(limits, u64::MAX, 0);
        let ctx = ExecutionContext::new(
            node,
            self.vm.clone(),
            session,
            Vec::new(),
            self.config.stack_limit,
            true,
        );
        let frame = ctx
            .invoke(program, input.arguments, input.stdin)
            .map_err(ReversionError::from)?;
        Ok(ProgramOutput {
            code: frame.code,
            stdout: frame.stdout,
            stderr: frame.stderr,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use basalt_common::AccountTag;
    use basalt_crypto::{SecretKey, sign};
    use basalt_vm::VirtualMachine;

    use crate::protocol::{Authorization, compute_block_id, compute_transaction_id};

    struct Fixture {
        controller: Controller,
        payer_key: SecretKey,
        network_id: Digest,
    }

    fn fixture() -> Fixture {
        let database = Database::new();
        database.open(Digest::ZERO).unwrap();
        let vm = Arc::new(VirtualMachine::new(4));
        let network_id = Digest::from_bytes([7u8; 32]);
        let controller = Controller::new(
            database,
            vm,
            ControllerConfig::default(),
            network_id,
            ResourceLimits::new(1_000_000, 1_000_000, 1_000_000),
        );
        Fixture {
            controller,
            payer_key: SecretKey::from_bytes([0x42u8; 32]),
            network_id,
        }
    }

    fn signed_block(fx: &Fixture, height: u64, timestamp: u64, txs: Vec<Transaction>) -> Block {
        let mut block = Block {
            id: Digest::ZERO,
            previous: Digest::ZERO,
            height,
            timestamp,
            state_merkle_root: Digest::ZERO,
            transactions: txs,
            signer: Account {
                tag: AccountTag::User,
                address: *fx.payer_key.public_key().as_bytes(),
            },
            signature: basalt_crypto::Signature::from_bytes([0u8; 64]),
        };
        block.id = compute_block_id(&block);
        block.signature = sign(&fx.payer_key, &block.id);
        block
    }

    fn payer_account(fx: &Fixture) -> Account {
        Account {
            tag: AccountTag::User,
            address: *fx.payer_key.public_key().as_bytes(),
        }
    }

    fn signed_tx(fx: &Fixture, nonce: u64, operations: Vec<Operation>) -> Transaction {
        let payer = payer_account(fx);
        let mut tx = Transaction {
            id: Digest::ZERO,
            network_id: fx.network_id,
            resource_limit: 100_000,
            payer,
            payee: payer,
            nonce,
            operations,
            authorizations: vec![Authorization {
                signer: payer,
                signature: basalt_crypto::Signature::from_bytes([0u8; 64]),
            }],
        };
        tx.id = compute_transaction_id(&tx);
        tx.authorizations[0].signature = sign(&fx.payer_key, &tx.id);
        tx
    }

    #[test]
    fn applies_an_empty_block_against_genesis() {
        let fx = fixture();
        let mut block = signed_block(&fx, 1, 1, vec![]);
        block.state_merkle_root = fx.controller.preview_state_root(&block).unwrap();
        block.id = compute_block_id(&block);
        block.signature = sign(&fx.payer_key, &block.id);

        let receipt = fx.controller.apply_block(&block, 1000).unwrap();
        assert_eq!(receipt.height, 1);
        assert_eq!(receipt.transaction_receipts.len(), 0);
        assert_eq!(fx.controller.database().head().unwrap().id(), block.id);
    }

    #[test]
    fn unknown_previous_block_is_rejected() {
        let fx = fixture();
        let mut block = signed_block(&fx, 1, 1, vec![]);
        block.previous = Digest::from_bytes([9u8; 32]);
        block.id = compute_block_id(&block);
        block.signature = sign(&fx.payer_key, &block.id);

        let err = fx.controller.apply_block(&block, 1000).unwrap_err();
        assert!(matches!(err, ControllerError::UnknownPreviousBlock));
    }

    #[test]
    fn unexpected_height_is_rejected() {
        let fx = fixture();
        let mut block = signed_block(&fx, 2, 1, vec![]);
        block.id = compute_block_id(&block);
        block.signature = sign(&fx.payer_key, &block.id);

        let err = fx.controller.apply_block(&block, 1000).unwrap_err();
        assert!(matches!(err, ControllerError::UnexpectedHeight));
    }

    #[test]
    fn nonce_replay_is_rejected_with_no_observable_state_change() {
        let fx = fixture();
        let tx = signed_tx(&fx, 1, vec![]);

        let mut block = signed_block(&fx, 1, 1, vec![tx.clone()]);
        block.state_merkle_root = fx.controller.preview_state_root(&block).unwrap();
        block.id = compute_block_id(&block);
        block.signature = sign(&fx.payer_key, &block.id);
        let receipt = fx.controller.apply_block(&block, 1000).unwrap();
        assert!(!receipt.transaction_receipts[0].reverted);

        // The replayed nonce makes this transaction invalid regardless of
        // what root it claims: `apply_block` rejects it in
        // `apply_transaction`, well before it ever reaches merkle
        // verification, so no real root needs to be computed here.
        let replay_tx = signed_tx(&fx, 1, vec![]);
        let mut replay_block = signed_block(&fx, 2, 2, vec![replay_tx]);
        replay_block.previous = block.id;
        replay_block.id = compute_block_id(&replay_block);
        replay_block.signature = sign(&fx.payer_key, &replay_block.id);

        let err = fx.controller.apply_block(&replay_block, 1000).unwrap_err();
        assert!(matches!(err, ControllerError::InvalidNonce));
        assert_eq!(fx.controller.database().head().unwrap().id(), block.id);
    }

    #[test]
    fn uploading_empty_bytecode_reverts_the_transaction() {
        let fx = fixture();
        let program = Account::program([4u8; 32]);
        let tx = signed_tx(
            &fx,
            1,
            vec![Operation::UploadProgram {
                id: program,
                bytecode: vec![],
            }],
        );
        let mut block = signed_block(&fx, 1, 1, vec![tx]);
        block.state_merkle_root = fx.controller.preview_state_root(&block).unwrap();
        block.id = compute_block_id(&block);
        block.signature = sign(&fx.payer_key, &block.id);

        let receipt = fx.controller.apply_block(&block, 1000).unwrap();
        assert!(receipt.transaction_receipts[0].reverted);
    }

    #[test]
    fn calling_a_program_with_no_uploaded_bytecode_does_not_revert() {
        let fx = fixture();
        let program = Account::program([5u8; 32]);
        let tx = signed_tx(
            &fx,
            1,
            vec![Operation::CallProgram {
                id: program,
                input: ProgramInput::default(),
            }],
        );
        let mut block = signed_block(&fx, 1, 1, vec![tx]);
        block.state_merkle_root = fx.controller.preview_state_root(&block).unwrap();
        block.id = compute_block_id(&block);
        block.signature = sign(&fx.payer_key, &block.id);

        let receipt = fx.controller.apply_block(&block, 1000).unwrap();
        assert!(!receipt.transaction_receipts[0].reverted);
        assert_eq!(receipt.transaction_receipts[0].frames[0].code, -1);
    }
}
