//! Message handlers of the farmer.
//!
//! Handlers never propagate errors: anything unacceptable is logged and dropped, the
//! farmer's job is to survive the slot. The only outputs are outbound messages and
//! observer events.

use super::{
    CacheKey, Farmer, MAX_POS_PER_SP, PendingSolverRequest, QualityIdentifier, StateChange,
    partial_proof_key, unix_now,
};
use crate::peers::FarmingPeer;
use acre_core_primitives::hashes::Blake3Hash;
use acre_core_primitives::keys::{
    SecretKey, Signature, generate_plot_public_key, generate_taproot_sk,
};
use acre_core_primitives::pool::PoolTarget;
use acre_core_primitives::pos::{
    PlotSize, ProofOfSpace, calculate_pos_challenge, verify_and_get_quality_string,
};
use acre_core_primitives::pot::{calculate_iterations_quality, calculate_sp_interval_iters};
use acre_protocol::farmer::{
    DeclareProofOfSpace, FarmingInfo, NewSignagePoint, RequestSignedValues, SignedValues,
};
use acre_protocol::harvester::{
    NewProofOfSpace, NewSignagePointHarvester, PartialProofsData, RequestSignatures,
    RespondSignatures,
};
use acre_protocol::solver::{SolverRequest, SolverResponse};
use acre_protocol::{CodecError, Message, NodeType, ProtocolMessageType};
use parity_scale_codec::Encode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Deadline for the signature round trip to a harvester
const SIGNATURE_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

impl Farmer {
    /// Route an inbound message to its handler
    pub async fn handle_message(&self, message: Message, peer: Arc<dyn FarmingPeer>) {
        let msg_type = message.msg_type;
        if let Err(error) = self.dispatch(message, peer).await {
            warn!(%error, ?msg_type, "Dropping malformed message");
        }
    }

    async fn dispatch(
        &self,
        message: Message,
        peer: Arc<dyn FarmingPeer>,
    ) -> Result<(), CodecError> {
        match message.msg_type {
            ProtocolMessageType::NewSignagePoint => {
                self.new_signage_point(message.parse()?).await;
            }
            ProtocolMessageType::NewProofOfSpace => {
                self.new_proof_of_space(message.parse()?, peer).await;
            }
            ProtocolMessageType::RespondSignatures => {
                self.respond_signatures(message.parse()?).await;
            }
            ProtocolMessageType::PartialProofs => {
                self.partial_proofs(message.parse()?, peer).await;
            }
            ProtocolMessageType::SolverResponse => {
                self.solution_response(message.parse()?, peer).await;
            }
            ProtocolMessageType::FarmingInfo => {
                self.farming_info(message.parse()?);
            }
            ProtocolMessageType::RequestSignedValues => {
                if let Some(signed_values) = self.request_signed_values(message.parse()?).await {
                    let reply = Message::make_reply(
                        ProtocolMessageType::SignedValues,
                        message.id,
                        &signed_values,
                    );
                    if let Err(error) = peer.send(reply).await {
                        warn!(
                            %error,
                            peer_id = %peer.peer_id(),
                            "Failed to return signed values to full node"
                        );
                    }
                }
            }
            unexpected => {
                warn!(?unexpected, peer_id = %peer.peer_id(), "Unexpected message type");
            }
        }
        Ok(())
    }

    /// A full node announced a signage point: fan it out to every harvester.
    ///
    /// Concurrent duplicates from racing full-node connections collapse to one
    /// broadcast: the signage point is registered in the cache before the first
    /// suspension point, so later invocations see it and drop.
    pub async fn new_signage_point(&self, new_signage_point: NewSignagePoint) {
        let now = unix_now();
        let sp_hash = new_signage_point.challenge_chain_sp;

        let missing = self.state.lock().check_missing_signage_points(
            now,
            &new_signage_point,
            &self.constants,
        );
        if let Some((timestamp, count)) = missing {
            self.state_changed(StateChange::MissingSignagePoints { timestamp, count });
        }

        {
            let mut state = self.state.lock();
            if let Some(existing) = state.sps.get(&sp_hash) {
                if existing
                    .iter()
                    .any(|sp| sp.reward_chain_sp == new_signage_point.reward_chain_sp)
                {
                    debug!(%sp_hash, "Duplicate signage point");
                    return;
                }
            }
            state
                .sps
                .entry(sp_hash)
                .or_default()
                .push(new_signage_point.clone());
            state
                .cache_add_time
                .entry(CacheKey::Hash(sp_hash))
                .or_insert(now);
        }

        let harvester_message = NewSignagePointHarvester {
            challenge_hash: new_signage_point.challenge_hash,
            difficulty: new_signage_point.difficulty,
            sub_slot_iters: new_signage_point.sub_slot_iters,
            signage_point_index: new_signage_point.signage_point_index,
            sp_hash,
            pool_difficulties: Vec::new(),
            peak_height: new_signage_point.peak_height,
            last_tx_height: new_signage_point.last_tx_height,
        };
        self.broadcast(
            NodeType::Harvester,
            Message::make(
                ProtocolMessageType::NewSignagePointHarvester,
                &harvester_message,
            ),
        )
        .await;
        self.state_changed(StateChange::NewSignagePoint { sp_hash });
    }

    /// A harvester found a proof of space: quality-gate it and request the signage
    /// point signature shares
    pub async fn new_proof_of_space(
        &self,
        new_proof_of_space: NewProofOfSpace,
        peer: Arc<dyn FarmingPeer>,
    ) {
        let now = unix_now();
        let sp_hash = new_proof_of_space.sp_hash;

        let request = {
            let mut state = self.state.lock();
            state.number_of_responses.entry(sp_hash).or_insert(0);
            state
                .cache_add_time
                .entry(CacheKey::Hash(sp_hash))
                .or_insert(now);

            if state.number_of_responses[&sp_hash] >= MAX_POS_PER_SP {
                info!(
                    %sp_hash,
                    "Surpassed {MAX_POS_PER_SP} proofs of space for one signage point, \
                    no longer submitting"
                );
                return;
            }

            let Some(sps) = state.sps.get(&sp_hash).cloned() else {
                warn!(%sp_hash, "Received response for a signage point that we do not have");
                return;
            };

            let mut request = None;
            for sp in sps {
                let quality_string = verify_and_get_quality_string(
                    &new_proof_of_space.proof,
                    &self.constants,
                    &new_proof_of_space.challenge_hash,
                    &sp_hash,
                    sp.peak_height,
                );
                let Some(quality_string) = quality_string else {
                    error!(proof = ?new_proof_of_space.proof, "Invalid proof of space");
                    return;
                };

                *state
                    .number_of_responses
                    .get_mut(&sp_hash)
                    .expect("Inserted above; qed") += 1;

                let required_iters = calculate_iterations_quality(
                    &self.constants,
                    &quality_string,
                    new_proof_of_space.proof.size,
                    sp.difficulty,
                    &sp_hash,
                    sp.sub_slot_iters,
                    sp.last_tx_height.unwrap_or_default(),
                );
                let sp_interval_iters =
                    calculate_sp_interval_iters(&self.constants, sp.sub_slot_iters);
                if required_iters >= sp_interval_iters {
                    warn!(
                        %sp_hash,
                        required_iters,
                        sp_interval_iters,
                        "Proof of space does not clear the signage point interval"
                    );
                    return;
                }

                state.proofs_of_space.entry(sp_hash).or_default().push((
                    new_proof_of_space.plot_identifier.clone(),
                    new_proof_of_space.proof.clone(),
                ));
                state.cache_add_time.insert(CacheKey::Hash(sp_hash), now);
                state.quality_to_identifiers.insert(
                    quality_string,
                    QualityIdentifier {
                        plot_identifier: new_proof_of_space.plot_identifier.clone(),
                        challenge_hash: new_proof_of_space.challenge_hash,
                        sp_hash,
                        peer_id: peer.peer_id(),
                    },
                );
                state
                    .cache_add_time
                    .insert(CacheKey::Hash(quality_string), now);

                request = Some(RequestSignatures {
                    plot_identifier: new_proof_of_space.plot_identifier.clone(),
                    challenge_hash: new_proof_of_space.challenge_hash,
                    sp_hash,
                    messages: vec![sp.challenge_chain_sp, sp.reward_chain_sp],
                    message_data: None,
                    rc_block_unfinished: None,
                });
                break;
            }
            request
        };

        if let Some(request) = request {
            let message = Message::make(ProtocolMessageType::RequestSignatures, &request);
            if let Err(error) = peer.send(message).await {
                warn!(
                    %error,
                    peer_id = %peer.peer_id(),
                    "Failed to request signatures from harvester"
                );
            }
        }
    }

    /// A harvester returned signature shares, either for a signage point or for
    /// foliage; finish the respective phase
    pub async fn respond_signatures(&self, response: RespondSignatures) {
        if let Some(signed_values) = self.process_respond_signatures(response).await {
            let message = Message::make(ProtocolMessageType::SignedValues, &signed_values);
            self.broadcast(NodeType::FullNode, message).await;
        }
    }

    /// A full node wants the foliage of an assembled block signed: round-trip a
    /// signature request to the harvester that found the winning proof
    pub async fn request_signed_values(
        &self,
        request: RequestSignedValues,
    ) -> Option<SignedValues> {
        let identifier = self
            .state
            .lock()
            .quality_to_identifiers
            .get(&request.quality_string)
            .cloned();
        let Some(identifier) = identifier else {
            error!(
                quality_string = %request.quality_string,
                "Do not have quality string"
            );
            return None;
        };

        let signature_request = RequestSignatures {
            plot_identifier: identifier.plot_identifier.clone(),
            challenge_hash: identifier.challenge_hash,
            sp_hash: identifier.sp_hash,
            messages: vec![
                request.foliage_block_data_hash,
                request.foliage_transaction_block_hash,
            ],
            message_data: None,
            rc_block_unfinished: None,
        };

        let Some(peer) = self.peers.get(&identifier.peer_id) else {
            warn!(
                peer_id = %identifier.peer_id,
                "Harvester that found the proof is no longer connected"
            );
            return None;
        };
        let message = Message::make(ProtocolMessageType::RequestSignatures, &signature_request);
        let reply = match peer.call(message, SIGNATURE_REQUEST_TIMEOUT).await {
            Ok(reply) => reply,
            Err(error) => {
                warn!(
                    %error,
                    peer_id = %identifier.peer_id,
                    "Signature request to harvester failed"
                );
                return None;
            }
        };
        match reply.parse::<RespondSignatures>() {
            Ok(response) => self.process_respond_signatures(response).await,
            Err(error) => {
                warn!(%error, "Malformed signature response from harvester");
                None
            }
        }
    }

    async fn process_respond_signatures(
        &self,
        response: RespondSignatures,
    ) -> Option<SignedValues> {
        if response.message_signatures.len() < 2 {
            warn!(sp_hash = %response.sp_hash, "Signature response with too few shares");
            return None;
        }

        let (signage_point_index, peak_height, is_sp_signatures, pospace) = {
            let state = self.state.lock();
            let Some(sps) = state.sps.get(&response.sp_hash) else {
                warn!(challenge_hash = %response.challenge_hash, "Do not have challenge hash");
                return None;
            };
            let first = sps.first().expect("Signage point lists are never empty; qed");
            let is_sp_signatures = response.sp_hash == response.message_signatures[0].0
                && sps
                    .iter()
                    .any(|sp| sp.reward_chain_sp == response.message_signatures[1].0);
            let pospace = state.proofs_of_space.get(&response.sp_hash).and_then(|proofs| {
                proofs
                    .iter()
                    .find(|(plot_identifier, _)| *plot_identifier == response.plot_identifier)
                    .map(|(_, pospace)| pospace.clone())
            });
            let Some(pospace) = pospace else {
                debug!(sp_hash = %response.sp_hash, "Failed to load farmer proofs");
                return None;
            };
            (
                first.signage_point_index,
                first.peak_height,
                is_sp_signatures,
                pospace,
            )
        };

        let quality_string = verify_and_get_quality_string(
            &pospace,
            &self.constants,
            &response.challenge_hash,
            &response.sp_hash,
            peak_height,
        );
        let Some(quality_string) = quality_string else {
            warn!(?pospace, "Have invalid proof of space");
            return None;
        };

        if is_sp_signatures {
            self.declare_proof_of_space(&response, &pospace, signage_point_index)
                .await;
            None
        } else {
            self.sign_foliage(&response, &pospace, quality_string)
        }
    }

    /// Signage point phase: aggregate the shares and declare the proof to every full
    /// node
    async fn declare_proof_of_space(
        &self,
        response: &RespondSignatures,
        pospace: &ProofOfSpace,
        signage_point_index: u8,
    ) {
        let (challenge_chain_sp, _) = response.message_signatures[0];
        let (reward_chain_sp, _) = response.message_signatures[1];

        for secret_key in self.keystore.secret_keys() {
            if secret_key.public_key() != response.farmer_pk {
                continue;
            }
            let Some((challenge_chain_sp_signature, reward_chain_sp_signature)) =
                aggregate_signature_shares(response, pospace, secret_key)
            else {
                return;
            };

            let (pool_target, pool_signature) = match &pospace.pool_public_key {
                Some(pool_public_key) => {
                    let Some(pool_secret_key) = self.keystore.pool_secret_key(pool_public_key)
                    else {
                        error!(
                            %pool_public_key,
                            "Don't have the private key for the pool key used by harvester"
                        );
                        return;
                    };
                    let pool_target = PoolTarget {
                        puzzle_hash: self.config.pool_reward_address,
                        max_height: 0,
                    };
                    let pool_signature = pool_secret_key.sign(&pool_target.encode());
                    (Some(pool_target), Some(pool_signature))
                }
                None => (None, None),
            };

            let declaration = DeclareProofOfSpace {
                challenge_hash: response.challenge_hash,
                challenge_chain_sp,
                signage_point_index,
                reward_chain_sp,
                proof_of_space: pospace.clone(),
                challenge_chain_sp_signature,
                reward_chain_sp_signature,
                farmer_puzzle_hash: response
                    .farmer_reward_address_override
                    .unwrap_or(self.config.farmer_reward_address),
                pool_target,
                pool_signature,
            };
            info!(sp_hash = %response.sp_hash, "Declaring proof of space");
            let message =
                Message::make(ProtocolMessageType::DeclareProofOfSpace, &declaration);
            self.broadcast(NodeType::FullNode, message).await;
            self.state_changed(StateChange::Proof {
                declaration,
                passed_filter: true,
            });
            return;
        }
    }

    /// Foliage phase: aggregate the shares into the signed block values
    fn sign_foliage(
        &self,
        response: &RespondSignatures,
        pospace: &ProofOfSpace,
        quality_string: Blake3Hash,
    ) -> Option<SignedValues> {
        for secret_key in self.keystore.secret_keys() {
            if secret_key.public_key() != response.farmer_pk {
                continue;
            }
            let (foliage_block_data_signature, foliage_transaction_block_signature) =
                aggregate_signature_shares(response, pospace, secret_key)?;
            return Some(SignedValues {
                quality_string,
                foliage_block_data_signature,
                foliage_transaction_block_signature,
            });
        }
        // No farmer key matches: the plot belongs to someone else's farmer
        None
    }

    /// A harvester sent v2 partial proofs: record them and forward to the solvers
    pub async fn partial_proofs(
        &self,
        partial_proofs_data: PartialProofsData,
        peer: Arc<dyn FarmingPeer>,
    ) {
        let now = unix_now();
        let sp_hash = partial_proofs_data.sp_hash;

        let inserted = {
            let mut state = self.state.lock();
            state.number_of_responses.entry(sp_hash).or_insert(0);
            state
                .cache_add_time
                .entry(CacheKey::Hash(sp_hash))
                .or_insert(now);

            if !state.sps.contains_key(&sp_hash) {
                warn!("Received partial proofs for a signage point that we do not have {sp_hash}");
                return;
            }

            partial_proofs_data
                .partial_proofs
                .iter()
                .map(|partial_proof| {
                    let key = partial_proof_key(partial_proof);
                    state.pending_solver_requests.insert(
                        key,
                        PendingSolverRequest {
                            proof_data: partial_proofs_data.clone(),
                            peer: Arc::clone(&peer),
                        },
                    );
                    state.cache_add_time.insert(CacheKey::PartialProof(key), now);
                    key
                })
                .collect::<Vec<_>>()
        };

        let request = SolverRequest {
            proof_data: partial_proofs_data,
        };
        let message = Message::make(ProtocolMessageType::SolverRequest, &request);
        for solver in self.peers.of_type(NodeType::Solver) {
            if let Err(error) = solver.send(message.clone()).await {
                error!(
                    %error,
                    peer_id = %solver.peer_id(),
                    "Failed to forward partial proofs to solver"
                );
                let mut state = self.state.lock();
                for key in &inserted {
                    state.pending_solver_requests.remove(key);
                    state.cache_add_time.remove(&CacheKey::PartialProof(*key));
                }
                return;
            }
        }
    }

    /// A solver answered for a partial proof: on success, re-enter the proof pipeline
    /// on behalf of the originating harvester
    pub async fn solution_response(
        &self,
        solver_response: SolverResponse,
        solver_peer: Arc<dyn FarmingPeer>,
    ) {
        let key = partial_proof_key(&solver_response.partial_proof);
        let pending = {
            let mut state = self.state.lock();
            let pending = state.pending_solver_requests.remove(&key);
            if pending.is_some() {
                state.cache_add_time.remove(&CacheKey::PartialProof(key));
            }
            pending
        };
        let Some(PendingSolverRequest { proof_data, peer }) = pending else {
            warn!(
                peer_id = %solver_peer.peer_id(),
                "Received solver response for an unknown partial proof"
            );
            return;
        };

        if solver_response.proof.is_empty() {
            debug!(
                sp_hash = %proof_data.sp_hash,
                plot_identifier = %proof_data.plot_identifier,
                "Solver could not finish partial proof"
            );
            return;
        }

        // Exactly one of pool key and contract hash may survive into the proof
        let pool_contract_puzzle_hash = proof_data
            .pool_public_key
            .is_none()
            .then_some(proof_data.pool_contract_puzzle_hash);
        let proof = ProofOfSpace {
            challenge: calculate_pos_challenge(
                &proof_data.plot_id,
                &proof_data.challenge_hash,
                &proof_data.sp_hash,
            ),
            pool_public_key: proof_data.pool_public_key,
            pool_contract_puzzle_hash,
            plot_public_key: proof_data.plot_public_key,
            size: PlotSize::V2 {
                k: proof_data.plot_size,
                strength: proof_data.strength,
            },
            proof: solver_response.proof,
        };
        let new_proof = NewProofOfSpace {
            challenge_hash: proof_data.challenge_hash,
            sp_hash: proof_data.sp_hash,
            plot_identifier: proof_data.plot_identifier,
            proof,
            signage_point_index: proof_data.signage_point_index,
            include_source_signature_data: false,
            farmer_reward_address_override: None,
            fee_info: None,
        };
        self.new_proof_of_space(new_proof, peer).await;
    }

    /// Harvester lookup statistics, forwarded to observers
    pub fn farming_info(&self, info: FarmingInfo) {
        self.state_changed(StateChange::NewFarmingInfo { info });
    }

    pub(crate) async fn broadcast(&self, node_type: NodeType, message: Message) {
        let sends = self
            .peers
            .of_type(node_type)
            .into_iter()
            .map(|peer| {
                let message = message.clone();
                async move {
                    if let Err(error) = peer.send(message).await {
                        warn!(
                            %error,
                            peer_id = %peer.peer_id(),
                            "Failed to deliver message to peer"
                        );
                    }
                }
            })
            .collect::<Vec<_>>();
        futures::future::join_all(sends).await;
    }
}

/// Produce the farmer (and, for pool-contract plots, taproot) shares for both
/// requested messages and aggregate them with the harvester shares.
///
/// Returns `None`, with the reason logged, when the plot public key does not match or
/// any aggregate fails verification; no partial results escape.
fn aggregate_signature_shares(
    response: &RespondSignatures,
    pospace: &ProofOfSpace,
    secret_key: &SecretKey,
) -> Option<(Signature, Signature)> {
    let include_taproot = pospace.pool_contract_puzzle_hash.is_some();
    let plot_public_key = match generate_plot_public_key(
        &response.local_pk,
        &response.farmer_pk,
        include_taproot,
    ) {
        Ok(plot_public_key) => plot_public_key,
        Err(error) => {
            warn!(%error, "Failed to derive plot public key");
            return None;
        }
    };
    if plot_public_key != pospace.plot_public_key {
        warn!(
            expected = %pospace.plot_public_key,
            derived = %plot_public_key,
            "Plot public key mismatch"
        );
        return None;
    }

    let taproot_secret_key = if include_taproot {
        match generate_taproot_sk(&response.local_pk, &response.farmer_pk) {
            Ok(taproot_secret_key) => Some(taproot_secret_key),
            Err(error) => {
                warn!(%error, "Failed to derive taproot key");
                return None;
            }
        }
    } else {
        None
    };

    let mut aggregates = Vec::with_capacity(2);
    for (message, harvester_share) in &response.message_signatures[..2] {
        let farmer_share = secret_key.sign_prepend(message.as_ref(), &plot_public_key);
        let mut shares = vec![*harvester_share, farmer_share];
        if let Some(taproot_secret_key) = &taproot_secret_key {
            shares.push(taproot_secret_key.sign_prepend(message.as_ref(), &plot_public_key));
        }
        let aggregate = match Signature::aggregate(&shares) {
            Ok(aggregate) => aggregate,
            Err(error) => {
                warn!(%error, "Failed to aggregate signature shares");
                return None;
            }
        };
        if !aggregate.verify(&plot_public_key, message.as_ref()) {
            warn!(%message, "Failed to validate aggregate signature");
            return None;
        }
        aggregates.push(aggregate);
    }
    Some((aggregates[0], aggregates[1]))
}
