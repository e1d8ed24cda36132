// ============================================================================
// Resolution Oracle
// ============================================================================
//
// Decides question outcomes and reports them into the Conditional Ledger.
//
//   initialize_question  -> prepares the ledger condition (resolver = oracle)
//   finalize_question    -> verified proofs reach consensus, or VOTING
//   vote                 -> VOTER role only; quorum finalizes
//
// On FINALIZED the oracle reports a one-hot payout vector at the winner.
// The ledger's write-once resolution is the last line of defense against a
// second report.
//
// ============================================================================

pub mod attestation;
pub mod machine;

pub use attestation::{
    AttestationVerifier, Ed25519Verifier, PermissiveVerifier, Proof, VerifierType,
};
pub use machine::{ApiSource, Question, QuestionParams, Status};

use crate::error::{Classify, ErrorKind};
use crate::event_log::EventLog;
use crate::positions::{ConditionalTokens, LedgerError};
use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use tracing::{debug, info, warn};

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OracleError {
    Precondition(String),
    Unauthorized(String),
    Invariant(String),
    Ledger(LedgerError),
}

impl OracleError {
    pub fn precondition(reason: impl Into<String>) -> Self {
        OracleError::Precondition(reason.into())
    }

    pub fn invariant(reason: impl Into<String>) -> Self {
        OracleError::Invariant(reason.into())
    }

    pub fn reason(&self) -> String {
        match self {
            OracleError::Precondition(r) | OracleError::Unauthorized(r) | OracleError::Invariant(r) => {
                r.clone()
            }
            OracleError::Ledger(e) => e.reason(),
        }
    }
}

impl fmt::Display for OracleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.reason())
    }
}

impl std::error::Error for OracleError {}

impl Classify for OracleError {
    fn kind(&self) -> ErrorKind {
        match self {
            OracleError::Precondition(_) => ErrorKind::Precondition,
            OracleError::Unauthorized(_) => ErrorKind::Unauthorized,
            OracleError::Invariant(_) => ErrorKind::Invariant,
            OracleError::Ledger(e) => e.kind(),
        }
    }
}

impl From<LedgerError> for OracleError {
    fn from(e: LedgerError) -> Self {
        OracleError::Ledger(e)
    }
}

// ============================================================================
// ROLES & EVENTS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Voter,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Admin => f.write_str("ADMIN"),
            Role::Voter => f.write_str("VOTER"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum OracleEvent {
    QuestionInitialized {
        question_id: B256,
        condition_id: B256,
        outcome_slot_count: usize,
        automatic: bool,
        consensus_percent: u8,
        resolution_time: u64,
    },
    QuestionFinalized {
        question_id: B256,
        status: Status,
        winner_idx: Option<usize>,
    },
    VoteSubmitted {
        voter: Address,
        question_id: B256,
        outcome_idx: usize,
    },
    RoleGranted {
        role: Role,
        account: Address,
        sender: Address,
    },
    RoleRevoked {
        role: Role,
        account: Address,
        sender: Address,
    },
}

// ============================================================================
// ORACLE
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocialOracle {
    /// Resolver identity on the ledger.
    pub address: Address,
    pub min_votes: u64,
    verifier: VerifierType,
    roles: BTreeMap<Role, HashSet<Address>>,
    questions: HashMap<B256, Question>,
    events: EventLog<OracleEvent>,
}

impl SocialOracle {
    pub fn new(
        address: Address,
        admin: Address,
        verifier: VerifierType,
        min_votes: u64,
    ) -> Result<Self, OracleError> {
        if min_votes == 0 {
            return Err(OracleError::precondition("minVotes must be positive"));
        }
        let mut roles = BTreeMap::new();
        roles.insert(Role::Admin, HashSet::from([admin]));
        info!(
            "🔮 Oracle {} online (admin {}, quorum {}, verifier {})",
            address,
            admin,
            min_votes,
            verifier.name()
        );
        Ok(Self {
            address,
            min_votes,
            verifier,
            roles,
            questions: HashMap::new(),
            events: EventLog::new(),
        })
    }

    pub fn verifier(&self) -> &VerifierType {
        &self.verifier
    }

    // ------------------------------------------------------------------------
    // Access control
    // ------------------------------------------------------------------------

    pub fn has_role(&self, role: Role, account: &Address) -> bool {
        self.roles.get(&role).is_some_and(|members| members.contains(account))
    }

    fn check_role(&self, role: Role, account: &Address) -> Result<(), OracleError> {
        if self.has_role(role, account) {
            return Ok(());
        }
        Err(OracleError::Unauthorized(format!(
            "account {:#x} is missing role {}",
            account, role
        )))
    }

    pub fn grant_role(&mut self, sender: Address, role: Role, account: Address) -> Result<(), OracleError> {
        self.check_role(Role::Admin, &sender)?;
        if self.roles.entry(role).or_default().insert(account) {
            self.events.push(OracleEvent::RoleGranted { role, account, sender });
            info!("🔑 {} granted {} by {}", account, role, sender);
        }
        Ok(())
    }

    pub fn revoke_role(&mut self, sender: Address, role: Role, account: Address) -> Result<(), OracleError> {
        self.check_role(Role::Admin, &sender)?;
        self.remove_role(sender, role, account);
        Ok(())
    }

    pub fn renounce_role(&mut self, sender: Address, role: Role, account: Address) -> Result<(), OracleError> {
        if sender != account {
            return Err(OracleError::Unauthorized(
                "can only renounce roles for self".to_string(),
            ));
        }
        self.remove_role(sender, role, account);
        Ok(())
    }

    fn remove_role(&mut self, sender: Address, role: Role, account: Address) {
        let removed = self
            .roles
            .get_mut(&role)
            .is_some_and(|members| members.remove(&account));
        if removed {
            self.events.push(OracleEvent::RoleRevoked { role, account, sender });
            info!("🔒 {} lost {} ({})", account, role, sender);
        }
    }

    pub fn members(&self, role: Role) -> Vec<Address> {
        let mut members: Vec<Address> = self
            .roles
            .get(&role)
            .map(|m| m.iter().copied().collect())
            .unwrap_or_default();
        members.sort();
        members
    }

    // ------------------------------------------------------------------------
    // Questions
    // ------------------------------------------------------------------------

    pub fn question(&self, question_id: &B256) -> Option<&Question> {
        self.questions.get(question_id)
    }

    pub fn status(&self, question_id: &B256) -> Status {
        self.questions
            .get(question_id)
            .map(|q| q.status)
            .unwrap_or(Status::Invalid)
    }

    pub fn questions(&self) -> impl Iterator<Item = &Question> {
        self.questions.values()
    }

    /// Registers the question and prepares its ledger condition with this
    /// oracle as resolver. Returns the condition id.
    pub fn initialize_question(
        &mut self,
        ledger: &mut ConditionalTokens,
        question_id: B256,
        params: QuestionParams,
        now: u64,
    ) -> Result<B256, OracleError> {
        if self.status(&question_id) != Status::Invalid {
            return Err(OracleError::invariant("Question already initialized"));
        }
        let question = Question::initialize(question_id, params, now)?;
        let condition_id =
            ledger.prepare_condition(self.address, question_id, question.outcome_slot_count)?;

        self.events.push(OracleEvent::QuestionInitialized {
            question_id,
            condition_id,
            outcome_slot_count: question.outcome_slot_count,
            automatic: question.automatic,
            consensus_percent: question.consensus_percent,
            resolution_time: question.resolution_time,
        });
        info!(
            "❓ Question {} initialized ({} outcomes, {}, resolves at {})",
            question_id,
            question.outcome_slot_count,
            if question.automatic { "automatic" } else { "manual" },
            question.resolution_time
        );
        self.questions.insert(question_id, question);
        Ok(condition_id)
    }

    /// Checks each proof and decodes its outcome index, in source order.
    fn verify_proofs(&self, question: &Question, proofs: &[Proof]) -> Result<Vec<usize>, OracleError> {
        if proofs.len() != question.api_sources.len() {
            return Err(OracleError::precondition("Proofs & apiSources mismatch"));
        }
        let mut seen = vec![false; question.api_sources.len()];
        let mut results = Vec::with_capacity(proofs.len());
        for proof in proofs {
            if proof.question_id != question.question_id {
                return Err(OracleError::precondition("Proof for invalid questionId"));
            }
            let index = question
                .source_index(&proof.url, &proof.postprocess_key)
                .ok_or_else(|| OracleError::precondition("Proof for invalid questionId"))?;
            if seen[index] {
                return Err(OracleError::precondition("Duplicate proof"));
            }
            seen[index] = true;

            if !self.verifier.verify(proof) {
                warn!("Rejected proof from {} for question {}", proof.url, question.question_id);
                return Err(OracleError::precondition("Invalid proof"));
            }
            let outcome = usize::try_from(proof.result)
                .ok()
                .filter(|o| *o < question.outcome_slot_count)
                .ok_or_else(|| OracleError::precondition("Invalid proof"))?;
            results.push(outcome);
        }
        Ok(results)
    }

    pub fn finalize_question(
        &mut self,
        ledger: &mut ConditionalTokens,
        question_id: B256,
        proofs: &[Proof],
        now: u64,
    ) -> Result<Status, OracleError> {
        let question = self
            .questions
            .get(&question_id)
            .ok_or_else(|| OracleError::precondition("Cannot finalize, status != ACTIVE"))?;
        question.check_finalizable(now)?;

        let results = if question.automatic {
            self.verify_proofs(question, proofs)?
        } else {
            Vec::new()
        };

        let mut question = question.clone();
        let status = question.finalize(&results);
        debug!("Question {} tallied {:?}", question_id, results);
        self.commit(ledger, question)?;
        Ok(status)
    }

    pub fn vote(
        &mut self,
        ledger: &mut ConditionalTokens,
        voter: Address,
        question_id: B256,
        outcome_idx: usize,
    ) -> Result<Status, OracleError> {
        self.check_role(Role::Voter, &voter)?;
        let mut question = self
            .questions
            .get(&question_id)
            .cloned()
            .ok_or_else(|| OracleError::precondition("Cannot vote, status != VOTING"))?;

        let status = question.record_vote(voter, outcome_idx, self.min_votes)?;
        self.events.push(OracleEvent::VoteSubmitted { voter, question_id, outcome_idx });
        info!("🗳️  {} voted {} on question {}", voter, outcome_idx, question_id);

        if status == Status::Finalized {
            self.commit(ledger, question)?;
        } else {
            self.questions.insert(question_id, question);
        }
        Ok(status)
    }

    /// Stores the transitioned question and, once FINALIZED, reports the
    /// one-hot payout to the ledger.
    fn commit(&mut self, ledger: &mut ConditionalTokens, question: Question) -> Result<(), OracleError> {
        let question_id = question.question_id;
        let status = question.status;
        let winner_idx = question.winner_idx;
        let payouts = question.payouts();
        self.questions.insert(question_id, question);

        self.events.push(OracleEvent::QuestionFinalized { question_id, status, winner_idx });
        match (status, payouts) {
            (Status::Finalized, Some(payouts)) => {
                let payouts: Vec<U256> = payouts.into_iter().map(U256::from).collect();
                ledger.report_payouts(self.address, question_id, &payouts)?;
                info!("🏁 Question {} finalized, winner {:?}", question_id, winner_idx);
            }
            _ => info!("🗳️  Question {} moved to {:?}", question_id, status),
        }
        Ok(())
    }

    pub fn events(&self) -> &[OracleEvent] {
        self.events.as_slice()
    }

    pub(crate) fn event_log_mut(&mut self) -> &mut EventLog<OracleEvent> {
        &mut self.events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::SigningKey;
    use rand::rngs::OsRng;

    const NOW: u64 = 1_000;
    const URLS: [&str; 3] = [
        "http://www.nba.com/api",
        "http://www.bet365.com/api",
        "http://www.random.com/api",
    ];

    fn admin() -> Address {
        Address::repeat_byte(0xad)
    }

    fn voters() -> Vec<Address> {
        (1..=3).map(Address::repeat_byte).collect()
    }

    fn setup(verifier: VerifierType) -> (SocialOracle, ConditionalTokens) {
        let mut oracle = SocialOracle::new(Address::repeat_byte(0x0a), admin(), verifier, 3).unwrap();
        for v in voters() {
            oracle.grant_role(admin(), Role::Voter, v).unwrap();
        }
        (oracle, ConditionalTokens::new(Address::repeat_byte(0xc7)))
    }

    fn automatic(consensus: u8) -> QuestionParams {
        QuestionParams {
            outcome_slot_count: 2,
            sources: URLS.iter().map(|u| u.to_string()).collect(),
            postprocess_keys: vec![String::new(); 3],
            consensus_percent: consensus,
            resolution_time: NOW + 100,
            automatic: true,
        }
    }

    fn proofs(question_id: B256, results: [u64; 3]) -> Vec<Proof> {
        URLS.iter()
            .zip(results)
            .map(|(url, r)| Proof::new(question_id, *url, "", NOW + 100, U256::from(r)))
            .collect()
    }

    fn permissive() -> VerifierType {
        VerifierType::Permissive(PermissiveVerifier)
    }

    #[test]
    fn test_consensus_finalizes_and_reports() {
        let (mut oracle, mut ledger) = setup(permissive());
        let qid = B256::repeat_byte(0x51);
        let cond = oracle.initialize_question(&mut ledger, qid, automatic(59), NOW).unwrap();
        assert_eq!(ledger.get_outcome_slot_count(&cond), 2);

        let status = oracle
            .finalize_question(&mut ledger, qid, &proofs(qid, [1, 1, 0]), NOW + 100)
            .unwrap();
        assert_eq!(status, Status::Finalized);
        assert_eq!(oracle.question(&qid).unwrap().winner_idx, Some(1));
        assert_eq!(ledger.payout_denominator(&cond), U256::from(1u8));
        assert_eq!(ledger.payout_numerators(&cond), vec![U256::ZERO, U256::from(1u8)]);
    }

    #[test]
    fn test_no_consensus_goes_to_vote() {
        let (mut oracle, mut ledger) = setup(permissive());
        let qid = B256::repeat_byte(0x52);
        let cond = oracle.initialize_question(&mut ledger, qid, automatic(90), NOW).unwrap();
        let status = oracle
            .finalize_question(&mut ledger, qid, &proofs(qid, [1, 1, 0]), NOW + 100)
            .unwrap();
        assert_eq!(status, Status::Voting);
        assert!(ledger.payout_denominator(&cond).is_zero());

        let err = oracle.vote(&mut ledger, admin(), qid, 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
        assert_eq!(
            err.reason(),
            format!("account {:#x} is missing role VOTER", admin())
        );

        let v = voters();
        assert_eq!(oracle.vote(&mut ledger, v[0], qid, 0).unwrap(), Status::Voting);
        assert_eq!(oracle.vote(&mut ledger, v[1], qid, 0).unwrap(), Status::Voting);
        assert_eq!(oracle.vote(&mut ledger, v[2], qid, 0).unwrap(), Status::Finalized);
        assert_eq!(oracle.question(&qid).unwrap().winner_idx, Some(0));
        assert_eq!(ledger.payout_numerators(&cond), vec![U256::from(1u8), U256::ZERO]);
    }

    #[test]
    fn test_manual_question_ignores_proofs() {
        let (mut oracle, mut ledger) = setup(permissive());
        let qid = B256::repeat_byte(0x53);
        let params = QuestionParams {
            sources: vec![],
            postprocess_keys: vec![],
            automatic: false,
            consensus_percent: 60,
            ..automatic(60)
        };
        oracle.initialize_question(&mut ledger, qid, params, NOW).unwrap();
        let status = oracle
            .finalize_question(&mut ledger, qid, &proofs(qid, [0, 0, 0]), NOW + 100)
            .unwrap();
        assert_eq!(status, Status::Voting);
    }

    #[test]
    fn test_duplicate_initialization_rejected() {
        let (mut oracle, mut ledger) = setup(permissive());
        let qid = B256::repeat_byte(0x54);
        oracle.initialize_question(&mut ledger, qid, automatic(90), NOW).unwrap();
        let err = oracle
            .initialize_question(&mut ledger, qid, automatic(90), NOW)
            .unwrap_err();
        assert_eq!(err.reason(), "Question already initialized");
        assert_eq!(err.kind(), ErrorKind::Invariant);
    }

    #[test]
    fn test_proof_checks() {
        let (mut oracle, mut ledger) = setup(permissive());
        let qid = B256::repeat_byte(0x55);
        oracle.initialize_question(&mut ledger, qid, automatic(59), NOW).unwrap();

        let mut short = proofs(qid, [1, 1, 0]);
        short.pop();
        fn reason(o: &mut SocialOracle, l: &mut ConditionalTokens, p: &[Proof]) -> String {
            let qid = p.first().map(|p| p.question_id).unwrap_or_default();
            o.finalize_question(l, qid, p, NOW + 100).unwrap_err().reason()
        }
        assert_eq!(reason(&mut oracle, &mut ledger, &short), "Proofs & apiSources mismatch");

        let mut foreign = proofs(qid, [1, 1, 0]);
        foreign[1].question_id = B256::repeat_byte(0x99);
        assert_eq!(reason(&mut oracle, &mut ledger, &foreign), "Proof for invalid questionId");

        let mut dup = proofs(qid, [1, 1, 0]);
        dup[2].url = URLS[0].to_string();
        assert_eq!(reason(&mut oracle, &mut ledger, &dup), "Duplicate proof");

        let mut unknown = proofs(qid, [1, 1, 0]);
        unknown[0].url = "http://elsewhere".to_string();
        assert_eq!(reason(&mut oracle, &mut ledger, &unknown), "Proof for invalid questionId");

        let out_of_range = proofs(qid, [1, 2, 0]);
        assert_eq!(reason(&mut oracle, &mut ledger, &out_of_range), "Invalid proof");

        assert_eq!(oracle.status(&qid), Status::Active);
    }

    #[test]
    fn test_signed_proofs() {
        let key = SigningKey::generate(&mut OsRng);
        let verifier = VerifierType::Ed25519(Ed25519Verifier::new(key.verifying_key()));
        let (mut oracle, mut ledger) = setup(verifier);
        let qid = B256::repeat_byte(0x56);
        oracle.initialize_question(&mut ledger, qid, automatic(59), NOW).unwrap();

        let unsigned = proofs(qid, [0, 0, 1]);
        let err = oracle
            .finalize_question(&mut ledger, qid, &unsigned, NOW + 100)
            .unwrap_err();
        assert_eq!(err.reason(), "Invalid proof");

        let signed: Vec<Proof> = unsigned.into_iter().map(|p| p.sign(&key)).collect();
        let status = oracle.finalize_question(&mut ledger, qid, &signed, NOW + 100).unwrap();
        assert_eq!(status, Status::Finalized);
        assert_eq!(oracle.question(&qid).unwrap().winner_idx, Some(0));
    }

    #[test]
    fn test_proofs_for_another_questions_sources_rejected() {
        let (mut oracle, mut ledger) = setup(permissive());
        let qid = B256::repeat_byte(0x57);
        oracle.initialize_question(&mut ledger, qid, automatic(59), NOW).unwrap();

        let new_urls: Vec<String> = URLS.iter().map(|u| format!("{}/new", u)).collect();
        let other = B256::repeat_byte(0x58);
        let params = QuestionParams { sources: new_urls.clone(), ..automatic(60) };
        oracle.initialize_question(&mut ledger, other, params, NOW).unwrap();

        let foreign: Vec<Proof> = new_urls
            .iter()
            .zip([1u64, 1, 0])
            .map(|(url, r)| Proof::new(qid, url.as_str(), "", NOW + 100, U256::from(r)))
            .collect();
        let err = oracle
            .finalize_question(&mut ledger, qid, &foreign, NOW + 100)
            .unwrap_err();
        assert_eq!(err.reason(), "Proof for invalid questionId");
        assert_eq!(oracle.status(&qid), Status::Active);
    }

    #[test]
    fn test_signed_proof_cannot_be_moved_to_another_question() {
        let key = SigningKey::generate(&mut OsRng);
        let verifier = VerifierType::Ed25519(Ed25519Verifier::new(key.verifying_key()));
        let (mut oracle, mut ledger) = setup(verifier);
        let first = B256::repeat_byte(0x59);
        let second = B256::repeat_byte(0x5a);
        oracle.initialize_question(&mut ledger, first, automatic(59), NOW).unwrap();
        oracle.initialize_question(&mut ledger, second, automatic(59), NOW).unwrap();

        let relabeled: Vec<Proof> = proofs(first, [1, 1, 1])
            .into_iter()
            .map(|p| p.sign(&key))
            .map(|p| Proof { question_id: second, ..p })
            .collect();
        let err = oracle
            .finalize_question(&mut ledger, second, &relabeled, NOW + 100)
            .unwrap_err();
        assert_eq!(err.reason(), "Invalid proof");
        assert_eq!(oracle.status(&second), Status::Active);
    }

    #[test]
    fn test_role_management() {
        let (mut oracle, _) = setup(permissive());
        let v = voters();
        let outsider = Address::repeat_byte(0x77);

        let err = oracle.grant_role(outsider, Role::Voter, outsider).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);

        oracle.revoke_role(admin(), Role::Voter, v[0]).unwrap();
        assert!(!oracle.has_role(Role::Voter, &v[0]));
        assert!(oracle.renounce_role(v[2], Role::Voter, v[1]).is_err());
        oracle.renounce_role(v[1], Role::Voter, v[1]).unwrap();
        assert_eq!(oracle.members(Role::Voter), vec![v[2]]);

        assert!(matches!(
            oracle.events().last(),
            Some(OracleEvent::RoleRevoked { role: Role::Voter, .. })
        ));
        assert!(SocialOracle::new(Address::ZERO, admin(), permissive(), 0).is_err());
    }
}
