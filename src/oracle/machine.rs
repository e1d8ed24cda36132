// ============================================================================
// Question State Machine
// ============================================================================
//
//   INVALID ──initialize──▶ ACTIVE ──finalize──▶ FINALIZED
//                              │                    ▲
//                              └──▶ VOTING ──vote───┘
//
// Automatic questions finalize directly when the leading outcome holds at
// least `consensus_percent` of the sources; manual questions and automatic
// questions without consensus go to VOTING. FINALIZED is terminal.
//
// Everything here is pure: the caller supplies the clock and the decoded
// proof results. Storage, roles and ledger reporting live in the parent
// module.
//
// ============================================================================

use super::OracleError;
use alloy_primitives::{Address, B256};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub const MIN_API_SOURCES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Invalid,
    Active,
    Voting,
    Finalized,
}

impl Status {
    /// Numeric code used in events and the wire format.
    pub fn code(&self) -> u8 {
        match self {
            Status::Invalid => 0,
            Status::Active => 1,
            Status::Voting => 2,
            Status::Finalized => 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApiSource {
    pub url: String,
    pub postprocess_key: String,
}

/// Arguments of `initialize_question`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionParams {
    pub outcome_slot_count: usize,
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default)]
    pub postprocess_keys: Vec<String>,
    pub consensus_percent: u8,
    pub resolution_time: u64,
    pub automatic: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub question_id: B256,
    pub status: Status,
    pub outcome_slot_count: usize,
    pub api_sources: Vec<ApiSource>,
    pub consensus_percent: u8,
    pub resolution_time: u64,
    pub automatic: bool,
    /// Unset until FINALIZED.
    pub winner_idx: Option<usize>,
    pub voters: HashSet<Address>,
    pub votes: Vec<u64>,
}

impl Question {
    /// Validates `params` against the clock and builds an ACTIVE question.
    pub fn initialize(
        question_id: B256,
        params: QuestionParams,
        now: u64,
    ) -> Result<Question, OracleError> {
        if params.outcome_slot_count < 2 {
            return Err(OracleError::precondition("outcomeSlotCount < 2"));
        }
        if !(51..=100).contains(&params.consensus_percent) {
            return Err(OracleError::precondition(
                "consensusPercent has to be in range 51-100",
            ));
        }
        if params.resolution_time <= now {
            return Err(OracleError::precondition("Only future events"));
        }

        let mut api_sources = Vec::new();
        if params.automatic {
            if params.sources.len() != params.postprocess_keys.len() {
                return Err(OracleError::precondition("Array mismatch"));
            }
            if params.sources.len() < MIN_API_SOURCES {
                return Err(OracleError::precondition(
                    "Oracle requires at least 3 API sources",
                ));
            }
            let mut seen = HashSet::new();
            for (url, key) in params.sources.into_iter().zip(params.postprocess_keys) {
                let source = ApiSource { url, postprocess_key: key };
                if !seen.insert(source.clone()) {
                    return Err(OracleError::precondition("jqKey duplicate"));
                }
                api_sources.push(source);
            }
        }

        Ok(Question {
            question_id,
            status: Status::Active,
            outcome_slot_count: params.outcome_slot_count,
            api_sources,
            consensus_percent: params.consensus_percent,
            resolution_time: params.resolution_time,
            automatic: params.automatic,
            winner_idx: None,
            voters: HashSet::new(),
            votes: vec![0; params.outcome_slot_count],
        })
    }

    /// Guards shared by both finalization paths.
    pub fn check_finalizable(&self, now: u64) -> Result<(), OracleError> {
        if self.status != Status::Active {
            return Err(OracleError::precondition("Cannot finalize, status != ACTIVE"));
        }
        if now < self.resolution_time {
            return Err(OracleError::precondition("Resolution time not reached"));
        }
        Ok(())
    }

    /// Index of the configured source a proof refers to.
    pub fn source_index(&self, url: &str, postprocess_key: &str) -> Option<usize> {
        self.api_sources
            .iter()
            .position(|s| s.url == url && s.postprocess_key == postprocess_key)
    }

    /// Applies verified per-source results. Manual questions ignore them.
    pub fn finalize(&mut self, results: &[usize]) -> Status {
        if !self.automatic {
            self.status = Status::Voting;
            return self.status;
        }

        let tallies = tally(results, self.outcome_slot_count);
        match leading_outcome(&tallies) {
            Some((winner, top))
                if meets_consensus(top, self.api_sources.len(), self.consensus_percent) =>
            {
                self.status = Status::Finalized;
                self.winner_idx = Some(winner);
            }
            _ => self.status = Status::Voting,
        }
        self.status
    }

    /// Records one vote; finalizes once any outcome reaches `min_votes`.
    pub fn record_vote(
        &mut self,
        voter: Address,
        outcome_idx: usize,
        min_votes: u64,
    ) -> Result<Status, OracleError> {
        if self.status != Status::Voting {
            return Err(OracleError::precondition("Cannot vote, status != VOTING"));
        }
        if self.voters.contains(&voter) {
            return Err(OracleError::invariant("Already voted"));
        }
        if outcome_idx >= self.outcome_slot_count {
            return Err(OracleError::precondition("Invalid outcomeIdx"));
        }

        self.voters.insert(voter);
        self.votes[outcome_idx] += 1;

        if let Some((leader, count)) = leading_outcome(&self.votes) {
            if count >= min_votes {
                self.status = Status::Finalized;
                self.winner_idx = Some(leader);
            }
        }
        Ok(self.status)
    }

    /// One-hot payout vector at the winner.
    pub fn payouts(&self) -> Option<Vec<u64>> {
        let winner = self.winner_idx?;
        let mut payouts = vec![0; self.outcome_slot_count];
        payouts[winner] = 1;
        Some(payouts)
    }
}

pub fn tally(results: &[usize], outcome_slot_count: usize) -> Vec<u64> {
    let mut tallies = vec![0u64; outcome_slot_count];
    for r in results {
        if let Some(t) = tallies.get_mut(*r) {
            *t += 1;
        }
    }
    tallies
}

/// Highest tally; ties go to the lowest index.
pub fn leading_outcome(tallies: &[u64]) -> Option<(usize, u64)> {
    tallies
        .iter()
        .enumerate()
        .fold(None, |best, (i, count)| match best {
            Some((_, top)) if top >= *count => best,
            _ => Some((i, *count)),
        })
}

/// `top / sources ≥ percent / 100`, exact.
pub fn meets_consensus(top: u64, sources: usize, consensus_percent: u8) -> bool {
    sources > 0 && top * 100 >= u64::from(consensus_percent) * sources as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: u64 = 1_000;

    fn automatic(consensus: u8) -> QuestionParams {
        QuestionParams {
            outcome_slot_count: 2,
            sources: vec![
                "http://www.nba.com/api".into(),
                "http://www.bet365.com/api".into(),
                "http://www.random.com/api".into(),
            ],
            postprocess_keys: vec!["".into(), "".into(), "".into()],
            consensus_percent: consensus,
            resolution_time: NOW + 100,
            automatic: true,
        }
    }

    fn manual() -> QuestionParams {
        QuestionParams {
            outcome_slot_count: 2,
            sources: vec![],
            postprocess_keys: vec![],
            consensus_percent: 60,
            resolution_time: NOW + 100,
            automatic: false,
        }
    }

    fn reason(result: Result<Question, OracleError>) -> String {
        result.unwrap_err().reason()
    }

    #[test]
    fn test_initialize_validation() {
        let id = B256::repeat_byte(1);
        assert_eq!(
            reason(Question::initialize(id, QuestionParams { outcome_slot_count: 1, ..manual() }, NOW)),
            "outcomeSlotCount < 2"
        );
        for pct in [50, 101] {
            assert_eq!(
                reason(Question::initialize(id, QuestionParams { consensus_percent: pct, ..manual() }, NOW)),
                "consensusPercent has to be in range 51-100"
            );
        }
        for t in [NOW, NOW - 100] {
            assert_eq!(
                reason(Question::initialize(id, QuestionParams { resolution_time: t, ..manual() }, NOW)),
                "Only future events"
            );
        }

        let mut mismatch = automatic(90);
        mismatch.postprocess_keys.pop();
        assert_eq!(reason(Question::initialize(id, mismatch, NOW)), "Array mismatch");

        let mut short = automatic(90);
        short.sources.pop();
        short.postprocess_keys.pop();
        assert_eq!(
            reason(Question::initialize(id, short, NOW)),
            "Oracle requires at least 3 API sources"
        );

        let mut dup = automatic(90);
        dup.sources[2] = dup.sources[0].clone();
        assert_eq!(reason(Question::initialize(id, dup, NOW)), "jqKey duplicate");

        // Same url with a different key is a different source
        let mut keyed = automatic(90);
        keyed.sources[2] = keyed.sources[0].clone();
        keyed.postprocess_keys[2] = ".score".into();
        assert!(Question::initialize(id, keyed, NOW).is_ok());
    }

    #[test]
    fn test_manual_question_ignores_sources() {
        let mut params = manual();
        params.sources = vec!["http://a".into()];
        let q = Question::initialize(B256::ZERO, params, NOW).unwrap();
        assert_eq!(q.status, Status::Active);
        assert!(q.api_sources.is_empty());
        assert_eq!(q.votes, vec![0, 0]);
    }

    #[test]
    fn test_finalize_with_consensus() {
        let mut q = Question::initialize(B256::ZERO, automatic(59), NOW).unwrap();
        assert_eq!(q.check_finalizable(NOW + 99).unwrap_err().reason(), "Resolution time not reached");
        q.check_finalizable(NOW + 100).unwrap();

        assert_eq!(q.finalize(&[1, 1, 0]), Status::Finalized);
        assert_eq!(q.winner_idx, Some(1));
        assert_eq!(q.payouts(), Some(vec![0, 1]));
        assert_eq!(
            q.check_finalizable(NOW + 200).unwrap_err().reason(),
            "Cannot finalize, status != ACTIVE"
        );
    }

    #[test]
    fn test_finalize_without_consensus_then_vote() {
        let mut q = Question::initialize(B256::ZERO, automatic(90), NOW).unwrap();
        assert_eq!(q.finalize(&[1, 1, 0]), Status::Voting);
        assert_eq!(q.winner_idx, None);
        assert_eq!(q.payouts(), None);

        let voters: Vec<Address> = (1..=3).map(Address::repeat_byte).collect();
        assert_eq!(q.record_vote(voters[0], 0, 3).unwrap(), Status::Voting);
        assert_eq!(q.record_vote(voters[0], 0, 3).unwrap_err().reason(), "Already voted");
        assert_eq!(q.record_vote(voters[1], 2, 3).unwrap_err().reason(), "Invalid outcomeIdx");
        assert_eq!(q.record_vote(voters[1], 0, 3).unwrap(), Status::Voting);
        assert_eq!(q.record_vote(voters[2], 0, 3).unwrap(), Status::Finalized);
        assert_eq!(q.winner_idx, Some(0));
        assert_eq!(
            q.record_vote(Address::repeat_byte(9), 0, 3).unwrap_err().reason(),
            "Cannot vote, status != VOTING"
        );
    }

    #[test]
    fn test_quorum_reached_before_all_votes() {
        let mut q = Question::initialize(B256::ZERO, manual(), NOW).unwrap();
        assert_eq!(q.finalize(&[]), Status::Voting);
        q.record_vote(Address::repeat_byte(1), 1, 2).unwrap();
        q.record_vote(Address::repeat_byte(2), 0, 2).unwrap();
        assert_eq!(q.record_vote(Address::repeat_byte(3), 1, 2).unwrap(), Status::Finalized);
        assert_eq!(q.winner_idx, Some(1));
    }

    #[test]
    fn test_consensus_boundary_is_exact() {
        // 2 of 3 = 66.67%
        assert!(meets_consensus(2, 3, 66));
        assert!(!meets_consensus(2, 3, 67));
        assert!(meets_consensus(3, 3, 100));
        assert!(!meets_consensus(0, 0, 51));
    }

    #[test]
    fn test_ties_pick_lowest_index() {
        assert_eq!(leading_outcome(&[1, 2, 2]), Some((1, 2)));
        assert_eq!(leading_outcome(&[0, 0]), Some((0, 0)));
        assert_eq!(leading_outcome(&[]), None);
        assert_eq!(tally(&[2, 2, 0, 7], 3), vec![1, 0, 2]);
    }
}
