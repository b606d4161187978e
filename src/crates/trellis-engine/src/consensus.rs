//! Consensus evaluation for parallel-node branches.
//!
//! Branch results arrive unordered; every strategy here is commutative
//! with respect to branch order (the judge's verdict is the judge's own).

use regex::Regex;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};
use trellis_core::{ConsensusStrategy, ParallelNode, Workflow};
use trellis_llm::AgentRegistry;

use crate::error::Result;
use crate::rubric::parse_embedded_json;

/// A branch's extracted vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vote {
    Approve,
    Reject,
    Abstain,
}

impl Vote {
    pub fn as_str(&self) -> &'static str {
        match self {
            Vote::Approve => "APPROVE",
            Vote::Reject => "REJECT",
            Vote::Abstain => "ABSTAIN",
        }
    }
}

/// One completed branch, as handed to the evaluator.
#[derive(Debug, Clone)]
pub struct BranchResult {
    pub id: String,
    pub output: String,
    pub metadata: Map<String, Value>,
    pub weight: f64,
    pub error: Option<String>,
}

/// The combined outcome of a parallel node.
#[derive(Debug, Clone)]
pub struct ConsensusOutcome {
    pub reached: bool,
    pub winning_output: String,
    pub metadata: Map<String, Value>,
}

/// Evaluates branch results under a [`ConsensusStrategy`].
#[derive(Debug, Clone)]
pub struct ConsensusEvaluator {
    score_pattern: Regex,
}

impl Default for ConsensusEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsensusEvaluator {
    pub fn new() -> Self {
        Self {
            // Compile-time constant pattern.
            score_pattern: Regex::new(r"(?i)score:\s*(\d+(\.\d+)?)").unwrap(),
        }
    }

    /// Combine `branches` according to the node's strategy.
    pub async fn evaluate(
        &self,
        node: &ParallelNode,
        branches: &[BranchResult],
        workflow: &Workflow,
        agents: &AgentRegistry,
    ) -> Result<ConsensusOutcome> {
        if node.strategy == ConsensusStrategy::JudgeDecides {
            return self.judge_decides(node, branches, workflow, agents).await;
        }

        let votes: Vec<(Vote, f64)> = branches.iter().map(|b| self.extract_vote(b)).collect();
        let approve_count = votes.iter().filter(|(v, _)| *v == Vote::Approve).count();
        let reject_count = votes.iter().filter(|(v, _)| *v == Vote::Reject).count();
        let abstain_count = votes.iter().filter(|(v, _)| *v == Vote::Abstain).count();
        let threshold = node.threshold.unwrap_or(0.5);

        let reached = match node.strategy {
            ConsensusStrategy::MajorityVote => {
                let required = (branches.len() as f64 * threshold).ceil() as usize;
                approve_count >= required
            }
            ConsensusStrategy::Unanimous => {
                approve_count == branches.len() && !branches.is_empty()
            }
            ConsensusStrategy::WeightedVote => {
                let mut approve_weighted = 0.0;
                let mut decided_weighted = 0.0;
                for (branch, (vote, score)) in branches.iter().zip(&votes) {
                    let weighted = score * branch.weight;
                    match vote {
                        Vote::Approve => {
                            approve_weighted += weighted;
                            decided_weighted += weighted;
                        }
                        Vote::Reject => decided_weighted += weighted,
                        Vote::Abstain => {}
                    }
                }
                decided_weighted > 0.0 && approve_weighted / decided_weighted > threshold
            }
            ConsensusStrategy::JudgeDecides => unreachable!("handled above"),
        };

        let winner = winning_branch(branches, &votes);
        debug!(
            node = %node.id,
            strategy = ?node.strategy,
            approve_count,
            reject_count,
            abstain_count,
            reached,
            "consensus evaluated"
        );

        Ok(ConsensusOutcome {
            reached,
            winning_output: winner.map(|b| b.output.clone()).unwrap_or_default(),
            metadata: vote_metadata(branches, &votes, reached, approve_count, reject_count, abstain_count),
        })
    }

    /// Vote and score for one branch, in preference order: rubric
    /// metadata, explicit score metadata, `Score:` in the output, keyword
    /// heuristics, then a 50.0 abstain fallback.
    pub fn extract_vote(&self, branch: &BranchResult) -> (Vote, f64) {
        if branch.error.is_some() {
            return (Vote::Reject, 0.0);
        }

        if let Some(passed) = branch.metadata.get("rubric_passed").and_then(Value::as_bool) {
            let score = numeric(branch.metadata.get("rubric_score")).unwrap_or(50.0);
            let vote = if passed { Vote::Approve } else { Vote::Reject };
            return (vote, score);
        }

        if let Some(score) = numeric(branch.metadata.get("score")) {
            return (vote_from_score(score), score);
        }

        if let Some(caps) = self.score_pattern.captures(&branch.output) {
            if let Ok(score) = caps[1].parse::<f64>() {
                return (vote_from_score(score), score);
            }
        }

        let lower = branch.output.to_lowercase();
        if ["approve", "accept", "pass"].iter().any(|k| lower.contains(k)) {
            return (Vote::Approve, 50.0);
        }
        if ["reject", "fail", "deny"].iter().any(|k| lower.contains(k)) {
            return (Vote::Reject, 50.0);
        }

        (Vote::Abstain, 50.0)
    }

    async fn judge_decides(
        &self,
        node: &ParallelNode,
        branches: &[BranchResult],
        workflow: &Workflow,
        agents: &AgentRegistry,
    ) -> Result<ConsensusOutcome> {
        let judge_id = node
            .judge_agent_id
            .as_deref()
            .ok_or_else(|| crate::error::EngineError::Internal(format!(
                "parallel node '{}' uses JUDGE_DECIDES without a judge agent",
                node.id
            )))?;
        let judge = workflow.agent(judge_id)?;

        let mut prompt = String::from(
            "You are judging parallel branch outputs. Reply with JSON: \
             {\"decision\": \"approve\"|\"reject\", \"winning_branch\": <id>, \
             \"reasoning\": <text>, \"final_output\": <text>}\n\nBranches:\n",
        );
        for branch in branches {
            prompt.push_str(&format!("[{}]\n{}\n\n", branch.id, branch.output));
        }

        let response = agents.invoke(judge, &prompt).await?;
        let verdict = parse_embedded_json(&response.content).unwrap_or(Value::Null);
        let decision = verdict
            .get("decision")
            .and_then(Value::as_str)
            .unwrap_or("reject");
        let reached = decision.eq_ignore_ascii_case("approve");
        if verdict.is_null() {
            warn!(node = %node.id, "judge returned unparseable verdict, treating as no consensus");
        }

        let winning_branch_id = verdict.get("winning_branch").and_then(Value::as_str);
        let winning_output = verdict
            .get("final_output")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| {
                winning_branch_id.and_then(|id| {
                    branches.iter().find(|b| b.id == id).map(|b| b.output.clone())
                })
            })
            .or_else(|| branches.first().map(|b| b.output.clone()))
            .unwrap_or_default();

        let mut metadata = Map::new();
        metadata.insert("consensus_reached".to_string(), json!(reached));
        metadata.insert("strategy".to_string(), json!("JUDGE_DECIDES"));
        metadata.insert("judge".to_string(), json!(judge_id));
        if let Some(reasoning) = verdict.get("reasoning") {
            metadata.insert("judge_reasoning".to_string(), reasoning.clone());
        }
        if let Some(id) = winning_branch_id {
            metadata.insert("winning_branch".to_string(), json!(id));
        }

        Ok(ConsensusOutcome {
            reached,
            winning_output,
            metadata,
        })
    }
}

fn vote_from_score(score: f64) -> Vote {
    if score > 50.0 {
        Vote::Approve
    } else if score < 50.0 {
        Vote::Reject
    } else {
        Vote::Abstain
    }
}

fn numeric(value: Option<&Value>) -> Option<f64> {
    match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Highest-scoring approving branch, falling back to the highest-scoring
/// branch overall.
fn winning_branch<'a>(
    branches: &'a [BranchResult],
    votes: &[(Vote, f64)],
) -> Option<&'a BranchResult> {
    let best = |filter: &dyn Fn(Vote) -> bool| {
        branches
            .iter()
            .zip(votes)
            .filter(|(_, (v, _))| filter(*v))
            .max_by(|(_, (_, a)), (_, (_, b))| a.total_cmp(b))
            .map(|(b, _)| b)
    };
    best(&|v| v == Vote::Approve).or_else(|| best(&|_| true))
}

fn vote_metadata(
    branches: &[BranchResult],
    votes: &[(Vote, f64)],
    reached: bool,
    approve_count: usize,
    reject_count: usize,
    abstain_count: usize,
) -> Map<String, Value> {
    let mut metadata = Map::new();
    metadata.insert("consensus_reached".to_string(), json!(reached));
    metadata.insert("approve_count".to_string(), json!(approve_count));
    metadata.insert("reject_count".to_string(), json!(reject_count));
    metadata.insert("abstain_count".to_string(), json!(abstain_count));

    let mut per_branch = Map::new();
    for (branch, (vote, score)) in branches.iter().zip(votes) {
        per_branch.insert(
            branch.id.clone(),
            json!({"vote": vote.as_str(), "score": score}),
        );
    }
    metadata.insert("votes".to_string(), Value::Object(per_branch));
    metadata
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use trellis_core::{EndNode, ExitStatus, Node};

    fn branch(id: &str, output: &str) -> BranchResult {
        BranchResult {
            id: id.to_string(),
            output: output.to_string(),
            metadata: Map::new(),
            weight: 1.0,
            error: None,
        }
    }

    fn parallel(strategy: ConsensusStrategy, threshold: Option<f64>) -> ParallelNode {
        ParallelNode {
            id: "vote".to_string(),
            branches: vec![],
            strategy,
            threshold,
            judge_agent_id: None,
            on_consensus: "yes".to_string(),
            on_no_consensus: "no".to_string(),
        }
    }

    fn empty_workflow() -> Workflow {
        Workflow::new(
            "wf",
            "1",
            "done",
            vec![Node::End(EndNode {
                id: "done".to_string(),
                status: ExitStatus::Success,
            })],
            vec![],
            HashMap::new(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_majority_two_of_three() {
        let evaluator = ConsensusEvaluator::new();
        let branches = vec![
            branch("a", "I approve"),
            branch("b", "I approve"),
            branch("c", "I reject"),
        ];

        let outcome = evaluator
            .evaluate(
                &parallel(ConsensusStrategy::MajorityVote, None),
                &branches,
                &empty_workflow(),
                &AgentRegistry::new(),
            )
            .await
            .unwrap();

        assert!(outcome.reached);
        assert_eq!(outcome.metadata["approve_count"], json!(2));
        assert_eq!(outcome.metadata["reject_count"], json!(1));
    }

    #[tokio::test]
    async fn test_unanimous_fails_on_single_reject() {
        let evaluator = ConsensusEvaluator::new();
        let branches = vec![branch("a", "approve"), branch("b", "I must reject this")];

        let outcome = evaluator
            .evaluate(
                &parallel(ConsensusStrategy::Unanimous, None),
                &branches,
                &empty_workflow(),
                &AgentRegistry::new(),
            )
            .await
            .unwrap();
        assert!(!outcome.reached);
    }

    #[tokio::test]
    async fn test_unanimous_fails_on_abstain() {
        let evaluator = ConsensusEvaluator::new();
        let branches = vec![branch("a", "approve"), branch("b", "no opinion here")];

        let outcome = evaluator
            .evaluate(
                &parallel(ConsensusStrategy::Unanimous, None),
                &branches,
                &empty_workflow(),
                &AgentRegistry::new(),
            )
            .await
            .unwrap();
        assert!(!outcome.reached);
        assert_eq!(outcome.metadata["abstain_count"], json!(1));
    }

    #[tokio::test]
    async fn test_weighted_vote() {
        let evaluator = ConsensusEvaluator::new();
        let mut heavy = branch("a", "Score: 90");
        heavy.weight = 3.0;
        let light = branch("b", "Score: 40");

        let outcome = evaluator
            .evaluate(
                &parallel(ConsensusStrategy::WeightedVote, Some(0.5)),
                &[heavy, light],
                &empty_workflow(),
                &AgentRegistry::new(),
            )
            .await
            .unwrap();
        // approve = 90*3 = 270; decided = 270 + 40 = 310; 0.87 > 0.5
        assert!(outcome.reached);
        assert_eq!(outcome.winning_output, "Score: 90");
    }

    #[test]
    fn test_vote_extraction_prefers_rubric_metadata() {
        let evaluator = ConsensusEvaluator::new();
        let mut b = branch("a", "I reject this utterly");
        b.metadata.insert("rubric_passed".to_string(), json!(true));
        b.metadata.insert("rubric_score".to_string(), json!(82.0));

        let (vote, score) = evaluator.extract_vote(&b);
        assert_eq!(vote, Vote::Approve);
        assert_eq!(score, 82.0);
    }

    #[test]
    fn test_vote_extraction_score_regex() {
        let evaluator = ConsensusEvaluator::new();
        let (vote, score) = evaluator.extract_vote(&branch("a", "Overall Score: 72.5 / 100"));
        assert_eq!(vote, Vote::Approve);
        assert_eq!(score, 72.5);
    }

    #[test]
    fn test_vote_extraction_fallback_abstains() {
        let evaluator = ConsensusEvaluator::new();
        let (vote, score) = evaluator.extract_vote(&branch("a", "no signal at all"));
        assert_eq!(vote, Vote::Abstain);
        assert_eq!(score, 50.0);
    }

    #[test]
    fn test_failed_branch_rejects() {
        let evaluator = ConsensusEvaluator::new();
        let mut b = branch("a", "");
        b.error = Some("provider down".to_string());
        let (vote, score) = evaluator.extract_vote(&b);
        assert_eq!(vote, Vote::Reject);
        assert_eq!(score, 0.0);
    }
}
