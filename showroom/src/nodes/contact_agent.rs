//! Contact agent node: registers callback requests for a chosen vehicle.

use async_trait::async_trait;
use serde_json::Value;

use super::context::{render_context_block, resolve_language, synchronized_view};
use super::NodeContext;
use crate::error::AgentError;
use crate::graph::{GraphNode, Node};
use crate::guard::{GuardedAgent, TurnCounters, TurnGuard};
use crate::message::Message;
use crate::oracle::call_with_timeout;
use crate::prompts::{language_rule, CONTACT_AGENT_SYSTEM_PROMPT};
use crate::replies::{could_not_complete, missing_oracle, AgentKind};
use crate::state::{ContactProfile, ConversationState, Flow, Route, StatePatch, VehicleCandidate};
use crate::tools::contact_tools;
use crate::transcript::{
    extract_last_contact_profile, extract_recent_vehicle_candidates, latest_human_text,
    match_vehicle_candidates, trim_history, MAX_RECOVERED_CANDIDATES,
};

const PROFILE_FIELDS: [&str; 3] = ["customer_name", "phone_number", "preferred_call_time"];

/// Contact agent; reuses the persisted profile and infers the target vehicle.
#[derive(Debug, Clone)]
pub struct ContactAgentNode {
    ctx: NodeContext,
}

impl ContactAgentNode {
    pub fn new(ctx: NodeContext) -> Self {
        Self { ctx }
    }
}

/// Persisted profile, else the one recovered from the transcript.
fn known_profile(view: &ConversationState) -> Option<ContactProfile> {
    if !view.known_contact_profile.is_empty() {
        return Some(view.known_contact_profile.clone());
    }
    extract_last_contact_profile(&view.messages).filter(|p| !p.is_empty())
}

/// Persisted candidates, else the ones recovered from recent search results.
fn recent_candidates(view: &ConversationState) -> Vec<VehicleCandidate> {
    if !view.last_vehicle_candidates.is_empty() {
        return view.last_vehicle_candidates.clone();
    }
    extract_recent_vehicle_candidates(&view.messages, MAX_RECOVERED_CANDIDATES)
}

/// Selected vehicle, else the only candidate, else the one the latest message names.
fn target_vehicle(view: &ConversationState, candidates: &[VehicleCandidate]) -> Option<i64> {
    if view.selected_vehicle_id.is_some() {
        return view.selected_vehicle_id;
    }
    if let [only] = candidates {
        return Some(only.id);
    }
    match match_vehicle_candidates(latest_human_text(&view.messages), candidates).as_slice() {
        [id] => Some(*id),
        _ => None,
    }
}

fn profile_rule(profile: &ContactProfile) -> String {
    let mut rule = String::from("Persisted contact profile available:");
    for field in PROFILE_FIELDS {
        let value = match profile.get(field) {
            Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
            Some(Value::String(_)) | Some(Value::Null) | None => continue,
            Some(other) => other.to_string(),
        };
        rule.push_str(&format!("\n- {field}: {value}"));
    }
    rule.push_str("\n- If the user does not change these values, reuse them and do not ask again.");
    rule
}

#[async_trait]
impl Node for ContactAgentNode {
    fn id(&self) -> GraphNode {
        GraphNode::ContactAgent
    }

    async fn run(&self, state: &ConversationState) -> Result<StatePatch, AgentError> {
        let (sync, view) = synchronized_view(state);
        let config = &self.ctx.config;
        let outcome = TurnGuard::new(
            config.max_contact_iterations_per_turn,
            config.max_agent_tool_iterations,
        )
        .check(
            &view.messages,
            TurnCounters {
                turns: view.contact_agent_turns,
                human_count: view.contact_agent_human_count,
            },
        );
        let language = resolve_language(&self.ctx, &view).await;

        let mut updates = StatePatch {
            route: Some(Route::ContactAgent),
            active_flow: Some(Flow::Contact),
            conversation_language: Some(language.clone()),
            contact_agent_turns: Some(outcome.counters.turns),
            contact_agent_human_count: Some(outcome.counters.human_count),
            ..Default::default()
        };

        if let Some(halt) = outcome.halt {
            tracing::info!(
                turns = outcome.counters.turns,
                reason = ?halt,
                "contact agent halted"
            );
            return Ok(sync.merge(updates).with_message(Message::agent(
                halt.message(GuardedAgent::Contact, &language),
            )));
        }

        let profile = known_profile(&view);
        let candidates = recent_candidates(&view);
        let selected = target_vehicle(&view, &candidates);
        updates.selected_vehicle_id = selected;

        let mut rules = Vec::new();
        if let Some(profile) = &profile {
            rules.push(profile_rule(profile));
            updates.known_contact_profile = Some(profile.clone());
        }
        match selected {
            Some(id) => rules.push(format!(
                "- Target vehicle inferred from conversation memory: vehicle_id={id}."
            )),
            None if candidates.len() > 1 => rules.push(
                "There are multiple vehicles in recent quote context and no selected vehicle yet. \
                 If the user asks for contact, request only minimal vehicle disambiguation."
                    .into(),
            ),
            None => {}
        }
        let patch = sync.merge(updates);

        let Some(oracle) = &self.ctx.oracle else {
            return Ok(patch.with_message(Message::agent(missing_oracle(
                AgentKind::Contact,
                &language,
            ))));
        };

        let mut prompt = vec![
            Message::system(CONTACT_AGENT_SYSTEM_PROMPT),
            Message::system(language_rule(&language)),
        ];
        let memory = render_context_block(&view);
        if !memory.is_empty() {
            prompt.push(Message::system(format!("Persisted thread memory:\n{memory}")));
        }
        if !rules.is_empty() {
            prompt.push(Message::system(format!(
                "Execution context for this turn:\n{}",
                rules.join("\n")
            )));
        }
        prompt.extend(trim_history(&view.messages, config.max_context_messages));

        match call_with_timeout(
            config.oracle_timeout,
            oracle.respond(&prompt, &contact_tools()),
        )
        .await
        {
            Ok(reply) => Ok(patch.with_message(reply.into_message())),
            Err(e) => {
                tracing::warn!(error = %e, "contact agent reply failed");
                Ok(patch.with_message(Message::agent(could_not_complete(&language))))
            }
        }
    }
}
