//! Quote agent node: searches the inventory through policy-checked tool calls.

use async_trait::async_trait;

use super::context::{render_context_block, resolve_language, synchronized_view};
use super::NodeContext;
use crate::error::AgentError;
use crate::graph::{GraphNode, Node};
use crate::guard::{GuardedAgent, TurnCounters, TurnGuard};
use crate::message::Message;
use crate::oracle::call_with_timeout;
use crate::policy::{enforce_quote_tool_policy, PolicyContext};
use crate::directive::infer_runtime_directive;
use crate::prompts::{language_rule, QUOTE_AGENT_SYSTEM_PROMPT};
use crate::replies::{could_not_complete, missing_oracle, AgentKind};
use crate::state::{ConversationState, Flow, Route, RuntimeDirective, SearchFilters, StatePatch};
use crate::tools::{quote_tools, LIST_AVAILABLE_VEHICLE_FILTERS};
use crate::transcript::{has_tool_result_in_current_turn, latest_human_text, trim_history};

/// Quote agent with catalog gating and filter persistence.
#[derive(Debug, Clone)]
pub struct QuoteAgentNode {
    ctx: NodeContext,
}

impl QuoteAgentNode {
    pub fn new(ctx: NodeContext) -> Self {
        Self { ctx }
    }

    async fn directive_for_new_turn(&self, view: &ConversationState) -> RuntimeDirective {
        match &self.ctx.oracle {
            Some(oracle) => {
                infer_runtime_directive(
                    oracle.as_ref(),
                    self.ctx.catalog.as_ref(),
                    latest_human_text(&view.messages),
                    self.ctx.config.oracle_timeout,
                )
                .await
            }
            None => RuntimeDirective::default(),
        }
    }

    async fn country_names(&self) -> Vec<String> {
        match self.ctx.catalog.metadata().await {
            Ok(metadata) => metadata.country_names(),
            Err(e) => {
                tracing::warn!(error = %e, "catalog metadata unavailable for clarification");
                Vec::new()
            }
        }
    }
}

/// Applies a fresh directive to the persisted filters.
fn apply_directive(mut filters: SearchFilters, directive: &RuntimeDirective) -> SearchFilters {
    if directive.parallel_search_mode {
        filters.clear();
    }
    if let Some(country_id) = directive.country_id_override {
        filters.insert("country_id".into(), country_id.into());
    } else if directive.country_intent_detected {
        filters.remove("country_id");
    }
    if directive.clear_make {
        filters.remove("make");
    }
    if let Some(make) = directive.make_override() {
        filters.insert("make".into(), make.into());
    }
    filters
}

fn runtime_rules(filters: &SearchFilters, directive: &RuntimeDirective) -> Vec<String> {
    let mut rules = Vec::new();
    if !filters.is_empty() {
        rules.push(format!(
            "- Use these persisted active filters as your default search baseline: {}.",
            serde_json::to_string(filters).unwrap_or_default()
        ));
    }
    if directive.parallel_search_mode {
        rules.push(
            "- The latest user message contains multiple independent search intents. \
             Run separate search_used_vehicles calls (one call per intent) in this turn."
                .into(),
        );
        rules.push(
            "- Do not force one intent over the others, and do not mix constraints between intents."
                .into(),
        );
    }
    if let Some(country_id) = directive.country_id_override {
        rules.push(format!(
            "- Replace any previous country filter and use country_id={country_id}."
        ));
    }
    if directive.country_unresolved() {
        rules.push(
            "- The user requested country/origin, but there is no valid country_id for this turn. \
             Do not reuse previous country_id; ask for country clarification using catalog values before searching."
                .into(),
        );
    }
    if directive.clear_make {
        rules.push("- Do not apply a make filter unless the user explicitly asks for a brand.".into());
    }
    if let Some(make) = directive.make_override() {
        rules.push(format!(
            "- Enforce make={make} exactly; do not broaden results to other brands."
        ));
    }
    rules.push(
        "- Avoid speculative chained searches (for example, trying brands on your own). \
         If no results are found, explain active filters and request one concrete adjustment."
            .into(),
    );
    rules
}

#[async_trait]
impl Node for QuoteAgentNode {
    fn id(&self) -> GraphNode {
        GraphNode::QuoteAgent
    }

    async fn run(&self, state: &ConversationState) -> Result<StatePatch, AgentError> {
        let (sync, view) = synchronized_view(state);
        let config = &self.ctx.config;
        let guard = TurnGuard::new(
            config.max_quote_iterations_per_turn,
            config.max_agent_tool_iterations,
        );
        let outcome = guard.check(
            &view.messages,
            TurnCounters {
                turns: view.quote_agent_turns,
                human_count: view.quote_agent_human_count,
            },
        );
        let language = resolve_language(&self.ctx, &view).await;

        let (directive, filters) = if outcome.new_turn {
            let directive = self.directive_for_new_turn(&view).await;
            let filters = apply_directive(view.active_search_filters.clone(), &directive);
            (directive, filters)
        } else {
            (
                view.runtime_directive.clone(),
                view.active_search_filters.clone(),
            )
        };

        let updates = StatePatch {
            route: Some(Route::QuoteAgent),
            active_flow: Some(Flow::Quote),
            conversation_language: Some(language.clone()),
            quote_agent_turns: Some(outcome.counters.turns),
            quote_agent_human_count: Some(outcome.counters.human_count),
            runtime_directive: Some(directive.clone()),
            active_search_filters: Some(filters.clone()),
            ..Default::default()
        };
        let patch = sync.merge(updates);

        if let Some(halt) = outcome.halt {
            tracing::info!(
                turns = outcome.counters.turns,
                reason = ?halt,
                "quote agent halted"
            );
            return Ok(patch.with_message(Message::agent(
                halt.message(GuardedAgent::Quote, &language),
            )));
        }

        let Some(oracle) = &self.ctx.oracle else {
            return Ok(patch.with_message(Message::agent(missing_oracle(
                AgentKind::Quote,
                &language,
            ))));
        };

        let mut prompt = vec![
            Message::system(QUOTE_AGENT_SYSTEM_PROMPT),
            Message::system(language_rule(&language)),
        ];
        let memory = render_context_block(&ConversationState {
            active_search_filters: filters.clone(),
            ..view.clone()
        });
        if !memory.is_empty() {
            prompt.push(Message::system(format!("Persisted thread memory:\n{memory}")));
        }
        prompt.push(Message::system(format!(
            "Execution rules for this turn:\n{}",
            runtime_rules(&filters, &directive).join("\n")
        )));
        prompt.extend(trim_history(&view.messages, config.max_context_messages));

        let reply = match call_with_timeout(
            config.oracle_timeout,
            oracle.respond(&prompt, &quote_tools()),
        )
        .await
        {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(error = %e, "quote agent reply failed");
                return Ok(patch.with_message(Message::agent(could_not_complete(&language))));
            }
        };

        let country_names = if directive.country_unresolved() {
            self.country_names().await
        } else {
            Vec::new()
        };
        let enforced = enforce_quote_tool_policy(
            reply.into_message(),
            PolicyContext {
                active_filters: &filters,
                directive: &directive,
                language: &language,
                catalog_lookup_in_current_turn: has_tool_result_in_current_turn(
                    &view.messages,
                    LIST_AVAILABLE_VEHICLE_FILTERS,
                ),
                country_names: &country_names,
            },
        );
        tracing::debug!(
            tool_calls = enforced.tool_calls().len(),
            "quote agent proposed"
        );
        Ok(patch.with_message(enforced))
    }
}
