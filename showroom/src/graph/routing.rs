//! Pure transition function of the routing graph.

use super::GraphNode;
use crate::message::Message;
use crate::state::{ConversationState, Route};

/// Successor of `node` given the state after its patch was applied; `None` ends the turn.
pub fn next_node(node: GraphNode, state: &ConversationState) -> Option<GraphNode> {
    match node {
        GraphNode::Router => Some(match state.route {
            Some(Route::ContactAgent) => GraphNode::ContactAgent,
            Some(Route::QuoteAgent) | None => GraphNode::QuoteAgent,
        }),
        GraphNode::QuoteAgent => after_agent(state, GraphNode::QuoteTools),
        GraphNode::ContactAgent => after_agent(state, GraphNode::ContactTools),
        GraphNode::QuoteTools => Some(GraphNode::QuoteAgent),
        GraphNode::ContactTools => Some(GraphNode::ContactAgent),
        GraphNode::FinalSupervisor => None,
    }
}

fn after_agent(state: &ConversationState, tools: GraphNode) -> Option<GraphNode> {
    match state.last_message() {
        Some(Message::Agent { tool_calls, .. }) if !tool_calls.is_empty() => Some(tools),
        Some(Message::Agent { .. }) => Some(GraphNode::FinalSupervisor),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::ToolCall;

    fn with_last(message: Message) -> ConversationState {
        ConversationState {
            messages: vec![Message::human("hola"), message],
            ..Default::default()
        }
    }

    #[test]
    fn router_follows_route() {
        let mut state = ConversationState::default();
        assert_eq!(next_node(GraphNode::Router, &state), Some(GraphNode::QuoteAgent));
        state.route = Some(Route::ContactAgent);
        assert_eq!(next_node(GraphNode::Router, &state), Some(GraphNode::ContactAgent));
    }

    /// **Scenario**: Agents go to their tool node on tool calls, else to the supervisor.
    #[test]
    fn agents_route_by_last_message() {
        let calls = with_last(Message::Agent {
            id: None,
            content: String::new(),
            tool_calls: vec![ToolCall::new("c", "search_used_vehicles", Default::default())],
        });
        assert_eq!(next_node(GraphNode::QuoteAgent, &calls), Some(GraphNode::QuoteTools));
        assert_eq!(next_node(GraphNode::ContactAgent, &calls), Some(GraphNode::ContactTools));

        let reply = with_last(Message::agent("listo"));
        assert_eq!(
            next_node(GraphNode::QuoteAgent, &reply),
            Some(GraphNode::FinalSupervisor)
        );
        assert_eq!(next_node(GraphNode::QuoteAgent, &ConversationState::default()), None);
    }

    #[test]
    fn tools_return_to_agent_and_supervisor_ends() {
        let state = ConversationState::default();
        assert_eq!(next_node(GraphNode::QuoteTools, &state), Some(GraphNode::QuoteAgent));
        assert_eq!(next_node(GraphNode::ContactTools, &state), Some(GraphNode::ContactAgent));
        assert_eq!(next_node(GraphNode::FinalSupervisor, &state), None);
    }
}
