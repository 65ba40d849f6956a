//! Turn boundary detection and per-agent re-entry caps.

use crate::language::is_spanish;
use crate::message::Message;
use crate::transcript::count_human_messages;

/// Which agent a guard check is for; selects halt wording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardedAgent {
    Quote,
    Contact,
}

/// Why the guard stopped an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HaltReason {
    /// Re-entries within the current turn reached the per-turn cap.
    PerTurnCap,
    /// Re-entries reached the absolute cap.
    AbsoluteCap,
}

/// Counters an agent stores between entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TurnCounters {
    pub turns: u32,
    pub human_count: usize,
}

/// Result of one guard check: the counters to persist and an optional halt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuardOutcome {
    pub counters: TurnCounters,
    pub new_turn: bool,
    pub halt: Option<HaltReason>,
}

/// Per-agent caps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnGuard {
    pub per_turn_cap: u32,
    pub absolute_cap: u32,
}

/// True when the transcript holds more human messages than last seen, or ends on one.
pub fn is_new_turn(messages: &[Message], stored_human_count: usize) -> bool {
    count_human_messages(messages) > stored_human_count
        || messages.last().is_some_and(Message::is_human)
}

impl TurnGuard {
    pub fn new(per_turn_cap: u32, absolute_cap: u32) -> Self {
        Self {
            per_turn_cap,
            absolute_cap,
        }
    }

    /// Advances the stored counters for one agent entry and checks both caps.
    ///
    /// The per-turn cap is checked first.
    pub fn check(&self, messages: &[Message], stored: TurnCounters) -> GuardOutcome {
        let human_count = count_human_messages(messages);
        let new_turn = is_new_turn(messages, stored.human_count);
        let turns = if new_turn { 1 } else { stored.turns.saturating_add(1) };

        let halt = if turns > self.per_turn_cap {
            Some(HaltReason::PerTurnCap)
        } else if turns > self.absolute_cap {
            Some(HaltReason::AbsoluteCap)
        } else {
            None
        };

        GuardOutcome {
            counters: TurnCounters { turns, human_count },
            new_turn,
            halt,
        }
    }
}

impl HaltReason {
    /// Customer-facing text for this halt.
    pub fn message(&self, agent: GuardedAgent, language: &str) -> &'static str {
        let spanish = is_spanish(language);
        match (agent, self, spanish) {
            (GuardedAgent::Quote, HaltReason::PerTurnCap, true) => {
                "Para evitar búsquedas automáticas en cadena, detengo este turno aquí. \
                 Puedo reintentar con un ajuste puntual (país, año, km, precio o marca)."
            }
            (GuardedAgent::Quote, HaltReason::PerTurnCap, false) => {
                "To avoid chained automatic searches, I am stopping this turn here. \
                 I can retry with one specific adjustment (country, year, mileage, price or make)."
            }
            (GuardedAgent::Quote, HaltReason::AbsoluteCap, true) => {
                "Detuve la ejecución para evitar un bucle de herramientas. \
                 ¿Quieres que reintente con filtros más claros?"
            }
            (GuardedAgent::Quote, HaltReason::AbsoluteCap, false) => {
                "I stopped to avoid a tool loop. Would you like me to retry with clearer filters?"
            }
            (GuardedAgent::Contact, HaltReason::PerTurnCap, true) => {
                "Para evitar un bucle, necesito solo el dato faltante para cerrar la solicitud \
                 (vehículo o confirmación de contacto)."
            }
            (GuardedAgent::Contact, HaltReason::PerTurnCap, false) => {
                "To avoid a loop, I only need the missing detail to close the request \
                 (vehicle or contact confirmation)."
            }
            (GuardedAgent::Contact, HaltReason::AbsoluteCap, true) => {
                "Detuve la ejecución para evitar un bucle de herramientas. \
                 Confirmemos los datos de contacto y el ID del vehículo."
            }
            (GuardedAgent::Contact, HaltReason::AbsoluteCap, false) => {
                "I stopped to avoid a tool loop. Let's confirm your contact details and the vehicle ID."
            }
        }
    }
}
