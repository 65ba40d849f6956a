//! Fixed customer-facing replies used when the oracle cannot answer.

use crate::language::is_spanish;

/// Agent that produced a configuration reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentKind {
    Quote,
    Contact,
}

/// Reply when no oracle is configured.
pub fn missing_oracle(agent: AgentKind, language: &str) -> String {
    let (es, en) = match agent {
        AgentKind::Quote => ("cotización", "quote"),
        AgentKind::Contact => ("contacto", "contact"),
    };
    if is_spanish(language) {
        format!(
            "Para usar el agente de {es} necesitas `OPENAI_API_KEY`. \
             Configúrala en `.env` y vuelve a ejecutar."
        )
    } else {
        format!(
            "The {en} agent needs `OPENAI_API_KEY`. Set it in `.env` and run again."
        )
    }
}

/// Reply when a turn could not be completed automatically.
pub fn could_not_complete(language: &str) -> &'static str {
    if is_spanish(language) {
        "No pude completar esta solicitud automáticamente. ¿Puedes reformularla o intentarlo de nuevo?"
    } else {
        "I could not complete this automatically. Could you rephrase or try again?"
    }
}

/// Reply when a turn ended without any agent text.
pub fn no_reply(language: &str) -> &'static str {
    if is_spanish(language) {
        "No se pudo generar respuesta."
    } else {
        "No response could be generated."
    }
}
