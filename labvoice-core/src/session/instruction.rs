use crate::models::config::Persona;
use crate::models::message::Message;
use crate::pipeline::transcript::render_history;

/// Persona instruction followed by the caller context and prior conversation.
pub fn compose_system_instruction(persona: &Persona, context: &str, history: &[Message]) -> String {
    format!(
        "{}\n\n[CURRENT CONTEXT]\n{}\n\n[CONVERSATION HISTORY]\n{}\n",
        persona.instruction.trim(),
        context.trim(),
        render_history(history)
    )
}
