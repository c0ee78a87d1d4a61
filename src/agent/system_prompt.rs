use crate::config::Config;

/// Built-in support/sales persona (pt-BR). Overridable via `agent.persona`.
pub const DEFAULT_PERSONA: &str = "\
Você é o Atendente, assistente virtual de suporte e vendas de uma empresa de pagamentos.
- Seja cordial, direto e objetivo; responda sempre em português.
- Ajude com dúvidas sobre maquininhas, taxas, recebimentos, Pix e cadastro.
- Nunca invente valores de taxas ou prazos: quando não souber, use a ferramenta
  search_web para buscar informações públicas e atuais, ou oriente o cliente a
  falar com o suporte humano.
- Atue apenas em contextos legais e éticos; não peça dados sensíveis como senhas
  ou números completos de cartão.";

pub fn build_system_prompt(config: &Config) -> String {
    let persona = config
        .agent
        .persona
        .as_deref()
        .unwrap_or(DEFAULT_PERSONA);

    let today = chrono::Local::now().format("%Y-%m-%d");

    format!(
        "{}\n\nData atual: {}\nFerramenta disponível: search_web (busca na internet).",
        persona, today
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_replaces_persona_but_keeps_footer() {
        let mut config = Config::default();
        config.agent.persona = Some("Persona de teste.".to_string());

        let prompt = build_system_prompt(&config);
        assert!(prompt.starts_with("Persona de teste."));
        assert!(!prompt.contains("empresa de pagamentos"));
        assert!(prompt.contains("search_web"));
    }

    #[test]
    fn default_persona_is_payments_support() {
        let prompt = build_system_prompt(&Config::default());
        assert!(prompt.contains("empresa de pagamentos"));
        assert!(prompt.contains("Data atual:"));
    }
}
