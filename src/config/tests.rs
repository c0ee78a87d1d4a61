#[cfg(test)]
mod tests {
    use crate::config::Config;

    #[test]
    fn test_defaults() {
        let config = Config::default();

        assert_eq!(config.agent.model, "gemini-2.0-flash");
        assert!(config.agent.supports_vision);
        assert!(config.agent.session_memory);
        assert_eq!(config.providers.gemini.api_key_env, "GOOGLE_API_KEY");
        assert_eq!(config.providers.tavily.api_key_env, "TAVILY_API_KEY");
        assert_eq!(config.server.port, 10000);
        assert_eq!(config.server.max_sessions, 100);
        assert_eq!(config.tools.search_max_results, 3);
    }

    #[test]
    fn test_partial_file_keeps_section_defaults() {
        let raw = r#"
[agent]
model = "gemini-1.5-flash"
supports_vision = false
session_memory = false

[server]
port = 8080
"#;
        let config: Config = toml::from_str(raw).unwrap();

        assert_eq!(config.agent.model, "gemini-1.5-flash");
        assert!(!config.agent.supports_vision);
        assert!(!config.agent.session_memory);
        // Unset fields inside a present section still default
        assert_eq!(config.agent.max_tokens, 2048);
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.bind, "0.0.0.0");
        // Absent sections default wholesale
        assert_eq!(
            config.providers.gemini.base_url,
            "https://generativelanguage.googleapis.com/v1beta"
        );
    }

    #[test]
    fn test_persona_override() {
        let raw = r#"
[agent]
persona = "Você é um atendente de testes."
"#;
        let config: Config = toml::from_str(raw).unwrap();
        assert_eq!(
            config.agent.persona.as_deref(),
            Some("Você é um atendente de testes.")
        );
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nonexistent.toml");
        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.agent.model, "gemini-2.0-flash");
    }
}
