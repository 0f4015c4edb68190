//! `stepwise providers`: show which decoding backend is selected and why.

use stepwise_config::{AppConfig, BackendKind, ProviderPreference, select_backend};

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let has_openai = config.openai.is_viable();
    let has_google = config.google.is_viable();

    println!("Decoding backends");
    println!("=================");
    println!();
    println!("  {:<8} {:<12} {:<28} {}", "Backend", "Credentials", "Default model", "Base URL");
    for (kind, viable) in [(BackendKind::OpenAi, has_openai), (BackendKind::Gemini, has_google)] {
        println!(
            "  {:<8} {:<12} {:<28} {}",
            kind.name(),
            if viable { "present" } else { "missing" },
            kind.default_model(),
            kind.default_base_url()
        );
    }
    println!();
    println!("  Preference: {:?}", config.provider);

    match select_backend(config.provider, has_openai, has_google) {
        Ok(kind) => {
            let model = config.model.as_deref().unwrap_or(kind.default_model());
            println!("  Selected:   {kind} ({model})");
            println!("  Reason:     {}", selection_reason(config.provider, has_openai, has_google));
        }
        Err(e) => println!("  Selected:   none ({e})"),
    }

    println!();
    println!("  Environment variables:");
    println!("    OPENAI_API_KEY, GOOGLE_API_KEY, LLM_PROVIDER, MODEL_ID");

    Ok(())
}

/// Why the selector picks what it picks.
pub fn selection_reason(preference: ProviderPreference, has_openai: bool, has_google: bool) -> &'static str {
    match (preference, has_openai, has_google) {
        (ProviderPreference::OpenAi, ..) | (ProviderPreference::Google, ..) => {
            "explicit LLM_PROVIDER preference"
        }
        (ProviderPreference::Auto, true, true) => "both credentials present; OpenAI-style preferred",
        (ProviderPreference::Auto, true, false) => "only OPENAI_API_KEY is set",
        (ProviderPreference::Auto, false, true) => "only GOOGLE_API_KEY is set",
        (ProviderPreference::Auto, false, false) => "no credentials configured",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_preference_is_reported() {
        assert_eq!(
            selection_reason(ProviderPreference::Google, true, false),
            "explicit LLM_PROVIDER preference"
        );
    }

    #[test]
    fn auto_tie_prefers_openai() {
        assert!(selection_reason(ProviderPreference::Auto, true, true).contains("OpenAI-style"));
        assert_eq!(
            select_backend(ProviderPreference::Auto, true, true).unwrap(),
            BackendKind::OpenAi
        );
    }
}
