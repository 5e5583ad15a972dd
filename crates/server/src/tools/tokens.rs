//! tokens_canonicalize tool implementation.

use labelgate_core::canonical::canonicalize_form_tokens;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::json_result;

/// Parameters for the tokens_canonicalize tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TokensCanonicalizeParams {
    /// Raw ingredient-name or dosage-form tokens, e.g. `["Aerial Parts", "500mg"]`.
    pub tokens: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TokensCanonicalizeOutput {
    /// Deduplicated canonical tokens in first-seen order.
    pub tokens: Vec<String>,
}

pub fn canonicalize_impl(params: TokensCanonicalizeParams) -> Result<CallToolResult, McpError> {
    json_result(&TokensCanonicalizeOutput { tokens: canonicalize_form_tokens(&params.tokens) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::parse_output;

    #[test]
    fn test_canonicalize_impl() {
        let params = TokensCanonicalizeParams {
            tokens: vec!["Aerial Parts".into(), "Standardized Extract".into(), "500mg".into()],
        };
        let output: TokensCanonicalizeOutput = parse_output(&canonicalize_impl(params).unwrap());
        assert_eq!(output.tokens, vec!["whole", "plant", "std", "extract"]);
    }

    #[test]
    fn test_empty_input() {
        let output: TokensCanonicalizeOutput =
            parse_output(&canonicalize_impl(TokensCanonicalizeParams { tokens: Vec::new() }).unwrap());
        assert!(output.tokens.is_empty());
    }
}
