use std::collections::BTreeMap;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use scoreop_domain::{ClaimOutputs, LocalObjectRef, ResourceClaim};
use scoreop_config::ProvisionerBinding;
use serde_json::Value;
use tracing::warn;

/// What missing variables render as. Matches Go template behavior: no error,
/// just a marker in the output.
const NO_VALUE: &str = "<no value>";

// ── Template context ──────────────────────────────────────────────────────────

/// Substitution context for provisioner output templates.
#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
    pub claim_name: String,
    pub claim_key: String,
    pub namespace: String,
    pub resource_type: String,
    pub class: Option<String>,
    pub params: Value,
    pub class_params: Value,
    pub secrets: BTreeMap<String, String>,
    pub services: BTreeMap<String, String>,
    /// Last raw response from an external API, when the strategy has one.
    pub response: Value,
}

impl TemplateContext {
    pub fn for_claim(claim: &ResourceClaim) -> Self {
        Self {
            claim_name: claim.metadata.name.clone(),
            claim_key: claim.spec.key.clone(),
            namespace: claim.metadata.namespace.clone(),
            resource_type: claim.spec.resource_type.clone(),
            class: claim.spec.class.clone(),
            params: claim
                .spec
                .params
                .as_ref()
                .map(|p| p.0.clone())
                .unwrap_or(Value::Null),
            ..Default::default()
        }
    }

    fn to_value(&self) -> Value {
        serde_json::json!({
            "claimName": self.claim_name,
            "claimKey": self.claim_key,
            "namespace": self.namespace,
            "type": self.resource_type,
            "class": self.class,
            "params": self.params,
            "classParams": self.class_params,
            "secrets": self.secrets,
            "services": self.services,
            "response": self.response,
        })
    }
}

// ── Rendering ─────────────────────────────────────────────────────────────────

/// Render one Go-style template string: `{{ .path.to.field }}` lookups,
/// pipelines, and the helpers `lower`, `upper`, `replace`, `generateSecret`.
/// Missing variables render as `<no value>`.
pub fn render_template(template: &str, ctx: &TemplateContext) -> String {
    let scope = ctx.to_value();
    let mut result = String::with_capacity(template.len());
    let mut rest = template;
    loop {
        let Some(start) = rest.find("{{") else {
            result.push_str(rest);
            break;
        };
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            // Unterminated action: emit verbatim.
            result.push_str(&rest[start..]);
            break;
        };
        let action = after[..end].trim();
        result.push_str(&eval_action(action, &scope).unwrap_or_else(|| NO_VALUE.to_string()));
        rest = &after[end + 2..];
    }
    result
}

fn eval_action(action: &str, scope: &Value) -> Option<String> {
    let mut stages = action.split('|');
    let head = stages.next()?.trim();
    let mut value = eval_expr(&tokenize(head), scope)?;
    for stage in stages {
        let mut tokens = tokenize(stage.trim());
        tokens.push(Token::Literal(value));
        value = eval_expr(&tokens, scope)?;
    }
    Some(value)
}

#[derive(Debug, Clone)]
enum Token {
    Word(String),
    Literal(String),
}

fn tokenize(s: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = s.chars().peekable();
    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if c == '"' {
            chars.next();
            let mut lit = String::new();
            for c in chars.by_ref() {
                if c == '"' {
                    break;
                }
                lit.push(c);
            }
            tokens.push(Token::Literal(lit));
        } else {
            let mut word = String::new();
            while let Some(&c) = chars.peek() {
                if c.is_whitespace() {
                    break;
                }
                word.push(c);
                chars.next();
            }
            tokens.push(Token::Word(word));
        }
    }
    tokens
}

/// Evaluate `.path` lookups, literals, and function applications. The last
/// token may be a piped-in literal.
fn eval_expr(tokens: &[Token], scope: &Value) -> Option<String> {
    let (head, args) = tokens.split_first()?;
    match head {
        Token::Literal(lit) => Some(lit.clone()),
        Token::Word(w) if w.starts_with('.') => lookup_path(scope, w),
        Token::Word(w) => {
            let args: Vec<String> = args
                .iter()
                .map(|t| match t {
                    Token::Literal(lit) => Some(lit.clone()),
                    Token::Word(w) if w.starts_with('.') => lookup_path(scope, w),
                    Token::Word(w) => Some(w.clone()),
                })
                .collect::<Option<Vec<_>>>()?;
            apply_function(w, &args)
        }
    }
}

fn apply_function(name: &str, args: &[String]) -> Option<String> {
    match name {
        "lower" => args.first().map(|v| v.to_lowercase()),
        "upper" => args.first().map(|v| v.to_uppercase()),
        // `replace from to value` — the value is last so piping works.
        "replace" => match args {
            [from, to, value] => Some(value.replace(from.as_str(), to)),
            _ => None,
        },
        "generateSecret" => {
            let n = args
                .first()
                .and_then(|a| a.parse::<usize>().ok())
                .unwrap_or(32);
            Some(generate_secret(n))
        }
        _ => None,
    }
}

fn lookup_path(scope: &Value, path: &str) -> Option<String> {
    let mut current = scope;
    for segment in path.trim_start_matches('.').split('.') {
        if segment.is_empty() {
            continue;
        }
        current = current.get(segment)?;
    }
    match current {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// URL-safe base64 string truncated to `n` characters.
fn generate_secret(n: usize) -> String {
    let mut bytes = vec![0u8; n.max(1)];
    rand::rng().fill_bytes(&mut bytes);
    let mut s = URL_SAFE_NO_PAD.encode(&bytes);
    s.truncate(n);
    s
}

// ── Binding outputs ───────────────────────────────────────────────────────────

/// Render a binding's output templates into claim outputs. Keys follow the
/// claim output record: `uri`, `secretRef`, `configMapRef`, `image`, `cert`.
pub fn render_outputs(binding: &ProvisionerBinding, ctx: &TemplateContext) -> ClaimOutputs {
    let mut outputs = ClaimOutputs::default();
    for (key, template) in &binding.outputs {
        let rendered = render_template(template, ctx);
        match key.as_str() {
            "uri" => outputs.uri = Some(rendered),
            "secretRef" => outputs.secret_ref = Some(LocalObjectRef::new(rendered)),
            "configMapRef" => outputs.config_map_ref = Some(LocalObjectRef::new(rendered)),
            "image" => outputs.image = Some(rendered),
            "cert" => outputs.cert = Some(rendered),
            other => {
                warn!(output = %other, resource_type = %binding.resource_type, "ignoring unknown output key");
            }
        }
    }
    outputs
}
