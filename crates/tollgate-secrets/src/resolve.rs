//! `{{SECRET:NAME}}` placeholder resolution.
//!
//! Templates arriving from endpoint auth config may reference tenant
//! secrets by name. Resolution substitutes each reference with the
//! decrypted plaintext; references that cannot be resolved are left
//! verbatim so a misconfigured endpoint degrades to a failed upstream
//! auth rather than a failed request.

use tracing::warn;

use crate::crypto::SecretCipher;

const OPEN: &str = "{{SECRET:";
const CLOSE: &str = "}}";

fn is_valid_name(name: &str) -> bool {
    if name.is_empty() || name.len() > 64 {
        return false;
    }
    let mut chars = name.chars();
    let first = chars.next().expect("non-empty checked above");
    (first.is_ascii_uppercase() || first == '_')
        && chars.all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

/// Collect the distinct secret names referenced by a template, in order
/// of first appearance.
#[must_use]
pub fn referenced_names(template: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut rest = template;

    while let Some(start) = rest.find(OPEN) {
        let after_open = &rest[start + OPEN.len()..];
        match after_open.find(CLOSE) {
            Some(end) => {
                let name = &after_open[..end];
                if is_valid_name(name) {
                    if !names.iter().any(|n| n == name) {
                        names.push(name.to_string());
                    }
                    rest = &after_open[end + CLOSE.len()..];
                } else {
                    rest = after_open;
                }
            }
            None => break,
        }
    }

    names
}

/// Substitute every `{{SECRET:NAME}}` occurrence in `template`.
///
/// `lookup` returns the stored `(ciphertext, nonce)` for a name, or
/// `None` when the tenant has no such secret. Unknown references and
/// references whose ciphertext fails to decrypt are left intact and
/// logged; resolution itself never fails. A template with no references
/// is returned unchanged.
pub fn resolve_references<F>(cipher: &SecretCipher, template: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<(Vec<u8>, Vec<u8>)>,
{
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find(OPEN) {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + OPEN.len()..];

        let Some(end) = after_open.find(CLOSE) else {
            // Unterminated reference; emit the remainder as-is.
            out.push_str(&rest[start..]);
            return out;
        };

        let name = &after_open[..end];
        if !is_valid_name(name) {
            // Not a secret reference; keep the opener literal and rescan
            // from just past it.
            out.push_str(OPEN);
            rest = after_open;
            continue;
        }

        let literal = &rest[start..start + OPEN.len() + end + CLOSE.len()];
        match lookup(name) {
            Some((ciphertext, nonce)) => match cipher.decrypt_string(&ciphertext, &nonce) {
                Ok(plaintext) => out.push_str(&plaintext),
                Err(err) => {
                    warn!(secret = %name, error = %err, "Failed to decrypt referenced secret");
                    out.push_str(literal);
                }
            },
            None => {
                warn!(secret = %name, "Unknown secret reference left unresolved");
                out.push_str(literal);
            }
        }

        rest = &after_open[end + CLOSE.len()..];
    }

    out.push_str(rest);
    out
}
