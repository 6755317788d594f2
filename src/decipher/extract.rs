//! Pattern extraction over the obfuscated player program text
//!
//! Locates the signature-descrambling routine inside an untrusted script:
//! the call site naming it, its definition, the helper object it leans on,
//! and the helper's full literal. All searches take the first match in
//! document order. Nothing here executes the input.

use crate::error::DlmuxError;
use regex::Regex;
use tracing::debug;

/// The textual fragments identifying the descrambling routine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    /// Name the routine is called by at the call site
    pub caller_name: String,
    /// Parameter name of the routine
    pub arg_name: String,
    /// Full body text of the routine
    pub body: String,
    /// Name of the helper object the body references
    pub helper_name: String,
    /// Full source text of the helper object literal
    pub helper_literal: String,
}

fn missing(pattern: &'static str, source: &str) -> DlmuxError {
    DlmuxError::Extraction {
        pattern,
        source_text: source.to_string(),
    }
}

/// Extract the descrambling routine's fragments from raw program text.
///
/// If the text is a script-injection wrapper rather than the program
/// itself, the injected payload is unwrapped first.
pub fn extract(source_text: &str) -> Result<Extraction, DlmuxError> {
    let unwrapped;
    let source = if source_text.trim_start().starts_with("var script") {
        unwrapped = unwrap_injected_payload(source_text)?;
        debug!(len = unwrapped.len(), "unwrapped injected script payload");
        unwrapped.as_str()
    } else {
        source_text
    };

    // 1. Call site of the shape `=<name>(decodeURIComponent`.
    let caller_re = Regex::new(r"=([a-zA-Z0-9$_]+?)\(decodeURIComponent")?;
    let caller_name = caller_re
        .captures(source)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| missing("caller name", source_text))?;

    // 2. Definition `<name>=function(<arg>){<body>}` whose body opens with
    // the self-referential `<arg>=<arg>.` statement. The self-reference
    // check is done on candidates rather than with a backreference.
    let def_re = Regex::new(&format!(
        r"{}=function\(([a-zA-Z0-9$_]+)\)\{{([^}}]+)\}}",
        regex::escape(&caller_name)
    ))?;
    let (arg_name, body) = def_re
        .captures_iter(source)
        .filter_map(|c| match (c.get(1), c.get(2)) {
            (Some(arg), Some(body)) => Some((arg.as_str(), body.as_str())),
            _ => None,
        })
        .find(|(arg, body)| body.starts_with(&format!("{arg}={arg}.")))
        .map(|(arg, body)| (arg.to_string(), body.to_string()))
        .ok_or_else(|| missing("transform definition", source_text))?;

    // 3. Helper reference `;<helper>.<method>(` inside the body.
    let helper_re = Regex::new(r";([a-zA-Z0-9$_]+?)\..+?\(")?;
    let helper_name = helper_re
        .captures(&body)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| missing("helper reference", source_text))?;

    // 4. Top-level helper declaration `var <helper>={...};`, possibly
    // spanning multiple lines.
    let literal_re = Regex::new(&format!(
        r"var {}=\{{[\s\S]+?\}};",
        regex::escape(&helper_name)
    ))?;
    let helper_literal = literal_re
        .find(source)
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| missing("helper literal", source_text))?;

    debug!(
        caller = %caller_name,
        arg = %arg_name,
        helper = %helper_name,
        "extracted descrambling routine"
    );

    Ok(Extraction {
        caller_name,
        arg_name,
        body,
        helper_name,
        helper_literal,
    })
}

/// Recover the payload a script-injection wrapper would hand to the DOM.
///
/// The wrapper builds a script element and assigns the real program to its
/// content property. Instead of executing the wrapper against stubbed DOM
/// calls, the string literal assigned to `innerHTML` is located and decoded
/// in place.
fn unwrap_injected_payload(source: &str) -> Result<String, DlmuxError> {
    let idx = source
        .find("innerHTML")
        .ok_or_else(|| missing("injected payload", source))?;
    let rest = &source[idx + "innerHTML".len()..];
    let rest = rest.trim_start();
    let rest = rest
        .strip_prefix('=')
        .ok_or_else(|| missing("injected payload", source))?
        .trim_start();

    let mut chars = rest.chars();
    let quote = match chars.next() {
        Some(q @ ('"' | '\'')) => q,
        _ => return Err(missing("injected payload", source)),
    };

    let mut out = String::new();
    while let Some(c) = chars.next() {
        match c {
            c if c == quote => return Ok(out),
            '\\' => match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('r') => out.push('\r'),
                Some('0') => out.push('\0'),
                Some('u') => {
                    let hex: String = chars.by_ref().take(4).collect();
                    match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                        Some(decoded) => out.push(decoded),
                        None => return Err(missing("injected payload", source)),
                    }
                }
                Some('x') => {
                    let hex: String = chars.by_ref().take(2).collect();
                    match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                        Some(decoded) => out.push(decoded),
                        None => return Err(missing("injected payload", source)),
                    }
                }
                // \" \' \\ \/ and anything else decode to the char itself
                Some(other) => out.push(other),
                None => return Err(missing("injected payload", source)),
            },
            _ => out.push(c),
        }
    }

    // Unterminated literal
    Err(missing("injected payload", source))
}
