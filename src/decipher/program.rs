//! Typed decipher program compiled from extracted fragments
//!
//! The helper object literal is parsed into a table of the three permutation
//! kinds the obfuscated grammar ever expresses, the routine body into an
//! ordered call list, and the result is interpreted by a fixed evaluator.
//! No dynamic code execution takes place.

use crate::decipher::Extraction;
use crate::error::DlmuxError;
use regex::Regex;
use std::collections::HashMap;
use tracing::debug;

/// One permutation step over the character array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    /// Reverse the array
    Reverse,
    /// Swap the first element with the one at `n % len`
    Swap,
    /// Drop the first `n` elements
    Cut,
}

/// A compiled signature-descrambling routine.
///
/// Pure and deterministic: the same input always yields the same output.
/// Derived fresh from each program text; never reused across program loads.
#[derive(Debug, Clone)]
pub struct DecipherRoutine {
    steps: Vec<(Op, usize)>,
}

impl DecipherRoutine {
    /// Apply the routine to a scrambled signature.
    pub fn apply(&self, scrambled: &str) -> String {
        let mut chars: Vec<char> = scrambled.chars().collect();
        for &(op, arg) in &self.steps {
            match op {
                Op::Reverse => chars.reverse(),
                Op::Swap => {
                    if !chars.is_empty() {
                        let idx = arg % chars.len();
                        chars.swap(0, idx);
                    }
                }
                Op::Cut => {
                    if arg < chars.len() {
                        chars.drain(..arg);
                    } else {
                        chars.clear();
                    }
                }
            }
        }
        chars.into_iter().collect()
    }

    /// Number of permutation steps in the routine.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// A routine with zero steps cannot come out of `compile`.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Compile extracted fragments into a callable routine.
pub fn compile(extraction: &Extraction) -> Result<DecipherRoutine, DlmuxError> {
    let methods = parse_helper_methods(&extraction.helper_literal)?;
    if methods.is_empty() {
        return Err(DlmuxError::Compilation(format!(
            "helper object {} defines no known permutation",
            extraction.helper_name
        )));
    }

    // Ordered invocations `<helper>.<method>(<arg>[, n])` in the body.
    let call_re = Regex::new(&format!(
        r"{}\.([a-zA-Z0-9$_]+)\({}(?:,\s*(\d+))?\)",
        regex::escape(&extraction.helper_name),
        regex::escape(&extraction.arg_name)
    ))?;

    let mut steps = Vec::new();
    for caps in call_re.captures_iter(&extraction.body) {
        let method = match caps.get(1) {
            Some(m) => m.as_str(),
            None => continue,
        };
        let op = *methods.get(method).ok_or_else(|| {
            DlmuxError::Compilation(format!(
                "body calls {}.{} but the helper does not define it",
                extraction.helper_name, method
            ))
        })?;
        let arg = caps
            .get(2)
            .and_then(|m| m.as_str().parse::<usize>().ok())
            .unwrap_or(0);
        steps.push((op, arg));
    }

    if steps.is_empty() {
        return Err(DlmuxError::Compilation(
            "routine body contains no permutation steps".to_string(),
        ));
    }

    debug!(steps = steps.len(), "compiled descrambling routine");
    Ok(DecipherRoutine { steps })
}

/// Classify each helper member by what its body does to the array.
fn parse_helper_methods(helper_literal: &str) -> Result<HashMap<String, Op>, DlmuxError> {
    let member_re = Regex::new(r"([a-zA-Z0-9$_]+)\s*:\s*function\(a(?:,b)?\)\s*\{([\s\S]*?)\}")?;
    let mut methods = HashMap::new();

    for caps in member_re.captures_iter(helper_literal) {
        let (name, body) = match (caps.get(1), caps.get(2)) {
            (Some(n), Some(b)) => (n.as_str(), b.as_str()),
            _ => continue,
        };
        if body.contains(".reverse()") {
            methods.insert(name.to_string(), Op::Reverse);
        } else if body.contains(".splice(") || body.contains(".slice(") {
            methods.insert(name.to_string(), Op::Cut);
        } else if body.contains("a[0]=a[") && body.contains("%a.length]") {
            methods.insert(name.to_string(), Op::Swap);
        }
        // An unrecognized member body stays out of the table; a call to it
        // then fails compilation rather than silently no-opping.
    }

    Ok(methods)
}
