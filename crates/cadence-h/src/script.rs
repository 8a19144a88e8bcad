//! Scripts evaluated inside a frame's isolated world. Elements are tagged
//! with a `data-cadence-id` attribute so later calls can find them again;
//! the DOM is shared between worlds, page globals are not.

use chromiumoxide::Page;
use chromiumoxide::cdp::js_protocol::runtime::{EvaluateParams, ExecutionContextId};
use serde_json::Value;
use std::time::Duration;

/// Upper bound for a single evaluation; a dialog can block the JS thread.
pub const EVAL_TIMEOUT: Duration = Duration::from_secs(10);

pub const MAX_CONTEXT_RETRIES: u32 = 10;

pub const CONTEXT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Prefix of the message thrown when a tagged element is gone.
pub const STALE_MARKER: &str = "cadence:stale";

const PRELUDE: &str = r#"
const byId = (id) => {
  const el = document.querySelector(`[data-cadence-id="${id}"]`);
  if (!el) throw new Error(`cadence:stale ${id}`);
  return el;
};
const norm = (s) => (s || '').replace(/\s+/g, ' ').trim();
"#;

const QUERY: &str = r#"
const matches = (el, sel) => {
  if (!el.matches(sel.css)) return false;
  if (sel.kind === 'text') {
    const text = norm(el.innerText || el.textContent);
    const want = norm(sel.text);
    return sel.exact ? text === want : text.toLowerCase().includes(want.toLowerCase());
  }
  if (sel.kind === 'has') {
    return Array.from(el.querySelectorAll(sel.inner.css)).some((c) => matches(c, sel.inner));
  }
  return true;
};
const root = args.scope ? byId(args.scope) : document;
return Array.from(root.querySelectorAll(args.selector.css))
  .filter((el) => matches(el, args.selector))
  .map((el) => {
    let id = el.getAttribute('data-cadence-id');
    if (!id) {
      id = 'c' + Math.random().toString(36).slice(2, 10) + Date.now().toString(36);
      el.setAttribute('data-cadence-id', id);
    }
    const rect = el.getBoundingClientRect();
    const style = getComputedStyle(el);
    const visible = rect.width > 0 && rect.height > 0
      && style.visibility !== 'hidden' && style.display !== 'none';
    return { id, visible, enabled: !el.disabled };
  });
"#;

const READ_VALUE: &str = "return String(byId(args.id).value ?? '');";

/// Focus and empty the field so typed text replaces it. Returns whether
/// the field holds focus.
const CLEAR_VALUE: &str = r#"
const el = byId(args.id);
el.scrollIntoView({ block: 'center', inline: 'center' });
el.focus();
if (typeof el.select === 'function') el.select();
el.value = '';
el.dispatchEvent(new Event('input', { bubbles: true }));
return document.activeElement === el;
"#;

/// Assign the value if typing did not produce it, then fire `change`.
const COMMIT_VALUE: &str = r#"
const el = byId(args.id);
if (String(el.value ?? '') !== args.value) {
  el.value = args.value;
  el.dispatchEvent(new Event('input', { bubbles: true }));
}
el.dispatchEvent(new Event('change', { bubbles: true }));
el.blur();
return null;
"#;

const INNER_TEXT: &str = "const el = byId(args.id); return el.innerText || el.textContent || '';";

const CLICK: &str = r#"
const el = byId(args.id);
el.scrollIntoView({ block: 'center', inline: 'center' });
el.click();
return null;
"#;

const READY_STATE: &str = "return document.readyState;";

/// Script kinds the driver can run.
#[derive(Debug, Clone, Copy)]
pub enum Script {
    Query,
    ReadValue,
    ClearValue,
    CommitValue,
    InnerText,
    Click,
    ReadyState,
}

impl Script {
    fn body(self) -> &'static str {
        match self {
            Script::Query => QUERY,
            Script::ReadValue => READ_VALUE,
            Script::ClearValue => CLEAR_VALUE,
            Script::CommitValue => COMMIT_VALUE,
            Script::InnerText => INNER_TEXT,
            Script::Click => CLICK,
            Script::ReadyState => READY_STATE,
        }
    }

    /// Self-invoking expression with `args` bound to the JSON value.
    pub fn expression(self, args: &Value) -> String {
        format!("((args) => {{{}{}}})({})", PRELUDE, self.body(), args)
    }
}

#[derive(Debug)]
pub enum EvalError {
    Timeout,
    /// The execution context went away (navigation, frame swap).
    Context(String),
    /// The script threw.
    Exception(String),
    Other(String),
}

/// Context errors Chrome reports while a document is being replaced.
pub fn is_context_error(err: &str) -> bool {
    err.contains("Cannot find context")
        || err.contains("Execution context was destroyed")
        || err.contains("Cannot find default execution context")
        || err.contains("-32000")
}

pub async fn evaluate_in(
    page: &Page,
    context: ExecutionContextId,
    expression: String,
) -> Result<Value, EvalError> {
    let params = EvaluateParams::builder()
        .expression(expression)
        .context_id(context)
        .return_by_value(true)
        .await_promise(true)
        .build()
        .map_err(EvalError::Other)?;

    let response = match tokio::time::timeout(EVAL_TIMEOUT, page.execute(params)).await {
        Err(_) => return Err(EvalError::Timeout),
        Ok(Err(e)) => {
            let message = e.to_string();
            return Err(if is_context_error(&message) {
                EvalError::Context(message)
            } else {
                EvalError::Other(message)
            });
        }
        Ok(Ok(response)) => response.result,
    };

    if let Some(details) = response.exception_details {
        let message = details
            .exception
            .and_then(|e| e.description)
            .unwrap_or(details.text);
        return Err(EvalError::Exception(message));
    }
    Ok(response.result.value.unwrap_or(Value::Null))
}
