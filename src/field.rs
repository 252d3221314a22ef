//! Field references and value proxies.

use crate::value::Value;
use std::fmt;
use std::sync::Arc;

/// A pure, deterministic transform applied to a field's raw value before it participates in
/// equality/inequality comparisons. `(name, raw_value) -> comparison_value`.
pub type Proxy = Arc<dyn Fn(&str, &Value) -> Value + Send + Sync>;

/// Returns the value unchanged. Used when no proxy is supplied to [`field`].
pub fn identity_proxy() -> Proxy {
    Arc::new(|_name, value| value.clone())
}

/// A reference to a named field, together with the proxy used to compute its comparison value.
#[derive(Clone)]
pub struct F {
    pub(crate) name: String,
    pub(crate) proxy: Proxy,
}

impl fmt::Debug for F {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("F").field("name", &self.name).finish()
    }
}

impl F {
    /// Name of the referenced field (possibly a dotted path).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The proxy that will be applied to this field's raw value.
    pub fn proxy(&self) -> Proxy {
        Arc::clone(&self.proxy)
    }
}

/// Builds a field reference. `proxy` defaults to the identity transform when `None`.
pub fn field(name: impl Into<String>, proxy: Option<Proxy>) -> F {
    F {
        name: name.into(),
        proxy: proxy.unwrap_or_else(identity_proxy),
    }
}
