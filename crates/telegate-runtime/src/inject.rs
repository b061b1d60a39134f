//! Script injection adapter: page-context stubs for the bridge.
//!
//! Two scripts are installed into every new document before vendor code
//! runs. The first defines `invokeRemoteFunction`, a blocking loopback
//! call parameterized with the session's bridge port. The second defines
//! one named stub per registered callable, so the vendor page can call
//! `Authentication.CTCGetAuthInfo(token)` as if the firmware were present.

use std::collections::BTreeSet;
use std::fmt::Write as _;

use crate::bridge::CallableRegistry;

const INVOKE_TEMPLATE: &str = include_str!("invoke.js");

const PORT_PLACEHOLDER: &str = "__BRIDGE_PORT__";

/// The `invokeRemoteFunction` stub bound to this session's bridge port.
pub fn invoke_stub(port: u16) -> String {
    INVOKE_TEMPLATE.replace(PORT_PLACEHOLDER, &port.to_string())
}

/// Named stubs for every registered callable.
///
/// Dotted names become a method on a page-global class shell
/// (`Authentication.CTCGetAuthInfo`), bare names become page-global
/// functions. Arguments are forwarded as kwargs keyed by the declared
/// parameter names.
pub fn callable_stubs(registry: &CallableRegistry) -> String {
    let mut out = String::new();
    let mut shells: BTreeSet<&str> = BTreeSet::new();

    for (name, callable) in registry.iter() {
        let params = callable.params().join(",");
        let kwargs: Vec<String> = callable
            .params()
            .iter()
            .map(|p| format!("\"{p}\":{p}"))
            .collect();
        let kwargs = kwargs.join(",");

        match name.split_once('.') {
            Some((shell, method)) => {
                if shells.insert(shell) {
                    let _ = writeln!(out, "class {shell} {{}}");
                    let _ = writeln!(out, "globalThis.{shell} = {shell};");
                }
                let _ = writeln!(
                    out,
                    "{shell}.{method} = function({params}) {{ return invokeRemoteFunction(\"{name}\", null, {{{kwargs}}}); }};"
                );
            }
            None => {
                let _ = writeln!(
                    out,
                    "globalThis.{name} = function({params}) {{ return invokeRemoteFunction(\"{name}\", null, {{{kwargs}}}); }};"
                );
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn stub_is_bound_to_session_port() {
        let stub = invoke_stub(49152);
        assert!(stub.contains("http://127.0.0.1:49152/invoke/"));
        assert!(!stub.contains(PORT_PLACEHOLDER));
    }

    #[test]
    fn stub_blocks_and_posts() {
        let stub = invoke_stub(8000);
        // The third `open` argument must stay false: the vendor page
        // expects a synchronous call.
        assert!(stub.contains("request.open(\"POST\""));
        assert!(stub.contains("false);"));
    }

    #[test]
    fn dotted_names_become_class_methods() {
        let mut registry = CallableRegistry::new();
        registry
            .register("Authentication.CTCGetAuthInfo", &["token"], |_, _| {
                Ok(Value::Null)
            })
            .unwrap();
        registry
            .register("Authentication.CTCStartUpdate", &[], |_, _| Ok(Value::Null))
            .unwrap();
        let stubs = callable_stubs(&registry);
        assert_eq!(stubs.matches("class Authentication {}").count(), 1);
        assert!(stubs.contains(
            "Authentication.CTCGetAuthInfo = function(token) { return invokeRemoteFunction(\"Authentication.CTCGetAuthInfo\", null, {\"token\":token}); };"
        ));
        assert!(stubs.contains("Authentication.CTCStartUpdate = function() {"));
    }

    #[test]
    fn bare_names_become_globals() {
        let mut registry = CallableRegistry::new();
        registry
            .register("ping", &["value"], |_, _| Ok(Value::Null))
            .unwrap();
        let stubs = callable_stubs(&registry);
        assert!(stubs.contains("globalThis.ping = function(value)"));
    }

    #[test]
    fn empty_registry_yields_no_stubs() {
        assert!(callable_stubs(&CallableRegistry::new()).is_empty());
    }
}
