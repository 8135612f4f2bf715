//! Entry point for the rule engine web worker.
//!
//! Built separately and loaded by the form page, which talks to it through
//! `RuleEngineHost`.

#[cfg(all(target_family = "wasm", target_os = "unknown"))]
fn main() {
    console_error_panic_hook::set_once();

    use forms_rule_worker::reactor::{JsonCodec, RuleEngineReactor};
    use gloo_worker::Registrable;

    RuleEngineReactor::registrar()
        .encoding::<JsonCodec>()
        .register();
}

#[cfg(not(all(target_family = "wasm", target_os = "unknown")))]
fn main() {
    eprintln!("This binary is only meant to run as a WASM web worker");
}
