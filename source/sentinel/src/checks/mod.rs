//! Check registry and dispatch (spec.md §4.5): a name→factory registry
//! producing one-shot plugin-style results, plus two fully implemented
//! checks, `check_ntp_offset` and `check_pdh` (see SPEC_FULL.md for why
//! only these two carry a full implementation).

pub mod dispatch;
pub mod ntp;
pub mod pdh;
pub mod registry;
pub mod resolver;
pub mod result;

pub use dispatch::{CheckArgs, ThresholdRange};
pub use registry::{Check, CheckDeclaration, CheckError, CheckRegistry, Platform};
pub use resolver::{RealSystemUtility, SystemUtility};
pub use result::{CheckResult, CheckState, Metric};

/// Builds the registry of checks shipped with the agent, wired to the real
/// system-utility runner.
pub fn builtin_registry() -> CheckRegistry {
    let mut registry = CheckRegistry::new();
    let utility: std::sync::Arc<dyn SystemUtility> = std::sync::Arc::new(RealSystemUtility);
    {
        let utility = utility.clone();
        registry.register("check_ntp_offset", move || Box::new(ntp::CheckNtpOffset::new(utility.clone())));
    }
    registry.register("check_pdh", move || Box::new(pdh::CheckPdh::new(utility.clone())));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registry_contains_both_checks() {
        let registry = builtin_registry();
        assert!(registry.contains("check_ntp_offset"));
        assert!(registry.contains("check_pdh"));
    }
}
