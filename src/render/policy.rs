//! Trust levels for rendered content.
//!
//! The report comes from the trusted backend and may talk to the host page.
//! Charts may run script but never get same-origin access.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IsolationPolicy {
    pub allow_scripts: bool,
    pub allow_same_origin: bool,
}

impl IsolationPolicy {
    pub const REPORT: IsolationPolicy = IsolationPolicy { allow_scripts: true, allow_same_origin: true };
    pub const CHART: IsolationPolicy = IsolationPolicy { allow_scripts: true, allow_same_origin: false };

    /// Value for an iframe `sandbox` attribute.
    pub fn sandbox_tokens(&self) -> String {
        let mut tokens = Vec::new();
        if self.allow_scripts {
            tokens.push("allow-scripts");
        }
        if self.allow_same_origin {
            tokens.push("allow-same-origin");
        }
        tokens.join(" ")
    }
}

/// Per-region policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionPolicies {
    pub report: IsolationPolicy,
    pub chart: IsolationPolicy,
}

impl Default for RegionPolicies {
    fn default() -> Self {
        Self { report: IsolationPolicy::REPORT, chart: IsolationPolicy::CHART }
    }
}
