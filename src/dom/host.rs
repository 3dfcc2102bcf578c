//! Script engine seam.

/// Origin a script runs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptOrigin {
    /// Same origin as the host document.
    Host,
    /// Unique opaque origin; no access to the host document.
    Opaque,
}

/// A script handed to the engine, copied out of the tree at execution time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    pub text: String,
    pub src: Option<String>,
    pub attributes: Vec<(String, String)>,
    pub origin: ScriptOrigin,
}

pub trait ScriptHost {
    fn execute(&mut self, script: &Script);
}

/// Records executions without evaluating them. Terminal front ends have no
/// script engine, so they report what ran instead.
#[derive(Debug, Clone, Default)]
pub struct ScriptLog {
    executed: Vec<Script>,
}

impl ScriptLog {
    pub fn executed(&self) -> &[Script] {
        &self.executed
    }

    pub fn clear(&mut self) {
        self.executed.clear();
    }
}

impl ScriptHost for ScriptLog {
    fn execute(&mut self, script: &Script) {
        self.executed.push(script.clone());
    }
}
