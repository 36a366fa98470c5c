//! Bundled modules and specifier resolution
//!
//! Modules are registered statically; the process argument picks one of them
//! by name. A path-like specifier resolves by its file stem, so
//! `./plugins/math.js` loads `math`.

use std::path::Path;

use crate::errors::BridgeError;
use crate::module::Module;

pub mod clock;
pub mod math;
pub mod text;

type ModuleFactory = fn() -> Module;

pub struct ModuleCatalog {
    entries: Vec<(&'static str, ModuleFactory)>,
}

impl Default for ModuleCatalog {
    fn default() -> Self {
        Self {
            entries: vec![
                ("clock", clock::module as ModuleFactory),
                ("math", math::module as ModuleFactory),
                ("text", text::module as ModuleFactory),
            ],
        }
    }
}

impl ModuleCatalog {
    pub fn names(&self) -> Vec<&'static str> {
        self.entries.iter().map(|(name, _)| *name).collect()
    }

    pub fn load(&self, specifier: &str) -> Result<Module, BridgeError> {
        let name = module_name(specifier);
        self.entries
            .iter()
            .find(|(entry, _)| *entry == name)
            .map(|(_, factory)| factory())
            .ok_or_else(|| BridgeError::UnknownModule {
                specifier: specifier.to_string(),
                available: self.names().join(", "),
            })
    }
}

fn module_name(specifier: &str) -> &str {
    let trimmed = specifier.trim();
    Path::new(trimmed)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(trimmed)
}
