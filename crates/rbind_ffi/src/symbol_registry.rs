use ahash::AHashMap;
use heck::ToSnakeCase;
use thiserror::Error;

use crate::types::Signature;

/// Prefix shared by every native entry point symbol.
pub const ENTRY_PREFIX: &str = "wrapped_";

/// Strategy naming the R-side wrapper of a bridged function.
pub trait WrapperNaming {
    fn wrapper_name(&self, function: &str) -> String;
}

/// Default naming: `CumProd` and `cum_prod` both become `cum_prod`.
#[derive(Clone, Copy, Debug, Default)]
pub struct SnakeCaseNaming;

impl WrapperNaming for SnakeCaseNaming {
    fn wrapper_name(&self, function: &str) -> String {
        function.to_snake_case()
    }
}

/// Native symbol exported for `function`; the R wrapper dispatches to it by this name.
pub fn entry_symbol(function: &str) -> String {
    format!("{ENTRY_PREFIX}{function}")
}

/// Names one bridged function carries across both artifacts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BridgeSymbol {
    pub function: String,
    pub entry_symbol: String,
    pub wrapper_name: String,
    pub arity: usize,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("function `{0}` is declared more than once")]
    DuplicateFunction(String),
    #[error("functions `{first}` and `{second}` both map to the R wrapper `{wrapper}`")]
    WrapperClash {
        wrapper: String,
        first: String,
        second: String,
    },
}

/// Per-run table of entry points, built once and read by both emitters.
#[derive(Clone, Debug, Default)]
pub struct BridgeSymbolRegistry {
    symbols: Vec<BridgeSymbol>,
    by_function: AHashMap<String, usize>,
}

impl BridgeSymbolRegistry {
    pub fn build(
        signatures: &[Signature],
        naming: &dyn WrapperNaming,
    ) -> Result<Self, RegistryError> {
        let mut registry = Self::default();
        let mut by_wrapper: AHashMap<String, usize> = AHashMap::new();

        for signature in signatures {
            if registry.by_function.contains_key(&signature.name) {
                return Err(RegistryError::DuplicateFunction(signature.name.clone()));
            }
            let wrapper_name = naming.wrapper_name(&signature.name);
            if let Some(&existing) = by_wrapper.get(&wrapper_name) {
                return Err(RegistryError::WrapperClash {
                    wrapper: wrapper_name,
                    first: registry.symbols[existing].function.clone(),
                    second: signature.name.clone(),
                });
            }

            let idx = registry.symbols.len();
            by_wrapper.insert(wrapper_name.clone(), idx);
            registry.by_function.insert(signature.name.clone(), idx);
            registry.symbols.push(BridgeSymbol {
                function: signature.name.clone(),
                entry_symbol: entry_symbol(&signature.name),
                wrapper_name,
                arity: signature.arity(),
            });
        }

        Ok(registry)
    }

    pub fn get(&self, function: &str) -> Option<&BridgeSymbol> {
        self.by_function.get(function).map(|&idx| &self.symbols[idx])
    }

    pub fn iter(&self) -> impl Iterator<Item = &BridgeSymbol> {
        self.symbols.iter()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}
