//! Explicitly registered descriptions of mockable collaborator types.
//!
//! A [`Contract`] lists the methods a mock answers to. Contracts refer to
//! each other by name through [`Kind::Mock`], so they are resolved through a
//! [`ContractRegistry`] that is frozen before any mock is created.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use crate::core::errors::{MockError, Result};
use crate::core::value::Kind;

/// Stable method identity: owning type, name, and parameter shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodId {
    owner: Arc<str>,
    name: Arc<str>,
    params: Arc<[Kind]>,
}

impl MethodId {
    /// Build a method identity.
    #[must_use]
    pub fn new(owner: &str, name: &str, params: &[Kind]) -> Self {
        Self {
            owner: Arc::from(owner),
            name: Arc::from(name),
            params: Arc::from(params),
        }
    }

    /// Owning contract name.
    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Method name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared parameter kinds, in order.
    #[must_use]
    pub fn params(&self) -> &[Kind] {
        &self.params
    }

    /// Number of parameters.
    #[must_use]
    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

impl fmt::Display for MethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}(", self.owner, self.name)?;
        for (i, kind) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{kind}")?;
        }
        write!(f, ")")
    }
}

/// A method identity plus its declared return kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSignature {
    id: MethodId,
    returns: Kind,
}

impl MethodSignature {
    /// The method identity.
    #[must_use]
    pub const fn id(&self) -> &MethodId {
        &self.id
    }

    /// Declared return kind.
    #[must_use]
    pub const fn returns(&self) -> &Kind {
        &self.returns
    }
}

impl fmt::Display for MethodSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.id, self.returns)
    }
}

/// A mockable collaborator type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contract {
    name: String,
    methods: Vec<MethodSignature>,
}

impl Contract {
    /// Start describing a contract named `name`.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> ContractBuilder {
        ContractBuilder {
            name: name.into(),
            methods: Vec::new(),
        }
    }

    /// Contract name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// All method signatures in declaration order.
    #[must_use]
    pub fn methods(&self) -> &[MethodSignature] {
        &self.methods
    }

    /// Resolve a method by name and argument count.
    ///
    /// Overloads sharing a name and arity cannot be told apart this way and
    /// yield [`MockError::AmbiguousMethod`].
    pub fn resolve(&self, name: &str, arity: usize) -> Result<&MethodSignature> {
        let mut candidates = self
            .methods
            .iter()
            .filter(|m| m.id.name() == name && m.id.arity() == arity);
        let Some(first) = candidates.next() else {
            return Err(MockError::UnknownMethod {
                contract: self.name.clone(),
                method: name.to_string(),
                arity,
            });
        };
        let rest: Vec<&MethodSignature> = candidates.collect();
        if rest.is_empty() {
            return Ok(first);
        }
        let listed: Vec<String> = std::iter::once(first)
            .chain(rest)
            .map(|m| m.id.to_string())
            .collect();
        Err(MockError::AmbiguousMethod {
            contract: self.name.clone(),
            method: name.to_string(),
            arity,
            candidates: listed.join(", "),
        })
    }

    /// Look up the signature for an exact method identity.
    pub fn signature(&self, id: &MethodId) -> Result<&MethodSignature> {
        self.methods
            .iter()
            .find(|m| &m.id == id)
            .ok_or_else(|| MockError::UnknownMethod {
                contract: self.name.clone(),
                method: id.name().to_string(),
                arity: id.arity(),
            })
    }

    fn referenced_contracts(&self) -> impl Iterator<Item = &str> {
        self.methods.iter().filter_map(|m| match &m.returns {
            Kind::Mock(name) => Some(name.as_str()),
            _ => None,
        })
    }
}

/// Incrementally builds a [`Contract`].
#[derive(Debug)]
pub struct ContractBuilder {
    name: String,
    methods: Vec<MethodSignature>,
}

impl ContractBuilder {
    /// Declare a method.
    #[must_use]
    pub fn method(mut self, name: &str, params: &[Kind], returns: Kind) -> Self {
        self.methods.push(MethodSignature {
            id: MethodId::new(&self.name, name, params),
            returns,
        });
        self
    }

    /// Finish the contract, rejecting duplicate method identities.
    pub fn build(self) -> Result<Contract> {
        let mut seen = BTreeSet::new();
        for method in &self.methods {
            if !seen.insert(method.id.to_string()) {
                return Err(MockError::DuplicateSignature {
                    signature: method.id.to_string(),
                });
            }
        }
        Ok(Contract {
            name: self.name,
            methods: self.methods,
        })
    }
}

/// Name-indexed set of contracts known to one mock context.
#[derive(Debug, Clone, Default)]
pub struct ContractRegistry {
    contracts: BTreeMap<String, Arc<Contract>>,
}

impl ContractRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a contract. Registering two different contracts under one name is
    /// an ambiguous mock type.
    pub fn register(&mut self, contract: Contract) -> Result<()> {
        if let Some(existing) = self.contracts.get(contract.name()) {
            if **existing == contract {
                return Ok(());
            }
            return Err(MockError::UnknownContract {
                contract: contract.name().to_string(),
                details: "registered twice with different methods (ambiguous mock type)"
                    .to_string(),
            });
        }
        self.contracts
            .insert(contract.name().to_string(), Arc::new(contract));
        Ok(())
    }

    /// Look up a contract by name.
    pub fn get(&self, name: &str) -> Result<Arc<Contract>> {
        self.contracts
            .get(name)
            .cloned()
            .ok_or_else(|| MockError::UnknownContract {
                contract: name.to_string(),
                details: "not registered".to_string(),
            })
    }

    /// Check that every contract reachable from `name` is registered.
    pub fn validate_closure(&self, name: &str) -> Result<()> {
        let mut pending = vec![name.to_string()];
        let mut visited = BTreeSet::new();
        while let Some(current) = pending.pop() {
            if !visited.insert(current.clone()) {
                continue;
            }
            let contract = self.contracts.get(&current).ok_or_else(|| {
                MockError::UnknownContract {
                    contract: current.clone(),
                    details: if current == name {
                        "not registered".to_string()
                    } else {
                        format!("referenced from the {name} contract graph but not registered")
                    },
                }
            })?;
            pending.extend(contract.referenced_contracts().map(str::to_string));
        }
        Ok(())
    }
}
