//! Error-kind taxonomy
//!
//! Failures are matched against a *kind* rather than a concrete type. Kinds
//! form a tree: every kind except a root names a parent, and a failure whose
//! root cause classifies as `network.timeout` also counts as `network`, `io`
//! and `error` in the standard taxonomy.
//!
//! Kinds are registered up front and resolved by name when a breaker is
//! configured, so a misspelled kind is a configuration error rather than a
//! silent non-match.
//!
//! # Example
//!
//! ```rust
//! use std::io;
//! use tripwire::taxonomy::ErrorTaxonomy;
//!
//! let taxonomy = ErrorTaxonomy::standard();
//! let network = taxonomy.resolve("network").unwrap();
//!
//! let refused = io::Error::new(io::ErrorKind::ConnectionRefused, "refused");
//! assert!(taxonomy.matches(&refused, &network));
//!
//! let missing = io::Error::new(io::ErrorKind::NotFound, "missing");
//! assert!(!taxonomy.matches(&missing, &network));
//! ```

use crate::error::{BreakerError, Result};
use std::error::Error;
use std::fmt;
use std::io;
use std::sync::Arc;

type Matcher = Arc<dyn Fn(&(dyn Error + 'static)) -> bool + Send + Sync>;

/// A resolved error kind
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ErrorKind {
    index: usize,
    name: String,
}

impl ErrorKind {
    /// Kind name as registered in the taxonomy
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

struct KindEntry {
    name: String,
    parent: Option<usize>,
    depth: usize,
    matcher: Matcher,
}

/// Registry of error kinds and their parent relation
pub struct ErrorTaxonomy {
    kinds: Vec<KindEntry>,
}

impl fmt::Debug for ErrorTaxonomy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorTaxonomy")
            .field("kinds", &self.names().collect::<Vec<_>>())
            .finish()
    }
}

impl Default for ErrorTaxonomy {
    fn default() -> Self {
        Self::standard()
    }
}

impl ErrorTaxonomy {
    /// Start building a taxonomy
    pub fn builder() -> TaxonomyBuilder {
        TaxonomyBuilder::default()
    }

    /// Taxonomy covering I/O and network failures and tokio timeouts
    pub fn standard() -> Self {
        use std::io::ErrorKind::*;

        Self::builder()
            .any("error")
            .typed::<io::Error>("io", Some("error"))
            .io("io.not_found", Some("io"), &[NotFound])
            .io("io.permission_denied", Some("io"), &[PermissionDenied])
            .io(
                "network",
                Some("io"),
                &[
                    TimedOut,
                    ConnectionRefused,
                    ConnectionReset,
                    ConnectionAborted,
                    NotConnected,
                    AddrNotAvailable,
                    BrokenPipe,
                ],
            )
            .io("network.timeout", Some("network"), &[TimedOut])
            .io("network.connection_refused", Some("network"), &[ConnectionRefused])
            .io("network.connection_reset", Some("network"), &[ConnectionReset])
            .io("network.connection_aborted", Some("network"), &[ConnectionAborted])
            .io("network.broken_pipe", Some("network"), &[BrokenPipe])
            .typed::<tokio::time::error::Elapsed>("elapsed", Some("error"))
            .build()
            .expect("standard error taxonomy is well-formed")
    }

    /// Resolve a kind by name
    pub fn resolve(&self, name: &str) -> Result<ErrorKind> {
        self.kinds
            .iter()
            .position(|k| k.name == name)
            .map(|index| self.kind_at(index))
            .ok_or_else(|| BreakerError::InvalidMatchSpec(name.to_string()))
    }

    /// Registered kind names, in registration order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.kinds.iter().map(|k| k.name.as_str())
    }

    /// Classify the root cause of `error` as its most specific registered kind
    pub fn classify(&self, error: &(dyn Error + 'static)) -> Option<ErrorKind> {
        let cause = root_cause(error);

        let mut best: Option<(usize, usize)> = None;
        for (index, kind) in self.kinds.iter().enumerate() {
            if !(kind.matcher)(cause) {
                continue;
            }
            match best {
                Some((_, depth)) if depth >= kind.depth => {}
                _ => best = Some((index, kind.depth)),
            }
        }

        best.map(|(index, _)| self.kind_at(index))
    }

    /// Whether `kind` is `ancestor` or one of its descendants
    pub fn is_subtype(&self, kind: &ErrorKind, ancestor: &ErrorKind) -> bool {
        let mut current = Some(kind.index);
        while let Some(index) = current {
            if index == ancestor.index {
                return true;
            }
            current = self.kinds.get(index).and_then(|k| k.parent);
        }
        false
    }

    /// Whether the root cause of `error` is of kind `target` or a subtype of it
    pub fn matches(&self, error: &(dyn Error + 'static), target: &ErrorKind) -> bool {
        self.classify(error)
            .map_or(false, |kind| self.is_subtype(&kind, target))
    }

    fn kind_at(&self, index: usize) -> ErrorKind {
        ErrorKind {
            index,
            name: self.kinds[index].name.clone(),
        }
    }
}

/// Follow `source()` to the innermost error
pub fn root_cause<'a>(error: &'a (dyn Error + 'static)) -> &'a (dyn Error + 'static) {
    let mut cause = error;
    while let Some(source) = cause.source() {
        cause = source;
    }
    cause
}

/// Builder for [`ErrorTaxonomy`]
///
/// Parents must be registered before their children.
#[derive(Default)]
pub struct TaxonomyBuilder {
    pending: Vec<(String, Option<String>, Matcher)>,
}

impl TaxonomyBuilder {
    /// A root kind that matches every error
    pub fn any(self, name: &str) -> Self {
        self.custom(name, None, |_| true)
    }

    /// A kind matching errors of concrete type `E`
    pub fn typed<E: Error + 'static>(self, name: &str, parent: Option<&str>) -> Self {
        self.custom(name, parent, |error| error.is::<E>())
    }

    /// A kind matching `std::io::Error`s with one of the given kinds
    pub fn io(self, name: &str, parent: Option<&str>, kinds: &[io::ErrorKind]) -> Self {
        let kinds = kinds.to_vec();
        self.custom(name, parent, move |error| {
            error
                .downcast_ref::<io::Error>()
                .map_or(false, |e| kinds.contains(&e.kind()))
        })
    }

    /// A kind with an arbitrary matcher
    pub fn custom<F>(mut self, name: &str, parent: Option<&str>, matcher: F) -> Self
    where
        F: Fn(&(dyn Error + 'static)) -> bool + Send + Sync + 'static,
    {
        self.pending.push((
            name.to_string(),
            parent.map(str::to_string),
            Arc::new(matcher),
        ));
        self
    }

    pub fn build(self) -> Result<ErrorTaxonomy> {
        let mut kinds: Vec<KindEntry> = Vec::with_capacity(self.pending.len());

        for (name, parent, matcher) in self.pending {
            if name.is_empty() {
                return Err(BreakerError::Config(
                    "Error kind name cannot be empty".to_string(),
                ));
            }
            if kinds.iter().any(|k| k.name == name) {
                return Err(BreakerError::Config(format!(
                    "Duplicate error kind: {}",
                    name
                )));
            }

            let (parent, depth) = match parent {
                None => (None, 0),
                Some(parent) => {
                    let index = kinds
                        .iter()
                        .position(|k| k.name == parent)
                        .ok_or_else(|| {
                            BreakerError::Config(format!(
                                "Unknown parent '{}' for error kind '{}'",
                                parent, name
                            ))
                        })?;
                    (Some(index), kinds[index].depth + 1)
                }
            };

            kinds.push(KindEntry {
                name,
                parent,
                depth,
                matcher,
            });
        }

        Ok(ErrorTaxonomy { kinds })
    }
}
