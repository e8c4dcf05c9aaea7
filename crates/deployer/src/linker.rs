//! Rewrites library link placeholders in compiled bytecode to deployed
//! addresses recorded in the ledger.

use {
    crate::error::{Error, Result},
    ledger::Ledger,
    web3::types::H160,
};

/// Width of a solc link placeholder in hex characters: two underscores, the
/// reference truncated to at most 36 characters and underscore padding.
const PLACEHOLDER_LEN: usize = 40;

/// A placeholder span found in raw bytecode, identifying an unresolved
/// library symbol by a truncated path string.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinkReference {
    pub name: String,
}

/// Outcome of resolving one placeholder.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    Resolved {
        reference: String,
        library: String,
        address: H160,
    },
    Unresolved {
        reference: String,
    },
}

/// Per reference resolution report. The orchestrator decides what to do with
/// unresolved references instead of the linker silently leaving them behind.
#[derive(Clone, Debug, Default)]
pub struct LinkReport {
    pub resolutions: Vec<Resolution>,
}

impl LinkReport {
    pub fn unresolved(&self) -> Vec<&str> {
        self.resolutions
            .iter()
            .filter_map(|resolution| match resolution {
                Resolution::Unresolved { reference } => Some(reference.as_str()),
                Resolution::Resolved { .. } => None,
            })
            .collect()
    }

    pub fn is_fully_resolved(&self) -> bool {
        self.unresolved().is_empty()
    }
}

/// Finds the distinct link placeholders in hex bytecode.
pub fn find_link_references(bytecode: &str) -> Vec<LinkReference> {
    let bytes = bytecode.as_bytes();
    let mut references: Vec<LinkReference> = Vec::new();
    let mut i = 0;
    while i + PLACEHOLDER_LEN <= bytes.len() {
        if bytes[i] != b'_' || bytes[i + 1] != b'_' {
            i += 1;
            continue;
        }
        // A span cutting through a multibyte char cannot be a solc
        // placeholder; hex decoding rejects such bytecode later.
        let Ok(span) = std::str::from_utf8(&bytes[i..i + PLACEHOLDER_LEN]) else {
            i += PLACEHOLDER_LEN;
            continue;
        };
        let name = span.trim_matches('_');
        if !name.is_empty() && !references.iter().any(|reference| reference.name == name) {
            references.push(LinkReference {
                name: name.to_string(),
            });
        }
        i += PLACEHOLDER_LEN;
    }
    references
}

/// Resolves placeholders in `bytecode` against the given library names.
///
/// The placeholder format truncates long paths, so a placeholder matches a
/// library when the placeholder's basename is a prefix of the library's
/// recorded location basename. Keep library files in shallow directories
/// with short names so this stays unambiguous. Libraries without a recorded
/// location or address leave their references unresolved in the report.
pub fn link(bytecode: &mut String, libraries: &[&str], ledger: &Ledger) -> Result<LinkReport> {
    let mut report = LinkReport::default();
    'references: for reference in find_link_references(bytecode) {
        let basename = reference
            .name
            .rsplit('/')
            .next()
            .unwrap_or(reference.name.as_str());
        for library in libraries {
            let location = match ledger.location(library) {
                Ok(location) => location,
                Err(ledger::Error::NotFound(_)) => continue,
                Err(err) => return Err(err.into()),
            };
            if !location.starts_with(basename) {
                continue;
            }
            let address = match ledger.address(library) {
                Ok(address) => parse_address(&address)?,
                Err(ledger::Error::NotDeployed(_)) => continue,
                Err(err) => return Err(err.into()),
            };
            *bytecode = substitute(bytecode, &reference.name, address);
            report.resolutions.push(Resolution::Resolved {
                reference: reference.name.clone(),
                library: library.to_string(),
                address,
            });
            continue 'references;
        }
        report.resolutions.push(Resolution::Unresolved {
            reference: reference.name.clone(),
        });
    }
    Ok(report)
}

/// Replaces every placeholder span for `reference` with the library address.
fn substitute(bytecode: &str, reference: &str, address: H160) -> String {
    let mut marker = format!("__{reference}");
    while marker.len() < PLACEHOLDER_LEN {
        marker.push('_');
    }
    bytecode.replace(&marker, &hex::encode(address.as_bytes()))
}

pub fn parse_address(address: &str) -> Result<H160> {
    address
        .trim_start_matches("0x")
        .parse()
        .map_err(|_| Error::InvalidAddress(address.to_string()))
}
